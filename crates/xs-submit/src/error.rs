// error.rs - Error types for the submission workflow.

use thiserror::Error;
use xs_policy::PolicyError;

use crate::transport::TransportError;

/// Why a policy submission did not succeed.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// Unsupported policy type, or the policy file could not be read.
    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// The daemon could not be reached, or the call itself failed.
    #[error("An error occurred setting the policy: {0}")]
    Transport(#[from] TransportError),

    /// The daemon or hypervisor refused the policy.
    #[error("{message}")]
    PolicyRejected { status: i32, message: String },

    /// The rejection report contains a code this client does not know.
    ///
    /// Harder than [`PolicyRejected`](Self::PolicyRejected): the client's
    /// error table is out of sync with the hypervisor, so the report cannot
    /// be rendered faithfully.
    #[error("{message} The hypervisor error report is unreadable: {source}")]
    UnknownErrorCode {
        status: i32,
        message: String,
        #[source]
        source: PolicyError,
    },
}

impl SubmitError {
    /// True for failures that mean this client is out of sync with the daemon.
    pub fn is_hard_fault(&self) -> bool {
        matches!(self, SubmitError::UnknownErrorCode { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unknown_codes_are_hard_faults() {
        let rejected = SubmitError::PolicyRejected {
            status: 0x1001,
            message: "rejected".into(),
        };
        assert!(!rejected.is_hard_fault());

        let unknown = SubmitError::UnknownErrorCode {
            status: 0x1001,
            message: "rejected.".into(),
            source: PolicyError::UnknownErrorCode {
                code: 0x200,
                offset: 0,
            },
        };
        assert!(unknown.is_hard_fault());
        assert!(unknown.to_string().contains("0x200"));
    }

    #[test]
    fn policy_errors_pass_through_unchanged() {
        let err: SubmitError = PolicyError::UnsupportedPolicyType {
            policy_type: "foo".into(),
        }
        .into();
        assert_eq!(err.to_string(), "Unsupported policytype 'foo'.");
    }
}
