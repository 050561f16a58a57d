// error.rs - Error types for the policy subsystem.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while preparing a policy or reading a hypervisor report.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The policy family is not one this client can deploy.
    #[error("Unsupported policytype '{policy_type}'.")]
    UnsupportedPolicyType { policy_type: String },

    /// The policy document is missing from every search root, or unreadable.
    #[error("Could not read policy file '{policy_name}' from {}.", join_roots(.roots))]
    FileAccess {
        policy_name: String,
        roots: Vec<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    /// The hypervisor reported an error code missing from the local table.
    ///
    /// The client's table is out of sync with the hypervisor, so the report
    /// as a whole cannot be trusted.
    #[error("hypervisor reported unknown error code {code:#x} at byte offset {offset}")]
    UnknownErrorCode { code: i32, offset: usize },
}

fn join_roots(roots: &[PathBuf]) -> String {
    roots
        .iter()
        .map(|r| format!("'{}'", r.display()))
        .collect::<Vec<_>>()
        .join(" or ")
}
