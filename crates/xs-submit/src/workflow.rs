//! Submission workflow: resolve → submit → (decode) → report
//!
//! ```text
//! Idle → Resolving → Submitting → Succeeded
//!                              ↘ Decoding → Rejected
//! ```
//!
//! The workflow runs once per request and never retries. Every failure aborts
//! at the point it is detected. On success the read-back hook is called once
//! so the user can see the policy that is now active; a failing read-back is
//! reported but does not undo the success.

use std::path::PathBuf;

use xs_policy::{
    decode, trailing_bytes, xserr_to_string, ActivePolicy, InstallFlags, PolicySource,
    PolicySubmission, PolicyType, SubmissionOutcome,
};

use crate::error::SubmitError;
use crate::transport::{PolicyTransport, TransportError};

/// What the caller asked for, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetPolicyRequest {
    pub policy_type: String,
    pub policy_name: String,
    pub flags: InstallFlags,
    pub overwrite: bool,
}

impl SetPolicyRequest {
    /// Request with the CLI's fixed settings: load now, activate for boot, overwrite.
    pub fn new(policy_type: impl Into<String>, policy_name: impl Into<String>) -> Self {
        Self {
            policy_type: policy_type.into(),
            policy_name: policy_name.into(),
            flags: InstallFlags::LOAD | InstallFlags::BOOT,
            overwrite: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Idle,
    Resolving,
    Submitting,
    Decoding,
    Succeeded,
    Rejected,
    Failed,
}

/// Follow-up run after a successful submission to show the now-active policy.
pub trait PolicyReadback {
    fn read_back(&self) -> Result<ActivePolicy, TransportError>;
}

/// Read-back through the same transport that performed the submission.
pub struct TransportReadback<'a> {
    transport: &'a dyn PolicyTransport,
}

impl<'a> TransportReadback<'a> {
    pub fn new(transport: &'a dyn PolicyTransport) -> Self {
        Self { transport }
    }
}

impl PolicyReadback for TransportReadback<'_> {
    fn read_back(&self) -> Result<ActivePolicy, TransportError> {
        self.transport.get_policy()
    }
}

/// Result of a successful submission.
#[derive(Debug)]
pub struct SubmissionReport {
    /// Where the submitted policy document was found.
    pub policy_path: PathBuf,
    /// Name of the transport that carried the submission.
    pub transport: String,
    /// The active policy, or why it could not be read back.
    pub readback: Result<ActivePolicy, TransportError>,
}

pub struct SubmissionWorkflow<'a> {
    source: &'a dyn PolicySource,
    transport: &'a dyn PolicyTransport,
    readback: &'a dyn PolicyReadback,
    state: WorkflowState,
}

impl<'a> SubmissionWorkflow<'a> {
    pub fn new(
        source: &'a dyn PolicySource,
        transport: &'a dyn PolicyTransport,
        readback: &'a dyn PolicyReadback,
    ) -> Self {
        Self {
            source,
            transport,
            readback,
            state: WorkflowState::Idle,
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    fn enter(&mut self, next: WorkflowState) {
        tracing::debug!("Workflow: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Deploy one policy.
    pub fn run(&mut self, request: &SetPolicyRequest) -> Result<SubmissionReport, SubmitError> {
        let result = self.drive(request);
        if result.is_err() && self.state != WorkflowState::Rejected {
            self.enter(WorkflowState::Failed);
        }
        result
    }

    fn drive(&mut self, request: &SetPolicyRequest) -> Result<SubmissionReport, SubmitError> {
        // Validated before any I/O.
        let policy_type = PolicyType::parse(&request.policy_type)?;

        self.enter(WorkflowState::Resolving);
        let document = self.source.load(&request.policy_name)?;

        let submission = PolicySubmission {
            policy_type,
            xml: document.content,
            flags: request.flags,
            overwrite: request.overwrite,
        };

        self.enter(WorkflowState::Submitting);
        tracing::info!(
            "Submitting policy '{}' via {} transport",
            request.policy_name,
            self.transport.name()
        );
        let outcome = self.transport.set_policy(&submission)?;

        if !outcome.is_success() {
            return Err(self.reject(&outcome));
        }

        self.enter(WorkflowState::Succeeded);
        tracing::info!("Policy '{}' accepted", request.policy_name);

        let readback = self.readback.read_back();
        if let Err(e) = &readback {
            tracing::warn!("Policy was set but could not be read back: {}", e);
        }

        Ok(SubmissionReport {
            policy_path: document.path,
            transport: self.transport.name().to_string(),
            readback,
        })
    }

    /// Build the error for a non-success outcome.
    fn reject(&mut self, outcome: &SubmissionOutcome) -> SubmitError {
        let mut message = format!(
            "An error occurred trying to set the policy: {}.",
            xserr_to_string(outcome.status)
        );

        if let Some(blob) = outcome.error_blob() {
            self.enter(WorkflowState::Decoding);
            if trailing_bytes(blob) != 0 {
                tracing::warn!(
                    "Ignoring {} trailing byte(s) of hypervisor error report",
                    trailing_bytes(blob)
                );
            }
            match decode(blob) {
                Ok(report) => {
                    message.push(' ');
                    message.push_str(&report);
                }
                Err(source) => {
                    tracing::error!("Hypervisor error report could not be decoded: {}", source);
                    return SubmitError::UnknownErrorCode {
                        status: outcome.status,
                        message,
                        source,
                    };
                }
            }
        }

        self.enter(WorkflowState::Rejected);
        tracing::warn!("Policy rejected with status {:#x}", outcome.status);
        SubmitError::PolicyRejected {
            status: outcome.status,
            message,
        }
    }
}
