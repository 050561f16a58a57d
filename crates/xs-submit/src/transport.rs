//! Core PolicyTransport trait and transport errors

use thiserror::Error;
use xs_policy::{ActivePolicy, PolicySubmission, SubmissionOutcome};

/// Errors raised while talking to the management daemon.
///
/// Every variant keeps the lower-level cause; nothing is swallowed.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request to {endpoint} failed: {source}")]
    Http {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("I/O error on {endpoint}: {source}")]
    Io {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    /// The reply was not a well-formed XML-RPC response.
    #[error("malformed XML-RPC reply to {method}: {source}")]
    Rpc {
        method: String,
        #[source]
        source: xmlrpc::Error,
    },

    #[error("could not decode base64 error report: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The daemon accepted the call but reported a failure of the call itself.
    #[error("{method} failed: {}", .description.join(", "))]
    Fault {
        method: String,
        description: Vec<String>,
    },

    /// The reply parsed but did not have the expected shape.
    #[error("unexpected reply to {method}: {detail}")]
    Protocol { method: String, detail: String },

    #[error("policy document is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// One calling convention for the daemon's policy management API.
///
/// The workflow depends only on this contract; which implementation is in
/// use is a configuration decision made by the caller.
pub trait PolicyTransport {
    /// Submit a policy and return the daemon's verdict.
    ///
    /// Any hypervisor error report in the outcome is raw record bytes,
    /// whatever encoding the wire used.
    fn set_policy(&self, submission: &PolicySubmission) -> Result<SubmissionOutcome>;

    /// Fetch the policy the daemon currently manages.
    fn get_policy(&self) -> Result<ActivePolicy>;

    /// Transport display name (for logs and CLI output)
    fn name(&self) -> &str;
}

impl<T: PolicyTransport + ?Sized> PolicyTransport for Box<T> {
    fn set_policy(&self, submission: &PolicySubmission) -> Result<SubmissionOutcome> {
        (**self).set_policy(submission)
    }

    fn get_policy(&self) -> Result<ActivePolicy> {
        (**self).get_policy()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
