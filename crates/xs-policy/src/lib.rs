//! # xs-policy
//!
//! Domain core for deploying ACM access-control policies to the Xen
//! management daemon.
//!
//! - [`PolicyResolver`] finds a policy document on disk from its dotted
//!   name (`example.chwall` → `example/chwall-security_policy.xml`).
//! - [`decode`] turns the hypervisor's binary error report into text using
//!   the static [`hv_errors`] table.
//! - [`xserr`] renders the daemon's generic status codes.
//!
//! ## Key invariants
//!
//! - **No partial reports**: a single unknown hypervisor error code fails the
//!   whole decode. A half-rendered report would look trustworthy when it is not.
//! - **Stable order**: decoded records appear in the order the hypervisor sent them.
//! - **Unsupported types rejected early**: [`PolicyType::parse`] runs before
//!   any filesystem or network activity.

pub mod decode;
pub mod error;
pub mod hv_errors;
pub mod resolver;
pub mod types;
pub mod xserr;

pub use decode::{decode, records, trailing_bytes, HvErrorRecord, REPORT_BANNER};
pub use error::PolicyError;
pub use hv_errors::{Arity, HvErrorEntry};
pub use resolver::{
    policy_path, PolicyDocument, PolicyResolver, PolicySource, POLICY_FILE_SUFFIX,
    SYSTEM_POLICY_DIR,
};
pub use types::{ActivePolicy, InstallFlags, PolicySubmission, PolicyType, SubmissionOutcome};
pub use xserr::{xserr_to_string, XSERR_SUCCESS};
