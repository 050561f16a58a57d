//! Policy submission through the Xen management daemon
//!
//! The daemon exposes two mutually exclusive calling conventions depending on
//! its generation. Both are modelled as implementations of the
//! [`PolicyTransport`] trait so the [`SubmissionWorkflow`] never needs to know
//! which one is active:
//!
//! - [`XenApiTransport`]: Xen-API session calls, XML-RPC over HTTP; hypervisor
//!   error reports arrive base64-encoded and are unwrapped inside the adapter.
//! - [`LegacyTransport`]: the older xend security calls, XML-RPC over its Unix
//!   socket; error reports arrive as raw bytes.

pub mod config;
pub mod error;
pub mod legacy;
mod rpc;
pub mod transport;
pub mod workflow;
pub mod xen_api;

pub use config::{
    ApiGeneration, ClientConfig, ConfigError, LegacyConfig, PolicyConfig, XenApiConfig,
};
pub use error::SubmitError;
pub use legacy::LegacyTransport;
pub use transport::{PolicyTransport, TransportError};
pub use workflow::{
    PolicyReadback, SetPolicyRequest, SubmissionReport, SubmissionWorkflow, TransportReadback,
    WorkflowState,
};
pub use xen_api::XenApiTransport;
