// types.rs - Policy submission data model.
//
// A PolicySubmission is built once per invocation and never mutated. The
// transport turns it into exactly one SubmissionOutcome.

use std::fmt;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};

use crate::error::PolicyError;

/// Policy families the daemon can manage.
///
/// ACM is the only family this client deploys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyType {
    Acm,
}

impl PolicyType {
    /// Wire id for ACM policies (`XS_POLICY_ACM`).
    pub const XS_POLICY_ACM: u32 = 1 << 0;

    /// Match a user-supplied policy type, ignoring case.
    pub fn parse(policy_type: &str) -> Result<Self, PolicyError> {
        if policy_type.eq_ignore_ascii_case("acm") {
            Ok(PolicyType::Acm)
        } else {
            Err(PolicyError::UnsupportedPolicyType {
                policy_type: policy_type.to_string(),
            })
        }
    }

    /// Numeric type id sent to the daemon.
    pub fn xs_type(self) -> u32 {
        match self {
            PolicyType::Acm => Self::XS_POLICY_ACM,
        }
    }

    /// Reverse of [`xs_type`](Self::xs_type); `None` for families we do not know.
    pub fn from_xs_type(xs_type: u32) -> Option<Self> {
        match xs_type {
            Self::XS_POLICY_ACM => Some(PolicyType::Acm),
            _ => None,
        }
    }
}

impl fmt::Display for PolicyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyType::Acm => f.write_str("ACM"),
        }
    }
}

/// Installation flags passed through to the daemon (`XS_INST_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstallFlags(u32);

impl InstallFlags {
    pub const NONE: Self = Self(0);
    /// Install as the policy used at the next boot.
    pub const BOOT: Self = Self(1 << 0);
    /// Load into the running hypervisor.
    pub const LOAD: Self = Self(1 << 1);

    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Human-readable state, e.g. "loaded, activated for boot".
    pub fn describe(self) -> String {
        let mut parts = Vec::new();
        if self.contains(Self::LOAD) {
            parts.push("loaded");
        }
        if self.contains(Self::BOOT) {
            parts.push("activated for boot");
        }
        if parts.is_empty() {
            "inactive".to_string()
        } else {
            parts.join(", ")
        }
    }
}

impl BitOr for InstallFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// One policy submission, owned by the workflow for the duration of a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicySubmission {
    pub policy_type: PolicyType,
    pub xml: Vec<u8>,
    pub flags: InstallFlags,
    /// Passed through to the daemon; not evaluated locally.
    pub overwrite: bool,
}

/// What the daemon answered to one submission.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubmissionOutcome {
    /// XSERR status code; [`XSERR_SUCCESS`](crate::XSERR_SUCCESS) on success.
    pub status: i32,
    /// Raw hypervisor error records, already unwrapped from any transport encoding.
    pub errors: Option<Vec<u8>>,
}

impl SubmissionOutcome {
    pub fn success() -> Self {
        Self::default()
    }

    pub fn rejected(status: i32, errors: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            errors: Some(errors.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == crate::xserr::XSERR_SUCCESS
    }

    /// The error blob, if one was returned and it is not empty.
    pub fn error_blob(&self) -> Option<&[u8]> {
        self.errors.as_deref().filter(|b| !b.is_empty())
    }
}

/// The policy currently managed by the daemon, as returned by the read-back call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivePolicy {
    /// Raw `XS_POLICY_*` id reported by the daemon.
    pub policy_type: u32,
    pub name: String,
    #[serde(default)]
    pub version: String,
    /// Daemon-side reference (Xen-API object ref or legacy handle).
    #[serde(default)]
    pub reference: String,
    #[serde(default)]
    pub flags: InstallFlags,
    /// Full XML representation, when requested.
    #[serde(default)]
    pub xml: Option<String>,
}

impl ActivePolicy {
    /// Multi-line summary in the format `xs getpolicy` prints.
    pub fn summary(&self) -> String {
        let type_name = PolicyType::from_xs_type(self.policy_type)
            .map(|t| t.to_string())
            .unwrap_or_else(|| format!("unknown ({})", self.policy_type));
        format!(
            "Policy name           : {}\n\
             Policy type           : {}\n\
             Version of XML policy : {}\n\
             Policy configuration  : {}",
            self.name,
            type_name,
            self.version,
            self.flags.describe()
        )
    }
}
