// hv_errors.rs - Hypervisor ACM error codes.
//
// Static table, read-only for the process lifetime. Every code the hypervisor
// can emit in this deployment must be listed here; the decoder treats a
// missing code as a fatal error.

pub const ACM_EVTCHN_SHARING_VIOLATION: i32 = 0x100;
pub const ACM_GNTTAB_SHARING_VIOLATION: i32 = 0x101;
pub const ACM_DOMAIN_LOOKUP: i32 = 0x102;
pub const ACM_CHWALL_CONFLICT: i32 = 0x103;
pub const ACM_SSIDREF_IN_USE: i32 = 0x104;

/// How the 32-bit data word of a record is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// The whole word is one value (e.g. a domain id).
    One,
    /// High and low 16 bits are two values (e.g. a pair of domain ids).
    Two,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HvErrorEntry {
    pub code: i32,
    pub description: &'static str,
    pub arity: Arity,
}

const HV_ERROR_TABLE: &[HvErrorEntry] = &[
    HvErrorEntry {
        code: ACM_EVTCHN_SHARING_VIOLATION,
        description: "event channel sharing violation between domains",
        arity: Arity::Two,
    },
    HvErrorEntry {
        code: ACM_GNTTAB_SHARING_VIOLATION,
        description: "grant table sharing violation between domains",
        arity: Arity::Two,
    },
    HvErrorEntry {
        code: ACM_DOMAIN_LOOKUP,
        description: "domain lookup",
        arity: Arity::One,
    },
    HvErrorEntry {
        code: ACM_CHWALL_CONFLICT,
        description: "Chinese Wall conflict between domains",
        arity: Arity::Two,
    },
    HvErrorEntry {
        code: ACM_SSIDREF_IN_USE,
        description: "A domain used SSIDREF",
        arity: Arity::One,
    },
];

/// Look up a hypervisor error code.
pub fn lookup(code: i32) -> Option<&'static HvErrorEntry> {
    HV_ERROR_TABLE.iter().find(|e| e.code == code)
}

/// All known entries, in code order.
pub fn entries() -> &'static [HvErrorEntry] {
    HV_ERROR_TABLE
}

impl HvErrorEntry {
    /// Render one record's data word against this entry.
    pub fn render(&self, data: u32) -> String {
        match self.arity {
            Arity::One => format!("{} {}", self.description, data),
            Arity::Two => format!(
                "{} {} and {}",
                self.description,
                data >> 16,
                data & 0xffff
            ),
        }
    }
}
