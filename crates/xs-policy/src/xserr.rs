// xserr.rs - Generic status codes returned by the management daemon.
//
// The daemon reports the outcome of every security call as an XSERR code.
// Success is 0; failures live above XSERR_BASE. Some daemon paths return the
// code negated, so rendering always works on the absolute value.

pub const XSERR_SUCCESS: i32 = 0;
pub const XSERR_BASE: i32 = 0x1000;

pub const XSERR_GENERAL_FAILURE: i32 = XSERR_BASE + 1;
pub const XSERR_BAD_XML: i32 = XSERR_BASE + 2;
pub const XSERR_XML_PROCESSING: i32 = XSERR_BASE + 3;
pub const XSERR_POLICY_INCONSISTENT: i32 = XSERR_BASE + 4;
pub const XSERR_FILE_ERROR: i32 = XSERR_BASE + 5;
pub const XSERR_BAD_RESOURCE_FORMAT: i32 = XSERR_BASE + 6;
pub const XSERR_BAD_LABEL_FORMAT: i32 = XSERR_BASE + 7;
pub const XSERR_RESOURCE_NOT_LABELED: i32 = XSERR_BASE + 8;
pub const XSERR_RESOURCE_ALREADY_LABELED: i32 = XSERR_BASE + 9;
pub const XSERR_WRONG_POLICY_TYPE: i32 = XSERR_BASE + 10;
pub const XSERR_BOOTPOLICY_INSTALLED: i32 = XSERR_BASE + 11;
pub const XSERR_NO_DEFAULT_BOOT_TITLE: i32 = XSERR_BASE + 12;
pub const XSERR_POLICY_LOAD_FAILED: i32 = XSERR_BASE + 13;
pub const XSERR_POLICY_LOADED: i32 = XSERR_BASE + 14;
pub const XSERR_POLICY_TYPE_UNSUPPORTED: i32 = XSERR_BASE + 15;
pub const XSERR_BAD_CONFLICTSET: i32 = XSERR_BASE + 16;
pub const XSERR_RESOURCE_IN_USE: i32 = XSERR_BASE + 17;
pub const XSERR_BAD_POLICY_NAME: i32 = XSERR_BASE + 18;
pub const XSERR_VERSION_PREVENTS_UPDATE: i32 = XSERR_BASE + 19;
pub const XSERR_BAD_LABEL: i32 = XSERR_BASE + 20;
pub const XSERR_VM_WRONG_STATE: i32 = XSERR_BASE + 21;
pub const XSERR_POLICY_NOT_LOADED: i32 = XSERR_BASE + 22;
pub const XSERR_RESOURCE_ACCESS: i32 = XSERR_BASE + 23;
pub const XSERR_HV_OP_FAILED: i32 = XSERR_BASE + 24;
pub const XSERR_BOOTPOLICY_INSTALL_ERROR: i32 = XSERR_BASE + 25;
pub const XSERR_LAST: i32 = XSERR_BOOTPOLICY_INSTALL_ERROR;

/// Messages for XSERR_GENERAL_FAILURE..=XSERR_LAST, in code order.
const XSERR_MESSAGES: &[&str] = &[
    "General Failure",
    "XML is malformed",
    "Error while processing XML",
    "Policy has inconsistencies",
    "A file access error occurred",
    "The resource format is not valid",
    "The label format is not valid",
    "The resource is not labeled",
    "The resource is already labeled",
    "The policy type is wrong",
    "The boot policy has already been installed",
    "Could not find a default boot title",
    "Loading of the policy failed",
    "The policy has been loaded",
    "The policy type is unsupported",
    "The conflict set is malformed",
    "The resource is in use",
    "The policy name is not valid",
    "The version of the policy prevents an update",
    "The label is not valid",
    "The VM is in the wrong state",
    "The policy is not loaded",
    "The resource can not be accessed",
    "The hypervisor operation failed",
    "An error occurred while installing the boot policy",
];

/// Render a daemon status code as text.
pub fn xserr_to_string(code: i32) -> String {
    let code = code.unsigned_abs();
    if code == 0 {
        return "Success".to_string();
    }
    let index = code.checked_sub(XSERR_GENERAL_FAILURE as u32);
    match index.and_then(|i| XSERR_MESSAGES.get(i as usize)) {
        Some(msg) => msg.to_string(),
        None => format!("Unknown XSERR code '{:#x}'.", code),
    }
}
