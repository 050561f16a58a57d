//! Xen-API transport: session-based XML-RPC calls over HTTP
//!
//! Every call is an XML-RPC `methodCall` POSTed to the daemon's Xen-API
//! port. The single return value is the Xen-API result envelope, a struct of
//! one of two shapes:
//!
//! ```text
//! {Status: "Success", Value: ...}
//! {Status: "Failure", ErrorDescription: ["SESSION_INVALID", ...]}
//! ```
//!
//! The hypervisor error report inside `XSPolicy.set_xspolicy`'s result is
//! base64 text on this generation; it is decoded here so callers only ever
//! see raw record bytes.

use std::cell::OnceCell;

use base64::Engine;
use reqwest::header::CONTENT_TYPE;
use xmlrpc::Value;
use xs_policy::{ActivePolicy, InstallFlags, PolicySubmission, SubmissionOutcome};

use crate::config::XenApiConfig;
use crate::rpc::{self, as_int, int_member, protocol, str_member};
use crate::transport::{PolicyTransport, Result, TransportError};

const LOGIN: &str = "session.login_with_password";
const SET_POLICY: &str = "XSPolicy.set_xspolicy";
const GET_POLICY: &str = "XSPolicy.get_xspolicy";

/// Transport for daemons that expose the Xen-API.
pub struct XenApiTransport {
    url: String,
    username: String,
    password: String,
    client: reqwest::blocking::Client,
    /// Session reference, obtained on first use.
    session: OnceCell<String>,
}

impl XenApiTransport {
    pub fn new(config: &XenApiConfig) -> Result<Self> {
        // The daemon is a management endpoint: no proxies, and no timeout at
        // this layer. A call blocks until the daemon answers or the connection fails.
        let client = reqwest::blocking::Client::builder()
            .no_proxy()
            .timeout(None::<std::time::Duration>)
            .build()
            .map_err(|source| TransportError::Http {
                endpoint: config.url.clone(),
                source,
            })?;

        Ok(Self {
            url: config.url.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            client,
            session: OnceCell::new(),
        })
    }

    fn http_error(&self, source: reqwest::Error) -> TransportError {
        TransportError::Http {
            endpoint: self.url.clone(),
            source,
        }
    }

    /// POST one encoded call and return the response body.
    fn post(&self, body: Vec<u8>) -> Result<Vec<u8>> {
        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, rpc::CONTENT_TYPE)
            .body(body)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| self.http_error(e))?;

        let body = response.bytes().map_err(|e| self.http_error(e))?;
        Ok(body.to_vec())
    }

    /// Perform one call and unwrap the result envelope.
    fn call(&self, method: &str, args: Vec<Value>) -> Result<Value> {
        tracing::debug!("XenApiTransport: calling {}", method);
        let envelope = rpc::call(method, args, |body| self.post(body))?;
        unwrap_envelope(method, envelope)
    }

    fn session(&self) -> Result<String> {
        if let Some(session) = self.session.get() {
            return Ok(session.clone());
        }

        let value = self.call(
            LOGIN,
            vec![
                Value::from(self.username.as_str()),
                Value::from(self.password.as_str()),
            ],
        )?;
        let session = value
            .as_str()
            .ok_or_else(|| protocol(LOGIN, format!("expected a session reference, got {:?}", value)))?
            .to_string();

        tracing::info!("XenApiTransport: logged in as {}", self.username);
        Ok(self.session.get_or_init(|| session).clone())
    }
}

impl PolicyTransport for XenApiTransport {
    fn set_policy(&self, submission: &PolicySubmission) -> Result<SubmissionOutcome> {
        let session = self.session()?;
        let xml = std::str::from_utf8(&submission.xml)?;

        tracing::info!(
            "XenApiTransport: submitting {} policy ({} bytes)",
            submission.policy_type,
            submission.xml.len()
        );

        let value = self.call(
            SET_POLICY,
            vec![
                Value::from(session),
                Value::Int(submission.policy_type.xs_type() as i32),
                Value::from(xml),
                Value::Int(submission.flags.bits() as i32),
                Value::Bool(submission.overwrite),
            ],
        )?;
        parse_set_result(&value)
    }

    fn get_policy(&self) -> Result<ActivePolicy> {
        let session = self.session()?;
        let value = self.call(GET_POLICY, vec![Value::from(session)])?;
        parse_policy_record(&value)
    }

    fn name(&self) -> &str {
        "xen-api"
    }
}

/// Unwrap the Xen-API `{Status, Value | ErrorDescription}` envelope.
fn unwrap_envelope(method: &str, envelope: Value) -> Result<Value> {
    let mut members = match envelope {
        Value::Struct(members) => members,
        other => {
            return Err(protocol(method, format!("expected a result struct, got {:?}", other)))
        }
    };

    match members.get("Status").and_then(Value::as_str) {
        Some("Success") => Ok(members.remove("Value").unwrap_or(Value::Nil)),
        Some(_) => {
            let description = match members.get("ErrorDescription") {
                Some(Value::Array(items)) => items.iter().map(describe).collect(),
                _ => Vec::new(),
            };
            Err(TransportError::Fault {
                method: method.to_string(),
                description,
            })
        }
        None => Err(protocol(method, "result struct has no 'Status'")),
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Int(n) => n.to_string(),
        Value::Int64(n) => n.to_string(),
        other => format!("{:?}", other),
    }
}

/// Parse the `{xserr, errors}` struct returned by `XSPolicy.set_xspolicy`.
pub(crate) fn parse_set_result(value: &Value) -> Result<SubmissionOutcome> {
    let status = value
        .get("xserr")
        .and_then(as_int)
        .and_then(|n| i32::try_from(n).ok())
        .ok_or_else(|| protocol(SET_POLICY, format!("missing or invalid 'xserr' in {:?}", value)))?;

    let errors = match value.get("errors") {
        None | Some(Value::Nil) => None,
        Some(Value::String(encoded)) => Some(
            base64::engine::general_purpose::STANDARD.decode(encoded.trim().as_bytes())?,
        ),
        Some(other) => {
            return Err(protocol(SET_POLICY, format!("'errors' is not a string: {:?}", other)))
        }
    };

    Ok(SubmissionOutcome { status, errors })
}

/// Map the record returned by `XSPolicy.get_xspolicy`.
fn parse_policy_record(value: &Value) -> Result<ActivePolicy> {
    let invalid = |field: &str| protocol(GET_POLICY, format!("missing or invalid '{}'", field));

    let policy_type = value
        .get("type")
        .and_then(as_int)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| invalid("type"))?;
    let name = value
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("name"))?
        .to_string();
    let flags = int_member(value, "flags")
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| invalid("flags"))?;
    let repr = str_member(value, "repr");

    Ok(ActivePolicy {
        policy_type,
        name,
        version: str_member(value, "version"),
        reference: str_member(value, "xs_ref"),
        flags: InstallFlags::from_bits(flags),
        xml: Some(repr).filter(|r| !r.is_empty()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn record(members: Vec<(&str, Value)>) -> Value {
        Value::Struct(
            members
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    #[test]
    fn success_result_has_no_errors() {
        let outcome = parse_set_result(&record(vec![
            ("xserr", Value::Int(0)),
            ("errors", Value::from("")),
        ]))
        .unwrap();
        assert!(outcome.is_success());
        assert!(outcome.error_blob().is_none());
    }

    #[test]
    fn errors_field_is_base64_decoded() {
        // 0x102 / 7 and 0x103 / 0x00010002
        let raw = [
            0u8, 0, 1, 2, 0, 0, 0, 7, 0, 0, 1, 3, 0, 1, 0, 2,
        ];
        let encoded = base64::engine::general_purpose::STANDARD.encode(raw);
        let outcome = parse_set_result(&record(vec![
            ("xserr", Value::from("-4120")),
            ("errors", Value::from(encoded)),
        ]))
        .unwrap();

        assert_eq!(outcome.status, -4120);
        assert_eq!(outcome.errors.as_deref(), Some(&raw[..]));
    }

    #[test]
    fn bad_base64_is_a_transport_error() {
        let err = parse_set_result(&record(vec![
            ("xserr", Value::Int(4097)),
            ("errors", Value::from("not base64!")),
        ]))
        .unwrap_err();
        assert!(matches!(err, TransportError::Base64(_)));
    }

    #[test]
    fn missing_status_is_a_protocol_error() {
        let err = parse_set_result(&record(vec![("errors", Value::from(""))])).unwrap_err();
        assert!(matches!(err, TransportError::Protocol { .. }));
    }

    #[test]
    fn failure_envelope_becomes_fault() {
        let envelope = record(vec![
            ("Status", Value::from("Failure")),
            (
                "ErrorDescription",
                Value::Array(vec![
                    Value::from("SESSION_AUTHENTICATION_FAILED"),
                    Value::from("root"),
                    Value::Int(1),
                ]),
            ),
        ]);
        let err = unwrap_envelope(LOGIN, envelope).unwrap_err();
        assert_eq!(
            err.to_string(),
            "session.login_with_password failed: SESSION_AUTHENTICATION_FAILED, root, 1"
        );
    }

    #[test]
    fn success_envelope_yields_value() {
        let envelope = record(vec![
            ("Status", Value::from("Success")),
            ("Value", Value::from("OpaqueRef:abc")),
        ]);
        let value = unwrap_envelope(LOGIN, envelope).unwrap();
        assert_eq!(value.as_str(), Some("OpaqueRef:abc"));
    }

    #[test]
    fn bare_value_is_not_an_envelope() {
        let err = unwrap_envelope(LOGIN, Value::Int(0)).unwrap_err();
        assert!(matches!(err, TransportError::Protocol { .. }));
    }

    #[test]
    fn policy_record_maps_to_active_policy() {
        let policy = parse_policy_record(&record(vec![
            ("type", Value::Int(1)),
            ("name", Value::from("example.chwall")),
            ("version", Value::from("1.0")),
            ("xs_ref", Value::from("OpaqueRef:abc")),
            ("flags", Value::Int(3)),
            ("repr", Value::from("")),
        ]))
        .unwrap();

        assert_eq!(policy.name, "example.chwall");
        assert_eq!(policy.reference, "OpaqueRef:abc");
        assert_eq!(policy.flags, InstallFlags::LOAD | InstallFlags::BOOT);
        assert!(policy.xml.is_none());
    }
}
