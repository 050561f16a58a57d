//! XML-RPC plumbing shared by both transports
//!
//! Both daemon generations speak XML-RPC; they differ only in how the
//! `methodCall` document travels (HTTP to the Xen-API port, or HTTP/1.0 over
//! xend's Unix socket) and in the shape of their results. A transport hands
//! [`call`] a closure that moves the encoded request to the daemon and brings
//! back the raw response body; parsing and fault handling happen here.

use std::io::Cursor;

use xmlrpc::{Request, Value};

use crate::transport::{Result, TransportError};

/// Content type of every XML-RPC request body.
pub(crate) const CONTENT_TYPE: &str = "text/xml";

/// A response body that has already been fetched.
struct Received(Vec<u8>);

impl xmlrpc::Transport for Received {
    type Stream = Cursor<Vec<u8>>;

    fn transmit(
        self,
        _request: &Request<'_>,
    ) -> std::result::Result<Self::Stream, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Cursor::new(self.0))
    }
}

/// Encode `method(args...)`, send it with `send`, and parse the reply.
///
/// An XML-RPC fault becomes [`TransportError::Fault`]; an unparsable reply
/// becomes [`TransportError::Rpc`].
pub(crate) fn call<F>(method: &str, args: Vec<Value>, send: F) -> Result<Value>
where
    F: FnOnce(Vec<u8>) -> Result<Vec<u8>>,
{
    let request = args
        .into_iter()
        .fold(Request::new(method), |request, arg| request.arg(arg));

    let mut body = Vec::new();
    request
        .write_as_xml(&mut body)
        .map_err(|e| TransportError::Protocol {
            method: method.to_string(),
            detail: format!("could not encode request: {}", e),
        })?;

    let reply = send(body)?;

    request.call(Received(reply)).map_err(|source| {
        if let Some(fault) = source.fault() {
            return TransportError::Fault {
                method: method.to_string(),
                description: vec![format!("fault {}: {}", fault.fault_code, fault.fault_string)],
            };
        }
        TransportError::Rpc {
            method: method.to_string(),
            source,
        }
    })
}

/// Integer that older daemons may send as a decimal string.
pub(crate) fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Int(n) => Some(i64::from(*n)),
        Value::Int64(n) => Some(*n),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Struct member as an integer, 0 when absent.
pub(crate) fn int_member(value: &Value, key: &str) -> Option<i64> {
    match value.get(key) {
        None | Some(Value::Nil) => Some(0),
        Some(v) => as_int(v),
    }
}

/// Struct member as a string, empty when absent.
pub(crate) fn str_member(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

pub(crate) fn protocol(method: &str, detail: impl Into<String>) -> TransportError {
    TransportError::Protocol {
        method: method.to_string(),
        detail: detail.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn respond(xml: &'static str) -> impl FnOnce(Vec<u8>) -> Result<Vec<u8>> {
        move |_| Ok(xml.as_bytes().to_vec())
    }

    #[test]
    fn request_is_a_method_call() {
        let mut sent = String::new();
        call(
            "xend.security.get_policy",
            vec![Value::from("a"), Value::from(7)],
            |body| {
                sent = String::from_utf8(body).unwrap();
                Ok(b"<?xml version=\"1.0\"?><methodResponse><params><param>\
                      <value><int>1</int></value></param></params></methodResponse>"
                    .to_vec())
            },
        )
        .unwrap();

        assert!(sent.contains("<methodCall>"));
        assert!(sent.contains("<methodName>xend.security.get_policy</methodName>"));
        assert!(sent.contains(">a<"));
        assert!(sent.contains(">7<"));
    }

    #[test]
    fn fault_is_reported_with_code_and_text() {
        let err = call(
            "xend.security.set_policy",
            Vec::new(),
            respond(
                "<?xml version=\"1.0\"?><methodResponse><fault><value><struct>\
                 <member><name>faultCode</name><value><int>1</int></value></member>\
                 <member><name>faultString</name><value><string>security module not loaded</string></value></member>\
                 </struct></value></fault></methodResponse>",
            ),
        )
        .unwrap_err();

        assert!(matches!(err, TransportError::Fault { .. }));
        assert_eq!(
            err.to_string(),
            "xend.security.set_policy failed: fault 1: security module not loaded"
        );
    }

    #[test]
    fn garbage_reply_keeps_parse_error() {
        let err = call("m", Vec::new(), respond("{\"result\":0}")).unwrap_err();
        assert!(matches!(err, TransportError::Rpc { .. }));
    }

    #[test]
    fn send_failure_is_passed_through() {
        let err = call("m", Vec::new(), |_| Err(protocol("m", "socket gone"))).unwrap_err();
        assert_eq!(err.to_string(), "unexpected reply to m: socket gone");
    }

    #[test]
    fn integers_may_arrive_as_strings() {
        assert_eq!(as_int(&Value::Int(-4109)), Some(-4109));
        assert_eq!(as_int(&Value::String(" 4120 ".into())), Some(4120));
        assert_eq!(as_int(&Value::Bool(true)), None);
    }
}
