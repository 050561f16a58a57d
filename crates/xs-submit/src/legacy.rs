//! Legacy xend transport: XML-RPC over the daemon's Unix socket
//!
//! xend serves the same XML-RPC framing it uses on TCP over
//! `/var/run/xend/xmlrpc.sock`. Each call opens a connection, sends one
//! HTTP/1.0 `POST /RPC2` carrying the `methodCall`, and reads until the
//! daemon closes the connection.
//!
//! `xend.security.set_policy` returns a two-element array `[rc, errors]`.
//! Unlike the Xen-API, `errors` is the hypervisor report itself (an XML-RPC
//! binary value); there is no base64 text layer on this path.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use xmlrpc::Value;
use xs_policy::{ActivePolicy, InstallFlags, PolicySubmission, SubmissionOutcome};

use crate::rpc::{self, as_int, int_member, protocol, str_member};
use crate::transport::{PolicyTransport, Result, TransportError};

const SET_POLICY: &str = "xend.security.set_policy";
const GET_POLICY: &str = "xend.security.get_policy";

/// Request path xend's XML-RPC handler answers on.
const RPC_PATH: &str = "/RPC2";

/// Transport for daemons that only speak the legacy security calls.
pub struct LegacyTransport {
    socket: PathBuf,
}

impl LegacyTransport {
    pub fn new(socket: impl AsRef<Path>) -> Self {
        Self {
            socket: socket.as_ref().to_path_buf(),
        }
    }

    fn endpoint(&self) -> String {
        self.socket.display().to_string()
    }

    fn io_error(&self, source: std::io::Error) -> TransportError {
        TransportError::Io {
            endpoint: self.endpoint(),
            source,
        }
    }

    fn call(&self, method: &str, args: Vec<Value>) -> Result<Value> {
        tracing::debug!("LegacyTransport: calling {} on {}", method, self.endpoint());
        rpc::call(method, args, |body| self.exchange(method, &body))
    }

    /// One HTTP/1.0 request/response over a fresh connection.
    fn exchange(&self, method: &str, body: &[u8]) -> Result<Vec<u8>> {
        let head = format!(
            "POST {} HTTP/1.0\r\nHost: localhost\r\nUser-Agent: xs/{}\r\n\
             Content-Type: {}\r\nContent-Length: {}\r\n\r\n",
            RPC_PATH,
            env!("CARGO_PKG_VERSION"),
            rpc::CONTENT_TYPE,
            body.len()
        );

        let mut stream = connect(&self.socket).map_err(|e| self.io_error(e))?;
        stream
            .write_all(head.as_bytes())
            .map_err(|e| self.io_error(e))?;
        stream.write_all(body).map_err(|e| self.io_error(e))?;
        stream.flush().map_err(|e| self.io_error(e))?;

        let mut response = Vec::new();
        stream
            .read_to_end(&mut response)
            .map_err(|e| self.io_error(e))?;

        response_body(method, response)
    }
}

/// Strip the HTTP response head, checking the status and honouring
/// `Content-Length` when present.
fn response_body(method: &str, mut response: Vec<u8>) -> Result<Vec<u8>> {
    if response.is_empty() {
        return Err(protocol(method, "daemon closed the connection without replying"));
    }

    let mut headers = [httparse::EMPTY_HEADER; 32];
    let mut parsed = httparse::Response::new(&mut headers);
    let head_len = match parsed.parse(&response) {
        Ok(httparse::Status::Complete(len)) => len,
        Ok(httparse::Status::Partial) => {
            return Err(protocol(method, "truncated HTTP response header"))
        }
        Err(e) => return Err(protocol(method, format!("invalid HTTP response: {}", e))),
    };

    match parsed.code {
        Some(200) => {}
        code => {
            return Err(protocol(
                method,
                format!(
                    "HTTP status {} {}",
                    code.unwrap_or_default(),
                    parsed.reason.unwrap_or_default()
                ),
            ))
        }
    }

    let content_length = parsed
        .headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case("content-length"))
        .and_then(|h| std::str::from_utf8(h.value).ok())
        .and_then(|v| v.trim().parse::<usize>().ok());

    let mut body = response.split_off(head_len);
    if let Some(len) = content_length {
        if body.len() < len {
            return Err(protocol(
                method,
                format!("response body has {} of {} bytes", body.len(), len),
            ));
        }
        body.truncate(len);
    }
    Ok(body)
}

#[cfg(unix)]
fn connect(path: &Path) -> std::io::Result<std::os::unix::net::UnixStream> {
    std::os::unix::net::UnixStream::connect(path)
}

#[cfg(not(unix))]
fn connect(_path: &Path) -> std::io::Result<std::net::TcpStream> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "the legacy xend socket is only available on Unix",
    ))
}

/// Parse the `[rc, errors]` pair returned by `xend.security.set_policy`.
fn parse_set_result(value: &Value) -> Result<SubmissionOutcome> {
    let pair = match value {
        Value::Array(items) if items.len() == 2 => items,
        other => {
            return Err(protocol(
                SET_POLICY,
                format!("expected [rc, errors], got {:?}", other),
            ))
        }
    };

    let status = as_int(&pair[0])
        .and_then(|n| i32::try_from(n).ok())
        .ok_or_else(|| protocol(SET_POLICY, format!("invalid rc {:?}", pair[0])))?;

    let errors = match &pair[1] {
        Value::Base64(bytes) => bytes.clone(),
        // xend sends an empty string when there is nothing to report.
        Value::String(s) => s.as_bytes().to_vec(),
        Value::Nil => Vec::new(),
        other => {
            return Err(protocol(
                SET_POLICY,
                format!("'errors' is not binary: {:?}", other),
            ))
        }
    };

    Ok(SubmissionOutcome {
        status,
        errors: Some(errors),
    })
}

/// Map the struct returned by `xend.security.get_policy`.
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
    let xml = str_member(value, "xml");

    Ok(ActivePolicy {
        policy_type,
        name,
        version: str_member(value, "version"),
        reference: str_member(value, "ref"),
        flags: InstallFlags::from_bits(flags),
        xml: Some(xml).filter(|x| !x.is_empty()),
    })
}

impl PolicyTransport for LegacyTransport {
    fn set_policy(&self, submission: &PolicySubmission) -> Result<SubmissionOutcome> {
        let xml = std::str::from_utf8(&submission.xml)?;

        tracing::info!(
            "LegacyTransport: submitting {} policy ({} bytes)",
            submission.policy_type,
            submission.xml.len()
        );

        let value = self.call(
            SET_POLICY,
            vec![
                Value::Int(submission.policy_type.xs_type() as i32),
                Value::from(xml),
                Value::Int(submission.flags.bits() as i32),
                Value::Bool(submission.overwrite),
            ],
        )?;
        parse_set_result(&value)
    }

    fn get_policy(&self) -> Result<ActivePolicy> {
        let value = self.call(GET_POLICY, Vec::new())?;
        parse_policy_record(&value)
    }

    fn name(&self) -> &str {
        "legacy"
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::os::unix::net::UnixListener;
    use std::thread;
    use tempfile::tempdir;
    use xs_policy::PolicyType;

    /// Wrap one XML-RPC value in an HTTP/1.0 methodResponse.
    fn http_reply(value: &str) -> String {
        let body = format!(
            "<?xml version=\"1.0\"?><methodResponse><params><param>{}</param></params></methodResponse>",
            value
        );
        format!(
            "HTTP/1.0 200 OK\r\nContent-Type: text/xml\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        )
    }

    /// Accept one connection, return the request (head and body), answer with `reply`.
    fn serve_once(listener: UnixListener, reply: String) -> thread::JoinHandle<String> {
        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);

            let mut request = String::new();
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                request.push_str(&line);
                let line = line.trim_end();
                if line.is_empty() {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap();
                    }
                }
            }
            let mut body = vec![0u8; content_length];
            reader.read_exact(&mut body).unwrap();
            request.push_str(&String::from_utf8(body).unwrap());

            let mut stream = reader.into_inner();
            stream.write_all(reply.as_bytes()).unwrap();
            request
        })
    }

    fn submission() -> PolicySubmission {
        PolicySubmission {
            policy_type: PolicyType::Acm,
            xml: b"<SecurityPolicyDefinition/>".to_vec(),
            flags: InstallFlags::LOAD | InstallFlags::BOOT,
            overwrite: true,
        }
    }

    #[test]
    fn set_policy_returns_raw_error_bytes() {
        let dir = tempdir().unwrap();
        let socket = dir.path().join("xmlrpc.sock");
        // AAABAgAAAAc= is 0x102 / 7.
        let server = serve_once(
            UnixListener::bind(&socket).unwrap(),
            http_reply(
                "<value><array><data><value><int>4120</int></value>\
                 <value><base64>AAABAgAAAAc=</base64></value></data></array></value>",
            ),
        );

        let outcome = LegacyTransport::new(&socket)
            .set_policy(&submission())
            .unwrap();
        assert_eq!(outcome.status, 4120);
        assert_eq!(outcome.error_blob(), Some(&[0u8, 0, 1, 2, 0, 0, 0, 7][..]));

        let request = server.join().unwrap();
        assert!(request.starts_with("POST /RPC2 HTTP/1.0\r\n"));
        assert!(request.contains("Content-Type: text/xml"));
        assert!(request.contains("<methodName>xend.security.set_policy</methodName>"));
        assert!(request.contains("SecurityPolicyDefinition"));
    }

    #[test]
    fn fault_reply_is_a_transport_error() {
        let dir = tempdir().unwrap();
        let socket = dir.path().join("xmlrpc.sock");
        let body = "<?xml version=\"1.0\"?><methodResponse><fault><value><struct>\
                    <member><name>faultCode</name><value><int>1</int></value></member>\
                    <member><name>faultString</name><value><string>security module not loaded</string></value></member>\
                    </struct></value></fault></methodResponse>";
        let server = serve_once(
            UnixListener::bind(&socket).unwrap(),
            format!(
                "HTTP/1.0 200 OK\r\nContent-Length: {}\r\n\r\n{}",
                body.len(),
                body
            ),
        );

        let err = LegacyTransport::new(&socket)
            .set_policy(&submission())
            .unwrap_err();
        server.join().unwrap();
        assert!(matches!(err, TransportError::Fault { .. }));
        assert!(err.to_string().contains("security module not loaded"));
    }

    #[test]
    fn get_policy_reads_record() {
        let dir = tempdir().unwrap();
        let socket = dir.path().join("xmlrpc.sock");
        let server = serve_once(
            UnixListener::bind(&socket).unwrap(),
            http_reply(
                "<value><struct>\
                 <member><name>type</name><value><int>1</int></value></member>\
                 <member><name>name</name><value><string>example.chwall</string></value></member>\
                 <member><name>version</name><value><string>1.0</string></value></member>\
                 <member><name>flags</name><value><int>3</int></value></member>\
                 </struct></value>",
            ),
        );

        let policy = LegacyTransport::new(&socket).get_policy().unwrap();
        server.join().unwrap();
        assert_eq!(policy.name, "example.chwall");
        assert_eq!(policy.flags, InstallFlags::LOAD | InstallFlags::BOOT);
    }

    #[test]
    fn missing_socket_is_an_io_error() {
        let dir = tempdir().unwrap();
        let err = LegacyTransport::new(dir.path().join("absent.sock"))
            .get_policy()
            .unwrap_err();
        assert!(matches!(err, TransportError::Io { .. }));
    }

    #[test]
    fn non_200_status_is_a_protocol_error() {
        let err = response_body(
            GET_POLICY,
            b"HTTP/1.0 404 Not Found\r\nContent-Length: 0\r\n\r\n".to_vec(),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "unexpected reply to xend.security.get_policy: HTTP status 404 Not Found"
        );
    }

    #[test]
    fn body_is_cut_at_content_length() {
        let body =
            response_body(GET_POLICY, b"HTTP/1.0 200 OK\r\nContent-Length: 3\r\n\r\nabcdef".to_vec())
                .unwrap();
        assert_eq!(body, b"abc");
    }

    #[test]
    fn set_result_must_be_a_pair() {
        let err = parse_set_result(&Value::Int(0)).unwrap_err();
        assert!(matches!(err, TransportError::Protocol { .. }));

        let outcome =
            parse_set_result(&Value::Array(vec![Value::Int(0), Value::from("")])).unwrap();
        assert!(outcome.is_success());
        assert!(outcome.error_blob().is_none());
    }
}
