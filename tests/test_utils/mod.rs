//! Shared helpers for the integration tests: a scripted mock ingestion
//! server and polling utilities.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

/// One scripted response from the mock server.
#[derive(Clone, Debug)]
pub struct MockResponse {
    pub status: u16,
    pub retry_after: Option<u64>,
    pub body: Option<String>,
}

impl MockResponse {
    pub fn status(status: u16) -> Self {
        Self {
            status,
            retry_after: None,
            body: None,
        }
    }

    /// A 202 whose body reports `count` accepted records.
    pub fn accepted(count: u64) -> Self {
        Self {
            status: 202,
            retry_after: None,
            body: Some(format!(
                "{{\"accepted\":{count},\"rejected\":0,\"errors\":[]}}"
            )),
        }
    }

    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after = Some(seconds);
        self
    }
}

fn status_text(code: u16) -> &'static str {
    match code {
        200 => "OK",
        202 => "Accepted",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

/// A request the mock server received, stamped with its arrival instant.
#[derive(Debug)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub received_at: Instant,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_lowercase();
        self.headers
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Records carried in the `{"logs": [...]}` payload.
    pub fn logs(&self) -> Vec<serde_json::Value> {
        let parsed: serde_json::Value = serde_json::from_str(&self.body).expect("parse body");
        parsed["logs"].as_array().cloned().unwrap_or_default()
    }

    /// The `message` field of every carried record, in wire order.
    pub fn messages(&self) -> Vec<String> {
        self.logs()
            .iter()
            .map(|log| log["message"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

fn parse_header_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    line.split_once(':')
        .map(|(key, value)| (key.trim().to_lowercase(), value.trim().to_string()))
}

fn read_http_request(stream: &mut TcpStream) -> Option<CapturedRequest> {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));

    let mut request_line = String::new();
    reader.read_line(&mut request_line).ok()?;
    let mut parts = request_line.trim().split(' ');
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();

    let mut headers = Vec::new();
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).ok()?;
        if line.trim().is_empty() {
            break;
        }
        let Some((key, value)) = parse_header_line(&line) else {
            continue;
        };
        if key == "content-length" {
            content_length = value.parse().unwrap_or(0);
        }
        headers.push((key, value));
    }

    let mut body = vec![0u8; content_length];
    if content_length > 0 {
        reader.read_exact(&mut body).ok()?;
    }

    Some(CapturedRequest {
        method,
        path,
        headers,
        body: String::from_utf8_lossy(&body).to_string(),
        received_at: Instant::now(),
    })
}

fn write_response(stream: &mut TcpStream, response: &MockResponse) {
    let body = response.body.as_deref().unwrap_or("");
    let mut head = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n",
        response.status,
        status_text(response.status),
        body.len()
    );
    if let Some(seconds) = response.retry_after {
        head.push_str(&format!("Retry-After: {seconds}\r\n"));
    }
    head.push_str("\r\n");
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body.as_bytes());
}

pub fn bind_listener() -> TcpListener {
    TcpListener::bind(("127.0.0.1", 0)).expect("bind ephemeral listener")
}

/// Spawn a server that answers with the scripted responses in order and
/// keeps repeating the final one once the script is exhausted.
///
/// Every captured request is forwarded on the returned channel.
pub fn spawn_script_server(
    listener: TcpListener,
    script: Vec<MockResponse>,
) -> (SocketAddr, mpsc::Receiver<CapturedRequest>) {
    assert!(!script.is_empty(), "script must hold at least one response");
    let addr = listener.local_addr().expect("listener has address");
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let mut responses = script.into_iter();
        let mut current = responses.next().expect("non-empty script");
        loop {
            let Ok((mut stream, _)) = listener.accept() else {
                break;
            };
            let Some(captured) = read_http_request(&mut stream) else {
                continue;
            };
            write_response(&mut stream, &current);
            if tx.send(captured).is_err() {
                break;
            }
            if let Some(next) = responses.next() {
                current = next;
            }
        }
    });

    (addr, rx)
}

/// Poll `condition` every 20 ms until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    condition()
}
