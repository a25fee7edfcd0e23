//! Minimal HTTP/1.1 server for integration tests.
//!
//! Routes:
//! - `/file/<anything>` serves the static body with 200.
//! - `/flaky/<anything>` answers 503 for the first `flaky_failures` hits, then serves the body.
//! - `/slow` sends headers and then trickles the body for a few seconds.
//! - anything else is 404.
//!
//! Every request path is counted so tests can assert how many attempts reached the server.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct ServerOptions {
    /// Number of 503 responses a `/flaky/...` path returns before succeeding.
    pub flaky_failures: usize,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self { flaky_failures: 2 }
    }
}

pub struct TestServer {
    base: String,
    hits: Arc<Mutex<HashMap<String, usize>>>,
}

impl TestServer {
    /// Absolute URL for `path` (leading slash optional).
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path.trim_start_matches('/'))
    }

    /// How many requests have been received for `path`.
    pub fn hits(&self, path: &str) -> usize {
        let path = format!("/{}", path.trim_start_matches('/'));
        self.hits.lock().unwrap().get(&path).copied().unwrap_or(0)
    }
}

/// Starts a server in a background thread serving `body`. Runs until the process exits.
pub fn start(body: Vec<u8>) -> TestServer {
    start_with_options(body, ServerOptions::default())
}

pub fn start_with_options(body: Vec<u8>, opts: ServerOptions) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body);
    let hits: Arc<Mutex<HashMap<String, usize>>> = Arc::new(Mutex::new(HashMap::new()));
    let server_hits = Arc::clone(&hits);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            let hits = Arc::clone(&server_hits);
            thread::spawn(move || handle(stream, &body, &hits, opts));
        }
    });
    TestServer {
        base: format!("http://127.0.0.1:{}/", port),
        hits,
    }
}

fn handle(
    mut stream: TcpStream,
    body: &[u8],
    hits: &Mutex<HashMap<String, usize>>,
    opts: ServerOptions,
) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) => return,
        Ok(n) => n,
        Err(_) => return,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let (method, path) = parse_request_line(request);
    if !method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        return;
    }

    let seen = {
        let mut hits = hits.lock().unwrap();
        let count = hits.entry(path.to_string()).or_insert(0);
        *count += 1;
        *count
    };

    if path.starts_with("/file/") {
        respond(&mut stream, "200 OK", body);
    } else if path.starts_with("/flaky/") {
        if seen <= opts.flaky_failures {
            respond(&mut stream, "503 Service Unavailable", b"try again");
        } else {
            respond(&mut stream, "200 OK", body);
        }
    } else if path == "/slow" {
        trickle(&mut stream);
    } else {
        respond(&mut stream, "404 Not Found", b"not found");
    }
}

fn respond(stream: &mut TcpStream, status: &str, payload: &[u8]) {
    let head = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        payload.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(payload);
}

/// Announces 1 MiB and sends a few bytes every 50 ms, for about five seconds.
fn trickle(stream: &mut TcpStream) {
    let head = "HTTP/1.1 200 OK\r\nContent-Length: 1048576\r\nConnection: close\r\n\r\n";
    if stream.write_all(head.as_bytes()).is_err() {
        return;
    }
    for _ in 0..100 {
        if stream.write_all(&[b'x'; 16]).is_err() {
            return;
        }
        thread::sleep(Duration::from_millis(50));
    }
}

/// Returns (method, path) from the request line.
fn parse_request_line(request: &str) -> (&str, &str) {
    let line = request.lines().next().unwrap_or("");
    let mut parts = line.split_whitespace();
    let method = parts.next().unwrap_or("");
    let path = parts.next().unwrap_or("/");
    (method, path)
}
