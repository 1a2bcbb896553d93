//! Minimal HTTP/1.1 server that supports Range GET for integration tests.
//!
//! Serves a single static body under any path. Every response carries
//! `Connection: close`, so each curl attempt is a new connection and a new
//! request on the counter. Failure modes are driven by that counter.

#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// How long a stalled response stays open without sending anything.
pub const STALL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy)]
pub struct RangeServerOptions {
    /// If false, GET ignores Range and always returns 200 with the full body.
    pub support_ranges: bool,
    /// The first N requests send the headers and half of the body, then close.
    pub cut_first: u32,
    /// The first N requests send the headers and half of the body, then go
    /// silent for `STALL` before closing.
    pub stall_first: u32,
    /// The first N requests are answered with 500.
    pub error_first: u32,
    /// Serve the body with one byte flipped (same length).
    pub corrupt: bool,
    /// Answer every request with 404.
    pub not_found: bool,
}

impl Default for RangeServerOptions {
    fn default() -> Self {
        Self {
            support_ranges: true,
            cut_first: 0,
            stall_first: 0,
            error_first: 0,
            corrupt: false,
            not_found: false,
        }
    }
}

struct Shared {
    body: Vec<u8>,
    opts: RangeServerOptions,
    requests: AtomicU32,
    last_request: Mutex<Vec<String>>,
}

/// Handle to a running server. The server runs until the process exits.
#[derive(Clone)]
pub struct RangeServer {
    base: String,
    shared: Arc<Shared>,
}

impl RangeServer {
    /// URL of `name` on this server (any path serves the same body).
    pub fn url(&self, name: &str) -> String {
        format!("{}{}", self.base, name)
    }

    /// Number of requests received so far.
    pub fn requests(&self) -> u32 {
        self.shared.requests.load(Ordering::SeqCst)
    }

    /// Value of header `name` in the most recent request.
    pub fn last_header(&self, name: &str) -> Option<String> {
        let lines = self.shared.last_request.lock().unwrap();
        lines.iter().skip(1).find_map(|line| {
            let (k, v) = line.split_once(':')?;
            k.trim()
                .eq_ignore_ascii_case(name)
                .then(|| v.trim().to_string())
        })
    }
}

pub fn start(body: Vec<u8>) -> RangeServer {
    start_with_options(body, RangeServerOptions::default())
}

/// Like `start` but allows customizing server behavior (flaky, no ranges, etc.).
pub fn start_with_options(body: Vec<u8>, opts: RangeServerOptions) -> RangeServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let mut body = body;
    if opts.corrupt && !body.is_empty() {
        let mid = body.len() / 2;
        body[mid] ^= 0xff;
    }
    let shared = Arc::new(Shared {
        body,
        opts,
        requests: AtomicU32::new(0),
        last_request: Mutex::new(Vec::new()),
    });
    let server_shared = Arc::clone(&shared);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let shared = Arc::clone(&server_shared);
            thread::spawn(move || handle(stream, &shared));
        }
    });
    RangeServer {
        base: format!("http://127.0.0.1:{}/", port),
        shared,
    }
}

fn handle(mut stream: TcpStream, shared: &Shared) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let lines = match read_request(&mut stream) {
        Some(l) => l,
        None => return,
    };
    let range_start = parse_range_start(&lines);
    *shared.last_request.lock().unwrap() = lines;
    let index = shared.requests.fetch_add(1, Ordering::SeqCst);
    let opts = shared.opts;

    if opts.not_found {
        respond_error(&mut stream, "404 Not Found");
        return;
    }
    if index < opts.error_first {
        respond_error(&mut stream, "500 Internal Server Error");
        return;
    }

    let body = &shared.body[..];
    let total = body.len() as u64;
    let (status, content_range, slice) = match range_start.filter(|_| opts.support_ranges) {
        Some(start) if start >= total => (
            "416 Range Not Satisfiable",
            format!("bytes */{}", total),
            &body[0..0],
        ),
        Some(start) => (
            "206 Partial Content",
            format!("bytes {}-{}/{}", start, total - 1, total),
            &body[start as usize..],
        ),
        None => (
            "200 OK",
            format!("bytes 0-{}/{}", total.saturating_sub(1), total),
            body,
        ),
    };
    let mut head = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n",
        status,
        slice.len()
    );
    if opts.support_ranges {
        head.push_str(&format!(
            "Accept-Ranges: bytes\r\nContent-Range: {}\r\n",
            content_range
        ));
    }
    head.push_str("\r\n");
    let _ = stream.write_all(head.as_bytes());

    if index < opts.stall_first {
        let _ = stream.write_all(&slice[..slice.len() / 2]);
        let _ = stream.flush();
        thread::sleep(STALL);
        return;
    }
    if index < opts.cut_first {
        let _ = stream.write_all(&slice[..slice.len() / 2]);
        let _ = stream.flush();
        let _ = stream.shutdown(Shutdown::Both);
        return;
    }
    let _ = stream.write_all(slice);
    let _ = stream.flush();
}

fn respond_error(stream: &mut TcpStream, status: &str) {
    let body = b"oops";
    let head = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body);
}

/// Reads until the blank line ending the request head. Returns its lines.
fn read_request(stream: &mut TcpStream) -> Option<Vec<String>> {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    while !data.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buf[..n]);
    }
    let text = String::from_utf8_lossy(&data);
    let head = text.split("\r\n\r\n").next().unwrap_or("");
    Some(head.lines().map(|l| l.trim().to_string()).collect())
}

/// Start offset of `Range: bytes=N-` (or `bytes=N-M`; the end is ignored).
fn parse_range_start(lines: &[String]) -> Option<u64> {
    lines.iter().skip(1).find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if !name.trim().eq_ignore_ascii_case("range") {
            return None;
        }
        let bytes = value.trim().strip_prefix("bytes=")?;
        let (start, _) = bytes.split_once('-')?;
        start.trim().parse().ok()
    })
}
