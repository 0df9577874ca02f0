//! Minimal HTTP/1.1 registry for integration tests.
//!
//! Serves `GET /api/v1/crates/{name}` as a JSON crate document and
//! `GET /api/v1/crates/{name}/{version}/download` as the archive bytes. Unknown
//! crates or versions get 404. Absolute-form request targets are accepted, so
//! the same server can stand in for a forwarding proxy.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct FakeCrate {
    pub name: String,
    pub version: String,
    pub description: String,
    pub archive: Vec<u8>,
}

impl FakeCrate {
    pub fn new(name: &str, version: &str, archive: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            description: format!("The {name} test crate"),
            archive,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegistryOptions {
    /// Sleep before answering any request.
    pub delay: Option<Duration>,
    /// Served verbatim with 200 for every metadata request.
    pub metadata_body: Option<String>,
}

/// Counters and address of a running server. The server runs until the process exits.
#[derive(Clone)]
pub struct RegistryServer {
    pub base_url: String,
    downloads: Arc<AtomicUsize>,
    metadata: Arc<AtomicUsize>,
    absolute_form: Arc<AtomicUsize>,
    json_accepted: Arc<AtomicUsize>,
}

impl RegistryServer {
    pub fn download_hits(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub fn metadata_hits(&self) -> usize {
        self.metadata.load(Ordering::SeqCst)
    }

    /// Metadata requests that carried `Accept: application/json`.
    pub fn json_metadata_hits(&self) -> usize {
        self.json_accepted.load(Ordering::SeqCst)
    }

    /// Requests that arrived in proxy (absolute-form) style.
    pub fn proxied_hits(&self) -> usize {
        self.absolute_form.load(Ordering::SeqCst)
    }
}

pub fn start(crates: Vec<FakeCrate>) -> RegistryServer {
    start_with_options(crates, RegistryOptions::default())
}

pub fn start_with_options(crates: Vec<FakeCrate>, opts: RegistryOptions) -> RegistryServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let server = RegistryServer {
        base_url: format!("http://127.0.0.1:{}", port),
        downloads: Arc::new(AtomicUsize::new(0)),
        metadata: Arc::new(AtomicUsize::new(0)),
        absolute_form: Arc::new(AtomicUsize::new(0)),
        json_accepted: Arc::new(AtomicUsize::new(0)),
    };
    let crates = Arc::new(crates);
    let shared = server.clone();
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let crates = Arc::clone(&crates);
            let opts = opts.clone();
            let counters = shared.clone();
            thread::spawn(move || handle(stream, &crates, &opts, &counters));
        }
    });
    server
}

/// An address nothing listens on.
pub fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

fn handle(mut stream: TcpStream, crates: &[FakeCrate], opts: &RegistryOptions, counters: &RegistryServer) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let head = match read_head(&mut stream) {
        Some(h) => h,
        None => return,
    };
    let mut parts = head.lines().next().unwrap_or("").split_whitespace();
    let method = parts.next().unwrap_or("");
    let target = parts.next().unwrap_or("");

    let path = match target.strip_prefix("http://") {
        Some(rest) => {
            counters.absolute_form.fetch_add(1, Ordering::SeqCst);
            rest.find('/').map(|i| &rest[i..]).unwrap_or("/")
        }
        None => target,
    };

    if let Some(delay) = opts.delay {
        thread::sleep(delay);
    }

    if !method.eq_ignore_ascii_case("GET") {
        respond(&mut stream, "405 Method Not Allowed", "text/plain", b"");
        return;
    }

    let segments: Vec<&str> = path
        .strip_prefix("/api/v1/crates/")
        .unwrap_or("")
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    match segments.as_slice() {
        [name] => {
            counters.metadata.fetch_add(1, Ordering::SeqCst);
            if accepts_json(&head) {
                counters.json_accepted.fetch_add(1, Ordering::SeqCst);
            }
            if let Some(body) = &opts.metadata_body {
                respond(&mut stream, "200 OK", "application/json", body.as_bytes());
                return;
            }
            match crates.iter().find(|c| c.name == *name) {
                Some(c) => {
                    let body = format!(
                        r#"{{"crate":{{"name":"{}","max_version":"{}","description":"{}"}}}}"#,
                        c.name, c.version, c.description
                    );
                    respond(&mut stream, "200 OK", "application/json", body.as_bytes());
                }
                None => not_found(&mut stream),
            }
        }
        [name, version, "download"] => {
            counters.downloads.fetch_add(1, Ordering::SeqCst);
            match crates
                .iter()
                .find(|c| c.name == *name && c.version == *version)
            {
                Some(c) => respond(&mut stream, "200 OK", "application/gzip", &c.archive),
                None => not_found(&mut stream),
            }
        }
        _ => not_found(&mut stream),
    }
}

fn read_head(stream: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => return None,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
        if buf.len() > 64 * 1024 {
            return None;
        }
    }
    String::from_utf8(buf).ok()
}

fn accepts_json(head: &str) -> bool {
    head.lines().skip(1).any(|line| {
        line.split_once(':').is_some_and(|(name, value)| {
            name.trim().eq_ignore_ascii_case("accept") && value.contains("application/json")
        })
    })
}

fn not_found(stream: &mut TcpStream) {
    respond(
        stream,
        "404 Not Found",
        "application/json",
        br#"{"errors":[{"detail":"Not Found"}]}"#,
    );
}

fn respond(stream: &mut TcpStream, status: &str, content_type: &str, body: &[u8]) {
    let head = format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        content_type,
        body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body);
}
