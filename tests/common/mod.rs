#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::net::TcpListener;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use speakleash::transport::{Fetched, Transport, TransportError};
use speakleash::{Config, Speakleash, SpeakleashOptions};

pub const BASE_URL: &str = "https://mirror.test/datasets_text/";

pub fn catalog_url() -> String {
    format!("{BASE_URL}speakleash.json")
}

pub fn archive_url(name: &str) -> String {
    format!("{BASE_URL}{name}.jsonl.zst")
}

/// How a registered URL misbehaves.
#[derive(Clone, Copy, Debug, Default)]
pub enum Fault {
    #[default]
    None,
    /// Serve only the first `n` bytes while announcing the full length.
    Truncate(usize),
}

/// In-memory transport that counts every fetch per URL.
#[derive(Default)]
pub struct MemoryTransport {
    bodies: Mutex<HashMap<String, (Vec<u8>, Fault)>>,
    calls: Mutex<HashMap<String, usize>>,
    total: AtomicUsize,
    delay: Mutex<Option<Duration>>,
}

impl MemoryTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn serve(&self, url: &str, body: Vec<u8>) {
        self.serve_with(url, body, Fault::None);
    }

    pub fn serve_with(&self, url: &str, body: Vec<u8>, fault: Fault) {
        self.bodies
            .lock()
            .unwrap()
            .insert(url.to_string(), (body, fault));
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

impl Transport for MemoryTransport {
    fn fetch(&self, url: &str) -> Result<Fetched, TransportError> {
        self.total.fetch_add(1, Ordering::SeqCst);
        *self.calls.lock().unwrap().entry(url.to_string()).or_default() += 1;

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        let (body, fault) = self
            .bodies
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| TransportError::new(url, "http status: 404"))?;
        let announced = body.len() as u64;
        let body = match fault {
            Fault::None => body,
            Fault::Truncate(n) => body[..n.min(body.len())].to_vec(),
        };
        Ok(Fetched::new(Cursor::new(body), Some(announced)))
    }
}

/// Builds a zstd-compressed JSONL archive from raw lines.
pub fn archive_from_lines<S: AsRef<str>>(lines: &[S]) -> Vec<u8> {
    let mut body = String::new();
    for line in lines {
        body.push_str(line.as_ref());
        body.push('\n');
    }
    zstd::encode_all(body.as_bytes(), 3).expect("compress archive")
}

/// Builds an archive of `count` well-formed documents.
pub fn archive_of(count: usize) -> Vec<u8> {
    let lines: Vec<String> = (0..count)
        .map(|i| {
            json!({
                "text": format!("Dokument numer {i}."),
                "meta": {"title": format!("Tytuł {i}"), "words": 3, "sentences": 1}
            })
            .to_string()
        })
        .collect();
    archive_from_lines(&lines)
}

/// Catalog entry for a dataset served by [`MemoryTransport`].
pub fn entry(name: &str, documents: u64, archive: &[u8]) -> Value {
    json!({
        "name": name,
        "file_size": archive.len(),
        "stats": {"documents": documents, "characters": documents * 5000},
        "description": format!("{name} corpus"),
        "license": "CC-BY",
    })
}

pub fn serve_catalog(transport: &MemoryTransport, entries: Vec<Value>) {
    transport.serve(&catalog_url(), Value::Array(entries).to_string().into_bytes());
}

pub fn config() -> Config {
    Config::default().with_base_url("pl", BASE_URL)
}

pub fn open(dir: &Path, transport: &Arc<MemoryTransport>) -> Result<Speakleash, speakleash::SpeakleashError> {
    let transport: Arc<dyn Transport> = transport.clone();
    Speakleash::with_options(
        dir,
        SpeakleashOptions::default()
            .with_config(config())
            .with_transport(transport),
    )
}

/// Serves `body` once over loopback HTTP, one byte every `pause`.
///
/// Returns the URL to fetch it from.
pub fn trickle_server(body: Vec<u8>, pause: Duration) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let mut request = Vec::new();
        let mut byte = [0u8; 1];
        while !request.ends_with(b"\r\n\r\n") {
            match stream.read(&mut byte) {
                Ok(0) | Err(_) => return,
                Ok(_) => request.push(byte[0]),
            }
        }
        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );
        stream.write_all(head.as_bytes()).expect("write head");
        stream.flush().expect("flush");
        for byte in &body {
            std::thread::sleep(pause);
            stream.write_all(&[*byte]).expect("write body");
            stream.flush().expect("flush");
        }
    });
    format!("http://{addr}/archive.jsonl.zst")
}
