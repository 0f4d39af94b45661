//! Shared fixtures for the integration tests: tile archives, a seeded cache
//! and a tiny HTTP server on the loopback interface.

#![allow(dead_code)]

use srtm_engine::{DiskCache, ElevationSource, TileAddress};
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Cursor, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use zip::write::SimpleFileOptions;

/// Build a zipped `.hgt` archive whose sample at `(row, col)` is `f(row, col)`.
pub fn tile_zip(tile: TileAddress, row_size: usize, f: impl Fn(usize, usize) -> i16) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(2 * row_size * row_size);
    for row in 0..row_size {
        for col in 0..row_size {
            bytes.extend_from_slice(&f(row, col).to_be_bytes());
        }
    }
    zip_entry(&format!("{}.hgt", tile.name()), &bytes)
}

/// Wrap raw bytes as the single entry of a zip archive.
pub fn zip_entry(name: &str, bytes: &[u8]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer.start_file(name, SimpleFileOptions::default()).unwrap();
    writer.write_all(bytes).unwrap();
    writer.finish().unwrap().into_inner()
}

/// Put an archive into a source's cache directory.
pub fn seed(source: &dyn ElevationSource, tile: TileAddress, archive: &[u8]) {
    let path = source.cache_file(&tile).unwrap();
    std::fs::write(path, archive).unwrap();
}

/// A fresh cache rooted in a temporary directory.
pub fn temp_cache() -> (tempfile::TempDir, Arc<DiskCache>) {
    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(DiskCache::new(dir.path()));
    (dir, cache)
}

/// Files left in a directory, sorted.
pub fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}

/// A request as seen by [`TestServer`].
#[derive(Debug, Clone)]
pub struct Request {
    pub path: String,
    /// Header names are lower case.
    pub headers: HashMap<String, String>,
}

impl Request {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Host header without the port.
    pub fn host(&self) -> &str {
        self.header("host")
            .and_then(|h| h.rsplit_once(':').map(|(host, _)| host))
            .unwrap_or_default()
    }
}

/// What the server answers.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// Advertised length, when it should differ from the body.
    pub content_length: Option<usize>,
}

impl Reply {
    pub fn ok(body: Vec<u8>) -> Self {
        Self::status(200).with_body(body)
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
            content_length: None,
        }
    }

    pub fn redirect(location: &str) -> Self {
        Self::status(302).with_header("Location", location)
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Advertise more bytes than are sent, then hang up.
    pub fn truncated(mut self, advertised: usize) -> Self {
        self.content_length = Some(advertised);
        self
    }
}

type Handler = dyn Fn(&Request) -> Reply + Send + Sync;

/// A one-thread HTTP/1.1 server answering every request through a handler.
///
/// Each connection serves a single request and is then closed.
pub struct TestServer {
    port: u16,
    requests: Arc<Mutex<Vec<Request>>>,
}

impl TestServer {
    pub fn start(handler: impl Fn(&Request) -> Reply + Send + Sync + 'static) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let log = requests.clone();
        let handler: Arc<Handler> = Arc::new(handler);

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                if let Some(request) = read_request(&stream) {
                    log.lock().unwrap().push(request.clone());
                    let _ = write_reply(stream, &handler(&request));
                }
            }
        });

        Self { port, requests }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// URL on the loopback address.
    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port, path)
    }

    /// URL on `localhost`, which reaches the same server under another host name.
    pub fn localhost_url(&self, path: &str) -> String {
        format!("http://localhost:{}{}", self.port, path)
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }
}

fn read_request(stream: &TcpStream) -> Option<Request> {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader.read_line(&mut line).ok()?;
    let path = line.split_whitespace().nth(1)?.to_string();

    let mut headers = HashMap::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).ok()? == 0 {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }
    Some(Request { path, headers })
}

fn write_reply(mut stream: TcpStream, reply: &Reply) -> std::io::Result<()> {
    let mut head = format!("HTTP/1.1 {} Test\r\n", reply.status);
    for (name, value) in &reply.headers {
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    let length = reply.content_length.unwrap_or(reply.body.len());
    head.push_str(&format!("Content-Length: {}\r\nConnection: close\r\n\r\n", length));
    stream.write_all(head.as_bytes())?;
    stream.write_all(&reply.body)?;
    stream.flush()
}
