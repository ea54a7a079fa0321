//! Scripted HTTP/1.1 server for integration tests.
//!
//! Responses are queued ahead of time and served first-in first-out across
//! all connections; an empty queue answers `500`. Every request the server
//! reads is recorded for later inspection.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

/// A request as the server saw it.
#[derive(Debug, Clone)]
pub struct Received {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Received {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Default)]
struct Shared {
    responses: Mutex<VecDeque<String>>,
    received: Mutex<Vec<Received>>,
}

pub struct TestServer {
    host: String,
    shared: Arc<Shared>,
}

impl TestServer {
    /// Bind an ephemeral port on loopback and start accepting.
    pub fn start() -> TestServer {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server");
        let host = listener.local_addr().expect("local addr").to_string();
        let shared = Arc::new(Shared::default());

        let accept_shared = Arc::clone(&shared);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let shared = Arc::clone(&accept_shared);
                thread::spawn(move || serve(stream, &shared));
            }
        });

        TestServer { host, shared }
    }

    /// `127.0.0.1:<port>`, suitable for a `host` header.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn enqueue(&self, responses: impl IntoIterator<Item = String>) {
        self.shared
            .responses
            .lock()
            .unwrap()
            .extend(responses);
    }

    /// Drop queued responses and recorded requests.
    pub fn flush(&self) {
        self.shared.responses.lock().unwrap().clear();
        self.shared.received.lock().unwrap().clear();
    }

    pub fn received(&self) -> Vec<Received> {
        self.shared.received.lock().unwrap().clone()
    }
}

/// A `200 OK` carrying `body`.
pub fn ok(body: &str) -> String {
    response(200, "OK", &[], body)
}

pub fn response(status: u16, reason: &str, headers: &[(&str, &str)], body: &str) -> String {
    let mut out = format!("HTTP/1.1 {status} {reason}\r\n");
    for (name, value) in headers {
        out.push_str(&format!("{name}: {value}\r\n"));
    }
    out.push_str(&format!("Content-Length: {}\r\n\r\n{body}", body.len()));
    out
}

fn serve(stream: TcpStream, shared: &Shared) {
    let Ok(mut writer) = stream.try_clone() else {
        return;
    };
    let mut reader = BufReader::new(stream);
    while let Some(request) = read_request(&mut reader) {
        shared.received.lock().unwrap().push(request);
        let reply = shared
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| response(500, "Internal Server Error", &[], "no response queued"));
        if writer.write_all(reply.as_bytes()).is_err() {
            return;
        }
    }
}

fn read_request(reader: &mut BufReader<TcpStream>) -> Option<Received> {
    let mut line = String::new();
    if reader.read_line(&mut line).ok()? == 0 {
        return None;
    }
    let mut parts = line.trim_end().splitn(3, ' ');
    let method = parts.next()?.to_string();
    let target = parts.next()?.to_string();

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).ok()? == 0 {
            return None;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }

    let len = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = vec![0; len];
    reader.read_exact(&mut body).ok()?;

    Some(Received {
        method,
        target,
        headers,
        body,
    })
}
