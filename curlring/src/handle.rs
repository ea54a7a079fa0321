//! Reusable transfer handle.
//!
//! A `TransferHandle` owns one libcurl easy handle plus the [`Collector`]
//! that receives its callbacks. Handles outlive requests: the pool hands the
//! same easy handle to many transfers so connections and DNS caches carry
//! over. Everything request-specific lives in the collector and the easy
//! handle's options, and both are wiped before the next use.

use std::io::{Read, SeekFrom};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use curl::easy::{Easy2, Handler, List, ReadError, SeekResult, WriteError};
use tracing::trace;

use crate::body::Body;
use crate::error::{Error, TransportError};
use crate::request::{CurlOption, Progress, ProgressFn, Request};
use crate::response::{HeaderBlock, Response, TransferStats};

enum Upload {
    None,
    Bytes { data: Bytes, pos: usize },
    Reader(Box<dyn Read>),
}

/// Per-request callback state for one easy handle.
pub(crate) struct Collector {
    id: u64,
    headers: HeaderBlock,
    body: BytesMut,
    upload: Upload,
    progress: Option<ProgressFn>,
}

impl Collector {
    fn new(id: u64) -> Self {
        Self {
            id,
            headers: HeaderBlock::default(),
            body: BytesMut::new(),
            upload: Upload::None,
            progress: None,
        }
    }

    /// Drop everything a previous request left behind, closures included.
    fn clear(&mut self) {
        self.headers.clear();
        self.body = BytesMut::new();
        self.upload = Upload::None;
        self.progress = None;
    }
}

impl Handler for Collector {
    fn write(&mut self, data: &[u8]) -> Result<usize, WriteError> {
        self.body.extend_from_slice(data);
        Ok(data.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ReadError> {
        match &mut self.upload {
            Upload::None => Ok(0),
            Upload::Bytes { data, pos } => {
                let n = buf.len().min(data.len() - *pos);
                buf[..n].copy_from_slice(&data[*pos..*pos + n]);
                *pos += n;
                Ok(n)
            }
            Upload::Reader(reader) => reader.read(buf).map_err(|_| ReadError::Abort),
        }
    }

    fn seek(&mut self, whence: SeekFrom) -> SeekResult {
        match (&mut self.upload, whence) {
            (Upload::Bytes { data, pos }, SeekFrom::Start(offset))
                if offset as usize <= data.len() =>
            {
                *pos = offset as usize;
                SeekResult::Ok
            }
            _ => SeekResult::CantSeek,
        }
    }

    fn header(&mut self, data: &[u8]) -> bool {
        self.headers.push_line(data);
        true
    }

    fn progress(&mut self, dltotal: f64, dlnow: f64, ultotal: f64, ulnow: f64) -> bool {
        if let Some(progress) = self.progress.clone() {
            progress(Progress {
                download_total: dltotal as u64,
                downloaded: dlnow as u64,
                upload_total: ultotal as u64,
                uploaded: ulnow as u64,
            });
        }
        true
    }
}

/// One reusable libcurl transfer.
pub struct TransferHandle {
    easy: Easy2<Collector>,
}

impl TransferHandle {
    pub(crate) fn new(id: u64) -> Self {
        Self {
            easy: Easy2::new(Collector::new(id)),
        }
    }

    pub(crate) fn from_easy(easy: Easy2<Collector>) -> Self {
        Self { easy }
    }

    pub(crate) fn into_easy(self) -> Easy2<Collector> {
        self.easy
    }

    /// Stable identity of the underlying easy handle.
    pub fn id(&self) -> u64 {
        self.easy.get_ref().id
    }

    /// Reset the easy handle and drop per-request state.
    pub(crate) fn clear(&mut self) {
        self.easy.reset();
        self.easy.get_mut().clear();
    }

    /// Apply `request` to the handle, clearing whatever a previous request
    /// configured first.
    pub fn configure(&mut self, request: Request) -> Result<(), Error> {
        self.clear();
        request.client.validate()?;
        let url = request.url()?;
        trace!(handle = self.id(), method = %request.method, %url, "configure");

        let easy = &mut self.easy;
        easy.url(&url)?;
        easy.signal(false)?;

        let has_body = !request.body.is_empty();
        let method = request.method.to_ascii_uppercase();
        match method.as_str() {
            "GET" if !has_body => easy.get(true)?,
            "HEAD" => easy.nobody(true)?,
            "POST" if !has_body => {
                easy.post(true)?;
                easy.post_field_size(0)?;
            }
            _ => {}
        }

        let mut headers = List::new();
        let mut has_expect = false;
        for (name, values) in &request.headers {
            has_expect |= name.eq_ignore_ascii_case("expect");
            for value in values {
                if value.is_empty() {
                    headers.append(&format!("{name};"))?;
                } else {
                    headers.append(&format!("{name}: {value}"))?;
                }
            }
        }

        if has_body {
            // Uploading switches libcurl to PUT; the custom request below
            // restores the real method.
            easy.upload(true)?;
            if let Some(len) = request.body.len() {
                easy.in_filesize(len)?;
            }
            if !has_expect {
                headers.append("Expect:")?;
            }
            easy.get_mut().upload = match request.body {
                Body::Empty => Upload::None,
                Body::Bytes(data) => Upload::Bytes { data, pos: 0 },
                Body::Reader { reader, .. } => Upload::Reader(reader),
            };
        }
        if has_body || !matches!(method.as_str(), "GET" | "HEAD" | "POST") {
            easy.custom_request(&method)?;
        }
        easy.http_headers(headers)?;

        if let Some(secs) = request.client.timeout {
            easy.timeout(millis(secs))?;
        }
        if let Some(secs) = request.client.connect_timeout {
            easy.connect_timeout(millis(secs))?;
        }

        if let Some(progress) = request.client.progress {
            easy.progress(true)?;
            easy.get_mut().progress = Some(progress);
        }

        for option in request.client.curl {
            apply(easy, option)?;
        }
        Ok(())
    }

    /// Turn libcurl's result for this transfer into a response.
    pub fn complete(&mut self, result: Result<(), curl::Error>) -> Response {
        let stats = self.stats();
        let status = match result.and_then(|()| self.easy.response_code()) {
            Ok(status) => status,
            Err(e) => {
                let error = TransportError::from(&e).with_stats(stats.clone());
                return Response::failed(error, Some(stats));
            }
        };
        let collector = self.easy.get_mut();
        let (reason, headers) = collector.headers.take();
        let body = collector.body.split().freeze();
        Response::new(status, reason, headers, body, Some(stats))
    }

    fn stats(&mut self) -> TransferStats {
        let easy = &mut self.easy;
        TransferStats {
            effective_url: easy.effective_url().ok().flatten().map(str::to_string),
            primary_ip: easy.primary_ip().ok().flatten().map(str::to_string),
            total_time: easy.total_time().unwrap_or_default(),
            namelookup_time: easy.namelookup_time().unwrap_or_default(),
            connect_time: easy.connect_time().unwrap_or_default(),
            starttransfer_time: easy.starttransfer_time().unwrap_or_default(),
            downloaded: easy.download_size().map(|n| n as u64).unwrap_or_default(),
            uploaded: easy.upload_size().map(|n| n as u64).unwrap_or_default(),
        }
    }
}

/// Seconds to a libcurl timeout. Anything positive waits at least 1ms, since
/// libcurl reads 0 as "no timeout".
fn millis(secs: f64) -> Duration {
    if secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::from_millis(((secs * 1000.0).ceil() as u64).max(1))
}

fn apply(easy: &mut Easy2<Collector>, option: CurlOption) -> Result<(), curl::Error> {
    match option {
        CurlOption::Verbose(on) => easy.verbose(on),
        CurlOption::Verify(on) => {
            easy.ssl_verify_peer(on)?;
            easy.ssl_verify_host(on)
        }
        CurlOption::CaInfo(path) => easy.cainfo(path),
        CurlOption::Cert(path) => easy.ssl_cert(path),
        CurlOption::SslKey(path) => easy.ssl_key(path),
        CurlOption::Proxy(url) => easy.proxy(&url),
        CurlOption::UserAgent(agent) => easy.useragent(&agent),
        CurlOption::LowSpeed {
            bytes_per_sec,
            time,
        } => {
            easy.low_speed_limit(bytes_per_sec)?;
            easy.low_speed_time(time)
        }
        CurlOption::HttpVersion(version) => easy.http_version(version),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::ClientOptions;

    #[test]
    fn millis_rounds_up() {
        assert_eq!(millis(0.001), Duration::from_millis(1));
        assert_eq!(millis(0.0001), Duration::from_millis(1));
        assert_eq!(millis(1.5), Duration::from_millis(1500));
        assert_eq!(millis(0.0), Duration::ZERO);
    }

    #[test]
    fn configure_requires_host() {
        let mut handle = TransferHandle::new(1);
        assert!(matches!(
            handle.configure(Request::get("/")),
            Err(Error::MissingHost)
        ));
    }

    #[test]
    fn clear_drops_progress_closure() {
        let mut handle = TransferHandle::new(1);
        let request = Request::get("/")
            .header("host", "localhost")
            .body("payload")
            .client(ClientOptions::default().progress(|_| {}));
        handle.configure(request).unwrap();
        assert!(handle.easy.get_ref().progress.is_some());
        assert!(matches!(handle.easy.get_ref().upload, Upload::Bytes { .. }));

        handle.clear();
        assert!(handle.easy.get_ref().progress.is_none());
        assert!(matches!(handle.easy.get_ref().upload, Upload::None));
        assert_eq!(handle.id(), 1);
    }

    #[test]
    fn bytes_upload_reads_and_rewinds() {
        let mut collector = Collector::new(1);
        collector.upload = Upload::Bytes {
            data: Bytes::from_static(b"hello"),
            pos: 0,
        };
        let mut buf = [0u8; 3];
        assert_eq!(collector.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf, b"hel");
        assert_eq!(collector.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"lo");
        assert_eq!(collector.read(&mut buf).unwrap(), 0);
        assert!(matches!(collector.seek(SeekFrom::Start(0)), SeekResult::Ok));
        assert_eq!(collector.read(&mut buf).unwrap(), 3);
    }

    #[test]
    fn progress_is_forwarded() {
        use std::cell::Cell;
        use std::rc::Rc;

        let seen = Rc::new(Cell::new(Progress::default()));
        let mut collector = Collector::new(1);
        collector.progress = Some(Rc::new({
            let seen = seen.clone();
            move |p| seen.set(p)
        }));
        assert!(collector.progress(10.0, 4.0, 0.0, 0.0));
        assert_eq!(seen.get().download_total, 10);
        assert_eq!(seen.get().downloaded, 4);
    }

    #[test]
    fn failure_yields_error_response() {
        let mut handle = TransferHandle::new(1);
        let resp = handle.complete(Err(curl::Error::new(7)));
        assert_eq!(resp.status(), None);
        assert!(resp.headers().is_empty());
        assert_eq!(resp.error().map(|e| e.code()), Some(7));
        assert!(resp.error().unwrap().to_string().starts_with("cURL error 7: "));
        // Stats ride along on the error so a rejected promise keeps them.
        assert!(resp.transfer_stats().is_some());
        assert_eq!(
            resp.error().and_then(|e| e.transfer_stats()),
            resp.transfer_stats()
        );
    }
}
