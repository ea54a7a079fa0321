use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;

use crate::error::TransportError;

/// Timing and size figures reported by libcurl for one transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferStats {
    pub effective_url: Option<String>,
    pub primary_ip: Option<String>,
    pub total_time: Duration,
    pub namelookup_time: Duration,
    pub connect_time: Duration,
    pub starttransfer_time: Duration,
    pub downloaded: u64,
    pub uploaded: u64,
}

/// HTTP response.
///
/// A transport failure yields a response with no status, no reason, an empty
/// header map and [`error`](Response::error) set.
#[derive(Debug, Clone)]
pub struct Response {
    status: Option<u32>,
    reason: Option<String>,
    headers: HashMap<String, Vec<String>>,
    body: Bytes,
    error: Option<TransportError>,
    transfer_stats: Option<TransferStats>,
}

impl Response {
    pub(crate) fn new(
        status: u32,
        reason: Option<String>,
        headers: HashMap<String, Vec<String>>,
        body: Bytes,
        transfer_stats: Option<TransferStats>,
    ) -> Self {
        Self {
            status: Some(status),
            reason,
            headers,
            body,
            error: None,
            transfer_stats,
        }
    }

    pub(crate) fn failed(error: TransportError, transfer_stats: Option<TransferStats>) -> Self {
        Self {
            status: None,
            reason: None,
            headers: HashMap::new(),
            body: Bytes::new(),
            error: Some(error),
            transfer_stats,
        }
    }

    /// HTTP status code, `None` when the transfer failed.
    pub fn status(&self) -> Option<u32> {
        self.status
    }

    /// Reason phrase from the status line, if the server sent one.
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Response headers, name to values in arrival order.
    pub fn headers(&self) -> &HashMap<String, Vec<String>> {
        &self.headers
    }

    /// Get the first header value matching `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .and_then(|(_, v)| v.first())
            .map(String::as_str)
    }

    /// Reference to the body bytes without consuming.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Consume the response and return the body bytes.
    pub fn bytes(self) -> Bytes {
        self.body
    }

    /// The body as UTF-8 text, if it is valid UTF-8.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    /// The transport failure, if the transfer did not complete.
    pub fn error(&self) -> Option<&TransportError> {
        self.error.as_ref()
    }

    pub fn transfer_stats(&self) -> Option<&TransferStats> {
        self.transfer_stats.as_ref()
    }
}

/// Accumulates raw header lines from libcurl's header callback.
///
/// Every status line starts a new block, so interim `1xx` responses are
/// dropped and only the final block survives.
#[derive(Debug, Default)]
pub(crate) struct HeaderBlock {
    pub(crate) reason: Option<String>,
    pub(crate) headers: HashMap<String, Vec<String>>,
}

impl HeaderBlock {
    pub(crate) fn clear(&mut self) {
        self.reason = None;
        self.headers.clear();
    }

    pub(crate) fn push_line(&mut self, raw: &[u8]) {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return;
        }

        if line.starts_with("HTTP/") {
            self.clear();
            let mut parts = line.splitn(3, ' ');
            let _version = parts.next();
            let _code = parts.next();
            self.reason = parts
                .next()
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string);
            return;
        }

        if let Some((name, value)) = line.split_once(':') {
            self.headers
                .entry(name.trim().to_string())
                .or_default()
                .push(value.trim().to_string());
        }
    }

    pub(crate) fn take(&mut self) -> (Option<String>, HashMap<String, Vec<String>>) {
        (self.reason.take(), std::mem::take(&mut self.headers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_status_and_headers() {
        let mut block = HeaderBlock::default();
        block.push_line(b"HTTP/1.1 200 OK\r\n");
        block.push_line(b"Content-Length: 4\r\n");
        block.push_line(b"X-Foo: a\r\n");
        block.push_line(b"X-Foo: b\r\n");
        block.push_line(b"\r\n");
        let (reason, headers) = block.take();
        assert_eq!(reason.as_deref(), Some("OK"));
        assert_eq!(headers["Content-Length"], vec!["4"]);
        assert_eq!(headers["X-Foo"], vec!["a", "b"]);
    }

    #[test]
    fn interim_block_is_discarded() {
        let mut block = HeaderBlock::default();
        block.push_line(b"HTTP/1.1 100 Continue\r\n");
        block.push_line(b"X-Interim: yes\r\n");
        block.push_line(b"\r\n");
        block.push_line(b"HTTP/1.1 404 Not Found\r\n");
        block.push_line(b"Content-Length: 0\r\n");
        let (reason, headers) = block.take();
        assert_eq!(reason.as_deref(), Some("Not Found"));
        assert!(!headers.contains_key("X-Interim"));
    }

    #[test]
    fn http2_status_line_has_no_reason() {
        let mut block = HeaderBlock::default();
        block.push_line(b"HTTP/2 204\r\n");
        assert_eq!(block.reason, None);
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), vec!["text/plain".to_string()]);
        let resp = Response::new(200, Some("OK".into()), headers, Bytes::from("hi"), None);
        assert_eq!(resp.header("content-type"), Some("text/plain"));
        assert_eq!(resp.text(), Some("hi"));
        assert!(resp.error().is_none());
    }

    #[test]
    fn failed_response_shape() {
        let resp = Response::failed(TransportError::new(7, "refused"), None);
        assert_eq!(resp.status(), None);
        assert_eq!(resp.reason(), None);
        assert!(resp.headers().is_empty());
        assert_eq!(resp.error().map(|e| e.code()), Some(7));
    }
}
