//! Request descriptor and per-request client options.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use crate::body::Body;
use crate::error::Error;

/// Transfer progress, in bytes. Totals are zero while unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub download_total: u64,
    pub downloaded: u64,
    pub upload_total: u64,
    pub uploaded: u64,
}

/// Progress callback. Shared so a callback can hand itself to the requests
/// it issues.
pub type ProgressFn = Rc<dyn Fn(Progress)>;

/// libcurl options passed through to the easy handle as-is.
#[derive(Debug, Clone)]
pub enum CurlOption {
    /// `CURLOPT_VERBOSE`.
    Verbose(bool),
    /// Peer and host verification for TLS.
    Verify(bool),
    /// CA bundle path.
    CaInfo(PathBuf),
    /// Client certificate path.
    Cert(PathBuf),
    /// Client private key path.
    SslKey(PathBuf),
    /// Proxy URL.
    Proxy(String),
    UserAgent(String),
    /// Abort when slower than `bytes_per_sec` for `time`.
    LowSpeed { bytes_per_sec: u32, time: Duration },
    HttpVersion(curl::easy::HttpVersion),
}

/// Per-request client options.
#[derive(Clone, Default)]
pub struct ClientOptions {
    /// Total transfer timeout in seconds.
    pub timeout: Option<f64>,
    /// Connect timeout in seconds.
    pub connect_timeout: Option<f64>,
    /// Called as bytes move, in transfer order for this request.
    pub progress: Option<ProgressFn>,
    /// Return a deferred value instead of waiting for the response.
    pub future: bool,
    /// Transport passthrough.
    pub curl: Vec<CurlOption>,
}

impl ClientOptions {
    pub fn timeout(mut self, secs: f64) -> Self {
        self.timeout = Some(secs);
        self
    }

    pub fn connect_timeout(mut self, secs: f64) -> Self {
        self.connect_timeout = Some(secs);
        self
    }

    pub fn progress(mut self, f: impl Fn(Progress) + 'static) -> Self {
        self.progress = Some(Rc::new(f));
        self
    }

    /// Set an already shared progress callback.
    pub fn progress_fn(mut self, f: ProgressFn) -> Self {
        self.progress = Some(f);
        self
    }

    pub fn future(mut self, future: bool) -> Self {
        self.future = future;
        self
    }

    pub fn curl(mut self, option: CurlOption) -> Self {
        self.curl.push(option);
        self
    }

    /// Reject timeouts libcurl cannot express.
    pub fn validate(&self) -> Result<(), Error> {
        for (name, value) in [
            ("timeout", self.timeout),
            ("connect_timeout", self.connect_timeout),
        ] {
            if let Some(secs) = value
                && (!secs.is_finite() || secs < 0.0)
            {
                return Err(Error::InvalidOption(format!(
                    "{name} must be a non-negative number of seconds, got {secs}"
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("progress", &self.progress.is_some())
            .field("future", &self.future)
            .field("curl", &self.curl)
            .finish()
    }
}

/// An HTTP request as handed to the executor.
///
/// `uri` is either a path, resolved against `scheme` and the `host` header,
/// or an absolute `http(s)://` URL.
#[derive(Debug)]
pub struct Request {
    pub method: String,
    pub uri: String,
    pub scheme: String,
    pub query_string: Option<String>,
    pub headers: HashMap<String, Vec<String>>,
    pub body: Body,
    pub client: ClientOptions,
}

impl Request {
    pub fn new(method: &str, uri: &str) -> Self {
        Self {
            method: method.to_string(),
            uri: uri.to_string(),
            scheme: "http".to_string(),
            query_string: None,
            headers: HashMap::new(),
            body: Body::Empty,
            client: ClientOptions::default(),
        }
    }

    /// Build a GET request.
    pub fn get(uri: &str) -> Self {
        Self::new("GET", uri)
    }

    /// Append a header value.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .entry(name.to_string())
            .or_default()
            .push(value.to_string());
        self
    }

    pub fn scheme(mut self, scheme: &str) -> Self {
        self.scheme = scheme.to_string();
        self
    }

    pub fn query(mut self, query: &str) -> Self {
        self.query_string = Some(query.to_string());
        self
    }

    /// Set the request body.
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    pub fn client(mut self, options: ClientOptions) -> Self {
        self.client = options;
        self
    }

    /// First value of the `host` header (case-insensitive).
    pub fn host(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("host"))
            .and_then(|(_, v)| v.first())
            .map(String::as_str)
    }

    /// The URL to hand to libcurl.
    pub fn url(&self) -> Result<String, Error> {
        let mut url = if self.uri.starts_with("http://") || self.uri.starts_with("https://") {
            self.uri.clone()
        } else {
            let host = self.host().ok_or(Error::MissingHost)?;
            let slash = if self.uri.starts_with('/') { "" } else { "/" };
            format!("{}://{}{}{}", self.scheme, host, slash, self.uri)
        };
        if let Some(q) = &self.query_string
            && !q.is_empty()
        {
            url.push('?');
            url.push_str(q);
        }
        Ok(url)
    }
}
