use crate::endpoint::HttpMethod;
use crate::error::{Error, NetworkError, Result};
use bytes::Bytes;
use futures_util::TryStream;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use url::Url;

use super::builder::HttpClient;
use super::headers::redacted_headers;
use super::response::ApiResponse;

/// Source of a request body for each attempt.
///
/// `Bytes` can be re-sent any number of times. A `Stream` body is handed to
/// the first attempt and cannot be replayed; a retry of such a request fails
/// with [`Error::InvalidRequest`] instead of sending an empty body.
#[derive(Default)]
pub enum RequestBody {
    /// No body.
    #[default]
    Empty,
    /// Buffered body, replayed on every attempt.
    Bytes(Bytes),
    /// One-shot streaming body.
    Stream(Mutex<Option<reqwest::Body>>),
}

impl RequestBody {
    /// Serializes `value` as JSON into a replayable body.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        let bytes = serde_json::to_vec(value)
            .map_err(|e| Error::invalid_request(format!("JSON serialization failed: {e}")))?;
        Ok(Self::Bytes(Bytes::from(bytes)))
    }

    /// Wraps a byte stream as a one-shot body.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: TryStream + Send + 'static,
        S::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
        Bytes: From<S::Ok>,
    {
        Self::Stream(Mutex::new(Some(reqwest::Body::wrap_stream(stream))))
    }

    /// Returns `true` if the body can be sent more than once.
    pub fn is_replayable(&self) -> bool {
        !matches!(self, Self::Stream(_))
    }

    /// Size in bytes when known up front.
    pub fn len(&self) -> Option<usize> {
        match self {
            Self::Empty => Some(0),
            Self::Bytes(bytes) => Some(bytes.len()),
            Self::Stream(_) => None,
        }
    }

    /// Returns `true` for [`RequestBody::Empty`].
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Produces the body for the next attempt.
    pub(crate) fn for_attempt(&self) -> Result<Option<reqwest::Body>> {
        match self {
            Self::Empty => Ok(None),
            Self::Bytes(bytes) => Ok(Some(reqwest::Body::from(bytes.clone()))),
            Self::Stream(slot) => slot.lock().take().map(Some).ok_or_else(|| {
                Error::invalid_request("request body is a consumed stream and cannot be replayed")
            }),
        }
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            Self::Stream(_) => f.write_str("Stream"),
        }
    }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(bytes))
    }
}

/// A fully formed request, ready for the retry loop.
#[derive(Debug)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Absolute request URL.
    pub url: Url,
    /// Headers sent on every attempt.
    pub headers: HeaderMap,
    /// Body and its replay source.
    pub body: RequestBody,
}

impl HttpRequest {
    /// Creates a request without headers or body.
    pub fn new(method: HttpMethod, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
        }
    }

    /// Adds a header. Invalid header values are rejected.
    pub fn header(mut self, name: HeaderName, value: &str) -> Result<Self> {
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::invalid_request(format!("Invalid value for header {name}: {e}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Adds a header whose value must never be logged.
    pub fn sensitive_header(mut self, name: HeaderName, value: &str) -> Result<Self> {
        let mut value = HeaderValue::from_str(value)
            .map_err(|e| Error::invalid_request(format!("Invalid value for header {name}: {e}")))?;
        value.set_sensitive(true);
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Sets the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = body.into();
        self
    }

    /// Path plus query, as recorded on the request spans.
    pub fn path(&self) -> String {
        match self.url.query() {
            Some(query) => format!("{}?{query}", self.url.path()),
            None => self.url.path().to_string(),
        }
    }
}

impl HttpClient {
    /// Performs exactly one round-trip and buffers the response body.
    ///
    /// Holds a per-host connection permit until the body has been read, and
    /// races the whole exchange against `cancel`.
    #[instrument(
        name = "http_send_once",
        skip(self, request, cancel),
        fields(method = %request.method, path = %request.path())
    )]
    pub async fn send_once(
        &self,
        request: &HttpRequest,
        cancel: &CancellationToken,
    ) -> Result<ApiResponse> {
        if let Some(len) = request.body.len()
            && len > self.config().max_request_size
        {
            return Err(Error::invalid_request(format!(
                "Request body {len} bytes exceeds limit {} bytes",
                self.config().max_request_size
            )));
        }

        let mut builder = self
            .client()
            .request(request.method.into(), request.url.clone())
            .headers(request.headers.clone());
        if let Some(body) = request.body.for_attempt()? {
            builder = builder.body(body);
        }

        debug!(
            headers = ?redacted_headers(&request.headers),
            body = ?request.body,
            "Sending HTTP request"
        );

        let exchange = async {
            let _permit = self
                .connection_limit()
                .acquire()
                .await
                .map_err(|_| Error::network("connection limiter closed"))?;
            let response = builder.send().await.map_err(|e| {
                warn!(error = %e, "HTTP request send failed");
                Error::from(NetworkError::from(e))
            })?;
            self.read_response_with_limit(response).await
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::cancelled("request cancelled by caller")),
            result = exchange => result,
        }
    }
}
