use crate::error::{ApiErrorDetails, Error, NetworkError, Result};
use bytes::{Bytes, BytesMut};
use chrono::Utc;
use reqwest::Response;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::builder::HttpClient;

const BODY_PREVIEW_SIZE: usize = 200;

/// A fully buffered HTTP response.
///
/// Non-success statuses are not errors at this level; callers decide.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HeaderMap,
    /// Raw response body.
    pub body: Bytes,
}

impl ApiResponse {
    /// Returns `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decodes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Body as (lossy) UTF-8 text.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Returns a header value as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Delay requested by a `Retry-After` header, if present and parsable.
    pub fn retry_after(&self) -> Option<Duration> {
        self.headers
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| crate::time::parse_retry_after(v, Utc::now()))
    }

    /// Converts the response into an [`Error::Api`] for `method` and `path`.
    pub fn into_api_error(self, method: &str, path: &str) -> Error {
        Error::Api(Box::new(ApiErrorDetails::from_body(
            method,
            path,
            self.status,
            &self.body,
        )))
    }
}

impl HttpClient {
    #[instrument(
        name = "http_read_response_with_limit",
        skip(self, response),
        fields(status = response.status().as_u16())
    )]
    pub(crate) async fn read_response_with_limit(&self, response: Response) -> Result<ApiResponse> {
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let max_size = self.config().max_response_size;

        if let Some(content_length) = response.content_length()
            && content_length > max_size as u64
        {
            warn!(
                content_length = content_length,
                max_size = max_size,
                "Response exceeds size limit (Content-Length check)"
            );
            #[allow(clippy::cast_possible_truncation)]
            return Err(NetworkError::ResponseTooLarge {
                actual: content_length as usize,
                limit: max_size,
            }
            .into());
        }

        let body = Self::stream_response_with_limit(response, max_size).await?;

        let preview_len = body.len().min(BODY_PREVIEW_SIZE);
        debug!(
            status = status,
            body_length = body.len(),
            body_preview = %String::from_utf8_lossy(&body[..preview_len]),
            "HTTP response received"
        );

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }

    async fn stream_response_with_limit(response: Response, max_size: usize) -> Result<Bytes> {
        use futures_util::StreamExt;

        #[allow(clippy::cast_possible_truncation)]
        let initial_capacity = response
            .content_length()
            .map_or(8 * 1024, |len| std::cmp::min(len as usize, max_size));

        let mut stream = response.bytes_stream();
        let mut body = BytesMut::with_capacity(initial_capacity);

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                warn!(error = %e, "Failed to read response chunk");
                Error::from(NetworkError::from(e))
            })?;

            let accumulated = body.len().saturating_add(chunk.len());
            if accumulated > max_size {
                warn!(
                    accumulated_size = accumulated,
                    max_size = max_size,
                    "Response exceeds size limit during streaming"
                );
                return Err(NetworkError::ResponseTooLarge {
                    actual: accumulated,
                    limit: max_size,
                }
                .into());
            }
            body.extend_from_slice(&chunk);
        }

        Ok(body.freeze())
    }
}
