//! Detail structure for upstream status errors.

use serde::Deserialize;
use serde_json::Value;

/// Details of a non-success HTTP response.
///
/// Boxed inside [`Error::Api`](super::Error::Api) to keep the enum small.
///
/// ```rust
/// use paywire_core::error::ApiErrorDetails;
///
/// let details = ApiErrorDetails::new("POST", "/payments", 422, "amount must be positive");
/// assert_eq!(details.status, 422);
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ApiErrorDetails {
    /// HTTP method of the failed call.
    pub method: String,
    /// Request path (without base URL).
    pub path: String,
    /// HTTP status returned by the upstream.
    pub status: u16,
    /// Upstream error code, when the body carried one.
    pub code: Option<String>,
    /// Human readable message derived from the body.
    pub message: String,
    /// Field-level validation errors, when present.
    pub errors: Vec<FieldError>,
    /// Raw response body (truncated), for diagnostics.
    pub body: Option<String>,
}

/// One field-level validation error from an upstream error body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FieldError {
    /// Offending field, when the upstream names one.
    #[serde(default)]
    pub field: Option<String>,
    /// Message for that field.
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<Value>,
    #[serde(default, alias = "error")]
    message: Option<String>,
    #[serde(default)]
    errors: Vec<FieldError>,
}

impl ApiErrorDetails {
    /// Creates details with only a message.
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        status: u16,
        message: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            status,
            code: None,
            message: message.into(),
            errors: Vec::new(),
            body: None,
        }
    }

    /// Builds details from a raw error body.
    ///
    /// Accepts `{code, message, errors}` JSON; anything else becomes the
    /// message verbatim (empty bodies fall back to the status line).
    pub fn from_body(
        method: impl Into<String>,
        path: impl Into<String>,
        status: u16,
        body: &[u8],
    ) -> Self {
        let raw = String::from_utf8_lossy(body).into_owned();
        let mut details = Self::new(method, path, status, String::new());

        match serde_json::from_slice::<ErrorBody>(body) {
            Ok(parsed) => {
                details.code = parsed.code.map(|c| match c {
                    Value::String(s) => s,
                    other => other.to_string(),
                });
                details.message = parsed.message.unwrap_or_default();
                details.errors = parsed.errors;
            }
            Err(_) => details.message = raw.trim().to_string(),
        }

        if details.message.is_empty() {
            details.message = reqwest::StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("unexpected status")
                .to_string();
        }
        details.message = super::truncate_message(details.message);
        if !raw.is_empty() {
            details.body = Some(super::truncate_message(raw));
        }
        details
    }
}

impl std::fmt::Display for ApiErrorDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} returned {}: {}",
            self.method, self.path, self.status, self.message
        )?;
        if let Some(code) = &self.code {
            write!(f, " (code: {code})")?;
        }
        Ok(())
    }
}
