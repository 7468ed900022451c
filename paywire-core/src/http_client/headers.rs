use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName};
use serde_json::Value;

/// Pinned API version.
pub const X_API_VERSION: HeaderName = HeaderName::from_static("x-api-version");
/// Client identifier sent at login.
pub const X_CLIENT_ID: HeaderName = HeaderName::from_static("x-client-id");
/// Long-lived API key sent at login.
pub const X_API_KEY: HeaderName = HeaderName::from_static("x-api-key");
/// Optional account selector sent at login.
pub const X_LOGIN_AS: HeaderName = HeaderName::from_static("x-login-as");
/// Idempotency key for financial operations.
pub const X_IDEMPOTENCY_KEY: HeaderName =
    HeaderName::from_static(crate::idempotency::IDEMPOTENCY_KEY_HEADER);

/// Renders headers as JSON for debug logs, masking credentials.
pub(crate) fn redacted_headers(headers: &HeaderMap) -> Value {
    let mut map = serde_json::Map::new();
    for (key, value) in headers {
        let shown = if value.is_sensitive() || *key == AUTHORIZATION || *key == X_API_KEY {
            "[REDACTED]".to_string()
        } else {
            value.to_str().unwrap_or("").to_string()
        };
        map.insert(key.as_str().to_string(), Value::String(shown));
    }
    Value::Object(map)
}
