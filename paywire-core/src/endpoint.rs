//! Declarative endpoint registry.
//!
//! Every logical operation the payments API exposes is described once here:
//! its path pattern, method, expected success status and whether it moves
//! money (and therefore must carry an idempotency key). The idempotency
//! policy derives its pattern list from this table, so a new financial
//! endpoint only needs one line.
//!
//! ```rust
//! use paywire_core::endpoint::{EndpointRegistry, HttpMethod};
//!
//! let registry = EndpointRegistry::default();
//! let refund = registry.get("payments.refund").unwrap();
//! assert_eq!(refund.method, HttpMethod::Post);
//! assert!(refund.requires_idempotency_key);
//! assert_eq!(refund.render(Some("pay_123")).unwrap(), "/payments/pay_123/refund");
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Placeholder token allowed (once) in a path pattern.
pub const ID_PLACEHOLDER: &str = "{id}";

/// HTTP method of a registered endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// `GET`
    Get,
    /// `HEAD`
    Head,
    /// `OPTIONS`
    Options,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
}

impl HttpMethod {
    /// Whether a 5xx response may be retried for this method.
    ///
    /// Only GET, HEAD and OPTIONS qualify. Everything else could have been
    /// partially applied upstream.
    #[inline]
    pub const fn is_idempotent(&self) -> bool {
        matches!(self, Self::Get | Self::Head | Self::Options)
    }

    /// Canonical upper-case name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Options => reqwest::Method::OPTIONS,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Immutable description of one API operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointDescriptor {
    /// Logical operation name, e.g. `payments.create`.
    pub name: &'static str,
    /// Path relative to the base URL; may contain one `{id}` placeholder.
    pub path_pattern: &'static str,
    /// HTTP method.
    pub method: HttpMethod,
    /// Status code that signals success.
    pub expected_status: u16,
    /// Whether requests must carry a fresh `x-idempotency-key`.
    pub requires_idempotency_key: bool,
}

impl EndpointDescriptor {
    const fn new(
        name: &'static str,
        method: HttpMethod,
        path_pattern: &'static str,
        expected_status: u16,
        requires_idempotency_key: bool,
    ) -> Self {
        Self {
            name,
            path_pattern,
            method,
            expected_status,
            requires_idempotency_key,
        }
    }

    /// Returns `true` if the pattern carries an `{id}` placeholder.
    pub fn has_placeholder(&self) -> bool {
        self.path_pattern.contains(ID_PLACEHOLDER)
    }

    /// Renders a concrete path, substituting `id` into the placeholder.
    ///
    /// Fails if an id is required but missing, supplied but unused, empty, or
    /// contains a `/`.
    pub fn render(&self, id: Option<&str>) -> Result<String> {
        match (self.has_placeholder(), id) {
            (false, None) => Ok(self.path_pattern.to_string()),
            (false, Some(_)) => Err(Error::invalid_request(format!(
                "endpoint {} takes no id",
                self.name
            ))),
            (true, None) => Err(Error::invalid_request(format!(
                "endpoint {} requires an id",
                self.name
            ))),
            (true, Some(id)) => {
                if id.is_empty() || id.contains('/') || id.contains('?') {
                    return Err(Error::invalid_request(format!(
                        "invalid id for endpoint {}: {id:?}",
                        self.name
                    )));
                }
                Ok(self.path_pattern.replacen(ID_PLACEHOLDER, id, 1))
            }
        }
    }
}

/// Endpoint used for the login handshake.
pub const LOGIN: EndpointDescriptor =
    EndpointDescriptor::new("auth.login", HttpMethod::Post, "/auth/login", 200, false);

/// Every operation the client knows about.
pub static ENDPOINTS: &[EndpointDescriptor] = &[
    LOGIN,
    // payers
    EndpointDescriptor::new("payers.create", HttpMethod::Post, "/payers", 201, false),
    EndpointDescriptor::new("payers.get", HttpMethod::Get, "/payers/{id}", 200, false),
    EndpointDescriptor::new("payers.list", HttpMethod::Get, "/payers", 200, false),
    // payments
    EndpointDescriptor::new("payments.create", HttpMethod::Post, "/payments", 201, true),
    EndpointDescriptor::new("payments.get", HttpMethod::Get, "/payments/{id}", 200, false),
    EndpointDescriptor::new("payments.list", HttpMethod::Get, "/payments", 200, false),
    EndpointDescriptor::new("payments.cancel", HttpMethod::Post, "/payments/{id}/cancel", 200, true),
    EndpointDescriptor::new("payments.refund", HttpMethod::Post, "/payments/{id}/refund", 201, true),
    // card authorizations
    EndpointDescriptor::new("authorizations.create", HttpMethod::Post, "/authorizations", 201, true),
    EndpointDescriptor::new("authorizations.get", HttpMethod::Get, "/authorizations/{id}", 200, false),
    EndpointDescriptor::new("authorizations.capture", HttpMethod::Post, "/authorizations/{id}/capture", 200, true),
    EndpointDescriptor::new("authorizations.void", HttpMethod::Post, "/authorizations/{id}/void", 200, true),
    // transfers
    EndpointDescriptor::new("transfers.create", HttpMethod::Post, "/transfers", 201, true),
    EndpointDescriptor::new("transfers.get", HttpMethod::Get, "/transfers/{id}", 200, false),
    // disputes
    EndpointDescriptor::new("disputes.get", HttpMethod::Get, "/disputes/{id}", 200, false),
    EndpointDescriptor::new("disputes.list", HttpMethod::Get, "/disputes", 200, false),
    EndpointDescriptor::new("disputes.submit", HttpMethod::Post, "/disputes/{id}/submit", 200, true),
    // webhooks
    EndpointDescriptor::new("webhooks.create", HttpMethod::Post, "/webhooks", 201, false),
    EndpointDescriptor::new("webhooks.list", HttpMethod::Get, "/webhooks", 200, false),
    EndpointDescriptor::new("webhooks.delete", HttpMethod::Delete, "/webhooks/{id}", 204, false),
    // balances
    EndpointDescriptor::new("balances.get", HttpMethod::Get, "/balances", 200, false),
];

/// Read-only view over a set of endpoint descriptors.
#[derive(Debug, Clone, Copy)]
pub struct EndpointRegistry {
    endpoints: &'static [EndpointDescriptor],
}

impl Default for EndpointRegistry {
    fn default() -> Self {
        Self::new(ENDPOINTS)
    }
}

impl EndpointRegistry {
    /// Wraps an explicit descriptor list.
    pub const fn new(endpoints: &'static [EndpointDescriptor]) -> Self {
        Self { endpoints }
    }

    /// Looks up a descriptor by logical name.
    pub fn get(&self, name: &str) -> Option<&'static EndpointDescriptor> {
        self.endpoints.iter().find(|e| e.name == name)
    }

    /// Looks up a descriptor, failing with `InvalidRequest` when unknown.
    pub fn require(&self, name: &str) -> Result<&'static EndpointDescriptor> {
        self.get(name)
            .ok_or_else(|| Error::invalid_request(format!("unknown endpoint: {name}")))
    }

    /// Iterates over every descriptor in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &'static EndpointDescriptor> {
        self.endpoints.iter()
    }

    /// Path patterns of every descriptor flagged as financial.
    pub fn financial_patterns(&self) -> impl Iterator<Item = &'static str> {
        self.iter()
            .filter(|e| e.requires_idempotency_key)
            .map(|e| e.path_pattern)
    }

    /// Number of registered endpoints.
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Returns `true` if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}
