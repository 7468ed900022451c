//! Idempotency-key policy for financial operations.
//!
//! The set of paths that must carry an `x-idempotency-key` is derived from
//! the [`EndpointRegistry`] the first time it is needed and cached for the
//! lifetime of the policy.

use crate::endpoint::{EndpointRegistry, ID_PLACEHOLDER};
use rand::RngCore;
use std::sync::OnceLock;

/// Header carrying the idempotency key.
pub const IDEMPOTENCY_KEY_HEADER: &str = "x-idempotency-key";

/// Number of random bytes in a key (hex-encoded to twice as many chars).
pub const KEY_BYTES: usize = 16;

/// A registered financial path, split around its placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PathPattern {
    Exact(&'static str),
    Placeholder {
        prefix: &'static str,
        suffix: &'static str,
    },
}

impl PathPattern {
    fn parse(pattern: &'static str) -> Self {
        match pattern.split_once(ID_PLACEHOLDER) {
            Some((prefix, suffix)) => Self::Placeholder { prefix, suffix },
            None => Self::Exact(pattern),
        }
    }

    fn matches(&self, path: &str) -> bool {
        match self {
            Self::Exact(pattern) => path == *pattern,
            Self::Placeholder { prefix, suffix } => {
                if path.len() <= prefix.len() + suffix.len() {
                    return false;
                }
                match path
                    .strip_prefix(prefix)
                    .and_then(|rest| rest.strip_suffix(suffix))
                {
                    Some(segment) => !segment.is_empty() && !segment.contains('/'),
                    None => false,
                }
            }
        }
    }
}

/// Decides which outgoing requests receive a fresh idempotency key.
#[derive(Debug)]
pub struct IdempotencyPolicy {
    registry: EndpointRegistry,
    patterns: OnceLock<Vec<PathPattern>>,
}

impl Default for IdempotencyPolicy {
    fn default() -> Self {
        Self::new(EndpointRegistry::default())
    }
}

impl IdempotencyPolicy {
    /// Creates a policy backed by `registry`. Patterns are built lazily.
    pub fn new(registry: EndpointRegistry) -> Self {
        Self {
            registry,
            patterns: OnceLock::new(),
        }
    }

    fn patterns(&self) -> &[PathPattern] {
        self.patterns.get_or_init(|| {
            let patterns: Vec<_> = self
                .registry
                .financial_patterns()
                .map(PathPattern::parse)
                .collect();
            tracing::debug!(count = patterns.len(), "Built idempotency path patterns");
            patterns
        })
    }

    /// Returns `true` if `path` targets an operation that moves money.
    ///
    /// Any query string is ignored.
    ///
    /// ```rust
    /// use paywire_core::idempotency::IdempotencyPolicy;
    ///
    /// let policy = IdempotencyPolicy::default();
    /// assert!(policy.is_financial_operation("/disputes/abc123/submit"));
    /// assert!(!policy.is_financial_operation("/disputes//submit"));
    /// assert!(!policy.is_financial_operation("/disputes/ab/cd/submit"));
    /// assert!(policy.is_financial_operation("/payments?expand=payer"));
    /// ```
    pub fn is_financial_operation(&self, path: &str) -> bool {
        let path = path.split_once('?').map_or(path, |(p, _)| p);
        self.patterns().iter().any(|p| p.matches(path))
    }

    /// Returns a fresh key for `path` when the policy requires one.
    pub fn key_for(&self, path: &str) -> Option<String> {
        self.is_financial_operation(path).then(generate_key)
    }
}

/// Generates a new idempotency key: 16 random bytes, lower-case hex.
///
/// ```rust
/// let key = paywire_core::idempotency::generate_key();
/// assert_eq!(key.len(), 32);
/// assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
/// ```
pub fn generate_key() -> String {
    let mut bytes = [0u8; KEY_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
