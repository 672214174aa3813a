//! Per-request access evaluation and viewer fingerprinting.
//!
//! The gate is stateless: every decision is re-derived from the stored
//! record and the credential supplied with the request.

use std::net::SocketAddr;

use axum::http::HeaderMap;

use pastegate_common::{hash_hex, Paste};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    NotFound,
    /// Treated identically to `NotFound` by callers.
    Expired,
    PasswordRequired,
    Granted,
}

impl Access {
    /// Only `Granted` permits returning content.
    #[must_use]
    pub const fn content_disclosable(self) -> bool {
        matches!(self, Self::Granted)
    }
}

/// Evaluates a paste's protection state against the supplied credential.
/// The password check is case-sensitive plaintext equality; a protection
/// flag with no stored password matches only an absent credential.
#[must_use]
pub fn evaluate(paste: Option<&Paste>, credential: Option<&str>) -> Access {
    match paste {
        None => Access::NotFound,
        Some(paste) if paste.expired() => Access::Expired,
        Some(paste) if paste.protection && paste.password.as_deref() != credential => {
            Access::PasswordRequired
        }
        Some(_) => Access::Granted,
    }
}

/// Derives the viewer fingerprint from the request's network origin and
/// user agent. Stable per viewer, opaque in storage.
#[must_use]
pub fn fingerprint(client_ip: &str, user_agent: Option<&str>) -> String {
    let mut seed = String::with_capacity(client_ip.len() + 1);
    seed.push_str(client_ip);
    seed.push('\n');
    seed.push_str(user_agent.unwrap_or_default());
    hash_hex(seed)
}

/// First `X-Forwarded-For` hop when present, otherwise the peer address.
#[must_use]
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| {
            peer.map_or_else(|| "unknown".to_owned(), |addr| addr.ip().to_string())
        })
}
