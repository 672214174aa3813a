#![warn(clippy::nursery, clippy::pedantic)]

//! Contains the data model and client-side logic shared by the pastegate
//! server and its clients.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
pub use url::Url;

pub mod api;
pub mod language;
pub mod unlock;

pub const API_ENDPOINT: &str = "/api";

/// Length of a freshly generated paste identifier. The degraded collision
/// path may append one extra digit, so stored ids are this length or one
/// character longer.
pub const SHORT_ID_LENGTH: usize = 5;

/// A stored content blob addressable by a short identifier.
///
/// The `password` field holds the stored credential and must be cleared
/// with [`Paste::sanitized`] before the record leaves the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paste {
    pub id: String,
    pub title: Option<String>,
    pub content: String,
    pub language: Option<String>,
    /// `true` means the paste shows up in public listings.
    pub visibility: bool,
    /// `true` means content is withheld until the credential matches.
    pub protection: bool,
    pub password: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub views: u64,
    pub owner_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Paste {
    /// An expired paste behaves like a missing one on every read path; it
    /// stays in storage until the reaper removes it.
    #[must_use]
    pub fn expired(&self) -> bool {
        self.expires_at
            .map(|expires| expires < Utc::now())
            .unwrap_or_default()
    }

    /// Copy of the record that is safe to hand to callers.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        self.password = None;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePasteRequest {
    pub title: Option<String>,
    pub content: String,
    pub language: Option<String>,
    #[serde(default = "default_visibility")]
    pub visibility: bool,
    #[serde(default)]
    pub protection: bool,
    pub password: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub owner_id: Option<String>,
}

const fn default_visibility() -> bool {
    true
}

impl CreatePasteRequest {
    /// Field-level validation, surfaced verbatim in 400 responses.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        validate_content(&self.content)
    }
}

/// Patch for an existing paste. `None` leaves a field unchanged; the id is
/// immutable and absent here on purpose.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasteRequest {
    pub title: Option<String>,
    pub content: String,
    pub language: Option<String>,
    pub visibility: Option<bool>,
    pub protection: Option<bool>,
    pub password: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl UpdatePasteRequest {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        validate_content(&self.content)
    }
}

fn validate_content(content: &str) -> Result<(), Vec<String>> {
    if content.is_empty() {
        return Err(vec!["content: Content is required".to_owned()]);
    }
    Ok(())
}

/// Hex-encoded SHA-256 digest; used for viewer fingerprints.
#[must_use]
pub fn hash_hex(data: impl AsRef<[u8]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher
        .finalize()
        .iter()
        .fold(String::with_capacity(64), |mut out, byte| {
            let _ = write!(out, "{:02x}", byte);
            out
        })
}

/// Shareable URL for a paste on the given instance.
pub fn paste_url(base: &Url, id: &str) -> Result<Url, url::ParseError> {
    base.join(id)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn paste() -> Paste {
        Paste {
            id: "aB3x9".to_owned(),
            title: Some("notes".to_owned()),
            content: "hello".to_owned(),
            language: Some("text".to_owned()),
            visibility: true,
            protection: false,
            password: Some("hunter2".to_owned()),
            expires_at: None,
            views: 0,
            owner_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn sanitized_strips_the_stored_credential() {
        let sanitized = paste().sanitized();
        assert_eq!(sanitized.password, None);
        assert_eq!(sanitized.content, "hello");
    }

    #[test]
    fn expiry_is_based_on_the_current_time() {
        let mut p = paste();
        assert!(!p.expired());

        p.expires_at = Some(Utc::now() - Duration::hours(1));
        assert!(p.expired());

        p.expires_at = Some(Utc::now() + Duration::hours(1));
        assert!(!p.expired());
    }

    #[test]
    fn create_request_defaults_to_public_and_unprotected() {
        let req: CreatePasteRequest =
            serde_json::from_str(r#"{"content":"print('hi')"}"#).unwrap();
        assert!(req.visibility);
        assert!(!req.protection);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn empty_content_is_rejected_with_field_detail() {
        let req: CreatePasteRequest = serde_json::from_str(r#"{"content":""}"#).unwrap();
        let details = req.validate().unwrap_err();
        assert_eq!(details, vec!["content: Content is required".to_owned()]);
    }

    #[test]
    fn wire_fields_are_camel_case() {
        let value = serde_json::to_value(paste()).unwrap();
        assert!(value.get("expiresAt").is_some());
        assert!(value.get("ownerId").is_some());
        assert!(value.get("createdAt").is_some());
        assert!(value.get("expires_at").is_none());
    }

    #[test]
    fn hash_hex_is_stable() {
        assert_eq!(
            hash_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(hash_hex("abc"), hash_hex("abc"));
    }

    #[test]
    fn paste_url_appends_the_id() {
        let base = Url::parse("https://paste.example.com/").unwrap();
        let url = paste_url(&base, "aB3x9").unwrap();
        assert_eq!(url.as_str(), "https://paste.example.com/aB3x9");
    }
}
