use std::fmt::{Debug, Formatter, Result as FmtResult};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Image bytes that passed both the declared-size and measured-size checks, together
/// with the confirmed MIME type.
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub bytes: Bytes,
    pub content_type: String,
}

impl ImagePayload {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl Debug for ImagePayload {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ImagePayload")
            .field("content_type", &self.content_type)
            .field("size_bytes", &self.bytes.len())
            .finish()
    }
}

/// Short-lived credential issued by the first-party signing endpoint.
///
/// Not `Clone`: a grant authorizes exactly one upload and is consumed by it.
#[derive(Deserialize)]
pub struct SignedUploadGrant {
    #[serde(rename = "cloudName")]
    pub cloud_name: String,
    #[serde(rename = "apiKey")]
    pub api_key: String,
    #[serde(rename = "timestamp", deserialize_with = "deserialize_timestamp")]
    pub issued_at_timestamp: i64,
    pub signature: String,
    #[serde(rename = "upload_preset", default)]
    pub upload_preset_name: Option<String>,
}

impl SignedUploadGrant {
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.issued_at_timestamp, 0)
    }
}

impl Debug for SignedUploadGrant {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("SignedUploadGrant")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &"[redacted]")
            .field("issued_at_timestamp", &self.issued_at_timestamp)
            .field("signature", &"[redacted]")
            .field("upload_preset_name", &self.upload_preset_name)
            .finish()
    }
}

/// Signing endpoints written in JavaScript send the timestamp either as a number or
/// as a numeric string.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TimestampRepr {
        Int(i64),
        Float(f64),
        Text(String),
    }

    match TimestampRepr::deserialize(deserializer)? {
        TimestampRepr::Int(value) => Ok(value),
        TimestampRepr::Float(value) if value.is_finite() => Ok(value.trunc() as i64),
        TimestampRepr::Float(value) => Err(serde::de::Error::custom(format!(
            "invalid timestamp: {}",
            value
        ))),
        TimestampRepr::Text(text) => text
            .trim()
            .parse::<i64>()
            .map_err(|e| serde::de::Error::custom(format!("invalid timestamp '{}': {}", text, e))),
    }
}

/// Asset as reported by the storage provider after a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedAsset {
    #[serde(rename = "public_id")]
    pub storage_object_id: String,
    #[serde(rename = "secure_url")]
    pub canonical_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_accepts_numeric_and_string_timestamps() {
        let grant: SignedUploadGrant = serde_json::from_str(
            r#"{"cloudName":"demo","apiKey":"k","timestamp":1700000000,"signature":"s"}"#,
        )
        .unwrap();
        assert_eq!(grant.issued_at_timestamp, 1_700_000_000);
        assert!(grant.upload_preset_name.is_none());
        assert!(grant.issued_at().is_some());

        let grant: SignedUploadGrant = serde_json::from_str(
            r#"{"cloudName":"demo","apiKey":"k","timestamp":"1700000000","signature":"s","upload_preset":"avatars"}"#,
        )
        .unwrap();
        assert_eq!(grant.issued_at_timestamp, 1_700_000_000);
        assert_eq!(grant.upload_preset_name.as_deref(), Some("avatars"));
    }

    #[test]
    fn test_grant_rejects_missing_signature() {
        let result: Result<SignedUploadGrant, _> =
            serde_json::from_str(r#"{"cloudName":"demo","apiKey":"k","timestamp":1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_grant_debug_redacts_secrets() {
        let grant: SignedUploadGrant = serde_json::from_str(
            r#"{"cloudName":"demo","apiKey":"secret-key","timestamp":1,"signature":"secret-sig"}"#,
        )
        .unwrap();
        let rendered = format!("{:?}", grant);
        assert!(!rendered.contains("secret-key"));
        assert!(!rendered.contains("secret-sig"));
        assert!(rendered.contains("demo"));
    }

    #[test]
    fn test_uploaded_asset_from_provider_json() {
        let asset: UploadedAsset = serde_json::from_str(
            r#"{"public_id":"avatars/u1/img1","secure_url":"https://res.example.com/demo/image/upload/v1/avatars/u1/img1.jpg","bytes":123}"#,
        )
        .unwrap();
        assert_eq!(asset.storage_object_id, "avatars/u1/img1");
        assert!(asset.canonical_url.ends_with("img1.jpg"));
    }
}
