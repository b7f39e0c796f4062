//! Content gatekeeper: type and size enforcement on a fetched response.
//!
//! Two phases, in order. The header phase rejects non-image types and declared
//! oversize payloads before any body byte is read. The body phase streams the payload
//! and re-checks the measured length against the same ceiling, whatever the headers
//! said. The body check is the authoritative one.

use biolink_core::{ImagePayload, ValidationError};
use bytes::BytesMut;
use reqwest::header::{HeaderMap, CONTENT_LENGTH, CONTENT_TYPE};

use crate::fetcher::RawResponse;

/// Validate `response` and collect at most `max_bytes` of body.
pub async fn validate_and_collect(
    response: RawResponse,
    max_bytes: u64,
) -> Result<ImagePayload, ValidationError> {
    let content_type = image_content_type(response.headers())?;
    let declared = declared_length(response.headers());
    if let Some(declared) = declared {
        if declared > max_bytes {
            tracing::debug!(
                declared_bytes = declared,
                limit_bytes = max_bytes,
                "Rejecting payload on declared size"
            );
            return Err(ValidationError::DeclaredTooLarge {
                declared,
                limit: max_bytes,
            });
        }
    }

    let mut response = response.into_inner();
    let capacity = declared.unwrap_or(0).min(max_bytes);
    let mut body = BytesMut::with_capacity(usize::try_from(capacity).unwrap_or(0));

    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| ValidationError::BodyRead(e.to_string()))?
    {
        let measured = body.len() as u64 + chunk.len() as u64;
        if measured > max_bytes {
            // Stop reading; the size so far already proves the payload is too big.
            tracing::debug!(
                measured_bytes = measured,
                limit_bytes = max_bytes,
                declared_bytes = ?declared,
                "Rejecting payload on measured size"
            );
            return Err(ValidationError::PayloadTooLarge {
                measured,
                limit: max_bytes,
            });
        }
        body.extend_from_slice(&chunk);
    }

    tracing::debug!(
        size_bytes = body.len(),
        content_type = %content_type,
        "Payload passed content checks"
    );

    Ok(ImagePayload {
        bytes: body.freeze(),
        content_type,
    })
}

/// Normalized `type/subtype` of an `image/*` response, parameters stripped.
fn image_content_type(headers: &HeaderMap) -> Result<String, ValidationError> {
    let raw = headers
        .get(CONTENT_TYPE)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned());

    let normalized = raw
        .as_deref()
        .and_then(|value| value.split(';').next())
        .map(|mime| mime.trim().to_lowercase());

    match normalized {
        Some(mime) if mime.len() > "image/".len() && mime.starts_with("image/") => Ok(mime),
        _ => Err(ValidationError::InvalidContentType { found: raw }),
    }
}

/// `Content-Length` as sent by the source. Unparseable values count as absent.
fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
}
