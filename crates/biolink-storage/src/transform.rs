//! Transformation URL helpers for the storage provider.
//!
//! The provider serves on-the-fly transformations from a path segment placed right
//! after `/upload/`, e.g. `.../image/upload/c_fill,g_face,h_256,w_256/v1/avatars/u1/a.jpg`.
//! Deriving a thumbnail is therefore a pure string rewrite with no network call.

use std::collections::BTreeSet;

use url::Url;

/// Square edge of the derived thumbnail
pub const THUMBNAIL_SIZE: u32 = 256;

/// Face-aware square crop applied server-side to every stored original.
pub const CANONICAL_TRANSFORMATION: &str = "c_fill,g_face,h_1024,w_1024";

const UPLOAD_SEGMENT: &str = "/upload/";

/// Transformation parameter keys the provider accepts. Used to tell a transformation
/// segment apart from the first folder of a public id.
const TRANSFORMATION_KEYS: &[&str] = &[
    "a", "ac", "af", "ar", "b", "bo", "br", "c", "co", "cs", "d", "dl", "dn", "dpr", "du", "e",
    "eo", "f", "fl", "fn", "fps", "g", "h", "if", "ki", "l", "o", "p", "pg", "q", "r", "so",
    "sp", "t", "u", "vc", "vs", "w", "x", "y", "z",
];

/// Face-centered square fill crop of `size` pixels.
pub fn face_fill_transformation(size: u32) -> String {
    format!("c_fill,g_face,h_{},w_{}", size, size)
}

/// Derive the thumbnail URL for a stored asset.
///
/// The result depends on `canonical_url` alone. Returns `None` when 256 is not among
/// `requested_sizes` or when `canonical_url` is not a provider delivery URL.
/// `storage_object_id` is only used for a diagnostic when the path does not mention
/// it. Never panics: a missing thumbnail must not fail a successful ingestion.
pub fn derive_thumbnail_url(
    canonical_url: &str,
    storage_object_id: &str,
    requested_sizes: &BTreeSet<u32>,
) -> Option<String> {
    if !requested_sizes.contains(&THUMBNAIL_SIZE) {
        return None;
    }

    let parsed = Url::parse(canonical_url).ok()?;
    if parsed.scheme() != "https" && parsed.scheme() != "http" {
        return None;
    }

    let marker = canonical_url.find(UPLOAD_SEGMENT)?;
    let (head, tail) = canonical_url.split_at(marker + UPLOAD_SEGMENT.len());

    // An existing transformation right after /upload/ is replaced, not stacked.
    let rest = match tail.split_once('/') {
        Some((first, rest)) if is_transformation_segment(first) => rest,
        _ => tail,
    };
    if rest.is_empty() {
        return None;
    }

    if !storage_object_id.is_empty() && !references_object(rest, storage_object_id) {
        tracing::debug!(
            canonical_url = %canonical_url,
            storage_object_id = %storage_object_id,
            "Canonical URL path does not mention the stored object id"
        );
    }

    Some(format!(
        "{}{}/{}",
        head,
        face_fill_transformation(THUMBNAIL_SIZE),
        rest
    ))
}

fn references_object(path: &str, storage_object_id: &str) -> bool {
    let decoded = urlencoding::decode(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| path.to_string());
    decoded.contains(storage_object_id) || path.contains(storage_object_id)
}

fn is_transformation_segment(segment: &str) -> bool {
    if segment.is_empty() || is_version_segment(segment) {
        return false;
    }
    segment.split(',').all(|component| {
        component
            .split_once('_')
            .map(|(key, value)| !value.is_empty() && TRANSFORMATION_KEYS.contains(&key))
            .unwrap_or(false)
    })
}

fn is_version_segment(segment: &str) -> bool {
    segment
        .strip_prefix('v')
        .map(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false)
}
