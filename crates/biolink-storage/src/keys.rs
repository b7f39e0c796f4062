//! Shared destination folder generation for the signer and the uploader.
//!
//! Folder format: `{folder}/{user_id}`.

use std::fmt::{Display, Formatter, Result as FmtResult};

/// Validated `{folder}/{user_id}` namespace an upload is confined to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationFolder(String);

impl DestinationFolder {
    /// Build the destination for a user inside a logical folder.
    ///
    /// Both parts must be non-empty and must not contain `..`, backslashes, control
    /// characters or a leading/trailing `/`. The user id additionally may not contain
    /// `/`, so one user can never write into another user's namespace.
    pub fn new(folder: &str, user_id: &str) -> Result<Self, String> {
        let folder = folder.trim();
        let user_id = user_id.trim();

        validate_segment("destination folder", folder)?;
        validate_segment("user id", user_id)?;
        if user_id.contains('/') {
            return Err("user id must not contain '/'".to_string());
        }

        Ok(Self(format!("{}/{}", folder, user_id)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for DestinationFolder {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

fn validate_segment(label: &str, value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err(format!("{} must not be empty", label));
    }
    if value.starts_with('/') || value.ends_with('/') {
        return Err(format!("{} must not start or end with '/'", label));
    }
    if value.contains("..") || value.contains('\\') || value.contains("//") {
        return Err(format!("{} contains an invalid path sequence", label));
    }
    if value.chars().any(|c| c.is_control()) {
        return Err(format!("{} contains control characters", label));
    }
    Ok(())
}
