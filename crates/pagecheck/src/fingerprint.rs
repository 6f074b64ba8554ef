//! Content-addressed asset names.
//!
//! The app server publishes uploaded media (page icons included) under
//! `<sha224-hex>.<ext>`, so the same bytes always produce the same URL. An
//! [`AssetFingerprint`] computes that name locally, or recovers it from a
//! served URL, so tests can pin an exact asset.

use crate::result::{HarnessError, HarnessResult};
use sha2::{Digest, Sha224};
use std::fmt;
use std::path::Path;

/// Hex length of a SHA-224 digest
pub const DIGEST_HEX_LEN: usize = 56;

/// `<digest>.<extension>` name of a media asset
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetFingerprint {
    digest: String,
    extension: String,
}

impl AssetFingerprint {
    /// Fingerprint raw bytes
    #[must_use]
    pub fn of_bytes(bytes: &[u8], extension: &str) -> Self {
        Self {
            digest: format!("{:x}", Sha224::digest(bytes)),
            extension: normalize_extension(extension),
        }
    }

    /// Fingerprint a file, taking the extension from its name
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, or
    /// [`HarnessError::InvalidArgument`] if it has no extension
    pub fn from_file(path: impl AsRef<Path>) -> HarnessResult<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty())
            .ok_or_else(|| {
                HarnessError::invalid_argument(format!(
                    "{} has no file extension",
                    path.display()
                ))
            })?;
        let bytes = std::fs::read(path)?;
        Ok(Self::of_bytes(&bytes, extension))
    }

    /// Recover the fingerprint from a served media URL such as
    /// `/media/<digest>.png?v=1`
    #[must_use]
    pub fn from_url(url: &str) -> Option<Self> {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let file_name = path.rsplit('/').next()?;
        Self::parse(file_name)
    }

    /// Parse `<digest>.<ext>`
    #[must_use]
    pub fn parse(file_name: &str) -> Option<Self> {
        let (digest, extension) = file_name.split_once('.')?;
        let valid = digest.len() == DIGEST_HEX_LEN
            && digest.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
            && !extension.is_empty();
        valid.then(|| Self {
            digest: digest.to_string(),
            extension: normalize_extension(extension),
        })
    }

    /// Hex digest
    #[must_use]
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Lowercase extension without the dot
    #[must_use]
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// `<digest>.<ext>`
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.digest, self.extension)
    }

    /// Whether `haystack` (typically an `href`) names this asset
    #[must_use]
    pub fn is_in(&self, haystack: &str) -> bool {
        haystack.contains(&self.file_name())
    }
}

impl fmt::Display for AssetFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.digest, self.extension)
    }
}

fn normalize_extension(extension: &str) -> String {
    extension.trim_start_matches('.').to_ascii_lowercase()
}
