/*!
 * Batch intake policy.
 *
 * Decides which candidate files become tracked uploads: documents of an
 * allow-listed media type that fit under the size ceiling.
 */

use std::fmt;

use super::models::SourceFile;

/// Largest accepted file: 50 MiB
pub const MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Media types accepted for upload
pub const ALLOWED_MEDIA_TYPES: &[&str] = &[
    "application/pdf",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
    "application/msword",
];

/// Why a candidate was turned away
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    UnsupportedType(String),
    TooLarge(u64),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedType(media_type) => write!(f, "unsupported media type '{}'", media_type),
            Self::TooLarge(size) => write!(f, "{} bytes exceeds the {} byte limit", size, MAX_FILE_SIZE),
        }
    }
}

/// Check a single candidate against the intake policy
pub fn check(file: &SourceFile) -> Result<(), Rejection> {
    if !ALLOWED_MEDIA_TYPES.contains(&file.media_type()) {
        return Err(Rejection::UnsupportedType(file.media_type().to_string()));
    }
    if file.size() > MAX_FILE_SIZE {
        return Err(Rejection::TooLarge(file.size()));
    }
    Ok(())
}

pub fn is_admissible(file: &SourceFile) -> bool {
    check(file).is_ok()
}
