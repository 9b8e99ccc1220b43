//! Stored-name generation.
//!
//! Stored names look like `20240115_103000_3f9a1c0b7d2e.pdf`: a UTC
//! timestamp with second precision, 12 random hex characters and the
//! original extension when it is safe to keep.

use std::path::Path;

use chrono::Utc;
use uuid::Uuid;

/// Display name used when the client did not send one.
pub const PLACEHOLDER_NAME: &str = "unknown";

/// Number of random hex characters in a stored name (48 bits).
const DISAMBIGUATOR_LEN: usize = 12;

/// Longest extension that is carried over to the stored name.
const MAX_EXTENSION_LEN: usize = 16;

/// Generate a new stored name for an upload.
///
/// Never fails: a missing or empty original name simply yields a name
/// without an extension.
pub fn generate_stored_name(original_name: Option<&str>) -> String {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let random = disambiguator();

    match original_name.and_then(safe_extension) {
        Some(ext) => format!("{timestamp}_{random}.{ext}"),
        None => format!("{timestamp}_{random}"),
    }
}

/// Resolve the display name recorded for an upload.
pub fn display_name(original_name: Option<&str>) -> String {
    match original_name.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => PLACEHOLDER_NAME.to_string(),
    }
}

/// Fresh random hex characters for every call.
///
/// The first 12 hex digits of a v4 UUID are all random bits.
fn disambiguator() -> String {
    let mut hex = Uuid::new_v4().simple().to_string();
    hex.truncate(DISAMBIGUATOR_LEN);
    hex
}

/// Extract an extension that is safe to use on disk.
///
/// Only the final path component counts, so `../x.sh/evil` has no extension.
/// Empty, overlong or non-alphanumeric extensions are dropped.
fn safe_extension(original_name: &str) -> Option<&str> {
    let file_name = original_name.rsplit(['/', '\\']).next()?;
    let ext = Path::new(file_name).extension()?.to_str()?;

    let valid = !ext.is_empty()
        && ext.len() <= MAX_EXTENSION_LEN
        && ext.chars().all(|c| c.is_ascii_alphanumeric());

    valid.then_some(ext)
}
