use crate::error::Result;
use encoding_rs::WINDOWS_1252;
use std::path::Path;
use tracing::debug;

/// Read a whole text file, falling back to Windows-1252 when it is not UTF-8.
///
/// Logger exports frequently carry a Latin-1 degree sign in their headers.
pub fn read_text_file(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(decode_text(&bytes, path))
}

fn decode_text(bytes: &[u8], path: &Path) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.strip_prefix('\u{feff}').unwrap_or(text).to_string(),
        Err(_) => {
            debug!("{} is not UTF-8, decoding as Windows-1252", path.display());
            let (text, _, _) = WINDOWS_1252.decode(bytes);
            text.into_owned()
        }
    }
}

/// True when a raw cell holds one of the recognised missing markers.
pub fn is_missing_marker(raw: &str, extra: &[String]) -> bool {
    let trimmed = raw.trim();
    crate::utils::constants::MISSING_MARKERS.contains(&trimmed)
        || extra.iter().any(|marker| marker == trimmed)
}
