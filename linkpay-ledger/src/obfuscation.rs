//! Reversible concealment of product target URLs.
//!
//! This keeps URLs from being plainly readable in storage and transit. It
//! is an encoding, not encryption: anyone with the stored value can recover
//! the URL.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as b64;

/// A concealed value that does not decode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot reveal concealed value: {0}")]
pub struct RevealError(String);

/// Conceals `target`.
#[must_use]
pub fn conceal(target: &str) -> String {
    b64.encode(target.as_bytes())
}

/// Recovers a value produced by [`conceal`].
///
/// # Errors
///
/// Returns [`RevealError`] if `concealed` is not valid base64 of UTF-8 text.
pub fn reveal(concealed: &str) -> Result<String, RevealError> {
    let bytes = b64
        .decode(concealed)
        .map_err(|e| RevealError(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| RevealError(e.to_string()))
}
