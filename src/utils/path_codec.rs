//! Lossless mapping between an absolute path and a single directory name.
//!
//! `/` becomes `_` and a literal `_` becomes `<underscore>`. A path that
//! already contains `<underscore>` cannot be encoded unambiguously and is
//! rejected.

use crate::error::{IndexError, Result};
use memchr::memmem;
use std::path::{Path, PathBuf};

/// Escape sequence standing in for a literal underscore
pub const ENCODED_UNDERSCORE: &str = "<underscore>";

/// Encode `path` as a filesystem-safe component name
pub fn encode_path(path: &Path) -> Result<String> {
    let text = path.to_str().ok_or_else(|| IndexError::InvalidPath {
        path: path.to_string_lossy().into_owned(),
    })?;

    if memmem::find(text.as_bytes(), ENCODED_UNDERSCORE.as_bytes()).is_some() {
        return Err(IndexError::InvalidPath {
            path: text.to_string(),
        });
    }

    let mut encoded = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '/' => encoded.push('_'),
            '_' => encoded.push_str(ENCODED_UNDERSCORE),
            _ => encoded.push(ch),
        }
    }
    Ok(encoded)
}

/// Inverse of [`encode_path`]; input is assumed to come from it
pub fn decode_path(name: &str) -> PathBuf {
    let mut decoded = String::with_capacity(name.len());
    let mut rest = name;

    while let Some(ch) = rest.chars().next() {
        if let Some(tail) = rest.strip_prefix(ENCODED_UNDERSCORE) {
            decoded.push('_');
            rest = tail;
            continue;
        }
        decoded.push(if ch == '_' { '/' } else { ch });
        rest = &rest[ch.len_utf8()..];
    }

    PathBuf::from(decoded)
}
