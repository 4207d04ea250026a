//! Utilities to acquire source text from files.

use std::path::Path;

use encoding_rs::{Encoding, UTF_8};

use crate::error::LoadingError;

/// Reads a source file and decodes it to text.
///
/// A byte-order mark selects the encoding (UTF-8, UTF-16LE/BE);
/// everything else is decoded as strict UTF-8.  Malformed input is a
/// [`LoadingError::Decode`], never silently replaced — a compiler that
/// quietly mangles identifiers produces diagnostics nobody can act on.
pub fn read_source(path: &Path) -> Result<String, LoadingError> {
    let bytes = std::fs::read(path)?;
    decode_source(&bytes).map_err(|msg| LoadingError::Decode(format!("{}: {msg}", path.display())))
}

/// Decodes raw bytes per the rules of [`read_source`].
pub fn decode_source(bytes: &[u8]) -> Result<String, String> {
    if let Some((encoding, _bom_len)) = Encoding::for_bom(bytes) {
        // `decode` sniffs and strips the BOM itself.
        let (text, _, malformed) = encoding.decode(bytes);
        if malformed {
            return Err(format!("malformed {} input", encoding.name()));
        }
        return Ok(text.into_owned());
    }

    let (text, malformed) = UTF_8.decode_without_bom_handling(bytes);
    if malformed {
        return Err("malformed UTF-8 input".to_string());
    }
    Ok(text.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_utf8_decodes() {
        assert_eq!(decode_source("div { }".as_bytes()).unwrap(), "div { }");
    }

    #[test]
    fn utf8_bom_is_stripped() {
        let mut bytes = vec![0xef, 0xbb, 0xbf];
        bytes.extend_from_slice(b"div { }");
        assert_eq!(decode_source(&bytes).unwrap(), "div { }");
    }

    #[test]
    fn malformed_utf8_is_an_error() {
        assert!(decode_source(&[0x64, 0xff, 0xfe, 0x00]).is_err());
    }
}
