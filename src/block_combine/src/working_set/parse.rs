//! Working-set file parsing.

use std::path::Path;

use encoding_rs::Encoding;
use indexmap::IndexSet;

use crate::error::Result;
use crate::text;

/// Whether a trimmed token is a block code: non-empty and all ASCII digits.
pub fn is_block_code(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}

/// Extract block codes from raw text lines.
///
/// Blank lines are ignored, only all-digit tokens are accepted, and repeated
/// codes keep their first position.
pub fn parse_codes(text: &str) -> Vec<String> {
    let mut codes = IndexSet::new();
    for line in text.lines() {
        let token = line.trim();
        if is_block_code(token) {
            codes.insert(token.to_string());
        }
    }
    codes.into_iter().collect()
}

/// Read and decode a working-set file, then [`parse_codes`] it.
pub fn read_codes_file(path: impl AsRef<Path>, encoding: &'static Encoding) -> Result<Vec<String>> {
    let bytes = std::fs::read(path.as_ref())?;
    let text = text::decode(&bytes, encoding)?;
    Ok(parse_codes(&text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_digit_tokens_in_first_seen_order() {
        let text = "880761\n\n  880900 \nabc\n88x1\n880761\r\n000001\n";
        assert_eq!(parse_codes(text), vec!["880761", "880900", "000001"]);
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(parse_codes("\n \n\t\n").is_empty());
    }

    #[test]
    fn reads_gbk_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Mode3.txt");
        let gbk = text::resolve_encoding("gbk").unwrap();
        std::fs::write(&path, text::encode("板块\n880761\n880900\n", gbk).unwrap()).unwrap();

        assert_eq!(read_codes_file(&path, gbk).unwrap(), vec!["880761", "880900"]);
    }
}
