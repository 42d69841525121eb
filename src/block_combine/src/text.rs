//! Vendor text encoding helpers.
//!
//! Vendor files are usually GBK; labels follow the WHATWG Encoding Standard
//! (`"gbk"`, `"utf-8"`, `"gb18030"`, ...). Decoding or encoding that would
//! need replacement characters is an error rather than silent data loss.

use encoding_rs::Encoding;

use crate::error::{Error, Result};

/// Resolve a WHATWG encoding label.
pub fn resolve_encoding(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| Error::Config(format!("unknown text encoding label {label:?}")))
}

/// Decode `bytes`; a leading BOM overrides `encoding`.
pub fn decode(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(Error::Encoding(format!(
            "input is not valid {}",
            used.name()
        )));
    }
    Ok(text.into_owned())
}

/// Encode `text`. Characters the target encoding cannot represent are an error.
pub fn encode(text: &str, encoding: &'static Encoding) -> Result<Vec<u8>> {
    // encoding_rs only encodes to UTF-8 for the UTF-16 family; those are not vendor formats.
    let (bytes, used, had_errors) = encoding.encode(text);
    if had_errors || used != encoding.output_encoding() {
        return Err(Error::Encoding(format!(
            "text is not representable in {}",
            encoding.name()
        )));
    }
    Ok(bytes.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gbk_round_trips_chinese_names() {
        let gbk = resolve_encoding("GBK").unwrap();
        let bytes = encode("白酒\n600519\n", gbk).unwrap();
        assert_ne!(bytes, "白酒\n600519\n".as_bytes());
        assert_eq!(decode(&bytes, gbk).unwrap(), "白酒\n600519\n");
    }

    #[test]
    fn invalid_input_is_an_error() {
        let utf8 = resolve_encoding("utf-8").unwrap();
        assert!(matches!(decode(&[0x80, 0x41], utf8), Err(Error::Encoding(_))));
    }

    #[test]
    fn unknown_label_is_a_config_error() {
        assert!(matches!(resolve_encoding("klingon"), Err(Error::Config(_))));
    }
}
