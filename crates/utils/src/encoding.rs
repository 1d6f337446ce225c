use encoding_rs::{Encoding, GB18030, UTF_16BE, UTF_16LE, UTF_8};

use crate::error::{ParseError, Result};

/// Guess the text encoding of raw statement bytes.
///
/// The guess gates every later decode, so this refuses to answer rather
/// than return something it is not confident about:
///
/// 1. a BOM decides immediately (UTF-8 / UTF-16 BE / UTF-16 LE),
/// 2. a NUL-byte pattern on even or odd offsets indicates BOM-less UTF-16
///    (checked before UTF-8, since NUL bytes are themselves valid UTF-8),
/// 3. bytes that validate as UTF-8 are UTF-8,
/// 4. bytes that decode as GB18030 without any replacement are GB18030.
///
/// Anything else is `ParseError::Encoding`.
pub fn detect_encoding(bytes: &[u8]) -> Result<&'static Encoding> {
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return Ok(UTF_8);
    }
    if bytes.starts_with(&[0xFE, 0xFF]) {
        return Ok(UTF_16BE);
    }
    if bytes.starts_with(&[0xFF, 0xFE]) {
        return Ok(UTF_16LE);
    }

    if let Some(enc) = sniff_utf16(bytes) {
        return Ok(enc);
    }

    if std::str::from_utf8(bytes).is_ok() {
        return Ok(UTF_8);
    }

    if GB18030
        .decode_without_bom_handling_and_without_replacement(bytes)
        .is_some()
    {
        return Ok(GB18030);
    }

    Err(ParseError::Encoding(
        "no confident encoding guess for input bytes".to_string(),
    ))
}

/// Decode statement bytes, honouring an explicit label override.
///
/// With an override the label must resolve and the bytes must decode
/// without replacement; without one, `detect_encoding` decides. Either
/// way a lossy decode is an error, never a silent fallback.
pub fn decode_bytes(bytes: &[u8], label_override: Option<&str>) -> Result<String> {
    let encoding = match label_override {
        Some(label) => Encoding::for_label(label.as_bytes())
            .ok_or_else(|| ParseError::Encoding(format!("unknown encoding label '{label}'")))?,
        None => detect_encoding(bytes)?,
    };

    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(ParseError::Encoding(format!(
            "input is not valid {}",
            used.name()
        )));
    }
    Ok(text.into_owned())
}

/// Heuristic for UTF-16 exports that carry no BOM: ASCII-heavy bank
/// reports put a NUL in every other byte.
fn sniff_utf16(bytes: &[u8]) -> Option<&'static Encoding> {
    if bytes.len() < 4 {
        return None;
    }
    let sample = &bytes[..bytes.len().min(1024)];
    let pairs = sample.len() / 2;
    let even_nuls = sample.iter().step_by(2).filter(|b| **b == 0).count();
    let odd_nuls = sample.iter().skip(1).step_by(2).filter(|b| **b == 0).count();

    if even_nuls * 10 >= pairs * 8 && odd_nuls * 10 < pairs * 2 {
        return Some(UTF_16BE);
    }
    if odd_nuls * 10 >= pairs * 8 && even_nuls * 10 < pairs * 2 {
        return Some(UTF_16LE);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_utf8_with_and_without_bom() {
        assert_eq!(detect_encoding("plain ascii".as_bytes()).unwrap(), UTF_8);
        let mut bom = vec![0xEF, 0xBB, 0xBF];
        bom.extend_from_slice("text".as_bytes());
        assert_eq!(detect_encoding(&bom).unwrap(), UTF_8);
    }

    #[test]
    fn detects_utf16_by_bom_and_by_nul_pattern() {
        let mut be = vec![0xFE, 0xFF];
        be.extend("ab".encode_utf16().flat_map(|u| u.to_be_bytes()));
        assert_eq!(detect_encoding(&be).unwrap(), UTF_16BE);

        // BOM-less UTF-16-BE: NULs on even offsets
        let bare: Vec<u8> = "Account Number"
            .encode_utf16()
            .flat_map(|u| u.to_be_bytes())
            .collect();
        assert_eq!(detect_encoding(&bare).unwrap(), UTF_16BE);

        let bare_le: Vec<u8> = "Account Number"
            .encode_utf16()
            .flat_map(|u| u.to_le_bytes())
            .collect();
        assert_eq!(detect_encoding(&bare_le).unwrap(), UTF_16LE);
    }

    #[test]
    fn detects_gb18030() {
        let (encoded, _, _) = GB18030.encode("交易时间,金额");
        assert_eq!(detect_encoding(&encoded).unwrap(), GB18030);
        assert_eq!(
            decode_bytes(&encoded, None).unwrap(),
            "交易时间,金额".to_string()
        );
    }

    #[test]
    fn refuses_unconfident_input() {
        // 0x80 is not a valid GB18030 lead byte and not valid UTF-8
        let err = detect_encoding(&[0x80, 0x80, 0x80, 0x80]).unwrap_err();
        assert!(matches!(err, ParseError::Encoding(_)));
    }

    #[test]
    fn override_must_resolve() {
        let err = decode_bytes(b"abc", Some("no-such-charset")).unwrap_err();
        assert!(matches!(err, ParseError::Encoding(_)));

        let ok = decode_bytes(b"abc", Some("utf-8")).unwrap();
        assert_eq!(ok, "abc");
    }

    #[test]
    fn decode_strips_bom() {
        let mut be = vec![0xFE, 0xFF];
        be.extend("hi".encode_utf16().flat_map(|u| u.to_be_bytes()));
        assert_eq!(decode_bytes(&be, None).unwrap(), "hi");
    }
}
