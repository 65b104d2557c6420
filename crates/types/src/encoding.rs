//! Text encodings applied to textual file contents

use std::fmt;
use std::str::FromStr;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use batchwrite_errors::WriteError;
use serde::{Deserialize, Serialize};

/// Padding is optional and stray trailing bits are tolerated.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// How a text payload is turned into bytes before it is staged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[default]
    #[serde(alias = "utf-8")]
    Utf8,
    #[serde(alias = "utf-16le", alias = "ucs2", alias = "ucs-2")]
    Utf16Le,
    #[serde(alias = "binary")]
    Latin1,
    Ascii,
    Base64,
    Base64Url,
    Hex,
}

impl Encoding {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Utf8 => "utf8",
            Self::Utf16Le => "utf16le",
            Self::Latin1 => "latin1",
            Self::Ascii => "ascii",
            Self::Base64 => "base64",
            Self::Base64Url => "base64url",
            Self::Hex => "hex",
        }
    }

    /// Encode `text` into the bytes that land on disk.
    ///
    /// `latin1` and `ascii` keep the low byte of each character. The base64
    /// variants accept either alphabet, optional padding and embedded ASCII
    /// whitespace.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem when `text` is not valid base64
    /// or hex.
    pub fn encode(self, text: &str) -> Result<Vec<u8>, String> {
        match self {
            Self::Utf8 => Ok(text.as_bytes().to_vec()),
            Self::Utf16Le => Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect()),
            Self::Latin1 | Self::Ascii => Ok(text.chars().map(low_byte).collect()),
            Self::Base64 | Self::Base64Url => {
                let normalized: String = text
                    .chars()
                    .filter(|c| !c.is_ascii_whitespace())
                    .map(|c| match c {
                        '-' => '+',
                        '_' => '/',
                        other => other,
                    })
                    .collect();
                LENIENT_BASE64
                    .decode(normalized)
                    .map_err(|e| e.to_string())
            }
            Self::Hex => hex::decode(text).map_err(|e| e.to_string()),
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn low_byte(c: char) -> u8 {
    (u32::from(c) & 0xFF) as u8
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Encoding {
    type Err = WriteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(Self::Utf8),
            "utf16le" | "utf-16le" | "ucs2" | "ucs-2" => Ok(Self::Utf16Le),
            "latin1" | "binary" => Ok(Self::Latin1),
            "ascii" => Ok(Self::Ascii),
            "base64" => Ok(Self::Base64),
            "base64url" => Ok(Self::Base64Url),
            "hex" => Ok(Self::Hex),
            _ => Err(WriteError::InvalidEncoding {
                name: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf16le_layout() {
        assert_eq!(
            Encoding::Utf16Le.encode("hi").unwrap(),
            vec![b'h', 0, b'i', 0]
        );
    }

    #[test]
    fn test_latin1_truncates_to_low_byte() {
        assert_eq!(Encoding::Latin1.encode("é").unwrap(), vec![0xE9]);
        assert_eq!(Encoding::Ascii.encode("\u{0141}").unwrap(), vec![0x41]);
    }

    #[test]
    fn test_base64_is_lenient() {
        assert_eq!(Encoding::Base64.encode("Zm9v").unwrap(), b"foo");
        assert_eq!(Encoding::Base64.encode("Zm9vYg").unwrap(), b"foob");
        assert_eq!(Encoding::Base64.encode("Zm9v\nYmFy").unwrap(), b"foobar");
        assert_eq!(Encoding::Base64Url.encode("-_8").unwrap(), vec![0xFB, 0xFF]);
    }

    #[test]
    fn test_hex_rejects_odd_length() {
        assert_eq!(Encoding::Hex.encode("c0ffee").unwrap(), vec![0xC0, 0xFF, 0xEE]);
        assert!(Encoding::Hex.encode("abc").is_err());
        assert!(Encoding::Hex.encode("zz").is_err());
    }
}
