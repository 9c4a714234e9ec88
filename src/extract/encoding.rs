//! Source text encodings

use std::fmt;
use std::str::FromStr;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Supported byte encodings for text sources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    /// UTF-8 with an optional byte order mark
    Utf8Sig,
    /// ISO-8859-1; every byte maps to one code point
    Latin1,
    Ascii,
}

/// Position and cause of a decode failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeFailure {
    pub offset: usize,
    pub message: String,
}

impl Encoding {
    /// All accepted spellings, for error messages
    pub const NAMES: &'static [&'static str] = &["utf-8", "utf-8-sig", "latin-1", "iso-8859-1", "ascii"];

    /// Canonical name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Utf8Sig => "utf-8-sig",
            Self::Latin1 => "latin-1",
            Self::Ascii => "ascii",
        }
    }

    /// Decode raw bytes into text
    pub fn decode(&self, bytes: Vec<u8>) -> Result<String, DecodeFailure> {
        match self {
            Self::Utf8 | Self::Utf8Sig => {
                let bytes = match bytes.strip_prefix(UTF8_BOM) {
                    Some(rest) => rest.to_vec(),
                    None => bytes,
                };
                String::from_utf8(bytes).map_err(|e| {
                    let offset = e.utf8_error().valid_up_to();
                    DecodeFailure {
                        offset,
                        message: format!(
                            "invalid utf-8 byte 0x{:02x} at offset {offset}",
                            e.as_bytes()[offset]
                        ),
                    }
                })
            }
            Self::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
            Self::Ascii => match bytes.iter().position(|b| !b.is_ascii()) {
                Some(offset) => Err(DecodeFailure {
                    offset,
                    message: format!("byte 0x{:02x} at offset {offset} is not ascii", bytes[offset]),
                }),
                None => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
            },
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "utf-8-sig" | "utf8-sig" => Ok(Self::Utf8Sig),
            "latin-1" | "latin1" | "iso-8859-1" | "iso8859-1" | "l1" => Ok(Self::Latin1),
            "ascii" | "us-ascii" => Ok(Self::Ascii),
            _ => Err(format!(
                "unsupported encoding '{s}', expected one of: [{}]",
                Self::NAMES.join(", ")
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!("UTF-8".parse::<Encoding>().unwrap(), Encoding::Utf8);
        assert_eq!("iso_8859_1".parse::<Encoding>().unwrap(), Encoding::Latin1);
        assert!("shift-jis".parse::<Encoding>().is_err());
    }

    #[test]
    fn test_utf8_strips_bom() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(b"id,name");
        assert_eq!(Encoding::Utf8Sig.decode(bytes).unwrap(), "id,name");
    }

    #[test]
    fn test_utf8_rejects_latin1_bytes() {
        let err = Encoding::Utf8.decode(b"caf\xe9".to_vec()).unwrap_err();
        assert_eq!(err.offset, 3);
    }

    #[test]
    fn test_latin1_decodes_every_byte() {
        assert_eq!(Encoding::Latin1.decode(b"caf\xe9".to_vec()).unwrap(), "café");
    }

    #[test]
    fn test_ascii() {
        assert!(Encoding::Ascii.decode(b"plain".to_vec()).is_ok());
        assert!(Encoding::Ascii.decode("é".as_bytes().to_vec()).is_err());
    }
}
