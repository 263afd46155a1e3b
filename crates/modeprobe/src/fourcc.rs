// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies
//
// Four-character codes as used by capture driver APIs for display modes,
// pixel formats and field dominance. Codes are multi-character constants:
// the first character lands in the most significant byte.
#![forbid(unsafe_code)]

use core::{fmt, result::Result, str::FromStr};

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub const fn new(code: &[u8; 4]) -> FourCC {
        FourCC(*code)
    }

    pub const fn to_u32(self) -> u32 {
        ((self.0[0] as u32) << 24 & 0xff000000)
            | ((self.0[1] as u32) << 16 & 0x00ff0000)
            | ((self.0[2] as u32) << 8 & 0x0000ff00)
            | ((self.0[3] as u32) & 0x000000ff)
    }

    pub const fn from_u32(val: u32) -> FourCC {
        FourCC([
            (val >> 24 & 0xff) as u8,
            (val >> 16 & 0xff) as u8,
            (val >> 8 & 0xff) as u8,
            (val & 0xff) as u8,
        ])
    }
}

impl From<&[u8; 4]> for FourCC {
    fn from(buf: &[u8; 4]) -> FourCC {
        FourCC(*buf)
    }
}

impl From<u32> for FourCC {
    fn from(val: u32) -> FourCC {
        FourCC::from_u32(val)
    }
}

impl From<FourCC> for u32 {
    fn from(val: FourCC) -> Self {
        val.to_u32()
    }
}

/// Error returned when a string is not exactly four ASCII characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFourCCError(String);

impl fmt::Display for ParseFourCCError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "not a four-character code: {:?}", self.0)
    }
}

impl std::error::Error for ParseFourCCError {}

impl FromStr for FourCC {
    type Err = ParseFourCCError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 4 || !s.is_ascii() {
            return Err(ParseFourCCError(s.to_owned()));
        }
        Ok(FourCC([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match core::str::from_utf8(&self.0) {
            Ok(s) => f.write_str(s),
            Err(_) => {
                // If we return fmt::Error, then for example format!() will panic, so we choose
                // an alternative representation instead
                let b = &self.0;
                f.write_fmt(format_args!(
                    "{}{}{}{}",
                    core::ascii::escape_default(b[0]),
                    core::ascii::escape_default(b[1]),
                    core::ascii::escape_default(b[2]),
                    core::ascii::escape_default(b[3])
                ))
            }
        }
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        let b = self.0;
        f.debug_tuple("FourCC")
            .field(&format_args!(
                "{}{}{}{}",
                core::ascii::escape_default(b[0]),
                core::ascii::escape_default(b[1]),
                core::ascii::escape_default(b[2]),
                core::ascii::escape_default(b[3])
            ))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multichar_constant_order() {
        let code = FourCC::new(b"Hp59");
        assert_eq!(code.to_u32(), 0x4870_3539);
        assert_eq!(FourCC::from(0x4870_3539), code);
    }

    #[test]
    fn parse_and_display() {
        let code: FourCC = "pal ".parse().unwrap();
        assert_eq!(code.to_string(), "pal ");
        assert!("pal".parse::<FourCC>().is_err());
        assert!("Hp59x".parse::<FourCC>().is_err());
    }

    #[test]
    fn non_utf8_display_is_escaped() {
        let code = FourCC([0xff, b'a', b'b', b'c']);
        assert_eq!(code.to_string(), "\\xffabc");
    }
}
