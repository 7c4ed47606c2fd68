//! `KIND:VALUE` argument specs shared by the CLI and fixtures.
//!
//! | Kind | Value |
//! |---|---|
//! | `int` | signed decimal |
//! | `uint` | unsigned decimal or `0x` hex |
//! | `ptr` | address, decimal or `0x` hex |
//! | `char` | one ASCII character |
//! | `wchar` | one character in the BMP |
//! | `str` / `wstr` | text, may be empty |
//! | `null` / `wnull` | absent narrow / wide string, value ignored |

use std::str::FromStr;

use rtmem_core::FormatArg;

use crate::error::HarnessError;

/// Owned format argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    Int(i64),
    Uint(u64),
    Ptr(usize),
    Char(u8),
    WideChar(u16),
    Str(Option<Vec<u8>>),
    WideStr(Option<Vec<u16>>),
}

impl ArgValue {
    #[must_use]
    pub fn as_format_arg(&self) -> FormatArg<'_> {
        match self {
            Self::Int(v) => FormatArg::Int(*v),
            Self::Uint(v) => FormatArg::Uint(*v),
            Self::Ptr(v) => FormatArg::Ptr(*v),
            Self::Char(c) => FormatArg::Char(*c),
            Self::WideChar(c) => FormatArg::WideChar(*c),
            Self::Str(s) => FormatArg::Str(s.as_deref()),
            Self::WideStr(s) => FormatArg::WideStr(s.as_deref()),
        }
    }
}

fn parse_unsigned(spec: &str, value: &str) -> Result<u64, HarnessError> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|e| HarnessError::bad_arg(spec, e.to_string()))
}

fn single_char(spec: &str, value: &str) -> Result<char, HarnessError> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(HarnessError::bad_arg(spec, "expected exactly one character")),
    }
}

impl FromStr for ArgValue {
    type Err = HarnessError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let Some((kind, value)) = spec.split_once(':') else {
            return Err(HarnessError::bad_arg(spec, "expected KIND:VALUE"));
        };
        Ok(match kind {
            "int" => Self::Int(
                value
                    .parse()
                    .map_err(|e: std::num::ParseIntError| HarnessError::bad_arg(spec, e.to_string()))?,
            ),
            "uint" => Self::Uint(parse_unsigned(spec, value)?),
            "ptr" => {
                let addr = parse_unsigned(spec, value)?;
                Self::Ptr(
                    usize::try_from(addr)
                        .map_err(|_| HarnessError::bad_arg(spec, "address out of range"))?,
                )
            }
            "char" => {
                let c = single_char(spec, value)?;
                if !c.is_ascii() {
                    return Err(HarnessError::bad_arg(spec, "narrow characters must be ASCII"));
                }
                Self::Char(c as u8)
            }
            "wchar" => {
                let c = single_char(spec, value)?;
                let mut buf = [0_u16; 2];
                match c.encode_utf16(&mut buf) {
                    [unit] => Self::WideChar(*unit),
                    _ => return Err(HarnessError::bad_arg(spec, "wide character outside the BMP")),
                }
            }
            "str" => Self::Str(Some(value.as_bytes().to_vec())),
            "wstr" => Self::WideStr(Some(value.encode_utf16().collect())),
            "null" => Self::Str(None),
            "wnull" => Self::WideStr(None),
            other => return Err(HarnessError::bad_arg(spec, format!("unknown kind {other:?}"))),
        })
    }
}

/// Parse every spec, failing on the first bad one.
pub fn parse_args<S: AsRef<str>>(specs: &[S]) -> Result<Vec<ArgValue>, HarnessError> {
    specs.iter().map(|s| s.as_ref().parse()).collect()
}
