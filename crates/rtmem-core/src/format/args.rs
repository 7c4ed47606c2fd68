//! Format arguments.

use crate::mem::block::Block;
use crate::string::{RtString, Unit};

use super::directive::MAX_COUNT;

/// One argument to a format string.
///
/// Directives read arguments in order. A mismatched argument is coerced:
/// integers reinterpret between signed and unsigned, strings read as 0 under
/// numeric conversions, and non-strings read as absent under `%s`/`%S`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatArg<'a> {
    Int(i64),
    Uint(u64),
    Ptr(usize),
    Char(u8),
    WideChar(Unit),
    /// Narrow string; `None` renders as `(NULL)`.
    Str(Option<&'a [u8]>),
    /// Wide string; `None` renders as `(NULL)`.
    WideStr(Option<&'a [Unit]>),
}

impl FormatArg<'_> {
    fn as_signed(self) -> i64 {
        match self {
            Self::Int(v) => v,
            Self::Uint(v) => v as i64,
            Self::Ptr(v) => v as i64,
            Self::Char(c) => i64::from(c),
            Self::WideChar(c) => i64::from(c),
            Self::Str(_) | Self::WideStr(_) => 0,
        }
    }

    fn as_unsigned(self) -> u64 {
        match self {
            Self::Int(v) => v as u64,
            Self::Uint(v) => v,
            Self::Ptr(v) => v as u64,
            Self::Char(c) => u64::from(c),
            Self::WideChar(c) => u64::from(c),
            Self::Str(_) | Self::WideStr(_) => 0,
        }
    }
}

macro_rules! signed_args {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for FormatArg<'_> {
                fn from(v: $ty) -> Self {
                    Self::Int(i64::from(v))
                }
            }
        )*
    };
}

macro_rules! unsigned_args {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for FormatArg<'_> {
                fn from(v: $ty) -> Self {
                    Self::Uint(u64::from(v))
                }
            }
        )*
    };
}

signed_args!(i8, i16, i32, i64);
unsigned_args!(u8, u16, u32, u64);

impl From<isize> for FormatArg<'_> {
    fn from(v: isize) -> Self {
        Self::Int(v as i64)
    }
}

impl From<usize> for FormatArg<'_> {
    fn from(v: usize) -> Self {
        Self::Uint(v as u64)
    }
}

impl<'a> From<&'a str> for FormatArg<'a> {
    fn from(s: &'a str) -> Self {
        Self::Str(Some(s.as_bytes()))
    }
}

impl<'a> From<Option<&'a str>> for FormatArg<'a> {
    fn from(s: Option<&'a str>) -> Self {
        Self::Str(s.map(str::as_bytes))
    }
}

impl<'a> From<&'a [u8]> for FormatArg<'a> {
    fn from(s: &'a [u8]) -> Self {
        Self::Str(Some(s))
    }
}

impl<'a> From<&'a [Unit]> for FormatArg<'a> {
    fn from(s: &'a [Unit]) -> Self {
        Self::WideStr(Some(s))
    }
}

impl<'a> From<&'a RtString> for FormatArg<'a> {
    fn from(s: &'a RtString) -> Self {
        Self::WideStr(Some(s.as_units()))
    }
}

impl<'a> From<Option<&'a RtString>> for FormatArg<'a> {
    fn from(s: Option<&'a RtString>) -> Self {
        Self::WideStr(s.map(RtString::as_units))
    }
}

impl From<Block> for FormatArg<'_> {
    fn from(b: Block) -> Self {
        Self::Ptr(b.addr())
    }
}

impl<T> From<*const T> for FormatArg<'_> {
    fn from(p: *const T) -> Self {
        Self::Ptr(p as usize)
    }
}

impl<T> From<*mut T> for FormatArg<'_> {
    fn from(p: *mut T) -> Self {
        Self::Ptr(p as usize)
    }
}

/// Reads arguments in order. Past the end every read is 0 or absent.
#[derive(Debug, Clone)]
pub(crate) struct ArgCursor<'s, 'a> {
    args: &'s [FormatArg<'a>],
    next: usize,
}

impl<'s, 'a> ArgCursor<'s, 'a> {
    pub(crate) fn new(args: &'s [FormatArg<'a>]) -> Self {
        Self { args, next: 0 }
    }

    fn take(&mut self) -> Option<FormatArg<'a>> {
        let arg = self.args.get(self.next).copied();
        self.next += 1;
        arg
    }

    /// A `*` width or precision. Negative values count as 0.
    pub(crate) fn count(&mut self) -> usize {
        let v = self.take().map_or(0, FormatArg::as_signed);
        usize::try_from(v).map_or(0, |v| v.min(MAX_COUNT))
    }

    pub(crate) fn signed(&mut self) -> i64 {
        self.take().map_or(0, FormatArg::as_signed)
    }

    pub(crate) fn unsigned(&mut self) -> u64 {
        self.take().map_or(0, FormatArg::as_unsigned)
    }

    pub(crate) fn narrow_char(&mut self) -> u8 {
        match self.take() {
            Some(FormatArg::Char(c)) => c,
            Some(other) => other.as_unsigned() as u8,
            None => 0,
        }
    }

    pub(crate) fn wide_char(&mut self) -> Unit {
        match self.take() {
            Some(FormatArg::WideChar(c)) => c,
            Some(other) => other.as_unsigned() as Unit,
            None => 0,
        }
    }

    pub(crate) fn narrow_str(&mut self) -> Option<&'a [u8]> {
        match self.take() {
            Some(FormatArg::Str(s)) => s,
            _ => None,
        }
    }

    pub(crate) fn wide_str(&mut self) -> Option<&'a [Unit]> {
        match self.take() {
            Some(FormatArg::WideStr(s)) => s,
            _ => None,
        }
    }

    /// Arguments read so far, including reads past the end.
    #[cfg(test)]
    pub(crate) fn consumed(&self) -> usize {
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions_pick_the_natural_variant() {
        assert_eq!(FormatArg::from(-3_i32), FormatArg::Int(-3));
        assert_eq!(FormatArg::from(7_u16), FormatArg::Uint(7));
        assert_eq!(FormatArg::from("hi"), FormatArg::Str(Some("hi".as_bytes())));
        assert_eq!(FormatArg::from(None::<&str>), FormatArg::Str(None));
        let wide: &[Unit] = &[0x41];
        assert_eq!(FormatArg::from(wide), FormatArg::WideStr(Some(wide)));
    }

    #[test]
    fn cursor_coerces_mismatches() {
        let args = [
            FormatArg::Uint(u64::MAX),
            FormatArg::Str(Some("x".as_bytes())),
            FormatArg::Int(65),
            FormatArg::Int(5),
            FormatArg::Char(b'z'),
        ];
        let mut cur = ArgCursor::new(&args);
        assert_eq!(cur.signed(), -1);
        assert_eq!(cur.unsigned(), 0);
        assert_eq!(cur.narrow_char(), b'A');
        assert_eq!(cur.narrow_str(), None);
        assert_eq!(cur.wide_char(), Unit::from(b'z'));
        assert_eq!(cur.consumed(), 5);
    }

    #[test]
    fn cursor_reads_zero_past_the_end() {
        let mut cur = ArgCursor::new(&[]);
        assert_eq!(cur.signed(), 0);
        assert_eq!(cur.count(), 0);
        assert_eq!(cur.wide_str(), None);
        assert_eq!(cur.consumed(), 3);
    }

    #[test]
    fn negative_counts_are_zero() {
        let args = [FormatArg::Int(-8), FormatArg::Int(12), FormatArg::Uint(u64::MAX)];
        let mut cur = ArgCursor::new(&args);
        assert_eq!(cur.count(), 0);
        assert_eq!(cur.count(), 12);
        assert_eq!(cur.count(), 0);
    }
}
