//! Format string parsing.
//!
//! Splits a format string into literal runs and `%` directives. Anything that
//! does not parse as a directive degrades to a literal `%`, after which
//! scanning resumes at the character following it.

/// Conversion character of a directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    /// `%d`
    Signed,
    /// `%u`
    Unsigned,
    /// `%x`
    Hex,
    /// `%p`
    Pointer,
    /// `%c`
    Char,
    /// `%C`
    WideChar,
    /// `%s`
    Str,
    /// `%S`
    WideStr,
}

impl Conversion {
    fn from_byte(b: u8) -> Option<Self> {
        Some(match b {
            b'd' => Self::Signed,
            b'u' => Self::Unsigned,
            b'x' => Self::Hex,
            b'p' => Self::Pointer,
            b'c' => Self::Char,
            b'C' => Self::WideChar,
            b's' => Self::Str,
            b'S' => Self::WideStr,
            _ => return None,
        })
    }

    /// Whether this conversion renders a number.
    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::Signed | Self::Unsigned | Self::Hex | Self::Pointer
        )
    }

    #[must_use]
    pub fn base(self) -> u64 {
        match self {
            Self::Hex | Self::Pointer => 16,
            _ => 10,
        }
    }
}

/// Width or precision of a directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Count {
    None,
    Fixed(usize),
    /// `*`: taken from the next argument.
    FromArg,
}

/// A parsed `%` directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Directive {
    pub left_align: bool,
    pub zero_pad: bool,
    pub width: Count,
    pub precision: Count,
    pub conversion: Conversion,
}

/// A piece of a format string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Text to emit verbatim. Also used for a `%` that did not parse.
    Literal(&'a str),
    /// `%%`
    Percent,
    Directive(Directive),
}

/// Upper bound for widths and precisions, matching a C `int`.
pub const MAX_COUNT: usize = i32::MAX as usize;

fn parse_decimal(digits: &[u8]) -> usize {
    digits
        .iter()
        .fold(0_usize, |acc, &d| {
            acc.saturating_mul(10).saturating_add(usize::from(d - b'0'))
        })
        .min(MAX_COUNT)
}

/// Parse a directive starting just after its `%`.
///
/// Returns the directive and the number of bytes consumed, or `None` when
/// the text is malformed: `-0`, a `.` without digits or `*`, a precision on
/// a numeric conversion, a `0` flag on a character or string conversion, an
/// unknown conversion, or the end of input.
#[must_use]
pub fn parse_directive(fmt: &[u8]) -> Option<(Directive, usize)> {
    let mut pos = 0;
    let at = |i: usize| fmt.get(i).copied();

    let mut left_align = false;
    let mut zero_pad = false;
    match at(pos) {
        Some(b'-') => {
            left_align = true;
            pos += 1;
            if at(pos) == Some(b'0') {
                return None;
            }
        }
        Some(b'0') => {
            zero_pad = true;
            pos += 1;
        }
        _ => {}
    }

    let width = match at(pos) {
        Some(b'*') => {
            pos += 1;
            Count::FromArg
        }
        Some(b) if b.is_ascii_digit() => {
            let start = pos;
            while at(pos).is_some_and(|b| b.is_ascii_digit()) {
                pos += 1;
            }
            Count::Fixed(parse_decimal(&fmt[start..pos]))
        }
        _ => Count::None,
    };

    let precision = if at(pos) == Some(b'.') {
        pos += 1;
        match at(pos) {
            Some(b'*') => {
                pos += 1;
                Count::FromArg
            }
            Some(b) if b.is_ascii_digit() => {
                let start = pos;
                while at(pos).is_some_and(|b| b.is_ascii_digit()) {
                    pos += 1;
                }
                Count::Fixed(parse_decimal(&fmt[start..pos]))
            }
            _ => return None,
        }
    } else {
        Count::None
    };

    let conversion = Conversion::from_byte(at(pos)?)?;
    pos += 1;

    if conversion.is_numeric() && precision != Count::None {
        return None;
    }
    if !conversion.is_numeric() && zero_pad {
        return None;
    }

    Some((
        Directive {
            left_align,
            zero_pad,
            width,
            precision,
            conversion,
        },
        pos,
    ))
}

/// Iterator over the [`Segment`]s of a format string.
#[derive(Debug, Clone)]
pub struct Segments<'a> {
    fmt: &'a str,
    pos: usize,
}

impl<'a> Segments<'a> {
    #[must_use]
    pub fn new(fmt: &'a str) -> Self {
        Self { fmt, pos: 0 }
    }
}

impl<'a> Iterator for Segments<'a> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Segment<'a>> {
        let bytes = self.fmt.as_bytes();
        let len = bytes.len();
        let start = self.pos;
        if start >= len {
            return None;
        }

        // A '%' that ends the string is literal text.
        let mut pos = start;
        while pos < len && !(bytes[pos] == b'%' && pos + 1 < len) {
            pos += 1;
        }
        if pos > start {
            self.pos = pos;
            return Some(Segment::Literal(&self.fmt[start..pos]));
        }

        // bytes[pos] is a '%' with at least one byte after it.
        let after = pos + 1;
        if bytes[after] == b'%' {
            self.pos = after + 1;
            return Some(Segment::Percent);
        }
        match parse_directive(&bytes[after..]) {
            Some((directive, consumed)) => {
                self.pos = after + consumed;
                Some(Segment::Directive(directive))
            }
            None => {
                self.pos = after;
                Some(Segment::Literal(&self.fmt[pos..after]))
            }
        }
    }
}
