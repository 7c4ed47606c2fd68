//! Formatted string rendering.
//!
//! A small printf dialect rendered straight into an exact-length runtime
//! string. Rendering walks the format twice through the same traversal: once
//! into a [`Measure`] sink to learn the length, once into an [`Emit`] sink
//! over freshly allocated opaque storage of exactly that length.
//!
//! | Directive | Output |
//! |---|---|
//! | `%d` `%u` | signed / unsigned decimal |
//! | `%x` `%p` | lowercase hex, no prefix |
//! | `%c` `%C` | one narrow / wide character |
//! | `%s` `%S` | narrow / wide string, `(NULL)` when absent |
//! | `%%` | `%` |
//!
//! `-` left-aligns, `0` zero-pads numbers, `N` or `*` sets a width, `.N` or
//! `.*` truncates strings. Malformed directives render their `%` literally.

#![allow(unsafe_code)]

pub mod args;
pub mod directive;
pub mod sink;

pub use args::FormatArg;
pub use directive::{Conversion, Count, Directive, MAX_COUNT, Segment, Segments};
pub use sink::{Emit, Measure, Sink};

use crate::context::Context;
use crate::mem::facade;
use crate::string::{RtString, Unit};

use args::ArgCursor;

const NULL_TEXT: &[u8] = b"(NULL)";

/// Render `fmt` with `args` into a new immutable string.
///
/// The storage is allocated through the opaque path and sized exactly. A
/// result longer than [`MAX_COUNT`] units aborts before anything is
/// allocated.
#[cfg_attr(feature = "mem-debug", track_caller)]
pub fn render_format(ctx: &Context, fmt: &str, args: &[FormatArg<'_>]) -> RtString {
    let Some(len) = measure(fmt, args).filter(|&len| len <= MAX_COUNT) else {
        ctx.abort("formatted string exceeds the maximum string length")
    };
    let Some(block) = facade::new_text_array::<Unit>(ctx, len) else {
        return RtString::EMPTY;
    };
    // SAFETY: the block was just allocated for `len` units, is aligned for
    // `Unit`, and nothing else refers to it yet.
    let out = unsafe { std::slice::from_raw_parts_mut(block.as_ptr().cast::<Unit>(), len) };
    let mut emit = Emit::new(out);
    render_into(fmt, args, &mut emit);
    if !emit.is_exact() {
        ctx.abort("formatted string length changed between passes")
    }
    // SAFETY: all `len` units were written above and the block is not
    // written again.
    unsafe { RtString::from_raw_parts(Some(block), len) }
}

/// Number of units `fmt` renders to, or `None` if it overflows `usize`.
#[must_use]
pub fn measure(fmt: &str, args: &[FormatArg<'_>]) -> Option<usize> {
    let mut sink = Measure::new();
    render_into(fmt, args, &mut sink);
    sink.len()
}

/// Render into an owned vector without a runtime context.
#[must_use]
pub fn render_to_units(fmt: &str, args: &[FormatArg<'_>]) -> Vec<Unit> {
    let mut out = Vec::new();
    render_into(fmt, args, &mut out);
    out
}

/// Walk `fmt`, sending every rendered unit to `sink`.
pub fn render_into<S: Sink>(fmt: &str, args: &[FormatArg<'_>], sink: &mut S) {
    let mut cursor = ArgCursor::new(args);
    for segment in Segments::new(fmt) {
        match segment {
            Segment::Literal(text) => sink.put_str(text),
            Segment::Percent => sink.put(Unit::from(b'%')),
            Segment::Directive(d) if d.conversion.is_numeric() => {
                render_number(&d, &mut cursor, sink);
            }
            Segment::Directive(d) => render_text(&d, &mut cursor, sink),
        }
    }
}

fn resolve(count: Count, cursor: &mut ArgCursor<'_, '_>) -> Option<usize> {
    match count {
        Count::None => None,
        Count::Fixed(n) => Some(n),
        Count::FromArg => Some(cursor.count()),
    }
}

/// Write `value` in `base` into the tail of `buf`, returning the digit count.
fn render_digits(mut value: u64, base: u64, buf: &mut [u8; 64]) -> usize {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";
    let mut pos = buf.len();
    loop {
        pos -= 1;
        buf[pos] = DIGITS[(value % base) as usize];
        value /= base;
        if value == 0 {
            break;
        }
    }
    buf.len() - pos
}

fn render_number<S: Sink>(d: &Directive, cursor: &mut ArgCursor<'_, '_>, sink: &mut S) {
    let width = resolve(d.width, cursor).unwrap_or(0);
    let (magnitude, minus) = match d.conversion {
        Conversion::Signed => {
            let v = cursor.signed();
            (v.unsigned_abs(), v < 0)
        }
        _ => (cursor.unsigned(), false),
    };

    let mut buf = [0_u8; 64];
    let count = render_digits(magnitude, d.conversion.base(), &mut buf);
    let digits = &buf[buf.len() - count..];
    let pad = width.saturating_sub(count + usize::from(minus));

    // Sign goes before zeros but after space padding.
    let dash = usize::from(minus);
    if d.zero_pad {
        sink.put_repeat(Unit::from(b'-'), dash);
        sink.put_repeat(Unit::from(b'0'), pad);
    } else if !d.left_align {
        sink.put_repeat(Unit::from(b' '), pad);
        sink.put_repeat(Unit::from(b'-'), dash);
    } else {
        sink.put_repeat(Unit::from(b'-'), dash);
    }
    sink.put_narrow(digits);
    if d.left_align {
        sink.put_repeat(Unit::from(b' '), pad);
    }
}

#[derive(Clone, Copy)]
enum Text<'a> {
    Narrow(&'a [u8]),
    Wide(&'a [Unit]),
}

impl Text<'_> {
    fn len(self) -> usize {
        match self {
            Self::Narrow(b) => b.len(),
            Self::Wide(u) => u.len(),
        }
    }

    fn truncate(self, n: usize) -> Self {
        match self {
            Self::Narrow(b) => Self::Narrow(&b[..n.min(b.len())]),
            Self::Wide(u) => Self::Wide(&u[..n.min(u.len())]),
        }
    }

    fn put<S: Sink>(self, sink: &mut S) {
        match self {
            Self::Narrow(b) => sink.put_narrow(b),
            Self::Wide(u) => sink.put_wide(u),
        }
    }
}

fn render_text<S: Sink>(d: &Directive, cursor: &mut ArgCursor<'_, '_>, sink: &mut S) {
    let width = resolve(d.width, cursor).unwrap_or(0);
    let precision = resolve(d.precision, cursor);

    let narrow_char;
    let wide_char;
    let text = match d.conversion {
        Conversion::Char => {
            narrow_char = [cursor.narrow_char()];
            Text::Narrow(&narrow_char)
        }
        Conversion::WideChar => {
            wide_char = [cursor.wide_char()];
            Text::Wide(&wide_char)
        }
        Conversion::Str => match cursor.narrow_str() {
            Some(s) => {
                let end = s.iter().position(|&b| b == 0).unwrap_or(s.len());
                Text::Narrow(&s[..end])
            }
            None => Text::Narrow(NULL_TEXT),
        },
        _ => match cursor.wide_str() {
            Some(s) => Text::Wide(s),
            None => Text::Narrow(NULL_TEXT),
        },
    };
    let text = match precision {
        Some(p) => text.truncate(p),
        None => text,
    };

    let pad = width.saturating_sub(text.len());
    if !d.left_align {
        sink.put_repeat(Unit::from(b' '), pad);
    }
    text.put(sink);
    if d.left_align {
        sink.put_repeat(Unit::from(b' '), pad);
    }
}

/// Render a format string into a new [`RtString`](crate::RtString).
///
/// ```ignore
/// let s = rt_format!(&ctx, "%s=%05d", "count", 42);
/// ```
#[macro_export]
macro_rules! rt_format {
    ($ctx:expr, $fmt:expr $(, $arg:expr)* $(,)?) => {
        $crate::format::render_format(
            $ctx,
            $fmt,
            &[$($crate::format::FormatArg::from($arg)),*],
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fatal::guard;
    use crate::mem::heap::HeapBackend;
    use std::sync::Arc;

    fn r(fmt: &str, args: &[FormatArg<'_>]) -> String {
        let units = render_to_units(fmt, args);
        assert_eq!(measure(fmt, args), Some(units.len()), "measure for {fmt:?}");
        String::from_utf16_lossy(&units)
    }

    fn heap_ctx() -> (Arc<HeapBackend>, Context) {
        let heap = Arc::new(HeapBackend::new());
        let ctx = Context::new(Arc::new(heap.install())).unwrap();
        (heap, ctx)
    }

    #[test]
    fn decimal_width_and_padding() {
        assert_eq!(r("%5d", &[42.into()]), "   42");
        assert_eq!(r("%05d", &[(-3).into()]), "-0003");
        assert_eq!(r("%-5d|", &[(-3).into()]), "-3   |");
        assert_eq!(r("%5d", &[(-3).into()]), "   -3");
        assert_eq!(r("%2d", &[12345.into()]), "12345");
        assert_eq!(r("%d", &[0.into()]), "0");
        assert_eq!(r("%d", &[i64::MIN.into()]), "-9223372036854775808");
        assert_eq!(r("%u", &[(-1).into()]), "18446744073709551615");
    }

    #[test]
    fn hex_and_pointer() {
        assert_eq!(r("%x", &[255_u32.into()]), "ff");
        assert_eq!(r("%08x", &[0xBEEF_u32.into()]), "0000beef");
        assert_eq!(r("%x", &[(-1_i64).into()]), "ffffffffffffffff");
        assert_eq!(r("%p", &[FormatArg::Ptr(0x1000)]), "1000");
        assert_eq!(r("%-6p|", &[FormatArg::Ptr(0xab)]), "ab    |");
        assert_eq!(r("%06p", &[FormatArg::Ptr(0xab)]), "0000ab");
    }

    #[test]
    fn characters() {
        assert_eq!(
            r("%c%C", &[FormatArg::Char(b'o'), FormatArg::WideChar(0x263A)]),
            "o\u{263A}"
        );
        assert_eq!(r("%-4c|", &[FormatArg::Char(b'x')]), "x   |");
        assert_eq!(r("%3C", &[FormatArg::WideChar(0x41)]), "  A");
    }

    #[test]
    fn strings_with_width_and_precision() {
        assert_eq!(r("%-6.3s", &["hello".into()]), "hel   ");
        assert_eq!(r("%5s|", &["ab".into()]), "   ab|");
        assert_eq!(r("%.10s", &["short".into()]), "short");
        assert_eq!(r("%s", &[FormatArg::Str(Some("ab\0cd".as_bytes()))]), "ab");
        let wide: Vec<Unit> = "wide".encode_utf16().collect();
        assert_eq!(r("%S", &[wide.as_slice().into()]), "wide");
        assert_eq!(r("%.2S", &[wide.as_slice().into()]), "wi");
    }

    #[test]
    fn absent_strings_render_null() {
        assert_eq!(r("%s", &[FormatArg::Str(None)]), "(NULL)");
        assert_eq!(r("%S", &[FormatArg::WideStr(None)]), "(NULL)");
        assert_eq!(r("%.3s", &[FormatArg::Str(None)]), "(NU");
        assert_eq!(r("%s", &[]), "(NULL)");
        assert_eq!(r("%s", &[7.into()]), "(NULL)");
    }

    #[test]
    fn star_width_and_precision() {
        let args = [4.into(), 7.into(), 3.into(), 8.into()];
        assert_eq!(r("%*d|%-*d|", &args), "   7|8  |");
        assert_eq!(r("%*d", &[(-5).into(), 9.into()]), "9");
        assert_eq!(r("%.*s|", &[(-1).into(), "abc".into()]), "|");
        assert_eq!(r("%*.*s|", &[4.into(), 2.into(), "abc".into()]), "  ab|");
    }

    #[test]
    fn percent_literals() {
        assert_eq!(r("%%", &[]), "%");
        assert_eq!(r("100%", &[]), "100%");
        assert_eq!(r("%", &[]), "%");
        assert_eq!(r("a%%b", &[]), "a%b");
    }

    #[test]
    fn malformed_directives_pass_through() {
        assert_eq!(r("%q", &[]), "%q");
        assert_eq!(r("%-0d|%d", &[5.into()]), "%-0d|5");
        assert_eq!(r("%.5d|%d", &[1.into()]), "%.5d|1");
        assert_eq!(r("%0s|%s", &["x".into()]), "%0s|x");
        assert_eq!(r("%.", &[]), "%.");
        assert_eq!(r("%5", &[]), "%5");
        assert_eq!(r("%.x", &[]), "%.x");
    }

    #[test]
    fn missing_and_mismatched_arguments() {
        assert_eq!(r("%d|%x", &[]), "0|0");
        assert_eq!(r("%d", &["str".into()]), "0");
        assert_eq!(r("%d", &[u64::MAX.into()]), "-1");
        assert_eq!(r("%c", &[65.into()]), "A");
    }

    #[test]
    fn literal_text_is_utf16_encoded() {
        assert_eq!(r("é=%d", &[1.into()]), "é=1");
    }

    #[test]
    fn render_format_allocates_exactly() {
        let (heap, ctx) = heap_ctx();
        let s = render_format(&ctx, "%5d", &[42.into()]);
        assert_eq!(s, "   42");
        assert_eq!(heap.live_bytes(), 10);
        assert_eq!(heap.stats().opaque_allocations, 1);
        assert_eq!(heap.stats().allocations, 1);
    }

    #[test]
    fn empty_render_allocates_nothing() {
        let (heap, ctx) = heap_ctx();
        let s = render_format(&ctx, "", &[]);
        assert!(s.is_empty());
        assert_eq!(heap.live_blocks(), 0);
        let s = render_format(&ctx, "%.0s", &["gone".into()]);
        assert!(s.is_empty());
    }

    #[test]
    fn render_format_propagates_exhaustion() {
        let heap = Arc::new(HeapBackend::with_limit(4));
        let ctx = Context::new(Arc::new(heap.install())).unwrap();
        let out = guard(|| render_format(&ctx, "%s", &["too long".into()]));
        assert_eq!(out, Err(crate::Fatal::MemoryExhausted));
    }

    #[test]
    fn render_past_max_count_aborts_before_allocating() {
        let (heap, ctx) = heap_ctx();
        let wide = i64::from(i32::MAX);
        let args: [FormatArg<'_>; 4] = [wide.into(), 1.into(), wide.into(), 1.into()];
        assert_eq!(measure("%*d%*d", &args), Some(2 * MAX_COUNT));
        let out = guard(|| render_format(&ctx, "%*d%*d", &args));
        assert!(matches!(out, Err(crate::Fatal::Abort(msg)) if msg.contains("maximum string length")));
        assert_eq!(heap.stats().allocations, 0);
    }

    #[test]
    fn macro_converts_arguments() {
        let (_heap, ctx) = heap_ctx();
        let name = "count";
        let s = rt_format!(&ctx, "%s=%05d%%", name, 42);
        assert_eq!(s, "count=00042%");
        let plain = rt_format!(&ctx, "plain",);
        assert_eq!(plain, "plain");
    }
}
