use rtmem_core::format::{FormatArg, measure, render_format, render_to_units};
use rtmem_core::{Context, Fatal, HeapBackend, RtString, rt_format};
use std::sync::Arc;

fn context() -> (Arc<HeapBackend>, Context) {
    let heap = Arc::new(HeapBackend::new());
    let ctx = Context::new(Arc::new(heap.install())).expect("default policy");
    (heap, ctx)
}

#[test]
fn documented_examples_render_exactly() {
    let (_heap, ctx) = context();
    let cases: [(&str, Vec<FormatArg<'_>>, &str); 5] = [
        ("%5d", vec![42.into()], "   42"),
        ("%05d", vec![(-3).into()], "-0003"),
        ("%-6.3s", vec!["hello".into()], "hel   "),
        ("%s", vec![FormatArg::Str(None)], "(NULL)"),
        ("%q", vec![], "%q"),
    ];
    for (fmt, args, expected) in cases {
        let s = render_format(&ctx, fmt, &args);
        assert_eq!(s.to_string(), expected, "fmt={fmt:?}");
        assert_eq!(s.len(), expected.len(), "fmt={fmt:?}");
    }
}

#[test]
fn rendered_strings_feed_wide_directives() {
    let (heap, ctx) = context();
    let name = rt_format!(&ctx, "%s-%u", "node", 7_u32);
    let line = rt_format!(&ctx, "[%-8S]", &name);
    assert_eq!(line, "[node-7  ]");
    assert_eq!(heap.stats().opaque_allocations, 2);
    assert_eq!(heap.live_bytes(), (6 + 10) * 2);
}

#[test]
fn measure_agrees_with_every_output_path() {
    let wide: Vec<u16> = "wide".encode_utf16().collect();
    let fmts = [
        "",
        "plain",
        "%d%u%x%p",
        "%-5c|%5C|",
        "%*.*s|%.2S",
        "%-0d %.3d %0s %. %",
        "100%%",
    ];
    let args = [
        FormatArg::Int(-12),
        FormatArg::Uint(12),
        FormatArg::Uint(0xfeed),
        FormatArg::Ptr(0x10),
        FormatArg::Char(b'z'),
        FormatArg::WideStr(Some(wide.as_slice())),
    ];
    let (_heap, ctx) = context();
    for fmt in fmts {
        let units = render_to_units(fmt, &args);
        assert_eq!(measure(fmt, &args), Some(units.len()), "fmt={fmt:?}");
        let s = render_format(&ctx, fmt, &args);
        assert_eq!(s.as_units(), units.as_slice(), "fmt={fmt:?}");
    }
}

#[test]
fn exhaustion_during_render_is_fatal() {
    let heap = Arc::new(HeapBackend::with_limit(8));
    let ctx = Context::new(Arc::new(heap.install())).expect("default policy");
    let short = rtmem_core::fatal::guard(|| rt_format!(&ctx, "%d", 1234));
    assert_eq!(short.map(|s| s.to_string()), Ok("1234".to_owned()));
    let long = rtmem_core::fatal::guard(|| rt_format!(&ctx, "%20d", 1));
    assert_eq!(long.map(|s: RtString| s.len()), Err(Fatal::MemoryExhausted));
}
