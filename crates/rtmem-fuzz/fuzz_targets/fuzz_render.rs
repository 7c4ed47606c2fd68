#![no_main]
use libfuzzer_sys::fuzz_target;
use rtmem_core::format::{FormatArg, measure, render_to_units};

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }
    let split = usize::from(data[0]) % data.len();
    let (fmt, rest) = data[1..].split_at(split.min(data.len() - 1));
    let Ok(fmt) = std::str::from_utf8(fmt) else {
        return;
    };
    // Long digit runs ask for gigabyte widths.
    if fmt.as_bytes().windows(5).any(|w| w.iter().all(u8::is_ascii_digit)) {
        return;
    }

    let wide: Vec<u16> = rest.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]])).collect();
    let args = [
        FormatArg::Int(i64::from(rest.first().copied().unwrap_or(0) as i8)),
        FormatArg::Uint(rest.len() as u64),
        FormatArg::Str(Some(rest)),
        FormatArg::WideStr(Some(wide.as_slice())),
        FormatArg::Ptr(0xdead),
        FormatArg::Str(None),
    ];
    let units = render_to_units(fmt, &args);
    assert_eq!(measure(fmt, &args), Some(units.len()));
});
