//! Output side of the render traversal.

use crate::string::Unit;

/// Receives rendered units. [`Measure`] counts them, [`Emit`] stores them.
pub trait Sink {
    fn put(&mut self, unit: Unit);

    fn put_repeat(&mut self, unit: Unit, count: usize) {
        for _ in 0..count {
            self.put(unit);
        }
    }

    /// Narrow bytes, widened one unit per byte.
    fn put_narrow(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.put(Unit::from(b));
        }
    }

    fn put_wide(&mut self, units: &[Unit]) {
        for &u in units {
            self.put(u);
        }
    }

    fn put_str(&mut self, text: &str) {
        for u in text.encode_utf16() {
            self.put(u);
        }
    }
}

/// Counts units without storing them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Measure {
    len: usize,
    overflowed: bool,
}

impl Measure {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Units counted, or `None` if the count overflowed.
    #[must_use]
    pub fn len(&self) -> Option<usize> {
        (!self.overflowed).then_some(self.len)
    }

    fn add(&mut self, n: usize) {
        match self.len.checked_add(n) {
            Some(len) => self.len = len,
            None => self.overflowed = true,
        }
    }
}

impl Sink for Measure {
    fn put(&mut self, _unit: Unit) {
        self.add(1);
    }

    fn put_repeat(&mut self, _unit: Unit, count: usize) {
        self.add(count);
    }

    fn put_narrow(&mut self, bytes: &[u8]) {
        self.add(bytes.len());
    }

    fn put_wide(&mut self, units: &[Unit]) {
        self.add(units.len());
    }

    fn put_str(&mut self, text: &str) {
        self.add(text.encode_utf16().count());
    }
}

/// Writes units into a fixed buffer. Units past its end are dropped and
/// flagged.
#[derive(Debug)]
pub struct Emit<'a> {
    out: &'a mut [Unit],
    written: usize,
    overflowed: bool,
}

impl<'a> Emit<'a> {
    #[must_use]
    pub fn new(out: &'a mut [Unit]) -> Self {
        Self {
            out,
            written: 0,
            overflowed: false,
        }
    }

    /// Whether exactly the whole buffer was written.
    #[must_use]
    pub fn is_exact(&self) -> bool {
        !self.overflowed && self.written == self.out.len()
    }

    #[must_use]
    pub fn written(&self) -> usize {
        self.written
    }
}

impl Sink for Emit<'_> {
    fn put(&mut self, unit: Unit) {
        match self.out.get_mut(self.written) {
            Some(slot) => {
                *slot = unit;
                self.written += 1;
            }
            None => self.overflowed = true,
        }
    }

    fn put_repeat(&mut self, unit: Unit, count: usize) {
        let room = self.out.len() - self.written;
        let n = count.min(room);
        self.out[self.written..self.written + n].fill(unit);
        self.written += n;
        if count > room {
            self.overflowed = true;
        }
    }
}

impl Sink for Vec<Unit> {
    fn put(&mut self, unit: Unit) {
        self.push(unit);
    }

    fn put_repeat(&mut self, unit: Unit, count: usize) {
        self.resize(self.len() + count, unit);
    }

    fn put_wide(&mut self, units: &[Unit]) {
        self.extend_from_slice(units);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drive(sink: &mut impl Sink) {
        sink.put(Unit::from(b'['));
        sink.put_repeat(Unit::from(b' '), 3);
        sink.put_narrow(b"ab");
        sink.put_wide(&[0x263A]);
        sink.put_str("é]");
    }

    #[test]
    fn measure_matches_vec_output() {
        let mut measure = Measure::new();
        drive(&mut measure);
        let mut out = Vec::new();
        drive(&mut out);
        assert_eq!(measure.len(), Some(out.len()));
        assert_eq!(String::from_utf16_lossy(&out), "[   ab\u{263A}é]");
    }

    #[test]
    fn measure_flags_overflow() {
        let mut measure = Measure::new();
        measure.put_repeat(0, usize::MAX);
        measure.put(0);
        assert_eq!(measure.len(), None);
    }

    #[test]
    fn emit_fills_exactly_or_flags() {
        let mut buf = [0; 9];
        let mut emit = Emit::new(&mut buf);
        drive(&mut emit);
        assert!(emit.is_exact());
        assert_eq!(emit.written(), 9);

        let mut short = [0; 4];
        let mut emit = Emit::new(&mut short);
        drive(&mut emit);
        assert!(!emit.is_exact());
        assert_eq!(emit.written(), 4);
        assert_eq!(short, [0x5B, 0x20, 0x20, 0x20]);
    }
}
