//! Diff rendering for fixture comparison.

/// Show both sides with visible padding. Rendered strings are usually one
/// line, so a line diff is no help; spaces are shown as `·`.
#[must_use]
pub fn render_diff(expected: &str, actual: &str) -> String {
    if expected == actual {
        return String::from("[identical]");
    }
    let visible = |s: &str| s.replace(' ', "\u{b7}");
    let mut out = String::new();
    out.push_str("--- expected\n");
    out.push_str("+++ actual\n");
    for (i, (e, a)) in expected.lines().zip(actual.lines()).enumerate() {
        if e != a {
            out.push_str(&format!("@@ line {} @@\n", i + 1));
            out.push_str(&format!("-{}\n", visible(e)));
            out.push_str(&format!("+{}\n", visible(a)));
        }
    }
    let (e_lines, a_lines) = (expected.lines().count(), actual.lines().count());
    if e_lines != a_lines || expected.is_empty() || actual.is_empty() {
        out.push_str(&format!("-{:?}\n+{:?}\n", expected, actual));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_inputs_say_so() {
        assert_eq!(render_diff("x", "x"), "[identical]");
    }

    #[test]
    fn padding_is_visible() {
        let diff = render_diff("   42", "  42");
        assert!(diff.contains("-\u{b7}\u{b7}\u{b7}42"));
        assert!(diff.contains("+\u{b7}\u{b7}42"));
    }

    #[test]
    fn empty_side_is_quoted() {
        let diff = render_diff("", "x");
        assert!(diff.contains("-\"\""));
    }
}
