//! Case outcomes and the tallies built from them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// What one fixture case produced against what it expected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseOutcome {
    pub family: String,
    /// `render` or `grow`.
    pub function: String,
    pub case_name: String,
    /// Rule the case pins down.
    pub reference: String,
    pub passed: bool,
    pub expected: String,
    pub actual: String,
    /// Unified-style diff on failure, or a note the case left behind.
    pub diff: Option<String>,
}

impl CaseOutcome {
    /// `family/case`, the name failures are reported under.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}/{}", self.family, self.case_name)
    }
}

/// Pass/fail counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub passed: usize,
    pub failed: usize,
}

impl Tally {
    fn record(&mut self, passed: bool) {
        if passed {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.passed + self.failed
    }
}

/// Every outcome of a verify run, ordered by family, function and case,
/// with counts overall and per function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub overall: Tally,
    pub by_function: BTreeMap<String, Tally>,
    pub cases: Vec<CaseOutcome>,
}

impl RunSummary {
    #[must_use]
    pub fn collect(mut cases: Vec<CaseOutcome>) -> Self {
        cases.sort_by(|a, b| {
            (&a.family, &a.function, &a.case_name).cmp(&(&b.family, &b.function, &b.case_name))
        });
        let mut overall = Tally::default();
        let mut by_function: BTreeMap<String, Tally> = BTreeMap::new();
        for case in &cases {
            overall.record(case.passed);
            by_function
                .entry(case.function.clone())
                .or_default()
                .record(case.passed);
        }
        Self {
            overall,
            by_function,
            cases,
        }
    }

    /// True when no case failed.
    #[must_use]
    pub fn clean(&self) -> bool {
        self.overall.failed == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &CaseOutcome> {
        self.cases.iter().filter(|c| !c.passed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(family: &str, function: &str, name: &str, passed: bool) -> CaseOutcome {
        CaseOutcome {
            family: family.to_owned(),
            function: function.to_owned(),
            case_name: name.to_owned(),
            reference: String::new(),
            passed,
            expected: String::from("x"),
            actual: String::from(if passed { "x" } else { "y" }),
            diff: None,
        }
    }

    #[test]
    fn counts_split_by_function() {
        let summary = RunSummary::collect(vec![
            outcome("format/basic", "render", "a", true),
            outcome("format/basic", "render", "b", false),
            outcome("grow/default", "grow", "c", true),
        ]);
        assert_eq!(summary.overall, Tally { passed: 2, failed: 1 });
        assert_eq!(summary.by_function["render"], Tally { passed: 1, failed: 1 });
        assert_eq!(summary.by_function["grow"].total(), 1);
        assert!(!summary.clean());
        let failed: Vec<_> = summary.failures().map(CaseOutcome::label).collect();
        assert_eq!(failed, ["format/basic/b"]);
    }

    #[test]
    fn cases_are_ordered_by_family_then_name() {
        let summary = RunSummary::collect(vec![
            outcome("grow/default", "grow", "z", true),
            outcome("format/basic", "render", "m", true),
            outcome("format/basic", "render", "a", true),
        ]);
        let order: Vec<_> = summary.cases.iter().map(CaseOutcome::label).collect();
        assert_eq!(order, ["format/basic/a", "format/basic/m", "grow/default/z"]);
        assert!(summary.clean());
    }
}
