//! Markdown and JSON renderings of a verify run.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::error::HarnessError;
use crate::verify::RunSummary;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyReport {
    pub title: String,
    pub timestamp: String,
    pub summary: RunSummary,
}

impl VerifyReport {
    /// Counts per function, then one section per failing case with its diff.
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let overall = self.summary.overall;
        let mut out = format!("# {}\n\n_{}_\n\n", self.title, self.timestamp);
        let _ = writeln!(
            out,
            "{} of {} cases passed.\n",
            overall.passed,
            overall.total()
        );

        out.push_str("| Function | Passed | Failed |\n|---|---:|---:|\n");
        for (function, tally) in &self.summary.by_function {
            let _ = writeln!(out, "| `{function}` | {} | {} |", tally.passed, tally.failed);
        }

        if self.summary.clean() {
            return out;
        }
        out.push_str("\n## Failures\n");
        for case in self.summary.failures() {
            let _ = writeln!(out, "\n### {}\n", case.label());
            if !case.reference.is_empty() {
                let _ = writeln!(out, "{}\n", case.reference);
            }
            let body = case
                .diff
                .clone()
                .unwrap_or_else(|| format!("expected: {}\nactual:   {}", case.expected, case.actual));
            let _ = writeln!(out, "```\n{body}\n```");
        }
        out
    }

    pub fn to_json(&self) -> Result<String, HarnessError> {
        serde_json::to_string_pretty(self).map_err(HarnessError::ReportJson)
    }
}
