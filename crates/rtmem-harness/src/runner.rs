//! Test execution engine.

use std::sync::Arc;

use rtmem_core::fatal::guard;
use rtmem_core::format::{measure, render_format};
use rtmem_core::{Context, FormatArg, GrowPolicy, HeapBackend};

use crate::args::parse_args;
use crate::diff;
use crate::error::HarnessError;
use crate::fixtures::{FixtureCase, FixtureSet, GrowInputs, RenderInputs};
use crate::grow_trace::{live_trace, plan_trace};
use crate::verify::CaseOutcome;

/// Output of one executed case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseRun {
    pub output: String,
    /// Internal disagreement worth reporting even if the output matches.
    pub note: Option<String>,
}

/// Runs a fixture set and collects verification results.
pub struct TestRunner {
    /// Name of the verification campaign.
    pub campaign: String,
}

impl TestRunner {
    #[must_use]
    pub fn new(campaign: impl Into<String>) -> Self {
        Self {
            campaign: campaign.into(),
        }
    }

    /// Run all fixtures in a set and return results.
    pub fn run(&self, fixture_set: &FixtureSet) -> Vec<CaseOutcome> {
        fixture_set
            .cases
            .iter()
            .map(|case| {
                let (actual, diff) = match execute_case(case) {
                    Ok(run) => {
                        let diff = if run.output != case.expected_output {
                            Some(diff::render_diff(&case.expected_output, &run.output))
                        } else {
                            run.note
                        };
                        (run.output, diff)
                    }
                    Err(err) => {
                        let actual = format!("unsupported:{err}");
                        let diff = Some(diff::render_diff(&case.expected_output, &actual));
                        (actual, diff)
                    }
                };
                let passed = actual == case.expected_output;
                if !passed {
                    tracing::warn!(
                        target: "rtmem::harness",
                        campaign = %self.campaign,
                        family = %fixture_set.family,
                        case = %case.name,
                        "fixture case failed"
                    );
                }
                CaseOutcome {
                    family: fixture_set.family.clone(),
                    function: case.function.clone(),
                    case_name: case.name.clone(),
                    reference: case.reference.clone(),
                    passed,
                    expected: case.expected_output.clone(),
                    actual,
                    diff,
                }
            })
            .collect()
    }
}

fn inputs<T: serde::de::DeserializeOwned>(case: &FixtureCase) -> Result<T, HarnessError> {
    serde_json::from_value(case.inputs.clone()).map_err(|e| HarnessError::BadCase {
        case: case.name.clone(),
        reason: e.to_string(),
    })
}

/// Execute one case against a fresh heap-backed context.
pub fn execute_case(case: &FixtureCase) -> Result<CaseRun, HarnessError> {
    match case.function.as_str() {
        "render" => run_render(&inputs(case)?),
        "grow" => run_grow(&inputs(case)?),
        other => Err(HarnessError::BadCase {
            case: case.name.clone(),
            reason: format!("unknown function {other:?}"),
        }),
    }
}

/// Render `inputs.format` and report a length disagreement between passes.
pub fn run_render(inputs: &RenderInputs) -> Result<CaseRun, HarnessError> {
    let values = parse_args(&inputs.args)?;
    let args: Vec<FormatArg<'_>> = values.iter().map(|v| v.as_format_arg()).collect();
    let heap = Arc::new(HeapBackend::new());
    let ctx = Context::new(Arc::new(heap.install()))?;

    let rendered = guard(|| render_format(&ctx, &inputs.format, &args));
    let measured = measure(&inputs.format, &args);
    let run = match rendered {
        Ok(s) => {
            let note = (measured != Some(s.len()))
                .then(|| format!("measured {measured:?} units, emitted {}", s.len()));
            CaseRun {
                output: s.to_string_lossy(),
                note,
            }
        }
        Err(fatal) => CaseRun {
            output: format!("fatal:{fatal}"),
            note: None,
        },
    };
    Ok(run)
}

/// Trace growth and report a disagreement between planner and buffer.
pub fn run_grow(inputs: &GrowInputs) -> Result<CaseRun, HarnessError> {
    let policy = GrowPolicy {
        initial_bytes: inputs.initial_bytes.unwrap_or(GrowPolicy::INITIAL_BYTES),
        maximum_bytes: inputs.maximum_bytes.unwrap_or(GrowPolicy::MAXIMUM_BYTES),
    };
    let planned = plan_trace(&policy, inputs.element_size, &inputs.targets, inputs.text)?;
    let live = live_trace(&policy, inputs.element_size, &inputs.targets, inputs.text)?;
    let note = (planned != live).then(|| {
        format!(
            "planner and buffer disagree: planned {}, live {}",
            planned.summary(),
            live.summary()
        )
    });
    Ok(CaseRun {
        output: planned.summary(),
        note,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(cases: &str) -> FixtureSet {
        FixtureSet::from_json(&format!(
            r#"{{"version":"v1","family":"smoke","captured_at":"2026-10-18T00:00:00Z","cases":[{cases}]}}"#
        ))
        .expect("valid fixture json")
    }

    #[test]
    fn render_cases_compare_output() {
        let fixture = set(
            r#"{"name":"pad","function":"render","inputs":{"format":"%05d","args":["int:-3"]},"expected_output":"-0003"},
               {"name":"wrong","function":"render","inputs":{"format":"%d","args":["int:1"]},"expected_output":"2"}"#,
        );
        let results = TestRunner::new("smoke").run(&fixture);
        assert_eq!(results.len(), 2);
        assert!(results[0].passed);
        assert!(results[0].diff.is_none());
        assert!(!results[1].passed);
        assert_eq!(results[1].actual, "1");
        assert!(results[1].diff.is_some());
    }

    #[test]
    fn grow_cases_compare_capacity_summary() {
        let fixture = set(
            r#"{"name":"small","function":"grow","inputs":{"element_size":4,"targets":[1,5,26],"initial_bytes":16,"maximum_bytes":100},"expected_output":"16,32,limit"}"#,
        );
        let results = TestRunner::new("smoke").run(&fixture);
        assert!(results[0].passed, "{:?}", results[0]);
    }

    #[test]
    fn unknown_functions_and_bad_args_are_unsupported() {
        let fixture = set(
            r#"{"name":"odd","function":"memcpy","inputs":{},"expected_output":"x"},
               {"name":"bad","function":"render","inputs":{"format":"%d","args":["int:nope"]},"expected_output":"0"}"#,
        );
        let results = TestRunner::new("smoke").run(&fixture);
        assert!(results.iter().all(|r| !r.passed));
        assert!(results.iter().all(|r| r.actual.starts_with("unsupported:")));
    }
}
