use std::fmt::Write as _;
use std::sync::Arc;

use archeck_bedrock::{ApplyGuardrailRequest, GuardrailContent, GuardrailService};
use archeck_core::{normalize, ExpectedResult, Finding, GuardrailAction, TestCase, TestSuite, TestSuiteError};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::render;

#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    Suite(#[from] TestSuiteError),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CaseResult {
    pub number: usize,
    pub question: Option<String>,
    pub answer: Option<String>,
    pub expected_result: ExpectedResult,
    pub actual_result: Option<String>,
    pub action: Option<GuardrailAction>,
    pub passed: bool,
    pub findings: Vec<Finding>,
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub success_rate: f64,
    pub results: Vec<CaseResult>,
}

impl BatchReport {
    fn from_results(results: Vec<CaseResult>) -> Self {
        let total = results.len();
        let passed = results.iter().filter(|result| result.passed).count();
        let success_rate = if total == 0 { 0.0 } else { passed as f64 / total as f64 * 100.0 };
        Self { total, passed, failed: total - passed, success_rate, results }
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Runs test cases against a guardrail through standalone guardrail application.
pub struct BatchRunner {
    service: Arc<dyn GuardrailService>,
    guardrail_id: String,
    guardrail_version: String,
}

impl BatchRunner {
    pub fn new(
        service: Arc<dyn GuardrailService>,
        guardrail_id: impl Into<String>,
        guardrail_version: impl Into<String>,
    ) -> Self {
        Self {
            service,
            guardrail_id: guardrail_id.into(),
            guardrail_version: guardrail_version.into(),
        }
    }

    /// Runs every case, or only the 1-based `selection`.
    pub async fn run(
        &self,
        suite: &TestSuite,
        selection: Option<usize>,
    ) -> Result<BatchReport, BatchError> {
        let cases: Vec<(usize, &TestCase)> = match selection {
            Some(number) => vec![(number, suite.select(number)?)],
            None => suite.test_cases.iter().enumerate().map(|(index, case)| (index + 1, case)).collect(),
        };

        let mut results = Vec::with_capacity(cases.len());
        for (number, case) in cases {
            results.push(self.run_case(number, case).await);
        }

        let report = BatchReport::from_results(results);
        info!(
            event_name = "batch.completed",
            total = report.total,
            passed = report.passed,
            failed = report.failed,
            "batch run completed"
        );
        Ok(report)
    }

    pub async fn run_case(&self, number: usize, case: &TestCase) -> CaseResult {
        let mut result = CaseResult {
            number,
            question: case.question().map(str::to_string),
            answer: case.answer().map(str::to_string),
            expected_result: case.expected_result,
            actual_result: None,
            action: None,
            passed: false,
            findings: Vec::new(),
            error: None,
        };

        let content = match GuardrailContent::for_exchange(case.question(), case.answer()) {
            Ok(content) => content,
            Err(error) => {
                result.error = Some(error.to_string());
                return result;
            }
        };

        let raw = match self
            .service
            .apply_guardrail(
                &self.guardrail_id,
                &self.guardrail_version,
                &ApplyGuardrailRequest::output(content),
            )
            .await
        {
            Ok(raw) => raw,
            Err(error) => {
                warn!(event_name = "batch.case_failed", case = number, error = %error, "guardrail call failed");
                result.error = Some(error.to_string());
                return result;
            }
        };

        match normalize(&raw) {
            Ok(outcome) => {
                result.actual_result = outcome.final_label().map(str::to_string);
                result.passed = result.actual_result.as_deref() == Some(case.expected_result.as_str());
                result.action = Some(outcome.action);
                result.findings = outcome.findings;
            }
            Err(error) => {
                warn!(event_name = "batch.case_malformed", case = number, error = %error, "unrecognized guardrail response");
                result.error = Some(error.to_string());
            }
        }

        info!(
            event_name = "batch.case_completed",
            case = number,
            expected = case.expected_result.as_str(),
            actual = result.actual_result.as_deref().unwrap_or("NONE"),
            passed = result.passed,
            "test case evaluated"
        );
        result
    }
}

/// Human-readable report: one block per case, then a summary and failure details.
pub fn render_report(report: &BatchReport) -> String {
    let mut text = String::new();
    for result in &report.results {
        let _ = writeln!(text, "{}", "-".repeat(80));
        let _ = writeln!(text, "Test case {}", result.number);
        if let Some(question) = &result.question {
            let _ = writeln!(text, "Question: {question}");
        }
        if let Some(answer) = &result.answer {
            let _ = writeln!(text, "Answer: {answer}");
        }
        let _ = writeln!(text, "Expected: {}", result.expected_result.as_str());
        let _ = writeln!(text, "Result: {}", result.actual_result.as_deref().unwrap_or("ERROR"));
        if let Some(error) = &result.error {
            let _ = writeln!(text, "Error: {error}");
        } else {
            text.push_str(&render::findings(&result.findings));
        }
        let _ = writeln!(text, "{}", if result.passed { "PASSED" } else { "FAILED" });
    }

    let _ = writeln!(text, "\n{}\nTEST RESULTS SUMMARY\n{}", "=".repeat(80), "=".repeat(80));
    let _ = writeln!(text, "Total Tests: {}", report.total);
    let _ = writeln!(text, "Passed: {}", report.passed);
    let _ = writeln!(text, "Failed: {}", report.failed);
    let _ = writeln!(text, "Success Rate: {:.1}%", report.success_rate);

    if report.failed > 0 {
        let _ = writeln!(text, "\n{}\nFAILED TEST DETAILS\n{}", "-".repeat(40), "-".repeat(40));
        for result in report.results.iter().filter(|result| !result.passed) {
            let _ = writeln!(
                text,
                "Test Case {}: expected {}, actual {}",
                result.number,
                result.expected_result.as_str(),
                result.actual_result.as_deref().or(result.error.as_deref()).unwrap_or("ERROR")
            );
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use archeck_core::{ExpectedResult, TestCase, TestSuite};
    use serde_json::json;

    use super::{render_report, BatchError, BatchRunner};
    use crate::adapters::fakes::FakeGuardrail;

    fn suite() -> TestSuite {
        TestSuite {
            test_cases: vec![
                TestCase {
                    question: Some("What is a refund?".to_string()),
                    answer: Some("A refund returns money to the customer.".to_string()),
                    expected_result: ExpectedResult::Valid,
                },
                TestCase {
                    question: None,
                    answer: Some("Refunds are available for 90 days.".to_string()),
                    expected_result: ExpectedResult::Invalid,
                },
            ],
        }
    }

    #[tokio::test]
    async fn last_finding_decides_and_failures_do_not_stop_the_batch() {
        let guardrail = Arc::new(FakeGuardrail::sequence(vec![
            json!({
                "action": "NONE",
                "assessments": [{ "automatedReasoningPolicy": { "findings": [{ "valid": {} }] } }]
            }),
            json!({ "nothing": "recognizable" }),
        ]));
        let runner = BatchRunner::new(guardrail.clone(), "gr-1", "DRAFT");

        let report = runner.run(&suite(), None).await.expect("report");

        assert_eq!(report.total, 2);
        assert_eq!(report.passed, 1);
        assert_eq!(report.failed, 1);
        assert!((report.success_rate - 50.0).abs() < f64::EPSILON);
        assert!(!report.all_passed());
        assert!(report.results[0].passed);
        assert!(report.results[1].error.is_some());

        let requests = guardrail.requests();
        assert_eq!(requests[0]["source"], "OUTPUT");
        assert_eq!(requests[1]["content"], json!([{ "text": { "text": "Refunds are available for 90 days." } }]));

        let text = render_report(&report);
        assert!(text.contains("Success Rate: 50.0%"));
        assert!(text.contains("FAILED TEST DETAILS"));
    }

    #[tokio::test]
    async fn single_selection_is_range_checked() {
        let runner = BatchRunner::new(Arc::new(FakeGuardrail::sequence(Vec::new())), "gr-1", "DRAFT");

        assert!(matches!(runner.run(&suite(), Some(3)).await, Err(BatchError::Suite(_))));

        let report = runner.run(&suite(), Some(2)).await.expect("report");
        assert_eq!(report.total, 1);
        assert_eq!(report.results[0].number, 2);
    }

    #[tokio::test]
    async fn transport_failure_marks_case_failed() {
        let runner = BatchRunner::new(Arc::new(FakeGuardrail::failing()), "gr-1", "DRAFT");

        let report = runner.run(&suite(), None).await.expect("report");
        assert_eq!(report.failed, 2);
        assert!(report.results.iter().all(|result| result.error.is_some()));
    }
}
