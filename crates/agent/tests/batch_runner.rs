use std::collections::VecDeque;
use std::fs;
use std::sync::{Arc, Mutex};

use archeck_agent::{render_report, BatchRunner};
use archeck_bedrock::{ApplyGuardrailRequest, GuardrailService, TransportError};
use archeck_core::{GuardrailAction, TestSuite};
use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::TempDir;

const SUITE: &str = r#"{
    "test_cases": [
        {
            "question": "What is a refund?",
            "answer": "A refund returns money to the customer.",
            "expected_result": "VALID"
        },
        {
            "question": "Can I get a refund 31 days after purchase?",
            "answer": "Yes, refunds are allowed at any time.",
            "expected_result": "INVALID"
        },
        { "question": "Can I get a refund after 31 days?", "expected_result": "SATISFIABLE" }
    ]
}"#;

/// Guardrail that answers from a queue; `None` entries simulate a transport failure.
struct QueuedGuardrail {
    replies: Mutex<VecDeque<Option<Value>>>,
}

#[async_trait]
impl GuardrailService for QueuedGuardrail {
    async fn apply_guardrail(
        &self,
        _guardrail_id: &str,
        _guardrail_version: &str,
        _request: &ApplyGuardrailRequest,
    ) -> Result<Value, TransportError> {
        match self.replies.lock().expect("lock").pop_front().flatten() {
            Some(reply) => Ok(reply),
            None => Err(TransportError::Service {
                operation: "ApplyGuardrail",
                code: Some("ThrottlingException".to_string()),
                message: "throttled".to_string(),
            }),
        }
    }
}

fn reasoning(action: &str, finding: Value) -> Value {
    json!({
        "action": action,
        "assessments": [{ "automatedReasoningPolicy": { "findings": [finding] } }]
    })
}

fn load_suite() -> (TempDir, TestSuite) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("test_cases.json");
    fs::write(&path, SUITE).expect("write suite");
    let suite = TestSuite::load(&path).expect("suite");
    (dir, suite)
}

#[tokio::test]
async fn batch_counts_mismatches_and_errors_as_failures() {
    let (_dir, suite) = load_suite();
    let guardrail = Arc::new(QueuedGuardrail {
        replies: Mutex::new(VecDeque::from(vec![
            Some(reasoning("NONE", json!({ "valid": {} }))),
            Some(reasoning("GUARDRAIL_INTERVENED", json!({ "satisfiable": {} }))),
            None,
        ])),
    });

    let report = BatchRunner::new(guardrail, "gr-1", "1").run(&suite, None).await.expect("report");

    assert_eq!((report.total, report.passed, report.failed), (3, 1, 2));
    assert!(report.results[0].passed);
    assert_eq!(report.results[1].actual_result.as_deref(), Some("SATISFIABLE"));
    assert_eq!(report.results[1].action, Some(GuardrailAction::GuardrailIntervened));
    assert!(report.results[2].error.as_deref().is_some_and(|error| error.contains("ThrottlingException")));

    let text = render_report(&report);
    assert!(text.contains("Total Tests: 3"));
    assert!(text.contains("Success Rate: 33.3%"));
    assert!(text.contains("Test Case 2: expected INVALID, actual SATISFIABLE"));

    let json = serde_json::to_value(&report).expect("json");
    assert_eq!(json["results"][0]["expected_result"], "VALID");
    assert_eq!(json["failed"], 2);
}

#[tokio::test]
async fn all_passing_batch_reports_success() {
    let (_dir, suite) = load_suite();
    let guardrail = Arc::new(QueuedGuardrail {
        replies: Mutex::new(VecDeque::from(vec![
            Some(reasoning("NONE", json!({ "valid": {} }))),
            Some(reasoning("GUARDRAIL_INTERVENED", json!({ "invalid": {} }))),
            Some(reasoning("NONE", json!({ "satisfiable": {} }))),
        ])),
    });

    let report = BatchRunner::new(guardrail, "gr-1", "1").run(&suite, None).await.expect("report");

    assert!(report.all_passed());
    assert!(!render_report(&report).contains("FAILED TEST DETAILS"));
}
