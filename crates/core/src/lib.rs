pub mod config;
pub mod domain;
pub mod errors;
pub mod normalize;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};
pub use domain::conversation::{ConversationHistory, ConversationTurn, Role};
pub use domain::finding::{
    Finding, FindingSummary, GuardrailAction, GuardrailFinding, OtherFinding, OtherKind, RuleRef,
    SatisfiabilityFinding, Scenario, Statement, Translation, ValidationFinding, ValidationVerdict,
};
pub use domain::test_case::{ExpectedResult, TestCase, TestSuite, TestSuiteError};
pub use errors::ApplicationError;
pub use normalize::{assistant_text, normalize, NormalizeError, ResponseShape};
