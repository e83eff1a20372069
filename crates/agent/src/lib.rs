//! Session orchestration for policy-checked conversations.
//!
//! This crate drives the interactive tester and the batch runner:
//! - Sends the conversation through one of three integration styles (`adapters`)
//! - Applies the guardrail before and after the model where the style needs it (`guardrails`)
//! - Injects an optional policy document into the system prompt (`prompt`, `document`)
//! - Runs the line-oriented REPL (`session`) and the test-case runner (`batch`)
//!
//! # Key Types
//!
//! - `ProviderAdapter` - One request/response exchange with the model
//! - `Session` - The REPL state machine and conversation history
//! - `BatchRunner` - Evaluates expected results against the guardrail
//!
//! # Safety Principle
//!
//! The guardrail decision is never inferred from model text. Every verdict comes
//! from a normalized guardrail response.

pub mod adapters;
pub mod batch;
pub mod commands;
pub mod document;
pub mod guardrails;
pub mod prompt;
pub mod provider;
pub mod render;
pub mod runtime;
pub mod session;

pub use adapters::{AgentFrameworkAdapter, ConverseAdapter, OpenAiAdapter};
pub use batch::{render_report, BatchError, BatchReport, BatchRunner, CaseResult};
pub use commands::{classify, SessionCommand, SessionInput};
pub use document::{DocumentError, DocumentExtractor};
pub use guardrails::GuardrailHook;
pub use prompt::PolicyPrompt;
pub use provider::{GuardrailCheck, GuardrailStage, ProviderAdapter, ProviderError, ProviderExchange};
pub use runtime::{AgentHook, AgentRuntime};
pub use session::{ExitReason, Session, SessionReport, SessionSettings, SessionState};
