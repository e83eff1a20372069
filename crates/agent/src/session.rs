//! Interactive read-eval-print loop shared by every integration style.
//!
//! One line is read at a time. Commands are handled in place; any other text is
//! appended as a user turn and dispatched through the [`ProviderAdapter`]. Only
//! one provider call is ever in flight.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use archeck_core::{
    normalize, AppConfig, ApplicationError, ConversationHistory, ConversationTurn,
    GuardrailFinding, NormalizeError,
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::commands::{classify, SessionCommand, SessionInput};
use crate::provider::{GuardrailStage, ProviderAdapter, ProviderExchange};
use crate::render::{self, StatusView};

const PROMPT: &str = "\nYou: ";

/// Settings the session displays and passes along; fixed for the session's lifetime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSettings {
    pub guardrail_id: String,
    pub guardrail_version: String,
    pub model_id: String,
    pub region: String,
    pub endpoint: String,
    pub policy_document: Option<PathBuf>,
    pub history_limit: usize,
}

impl SessionSettings {
    pub fn from_config(config: &AppConfig, endpoint: impl Into<String>) -> Self {
        Self {
            guardrail_id: config.guardrail.id.clone(),
            guardrail_version: config.guardrail.version.clone(),
            model_id: config.model.id.clone(),
            region: config.effective_region().to_string(),
            endpoint: endpoint.into(),
            policy_document: config.session.policy_document.clone(),
            history_limit: config.session.history_limit,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    AwaitingInput,
    Dispatching,
    Rendering,
    Terminated,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    Command,
    EndOfInput,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionReport {
    pub correlation_id: String,
    pub turns_dispatched: usize,
    pub failures: usize,
    pub interventions: usize,
    pub malformed_responses: usize,
    pub exit_reason: ExitReason,
}

/// Normalized result of one guardrail check.
#[derive(Clone, Debug, PartialEq)]
pub struct CheckOutcome {
    pub stage: GuardrailStage,
    pub result: Result<GuardrailFinding, NormalizeError>,
}

impl CheckOutcome {
    fn intervened(&self) -> bool {
        matches!(&self.result, Ok(finding) if finding.action.is_intervention())
    }
}

pub struct Session {
    adapter: Arc<dyn ProviderAdapter>,
    settings: SessionSettings,
    history: ConversationHistory,
    state: SessionState,
    correlation_id: String,
    turns_dispatched: usize,
    failures: usize,
    interventions: usize,
    malformed_responses: usize,
}

impl Session {
    pub fn new(adapter: Arc<dyn ProviderAdapter>, settings: SessionSettings) -> Self {
        let history = ConversationHistory::new(settings.history_limit);
        Self {
            adapter,
            settings,
            history,
            state: SessionState::AwaitingInput,
            correlation_id: Uuid::new_v4().to_string(),
            turns_dispatched: 0,
            failures: 0,
            interventions: 0,
            malformed_responses: 0,
        }
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Runs until an exit command or end of input.
    pub async fn run<R, W>(&mut self, mut input: R, output: &mut W) -> io::Result<SessionReport>
    where
        R: BufRead,
        W: Write,
    {
        info!(
            event_name = "session.started",
            correlation_id = %self.correlation_id,
            adapter = self.adapter.name(),
            "interactive session started"
        );
        output.write_all(render::banner(self.adapter.name()).as_bytes())?;

        let exit_reason = loop {
            output.write_all(PROMPT.as_bytes())?;
            output.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                break ExitReason::EndOfInput;
            }
            self.handle_line(&line, output).await?;
            if self.state == SessionState::Terminated {
                break ExitReason::Command;
            }
        };

        self.state = SessionState::Terminated;
        let report = self.report(exit_reason);
        info!(
            event_name = "session.terminated",
            correlation_id = %report.correlation_id,
            turns_dispatched = report.turns_dispatched,
            failures = report.failures,
            interventions = report.interventions,
            exit_reason = ?report.exit_reason,
            "interactive session ended"
        );
        Ok(report)
    }

    /// Handles one input line from `AwaitingInput`.
    pub async fn handle_line<W: Write>(&mut self, line: &str, output: &mut W) -> io::Result<()> {
        match classify(line) {
            SessionInput::Blank => Ok(()),
            SessionInput::Command(SessionCommand::Quit) => {
                self.state = SessionState::Terminated;
                Ok(())
            }
            SessionInput::Command(SessionCommand::Clear) => {
                self.history.clear();
                info!(event_name = "session.cleared", correlation_id = %self.correlation_id, "history cleared");
                output.write_all(render::cleared().as_bytes())
            }
            SessionInput::Command(SessionCommand::Status) => {
                let view = StatusView {
                    adapter: self.adapter.name(),
                    settings: &self.settings,
                    history_len: self.history.len(),
                    policy_loaded: self.adapter.policy_loaded(),
                };
                output.write_all(render::status(&view).as_bytes())
            }
            SessionInput::Command(SessionCommand::Help) => {
                output.write_all(render::help(self.adapter.name(), &self.settings).as_bytes())
            }
            SessionInput::Message(text) => self.dispatch(text.to_string(), output).await,
        }
    }

    async fn dispatch<W: Write>(&mut self, text: String, output: &mut W) -> io::Result<()> {
        self.state = SessionState::Dispatching;
        self.history.push(ConversationTurn::user(text));
        self.turns_dispatched += 1;
        output.write_all(format!("{}\n", render::RULE).as_bytes())?;

        let turns = self.history.turns();
        info!(
            event_name = "session.dispatch",
            correlation_id = %self.correlation_id,
            history_len = turns.len(),
            "dispatching conversation"
        );

        let result = self.adapter.send(&turns).await;
        match result {
            Ok(exchange) => {
                self.state = SessionState::Rendering;
                self.render_exchange(exchange, output)?;
            }
            Err(error) => {
                self.failures += 1;
                let failure = ApplicationError::from(error);
                warn!(
                    event_name = "session.dispatch_failed",
                    correlation_id = %self.correlation_id,
                    error_class = failure.error_class(),
                    error = %failure,
                    "provider call failed"
                );
                output.write_all(render::failure(&failure).as_bytes())?;
            }
        }

        output.write_all(format!("{}\n", render::RULE).as_bytes())?;
        self.state = SessionState::AwaitingInput;
        Ok(())
    }

    fn render_exchange<W: Write>(&mut self, exchange: ProviderExchange, output: &mut W) -> io::Result<()> {
        let checks: Vec<CheckOutcome> = exchange
            .checks
            .iter()
            .map(|check| CheckOutcome { stage: check.stage, result: normalize(&check.raw) })
            .collect();

        let blocked_at = checks.iter().find(|check| check.intervened()).map(|check| check.stage);
        let answer_blocked = checks.iter().any(|check| check.intervened() && check.stage.guards_answer());
        if blocked_at.is_some() {
            self.interventions += 1;
        }

        if let Some(answer) = exchange.assistant_text.as_deref().filter(|text| !text.trim().is_empty()) {
            output.write_all(render::assistant(answer).as_bytes())?;
            if !answer_blocked {
                self.history.push(ConversationTurn::assistant(answer));
            }
        }

        if let Some(stage) = blocked_at {
            output.write_all(render::intervention(stage).as_bytes())?;
        }

        for check in &checks {
            match &check.result {
                Ok(outcome) => output.write_all(render::assessment(check.stage, outcome).as_bytes())?,
                Err(error) => {
                    self.malformed_responses += 1;
                    warn!(
                        event_name = "session.malformed_response",
                        correlation_id = %self.correlation_id,
                        stage = check.stage.as_str(),
                        error = %error,
                        "guardrail response did not match a known shape"
                    );
                    let NormalizeError::MalformedResponse { reason, raw } = error;
                    output.write_all(
                        render::malformed_response(Some(check.stage), reason, raw).as_bytes(),
                    )?;
                }
            }
        }

        if let Some(usage) = &exchange.usage {
            output.write_all(render::usage(usage).as_bytes())?;
        }
        Ok(())
    }

    fn report(&self, exit_reason: ExitReason) -> SessionReport {
        SessionReport {
            correlation_id: self.correlation_id.clone(),
            turns_dispatched: self.turns_dispatched,
            failures: self.failures,
            interventions: self.interventions,
            malformed_responses: self.malformed_responses,
            exit_reason,
        }
    }
}
