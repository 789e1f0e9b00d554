//! Routing orchestrator - sequences Deterministic → Primary → Fallback.
//!
//! Each stage is attempted at most once per utterance; the first success
//! wins. Stage-local failures become stage outcomes in the trace, never
//! panics, and never affect other in-flight utterances. The configuration
//! is pinned at entry, so a concurrent reload cannot change thresholds or
//! debug level mid-utterance.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use relay_common::trace::{DebugLevel, RoutingTrace};
use relay_common::types::{RoutingDecision, Stage, StageOutcome, Utterance};
use relay_common::RelayError;

use crate::agents::{is_non_answer, ConversationAgent};
use crate::catalog::EntityCatalog;
use crate::config::Config;
use crate::dispatcher::{self, DispatchOutcome};
use crate::executor::ServiceExecutor;
use crate::{intent, matcher};

pub struct Orchestrator {
    catalog: Arc<EntityCatalog>,
    executor: Arc<dyn ServiceExecutor>,
    primary: Arc<dyn ConversationAgent>,
    fallback: Arc<dyn ConversationAgent>,
}

impl Orchestrator {
    pub fn new(
        catalog: Arc<EntityCatalog>,
        executor: Arc<dyn ServiceExecutor>,
        primary: Arc<dyn ConversationAgent>,
        fallback: Arc<dyn ConversationAgent>,
    ) -> Self {
        Self {
            catalog,
            executor,
            primary,
            fallback,
        }
    }

    /// Route one utterance to exactly one of: direct execution, the primary
    /// agent, or the fallback agent.
    pub async fn route(&self, utterance: &Utterance, config: Arc<Config>) -> RoutingDecision {
        let mut trace = RoutingTrace::new();
        let debug_level = config.daemon.debug_level;

        // --- Deterministic layer ---
        match self.try_deterministic(utterance, &config).await {
            DispatchOutcome::Executed { response, detail } => {
                trace.record(Stage::Deterministic, StageOutcome::Success, detail);
                return RoutingDecision {
                    stage: Stage::Deterministic,
                    outcome: StageOutcome::Success,
                    response: Some(response),
                    trace,
                };
            }
            DispatchOutcome::Miss { reason } => {
                debug!("deterministic miss: {}", reason);
                trace.record(Stage::Deterministic, StageOutcome::Miss, reason);
            }
            DispatchOutcome::Failed { error } => match error {
                // The match was right and the side effect failed; handing
                // the utterance to an agent now could act twice.
                RelayError::Execution(_) => {
                    warn!("service execution failed: {}", error);
                    trace.record(Stage::Deterministic, StageOutcome::Error, error.to_string());
                    return RoutingDecision {
                        stage: Stage::Deterministic,
                        outcome: StageOutcome::Error,
                        response: Some(execution_apology(&error, debug_level)),
                        trace,
                    };
                }
                other => {
                    warn!("deterministic stage error: {}", other);
                    trace.record(Stage::Deterministic, StageOutcome::Error, other.to_string());
                }
            },
        }

        // --- Primary agent ---
        let mut failures: Vec<String> = Vec::new();
        match self
            .try_agent(self.primary.as_ref(), utterance, &config)
            .await
        {
            Ok(response) => {
                trace.record(Stage::Primary, StageOutcome::Success, "answered");
                return RoutingDecision {
                    stage: Stage::Primary,
                    outcome: StageOutcome::Success,
                    response: Some(decorate(
                        response,
                        self.primary.name(),
                        debug_level,
                        &failures,
                    )),
                    trace,
                };
            }
            Err(error) => {
                warn!("primary agent failed: {}", error);
                trace.record(Stage::Primary, StageOutcome::Error, error.to_string());
                failures.push(format!("{} failed: {}", self.primary.name(), error));
            }
        }

        // --- Fallback agent ---
        match self
            .try_agent(self.fallback.as_ref(), utterance, &config)
            .await
        {
            Ok(response) => {
                trace.record(Stage::Fallback, StageOutcome::Success, "answered");
                RoutingDecision {
                    stage: Stage::Fallback,
                    outcome: StageOutcome::Success,
                    response: Some(decorate(
                        response,
                        self.fallback.name(),
                        debug_level,
                        &failures,
                    )),
                    trace,
                }
            }
            Err(error) => {
                warn!("fallback agent failed: {}", error);
                trace.record(Stage::Fallback, StageOutcome::Error, error.to_string());
                failures.push(format!("{} failed: {}", self.fallback.name(), error));
                RoutingDecision {
                    stage: Stage::Fallback,
                    outcome: StageOutcome::Error,
                    response: Some(final_apology(&error, debug_level, &failures)),
                    trace,
                }
            }
        }
    }

    /// The deterministic layer: intent → matcher → gate → execution.
    async fn try_deterministic(&self, utterance: &Utterance, config: &Config) -> DispatchOutcome {
        let snapshot = self.catalog.current().await;
        let intent = intent::extract(&utterance.raw_text);
        let matches = matcher::rank(&intent.target_phrase, &snapshot, intent.verb);
        dispatcher::dispatch(&intent, &matches, &config.routing, self.executor.as_ref()).await
    }

    /// Run one agent under the configured timeout, converting empty and
    /// known non-answer responses into failures.
    async fn try_agent(
        &self,
        agent: &dyn ConversationAgent,
        utterance: &Utterance,
        config: &Config,
    ) -> Result<String, RelayError> {
        let secs = config.agents.timeout_secs;
        let response = tokio::time::timeout(Duration::from_secs(secs), agent.process(utterance))
            .await
            .map_err(|_| RelayError::AgentTimeout {
                agent: agent.name().to_string(),
                secs,
            })??;

        if is_non_answer(&response) {
            return Err(RelayError::NonAnswer {
                agent: agent.name().to_string(),
                response,
            });
        }

        Ok(response)
    }
}

/// Attach agent attribution to a successful response per debug level.
fn decorate(response: String, agent_name: &str, level: DebugLevel, failures: &[String]) -> String {
    match level {
        DebugLevel::None => response,
        DebugLevel::Low => format!("{} responded with: {}", agent_name, response),
        DebugLevel::Verbose => {
            if failures.is_empty() {
                format!("{} responded with: {}", agent_name, response)
            } else {
                format!(
                    "{} Then {} responded with: {}",
                    failures.join(" "),
                    agent_name,
                    response
                )
            }
        }
    }
}

/// Response when the match was accepted but the side effect failed.
fn execution_apology(error: &RelayError, level: DebugLevel) -> String {
    match level {
        DebugLevel::None => "Sorry, I found the device but the action failed.".to_string(),
        _ => format!("Sorry, I found the device but the action failed: {}", error),
    }
}

/// Response when every stage failed: a plain apology carrying the fallback
/// agent's own error, plus the full failure chain at verbose.
fn final_apology(fallback_error: &RelayError, level: DebugLevel, failures: &[String]) -> String {
    let mut msg = format!(
        "Sorry, no agent was able to handle the request: {}",
        fallback_error
    );
    if level == DebugLevel::Verbose {
        for failure in failures {
            msg.push('\n');
            msg.push_str(failure);
        }
    }
    msg
}
