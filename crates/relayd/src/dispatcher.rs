//! Confidence gate and dispatcher.
//!
//! Accepts or rejects the top match against the configured threshold and
//! tie margin; on accept, resolves and executes the service call and
//! synthesizes a confirmation. A score exactly at the threshold is
//! accepted. At most one service call is issued per utterance.

use tracing::{debug, info};

use relay_common::types::{IntentCandidate, MatchResult, Verb};
use relay_common::RelayError;

use crate::config::RoutingConfig;
use crate::executor::ServiceExecutor;
use crate::resolver;

/// Outcome of one deterministic dispatch attempt
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Service call committed; `response` is the spoken confirmation.
    Executed { response: String, detail: String },

    /// The deterministic layer declines to act. A routing signal, not an
    /// error.
    Miss { reason: String },

    /// The match was accepted but the side effect failed. Surfaced, not
    /// converted to a miss.
    Failed { error: RelayError },
}

/// Gate the ranked matches and, on acceptance, execute the resolved call.
pub async fn dispatch(
    intent: &IntentCandidate,
    matches: &[MatchResult],
    config: &RoutingConfig,
    executor: &dyn ServiceExecutor,
) -> DispatchOutcome {
    if intent.verb == Verb::Unknown {
        return DispatchOutcome::Miss {
            reason: format!("no action verb in \"{}\"", intent.target_phrase),
        };
    }

    let Some(top) = matches.first() else {
        return DispatchOutcome::Miss {
            reason: "entity catalog is empty".to_string(),
        };
    };

    if top.score < config.confidence_threshold {
        return DispatchOutcome::Miss {
            reason: format!(
                "best match {} scored {:.3}, below threshold {:.3}",
                top.entity.id, top.score, config.confidence_threshold
            ),
        };
    }

    if let Some(second) = matches.get(1) {
        if top.score - second.score < config.tie_margin {
            return DispatchOutcome::Miss {
                reason: format!(
                    "ambiguous match: {} ({:.3}) vs {} ({:.3}) within margin {:.3}",
                    top.entity.id, top.score, second.entity.id, second.score, config.tie_margin
                ),
            };
        }
    }

    let call = match resolver::resolve(intent.verb, &top.entity, intent.level) {
        Ok(call) => call,
        Err(e) => {
            return DispatchOutcome::Miss {
                reason: e.to_string(),
            }
        }
    };

    debug!(
        "dispatching {}.{} on {} (score {:.3}, matched \"{}\")",
        call.domain, call.service, call.entity_id, top.score, top.matched_alias
    );

    match executor.call_service(&call).await {
        Ok(()) => {
            info!(
                "executed {}.{} on {} for \"{}\"",
                call.domain, call.service, call.entity_id, intent.target_phrase
            );
            DispatchOutcome::Executed {
                response: confirmation(intent, top),
                detail: format!(
                    "{}.{} on {} (score {:.3})",
                    call.domain, call.service, call.entity_id, top.score
                ),
            }
        }
        Err(error) => DispatchOutcome::Failed { error },
    }
}

/// Spoken confirmation for a committed action.
fn confirmation(intent: &IntentCandidate, top: &MatchResult) -> String {
    let name = &top.entity.friendly_name;
    match intent.verb {
        Verb::TurnOn => format!("Turned on {}.", name),
        Verb::TurnOff => format!("Turned off {}.", name),
        Verb::Toggle => format!("Toggled {}.", name),
        Verb::SetLevel => match intent.level {
            Some(level) => format!("Set {} to {}.", name, format_level(level)),
            None => format!("Set {}.", name),
        },
        Verb::Unknown => "Done.".to_string(),
    }
}

fn format_level(level: f64) -> String {
    if level.fract() == 0.0 {
        format!("{}", level as i64)
    } else {
        format!("{}", level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use relay_common::types::{CatalogEntity, EntityDomain, ServiceCall};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct RecordingExecutor {
        calls: Mutex<Vec<ServiceCall>>,
        count: AtomicUsize,
        fail: bool,
    }

    impl RecordingExecutor {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                count: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new()
            }
        }
    }

    #[async_trait]
    impl ServiceExecutor for RecordingExecutor {
        async fn call_service(&self, call: &ServiceCall) -> Result<(), RelayError> {
            self.count.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RelayError::Execution("device unreachable".to_string()));
            }
            self.calls.lock().unwrap().push(call.clone());
            Ok(())
        }
    }

    fn light(id: &str, name: &str) -> CatalogEntity {
        CatalogEntity {
            id: id.to_string(),
            domain: EntityDomain::Light,
            friendly_name: name.to_string(),
            aliases: Vec::new(),
            area: None,
        }
    }

    fn result(id: &str, name: &str, score: f64) -> MatchResult {
        MatchResult {
            entity: light(id, name),
            score,
            matched_alias: name.to_lowercase(),
        }
    }

    fn intent(verb: Verb) -> IntentCandidate {
        IntentCandidate {
            verb,
            target_phrase: "office light".to_string(),
            level: None,
        }
    }

    fn config() -> RoutingConfig {
        RoutingConfig {
            confidence_threshold: 0.8,
            tie_margin: 0.05,
        }
    }

    #[tokio::test]
    async fn test_score_at_threshold_is_accepted() {
        let executor = RecordingExecutor::new();
        let matches = vec![result("light.office_light", "Office Light", 0.8)];
        let outcome = dispatch(&intent(Verb::TurnOff), &matches, &config(), &executor).await;
        assert!(matches!(outcome, DispatchOutcome::Executed { .. }));
        assert_eq!(executor.count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_score_epsilon_below_threshold_misses() {
        let executor = RecordingExecutor::new();
        let matches = vec![result("light.office_light", "Office Light", 0.8 - 1e-9)];
        let outcome = dispatch(&intent(Verb::TurnOff), &matches, &config(), &executor).await;
        assert!(matches!(outcome, DispatchOutcome::Miss { .. }));
        assert_eq!(executor.count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ambiguous_pair_misses_despite_both_above_threshold() {
        let executor = RecordingExecutor::new();
        let matches = vec![
            result("light.office_light", "Office Light", 0.95),
            result("light.office_lamp", "Office Lamp", 0.93),
        ];
        let outcome = dispatch(&intent(Verb::TurnOff), &matches, &config(), &executor).await;
        match outcome {
            DispatchOutcome::Miss { reason } => assert!(reason.contains("ambiguous")),
            other => panic!("expected miss, got {:?}", other),
        }
        assert_eq!(executor.count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_clear_winner_executes() {
        let executor = RecordingExecutor::new();
        let matches = vec![
            result("light.office_light", "Office Light", 0.97),
            result("light.hall_light", "Hall Light", 0.55),
        ];
        let outcome = dispatch(&intent(Verb::TurnOff), &matches, &config(), &executor).await;
        match outcome {
            DispatchOutcome::Executed { response, .. } => {
                assert_eq!(response, "Turned off Office Light.");
            }
            other => panic!("expected executed, got {:?}", other),
        }
        let calls = executor.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].service, "turn_off");
        assert_eq!(calls[0].entity_id, "light.office_light");
    }

    #[tokio::test]
    async fn test_unknown_verb_misses_without_scoring() {
        let executor = RecordingExecutor::new();
        let matches = vec![result("light.office_light", "Office Light", 1.0)];
        let outcome = dispatch(&intent(Verb::Unknown), &matches, &config(), &executor).await;
        assert!(matches!(outcome, DispatchOutcome::Miss { .. }));
        assert_eq!(executor.count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_incompatible_verb_is_a_miss() {
        let executor = RecordingExecutor::new();
        let mut top = result("switch.plug", "Plug", 0.95);
        top.entity.domain = EntityDomain::Switch;
        let mut i = intent(Verb::SetLevel);
        i.level = Some(50.0);
        let outcome = dispatch(&i, &[top], &config(), &executor).await;
        match outcome {
            DispatchOutcome::Miss { reason } => assert!(reason.contains("not supported")),
            other => panic!("expected miss, got {:?}", other),
        }
        assert_eq!(executor.count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_execution_failure_is_not_a_miss() {
        let executor = RecordingExecutor::failing();
        let matches = vec![result("light.office_light", "Office Light", 0.97)];
        let outcome = dispatch(&intent(Verb::TurnOff), &matches, &config(), &executor).await;
        match outcome {
            DispatchOutcome::Failed { error } => {
                assert!(matches!(error, RelayError::Execution(_)));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_set_level_confirmation_formats_whole_numbers() {
        let executor = RecordingExecutor::new();
        let matches = vec![result("light.office_light", "Office Light", 0.97)];
        let mut i = intent(Verb::SetLevel);
        i.level = Some(40.0);
        let outcome = dispatch(&i, &matches, &config(), &executor).await;
        match outcome {
            DispatchOutcome::Executed { response, .. } => {
                assert_eq!(response, "Set Office Light to 40.");
            }
            other => panic!("expected executed, got {:?}", other),
        }
    }
}
