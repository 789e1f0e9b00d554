//! Conversation agent collaborators.
//!
//! Primary and fallback agents are opaque request/response services behind
//! one capability trait; the orchestrator treats a rule engine and a
//! language model identically.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use relay_common::types::Utterance;
use relay_common::RelayError;

/// Responses that read as answers but mean the agent gave up. Treated as
/// stage failures so routing advances instead of surfacing them.
pub const NON_ANSWERS: &[&str] = &[
    "sorry, i didn't understand that",
    "sorry, i couldn't understand that",
    "i don't understand",
    "i am not able to help with that",
    "an unexpected error occurred",
];

/// Whether an agent response is empty or a known non-answer.
pub fn is_non_answer(response: &str) -> bool {
    let r = response.trim().to_lowercase();
    r.is_empty() || NON_ANSWERS.iter().any(|p| r == *p)
}

/// A conversational agent able to process one utterance.
#[async_trait]
pub trait ConversationAgent: Send + Sync {
    fn name(&self) -> &str;

    async fn process(&self, utterance: &Utterance) -> Result<String, RelayError>;
}

#[derive(Debug, Serialize)]
struct AgentRequest<'a> {
    text: &'a str,
    conversation_id: &'a str,
    language: &'a str,
}

#[derive(Debug, Deserialize)]
struct AgentReply {
    response: String,
}

/// HTTP conversation agent: POSTs the utterance to a configured endpoint
/// and reads back `{ "response": ... }`.
pub struct HttpAgent {
    name: String,
    client: reqwest::Client,
    url: String,
}

impl HttpAgent {
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            client: reqwest::Client::new(),
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl ConversationAgent for HttpAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, utterance: &Utterance) -> Result<String, RelayError> {
        debug!("forwarding utterance to agent {}", self.name);

        let request = AgentRequest {
            text: &utterance.raw_text,
            conversation_id: &utterance.conversation_id,
            language: &utterance.language,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RelayError::AgentUnavailable {
                agent: self.name.clone(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(RelayError::AgentUnavailable {
                agent: self.name.clone(),
                reason: format!("agent endpoint returned {}", response.status()),
            });
        }

        let reply: AgentReply =
            response
                .json()
                .await
                .map_err(|e| RelayError::AgentUnavailable {
                    agent: self.name.clone(),
                    reason: format!("invalid agent reply: {}", e),
                })?;

        Ok(reply.response)
    }
}
