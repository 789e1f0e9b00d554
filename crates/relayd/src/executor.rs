//! Service execution collaborator - carries out resolved service calls.
//!
//! The dispatcher is the only caller; at most one call is issued per
//! utterance.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use relay_common::types::ServiceCall;
use relay_common::RelayError;

/// Executes a resolved service call against the host platform.
#[async_trait]
pub trait ServiceExecutor: Send + Sync {
    async fn call_service(&self, call: &ServiceCall) -> Result<(), RelayError>;
}

/// HTTP service executor: POSTs the call to the host platform's service
/// endpoint.
pub struct HttpServiceExecutor {
    client: reqwest::Client,
    url: String,
    timeout_secs: u64,
}

impl HttpServiceExecutor {
    pub fn new(url: &str, timeout_secs: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.to_string(),
            timeout_secs,
        }
    }
}

#[async_trait]
impl ServiceExecutor for HttpServiceExecutor {
    async fn call_service(&self, call: &ServiceCall) -> Result<(), RelayError> {
        debug!(
            "executing {}.{} on {}",
            call.domain, call.service, call.entity_id
        );

        let request = self.client.post(&self.url).json(call).send();

        let response = tokio::time::timeout(Duration::from_secs(self.timeout_secs), request)
            .await
            .map_err(|_| {
                RelayError::Execution(format!(
                    "service call timed out after {}s",
                    self.timeout_secs
                ))
            })?
            .map_err(|e| RelayError::Execution(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::Execution(format!(
                "service endpoint returned {}: {}",
                status,
                body.trim()
            )));
        }

        Ok(())
    }
}
