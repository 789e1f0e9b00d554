//! RPC server - Unix socket server for daemon-client communication.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use relay_common::rpc::{AnswerData, Method, Request, Response, ResponseData, StatusData};
use relay_common::trace::DebugLevel;
use relay_common::types::Utterance;

use crate::catalog::EntityCatalog;
use crate::config::Config;
use crate::orchestrator::Orchestrator;

/// Daemon state shared across connections
pub struct DaemonState {
    pub version: String,
    pub start_time: std::time::Instant,
    pub config: RwLock<Arc<Config>>,
    pub catalog: Arc<EntityCatalog>,
    pub orchestrator: Orchestrator,
}

impl DaemonState {
    pub fn new(config: Arc<Config>, catalog: Arc<EntityCatalog>, orchestrator: Orchestrator) -> Self {
        Self {
            version: relay_common::VERSION.to_string(),
            start_time: std::time::Instant::now(),
            config: RwLock::new(config),
            catalog,
            orchestrator,
        }
    }

    /// The active configuration, pinned for one utterance.
    pub async fn active_config(&self) -> Arc<Config> {
        Arc::clone(&*self.config.read().await)
    }
}

/// Start the RPC server
pub async fn start_server(state: Arc<DaemonState>) -> Result<()> {
    let socket_path = state.active_config().await.daemon.socket_path.clone();

    if let Some(socket_dir) = Path::new(&socket_path).parent() {
        tokio::fs::create_dir_all(socket_dir)
            .await
            .context("Failed to create socket directory")?;
    }

    // Remove old socket if it exists
    let _ = tokio::fs::remove_file(&socket_path).await;

    let listener = UnixListener::bind(&socket_path).context("Failed to bind Unix socket")?;

    info!("RPC server listening on {}", socket_path);

    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, state).await {
                        error!("Connection handler error: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

/// Handle a single client connection
async fn handle_connection(stream: UnixStream, state: Arc<DaemonState>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader
            .read_line(&mut line)
            .await
            .context("Failed to read from socket")?;

        if bytes_read == 0 {
            // Connection closed
            break;
        }

        let request: Request = match serde_json::from_str(&line) {
            Ok(req) => req,
            Err(e) => {
                warn!("Invalid request JSON: {}", e);
                continue;
            }
        };

        let response = handle_request(request.id, request.method, &state).await;

        let response_json = serde_json::to_string(&response)? + "\n";
        writer
            .write_all(response_json.as_bytes())
            .await
            .context("Failed to write response")?;
    }

    Ok(())
}

/// Handle a single request
async fn handle_request(id: u64, method: Method, state: &DaemonState) -> Response {
    let result = match method {
        Method::Ping => Ok(ResponseData::Ok),

        Method::Status => {
            let config = state.active_config().await;
            let snapshot = state.catalog.current().await;
            Ok(ResponseData::Status(StatusData {
                version: state.version.clone(),
                uptime_seconds: state.start_time.elapsed().as_secs(),
                catalog_entities: snapshot.entities.len(),
                catalog_built_at: snapshot.is_initialized().then_some(snapshot.built_at),
                debug_level: config.daemon.debug_level,
            }))
        }

        Method::Process {
            text,
            conversation_id,
            language,
        } => {
            let config = state.active_config().await;
            let utterance = Utterance::new(&text, conversation_id, language);
            let decision = state.orchestrator.route(&utterance, Arc::clone(&config)).await;

            let trace = match config.daemon.debug_level {
                DebugLevel::None => None,
                level => Some(decision.trace.render(level)),
            };

            Ok(ResponseData::Answer(AnswerData {
                conversation_id: utterance.conversation_id,
                response: decision.response.unwrap_or_default(),
                stage: decision.stage,
                outcome: decision.outcome,
                trace,
            }))
        }

        Method::RefreshCatalog => match state.catalog.refresh().await {
            Ok(entities) => Ok(ResponseData::Refreshed { entities }),
            Err(e) => Err(e.to_string()),
        },

        Method::ReloadConfig => match Config::try_load() {
            Ok(new_config) => {
                *state.config.write().await = Arc::new(new_config);
                info!("configuration reloaded");
                Ok(ResponseData::Ok)
            }
            Err(e) => {
                warn!("config reload rejected, keeping previous: {}", e);
                Err(format!("reload rejected: {}", e))
            }
        },
    };

    Response { id, result }
}
