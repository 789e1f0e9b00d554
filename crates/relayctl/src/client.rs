//! Unix socket client for communicating with relayd.

use anyhow::{anyhow, Result};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use relay_common::rpc::{Method, Request, Response, ResponseData};
use relay_common::SOCKET_PATH;

/// Client for communicating with relayd
pub struct RelaydClient {
    stream: UnixStream,
    next_id: u64,
}

impl RelaydClient {
    /// Connect to relayd
    pub async fn connect() -> Result<Self> {
        let socket_path = Path::new(SOCKET_PATH);

        if !socket_path.exists() {
            return Err(anyhow!(
                "Relay daemon not running.\n\
                 The socket at {} does not exist.\n\
                 Start it with: systemctl start relayd",
                SOCKET_PATH
            ));
        }

        let stream = UnixStream::connect(socket_path).await.map_err(|e| {
            anyhow!(
                "Cannot connect to relay daemon: {}\n\
                 The daemon may have crashed. Try: systemctl restart relayd",
                e
            )
        })?;

        Ok(Self { stream, next_id: 1 })
    }

    /// Send a request and read the response
    pub async fn call(&mut self, method: Method) -> Result<ResponseData> {
        let request = Request {
            id: self.next_id,
            method,
        };
        self.next_id += 1;

        let request_json = serde_json::to_string(&request)?;
        self.stream
            .write_all(format!("{}\n", request_json).as_bytes())
            .await?;

        let (reader, _) = self.stream.split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();
        reader.read_line(&mut line).await?;

        let response: Response = serde_json::from_str(&line)?;
        response.result.map_err(|e| anyhow!("daemon error: {}", e))
    }
}
