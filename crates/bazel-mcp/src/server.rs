//! MCP Server
//!
//! Handles the MCP protocol over stdio, processing JSON-RPC 2.0 messages.
//! Each `tools/call` runs on its own task so a `notifications/cancelled` can
//! abort it (and with it the bazel child process).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

use crate::handler::Handler;
use crate::protocol::{
    CallToolParams, CancelledParams, InitializeResult, JsonRpcRequest, JsonRpcResponse,
    ListToolsResult, ServerCapabilities, ServerInfo, ToolsCapability, INTERNAL_ERROR,
    INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR, PROTOCOL_VERSION,
};
use crate::tools::{all_tools, Operation};

type InFlight = Arc<Mutex<HashMap<String, AbortHandle>>>;

/// MCP Server that communicates over stdio
pub struct McpServer {
    handler: Arc<Handler>,
    initialized: bool,
    in_flight: InFlight,
}

impl McpServer {
    pub fn new(handler: Handler) -> Self {
        Self {
            handler: Arc::new(handler),
            initialized: false,
            in_flight: Arc::default(),
        }
    }

    /// Whether the client has sent `notifications/initialized`
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Run the server, reading from stdin and writing to stdout
    pub async fn run(&mut self) -> anyhow::Result<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        self.serve(stdin, tokio::io::stdout()).await?;
        Ok(())
    }

    /// Serve requests from `reader` until EOF, writing responses to `writer`.
    ///
    /// Returns the writer once every in-flight call has answered.
    pub async fn serve<R, W>(&mut self, reader: R, writer: W) -> anyhow::Result<W>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let writer_task = tokio::spawn(write_responses(rx, writer));

        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            debug!("Received: {}", line);
            self.handle_message(line, &tx);
        }

        // EOF - client disconnected
        info!("Client disconnected");
        drop(tx);
        writer_task.await?
    }

    /// Handle a single JSON-RPC message
    fn handle_message(&mut self, message: &str, tx: &mpsc::UnboundedSender<JsonRpcResponse>) {
        let request: JsonRpcRequest = match serde_json::from_str(message) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                send(tx, JsonRpcResponse::error(None, PARSE_ERROR, format!("Parse error: {}", e)));
                return;
            }
        };

        let id = request.id.clone();

        // Handle notifications (no id means no response expected)
        let Some(id_value) = id.clone() else {
            self.handle_notification(&request.method, request.params);
            return;
        };

        if request.jsonrpc != "2.0" {
            send(
                tx,
                JsonRpcResponse::error(
                    id,
                    INVALID_REQUEST,
                    format!("Unsupported jsonrpc version: {}", request.jsonrpc),
                ),
            );
            return;
        }

        if request.method == "tools/call" {
            match parse_call(request.params) {
                Ok((op, params)) => self.spawn_call(id_value, op, params, tx),
                Err((code, message)) => send(tx, JsonRpcResponse::error(id, code, message)),
            }
            return;
        }

        let response = match self.handle_request(&request.method, request.params) {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err((code, message)) => JsonRpcResponse::error(id, code, message),
        };
        send(tx, response);
    }

    /// Handle a notification (no response expected)
    fn handle_notification(&mut self, method: &str, params: Option<Value>) {
        match method {
            "notifications/initialized" => {
                info!("Client initialized");
                self.initialized = true;
            }
            "notifications/cancelled" => {
                let Some(params) = params.and_then(|p| serde_json::from_value::<CancelledParams>(p).ok())
                else {
                    warn!("Ignoring malformed cancellation");
                    return;
                };
                let key = request_key(&params.request_id);
                match lock(&self.in_flight).remove(&key) {
                    Some(handle) => {
                        info!(
                            "Cancelling request {} ({})",
                            key,
                            params.reason.as_deref().unwrap_or("no reason given")
                        );
                        handle.abort();
                    }
                    None => debug!("Cancellation for unknown or finished request {}", key),
                }
            }
            _ => {
                debug!("Unknown notification: {}", method);
            }
        }
    }

    /// Handle a request and return the result
    fn handle_request(&mut self, method: &str, params: Option<Value>) -> Result<Value, (i32, String)> {
        match method {
            "initialize" => self.handle_initialize(params),
            "tools/list" => self.handle_list_tools(),
            "ping" => Ok(json!({})),
            _ => {
                warn!("Unknown method: {}", method);
                Err((METHOD_NOT_FOUND, format!("Method not found: {}", method)))
            }
        }
    }

    /// Handle the initialize request
    fn handle_initialize(&mut self, _params: Option<Value>) -> Result<Value, (i32, String)> {
        info!("Initializing MCP server");

        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability { list_changed: false }),
            },
            server_info: ServerInfo {
                name: "bazel-mcp".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        serde_json::to_value(result)
            .map_err(|e| (INTERNAL_ERROR, format!("Serialization error: {}", e)))
    }

    /// Handle the tools/list request
    fn handle_list_tools(&self) -> Result<Value, (i32, String)> {
        let result = ListToolsResult { tools: all_tools() };

        serde_json::to_value(result)
            .map_err(|e| (INTERNAL_ERROR, format!("Serialization error: {}", e)))
    }

    /// Run a tools/call on its own task, tracked for cancellation
    fn spawn_call(
        &self,
        id: Value,
        op: Operation,
        params: CallToolParams,
        tx: &mpsc::UnboundedSender<JsonRpcResponse>,
    ) {
        info!("Calling tool: {}", params.name);

        let key = request_key(&id);
        let handler = Arc::clone(&self.handler);
        let in_flight = Arc::clone(&self.in_flight);
        let tx = tx.clone();
        let task_key = key.clone();

        // Held across spawn so the task cannot deregister before it is registered
        let mut registry = lock(&self.in_flight);
        let task = tokio::spawn(async move {
            let result = handler.handle_tool(op, params.arguments).await;
            let response = match serde_json::to_value(result) {
                Ok(value) => JsonRpcResponse::success(Some(id), value),
                Err(e) => JsonRpcResponse::error(
                    Some(id),
                    INTERNAL_ERROR,
                    format!("Serialization error: {}", e),
                ),
            };
            lock(&in_flight).remove(&task_key);
            send(&tx, response);
        });
        if registry.insert(key, task.abort_handle()).is_some() {
            warn!("Request id reused while still in flight");
        }
    }
}

impl Default for McpServer {
    fn default() -> Self {
        Self::new(Handler::default())
    }
}

/// Validate tools/call params and look up the operation
fn parse_call(params: Option<Value>) -> Result<(Operation, CallToolParams), (i32, String)> {
    let params: CallToolParams = match params {
        Some(p) => serde_json::from_value(p)
            .map_err(|e| (INVALID_PARAMS, format!("Invalid params: {}", e)))?,
        None => return Err((INVALID_PARAMS, "Missing params".to_string())),
    };

    match Operation::from_name(&params.name) {
        Some(op) => Ok((op, params)),
        None => {
            warn!("Unknown tool: {}", params.name);
            Err((INVALID_PARAMS, format!("Unknown tool: {}", params.name)))
        }
    }
}

/// Key for the in-flight table; JSON text keeps `1` and `"1"` apart
fn request_key(id: &Value) -> String {
    id.to_string()
}

fn lock(in_flight: &InFlight) -> MutexGuard<'_, HashMap<String, AbortHandle>> {
    in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn send(tx: &mpsc::UnboundedSender<JsonRpcResponse>, response: JsonRpcResponse) {
    if tx.send(response).is_err() {
        error!("Response writer has shut down; dropping response");
    }
}

async fn write_responses<W>(
    mut rx: mpsc::UnboundedReceiver<JsonRpcResponse>,
    mut writer: W,
) -> anyhow::Result<W>
where
    W: AsyncWrite + Unpin,
{
    while let Some(resp) = rx.recv().await {
        let resp_str = serde_json::to_string(&resp)?;
        debug!("Sending: {}", resp_str);
        writer.write_all(resp_str.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(writer)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn exchange(server: &mut McpServer, input: &str) -> Vec<Value> {
        let out = server.serve(input.as_bytes(), Vec::new()).await.unwrap();
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_initialize_and_list() {
        let mut server = McpServer::default();
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            "\n",
        );
        let responses = exchange(&mut server, input).await;

        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], json!(1));
        assert_eq!(responses[0]["result"]["protocolVersion"], json!("2024-11-05"));
        assert_eq!(responses[0]["result"]["serverInfo"]["name"], json!("bazel-mcp"));
        assert!(server.is_initialized());

        let tools = responses[1]["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 5);
        assert_eq!(tools[0]["name"], json!("reverse-dependencies"));
        assert!(tools[0]["inputSchema"]["properties"]["max_depth"].is_object());
    }

    #[tokio::test]
    async fn test_protocol_errors() {
        let mut server = McpServer::default();
        let input = concat!(
            "not json\n",
            "\n",
            r#"{"jsonrpc":"2.0","id":"a","method":"resources/list"}"#,
            "\n",
            r#"{"jsonrpc":"1.0","id":"b","method":"ping"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":"c","method":"ping"}"#,
            "\n",
        );
        let responses = exchange(&mut server, input).await;

        assert_eq!(responses.len(), 4);
        assert_eq!(responses[0]["error"]["code"], json!(PARSE_ERROR));
        assert_eq!(responses[0]["id"], Value::Null);
        assert_eq!(responses[1]["error"]["code"], json!(METHOD_NOT_FOUND));
        assert_eq!(responses[2]["error"]["code"], json!(INVALID_REQUEST));
        assert_eq!(responses[3]["result"], json!({}));
    }

    #[tokio::test]
    async fn test_call_unknown_tool_and_missing_params() {
        let mut server = McpServer::default();
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"query","arguments":{}}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call"}"#,
            "\n",
        );
        let responses = exchange(&mut server, input).await;

        assert_eq!(responses.len(), 2);
        for resp in &responses {
            assert_eq!(resp["error"]["code"], json!(INVALID_PARAMS));
        }
        assert!(responses[0]["error"]["message"]
            .as_str()
            .unwrap()
            .contains("Unknown tool: query"));
    }

    #[tokio::test]
    async fn test_call_with_bad_arguments_is_tool_error() {
        let mut server = McpServer::default();
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":7,"method":"tools/call","params":{"name":"deps","arguments":{"target":"//a:b"}}}"#,
            "\n",
        );
        let responses = exchange(&mut server, input).await;

        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["id"], json!(7));
        assert_eq!(responses[0]["result"]["isError"], json!(true));
        let text = responses[0]["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("missing required argument: project_path"));
    }

    #[test]
    fn test_request_key_distinguishes_types() {
        assert_ne!(request_key(&json!(1)), request_key(&json!("1")));
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use bazel_mcp_core::BazelRunner;
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        use std::time::Duration;
        use tempfile::TempDir;

        fn server_with_fake_bazel(body: &str) -> (TempDir, McpServer) {
            let dir = TempDir::new().unwrap();
            let bazel = dir.path().join("fake-bazel");
            fs::write(&bazel, format!("#!/bin/sh\n{}\n", body)).unwrap();
            fs::set_permissions(&bazel, fs::Permissions::from_mode(0o755)).unwrap();
            let server = McpServer::new(Handler::new(BazelRunner::new(bazel)));
            (dir, server)
        }

        fn call_line(id: u64, tool: &str, dir: &TempDir, extra: Value) -> String {
            let mut arguments = json!({"project_path": dir.path().to_str().unwrap()});
            if let (Some(args), Some(extra)) = (arguments.as_object_mut(), extra.as_object()) {
                args.extend(extra.clone());
            }
            let request = json!({
                "jsonrpc": "2.0",
                "id": id,
                "method": "tools/call",
                "params": {"name": tool, "arguments": arguments}
            });
            format!("{}\n", request)
        }

        #[tokio::test]
        async fn test_tool_call_returns_raw_output() {
            let (dir, mut server) = server_with_fake_bazel("echo \"$*\"");
            let input = call_line(3, "reverse-dependencies", &dir, json!({"target": "pkg/BUILD", "max_depth": 2}));
            let responses = exchange(&mut server, &input).await;

            assert_eq!(responses.len(), 1);
            assert_eq!(responses[0]["id"], json!(3));
            assert_eq!(
                responses[0]["result"],
                json!({"content": [{"type": "text", "text": "query rdeps(//..., //pkg:BUILD, 2) --output graph\n"}]})
            );
        }

        #[tokio::test]
        async fn test_cancelled_call_kills_bazel_and_gets_no_response() {
            use tokio::io::AsyncReadExt;

            let (dir, mut server) = server_with_fake_bazel("sleep 30");
            let (client, server_io) = tokio::io::duplex(64 * 1024);
            let (server_read, server_write) = tokio::io::split(server_io);
            let serving = tokio::spawn(async move {
                let result = server.serve(BufReader::new(server_read), server_write).await;
                (server, result.map(drop))
            });

            let (mut client_read, mut client_write) = tokio::io::split(client);
            let call = call_line(9, "build", &dir, json!({"target": "//slow:target"}));
            client_write.write_all(call.as_bytes()).await.unwrap();
            // let the call reach bazel before cancelling it
            tokio::time::sleep(Duration::from_millis(300)).await;
            client_write
                .write_all(b"{\"jsonrpc\":\"2.0\",\"method\":\"notifications/cancelled\",\"params\":{\"requestId\":9,\"reason\":\"user\"}}\n")
                .await
                .unwrap();
            client_write.shutdown().await.unwrap();

            let (server, result) = tokio::time::timeout(Duration::from_secs(10), serving)
                .await
                .expect("cancelled call should not wait for bazel")
                .unwrap();
            result.unwrap();

            let mut out = String::new();
            client_read.read_to_string(&mut out).await.unwrap();
            assert!(out.is_empty(), "unexpected response: {out}");
            assert!(lock(&server.in_flight).is_empty());
        }
    }
}
