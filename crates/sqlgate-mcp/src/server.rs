//! MCP server implementation.
//!
//! Dispatches JSON-RPC requests to the query executor, the checkpoint session
//! and the resource catalog, over either the stdio or the HTTP transport.
//! Each request is handled on its own task; the checkpoint session serializes
//! whatever needs serializing.

use crate::checkpoint::CheckpointAction;
use crate::error::{GatewayError, McpError};
use crate::executor::{ExecutionResult, QueryExecutor};
use crate::http_transport::{HttpServer, RequestSender, ResponseSender};
use crate::protocol::*;
use crate::resources::ResourceCatalog;
use crate::tools::{CHECKPOINT, EXECUTE_QUERY, ToolRegistry};
use serde::Deserialize;
use serde_json::{Value, json};
use sqlgate_core::config::{McpConfig, Transport};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

#[derive(Debug, Deserialize)]
struct ExecuteQueryArgs {
    sql: String,
}

#[derive(Debug, Deserialize)]
struct CheckpointArgs {
    action: CheckpointAction,
    #[serde(rename = "checkpointId", default)]
    checkpoint_id: Option<u64>,
}

/// The MCP server.
pub struct McpServer {
    config: McpConfig,
    tools: ToolRegistry,
    executor: Arc<QueryExecutor>,
    resources: Option<ResourceCatalog>,
}

impl McpServer {
    /// Create a server exposing the gateway tools for the executor's role.
    pub fn new(config: McpConfig, executor: Arc<QueryExecutor>) -> Self {
        let tools = ToolRegistry::for_role(executor.role(), executor.granted());
        Self {
            config,
            tools,
            executor,
            resources: None,
        }
    }

    /// Enable `resources/list` and `resources/read`.
    pub fn with_resources(mut self, catalog: ResourceCatalog) -> Self {
        self.resources = Some(catalog);
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn executor(&self) -> &Arc<QueryExecutor> {
        &self.executor
    }

    /// Start the MCP server on the configured transport.
    pub async fn run(self: Arc<Self>) -> Result<(), McpError> {
        let result = match self.config.transport {
            Transport::Stdio => self.clone().run_stdio().await,
            Transport::Http => self.clone().run_http().await,
        };
        self.close_session().await;
        result
    }

    /// Run the server with stdio transport.
    ///
    /// Reads newline-delimited requests until stdin closes. Responses are
    /// written by a single task so concurrent replies never interleave.
    async fn run_stdio(self: Arc<Self>) -> Result<(), McpError> {
        tracing::info!("Starting MCP server with stdio transport");

        let (out_tx, mut out_rx) = mpsc::channel::<String>(100);
        let writer = tokio::spawn(async move {
            let mut stdout = tokio::io::stdout();
            while let Some(line) = out_rx.recv().await {
                stdout.write_all(line.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
            Ok::<_, std::io::Error>(())
        });

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            let server = self.clone();
            let out_tx = out_tx.clone();
            tokio::spawn(async move {
                let Some(response) = server.handle_line(&line).await else {
                    return;
                };
                match serde_json::to_string(&response) {
                    Ok(json) => {
                        let _ = out_tx.send(json).await;
                    }
                    Err(e) => tracing::error!(error = %e, "Failed to serialize response"),
                }
            });
        }

        tracing::info!("stdin closed, waiting for in-flight requests");
        drop(out_tx);
        writer
            .await
            .map_err(|e| McpError::TransportError(e.to_string()))??;
        Ok(())
    }

    /// Run the server with HTTP transport.
    async fn run_http(self: Arc<Self>) -> Result<(), McpError> {
        let bind_address = self.config.bind_address();
        tracing::info!(address = %bind_address, "Starting MCP server with HTTP transport");

        let request_tx = self.spawn_dispatcher();
        HttpServer::new(bind_address, request_tx).run().await
    }

    /// Spawn the task that handles requests forwarded by the HTTP transport,
    /// one task per request.
    fn spawn_dispatcher(self: Arc<Self>) -> RequestSender {
        let (request_tx, mut request_rx) = mpsc::channel::<(JsonRpcRequest, ResponseSender)>(100);
        tokio::spawn(async move {
            while let Some((request, response_tx)) = request_rx.recv().await {
                let server = self.clone();
                tokio::spawn(async move {
                    let response = server.handle_request(request).await;
                    let _ = response_tx.send(response);
                });
            }
        });
        request_tx
    }

    /// Parse one raw message and handle it.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        match serde_json::from_str::<JsonRpcRequest>(line) {
            Ok(request) => self.handle_request(request).await,
            Err(e) => Some(JsonRpcResponse::error(
                None,
                error_codes::PARSE_ERROR,
                format!("Parse error: {}", e),
            )),
        }
    }

    /// Handle a JSON-RPC request. Notifications yield no response.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.is_notification() {
            tracing::debug!(method = %request.method, "Notification received");
            return None;
        }

        let id = request.id.clone();
        if request.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::error(
                id,
                error_codes::INVALID_REQUEST,
                format!("Unsupported jsonrpc version: {}", request.jsonrpc),
            ));
        }

        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(id),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => self.handle_list_tools(id),
            "tools/call" => self.handle_call_tool(id, request.params).await,
            "resources/list" => self.handle_list_resources(id).await,
            "resources/read" => self.handle_read_resource(id, request.params).await,
            "shutdown" => self.handle_shutdown(id),
            _ => JsonRpcResponse::error(
                id,
                error_codes::METHOD_NOT_FOUND,
                format!("Method not found: {}", request.method),
            ),
        };
        Some(response)
    }

    fn handle_initialize(&self, id: Option<Value>) -> JsonRpcResponse {
        let mut capabilities = json!({ "tools": { "listChanged": false } });
        if self.resources.is_some() {
            capabilities["resources"] = json!({ "listChanged": false });
        }
        let server_info = ServerInfo {
            name: "sqlgate".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        };
        let result = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "serverInfo": server_info,
            "capabilities": capabilities
        });
        JsonRpcResponse::success(id, result)
    }

    fn handle_list_tools(&self, id: Option<Value>) -> JsonRpcResponse {
        let response = ListToolsResponse {
            tools: self.tools.list().into_iter().cloned().collect(),
        };
        to_success(id, &response)
    }

    async fn handle_call_tool(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let params: CallToolParams = match params.map(serde_json::from_value) {
            Some(Ok(params)) => params,
            Some(Err(e)) => {
                return JsonRpcResponse::error(
                    id,
                    error_codes::INVALID_PARAMS,
                    format!("Invalid params: {}", e),
                );
            }
            None => return JsonRpcResponse::error(id, error_codes::INVALID_PARAMS, "Missing params"),
        };

        if !self.tools.contains(&params.name) {
            return JsonRpcResponse::error(
                id,
                error_codes::INVALID_PARAMS,
                format!("Tool not found: {}", params.name),
            );
        }

        let result = self.call_tool(&params.name, params.arguments).await;
        to_success(id, &result.into_response())
    }

    /// Run a tool by name. Failures become error results, never protocol errors.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> ExecutionResult {
        let outcome = match name {
            EXECUTE_QUERY => match parse_args::<ExecuteQueryArgs>(arguments) {
                Ok(args) => self
                    .executor
                    .execute(&args.sql)
                    .await
                    .map(|r| ExecutionResult::from_query(&r)),
                Err(e) => Err(e),
            },
            CHECKPOINT => match parse_args::<CheckpointArgs>(arguments) {
                Ok(args) => self
                    .executor
                    .checkpoint(args.action, args.checkpoint_id)
                    .await
                    .map(|r| ExecutionResult::from_checkpoint(&r)),
                Err(e) => Err(e),
            },
            other => Err(GatewayError::InvalidArguments(format!(
                "unknown tool: {}",
                other
            ))),
        };

        outcome.unwrap_or_else(|err| {
            tracing::debug!(tool = name, code = err.code(), error = %err, "Tool call failed");
            ExecutionResult::from_error(&err)
        })
    }

    async fn handle_list_resources(&self, id: Option<Value>) -> JsonRpcResponse {
        let Some(catalog) = &self.resources else {
            return to_success(id, &ListResourcesResponse { resources: vec![] });
        };
        match catalog.list().await {
            Ok(resources) => to_success(id, &ListResourcesResponse { resources }),
            Err(e) => JsonRpcResponse::error(id, error_codes::INTERNAL_ERROR, e.to_string()),
        }
    }

    async fn handle_read_resource(
        &self,
        id: Option<Value>,
        params: Option<Value>,
    ) -> JsonRpcResponse {
        let params: ReadResourceParams = match params.map(serde_json::from_value) {
            Some(Ok(params)) => params,
            _ => return JsonRpcResponse::error(id, error_codes::INVALID_PARAMS, "Missing uri"),
        };
        let Some(catalog) = &self.resources else {
            return JsonRpcResponse::error(
                id,
                error_codes::INVALID_PARAMS,
                format!("Unknown resource: {}", params.uri),
            );
        };

        match catalog.read(&params.uri).await {
            Ok(contents) => to_success(
                id,
                &ReadResourceResponse {
                    contents: vec![contents],
                },
            ),
            Err(e @ GatewayError::InvalidArguments(_)) => {
                JsonRpcResponse::error(id, error_codes::INVALID_PARAMS, e.to_string())
            }
            Err(e) => JsonRpcResponse::error(id, error_codes::INTERNAL_ERROR, e.to_string()),
        }
    }

    fn handle_shutdown(&self, id: Option<Value>) -> JsonRpcResponse {
        tracing::info!("MCP server shutdown requested");
        JsonRpcResponse::success(id, json!(null))
    }

    /// Roll back and release an open checkpoint session.
    async fn close_session(&self) {
        match self.executor.session().close().await {
            Ok(discarded) => tracing::warn!(
                discarded,
                "Discarded uncommitted checkpoint session on shutdown"
            ),
            Err(GatewayError::NoActiveSession) => {}
            Err(e) => tracing::warn!(error = %e, "Failed to discard checkpoint session on shutdown"),
        }
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(arguments: Value) -> Result<T, GatewayError> {
    serde_json::from_value(arguments).map_err(|e| GatewayError::InvalidArguments(e.to_string()))
}

fn to_success<T: serde::Serialize>(id: Option<Value>, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::error(id, error_codes::INTERNAL_ERROR, e.to_string()),
    }
}
