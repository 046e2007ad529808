//! Model Context Protocol server (C8): an LF-framed JSON-RPC server, built
//! directly on [`crate::jsonrpc::JsonRpcDriver`], exposing `initialize`,
//! `tools/list`, `resources/list`, `prompts/list`, and `tools/call`. Tool
//! listing and invocation are delegated to a host-supplied [`ToolRegistry`].

use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
};

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{
    error::McpError,
    framing::FrameMode,
    jsonrpc::{JsonRpcConfig, JsonRpcDriver, MethodCallFn},
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

const PROTOCOL_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "devrpc";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolParamKind {
    String,
    Number,
    Boolean,
    /// No recognized type; schema carries only a description.
    Untyped,
}

#[derive(Debug, Clone)]
pub struct ToolParam {
    pub name: String,
    pub kind: ToolParamKind,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ToolParam>,
}

/// Host-supplied tool catalog and invoker. Mirrors the original server's LLM
/// tool manager: list tools with their parameter schema, and dispatch a
/// named call with its JSON arguments.
pub trait ToolRegistry: Send + Sync {
    fn list_tools(&self) -> Vec<Tool>;
    fn call_tool<'a>(&'a self, name: &'a str, arguments: Value) -> BoxFuture<'a, Result<Value, McpError>>;
}

pub struct McpServer {
    driver: JsonRpcDriver,
}

impl McpServer {
    pub fn start<R, W>(reader: R, writer: W, registry: Arc<dyn ToolRegistry>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let on_method_call: MethodCallFn = Arc::new(move |driver, method, params, id| {
            let registry = registry.clone();
            tokio::spawn(async move {
                match dispatch(&method, params, registry.as_ref()).await {
                    Ok(Some(result)) => {
                        let _ = driver.reply(id, result).await;
                    }
                    Ok(None) => {
                        let _ = driver
                            .reply_with_error(id, -1, format!("No such method `{method}`"))
                            .await;
                    }
                    Err(err) => {
                        let _ = driver.reply_with_error(id, -1, err.to_string()).await;
                    }
                }
            });
            true
        });

        let driver = JsonRpcDriver::start(
            reader,
            writer,
            JsonRpcConfig {
                frame_mode: FrameMode::lf(),
                on_method_call: Some(on_method_call),
                on_notification: None,
            },
        );

        Self { driver }
    }

    pub fn driver(&self) -> &JsonRpcDriver {
        &self.driver
    }
}

async fn dispatch(
    method: &str,
    params: Value,
    registry: &dyn ToolRegistry,
) -> Result<Option<Value>, McpError> {
    match method {
        "initialize" => Ok(Some(serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": { "list": true, "call": true },
                "resources": { "list": true, "read": true },
                "prompts": { "list": true, "get": true },
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": SERVER_VERSION,
            },
        }))),
        "tools/list" => {
            let tools: Vec<Value> = registry
                .list_tools()
                .into_iter()
                .map(tool_to_schema)
                .collect();
            Ok(Some(serde_json::json!({ "tools": tools })))
        }
        "resources/list" => Ok(Some(serde_json::json!({ "resources": [] }))),
        "prompts/list" => Ok(Some(serde_json::json!({ "prompts": [] }))),
        "tools/call" => {
            let name = params
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| McpError::ToolNotFound(String::new()))?;
            let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);
            let result = registry.call_tool(name, arguments).await?;
            Ok(Some(serde_json::json!({
                "content": [{ "type": "text", "text": result.to_string() }],
                "isError": false,
            })))
        }
        _ => Ok(None),
    }
}

fn tool_to_schema(tool: Tool) -> Value {
    let mut properties = serde_json::Map::new();
    for param in &tool.parameters {
        let node = match param.kind {
            ToolParamKind::String => serde_json::json!({
                "type": "string",
                "description": param.description,
            }),
            ToolParamKind::Number => serde_json::json!({
                "type": "number",
                "description": param.description,
            }),
            ToolParamKind::Boolean => serde_json::json!({
                "type": "boolean",
                "description": param.description,
            }),
            ToolParamKind::Untyped => serde_json::json!({
                "description": param.description,
            }),
        };
        properties.insert(param.name.clone(), node);
    }

    serde_json::json!({
        "name": tool.name,
        "description": tool.description,
        "inputSchema": {
            "type": "object",
            "properties": Value::Object(properties),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jsonrpc::{JsonRpcConfig as ClientConfig, JsonRpcDriver as ClientDriver};
    use tokio::io::duplex;

    struct FixtureRegistry;

    impl ToolRegistry for FixtureRegistry {
        fn list_tools(&self) -> Vec<Tool> {
            vec![Tool {
                name: "echo".to_string(),
                description: "echoes its input".to_string(),
                parameters: vec![ToolParam {
                    name: "text".to_string(),
                    kind: ToolParamKind::String,
                    description: "text to echo".to_string(),
                }],
            }]
        }

        fn call_tool<'a>(&'a self, name: &'a str, arguments: Value) -> BoxFuture<'a, Result<Value, McpError>> {
            Box::pin(async move {
                if name != "echo" {
                    return Err(McpError::ToolNotFound(name.to_string()));
                }
                Ok(arguments)
            })
        }
    }

    async fn start_pair() -> (McpServer, ClientDriver) {
        let (client_io, server_io) = duplex(8192);
        let (client_read, client_write) = tokio::io::split(client_io);
        let (server_read, server_write) = tokio::io::split(server_io);
        let server = McpServer::start(server_read, server_write, Arc::new(FixtureRegistry));
        let client = ClientDriver::start(client_read, client_write, ClientConfig::default());
        (server, client)
    }

    #[tokio::test]
    async fn initialize_reports_capabilities() {
        let (_server, client) = start_pair().await;
        let result = client.call("initialize", Value::Null).await.unwrap();
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(result["capabilities"]["tools"]["call"], true);
    }

    #[tokio::test]
    async fn tools_list_reports_schema() {
        let (_server, client) = start_pair().await;
        let result = client.call("tools/list", Value::Null).await.unwrap();
        let tools = result["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["name"], "echo");
        assert_eq!(tools[0]["inputSchema"]["properties"]["text"]["type"], "string");
    }

    #[tokio::test]
    async fn resources_and_prompts_are_empty() {
        let (_server, client) = start_pair().await;
        let resources = client.call("resources/list", Value::Null).await.unwrap();
        assert_eq!(resources["resources"].as_array().unwrap().len(), 0);
        let prompts = client.call("prompts/list", Value::Null).await.unwrap();
        assert_eq!(prompts["prompts"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn tools_call_invokes_registry() {
        let (_server, client) = start_pair().await;
        let result = client
            .call(
                "tools/call",
                serde_json::json!({"name": "echo", "arguments": {"text": "hi"}}),
            )
            .await
            .unwrap();
        assert_eq!(result["isError"], false);
    }

    #[tokio::test]
    async fn unknown_tool_call_reports_error() {
        let (_server, client) = start_pair().await;
        let err = client
            .call("tools/call", serde_json::json!({"name": "nope"}))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::DriverError::Peer { .. }));
    }
}
