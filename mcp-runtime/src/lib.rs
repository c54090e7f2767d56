use clap::{Args, Subcommand};
use esview_core::error::{ErrorReport, codes};
use serde_json::{Map, Value, json};
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

pub mod facade;
pub mod registry;
pub mod transport;
mod util;

pub use facade::{ElasticsearchFacade, PathSegment};
pub use registry::{InvocationError, ToolDescriptor, ToolOutput, ToolRegistry, tool_definitions};
pub use transport::{ConfigError, ConnectionConfig, HttpTransport, Transport, parse_hosts};

use util::to_pretty_json;

const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
const MCP_SERVER_NAME: &str = "esview-mcp";
const MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

#[derive(Subcommand)]
pub enum McpCommands {
    /// Run the Elasticsearch MCP server over stdio
    Serve,
    /// Print the tool catalog as JSON
    Tools,
    /// Invoke a single tool once and print its result
    Call(McpCallArgs),
}

#[derive(Args, Clone, Debug)]
pub struct McpCallArgs {
    /// Tool name, e.g. get_cluster_health
    pub name: String,
    /// Tool argument as key=value (repeatable)
    #[arg(long = "arg", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub args: Vec<(String, String)>,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("argument name missing in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

pub async fn run(connection: ConnectionConfig, command: McpCommands) -> i32 {
    match command {
        McpCommands::Tools => {
            println!("{}", to_pretty_json(&tools_list_payload(&tool_definitions())));
            0
        }
        McpCommands::Serve => {
            let Some(registry) = connect(&connection) else {
                return 1;
            };
            let server = McpServer::new(registry);
            match server.serve_stdio().await {
                Ok(()) => 0,
                Err(err) => {
                    print_report(&ErrorReport::new(codes::SERVER_ERROR, err));
                    1
                }
            }
        }
        McpCommands::Call(call) => {
            let Some(registry) = connect(&connection) else {
                return 1;
            };
            let args: Map<String, Value> = call
                .args
                .into_iter()
                .map(|(key, value)| (key, Value::String(value)))
                .collect();
            match registry.invoke(&call.name, &args).await {
                Ok(output) => {
                    println!("{}", output.text());
                    0
                }
                Err(err) => {
                    print_report(&err.to_report());
                    2
                }
            }
        }
    }
}

fn connect(connection: &ConnectionConfig) -> Option<ToolRegistry<HttpTransport>> {
    let registry = HttpTransport::new(connection)
        .map_err(|err| err.to_string())
        .and_then(|transport| ToolRegistry::new(transport).map_err(|err| err.to_string()));
    match registry {
        Ok(registry) => {
            tracing::info!(
                hosts = ?registry.facade().transport().hosts(),
                authenticated = connection.credentials().is_some(),
                "Elasticsearch transport configured"
            );
            Some(registry)
        }
        Err(message) => {
            tracing::error!(error = %message, "invalid Elasticsearch connection settings");
            print_report(&ErrorReport::new(codes::CONFIG_ERROR, message));
            None
        }
    }
}

fn print_report(report: &ErrorReport) {
    match serde_json::to_value(report) {
        Ok(payload) => eprintln!("{}", to_pretty_json(&payload)),
        Err(_) => eprintln!("{}: {}", report.error, report.message),
    }
}

/// How a message arrived; replies use the same framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    ContentLength,
    Line,
}

#[derive(Debug)]
struct Incoming {
    framing: Framing,
    payload: Result<Value, String>,
}

pub struct McpServer<T> {
    registry: ToolRegistry<T>,
}

impl<T: Transport> McpServer<T> {
    pub fn new(registry: ToolRegistry<T>) -> Self {
        Self { registry }
    }

    pub async fn serve_stdio(&self) -> Result<(), String> {
        let reader = BufReader::new(io::stdin());
        let writer = io::stdout();
        self.serve(reader, writer).await
    }

    /// Serve until the reader reaches EOF.
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> Result<(), String>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        tracing::info!(
            server = MCP_SERVER_NAME,
            version = env!("CARGO_PKG_VERSION"),
            tools = self.registry.list().len(),
            "MCP server ready"
        );

        loop {
            let incoming = read_message(&mut reader)
                .await
                .map_err(|e| format!("Failed to read MCP message: {e}"))?;
            let Some(incoming) = incoming else {
                break;
            };

            let reply = match incoming.payload {
                Ok(message) => self.handle_incoming_message(message).await,
                Err(parse_error) => {
                    tracing::warn!(error = %parse_error, "unparseable MCP message");
                    Some(error_response(Value::Null, RpcError::parse_error(parse_error)))
                }
            };
            let Some(reply) = reply else {
                continue;
            };
            write_message(&mut writer, incoming.framing, &reply)
                .await
                .map_err(|e| format!("Failed to write MCP response: {e}"))?;
        }

        tracing::info!("MCP client closed stdin, shutting down");
        Ok(())
    }

    /// Batches are answered with one array; `None` when nothing needs a reply.
    async fn handle_incoming_message(&self, incoming: Value) -> Option<Value> {
        let Value::Array(batch) = incoming else {
            return self.handle_single_message(incoming).await;
        };
        if batch.is_empty() {
            return Some(error_response(
                Value::Null,
                RpcError::invalid_request("Batch request must not be empty"),
            ));
        }

        let mut responses = Vec::with_capacity(batch.len());
        for item in batch {
            if let Some(response) = self.handle_single_message(item).await {
                responses.push(response);
            }
        }
        (!responses.is_empty()).then_some(Value::Array(responses))
    }

    async fn handle_single_message(&self, incoming: Value) -> Option<Value> {
        let Some(obj) = incoming.as_object() else {
            return Some(error_response(
                Value::Null,
                RpcError::invalid_request("Request must be a JSON object"),
            ));
        };

        if obj.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
            let id = obj.get("id").cloned().unwrap_or(Value::Null);
            return Some(error_response(
                id,
                RpcError::invalid_request("jsonrpc must be '2.0'"),
            ));
        }

        // Client responses carry no method; the server never issues requests.
        let method = obj.get("method").and_then(Value::as_str)?;

        let params = obj.get("params").cloned().unwrap_or(Value::Null);
        match obj.get("id").cloned() {
            Some(id) => {
                let result = self.handle_request(method, params).await;
                Some(match result {
                    Ok(payload) => success_response(id, payload),
                    Err(err) => error_response(id, err),
                })
            }
            None => {
                tracing::debug!(method, "notification received");
                None
            }
        }
    }

    async fn handle_request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            "initialize" => Ok(self.initialize_payload()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(tools_list_payload(self.registry.list())),
            "tools/call" => self.handle_tools_call(params).await,
            "resources/list" => Ok(json!({ "resources": [] })),
            "prompts/list" => Ok(json!({ "prompts": [] })),
            _ => Err(RpcError::method_not_found(method)),
        }
    }

    fn initialize_payload(&self) -> Value {
        json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {
                "tools": {
                    "listChanged": false
                }
            },
            "serverInfo": {
                "name": MCP_SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            },
            "instructions": "Read-only Elasticsearch diagnostics. Start with get_cluster_health, then drill into indices, aliases, mappings and shard allocation. Search bodies are Elasticsearch Query DSL passed as JSON text."
        })
    }

    async fn handle_tools_call(&self, params: Value) -> Result<Value, RpcError> {
        let params = params
            .as_object()
            .ok_or_else(|| RpcError::invalid_params("tools/call params must be an object"))?;

        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::invalid_params("tools/call requires string field 'name'"))?;

        let args = match params.get("arguments") {
            Some(Value::Object(map)) => map.clone(),
            Some(Value::Null) | None => Map::new(),
            Some(_) => {
                return Err(RpcError::invalid_params(
                    "tools/call 'arguments' must be an object",
                ));
            }
        };

        match self.registry.invoke(name, &args).await {
            Ok(output) => Ok(build_tool_call_response(&output)),
            Err(err) => Ok(build_tool_error_response(&err.to_report())),
        }
    }
}

fn tools_list_payload(tools: &[ToolDescriptor]) -> Value {
    let tools: Vec<Value> = tools
        .iter()
        .map(|tool| {
            json!({
                "name": tool.name,
                "description": tool.full_description(),
                "inputSchema": tool.input_schema(),
            })
        })
        .collect();
    json!({ "tools": tools })
}

fn build_tool_call_response(output: &ToolOutput) -> Value {
    let mut response = json!({
        "content": [{ "type": "text", "text": output.text() }]
    });
    if let Some(structured) = output.structured_content() {
        // structuredContent must be an object; lists are wrapped.
        response["structuredContent"] = match structured {
            Value::Object(_) => structured.clone(),
            other => json!({ "items": other }),
        };
    }
    response
}

fn build_tool_error_response(report: &ErrorReport) -> Value {
    let envelope = serde_json::to_value(report).unwrap_or_else(|_| {
        json!({ "error": codes::INTERNAL_ERROR, "message": report.message })
    });
    json!({
        "isError": true,
        "content": [{ "type": "text", "text": to_pretty_json(&envelope) }],
        "structuredContent": envelope
    })
}

#[derive(Debug)]
struct RpcError {
    code: i64,
    message: String,
}

impl RpcError {
    fn parse_error(message: impl Into<String>) -> Self {
        Self {
            code: -32700,
            message: message.into(),
        }
    }

    fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            code: -32600,
            message: message.into(),
        }
    }

    fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: format!("Method not found: {method}"),
        }
    }

    fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: -32602,
            message: message.into(),
        }
    }
}

fn success_response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

fn error_response(id: Value, error: RpcError) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": error.code,
            "message": error.message
        }
    })
}

/// Read one message in either framing. `Ok(None)` on clean EOF.
async fn read_message<R>(reader: &mut R) -> Result<Option<Incoming>, std::io::Error>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length: Option<usize> = None;

    loop {
        let mut line = String::new();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            if content_length.is_none() {
                return Ok(None);
            }
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "Unexpected EOF while reading MCP headers",
            ));
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            if content_length.is_some() {
                break;
            }
            continue;
        }

        if content_length.is_none() && !is_header_line(trimmed) {
            return Ok(Some(Incoming {
                framing: Framing::Line,
                payload: serde_json::from_str(trimmed)
                    .map_err(|e| format!("Invalid JSON payload: {e}")),
            }));
        }

        if trimmed.to_ascii_lowercase().starts_with("content-length:") {
            let raw_len = trimmed
                .split_once(':')
                .map(|(_, right)| right.trim())
                .unwrap_or_default();
            let parsed = raw_len.parse::<usize>().map_err(|_| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "Invalid Content-Length header",
                )
            })?;
            content_length = Some(parsed);
        }
    }

    let content_length = content_length.ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "Missing Content-Length header",
        )
    })?;
    if content_length > MAX_MESSAGE_BYTES {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Content-Length {content_length} exceeds {MAX_MESSAGE_BYTES} bytes"),
        ));
    }
    let mut payload = vec![0_u8; content_length];
    reader.read_exact(&mut payload).await?;

    Ok(Some(Incoming {
        framing: Framing::ContentLength,
        payload: serde_json::from_slice(&payload).map_err(|e| format!("Invalid JSON payload: {e}")),
    }))
}

/// `Name: value` with an RFC 7230 token name. JSON text never matches.
fn is_header_line(line: &str) -> bool {
    line.split_once(':').is_some_and(|(name, _)| {
        !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
    })
}

async fn write_message<W>(
    writer: &mut W,
    framing: Framing,
    value: &Value,
) -> Result<(), std::io::Error>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(value).map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Failed to serialize JSON: {e}"),
        )
    })?;
    match framing {
        Framing::ContentLength => {
            let header = format!(
                "Content-Length: {}\r\nContent-Type: application/json\r\n\r\n",
                body.len()
            );
            writer.write_all(header.as_bytes()).await?;
            writer.write_all(&body).await?;
        }
        Framing::Line => {
            writer.write_all(&body).await?;
            writer.write_all(b"\n").await?;
        }
    }
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facade::testing::RecordingTransport;
    use esview_core::error::TransportError;

    fn server(transport: RecordingTransport) -> McpServer<RecordingTransport> {
        McpServer::new(ToolRegistry::new(transport).unwrap())
    }

    async fn exchange(server: &McpServer<RecordingTransport>, input: &str) -> String {
        let mut output = Vec::new();
        server
            .serve(BufReader::new(input.as_bytes()), &mut output)
            .await
            .unwrap();
        String::from_utf8(output).unwrap()
    }

    fn line_replies(raw: &str) -> Vec<Value> {
        raw.lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn key_value_arguments_split_on_first_equals() {
        assert_eq!(
            parse_key_value("queryBody={\"a\":\"b=c\"}").unwrap(),
            ("queryBody".to_string(), "{\"a\":\"b=c\"}".to_string())
        );
        assert!(parse_key_value("index").is_err());
        assert!(parse_key_value("=logs").is_err());
    }

    #[test]
    fn tools_list_exposes_string_schemas() {
        let payload = tools_list_payload(&tool_definitions());
        let tools = payload["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 10);
        let by_name = tools
            .iter()
            .find(|tool| tool["name"] == "get_shard_allocation_for_node")
            .unwrap();
        assert_eq!(by_name["inputSchema"]["required"], json!(["nodeId"]));
        assert_eq!(by_name["inputSchema"]["properties"]["nodeId"]["type"], "string");
    }

    #[tokio::test]
    async fn initialize_and_tools_list_over_content_length_framing() {
        let server = server(RecordingTransport::default());
        let init = r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#;
        let list = r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#;
        let input = format!(
            "Content-Length: {}\r\n\r\n{init}Content-Length: {}\r\n\r\n{list}",
            init.len(),
            list.len()
        );
        let output = exchange(&server, &input).await;

        let bodies: Vec<Value> = output
            .split("Content-Length: ")
            .filter(|chunk| !chunk.is_empty())
            .map(|chunk| {
                let (_, body) = chunk.split_once("\r\n\r\n").unwrap();
                serde_json::from_str(body).unwrap()
            })
            .collect();
        assert_eq!(bodies.len(), 2);
        assert_eq!(bodies[0]["result"]["protocolVersion"], MCP_PROTOCOL_VERSION);
        assert_eq!(bodies[0]["result"]["serverInfo"]["name"], "esview-mcp");
        assert_eq!(bodies[1]["id"], 2);
        assert_eq!(bodies[1]["result"]["tools"].as_array().unwrap().len(), 10);
    }

    #[tokio::test]
    async fn line_framing_is_answered_in_kind() {
        let server = server(RecordingTransport::default());
        let output = exchange(
            &server,
            "{\"jsonrpc\":\"2.0\",\"id\":\"a\",\"method\":\"ping\"}\n\
             {\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n\
             {\"jsonrpc\":\"2.0\",\"id\":3,\"method\":\"resources/read\"}\n",
        )
        .await;
        let replies = line_replies(&output);
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0], json!({ "jsonrpc": "2.0", "id": "a", "result": {} }));
        assert_eq!(replies[1]["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn malformed_json_and_empty_batches_are_protocol_errors() {
        let server = server(RecordingTransport::default());
        let output = exchange(&server, "{not json\n[]\n").await;
        let replies = line_replies(&output);
        assert_eq!(replies[0]["error"]["code"], -32700);
        assert_eq!(replies[1]["error"]["code"], -32600);
        assert_eq!(replies[1]["id"], Value::Null);
    }

    #[tokio::test]
    async fn non_object_lines_get_a_reply_instead_of_silence() {
        let server = server(RecordingTransport::default());
        let output = exchange(&server, "hello\n\"str\"\n42\n").await;
        let replies = line_replies(&output);
        assert_eq!(replies.len(), 3);
        assert_eq!(replies[0]["error"]["code"], -32700);
        assert_eq!(replies[1]["error"]["code"], -32600);
        assert_eq!(replies[2]["error"]["code"], -32600);
    }

    #[test]
    fn header_lines_are_told_apart_from_json_text() {
        assert!(is_header_line("Content-Length: 12"));
        assert!(is_header_line("content-type: application/json"));
        assert!(!is_header_line("{\"jsonrpc\":\"2.0\"}"));
        assert!(!is_header_line("\"a:b\""));
        assert!(!is_header_line("hello"));
    }

    #[tokio::test]
    async fn oversized_content_length_is_rejected_before_allocating() {
        let server = server(RecordingTransport::default());
        let mut output = Vec::new();
        let err = server
            .serve(
                BufReader::new("Content-Length: 99999999999999\r\n\r\n{}".as_bytes()),
                &mut output,
            )
            .await
            .unwrap_err();
        assert!(err.contains("exceeds"));
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn batches_are_answered_with_one_array() {
        let server = server(RecordingTransport::default());
        let output = exchange(
            &server,
            "[{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"},{\"jsonrpc\":\"2.0\",\"method\":\"notifications/cancelled\"},{\"jsonrpc\":\"1.0\",\"id\":2,\"method\":\"ping\"}]\n",
        )
        .await;
        let replies = line_replies(&output);
        assert_eq!(replies.len(), 1);
        let batch = replies[0].as_array().unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0]["id"], 1);
        assert_eq!(batch[1]["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn single_element_batch_still_replies_with_array() {
        let server = server(RecordingTransport::default());
        let output = exchange(&server, "[{\"jsonrpc\":\"2.0\",\"id\":7,\"method\":\"ping\"}]\n").await;
        let replies = line_replies(&output);
        assert_eq!(replies[0].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn tools_call_success_carries_structured_content() {
        let transport = RecordingTransport::replying(
            200,
            r#"[{"alias":"logs","index":"logs-000001","is_write_index":"true"},{"alias":".kibana","index":".kibana_1"}]"#,
        );
        let server = server(transport);
        let output = exchange(
            &server,
            "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"tools/call\",\"params\":{\"name\":\"get_cat_aliases\"}}\n",
        )
        .await;
        let reply = &line_replies(&output)[0]["result"];
        assert!(reply.get("isError").is_none());
        let items = reply["structuredContent"]["items"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["alias"], "logs");
        let text: Value =
            serde_json::from_str(reply["content"][0]["text"].as_str().unwrap()).unwrap();
        assert_eq!(text[0]["index"], "logs-000001");
    }

    #[tokio::test]
    async fn tools_call_failures_are_tool_results() {
        let server = server(RecordingTransport::failing(TransportError::Connection(
            "Connection refused".to_string(),
        )));
        let output = exchange(
            &server,
            "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"tools/call\",\"params\":{\"name\":\"get_cluster_health\",\"arguments\":{}}}\n\
             {\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"tools/call\",\"params\":{\"name\":\"nope\"}}\n\
             {\"jsonrpc\":\"2.0\",\"id\":3,\"method\":\"tools/call\",\"params\":{\"name\":\"get_mappings\",\"arguments\":[]}}\n",
        )
        .await;
        let replies = line_replies(&output);
        assert_eq!(replies[0]["result"]["isError"], true);
        assert_eq!(replies[0]["result"]["structuredContent"]["error"], "transport_error");
        assert_eq!(replies[1]["result"]["structuredContent"]["error"], "not_found");
        assert_eq!(replies[2]["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn raw_documents_are_returned_verbatim() {
        let mapping = r#"{"my_index":{"mappings":{"properties":{"field1":{"type":"text"}}}}}"#;
        let server = server(RecordingTransport::replying(200, mapping));
        let output = exchange(
            &server,
            "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"tools/call\",\"params\":{\"name\":\"get_mappings\",\"arguments\":{\"index\":\"my_index\"}}}\n",
        )
        .await;
        let reply = &line_replies(&output)[0]["result"];
        assert_eq!(reply["content"][0]["text"], mapping);
        assert!(reply.get("structuredContent").is_none());
    }
}
