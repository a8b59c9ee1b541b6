//! The `http_request` node (server scope): perform an HTTP call.

use async_trait::async_trait;
use serde_json::{Value, json};
use weft_node::{AiHints, EdgeMap, ExecutionContext, Node, NodeFault, NodeMetadata};

const METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD"];

pub struct HttpRequestNode {
  metadata: NodeMetadata,
  client: reqwest::Client,
}

impl HttpRequestNode {
  pub fn new() -> Self {
    Self {
      metadata: NodeMetadata {
        id: "http_request".to_string(),
        name: "HTTP Request".to_string(),
        version: "1.0.0".to_string(),
        description: Some("Perform an HTTP request and expose status and body".to_string()),
        inputs: vec![
          "url".to_string(),
          "method".to_string(),
          "headers".to_string(),
          "body".to_string(),
        ],
        outputs: vec!["status".to_string(), "body".to_string()],
        ai_hints: AiHints {
          purpose: "Call an HTTP endpoint from a workflow".to_string(),
          when_to_use: "Fetching or pushing data to external services".to_string(),
          expected_edges: vec!["success".to_string(), "error".to_string()],
          example_usage: None,
          example_config: Some(json!({
            "url": "https://example.com/api",
            "method": "POST",
            "headers": { "content-type": "application/json" },
            "body": { "value": "{{$.payload}}" }
          })),
          get_from_state: None,
        },
        is_loop: false,
        continue_edges: vec![],
      },
      client: reqwest::Client::new(),
    }
  }
}

impl Default for HttpRequestNode {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl Node for HttpRequestNode {
  fn metadata(&self) -> &NodeMetadata {
    &self.metadata
  }

  fn validate_config(&self, config: &Value) -> Result<(), Vec<String>> {
    let mut problems = Vec::new();
    if config.get("url").and_then(Value::as_str).is_none() {
      problems.push("missing required parameter 'url'".to_string());
    }
    if let Some(method) = config.get("method").and_then(Value::as_str) {
      if !METHODS.contains(&method.to_ascii_uppercase().as_str()) {
        problems.push(format!("unsupported HTTP method '{method}'"));
      }
    }
    if problems.is_empty() { Ok(()) } else { Err(problems) }
  }

  async fn execute(&self, ctx: &ExecutionContext, config: &Value) -> Result<EdgeMap, NodeFault> {
    let url = config
      .get("url")
      .and_then(Value::as_str)
      .ok_or_else(|| NodeFault::new("INVALID_CONFIG", "missing 'url' parameter"))?;
    let method = config
      .get("method")
      .and_then(Value::as_str)
      .unwrap_or("GET")
      .to_ascii_uppercase();

    let method: reqwest::Method = method
      .parse()
      .map_err(|_| NodeFault::new("INVALID_CONFIG", format!("bad HTTP method '{method}'")))?;

    let mut request = self.client.request(method, url);
    if let Some(headers) = config.get("headers").and_then(Value::as_object) {
      for (name, value) in headers {
        if let Some(value) = value.as_str() {
          request = request.header(name, value);
        }
      }
    }
    if let Some(body) = config.get("body") {
      request = request.json(body);
    }

    let response = tokio::select! {
      response = request.send() => {
        response.map_err(|e| NodeFault::new("HTTP_ERROR", e.to_string()))?
      }
      _ = ctx.cancel.cancelled() => return Err(NodeFault::cancelled()),
    };

    let status = response.status().as_u16();
    let body = response
      .text()
      .await
      .map_err(|e| NodeFault::new("HTTP_ERROR", e.to_string()))?;
    // Hand back parsed JSON when the body is JSON, raw text otherwise.
    let body: Value = serde_json::from_str(&body).unwrap_or(Value::String(body));

    Ok(EdgeMap::single("success", move || {
      json!({ "status": status, "body": body })
    }))
  }
}
