use std::{collections::BTreeMap, time::Duration};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    ChatflowError, Result,
    common::Vars,
    flow::{
        NodeId, NodeKind,
        actions::{Action, ActionOutput, from_params},
        template::{resolve_json_value, resolve_template},
    },
    runtime::Context,
};

use super::models::{Auth, HttpMethod};

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequestAction {
    url: String,
    #[serde(default)]
    method: HttpMethod,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    /// text or JSON, resolved against the session variables
    #[serde(default)]
    body: Option<Value>,
    #[serde(default)]
    auth: Option<Auth>,
    #[serde(default)]
    response_variable: Option<String>,
    /// falls back to the engine's `http_timeout_ms`
    #[serde(default)]
    timeout_ms: Option<u64>,
}

fn header_err(err: impl std::fmt::Display) -> ChatflowError {
    ChatflowError::Action(format!("invalid header: {}", err))
}

impl HttpRequestAction {
    fn headers(
        &self,
        vars: &Vars,
    ) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static("accept"), HeaderValue::from_static("*/*"));

        for (key, value) in &self.headers {
            let value = resolve_template(vars, value);
            headers.insert(key.parse::<HeaderName>().map_err(header_err)?, value.parse::<HeaderValue>().map_err(header_err)?);
        }

        let (name, value) = match &self.auth {
            None => return Ok(headers),
            Some(Auth::Bearer { token }) => ("authorization".to_string(), format!("Bearer {}", resolve_template(vars, token))),
            Some(Auth::Basic { username, password }) => {
                let pair = format!("{}:{}", resolve_template(vars, username), resolve_template(vars, password));
                ("authorization".to_string(), format!("Basic {}", STANDARD.encode(pair)))
            }
            Some(Auth::Header { name, value }) => (name.clone(), resolve_template(vars, value)),
        };
        headers.insert(name.parse::<HeaderName>().map_err(header_err)?, value.parse::<HeaderValue>().map_err(header_err)?);
        Ok(headers)
    }

    fn build_request(
        &self,
        ctx: &Context,
    ) -> Result<reqwest::RequestBuilder> {
        let vars = ctx.variables();
        let url = resolve_template(vars, &self.url);
        let timeout = self.timeout_ms.unwrap_or(ctx.config().engine.http_timeout_ms);

        let mut request = ctx
            .http()
            .request(self.method.to_reqwest(), &url)
            .headers(self.headers(vars)?)
            .timeout(Duration::from_millis(timeout));

        match &self.body {
            None | Some(Value::Null) => {}
            Some(Value::String(text)) => {
                request = request.body(resolve_template(vars, text));
            }
            Some(data) => {
                request = request.json(&resolve_json_value(vars, data));
            }
        }
        Ok(request)
    }

    async fn call(
        &self,
        ctx: &Context,
    ) -> Result<String> {
        let res = self.build_request(ctx)?.send().await?;
        let status = res.status();
        let text = res.text().await?;
        tracing::debug!(session_id = %ctx.session_id(), "http {} {} -> {}", self.method.as_ref(), self.url, status.as_u16());

        // JSON responses are kept serialized so templates can walk them
        Ok(match serde_json::from_str::<Value>(&text) {
            Ok(Value::String(s)) => s,
            Ok(v) => v.to_string(),
            Err(_) => text,
        })
    }
}

#[async_trait]
impl Action for HttpRequestAction {
    fn create(params: serde_json::Value) -> Result<Self> {
        from_params(params, &Self::schema())
    }

    fn schema() -> serde_json::Value {
        json!({
            "type": "object",
            "required": ["url"],
            "properties": {
                "url": { "type": "string", "minLength": 1 },
                "method": { "type": "string", "enum": ["GET", "POST", "PUT", "PATCH", "DELETE"] },
                "headers": {
                    "type": "object",
                    "additionalProperties": { "type": "string" }
                },
                "body": {},
                "auth": {
                    "oneOf": [
                        { "type": "null" },
                        {
                            "type": "object",
                            "required": ["type", "token"],
                            "properties": { "type": { "const": "bearer" }, "token": { "type": "string" } }
                        },
                        {
                            "type": "object",
                            "required": ["type", "username"],
                            "properties": {
                                "type": { "const": "basic" },
                                "username": { "type": "string" },
                                "password": { "type": "string" }
                            }
                        },
                        {
                            "type": "object",
                            "required": ["type", "name", "value"],
                            "properties": {
                                "type": { "const": "header" },
                                "name": { "type": "string" },
                                "value": { "type": "string" }
                            }
                        }
                    ]
                },
                "responseVariable": { "type": ["string", "null"] },
                "timeoutMs": { "type": ["integer", "null"], "minimum": 0 }
            }
        })
    }

    fn kind(&self) -> NodeKind {
        NodeKind::HttpRequest
    }

    async fn run(
        &self,
        ctx: &Context,
        nid: &NodeId,
    ) -> Result<ActionOutput> {
        let mut outputs = Vars::new();
        match self.call(ctx).await {
            Ok(body) => {
                if let Some(name) = self.response_variable.as_deref().filter(|n| !n.is_empty()) {
                    outputs.set(name, body);
                }
            }
            Err(err) => {
                tracing::warn!(session_id = %ctx.session_id(), node_id = %nid, "http request to {} failed: {}", self.url, err);
            }
        }
        Ok(ActionOutput::next().with_variables(outputs))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::HttpRequestAction;
    use crate::{
        flow::actions::{Action, Signal},
        testing::{Harness, serve_once},
    };

    #[test]
    fn test_schema() {
        assert!(HttpRequestAction::create(json!({"url": "http://x", "method": "TRACE"})).is_err());
        assert!(HttpRequestAction::create(json!({"url": "http://x", "auth": {"type": "bearer"}})).is_err());
        assert!(HttpRequestAction::create(json!({"method": "GET"})).is_err());
        assert!(
            HttpRequestAction::create(json!({
                "url": "http://x",
                "auth": {"type": "basic", "username": "u", "password": "p"},
                "responseVariable": "res",
                "timeoutMs": 500
            }))
            .is_ok()
        );
    }

    #[tokio::test]
    async fn test_unreachable_url_continues() {
        let h = Harness::new();
        let action = HttpRequestAction::create(json!({
            "url": "http://127.0.0.1:1/unreachable",
            "responseVariable": "res",
            "timeoutMs": 2000
        }))
        .unwrap();

        let out = action.run(&h.context(), &"n1".to_string()).await.unwrap();
        assert_eq!(out.signal, Signal::Continue);
        assert!(!out.variables.contains("res"));
    }

    #[tokio::test]
    async fn test_stores_json_response() {
        let (url, request) = serve_once(r#"{"order":{"id":7,"state":"shipped"}}"#).await;
        let h = Harness::new();
        let mut ctx = h.context();
        ctx.variables.set("token", "secret");
        ctx.variables.set("order", "7");
        let action = HttpRequestAction::create(json!({
            "url": format!("{}/orders/{{{{order}}}}", url),
            "method": "POST",
            "headers": {"x-trace": "t-{{order}}"},
            "auth": {"type": "bearer", "token": "{{token}}"},
            "body": {"id": "{{order}}"},
            "responseVariable": "res"
        }))
        .unwrap();

        let out = action.run(&ctx, &"n1".to_string()).await.unwrap();
        let stored: serde_json::Value = serde_json::from_str(out.variables.get("res").unwrap()).unwrap();
        assert_eq!(stored["order"]["state"], "shipped");

        let raw = request.await.unwrap().to_lowercase();
        assert!(raw.starts_with("post /orders/7 "));
        assert!(raw.contains("authorization: bearer secret"));
        assert!(raw.contains("x-trace: t-7"));
        assert!(raw.contains(r#"{"id":"7"}"#));
    }
}
