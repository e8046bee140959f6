use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{CONNECTION, CONTENT_LENGTH, HOST, TRANSFER_ENCODING};
use axum::http::{HeaderValue, Request, Response};
use reqwest::Client;

use super::{DispatchOptions, ExecutionFabric, InvokeError, ScriptHandle};
use crate::config::FabricConfig;
use crate::error::Result;

pub const SCRIPT_HEADER: &str = "x-dispatch-script";
pub const CPU_MS_HEADER: &str = "x-dispatch-cpu-ms";
pub const MEMORY_HEADER: &str = "x-dispatch-memory";
pub const OUTBOUND_HEADER: &str = "x-dispatch-outbound";
pub const DISPATCH_ERROR_HEADER: &str = "x-dispatch-error";

const SCRIPT_NOT_FOUND: &str = "script-not-found";
const MAX_FORWARD_BODY: usize = 32 * 1024 * 1024;

/// Forwards dispatched requests to an execution gateway over HTTP.
///
/// The gateway picks the script from `X-Dispatch-Script` and applies the
/// limits carried in the other `X-Dispatch-*` headers.
#[derive(Clone)]
pub struct HttpFabric {
    client: Client,
    base_url: String,
}

impl HttpFabric {
    pub fn new(config: &FabricConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl ExecutionFabric for HttpFabric {
    fn acquire(&self, script_name: &str, options: DispatchOptions) -> Box<dyn ScriptHandle> {
        Box::new(HttpHandle {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            script_name: script_name.to_string(),
            options,
        })
    }
}

struct HttpHandle {
    client: Client,
    base_url: String,
    script_name: String,
    options: DispatchOptions,
}

fn header_value(value: &str) -> std::result::Result<HeaderValue, InvokeError> {
    HeaderValue::from_str(value).map_err(|e| InvokeError::Failed(format!("invalid header: {e}")))
}

#[async_trait]
impl ScriptHandle for HttpHandle {
    fn script_name(&self) -> &str {
        &self.script_name
    }

    async fn invoke(&self, request: Request<Body>) -> std::result::Result<Response<Body>, InvokeError> {
        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, MAX_FORWARD_BODY)
            .await
            .map_err(|e| InvokeError::Failed(format!("failed to read request body: {e}")))?;

        let path = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let url = format!("{}{}", self.base_url, path);

        let mut headers = parts.headers;
        for name in [HOST, CONNECTION, CONTENT_LENGTH, TRANSFER_ENCODING] {
            headers.remove(name);
        }
        headers.insert(SCRIPT_HEADER, header_value(&self.script_name)?);
        if let Some(cpu_ms) = self.options.limits.cpu_ms {
            headers.insert(CPU_MS_HEADER, HeaderValue::from(cpu_ms));
        }
        if let Some(memory) = self.options.limits.memory {
            headers.insert(MEMORY_HEADER, HeaderValue::from(memory));
        }
        if let Some(outbound) = &self.options.outbound {
            headers.insert(OUTBOUND_HEADER, header_value(outbound)?);
        }

        let upstream = self
            .client
            .request(parts.method, &url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    InvokeError::Failed(format!("timed out: {e}"))
                } else {
                    InvokeError::Failed(e.to_string())
                }
            })?;

        if upstream
            .headers()
            .get(DISPATCH_ERROR_HEADER)
            .is_some_and(|v| v.as_bytes() == SCRIPT_NOT_FOUND.as_bytes())
        {
            return Err(InvokeError::NotFound);
        }

        let status = upstream.status();
        let mut response_headers = upstream.headers().clone();
        response_headers.remove(TRANSFER_ENCODING);
        response_headers.remove(CONTENT_LENGTH);
        let bytes = upstream
            .bytes()
            .await
            .map_err(|e| InvokeError::Failed(format!("failed to read script response: {e}")))?;

        let mut response = Response::new(Body::from(bytes));
        *response.status_mut() = status;
        *response.headers_mut() = response_headers;
        Ok(response)
    }
}
