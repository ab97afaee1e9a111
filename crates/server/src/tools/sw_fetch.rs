//! sw_fetch tool implementation.
//!
//! Issues a request from a controlled page. The request goes through the
//! active worker's router, or straight to the network before activation.

use std::collections::BTreeMap;

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use wardrobe_sw_client::canonicalize;
use wardrobe_sw_core::{CacheMode, Destination, Error, Method, Request, RequestMode};

use super::json_result;
use crate::runtime::Runtime;

/// Input parameters for sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchParams {
    /// Absolute URL, or a path resolved against the worker scope.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Request destination, e.g. "document", "image", "script".
    #[serde(default)]
    pub destination: Option<Destination>,

    /// Request mode; "navigate" marks a top-level navigation.
    #[serde(default)]
    pub mode: Option<RequestMode>,

    /// Extra request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Bypass HTTP caches on the way to the network.
    #[serde(default)]
    pub reload: bool,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchOutput {
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub content_type: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub response_type: String,
    /// Whether the response was served out of a cache namespace.
    pub from_cache: bool,
    /// Body decoded as UTF-8 (lossy).
    pub body: String,
    pub body_bytes: usize,
}

impl SwFetchParams {
    fn into_request(self, runtime: &Runtime) -> Result<Request, Error> {
        let method: Method = self.method.parse()?;
        let url = canonicalize(&self.url, Some(&runtime.config().scope)).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        let mut request = Request::new(method, url);
        if let Some(destination) = self.destination {
            request = request.with_destination(destination);
        }
        if let Some(mode) = self.mode {
            request = request.with_mode(mode);
            if mode == RequestMode::Navigate && self.destination.is_none() {
                request = request.with_destination(Destination::Document);
            }
        }
        if self.reload {
            request = request.with_cache_mode(CacheMode::Reload);
        }
        for (name, value) in self.headers {
            request = request.with_header(&name, value);
        }
        Ok(request)
    }
}

/// Implementation of the sw_fetch tool.
pub async fn fetch_impl(runtime: &Runtime, params: SwFetchParams) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()).into());
    }

    let request = params.into_request(runtime)?;
    let response = runtime.fetch(&request).await?;
    runtime.settle().await;

    let output = SwFetchOutput {
        url: request.url.to_string(),
        status: response.status,
        status_text: response.status_text.clone(),
        content_type: response.content_type().map(str::to_string),
        response_type: response.response_type.as_str().to_string(),
        from_cache: response.from_cache,
        body: response.text(),
        body_bytes: response.body.len(),
        headers: response.headers,
    };

    json_result(&output)
}
