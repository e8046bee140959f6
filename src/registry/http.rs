use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::NamespaceRegistry;
use crate::config::RegistryConfig;
use crate::error::{Error, Result};
use crate::types::{ApiScript, OwnershipTagSet, TagFilter};

/// Response envelope used by every registry endpoint.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    result: Option<T>,
}

/// REST client for the dispatch namespace API.
#[derive(Clone)]
pub struct HttpRegistry {
    client: Client,
    scripts_url: String,
    api_token: String,
}

impl HttpRegistry {
    pub fn new(config: &RegistryConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            scripts_url: config.scripts_url(),
            api_token: config.api_token.clone(),
        })
    }

    fn script_url(&self, name: &str) -> String {
        format!("{}/{}", self.scripts_url, urlencoding::encode(name))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        Ok(request.bearer_auth(&self.api_token).send().await?)
    }

    async fn read_result<T: DeserializeOwned + Default>(&self, response: Response) -> Result<T> {
        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| Error::DependencyUnavailable(format!("malformed registry response: {e}")))?;
        Ok(envelope.result.unwrap_or_default())
    }

    /// Passes successful responses through; anything else is logged and
    /// reported as an unavailable dependency.
    async fn check(&self, response: Response, action: &str) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let url = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        tracing::warn!("Registry {action} failed: {url} {} {body}", status.as_u16());
        Err(Error::DependencyUnavailable(format!(
            "registry {action} returned {}",
            status.as_u16()
        )))
    }
}

fn tag_query(filters: &[TagFilter]) -> String {
    filters
        .iter()
        .map(|f| {
            let encoded = TagFilter {
                tag: urlencoding::encode(&f.tag).into_owned(),
                allow: f.allow,
            };
            encoded.to_string()
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Turns an error body into JSON so it can be forwarded to the caller as-is.
fn error_body(text: String) -> Value {
    serde_json::from_str(&text).unwrap_or_else(|_| {
        json!({ "success": false, "errors": [{ "message": text }] })
    })
}

#[async_trait]
impl NamespaceRegistry for HttpRegistry {
    async fn list_scripts(&self) -> Result<Vec<ApiScript>> {
        let response = self.send(self.client.get(&self.scripts_url)).await?;
        let response = self.check(response, "list scripts").await?;
        self.read_result(response).await
    }

    async fn list_scripts_by_tags(&self, filters: &[TagFilter]) -> Result<Vec<ApiScript>> {
        let url = format!("{}?tags={}", self.scripts_url, tag_query(filters));
        let response = self.send(self.client.get(&url)).await?;
        let response = self.check(response, "list scripts by tags").await?;
        self.read_result(response).await
    }

    async fn get_tags(&self, name: &str) -> Result<OwnershipTagSet> {
        let url = format!("{}/tags", self.script_url(name));
        let response = self.send(self.client.get(&url)).await?;

        // Not uploaded yet, so nobody owns it.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(OwnershipTagSet::new());
        }
        let response = self.check(response, "get tags").await?;

        let tags: Vec<String> = self.read_result(response).await?;
        Ok(OwnershipTagSet::from(tags))
    }

    async fn put_script(&self, name: &str, content: Bytes) -> Result<()> {
        let file_name = format!("{name}.mjs");
        let metadata = json!({ "main_module": file_name });

        let form = Form::new()
            .part(
                "script",
                Part::stream(content)
                    .file_name(file_name.clone())
                    .mime_str("application/javascript+module")?,
            )
            .part(
                "metadata",
                Part::text(metadata.to_string())
                    .file_name("metadata.json")
                    .mime_str("application/json")?,
            );

        let response = self
            .send(self.client.put(self.script_url(name)).multipart(form))
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = error_body(response.text().await.unwrap_or_default());
        if status.is_server_error() {
            tracing::error!("Registry upload of {name} failed with {}: {body}", status.as_u16());
            return Err(Error::DependencyUnavailable(format!(
                "registry upload returned {}",
                status.as_u16()
            )));
        }
        Err(Error::UpstreamValidation {
            status: status.as_u16(),
            body,
        })
    }

    async fn put_tags(&self, name: &str, tags: &OwnershipTagSet) -> Result<()> {
        let url = format!("{}/tags", self.script_url(name));
        let response = self
            .send(self.client.put(&url).json(&tags.to_vec()))
            .await?;
        self.check(response, "put tags").await?;
        Ok(())
    }

    async fn delete_script(&self, name: &str) -> Result<()> {
        let url = format!("{}?force=true", self.script_url(name));
        let response = self.send(self.client.delete(&url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        self.check(response, "delete script").await?;
        Ok(())
    }
}
