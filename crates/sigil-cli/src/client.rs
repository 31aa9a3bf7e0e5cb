//! Thin HTTP client over the node's JSON envelope.

use anyhow::{anyhow, bail, Context};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

pub struct NodeClient {
    endpoint: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl NodeClient {
    pub fn new(endpoint: &str, token: Option<String>) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token,
            http: reqwest::Client::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Fails early for commands that act on behalf of a user.
    pub fn require_token(&self) -> anyhow::Result<()> {
        if self.token.is_none() {
            bail!("this command needs a session token (--token or SIGIL_TOKEN)");
        }
        Ok(())
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
        let req = self.authorized(self.http.get(self.url(path)));
        self.send(req).await
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> anyhow::Result<T> {
        let req = self.authorized(self.http.post(self.url(path)).json(body));
        self.send(req).await
    }

    /// GET a route that answers without the `{ success, data }` envelope.
    pub async fn get_raw<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
        tracing::debug!(path, "GET");
        let resp = self
            .http
            .get(self.url(path))
            .send()
            .await
            .with_context(|| format!("could not reach node at {}", self.endpoint))?;
        if !resp.status().is_success() {
            bail!("node returned HTTP {}", resp.status());
        }
        Ok(resp.json().await?)
    }

    async fn send<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> anyhow::Result<T> {
        let resp = req
            .send()
            .await
            .with_context(|| format!("could not reach node at {}", self.endpoint))?;
        let status = resp.status();
        tracing::debug!(url = %resp.url(), %status, "node replied");
        if status.is_success() {
            let envelope: Envelope<T> = resp.json().await?;
            return Ok(envelope.data);
        }
        match resp.json::<ErrorResponse>().await {
            Ok(err) => Err(anyhow!("request failed (HTTP {}): {}", status, err.error)),
            Err(e) => {
                tracing::debug!(error = %e, "error reply without a JSON body");
                Err(anyhow!("request failed (HTTP {})", status))
            }
        }
    }
}
