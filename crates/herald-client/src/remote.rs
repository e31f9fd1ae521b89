use std::time::Duration;

use herald_core::error::AppError;
use herald_core::server::RemoteServer;
use herald_core::traits::RemoteApi;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode};

const USER_AGENT: &str = concat!("Herald/", env!("CARGO_PKG_VERSION"));

/// Remote build server client using reqwest.
///
/// Holds two connection pools: one verifying TLS normally, and one used only
/// for servers configured with `trust_all_certificates`.
#[derive(Clone)]
pub struct ReqwestRemoteApi {
    client: Client,
    insecure: Client,
    timeout_secs: u64,
}

impl ReqwestRemoteApi {
    pub fn new() -> Result<Self, AppError> {
        Self::with_timeout(Duration::from_secs(
            herald_core::config::DEFAULT_TIMEOUT_SECS,
        ))
    }

    /// `timeout` bounds the connect phase, each read, and the whole request.
    pub fn with_timeout(timeout: Duration) -> Result<Self, AppError> {
        let client = builder(timeout)
            .build()
            .map_err(|e| AppError::ConfigError(format!("Cannot build HTTP client: {e}")))?;
        let insecure = builder(timeout)
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .build()
            .map_err(|e| AppError::ConfigError(format!("Cannot build HTTP client: {e}")))?;

        Ok(Self {
            client,
            insecure,
            timeout_secs: timeout.as_secs(),
        })
    }

    fn client_for(&self, server: &RemoteServer) -> &Client {
        if server.trust_all_certificates {
            &self.insecure
        } else {
            &self.client
        }
    }

    /// GET `path` and return the non-empty body of a 2xx response.
    async fn fetch(
        &self,
        server: &RemoteServer,
        path: &str,
        accept: &str,
    ) -> Result<(String, String), AppError> {
        let url = server.url_for(path);

        let mut request = self.client_for(server).get(&url).header(ACCEPT, accept);
        if let Some(value) = server.auth.resolve_header()?.filter(|v| !v.is_empty()) {
            request = request.header(AUTHORIZATION, value);
        }

        tracing::debug!(server = %server.id, %url, "GET");
        let response = request
            .send()
            .await
            .map_err(|e| self.transport_error(&url, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound { url });
        }
        if !status.is_success() {
            return Err(AppError::HttpStatus {
                status: status.as_u16(),
                url,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(&url, e))?;
        if body.trim().is_empty() {
            return Err(AppError::NotFound { url });
        }
        Ok((url, body))
    }

    fn transport_error(&self, url: &str, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::Timeout {
                url: url.to_string(),
                secs: self.timeout_secs,
            }
        } else if e.is_connect() {
            AppError::Transport {
                url: url.to_string(),
                message: format!("Connection failed: {e}"),
            }
        } else {
            AppError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            }
        }
    }
}

fn builder(timeout: Duration) -> reqwest::ClientBuilder {
    Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(timeout)
        .read_timeout(timeout)
        .timeout(timeout)
}

impl RemoteApi for ReqwestRemoteApi {
    async fn get_json(
        &self,
        server: &RemoteServer,
        path: &str,
    ) -> Result<serde_json::Value, AppError> {
        let (url, body) = self.fetch(server, path, "application/json").await?;
        // A 2xx page that is not JSON is usually a proxy or login page.
        serde_json::from_str(&body).map_err(|e| AppError::Transport {
            url,
            message: format!("Unexpected non-JSON body: {e}"),
        })
    }

    async fn get_text(&self, server: &RemoteServer, path: &str) -> Result<String, AppError> {
        let (_, body) = self.fetch(server, path, "text/plain").await?;
        Ok(body.trim().to_string())
    }
}
