use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Certificate, Client};
use tracing::warn;

use super::{HttpMethod, HttpReply, HttpRequest, Transport};
use crate::config::TlsConfig;
use crate::error::ConfigError;

/// [`Transport`] over a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(tls: &TlsConfig, timeout: Duration) -> Result<Self, ConfigError> {
        let mut builder = Client::builder().timeout(timeout);

        if let Some(path) = &tls.ca_cert {
            let pem = std::fs::read(path).map_err(|e| ConfigError::Io {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            let cert = Certificate::from_pem(&pem).map_err(|e| ConfigError::InvalidVar {
                name: "K8S_CA_CERT",
                reason: e.to_string(),
            })?;
            builder = builder.add_root_certificate(cert);
        }

        if tls.insecure {
            warn!("TLS certificate verification is DISABLED for cluster API requests");
            builder = builder.danger_accept_invalid_certs(true);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpReply, String> {
        let mut req = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };
        for (name, value) in &request.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            req = req.json(body);
        }

        let response = req.send().await.map_err(describe)?;
        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.text().await.map_err(describe)?;

        Ok(HttpReply {
            status,
            headers,
            body,
        })
    }
}

fn describe(e: reqwest::Error) -> String {
    if e.is_timeout() {
        format!("timed out: {e}")
    } else if e.is_connect() {
        format!("connection failed: {e}")
    } else {
        e.to_string()
    }
}
