use std::time::Duration;

use serde::Deserialize;

use crate::codec::Envelope;
use crate::error::Result;
use crate::payload::BackupType;
use crate::storage::{provider_error, StorageBackend, UploadReceipt, BACKEND_TIMEOUT_SECS};

/// Generic HTTP object-store backend. The wire shape is a plain
/// PUT/GET of the JSON envelope under `/backups/<name>`; anything
/// vendor-specific lives behind whatever service answers these routes.
pub struct RestBackend {
    backend_id: String,
    base_url: String,
    agent: ureq::Agent,
    token: Option<String>,
}

/// Optional body a store may return on upload; absent fields fall back to
/// the client-chosen name.
#[derive(Debug, Default, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

impl RestBackend {
    pub fn new(backend_id: &str, base_url: &str, token: Option<&str>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(BACKEND_TIMEOUT_SECS))
            .timeout_read(Duration::from_secs(BACKEND_TIMEOUT_SECS))
            .timeout_write(Duration::from_secs(BACKEND_TIMEOUT_SECS))
            .build();

        Self {
            backend_id: backend_id.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            agent,
            token: token.map(|t| t.to_string()),
        }
    }

    fn url(&self, name: &str) -> String {
        format!("{}/backups/{}", self.base_url, name.trim_start_matches('/'))
    }

    fn apply_auth(&self, req: ureq::Request) -> ureq::Request {
        if let Some(ref token) = self.token {
            req.set("Authorization", &format!("Bearer {token}"))
        } else {
            req
        }
    }
}

impl StorageBackend for RestBackend {
    fn id(&self) -> &str {
        &self.backend_id
    }

    fn kind(&self) -> BackupType {
        BackupType::Cloud
    }

    fn upload(&self, envelope: &Envelope, name: &str) -> Result<UploadReceipt> {
        let req = self.apply_auth(self.agent.put(&self.url(name)));
        let resp = req
            .send_json(envelope)
            .map_err(|e| provider_error(&self.backend_id, e))?;
        if resp.status() >= 300 {
            return Err(provider_error(
                &self.backend_id,
                format!("upload rejected: HTTP {}", resp.status()),
            ));
        }

        // Upload is confirmed at this point; the response body only refines
        // the receipt.
        let body: UploadResponse = resp.into_json().unwrap_or_default();
        Ok(UploadReceipt {
            id: body.id.unwrap_or_else(|| name.to_string()),
            locator: body.url,
        })
    }

    fn download(&self, id: &str) -> Result<Envelope> {
        let req = self.apply_auth(self.agent.get(&self.url(id)));
        let resp = req.call().map_err(|e| provider_error(&self.backend_id, e))?;
        resp.into_json::<Envelope>()
            .map_err(|e| provider_error(&self.backend_id, e))
    }
}
