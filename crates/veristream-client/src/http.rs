//! HTTP client for the verification service's endpoints.

use std::path::Path;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;
use veristream_core::{AuditLogPayload, Claim, ClaimId, ReportPayload};

use crate::transport::{ChunkStream, VerifyTransport};
use crate::{ClientConfig, ClientError};

/// What to ingest: a URL for the service to fetch, or text pasted directly.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestSource {
    Url(String),
    Text(String),
}

/// Text extracted from an ingested source.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestedDocument {
    pub text: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub source_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ExtractedClaim {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    original: Option<String>,
    #[serde(default)]
    original_text: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    normalized: Option<String>,
    #[serde(default)]
    normalized_text: Option<String>,
    #[serde(rename = "type", default)]
    claim_type: String,
}

#[derive(Deserialize)]
struct ExtractResponse {
    claims: Vec<ExtractedClaim>,
}

#[derive(Deserialize)]
struct SaveReportResponse {
    id: String,
}

#[derive(Serialize)]
struct TextRequest<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
    claim: &'a str,
}

/// Client for the verification service.
pub struct VeristreamClient {
    client: reqwest::Client,
    config: ClientConfig,
}

impl VeristreamClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.request_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fetch a URL or accept pasted text; returns the extracted text.
    pub async fn ingest(&self, source: &IngestSource) -> Result<IngestedDocument, ClientError> {
        info!(kind = source_kind(source), "ingesting source");
        self.post_json("/api/ingest", source).await
    }

    /// Upload a document (PDF and similar) for text extraction.
    pub async fn ingest_file(&self, path: &Path) -> Result<IngestedDocument, ClientError> {
        self.upload("/api/ingest-file", path).await
    }

    /// Upload an audio recording for transcription.
    pub async fn ingest_audio(&self, path: &Path) -> Result<IngestedDocument, ClientError> {
        self.upload("/api/ingest-audio", path).await
    }

    /// Extract verifiable claims from text. Every claim starts `pending`.
    pub async fn extract_claims(&self, text: &str) -> Result<Vec<Claim>, ClientError> {
        let resp: ExtractResponse = self
            .post_json("/api/extract-claims", &TextRequest { text })
            .await?;
        let claims = into_claims(resp.claims);
        info!(count = claims.len(), "extracted claims");
        Ok(claims)
    }

    /// Persist a finished report; returns its id.
    pub async fn save_report(&self, payload: &ReportPayload) -> Result<String, ClientError> {
        let resp: SaveReportResponse = self.post_json("/api/reports", payload).await?;
        info!(report_id = %resp.id, "report saved");
        Ok(resp.id)
    }

    /// Export the audit log; returns the downloadable JSON document.
    pub async fn export_audit_log(
        &self,
        payload: &AuditLogPayload,
    ) -> Result<serde_json::Value, ClientError> {
        self.post_json("/api/export-audit-log", payload).await
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, ClientError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.config.endpoint(path);
        let resp = self
            .client
            .post(&url)
            .timeout(self.config.request_timeout)
            .json(body)
            .send()
            .await?;
        let resp = ensure_success(resp).await?;
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn upload(&self, path: &str, file: &Path) -> Result<IngestedDocument, ClientError> {
        let bytes = tokio::fs::read(file).await?;
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        info!(file = %file.display(), size = bytes.len(), "uploading for ingestion");

        let form = Form::new().part("file", Part::bytes(bytes).file_name(name));
        let resp = self
            .client
            .post(self.config.endpoint(path))
            .timeout(self.config.request_timeout)
            .multipart(form)
            .send()
            .await?;
        let resp = ensure_success(resp).await?;
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl VerifyTransport for VeristreamClient {
    async fn open_stream(&self, claim: &Claim) -> Result<ChunkStream, ClientError> {
        let url = self.config.endpoint("/api/verify");
        info!(claim_id = %claim.id, url = %url, "opening verification stream");

        // No overall timeout: the body is long-lived. Waiting for headers is
        // bounded here, waiting for chunks by the scheduler.
        let send = self
            .client
            .post(&url)
            .json(&VerifyRequest {
                claim: claim.verification_text(),
            })
            .send();
        let resp = tokio::time::timeout(self.config.request_timeout, send)
            .await
            .map_err(|_| ClientError::Timeout {
                what: "verification response",
            })??;
        let resp = ensure_success(resp).await?;

        Ok(resp
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()).map_err(ClientError::from))
            .boxed())
    }
}

async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::Server {
            status: status.as_u16(),
            body,
        });
    }
    Ok(resp)
}

fn source_kind(source: &IngestSource) -> &'static str {
    match source {
        IngestSource::Url(_) => "url",
        IngestSource::Text(_) => "text",
    }
}

fn into_claims(extracted: Vec<ExtractedClaim>) -> Vec<Claim> {
    extracted
        .into_iter()
        .enumerate()
        .map(|(i, c)| {
            let id = c
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| format!("claim-{}", i + 1));
            let original = [c.original, c.original_text, c.text]
                .into_iter()
                .flatten()
                .find(|t| !t.is_empty())
                .unwrap_or_default();
            let mut claim = Claim::new(ClaimId::from(id), original);
            if let Some(normalized) = c.normalized.or(c.normalized_text) {
                claim.normalized_text = normalized;
            }
            claim.claim_type = c.claim_type;
            claim
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use veristream_core::ClaimStatus;

    #[test]
    fn extract_response_becomes_pending_claims() {
        let json = r#"{"claims": [
            {"id": "k1", "original": "Revenue rose 40%", "normalized": "ACME revenue rose 40% in FY2023", "type": "financial"},
            {"original_text": "We have 10,000 customers", "type": "operational"}
        ]}"#;
        let resp: ExtractResponse = serde_json::from_str(json).unwrap();
        let claims = into_claims(resp.claims);
        assert_eq!(claims.len(), 2);
        assert_eq!(claims[0].id.as_str(), "k1");
        assert_eq!(claims[0].normalized_text, "ACME revenue rose 40% in FY2023");
        assert_eq!(claims[0].claim_type, "financial");
        assert_eq!(claims[1].id.as_str(), "claim-2");
        assert_eq!(claims[1].normalized_text, "We have 10,000 customers");
        assert!(claims.iter().all(|c| c.status == ClaimStatus::Pending));
    }

    #[test]
    fn extracted_claim_with_every_text_key_still_parses() {
        let json = r#"{"claims": [
            {"original": "Margin was 31%", "original_text": "margin 31%", "text": "31%",
             "normalized": "ACME gross margin was 31%", "normalized_text": "other"},
            {"original": "", "text": "Churn fell to 2%"}
        ]}"#;
        let resp: ExtractResponse = serde_json::from_str(json).unwrap();
        let claims = into_claims(resp.claims);
        assert_eq!(claims[0].original_text, "Margin was 31%");
        assert_eq!(claims[0].normalized_text, "ACME gross margin was 31%");
        assert_eq!(claims[1].original_text, "Churn fell to 2%");
    }

    #[test]
    fn ingest_source_request_shape() {
        let body = serde_json::to_value(IngestSource::Url("https://example.com/pr".into())).unwrap();
        assert_eq!(body, serde_json::json!({"url": "https://example.com/pr"}));
        let body = serde_json::to_value(IngestSource::Text("hello".into())).unwrap();
        assert_eq!(body, serde_json::json!({"text": "hello"}));
    }

    #[test]
    fn ingested_document_optional_fields() {
        let doc: IngestedDocument = serde_json::from_str(r#"{"text": "body"}"#).unwrap();
        assert_eq!(doc.text, "body");
        assert!(doc.title.is_none());
        assert!(doc.source_type.is_none());
    }

    #[test]
    fn client_uses_normalized_base_url() {
        let client = VeristreamClient::new(ClientConfig::new("http://localhost:4000/")).unwrap();
        assert_eq!(client.config().base_url, "http://localhost:4000");
    }
}
