//! SDK for the Templar template object service.
//!
//! Pushes stream the artifact through a BLAKE3 tee so the client knows the
//! content hash it sent without a second pass. Pulls verify end to end: the
//! expected hash comes from the version endpoint, the download is hashed
//! while it streams to the caller's writer, and a digest mismatch is an
//! error. The server does not re-verify on read; integrity checking is the
//! client's side of the contract.

pub mod error;

pub use error::{ClientError, ClientResult};

use futures::StreamExt;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use templar_core::ContentHash;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::io::ReaderStream;
use uuid::Uuid;

/// Response envelope used by every endpoint.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: String,
    message: String,
}

/// Push acknowledgement plus the locally computed content hash.
#[derive(Debug)]
pub struct PushOutcome {
    pub message: String,
    /// BLAKE3 of the bytes that were streamed to the server.
    pub hash: ContentHash,
}

/// Result of a verified pull.
#[derive(Debug)]
pub struct PullOutcome {
    pub bytes_written: u64,
    pub hash: ContentHash,
}

#[derive(Debug, Deserialize)]
struct PushMessage {
    message: String,
}

/// Template metadata returned by listing endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateInfo {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

/// Version metadata including size and hash.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionInfo {
    pub id: Uuid,
    pub template_id: Uuid,
    pub version_number: i64,
    pub object_key: String,
    pub file_size: Option<i64>,
    pub file_hash: Option<String>,
}

/// Background job record.
#[derive(Debug, Clone, Deserialize)]
pub struct JobInfo {
    pub id: i64,
    pub job_type: String,
    pub template_id: Uuid,
    pub version_number: Option<i64>,
    pub status: String,
    pub progress: i64,
    pub error_message: Option<String>,
}

/// Templar SDK client.
#[derive(Clone)]
pub struct Client {
    base_url: String,
    http: reqwest::Client,
}

impl Client {
    /// Create a client for the given API base URL, e.g.
    /// `http://localhost:8080/api/v1`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_http_client(base_url, reqwest::Client::new())
    }

    /// Create a client with a custom HTTP client.
    pub fn with_http_client(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url, http }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Upload an artifact, hashing it while it streams.
    ///
    /// The server acknowledges acceptance immediately; the upload itself is
    /// processed asynchronously. Poll [`Client::get_version`] or
    /// [`Client::list_jobs`] to observe completion.
    pub async fn push(
        &self,
        template_id: Uuid,
        version: i64,
        file: impl AsyncRead + Send + Sync + Unpin + 'static,
        file_name: Option<String>,
    ) -> ClientResult<PushOutcome> {
        let hasher = Arc::new(Mutex::new(blake3::Hasher::new()));
        let tee = hasher.clone();
        let stream = ReaderStream::new(file).map(move |chunk| {
            if let Ok(bytes) = &chunk {
                tee.lock().unwrap_or_else(|e| e.into_inner()).update(bytes);
            }
            chunk
        });

        let file_name =
            file_name.unwrap_or_else(|| format!("template_{template_id}_{version}"));
        let form = reqwest::multipart::Form::new()
            .text("template_id", template_id.to_string())
            .text("version", version.to_string())
            .part(
                "file",
                reqwest::multipart::Part::stream(reqwest::Body::wrap_stream(stream))
                    .file_name(file_name),
            );

        let response = self
            .http
            .post(self.url("/push"))
            .multipart(form)
            .send()
            .await?;
        let body: Envelope<PushMessage> = decode(response).await?;
        let message = body
            .data
            .ok_or_else(|| ClientError::InvalidResponse("push response missing data".into()))?
            .message;

        let hash = {
            let hasher = hasher.lock().unwrap_or_else(|e| e.into_inner());
            ContentHash::from_bytes(*hasher.finalize().as_bytes())
        };
        Ok(PushOutcome { message, hash })
    }

    /// Download an artifact into `dst`, verifying its BLAKE3 hash against
    /// the hash recorded for the version.
    pub async fn pull(
        &self,
        template_id: Uuid,
        version: i64,
        dst: &mut (impl AsyncWrite + Unpin),
    ) -> ClientResult<PullOutcome> {
        let expected = self
            .get_version(template_id, version)
            .await?
            .file_hash
            .ok_or_else(|| {
                ClientError::InvalidResponse("version has no recorded hash".into())
            })?;

        let response = self
            .http
            .post(self.url("/pull"))
            .json(&serde_json::json!({
                "template_id": template_id.to_string(),
                "version": version,
            }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(decode_error(response).await);
        }

        let mut hasher = blake3::Hasher::new();
        let mut bytes_written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            hasher.update(&chunk);
            bytes_written += chunk.len() as u64;
            dst.write_all(&chunk).await?;
        }
        dst.flush().await?;

        let hash = ContentHash::from_bytes(*hasher.finalize().as_bytes());
        if hash.to_hex() != expected {
            return Err(ClientError::HashMismatch {
                expected,
                actual: hash.to_hex(),
            });
        }

        Ok(PullOutcome {
            bytes_written,
            hash,
        })
    }

    /// Fetch version metadata (size, hash, object key).
    pub async fn get_version(
        &self,
        template_id: Uuid,
        version: i64,
    ) -> ClientResult<VersionInfo> {
        let response = self
            .http
            .get(self.url(&format!("/versions/{template_id}/{version}")))
            .send()
            .await?;
        let body: Envelope<VersionInfo> = decode(response).await?;
        body.data
            .ok_or_else(|| ClientError::InvalidResponse("version response missing data".into()))
    }

    /// List templates, optionally filtered by a name substring.
    pub async fn list_templates(&self, search: Option<&str>) -> ClientResult<Vec<TemplateInfo>> {
        let mut request = self.http.get(self.url("/templates"));
        if let Some(search) = search {
            request = request.query(&[("search", search)]);
        }
        let body: Envelope<Vec<TemplateInfo>> = decode(request.send().await?).await?;
        Ok(body.data.unwrap_or_default())
    }

    /// List all versions of a template.
    pub async fn list_versions(&self, template_id: Uuid) -> ClientResult<Vec<VersionInfo>> {
        let request = self
            .http
            .get(self.url("/versions"))
            .query(&[("template_id", template_id.to_string())]);
        let body: Envelope<Vec<VersionInfo>> = decode(request.send().await?).await?;
        Ok(body.data.unwrap_or_default())
    }

    /// List jobs, newest first.
    pub async fn list_jobs(&self, page: Option<i64>, limit: Option<i64>) -> ClientResult<Vec<JobInfo>> {
        let mut request = self.http.get(self.url("/jobs"));
        if let Some(page) = page {
            request = request.query(&[("page", page)]);
        }
        if let Some(limit) = limit {
            request = request.query(&[("limit", limit)]);
        }
        let body: Envelope<Vec<JobInfo>> = decode(request.send().await?).await?;
        Ok(body.data.unwrap_or_default())
    }
}

/// Decode an envelope response, surfacing API errors with their code.
async fn decode<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> ClientResult<Envelope<T>> {
    let status = response.status();
    let body: Envelope<T> = response
        .json()
        .await
        .map_err(|e| ClientError::InvalidResponse(format!("decode response: {e}")))?;
    if let Some(error) = body.error {
        return Err(ClientError::Api {
            code: error.code,
            message: error.message,
        });
    }
    if !status.is_success() {
        return Err(ClientError::InvalidResponse(format!(
            "request failed with status {status}"
        )));
    }
    Ok(body)
}

/// Decode the error envelope of a non-success streaming response.
async fn decode_error(response: reqwest::Response) -> ClientError {
    let status = response.status();
    match response.json::<Envelope<serde_json::Value>>().await {
        Ok(Envelope {
            error: Some(error), ..
        }) => ClientError::Api {
            code: error.code,
            message: error.message,
        },
        _ => ClientError::InvalidResponse(format!("request failed with status {status}")),
    }
}
