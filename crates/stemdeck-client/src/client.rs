//! Analysis service client
//!
//! Thin async wrapper over the service's `/api` routes. Cloning is cheap
//! (the underlying connection pool is shared), which lets the client be
//! moved into spawned render and fetch tasks.

use std::path::Path;

use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::{Response, Url};

use stemdeck_core::engine::{EffectRequest, EffectSource, RenderedAudio};

use crate::config::ServiceConfig;
use crate::error::{ClientError, ClientResult};
use crate::poll::poll_until_done;
use crate::types::{
    dedupe_stems, AnalysisRecord, ChordsResponse, DeleteResponse, ErrorBody, HealthStatus, HistoryItem,
    HistoryResponse, ProgressData, QualityMode, SeparateResponse, StemInfo, StemsMode,
};

#[derive(Clone)]
pub struct AnalysisClient {
    http: reqwest::Client,
    config: ServiceConfig,
}

impl AnalysisClient {
    pub fn new(config: ServiceConfig) -> ClientResult<Self> {
        let http = reqwest::Client::builder().timeout(config.request_timeout()).build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Absolute URL for a service path such as `/api/history`
    pub fn endpoint(&self, path: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        }
    }

    /// Make a stem URL absolute; URLs that already carry a scheme pass through
    pub fn resolve_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            self.endpoint(url)
        }
    }

    fn analysis_url(&self, filename: &str) -> ClientResult<Url> {
        let mut url = Url::parse(&self.endpoint("/api/analysis")).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.config.base_url.clone()))?
            .push(filename);
        Ok(url)
    }

    // ─────────────────────────────────────────────────────────────
    // Jobs
    // ─────────────────────────────────────────────────────────────

    pub async fn health(&self) -> ClientResult<HealthStatus> {
        let resp = self.http.get(self.endpoint("/api/health")).send().await?;
        Ok(check(resp).await?.json().await?)
    }

    /// Upload `audio` for stem separation; returns the job's task id
    pub async fn separate(&self, audio: &Path, stems: StemsMode, quality: QualityMode) -> ClientResult<SeparateResponse> {
        let form = Form::new()
            .part("audio", file_part(audio).await?)
            .text("stems_mode", stems.as_str())
            .text("quality_mode", quality.as_str());

        log::info!("[CLIENT] Separating {:?} ({} stems, {})", audio, stems, quality);
        let resp = self.http.post(self.endpoint("/api/separate")).multipart(form).send().await?;
        Ok(check(resp).await?.json().await?)
    }

    pub async fn progress(&self, task_id: &str) -> ClientResult<ProgressData> {
        let resp = self
            .http
            .get(self.endpoint(&format!("/api/progress/{}", task_id)))
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    /// Poll a job until it completes or fails
    pub async fn wait_for_task<U>(&self, task_id: &str, on_update: U) -> ClientResult<ProgressData>
    where
        U: FnMut(&ProgressData),
    {
        poll_until_done(self.config.poll_policy(), || self.progress(task_id), on_update).await
    }

    /// Separate and wait; returns the de-duplicated stems
    pub async fn separate_and_wait<U>(
        &self,
        audio: &Path,
        stems: StemsMode,
        quality: QualityMode,
        on_update: U,
    ) -> ClientResult<Vec<StemInfo>>
    where
        U: FnMut(&ProgressData),
    {
        let job = self.separate(audio, stems, quality).await?;
        let done = self.wait_for_task(&job.task_id, on_update).await?;
        let stems = dedupe_stems(done.stems.unwrap_or_default());
        log::info!("[CLIENT] Separation {} finished with {} stems", job.task_id, stems.len());
        Ok(stems)
    }

    /// Chord detection runs synchronously on the service
    pub async fn detect_chords(&self, audio: &Path) -> ClientResult<ChordsResponse> {
        let form = Form::new().part("audio", file_part(audio).await?);
        let resp = self.http.post(self.endpoint("/api/chords")).multipart(form).send().await?;
        Ok(check(resp).await?.json().await?)
    }

    // ─────────────────────────────────────────────────────────────
    // History
    // ─────────────────────────────────────────────────────────────

    pub async fn history(&self) -> ClientResult<Vec<HistoryItem>> {
        let resp = self.http.get(self.endpoint("/api/history")).send().await?;
        let body: HistoryResponse = check(resp).await?.json().await?;
        Ok(body.history)
    }

    pub async fn analysis(&self, filename: &str) -> ClientResult<AnalysisRecord> {
        let resp = self.http.get(self.analysis_url(filename)?).send().await?;
        let mut record: AnalysisRecord = check(resp).await?.json().await?;
        record.stems = dedupe_stems(record.stems);
        Ok(record)
    }

    pub async fn delete_analysis(&self, filename: &str) -> ClientResult<DeleteResponse> {
        let resp = self.http.delete(self.analysis_url(filename)?).send().await?;
        Ok(check(resp).await?.json().await?)
    }

    // ─────────────────────────────────────────────────────────────
    // Audio
    // ─────────────────────────────────────────────────────────────

    /// Render pitch/tempo remotely; returns the processed audio bytes
    pub async fn process_audio(&self, request: &EffectRequest) -> ClientResult<RenderedAudio> {
        let part = match &request.source {
            EffectSource::Upload(path) => file_part(path).await?,
            EffectSource::Remote { url, filename } => {
                let bytes = self.fetch(url).await?;
                Part::bytes(bytes).file_name(filename.clone())
            }
        };
        let form = Form::new()
            .part("audio", part)
            .text("pitch_shift", request.pitch_shift.to_string())
            .text("time_stretch", request.time_stretch.to_string());

        let resp = self.http.post(self.endpoint("/api/process-audio")).multipart(form).send().await?;
        let resp = check(resp).await?;
        let extension = extension_for(resp.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()));
        let bytes = resp.bytes().await?.to_vec();
        log::debug!("[CLIENT] Rendered {} bytes ({:?})", bytes.len(), extension);
        Ok(RenderedAudio { bytes, extension })
    }

    /// Download a (possibly relative) resource
    pub async fn fetch(&self, url: &str) -> ClientResult<Vec<u8>> {
        let resp = self.http.get(self.resolve_url(url)).send().await?;
        Ok(check(resp).await?.bytes().await?.to_vec())
    }
}

async fn file_part(path: &Path) -> ClientResult<Part> {
    let bytes = tokio::fs::read(path).await.map_err(|source| ClientError::ReadAudio {
        path: path.to_path_buf(),
        source,
    })?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio".to_string());
    Ok(Part::bytes(bytes).file_name(name))
}

/// Turn a non-success response into [`ClientError::Status`]
async fn check(resp: Response) -> ClientResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ClientError::Status {
        status: status.as_u16(),
        message: error_message(&body, status.canonical_reason().unwrap_or("error")),
    })
}

/// The service reports errors as `{"error": "..."}`
fn error_message(body: &str, fallback: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(err) => err.error,
        Err(_) if !body.trim().is_empty() => body.trim().chars().take(200).collect(),
        Err(_) => fallback.to_string(),
    }
}

/// Container extension for an audio content type
fn extension_for(content_type: Option<&str>) -> Option<String> {
    let mime = content_type?.split(';').next()?.trim().to_ascii_lowercase();
    let ext = match mime.as_str() {
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/flac" | "audio/x-flac" => "flac",
        "audio/ogg" => "ogg",
        "audio/mp4" | "audio/aac" => "m4a",
        _ => return None,
    };
    Some(ext.to_string())
}
