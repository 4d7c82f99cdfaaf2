//! Engine seams backed by the analysis service

use futures_util::future::{BoxFuture, FutureExt};

use stemdeck_core::engine::{EffectRenderer, EffectRequest, RenderError, RenderedAudio};
use stemdeck_core::media::{MediaError, MediaResult, SourceFetcher};

use crate::client::AnalysisClient;
use crate::error::ClientError;

impl From<ClientError> for RenderError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Status { status, message } => RenderError::Rejected(format!("{}: {}", status, message)),
            other => RenderError::Request(other.to_string()),
        }
    }
}

impl EffectRenderer for AnalysisClient {
    fn render(&self, request: EffectRequest) -> BoxFuture<'static, Result<RenderedAudio, RenderError>> {
        let client = self.clone();
        async move { client.process_audio(&request).await.map_err(RenderError::from) }.boxed()
    }
}

impl SourceFetcher for AnalysisClient {
    fn fetch(&self, url: &str) -> BoxFuture<'static, MediaResult<Vec<u8>>> {
        let client = self.clone();
        let url = url.to_string();
        async move {
            AnalysisClient::fetch(&client, &url).await.map_err(|e| MediaError::Fetch {
                url: url.clone(),
                reason: e.to_string(),
            })
        }
        .boxed()
    }
}
