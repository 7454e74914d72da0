//! # Asset Publisher Module
//!
//! Re-encodes gallery photos and commits them to a remote GitHub repository
//! via the contents API. Publishing is a must-succeed operation: encode and
//! remote-write errors propagate to the caller.

use anyhow::Result;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use serde::Deserialize;
use serde_json::json;
use std::io::Cursor;
use tracing::{debug, info};

/// Published assets are capped at this width; narrower images keep their size.
pub const MAX_IMAGE_WIDTH: u32 = 1920;
/// JPEG quality for re-encoded assets.
pub const JPEG_QUALITY: u8 = 80;
/// Repository directory assets are committed under.
pub const GALLERY_PATH: &str = "public/gallery";

const GITHUB_API_BASE: &str = "https://api.github.com";

/// Errors from the publish pipeline
#[derive(Debug)]
pub enum PublishError {
    /// Image decode or re-encode failures
    Encode(String),
    /// Remote-write failures against the contents API
    Api(String),
}

impl std::fmt::Display for PublishError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublishError::Encode(msg) => write!(f, "Encode error: {msg}"),
            PublishError::Api(msg) => write!(f, "API error: {msg}"),
        }
    }
}

impl std::error::Error for PublishError {}

/// Descriptor of a committed asset
#[derive(Debug, Clone)]
pub struct PublishedAsset {
    pub path: String,
    pub commit_sha: Option<String>,
}

/// Publishing seam, mocked in tests.
#[async_trait]
pub trait AssetPublisher: Send + Sync {
    async fn publish(
        &self,
        image: &[u8],
        filename: &str,
        title: &str,
        description: &str,
    ) -> Result<PublishedAsset, PublishError>;
}

/// Re-encode an inbound photo for the gallery: width capped at
/// [`MAX_IMAGE_WIDTH`] preserving aspect ratio, never upscaled, JPEG at
/// [`JPEG_QUALITY`].
pub fn encode_gallery_image(input: &[u8]) -> Result<Vec<u8>, PublishError> {
    let img = image::load_from_memory(input)
        .map_err(|e| PublishError::Encode(format!("failed to decode image: {e}")))?;

    let img = if img.width() > MAX_IMAGE_WIDTH {
        // Height is unconstrained; resize preserves the aspect ratio.
        img.resize(MAX_IMAGE_WIDTH, u32::MAX, image::imageops::FilterType::Lanczos3)
    } else {
        img
    };

    let mut output = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(Cursor::new(&mut output), JPEG_QUALITY);
    // JPEG has no alpha channel; flatten to RGB before encoding.
    encoder
        .encode_image(&img.to_rgb8())
        .map_err(|e| PublishError::Encode(format!("failed to encode JPEG: {e}")))?;

    debug!(
        input_bytes = input.len(),
        output_bytes = output.len(),
        width = img.width(),
        "re-encoded gallery image"
    );
    Ok(output)
}

/// GitHub-backed publisher committing assets to a fixed repo and branch
pub struct GitHubPublisher {
    client: reqwest::Client,
    token: String,
    owner: String,
    repo: String,
    branch: String,
}

#[derive(Deserialize)]
struct ContentsResponse {
    commit: CommitInfo,
}

#[derive(Deserialize)]
struct CommitInfo {
    sha: Option<String>,
}

impl GitHubPublisher {
    pub fn new(token: String, owner: String, repo: String, branch: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            owner,
            repo,
            branch,
        }
    }
}

#[async_trait]
impl AssetPublisher for GitHubPublisher {
    async fn publish(
        &self,
        image: &[u8],
        filename: &str,
        title: &str,
        description: &str,
    ) -> Result<PublishedAsset, PublishError> {
        let encoded = encode_gallery_image(image)?;
        let path = format!("{GALLERY_PATH}/{filename}.jpg");
        let url = format!(
            "{GITHUB_API_BASE}/repos/{}/{}/contents/{}",
            self.owner, self.repo, path
        );

        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "gallery-bot")
            .json(&json!({
                "message": format!("Add: {title} - {description}"),
                "content": BASE64.encode(&encoded),
                "branch": self.branch,
            }))
            .send()
            .await
            .map_err(|e| PublishError::Api(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(PublishError::Api(format!(
                "contents API returned {status}: {detail}"
            )));
        }

        let body: ContentsResponse = response
            .json()
            .await
            .map_err(|e| PublishError::Api(format!("invalid contents API response: {e}")))?;

        info!(path = %path, "published gallery asset");
        Ok(PublishedAsset {
            path,
            commit_sha: body.commit.sha,
        })
    }
}
