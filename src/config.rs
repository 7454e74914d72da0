//! # Configuration Module
//!
//! Environment-driven configuration for the gallery bot, loaded once at
//! startup. Missing required variables abort the process early instead of
//! failing on the first webhook delivery.

use anyhow::{Context, Result};
use std::env;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_GITHUB_BRANCH: &str = "main";
/// Conversations idle for longer than this are evicted by the sweep task.
pub const DEFAULT_CONVERSATION_TTL_SECS: u64 = 24 * 60 * 60;
/// How often the eviction sweep runs.
pub const SWEEP_INTERVAL_SECS: u64 = 10 * 60;

/// Runtime configuration for the gallery bot
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Bearer token for the WhatsApp Cloud API
    pub whatsapp_token: String,
    /// Phone number id the bot sends messages from
    pub phone_number_id: String,
    /// Token for the GitHub contents API
    pub github_token: String,
    /// Owner of the gallery repository
    pub github_owner: String,
    /// Gallery repository name
    pub github_repo: String,
    /// Branch assets are committed to
    pub github_branch: String,
    /// Secret expected in the webhook verification handshake
    pub verify_token: String,
    /// HTTP listen port
    pub port: u16,
    /// Idle TTL for conversation records
    pub conversation_ttl_secs: u64,
}

impl AppConfig {
    /// Load configuration from the environment.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            whatsapp_token: required("WHATSAPP_TOKEN")?,
            phone_number_id: required("WHATSAPP_PHONE_NUMBER_ID")?,
            github_token: required("GITHUB_TOKEN")?,
            github_owner: required("GITHUB_OWNER")?,
            github_repo: required("GITHUB_REPO")?,
            github_branch: env::var("GITHUB_BRANCH")
                .unwrap_or_else(|_| DEFAULT_GITHUB_BRANCH.to_string()),
            verify_token: required("VERIFY_TOKEN")?,
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            conversation_ttl_secs: env::var("CONVERSATION_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_CONVERSATION_TTL_SECS),
        })
    }
}

fn required(name: &str) -> Result<String> {
    env::var(name).with_context(|| format!("{name} must be set"))
}
