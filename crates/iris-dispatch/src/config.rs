//! Application configuration loaded from environment variables.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;
use talk_client::{DispatchOptions, RetryPolicy};

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Gateway sidecar
    #[serde(default)]
    pub iris: IrisConfig,

    /// Messaging and reaction backends
    #[serde(default)]
    pub talk: TalkConfig,

    /// Board backends
    #[serde(default)]
    pub moim: MoimConfig,

    /// Cache lifetimes
    #[serde(default)]
    pub cache: CacheConfig,

    /// Background send pool
    #[serde(default)]
    pub workers: WorkersConfig,

    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IrisConfig {
    /// Sidecar base URL serving `/aot` and `/query`
    #[serde(default = "default_iris_endpoint")]
    pub endpoint: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TalkConfig {
    #[serde(default = "default_write_url")]
    pub write_url: String,

    #[serde(default = "default_reaction_base_url")]
    pub reaction_base_url: String,

    /// Bound on each backend call
    #[serde(default = "default_send_timeout", with = "humantime_serde")]
    pub send_timeout: Duration,

    /// Bound on each sidecar call
    #[serde(default = "default_auth_timeout", with = "humantime_serde")]
    pub auth_timeout: Duration,

    /// Idle pooled connections kept per host
    #[serde(default = "default_max_idle_per_host")]
    pub max_idle_per_host: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MoimConfig {
    #[serde(default = "default_open_base_url")]
    pub open_base_url: String,

    #[serde(default = "default_talk_base_url")]
    pub talk_base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_credential_ttl", with = "humantime_serde")]
    pub credential_ttl: Duration,

    #[serde(default = "default_link_id_ttl", with = "humantime_serde")]
    pub link_id_ttl: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkersConfig {
    #[serde(default = "default_workers")]
    pub size: usize,

    /// Queued sends beyond this are rejected
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for IrisConfig {
    fn default() -> Self {
        Self {
            endpoint: default_iris_endpoint(),
        }
    }
}

impl Default for TalkConfig {
    fn default() -> Self {
        Self {
            write_url: default_write_url(),
            reaction_base_url: default_reaction_base_url(),
            send_timeout: default_send_timeout(),
            auth_timeout: default_auth_timeout(),
            max_idle_per_host: default_max_idle_per_host(),
        }
    }
}

impl Default for MoimConfig {
    fn default() -> Self {
        Self {
            open_base_url: default_open_base_url(),
            talk_base_url: default_talk_base_url(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            credential_ttl: default_credential_ttl(),
            link_id_ttl: default_link_id_ttl(),
        }
    }
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            size: default_workers(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// Default value functions
fn default_iris_endpoint() -> String {
    "http://127.0.0.1:3000".into()
}

fn default_write_url() -> String {
    talk_client::DEFAULT_WRITE_URL.into()
}

fn default_reaction_base_url() -> String {
    talk_client::DEFAULT_REACTION_BASE_URL.into()
}

fn default_send_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_auth_timeout() -> Duration {
    Duration::from_secs(3)
}

fn default_max_idle_per_host() -> usize {
    4
}

fn default_open_base_url() -> String {
    "https://open.kakao.com/moim".into()
}

fn default_talk_base_url() -> String {
    "https://talkmoim-api.kakao.com".into()
}

fn default_credential_ttl() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_link_id_ttl() -> Duration {
    Duration::from_secs(10 * 60)
}

fn default_workers() -> usize {
    5
}

fn default_queue_capacity() -> usize {
    64
}

fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();
        Self::from_environment(config::Environment::default())
    }

    fn from_environment(environment: config::Environment) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(
                environment
                    .separator("__")
                    // Room ids and URLs stay strings.
                    .try_parsing(false),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Options for the dispatch client.
    pub fn dispatch_options(&self) -> DispatchOptions {
        DispatchOptions {
            write_url: self.talk.write_url.clone(),
            reaction_base_url: self.talk.reaction_base_url.clone(),
            open_base_url: self.moim.open_base_url.clone(),
            talk_base_url: self.moim.talk_base_url.clone(),
            send_timeout: self.talk.send_timeout,
            auth_timeout: self.talk.auth_timeout,
            max_idle_per_host: self.talk.max_idle_per_host,
            credential_ttl: self.cache.credential_ttl,
            link_id_ttl: self.cache.link_id_ttl,
            workers: self.workers.size,
            queue_capacity: self.workers.queue_capacity,
            poll_retry: RetryPolicy::poll(),
        }
    }
}
