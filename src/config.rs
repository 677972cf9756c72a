use std::{fs, path::Path, time::Duration};

use serde::Deserialize;

use crate::{ChatflowError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// store config
    pub store: StoreConfig,
    /// traversal settings
    pub engine: EngineConfig,
    /// scheduled job runner settings
    pub scheduler: SchedulerConfig,
    /// messaging gateway client
    pub gateway: GatewayConfig,
    /// text-generation provider client
    pub ai: AiConfig,
    /// number of async worker threads when the engine owns its runtime, range [1, 32768), defaults to 16
    pub async_worker_thread_number: u16,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// store type
    pub store_type: StoreType,
    /// postgres config
    pub postgres: Option<PostgresConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    #[default]
    Mem,
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostgresConfig {
    /// postgres database url
    pub database_url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// pause between consecutive items of one send-message node, in milliseconds
    pub message_pacing_ms: u64,
    /// nodes a single traversal pass may execute before the session is cancelled
    pub max_steps_per_pass: usize,
    /// default timeout of http-request nodes, in milliseconds
    pub http_timeout_ms: u64,
    /// number of per contact/channel locks kept in memory
    pub lock_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            message_pacing_ms: 1000,
            max_steps_per_pass: 200,
            http_timeout_ms: 10_000,
            lock_capacity: 10_000,
        }
    }
}

impl EngineConfig {
    pub fn message_pacing(&self) -> Duration {
        Duration::from_millis(self.message_pacing_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// how often due jobs are polled, in milliseconds
    pub poll_interval_ms: u64,
    /// max jobs claimed per poll
    pub batch_size: usize,
    /// number of worker tasks resuming sessions
    pub workers: usize,
    /// sessions waiting for input longer than this are expired
    pub session_ttl_secs: Option<u64>,
    /// a job still `running` this long after its claim is claimed again
    pub claim_lease_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            batch_size: 50,
            workers: 4,
            session_ttl_secs: None,
            claim_lease_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// messaging gateway base url
    pub base_url: String,
    /// bearer token sent to the gateway
    pub api_key: Option<String>,
    /// request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            api_key: None,
            timeout_ms: 15_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// OpenAI-compatible api base url
    pub base_url: String,
    /// api key
    pub api_key: Option<String>,
    /// model used when an ai-response node does not name one
    pub default_model: String,
    /// request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            default_model: "gpt-4o-mini".to_string(),
            timeout_ms: 60_000,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            engine: EngineConfig::default(),
            scheduler: SchedulerConfig::default(),
            gateway: GatewayConfig::default(),
            ai: AiConfig::default(),
            async_worker_thread_number: 16,
        }
    }
}

impl Config {
    pub fn create<T: AsRef<Path>>(path: T) -> Result<Self> {
        let data = fs::read_to_string(path.as_ref())
            .map_err(|err| ChatflowError::Config(format!("failed to load config file {:?}: {}", path.as_ref(), err)))?;

        Self::load_from_str(data.as_str())
    }

    pub fn load_from_str(toml_str: &str) -> Result<Self> {
        let config = toml::from_str::<Config>(toml_str)?;
        if config.async_worker_thread_number == 0 {
            return Err(ChatflowError::Config("async_worker_thread_number must be at least 1".to_string()));
        }
        Ok(config)
    }
}
