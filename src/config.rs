use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::audio::{
    queue::DEFAULT_CAPACITY,
    session::{SessionSettings, DEFAULT_IDLE_TIMEOUT},
};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Sesiones de reproducción
    pub max_queue_size: usize,

    // Resolución con yt-dlp
    pub max_playlist_size: usize,
    pub resolve_timeout_secs: u64,
    pub ytdlp_path: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN")?,
            application_id: std::env::var("APPLICATION_ID")?.parse()?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            // Sesiones
            max_queue_size: std::env::var("MAX_QUEUE_SIZE")
                .unwrap_or_else(|_| "50".to_string())
                .parse()?,

            // yt-dlp
            max_playlist_size: std::env::var("MAX_PLAYLIST_SIZE")
                .unwrap_or_else(|_| "50".to_string())
                .parse()?,
            resolve_timeout_secs: std::env::var("RESOLVE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
            ytdlp_path: std::env::var("YTDLP_PATH").unwrap_or_else(|_| "yt-dlp".to_string()),
        };

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Queue capacity must be between 1 and 50
    /// - Playlist size and resolver timeout must be greater than 0
    /// - The extractor path must not be blank
    pub fn validate(&self) -> Result<()> {
        if self.max_queue_size == 0 || self.max_queue_size > DEFAULT_CAPACITY {
            anyhow::bail!("Max queue size must be between 1 and {}", DEFAULT_CAPACITY);
        }

        if self.max_playlist_size == 0 {
            anyhow::bail!("Max playlist size must be greater than 0");
        }

        if self.resolve_timeout_secs == 0 {
            anyhow::bail!("Resolve timeout must be greater than 0 seconds");
        }

        if self.ytdlp_path.trim().is_empty() {
            anyhow::bail!("YTDLP_PATH cannot be empty");
        }

        Ok(())
    }

    /// Per-guild session parameters derived from this configuration.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            queue_capacity: self.max_queue_size,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// Excludes the bot token.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: App ID {} (Guild: {})\n  \
            Sessions: {} queue, {}s idle disconnect\n  \
            Resolver: {} ({} playlist entries, {}s timeout)",
            self.application_id,
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            self.max_queue_size,
            DEFAULT_IDLE_TIMEOUT.as_secs(),
            self.ytdlp_path,
            self.max_playlist_size,
            self.resolve_timeout_secs,
        )
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,

            max_queue_size: DEFAULT_CAPACITY,

            max_playlist_size: 50,
            resolve_timeout_secs: 30,
            ytdlp_path: "yt-dlp".to_string(),
        }
    }
}
