use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Conjunto de bits que indica qué niveles de caché están habilitados.
///
/// Cache tiers can be toggled individually; the resolver only consults the
/// lavalink bit, the other bits exist for the platform-specific metadata
/// caches layered on top of this core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheLevel {
    bits: u8,
}

impl CacheLevel {
    const LAVALINK: u8 = 0b001;
    const SPOTIFY: u8 = 0b010;
    const YOUTUBE: u8 = 0b100;

    pub const fn none() -> Self {
        Self { bits: 0 }
    }

    pub const fn all() -> Self {
        Self {
            bits: Self::LAVALINK | Self::SPOTIFY | Self::YOUTUBE,
        }
    }

    pub const fn set_lavalink() -> Self {
        Self {
            bits: Self::LAVALINK,
        }
    }

    pub const fn set_spotify() -> Self {
        Self {
            bits: Self::SPOTIFY,
        }
    }

    pub const fn set_youtube() -> Self {
        Self {
            bits: Self::YOUTUBE,
        }
    }

    pub fn from_bits(bits: u8) -> Self {
        Self {
            bits: bits & Self::all().bits,
        }
    }

    pub fn bits(self) -> u8 {
        self.bits
    }

    /// `true` si todos los bits de `self` están presentes en `other`.
    pub fn is_subset(self, other: Self) -> bool {
        self.bits & other.bits == self.bits
    }
}

impl Default for CacheLevel {
    fn default() -> Self {
        Self::all()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Caché
    pub cache_level: CacheLevel,
    pub cache_age_days: i64,

    // Caché global compartida
    pub global_api_enabled: bool,

    // Identidad del bot (requester de las pistas de autoplay)
    pub bot_user_id: u64,

    // Paths
    pub data_dir: PathBuf,
    pub local_tracks_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let data_dir: PathBuf = std::env::var("DATA_DIR")
            .unwrap_or_else(|_| "/app/data".to_string())
            .into();

        let config = Self {
            // Caché
            cache_level: CacheLevel::from_bits(
                std::env::var("CACHE_LEVEL")
                    .unwrap_or_else(|_| CacheLevel::all().bits().to_string())
                    .parse()?,
            ),
            cache_age_days: std::env::var("CACHE_AGE")
                .unwrap_or_else(|_| "365".to_string())
                .parse()?,

            // Caché global
            global_api_enabled: std::env::var("GLOBAL_API_ENABLED")
                .unwrap_or_else(|_| "false".to_string())
                .parse()?,

            // Identidad
            bot_user_id: std::env::var("BOT_USER_ID")
                .unwrap_or_else(|_| "0".to_string())
                .parse()?,

            // Paths
            local_tracks_dir: std::env::var("LOCAL_TRACKS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| data_dir.join("localtracks")),
            data_dir,
        };

        // Create directories if they don't exist
        std::fs::create_dir_all(&config.data_dir)?;
        std::fs::create_dir_all(&config.local_tracks_dir)?;

        // Validate configuration before returning
        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Cache age must be at least one day
    /// - The local tracks directory must live somewhere (non-empty path)
    pub fn validate(&self) -> Result<()> {
        if self.cache_age_days <= 0 {
            anyhow::bail!(
                "Cache age must be at least 1 day, got: {}",
                self.cache_age_days
            );
        }

        if self.local_tracks_dir.as_os_str().is_empty() {
            anyhow::bail!("Local tracks directory cannot be empty");
        }

        Ok(())
    }

    /// Returns a summary of the current configuration for logging.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Cache: level {:#05b}, max age {} days\n  \
            Global API: {}\n  \
            Paths: data {}, localtracks {}",
            self.cache_level.bits(),
            self.cache_age_days,
            if self.global_api_enabled { "enabled" } else { "disabled" },
            self.data_dir.display(),
            self.local_tracks_dir.display(),
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_level: CacheLevel::all(),
            cache_age_days: 365,
            global_api_enabled: false,
            bot_user_id: 0,
            data_dir: "/app/data".into(),
            local_tracks_dir: "/app/data/localtracks".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cache_level_subset() {
        assert!(CacheLevel::set_lavalink().is_subset(CacheLevel::all()));
        assert!(CacheLevel::none().is_subset(CacheLevel::set_lavalink()));
        assert!(!CacheLevel::set_lavalink().is_subset(CacheLevel::set_spotify()));
        assert!(!CacheLevel::all().is_subset(CacheLevel::set_youtube()));
    }

    #[test]
    fn test_cache_level_from_bits_masks_unknown_bits() {
        assert_eq!(CacheLevel::from_bits(0xFF), CacheLevel::all());
        assert_eq!(CacheLevel::from_bits(0), CacheLevel::none());
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_cache_age() {
        let config = Config {
            cache_age_days: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
