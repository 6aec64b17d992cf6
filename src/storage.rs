use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs;
use tracing::{info, warn};

/// Ámbito en el que vive una playlist curada.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaylistScope {
    Global,
    Guild,
    User,
}

impl Default for PlaylistScope {
    fn default() -> Self {
        PlaylistScope::Guild
    }
}

/// Configuración de la playlist de autoplay de un servidor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutoplaySettings {
    pub enabled: bool,
    pub playlist_id: Option<u64>,
    #[serde(default)]
    pub scope: PlaylistScope,
}

/// Configuración de servidor almacenada en JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildSettings {
    pub guild_id: u64,
    #[serde(default)]
    pub autoplaylist: AutoplaySettings,
    /// Sufijo " - lyrics" en búsquedas de YouTube para este servidor
    #[serde(default)]
    pub prefer_lyrics: bool,
    #[serde(default)]
    pub notify_channel_id: Option<u64>,
    /// `[notify_channel, voice_channel]` mientras autoplay esté activo
    #[serde(default)]
    pub currently_auto_playing_in: Vec<u64>,
}

impl GuildSettings {
    fn new(guild_id: u64) -> Self {
        Self {
            guild_id,
            autoplaylist: AutoplaySettings::default(),
            prefer_lyrics: false,
            notify_channel_id: None,
            currently_auto_playing_in: Vec::new(),
        }
    }
}

/// Almacenamiento de configuración por servidor basado en archivos JSON
pub struct GuildStore {
    data_dir: PathBuf,
    cache: HashMap<u64, GuildSettings>,
}

impl GuildStore {
    pub async fn new(data_dir: PathBuf) -> Result<Self> {
        // Crear directorio de datos si no existe
        fs::create_dir_all(&data_dir).await?;

        let guilds_dir = data_dir.join("guilds");
        fs::create_dir_all(&guilds_dir).await?;

        info!("📁 Guild store inicializado en: {}", data_dir.display());

        let mut store = Self {
            data_dir,
            cache: HashMap::new(),
        };

        // Cargar configuraciones existentes
        store.load_all_guilds().await?;

        Ok(store)
    }

    /// Obtiene la configuración de un servidor, creándola si no existe
    pub async fn get(&mut self, guild_id: u64) -> Result<GuildSettings> {
        if let Some(settings) = self.cache.get(&guild_id) {
            return Ok(settings.clone());
        }

        match self.load_guild(guild_id).await {
            Ok(settings) => {
                self.cache.insert(guild_id, settings.clone());
                Ok(settings)
            }
            Err(_) => {
                let settings = GuildSettings::new(guild_id);
                self.save_guild(&settings).await?;
                self.cache.insert(guild_id, settings.clone());
                info!("📝 Configuración por defecto creada para guild {}", guild_id);
                Ok(settings)
            }
        }
    }

    /// Actualiza la configuración de un servidor
    pub async fn update(&mut self, settings: GuildSettings) -> Result<()> {
        let guild_id = settings.guild_id;
        self.cache.insert(guild_id, settings.clone());
        self.save_guild(&settings).await?;
        Ok(())
    }

    pub async fn set_prefer_lyrics(&mut self, guild_id: u64, prefer_lyrics: bool) -> Result<()> {
        let mut settings = self.get(guild_id).await?;
        settings.prefer_lyrics = prefer_lyrics;
        self.update(settings).await
    }

    pub async fn set_autoplaylist(
        &mut self,
        guild_id: u64,
        autoplaylist: AutoplaySettings,
    ) -> Result<()> {
        let mut settings = self.get(guild_id).await?;
        settings.autoplaylist = autoplaylist;
        self.update(settings).await
    }

    pub async fn set_notify_channel(
        &mut self,
        guild_id: u64,
        channel_id: Option<u64>,
    ) -> Result<()> {
        let mut settings = self.get(guild_id).await?;
        settings.notify_channel_id = channel_id;
        self.update(settings).await
    }

    /// Marca (o limpia) los canales en los que autoplay está reproduciendo
    pub async fn set_currently_auto_playing_in(
        &mut self,
        guild_id: u64,
        channels: Vec<u64>,
    ) -> Result<()> {
        let mut settings = self.get(guild_id).await?;
        settings.currently_auto_playing_in = channels;
        self.update(settings).await
    }

    pub fn list_guilds(&self) -> Vec<u64> {
        self.cache.keys().copied().collect()
    }

    // Métodos privados

    async fn load_guild(&self, guild_id: u64) -> Result<GuildSettings> {
        let file_path = self.guild_file_path(guild_id);
        let content = fs::read_to_string(&file_path).await?;
        let settings: GuildSettings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    async fn save_guild(&self, settings: &GuildSettings) -> Result<()> {
        let file_path = self.guild_file_path(settings.guild_id);
        let content = serde_json::to_string_pretty(settings)?;
        fs::write(&file_path, content).await?;
        Ok(())
    }

    async fn load_all_guilds(&mut self) -> Result<()> {
        let guilds_dir = self.data_dir.join("guilds");
        let mut files = fs::read_dir(&guilds_dir).await?;
        let mut loaded_count = 0;

        while let Some(entry) = files.next_entry().await? {
            let path = entry.path();

            if path.extension().map_or(false, |ext| ext == "json") {
                if let Some(guild_id) = path
                    .file_stem()
                    .and_then(|n| n.to_str())
                    .and_then(|name| name.strip_prefix("guild_"))
                    .and_then(|id| id.parse::<u64>().ok())
                {
                    match self.load_guild(guild_id).await {
                        Ok(settings) => {
                            self.cache.insert(guild_id, settings);
                            loaded_count += 1;
                        }
                        Err(e) => {
                            warn!("Error cargando configuración para guild {}: {}", guild_id, e);
                        }
                    }
                }
            }
        }

        if loaded_count > 0 {
            info!("📂 Cargadas {} configuraciones de servidor", loaded_count);
        }

        Ok(())
    }

    fn guild_file_path(&self, guild_id: u64) -> PathBuf {
        self.data_dir
            .join("guilds")
            .join(format!("guild_{}.json", guild_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_get_creates_default_settings() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = GuildStore::new(dir.path().to_path_buf()).await.unwrap();

        let settings = store.get(42).await.unwrap();
        assert_eq!(settings.guild_id, 42);
        assert!(!settings.autoplaylist.enabled);
        assert!(!settings.prefer_lyrics);
        assert!(settings.currently_auto_playing_in.is_empty());

        // El archivo debe existir tras la creación
        assert!(dir.path().join("guilds/guild_42.json").exists());
    }

    #[tokio::test]
    async fn test_settings_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = GuildStore::new(dir.path().to_path_buf()).await.unwrap();
            store.set_prefer_lyrics(7, true).await.unwrap();
            store
                .set_autoplaylist(
                    7,
                    AutoplaySettings {
                        enabled: true,
                        playlist_id: Some(99),
                        scope: PlaylistScope::Guild,
                    },
                )
                .await
                .unwrap();
        }

        let mut reloaded = GuildStore::new(dir.path().to_path_buf()).await.unwrap();
        let settings = reloaded.get(7).await.unwrap();
        assert!(settings.prefer_lyrics);
        assert!(settings.autoplaylist.enabled);
        assert_eq!(settings.autoplaylist.playlist_id, Some(99));
        assert_eq!(reloaded.list_guilds(), vec![7]);
    }

    #[tokio::test]
    async fn test_currently_auto_playing_marker() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = GuildStore::new(dir.path().to_path_buf()).await.unwrap();

        store
            .set_currently_auto_playing_in(1, vec![100, 200])
            .await
            .unwrap();
        assert_eq!(
            store.get(1).await.unwrap().currently_auto_playing_in,
            vec![100, 200]
        );

        store.set_currently_auto_playing_in(1, Vec::new()).await.unwrap();
        assert!(store.get(1).await.unwrap().currently_auto_playing_in.is_empty());
    }
}
