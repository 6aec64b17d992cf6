//! Interfaces de los colaboradores externos del núcleo de resolución.
//!
//! The storage engines, the track-resolution backend, the playlist provider
//! and the allow-list policy are all external collaborators; the core only
//! talks to them through these traits so they can be swapped (and mocked in
//! tests).

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::errors::LoadError;
use crate::model::{LoadResult, Track};
use crate::query::Query;
use crate::storage::PlaylistScope;

/// Una fila de la tabla de resoluciones cacheadas.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CacheRecord {
    /// Clave: query normalizada (posiblemente con sufijo de lyrics)
    pub query: String,
    /// Payload del envelope serializado
    pub data: Value,
    pub last_updated: i64,
    pub last_fetched: i64,
}

/// Resultado de una búsqueda puntual en la caché local.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheFetchResult {
    pub data: Value,
    pub last_updated: i64,
}

/// Filtro para el muestreo aleatorio de la caché local.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RandomFetchFilter {
    /// Solo filas consultadas después de este timestamp (ventana de 7 días)
    pub fetched_after: i64,
    /// Solo filas actualizadas después de este timestamp (edad máxima)
    pub updated_after: i64,
}

/// Caché local persistente, indexada por query normalizada.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LocalCacheStore: Send + Sync {
    /// Prepara la conexión con el almacenamiento.
    async fn init(&self) -> Result<()>;

    /// Cierra la conexión con el almacenamiento.
    fn close(&self);

    async fn fetch_one(&self, query: &str) -> Result<Option<CacheFetchResult>>;

    async fn fetch_random(&self, filter: RandomFetchFilter) -> Result<Option<Value>>;

    async fn insert(&self, rows: Vec<CacheRecord>) -> Result<()>;

    async fn update(&self, query: &str) -> Result<()>;

    /// Todas las filas elegibles para contribuir a la caché global.
    async fn fetch_all_for_publish(&self) -> Result<Vec<CacheRecord>>;
}

/// Caché global compartida entre instalaciones del bot.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GlobalCacheStore: Send + Sync {
    /// `true` si esta instalación puede leer de la caché global.
    fn can_read(&self) -> bool;

    /// `true` si hay una credencial aprovisionada para publicar.
    fn has_api_key(&self) -> bool;

    async fn get_call(&self, query: &Query) -> Result<Value>;

    /// Publica un envelope resuelto para la query dada.
    async fn update_global(&self, response: Value, query: Query) -> Result<()>;
}

/// Backend de resolución de pistas (reemplazo de `Player::load_tracks`).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackLoader: Send + Sync {
    async fn load_tracks(&self, query: &str) -> Result<LoadResult, LoadError>;
}

/// Proveedor externo de playlists curadas.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlaylistProvider: Send + Sync {
    async fn get_playlist(
        &self,
        playlist_id: u64,
        scope: PlaylistScope,
        guild_id: u64,
    ) -> Result<Vec<Track>>;
}

/// Chequeo de lista de permitidos para queries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueryPolicy: Send + Sync {
    async fn is_query_allowed(
        &self,
        guild_id: u64,
        channel_id: Option<u64>,
        text: &str,
        query: &Query,
    ) -> bool;
}
