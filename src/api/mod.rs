//! # Audio API Module
//!
//! Tiered query-resolution core.
//!
//! This module contains [`AudioApi`], the replacement for calling the track
//! backend directly. It manages:
//!
//! - Tiered lookup: local cache → shared global cache → live backend call
//! - Deferred cache writes through the [`write_queue::WriteQueue`]
//! - Random sampling of the local cache for autoplay
//! - The autoplay selection loop (see [`autoplay`])
//!
//! ## Resolution order
//!
//! ```text
//! [fetch_track] → [Local cache] → [Global cache] → [Backend]
//! ```
//!
//! A hit on any tier returns immediately; the cache writes the resolution
//! produced are appended to the write queue under the request identity and
//! committed later by [`AudioApi::run_tasks`].

pub mod autoplay;
pub mod traits;
pub mod write_queue;

use chrono::{Duration, Utc};
use rand::Rng;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::config::{CacheLevel, Config};
use crate::errors::{AudioApiError, LoadError};
use crate::model::{LoadResult, Track, PAYLOAD_MARKERS};
use crate::query::Query;
use crate::storage::GuildStore;
use traits::{
    CacheRecord, GlobalCacheStore, LocalCacheStore, PlaylistProvider, QueryPolicy,
    RandomFetchFilter, TrackLoader,
};
use write_queue::{WriteQueue, WriteTask};

/// Identidad de la request que origina una resolución.
///
/// Replaces the command-context object the resolver used to require: callers
/// that are not commands (autoplay) construct one directly.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext {
    /// Id de mensaje/interacción: clave del batch de escrituras diferidas
    pub request_id: u64,
    pub guild_id: u64,
    pub requester: Option<u64>,
}

impl RequestContext {
    pub fn new(request_id: u64, guild_id: u64) -> Self {
        Self {
            request_id,
            guild_id,
            requester: None,
        }
    }

    pub fn with_requester(mut self, requester: u64) -> Self {
        self.requester = Some(requester);
        self
    }
}

/// Opciones de una llamada a [`AudioApi::fetch_track`].
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    /// Salta la caché y fuerza la llamada al backend
    pub forced: bool,
    /// No llamar al backend si no hay nada en caché
    pub lazy: bool,
    /// Permitir consultar la caché global
    pub query_global: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            forced: false,
            lazy: false,
            query_global: true,
        }
    }
}

/// Núcleo de resolución de queries de música.
///
/// Always tries the local cache first, then the global cache, before making
/// backend calls.
pub struct AudioApi {
    config: Arc<Config>,
    guilds: Arc<Mutex<GuildStore>>,
    local: Arc<dyn LocalCacheStore>,
    global: Arc<dyn GlobalCacheStore>,
    loader: Arc<dyn TrackLoader>,
    playlists: Arc<dyn PlaylistProvider>,
    policy: Arc<dyn QueryPolicy>,
    write_queue: WriteQueue,
}

impl AudioApi {
    pub fn new(
        config: Arc<Config>,
        guilds: Arc<Mutex<GuildStore>>,
        local: Arc<dyn LocalCacheStore>,
        global: Arc<dyn GlobalCacheStore>,
        loader: Arc<dyn TrackLoader>,
        playlists: Arc<dyn PlaylistProvider>,
        policy: Arc<dyn QueryPolicy>,
    ) -> Self {
        let write_queue = WriteQueue::new(local.clone(), global.clone());
        Self {
            config,
            guilds,
            local,
            global,
            loader,
            playlists,
            policy,
            write_queue,
        }
    }

    /// Prepara la conexión de la caché local.
    pub async fn initialize(&self) -> anyhow::Result<()> {
        self.local.init().await
    }

    /// Cierra la conexión de la caché local.
    pub fn close(&self) {
        self.local.close();
    }

    /// Ejecuta las escrituras diferidas de una request.
    pub async fn run_tasks(&self, ctx: &RequestContext) {
        self.write_queue.flush(ctx.request_id).await;
    }

    /// Ejecuta todas las escrituras pendientes; llamar al apagar.
    pub async fn run_all_pending_tasks(&self) {
        self.write_queue.flush_all().await;
    }

    /// Filas locales elegibles para contribuir a la caché global.
    pub async fn fetch_all_contribute(&self) -> anyhow::Result<Vec<CacheRecord>> {
        self.local.fetch_all_for_publish().await
    }

    fn cache_enabled(&self) -> bool {
        CacheLevel::set_lavalink().is_subset(self.config.cache_level)
    }

    async fn prefer_lyrics(&self, guild_id: u64) -> bool {
        let mut guilds = self.guilds.lock().await;
        guilds
            .get(guild_id)
            .await
            .map(|settings| settings.prefer_lyrics)
            .unwrap_or(false)
    }

    /// Resuelve una query contra las capas de caché y el backend.
    ///
    /// Tries a valid cached entry first; if none is found (or the cached
    /// entry is invalid) it falls through to the backend. Returns the result
    /// envelope plus whether the backend was actually invoked.
    ///
    /// # Cache keys
    ///
    /// When the guild prefers lyrics and the query is a YouTube search, the
    /// lookup string gets a `" - lyrics"` suffix and that suffixed string is
    /// also the cache key. The same raw query is therefore cached under two
    /// keys depending on the toggle; intentional, do not unify.
    ///
    /// # Errors
    ///
    /// Only a fatal backend condition surfaces, as
    /// [`AudioApiError::TrackEnqueue`]. Everything else degrades to a
    /// `LOAD_FAILED` envelope.
    pub async fn fetch_track(
        &self,
        ctx: &RequestContext,
        query: &Query,
        opts: FetchOptions,
    ) -> Result<(LoadResult, bool), AudioApiError> {
        let cache_enabled = self.cache_enabled();
        let globaldb = self.config.global_api_enabled && self.global.can_read();
        let prefer_lyrics = self.prefer_lyrics(ctx.guild_id).await;

        let mut query_string = query.to_string();
        if prefer_lyrics && query.is_youtube && query.is_search {
            query_string = format!("{query_string} - lyrics");
        }

        let mut forced = opts.forced;
        let mut retried = false;

        loop {
            let mut candidate: Option<Value> = None;

            if cache_enabled && !forced && !query.is_local {
                match self.local.fetch_one(&query_string).await {
                    Ok(Some(hit)) if hit.data.is_object() => {
                        trace!("Actualizando caché local con {:?}", query_string);
                        self.write_queue.append(
                            ctx.request_id,
                            WriteTask::Update {
                                query: query_string.clone(),
                            },
                        );
                        candidate = Some(hit.data);
                    }
                    // Payload ausente o malformado: miss total
                    Ok(_) => {}
                    Err(exc) => {
                        debug!("Fallo al leer {:?} de la caché local: {}", query_string, exc);
                    }
                }
            }

            let mut results: Option<LoadResult> = None;
            let mut valid_global_entry = false;
            let mut called_api = false;

            if globaldb && candidate.is_none() && opts.query_global && !forced && !query.is_local {
                if let Ok(entry) = self.global.get_call(query).await {
                    let parsed = LoadResult::from_raw(entry);
                    if parsed.load_type().is_cacheable() {
                        trace!("Entrada global válida para {:?}", query_string);
                        valid_global_entry = true;
                        results = Some(parsed);
                    }
                }
            }

            if valid_global_entry {
                // La entrada global manda sobre el resto de capas
            } else if opts.lazy {
                // lazy: nunca llamamos al backend
            } else if let Some(mut data) = candidate {
                if let Some(map) = data.as_object_mut() {
                    map.insert("query".to_string(), Value::String(query_string.clone()));
                }
                let parsed = LoadResult::from_raw(data);
                if parsed.has_error() && !retried {
                    // Entrada envenenada: un único reintento forzado contra
                    // el backend para regenerarla
                    retried = true;
                    forced = true;
                    continue;
                }
                results = Some(parsed);
            } else {
                trace!("Consultando el backend por {:?}", query_string);
                called_api = true;
                match self.loader.load_tracks(&query_string).await {
                    Ok(loaded) => results = Some(loaded),
                    Err(LoadError::Transient) => results = None,
                    Err(LoadError::Fatal(reason)) => {
                        debug!("Fallo fatal del backend para {:?}: {}", query_string, reason);
                        return Err(AudioApiError::TrackEnqueue);
                    }
                }
            }

            let results = match results {
                Some(results) => results,
                None => {
                    valid_global_entry = false;
                    LoadResult::load_failed()
                }
            };

            let update_global = globaldb && !valid_global_entry && self.global.has_api_key();
            if update_global
                && !query.is_local
                && !results.has_error()
                && !results.tracks().is_empty()
            {
                self.write_queue.append(
                    ctx.request_id,
                    WriteTask::PublishGlobal {
                        response: results.raw().clone(),
                        query: query.clone(),
                    },
                );
            }

            if cache_enabled
                && !results.has_error()
                && !query.is_local
                && !results.tracks().is_empty()
            {
                let time_now = Utc::now().timestamp();
                match serde_json::to_string(results.raw()) {
                    Ok(serialized)
                        if PAYLOAD_MARKERS.iter().all(|marker| serialized.contains(marker)) =>
                    {
                        self.write_queue.append(
                            ctx.request_id,
                            WriteTask::Insert(CacheRecord {
                                query: query_string.clone(),
                                data: results.raw().clone(),
                                last_updated: time_now,
                                last_fetched: time_now,
                            }),
                        );
                    }
                    Ok(_) => {
                        debug!(
                            "Payload de {:?} sin marcadores estructurales, escritura omitida",
                            query_string
                        );
                    }
                    Err(exc) => {
                        debug!("No se pudo serializar el payload de {:?}: {}", query_string, exc);
                    }
                }
            }

            return Ok((results, called_api));
        }
    }

    /// Muestrea una pista aleatoria de la caché local.
    ///
    /// Only rows fetched within the trailing 7-day window and younger than
    /// the configured max age qualify. Any store or parse failure yields
    /// `None`, never an error.
    pub async fn get_random_track_from_db(&self) -> Option<Track> {
        let now = Utc::now();
        let filter = RandomFetchFilter {
            fetched_after: (now - Duration::days(7)).timestamp(),
            updated_after: (now - Duration::days(self.config.cache_age_days)).timestamp(),
        };

        let raw = match self.local.fetch_random(filter).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(exc) => {
                trace!("Fallo al muestrear la caché local: {}", exc);
                return None;
            }
        };

        let results = LoadResult::from_raw(raw);
        let tracks = results.tracks();
        if tracks.is_empty() {
            return None;
        }
        let pick = rand::thread_rng().gen_range(0..tracks.len());
        Some(tracks[pick].clone())
    }
}
