//! # Open Audio API
//!
//! Tiered query-resolution and caching core for Discord music bots.
//!
//! Given a user-supplied search or URL query, [`api::AudioApi`] returns a
//! playable result while minimizing calls to the external track-resolution
//! backend:
//!
//! ```text
//! [fetch_track] → [Local cache] → [Global cache] → [Backend]
//! ```
//!
//! Cache writes produced during resolution are not committed inline: they are
//! appended to a deferred write queue keyed by request identity and flushed
//! once the request finishes, so results reach the caller before any store
//! I/O happens. When the queue runs dry, the autoplay selector picks the next
//! track from a curated playlist, a random sample of the local cache, or a
//! fixed reference playlist.
//!
//! The storage engines, the backend, playlists and the allow-list policy are
//! external collaborators behind the traits in [`api::traits`].
//!
//! ## Example
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use tokio::sync::Mutex;
//! use open_audio_api::api::{AudioApi, FetchOptions, RequestContext};
//! use open_audio_api::config::Config;
//! use open_audio_api::query::Query;
//! use open_audio_api::storage::GuildStore;
//!
//! # async fn example(
//! #     local: Arc<dyn open_audio_api::api::traits::LocalCacheStore>,
//! #     global: Arc<dyn open_audio_api::api::traits::GlobalCacheStore>,
//! #     loader: Arc<dyn open_audio_api::api::traits::TrackLoader>,
//! #     playlists: Arc<dyn open_audio_api::api::traits::PlaylistProvider>,
//! #     policy: Arc<dyn open_audio_api::api::traits::QueryPolicy>,
//! # ) -> anyhow::Result<()> {
//! let config = Arc::new(Config::load()?);
//! let guilds = Arc::new(Mutex::new(GuildStore::new(config.data_dir.clone()).await?));
//! let api = AudioApi::new(config, guilds, local, global, loader, playlists, policy);
//! api.initialize().await?;
//!
//! let ctx = RequestContext::new(123456789, 42);
//! let query = Query::process_input("never gonna give you up", None);
//! let (results, called_backend) = api.fetch_track(&ctx, &query, FetchOptions::default()).await?;
//! println!("{} tracks (backend: {called_backend})", results.tracks().len());
//!
//! // Al terminar la request, confirmar las escrituras diferidas
//! api.run_tasks(&ctx).await;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod errors;
pub mod model;
pub mod player;
pub mod query;
pub mod storage;

pub use api::{AudioApi, FetchOptions, RequestContext};
pub use config::{CacheLevel, Config};
pub use errors::{AudioApiError, LoadError};
pub use model::{LoadResult, LoadType, Track};
pub use player::{Player, PlayerEvent};
pub use query::Query;
pub use storage::{AutoplaySettings, GuildSettings, GuildStore, PlaylistScope};
