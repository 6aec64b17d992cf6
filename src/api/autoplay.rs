//! Selección de pista para autoplay.
//!
//! When the queue runs dry the selector picks the next track from, in order:
//! the guild's curated autoplay playlist, a random sample of the local cache,
//! or a fixed reference playlist resolved through the tiered resolver.

use chrono::Utc;
use rand::Rng;
use serde_json::Value;
use tracing::debug;

use super::{AudioApi, FetchOptions, RequestContext};
use crate::errors::AudioApiError;
use crate::model::Track;
use crate::player::{Player, PlayerEvent};
use crate::query::Query;

/// Playlist de referencia cuando no hay nada mejor que reproducir.
pub const TOP_TRACKS_PLAYLIST: &str =
    "https://www.youtube.com/playlist?list=PL4fGSI1pDJn5rWitrRWFKdm-ulaFiIyoK";

impl AudioApi {
    /// Encola una pista elegida para autoplay.
    ///
    /// With a single candidate the pick is unconditional. With several, up to
    /// N uniform picks (N = candidate count) are validated against the query
    /// parser, the local filesystem and the allow-list policy; exhausting
    /// them yields [`AudioApiError::NoValidEntry`].
    pub async fn autoplay(&self, player: &Player) -> Result<(), AudioApiError> {
        let settings = {
            let mut guilds = self.guilds.lock().await;
            guilds.get(player.guild_id).await?
        };
        let cache_enabled = self.cache_enabled();

        let mut tracks: Vec<Track> = Vec::new();
        if settings.autoplaylist.enabled {
            if let Some(playlist_id) = settings.autoplaylist.playlist_id {
                match self
                    .playlists
                    .get_playlist(playlist_id, settings.autoplaylist.scope, player.guild_id)
                    .await
                {
                    Ok(playlist_tracks) => tracks = playlist_tracks,
                    Err(exc) => {
                        debug!("Fallo al obtener la playlist de autoplay: {}", exc);
                    }
                }
            }
        }

        if tracks.is_empty() {
            if cache_enabled {
                if let Some(track) = self.get_random_track_from_db().await {
                    tracks = vec![track];
                }
            }
            if tracks.is_empty() {
                let ctx = RequestContext::new(player.guild_id, player.guild_id)
                    .with_requester(self.config.bot_user_id);
                let query =
                    Query::process_input(TOP_TRACKS_PLAYLIST, Some(&self.config.local_tracks_dir));
                let (results, _called_api) =
                    self.fetch_track(&ctx, &query, FetchOptions::default()).await?;
                tracks = results.tracks().to_vec();
            }
        }

        if tracks.is_empty() {
            // Nada que encolar este ciclo
            return Ok(());
        }

        let multiple = tracks.len() > 1;
        let mut track = tracks[0].clone();

        if multiple {
            let mut accepted = false;
            for _ in 0..tracks.len() {
                let pick = tracks[rand::thread_rng().gen_range(0..tracks.len())].clone();
                let query =
                    Query::process_input(&pick.uri, Some(&self.config.local_tracks_dir));
                tokio::task::yield_now().await;

                if !query.valid {
                    continue;
                }
                if query.is_local
                    && query
                        .local_track_path
                        .as_ref()
                        .map_or(true, |path| !path.exists())
                {
                    continue;
                }
                let text = format!("{} {} {} {}", pick.title, pick.author, pick.uri, query);
                if !self
                    .policy
                    .is_query_allowed(player.guild_id, player.notify_channel_id, &text, &query)
                    .await
                {
                    debug!("Query no permitida en guild {}", player.guild_id);
                    continue;
                }

                track = pick;
                accepted = true;
                break;
            }
            if !accepted {
                return Err(AudioApiError::NoValidEntry);
            }
        }

        // Anotaciones de la pista elegida
        track
            .extras
            .insert("autoplay".to_string(), Value::Bool(true));
        track
            .extras
            .insert("enqueue_time".to_string(), Value::from(Utc::now().timestamp()));
        track
            .extras
            .insert("vc".to_string(), Value::from(player.channel_id));
        track
            .extras
            .insert("requester".to_string(), Value::from(self.config.bot_user_id));

        player.add(track.clone());
        player.notify(PlayerEvent::TrackAutoPlay {
            guild_id: player.guild_id,
            track: track.clone(),
        });

        // Marcador persistente de "autoplay activo en estos canales"
        let marker = player
            .notify_channel_id
            .map(|notify| vec![notify, player.channel_id])
            .unwrap_or_default();
        {
            let mut guilds = self.guilds.lock().await;
            guilds
                .set_currently_auto_playing_in(player.guild_id, marker)
                .await?;
        }

        if player.current().is_none() {
            player.play();
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::traits::{
        MockGlobalCacheStore, MockLocalCacheStore, MockPlaylistProvider, MockQueryPolicy,
        MockTrackLoader,
    };
    use crate::config::{CacheLevel, Config};
    use crate::model::LoadResult;
    use crate::storage::{AutoplaySettings, GuildStore, PlaylistScope};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::sync::Mutex;

    fn track(title: &str, uri: &str) -> Track {
        Track {
            title: title.to_string(),
            author: "Artist".to_string(),
            uri: uri.to_string(),
            identifier: "id".to_string(),
            length: 1000,
            is_seekable: true,
            is_stream: false,
            ..Track::default()
        }
    }

    async fn build_api(
        config: Config,
        local: MockLocalCacheStore,
        loader: MockTrackLoader,
        playlists: MockPlaylistProvider,
        policy: MockQueryPolicy,
    ) -> (AudioApi, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let guilds = GuildStore::new(dir.path().to_path_buf()).await.unwrap();
        let api = AudioApi::new(
            Arc::new(config),
            Arc::new(Mutex::new(guilds)),
            Arc::new(local),
            Arc::new(MockGlobalCacheStore::new()),
            Arc::new(loader),
            Arc::new(playlists),
            Arc::new(policy),
        );
        (api, dir)
    }

    async fn enable_autoplaylist(api: &AudioApi, guild_id: u64, playlist_id: u64) {
        let mut guilds = api.guilds.lock().await;
        guilds
            .set_autoplaylist(
                guild_id,
                AutoplaySettings {
                    enabled: true,
                    playlist_id: Some(playlist_id),
                    scope: PlaylistScope::Guild,
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_single_candidate_is_accepted_without_policy_check() {
        let mut playlists = MockPlaylistProvider::new();
        playlists
            .expect_get_playlist()
            .times(1)
            .returning(|_, _, _| Ok(vec![track("Only One", "https://youtu.be/only1")]));

        // Sin expectativas: cualquier llamada a la policy hace fallar el test
        let policy = MockQueryPolicy::new();

        let (api, _dir) = build_api(
            Config::default(),
            MockLocalCacheStore::new(),
            MockTrackLoader::new(),
            playlists,
            policy,
        )
        .await;
        enable_autoplaylist(&api, 1, 55).await;

        let player = Player::new(1, 100, Some(50));
        let mut events = player.subscribe();
        api.autoplay(&player).await.unwrap();

        // La pista quedó anotada y en reproducción
        let current = player.current().unwrap();
        assert_eq!(current.title, "Only One");
        assert_eq!(current.extras["autoplay"], json!(true));
        assert_eq!(current.extras["vc"], json!(100));

        match events.recv().await.unwrap() {
            PlayerEvent::TrackAutoPlay { guild_id, track } => {
                assert_eq!(guild_id, 1);
                assert_eq!(track.title, "Only One");
            }
            other => panic!("evento inesperado: {other:?}"),
        }

        // Marcador persistido: [canal de notificación, canal de voz]
        let mut guilds = api.guilds.lock().await;
        assert_eq!(
            guilds.get(1).await.unwrap().currently_auto_playing_in,
            vec![50, 100]
        );
    }

    #[tokio::test]
    async fn test_exhausting_all_candidates_raises_no_valid_entry() {
        let mut playlists = MockPlaylistProvider::new();
        playlists.expect_get_playlist().times(1).returning(|_, _, _| {
            Ok(vec![
                track("A", "https://youtu.be/a"),
                track("B", "https://youtu.be/b"),
                track("C", "https://youtu.be/c"),
            ])
        });

        let mut policy = MockQueryPolicy::new();
        // Exactamente N intentos para N candidatos
        policy
            .expect_is_query_allowed()
            .times(3)
            .returning(|_, _, _, _| false);

        let (api, _dir) = build_api(
            Config::default(),
            MockLocalCacheStore::new(),
            MockTrackLoader::new(),
            playlists,
            policy,
        )
        .await;
        enable_autoplaylist(&api, 1, 55).await;

        let player = Player::new(1, 100, None);
        let err = api.autoplay(&player).await.unwrap_err();
        assert!(matches!(err, AudioApiError::NoValidEntry));
        assert_eq!(player.queue_len(), 0);
    }

    #[tokio::test]
    async fn test_falls_back_to_random_sample_when_no_playlist() {
        let mut local = MockLocalCacheStore::new();
        local.expect_fetch_random().times(1).returning(|_| {
            Ok(Some(json!({
                "loadType": "TRACK_LOADED",
                "playlistInfo": {},
                "tracks": [{
                    "info": {
                        "title": "Sampled",
                        "author": "Artist",
                        "uri": "https://youtu.be/sampled",
                        "identifier": "sampled",
                        "length": 1000,
                        "isSeekable": true,
                        "isStream": false,
                    }
                }],
            })))
        });

        let (api, _dir) = build_api(
            Config::default(),
            local,
            MockTrackLoader::new(),
            MockPlaylistProvider::new(),
            MockQueryPolicy::new(),
        )
        .await;

        let player = Player::new(1, 100, None);
        api.autoplay(&player).await.unwrap();
        assert_eq!(player.current().unwrap().title, "Sampled");

        // Sin canal de notificación el marcador queda vacío
        let mut guilds = api.guilds.lock().await;
        assert!(guilds
            .get(1)
            .await
            .unwrap()
            .currently_auto_playing_in
            .is_empty());
    }

    #[tokio::test]
    async fn test_falls_back_to_reference_playlist_when_cache_disabled() {
        let mut loader = MockTrackLoader::new();
        loader
            .expect_load_tracks()
            .times(1)
            .withf(|q| q == TOP_TRACKS_PLAYLIST)
            .returning(|_| {
                Ok(LoadResult::from_raw(json!({
                    "loadType": "PLAYLIST_LOADED",
                    "playlistInfo": {"name": "Top Tracks"},
                    "tracks": [{
                        "info": {
                            "title": "Reference",
                            "author": "Artist",
                            "uri": "https://youtu.be/reference",
                            "identifier": "reference",
                            "length": 1000,
                            "isSeekable": true,
                            "isStream": false,
                        }
                    }],
                })))
            });

        let config = Config {
            cache_level: CacheLevel::none(),
            ..Config::default()
        };
        let (api, _dir) = build_api(
            config,
            MockLocalCacheStore::new(),
            loader,
            MockPlaylistProvider::new(),
            MockQueryPolicy::new(),
        )
        .await;

        let player = Player::new(1, 100, None);
        api.autoplay(&player).await.unwrap();
        assert_eq!(player.current().unwrap().title, "Reference");
    }
}
