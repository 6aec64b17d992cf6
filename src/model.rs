//! # Result Model
//!
//! Envelope types for track-resolution results.
//!
//! Every resolution attempt (local cache hit, global cache hit or live
//! backend call) produces a [`LoadResult`]: a load status, playlist metadata
//! and an ordered track list, parsed leniently from the raw JSON payload the
//! stores exchange. The raw payload is kept alongside the parsed view so it
//! can be re-serialized unchanged when publishing to the global cache.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

/// Claves estructurales que todo payload serializado debe contener antes de
/// ser encolado para escritura.
pub const PAYLOAD_MARKERS: [&str; 4] = ["loadType", "playlistInfo", "isSeekable", "isStream"];

/// Load status reported inside a result envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadType {
    TrackLoaded,
    PlaylistLoaded,
    SearchResult,
    V2Compat,
    NoMatches,
    LoadFailed,
}

impl LoadType {
    /// Estados de fallo: nunca deben persistirse en caché.
    pub fn is_failure(self) -> bool {
        matches!(self, LoadType::NoMatches | LoadType::LoadFailed)
    }

    /// Estados que hacen válida una entrada de la caché global.
    pub fn is_cacheable(self) -> bool {
        matches!(
            self,
            LoadType::TrackLoaded
                | LoadType::PlaylistLoaded
                | LoadType::SearchResult
                | LoadType::V2Compat
        )
    }
}

/// Normaliza la etiqueta legada `V2_COMPACT` a `V2_COMPAT` antes de
/// interpretar el payload.
pub fn normalize_load_type(raw: &mut Value) {
    if let Some(load_type) = raw.get_mut("loadType") {
        if *load_type == "V2_COMPACT" {
            *load_type = Value::String("V2_COMPAT".to_string());
        }
    }
}

/// Metadata de playlist dentro de un envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaylistInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "selectedTrack")]
    pub selected_track: Option<i64>,
}

/// Una pista resuelta, con sus anotaciones mutables (`extras`).
///
/// `extras` is stamped by the autoplay path at selection time (autoplay flag,
/// enqueue timestamp, voice channel, requester) and is never part of the
/// serialized cache record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Track {
    pub title: String,
    pub author: String,
    pub uri: String,
    pub identifier: String,
    /// Duración en milisegundos
    pub length: u64,
    pub is_seekable: bool,
    pub is_stream: bool,
    #[serde(skip)]
    pub extras: HashMap<String, Value>,
}

impl Track {
    /// Parsea una pista desde el payload crudo, tolerando tanto la forma
    /// plana como la anidada (`{"track": ..., "info": {...}}`).
    pub fn from_raw(value: &Value) -> Option<Track> {
        let info = value.get("info").unwrap_or(value);
        serde_json::from_value(info.clone()).ok()
    }
}

/// Resultado de cualquier intento de resolución.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadResult {
    load_type: LoadType,
    playlist_info: PlaylistInfo,
    tracks: Vec<Track>,
    raw: Value,
}

impl LoadResult {
    /// Builds an envelope from a raw payload, normalizing the legacy
    /// `V2_COMPACT` tag first. Anything unparseable degrades to
    /// [`LoadType::LoadFailed`] with no tracks rather than erroring.
    pub fn from_raw(mut raw: Value) -> Self {
        normalize_load_type(&mut raw);
        let load_type = raw
            .get("loadType")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or(LoadType::LoadFailed);
        let playlist_info = raw
            .get("playlistInfo")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();
        let tracks = raw
            .get("tracks")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(Track::from_raw).collect())
            .unwrap_or_default();

        Self {
            load_type,
            playlist_info,
            tracks,
            raw,
        }
    }

    /// Envelope canónico de fallo: estado `LOAD_FAILED` y lista vacía.
    pub fn load_failed() -> Self {
        Self::from_raw(json!({
            "loadType": "LOAD_FAILED",
            "playlistInfo": {},
            "tracks": [],
        }))
    }

    pub fn load_type(&self) -> LoadType {
        self.load_type
    }

    pub fn playlist_info(&self) -> &PlaylistInfo {
        &self.playlist_info
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Payload crudo tal cual fue recibido (ya normalizado).
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn has_error(&self) -> bool {
        self.load_type.is_failure()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn track_json(title: &str, uri: &str) -> Value {
        json!({
            "track": "QAAAjQIA",
            "info": {
                "title": title,
                "author": "Artist",
                "uri": uri,
                "identifier": "abc123",
                "length": 180_000,
                "isSeekable": true,
                "isStream": false,
            }
        })
    }

    #[test]
    fn test_v2_compact_is_normalized_on_read() {
        let raw = json!({
            "loadType": "V2_COMPACT",
            "playlistInfo": {},
            "tracks": [track_json("Song", "https://youtu.be/abc123")],
        });

        let result = LoadResult::from_raw(raw);
        assert_eq!(result.load_type(), LoadType::V2Compat);
        assert_eq!(result.raw()["loadType"], "V2_COMPAT");
        assert!(!result.has_error());
        assert_eq!(result.tracks().len(), 1);
    }

    #[test]
    fn test_failure_states_carry_error_flag() {
        assert!(LoadResult::load_failed().has_error());
        let no_matches = LoadResult::from_raw(json!({
            "loadType": "NO_MATCHES",
            "playlistInfo": {},
            "tracks": [],
        }));
        assert!(no_matches.has_error());
        assert!(!no_matches.load_type().is_cacheable());
    }

    #[test]
    fn test_malformed_payload_degrades_to_load_failed() {
        let result = LoadResult::from_raw(json!({"loadType": "SOMETHING_ELSE"}));
        assert_eq!(result.load_type(), LoadType::LoadFailed);
        assert!(result.tracks().is_empty());

        let not_an_object = LoadResult::from_raw(json!("just a string"));
        assert!(not_an_object.has_error());
    }

    #[test]
    fn test_track_parses_flat_and_nested_shapes() {
        let nested = Track::from_raw(&track_json("Nested", "uri")).unwrap();
        assert_eq!(nested.title, "Nested");
        assert_eq!(nested.length, 180_000);

        let flat = Track::from_raw(&json!({
            "title": "Flat",
            "author": "A",
            "uri": "u",
            "identifier": "i",
            "length": 1000,
            "isSeekable": true,
            "isStream": false,
        }))
        .unwrap();
        assert_eq!(flat.title, "Flat");
        assert!(flat.extras.is_empty());
    }
}
