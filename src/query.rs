use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

/// Representación normalizada de una entrada del usuario (búsqueda o URL).
///
/// Built once per resolution attempt via [`Query::process_input`] and
/// immutable afterwards. Plain text becomes a YouTube search; URLs are
/// classified by host; entries under the local tracks folder resolve to a
/// filesystem path.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    raw: String,
    pub is_local: bool,
    pub is_search: bool,
    pub is_youtube: bool,
    pub valid: bool,
    pub local_track_path: Option<PathBuf>,
}

const LOCAL_TRACKS_PREFIX: &str = "localtracks/";

impl Query {
    /// Normaliza la entrada cruda del usuario.
    ///
    /// `local_folder` is the root under which `localtracks/` references are
    /// resolved; without it a local reference keeps its relative path.
    pub fn process_input(raw: impl AsRef<str>, local_folder: Option<&Path>) -> Self {
        let raw = raw.as_ref().trim().to_string();

        if raw.is_empty() {
            return Self {
                raw,
                is_local: false,
                is_search: false,
                is_youtube: false,
                valid: false,
                local_track_path: None,
            };
        }

        if let Some(rest) = raw.strip_prefix(LOCAL_TRACKS_PREFIX) {
            let path = local_folder
                .map(|folder| folder.join(rest))
                .unwrap_or_else(|| PathBuf::from(&raw));
            return Self {
                raw,
                is_local: true,
                is_search: false,
                is_youtube: false,
                valid: true,
                local_track_path: Some(path),
            };
        }

        if let Ok(url) = Url::parse(&raw) {
            if url.scheme() == "file" {
                let path = url.to_file_path().ok();
                return Self {
                    raw,
                    is_local: true,
                    is_search: false,
                    is_youtube: false,
                    valid: path.is_some(),
                    local_track_path: path,
                };
            }
            let is_youtube = Self::is_youtube_host(url.host_str());
            return Self {
                raw,
                is_local: false,
                is_search: false,
                is_youtube,
                valid: true,
                local_track_path: None,
            };
        }

        // Texto plano: búsqueda de YouTube por defecto
        Self {
            raw,
            is_local: false,
            is_search: true,
            is_youtube: true,
            valid: true,
            local_track_path: None,
        }
    }

    fn is_youtube_host(host: Option<&str>) -> bool {
        matches!(
            host,
            Some("www.youtube.com")
                | Some("youtube.com")
                | Some("youtu.be")
                | Some("m.youtube.com")
                | Some("music.youtube.com")
        )
    }

    /// Entrada original tal como la escribió el usuario (recortada).
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

/// Renders the backend lookup string: search terms get the `ytsearch:`
/// prefix, everything else passes through untouched.
impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_search {
            write!(f, "ytsearch:{}", self.raw)
        } else {
            write!(f, "{}", self.raw)
        }
    }
}
