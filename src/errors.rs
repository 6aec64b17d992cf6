use thiserror::Error;

/// Errores públicos del núcleo de resolución de audio.
///
/// Read/resolution failures degrade to an empty [`LoadResult`] instead of
/// raising; only the two genuinely exceptional conditions below reach the
/// caller as errors.
///
/// [`LoadResult`]: crate::model::LoadResult
#[derive(Error, Debug)]
pub enum AudioApiError {
    /// The backend signalled an unrecoverable condition while loading tracks.
    #[error("Unable to enqueue this track")]
    TrackEnqueue,

    /// Autoplay selection exhausted every candidate without an accepted pick.
    #[error("No valid entry found")]
    NoValidEntry,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Fallos reportados por el backend de resolución de pistas.
#[derive(Error, Debug)]
pub enum LoadError {
    /// Lookup produced nothing usable; the resolver continues with a failure
    /// envelope instead of propagating this.
    #[error("transient lookup failure")]
    Transient,

    /// The backend is in a state where it cannot serve this request at all.
    #[error("fatal backend failure: {0}")]
    Fatal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(AudioApiError::TrackEnqueue.to_string(), "Unable to enqueue this track");
        assert_eq!(AudioApiError::NoValidEntry.to_string(), "No valid entry found");
        assert_eq!(LoadError::Transient.to_string(), "transient lookup failure");
    }
}
