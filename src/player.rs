use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::broadcast;
use tracing::debug;

use crate::model::Track;

/// Eventos emitidos por el reproductor.
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    /// Una pista elegida por autoplay fue encolada.
    TrackAutoPlay { guild_id: u64, track: Track },
    /// El reproductor pasó de inactivo a reproducir esta pista.
    TrackStart { guild_id: u64, track: Track },
}

/// Cola de reproducción mínima sobre la que opera el selector de autoplay.
///
/// The real transport (voice connection, decoding) lives elsewhere; this type
/// only models what the resolution core needs: a queue, the current track and
/// a broadcast channel for notification events.
#[derive(Debug)]
pub struct Player {
    pub guild_id: u64,
    /// Canal de voz en el que está conectado el reproductor
    pub channel_id: u64,
    /// Canal de texto para notificaciones, si hay uno configurado
    pub notify_channel_id: Option<u64>,
    queue: Mutex<VecDeque<Track>>,
    current: Mutex<Option<Track>>,
    events: broadcast::Sender<PlayerEvent>,
}

impl Player {
    pub fn new(guild_id: u64, channel_id: u64, notify_channel_id: Option<u64>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            guild_id,
            channel_id,
            notify_channel_id,
            queue: Mutex::new(VecDeque::new()),
            current: Mutex::new(None),
            events,
        }
    }

    /// Añade una pista al final de la cola
    pub fn add(&self, track: Track) {
        debug!("➕ Encolada '{}' en guild {}", track.title, self.guild_id);
        self.queue.lock().push_back(track);
    }

    /// Pista en reproducción, si hay alguna
    pub fn current(&self) -> Option<Track> {
        self.current.lock().clone()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Si no hay nada reproduciéndose, toma la siguiente pista de la cola
    pub fn play(&self) -> Option<Track> {
        let mut current = self.current.lock();
        if current.is_some() {
            return current.clone();
        }

        let next = self.queue.lock().pop_front();
        if let Some(track) = next {
            *current = Some(track.clone());
            let _ = self.events.send(PlayerEvent::TrackStart {
                guild_id: self.guild_id,
                track: track.clone(),
            });
            return Some(track);
        }

        None
    }

    /// Emite un evento a los suscriptores (sin suscriptores no es un error)
    pub fn notify(&self, event: PlayerEvent) {
        let _ = self.events.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn track(title: &str) -> Track {
        Track {
            title: title.to_string(),
            ..Track::default()
        }
    }

    #[test]
    fn test_play_pops_queue_when_idle() {
        let player = Player::new(1, 100, None);
        player.add(track("first"));
        player.add(track("second"));

        let started = player.play().unwrap();
        assert_eq!(started.title, "first");
        assert_eq!(player.queue_len(), 1);

        // Con una pista activa, play no avanza la cola
        let same = player.play().unwrap();
        assert_eq!(same.title, "first");
        assert_eq!(player.queue_len(), 1);
    }

    #[tokio::test]
    async fn test_events_reach_subscribers() {
        let player = Player::new(1, 100, Some(50));
        let mut rx = player.subscribe();

        player.add(track("song"));
        player.play();

        match rx.recv().await.unwrap() {
            PlayerEvent::TrackStart { guild_id, track } => {
                assert_eq!(guild_id, 1);
                assert_eq!(track.title, "song");
            }
            other => panic!("evento inesperado: {other:?}"),
        }
    }
}
