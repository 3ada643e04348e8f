use std::collections::VecDeque;
use tracing::{debug, info};

use crate::sources::SongDescriptor;

/// Capacidad por defecto de la cola de cada guild
pub const DEFAULT_CAPACITY: usize = 50;

/// Cola FIFO acotada de canciones pendientes; la canción actual nunca está en ella
#[derive(Debug)]
pub struct SongQueue {
    items: VecDeque<SongDescriptor>,
    capacity: usize,
}

impl SongQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Agrega un track al final; si la cola está llena lo devuelve intacto
    pub fn push(&mut self, song: SongDescriptor) -> Result<(), SongDescriptor> {
        if self.is_full() {
            debug!("🚫 Cola llena, rechazado: {}", song.title());
            return Err(song);
        }
        info!("➕ Agregado a la cola: {}", song.title());
        self.items.push_back(song);
        Ok(())
    }

    /// Agrega varios tracks en orden; devuelve los que no cupieron
    pub fn extend(&mut self, songs: Vec<SongDescriptor>) -> Vec<SongDescriptor> {
        let mut rejected = Vec::new();
        for song in songs {
            if let Err(song) = self.push(song) {
                rejected.push(song);
            }
        }
        rejected
    }

    /// Obtiene el siguiente track (FIFO)
    pub fn pop(&mut self) -> Option<SongDescriptor> {
        self.items.pop_front()
    }

    /// Elimina un track por posición 1-based
    pub fn remove(&mut self, position: usize) -> Option<SongDescriptor> {
        if position == 0 {
            return None;
        }
        let removed = self.items.remove(position - 1);
        if let Some(song) = &removed {
            debug!("❌ Track eliminado en posición {}: {}", position, song.title());
        }
        removed
    }

    /// Limpia la cola
    pub fn clear(&mut self) {
        self.items.clear();
        info!("🗑️ Cola limpiada");
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &SongDescriptor> {
        self.items.iter()
    }
}

impl Default for SongQueue {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serenity::model::id::UserId;

    fn song(n: usize) -> SongDescriptor {
        SongDescriptor::flat(
            Some(format!("song {n}")),
            Some(format!("https://www.youtube.com/watch?v={n}")),
            UserId::new(1),
        )
    }

    fn titles(queue: &SongQueue) -> Vec<String> {
        queue.iter().map(|s| s.title().to_string()).collect()
    }

    #[test]
    fn test_fifty_first_item_is_rejected() {
        let mut queue = SongQueue::default();
        let rejected = queue.extend((1..=51).map(song).collect());

        assert_eq!(queue.len(), 50);
        assert!(queue.is_full());
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].title(), "song 51");
        let expected: Vec<String> = (1..=50).map(|n| format!("song {n}")).collect();
        assert_eq!(titles(&queue), expected);

        assert_eq!(queue.push(song(52)).unwrap_err().title(), "song 52");
        assert_eq!(queue.len(), 50);
    }

    #[test]
    fn test_pop_is_fifo() {
        let mut queue = SongQueue::new(3);
        queue.extend(vec![song(1), song(2)]);
        assert_eq!(queue.pop().unwrap().title(), "song 1");
        assert_eq!(queue.pop().unwrap().title(), "song 2");
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_remove_is_one_based_and_keeps_order() {
        let mut queue = SongQueue::default();
        queue.extend((1..=4).map(song).collect());

        assert_eq!(queue.remove(2).unwrap().title(), "song 2");
        assert_eq!(titles(&queue), vec!["song 1", "song 3", "song 4"]);

        assert!(queue.remove(0).is_none());
        assert!(queue.remove(4).is_none());
        assert_eq!(queue.len(), 3);
    }
}
