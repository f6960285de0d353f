//! Player queue navigation model
//!
//! Mirrors the behaviour clients implement on top of `/api/player/queue`:
//! a play queue with a current position, repeat modes and shuffle that can
//! be turned off again without losing the original order.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Repeat behaviour when a track ends or the queue runs out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Stop after the last track
    #[default]
    None,
    /// Wrap around to the first track
    All,
    /// Replay the current track when it ends
    Once,
}

impl RepeatMode {
    /// Next mode in the none -> all -> once cycle
    pub fn cycle(self) -> Self {
        match self {
            RepeatMode::None => RepeatMode::All,
            RepeatMode::All => RepeatMode::Once,
            RepeatMode::Once => RepeatMode::None,
        }
    }
}

/// Play queue with a cursor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayQueue<T> {
    queue: Vec<T>,
    original_queue: Vec<T>,
    current_index: Option<usize>,
    repeat: RepeatMode,
    shuffled: bool,
}

impl<T> Default for PlayQueue<T> {
    fn default() -> Self {
        Self {
            queue: Vec::new(),
            original_queue: Vec::new(),
            current_index: None,
            repeat: RepeatMode::None,
            shuffled: false,
        }
    }
}

impl<T: Clone + PartialEq> PlayQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[T] {
        &self.queue
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn current(&self) -> Option<&T> {
        self.current_index.and_then(|i| self.queue.get(i))
    }

    pub fn repeat(&self) -> RepeatMode {
        self.repeat
    }

    pub fn set_repeat(&mut self, mode: RepeatMode) {
        self.repeat = mode;
    }

    pub fn cycle_repeat(&mut self) -> RepeatMode {
        self.repeat = self.repeat.cycle();
        self.repeat
    }

    pub fn is_shuffled(&self) -> bool {
        self.shuffled
    }

    /// Replace the queue; the cursor points at `start` if it is present
    pub fn set_queue(&mut self, items: Vec<T>, start: Option<&T>) {
        self.current_index = start.and_then(|s| items.iter().position(|i| i == s));
        self.original_queue = items.clone();
        self.queue = items;
    }

    /// Move the cursor to a track already in the queue
    pub fn play(&mut self, item: &T) -> Option<&T> {
        self.current_index = self.queue.iter().position(|i| i == item);
        self.current()
    }

    /// Advance to the next track
    ///
    /// `is_auto` marks a transition triggered by the end of a track, which
    /// repeats the current track in [`RepeatMode::Once`]. Returns `None`
    /// when playback should stop.
    pub fn next(&mut self, is_auto: bool) -> Option<&T> {
        if self.queue.is_empty() {
            return None;
        }

        if is_auto && self.repeat == RepeatMode::Once && self.current_index.is_some() {
            return self.current();
        }

        let next = self.current_index.map_or(0, |i| i + 1);
        if next >= self.queue.len() {
            if self.repeat != RepeatMode::All {
                return None;
            }
            self.current_index = Some(0);
        } else {
            self.current_index = Some(next);
        }
        self.current()
    }

    /// Step back one track (wraps only in [`RepeatMode::All`])
    pub fn previous(&mut self) -> Option<&T> {
        if self.queue.is_empty() {
            return None;
        }

        let prev = match self.current_index {
            Some(i) if i > 0 => i - 1,
            _ if self.repeat == RepeatMode::All => self.queue.len() - 1,
            _ => 0,
        };
        self.current_index = Some(prev);
        self.current()
    }

    /// Called when the current track finishes playing
    pub fn on_track_ended(&mut self) -> Option<&T> {
        if self.repeat == RepeatMode::Once {
            return self.current();
        }
        self.next(true)
    }

    /// Append to the end of the queue
    pub fn push(&mut self, item: T) {
        self.original_queue.push(item.clone());
        self.queue.push(item);
    }

    /// Insert right after the current track
    pub fn add_next(&mut self, item: T) {
        let at = self.current_index.map_or(0, |i| i + 1).min(self.queue.len());
        self.original_queue.push(item.clone());
        self.queue.insert(at, item);
    }

    /// Remove the first occurrence of `item`, keeping the cursor on the same track
    pub fn remove(&mut self, item: &T) -> bool {
        let Some(target) = self.queue.iter().position(|i| i == item) else {
            return false;
        };

        self.queue.remove(target);
        self.original_queue.retain(|i| i != item);

        self.current_index = match self.current_index {
            _ if self.queue.is_empty() => None,
            Some(current) if target < current => Some(current - 1),
            Some(current) if target == current => Some(current.min(self.queue.len() - 1)),
            other => other,
        };
        true
    }

    /// Move a track within the queue (drag and drop)
    pub fn move_item(&mut self, from: usize, to: usize) {
        if from >= self.queue.len() || to >= self.queue.len() || from == to {
            return;
        }

        let item = self.queue.remove(from);
        self.queue.insert(to, item);

        if let Some(current) = self.current_index {
            self.current_index = Some(if current == from {
                to
            } else if current > from && current <= to {
                current - 1
            } else if current < from && current >= to {
                current + 1
            } else {
                current
            });
        }
    }

    /// Turn shuffle on or off
    ///
    /// Shuffling keeps the current track first. Turning shuffle off restores
    /// the original order and re-locates the current track.
    pub fn set_shuffle<R: Rng + ?Sized>(&mut self, enabled: bool, rng: &mut R) {
        let current = self.current().cloned();

        if enabled {
            let mut shuffled: Vec<T> = self
                .original_queue
                .iter()
                .filter(|i| Some(*i) != current.as_ref())
                .cloned()
                .collect();
            shuffled.shuffle(rng);

            if let Some(current) = current {
                shuffled.insert(0, current);
                self.current_index = Some(0);
            } else {
                self.current_index = None;
            }
            self.queue = shuffled;
        } else {
            self.queue = self.original_queue.clone();
            self.current_index =
                current.and_then(|c| self.original_queue.iter().position(|i| *i == c));
        }

        self.shuffled = enabled;
    }

    pub fn toggle_shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let enabled = !self.shuffled;
        self.set_shuffle(enabled, rng);
    }

    /// Empty the queue, optionally keeping the current track
    pub fn clear(&mut self, keep_current: bool) {
        match self.current().cloned() {
            Some(current) if keep_current => {
                self.queue = vec![current.clone()];
                self.original_queue = vec![current];
                self.current_index = Some(0);
            }
            _ => {
                self.queue.clear();
                self.original_queue.clear();
                self.current_index = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn queue_of(items: &[u32], start: Option<u32>) -> PlayQueue<u32> {
        let mut q = PlayQueue::new();
        q.set_queue(items.to_vec(), start.as_ref());
        q
    }

    #[test]
    fn test_repeat_cycle() {
        assert_eq!(RepeatMode::None.cycle(), RepeatMode::All);
        assert_eq!(RepeatMode::All.cycle(), RepeatMode::Once);
        assert_eq!(RepeatMode::Once.cycle(), RepeatMode::None);
    }

    #[test]
    fn test_set_queue_positions_cursor() {
        let q = queue_of(&[1, 2, 3], Some(2));
        assert_eq!(q.current_index(), Some(1));

        let q = queue_of(&[1, 2, 3], Some(9));
        assert_eq!(q.current_index(), None);
    }

    #[test]
    fn test_next_stops_at_end_without_repeat() {
        let mut q = queue_of(&[1, 2], Some(2));
        assert_eq!(q.next(false), None);
        assert_eq!(q.current(), Some(&2));
    }

    #[test]
    fn test_next_wraps_with_repeat_all() {
        let mut q = queue_of(&[1, 2], Some(2));
        q.set_repeat(RepeatMode::All);
        assert_eq!(q.next(false), Some(&1));
    }

    #[test]
    fn test_repeat_once_only_affects_automatic_advance() {
        let mut q = queue_of(&[1, 2, 3], Some(1));
        q.set_repeat(RepeatMode::Once);

        assert_eq!(q.next(true), Some(&1));
        assert_eq!(q.on_track_ended(), Some(&1));
        assert_eq!(q.next(false), Some(&2));
    }

    #[test]
    fn test_next_from_no_cursor_starts_at_first() {
        let mut q = queue_of(&[5, 6], None);
        assert_eq!(q.next(false), Some(&5));
    }

    #[test]
    fn test_previous_clamps_or_wraps() {
        let mut q = queue_of(&[1, 2, 3], Some(1));
        assert_eq!(q.previous(), Some(&1));

        q.set_repeat(RepeatMode::All);
        assert_eq!(q.previous(), Some(&3));
    }

    #[test]
    fn test_add_next_inserts_after_current() {
        let mut q = queue_of(&[1, 2, 3], Some(1));
        q.add_next(9);
        assert_eq!(q.items(), &[1, 9, 2, 3]);
        assert_eq!(q.next(false), Some(&9));
    }

    #[test]
    fn test_remove_adjusts_cursor() {
        let mut q = queue_of(&[1, 2, 3, 4], Some(3));

        assert!(q.remove(&1));
        assert_eq!(q.current(), Some(&3));

        assert!(q.remove(&4));
        assert_eq!(q.current(), Some(&3));

        // Removing the current (last) track clamps to the new last item
        assert!(q.remove(&3));
        assert_eq!(q.current(), Some(&2));

        assert!(q.remove(&2));
        assert_eq!(q.current_index(), None);
        assert!(!q.remove(&2));
    }

    #[test]
    fn test_move_item_follows_current_track() {
        let mut q = queue_of(&[1, 2, 3, 4], Some(3));

        q.move_item(2, 0);
        assert_eq!(q.items(), &[3, 1, 2, 4]);
        assert_eq!(q.current(), Some(&3));

        q.move_item(1, 3);
        assert_eq!(q.items(), &[3, 2, 4, 1]);
        assert_eq!(q.current(), Some(&3));

        q.move_item(3, 0);
        assert_eq!(q.items(), &[1, 3, 2, 4]);
        assert_eq!(q.current(), Some(&3));
    }

    #[test]
    fn test_shuffle_keeps_current_first_and_restores_order() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut q = queue_of(&[1, 2, 3, 4, 5, 6], Some(4));

        q.toggle_shuffle(&mut rng);
        assert!(q.is_shuffled());
        assert_eq!(q.current_index(), Some(0));
        assert_eq!(q.current(), Some(&4));

        let mut sorted = q.items().to_vec();
        sorted.sort();
        assert_eq!(sorted, vec![1, 2, 3, 4, 5, 6]);

        q.next(false);
        let playing = *q.current().unwrap();

        q.toggle_shuffle(&mut rng);
        assert!(!q.is_shuffled());
        assert_eq!(q.items(), &[1, 2, 3, 4, 5, 6]);
        assert_eq!(q.current(), Some(&playing));
    }

    #[test]
    fn test_clear_keeps_current() {
        let mut q = queue_of(&[1, 2, 3], Some(2));
        q.clear(true);
        assert_eq!(q.items(), &[2]);
        assert_eq!(q.current_index(), Some(0));

        q.clear(false);
        assert!(q.is_empty());
        assert_eq!(q.current(), None);
    }
}
