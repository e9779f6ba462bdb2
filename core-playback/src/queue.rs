//! # Play Queue
//!
//! Ordered track list plus the current position and play-mode flags.
//!
//! The item list is an `Arc<[TrackDescriptor]>`: a queue is replaced
//! wholesale, never edited in place, so snapshots handed to controllers can
//! share it without copying.
//!
//! ## Shuffle
//!
//! Turning shuffle on draws a play order once. The order starts with the
//! current item and `next` walks it, so no track repeats before every track
//! has been visited. When the order runs out and the boundary policy wraps,
//! a fresh order is drawn that does not begin with the track that just
//! played. Turning shuffle off drops the order; playback continues in list
//! order from the current item.

use std::collections::HashSet;
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::BoundaryPolicy;
use crate::error::{PlaybackError, Result};
use crate::state::RepeatMode;
use crate::track::TrackDescriptor;

/// What happens when the current track reaches its natural end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndAction {
    /// Repeat-one: reload the same index.
    Replay(usize),
    /// Continue with the given index.
    Advance(usize),
    /// Nothing left to play.
    Finished,
}

#[derive(Debug, Clone)]
struct ShuffleOrder {
    order: Vec<usize>,
    cursor: usize,
}

impl ShuffleOrder {
    fn starting_at<R: Rng + ?Sized>(len: usize, first: usize, rng: &mut R) -> Self {
        let mut rest: Vec<usize> = (0..len).filter(|&i| i != first).collect();
        rest.shuffle(rng);

        let mut order = Vec::with_capacity(len);
        order.push(first);
        order.extend(rest);
        Self { order, cursor: 0 }
    }

    /// Fresh cycle whose first element is not `avoid` (when there is a choice).
    fn next_cycle<R: Rng + ?Sized>(len: usize, avoid: usize, rng: &mut R) -> Self {
        let mut order: Vec<usize> = (0..len).collect();
        order.shuffle(rng);
        if len > 1 && order[0] == avoid {
            let swap_with = rng.gen_range(1..len);
            order.swap(0, swap_with);
        }
        Self { order, cursor: 0 }
    }

    fn current(&self) -> usize {
        self.order[self.cursor]
    }

    fn is_last(&self) -> bool {
        self.cursor + 1 >= self.order.len()
    }
}

/// Play queue.
#[derive(Debug, Clone)]
pub struct Queue {
    items: Arc<[TrackDescriptor]>,
    current: usize,
    shuffle: Option<ShuffleOrder>,
    repeat: RepeatMode,
    boundary: BoundaryPolicy,
}

impl Queue {
    /// Build a queue positioned at `start_index`.
    ///
    /// # Errors
    ///
    /// - [`PlaybackError::EmptyQueue`] for an empty list
    /// - [`PlaybackError::StartIndexOutOfRange`] when the index is past the end
    /// - [`PlaybackError::DuplicateTrack`] when an id appears twice
    pub fn new(
        tracks: Vec<TrackDescriptor>,
        start_index: usize,
        boundary: BoundaryPolicy,
    ) -> Result<Self> {
        validate_tracks(&tracks, start_index)?;

        Ok(Self {
            items: Arc::from(tracks),
            current: start_index,
            shuffle: None,
            repeat: RepeatMode::Off,
            boundary,
        })
    }

    pub fn current(&self) -> &TrackDescriptor {
        &self.items[self.current]
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Always false for a constructed queue; present for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[TrackDescriptor] {
        &self.items
    }

    /// The item list, shared rather than copied.
    pub fn shared_items(&self) -> Arc<[TrackDescriptor]> {
        Arc::clone(&self.items)
    }

    pub fn get(&self, index: usize) -> Option<&TrackDescriptor> {
        self.items.get(index)
    }

    pub fn is_shuffled(&self) -> bool {
        self.shuffle.is_some()
    }

    pub fn repeat(&self) -> RepeatMode {
        self.repeat
    }

    pub fn boundary(&self) -> BoundaryPolicy {
        self.boundary
    }

    /// Whether both queues hold the same tracks in the same order.
    pub fn same_items(&self, other: &Queue) -> bool {
        Arc::ptr_eq(&self.items, &other.items) || self.items == other.items
    }

    /// Index `next` would move to, without drawing a new shuffle cycle.
    ///
    /// Returns `None` at a clamped boundary, or when a wrapped shuffle cycle
    /// would need a fresh draw.
    pub fn peek_next(&self) -> Option<usize> {
        match &self.shuffle {
            Some(order) if !order.is_last() => Some(order.order[order.cursor + 1]),
            Some(_) => None,
            None => self.sequential_next(),
        }
    }

    /// Index `previous` would move to.
    pub fn peek_previous(&self) -> Option<usize> {
        match &self.shuffle {
            Some(order) if order.cursor > 0 => Some(order.order[order.cursor - 1]),
            Some(order) => match self.boundary {
                BoundaryPolicy::Wrap if self.len() > 1 => order.order.last().copied(),
                _ => None,
            },
            None => self.sequential_previous(),
        }
    }

    /// Move to the next item. Returns the new index, or `None` when nothing
    /// changed (clamped boundary).
    pub fn advance_next<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<usize> {
        let len = self.len();
        let boundary = self.boundary;
        let current = self.current;

        let next = match self.shuffle.as_mut() {
            Some(order) if !order.is_last() => {
                order.cursor += 1;
                Some(order.current())
            }
            Some(order) => match boundary {
                BoundaryPolicy::Wrap => {
                    *order = ShuffleOrder::next_cycle(len, current, rng);
                    Some(order.current())
                }
                BoundaryPolicy::Clamp => None,
            },
            None => self.sequential_next(),
        };

        if let Some(index) = next {
            self.current = index;
        }
        next
    }

    /// Move to the previous item. Returns the new index, or `None` at a
    /// clamped boundary.
    pub fn advance_previous<R: Rng + ?Sized>(&mut self, _rng: &mut R) -> Option<usize> {
        let boundary = self.boundary;
        let len = self.len();

        let previous = match self.shuffle.as_mut() {
            Some(order) if order.cursor > 0 => {
                order.cursor -= 1;
                Some(order.current())
            }
            Some(order) => match boundary {
                BoundaryPolicy::Wrap if len > 1 => {
                    order.cursor = len - 1;
                    Some(order.current())
                }
                _ => None,
            },
            None => self.sequential_previous(),
        };

        if let Some(index) = previous {
            self.current = index;
        }
        previous
    }

    /// Decide what follows the natural end of the current item.
    ///
    /// Repeat-one replays the current index. With repeat off the queue
    /// finishes after the last item (or the last item of the shuffle cycle)
    /// whatever the boundary policy.
    pub fn on_track_end<R: Rng + ?Sized>(&mut self, _rng: &mut R) -> EndAction {
        if self.repeat == RepeatMode::One {
            return EndAction::Replay(self.current);
        }

        let next = match self.shuffle.as_mut() {
            Some(order) if !order.is_last() => {
                order.cursor += 1;
                Some(order.current())
            }
            Some(_) => None,
            None if self.current + 1 < self.items.len() => Some(self.current + 1),
            None => None,
        };

        match next {
            Some(index) => {
                self.current = index;
                EndAction::Advance(index)
            }
            None => EndAction::Finished,
        }
    }

    /// Turn shuffle on or off. Returns whether anything changed.
    pub fn set_shuffle<R: Rng + ?Sized>(&mut self, enabled: bool, rng: &mut R) -> bool {
        match (enabled, self.shuffle.is_some()) {
            (true, false) => {
                self.shuffle = Some(ShuffleOrder::starting_at(self.len(), self.current, rng));
                true
            }
            (false, true) => {
                self.shuffle = None;
                true
            }
            _ => false,
        }
    }

    /// Returns whether the mode changed.
    pub fn set_repeat(&mut self, mode: RepeatMode) -> bool {
        let changed = self.repeat != mode;
        self.repeat = mode;
        changed
    }

    fn sequential_next(&self) -> Option<usize> {
        let len = self.len();
        if self.current + 1 < len {
            return Some(self.current + 1);
        }
        match self.boundary {
            BoundaryPolicy::Wrap => Some(0),
            BoundaryPolicy::Clamp => None,
        }
    }

    fn sequential_previous(&self) -> Option<usize> {
        if self.current > 0 {
            return Some(self.current - 1);
        }
        match self.boundary {
            BoundaryPolicy::Wrap => Some(self.len() - 1),
            BoundaryPolicy::Clamp => None,
        }
    }
}

/// Check a start request without building a queue.
pub fn validate_tracks(tracks: &[TrackDescriptor], start_index: usize) -> Result<()> {
    if tracks.is_empty() {
        return Err(PlaybackError::EmptyQueue);
    }
    if start_index >= tracks.len() {
        return Err(PlaybackError::StartIndexOutOfRange {
            index: start_index,
            len: tracks.len(),
        });
    }

    let mut seen = HashSet::with_capacity(tracks.len());
    for track in tracks {
        if !seen.insert(track.id()) {
            return Err(PlaybackError::DuplicateTrack(track.id().to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn tracks(n: usize) -> Vec<TrackDescriptor> {
        (0..n)
            .map(|i| {
                TrackDescriptor::remote(
                    format!("t{i}"),
                    format!("Track {i}"),
                    "Band",
                    format!("https://cdn/{i}.mp3"),
                )
                .unwrap()
            })
            .collect()
    }

    #[test]
    fn rejects_invalid_start_requests() {
        assert!(matches!(
            Queue::new(Vec::new(), 0, BoundaryPolicy::Wrap),
            Err(PlaybackError::EmptyQueue)
        ));
        assert!(matches!(
            Queue::new(tracks(2), 2, BoundaryPolicy::Wrap),
            Err(PlaybackError::StartIndexOutOfRange { index: 2, len: 2 })
        ));

        let mut dup = tracks(2);
        dup.push(dup[0].clone());
        assert!(matches!(
            Queue::new(dup, 0, BoundaryPolicy::Wrap),
            Err(PlaybackError::DuplicateTrack(id)) if id == "t0"
        ));
    }

    #[test]
    fn peek_matches_advance_in_order() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut queue = Queue::new(tracks(3), 2, BoundaryPolicy::Wrap).unwrap();

        assert_eq!(queue.peek_next(), Some(0));
        assert_eq!(queue.peek_previous(), Some(1));
        assert_eq!(queue.advance_next(&mut rng), Some(0));
        assert_eq!(queue.current().id().as_str(), "t0");
    }

    #[test]
    fn shuffle_order_starts_with_current() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut queue = Queue::new(tracks(5), 3, BoundaryPolicy::Wrap).unwrap();

        assert!(queue.set_shuffle(true, &mut rng));
        assert!(!queue.set_shuffle(true, &mut rng));
        assert_eq!(queue.current_index(), 3);
        assert_ne!(queue.peek_next(), Some(3));
    }

    #[test]
    fn fresh_cycle_avoids_immediate_repeat() {
        let mut rng = StdRng::seed_from_u64(11);
        for len in 2..6 {
            for avoid in 0..len {
                let order = ShuffleOrder::next_cycle(len, avoid, &mut rng);
                assert_ne!(order.current(), avoid);
                let mut sorted = order.order.clone();
                sorted.sort_unstable();
                assert_eq!(sorted, (0..len).collect::<Vec<_>>());
            }
        }
    }

    #[test]
    fn single_item_queue_wraps_to_itself() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut queue = Queue::new(tracks(1), 0, BoundaryPolicy::Wrap).unwrap();
        assert_eq!(queue.advance_next(&mut rng), Some(0));
        assert_eq!(queue.on_track_end(&mut rng), EndAction::Finished);
    }
}
