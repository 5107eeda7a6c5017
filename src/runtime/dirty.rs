//! Dirty Tracker - which reactive slots changed since the last flush.
//!
//! A component's mask has two states:
//!
//! ```text
//! All ──make_dirty(i)──► Tracking([.. bit i ..]) ──flush──► All
//! ```
//!
//! `All` is the resting sentinel. It also means "every slot is dirty" when a
//! mask is handed to a patch function, which is how an imperative full
//! re-render is expressed. The first `make_dirty` of a tick leaves the
//! sentinel, enqueues the component and schedules a flush; later calls only
//! OR a bit in.
//!
//! Bits are packed 31 per `u32` word (slot `i` lives in word `i / 31`, bit
//! `i % 31`).

use smallvec::SmallVec;

use crate::component::Component;

/// Usable bits per mask word.
pub const BITS_PER_WORD: usize = 31;

/// Set of dirty slot indices.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DirtyMask {
    /// Resting sentinel; reads as "every slot dirty".
    All,
    /// Explicit set of dirty slots.
    Tracking(SmallVec<[u32; 2]>),
}

impl Default for DirtyMask {
    fn default() -> Self {
        DirtyMask::All
    }
}

impl DirtyMask {
    /// An empty tracking mask sized for `slot_count` slots.
    pub fn tracking(slot_count: usize) -> Self {
        let words = slot_count.div_ceil(BITS_PER_WORD).max(1);
        DirtyMask::Tracking(SmallVec::from_elem(0, words))
    }

    /// Tracking mask with exactly the given slots set.
    pub fn from_slots(slots: &[usize]) -> Self {
        let mut mask = DirtyMask::tracking(slots.iter().max().map_or(0, |&s| s + 1));
        for &slot in slots {
            mask.mark(slot);
        }
        mask
    }

    /// Whether this is the `All` sentinel.
    pub fn is_all(&self) -> bool {
        matches!(self, DirtyMask::All)
    }

    /// Set the bit for `slot`. No-op on the sentinel, which already covers it.
    pub fn mark(&mut self, slot: usize) {
        if let DirtyMask::Tracking(words) = self {
            let word = slot / BITS_PER_WORD;
            if word >= words.len() {
                words.resize(word + 1, 0);
            }
            words[word] |= 1 << (slot % BITS_PER_WORD);
        }
    }

    /// Whether `slot` is dirty. Always true for the sentinel.
    pub fn is_dirty(&self, slot: usize) -> bool {
        match self {
            DirtyMask::All => true,
            DirtyMask::Tracking(words) => words
                .get(slot / BITS_PER_WORD)
                .is_some_and(|&word| word & (1u32 << (slot % BITS_PER_WORD)) != 0),
        }
    }

    /// Whether any of `slots` is dirty.
    pub fn any(&self, slots: &[usize]) -> bool {
        match self {
            DirtyMask::All => true,
            DirtyMask::Tracking(_) => slots.iter().any(|&slot| self.is_dirty(slot)),
        }
    }

    /// Whether no slot is dirty. The sentinel is never empty.
    pub fn is_empty(&self) -> bool {
        match self {
            DirtyMask::All => false,
            DirtyMask::Tracking(words) => words.iter().all(|&word| word == 0),
        }
    }

    /// Raw words, or `None` for the sentinel.
    pub fn words(&self) -> Option<&[u32]> {
        match self {
            DirtyMask::All => None,
            DirtyMask::Tracking(words) => Some(words.as_slice()),
        }
    }

    /// Dirty slots in ascending order. The sentinel yields nothing; check
    /// [`DirtyMask::is_all`] first.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        let words: &[u32] = match self {
            DirtyMask::All => &[],
            DirtyMask::Tracking(words) => words.as_slice(),
        };
        words.iter().enumerate().flat_map(|(w, &word)| {
            (0..BITS_PER_WORD)
                .filter(move |&bit| word & (1u32 << bit) != 0)
                .map(move |bit| w * BITS_PER_WORD + bit)
        })
    }
}

/// Record that `slot` of `component` changed.
///
/// The first call after a flush moves the component's mask out of the
/// sentinel state, enqueues the component and schedules a flush. Marking
/// the same slot again before the flush changes nothing.
pub fn make_dirty(component: &Component, slot: usize) {
    let first_of_tick = {
        let mut dirty = component.dirty_mask_mut();
        let first = dirty.is_all();
        if first {
            *dirty = DirtyMask::tracking(component.slot_count());
        }
        dirty.mark(slot);
        first
    };

    if first_of_tick {
        let scheduler = component.runtime().scheduler().clone();
        tracing::trace!(component = component.id(), slot, "component enqueued");
        scheduler.enqueue(component.clone());
        scheduler.schedule_flush();
    }
}
