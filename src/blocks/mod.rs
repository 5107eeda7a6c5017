//! Blocks - rendered units managed as a group.
//!
//! - [`keyed`] - keyed lists reconciled against new item sequences

pub mod keyed;

pub use keyed::{
    validate_keys, BlockKey, BlockRef, KeyedBlock, KeyedItem, KeyedList, ReconcileOutcome,
};
