//! # Learned — Recursive Model Index over sorted integer keys
//!
//! A learned index replaces the comparison tree of a classical index with a
//! model of the key distribution: given a key, the model predicts where in
//! the sorted array that key should live. Because the model is approximate,
//! the index also records the worst over- and under-shoot observed during
//! training; a lookup searches only the window
//! `[prediction + min_error, prediction + max_error]`, which is guaranteed
//! to contain the key if it exists.
//!
//! ```text
//!             key
//!              │
//!      ┌───────▼────────┐   layer 1: range partition into F buckets
//!      │ (k−min)/(max−min)·F │
//!      └───────┬────────┘
//!              ▼
//!      ┌────────────────┐   layer 2: per-bucket least-squares line
//!      │ slope·k + b    │
//!      └───────┬────────┘
//!              ▼
//!    predicted position ± observed error ──► short scan / binary search
//! ```
//!
//! The shard engine builds one [`LearnedIndex`] per shard after every
//! compaction and persists it beside the SSTables; see [`LearnedIndex::save`]
//! for the on-disk layout.

mod index;
mod linear;
mod rmi;

pub use index::{DiagnosticPoint, LearnedError, LearnedIndex, Record};
pub use linear::LinearModel;
pub use rmi::RmiModel;

#[cfg(test)]
mod tests;
