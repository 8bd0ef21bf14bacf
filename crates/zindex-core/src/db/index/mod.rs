//! Module: db::index
//! Responsibility: secondary index encoding, maintenance, and range lowering.
//! Does not own: query composition or scratch structure lifetime.

pub mod codec;
pub mod entry;
pub mod maintain;
pub mod range;
pub mod script;

#[cfg(test)]
mod tests;

pub use entry::IndexEntry;
pub use maintain::{IndexDelta, add_to_index, maintain_indexes, remove_from_index, update_index};
pub use range::{IndexRange, full_range, resolve};
pub use script::{COPY_SCORE_RANGE_LUA, EXTRACT_IDS_LUA, ScriptKind};
