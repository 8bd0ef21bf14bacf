//! Runtime descriptors for registered record types and their indexes.
//! These are read-only once a model is registered.

pub mod entity;
pub mod index;
