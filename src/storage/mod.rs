//! Storage is organized through [cache::LocalCache] over a [kv::KeyValueStore].
//! The basic idea is:
//!   - Every collection (tasks, habits, notes, ...) lives under one key.
//!   - A key is a JSON file in the `store` directory, read and written as a whole.
//!   - Unreadable data is discarded instead of failing the caller.

pub mod cache;
pub mod entities;
pub mod kv;
