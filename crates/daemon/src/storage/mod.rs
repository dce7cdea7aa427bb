// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage layer: the single source of truth for runtime state.
//!
//! One lock, one JSON file. Every component funnels writes through
//! [`StateStore`]'s atomic mutators; saves are trailing-debounced and always
//! go through write-temp-and-rename.

mod persist;
mod state;
mod store;

pub use persist::{load_state, write_state, StorageError, CURRENT_STATE_VERSION};
pub use state::PersistedState;
pub use store::StateStore;
