// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket endpoints: the dashboard broadcast channel and the per-session
//! terminal channel.

mod dashboard;
mod terminal;

pub use dashboard::Broadcaster;
pub use terminal::{handle_terminal_ws, TerminalRegistry};
