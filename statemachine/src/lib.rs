// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! State machine module.
//!
//! This module contains a hierarchical state machine running on a
//! [`looper::Looper`].
//!

mod context;
mod error;
mod machine;
mod node;
mod state;

pub use context::Context;
pub use error::Error;
pub use machine::StateMachine;
pub use state::State;

pub use looper::Messenger;
