// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # State machine error types
//!
//! Building a machine or requesting a transition with a state name the machine
//! does not know is a programming error, reported at the offending call. Errors
//! raised by the underlying looper while posting messages are wrapped in
//! [`Error::Looper`].
//!

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for the state machine.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum Error {
    /// A state with this name was already added.
    #[error("State {0} already added.")]
    StateExists(String),
    /// No state with this name was added.
    #[error("State {0} not added.")]
    UnknownState(String),
    /// The machine was started without initial state.
    #[error("No initial state defined.")]
    NoInitialState,
    /// The looper refused an operation.
    #[error("Looper error: {0}")]
    Looper(#[from] looper::Error),
}
