// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Errors module
//!
//! Failures reported by the looper primitives. Every error is raised at the
//! offending call and never crosses threads: a message that can not be queued
//! is reported to its sender, the looper thread itself is never affected.
//!
//! Two families are distinguished:
//!
//! - **Invalid argument**: the caller handed over something unusable
//!   ([`Error::MissingTarget`], [`Error::NegativeTime`]).
//! - **Invalid state**: the call breaks the looper protocol
//!   ([`Error::LooperExists`], [`Error::NoLooper`], [`Error::NoQueue`]).
//!
//! Posting on a queue that is quitting is not an error: the send operations
//! return `Ok(false)` instead.
//!

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for the looper primitives.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum Error {
    /// The message has no target handler.
    #[error("Can't enqueue a message without target handler.")]
    MissingTarget,
    /// The resolved delivery time is negative.
    #[error("Can't send a message with negative time {0}.")]
    NegativeTime(i64),
    /// A looper was already prepared on the calling thread.
    #[error("Only one looper may be created per thread.")]
    LooperExists,
    /// No looper was prepared on the calling thread.
    #[error("No looper prepared on thread {0}.")]
    NoLooper(String),
    /// The looper a handler is bound to no longer exists.
    #[error("Posting message on a looper with no queue.")]
    NoQueue,
    /// The handler thread could not be spawned.
    #[error("Can't spawn handler thread: {0}")]
    Spawn(String),
    /// The handler thread terminated abnormally.
    #[error("Handler thread {0} panicked.")]
    Join(String),
}

impl Error {
    /// True for errors caused by an unusable argument.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Error::MissingTarget | Error::NegativeTime(_))
    }

    /// True for errors caused by a call breaking the looper protocol.
    pub fn is_invalid_state(&self) -> bool {
        matches!(
            self,
            Error::LooperExists | Error::NoLooper(_) | Error::NoQueue
        )
    }
}
