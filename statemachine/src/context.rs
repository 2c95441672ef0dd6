// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! What a state may do to its machine while one of its hooks runs.

use crate::Error;

use looper::{Handler, Message};
use tracing::trace;

use std::collections::HashMap;

/// Transition and deferral surface handed to the hooks of a
/// [`State`](crate::State).
///
/// A context only exists while a hook runs on the looper thread of the
/// machine, which is what restricts transitions and deferrals to states.
pub struct Context<'a> {
    handler: &'a Handler,
    index: &'a HashMap<String, usize>,
    pending: &'a mut Option<usize>,
    deferred: &'a mut Vec<Message>,
}

impl<'a> Context<'a> {
    pub(crate) fn new(
        handler: &'a Handler,
        index: &'a HashMap<String, usize>,
        pending: &'a mut Option<usize>,
        deferred: &'a mut Vec<Message>,
    ) -> Self {
        Self {
            handler,
            index,
            pending,
            deferred,
        }
    }

    /// Tells the machine the state to reach once the current message is
    /// handled. The last request wins.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownState`] if no state was added as `state`.
    ///
    pub fn transition_to(&mut self, state: &str) -> Result<(), Error> {
        let target = self
            .index
            .get(state)
            .copied()
            .ok_or_else(|| Error::UnknownState(state.to_owned()))?;
        trace!("Transition to {} requested.", state);
        *self.pending = Some(target);
        Ok(())
    }

    /// Saves a copy of `msg` to be handled again after the next transition.
    ///
    /// Deferred messages are put back at the front of the queue, oldest
    /// first, ahead of every other pending message.
    pub fn defer_message(&mut self, msg: &Message) {
        trace!("Deferring message {}.", msg.what());
        self.deferred.push(msg.clone());
    }

    /// The handler of the machine, to post messages to it.
    pub fn handler(&self) -> &Handler {
        self.handler
    }

    /// Creates a message tagged `what` for the machine.
    pub fn obtain_message_with(&self, what: i32) -> Message {
        self.handler.obtain_message_with(what)
    }

    /// Sends a message to the machine.
    ///
    /// # Errors
    ///
    /// Returns the [`looper::Error`] of [`Handler::send_message`].
    ///
    pub fn send_message(&self, msg: Message) -> Result<bool, looper::Error> {
        self.handler.send_message(msg)
    }
}
