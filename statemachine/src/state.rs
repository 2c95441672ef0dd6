// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! States of a [`StateMachine`](crate::StateMachine).

use crate::Context;

use looper::Message;

/// Behaviour of one state of a [`StateMachine`](crate::StateMachine).
///
/// Every hook runs on the looper thread of the machine, one at a time. The
/// [`Context`] lets a hook request a transition or defer a message.
pub trait State: Send + 'static {
    /// Called when the machine enters this state.
    fn enter(&mut self, _ctx: &mut Context<'_>) {}

    /// Called when the machine leaves this state.
    fn exit(&mut self, _ctx: &mut Context<'_>) {}

    /// Lets this state handle a message.
    ///
    /// # Arguments
    ///
    /// * `msg` - The message to process.
    /// * `ctx` - Transition and deferral surface of the machine.
    ///
    /// # Returns
    ///
    /// Returns true if the message has been handled, false to offer it to the
    /// parent state.
    ///
    fn process_message(&mut self, msg: &Message, ctx: &mut Context<'_>) -> bool;
}
