// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

use crate::{Error, Message};

/// A component receiving [`Message`]s and handling them according to their
/// delivery time.
///
/// Implemented by [`Handler`](crate::Handler) and by the recipients built on
/// top of it.
pub trait Messenger {
    /// Creates an empty message targeted at this messenger.
    fn obtain_message(&self) -> Message;

    /// Creates a message tagged `what` targeted at this messenger.
    fn obtain_message_with(&self, what: i32) -> Message;

    /// Sends a message for delivery as soon as possible.
    fn send_message(&self, msg: Message) -> Result<bool, Error>;

    /// Sends a message for delivery in `delay` milliseconds.
    fn send_message_delayed(&self, msg: Message, delay: i64)
        -> Result<bool, Error>;

    /// Sends a message that will be the next one delivered.
    fn send_message_at_front_of_queue(&self, msg: Message)
        -> Result<bool, Error>;

    /// Sends a message for delivery at `time`, in milliseconds since the
    /// UNIX epoch.
    fn send_message_at_time(&self, msg: Message, time: i64)
        -> Result<bool, Error>;
}
