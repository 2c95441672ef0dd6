// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Message
//!
//! A [`Message`] is the unit of work delivered by a [`Looper`](crate::Looper):
//! a handler-defined tag, an optional payload, the [`Handler`] it is delivered
//! to and the absolute time at which it is due.
//!
//! Each handler has its own name-space for tags, so tags of different handlers
//! never conflict. The payload is type-erased and shared between clones; the
//! receiving handler reads it back with [`Message::payload`].
//!

use crate::Handler;

use std::{any::Any, fmt, sync::Arc};

/// Shared, type-erased message payload.
pub type Payload = Arc<dyn Any + Send + Sync>;

/// A message that can be sent to a [`Handler`].
#[derive(Clone, Default)]
pub struct Message {
    /// Handler-defined tag identifying what this message is about.
    what: i32,
    /// User payload carried by the message.
    payload: Option<Payload>,
    /// Handler this message must be delivered to.
    pub(crate) target: Option<Handler>,
    /// Delivery date, in milliseconds since the UNIX epoch.
    pub(crate) when: i64,
}

impl Message {
    /// Creates an empty message, without tag, payload or target.
    pub fn obtain() -> Self {
        Self::default()
    }

    /// Sets the message tag.
    pub fn with_what(mut self, what: i32) -> Self {
        self.what = what;
        self
    }

    /// Sets the message payload.
    pub fn with_payload<T>(mut self, payload: T) -> Self
    where
        T: Any + Send + Sync,
    {
        self.payload = Some(Arc::new(payload));
        self
    }

    /// Sets a payload that is already shared.
    pub fn with_shared_payload(mut self, payload: Payload) -> Self {
        self.payload = Some(payload);
        self
    }

    pub(crate) fn with_target(mut self, target: &Handler) -> Self {
        self.target = Some(target.clone());
        self
    }

    /// The message tag.
    pub fn what(&self) -> i32 {
        self.what
    }

    /// The payload, if there is one and it is a `T`.
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload
            .as_deref()
            .and_then(|payload| payload.downcast_ref::<T>())
    }

    /// The shared payload, whatever its type.
    pub fn shared_payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    /// The handler this message is delivered to.
    pub fn target(&self) -> Option<&Handler> {
        self.target.as_ref()
    }

    /// The delivery time set when the message was enqueued.
    pub fn when(&self) -> i64 {
        self.when
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("what", &self.what)
            .field("payload", &self.payload.is_some())
            .field("target", &self.target.as_ref().map(Handler::name))
            .field("when", &self.when)
            .finish()
    }
}
