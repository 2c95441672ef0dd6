// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Handlers
//!
//! A [`Handler`] is an addressable endpoint bound to one [`Looper`]. It builds
//! messages targeted at itself and posts them on the queue of its looper; the
//! looper thread later hands each message back to the handler.
//!
//! On delivery, the optional [`Callback`] is offered the message first. When
//! it is absent or declines the message, the optional [`MessageHandler`] hook
//! receives it. A handler with neither simply drops its messages.
//!

use crate::{clock, Error, Looper, Message, Messenger};

use tracing::{debug, trace};

use std::{
    fmt,
    sync::{Arc, Weak},
};

/// Callback offered every message before the handler's own hook.
pub trait Callback: Send + Sync {
    /// Called when a message is delivered to the handler.
    ///
    /// # Arguments
    ///
    /// * `msg` - The delivered message.
    ///
    /// # Returns
    ///
    /// Returns true when no further handling is desired.
    ///
    fn handle_message(&self, msg: &Message) -> bool;
}

impl<F> Callback for F
where
    F: Fn(&Message) -> bool + Send + Sync,
{
    fn handle_message(&self, msg: &Message) -> bool {
        self(msg)
    }
}

/// Default handling of the messages a [`Callback`] did not consume.
///
/// This is the extension point of more specific recipients: a state machine,
/// for instance, drives its states from here.
pub trait MessageHandler: Send + Sync {
    /// Handles a message delivered to `handler`.
    ///
    /// # Arguments
    ///
    /// * `handler` - The handler the message was delivered to.
    /// * `msg` - The delivered message.
    ///
    fn handle_message(&self, handler: &Handler, msg: Message);
}

/// Shared part of a handler and its clones.
struct HandlerInner {
    /// Name used in logs.
    name: String,
    /// The looper (thread) behind this handler.
    looper: Weak<Looper>,
    /// Offered every message first.
    callback: Option<Box<dyn Callback>>,
    /// Receives what the callback declined.
    message_handler: Option<Arc<dyn MessageHandler>>,
}

/// Endpoint receiving messages on the thread of a [`Looper`].
///
/// Cloning a handler is cheap; clones are the same recipient.
#[derive(Clone)]
pub struct Handler {
    inner: Arc<HandlerInner>,
}

impl Handler {
    /// Creates a handler without callback nor hook on `looper`.
    pub fn new(looper: &Arc<Looper>) -> Self {
        Self::builder(looper).build()
    }

    /// Starts building a handler bound to `looper`.
    pub fn builder(looper: &Arc<Looper>) -> HandlerBuilder {
        HandlerBuilder::new(Arc::downgrade(looper))
    }

    /// A handler bound to no looper at all.
    #[cfg(test)]
    pub(crate) fn detached(name: &str) -> Self {
        HandlerBuilder::new(Weak::new()).name(name).build()
    }

    /// Name of this handler.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The looper this handler posts on, while it exists.
    pub fn looper(&self) -> Option<Arc<Looper>> {
        self.inner.looper.upgrade()
    }

    /// Creates an empty message targeted at this handler.
    pub fn obtain_message(&self) -> Message {
        Message::obtain().with_target(self)
    }

    /// Creates a message tagged `what` targeted at this handler.
    pub fn obtain_message_with(&self, what: i32) -> Message {
        self.obtain_message().with_what(what)
    }

    /// Sends a message to be delivered as soon as possible, after the
    /// messages already due.
    ///
    /// # Errors
    ///
    /// See [`Handler::send_message_at_time`].
    ///
    pub fn send_message(&self, msg: Message) -> Result<bool, Error> {
        self.send_message_delayed(msg, 0)
    }

    /// Sends a message to be delivered in `delay` milliseconds.
    ///
    /// # Errors
    ///
    /// See [`Handler::send_message_at_time`].
    ///
    pub fn send_message_delayed(
        &self,
        msg: Message,
        delay: i64,
    ) -> Result<bool, Error> {
        self.send_message_at_time(msg, clock::now_millis().saturating_add(delay))
    }

    /// Sends a message to be delivered before every other pending message.
    ///
    /// # Errors
    ///
    /// See [`Handler::send_message_at_time`].
    ///
    pub fn send_message_at_front_of_queue(
        &self,
        msg: Message,
    ) -> Result<bool, Error> {
        self.send_message_at_time(msg, 0)
    }

    /// Sends a message to be delivered at `time`, in milliseconds since the
    /// UNIX epoch. A time in the past is delivered as soon as possible.
    ///
    /// # Arguments
    ///
    /// * `msg` - The message to deliver.
    /// * `time` - Absolute delivery time, `0` meaning front of queue.
    ///
    /// # Returns
    ///
    /// Returns `Ok(true)` when the message was queued, `Ok(false)` when the
    /// looper is quitting and refused it.
    ///
    /// # Errors
    ///
    /// * [`Error::NegativeTime`] if `time` is negative.
    /// * [`Error::NoQueue`] if the looper of this handler is gone.
    /// * [`Error::MissingTarget`] if the message has no target.
    ///
    pub fn send_message_at_time(
        &self,
        msg: Message,
        time: i64,
    ) -> Result<bool, Error> {
        if time < 0 {
            return Err(Error::NegativeTime(time));
        }

        let looper = self.looper().ok_or(Error::NoQueue)?;
        trace!("Handler {} posting message {}.", self.name(), msg.what());
        looper.queue().enqueue(msg, time)
    }

    /// True if a message for this handler is pending.
    pub fn has_messages(&self) -> bool {
        self.looper()
            .is_some_and(|looper| looper.queue().has_messages(self))
    }

    /// True if a message for this handler tagged `what` is pending.
    pub fn has_messages_with(&self, what: i32) -> bool {
        self.looper()
            .is_some_and(|looper| looper.queue().has_messages_with(self, what))
    }

    /// Drops every pending message for this handler.
    ///
    /// # Returns
    ///
    /// Returns how many messages were dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoQueue`] if the looper of this handler is gone.
    ///
    pub fn remove_messages(&self) -> Result<usize, Error> {
        let looper = self.looper().ok_or(Error::NoQueue)?;
        Ok(looper.queue().remove_messages(self))
    }

    /// Drops every pending message for this handler tagged `what`.
    ///
    /// # Returns
    ///
    /// Returns how many messages were dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoQueue`] if the looper of this handler is gone.
    ///
    pub fn remove_messages_with(&self, what: i32) -> Result<usize, Error> {
        let looper = self.looper().ok_or(Error::NoQueue)?;
        Ok(looper.queue().remove_messages_with(self, what))
    }

    /// Hands a delivered message to the callback, then to the hook.
    pub(crate) fn dispatch_message(&self, msg: Message) {
        if let Some(callback) = &self.inner.callback {
            if callback.handle_message(&msg) {
                return;
            }
        }

        match &self.inner.message_handler {
            Some(message_handler) => message_handler.handle_message(self, msg),
            None => trace!(
                "Handler {} has no hook for message {}.",
                self.name(),
                msg.what()
            ),
        }
    }
}

impl Messenger for Handler {
    fn obtain_message(&self) -> Message {
        Handler::obtain_message(self)
    }

    fn obtain_message_with(&self, what: i32) -> Message {
        Handler::obtain_message_with(self, what)
    }

    fn send_message(&self, msg: Message) -> Result<bool, Error> {
        Handler::send_message(self, msg)
    }

    fn send_message_delayed(
        &self,
        msg: Message,
        delay: i64,
    ) -> Result<bool, Error> {
        Handler::send_message_delayed(self, msg, delay)
    }

    fn send_message_at_front_of_queue(
        &self,
        msg: Message,
    ) -> Result<bool, Error> {
        Handler::send_message_at_front_of_queue(self, msg)
    }

    fn send_message_at_time(
        &self,
        msg: Message,
        time: i64,
    ) -> Result<bool, Error> {
        Handler::send_message_at_time(self, msg, time)
    }
}

/// Handlers are the same recipient when they share their inner state.
impl PartialEq for Handler {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Handler {}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("name", &self.inner.name)
            .field("bound", &(self.inner.looper.strong_count() > 0))
            .finish()
    }
}

/// Builder for [`Handler`].
pub struct HandlerBuilder {
    name: String,
    looper: Weak<Looper>,
    callback: Option<Box<dyn Callback>>,
    message_handler: Option<Arc<dyn MessageHandler>>,
}

impl HandlerBuilder {
    fn new(looper: Weak<Looper>) -> Self {
        Self {
            name: "handler".to_owned(),
            looper,
            callback: None,
            message_handler: None,
        }
    }

    /// Name used in logs.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Callback offered every message first.
    pub fn callback(mut self, callback: impl Callback + 'static) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }

    /// Hook receiving the messages the callback declined.
    pub fn message_handler(
        mut self,
        message_handler: Arc<dyn MessageHandler>,
    ) -> Self {
        self.message_handler = Some(message_handler);
        self
    }

    /// Creates the handler.
    pub fn build(self) -> Handler {
        debug!("Creating new handler {}.", self.name);
        Handler {
            inner: Arc::new(HandlerInner {
                name: self.name,
                looper: self.looper,
                callback: self.callback,
                message_handler: self.message_handler,
            }),
        }
    }
}
