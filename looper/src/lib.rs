// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Looper
//!
//! Single-thread message scheduling. A thread owns a [`Looper`], the looper
//! owns a time-ordered message queue, and [`Handler`]s bound to the looper
//! post [`Message`]s on that queue from any thread. The looper thread pulls
//! each message once it is due and hands it back to its target handler.
//!
//! ## Overview
//!
//! - **Messages** carry a handler-defined tag, an optional payload, their
//!   target handler and an absolute delivery time in milliseconds.
//! - **The queue** keeps messages ordered by delivery time. Messages due at
//!   the same time are delivered in the order they were sent; a message sent
//!   at the front of the queue is delivered before anything else.
//! - **The looper** dispatches messages one at a time on its own thread, so
//!   handlers bound to the same looper never run concurrently.
//! - **Handlers** offer each delivered message to their [`Callback`] first,
//!   then to their [`MessageHandler`] hook.
//! - **Handler threads** spawn a thread, prepare its looper and publish it to
//!   the callers waiting in [`HandlerThread::get_looper`].
//!
//! ## Shutdown
//!
//! Quitting is cooperative: [`Looper::quit`] makes the queue refuse new
//! messages (the senders get `Ok(false)`) while everything already queued is
//! still delivered. The loop returns once the queue is empty.
//!
//! ## Getting Started
//!
//! ```ignore
//! use looper::{Handler, HandlerThread, Message};
//!
//! let thread = HandlerThread::new("worker");
//! thread.start()?;
//! let looper = thread.get_looper().expect("thread is alive");
//!
//! let handler = Handler::builder(&looper)
//!     .name("printer")
//!     .callback(|msg: &Message| {
//!         println!("got {}", msg.what());
//!         true
//!     })
//!     .build();
//!
//! handler.send_message(handler.obtain_message_with(1))?;
//! handler.send_message_delayed(handler.obtain_message_with(2), 100)?;
//!
//! thread.quit();
//! thread.join()?;
//! ```
//!

mod clock;
mod error;
mod handler;
mod handler_thread;
mod looper;
mod message;
mod messenger;
mod queue;

/// Milliseconds since the UNIX epoch, the time base of delivery times.
pub use clock::now_millis;

/// Error type for the looper primitives.
pub use error::Error;

/// Endpoint receiving messages on the thread of a looper.
pub use handler::Handler;

/// Builder for [`Handler`].
pub use handler::HandlerBuilder;

/// Callback offered every message before the handler's own hook.
pub use handler::Callback;

/// Default handling of the messages a callback did not consume.
pub use handler::MessageHandler;

/// A thread running a looper.
pub use handler_thread::HandlerThread;

/// Message loop of a thread.
pub use looper::Looper;

/// The unit of work delivered by a looper.
pub use message::Message;

/// Shared, type-erased message payload.
pub use message::Payload;

/// A component receiving messages.
pub use messenger::Messenger;
