// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Looper
//!
//! A [`Looper`] runs the message loop of one thread: it pulls due messages
//! out of its queue and dispatches each of them to its target [`Handler`],
//! sequentially, on the thread that called [`Looper::run`].
//!
//! There is at most one looper per thread. It is created by
//! [`Looper::prepare`], which registers it in a per-thread slot, and found
//! again with [`Looper::my_looper`].
//!
//! ```ignore
//! use looper::{Handler, Looper};
//!
//! let looper = Looper::prepare()?;
//! let handler = Handler::new(&looper);
//! handler.send_message(handler.obtain_message_with(1))?;
//! looper.quit();
//! // Delivers the pending message, then returns.
//! Looper::run()?;
//! ```
//!

use crate::{queue::MessageQueue, Error};

use tracing::debug;

use std::{
    cell::RefCell,
    sync::Arc,
    thread::{self, ThreadId},
};

thread_local! {
    /// Looper prepared on this thread, if any.
    static LOCAL_LOOPER: RefCell<Option<Arc<Looper>>> = const { RefCell::new(None) };
}

/// Message loop of a thread.
pub struct Looper {
    /// Messages waiting to be dispatched on this looper.
    queue: MessageQueue,
    /// Thread the looper was prepared on.
    thread: ThreadId,
}

impl Looper {
    pub(crate) fn new() -> Self {
        Self {
            queue: MessageQueue::new(),
            thread: thread::current().id(),
        }
    }

    /// Creates the looper of the calling thread.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LooperExists`] if the thread already has a looper.
    ///
    pub fn prepare() -> Result<Arc<Looper>, Error> {
        LOCAL_LOOPER.with(|local| {
            let mut local = local.borrow_mut();
            if local.is_some() {
                return Err(Error::LooperExists);
            }
            debug!("Preparing looper on thread {:?}.", thread::current().id());
            let looper = Arc::new(Looper::new());
            *local = Some(looper.clone());
            Ok(looper)
        })
    }

    /// The looper prepared on the calling thread.
    pub fn my_looper() -> Option<Arc<Looper>> {
        LOCAL_LOOPER.with(|local| local.borrow().clone())
    }

    /// Runs the message loop of the calling thread's looper.
    ///
    /// Every due message is dispatched to its target handler on this thread.
    /// Returns once the looper has been asked to quit and its queue is empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoLooper`] if [`Looper::prepare`] was not called on
    /// this thread.
    ///
    pub fn run() -> Result<(), Error> {
        let looper = Self::my_looper().ok_or_else(|| {
            Error::NoLooper(format!("{:?}", thread::current().id()))
        })?;

        debug!("Running looper on thread {:?}.", looper.thread);
        while let Some(msg) = looper.queue.next() {
            // Enqueue refuses messages without target.
            if let Some(target) = msg.target.clone() {
                target.dispatch_message(msg);
            }
        }
        debug!("Looper on thread {:?} is terminated.", looper.thread);
        Ok(())
    }

    /// Asks the loop to terminate once every pending message is delivered.
    ///
    /// New messages are refused from now on.
    pub fn quit(&self) {
        debug!("Quitting looper of thread {:?}.", self.thread);
        self.queue.quit();
    }

    /// True when no message is due right now.
    pub fn is_idle(&self) -> bool {
        self.queue.is_idle()
    }

    /// Thread this looper belongs to.
    pub fn thread_id(&self) -> ThreadId {
        self.thread
    }

    pub(crate) fn queue(&self) -> &MessageQueue {
        &self.queue
    }
}

impl std::fmt::Debug for Looper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Looper")
            .field("thread", &self.thread)
            .field("pending", &self.queue.len())
            .finish()
    }
}
