// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Message queue
//!
//! A [`MessageQueue`] holds the pending messages of a looper ordered by their
//! delivery time. Messages sharing the same time keep their insertion order,
//! and a message enqueued at time `0` jumps to the very front of the queue.
//!
//! A single lock guards the messages and the quitting flag. The consumer
//! blocks in [`MessageQueue::next`] on a condition variable paired with that
//! lock, which is only released while waiting.
//!

use crate::{clock, Error, Handler, Message};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use std::{collections::VecDeque, time::Duration};

/// Messages and quitting flag, guarded together.
#[derive(Default)]
struct QueueState {
    messages: VecDeque<Message>,
    quitting: bool,
}

/// How long the consumer has to wait before looking at the queue again.
enum Wait {
    Forever,
    For(Duration),
}

/// Time-ordered queue of pending messages.
#[derive(Default)]
pub(crate) struct MessageQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl MessageQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// True when no message is due right now.
    ///
    /// Advisory only: a concurrent enqueue may change the answer as soon as
    /// it is returned.
    pub(crate) fn is_idle(&self) -> bool {
        let now = clock::now_millis();
        let state = self.state.lock();
        state
            .messages
            .front()
            .map_or(true, |head| now < head.when)
    }

    /// Provides the next due message, blocking until one is available.
    ///
    /// Returns `None` once the queue is quitting and has no message left to
    /// deliver; messages already queued, due or not, are delivered first.
    pub(crate) fn next(&self) -> Option<Message> {
        let mut state = self.state.lock();
        loop {
            let now = clock::now_millis();
            let wait = match state.messages.front().map(|head| head.when) {
                Some(when) if when <= now => {
                    return state.messages.pop_front();
                }
                Some(when) => Wait::For(Duration::from_millis((when - now) as u64)),
                None if state.quitting => {
                    debug!("Queue is quitting and empty.");
                    return None;
                }
                None => Wait::Forever,
            };

            // Spurious or early wake-ups are handled by looking at the
            // queue again.
            match wait {
                Wait::Forever => self.available.wait(&mut state),
                Wait::For(timeout) => {
                    let _ = self.available.wait_for(&mut state, timeout);
                }
            }
        }
    }

    /// Inserts a message to be delivered at `when`.
    ///
    /// Returns `Ok(false)` when the queue is quitting: the message is dropped
    /// and the queue keeps draining what it already holds.
    pub(crate) fn enqueue(
        &self,
        mut msg: Message,
        when: i64,
    ) -> Result<bool, Error> {
        if msg.target.is_none() {
            return Err(Error::MissingTarget);
        }

        let mut state = self.state.lock();
        if state.quitting {
            debug!("Queue is quitting, message {} rejected.", msg.what());
            return Ok(false);
        }

        msg.when = when;
        trace!("Enqueueing message {} at {}.", msg.what(), when);
        if when == 0 {
            state.messages.push_front(msg);
        } else {
            let pos = state.messages.partition_point(|cur| cur.when <= when);
            state.messages.insert(pos, msg);
        }
        self.available.notify_one();
        Ok(true)
    }

    /// True if a message for `handler` is pending.
    pub(crate) fn has_messages(&self, handler: &Handler) -> bool {
        let state = self.state.lock();
        state.messages.iter().any(|msg| msg.target.as_ref() == Some(handler))
    }

    /// True if a message for `handler` tagged `what` is pending.
    pub(crate) fn has_messages_with(&self, handler: &Handler, what: i32) -> bool {
        let state = self.state.lock();
        state.messages.iter().any(|msg| {
            msg.target.as_ref() == Some(handler) && msg.what() == what
        })
    }

    /// Removes every pending message for `handler`. Returns how many were
    /// removed.
    pub(crate) fn remove_messages(&self, handler: &Handler) -> usize {
        self.remove_if(|msg| msg.target.as_ref() == Some(handler))
    }

    /// Removes every pending message for `handler` tagged `what`. Returns how
    /// many were removed.
    pub(crate) fn remove_messages_with(
        &self,
        handler: &Handler,
        what: i32,
    ) -> usize {
        self.remove_if(|msg| {
            msg.target.as_ref() == Some(handler) && msg.what() == what
        })
    }

    fn remove_if<F>(&self, matches: F) -> usize
    where
        F: Fn(&Message) -> bool,
    {
        let mut state = self.state.lock();
        let before = state.messages.len();
        state.messages.retain(|msg| !matches(msg));
        before - state.messages.len()
    }

    /// Number of pending messages.
    pub(crate) fn len(&self) -> usize {
        self.state.lock().messages.len()
    }

    /// Puts the queue in the quitting state and wakes up the consumer.
    pub(crate) fn quit(&self) {
        let mut state = self.state.lock();
        state.quitting = true;
        self.available.notify_all();
    }
}
