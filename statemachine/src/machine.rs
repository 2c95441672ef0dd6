// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Hierarchical state machine
//!
//! A [`StateMachine`] processes messages with states arranged in a hierarchy.
//! Each state may have one parent; a child state unable to handle a message
//! lets its parent process it by returning `false`.
//!
//! States are added with [`StateMachine::add_state`] and
//! [`StateMachine::add_child_state`], the initial state is chosen with
//! [`StateMachine::set_initial_state`], then [`StateMachine::start`] enters the
//! initial state and all its ancestors, eldest first. The entry happens on the
//! looper thread of the machine, before any message sent after `start` is
//! processed.
//!
//! ## Transitions
//!
//! A state requests a transition through [`Context::transition_to`]. The
//! transition is performed once the current message is handled: the machine
//! finds the lowest common ancestor of the current and the target state,
//! exits the current state and its parents up to, but not including, that
//! ancestor, then enters every state below it down to the target. Without
//! common ancestor every active state is exited. Moving to a state that is
//! already active, such as a parent of the current state, has no common
//! ancestor: the whole active branch is exited, then entered again from the
//! root down to the target.
//!
//! ## Deferral
//!
//! [`Context::defer_message`] saves a message until the next transition. The
//! deferred messages are then put at the front of the queue, oldest first, and
//! are processed by the new state before any other message.
//!

use crate::{node::Nodes, Context, Error, State};

use looper::{Handler, Looper, Message, MessageHandler, Messenger};
use parking_lot::Mutex;
use tracing::{debug, error, warn};

use std::sync::Arc;

/// Tag of the control message initializing the machine.
const CMD_INIT_STATE_MACHINE: i32 = -1;

/// Payload marking the control message initializing the machine.
struct Initialize;

/// Hierarchy and runtime state of a machine.
#[derive(Default)]
struct Core {
    /// Every state added to the machine.
    nodes: Nodes,
    /// Initial state.
    start: Option<usize>,
    /// Innermost active state.
    current: Option<usize>,
    /// State to reach once the current message is handled.
    pending: Option<usize>,
    /// Messages to replay after the next transition, newest last.
    deferred: Vec<Message>,
    /// True once the initial state was entered.
    started: bool,
}

impl Core {
    fn initialize(&mut self, handler: &Handler) {
        debug!("Initializing state machine {}.", handler.name());
        self.started = true;
        self.pending = self.start;
        self.apply_pending(handler);
    }

    fn process(&mut self, handler: &Handler, msg: Message) {
        let Core {
            nodes,
            current,
            pending,
            deferred,
            ..
        } = self;

        let mut receiver = *current;
        while let Some(id) = receiver {
            let mut ctx = Context::new(handler, &nodes.index, pending, deferred);
            if nodes.slots[id].state.process_message(&msg, &mut ctx) {
                break;
            }
            receiver = nodes.slots[id].parent;
        }
        if receiver.is_none() {
            debug!(
                "Message {} not handled by state machine {}.",
                msg.what(),
                handler.name()
            );
        }

        self.apply_pending(handler);
    }

    fn apply_pending(&mut self, handler: &Handler) {
        if self.pending.is_none() {
            return;
        }
        self.perform_transitions(handler);
        self.replay_deferred(handler);
    }

    /// Moves the active chain until the current state is the pending one.
    ///
    /// Hooks may request another transition while running; the loop then
    /// carries on towards the new target.
    fn perform_transitions(&mut self, handler: &Handler) {
        let Core {
            nodes,
            current,
            pending,
            deferred,
            ..
        } = self;

        while let Some(target) = *pending {
            if *current == Some(target) {
                break;
            }

            let chain = nodes.entry_chain(target);
            // An empty chain means the target is already active: the whole
            // active branch is left, and the next pass enters it again from
            // the root.
            let ancestor = chain.last().and_then(|&top| nodes.slots[top].parent);

            while *current != ancestor {
                let Some(leaving) = *current else {
                    break;
                };
                debug!("Exiting state {}.", nodes.name(leaving));
                let mut ctx =
                    Context::new(handler, &nodes.index, pending, deferred);
                nodes.slots[leaving].state.exit(&mut ctx);
                nodes.slots[leaving].active = false;
                *current = nodes.slots[leaving].parent;
            }

            for &entering in chain.iter().rev() {
                debug!("Entering state {}.", nodes.name(entering));
                nodes.slots[entering].active = true;
                *current = Some(entering);
                let mut ctx =
                    Context::new(handler, &nodes.index, pending, deferred);
                nodes.slots[entering].state.enter(&mut ctx);
            }
        }
        *pending = None;
    }

    /// Puts the deferred messages back at the front of the queue.
    ///
    /// Popping the newest first and inserting each at the front leaves the
    /// oldest at the head of the queue.
    fn replay_deferred(&mut self, handler: &Handler) {
        while let Some(msg) = self.deferred.pop() {
            match handler.send_message_at_front_of_queue(msg) {
                Ok(true) => {}
                Ok(false) => warn!(
                    "Deferred message dropped, state machine {} is quitting.",
                    handler.name()
                ),
                Err(replay_error) => {
                    error!("Can't replay deferred message: {}", replay_error)
                }
            }
        }
    }
}

/// Drives the core from the looper thread.
struct Driver {
    core: Arc<Mutex<Core>>,
}

impl MessageHandler for Driver {
    fn handle_message(&self, handler: &Handler, msg: Message) {
        let mut core = self.core.lock();
        if msg.payload::<Initialize>().is_some() {
            core.initialize(handler);
        } else {
            core.process(handler, msg);
        }
    }
}

/// Hierarchical state machine running on a [`Looper`].
pub struct StateMachine {
    /// Receives the messages of the machine.
    handler: Handler,
    /// Shared with the handler's hook.
    core: Arc<Mutex<Core>>,
}

impl StateMachine {
    /// Creates a state machine running on `looper`.
    pub fn new(looper: &Arc<Looper>) -> Self {
        Self::with_name(looper, "state-machine")
    }

    /// Creates a state machine named `name` running on `looper`.
    pub fn with_name(looper: &Arc<Looper>, name: impl Into<String>) -> Self {
        let core = Arc::new(Mutex::new(Core::default()));
        let handler = Handler::builder(looper)
            .name(name)
            .message_handler(Arc::new(Driver { core: core.clone() }))
            .build();
        Self { handler, core }
    }

    /// Adds a root state, with no parent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StateExists`] if a state was already added as `name`.
    ///
    pub fn add_state(
        &self,
        name: impl Into<String>,
        state: impl State,
    ) -> Result<(), Error> {
        let name = name.into();
        debug!("Adding state {} to {}.", name, self.handler.name());
        self.core.lock().nodes.add(name, Box::new(state), None)?;
        Ok(())
    }

    /// Adds a state as a child of `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StateExists`] if a state was already added as `name`,
    /// or [`Error::UnknownState`] if `parent` was not added before.
    ///
    pub fn add_child_state(
        &self,
        name: impl Into<String>,
        state: impl State,
        parent: &str,
    ) -> Result<(), Error> {
        let name = name.into();
        debug!(
            "Adding state {} under {} to {}.",
            name,
            parent,
            self.handler.name()
        );
        self.core
            .lock()
            .nodes
            .add(name, Box::new(state), Some(parent))?;
        Ok(())
    }

    /// Defines the initial state of the machine.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownState`] if the state was not added.
    ///
    pub fn set_initial_state(&self, name: &str) -> Result<(), Error> {
        let mut core = self.core.lock();
        core.start = Some(core.nodes.lookup(name)?);
        Ok(())
    }

    /// Starts the machine: the initial state and its ancestors are entered
    /// on the looper thread.
    ///
    /// # Returns
    ///
    /// Returns false if the looper is quitting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoInitialState`] without initial state, or
    /// [`Error::Looper`] if the looper is gone.
    ///
    pub fn start(&self) -> Result<bool, Error> {
        if self.core.lock().start.is_none() {
            return Err(Error::NoInitialState);
        }
        debug!("Starting state machine {}.", self.handler.name());
        let msg = self
            .handler
            .obtain_message_with(CMD_INIT_STATE_MACHINE)
            .with_payload(Initialize);
        Ok(self.handler.send_message(msg)?)
    }

    /// True once the initial state has been entered.
    pub fn is_started(&self) -> bool {
        self.core.lock().started
    }

    /// Name of the innermost active state.
    ///
    /// Must not be called from a state hook, which already runs under the
    /// machine lock.
    pub fn current_state(&self) -> Option<String> {
        let core = self.core.lock();
        core.current.map(|id| core.nodes.name(id).to_owned())
    }

    /// Sends a message tagged `what` to the machine.
    ///
    /// # Errors
    ///
    /// Fails like the [`Messenger`] send methods, with a [`looper::Error`].
    ///
    pub fn send_message_with(&self, what: i32) -> Result<bool, looper::Error> {
        self.handler.send_message(self.handler.obtain_message_with(what))
    }

    /// The handler receiving the messages of the machine.
    pub fn handler(&self) -> &Handler {
        &self.handler
    }
}

impl Messenger for StateMachine {
    fn obtain_message(&self) -> Message {
        self.handler.obtain_message()
    }

    fn obtain_message_with(&self, what: i32) -> Message {
        self.handler.obtain_message_with(what)
    }

    fn send_message(&self, msg: Message) -> Result<bool, looper::Error> {
        self.handler.send_message(msg)
    }

    fn send_message_delayed(
        &self,
        msg: Message,
        delay: i64,
    ) -> Result<bool, looper::Error> {
        if delay < 0 {
            return Err(looper::Error::NegativeTime(delay));
        }
        self.handler.send_message_delayed(msg, delay)
    }

    fn send_message_at_front_of_queue(
        &self,
        msg: Message,
    ) -> Result<bool, looper::Error> {
        self.handler.send_message_at_front_of_queue(msg)
    }

    fn send_message_at_time(
        &self,
        msg: Message,
        time: i64,
    ) -> Result<bool, looper::Error> {
        self.handler.send_message_at_time(msg, time)
    }
}
