//! Core library for the looper framework.
//! Provides a single-thread message scheduler and a hierarchical state machine built on it.
//! Handlers post timed messages on the queue of a looper thread, which delivers them in time order.
//! State machines are handlers whose messages drive a tree of states.

pub use looper::{
    now_millis, Callback, Error as LooperError, Handler, HandlerBuilder,
    HandlerThread, Looper, Message, MessageHandler, Messenger, Payload,
};

pub use statemachine::{Context, Error as StateMachineError, State, StateMachine};
