// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Handler thread
//!
//! A [`HandlerThread`] is an OS thread running a [`Looper`]. Once started, the
//! thread prepares its looper, publishes it to the callers waiting in
//! [`HandlerThread::get_looper`] and runs the message loop until it is asked
//! to quit.
//!

use crate::{Error, Looper};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error};

use std::{
    sync::Arc,
    thread::{self, JoinHandle},
};

/// What the thread publishes to its readers.
#[derive(Default)]
struct Published {
    looper: Option<Arc<Looper>>,
    started: bool,
    finished: bool,
}

/// Publication slot shared between the thread and its readers.
#[derive(Default)]
struct Shared {
    published: Mutex<Published>,
    changed: Condvar,
}

/// Marks the thread finished on every exit path of its body, unwinding
/// included, so that no reader waits for a looper that will never come.
struct FinishGuard(Arc<Shared>);

impl Drop for FinishGuard {
    fn drop(&mut self) {
        let mut published = self.0.published.lock();
        published.finished = true;
        self.0.changed.notify_all();
    }
}

/// A thread running a [`Looper`], on which handlers can be bound.
pub struct HandlerThread {
    /// Thread name.
    name: String,
    /// Stack size of the thread, the platform default when `None`.
    stack_size: Option<usize>,
    /// Looper publication.
    shared: Arc<Shared>,
    /// Join handle, until joined.
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl HandlerThread {
    /// Creates a handler thread named `name`. The thread is not started.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stack_size: None,
            shared: Arc::new(Shared::default()),
            handle: Mutex::new(None),
        }
    }

    /// Sets the stack size of the thread, in bytes.
    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = Some(stack_size);
        self
    }

    /// Name of the thread.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Spawns the thread.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Spawn`] if the thread was already started or can't
    /// be spawned.
    ///
    pub fn start(&self) -> Result<(), Error> {
        {
            let mut published = self.shared.published.lock();
            if published.started {
                return Err(Error::Spawn(format!(
                    "thread {} already started",
                    self.name
                )));
            }
            published.started = true;
        }

        let mut builder = thread::Builder::new().name(self.name.clone());
        if let Some(stack_size) = self.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let shared = self.shared.clone();
        match builder.spawn(move || Self::body(shared)) {
            Ok(handle) => {
                debug!("Handler thread {} is started.", self.name);
                *self.handle.lock() = Some(handle);
                Ok(())
            }
            Err(spawn_error) => {
                error!("Can't spawn handler thread {}!", self.name);
                self.shared.published.lock().finished = true;
                Err(Error::Spawn(spawn_error.to_string()))
            }
        }
    }

    fn body(shared: Arc<Shared>) {
        let _finished = FinishGuard(shared.clone());

        let looper = match Looper::prepare() {
            Ok(looper) => looper,
            Err(prepare_error) => {
                error!("Can't prepare looper: {}", prepare_error);
                return;
            }
        };

        {
            let mut published = shared.published.lock();
            published.looper = Some(looper);
            shared.changed.notify_all();
        }

        if let Err(run_error) = Looper::run() {
            error!("Looper failed to run: {}", run_error);
        }
    }

    /// True once started and until its looper has returned.
    pub fn is_alive(&self) -> bool {
        let published = self.shared.published.lock();
        published.started && !published.finished
    }

    /// The looper running on this thread.
    ///
    /// Blocks while the thread is preparing its looper.
    ///
    /// # Returns
    ///
    /// Returns `None` if the thread is not alive, or if it died before
    /// publishing its looper.
    ///
    pub fn get_looper(&self) -> Option<Arc<Looper>> {
        let mut published = self.shared.published.lock();
        if !published.started || published.finished {
            return None;
        }

        while !published.finished && published.looper.is_none() {
            self.shared.changed.wait(&mut published);
        }
        published.looper.clone()
    }

    /// Asks the looper of this thread to quit.
    ///
    /// # Returns
    ///
    /// Returns true if a looper was found and asked to quit.
    ///
    pub fn quit(&self) -> bool {
        match self.get_looper() {
            Some(looper) => {
                looper.quit();
                true
            }
            None => false,
        }
    }

    /// Waits for the thread to finish. Does nothing if the thread was never
    /// started or is already joined.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Join`] if the thread panicked.
    ///
    pub fn join(&self) -> Result<(), Error> {
        let handle = self.handle.lock().take();
        match handle {
            Some(handle) => handle
                .join()
                .map_err(|_| Error::Join(self.name.clone())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{Handler, Message};

    use tracing_test::traced_test;

    use std::{sync::mpsc, time::Duration};

    #[test]
    fn test_get_looper_before_start() {
        let worker = HandlerThread::new("idle");
        assert!(!worker.is_alive());
        assert!(worker.get_looper().is_none());
        assert!(!worker.quit());
        assert_eq!(worker.join(), Ok(()));
    }

    #[test]
    #[traced_test]
    fn test_looper_quit() {
        let worker = HandlerThread::new("tests");
        worker.start().unwrap();
        let looper = worker.get_looper().unwrap();
        assert!(worker.is_alive());
        looper.quit();
        worker.join().unwrap();

        assert!(!worker.is_alive());
        assert!(worker.get_looper().is_none());
        assert!(logs_contain("Handler thread tests is started"));
    }

    #[test]
    fn test_cant_start_twice() {
        let worker = HandlerThread::new("twice").with_stack_size(256 * 1024);
        worker.start().unwrap();
        assert!(matches!(worker.start(), Err(Error::Spawn(_))));
        assert!(worker.quit());
        worker.join().unwrap();
    }

    #[test]
    fn test_messages_run_on_thread() {
        let worker = HandlerThread::new("worker");
        worker.start().unwrap();
        let looper = worker.get_looper().unwrap();

        let (sender, receiver) = mpsc::channel();
        let sender = parking_lot::Mutex::new(sender);
        let handler = Handler::builder(&looper)
            .callback(move |msg: &Message| {
                let name = thread::current().name().map(str::to_owned);
                sender.lock().send((msg.what(), name)).is_ok()
            })
            .build();

        handler.send_message(handler.obtain_message_with(1234)).unwrap();
        handler.send_message(handler.obtain_message_with(5678)).unwrap();
        let timeout = Duration::from_secs(5);
        assert_eq!(
            receiver.recv_timeout(timeout).unwrap(),
            (1234, Some("worker".to_owned()))
        );
        assert_eq!(receiver.recv_timeout(timeout).unwrap().0, 5678);

        assert!(worker.quit());
        worker.join().unwrap();
        assert_eq!(
            handler.send_message(handler.obtain_message()),
            Ok(false)
        );
    }

    #[test]
    fn test_panicking_callback_ends_thread() {
        let worker = HandlerThread::new("faulty");
        worker.start().unwrap();
        let looper = worker.get_looper().unwrap();
        let handler = Handler::builder(&looper)
            .callback(|_msg: &Message| -> bool { panic!("callback failure") })
            .build();

        handler.send_message(handler.obtain_message()).unwrap();
        assert_eq!(worker.join(), Err(Error::Join("faulty".to_owned())));
        assert!(!worker.is_alive());
        assert!(worker.get_looper().is_none());
    }
}
