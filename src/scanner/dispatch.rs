//! Delivery of background results onto the caller's context.
//!
//! A [`MainContext`] is a queue of callbacks drained by one thread (a UI
//! loop, the CLI's main thread, a test). Workers hold a cloneable
//! [`ContextHandle`] and post closures to it instead of invoking callbacks
//! on their own thread.

use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

type Task = Box<dyn FnOnce() + Send + 'static>;

const IDLE_POLL: Duration = Duration::from_millis(5);

/// Posting side of a [`MainContext`].
#[derive(Clone)]
pub struct ContextHandle {
    tx: UnboundedSender<Task>,
}

impl ContextHandle {
    /// Queue `task` to run on the owning context. Returns false if the
    /// context has been dropped.
    pub fn post<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.tx.send(Box::new(task)).is_ok()
    }
}

impl std::fmt::Debug for ContextHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextHandle")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

/// Callback queue owned by the thread that should observe results.
pub struct MainContext {
    tx: UnboundedSender<Task>,
    rx: UnboundedReceiver<Task>,
}

impl Default for MainContext {
    fn default() -> Self {
        Self::new()
    }
}

impl MainContext {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    pub fn handle(&self) -> ContextHandle {
        ContextHandle {
            tx: self.tx.clone(),
        }
    }

    /// Run every callback queued so far without blocking. Returns how many ran.
    pub fn iteration(&mut self) -> usize {
        let mut ran = 0;
        loop {
            match self.rx.try_recv() {
                Ok(task) => {
                    task();
                    ran += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return ran,
            }
        }
    }

    /// Whether a callback is waiting.
    pub fn pending(&self) -> bool {
        !self.rx.is_empty()
    }

    /// Block until one callback has run.
    ///
    /// Must not be called from inside an async runtime; use
    /// [`MainContext::next`] there.
    pub fn run_one(&mut self) -> bool {
        match self.rx.blocking_recv() {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Wait up to `timeout` for one callback. Returns false on timeout.
    pub fn run_one_timeout(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            match self.rx.try_recv() {
                Ok(task) => {
                    task();
                    return true;
                }
                Err(TryRecvError::Disconnected) => return false,
                Err(TryRecvError::Empty) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    std::thread::sleep(IDLE_POLL.min(deadline - now));
                }
            }
        }
    }

    /// Await and run the next callback.
    pub async fn next(&mut self) -> bool {
        match self.rx.recv().await {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::thread;

    #[test]
    fn test_callbacks_run_on_draining_thread() {
        let mut context = MainContext::new();
        let handle = context.handle();
        let seen = Arc::new(Mutex::new(None));

        let worker = {
            let seen = Arc::clone(&seen);
            thread::spawn(move || {
                handle.post(move || {
                    *seen.lock().unwrap() = Some(thread::current().id());
                });
            })
        };
        worker.join().unwrap();

        assert!(context.pending());
        assert_eq!(context.iteration(), 1);
        assert_eq!(*seen.lock().unwrap(), Some(thread::current().id()));
        assert_eq!(context.iteration(), 0);
    }

    #[test]
    fn test_run_one_timeout() {
        let mut context = MainContext::new();
        assert!(!context.run_one_timeout(Duration::from_millis(20)));

        let handle = context.handle();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            handle.post(|| {});
        });
        assert!(context.run_one_timeout(Duration::from_secs(5)));
    }

    #[test]
    fn test_post_after_context_dropped() {
        let context = MainContext::new();
        let handle = context.handle();
        drop(context);
        assert!(!handle.post(|| {}));
    }
}
