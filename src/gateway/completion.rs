// Single-resolution completion handle
// Bridges one-shot backend callbacks (which may fire on any thread) to awaiting tasks.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

enum State<T> {
    Pending(Vec<oneshot::Sender<T>>),
    Resolved(T),
}

/// Shared cell resolved at most once. Every waiter, early or late, observes
/// the same value; resolutions after the first are ignored.
pub struct Completion<T> {
    state: Arc<Mutex<State<T>>>,
}

impl<T> Clone for Completion<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T: Clone + Send + 'static> Default for Completion<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> Completion<T> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::Pending(Vec::new()))),
        }
    }

    /// Resolve and drain every waiter. Returns false if already resolved.
    pub fn resolve(&self, value: T) -> bool {
        let waiters = {
            let mut state = self.lock();
            match &mut *state {
                State::Resolved(_) => return false,
                State::Pending(waiters) => {
                    let waiters = std::mem::take(waiters);
                    *state = State::Resolved(value.clone());
                    waiters
                }
            }
        };

        for waiter in waiters {
            // A dropped receiver means that caller stopped waiting
            let _ = waiter.send(value.clone());
        }
        true
    }

    pub fn is_resolved(&self) -> bool {
        matches!(&*self.lock(), State::Resolved(_))
    }

    pub fn peek(&self) -> Option<T> {
        match &*self.lock() {
            State::Resolved(value) => Some(value.clone()),
            State::Pending(_) => None,
        }
    }

    /// Wait for the value. Returns immediately if already resolved.
    pub async fn wait(&self) -> Option<T> {
        let rx = {
            let mut state = self.lock();
            match &mut *state {
                State::Resolved(value) => return Some(value.clone()),
                State::Pending(waiters) => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    rx
                }
            }
        };

        match rx.await {
            Ok(value) => Some(value),
            Err(_) => self.peek(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Write end handed to a backend callback. If the callback is dropped
/// without firing, the completion resolves with the fallback value so no
/// waiter is left suspended.
pub struct Resolver<T: Clone + Send + 'static> {
    completion: Completion<T>,
    fallback: Option<T>,
}

impl<T: Clone + Send + 'static> Resolver<T> {
    pub fn new(completion: Completion<T>, fallback: T) -> Self {
        Self {
            completion,
            fallback: Some(fallback),
        }
    }

    pub fn resolve(mut self, value: T) {
        self.fallback = None;
        self.completion.resolve(value);
    }
}

impl<T: Clone + Send + 'static> Drop for Resolver<T> {
    fn drop(&mut self) {
        if let Some(fallback) = self.fallback.take() {
            if self.completion.resolve(fallback) {
                log::warn!("Backend dropped a completion callback without calling it");
            }
        }
    }
}
