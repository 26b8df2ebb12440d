use std::sync::{Arc, Mutex};

/// Fire-and-forget sender for one direction of the protocol.
pub trait Outbox<M>: Send + Sync {
    /// Post a message. Delivery failures are the sender's to log.
    fn post(&self, message: M);
}

impl<M, T: Outbox<M> + ?Sized> Outbox<M> for Arc<T> {
    fn post(&self, message: M) {
        (**self).post(message)
    }
}

/// Outbox that keeps every posted message in memory.
#[derive(Debug)]
pub struct RecordingOutbox<M> {
    messages: Arc<Mutex<Vec<M>>>,
}

impl<M> Default for RecordingOutbox<M> {
    fn default() -> Self {
        Self {
            messages: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<M> Clone for RecordingOutbox<M> {
    fn clone(&self) -> Self {
        Self {
            messages: Arc::clone(&self.messages),
        }
    }
}

impl<M: Clone> RecordingOutbox<M> {
    /// Create an empty outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything posted so far.
    pub fn messages(&self) -> Vec<M> {
        match self.messages.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Remove and return everything posted so far.
    pub fn drain(&self) -> Vec<M> {
        match self.messages.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl<M: Send> Outbox<M> for RecordingOutbox<M> {
    fn post(&self, message: M) {
        match self.messages.lock() {
            Ok(mut guard) => guard.push(message),
            Err(poisoned) => poisoned.into_inner().push(message),
        }
    }
}
