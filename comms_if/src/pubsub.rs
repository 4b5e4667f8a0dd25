//! # Publish/subscribe
//!
//! Topic style fan-out of messages to any number of subscribers over
//! `std::sync::mpsc` channels. Delivery is fire-and-forget: subscribers which
//! have hung up are dropped on the next publish.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::debug;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Mutex, MutexGuard, PoisonError};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Publisher for one topic.
pub struct Publisher<T> {
    topic: String,
    subscribers: Mutex<Vec<Sender<T>>>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<T: Clone> Publisher<T> {
    pub fn new(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Subscribe to the topic. Only messages published after this call are
    /// received.
    pub fn subscribe(&self) -> Receiver<T> {
        let (tx, rx) = channel();
        self.lock().push(tx);
        rx
    }

    /// Send a message to every subscriber, returning the number it reached.
    pub fn publish(&self, msg: T) -> usize {
        let mut subs = self.lock();
        let before = subs.len();

        subs.retain(|s| s.send(msg.clone()).is_ok());

        if subs.len() < before {
            debug!(
                "[{}] Dropped {} disconnected subscriber(s)",
                self.topic,
                before - subs.len()
            );
        }

        subs.len()
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn num_subscribers(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Sender<T>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Drain a receiver and return the most recent message, if any arrived.
pub fn latest<T>(rx: &Receiver<T>) -> Option<T> {
    rx.try_iter().last()
}
