//! Scriptable transport for driving the queue in tests.
#![allow(clippy::panic)]

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use herald_transport::{EmailMessage, SendOutcome, Transport, TransportError};
use parking_lot::Mutex;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    Succeed,
    /// Returned failure outcome
    Fail,
    /// Exceptional transport error
    Error,
    Panic,
    /// Never completes
    Hang,
}

#[derive(Debug, Default)]
pub struct MockTransport {
    scripts: Mutex<HashMap<String, VecDeque<Behaviour>>>,
    fallback: Mutex<HashMap<String, Behaviour>>,
    sends: Mutex<Vec<(String, Instant)>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` sends to `to`, then fall back to the default
    pub fn fail_times(&self, to: &str, times: usize) -> &Self {
        self.script(to, std::iter::repeat_n(Behaviour::Fail, times))
    }

    pub fn script(&self, to: &str, behaviours: impl IntoIterator<Item = Behaviour>) -> &Self {
        self.scripts
            .lock()
            .entry(to.to_string())
            .or_default()
            .extend(behaviours);
        self
    }

    pub fn always(&self, to: &str, behaviour: Behaviour) -> &Self {
        self.fallback.lock().insert(to.to_string(), behaviour);
        self
    }

    /// Recipients in the order sends were attempted
    pub fn sends(&self) -> Vec<String> {
        self.sends.lock().iter().map(|(to, _)| to.clone()).collect()
    }

    pub fn attempts(&self, to: &str) -> usize {
        self.sends.lock().iter().filter(|(t, _)| t == to).count()
    }

    pub fn send_times(&self, to: &str) -> Vec<Instant> {
        self.sends
            .lock()
            .iter()
            .filter(|(t, _)| t == to)
            .map(|(_, at)| *at)
            .collect()
    }

    fn next_behaviour(&self, to: &str) -> Behaviour {
        if let Some(next) = self.scripts.lock().get_mut(to).and_then(VecDeque::pop_front) {
            return next;
        }
        self.fallback
            .lock()
            .get(to)
            .copied()
            .unwrap_or(Behaviour::Succeed)
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn send(&self, message: &EmailMessage) -> Result<SendOutcome, TransportError> {
        self.sends.lock().push((message.to.clone(), Instant::now()));

        match self.next_behaviour(&message.to) {
            Behaviour::Succeed => Ok(SendOutcome::delivered(Some(format!("<{}@mock>", message.to)))),
            Behaviour::Fail => Ok(SendOutcome::failure(format!("mailbox {} unavailable", message.to))),
            Behaviour::Error => Err(TransportError::NotConfigured("mock", "connection reset".to_string())),
            Behaviour::Panic => panic!("mock transport exploded"),
            Behaviour::Hang => std::future::pending().await,
        }
    }
}
