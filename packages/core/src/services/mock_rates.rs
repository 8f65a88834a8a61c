//! Scripted [`RateSource`] for tests.
//!
//! Responses are served from a queue; once it is drained the last entry is
//! repeated. A fetch can be held open with [`MockRatesSource::with_gate`]
//! to exercise overlapping refreshes.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::error::{NotifyError, RemoteError};
use crate::source::RateSource;
use crate::types::RatesPayload;

pub struct MockRatesSource {
    responses: Mutex<VecDeque<Result<RatesPayload, RemoteError>>>,
    notify_result: Result<(), NotifyError>,
    gate: Option<Arc<Semaphore>>,
    fetch_calls: AtomicUsize,
    notify_calls: AtomicUsize,
}

impl Default for MockRatesSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRatesSource {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            notify_result: Ok(()),
            gate: None,
            fetch_calls: AtomicUsize::new(0),
            notify_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_payload(self, payload: RatesPayload) -> Self {
        self.push(Ok(payload));
        self
    }

    pub fn with_error(self, err: RemoteError) -> Self {
        self.push(Err(err));
        self
    }

    pub fn with_notify_error(mut self, err: NotifyError) -> Self {
        self.notify_result = Err(err);
        self
    }

    /// Every fetch waits for one permit from `gate` before answering.
    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn push(&self, response: Result<RatesPayload, RemoteError>) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(response);
        }
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn notify_calls(&self) -> usize {
        self.notify_calls.load(Ordering::SeqCst)
    }

    fn next_response(&self) -> Result<RatesPayload, RemoteError> {
        let Ok(mut queue) = self.responses.lock() else {
            return Err(RemoteError::Abandoned);
        };
        match queue.len() {
            0 => Err(RemoteError::Status { status: 503 }),
            1 => queue[0].clone(),
            _ => queue.pop_front().unwrap_or(Err(RemoteError::Abandoned)),
        }
    }
}

#[async_trait]
impl RateSource for MockRatesSource {
    async fn fetch_rates(&self, _provider: &str) -> Result<RatesPayload, RemoteError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|_| RemoteError::Abandoned)?;
            permit.forget();
        }
        self.next_response()
    }

    async fn request_remote_refresh(&self, _provider: &str) -> Result<(), NotifyError> {
        self.notify_calls.fetch_add(1, Ordering::SeqCst);
        self.notify_result.clone()
    }

    fn base_url(&self) -> &str {
        "http://mock.invalid"
    }
}
