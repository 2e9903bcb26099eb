//! In-memory ticket service.
//!
//! Tickets are accepted exactly once, like the Redis backend. Issued tickets
//! are decimal counters starting at 1.

use async_trait::async_trait;
use common::types::TicketValue;
use relay_service::errors::RelayError;
use relay_service::tickets::TicketService;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Mock ticket service for hub and server tests.
pub struct MockTicketService {
    /// Tickets currently acceptable.
    valid: Mutex<HashSet<String>>,
    /// Next value `issue` hands out.
    next: AtomicU64,
    /// Whether every call fails as if the backend were down.
    failing: AtomicBool,
    issue_calls: AtomicUsize,
    validate_calls: AtomicUsize,
}

impl Default for MockTicketService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTicketService {
    /// Create a mock with no acceptable tickets.
    pub fn new() -> Self {
        Self::with_tickets(&[])
    }

    /// Create a mock that accepts each of `tickets` once.
    pub fn with_tickets(tickets: &[&str]) -> Self {
        Self {
            valid: Mutex::new(tickets.iter().map(|t| (*t).to_string()).collect()),
            next: AtomicU64::new(1),
            failing: AtomicBool::new(false),
            issue_calls: AtomicUsize::new(0),
            validate_calls: AtomicUsize::new(0),
        }
    }

    /// Create a mock whose every call fails.
    pub fn failing() -> Self {
        let mock = Self::new();
        mock.set_failing(true);
        mock
    }

    /// Switch backend failure on or off.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make `ticket` acceptable (once).
    pub fn add_ticket(&self, ticket: &str) {
        self.valid.lock().unwrap().insert(ticket.to_string());
    }

    /// Whether `ticket` is still acceptable.
    pub fn is_valid(&self, ticket: &str) -> bool {
        self.valid.lock().unwrap().contains(ticket)
    }

    pub fn issue_calls(&self) -> usize {
        self.issue_calls.load(Ordering::SeqCst)
    }

    pub fn validate_calls(&self) -> usize {
        self.validate_calls.load(Ordering::SeqCst)
    }

    fn check_backend(&self) -> Result<(), RelayError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RelayError::TicketService(
                "Mock ticket service error".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl TicketService for MockTicketService {
    async fn issue(&self) -> Result<TicketValue, RelayError> {
        self.issue_calls.fetch_add(1, Ordering::SeqCst);
        self.check_backend()?;

        let value = TicketValue(self.next.fetch_add(1, Ordering::SeqCst));
        self.valid.lock().unwrap().insert(value.as_candidate());
        Ok(value)
    }

    async fn validate(&self, candidate: &str) -> Result<bool, RelayError> {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        self.check_backend()?;

        Ok(self.valid.lock().unwrap().remove(candidate))
    }
}
