//! FIFO queue of clients looking for a partner

use roulette_protocol::ClientId;
use std::collections::{BTreeMap, HashMap};

/// Clients waiting to be paired, oldest first
///
/// Entries are keyed by an enqueue ticket so removal from the middle is
/// `O(log n)` rather than a scan.
#[derive(Debug, Default)]
pub struct WaitingPool {
    queue: BTreeMap<u64, ClientId>,
    tickets: HashMap<ClientId, u64>,
    next_ticket: u64,
}

impl WaitingPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `id` to the back. Returns false if it was already queued.
    pub fn enqueue(&mut self, id: ClientId) -> bool {
        if self.tickets.contains_key(&id) {
            return false;
        }
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.queue.insert(ticket, id);
        self.tickets.insert(id, ticket);
        true
    }

    /// Pop the client that has waited longest
    pub fn dequeue_oldest(&mut self) -> Option<ClientId> {
        let (_, id) = self.queue.pop_first()?;
        self.tickets.remove(&id);
        Some(id)
    }

    /// Remove `id` wherever it is. Returns whether it was queued.
    pub fn remove_if_present(&mut self, id: ClientId) -> bool {
        match self.tickets.remove(&id) {
            Some(ticket) => {
                self.queue.remove(&ticket);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.tickets.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Queued ids, oldest first
    pub fn iter(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.queue.values().copied()
    }
}
