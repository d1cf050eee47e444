//! Client-side reactive store
//!
//! A single mutable snapshot of [`ClientState`], exposed through an
//! owning-copy accessor and a merge-mutator. Subscribers are notified
//! synchronously, in subscription order, exactly once per update call;
//! there is no batching or coalescing.
//!
//! The store lives behind a cheap clonable handle. The client runs on a
//! single-threaded cooperative schedule, so interior mutability via
//! `Rc<RefCell<_>>` is sufficient and no callback ever observes a
//! half-applied merge.

use std::cell::RefCell;
use std::rc::Rc;

/// The client's projection of server-driven state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClientState {
    /// How many server-initiated calls have been applied
    pub server_call_count: u64,
    /// Last value pushed by the server's age-update call
    pub last_update_age: u64,
}

/// A shallow field-level merge against [`ClientState`].
///
/// `None` leaves a field untouched; all `Some` fields apply together in
/// one observable update.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientStatePatch {
    pub server_call_count: Option<u64>,
    pub last_update_age: Option<u64>,
}

/// Token identifying one registered subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    id: u64,
}

type Callback = Box<dyn FnMut(&ClientState)>;

struct Entry {
    id: u64,
    // Taken out while the callback runs so a callback can re-enter the
    // store (unsubscribe, read) without aliasing the borrow
    callback: Option<Callback>,
}

struct Inner {
    state: ClientState,
    entries: Vec<Entry>,
    next_id: u64,
}

/// Handle to the reactive store; clones share the same state.
#[derive(Clone)]
pub struct ClientStore {
    inner: Rc<RefCell<Inner>>,
}

impl ClientStore {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                state: ClientState::default(),
                entries: Vec::new(),
                next_id: 1,
            })),
        }
    }

    /// Returns an independent copy of the current snapshot.
    ///
    /// The caller cannot mutate the store through the returned value.
    pub fn get_client_state(&self) -> ClientState {
        self.inner.borrow().state
    }

    /// Applies a shallow merge, then notifies every subscriber once.
    ///
    /// Both the merge and the notification pass are synchronous; each call
    /// is exactly one observable event.
    pub fn update_client_state(&self, patch: ClientStatePatch) {
        let state = {
            let mut inner = self.inner.borrow_mut();
            if let Some(count) = patch.server_call_count {
                inner.state.server_call_count = count;
            }
            if let Some(age) = patch.last_update_age {
                inner.state.last_update_age = age;
            }
            inner.state
        };
        self.notify(state);
    }

    /// Registers a callback invoked after every update.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: FnMut(&ClientState) + 'static,
    {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.entries.push(Entry {
            id,
            callback: Some(Box::new(callback)),
        });
        Subscription { id }
    }

    /// Removes exactly the callback identified by the subscription.
    ///
    /// Safe to call from inside a notification: a callback removed
    /// mid-pass is skipped for the rest of that pass and never invoked
    /// again. Unknown tokens are a no-op.
    pub fn unsubscribe(&self, subscription: Subscription) {
        self.inner
            .borrow_mut()
            .entries
            .retain(|entry| entry.id != subscription.id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    fn notify(&self, state: ClientState) {
        let ids: Vec<u64> = self
            .inner
            .borrow()
            .entries
            .iter()
            .map(|entry| entry.id)
            .collect();

        for id in ids {
            let callback = {
                let mut inner = self.inner.borrow_mut();
                inner
                    .entries
                    .iter_mut()
                    .find(|entry| entry.id == id)
                    .and_then(|entry| entry.callback.take())
            };

            // Already unsubscribed earlier in this pass, or re-entered
            let Some(mut callback) = callback else {
                continue;
            };

            callback(&state);

            // Put the callback back unless it unsubscribed itself
            let mut inner = self.inner.borrow_mut();
            if let Some(entry) = inner.entries.iter_mut().find(|entry| entry.id == id) {
                entry.callback = Some(callback);
            }
        }
    }
}

impl Default for ClientStore {
    fn default() -> Self {
        Self::new()
    }
}
