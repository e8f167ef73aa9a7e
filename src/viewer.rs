//! Per-viewer streaming loop.
//!
//! A session registers with the store, sends the filtered backlog, then
//! forwards live records and reset notifications until the connection goes
//! away. The subscriber is always deregistered on the way out, including
//! when the encoder fails mid-write.

use crossbeam_channel::{select, Receiver};
use std::sync::Arc;
use tracing::debug;

use crate::encoding::Encoder;
use crate::error::Result;
use crate::store::Store;
use crate::subscriptions::SubscriberHandle;
use crate::types::{Sequence, SubscriberId};

/// Where a session is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewerState {
    /// Registered, sending the backlog.
    Connecting,
    /// Forwarding live records and resets.
    Streaming,
    /// Deregistered. Terminal.
    Closed,
}

/// Deregisters the subscriber when dropped.
struct DisconnectGuard<'a> {
    store: &'a Store,
    id: &'a SubscriberId,
}

impl Drop for DisconnectGuard<'_> {
    fn drop(&mut self) {
        self.store.disconnect(self.id);
    }
}

/// One viewer connection.
pub struct ViewerSession {
    store: Arc<Store>,
    id: SubscriberId,
    state: ViewerState,
    /// Highest sequence already written to the encoder.
    last_sequence: Option<Sequence>,
}

impl ViewerSession {
    pub fn new(store: Arc<Store>, id: SubscriberId) -> Self {
        Self {
            store,
            id,
            state: ViewerState::Connecting,
            last_sequence: None,
        }
    }

    pub fn id(&self) -> &SubscriberId {
        &self.id
    }

    pub fn state(&self) -> ViewerState {
        self.state
    }

    /// Stream to `encoder` until `cancel` receives a message or all its
    /// senders are dropped, or the store drops this subscriber.
    ///
    /// Encoder errors end the session and are returned; the subscriber is
    /// deregistered either way.
    pub fn run<E: Encoder + ?Sized>(&mut self, encoder: &mut E, cancel: &Receiver<()>) -> Result<()> {
        let store = Arc::clone(&self.store);
        let id = self.id.clone();
        let _guard = DisconnectGuard {
            store: &store,
            id: &id,
        };

        self.state = ViewerState::Connecting;
        let handle = store.line_for(&id);
        let result = self.stream(&store, &handle, encoder, cancel);

        self.state = ViewerState::Closed;
        debug!(subscriber = %self.id, ok = result.is_ok(), "viewer session ended");
        result
    }

    fn stream<E: Encoder + ?Sized>(
        &mut self,
        store: &Store,
        handle: &SubscriberHandle,
        encoder: &mut E,
        cancel: &Receiver<()>,
    ) -> Result<()> {
        self.send_snapshot(store, encoder)?;
        self.state = ViewerState::Streaming;

        loop {
            select! {
                recv(cancel) -> _ => return Ok(()),
                recv(handle.closed()) -> _ => return Ok(()),
                recv(handle.resets) -> msg => {
                    if msg.is_err() {
                        return Ok(());
                    }
                    encoder.encode_reset()?;
                    self.send_snapshot(store, encoder)?;
                }
                recv(handle.records) -> msg => {
                    let Ok(record) = msg else {
                        return Ok(());
                    };
                    // Already sent as part of the backlog.
                    if self.last_sequence.is_some_and(|last| record.sequence <= last) {
                        continue;
                    }
                    encoder.encode_record(&record)?;
                    encoder.flush()?;
                    self.last_sequence = Some(record.sequence);
                }
            }
        }
    }

    fn send_snapshot<E: Encoder + ?Sized>(&mut self, store: &Store, encoder: &mut E) -> Result<()> {
        for record in store.snapshot() {
            encoder.encode_record(&record)?;
            self.last_sequence = self.last_sequence.max(Some(record.sequence));
        }
        encoder.flush()
    }
}
