//! State transition context
//!
//! Everything an operation may touch during one transition: the store, the
//! current home-chain height and the event sink.

use crate::events::{Event, EventManager};
use crate::store::KvStore;

pub struct Context<S: KvStore> {
    store: S,
    block_height: u64,
    events: EventManager,
}

impl<S: KvStore> Context<S> {
    pub fn new(store: S, block_height: u64) -> Self {
        Self {
            store,
            block_height,
            events: EventManager::default(),
        }
    }

    pub fn block_height(&self) -> u64 {
        self.block_height
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn emit(&mut self, event: Event) {
        self.events.emit(event);
    }

    pub fn events(&self) -> &[Event] {
        self.events.events()
    }

    pub fn into_parts(self) -> (S, Vec<Event>) {
        (self.store, self.events.into_events())
    }
}
