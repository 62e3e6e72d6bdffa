//! Subscriber registry and dispatch fan-out.
//!
//! Read-mostly after setup: shards share one `Dispatcher` without locking
//! the hot path. Delivery order is the server's arrival order because the
//! connection loop awaits each delivery before decoding the next frame.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use dashmap::DashMap;

use wstether_core::protocol::{DispatchEvent, EventKind};

/// Receives decoded dispatch events.
#[async_trait]
pub trait Subscriber: Send + Sync {
    async fn handle(&self, event: &DispatchEvent);
}

/// Registry and fan-out for dispatch events.
///
/// Subscribers register for specific [`EventKind`]s or for everything.
/// Events of an unknown kind only reach the all-events subscribers; a
/// kind-specific subscriber never sees a payload it has no schema for.
#[derive(Default)]
pub struct Dispatcher {
    by_kind: DashMap<EventKind, Vec<Arc<dyn Subscriber>>>,
    all: RwLock<Vec<Arc<dyn Subscriber>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register for one event kind.
    pub fn subscribe(&self, kind: EventKind, sub: Arc<dyn Subscriber>) {
        self.by_kind.entry(kind).or_default().push(sub);
    }

    /// Register for every event, including unknown kinds.
    pub fn subscribe_all(&self, sub: Arc<dyn Subscriber>) {
        if let Ok(mut all) = self.all.write() {
            all.push(sub);
        }
    }

    /// Deliver one event: kind-specific subscribers first, then the
    /// all-events subscribers, each in registration order.
    pub async fn dispatch(&self, event: &DispatchEvent) {
        if event.kind != EventKind::Unknown {
            // Clone out of the map so no guard is held across an await.
            let targeted: Vec<Arc<dyn Subscriber>> = self
                .by_kind
                .get(&event.kind)
                .map(|subs| subs.value().clone())
                .unwrap_or_default();
            for sub in targeted {
                sub.handle(event).await;
            }
        }
        let all: Vec<Arc<dyn Subscriber>> = match self.all.read() {
            Ok(guard) => guard.clone(),
            Err(_) => Vec::new(),
        };
        for sub in all {
            sub.handle(event).await;
        }
    }
}
