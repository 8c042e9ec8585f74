//! Pub/Sub event bus for decoupled session notifications.
//!
//! Architecture:
//! - Components subscribe to event types with callbacks (immediate invocation)
//! - emit() invokes callbacks immediately AND queues for deferred processing
//! - poll() returns queued events for batch processing by the host loop
//!
//! Everything runs on the single event-dispatch thread, so the bus is
//! `Rc`/`RefCell` based and cheap to clone. Emitting never blocks and never
//! waits for a handler.
//!
//! Callback order: FIFO (first-subscribed, first-called) within same event type.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::warn;

/// Maximum events in queue before oldest are evicted
const MAX_QUEUE_SIZE: usize = 1000;

/// Marker trait for events.
pub trait Event: Any + 'static {
    fn as_any(&self) -> &dyn Any;
    fn type_name(&self) -> &'static str;
}

impl<T: Any + 'static> Event for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// Type-erased callback
type Callback = Rc<dyn Fn(&dyn Any)>;

/// Boxed event for queue storage
pub type BoxedEvent = Box<dyn Event>;

#[derive(Default)]
struct BusInner {
    subscribers: HashMap<TypeId, Vec<Callback>>,
    queue: Vec<BoxedEvent>,
}

/// Pub/Sub event bus with deferred processing support.
///
/// Clones share the same subscribers and queue.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Rc<RefCell<BusInner>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("EventBus")
            .field("subscriber_types", &inner.subscribers.len())
            .field("queue_len", &inner.queue.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to events of type E.
    ///
    /// # Example
    /// ```ignore
    /// let repaints = Rc::new(Cell::new(0));
    /// let r = Rc::clone(&repaints);
    /// bus.subscribe::<RepaintRequestedEvent, _>(move |_| r.set(r.get() + 1));
    /// ```
    pub fn subscribe<E, F>(&self, callback: F)
    where
        E: Event,
        F: Fn(&E) + 'static,
    {
        let wrapped: Callback = Rc::new(move |any: &dyn Any| {
            if let Some(event) = any.downcast_ref::<E>() {
                callback(event);
            }
        });
        self.inner
            .borrow_mut()
            .subscribers
            .entry(TypeId::of::<E>())
            .or_default()
            .push(wrapped);
    }

    /// Emit event: invoke callbacks immediately, then queue it for poll().
    pub fn emit<E: Event>(&self, event: E) {
        // Snapshot callbacks so handlers may subscribe or emit re-entrantly
        let callbacks: Vec<Callback> = self
            .inner
            .borrow()
            .subscribers
            .get(&TypeId::of::<E>())
            .cloned()
            .unwrap_or_default();
        for cb in &callbacks {
            cb(&event);
        }

        let mut inner = self.inner.borrow_mut();
        if inner.queue.len() >= MAX_QUEUE_SIZE {
            let evict_count = inner.queue.len() / 2;
            warn!("EventBus queue full ({} events), evicting oldest {}", inner.queue.len(), evict_count);
            inner.queue.drain(0..evict_count);
        }
        inner.queue.push(Box::new(event));
    }

    /// Take all queued events.
    pub fn poll(&self) -> Vec<BoxedEvent> {
        std::mem::take(&mut self.inner.borrow_mut().queue)
    }

    /// Clear subscribers for type E
    pub fn unsubscribe_all<E: Event>(&self) {
        self.inner.borrow_mut().subscribers.remove(&TypeId::of::<E>());
    }

    /// Clear all subscribers and queue
    pub fn clear(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.subscribers.clear();
        inner.queue.clear();
    }

    pub fn has_subscribers<E: Event>(&self) -> bool {
        self.inner
            .borrow()
            .subscribers
            .get(&TypeId::of::<E>())
            .map(|v| !v.is_empty())
            .unwrap_or(false)
    }

    pub fn queue_len(&self) -> usize {
        self.inner.borrow().queue.len()
    }
}

/// Downcast a queued event to a concrete type.
///
/// Derefs to `dyn Event` first: calling `as_any()` on the `Box` itself
/// would hit the blanket impl and downcast the box, which always fails.
#[inline]
pub fn downcast_event<E: Event>(event: &BoxedEvent) -> Option<&E> {
    (**event).as_any().downcast_ref::<E>()
}

/// Count queued events of type E without consuming them.
pub fn count_queued<E: Event>(bus: &EventBus) -> usize {
    bus.inner
        .borrow()
        .queue
        .iter()
        .filter(|ev| downcast_event::<E>(ev).is_some())
        .count()
}
