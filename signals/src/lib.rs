//! Signal/slot dispatch. Handlers run synchronously on the emitting thread,
//! in registration order. Slots stay connected until their `SlotHandle` is
//! dropped or `disconnect_all` is called.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

pub type Slot<T> = Arc<dyn Fn(&T) + Send + Sync + 'static>;

#[derive(Clone)]
pub struct Signal<T>(Arc<Inner<T>>);

struct Inner<T> {
    slots: Mutex<Vec<(usize, Slot<T>)>>,
    next_id: AtomicUsize,
}

/// Keeps one slot connected; dropping it disconnects.
pub struct SlotHandle<T> {
    inner: Weak<Inner<T>>,
    id: usize,
}

impl<T> Signal<T> {
    pub fn new() -> Self { Self(Arc::new(Inner { slots: Mutex::new(Vec::new()), next_id: AtomicUsize::new(0) })) }

    pub fn connect<F>(&self, slot: F) -> SlotHandle<T>
    where F: Fn(&T) + Send + Sync + 'static {
        let id = self.0.next_id.fetch_add(1, Ordering::Relaxed);
        self.0.slots.lock().unwrap().push((id, Arc::new(slot)));
        SlotHandle { inner: Arc::downgrade(&self.0), id }
    }

    /// Invoke every connected slot with `value`, in registration order.
    pub fn emit(&self, value: &T) {
        // Clone out of the lock so a slot may connect or disconnect freely.
        let slots: Vec<Slot<T>> = {
            let guard = self.0.slots.lock().unwrap();
            guard.iter().map(|(_, s)| s.clone()).collect()
        };
        for slot in slots {
            slot(value);
        }
    }

    pub fn disconnect_all(&self) { self.0.slots.lock().unwrap().clear(); }

    pub fn slot_count(&self) -> usize { self.0.slots.lock().unwrap().len() }
}

impl<T> Default for Signal<T> {
    fn default() -> Self { Self::new() }
}

impl<T> Drop for SlotHandle<T> {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.slots.lock().unwrap().retain(|(id, _)| *id != self.id);
        }
    }
}

impl<T> SlotHandle<T> {
    /// Keep the slot connected for the signal's whole lifetime.
    pub fn forget(self) { std::mem::forget(self); }
}
