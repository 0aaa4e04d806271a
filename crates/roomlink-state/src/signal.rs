//! Typed multi-subscriber signals
//!
//! Each lifecycle event of a room gets its own `Signal<T>`. Listeners run
//! synchronously, in subscription order, on the thread that dispatches.

/// Handle returned when subscribing, used to unsubscribe later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

struct Slot<T> {
    id: ListenerId,
    once: bool,
    callback: Box<dyn FnMut(&T)>,
}

/// A list of listeners for one kind of event
pub struct Signal<T> {
    slots: Vec<Slot<T>>,
    next_id: u64,
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Signal<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            next_id: 0,
        }
    }

    /// Subscribe a listener for every dispatch
    pub fn add(&mut self, callback: impl FnMut(&T) + 'static) -> ListenerId {
        self.push(callback, false)
    }

    /// Subscribe a listener that is removed after its first dispatch
    pub fn add_once(&mut self, callback: impl FnMut(&T) + 'static) -> ListenerId {
        self.push(callback, true)
    }

    fn push(&mut self, callback: impl FnMut(&T) + 'static, once: bool) -> ListenerId {
        let id = ListenerId::from_raw(self.next_id);
        self.next_id += 1;
        self.slots.push(Slot {
            id,
            once,
            callback: Box::new(callback),
        });
        id
    }

    /// Unsubscribe one listener. Returns false if it was not subscribed.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.slots.len();
        self.slots.retain(|slot| slot.id != id);
        self.slots.len() != before
    }

    pub fn remove_all(&mut self) {
        self.slots.clear();
    }

    /// Call every listener with `payload`
    pub fn dispatch(&mut self, payload: &T) {
        for slot in &mut self.slots {
            (slot.callback)(payload);
        }
        self.slots.retain(|slot| !slot.once);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl<T> std::fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("listeners", &self.slots.len())
            .finish()
    }
}
