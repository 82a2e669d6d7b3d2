//! Ordered handler storage.

/// An append-only, ordered list of handlers.
///
/// Insertion order is execution order. A run never copies the list; it
/// walks it by index, so the only per-run state is a cursor.
#[derive(Debug, Clone)]
pub struct Registry<H> {
    slots: Vec<H>,
}

impl<H> Registry<H> {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Appends a handler. Returns the registry so registrations chain.
    pub fn register(&mut self, handler: H) -> &mut Self {
        self.slots.push(handler);
        self
    }

    /// The handlers in execution order.
    pub fn handlers(&self) -> &[H] {
        &self.slots
    }

    pub fn get(&self, index: usize) -> Option<&H> {
        self.slots.get(index)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl<H> Default for Registry<H> {
    fn default() -> Self { Self::new() }
}
