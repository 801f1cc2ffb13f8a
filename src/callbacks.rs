//! Upper-layer callback registry (spec §6 "Callback IDs").
//!
//! The service never blocks on a callback; handlers run synchronously on
//! the service task and must return quickly. Unregistered IDs fall back to
//! the `Unhandled` hook instead of being silently dropped.

/// One of the asynchronous events the data-link service surfaces.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, defmt::Format)]
pub enum CallbackId {
    Unhandled,
    TxSuccess,
    RxSuccess,
    TxFailure,
    RxQueueFull,
    TxQueueFull,
    ArpResolveFailed,
    ArpLimitReached,
}

pub const CALLBACK_COUNT: usize = 8;

fn slot(id: CallbackId) -> usize {
    match id {
        CallbackId::Unhandled => 0,
        CallbackId::TxSuccess => 1,
        CallbackId::RxSuccess => 2,
        CallbackId::TxFailure => 3,
        CallbackId::RxQueueFull => 4,
        CallbackId::TxQueueFull => 5,
        CallbackId::ArpResolveFailed => 6,
        CallbackId::ArpLimitReached => 7,
    }
}

/// Fixed-size table of handlers, one slot per [`CallbackId`]. Registering a
/// handler for the same ID twice replaces the previous one.
pub struct CallbackRegistry {
    handlers: [Option<Box<dyn FnMut() + Send>>; CALLBACK_COUNT],
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self { handlers: [const { None }; CALLBACK_COUNT] }
    }

    pub fn register(&mut self, id: CallbackId, handler: Box<dyn FnMut() + Send>) {
        self.handlers[slot(id)] = Some(handler);
    }

    /// Fire `id`'s handler if registered, otherwise fall back to the
    /// `Unhandled` handler (if any is registered for it).
    pub fn fire(&mut self, id: CallbackId) {
        if self.handlers[slot(id)].is_some() {
            if let Some(h) = self.handlers[slot(id)].as_mut() {
                h();
            }
            return;
        }
        if id != CallbackId::Unhandled {
            if let Some(h) = self.handlers[slot(CallbackId::Unhandled)].as_mut() {
                h();
            }
        }
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}
