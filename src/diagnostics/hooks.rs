//! Page lifecycle events for profilers and debug overlays.

use crate::allocators::page::PageId;

/// Something happened to a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArenaEvent {
    /// The backend created a new page (it starts in `unused`).
    PageCreated {
        page: PageId,
        device_address: u64,
    },
    /// A clean page moved from `unused` to `used`.
    PageAcquired { page: PageId },
    /// A commit moved `count` pages to `pending`.
    PagesCommitted { count: usize },
    /// A pending page's fence passed; it is back in `unused`.
    PageRetired { page: PageId, fence_value: u64 },
    /// A page's memory went back to the backend.
    PageFreed { page: PageId },
}

/// Callback receiving [`ArenaEvent`]s.
pub type EventHook = Box<dyn FnMut(&ArenaEvent) + Send>;

/// Optional event sink owned by an arena.
#[derive(Default)]
pub(crate) struct EventHooks {
    hook: Option<EventHook>,
}

impl EventHooks {
    pub fn set(&mut self, hook: Option<EventHook>) {
        self.hook = hook;
    }

    pub fn is_enabled(&self) -> bool {
        self.hook.is_some()
    }

    #[inline]
    pub fn emit(&mut self, event: ArenaEvent) {
        if let Some(hook) = self.hook.as_mut() {
            hook(&event);
        }
    }
}

impl std::fmt::Debug for EventHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHooks")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_hook_receives_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let mut hooks = EventHooks::default();
        assert!(!hooks.is_enabled());
        hooks.emit(ArenaEvent::PagesCommitted { count: 1 });

        hooks.set(Some(Box::new(move |event| sink.lock().unwrap().push(event.clone()))));
        hooks.emit(ArenaEvent::PagesCommitted { count: 2 });

        assert_eq!(
            *seen.lock().unwrap(),
            vec![ArenaEvent::PagesCommitted { count: 2 }]
        );
    }
}
