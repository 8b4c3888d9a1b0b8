use std::sync::Mutex;

use tubegate_core::TabId;

/// Last tab the extension reported as focused; answers
/// `getCurrentTabId` with 0 until one is known.
#[derive(Default)]
pub struct ActiveTab {
    current: Mutex<Option<TabId>>,
}

impl ActiveTab {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activate(&self, tab_id: TabId) {
        *self.current.lock().expect("active tab poisoned") = Some(tab_id);
    }

    /// Forget the tab if it was the active one, e.g. on close.
    pub fn deactivate(&self, tab_id: TabId) {
        let mut current = self.current.lock().expect("active tab poisoned");
        if *current == Some(tab_id) {
            *current = None;
        }
    }

    pub fn current(&self) -> TabId {
        self.current
            .lock()
            .expect("active tab poisoned")
            .unwrap_or(0)
    }
}
