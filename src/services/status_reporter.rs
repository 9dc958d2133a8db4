use crate::events::TrackedWindow;
use parking_lot::Mutex;
use tracing::info;

use super::observers::EngineObserver;
use super::state::{SharedState, Status};

/// Наблюдатель для консольного режима: печатает статус и список окон.
/// Повторный одинаковый статус не печатается.
pub struct StatusReporter {
    state: SharedState,
    last_status: Mutex<Option<Status>>,
}

impl StatusReporter {
    pub fn new(state: SharedState) -> Self {
        Self {
            state,
            last_status: Mutex::new(None),
        }
    }

    /// `true`, если статус отличается от последнего напечатанного
    fn remember(&self, status: Status) -> bool {
        let mut last = self.last_status.lock();
        if *last == Some(status) {
            return false;
        }
        *last = Some(status);
        true
    }
}

impl EngineObserver for StatusReporter {
    fn on_status_change(&self) {
        let status = self.state.lock().status();
        if self.remember(status) {
            info!("Статус: {}", status);
        }
    }

    fn on_windows_updated(&self, windows: &[TrackedWindow]) {
        for (index, window) in windows.iter().enumerate() {
            info!("  #{} {} {}", index, window.handle, window);
        }
    }
}
