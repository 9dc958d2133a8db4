use crate::config::FilterConfig;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

use super::replication_engine::ReplicationState;
use super::window_registry::WindowList;

/// Всё разделяемое изменяемое состояние под одной блокировкой:
/// список окон, назначение main, состояние репликации и фильтры.
#[derive(Debug, Default)]
pub struct MultiboxState {
    pub windows: WindowList,
    pub replication: ReplicationState,
    pub filter: FilterConfig,
}

pub type SharedState = Arc<Mutex<MultiboxState>>;

impl MultiboxState {
    pub fn shared(filter: FilterConfig) -> SharedState {
        Arc::new(Mutex::new(Self {
            filter,
            ..Self::default()
        }))
    }

    pub fn status(&self) -> Status {
        Status {
            active: self.replication.is_active(),
            paused: self.replication.is_paused(),
            solo_main: self.replication.solo_main(),
            window_count: self.windows.len(),
            has_main: self.windows.main_window().is_some(),
        }
    }
}

/// Снимок статуса для наблюдателей
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Status {
    pub active: bool,
    pub paused: bool,
    pub solo_main: bool,
    pub window_count: usize,
    pub has_main: bool,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "мультибоксинг: {}, репликация: {}, solo main: {}, окон: {}{}",
            if self.active { "АКТИВЕН" } else { "НЕАКТИВЕН" },
            if self.paused { "ПАУЗА" } else { "АКТИВНА" },
            if self.solo_main { "ON" } else { "OFF" },
            self.window_count,
            if self.has_main { " (main назначено)" } else { "" }
        )
    }
}
