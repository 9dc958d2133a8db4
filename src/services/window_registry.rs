use crate::debug_if_enabled;
use crate::error::{MultiboxError, Result};
use crate::events::{TrackedWindow, WindowHandle};
use std::sync::Arc;

use super::backend::WindowBackend;
use super::observers::ObserverSet;
use super::state::SharedState;

/// Список отслеживаемых окон и назначение main.
///
/// Инварианты: не более одного окна с `is_main`, дескрипторы уникальны.
#[derive(Debug, Default, Clone)]
pub struct WindowList {
    windows: Vec<TrackedWindow>,
    main_handle: Option<WindowHandle>,
}

impl WindowList {
    /// Заменяет список целиком. Main сохраняется, только если его дескриптор снова найден.
    pub fn replace(&mut self, mut windows: Vec<TrackedWindow>) {
        let main_handle = self
            .main_handle
            .filter(|handle| windows.iter().any(|w| w.handle == *handle));

        for window in &mut windows {
            window.is_main = Some(window.handle) == main_handle;
        }

        self.windows = windows;
        self.main_handle = main_handle;
    }

    /// Назначает main; неизвестный дескриптор ничего не меняет
    pub fn set_main(&mut self, handle: WindowHandle) -> Result<&TrackedWindow> {
        let index = self
            .windows
            .iter()
            .position(|w| w.handle == handle)
            .ok_or(MultiboxError::WindowNotFound(handle))?;

        for window in &mut self.windows {
            window.is_main = window.handle == handle;
        }
        self.main_handle = Some(handle);

        Ok(&self.windows[index])
    }

    pub fn is_tracked(&self, handle: WindowHandle) -> bool {
        self.windows.iter().any(|w| w.handle == handle)
    }

    pub fn main_window(&self) -> Option<&TrackedWindow> {
        self.windows.iter().find(|w| w.is_main)
    }

    pub fn slaves(&self) -> impl Iterator<Item = &TrackedWindow> {
        self.windows.iter().filter(|w| !w.is_main)
    }

    pub fn get(&self, index: usize) -> Option<&TrackedWindow> {
        self.windows.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedWindow> {
        self.windows.iter()
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn to_vec(&self) -> Vec<TrackedWindow> {
        self.windows.clone()
    }
}

/// Поиск и учёт окон целевого приложения
pub struct WindowRegistry {
    backend: Arc<dyn WindowBackend>,
    state: SharedState,
    observers: Arc<ObserverSet>,
    keywords: Vec<String>,
}

impl WindowRegistry {
    pub fn new(
        backend: Arc<dyn WindowBackend>,
        state: SharedState,
        observers: Arc<ObserverSet>,
        keywords: &[String],
    ) -> Self {
        Self {
            backend,
            state,
            observers,
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    /// Перечисляет видимые окна и заново строит список отслеживаемых.
    /// При ошибке перечисления прежний список сохраняется.
    pub fn discover(&self) -> usize {
        let handles = match self.backend.enumerate_windows() {
            Ok(handles) => handles,
            Err(e) => {
                self.observers.error("Error", format!("Не удалось перечислить окна: {}", e));
                return self.len();
            }
        };

        let mut found: Vec<TrackedWindow> = Vec::new();
        for handle in handles {
            if found.iter().any(|w| w.handle == handle) {
                continue;
            }

            let title = match self.backend.window_title(handle) {
                Ok(title) => title,
                Err(e) => {
                    debug_if_enabled!("Пропускаем окно {}: {}", handle, e);
                    continue;
                }
            };

            if !TrackedWindow::title_matches(&title, &self.keywords) {
                continue;
            }

            match self.backend.window_process_id(handle) {
                Ok(pid) => found.push(TrackedWindow::new(handle, pid, title)),
                Err(e) => debug_if_enabled!("Окно {} '{}' исключено: {}", handle, title, e),
            }
        }

        let (count, snapshot) = {
            let mut state = self.state.lock();
            state.windows.replace(found);
            (state.windows.len(), state.windows.to_vec())
        };

        self.observers.info("System", format!("Найдено окон: {}", count));
        self.observers.windows_updated(&snapshot);
        self.observers.status_changed();

        count
    }

    pub fn set_main(&self, handle: WindowHandle) -> Result<()> {
        let result = {
            let mut state = self.state.lock();
            let title = state.windows.set_main(handle).map(|w| w.title.clone());
            title.map(|title| (title, state.windows.to_vec()))
        };

        match result {
            Ok((title, snapshot)) => {
                self.observers.info("Config", format!("Окно '{}' ({}) назначено MAIN", title, handle));
                self.observers.windows_updated(&snapshot);
                self.observers.status_changed();
                Ok(())
            }
            Err(e) => {
                self.observers.error("Error", format!("Нельзя назначить MAIN: {}", e));
                Err(e)
            }
        }
    }

    /// Назначает main по позиции в списке (так окно выбирается в интерфейсе)
    pub fn set_main_by_index(&self, index: usize) -> Result<()> {
        let handle = self.state.lock().windows.get(index).map(|w| w.handle);
        match handle {
            Some(handle) => self.set_main(handle),
            None => {
                let e = MultiboxError::UnresolvedTarget(format!("окна #{} нет в списке", index));
                self.observers.error("Error", format!("Нельзя назначить MAIN: {}", e));
                Err(e)
            }
        }
    }

    pub fn is_tracked(&self, handle: WindowHandle) -> bool {
        self.state.lock().windows.is_tracked(handle)
    }

    pub fn slaves(&self) -> Vec<TrackedWindow> {
        self.state.lock().windows.slaves().cloned().collect()
    }

    pub fn windows(&self) -> Vec<TrackedWindow> {
        self.state.lock().windows.to_vec()
    }

    pub fn main_window(&self) -> Option<TrackedWindow> {
        self.state.lock().windows.main_window().cloned()
    }

    pub fn len(&self) -> usize {
        self.state.lock().windows.len()
    }
}
