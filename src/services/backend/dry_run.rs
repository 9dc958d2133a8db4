use crate::error::{MultiboxError, Result};
use crate::events::{KeyPost, WindowHandle};
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use tracing::info;

use super::WindowBackend;

#[derive(Debug, Clone)]
struct FakeWindow {
    handle: WindowHandle,
    process_id: Option<u32>,
    title: String,
}

/// Эмуляция оконной системы: окна задаются вручную, отправленные события запоминаются
pub struct DryRunBackend {
    windows: RwLock<Vec<FakeWindow>>,
    foreground: RwLock<Option<WindowHandle>>,
    posted: Mutex<Vec<KeyPost>>,
    failing: RwLock<HashSet<WindowHandle>>,
}

impl Default for DryRunBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DryRunBackend {
    pub fn new() -> Self {
        Self {
            windows: RwLock::new(Vec::new()),
            foreground: RwLock::new(None),
            posted: Mutex::new(Vec::new()),
            failing: RwLock::new(HashSet::new()),
        }
    }

    /// Три клиента игры и одно постороннее окно; активен первый клиент
    pub fn with_demo_windows() -> Self {
        let backend = Self::new();
        backend.add_window(WindowHandle::new(0x1001), Some(4101), "World of Warcraft");
        backend.add_window(WindowHandle::new(0x1002), Some(4102), "World of Warcraft");
        backend.add_window(WindowHandle::new(0x2001), Some(900), "Terminal - dry_run");
        backend.add_window(WindowHandle::new(0x1003), Some(4103), "World of Warcraft");
        backend.set_foreground(Some(WindowHandle::new(0x1001)));
        backend
    }

    /// `process_id = None` эмулирует окно, PID которого определить не удаётся
    pub fn add_window(&self, handle: WindowHandle, process_id: Option<u32>, title: &str) {
        self.windows.write().push(FakeWindow {
            handle,
            process_id,
            title: title.to_string(),
        });
    }

    pub fn remove_window(&self, handle: WindowHandle) {
        self.windows.write().retain(|w| w.handle != handle);
    }

    pub fn set_foreground(&self, handle: Option<WindowHandle>) {
        *self.foreground.write() = handle;
    }

    /// Все последующие отправки в это окно будут завершаться ошибкой
    pub fn fail_posts_to(&self, handle: WindowHandle) {
        self.failing.write().insert(handle);
    }

    pub fn posted(&self) -> Vec<KeyPost> {
        self.posted.lock().clone()
    }

    pub fn clear_posted(&self) {
        self.posted.lock().clear();
    }

    fn find(&self, handle: WindowHandle) -> Result<FakeWindow> {
        self.windows
            .read()
            .iter()
            .find(|w| w.handle == handle)
            .cloned()
            .ok_or_else(|| MultiboxError::Backend(format!("окно {} не существует", handle)))
    }
}

impl WindowBackend for DryRunBackend {
    fn enumerate_windows(&self) -> Result<Vec<WindowHandle>> {
        Ok(self.windows.read().iter().map(|w| w.handle).collect())
    }

    fn window_title(&self, handle: WindowHandle) -> Result<String> {
        Ok(self.find(handle)?.title)
    }

    fn window_process_id(&self, handle: WindowHandle) -> Result<u32> {
        self.find(handle)?
            .process_id
            .ok_or_else(|| MultiboxError::Backend(format!("PID окна {} недоступен", handle)))
    }

    fn foreground_window(&self) -> Option<WindowHandle> {
        *self.foreground.read()
    }

    fn post_key_event(&self, post: KeyPost) -> Result<()> {
        if self.failing.read().contains(&post.handle) {
            return Err(MultiboxError::Injection(format!(
                "окно {} не принимает события",
                post.handle
            )));
        }

        info!("[DRY RUN] {} {:?} -> {}", post.key, post.state, post.handle);
        self.posted.lock().push(post);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{InjectedKey, KeyState};

    #[test]
    fn demo_windows_are_enumerated_in_order() {
        let backend = DryRunBackend::with_demo_windows();
        let handles = backend.enumerate_windows().unwrap();

        assert_eq!(handles.len(), 4);
        assert_eq!(handles[0], WindowHandle::new(0x1001));
        assert_eq!(backend.foreground_window(), Some(WindowHandle::new(0x1001)));
        assert_eq!(backend.window_title(handles[2]).unwrap(), "Terminal - dry_run");
    }

    #[test]
    fn posts_are_recorded_and_failures_injected() {
        let backend = DryRunBackend::new();
        let ok = WindowHandle::new(1);
        let broken = WindowHandle::new(2);
        backend.fail_posts_to(broken);

        backend.post_key_event(KeyPost::press(ok, InjectedKey::Char('a'))).unwrap();
        assert!(backend.post_key_event(KeyPost::press(broken, InjectedKey::Char('a'))).is_err());

        let posted = backend.posted();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].handle, ok);
        assert_eq!(posted[0].state, KeyState::Pressed);
    }

    #[test]
    fn missing_pid_is_an_error() {
        let backend = DryRunBackend::new();
        backend.add_window(WindowHandle::new(7), None, "WoW");
        assert!(backend.window_process_id(WindowHandle::new(7)).is_err());
        assert!(backend.window_title(WindowHandle::new(8)).is_err());
    }
}
