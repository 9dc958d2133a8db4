//! Граница с оконной системой.
//!
//! Этот модуль отвечает ТОЛЬКО за пять примитивов: перечисление видимых окон,
//! чтение заголовка, определение PID, получение активного окна и отправку
//! события клавиши в конкретное окно. Никакой логики репликации здесь нет:
//! все решения принимают ReplicationEngine и CommandDispatcher.

mod dry_run;
#[cfg(target_os = "windows")]
mod win32;
#[cfg(target_os = "linux")]
mod xdotool;

pub use self::dry_run::DryRunBackend;

use crate::error::Result;
use crate::events::{KeyPost, WindowHandle};
use std::sync::Arc;
use tracing::info;

/// Примитивы оконной системы, от которых зависит ядро
pub trait WindowBackend: Send + Sync {
    /// Все видимые окна верхнего уровня в порядке, который отдаёт ОС
    fn enumerate_windows(&self) -> Result<Vec<WindowHandle>>;

    fn window_title(&self, handle: WindowHandle) -> Result<String>;

    fn window_process_id(&self, handle: WindowHandle) -> Result<u32>;

    fn foreground_window(&self) -> Option<WindowHandle>;

    /// Отправить одно событие (нажатие или отпускание) без активации окна
    fn post_key_event(&self, post: KeyPost) -> Result<()>;
}

/// Factory function to create the window backend for the current platform
pub fn create_window_backend(dry_run: bool) -> Result<Arc<dyn WindowBackend>> {
    if dry_run {
        info!("Dry-run режим - используется эмуляция оконной системы");
        return Ok(Arc::new(DryRunBackend::with_demo_windows()));
    }

    create_platform_backend()
}

#[cfg(target_os = "windows")]
fn create_platform_backend() -> Result<Arc<dyn WindowBackend>> {
    info!("Используем Win32 (EnumWindows + PostMessageW)");
    Ok(Arc::new(win32::Win32Backend::new()))
}

#[cfg(target_os = "linux")]
fn create_platform_backend() -> Result<Arc<dyn WindowBackend>> {
    let backend = xdotool::XdotoolBackend::new();
    backend.test()?;
    info!("Используем xdotool");
    Ok(Arc::new(backend))
}

#[cfg(not(any(target_os = "windows", target_os = "linux")))]
fn create_platform_backend() -> Result<Arc<dyn WindowBackend>> {
    Err(crate::error::MultiboxError::Backend(
        "Платформа не поддерживается, запустите с --dry-run".to_string(),
    ))
}
