use serde::{Deserialize, Serialize};
use std::fmt;

/// Непрозрачный идентификатор окна (HWND в Windows, XID в X11)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowHandle(pub u64);

impl WindowHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Отслеживаемое окно
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackedWindow {
    pub handle: WindowHandle,
    pub process_id: u32,
    pub title: String,
    pub is_main: bool,
}

impl TrackedWindow {
    pub fn new(handle: WindowHandle, process_id: u32, title: String) -> Self {
        Self {
            handle,
            process_id,
            title,
            is_main: false,
        }
    }

    pub fn with_main(mut self, is_main: bool) -> Self {
        self.is_main = is_main;
        self
    }

    /// Проверить, содержит ли заголовок любое из ключевых слов (регистронезависимо).
    /// Ключевые слова должны быть уже приведены к нижнему регистру.
    pub fn title_matches(title: &str, keywords_lower: &[String]) -> bool {
        let title_lower = title.to_lowercase();
        keywords_lower
            .iter()
            .any(|keyword| title_lower.contains(keyword.as_str()))
    }
}

impl fmt::Display for TrackedWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PID:{:5} | {}", self.process_id, self.title)?;
        if self.is_main {
            write!(f, " [MAIN]")?;
        }
        Ok(())
    }
}
