pub mod keyboard;
pub mod window;

pub use keyboard::{Hotkey, InjectedKey, KeyClass, KeyEvent, KeyState, RawKey, SpecialKey};
pub use window::{TrackedWindow, WindowHandle};

/// Событие, отправленное в конкретное окно
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPost {
    pub handle: WindowHandle,
    pub key: InjectedKey,
    pub state: KeyState,
    pub timestamp: std::time::Instant,
}

impl KeyPost {
    pub fn new(handle: WindowHandle, key: InjectedKey, state: KeyState) -> Self {
        Self {
            handle,
            key,
            state,
            timestamp: std::time::Instant::now(),
        }
    }

    pub fn press(handle: WindowHandle, key: InjectedKey) -> Self {
        Self::new(handle, key, KeyState::Pressed)
    }

    pub fn release(handle: WindowHandle, key: InjectedKey) -> Self {
        Self::new(handle, key, KeyState::Released)
    }
}
