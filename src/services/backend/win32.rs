//! Win32: EnumWindows для поиска окон, PostMessageW для отправки клавиш.
//!
//! PostMessageW кладёт WM_KEYDOWN/WM_KEYUP прямо в очередь сообщений окна,
//! поэтому окно не активируется, а событие не проходит через WH_KEYBOARD_LL
//! (своих же событий слушатель не видит).

use crate::error::{MultiboxError, Result};
use crate::events::{InjectedKey, KeyPost, KeyState, SpecialKey, WindowHandle};
use tracing::debug;
use windows_sys::Win32::Foundation::{BOOL, HWND, LPARAM, TRUE};
use windows_sys::Win32::UI::Input::KeyboardAndMouse::{
    MapVirtualKeyW, VkKeyScanW, MAPVK_VK_TO_VSC, VK_RETURN,
};
use windows_sys::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetForegroundWindow, GetWindowTextLengthW, GetWindowTextW,
    GetWindowThreadProcessId, IsWindowVisible, PostMessageW, WM_KEYDOWN, WM_KEYUP,
};

use super::WindowBackend;

pub struct Win32Backend;

impl Win32Backend {
    pub fn new() -> Self {
        Self
    }
}

fn to_hwnd(handle: WindowHandle) -> HWND {
    handle.value() as usize as HWND
}

fn from_hwnd(hwnd: HWND) -> WindowHandle {
    WindowHandle::new(hwnd as usize as u64)
}

/// Виртуальный код клавиши: для символов через раскладку (VkKeyScanW), для специальных напрямую
fn virtual_key(key: InjectedKey) -> Result<u16> {
    match key {
        InjectedKey::Special(SpecialKey::Return) => Ok(VK_RETURN),
        InjectedKey::Char(c) => {
            let code = u16::try_from(c as u32)
                .map_err(|_| MultiboxError::Injection(format!("символ {:?} вне BMP", c)))?;
            let scan = unsafe { VkKeyScanW(code) };
            if scan == -1 {
                return Err(MultiboxError::Injection(format!(
                    "символ {:?} отсутствует в текущей раскладке",
                    c
                )));
            }
            // Младший байт - код клавиши, старший - состояние Shift/Ctrl/Alt
            Ok((scan as u16) & 0xff)
        }
    }
}

/// lParam для WM_KEYDOWN/WM_KEYUP: счётчик повторов 1, скан-код, флаги перехода для отпускания
fn key_lparam(vk: u16, state: KeyState) -> LPARAM {
    let scan = unsafe { MapVirtualKeyW(vk as u32, MAPVK_VK_TO_VSC) } & 0xff;
    let mut lparam: u32 = 1 | (scan << 16);
    if state == KeyState::Released {
        lparam |= (1 << 30) | (1 << 31);
    }
    lparam as i32 as LPARAM
}

unsafe extern "system" fn enum_proc(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let handles = &mut *(lparam as *mut Vec<WindowHandle>);
    if IsWindowVisible(hwnd) != 0 {
        handles.push(from_hwnd(hwnd));
    }
    TRUE
}

impl WindowBackend for Win32Backend {
    fn enumerate_windows(&self) -> Result<Vec<WindowHandle>> {
        let mut handles: Vec<WindowHandle> = Vec::new();
        let ok = unsafe {
            EnumWindows(Some(enum_proc), &mut handles as *mut Vec<WindowHandle> as LPARAM)
        };
        if ok == 0 {
            return Err(MultiboxError::Backend("EnumWindows завершился ошибкой".to_string()));
        }
        Ok(handles)
    }

    fn window_title(&self, handle: WindowHandle) -> Result<String> {
        let hwnd = to_hwnd(handle);
        let len = unsafe { GetWindowTextLengthW(hwnd) };
        if len <= 0 {
            return Ok(String::new());
        }

        let mut buf = vec![0u16; len as usize + 1];
        let read = unsafe { GetWindowTextW(hwnd, buf.as_mut_ptr(), buf.len() as i32) };
        if read < 0 {
            return Err(MultiboxError::Backend(format!("GetWindowTextW для {}", handle)));
        }
        Ok(String::from_utf16_lossy(&buf[..read as usize]))
    }

    fn window_process_id(&self, handle: WindowHandle) -> Result<u32> {
        let mut pid: u32 = 0;
        let thread_id = unsafe { GetWindowThreadProcessId(to_hwnd(handle), &mut pid) };
        if thread_id == 0 || pid == 0 {
            return Err(MultiboxError::Backend(format!("не удалось получить PID окна {}", handle)));
        }
        Ok(pid)
    }

    fn foreground_window(&self) -> Option<WindowHandle> {
        let hwnd = unsafe { GetForegroundWindow() };
        (!hwnd.is_null()).then(|| from_hwnd(hwnd))
    }

    fn post_key_event(&self, post: KeyPost) -> Result<()> {
        let vk = virtual_key(post.key)?;
        let message = match post.state {
            KeyState::Released => WM_KEYUP,
            KeyState::Pressed | KeyState::Repeat => WM_KEYDOWN,
        };

        let ok = unsafe {
            PostMessageW(to_hwnd(post.handle), message, vk as usize, key_lparam(vk, post.state))
        };
        if ok == 0 {
            return Err(MultiboxError::Injection(format!(
                "PostMessageW в {} для {} вернул 0",
                post.handle, post.key
            )));
        }

        debug!("PostMessageW {} {:?} -> {}", post.key, post.state, post.handle);
        Ok(())
    }
}
