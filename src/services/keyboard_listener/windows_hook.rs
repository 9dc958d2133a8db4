//! Глобальный перехват клавиатуры через WH_KEYBOARD_LL.
//!
//! Хук ставится в отдельном потоке с собственным циклом GetMessageW, без него
//! события не доставляются. Процедура хука не получает пользовательских данных,
//! поэтому обработчик хранится в глобальной переменной: одновременно активен
//! только один слушатель. События никогда не подавляются, игра получает их как обычно.

use crate::error::{MultiboxError, Result};
use crate::events::{KeyEvent, KeyState};
use crate::services::controller::Controller;
use crate::trace_if_enabled;
use parking_lot::{const_mutex, Mutex};
use std::collections::HashSet;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use tokio::sync::oneshot;
use tracing::{info, warn};
use windows_sys::Win32::Foundation::{LPARAM, LRESULT, WPARAM};
use windows_sys::Win32::System::Threading::GetCurrentThreadId;
use windows_sys::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, GetMessageW, PeekMessageW, PostThreadMessageW, SetWindowsHookExW,
    UnhookWindowsHookEx, HC_ACTION, KBDLLHOOKSTRUCT, LLKHF_INJECTED, MSG, PM_NOREMOVE,
    WH_KEYBOARD_LL, WM_KEYDOWN, WM_KEYUP, WM_QUIT, WM_SYSKEYDOWN, WM_SYSKEYUP,
};

use super::key_mapping::KeyMapper;
use super::modifier_state::ModifierState;
use super::r#trait::KeyboardListenerTrait;

struct HookHandler {
    controller: Arc<Controller>,
    modifiers: ModifierState,
    /// Удерживаемые клавиши: повторный WM_KEYDOWN без WM_KEYUP это автоповтор
    held: HashSet<u32>,
}

static HOOK_HANDLER: Mutex<Option<HookHandler>> = const_mutex(None);

pub struct HookKeyboardListener {
    controller: Arc<Controller>,
}

impl HookKeyboardListener {
    pub fn new(controller: Arc<Controller>) -> Self {
        info!("Инициализация HookKeyboardListener");
        Self { controller }
    }

    async fn run_impl(self) -> Result<()> {
        {
            let mut handler = HOOK_HANDLER.lock();
            if handler.is_some() {
                return Err(MultiboxError::Internal("хук клавиатуры уже установлен".to_string()));
            }
            *handler = Some(HookHandler {
                controller: self.controller.clone(),
                modifiers: ModifierState::new(),
                held: HashSet::new(),
            });
        }
        let control = Arc::new(HookControl::default());
        let _guard = HookGuard {
            control: control.clone(),
        };

        let (started_tx, started_rx) = oneshot::channel::<Result<()>>();
        let (done_tx, done_rx) = oneshot::channel::<()>();

        thread::Builder::new()
            .name("keyboard-hook".to_string())
            .spawn(move || {
                hook_thread(&control, started_tx);
                let _ = done_tx.send(());
            })?;

        match started_rx.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(MultiboxError::Internal(
                    "поток хука завершился до установки".to_string(),
                ))
            }
        }

        info!("HookKeyboardListener запущен (WH_KEYBOARD_LL)");
        let _ = done_rx.await;
        warn!("Цикл сообщений хука завершился");
        Ok(())
    }
}

/// Связь задачи слушателя с потоком хука. Поток записывает свой id до установки
/// хука и проверяет флаг остановки после неё: задача, прерванная в любой момент,
/// не оставляет хук установленным.
#[derive(Debug, Default)]
struct HookControl {
    thread_id: AtomicU32,
    stopped: AtomicBool,
}

impl HookControl {
    fn register(&self, thread_id: u32) {
        self.thread_id.store(thread_id, Ordering::SeqCst);
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Поток, которому нужно отправить WM_QUIT; `None`, если он ещё не записан
    fn stop(&self) -> Option<u32> {
        self.stopped.store(true, Ordering::SeqCst);
        match self.thread_id.load(Ordering::SeqCst) {
            0 => None,
            thread_id => Some(thread_id),
        }
    }
}

/// Останавливает цикл сообщений и снимает обработчик
struct HookGuard {
    control: Arc<HookControl>,
}

impl Drop for HookGuard {
    fn drop(&mut self) {
        if let Some(thread_id) = self.control.stop() {
            unsafe { PostThreadMessageW(thread_id, WM_QUIT, 0, 0) };
        }
        HOOK_HANDLER.lock().take();
    }
}

fn hook_thread(control: &HookControl, started: oneshot::Sender<Result<()>>) {
    // Очередь сообщений создаётся первым PeekMessageW, без неё WM_QUIT из HookGuard теряется
    unsafe {
        let mut msg: MSG = std::mem::zeroed();
        PeekMessageW(&mut msg, ptr::null_mut(), 0, 0, PM_NOREMOVE);
    }
    control.register(unsafe { GetCurrentThreadId() });

    let hook = unsafe { SetWindowsHookExW(WH_KEYBOARD_LL, Some(hook_proc), ptr::null_mut(), 0) };
    if hook.is_null() {
        let _ = started.send(Err(MultiboxError::Backend(
            "SetWindowsHookExW завершился ошибкой".to_string(),
        )));
        return;
    }

    // Задачу прервали, пока хук ставился
    if control.is_stopped() {
        unsafe { UnhookWindowsHookEx(hook) };
        return;
    }

    let _ = started.send(Ok(()));

    // 0 на WM_QUIT, -1 на ошибку: в обоих случаях выходим
    unsafe {
        let mut msg: MSG = std::mem::zeroed();
        while GetMessageW(&mut msg, ptr::null_mut(), 0, 0) > 0 {}
        UnhookWindowsHookEx(hook);
    }
}

unsafe extern "system" fn hook_proc(n_code: i32, w_param: WPARAM, l_param: LPARAM) -> LRESULT {
    if n_code == HC_ACTION as i32 {
        let kb = unsafe { &*(l_param as *const KBDLLHOOKSTRUCT) };

        if kb.flags & LLKHF_INJECTED == 0 {
            match w_param as u32 {
                WM_KEYDOWN | WM_SYSKEYDOWN => dispatch(kb.vkCode, true),
                WM_KEYUP | WM_SYSKEYUP => dispatch(kb.vkCode, false),
                _ => {}
            }
        }
    }

    unsafe { CallNextHookEx(ptr::null_mut(), n_code, w_param, l_param) }
}

fn dispatch(vk: u32, down: bool) {
    let (controller, event) = {
        let mut guard = HOOK_HANDLER.lock();
        let Some(handler) = guard.as_mut() else {
            return;
        };

        if let Some(modifier) = KeyMapper::virtual_key_modifier(vk) {
            handler.modifiers.update(modifier, down);
            return;
        }

        let state = match (down, handler.held.contains(&vk)) {
            (false, _) => {
                handler.held.remove(&vk);
                KeyState::Released
            }
            (true, true) => KeyState::Repeat,
            (true, false) => {
                handler.held.insert(vk);
                KeyState::Pressed
            }
        };

        let key = handler.modifiers.apply(KeyMapper::from_virtual_key(vk));
        (handler.controller.clone(), KeyEvent::new(key, state))
    };

    trace_if_enabled!("Событие клавиши: {}", event);
    controller.handle_key(&event);
}

#[async_trait::async_trait]
impl KeyboardListenerTrait for HookKeyboardListener {
    async fn run(self: Box<Self>) -> Result<()> {
        (*self).run_impl().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_before_thread_registers() {
        let control = HookControl::default();
        assert_eq!(control.stop(), None);

        // Поток записывает id позже и видит остановку сразу после установки хука
        control.register(42);
        assert!(control.is_stopped());
    }

    #[test]
    fn stop_after_thread_registers() {
        let control = HookControl::default();
        control.register(42);
        assert!(!control.is_stopped());
        assert_eq!(control.stop(), Some(42));
    }

    #[test]
    fn aborted_listener_quits_hook_thread() {
        let control = Arc::new(HookControl::default());
        let (done_tx, done_rx) = std::sync::mpsc::channel();
        let (started_tx, _started_rx) = oneshot::channel();
        let thread_control = control.clone();
        thread::spawn(move || {
            hook_thread(&thread_control, started_tx);
            let _ = done_tx.send(());
        });

        // Guard срабатывает, не дождавшись ответа потока о запуске
        thread::sleep(std::time::Duration::from_millis(50));
        drop(HookGuard { control });

        assert!(done_rx.recv_timeout(std::time::Duration::from_secs(5)).is_ok());
    }
}
