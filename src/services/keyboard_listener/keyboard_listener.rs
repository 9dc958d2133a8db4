use crate::error::{MultiboxError, Result};
use crate::events::{KeyEvent, KeyState};
use crate::services::controller::Controller;
use crate::trace_if_enabled;
use crate::utils::DeviceFinder;
use evdev::{Device, EventType, KeyCode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use super::key_mapping::KeyMapper;
use super::modifier_state::ModifierState;
use super::r#trait::KeyboardListenerTrait;

/// Чтение клавиатуры через evdev.
///
/// Устройство НЕ захватывается эксклюзивно: нажатия должны по-прежнему
/// доходить до активного окна, слушатель только наблюдает за ними.
pub struct EvdevKeyboardListener {
    controller: Arc<Controller>,
    device: Device,
}

impl EvdevKeyboardListener {
    pub fn new(device_path: &str, controller: Arc<Controller>) -> Result<Self> {
        info!("Инициализация EvdevKeyboardListener");

        let device_path = DeviceFinder::find_keyboard_device(device_path)?;

        let device = Device::open(&device_path).map_err(|e| {
            MultiboxError::DeviceNotFound(format!(
                "Не удалось открыть устройство {:?}: {}",
                device_path, e
            ))
        })?;

        info!("Устройство: {}", device.name().unwrap_or("Unknown"));
        info!("Физический путь: {:?}", device.physical_path());

        Ok(Self { controller, device })
    }

    async fn run_impl(self) -> Result<()> {
        let stop = Arc::new(AtomicBool::new(false));
        let _stop_guard = StopOnDrop(stop.clone());
        let (done_tx, done_rx) = oneshot::channel();

        let Self { controller, device } = self;

        thread::Builder::new()
            .name("evdev-capture".to_string())
            .spawn(move || {
                let result = capture_loop(device, &controller, &stop);
                let _ = done_tx.send(result);
            })?;

        info!("EvdevKeyboardListener запущен, начинаем чтение событий");

        match done_rx.await {
            Ok(result) => result,
            Err(_) => Err(MultiboxError::Internal(
                "поток чтения клавиатуры завершился аварийно".to_string(),
            )),
        }
    }
}

/// Выставляет флаг остановки, когда задача слушателя прерывается
struct StopOnDrop(Arc<AtomicBool>);

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

// fetch_events блокирует поток, поэтому флаг проверяется после каждой пачки событий
fn capture_loop(mut device: Device, controller: &Controller, stop: &AtomicBool) -> Result<()> {
    let mut modifiers = ModifierState::new();

    while !stop.load(Ordering::Relaxed) {
        let events: Vec<_> = match device.fetch_events() {
            Ok(events) => events.collect(),
            Err(e) => {
                error!("Ошибка чтения событий: {}", e);
                thread::sleep(Duration::from_millis(100));
                continue;
            }
        };

        for event in events {
            if event.event_type() != EventType::KEY {
                continue;
            }

            let code = KeyCode::new(event.code());
            let state = match event.value() {
                0 => KeyState::Released,
                1 => KeyState::Pressed,
                2 => KeyState::Repeat,
                value => {
                    debug!("Неизвестное значение события: {}", value);
                    continue;
                }
            };

            if let Some(modifier) = KeyMapper::evdev_modifier(code) {
                modifiers.update(modifier, state != KeyState::Released);
                continue;
            }

            let key_event = KeyEvent::new(modifiers.apply(KeyMapper::from_evdev(code)), state);
            trace_if_enabled!("Событие клавиши: {}", key_event);
            controller.handle_key(&key_event);
        }
    }

    warn!("Чтение клавиатуры остановлено");
    Ok(())
}

#[async_trait::async_trait]
impl KeyboardListenerTrait for EvdevKeyboardListener {
    async fn run(self: Box<Self>) -> Result<()> {
        (*self).run_impl().await
    }
}
