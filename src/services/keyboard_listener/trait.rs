use crate::config::InputConfig;
use crate::error::Result;
use crate::services::controller::Controller;
use std::sync::Arc;

/// Слушатель глобальной клавиатуры. Каждое событие синхронно передаётся в `Controller`.
/// Захват останавливается, когда future из `run` уничтожается.
#[async_trait::async_trait]
pub trait KeyboardListenerTrait {
    async fn run(self: Box<Self>) -> Result<()>;
}

/// Factory function to create an appropriate keyboard listener based on the dry_run flag
pub fn create_keyboard_listener(
    input: &InputConfig,
    controller: Arc<Controller>,
    dry_run: bool,
) -> Result<Box<dyn KeyboardListenerTrait + Send>> {
    if dry_run {
        return Ok(Box::new(super::dry_keyboard_listener::DryRunKeyboardListener::new(
            controller,
        )));
    }

    create_platform_listener(input, controller)
}

#[cfg(target_os = "linux")]
fn create_platform_listener(
    input: &InputConfig,
    controller: Arc<Controller>,
) -> Result<Box<dyn KeyboardListenerTrait + Send>> {
    Ok(Box::new(super::keyboard_listener::EvdevKeyboardListener::new(
        &input.device_path,
        controller,
    )?))
}

#[cfg(target_os = "windows")]
fn create_platform_listener(
    _input: &InputConfig,
    controller: Arc<Controller>,
) -> Result<Box<dyn KeyboardListenerTrait + Send>> {
    Ok(Box::new(super::windows_hook::HookKeyboardListener::new(controller)))
}

#[cfg(not(any(target_os = "windows", target_os = "linux")))]
fn create_platform_listener(
    _input: &InputConfig,
    _controller: Arc<Controller>,
) -> Result<Box<dyn KeyboardListenerTrait + Send>> {
    Err(crate::multibox_error!(
        device_not_found,
        "Захват клавиатуры на этой платформе не поддерживается, запустите с --dry-run"
    ))
}
