use crate::events::WindowHandle;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MultiboxError {
    #[error("Ошибка конфигурации: {0}")]
    Config(#[from] anyhow::Error),

    #[error("Ошибка ввода-вывода: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ошибка файла конфигурации: {0}")]
    ConfigIo(String),

    #[error("Ошибка отправки клавиши: {0}")]
    Injection(String),

    #[error("Цель команды не задана: {0}")]
    UnresolvedTarget(String),

    #[error("Окно {0} не отслеживается")]
    WindowNotFound(WindowHandle),

    #[error("Ошибка оконной системы: {0}")]
    Backend(String),

    #[error("Устройство не найдено: {0}")]
    DeviceNotFound(String),

    #[error("Недостаточно прав доступа: {0}")]
    Permission(String),

    #[error("Внутренняя ошибка: {0}")]
    Internal(String),
}

impl MultiboxError {
    pub fn device_not_found<T>(msg: impl Into<String>) -> Result<T> {
        Err(MultiboxError::DeviceNotFound(msg.into()))
    }
}

pub type Result<T> = std::result::Result<T, MultiboxError>;

// Удобный макрос для ошибки с форматированным сообщением
#[macro_export]
macro_rules! multibox_error {
    (device_not_found, $($arg:tt)*) => {
        $crate::error::MultiboxError::DeviceNotFound(format!($($arg)*))
    };
}
