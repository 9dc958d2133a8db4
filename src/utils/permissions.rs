use crate::error::{MultiboxError, Result};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Проверить доступ к /dev/input, без него evdev не прочитает клавиатуру
pub fn check_permissions() -> Result<()> {
    info!("Проверка прав доступа...");

    check_input_devices_access(Path::new("/dev/input"))?;
    check_x11_session();

    info!("Проверка прав доступа завершена успешно");
    Ok(())
}

fn check_input_devices_access(input_dir: &Path) -> Result<()> {
    if !input_dir.exists() {
        return Err(MultiboxError::Permission(format!(
            "Директория {:?} не существует",
            input_dir
        )));
    }

    fs::read_dir(input_dir).map_err(|e| {
        MultiboxError::Permission(format!(
            "Нет доступа к {:?}: {}. Добавьте пользователя в группу 'input': \
             sudo usermod -a -G input $USER (затем перезайдите в систему)",
            input_dir, e
        ))
    })?;

    info!("Доступ к {:?} подтвержден", input_dir);
    Ok(())
}

// xdotool работает только с X11 (в Wayland-сессии через XWayland, и то не со всеми окнами)
fn check_x11_session() {
    match std::env::var("XDG_SESSION_TYPE").as_deref() {
        Ok("wayland") => warn!("Wayland-сессия: отправка клавиш через xdotool доступна только окнам XWayland"),
        Ok(session) => info!("Тип сессии: {}", session),
        Err(_) if std::env::var_os("DISPLAY").is_none() => {
            warn!("Переменная DISPLAY не задана, xdotool не сможет найти окна")
        }
        Err(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_input_dir() {
        let dir = tempfile::tempdir().unwrap();
        let result = check_input_devices_access(&dir.path().join("input"));
        assert!(matches!(result, Err(MultiboxError::Permission(_))));
    }

    #[test]
    fn test_readable_input_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(check_input_devices_access(dir.path()).is_ok());
    }
}
