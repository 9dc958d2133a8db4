use crate::error::{MultiboxError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Имена, по которым устройство точно не клавиатура
const NON_KEYBOARD_HINTS: [&str; 4] = ["mouse", "touchpad", "trackpoint", "deathadder"];

pub struct DeviceFinder;

impl DeviceFinder {
    /// `auto` запускает автопоиск, иначе путь используется как есть
    pub fn find_keyboard_device(device_path: &str) -> Result<PathBuf> {
        if device_path != "auto" {
            let path = PathBuf::from(device_path);
            return if path.exists() {
                info!("Используется указанное устройство: {:?}", path);
                Ok(path)
            } else {
                MultiboxError::device_not_found(format!("Указанное устройство не найдено: {:?}", path))
            };
        }

        info!("Начинаем автопоиск клавиатурного устройства...");

        if let Some(device) = Self::find_by_id()? {
            info!("Найдено устройство по ID: {:?}", device);
            return Ok(device);
        }

        if let Some(device) = Self::find_by_event_devices()? {
            info!("Найдено устройство среди event устройств: {:?}", device);
            return Ok(device);
        }

        MultiboxError::device_not_found(
            "Не удалось найти клавиатуру. Убедитесь, что пользователь добавлен в группу 'input' \
             или укажите input.device_path",
        )
    }

    /// Ссылки /dev/input/by-id/*-event-kbd; лучшие кандидаты первыми
    fn find_by_id() -> Result<Option<PathBuf>> {
        let by_id_dir = Path::new("/dev/input/by-id");
        if !by_id_dir.exists() {
            debug!("Директория /dev/input/by-id не существует");
            return Ok(None);
        }

        let mut candidates: Vec<(PathBuf, u32)> = Self::list_dir(by_id_dir)?
            .into_iter()
            .filter_map(|path| {
                let name = path.file_name()?.to_str()?.to_string();
                let priority = Self::by_id_priority(&name)?;
                Some((path, priority))
            })
            .filter(|(path, _)| Self::is_keyboard_device(path))
            .collect();

        candidates.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(candidates.into_iter().next().map(|(path, _)| path))
    }

    fn by_id_priority(name: &str) -> Option<u32> {
        let lower = name.to_lowercase();
        if !lower.contains("event") || NON_KEYBOARD_HINTS.iter().any(|hint| lower.contains(hint)) {
            return None;
        }

        if lower.ends_with("event-kbd") {
            Some(100)
        } else if lower.contains("keyboard") || lower.contains("kbd") {
            Some(50)
        } else {
            None
        }
    }

    fn find_by_event_devices() -> Result<Option<PathBuf>> {
        let mut event_devices: Vec<PathBuf> = Self::list_dir(Path::new("/dev/input"))?
            .into_iter()
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("event"))
            })
            .collect();
        event_devices.sort();

        Ok(event_devices.into_iter().find(|path| Self::is_keyboard_device(path)))
    }

    fn list_dir(dir: &Path) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(dir)
            .map_err(|e| MultiboxError::Permission(format!("Нет доступа к {:?}: {}", dir, e)))?;

        let mut paths = Vec::new();
        for entry in entries {
            paths.push(entry?.path());
        }
        Ok(paths)
    }

    /// Клавиатура: открывается, не похожа на мышь и умеет A, SPACE, ENTER
    fn is_keyboard_device(device_path: &Path) -> bool {
        let device = match evdev::Device::open(device_path) {
            Ok(device) => device,
            Err(e) => {
                warn!("Устройство {:?} недоступно: {}", device_path, e);
                return false;
            }
        };

        let name = device.name().unwrap_or("Unknown").to_lowercase();
        if NON_KEYBOARD_HINTS.iter().any(|hint| name.contains(hint)) {
            debug!("Исключаем устройство как мышь/тачпад: {:?} ({})", device_path, name);
            return false;
        }

        let is_keyboard = device.supported_keys().is_some_and(|keys| {
            keys.contains(evdev::KeyCode::KEY_A)
                && keys.contains(evdev::KeyCode::KEY_SPACE)
                && keys.contains(evdev::KeyCode::KEY_ENTER)
                && keys.iter().count() > 20
        });

        debug!("Устройство {:?} ({}) клавиатура: {}", device_path, name, is_keyboard);
        is_keyboard
    }
}
