use crate::error::{MultiboxError, Result};
use crate::events::{InjectedKey, KeyPost, KeyState, SpecialKey, WindowHandle};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::process::{Command, Output};
use tracing::debug;

use super::WindowBackend;

// Имена keysym для символов, у которых имя не совпадает с самим символом
static CHAR_TO_KEYSYM: Lazy<HashMap<char, &'static str>> = Lazy::new(|| {
    let mut map = HashMap::new();
    map.insert(' ', "space");
    map.insert('/', "slash");
    map.insert('\\', "backslash");
    map.insert('.', "period");
    map.insert(',', "comma");
    map.insert('-', "minus");
    map.insert('=', "equal");
    map.insert(';', "semicolon");
    map.insert('\'', "apostrophe");
    map.insert('`', "grave");
    map.insert('[', "bracketleft");
    map.insert(']', "bracketright");
    map.insert('!', "exclam");
    map.insert('?', "question");
    map.insert(':', "colon");
    map.insert('_', "underscore");
    map
});

/// X11 через xdotool: `keydown/keyup --window` использует XSendEvent и не активирует окно
pub struct XdotoolBackend;

impl XdotoolBackend {
    pub fn new() -> Self {
        Self
    }

    fn run(args: &[&str]) -> Result<Output> {
        Command::new("xdotool")
            .args(args)
            .output()
            .map_err(|e| MultiboxError::Backend(format!("xdotool не найден: {}", e)))
    }

    fn run_checked(args: &[&str]) -> Result<String> {
        let output = Self::run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("xdotool {:?} вернул ошибку: {}", args, stderr.trim());
            return Err(MultiboxError::Backend(format!(
                "xdotool {} вернул ошибку: {}",
                args.first().copied().unwrap_or_default(),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    pub fn test(&self) -> Result<()> {
        debug!("=== Тестируем xdotool ===");
        Self::run_checked(&["getactivewindow"])?;
        debug!("=== xdotool работает ===");
        Ok(())
    }

    fn keysym(key: InjectedKey) -> Result<String> {
        match key {
            InjectedKey::Special(SpecialKey::Return) => Ok("Return".to_string()),
            InjectedKey::Char(c) if c.is_ascii_alphanumeric() => Ok(c.to_string()),
            InjectedKey::Char(c) => CHAR_TO_KEYSYM
                .get(&c)
                .map(|name| name.to_string())
                .ok_or_else(|| MultiboxError::Injection(format!("нет keysym для символа {:?}", c))),
        }
    }

    fn parse_handle(raw: &str) -> Option<WindowHandle> {
        raw.trim().parse::<u64>().ok().map(WindowHandle::new)
    }
}

impl WindowBackend for XdotoolBackend {
    fn enumerate_windows(&self) -> Result<Vec<WindowHandle>> {
        let output = Self::run(&["search", "--onlyvisible", "--name", "."])?;
        // search завершается с кодом 1, если ничего не найдено
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().filter_map(Self::parse_handle).collect())
    }

    fn window_title(&self, handle: WindowHandle) -> Result<String> {
        Self::run_checked(&["getwindowname", &handle.value().to_string()])
    }

    fn window_process_id(&self, handle: WindowHandle) -> Result<u32> {
        let raw = Self::run_checked(&["getwindowpid", &handle.value().to_string()])?;
        raw.parse::<u32>()
            .map_err(|e| MultiboxError::Backend(format!("неверный PID '{}' окна {}: {}", raw, handle, e)))
    }

    fn foreground_window(&self) -> Option<WindowHandle> {
        Self::run_checked(&["getactivewindow"])
            .ok()
            .and_then(|raw| Self::parse_handle(&raw))
    }

    fn post_key_event(&self, post: KeyPost) -> Result<()> {
        let keysym = Self::keysym(post.key)?;
        let action = match post.state {
            KeyState::Released => "keyup",
            KeyState::Pressed | KeyState::Repeat => "keydown",
        };

        Self::run_checked(&[action, "--window", &post.handle.value().to_string(), &keysym])
            .map_err(|e| MultiboxError::Injection(format!("{} {} -> {}: {}", action, keysym, post.handle, e)))?;

        debug!("xdotool {} {} -> {}", action, keysym, post.handle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keysym_names() {
        assert_eq!(XdotoolBackend::keysym(InjectedKey::Char('a')).unwrap(), "a");
        assert_eq!(XdotoolBackend::keysym(InjectedKey::Char('7')).unwrap(), "7");
        assert_eq!(XdotoolBackend::keysym(InjectedKey::Char(' ')).unwrap(), "space");
        assert_eq!(XdotoolBackend::keysym(InjectedKey::Char('/')).unwrap(), "slash");
        assert_eq!(
            XdotoolBackend::keysym(InjectedKey::Special(SpecialKey::Return)).unwrap(),
            "Return"
        );
        assert!(XdotoolBackend::keysym(InjectedKey::Char('é')).is_err());
    }

    #[test]
    fn handle_parsing() {
        assert_eq!(XdotoolBackend::parse_handle("62914563\n"), Some(WindowHandle::new(62914563)));
        assert_eq!(XdotoolBackend::parse_handle("garbage"), None);
    }
}
