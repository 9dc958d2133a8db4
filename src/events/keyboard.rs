use serde::{Deserialize, Serialize};
use std::fmt;

/// Состояние клавиши
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyState {
    Pressed,
    Released,
    Repeat,
}

/// Клавиша в платформенно-независимом виде (как её видит слушатель)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawKey {
    /// F1..F24
    Function(u8),
    /// Печатный символ в том виде, в каком его отдала платформа
    Char(char),
    Space,
    Other,
}

impl RawKey {
    /// Разбор имени клавиши из конфигурации: `f1`..`f24`, `space` или одиночный символ
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_lowercase();
        if normalized == "space" {
            return Some(RawKey::Space);
        }

        if let Some(number) = normalized.strip_prefix('f') {
            if let Ok(n) = number.parse::<u8>() {
                return (1..=24).contains(&n).then_some(RawKey::Function(n));
            }
        }

        let mut chars = normalized.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if !c.is_control() => Some(RawKey::Char(c)),
            _ => None,
        }
    }
}

impl fmt::Display for RawKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawKey::Function(n) => write!(f, "F{}", n),
            RawKey::Char(c) => write!(f, "'{}'", c),
            RawKey::Space => write!(f, "SPACE"),
            RawKey::Other => write!(f, "OTHER"),
        }
    }
}

/// Управляющие действия, закреплённые за горячими клавишами
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hotkey {
    ToggleActive,
    TogglePause,
    Rediscover,
    SendFollow,
    SendAssist,
    ToggleSoloMain,
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Hotkey::ToggleActive => "toggle_active",
            Hotkey::TogglePause => "toggle_pause",
            Hotkey::Rediscover => "rediscover",
            Hotkey::SendFollow => "send_follow",
            Hotkey::SendAssist => "send_assist",
            Hotkey::ToggleSoloMain => "toggle_solo_main",
        };
        write!(f, "{}", name)
    }
}

/// Результат классификации события клавиатуры
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyClass {
    Hotkey(Hotkey),
    /// Символ уже приведён к нижнему регистру
    Replicable(char),
    Ignored,
}

/// Событие клавиатуры
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: RawKey,
    pub state: KeyState,
    pub timestamp: std::time::Instant,
}

impl KeyEvent {
    pub fn new(key: RawKey, state: KeyState) -> Self {
        Self {
            key,
            state,
            timestamp: std::time::Instant::now(),
        }
    }

    pub fn press(key: RawKey) -> Self {
        Self::new(key, KeyState::Pressed)
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:?} ({})",
            self.key,
            self.state,
            self.timestamp.elapsed().as_millis()
        )
    }
}

/// Специальные (несимвольные) клавиши, которые умеет отправлять инжектор
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialKey {
    Return,
}

/// Клавиша для отправки в окно
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InjectedKey {
    /// Переводится в код клавиши платформы
    Char(char),
    /// Код клавиши используется напрямую
    Special(SpecialKey),
}

impl fmt::Display for InjectedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InjectedKey::Char(c) => write!(f, "'{}'", c),
            InjectedKey::Special(key) => write!(f, "{:?}", key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_key_from_name() {
        assert_eq!(RawKey::from_name("F12"), Some(RawKey::Function(12)));
        assert_eq!(RawKey::from_name("f7"), Some(RawKey::Function(7)));
        assert_eq!(RawKey::from_name("space"), Some(RawKey::Space));
        assert_eq!(RawKey::from_name("Q"), Some(RawKey::Char('q')));
        assert_eq!(RawKey::from_name("f"), Some(RawKey::Char('f')));
        assert_eq!(RawKey::from_name("f25"), None);
        assert_eq!(RawKey::from_name("ctrl"), None);
        assert_eq!(RawKey::from_name(""), None);
    }

    #[test]
    fn test_key_event_press() {
        let event = KeyEvent::press(RawKey::Space);
        assert_eq!(event.state, KeyState::Pressed);
        assert_eq!(event.key, RawKey::Space);
    }

    #[test]
    fn test_injected_key_display() {
        assert_eq!(InjectedKey::Char('a').to_string(), "'a'");
        assert_eq!(InjectedKey::Special(SpecialKey::Return).to_string(), "Return");
    }
}
