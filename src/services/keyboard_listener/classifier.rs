use crate::config::HotkeyConfig;
use crate::events::{Hotkey, KeyClass, KeyEvent, KeyState, RawKey};
use std::collections::HashMap;

/// Делит события клавиатуры на горячие клавиши, реплицируемые символы и прочее
#[derive(Debug, Clone)]
pub struct KeyClassifier {
    bindings: HashMap<RawKey, Hotkey>,
}

impl KeyClassifier {
    pub fn new(hotkeys: &HotkeyConfig) -> anyhow::Result<Self> {
        Ok(Self {
            bindings: hotkeys.bindings()?,
        })
    }

    pub fn hotkey_for(&self, key: RawKey) -> Option<Hotkey> {
        self.bindings.get(&key).copied()
    }

    pub fn classify(&self, event: &KeyEvent) -> KeyClass {
        if event.state == KeyState::Released {
            return KeyClass::Ignored;
        }

        let key = match event.key {
            RawKey::Char(c) => RawKey::Char(c.to_lowercase().next().unwrap_or(c)),
            key => key,
        };

        // Горячая клавиша срабатывает один раз на нажатие, автоповтор не реплицируется
        if let Some(hotkey) = self.hotkey_for(key) {
            return match event.state {
                KeyState::Pressed => KeyClass::Hotkey(hotkey),
                _ => KeyClass::Ignored,
            };
        }

        match key {
            RawKey::Space => KeyClass::Replicable(' '),
            RawKey::Char(c) if !c.is_control() => KeyClass::Replicable(c),
            _ => KeyClass::Ignored,
        }
    }
}
