use crate::events::RawKey;

use super::modifier_state::Modifier;

/// Перевод платформенных кодов клавиш в `RawKey`.
/// Раскладка считается латинской: код клавиши A всегда даёт 'a'.
pub struct KeyMapper;

#[cfg(target_os = "linux")]
impl KeyMapper {
    pub fn from_evdev(key: evdev::KeyCode) -> RawKey {
        use evdev::KeyCode;

        let c = match key {
            // Буквенные клавиши
            KeyCode::KEY_A => 'a',
            KeyCode::KEY_B => 'b',
            KeyCode::KEY_C => 'c',
            KeyCode::KEY_D => 'd',
            KeyCode::KEY_E => 'e',
            KeyCode::KEY_F => 'f',
            KeyCode::KEY_G => 'g',
            KeyCode::KEY_H => 'h',
            KeyCode::KEY_I => 'i',
            KeyCode::KEY_J => 'j',
            KeyCode::KEY_K => 'k',
            KeyCode::KEY_L => 'l',
            KeyCode::KEY_M => 'm',
            KeyCode::KEY_N => 'n',
            KeyCode::KEY_O => 'o',
            KeyCode::KEY_P => 'p',
            KeyCode::KEY_Q => 'q',
            KeyCode::KEY_R => 'r',
            KeyCode::KEY_S => 's',
            KeyCode::KEY_T => 't',
            KeyCode::KEY_U => 'u',
            KeyCode::KEY_V => 'v',
            KeyCode::KEY_W => 'w',
            KeyCode::KEY_X => 'x',
            KeyCode::KEY_Y => 'y',
            KeyCode::KEY_Z => 'z',

            // Цифры основного ряда и цифрового блока
            KeyCode::KEY_1 | KeyCode::KEY_KP1 => '1',
            KeyCode::KEY_2 | KeyCode::KEY_KP2 => '2',
            KeyCode::KEY_3 | KeyCode::KEY_KP3 => '3',
            KeyCode::KEY_4 | KeyCode::KEY_KP4 => '4',
            KeyCode::KEY_5 | KeyCode::KEY_KP5 => '5',
            KeyCode::KEY_6 | KeyCode::KEY_KP6 => '6',
            KeyCode::KEY_7 | KeyCode::KEY_KP7 => '7',
            KeyCode::KEY_8 | KeyCode::KEY_KP8 => '8',
            KeyCode::KEY_9 | KeyCode::KEY_KP9 => '9',
            KeyCode::KEY_0 | KeyCode::KEY_KP0 => '0',

            // Знаки препинания движок всё равно не реплицирует
            KeyCode::KEY_MINUS => '-',
            KeyCode::KEY_EQUAL => '=',
            KeyCode::KEY_COMMA => ',',
            KeyCode::KEY_DOT => '.',
            KeyCode::KEY_SLASH => '/',

            KeyCode::KEY_SPACE => return RawKey::Space,
            key => return Self::evdev_function_key(key).unwrap_or(RawKey::Other),
        };

        RawKey::Char(c)
    }

    fn evdev_function_key(key: evdev::KeyCode) -> Option<RawKey> {
        use evdev::KeyCode;

        // F1..F10 и F11..F24 лежат в evdev двумя непрерывными блоками
        let code = key.code();
        let n = if (KeyCode::KEY_F1.code()..=KeyCode::KEY_F10.code()).contains(&code) {
            code - KeyCode::KEY_F1.code() + 1
        } else if (KeyCode::KEY_F11.code()..=KeyCode::KEY_F12.code()).contains(&code) {
            code - KeyCode::KEY_F11.code() + 11
        } else if (KeyCode::KEY_F13.code()..=KeyCode::KEY_F24.code()).contains(&code) {
            code - KeyCode::KEY_F13.code() + 13
        } else {
            return None;
        };

        Some(RawKey::Function(n as u8))
    }

    pub fn evdev_modifier(key: evdev::KeyCode) -> Option<Modifier> {
        use evdev::KeyCode;

        match key {
            KeyCode::KEY_LEFTSHIFT | KeyCode::KEY_RIGHTSHIFT => Some(Modifier::Shift),
            KeyCode::KEY_LEFTCTRL | KeyCode::KEY_RIGHTCTRL => Some(Modifier::Ctrl),
            KeyCode::KEY_LEFTALT | KeyCode::KEY_RIGHTALT => Some(Modifier::Alt),
            KeyCode::KEY_LEFTMETA | KeyCode::KEY_RIGHTMETA => Some(Modifier::Super),
            _ => None,
        }
    }
}

#[cfg(target_os = "windows")]
impl KeyMapper {
    /// Код виртуальной клавиши из `KBDLLHOOKSTRUCT::vkCode`
    pub fn from_virtual_key(vk: u32) -> RawKey {
        match vk {
            0x20 => RawKey::Space,
            // '0'..'9' и 'A'..'Z' совпадают с ASCII
            0x30..=0x39 | 0x41..=0x5A => {
                RawKey::Char((vk as u8 as char).to_ascii_lowercase())
            }
            // VK_NUMPAD0..VK_NUMPAD9
            0x60..=0x69 => RawKey::Char((b'0' + (vk - 0x60) as u8) as char),
            // VK_F1..VK_F24
            0x70..=0x87 => RawKey::Function((vk - 0x70 + 1) as u8),
            _ => RawKey::Other,
        }
    }

    pub fn virtual_key_modifier(vk: u32) -> Option<Modifier> {
        match vk {
            // VK_SHIFT, VK_LSHIFT, VK_RSHIFT
            0x10 | 0xA0 | 0xA1 => Some(Modifier::Shift),
            // VK_CONTROL, VK_LCONTROL, VK_RCONTROL
            0x11 | 0xA2 | 0xA3 => Some(Modifier::Ctrl),
            // VK_MENU, VK_LMENU, VK_RMENU
            0x12 | 0xA4 | 0xA5 => Some(Modifier::Alt),
            // VK_LWIN, VK_RWIN
            0x5B | 0x5C => Some(Modifier::Super),
            _ => None,
        }
    }
}
