use crate::events::RawKey;

/// Ctrl/Alt/Super превращают символ в сочетание, Shift меняет сам символ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Shift,
    Ctrl,
    Alt,
    Super,
}

#[derive(Debug, Default)]
pub struct ModifierState {
    shift: bool,
    ctrl: bool,
    alt: bool,
    super_key: bool,
}

impl ModifierState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, modifier: Modifier, pressed: bool) {
        match modifier {
            Modifier::Shift => self.shift = pressed,
            Modifier::Ctrl => self.ctrl = pressed,
            Modifier::Alt => self.alt = pressed,
            Modifier::Super => self.super_key = pressed,
        }
    }

    pub fn chord_held(&self) -> bool {
        self.ctrl || self.alt || self.super_key
    }

    /// Ctrl+1 и подобные сочетания не реплицируются; F-клавиши проходят как есть.
    /// С Shift символ заменяется тем, что реально печатается (Shift+1 это '!').
    pub fn apply(&self, key: RawKey) -> RawKey {
        match key {
            RawKey::Char(_) | RawKey::Space if self.chord_held() => RawKey::Other,
            RawKey::Char(c) if self.shift => shifted(c).map_or(RawKey::Other, RawKey::Char),
            key => key,
        }
    }
}

// Раскладка US
fn shifted(c: char) -> Option<char> {
    let shifted = match c {
        'a'..='z' => c.to_ascii_uppercase(),
        '1' => '!',
        '2' => '@',
        '3' => '#',
        '4' => '$',
        '5' => '%',
        '6' => '^',
        '7' => '&',
        '8' => '*',
        '9' => '(',
        '0' => ')',
        '-' => '_',
        '=' => '+',
        ',' => '<',
        '.' => '>',
        '/' => '?',
        _ => return None,
    };
    Some(shifted)
}
