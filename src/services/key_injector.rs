use crate::error::Result;
use crate::events::{InjectedKey, KeyPost, WindowHandle};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::backend::WindowBackend;

/// Фиксированные паузы последовательности чат-команды
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InjectionTiming {
    /// Пауза после открытия строки ввода и перед отправкой
    pub settle: Duration,
    /// Пауза между символами текста
    pub char_gap: Duration,
}

impl Default for InjectionTiming {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(50),
            char_gap: Duration::from_millis(20),
        }
    }
}

impl InjectionTiming {
    pub fn zero() -> Self {
        Self {
            settle: Duration::ZERO,
            char_gap: Duration::ZERO,
        }
    }
}

/// Отправка нажатий в окна без их активации.
///
/// Доставки сериализуются: пока одна `Delivery` жива, другая ждёт,
/// поэтому рассылка команды и репликация не перемешивают клавиши в одном окне.
pub struct KeyInjector {
    backend: Arc<dyn WindowBackend>,
    timing: InjectionTiming,
    delivery_lock: Mutex<()>,
}

impl KeyInjector {
    pub fn new(backend: Arc<dyn WindowBackend>, timing: InjectionTiming) -> Self {
        Self {
            backend,
            timing,
            delivery_lock: Mutex::new(()),
        }
    }

    pub fn timing(&self) -> InjectionTiming {
        self.timing
    }

    /// Начать доставку; `hold` - пауза между нажатием и отпусканием каждой клавиши
    pub fn begin(&self, hold: Duration) -> Delivery<'_> {
        Delivery {
            backend: self.backend.as_ref(),
            hold,
            _guard: self.delivery_lock.lock(),
        }
    }
}

pub struct Delivery<'a> {
    backend: &'a dyn WindowBackend,
    hold: Duration,
    _guard: MutexGuard<'a, ()>,
}

impl Delivery<'_> {
    /// Нажатие, пауза удержания, отпускание. Подтверждения доставки нет.
    pub fn post_key(&self, handle: WindowHandle, key: InjectedKey) -> Result<()> {
        self.backend.post_key_event(KeyPost::press(handle, key))?;
        self.pause(self.hold);
        self.backend.post_key_event(KeyPost::release(handle, key))
    }

    pub fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{KeyState, SpecialKey};
    use crate::services::backend::DryRunBackend;
    use std::time::Instant;

    #[test]
    fn post_key_sends_press_then_release() {
        let backend = Arc::new(DryRunBackend::new());
        let injector = KeyInjector::new(backend.clone(), InjectionTiming::zero());
        let handle = WindowHandle::new(5);

        injector
            .begin(Duration::ZERO)
            .post_key(handle, InjectedKey::Special(SpecialKey::Return))
            .unwrap();

        let states: Vec<_> = backend.posted().iter().map(|p| p.state).collect();
        assert_eq!(states, vec![KeyState::Pressed, KeyState::Released]);
    }

    #[test]
    fn hold_delay_is_applied() {
        let backend = Arc::new(DryRunBackend::new());
        let injector = KeyInjector::new(backend.clone(), InjectionTiming::zero());

        let started = Instant::now();
        injector
            .begin(Duration::from_millis(20))
            .post_key(WindowHandle::new(1), InjectedKey::Char('a'))
            .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(20));

        let posted = backend.posted();
        assert!(posted[1].timestamp.duration_since(posted[0].timestamp) >= Duration::from_millis(20));
    }

    #[test]
    fn failed_press_skips_release() {
        let backend = Arc::new(DryRunBackend::new());
        backend.fail_posts_to(WindowHandle::new(9));
        let injector = KeyInjector::new(backend.clone(), InjectionTiming::zero());

        let result = injector
            .begin(Duration::ZERO)
            .post_key(WindowHandle::new(9), InjectedKey::Char('a'));
        assert!(result.is_err());
        assert!(backend.posted().is_empty());
    }
}
