use crate::debug_if_enabled;
use crate::error::MultiboxError;
use crate::events::{InjectedKey, SpecialKey, WindowHandle};
use std::sync::Arc;

use super::key_injector::{Delivery, KeyInjector};
use super::observers::ObserverSet;
use super::state::SharedState;

/// Рассылка чат-команд во все slave-окна
pub struct CommandDispatcher {
    state: SharedState,
    injector: Arc<KeyInjector>,
    observers: Arc<ObserverSet>,
}

impl CommandDispatcher {
    pub fn new(state: SharedState, injector: Arc<KeyInjector>, observers: Arc<ObserverSet>) -> Self {
        Self {
            state,
            injector,
            observers,
        }
    }

    /// Отправляет текст в каждое slave-окно: Return, текст посимвольно, Return.
    /// Возвращает число окон, в которые была попытка отправки.
    pub fn broadcast_command(&self, text: &str) -> usize {
        let (slaves, hold) = {
            let state = self.state.lock();
            let slaves: Vec<WindowHandle> = state.windows.slaves().map(|w| w.handle).collect();
            (slaves, state.filter.key_hold())
        };

        if slaves.is_empty() {
            self.observers.warn("Warning", "Нет slave-окон для отправки команды");
            return 0;
        }

        let timing = self.injector.timing();
        let delivery = self.injector.begin(hold);

        for &handle in &slaves {
            debug_if_enabled!("Команда {:?} -> {}", text, handle);

            self.post(&delivery, handle, InjectedKey::Special(SpecialKey::Return));
            delivery.pause(timing.settle);

            for c in text.chars() {
                self.post(&delivery, handle, InjectedKey::Char(c));
                delivery.pause(timing.char_gap);
            }

            delivery.pause(timing.settle);
            self.post(&delivery, handle, InjectedKey::Special(SpecialKey::Return));
        }

        slaves.len()
    }

    // Ошибка одной клавиши не прерывает последовательность
    fn post(&self, delivery: &Delivery<'_>, handle: WindowHandle, key: InjectedKey) {
        if let Err(e) = delivery.post_key(handle, key) {
            self.observers
                .error("Error", format!("Ошибка отправки {} в {}: {}", key, handle, e));
        }
    }

    pub fn send_follow(&self) -> bool {
        let target = self.state.lock().filter.follow_target.clone();
        self.send_targeted("/follow", "follow", &target)
    }

    pub fn send_assist(&self) -> bool {
        let target = self.state.lock().filter.assist_target.clone();
        self.send_targeted("/assist", "assist", &target)
    }

    fn send_targeted(&self, command: &str, name: &str, target: &str) -> bool {
        if target.is_empty() {
            let e = MultiboxError::UnresolvedTarget(format!("цель {} не задана", name));
            self.observers.error("Error", e.to_string());
            return false;
        }

        let count = self.broadcast_command(&format!("{} {}", command, target));
        if count > 0 {
            self.observers
                .info("Command", format!("Команда {} отправлена в {} окон", name, count));
        }
        count > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterConfig;
    use crate::events::KeyState;
    use crate::services::backend::DryRunBackend;
    use crate::services::key_injector::InjectionTiming;
    use crate::services::observers::{LogLevel, RecordingObserver};
    use crate::services::state::MultiboxState;
    use crate::services::window_registry::WindowRegistry;

    struct Fixture {
        backend: Arc<DryRunBackend>,
        state: SharedState,
        registry: WindowRegistry,
        dispatcher: CommandDispatcher,
        recorder: Arc<RecordingObserver>,
    }

    fn fixture(backend: DryRunBackend) -> Fixture {
        let backend = Arc::new(backend);
        let observers = Arc::new(ObserverSet::new());
        let recorder = Arc::new(RecordingObserver::default());
        observers.register(recorder.clone());

        let mut filter = FilterConfig::default();
        filter.delay_enabled = true;
        filter.delay_ms = 0;
        filter.follow_target = "Tank".to_string();

        let state = MultiboxState::shared(filter);
        let registry = WindowRegistry::new(
            backend.clone(),
            state.clone(),
            observers.clone(),
            &["world of warcraft".to_string()],
        );
        registry.discover();

        let injector = Arc::new(KeyInjector::new(backend.clone(), InjectionTiming::zero()));
        let dispatcher = CommandDispatcher::new(state.clone(), injector, observers);

        Fixture {
            backend,
            state,
            registry,
            dispatcher,
            recorder,
        }
    }

    fn four_windows() -> DryRunBackend {
        let backend = DryRunBackend::with_demo_windows();
        backend.add_window(WindowHandle::new(0x1004), Some(4104), "World of Warcraft");
        backend
    }

    fn pressed_keys(backend: &DryRunBackend, handle: WindowHandle) -> Vec<InjectedKey> {
        backend
            .posted()
            .iter()
            .filter(|p| p.handle == handle && p.state == KeyState::Pressed)
            .map(|p| p.key)
            .collect()
    }

    #[test]
    fn follow_reaches_every_slave_in_order() {
        let f = fixture(four_windows());
        f.registry.set_main(WindowHandle::new(0x1001)).unwrap();

        assert!(f.dispatcher.send_follow());

        let posted = f.backend.posted();
        // 3 окна * (Return + 12 символов + Return) * (нажатие + отпускание)
        assert_eq!(posted.len(), 3 * 14 * 2);
        assert!(posted.iter().all(|p| p.handle != WindowHandle::new(0x1001)));

        let mut expected = vec![InjectedKey::Special(SpecialKey::Return)];
        expected.extend("/follow Tank".chars().map(InjectedKey::Char));
        expected.push(InjectedKey::Special(SpecialKey::Return));

        for handle in [0x1002, 0x1003, 0x1004].map(WindowHandle::new) {
            assert_eq!(pressed_keys(&f.backend, handle), expected);
        }

        // Окна обрабатываются строго по очереди
        let order: Vec<_> = posted.iter().map(|p| p.handle.value()).collect();
        assert!(order.windows(2).all(|pair| pair[0] <= pair[1]));

        assert!(f.recorder.has_record(LogLevel::Info, "3 окон"));
    }

    #[test]
    fn empty_target_sends_nothing() {
        let f = fixture(four_windows());

        assert!(!f.dispatcher.send_assist());
        assert!(f.backend.posted().is_empty());
        assert!(f.recorder.has_record(LogLevel::Error, "assist"));
    }

    #[test]
    fn no_slaves_is_a_warning() {
        let f = fixture(DryRunBackend::new());

        assert_eq!(f.dispatcher.broadcast_command("/dance"), 0);
        assert!(!f.dispatcher.send_follow());
        assert!(f.recorder.has_record(LogLevel::Warning, "slave"));
    }

    #[test]
    fn without_main_every_window_is_a_slave() {
        let f = fixture(DryRunBackend::with_demo_windows());
        assert_eq!(f.dispatcher.broadcast_command("/sit"), 3);
    }

    #[test]
    fn failing_window_does_not_abort_the_rest() {
        let f = fixture(four_windows());
        f.backend.fail_posts_to(WindowHandle::new(0x1002));

        assert_eq!(f.dispatcher.broadcast_command("/follow Tank"), 4);

        assert!(pressed_keys(&f.backend, WindowHandle::new(0x1002)).is_empty());
        assert_eq!(pressed_keys(&f.backend, WindowHandle::new(0x1004)).len(), 14);
        assert!(f.recorder.has_record(LogLevel::Error, "0x1002"));
    }

    #[test]
    fn targets_are_read_at_send_time() {
        let f = fixture(four_windows());
        f.state.lock().filter.assist_target = "Healer".to_string();

        assert!(f.dispatcher.send_assist());
        let keys = pressed_keys(&f.backend, WindowHandle::new(0x1003));
        assert_eq!(keys.len(), "/assist Healer".len() + 2);
    }
}
