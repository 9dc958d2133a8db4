use crate::config::FilterConfig;
use crate::debug_if_enabled;
use crate::events::{InjectedKey, WindowHandle};
use smallvec::SmallVec;
use std::sync::Arc;

use super::backend::WindowBackend;
use super::key_injector::KeyInjector;
use super::observers::ObserverSet;
use super::state::{SharedState, Status};

/// Режим работы репликации
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// `paused` запоминает паузу, бывшую до выключения: она восстановится при включении
    Inactive { paused: bool },
    Running,
    Paused,
}

impl Default for RunState {
    fn default() -> Self {
        RunState::Inactive { paused: false }
    }
}

/// Режим работы плюс независимый флаг solo main
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplicationState {
    run: RunState,
    solo_main: bool,
}

impl ReplicationState {
    pub fn run_state(&self) -> RunState {
        self.run
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.run, RunState::Inactive { .. })
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.run, RunState::Paused | RunState::Inactive { paused: true })
    }

    pub fn is_running(&self) -> bool {
        self.run == RunState::Running
    }

    pub fn solo_main(&self) -> bool {
        self.solo_main
    }

    /// Возвращает новое значение "активен"
    pub fn toggle_active(&mut self) -> bool {
        self.run = match self.run {
            RunState::Inactive { paused: false } => RunState::Running,
            RunState::Inactive { paused: true } => RunState::Paused,
            RunState::Running => RunState::Inactive { paused: false },
            RunState::Paused => RunState::Inactive { paused: true },
        };
        self.is_active()
    }

    /// Возвращает новое значение "на паузе" или `None`, если движок неактивен
    pub fn toggle_pause(&mut self) -> Option<bool> {
        self.run = match self.run {
            RunState::Running => RunState::Paused,
            RunState::Paused => RunState::Running,
            RunState::Inactive { .. } => return None,
        };
        Some(self.is_paused())
    }

    pub fn toggle_solo_main(&mut self) -> bool {
        self.solo_main = !self.solo_main;
        self.solo_main
    }
}

type Targets = SmallVec<[WindowHandle; 8]>;

/// Репликация нажатий из активного отслеживаемого окна в остальные
pub struct ReplicationEngine {
    state: SharedState,
    backend: Arc<dyn WindowBackend>,
    injector: Arc<KeyInjector>,
    observers: Arc<ObserverSet>,
}

impl ReplicationEngine {
    pub fn new(
        state: SharedState,
        backend: Arc<dyn WindowBackend>,
        injector: Arc<KeyInjector>,
        observers: Arc<ObserverSet>,
    ) -> Self {
        Self {
            state,
            backend,
            injector,
            observers,
        }
    }

    pub fn status(&self) -> Status {
        self.state.lock().status()
    }

    pub fn filter_config(&self) -> FilterConfig {
        self.state.lock().filter.clone()
    }

    pub fn set_filter_config(&self, filter: FilterConfig) {
        self.state.lock().filter = filter;
        self.observers.status_changed();
    }

    pub fn toggle_active(&self) -> bool {
        let (active, paused) = {
            let mut state = self.state.lock();
            let active = state.replication.toggle_active();
            (active, state.replication.is_paused())
        };

        self.observers.info(
            "System",
            format!("Мультибоксинг {}", if active { "ВКЛЮЧЁН" } else { "ВЫКЛЮЧЕН" }),
        );
        if active && paused {
            self.observers.warn("System", "Репликация осталась на паузе");
        }
        self.observers.status_changed();
        active
    }

    pub fn toggle_pause(&self) -> Option<bool> {
        let paused = self.state.lock().replication.toggle_pause();

        match paused {
            Some(paused) => {
                self.observers.info(
                    "System",
                    format!("Репликация {}", if paused { "ПРИОСТАНОВЛЕНА" } else { "ВОЗОБНОВЛЕНА" }),
                );
                self.observers.status_changed();
            }
            None => debug_if_enabled!("Пауза игнорируется: мультибоксинг выключен"),
        }
        paused
    }

    pub fn toggle_solo_main(&self) -> bool {
        let solo_main = self.state.lock().replication.toggle_solo_main();

        self.observers.info(
            "System",
            format!("Режим Solo Main {}", if solo_main { "ВКЛЮЧЁН" } else { "ВЫКЛЮЧЕН" }),
        );
        self.observers.status_changed();
        solo_main
    }

    /// Реплицирует символ из активного окна. Проверки идут строго по порядку:
    /// режим, чёрный список, белый список, активное окно отслеживается.
    pub fn replicate(&self, key: char) {
        let hold = {
            let state = self.state.lock();
            if !state.replication.is_running() {
                return;
            }
            if state.filter.blacklisted_keys.contains(&key) {
                debug_if_enabled!("Клавиша {:?} в чёрном списке", key);
                return;
            }
            if !state.filter.allowed_keys.contains(&key) {
                return;
            }
            state.filter.key_hold()
        };

        let Some(focused) = self.backend.foreground_window() else {
            return;
        };

        let Some(targets) = self.resolve_targets(focused) else {
            debug_if_enabled!("Активное окно {} не отслеживается, {:?} не реплицируется", focused, key);
            return;
        };

        debug_if_enabled!("Репликация {:?} из {} в {} окон", key, focused, targets.len());

        let delivery = self.injector.begin(hold);
        for handle in targets {
            if let Err(e) = delivery.post_key(handle, InjectedKey::Char(key)) {
                self.observers
                    .error("Error", format!("Ошибка отправки {:?} в {}: {}", key, handle, e));
            }
        }
    }

    /// `None`, если активное окно не из отслеживаемых
    fn resolve_targets(&self, focused: WindowHandle) -> Option<Targets> {
        let state = self.state.lock();
        if !state.windows.is_tracked(focused) {
            return None;
        }

        let targets: Targets = if state.replication.solo_main() {
            state.windows.main_window().map(|w| w.handle).into_iter().collect()
        } else {
            state
                .windows
                .iter()
                .filter(|w| w.handle != focused)
                .map(|w| w.handle)
                .collect()
        };
        Some(targets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::KeyState;
    use crate::services::backend::DryRunBackend;
    use crate::services::key_injector::InjectionTiming;
    use crate::services::observers::{LogLevel, RecordingObserver};
    use crate::services::state::MultiboxState;
    use crate::services::window_registry::WindowRegistry;

    const W1: WindowHandle = WindowHandle(0x1001);
    const W2: WindowHandle = WindowHandle(0x1002);
    const W3: WindowHandle = WindowHandle(0x1003);
    const OUTSIDER: WindowHandle = WindowHandle(0x2001);

    struct Fixture {
        backend: Arc<DryRunBackend>,
        registry: WindowRegistry,
        engine: ReplicationEngine,
        recorder: Arc<RecordingObserver>,
    }

    fn fixture() -> Fixture {
        let backend = Arc::new(DryRunBackend::with_demo_windows());
        let observers = Arc::new(ObserverSet::new());
        let recorder = Arc::new(RecordingObserver::default());
        observers.register(recorder.clone());

        let mut filter = FilterConfig::default();
        filter.delay_enabled = true;
        filter.delay_ms = 0;

        let state = MultiboxState::shared(filter);
        let registry = WindowRegistry::new(
            backend.clone(),
            state.clone(),
            observers.clone(),
            &["world of warcraft".to_string()],
        );
        registry.discover();

        let injector = Arc::new(KeyInjector::new(backend.clone(), InjectionTiming::zero()));
        let engine = ReplicationEngine::new(state, backend.clone(), injector, observers);
        backend.clear_posted();

        Fixture {
            backend,
            registry,
            engine,
            recorder,
        }
    }

    fn pressed_handles(backend: &DryRunBackend) -> Vec<WindowHandle> {
        backend
            .posted()
            .iter()
            .filter(|p| p.state == KeyState::Pressed)
            .map(|p| p.handle)
            .collect()
    }

    #[test]
    fn transition_table() {
        let mut state = ReplicationState::default();
        assert_eq!(state.run_state(), RunState::Inactive { paused: false });

        // Пауза при выключенном движке ничего не меняет
        assert_eq!(state.toggle_pause(), None);
        assert_eq!(state.run_state(), RunState::Inactive { paused: false });

        assert!(state.toggle_active());
        assert_eq!(state.run_state(), RunState::Running);
        assert_eq!(state.toggle_pause(), Some(true));
        assert_eq!(state.run_state(), RunState::Paused);
        assert_eq!(state.toggle_pause(), Some(false));
        assert_eq!(state.run_state(), RunState::Running);

        assert!(!state.toggle_active());
        assert!(!state.is_active());

        assert!(state.toggle_solo_main());
        assert!(state.solo_main());
        assert!(!state.is_active());
    }

    #[test]
    fn pause_survives_deactivation() {
        let mut state = ReplicationState::default();
        state.toggle_active();
        state.toggle_pause();
        state.toggle_active();
        assert_eq!(state.run_state(), RunState::Inactive { paused: true });
        assert!(state.is_paused());

        state.toggle_active();
        assert_eq!(state.run_state(), RunState::Paused);
        assert!(!state.is_running());
    }

    #[test]
    fn replicates_to_all_tracked_except_focused() {
        let f = fixture();
        f.engine.toggle_active();
        f.backend.set_foreground(Some(W2));

        f.engine.replicate('a');

        assert_eq!(pressed_handles(&f.backend), vec![W1, W3]);
        let posted = f.backend.posted();
        assert_eq!(posted.len(), 4);
        assert_eq!(posted[0].state, KeyState::Pressed);
        assert_eq!(posted[1].state, KeyState::Released);
        assert_eq!(posted[1].handle, W1);
    }

    #[test]
    fn inactive_or_paused_injects_nothing() {
        let f = fixture();
        f.engine.replicate('a');
        assert!(f.backend.posted().is_empty());

        f.engine.toggle_active();
        f.engine.toggle_pause();
        for key in ['a', '1', ' ', 'z'] {
            f.engine.replicate(key);
        }
        assert!(f.backend.posted().is_empty());
    }

    #[test]
    fn blacklisted_keys_are_never_replicated() {
        let f = fixture();
        f.engine.toggle_active();

        f.engine.replicate('b');
        f.engine.replicate('m');
        f.engine.toggle_solo_main();
        f.registry.set_main(W2).unwrap();
        f.engine.replicate('b');

        assert!(f.backend.posted().is_empty());
    }

    #[test]
    fn custom_blacklist_overrides_allowed_keys() {
        let f = fixture();
        f.engine.toggle_active();

        let mut filter = f.engine.filter_config();
        filter.blacklisted_keys = ['g'].into_iter().collect();
        f.engine.set_filter_config(filter);

        f.engine.replicate('g');
        assert!(f.backend.posted().is_empty());

        f.engine.replicate('b');
        assert_eq!(pressed_handles(&f.backend), vec![W2, W3]);
    }

    #[test]
    fn keys_outside_allowed_set_are_ignored() {
        let f = fixture();
        f.engine.toggle_active();

        for key in ['/', 'A', '\n', 'é'] {
            f.engine.replicate(key);
        }
        assert!(f.backend.posted().is_empty());
    }

    #[test]
    fn untracked_foreground_blocks_replication() {
        let f = fixture();
        f.engine.toggle_active();

        f.backend.set_foreground(Some(OUTSIDER));
        f.engine.replicate('a');
        f.backend.set_foreground(None);
        f.engine.replicate('a');

        assert!(f.backend.posted().is_empty());
    }

    #[test]
    fn solo_main_targets_only_main() {
        let f = fixture();
        f.registry.set_main(W1).unwrap();
        f.engine.toggle_active();
        f.engine.toggle_solo_main();
        f.backend.set_foreground(Some(W3));

        f.engine.replicate('q');

        assert_eq!(pressed_handles(&f.backend), vec![W1]);
    }

    #[test]
    fn solo_main_without_main_injects_nothing() {
        let f = fixture();
        f.engine.toggle_active();
        f.engine.toggle_solo_main();

        f.engine.replicate('q');
        assert!(f.backend.posted().is_empty());
    }

    #[test]
    fn failing_target_does_not_abort_others() {
        let f = fixture();
        f.engine.toggle_active();
        f.backend.fail_posts_to(W2);

        f.engine.replicate('1');

        assert_eq!(pressed_handles(&f.backend), vec![W3]);
        assert!(f.recorder.has_record(LogLevel::Error, "0x1002"));
    }

    #[test]
    fn toggles_notify_observers() {
        let f = fixture();
        let before = f.recorder.status_changes();

        f.engine.toggle_pause();
        assert_eq!(f.recorder.status_changes(), before);

        f.engine.toggle_active();
        f.engine.toggle_pause();
        f.engine.toggle_solo_main();
        assert_eq!(f.recorder.status_changes(), before + 3);

        let status = f.engine.status();
        assert!(status.active);
        assert!(status.paused);
        assert!(status.solo_main);
        assert_eq!(status.window_count, 3);
        assert!(!status.has_main);
    }
}
