use crate::config::Config;
use crate::error::Result;
use crate::events::{Hotkey, KeyClass, KeyEvent, WindowHandle};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use super::backend::WindowBackend;
use super::command_dispatcher::CommandDispatcher;
use super::key_injector::{InjectionTiming, KeyInjector};
use super::keyboard_listener::KeyClassifier;
use super::observers::ObserverSet;
use super::replication_engine::ReplicationEngine;
use super::state::{MultiboxState, SharedState, Status};
use super::window_registry::WindowRegistry;

/// Управляющие действия: горячие клавиши и команды внешнего интерфейса
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlAction {
    ToggleActive,
    TogglePause,
    ToggleSoloMain,
    Rediscover,
    SendFollow,
    SendAssist,
    SetMain(WindowHandle),
    SetMainByIndex(usize),
    SetFollowTarget(String),
    SetAssistTarget(String),
    SaveConfig,
    ClearConfig,
}

impl From<Hotkey> for ControlAction {
    fn from(hotkey: Hotkey) -> Self {
        match hotkey {
            Hotkey::ToggleActive => ControlAction::ToggleActive,
            Hotkey::TogglePause => ControlAction::TogglePause,
            Hotkey::Rediscover => ControlAction::Rediscover,
            Hotkey::SendFollow => ControlAction::SendFollow,
            Hotkey::SendAssist => ControlAction::SendAssist,
            Hotkey::ToggleSoloMain => ControlAction::ToggleSoloMain,
        }
    }
}

/// Разбор текстовой команды: `active`, `pause`, `solo`, `discover`, `follow`,
/// `assist`, `main <номер|0xдескриптор>`, `follow_target <имя>`,
/// `assist_target <имя>`, `save`, `clear`
impl FromStr for ControlAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        let (command, argument) = match s.split_once(char::is_whitespace) {
            Some((command, argument)) => (command, argument.trim()),
            None => (s, ""),
        };

        let action = match (command.to_lowercase().as_str(), argument.is_empty()) {
            ("active" | "toggle_active", true) => ControlAction::ToggleActive,
            ("pause" | "toggle_pause", true) => ControlAction::TogglePause,
            ("solo" | "toggle_solo_main", true) => ControlAction::ToggleSoloMain,
            ("discover" | "rediscover", true) => ControlAction::Rediscover,
            ("follow" | "send_follow", true) => ControlAction::SendFollow,
            ("assist" | "send_assist", true) => ControlAction::SendAssist,
            ("save", true) => ControlAction::SaveConfig,
            ("clear", true) => ControlAction::ClearConfig,
            ("main", false) => parse_main_target(argument)?,
            // Пустое имя допустимо: так цель сбрасывается
            ("follow_target", _) => ControlAction::SetFollowTarget(argument.to_string()),
            ("assist_target", _) => ControlAction::SetAssistTarget(argument.to_string()),
            _ => return Err(format!("Неизвестная команда: '{}'", s)),
        };
        Ok(action)
    }
}

fn parse_main_target(argument: &str) -> std::result::Result<ControlAction, String> {
    if let Some(hex) = argument.strip_prefix("0x") {
        return u64::from_str_radix(hex, 16)
            .map(|value| ControlAction::SetMain(WindowHandle::new(value)))
            .map_err(|e| format!("Неверный дескриптор окна '{}': {}", argument, e));
    }

    argument
        .parse::<usize>()
        .map(ControlAction::SetMainByIndex)
        .map_err(|e| format!("Неверный номер окна '{}': {}", argument, e))
}

/// Точка управления движком: горячие клавиши и команды попадают сюда
pub struct Controller {
    engine: ReplicationEngine,
    registry: WindowRegistry,
    dispatcher: CommandDispatcher,
    classifier: KeyClassifier,
    state: SharedState,
    observers: Arc<ObserverSet>,
    config: Mutex<Config>,
    config_path: PathBuf,
}

impl Controller {
    pub fn new(
        config: Config,
        config_path: impl Into<PathBuf>,
        backend: Arc<dyn WindowBackend>,
        timing: InjectionTiming,
        observers: Arc<ObserverSet>,
    ) -> anyhow::Result<Self> {
        let classifier = KeyClassifier::new(&config.hotkeys)?;
        let state = MultiboxState::shared(config.filter_config());
        let injector = Arc::new(KeyInjector::new(backend.clone(), timing));

        let registry = WindowRegistry::new(
            backend.clone(),
            state.clone(),
            observers.clone(),
            &config.window.title_keywords,
        );
        let engine = ReplicationEngine::new(state.clone(), backend, injector.clone(), observers.clone());
        let dispatcher = CommandDispatcher::new(state.clone(), injector, observers.clone());

        Ok(Self {
            engine,
            registry,
            dispatcher,
            classifier,
            state,
            observers,
            config: Mutex::new(config),
            config_path: config_path.into(),
        })
    }

    pub fn engine(&self) -> &ReplicationEngine {
        &self.engine
    }

    pub fn registry(&self) -> &WindowRegistry {
        &self.registry
    }

    pub fn state(&self) -> SharedState {
        self.state.clone()
    }

    pub fn status(&self) -> Status {
        self.engine.status()
    }

    /// Обработка события от слушателя клавиатуры. Выполняется синхронно в потоке захвата.
    pub fn handle_key(&self, event: &KeyEvent) {
        match self.classifier.classify(event) {
            KeyClass::Hotkey(hotkey) => {
                info!("Горячая клавиша: {}", hotkey);
                self.perform(hotkey.into());
            }
            KeyClass::Replicable(c) => self.engine.replicate(c),
            KeyClass::Ignored => {}
        }
    }

    /// Выполнить действие; `false`, если оно не удалось
    pub fn perform(&self, action: ControlAction) -> bool {
        match action {
            ControlAction::ToggleActive => {
                self.engine.toggle_active();
                true
            }
            ControlAction::TogglePause => self.engine.toggle_pause().is_some(),
            ControlAction::ToggleSoloMain => {
                self.engine.toggle_solo_main();
                true
            }
            ControlAction::Rediscover => {
                self.registry.discover();
                true
            }
            ControlAction::SendFollow => self.dispatcher.send_follow(),
            ControlAction::SendAssist => self.dispatcher.send_assist(),
            ControlAction::SetMain(handle) => self.registry.set_main(handle).is_ok(),
            ControlAction::SetMainByIndex(index) => self.registry.set_main_by_index(index).is_ok(),
            ControlAction::SetFollowTarget(name) => {
                self.update_config(|config| config.follow_target = name).is_ok()
            }
            ControlAction::SetAssistTarget(name) => {
                self.update_config(|config| config.assist_target = name).is_ok()
            }
            ControlAction::SaveConfig => self.save_config().is_ok(),
            ControlAction::ClearConfig => self.clear_config().is_ok(),
        }
    }

    /// Изменить конфигурацию, применить её к движку и сохранить
    pub fn update_config<F>(&self, update: F) -> Result<()>
    where
        F: FnOnce(&mut Config),
    {
        {
            let mut config = self.config.lock();
            update(&mut config);
            config.normalize();
        }
        self.save_config()
    }

    /// Сохранить текущую конфигурацию. Фильтры применяются к движку
    /// даже если запись файла не удалась.
    pub fn save_config(&self) -> Result<()> {
        // Фильтр применяется под блокировкой конфигурации, порядок блокировок config -> state
        let result = {
            let config = self.config.lock();
            let result = config.save(&self.config_path);
            self.engine.set_filter_config(config.filter_config());
            result
        };

        match &result {
            Ok(()) => self.observers.info("Config", "Конфигурация сохранена"),
            Err(e) => self
                .observers
                .error("Error", format!("Не удалось сохранить конфигурацию: {}", e)),
        }
        result
    }

    /// Сбросить цели follow/assist и сохранить
    pub fn clear_config(&self) -> Result<()> {
        self.observers.info("Config", "Цели follow/assist сброшены");
        self.update_config(Config::clear_targets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{KeyState, RawKey};
    use crate::services::backend::DryRunBackend;
    use crate::services::observers::{LogLevel, RecordingObserver};

    struct Fixture {
        _dir: tempfile::TempDir,
        path: PathBuf,
        backend: Arc<DryRunBackend>,
        controller: Controller,
        recorder: Arc<RecordingObserver>,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("multibox.toml");

        let backend = Arc::new(DryRunBackend::with_demo_windows());
        let observers = Arc::new(ObserverSet::new());
        let recorder = Arc::new(RecordingObserver::default());
        observers.register(recorder.clone());

        let mut config = Config::default();
        config.delay_enabled = true;
        config.delay_ms = 0;

        let controller = Controller::new(
            config,
            &path,
            backend.clone(),
            InjectionTiming::zero(),
            observers,
        )
        .unwrap();
        controller.registry().discover();

        Fixture {
            _dir: dir,
            path,
            backend,
            controller,
            recorder,
        }
    }

    #[test]
    fn parse_text_commands() {
        assert_eq!("active".parse(), Ok(ControlAction::ToggleActive));
        assert_eq!(" Pause ".parse(), Ok(ControlAction::TogglePause));
        assert_eq!("main 2".parse(), Ok(ControlAction::SetMainByIndex(2)));
        assert_eq!(
            "main 0x1003".parse(),
            Ok(ControlAction::SetMain(WindowHandle::new(0x1003)))
        );
        assert_eq!(
            "follow_target Big Tank".parse(),
            Ok(ControlAction::SetFollowTarget("Big Tank".to_string()))
        );
        assert_eq!(
            "assist_target".parse(),
            Ok(ControlAction::SetAssistTarget(String::new()))
        );
        assert!("main".parse::<ControlAction>().is_err());
        assert!("main x".parse::<ControlAction>().is_err());
        assert!("pause now".parse::<ControlAction>().is_err());
        assert!("dance".parse::<ControlAction>().is_err());
    }

    #[test]
    fn hotkeys_drive_the_engine() {
        let f = fixture();

        f.controller.handle_key(&KeyEvent::press(RawKey::Function(12)));
        assert!(f.controller.status().active);

        f.controller.handle_key(&KeyEvent::press(RawKey::Char('A')));
        assert_eq!(f.backend.posted().len(), 4);

        f.controller.handle_key(&KeyEvent::press(RawKey::Function(10)));
        assert!(f.controller.status().paused);

        // Горячая клавиша никогда не реплицируется
        f.backend.clear_posted();
        f.controller.handle_key(&KeyEvent::press(RawKey::Function(10)));
        assert!(f.backend.posted().is_empty());

        f.controller.handle_key(&KeyEvent::new(RawKey::Char('a'), KeyState::Released));
        assert!(f.backend.posted().is_empty());
    }

    #[test]
    fn set_target_saves_and_applies() {
        let f = fixture();
        f.controller.perform(ControlAction::SetMainByIndex(0));

        assert!(!f.controller.perform(ControlAction::SendFollow));
        assert!(f.backend.posted().is_empty());

        assert!(f.controller.perform(ControlAction::SetFollowTarget(" Tank ".to_string())));
        assert_eq!(f.controller.engine().filter_config().follow_target, "Tank");

        let saved = Config::load(&f.path).unwrap();
        assert_eq!(saved.follow_target, "Tank");

        assert!(f.controller.perform(ControlAction::SendFollow));
        assert_eq!(f.backend.posted().len(), 2 * 14 * 2);
    }

    #[test]
    fn clear_config_resets_targets() {
        let f = fixture();
        f.controller
            .update_config(|config| {
                config.follow_target = "Tank".to_string();
                config.assist_target = "Healer".to_string();
            })
            .unwrap();

        assert!(f.controller.perform(ControlAction::ClearConfig));

        let saved = Config::load(&f.path).unwrap();
        assert!(saved.follow_target.is_empty());
        assert!(saved.assist_target.is_empty());
        assert!(f.controller.engine().filter_config().assist_target.is_empty());
    }

    #[test]
    fn failed_save_still_applies_filter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("multibox.toml");
        let observers = Arc::new(ObserverSet::new());
        let recorder = Arc::new(RecordingObserver::default());
        observers.register(recorder.clone());

        let controller = Controller::new(
            Config::default(),
            path,
            Arc::new(DryRunBackend::new()),
            InjectionTiming::zero(),
            observers,
        )
        .unwrap();

        let result = controller.update_config(|config| {
            config.blacklisted_keys = ['g'].into_iter().collect();
        });

        assert!(result.is_err());
        assert!(recorder.has_record(LogLevel::Error, "сохранить"));
        let filter = controller.engine().filter_config();
        assert!(filter.blacklisted_keys.contains(&'g'));
        assert!(!filter.blacklisted_keys.contains(&'b'));
    }

    #[test]
    fn concurrent_updates_leave_engine_in_sync_with_file() {
        let f = Arc::new(fixture());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let f = f.clone();
                std::thread::spawn(move || {
                    for round in 0..20 {
                        let target = format!("Tank{}_{}", i, round);
                        f.controller
                            .update_config(|config| config.follow_target = target)
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let saved = Config::load(&f.path).unwrap();
        assert_eq!(f.controller.engine().filter_config().follow_target, saved.follow_target);
    }

    #[test]
    fn set_main_actions_report_failure() {
        let f = fixture();

        assert!(f.controller.perform(ControlAction::SetMain(WindowHandle::new(0x1002))));
        assert!(!f.controller.perform(ControlAction::SetMain(WindowHandle::new(0x2001))));
        assert!(!f.controller.perform(ControlAction::SetMainByIndex(7)));
        assert!(f.recorder.has_record(LogLevel::Error, "MAIN"));

        let main = f.controller.registry().main_window().unwrap();
        assert_eq!(main.handle, WindowHandle::new(0x1002));
    }

    #[test]
    fn pause_while_inactive_fails() {
        let f = fixture();
        assert!(!f.controller.perform(ControlAction::TogglePause));
        assert!(!f.controller.status().paused);
    }
}
