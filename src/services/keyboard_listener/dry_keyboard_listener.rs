use crate::error::Result;
use crate::events::{KeyEvent, KeyState, RawKey};
use crate::services::controller::{ControlAction, Controller};
use std::io::BufRead;
use std::sync::Arc;
use std::thread;
use tokio::sync::oneshot;
use tracing::{info, warn};

use super::r#trait::KeyboardListenerTrait;

/// Эмуляция клавиатуры через stdin.
///
/// Строка `f12` (любая F-клавиша) нажимает её, строка `:команда` выполняет
/// управляющее действие (`:main 1`, `:follow_target Tank`, `:save`),
/// остальные строки печатаются посимвольно.
pub struct DryRunKeyboardListener {
    controller: Arc<Controller>,
}

/// Что сделать с одной строкой ввода
#[derive(Debug, PartialEq)]
enum DryRunInput {
    Action(ControlAction),
    Keys(Vec<RawKey>),
    Invalid(String),
    Empty,
}

impl DryRunInput {
    fn parse(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return DryRunInput::Empty;
        }

        if let Some(command) = line.strip_prefix(':') {
            return match command.parse() {
                Ok(action) => DryRunInput::Action(action),
                Err(e) => DryRunInput::Invalid(e),
            };
        }

        if let Some(key @ RawKey::Function(_)) = RawKey::from_name(line) {
            return DryRunInput::Keys(vec![key]);
        }

        DryRunInput::Keys(
            line.chars()
                .map(|c| if c == ' ' { RawKey::Space } else { RawKey::Char(c) })
                .collect(),
        )
    }
}

impl DryRunKeyboardListener {
    pub fn new(controller: Arc<Controller>) -> Self {
        info!("Инициализация DryRunKeyboardListener");
        Self { controller }
    }

    fn feed_line(controller: &Controller, line: &str) {
        match DryRunInput::parse(line) {
            DryRunInput::Action(action) => {
                if !controller.perform(action) {
                    warn!("Команда не выполнена");
                }
            }
            DryRunInput::Keys(keys) => {
                for key in keys {
                    controller.handle_key(&KeyEvent::press(key));
                    controller.handle_key(&KeyEvent::new(key, KeyState::Released));
                }
            }
            DryRunInput::Invalid(e) => warn!("{}", e),
            DryRunInput::Empty => {}
        }
    }

    async fn run_impl(self) -> Result<()> {
        info!("Dry-run режим - клавиатура эмулируется вводом из stdin");
        info!("Строка f1..f24 нажимает F-клавишу, ':команда' управляет движком (:main 0, :save)");

        let (done_tx, done_rx) = oneshot::channel();
        let controller = self.controller.clone();

        // Поток захвата: чтение stdin блокирующее
        thread::Builder::new()
            .name("dry-run-input".to_string())
            .spawn(move || {
                let stdin = std::io::stdin();
                for line in stdin.lock().lines() {
                    match line {
                        Ok(line) => Self::feed_line(&controller, &line),
                        Err(e) => {
                            warn!("Ошибка чтения stdin: {}", e);
                            break;
                        }
                    }
                }
                let _ = done_tx.send(());
            })?;

        let _ = done_rx.await;
        info!("stdin закрыт, эмуляция клавиатуры остановлена");
        Ok(())
    }
}

#[async_trait::async_trait]
impl KeyboardListenerTrait for DryRunKeyboardListener {
    async fn run(self: Box<Self>) -> Result<()> {
        (*self).run_impl().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::services::backend::DryRunBackend;
    use crate::services::key_injector::InjectionTiming;
    use crate::services::observers::ObserverSet;

    #[test]
    fn parse_lines() {
        assert_eq!(DryRunInput::parse("F12"), DryRunInput::Keys(vec![RawKey::Function(12)]));
        assert_eq!(
            DryRunInput::parse("a 1\n"),
            DryRunInput::Keys(vec![RawKey::Char('a'), RawKey::Space, RawKey::Char('1')])
        );
        assert_eq!(DryRunInput::parse(":solo"), DryRunInput::Action(ControlAction::ToggleSoloMain));
        assert!(matches!(DryRunInput::parse(":fly"), DryRunInput::Invalid(_)));
        assert_eq!(DryRunInput::parse("   "), DryRunInput::Empty);
    }

    #[test]
    fn lines_drive_the_controller() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(DryRunBackend::with_demo_windows());
        let mut config = Config::default();
        config.delay_enabled = true;
        config.delay_ms = 0;

        let controller = Controller::new(
            config,
            dir.path().join("multibox.toml"),
            backend.clone(),
            InjectionTiming::zero(),
            Arc::new(ObserverSet::new()),
        )
        .unwrap();

        DryRunKeyboardListener::feed_line(&controller, ":discover");
        DryRunKeyboardListener::feed_line(&controller, "f12");
        DryRunKeyboardListener::feed_line(&controller, "Hi");

        // 'h' и 'i' уходят в два неактивных окна: нажатие и отпускание
        assert!(controller.status().active);
        assert_eq!(backend.posted().len(), 2 * 2 * 2);
    }
}
