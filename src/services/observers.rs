use crate::events::TrackedWindow;
use chrono::Local;
use parking_lot::RwLock;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Уровень сообщения журнала движка
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

/// Сообщение журнала для внешнего слоя представления
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    pub level: LogLevel,
    pub source: String,
    pub message: String,
    /// Локальное время в формате ЧЧ:ММ:СС
    pub timestamp: String,
}

impl LogRecord {
    pub fn new(level: LogLevel, source: &str, message: impl Into<String>) -> Self {
        Self {
            level,
            source: source.to_string(),
            message: message.into(),
            timestamp: Local::now().format("%H:%M:%S").to_string(),
        }
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] [{}] {}", self.timestamp, self.source, self.message)
    }
}

/// Слушатель изменений состояния движка. Все методы вызываются синхронно
/// и никогда под блокировкой состояния, так что из них можно читать статус.
pub trait EngineObserver: Send + Sync {
    fn on_status_change(&self) {}

    fn on_windows_updated(&self, _windows: &[TrackedWindow]) {}

    fn on_log_message(&self, _record: &LogRecord) {}
}

/// Набор зарегистрированных наблюдателей
#[derive(Default)]
pub struct ObserverSet {
    observers: RwLock<Vec<Arc<dyn EngineObserver>>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, observer: Arc<dyn EngineObserver>) {
        self.observers.write().push(observer);
    }

    // Снимок списка, чтобы наблюдатель мог зарегистрировать другого без взаимоблокировки
    fn snapshot(&self) -> Vec<Arc<dyn EngineObserver>> {
        self.observers.read().clone()
    }

    pub fn status_changed(&self) {
        for observer in self.snapshot() {
            observer.on_status_change();
        }
    }

    pub fn windows_updated(&self, windows: &[TrackedWindow]) {
        for observer in self.snapshot() {
            observer.on_windows_updated(windows);
        }
    }

    /// Пишет в tracing и пересылает сообщение наблюдателям
    pub fn log(&self, level: LogLevel, source: &str, message: impl Into<String>) {
        let record = LogRecord::new(level, source, message);
        match level {
            LogLevel::Info => info!(source = %record.source, "{}", record.message),
            LogLevel::Warning => warn!(source = %record.source, "{}", record.message),
            LogLevel::Error => error!(source = %record.source, "{}", record.message),
        }

        for observer in self.snapshot() {
            observer.on_log_message(&record);
        }
    }

    pub fn info(&self, source: &str, message: impl Into<String>) {
        self.log(LogLevel::Info, source, message);
    }

    pub fn warn(&self, source: &str, message: impl Into<String>) {
        self.log(LogLevel::Warning, source, message);
    }

    pub fn error(&self, source: &str, message: impl Into<String>) {
        self.log(LogLevel::Error, source, message);
    }
}

/// Наблюдатель, который запоминает всё полученное
#[cfg(test)]
#[derive(Default)]
pub struct RecordingObserver {
    pub status_changes: parking_lot::Mutex<usize>,
    pub window_updates: parking_lot::Mutex<Vec<Vec<TrackedWindow>>>,
    pub records: parking_lot::Mutex<Vec<LogRecord>>,
}

#[cfg(test)]
impl RecordingObserver {
    pub fn status_changes(&self) -> usize {
        *self.status_changes.lock()
    }

    pub fn last_windows(&self) -> Option<Vec<TrackedWindow>> {
        self.window_updates.lock().last().cloned()
    }

    pub fn has_record(&self, level: LogLevel, needle: &str) -> bool {
        self.records
            .lock()
            .iter()
            .any(|r| r.level == level && r.message.contains(needle))
    }
}

#[cfg(test)]
impl EngineObserver for RecordingObserver {
    fn on_status_change(&self) {
        *self.status_changes.lock() += 1;
    }

    fn on_windows_updated(&self, windows: &[TrackedWindow]) {
        self.window_updates.lock().push(windows.to_vec());
    }

    fn on_log_message(&self, record: &LogRecord) {
        self.records.lock().push(record.clone());
    }
}
