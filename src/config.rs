use crate::error::{MultiboxError, Result as MultiboxResult};
use crate::events::{Hotkey, RawKey};
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::time::Duration;
use tracing::{error, info, warn};

/// Задержка удержания клавиши, если пользовательская задержка выключена
pub const MIN_KEY_HOLD_MS: u64 = 10;

/// Клавиши, которые разрешено реплицировать: a-z, 0-9 и пробел. Не сохраняется в файл.
pub const ALLOWED_KEYS: &str = "abcdefghijklmnopqrstuvwxyz1234567890 ";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub follow_target: String,
    pub assist_target: String,
    pub delay_enabled: bool,
    pub delay_ms: u64,
    #[serde(with = "key_list")]
    pub blacklisted_keys: BTreeSet<char>,
    pub logging: LoggingConfig,
    pub window: WindowConfig,
    pub input: InputConfig,
    pub hotkeys: HotkeyConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title_keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct InputConfig {
    pub device_path: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HotkeyConfig {
    pub toggle_active: String,
    pub toggle_pause: String,
    pub rediscover: String,
    pub send_follow: String,
    pub send_assist: String,
    pub toggle_solo_main: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            follow_target: String::new(),
            assist_target: String::new(),
            delay_enabled: false,
            delay_ms: MIN_KEY_HOLD_MS,
            blacklisted_keys: ['b', 'm'].into_iter().collect(),
            logging: LoggingConfig::default(),
            window: WindowConfig::default(),
            input: InputConfig::default(),
            hotkeys: HotkeyConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title_keywords: vec!["world of warcraft".to_string(), "wow".to_string()],
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            device_path: "auto".to_string(),
        }
    }
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            toggle_active: "f12".to_string(),
            toggle_pause: "f10".to_string(),
            rediscover: "f11".to_string(),
            send_follow: "f9".to_string(),
            send_assist: "f8".to_string(),
            toggle_solo_main: "f7".to_string(),
        }
    }
}

impl HotkeyConfig {
    fn entries(&self) -> [(Hotkey, &str); 6] {
        [
            (Hotkey::ToggleActive, self.toggle_active.as_str()),
            (Hotkey::TogglePause, self.toggle_pause.as_str()),
            (Hotkey::Rediscover, self.rediscover.as_str()),
            (Hotkey::SendFollow, self.send_follow.as_str()),
            (Hotkey::SendAssist, self.send_assist.as_str()),
            (Hotkey::ToggleSoloMain, self.toggle_solo_main.as_str()),
        ]
    }

    /// Разобрать привязки в таблицу клавиша -> действие
    pub fn bindings(&self) -> Result<HashMap<RawKey, Hotkey>> {
        let mut bindings = HashMap::new();
        for (hotkey, name) in self.entries() {
            let key = RawKey::from_name(name)
                .with_context(|| format!("Неверная горячая клавиша '{}' для {}", name, hotkey))?;
            if let Some(previous) = bindings.insert(key, hotkey) {
                anyhow::bail!(
                    "Клавиша '{}' назначена одновременно на {} и {}",
                    name,
                    previous,
                    hotkey
                );
            }
        }
        Ok(bindings)
    }
}

impl Config {
    /// Строгая загрузка: значения по умолчанию <- TOML <- переменные окружения MULTIBOX_*
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("MULTIBOX_").split("__"));

        let mut config: Config = figment
            .extract()
            .with_context(|| format!("Не удалось загрузить конфигурацию из {:?}", config_path))?;

        config.normalize();
        config.validate()?;

        Ok(config)
    }

    /// Загрузка, которая никогда не падает: при ошибке остаются значения по умолчанию
    pub fn load_or_default<P: AsRef<Path>>(config_path: P) -> Self {
        let config_path = config_path.as_ref();

        if !config_path.exists() {
            info!("Файл конфигурации {:?} не найден, используются значения по умолчанию", config_path);
        }

        match Self::load(config_path) {
            Ok(config) => config,
            Err(e) => {
                error!("Ошибка загрузки конфигурации: {:#}", e);
                warn!("Используются значения по умолчанию");
                Self::default()
            }
        }
    }

    /// Сохранить конфигурацию. Ошибка логируется и возвращается вызывающему.
    pub fn save<P: AsRef<Path>>(&self, config_path: P) -> MultiboxResult<()> {
        let config_path = config_path.as_ref();

        let content = toml::to_string_pretty(self).map_err(|e| {
            error!("Не удалось сериализовать конфигурацию: {}", e);
            MultiboxError::ConfigIo(format!("сериализация: {}", e))
        })?;

        std::fs::write(config_path, content).map_err(|e| {
            error!("Не удалось сохранить конфигурацию в {:?}: {}", config_path, e);
            MultiboxError::ConfigIo(format!("{:?}: {}", config_path, e))
        })?;

        info!("Конфигурация сохранена в {:?}", config_path);
        Ok(())
    }

    /// Приводит ключевые слова и цели к каноническому виду
    pub fn normalize(&mut self) {
        self.follow_target = self.follow_target.trim().to_string();
        self.assist_target = self.assist_target.trim().to_string();
        self.window.title_keywords = self
            .window
            .title_keywords
            .iter()
            .map(|keyword| keyword.trim().to_lowercase())
            .filter(|keyword| !keyword.is_empty())
            .collect();
    }

    pub fn validate(&self) -> Result<()> {
        // Валидация настроек логирования
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Неверный уровень логирования: {}", self.logging.level),
        }

        if self.window.title_keywords.is_empty() {
            anyhow::bail!("Список title_keywords не может быть пустым");
        }

        if self.input.device_path.is_empty() {
            anyhow::bail!("input.device_path не может быть пустым (используйте \"auto\")");
        }

        self.hotkeys.bindings()?;

        Ok(())
    }

    /// Сбросить цели follow/assist (аналог "очистить конфигурацию")
    pub fn clear_targets(&mut self) {
        self.follow_target.clear();
        self.assist_target.clear();
    }

    /// Снимок настроек фильтрации для движка
    pub fn filter_config(&self) -> FilterConfig {
        FilterConfig {
            follow_target: self.follow_target.clone(),
            assist_target: self.assist_target.clone(),
            delay_enabled: self.delay_enabled,
            delay_ms: self.delay_ms,
            allowed_keys: FilterConfig::default_allowed_keys(),
            blacklisted_keys: self.blacklisted_keys.iter().copied().collect(),
        }
    }
}

/// Настройки фильтрации и отправки, которыми пользуется движок
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterConfig {
    pub follow_target: String,
    pub assist_target: String,
    pub delay_enabled: bool,
    pub delay_ms: u64,
    pub allowed_keys: HashSet<char>,
    pub blacklisted_keys: HashSet<char>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Config::default().filter_config()
    }
}

impl FilterConfig {
    pub fn default_allowed_keys() -> HashSet<char> {
        ALLOWED_KEYS.chars().collect()
    }

    /// Чёрный список проверяется раньше белого и всегда побеждает
    pub fn should_replicate(&self, key: char) -> bool {
        if self.blacklisted_keys.contains(&key) {
            return false;
        }
        self.allowed_keys.contains(&key)
    }

    /// Время удержания клавиши между нажатием и отпусканием
    pub fn key_hold(&self) -> Duration {
        if self.delay_enabled {
            Duration::from_millis(self.delay_ms)
        } else {
            Duration::from_millis(MIN_KEY_HOLD_MS)
        }
    }
}

/// Список клавиш хранится в файле одной строкой через запятую: "b,m"
mod key_list {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::BTreeSet;

    pub fn serialize<S: Serializer>(keys: &BTreeSet<char>, serializer: S) -> Result<S::Ok, S::Error> {
        let joined = keys.iter().map(char::to_string).collect::<Vec<_>>().join(",");
        serializer.serialize_str(&joined)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BTreeSet<char>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(parse(&raw))
    }

    /// Элементы длиннее одного символа после обрезки пробелов отбрасываются
    pub fn parse(raw: &str) -> BTreeSet<char> {
        raw.split(',')
            .filter_map(|item| {
                let item = if item.chars().count() == 1 { item } else { item.trim() };
                let mut chars = item.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => c.to_lowercase().next(),
                    _ => None,
                }
            })
            .collect()
    }
}
