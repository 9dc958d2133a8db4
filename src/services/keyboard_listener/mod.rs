mod classifier;
mod dry_keyboard_listener;
mod key_mapping;
#[cfg(target_os = "linux")]
mod keyboard_listener;
mod modifier_state;
mod r#trait;
#[cfg(target_os = "windows")]
mod windows_hook;

pub use self::classifier::KeyClassifier;
pub use self::r#trait::create_keyboard_listener;
