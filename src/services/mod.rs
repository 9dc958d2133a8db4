pub mod backend;
pub mod command_dispatcher;
pub mod controller;
pub mod key_injector;
pub mod keyboard_listener;
pub mod observers;
pub mod replication_engine;
pub mod state;
pub mod status_reporter;
pub mod window_registry;

pub use backend::create_window_backend;
pub use controller::Controller;
pub use key_injector::InjectionTiming;
pub use keyboard_listener::create_keyboard_listener;
pub use observers::ObserverSet;
pub use status_reporter::StatusReporter;
