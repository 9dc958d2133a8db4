use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{reload, EnvFilter, Registry};
mod config;
mod error;
mod events;
mod services;
mod utils;

use config::Config;
use services::{
    create_keyboard_listener, create_window_backend, Controller, InjectionTiming, ObserverSet,
    StatusReporter,
};

type FilterHandle = reload::Handle<EnvFilter, Registry>;

#[derive(Parser, Debug)]
#[command(name = "multibox-rust")]
#[command(about = "Мультибоксинг: повтор нажатий из активного окна во все остальные окна игры")]
struct Args {
    /// Путь к файлу конфигурации
    #[arg(short, long, default_value = "multibox.toml")]
    config: String,

    /// Режим сухого запуска: эмуляция окон, клавиатура из stdin
    #[arg(long)]
    dry_run: bool,

    /// Уровень логирования (по умолчанию берётся из конфигурации)
    #[arg(long)]
    log_level: Option<String>,

    /// Цель команды /follow
    #[arg(long)]
    follow: Option<String>,

    /// Цель команды /assist
    #[arg(long)]
    assist: Option<String>,

    /// Сохранить итоговую конфигурацию в файл и продолжить работу
    #[arg(long)]
    save_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Логирование поднимается до чтения конфигурации, уровень из неё применяется позже
    let filter_handle = init_tracing(args.log_level.as_deref())?;

    info!("Запуск Multibox Rust v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load_or_default(&args.config);
    apply_config_log_level(&filter_handle, &config, args.log_level.is_some())?;

    if let Some(follow) = args.follow {
        config.follow_target = follow;
    }
    if let Some(assist) = args.assist {
        config.assist_target = assist;
    }
    config.normalize();

    if args.dry_run {
        warn!("Режим сухого запуска - окна эмулируются, клавиши никуда не отправляются");
    } else {
        #[cfg(target_os = "linux")]
        utils::permissions::check_permissions()?;
    }

    let backend = create_window_backend(args.dry_run)?;
    let observers = Arc::new(ObserverSet::new());
    let controller = Arc::new(Controller::new(
        config.clone(),
        &args.config,
        backend,
        InjectionTiming::default(),
        observers.clone(),
    )?);
    observers.register(Arc::new(StatusReporter::new(controller.state())));

    if args.save_config {
        // Ошибка уже залогирована, работа продолжается
        let _ = controller.save_config();
    }

    controller.registry().discover();
    log_hotkeys(&config);

    let keyboard_listener = create_keyboard_listener(&config.input, controller.clone(), args.dry_run)?;

    info!("Все компоненты инициализированы");

    let mut keyboard_handle = tokio::spawn(async move {
        if let Err(e) = keyboard_listener.run().await {
            error!("Ошибка в KeyboardListener: {}", e);
        }
    });

    let listener_finished = tokio::select! {
        result = signal::ctrl_c() => {
            match result {
                Ok(()) => info!("Получен сигнал завершения (Ctrl+C)"),
                Err(err) => error!("Ошибка при ожидании сигнала завершения: {}", err),
            }
            false
        }
        _ = &mut keyboard_handle => {
            warn!("KeyboardListener завершил работу");
            true
        }
    };

    info!("Завершение работы...");

    if !listener_finished {
        // Прерывание задачи снимает хук / останавливает чтение устройства
        keyboard_handle.abort();

        let shutdown_timeout = tokio::time::Duration::from_secs(5);
        match tokio::time::timeout(shutdown_timeout, keyboard_handle).await {
            Ok(_) => info!("Все сервисы завершили работу корректно"),
            Err(_) => warn!("Таймаут при завершении сервисов"),
        }
    }

    info!("Multibox Rust завершил работу");
    Ok(())
}

fn init_tracing(cli_level: Option<&str>) -> Result<FilterHandle> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(cli_level.unwrap_or("info")))?;
    let (filter, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact())
        .init();

    Ok(handle)
}

/// RUST_LOG и --log-level важнее уровня из файла конфигурации
fn apply_config_log_level(handle: &FilterHandle, config: &Config, cli_level_set: bool) -> Result<()> {
    if cli_level_set || std::env::var_os("RUST_LOG").is_some() {
        return Ok(());
    }

    handle.reload(EnvFilter::try_new(&config.logging.level)?)?;
    Ok(())
}

fn log_hotkeys(config: &Config) {
    let hotkeys = &config.hotkeys;
    info!(
        "Горячие клавиши: вкл/выкл {}, пауза {}, поиск окон {}, follow {}, assist {}, solo main {}",
        hotkeys.toggle_active,
        hotkeys.toggle_pause,
        hotkeys.rediscover,
        hotkeys.send_follow,
        hotkeys.send_assist,
        hotkeys.toggle_solo_main
    );
}
