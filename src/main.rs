mod collectors;
mod config;
mod dashboard;
mod http;
mod metrics;
mod pipeline;
mod report;
mod snapshot;

use axum::serve;
use clap::Parser;
use collectors::system::SysinfoProbe;
use collectors::HostProbe;
use config::Config;
use http::{HttpAppState, ProbeFactory};
use metrics::Metrics;
use report::ReportWriter;
use std::fs::OpenOptions;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "sysreport")]
#[command(version)]
struct Cli {
    /// YAML configuration; built-in defaults are used when omitted.
    #[arg(long)]
    config: Option<String>,
    /// Overrides `listen` from the configuration.
    #[arg(long)]
    listen: Option<String>,
    #[arg(long)]
    print_default_config: bool,
    /// Write the report once and exit without starting the server.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_yaml());
        return;
    }

    let mut cfg = match &cli.config {
        Some(path) => match Config::load_from_file(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                eprintln!("не удалось загрузить конфигурацию: {err}");
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };
    if let Some(listen) = cli.listen {
        cfg.listen = listen;
    }
    if let Err(err) = cfg.validate().and_then(|()| cfg.ensure_dirs()) {
        eprintln!("{err}");
        std::process::exit(1);
    }

    if let Err(err) = init_tracing(&cfg.log_path) {
        eprintln!(
            "не удалось открыть журнал {}: {err}",
            cfg.log_path.display()
        );
        std::process::exit(1);
    }

    let probe_factory: ProbeFactory =
        Arc::new(|| Box::new(SysinfoProbe::new()) as Box<dyn HostProbe + Send>);

    if cli.once {
        run_once(&cfg, probe_factory).await;
        return;
    }

    info!(
        listen = %cfg.listen,
        report = %cfg.report_path.display(),
        log = %cfg.log_path.display(),
        "запуск sysreport"
    );

    let metrics = match Metrics::new() {
        Ok(m) => m,
        Err(err) => {
            error!(error = %err, "не удалось инициализировать метрики");
            std::process::exit(1);
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let http_task = {
        let cfg = cfg.clone();
        let mut shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            let addr: SocketAddr = match cfg.listen.parse() {
                Ok(addr) => addr,
                Err(err) => {
                    error!(error = %err, listen = %cfg.listen, "некорректный адрес listen");
                    return;
                }
            };
            let app = http::build_router(HttpAppState::new(cfg, metrics, probe_factory));

            let listener = match TcpListener::bind(addr).await {
                Ok(l) => l,
                Err(err) => {
                    error!(error = %err, "не удалось запустить HTTP-сервер");
                    return;
                }
            };
            info!(%addr, "панель доступна");

            let server = serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.changed().await;
            });

            if let Err(err) = server.await {
                error!(error = %err, "ошибка HTTP-сервера");
            }
        })
    };

    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "не удалось дождаться Ctrl+C");
    }
    info!("получен Ctrl+C, выполняется остановка");

    let _ = shutdown_tx.send(true);
    let _ = http_task.await;
}

async fn run_once(cfg: &Config, probe_factory: ProbeFactory) {
    let writer = Arc::new(ReportWriter::new(cfg.report_path.clone()));
    let settings = cfg.sampler_settings();
    let task_writer = writer.clone();

    let joined = tokio::task::spawn_blocking(move || {
        let mut probe = probe_factory();
        pipeline::run_pipeline(&mut *probe, settings, &task_writer)
    })
    .await;

    match joined {
        Ok(Ok(_)) => println!("{}", writer.path().display()),
        Ok(Err(err)) => {
            error!(error = %err, "отчёт не сформирован");
            std::process::exit(1);
        }
        Err(err) => {
            error!(error = %err, "задача сбора завершилась с ошибкой");
            std::process::exit(1);
        }
    }
}

fn init_tracing(log_path: &Path) -> std::io::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .init();
    Ok(())
}
