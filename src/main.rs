use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;
use wghealth::*;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;

    let config_repo = Arc::new(config_repo::ConfigRepo::connect(&app_config.database.path).await?);
    config_repo.init().await?;

    let monitor = monitor::HealthMonitor::new(
        monitor::MonitorDeps {
            wg: Arc::new(wg_repo::WgCli::new(app_config.monitor.wg_command.clone())),
            prober: Arc::new(prober::PingProber::default()),
            config_repo: Some(config_repo),
        },
        app_config.monitor.clone(),
        app_config.labels.clone(),
    );
    let restored = monitor.restore_configs().await?;
    tracing::info!(interfaces = restored, "health configs loaded");

    if app_config.monitor.autostart {
        monitor.start();
    }

    let app = routes::app(monitor.clone());
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(s) => s,
                    Err(_) => {
                        let _ = tokio::signal::ctrl_c().await;
                        return;
                    }
                };
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            #[cfg(not(unix))]
            {
                let _ = tokio::signal::ctrl_c().await;
            }
        } => {
            tracing::info!("Received shutdown signal");
            monitor.stop();
        }
    }

    Ok(())
}
