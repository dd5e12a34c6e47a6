//! Freespeek Admin Watcher
//!
//! Headless console: restores or creates an admin session, mounts the
//! dashboard, live-user and tracking pages, and logs every refresh until
//! Ctrl-C or the session ends.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use freespeek_admin::pages::{DashboardPage, LiveUsersPage, PageSettings, TrackingPage};
use freespeek_admin::{ApiClient, Config, FileTokenStore, ResourceState, SessionManager};
use freespeek_config::{AppConfig, ConfigLoader};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// How often the token expiry is re-checked locally
const EXPIRY_CHECK_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(name = "freespeek-admin-watch")]
#[command(about = "Headless Freespeek admin console - polls the dashboard pages and logs them")]
struct Args {
    /// Configuration file (falls back to FREESPEEK_CONFIG, then the standard locations)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Fetch every page once, log it and exit
    #[arg(long)]
    once: bool,

    /// Log out and drop the persisted token on exit
    #[arg(long)]
    logout: bool,

    /// Print an example configuration file and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    if args.print_config {
        println!("{}", AppConfig::example_toml());
        return Ok(());
    }

    freespeek_common::init_logging("freespeek-admin-watch");

    info!("Starting Freespeek admin watcher");

    let loader = match &args.config {
        Some(path) => ConfigLoader::with_path(path.clone()),
        None => ConfigLoader::new(),
    };
    let config = loader.load().context("Failed to load configuration")?;
    info!(
        base_url = %config.api.base_url,
        dashboard_interval_ms = config.polling.dashboard_interval_ms,
        live_users_interval_ms = config.polling.live_users_interval_ms,
        tracking_interval_ms = config.polling.tracking_interval_ms,
        "Configuration loaded"
    );

    let client = ApiClient::new(client_config(&config))?;
    let store = Arc::new(FileTokenStore::new(&config.session.token_dir, &config.session.storage_key));
    let session = Arc::new(SessionManager::new(Arc::new(client.clone()), store));
    let rejection_listener = session.spawn_rejection_listener(client.subscribe_rejections());

    let status = session.initialize().await;
    let user = match status.user {
        Some(user) => user,
        None => {
            if !config.watch.has_credentials() {
                anyhow::bail!(
                    "No valid persisted session and no credentials configured \
                     (set FREESPEEK_ADMIN_EMAIL and FREESPEEK_ADMIN_PASSWORD)"
                );
            }
            session
                .login(&config.watch.email, &config.watch.password)
                .await
                .context("Login failed")?
        }
    };
    info!(user = %user.email, role = %user.role, expires_at = ?session.expires_at(), "Session ready");

    let settings = page_settings(&config);
    let dashboard = DashboardPage::mount(&client, &settings, session.subscribe());
    let live_users = LiveUsersPage::mount(&client, &settings, session.subscribe());
    let tracking = TrackingPage::mount(&client, &settings, session.subscribe());

    if args.once {
        dashboard.refresh().await;
        live_users.refresh().await;
        tracking.refresh().await;

        log_state("dashboard_stats", &dashboard.stats.state(), |s| {
            format!("{} users, {} active, {} new today", s.total_users, s.active_users, s.new_users_today)
        });
        log_state("online_users", &dashboard.online.state(), |count| format!("{} online", count));
        log_state("live_users", &live_users.users.state(), |users| format!("{} connected", users.len()));
        log_state("tracking_stats", &tracking.stats.state(), |s| {
            format!("{} sessions, {} page views", s.total_sessions, s.page_views)
        });
    } else {
        let reporters = vec![
            spawn_reporter("dashboard_stats", dashboard.stats.subscribe(), |s| {
                format!("{} users, {} active, {} new today", s.total_users, s.active_users, s.new_users_today)
            }),
            spawn_reporter("online_users", dashboard.online.subscribe(), |count| format!("{} online", count)),
            spawn_reporter("live_users", live_users.users.subscribe(), |users| format!("{} connected", users.len())),
            spawn_reporter("tracking_stats", tracking.stats.subscribe(), |s| {
                format!("{} sessions, {} page views", s.total_sessions, s.page_views)
            }),
            spawn_reporter("tracking_users", tracking.users.subscribe(), |page| {
                format!("page {} of {}, {} tracked users", page.page, page.total_pages, page.total)
            }),
        ];

        let expiry_check = {
            let session = session.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(EXPIRY_CHECK_INTERVAL);
                loop {
                    ticker.tick().await;
                    if !session.ensure_valid().await {
                        break;
                    }
                }
            })
        };

        wait_for_shutdown(session.subscribe()).await;

        expiry_check.abort();
        for reporter in reporters {
            reporter.abort();
        }
    }

    dashboard.unmount();
    live_users.unmount();
    tracking.unmount();

    if args.logout || config.watch.logout_on_exit {
        session.logout().await;
    }
    rejection_listener.abort();

    info!("Admin watcher stopped");
    Ok(())
}

fn client_config(config: &AppConfig) -> Config {
    Config::new(config.api.base_url.clone())
        .with_timeout(Duration::from_millis(config.api.timeout_ms))
        .with_retry(
            config.api.retry_attempts,
            Duration::from_millis(config.api.retry_delay_ms),
        )
}

fn page_settings(config: &AppConfig) -> PageSettings {
    let polling = &config.polling;
    PageSettings {
        dashboard_interval: Duration::from_millis(polling.dashboard_interval_ms),
        live_users_interval: Duration::from_millis(polling.live_users_interval_ms),
        tracking_interval: Duration::from_millis(polling.tracking_interval_ms),
        list_interval: Duration::from_millis(polling.users_interval_ms),
        fetch_timeout: Duration::from_millis(polling.fetch_timeout_ms),
        page_size: polling.users_page_size,
    }
}

/// Ctrl-C, or the session ending on its own (expiry, backend rejection)
async fn wait_for_shutdown(mut session: watch::Receiver<freespeek_admin::SessionStatus>) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!(error = %e, "Failed to listen for Ctrl-C");
            }
            info!("Shutdown signal received");
        }
        _ = session.wait_for(|status| !status.is_loading && !status.is_authenticated()) => {
            warn!("Session ended, shutting down");
        }
    }
}

fn log_state<T>(resource: &str, state: &ResourceState<T>, summarize: impl Fn(&T) -> String) {
    match (&state.data, &state.error) {
        (_, Some(error)) => warn!(resource, error = %error, "Refresh failed"),
        (Some(data), None) => info!(
            resource,
            summary = %summarize(data),
            updated_at = ?state.last_updated_at,
            "Refreshed"
        ),
        (None, None) => info!(resource, "No data yet"),
    }
}

fn spawn_reporter<T, F>(
    resource: &'static str,
    mut state: watch::Receiver<ResourceState<T>>,
    summarize: F,
) -> JoinHandle<()>
where
    T: Send + Sync + 'static,
    F: Fn(&T) -> String + Send + 'static,
{
    tokio::spawn(async move {
        while state.changed().await.is_ok() {
            let line = {
                let current = state.borrow_and_update();
                if current.is_loading {
                    continue;
                }
                match (&current.data, &current.error) {
                    (_, Some(error)) => Err(error.clone()),
                    (Some(data), None) => Ok(summarize(data)),
                    (None, None) => continue,
                }
            };
            match line {
                Ok(summary) => info!(resource, summary = %summary, "Refreshed"),
                Err(error) => warn!(resource, error = %error, "Refresh failed"),
            }
        }
    })
}
