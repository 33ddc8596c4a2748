//! `retter`: a protective reverse proxy that shields a single backend HTTP
//! origin behind a per-route circuit breaker, TTL cache, and
//! last-known-success fallback.
//!
//! Grounded on the original system's `Main.go` bootstrap (splash banner,
//! config resolution, `ListenAndServe`) generalised to this workspace's
//! layered config (CLI > env > default, see `retter_core::Config`),
//! `tracing`-based logging, and `tokio`-driven graceful shutdown.

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use retter_core::Config;
use retter_proxy::Proxy;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Command-line overrides for `retter`'s configuration. Any flag left unset
/// falls through to the matching `RETTER_<KEY>` environment variable, and
/// from there to the compiled-in default — see `retter_core::Config`.
#[derive(Debug, Parser)]
#[command(name = "retter", about = "A protective reverse proxy with a circuit breaker, TTL cache, and last-known-success fallback")]
struct Cli {
    /// Address to listen on, e.g. `:8089` or `127.0.0.1:8089`.
    #[arg(long)]
    listen: Option<String>,

    /// Base URL of the backend origin to protect.
    #[arg(long)]
    backend_baseurl: Option<String>,

    /// Seconds a successful response stays cached for a given route key.
    #[arg(long)]
    cache_ttl: Option<u64>,

    /// Include the raw query string in the cache/breaker key.
    #[arg(long)]
    cache_detect_query: Option<bool>,

    /// Include a detected session cookie in the cache/breaker key.
    #[arg(long)]
    cache_detect_session: Option<bool>,

    /// Failure rate (0..1) above which a breaker trips, once the window's
    /// minimum call count has been reached.
    #[arg(long)]
    breaker_fail_rate: Option<f64>,

    /// Consecutive failures above which a breaker trips unconditionally.
    #[arg(long)]
    breaker_consecutive_fail: Option<u32>,

    /// Log verbosity passed to the `tracing-subscriber` `EnvFilter`.
    #[arg(long)]
    log_level: Option<String>,

    /// Seconds to wait for in-flight requests to finish on shutdown.
    #[arg(long)]
    graceful_shutdown_timeout: Option<u64>,
}

impl Cli {
    /// Overlays any flags the caller actually passed atop the env/default
    /// layers already resolved into `config`.
    fn apply(&self, config: &mut Config) {
        if let Some(v) = &self.listen {
            config.set("server.listen", v.clone());
        }
        if let Some(v) = &self.backend_baseurl {
            config.set("backend.baseurl", v.clone());
        }
        if let Some(v) = self.cache_ttl {
            config.set("cache.ttl", v.to_string());
        }
        if let Some(v) = self.cache_detect_query {
            config.set("cache.detect.query", v.to_string());
        }
        if let Some(v) = self.cache_detect_session {
            config.set("cache.detect.session", v.to_string());
        }
        if let Some(v) = self.breaker_fail_rate {
            config.set("breaker.fail.rate", v.to_string());
        }
        if let Some(v) = self.breaker_consecutive_fail {
            config.set("breaker.consecutive.fail", v.to_string());
        }
        if let Some(v) = &self.log_level {
            config.set("log.level", v.clone());
        }
        if let Some(v) = self.graceful_shutdown_timeout {
            config.set("server.timeout.graceshut", v.to_string());
        }
    }
}

fn splash() {
    println!("________________________________________________________________ ");
    println!(r"\______   \_   _____/\__    ___/\__    ___/\_   _____/\______   \");
    println!(r" |       _/|    __)_   |    |     |    |    |    __)_  |       _/");
    println!(r" |    |   \|        \  |    |     |    |    |        \ |    |   \");
    println!(r" |____|_  /_______  /  |____|     |____|   /_______  / |____|_  /");
    println!(r"       \/        \/                               \/         \/ ");
}

/// Parses `server.listen` (e.g. `:8089` or `127.0.0.1:8089`) into a
/// `SocketAddr`, treating a bare `:PORT` as "bind every interface".
fn parse_listen_addr(raw: &str) -> SocketAddr {
    let normalized = if let Some(port) = raw.strip_prefix(':') {
        format!("0.0.0.0:{port}")
    } else {
        raw.to_string()
    };
    SocketAddr::from_str(&normalized)
        .unwrap_or_else(|e| panic!("invalid server.listen value {raw:?}: {e}"))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let mut config = Config::from_env();
    cli.apply(&mut config);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.get_string("log.level"))),
        )
        .init();

    splash();

    let addr = parse_listen_addr(&config.get_string("server.listen"));
    let read_timeout = config.get_duration_secs("server.timeout.read");
    let graceshut_timeout = config.get_duration_secs("server.timeout.graceshut");
    let backend = config.get_string("backend.baseurl");

    let proxy = Arc::new(Proxy::new(config));

    let app = proxy
        .clone()
        .into_router()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(read_timeout));

    tracing::info!(%addr, %backend, "retter is listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {addr}: {e}"));

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal(graceshut_timeout))
        .await
        .expect("server error");

    proxy.shutdown();
}

/// Resolves once `SIGINT` or `SIGTERM` is received, logs that shutdown has
/// begun, and gives `axum::serve` the grace period the caller configured
/// before it forcibly drops any requests still in flight.
async fn shutdown_signal(grace_period: Duration) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!(?grace_period, "shutdown signal received, draining in-flight requests");

    // `axum::serve`'s graceful shutdown has no built-in deadline: once this
    // future resolves it stops accepting new connections and waits,
    // unbounded, for the rest to finish. This backstop enforces
    // `server.timeout.graceshut` by forcing an exit if the drain overruns it.
    tokio::spawn(async move {
        tokio::time::sleep(grace_period).await;
        tracing::warn!("graceful shutdown grace period elapsed; forcing exit");
        std::process::exit(0);
    });
}
