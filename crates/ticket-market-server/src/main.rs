//! Server implementation

#![warn(missing_docs)]

mod http;
mod monitor;
mod settings;

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use eyre::{eyre, Result, WrapErr};
use monitor::StatusBroadcaster;
use settings::MarketSettings;
use ticket_market_core::{Config, RawRequest, RequestHandler};
use ticket_market_engine::{ConfigurationRepository, Controller, Supervisor};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command line options
#[derive(Debug)]
struct Opts {
    /// Initial configuration of the ticket market
    config: Config,

    /// Port for the HTTP server to listen on
    port: u16,
    /// Host for the HTTP server to listen on
    host: String,
    /// Number of request handler threads
    handler_threads: u32,
    /// Interval between two status broadcasts
    status_interval: Duration,
    /// JSON file backing the configuration store
    config_store: Option<PathBuf>,
}

impl Opts {
    fn from_args(settings: MarketSettings) -> Result<Self> {
        let mut opts = Opts {
            port: settings.port.unwrap_or(8585),
            host: settings.host.unwrap_or_else(|| String::from("127.0.0.1")),
            config: settings.market,
            handler_threads: settings.handler_threads.unwrap_or(16),
            status_interval: Duration::from_millis(settings.status_interval_ms.unwrap_or(1_000)),
            config_store: settings.config_store,
        };

        let mut option: Option<String> = None;
        for arg in std::env::args().skip(1) {
            if let Some(opt) = option.take() {
                match opt.as_str() {
                    "-port" => opts.port = parse(&opt, &arg)?,
                    "-host" => opts.host = arg,
                    "-tickets" => opts.config.total_tickets = parse(&opt, &arg)?,
                    "-release-rate" => opts.config.ticket_release_rate = parse(&opt, &arg)?,
                    "-retrieval-rate" => {
                        opts.config.customer_retrieval_rate = parse(&opt, &arg)?
                    }
                    "-capacity" => opts.config.max_ticket_capacity = parse(&opt, &arg)?,
                    "-release-interval" => opts.config.release_interval_ms = parse(&opt, &arg)?,
                    "-retrieval-interval" => {
                        opts.config.retrieval_interval_ms = parse(&opt, &arg)?
                    }
                    "-handler-threads" => opts.handler_threads = parse(&opt, &arg)?,
                    "-status-interval" => {
                        opts.status_interval = Duration::from_millis(parse(&opt, &arg)?)
                    }
                    "-config-store" => opts.config_store = Some(PathBuf::from(arg)),
                    _ => return Err(eyre!("unknown option {opt}")),
                }
            } else {
                match arg.as_str() {
                    "-budget" => opts.config.enforce_ticket_budget = true,
                    _ => option = Some(arg),
                }
            }
        }
        if let Some(opt) = option {
            return Err(eyre!("option {opt} is missing its value"));
        }
        if opts.handler_threads == 0 {
            return Err(eyre!("-handler-threads must be at least 1"));
        }

        Ok(opts)
    }
}

fn parse<T>(opt: &str, arg: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    arg.parse()
        .wrap_err_with(|| format!("{opt} takes a decimal number, got {arg:?}"))
}

fn http_loop<H: RequestHandler>(
    server: &tiny_http::Server,
    handler: &H,
    broadcaster: &StatusBroadcaster,
    update_timeout: Duration,
) {
    loop {
        let rq = match server.recv() {
            Ok(rq) => rq,
            Err(e) => {
                warn!("HTTP receive failed: {e}");
                continue;
            }
        };
        match http::parse(rq) {
            Some(http::Parsed::Market(rq)) => handler.handle(rq),
            Some(http::Parsed::Updates(rq)) => {
                let updates = broadcaster.subscribe();
                let rq = Box::new(rq);
                match updates.recv_timeout(update_timeout) {
                    Ok(status) => match serde_json::to_string(&status) {
                        Ok(json) => rq.respond_with_json(json),
                        Err(e) => rq.respond_with_failure(e.to_string()),
                    },
                    Err(_) => rq.respond_with_failure("no status update available".into()),
                }
            }
            None => {}
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let opts = Opts::from_args(MarketSettings::load()?)?;
    info!(?opts, "starting ticket market");

    let repository = match &opts.config_store {
        Some(path) => ConfigurationRepository::open(path)?,
        None => ConfigurationRepository::new(),
    };
    let supervisor = Arc::new(Supervisor::with_config(opts.config)?);
    let controller = Controller::new(supervisor.clone(), repository);
    let broadcaster = StatusBroadcaster::start(supervisor, opts.status_interval)?;

    let server = tiny_http::Server::http((opts.host.as_str(), opts.port))
        .map_err(|e| eyre!("failed to listen on {}:{}: {e}", opts.host, opts.port))?;
    info!(host = %opts.host, port = opts.port, "listening");

    let update_timeout = opts.status_interval * 5;
    thread::scope(|s| -> Result<()> {
        for i in 0..opts.handler_threads {
            thread::Builder::new()
                .name(format!("handler_{i}"))
                .spawn_scoped(s, || {
                    http_loop(&server, &controller, &broadcaster, update_timeout)
                })?;
        }
        Ok(())
    })?;

    broadcaster.shutdown();
    controller.shutdown();
    Ok(())
}
