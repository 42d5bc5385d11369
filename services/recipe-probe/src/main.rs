//! Recifit probe
//!
//! Command-line client that drives a Recifit backend through the same dispatch
//! layer the web client uses:
//! 1. Loads configuration and seeds the cookie session with the refresh token
//! 2. Builds the general-purpose and authenticated clients over one cookie jar
//! 3. Issues every requested `method:/path` concurrently on the API client
//! 4. Logs each outcome (duplicates suppressed, refreshes coordinated)

mod config;
mod metrics;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use dispatch::{Client, ClientSet};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transport::{HttpRequest, HttpResponse, RequestKey, ReqwestTransport};

use crate::config::Config;

const USAGE: &str = "usage: recifit-probe [--config PATH] [--print-metrics] METHOD:/PATH...";

/// Parsed command line.
#[derive(Debug, Default)]
struct Args {
    config: Option<String>,
    print_metrics: bool,
    keys: Vec<RequestKey>,
}

fn parse_args(args: &[String]) -> Result<Args> {
    let mut parsed = Args::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let path = iter.next().context("--config requires a path")?;
                parsed.config = Some(path.clone());
            }
            "--print-metrics" => parsed.print_metrics = true,
            "-h" | "--help" => anyhow::bail!(USAGE),
            other => {
                let key = other
                    .parse::<RequestKey>()
                    .with_context(|| format!("invalid request argument {other:?}\n{USAGE}"))?;
                parsed.keys.push(key);
            }
        }
    }
    if parsed.keys.is_empty() {
        anyhow::bail!("no requests given\n{USAGE}");
    }
    Ok(parsed)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let cli: Vec<String> = std::env::args().skip(1).collect();
    let args = parse_args(&cli)?;

    let prometheus = metrics::install_recorder().context("failed to install Prometheus recorder")?;

    let config_path = Config::resolve_path(args.config.as_deref());
    info!(path = %config_path.display(), "loading configuration");
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        base_url = %config.client.base_url,
        api_url = %config.api_url(),
        exempt = config.client.exempt.len(),
        session = config.session.refresh_token.is_some(),
        "configuration loaded"
    );

    let clients = build_clients(&config)?;
    let outcomes = run(&clients.api, &args.keys).await;

    let mut failed = 0usize;
    for (key, outcome) in &outcomes {
        match outcome {
            Ok(response) => info!(
                key = %key,
                status = response.status.as_u16(),
                retried = response.request.is_retry(),
                bytes = response.body.len(),
                "request succeeded"
            ),
            Err(e) if e.is_duplicate() => warn!(key = %key, "request suppressed as duplicate"),
            Err(e) => {
                failed += 1;
                error!(key = %key, error = %e, "request failed");
            }
        }
    }

    if args.print_metrics {
        println!("{}", prometheus.render());
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} requests failed", outcomes.len());
    }
    Ok(())
}

/// Build both clients over one cookie jar, seeded with the configured refresh token.
fn build_clients(config: &Config) -> Result<ClientSet> {
    let jar = Arc::new(reqwest::cookie::Jar::default());
    if let Some(token) = &config.session.refresh_token {
        let url: reqwest::Url = config
            .client
            .base_url
            .parse()
            .context("base_url is not a valid URL")?;
        let cookie = token.cookie(&config.session.cookie_name);
        jar.add_cookie_str(cookie.expose(), &url);
    }

    let http = reqwest::Client::builder()
        .cookie_provider(jar)
        .build()
        .context("failed to build HTTP client")?;

    let timeout = Duration::from_secs(config.client.timeout_secs);
    let headers = config.header_injections();
    let general = ReqwestTransport::new(http.clone(), config.client.base_url.clone(), timeout)
        .with_headers(&headers);
    let api = ReqwestTransport::new(http, config.api_url(), timeout).with_headers(&headers);

    Ok(ClientSet::new(
        Arc::new(general),
        Arc::new(api),
        config.client_options()?,
    ))
}

/// Issue every request concurrently, in argument order.
async fn run(
    client: &Client,
    keys: &[RequestKey],
) -> Vec<(RequestKey, dispatch::Result<HttpResponse>)> {
    let requests = keys.iter().map(|key| {
        let request = HttpRequest::new(key.method().clone(), key.path());
        async move { (key.clone(), client.send(request).await) }
    });
    futures_util::future::join_all(requests).await
}
