use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use transit_discover::cache::{CacheConfig, CachedProvider};
use transit_discover::discover::{DiscoverConfig, Discoverer, DiscoveryEvent, Stats};
use transit_discover::domain::StopId;
use transit_discover::provider::{
    FixtureProvider, Profile, RestClient, RestClientConfig, TransitProvider,
};

/// Berlin Gesundbrunnen.
const DEFAULT_FIRST: &str = "900000007102";

const DEFAULT_TIMEZONE: &str = "Europe/Berlin";
const DEFAULT_LOCALE: &str = "de-DE";

/// How often to report progress.
const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Discover all stops of a transit network, starting from one stop.
///
/// Stops are written to stdout, one JSON object per line.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Stop to start from
    #[arg(default_value = DEFAULT_FIRST)]
    first: String,

    /// Don't show progress reports on stderr
    #[arg(short, long)]
    silent: bool,

    /// hafas-rest-api base URL
    #[arg(long, env = "DISCOVER_ENDPOINT")]
    endpoint: Option<String>,

    /// Provider timezone
    #[arg(long, env = "DISCOVER_TIMEZONE", default_value = DEFAULT_TIMEZONE)]
    timezone: String,

    /// Provider locale
    #[arg(long, env = "DISCOVER_LOCALE", default_value = DEFAULT_LOCALE)]
    locale: String,

    /// Queries in flight (default 2)
    #[arg(long, env = "DISCOVER_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Serve responses from this directory instead of the endpoint
    #[arg(long, env = "DISCOVER_FIXTURES")]
    fixtures: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.silent { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let profile = match Profile::new(&args.timezone, &args.locale) {
        Ok(profile) => profile,
        Err(e) => {
            error!(error = %e, "invalid provider profile");
            return ExitCode::FAILURE;
        }
    };

    let first = match StopId::parse(&args.first) {
        Ok(first) => first,
        Err(e) => {
            error!(error = %e, "invalid start stop");
            return ExitCode::FAILURE;
        }
    };

    let mut config = DiscoverConfig::default();
    if let Some(n) = args.concurrency {
        config = config.with_concurrency(n);
    }

    let cache_config = CacheConfig::default();
    let outcome = match &args.fixtures {
        Some(dir) => match FixtureProvider::new(dir, profile) {
            Ok(fixtures) => {
                info!(dir = %dir.display(), boards = fixtures.departure_boards(), "serving fixtures");
                run(CachedProvider::new(fixtures, &cache_config), first, config, args.silent).await
            }
            Err(e) => {
                error!(error = %e, dir = %dir.display(), "failed to load fixtures");
                return ExitCode::FAILURE;
            }
        },
        None => {
            let mut client_config = RestClientConfig::new(profile);
            if let Some(endpoint) = args.endpoint.clone() {
                client_config = client_config.with_base_url(endpoint);
            }
            info!(endpoint = %client_config.base_url, "using hafas-rest-api endpoint");
            match RestClient::new(client_config) {
                Ok(client) => {
                    run(CachedProvider::new(client, &cache_config), first, config, args.silent)
                        .await
                }
                Err(e) => {
                    error!(error = %e, "failed to create HTTP client");
                    return ExitCode::FAILURE;
                }
            }
        }
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("{message}");
            ExitCode::FAILURE
        }
    }
}

/// Crawl from `first`, writing each stop to stdout as one JSON line.
async fn run<P: TransitProvider>(
    provider: P,
    first: StopId,
    config: DiscoverConfig,
    silent: bool,
) -> Result<(), String> {
    let mut discovery = Discoverer::new(provider)
        .discover(first, config)
        .map_err(|e| e.to_string())?;

    let reporter = (!silent).then(|| {
        let mut stats = discovery.stats();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(REPORT_INTERVAL);
            interval.tick().await; // First tick is immediate, skip it
            loop {
                interval.tick().await;
                report(&stats.borrow_and_update());
            }
        })
    });

    let mut out = BufWriter::new(std::io::stdout());
    let mut result = Ok(());
    while let Some(event) = discovery.next_event().await {
        match event {
            Ok(DiscoveryEvent::Stop(stop)) => {
                let written = serde_json::to_writer(&mut out, &stop)
                    .map_err(|e| e.to_string())
                    .and_then(|()| out.write_all(b"\n").map_err(|e| e.to_string()));
                if let Err(e) = written {
                    result = Err(format!("failed to write to stdout: {e}"));
                    break;
                }
            }
            Ok(DiscoveryEvent::Edge(_)) => {}
            Ok(DiscoveryEvent::ProviderError { task, error }) => {
                warn!(task = %task, error = %error, "provider error");
            }
            Err(e) => {
                result = Err(e.to_string());
                break;
            }
        }
    }

    if let Some(reporter) = reporter {
        reporter.abort();
    }
    if result.is_ok() {
        if !silent {
            report(&discovery.stats().borrow());
        }
        out.flush()
            .map_err(|e| format!("failed to write to stdout: {e}"))?;
    }
    result
}

fn report(stats: &Stats) {
    let eta = stats
        .eta
        .map_or_else(|| "unknown".to_string(), |eta| format!("{}s", eta.as_secs()));
    info!(
        requests = stats.requests,
        stops = stats.nodes,
        edges = stats.edges,
        queued = stats.queued,
        rate = %format!("{:.1}/s", stats.discovery_rate),
        eta = %eta,
        "progress"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("transit-discover").chain(args.iter().copied()))
    }

    #[test]
    fn command_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn defaults_to_gesundbrunnen() {
        let args = parse(&[]).unwrap();
        assert_eq!(args.first, DEFAULT_FIRST);
        assert!(!args.silent);
    }

    #[test]
    fn first_and_silent() {
        let args = parse(&["-s", "900000100003"]).unwrap();
        assert_eq!(args.first, "900000100003");
        assert!(args.silent);
    }

    #[test]
    fn help_and_version_exit_early() {
        let err = parse(&["x", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
        let err = parse(&["-V"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn rejects_unknown_flags_and_extra_arguments() {
        assert!(parse(&["--fast"]).is_err());
        assert!(parse(&["A", "B"]).is_err());
        assert!(parse(&["--concurrency", "many"]).is_err());
    }
}
