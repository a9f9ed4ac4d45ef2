use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use dbconn_drivers::BackendKind;
use dbconn_engine::config::EngineConfig;
use dbconn_engine::engine::Engine;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendArg {
    /// MySQL / MariaDB
    Relational,
    /// MongoDB
    Document,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Relational => BackendKind::Relational,
            BackendArg::Document => BackendKind::Document,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "dbconn",
    version,
    about = "HTTP/JSON API over a MySQL or MongoDB session",
    disable_help_subcommand = true
)]
struct Cli {
    /// Which database family to serve (overrides DBCONN_BACKEND)
    #[arg(long, value_enum)]
    backend: Option<BackendArg>,

    /// Listen on HOST:PORT (overrides DBCONN_HOST / DBCONN_PORT)
    #[arg(short = 'S', value_name = "HOST:PORT")]
    serve: Option<String>,

    /// Allowed CORS origin; repeat or comma-separate. Any origin if unset.
    #[arg(long = "cors-origin", value_name = "ORIGIN")]
    cors_origins: Vec<String>,
}

fn parse_host_port(s: &str) -> Result<(String, u16)> {
    if let Some(rest) = s.strip_prefix('[') {
        // bracketed IPv6: [host]:port
        let Some(end) = rest.find(']') else {
            bail!("invalid bracketed IPv6 address");
        };
        let host = &rest[..end];
        let port = rest[end + 1..]
            .strip_prefix(':')
            .context("missing port after IPv6 host")?;
        let port: u16 = port.parse().context("invalid port")?;
        return Ok((host.to_string(), port));
    }
    let mut parts = s.rsplitn(2, ':');
    let port_str = parts.next().context("missing port")?;
    let host = parts.next().context("missing host")?;
    if host.is_empty() {
        bail!("missing host");
    }
    let port: u16 = port_str.parse().context("invalid port")?;
    Ok((host.to_string(), port))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = EngineConfig::from_env().context("failed to load configuration")?;
    if let Some(backend) = cli.backend {
        config = config.set_backend(backend.into());
    }
    if let Some(addr) = cli.serve.as_deref() {
        let (host, port) = parse_host_port(addr)
            .with_context(|| format!("-S expects HOST:PORT (e.g. 127.0.0.1:5001), got {addr:?}"))?;
        config = config.set_addr(host, port);
    }
    if !cli.cors_origins.is_empty() {
        config = config.set_cors_origins(&cli.cors_origins);
    }

    Engine::new(config).run().await?;
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("dbconn=info,dbconn_engine=info,dbconn_drivers=info,tower_http=info")
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
