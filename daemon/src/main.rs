//! lit-probe: connect to a Lit network and report what the peers agree on.

mod metrics_server;
mod shutdown;

use anyhow::Context;
use clap::Parser;
use lit_client::{ClientConfig, LitClient};
use lit_network::{BlockhashProvider, IndexerBlockhashProvider};
use lit_types::{ContractContext, LitNetwork};
use lit_utils::LogFormat;
use shutdown::ShutdownController;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "lit-probe", about = "Lit network connectivity probe")]
struct Cli {
    /// Network: "localhost", "datil-dev", "datil-test", "datil" or "custom".
    /// Defaults to the config file's value when one is given.
    #[arg(long, env = "LIT_NETWORK")]
    network: Option<LitNetwork>,

    /// Explicit peer URLs (comma-separated). Skips registry discovery.
    #[arg(long, env = "LIT_BOOTSTRAP_URLS", value_delimiter = ',')]
    bootstrap_urls: Vec<String>,

    /// Quorum size for an explicit peer list.
    #[arg(long, env = "LIT_MIN_NODE_COUNT")]
    min_node_count: Option<usize>,

    /// Upper bound for a handshake round, in milliseconds.
    #[arg(long, env = "LIT_CONNECT_TIMEOUT_MS")]
    connect_timeout_ms: Option<u64>,

    /// Require verified node attestation.
    #[arg(long, env = "LIT_CHECK_NODE_ATTESTATION")]
    check_node_attestation: bool,

    /// RPC endpoint of the validator registry chain.
    #[arg(long, env = "LIT_RPC_URL")]
    rpc_url: Option<String>,

    /// Staking contract of a custom deployment.
    #[arg(long, env = "LIT_STAKING_ADDRESS")]
    staking_address: Option<String>,

    /// Tracing filter, e.g. "info" or "debug,lit_network=trace".
    #[arg(long, env = "LIT_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log output: "human" or "json".
    #[arg(long, env = "LIT_LOG_FORMAT", value_parser = parse_log_format)]
    log_format: Option<LogFormat>,

    /// Path to a TOML configuration file. File settings are the base;
    /// CLI flags and env vars override them.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Connect once and print the consensus config as JSON.
    Connect,
    /// Connect and keep the connection current until interrupted.
    Watch {
        /// Seconds between status reports.
        #[arg(long, default_value_t = 30)]
        report_interval_secs: u64,

        /// Serve Prometheus metrics on this address.
        #[arg(long, env = "LIT_METRICS_ADDR")]
        metrics_addr: Option<SocketAddr>,
    },
    /// Fetch the latest blockhash from the indexer or the fallback RPCs.
    Blockhash,
}

fn parse_log_format(s: &str) -> Result<LogFormat, String> {
    match s.to_lowercase().as_str() {
        "human" => Ok(LogFormat::Human),
        "json" => Ok(LogFormat::Json),
        other => Err(format!("unknown log format \"{other}\"; expected human or json")),
    }
}

fn build_config(cli: &Cli) -> anyhow::Result<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::from_toml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ClientConfig::for_network(cli.network.unwrap_or(LitNetwork::Localhost)),
    };

    if let Some(network) = cli.network {
        config.lit_network = network;
    }
    if !cli.bootstrap_urls.is_empty() {
        config.bootstrap_urls = cli.bootstrap_urls.clone();
    }
    if cli.min_node_count.is_some() {
        config.min_node_count = cli.min_node_count;
    }
    if let Some(ms) = cli.connect_timeout_ms {
        config.connect_timeout_ms = ms;
    }
    config.check_node_attestation |= cli.check_node_attestation;
    if cli.rpc_url.is_some() {
        config.rpc_url = cli.rpc_url.clone();
    }
    if let Some(address) = &cli.staking_address {
        config
            .contract_context
            .get_or_insert_with(ContractContext::default)
            .staking_address = Some(address.clone());
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = build_config(&cli)?;
    lit_utils::init_logging(config.log_format, &config.log_level);

    match cli.command {
        Command::Connect => {
            let client = LitClient::builder(config).build()?;
            let consensus = client.connect().await?;
            println!("{}", serde_json::to_string_pretty(consensus.as_ref())?);
            client.disconnect();
        }
        Command::Watch {
            report_interval_secs,
            metrics_addr,
        } => watch(config, Duration::from_secs(report_interval_secs.max(1)), metrics_addr).await?,
        Command::Blockhash => {
            let provider = IndexerBlockhashProvider::new(
                config.blockhash_indexer_url.clone(),
                config.fallback_rpc_urls.clone(),
            );
            let sample = provider.fetch_latest().await?;
            println!("{}", serde_json::to_string_pretty(&sample)?);
        }
    }

    Ok(())
}

async fn watch(
    config: ClientConfig,
    report_interval: Duration,
    metrics_addr: Option<SocketAddr>,
) -> anyhow::Result<()> {
    let network = config.lit_network;
    let client = LitClient::builder(config).build()?;
    let consensus = client.connect().await?;
    println!("{}", serde_json::to_string_pretty(consensus.as_ref())?);

    let controller = ShutdownController::new();
    let metrics_task = metrics_addr.map(|addr| {
        let metrics = client.metrics().clone();
        let shutdown = controller.subscribe();
        tokio::spawn(async move {
            if let Err(e) = metrics_server::serve(addr, metrics, shutdown).await {
                tracing::error!(%addr, error = %e, "metrics endpoint failed");
            }
        })
    });

    let mut shutdown = controller.subscribe();
    let mut ticker = tokio::time::interval(report_interval);
    ticker.tick().await;

    tokio::select! {
        _ = controller.wait_for_signal() => {}
        _ = async {
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.recv() => break,
                    _ = ticker.tick() => report(&client).await,
                }
            }
        } => {}
    }

    client.disconnect();
    if let Some(task) = metrics_task {
        let _ = task.await;
    }
    tracing::info!(%network, "lit-probe exited cleanly");
    Ok(())
}

async fn report(client: &LitClient) {
    let epoch = client.epoch_state().await;
    let blockhash = client.get_latest_blockhash().await;
    match (client.snapshot(), blockhash) {
        (Some(snapshot), Ok(blockhash)) => tracing::info!(
            ready = client.is_ready(),
            peers = ?snapshot.node_set(),
            epoch = ?epoch.number,
            %blockhash,
            "network status"
        ),
        (_, Err(e)) => tracing::warn!(error = %e, "network status unavailable"),
        (None, _) => tracing::warn!("not connected"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("lit-probe").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn flags_build_a_config_without_a_file() {
        let cli = parse(&[
            "--network",
            "datil-dev",
            "--bootstrap-urls",
            "http://a:7470,http://b:7470",
            "--min-node-count",
            "2",
            "--log-format",
            "json",
            "connect",
        ]);
        let config = build_config(&cli).unwrap();
        assert_eq!(config.lit_network, LitNetwork::DatilDev);
        assert_eq!(config.bootstrap_urls, vec!["http://a:7470", "http://b:7470"]);
        assert_eq!(config.min_node_count, Some(2));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn flags_override_the_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "lit_network = \"datil-test\"\nconnect_timeout_ms = 1000\nlog_level = \"debug\""
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let cli = parse(&["--config", &path, "--connect-timeout-ms", "2500", "watch"]);
        let config = build_config(&cli).unwrap();
        assert_eq!(config.lit_network, LitNetwork::DatilTest);
        assert_eq!(config.connect_timeout_ms, 2500);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn staking_address_joins_the_contract_context() {
        let cli = parse(&[
            "--network",
            "custom",
            "--rpc-url",
            "http://10.0.0.5:8545",
            "--staking-address",
            "0x5fbdb2315678afecb367f032d93f642f64180aa3",
            "connect",
        ]);
        let config = build_config(&cli).unwrap();
        assert_eq!(config.rpc_url.as_deref(), Some("http://10.0.0.5:8545"));
        assert_eq!(
            config.contract_context.and_then(|c| c.staking_address).as_deref(),
            Some("0x5fbdb2315678afecb367f032d93f642f64180aa3")
        );
    }

    #[test]
    fn invalid_values_are_rejected() {
        let cli = parse(&["--connect-timeout-ms", "0", "connect"]);
        assert!(build_config(&cli).is_err());
        assert!(Cli::try_parse_from(["lit-probe", "--network", "cayenne", "connect"]).is_err());
        assert!(Cli::try_parse_from(["lit-probe", "--log-format", "xml", "connect"]).is_err());
    }
}
