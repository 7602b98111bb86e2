use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use ferry::cli::args::{parse_host_port, Cli, Commands};
use ferry::config::{self, Verbosity};
use ferry::discovery::{mdns, service::NodeService};
use ferry::error::FerryError;
use ferry::net::gate::TransferGate;
use ferry::net::tcp::TcpNode;
use ferry::net::{auth, probe, rtc, tcp};
use ferry::security::identity;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let verbosity = Verbosity::from_flags(cli.quiet, cli.verbose, cli.debug);

    // RUST_LOG overrides the CLI flags
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(verbosity.as_tracing_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(cli).await {
        display_error(&err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), FerryError> {
    let identity_dir = config::identity_dir()?;
    let quiet = cli.quiet;

    match cli.command {
        Some(Commands::RtcSend { file }) => {
            ensure_file_exists(&file)?;
            ensure_keypair(identity_dir.clone()).await?;
            let gate = TransferGate::new();
            rtc::send_over_channel(&file, &identity_dir, &gate, quiet).await
        }
        Some(Commands::RtcRecv { output }) => {
            ensure_keypair(identity_dir.clone()).await?;
            let gate = TransferGate::new();
            rtc::receive_over_channel(&output, &identity_dir, &gate, quiet)
                .await
                .map(|_| ())
        }
        None => run_node(cli, identity_dir).await,
    }
}

/// Node mode: listen for inbound transfers and optionally dial out, either
/// directly (`--connect`) or via discovery (`--search`).
async fn run_node(cli: Cli, identity_dir: PathBuf) -> Result<(), FerryError> {
    if let Some(file) = &cli.file {
        ensure_file_exists(file)?;
        tracing::info!(path = %file.display(), "will send file");
    }

    let passcode = match cli.passcode.clone() {
        Some(p) if !p.is_empty() => p,
        Some(_) => return Err(FerryError::Config("passcode must not be empty".into())),
        None => auth::prompt_passcode().await?,
    };

    ensure_keypair(identity_dir.clone()).await?;
    report_addresses().await;

    let gate = TransferGate::new();
    let cancel = CancellationToken::new();
    spawn_shutdown_handler(cancel.clone());

    let node = Arc::new(TcpNode {
        passcode,
        output_dir: cli.output.clone(),
        identity_dir,
        gate,
        quiet: cli.quiet,
    });

    let server = tokio::spawn(tcp::serve(cli.port, Arc::clone(&node), cancel.clone()));

    // Stay discoverable for as long as the daemon handle lives.
    let _mdns = match &cli.search {
        Some(service_id) => {
            let service = NodeService::new(Some(cli.name.clone()), cli.port);
            match mdns::announce(&service, service_id) {
                Ok(daemon) => Some(daemon),
                Err(e) => {
                    tracing::warn!(error = %e, "mDNS announce failed");
                    None
                }
            }
        }
        None => None,
    };

    if let (Some(target), Some(file)) = (&cli.connect, &cli.file) {
        let (host, port) = parse_host_port(target)?;
        tracing::info!(%host, port, "connecting to peer (direct)");
        ferry::net::retry_with_backoff(3, Duration::from_secs(1), || {
            tcp::send_to(&host, port, file, &node)
        })
        .await?;
    } else if cli.connect.is_some() {
        tracing::warn!("--connect given without --file; nothing to send");
    }

    if let (Some(service_id), Some(file)) = (&cli.search, &cli.file) {
        let id = service_id.clone();
        let peers = tokio::task::spawn_blocking(move || mdns::find_peers(&id, 5))
            .await
            .map_err(|e| FerryError::Discovery(format!("discovery task failed: {e}")))??;
        tracing::info!(count = peers.len(), "discovered peers");

        for peer in peers.iter().filter(|p| p.name != cli.name) {
            tracing::info!(peer = %peer.name, host = %peer.host, port = peer.port, "sending to peer");
            let outcome = ferry::net::retry_with_backoff(3, Duration::from_secs(1), || {
                tcp::send_to(&peer.host, peer.port, file, &node)
            })
            .await;
            match outcome {
                Ok(()) => tracing::info!(peer = %peer.name, "transfer complete"),
                Err(e) => tracing::error!(peer = %peer.name, error = %e, "transfer failed"),
            }
        }
    }

    // Keep serving until the shutdown signal; the listener task only ends on
    // cancellation or a bind failure.
    server
        .await
        .map_err(|e| FerryError::Transport(format!("listener task failed: {e}")))?
}

fn ensure_file_exists(path: &Path) -> Result<(), FerryError> {
    if !path.exists() {
        return Err(FerryError::SourceNotFound {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

/// Key generation can take a while for RSA-4096; keep it off the runtime
/// threads.
async fn ensure_keypair(identity_dir: PathBuf) -> Result<(), FerryError> {
    tokio::task::spawn_blocking(move || identity::ensure_keypair(&identity_dir))
        .await
        .map_err(|e| FerryError::KeyStore(format!("keypair task failed: {e}")))?
}

/// Log the addresses peers can reach us on. Advisory; failures only warn.
async fn report_addresses() {
    match probe::primary_local_ip() {
        Ok(ip) => tracing::info!(%ip, "local address"),
        Err(e) => tracing::warn!(error = %e, "unable to determine local address"),
    }
    match probe::public_address(probe::DEFAULT_STUN_SERVER, Duration::from_secs(3)).await {
        Ok(addr) => tracing::info!(%addr, "public address (via STUN)"),
        Err(e) => tracing::warn!(error = %e, "unable to determine public address"),
    }
}

fn spawn_shutdown_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            cancel.cancel();
        }
    });
}

/// Print a FerryError with an optional hint to stderr.
fn display_error(err: &FerryError) {
    eprintln!("error: {err}");
    if let Some(suggestion) = err.suggestion() {
        eprintln!("  hint: {suggestion}");
    }
}
