use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::error::FerryError;

#[derive(Parser, Debug)]
#[command(name = "ferry", version, about = "Encrypted peer-to-peer file transfer")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// TCP port to listen on
    #[arg(long, default_value_t = crate::discovery::service::DEFAULT_PORT)]
    pub port: u16,

    /// Name advertised for this node
    #[arg(long, default_value = "node1")]
    pub name: String,

    /// Path of the file to send
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Discover and connect to peers sharing this service id
    #[arg(long)]
    pub search: Option<String>,

    /// Connect directly to a peer at host:port
    #[arg(long)]
    pub connect: Option<String>,

    /// Shared passcode gating TCP transfers (prompted for when omitted)
    #[arg(long)]
    pub passcode: Option<String>,

    /// Directory where received files are written
    #[arg(long, default_value = "public")]
    pub output: PathBuf,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Increase verbosity (-v for verbose, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode: suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send a file over a WebRTC data channel (copy/paste signaling)
    RtcSend {
        /// Path of the file to send
        #[arg(long)]
        file: PathBuf,
    },

    /// Receive a file over a WebRTC data channel (copy/paste signaling)
    RtcRecv {
        /// Directory where the received file is written
        #[arg(long, default_value = "public")]
        output: PathBuf,
    },
}

/// Split a `host:port` target. The last colon separates the port, so
/// bracketless IPv6 hosts still parse.
pub fn parse_host_port(target: &str) -> Result<(String, u16), FerryError> {
    let (host, port_str) = target.rsplit_once(':').ok_or_else(|| {
        FerryError::Config(format!("invalid --connect target '{target}', expected host:port"))
    })?;
    if host.is_empty() {
        return Err(FerryError::Config(format!(
            "invalid --connect target '{target}', missing host"
        )));
    }
    let port: u16 = port_str.parse().map_err(|_| {
        FerryError::Config(format!("invalid port in --connect target '{target}'"))
    })?;
    Ok((host.to_string(), port))
}
