use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};

use scriptwire_peer::PeerConfig;
use scriptwire_schema::Declarations;

use crate::exit::{schema_error, CliResult};
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod registry;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encode a JSON value with a declared type and show its wire form.
    Encode(EncodeArgs),
    /// Decode a payload with a declared type and print it as JSON.
    Decode(DecodeArgs),
    /// Register every declaration on loopback peers and print the id table.
    Registry(RegistryArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Registry(args) => registry::run(args, format),
        Command::Version(args) => version::run(args, format),
    }
}

/// Options shared by commands that run a loopback peer group.
#[derive(Args, Debug, Clone)]
pub struct SimArgs {
    /// Ticks without startup announcements before the barrier opens.
    #[arg(long, value_name = "TICKS", default_value_t = PeerConfig::default().startup_quiescence_ticks)]
    pub quiescence_ticks: u64,
    /// Seed for request ids, for reproducible output.
    #[arg(long, env = "SCRIPTWIRE_SEED")]
    pub seed: Option<u64>,
}

impl SimArgs {
    pub fn peer_config(&self) -> PeerConfig {
        PeerConfig {
            startup_quiescence_ticks: self.quiescence_ticks,
            rng_seed: self.seed,
            ..PeerConfig::default()
        }
    }
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Schema declaration file (JSON).
    pub schema: PathBuf,
    /// Declared type or packet name.
    pub name: String,
    /// Value to encode, as JSON.
    #[arg(long)]
    pub json: String,
    /// Split packets into chunks whose quoted bodies fit this many characters.
    #[arg(long, value_name = "CHARS")]
    pub max_message_size: Option<usize>,
    #[command(flatten)]
    pub sim: SimArgs,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Schema declaration file (JSON).
    pub schema: PathBuf,
    /// Declared type or packet name.
    pub name: String,
    /// Transcoded payload, as carried by the transport.
    #[arg(long, conflicts_with = "hex", required_unless_present = "hex")]
    pub payload: Option<String>,
    /// Raw encoded bytes as hex.
    #[arg(long)]
    pub hex: Option<String>,
}

#[derive(Args, Debug)]
pub struct RegistryArgs {
    /// Schema declaration file (JSON).
    pub schema: PathBuf,
    /// Number of loopback peers.
    #[arg(long, default_value_t = 1)]
    pub peers: usize,
    /// Also list the built-in types.
    #[arg(long)]
    pub builtins: bool,
    #[command(flatten)]
    pub sim: SimArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn load_declarations(path: &Path) -> CliResult<Declarations> {
    Declarations::from_path(path)
        .map_err(|err| schema_error(&format!("failed loading {}", path.display()), err))
}
