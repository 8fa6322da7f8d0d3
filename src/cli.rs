use crate::commands::{
    config::ConfigArgs, keygen::KeygenArgs, ls::LsArgs, open::OpenArgs, pubkey::PubkeyArgs,
    pull::PullArgs, push::PushArgs, shell::ShellArgs, stat::StatArgs,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[command(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Option<Commands>,

    /// Device hostname or IP (default from config, then 127.0.0.1)
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Device adbd port (default from config, then 5555)
    #[arg(long, short = 'p', global = true)]
    pub port: Option<u16>,

    /// Private key file (default from config, then ~/.android/adbkey)
    #[arg(long, short = 'k', global = true)]
    pub key: Option<PathBuf>,

    /// Connection timeout in seconds
    #[arg(long, short = 't', global = true)]
    pub timeout: Option<u64>,

    /// Suppress progress and status output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Run a shell command, or an interactive shell without one
    Shell(ShellArgs),

    /// Connect stdin/stdout to a service destination
    Open(OpenArgs),

    /// Copy local files to the device
    Push(PushArgs),

    /// Copy files from the device
    Pull(PullArgs),

    /// Show file metadata on the device
    Stat(StatArgs),

    /// List a directory on the device
    Ls(LsArgs),

    /// Generate a new ADB key pair
    Keygen(KeygenArgs),

    /// Print the public key
    Pubkey(PubkeyArgs),

    /// Display configuration
    Config(ConfigArgs),
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or(Commands::Shell(ShellArgs { command: Vec::new() }))
    }
}
