use crate::cli::{Cli, Commands};
use crate::commands::{
    config::ConfigCommand, keygen::KeygenCommand, ls::LsCommand, open::OpenCommand,
    pubkey::PubkeyCommand, pull::PullCommand, push::PushCommand, shell::ShellCommand,
    stat::StatCommand, SubCommand,
};
use crate::config::Config;
use crate::core::context::{CommandContext, CommandContextBuilder};
use crate::error::Result;
use log::debug;
use std::time::Duration;

/// Command runner that handles routing and execution
pub struct CommandRunner {
    config: Config,
}

impl CommandRunner {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Global flags layered over the config file
    pub fn context(&self, cli: &Cli) -> CommandContext {
        CommandContextBuilder::new(self.config.clone())
            .host(cli.host.clone())
            .port(cli.port)
            .key_path(cli.key.clone())
            .timeout(cli.timeout.map(Duration::from_secs))
            .quiet(cli.quiet)
            .build()
    }

    /// Run a command based on CLI arguments
    pub async fn run(&self, cli: Cli) -> Result<()> {
        let ctx = self.context(&cli);
        let command = cli.command();
        debug!("Running {:?} against {}", command, ctx.address);

        match command {
            Commands::Shell(args) => ShellCommand::new().run(&ctx, args).await,
            Commands::Open(args) => OpenCommand::new().run(&ctx, args).await,
            Commands::Push(args) => PushCommand::new().run(&ctx, args).await,
            Commands::Pull(args) => PullCommand::new().run(&ctx, args).await,
            Commands::Stat(args) => StatCommand::new().run(&ctx, args).await,
            Commands::Ls(args) => LsCommand::new().run(&ctx, args).await,
            Commands::Keygen(args) => KeygenCommand::new().run(&ctx, args).await,
            Commands::Pubkey(args) => PubkeyCommand::new().run(&ctx, args).await,
            Commands::Config(args) => ConfigCommand::new().run(&ctx, args).await,
        }
    }
}
