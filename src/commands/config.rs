use crate::commands::SubCommand;
use crate::config::Config;
use crate::core::context::CommandContext;
use crate::error::{AdbError, Result};
use async_trait::async_trait;
use colored::*;

pub struct ConfigCommand;

#[derive(Debug, Clone, clap::Args)]
pub struct ConfigArgs {
    /// Show configuration file path only
    #[clap(short = 'p', long = "path")]
    pub path_only: bool,
}

impl ConfigCommand {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConfigCommand {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SubCommand for ConfigCommand {
    type Args = ConfigArgs;

    async fn run(&self, ctx: &CommandContext, args: Self::Args) -> Result<()> {
        let config_path = Config::get_config_path().ok_or_else(|| {
            AdbError::Config("Could not determine home directory".to_string())
        })?;

        if args.path_only {
            println!("{}", config_path.display());
            return Ok(());
        }

        if config_path.exists() {
            println!("Reading {}\n", config_path.display().to_string().bright_cyan());
        } else {
            println!(
                "No config file found at: {}",
                config_path.display().to_string().bright_cyan()
            );
            println!("Default configuration will be used.\n");
        }

        println!("address         = {}", ctx.address);
        println!("key_path        = {}", ctx.key_path.display());
        println!("connect_timeout = {}s", ctx.timeout.as_secs());

        let mut aliases: Vec<_> = ctx.config.alias.iter().collect();
        aliases.sort();
        for (name, destination) in aliases {
            println!("alias {:<9} = {}", name.bold(), destination);
        }
        Ok(())
    }
}
