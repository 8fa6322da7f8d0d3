use crate::adb::{crypto::public_key_path, AdbCrypto};
use crate::commands::SubCommand;
use crate::core::context::CommandContext;
use crate::error::{AdbError, Result};
use async_trait::async_trait;
use colored::*;
use std::fs;

pub struct KeygenCommand;

#[derive(Debug, Clone, clap::Args)]
pub struct KeygenArgs {
    /// Replace an existing key
    #[clap(short = 'f', long = "force")]
    pub force: bool,
}

impl KeygenCommand {
    pub fn new() -> Self {
        Self
    }
}

impl Default for KeygenCommand {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SubCommand for KeygenCommand {
    type Args = KeygenArgs;

    async fn run(&self, ctx: &CommandContext, args: Self::Args) -> Result<()> {
        let path = &ctx.key_path;
        if path.exists() && !args.force {
            return Err(AdbError::Config(format!(
                "{} already exists, use --force to replace it",
                path.display()
            )));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let crypto = AdbCrypto::generate()?;
        crypto.save(path)?;

        println!("{} Private key: {}", "✓".green(), path.display());
        println!("{} Public key:  {}", "✓".green(), public_key_path(path).display());
        println!("  Fingerprint: {}", crypto.fingerprint());
        Ok(())
    }
}
