use crate::commands::SubCommand;
use crate::core::context::CommandContext;
use crate::error::{AdbError, Result};
use async_trait::async_trait;
use colored::*;

pub struct StatCommand;

#[derive(Debug, Clone, clap::Args)]
pub struct StatArgs {
    /// Path on the device
    pub path: String,
}

impl StatCommand {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StatCommand {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SubCommand for StatCommand {
    type Args = StatArgs;

    async fn run(&self, ctx: &CommandContext, args: Self::Args) -> Result<()> {
        let conn = ctx.connect().await?;
        let sync = conn.open_sync().await?;
        let stat = sync.stat(&args.path).await;
        sync.quit().await?;
        conn.close().await?;

        let stat = stat?;
        if !stat.exists() {
            return Err(AdbError::FileTransfer(format!(
                "{} does not exist",
                args.path
            )));
        }

        println!("  File: {}", args.path.bright_cyan());
        println!("  Type: {}", stat.file_type());
        println!("  Mode: {} ({:o})", stat.permissions_string(), stat.mode & 0o7777);
        println!("  Size: {}", stat.size);
        println!(" Mtime: {}", stat.mtime);
        Ok(())
    }
}
