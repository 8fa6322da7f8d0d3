use crate::commands::{local_target, SubCommand};
use crate::core::context::CommandContext;
use crate::error::{AdbError, Result};
use async_trait::async_trait;
use log::debug;
use std::path::PathBuf;

pub struct PullCommand;

#[derive(Debug, Clone, clap::Args)]
pub struct PullArgs {
    /// Remote file(s) on device to pull
    #[clap(required = true)]
    pub src: Vec<String>,

    /// Local destination path
    #[clap(default_value = ".")]
    pub dst: PathBuf,
}

impl PullCommand {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PullCommand {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SubCommand for PullCommand {
    type Args = PullArgs;

    async fn run(&self, ctx: &CommandContext, args: Self::Args) -> Result<()> {
        if args.src.len() > 1 && !args.dst.is_dir() {
            return Err(AdbError::FileTransfer(format!(
                "{} is not a directory",
                args.dst.display()
            )));
        }

        let conn = ctx.connect().await?;
        let sync = conn.open_sync().await?;
        let progress = ctx.progress();

        for src in &args.src {
            let local = local_target(&args.dst, src);
            if !ctx.quiet {
                println!("Pulling {} to {}", src, local.display());
            }

            let reporter = progress.file_transfer(src, 0);
            let received = sync.pull_file(src, &local, reporter.as_ref()).await?;
            debug!("{} bytes pulled into {}", received, local.display());
        }

        sync.quit().await?;
        conn.close().await
    }
}
