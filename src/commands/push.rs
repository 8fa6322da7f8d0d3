use crate::adb::SyncSession;
use crate::commands::{remote_join, SubCommand};
use crate::core::context::CommandContext;
use crate::error::{AdbError, Result};
use async_trait::async_trait;
use log::debug;
use std::path::{Path, PathBuf};

pub struct PushCommand;

#[derive(Debug, Clone, clap::Args)]
pub struct PushArgs {
    /// Local file(s) to push
    #[clap(required = true)]
    pub src: Vec<PathBuf>,

    /// Remote destination path on device
    pub dst: String,
}

impl PushCommand {
    pub fn new() -> Self {
        Self
    }

    /// Device path for `src`: inside `dst` when it is a directory, which it
    /// must be when several files are pushed.
    async fn remote_target(
        sync: &SyncSession,
        src: &Path,
        dst: &str,
        multiple: bool,
    ) -> Result<String> {
        let is_dir = dst.ends_with('/') || sync.stat(dst).await?.is_directory();
        if !is_dir {
            if multiple {
                return Err(AdbError::FileTransfer(format!(
                    "{} is not a directory",
                    dst
                )));
            }
            return Ok(dst.to_string());
        }

        let name = src
            .file_name()
            .ok_or_else(|| AdbError::FileTransfer(format!("{} has no file name", src.display())))?;
        Ok(remote_join(dst, &name.to_string_lossy()))
    }
}

impl Default for PushCommand {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SubCommand for PushCommand {
    type Args = PushArgs;

    async fn run(&self, ctx: &CommandContext, args: Self::Args) -> Result<()> {
        let conn = ctx.connect().await?;
        let sync = conn.open_sync().await?;
        let progress = ctx.progress();
        let multiple = args.src.len() > 1;

        for src in &args.src {
            let remote = Self::remote_target(&sync, src, &args.dst, multiple).await?;
            if !ctx.quiet {
                println!("Pushing {} to {}", src.display(), remote);
            }

            let reporter = progress.file_transfer(&src.to_string_lossy(), 0);
            let sent = sync.push_file(src, &remote, reporter.as_ref()).await?;
            debug!("{} bytes pushed to {}", sent, remote);
        }

        sync.quit().await?;
        conn.close().await
    }
}
