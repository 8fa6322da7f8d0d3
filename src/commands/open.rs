use crate::adb::{RawSession, Session};
use crate::commands::SubCommand;
use crate::core::context::CommandContext;
use crate::error::{AdbError, Result};
use async_trait::async_trait;
use log::{debug, info};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

pub struct OpenCommand;

/// Bridge stdin/stdout to an arbitrary service, e.g. `tcp:8080` or
/// `shell:logcat`.
#[derive(Debug, Clone, clap::Args)]
pub struct OpenArgs {
    /// Service destination or an alias from the config file
    pub destination: String,
}

impl OpenCommand {
    pub fn new() -> Self {
        Self
    }
}

impl Default for OpenCommand {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SubCommand for OpenCommand {
    type Args = OpenArgs;

    async fn run(&self, ctx: &CommandContext, args: Self::Args) -> Result<()> {
        let destination = ctx.destination(&args.destination);
        let conn = ctx.connect().await?;
        info!("Opening {}", destination);
        let session: RawSession = conn.open_session(&destination).await?;
        let stream = session.stream();

        let mut stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let mut output = vec![0u8; stream.max_data()];
        let mut input = vec![0u8; stream.max_data()];
        let mut stdin_open = true;

        let result: Result<()> = async {
            loop {
                tokio::select! {
                    read = stream.read(&mut output) => match read {
                        Ok(n) => {
                            stdout.write_all(&output[..n]).await?;
                            stdout.flush().await?;
                        }
                        Err(AdbError::StreamClosed) => {
                            debug!("{} closed by device", destination);
                            return Ok(());
                        }
                        Err(e) => return Err(e),
                    },
                    n = stdin.read(&mut input), if stdin_open => match n? {
                        0 => stdin_open = false,
                        n => stream.write(&input[..n]).await?,
                    },
                }
            }
        }
        .await;

        session.close().await?;
        conn.close().await?;
        result
    }
}
