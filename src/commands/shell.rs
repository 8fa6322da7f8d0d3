use crate::adb::{run_command, AdbConnection, Session, ShellSession};
use crate::commands::{print_output, SubCommand};
use crate::core::context::CommandContext;
use crate::error::Result;
use async_trait::async_trait;
use log::debug;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

pub struct ShellCommand;

#[derive(Debug, Clone, clap::Args)]
pub struct ShellArgs {
    /// Command to execute (if empty, starts interactive shell)
    #[clap(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

impl ShellCommand {
    pub fn new() -> Self {
        Self
    }

    /// Forward stdin lines to the device shell and its output to stdout
    /// until either side finishes.
    async fn run_interactive(&self, conn: &AdbConnection) -> Result<()> {
        let shell: ShellSession = conn.open_shell(None).await?;
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();
        let mut stdin_open = true;

        loop {
            tokio::select! {
                chunk = shell.recv() => match chunk {
                    Some(chunk) => {
                        stdout.write_all(&chunk).await?;
                        stdout.flush().await?;
                    }
                    None => {
                        debug!("Shell exited");
                        break;
                    }
                },
                line = lines.next_line(), if stdin_open => match line? {
                    Some(line) if line.trim() == "exit" || line.trim() == "quit" => break,
                    Some(line) => shell.execute(&line).await?,
                    None => {
                        debug!("stdin closed");
                        stdin_open = false;
                        shell.close().await?;
                    }
                },
            }
        }

        shell.close().await
    }
}

impl Default for ShellCommand {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SubCommand for ShellCommand {
    type Args = ShellArgs;

    async fn run(&self, ctx: &CommandContext, args: Self::Args) -> Result<()> {
        let conn = ctx.connect().await?;

        let result = if args.command.is_empty() {
            self.run_interactive(&conn).await
        } else {
            let cmd = args.command.join(" ");
            match run_command(&conn, &cmd).await {
                Ok(output) => print_output(&output),
                Err(e) => Err(e),
            }
        };

        conn.close().await?;
        result
    }
}
