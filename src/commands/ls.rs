use crate::adb::DirEntry;
use crate::commands::SubCommand;
use crate::core::context::CommandContext;
use crate::error::Result;
use async_trait::async_trait;
use colored::*;

pub struct LsCommand;

#[derive(Debug, Clone, clap::Args)]
pub struct LsArgs {
    /// Directory on the device
    #[clap(default_value = "/sdcard")]
    pub path: String,

    /// Include `.` and `..`
    #[clap(short = 'a', long = "all")]
    pub all: bool,
}

impl LsCommand {
    pub fn new() -> Self {
        Self
    }

    fn display(entry: &DirEntry) -> String {
        let line = entry.to_string();
        if entry.stat.is_directory() {
            let prefix_len = line.len() - entry.name.len();
            format!("{}{}", &line[..prefix_len], entry.name.blue().bold())
        } else if entry.stat.is_symlink() {
            let prefix_len = line.len() - entry.name.len();
            format!("{}{}", &line[..prefix_len], entry.name.cyan())
        } else {
            line
        }
    }
}

impl Default for LsCommand {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SubCommand for LsCommand {
    type Args = LsArgs;

    async fn run(&self, ctx: &CommandContext, args: Self::Args) -> Result<()> {
        let conn = ctx.connect().await?;
        let sync = conn.open_sync().await?;
        let entries = sync.list(&args.path).await;
        sync.quit().await?;
        conn.close().await?;

        let mut entries = entries?;
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        for entry in entries
            .iter()
            .filter(|e| args.all || (e.name != "." && e.name != ".."))
        {
            println!("{}", Self::display(entry));
        }
        Ok(())
    }
}
