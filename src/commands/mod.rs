use crate::core::context::CommandContext;
use crate::error::Result;
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Base trait for all subcommands
#[async_trait]
pub trait SubCommand {
    type Args;

    async fn run(&self, ctx: &CommandContext, args: Self::Args) -> Result<()>;
}

/// Write raw device output to stdout, adding a newline if it lacks one
pub fn print_output(output: &[u8]) -> Result<()> {
    if output.is_empty() {
        return Ok(());
    }
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(output)?;
    if !output.ends_with(b"\n") {
        stdout.write_all(b"\n")?;
    }
    stdout.flush()?;
    Ok(())
}

/// Last path component of a device path
pub fn remote_file_name(remote: &str) -> &str {
    remote
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(remote)
}

/// Join a device directory and a file name
pub fn remote_join(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{}{}", dir, name)
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Where a pulled file lands: inside `dst` when it is a directory
pub fn local_target(dst: &Path, remote: &str) -> PathBuf {
    if dst.is_dir() {
        dst.join(remote_file_name(remote))
    } else {
        dst.to_path_buf()
    }
}

pub mod runner;

pub mod config;
pub mod keygen;
pub mod ls;
pub mod open;
pub mod pubkey;
pub mod pull;
pub mod push;
pub mod shell;
pub mod stat;
