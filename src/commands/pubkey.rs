use crate::adb::AdbCrypto;
use crate::commands::SubCommand;
use crate::core::context::CommandContext;
use crate::error::Result;
use async_trait::async_trait;

pub struct PubkeyCommand;

/// Print the public key in `adbkey.pub` format
#[derive(Debug, Clone, clap::Args)]
pub struct PubkeyArgs {
    /// Print the SHA-256 fingerprint instead
    #[clap(long = "fingerprint")]
    pub fingerprint: bool,
}

impl PubkeyCommand {
    pub fn new() -> Self {
        Self
    }

    pub fn render(crypto: &AdbCrypto, fingerprint: bool) -> String {
        if fingerprint {
            crypto.fingerprint()
        } else {
            crypto.public_key_text()
        }
    }
}

impl Default for PubkeyCommand {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SubCommand for PubkeyCommand {
    type Args = PubkeyArgs;

    async fn run(&self, ctx: &CommandContext, args: Self::Args) -> Result<()> {
        let crypto = AdbCrypto::load(&ctx.key_path)?;
        println!("{}", Self::render(&crypto, args.fingerprint));
        Ok(())
    }
}
