//! Compute the `X-Integrity` signature for a webhook body, for replaying
//! processor notifications against a local server.

use clap::Parser;
use pse_checkout::payments::signature::sign_body;
use std::io::Read;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sign-webhook", about = "Sign a webhook body with the integrity secret")]
struct Cli {
    /// Body to sign. Read from --file or stdin when omitted.
    payload: Option<String>,

    /// Read the body from a file instead.
    #[arg(short, long, conflicts_with = "payload")]
    file: Option<PathBuf>,

    #[arg(long, env = "WOMPI_INTEGRITY_SECRET", hide_env_values = true)]
    secret: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let body = match (cli.payload, cli.file) {
        (Some(payload), _) => payload.into_bytes(),
        (None, Some(path)) => std::fs::read(&path)?,
        (None, None) => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf)?;
            buf
        }
    };

    println!("{}", sign_body(&body, &cli.secret));
    Ok(())
}
