//! fwdump - request a debug dump from fwdumpd
//!
//! Usage:
//!   fwdump None            # dump into the daemon's default directory
//!   fwdump /some/abs/dir   # dump into a specific directory

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "fwdump")]
#[command(version, about = "Request a debug dump from fwdumpd", long_about = None)]
struct Cli {
    /// Output directory for the dump, or the literal "None" for the
    /// daemon's default
    request: String,

    /// Daemon control socket
    #[arg(long, default_value = fwdump_ipc::default_socket_path())]
    socket: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let reply = fwdump_ipc::client::request(&cli.socket, &cli.request, DEFAULT_TIMEOUT)?;
    print!("{reply}");
    Ok(())
}
