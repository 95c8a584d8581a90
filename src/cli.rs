use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "pia-wallet")]
#[command(about = "PIA block scanner and transfer wallet", long_about = None)]
pub struct Cli {
    #[arg(
        short,
        long,
        global = true,
        help = "Path to the configuration file",
        default_value = "config/config.toml"
    )]
    pub config: PathBuf,
    #[arg(short = 'u', long, global = true, help = "Overrides the node JSON-RPC URL from the configuration")]
    pub base_url: Option<String>,
    #[arg(short, long, global = true, help = "Overrides the database file from the configuration")]
    pub database_path: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the daemon to continuously scan the blockchain
    Daemon,
    /// Run one scan session from the stored cursor to the node head
    Scan,
    /// Extract a single block again without moving the scan cursor
    Rescan {
        #[arg(long, help = "Block height to extract")]
        height: u64,
    },
    /// Make the next scan session start at the given height
    ResetHeight {
        #[arg(long, help = "First block height of the next scan session")]
        height: u64,
    },
    /// Show the scanned height and the node head
    Status,
    /// Show on-chain balances
    Balance {
        #[arg(short, long, help = "Account alias to look up. Can be specified multiple times.", required = true)]
        alias: Vec<String>,
    },
    /// Track an account so its transfers are extracted
    RegisterAccount {
        #[arg(long, help = "Local account id")]
        account_id: String,
        #[arg(short, long, help = "On-chain account alias")]
        alias: String,
        #[arg(short = 'k', long, help = "Compressed secp256k1 public key in hex format")]
        public_key: Option<String>,
    },
}
