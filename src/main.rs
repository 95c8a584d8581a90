use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use log::info;
use pia_wallet::{
    cli::{Cli, Commands},
    config::load_wallet_config,
    daemon::{Daemon, spawn_event_logger},
    log::init_logging,
    scan::ChannelEventSender,
    wallet::WalletContext,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    init_logging()?;

    let cli = Cli::parse();
    let mut config = load_wallet_config(&cli.config)?;
    config.apply_overrides(cli.base_url.as_deref(), cli.database_path.as_ref());

    let context = WalletContext::open(config)?;
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let logger = spawn_event_logger(event_rx);

    run_command(cli.command, &context, ChannelEventSender::new(event_tx)).await?;

    logger.await.context("Event logger task failed")?;
    info!("Done");
    Ok(())
}

async fn run_command(command: Commands, context: &WalletContext, events: ChannelEventSender) -> anyhow::Result<()> {
    let scanner = context.scanner(events);

    match command {
        Commands::Daemon => {
            let daemon = Daemon::new(scanner, Duration::from_secs(context.config.scan_interval_secs));
            daemon.run().await?;
        },
        Commands::Scan => {
            let summary = scanner.scan(&CancellationToken::new()).await?;
            println!(
                "Scanned {} block(s) from {} to {}, {} fork(s) detected",
                summary.blocks_scanned, summary.start_height, summary.end_height, summary.forks_detected
            );
        },
        Commands::Rescan { height } => {
            let summary = scanner.scan_block(height).await?;
            println!(
                "Block {}: {} event(s), {} extracted, {} failed",
                height, summary.total, summary.succeeded, summary.failed
            );
        },
        Commands::ResetHeight { height } => {
            scanner.set_rescan_block_height(height).await?;
            println!("Next scan session starts at block {}", height);
        },
        Commands::Status => {
            let scanned = scanner.scanned_block_height().await?;
            let head = scanner.current_block_header().await?;
            println!("Scanned height: {}", scanned);
            println!("Node head:      {} ({})", head.height, head.hash);
        },
        Commands::Balance { alias } => {
            let balances = scanner.balances_by_address(&alias).await;
            if balances.is_empty() {
                println!("No balances found");
            }
            for balance in balances {
                println!("{}: {} {}", balance.address, balance.balance, balance.symbol);
            }
        },
        Commands::RegisterAccount {
            account_id,
            alias,
            public_key,
        } => {
            let account = context
                .registry
                .register_account(&account_id, &alias, public_key.as_deref())
                .await
                .context("Failed to register account")?;
            println!("Registered account {} ({})", account.account_id, account.alias);
        },
    }

    Ok(())
}
