//! Backfill run command.

use anyhow::{Context, Result};
use tracing::{error, info};

use crate::backfill::{AccountContext, BackfillConfig, BackfillRunner};
use crate::cli::RunMode;
use crate::config::Settings;
use crate::exchange::FuturesRestClient;
use crate::shutdown::ShutdownHandle;
use crate::storage::TradeArchive;

/// Run one backfill to completion (or cancellation).
pub async fn execute(mode: RunMode) -> Result<()> {
    let settings = Settings::load().context("failed to load configuration")?;
    let kind = mode.kind();

    info!(%kind, accounts = settings.accounts.len(), "Starting backfill");

    let shutdown = ShutdownHandle::new();
    shutdown.install_signal_handlers();

    let archive =
        TradeArchive::connect_lazy(&settings.database).context("invalid database settings")?;

    let mut accounts = Vec::with_capacity(settings.accounts.len());
    for account in &settings.accounts {
        let source = FuturesRestClient::new(&settings.exchange, account)
            .with_context(|| format!("failed to build client for account '{}'", account.name))?;
        accounts.push(AccountContext {
            name: account.name.clone(),
            source,
        });
    }

    let runner = BackfillRunner::new(
        accounts,
        archive,
        kind,
        BackfillConfig::from(&settings.backfill),
        shutdown.token(),
    );

    match runner.run().await {
        Ok(summary) if summary.cancelled => {
            info!(
                records = summary.records_written,
                "Backfill cancelled, progress is preserved for the next run"
            );
            Ok(())
        }
        Ok(summary) => {
            info!(
                completed = summary.symbols_completed,
                failed = summary.symbols_failed,
                records = summary.records_written,
                "Backfill complete"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Backfill aborted");
            Err(e.into())
        }
    }
}
