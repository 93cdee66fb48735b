pub mod auth;
pub mod games;
pub mod payout;
pub mod play;

use crate::config::CliConfig;
use anyhow::{Context as _, Result};
use comfy_table::{presets::UTF8_FULL, Table};
use std::sync::Arc;
use tossup_core::{ApiClient, HttpBackend, Session};
use tossup_game::Settlement;

/// What every server-facing command needs.
pub struct Context {
    pub config: CliConfig,
    pub api: ApiClient,
    pub session: Arc<Session>,
}

impl Context {
    pub async fn open(config: CliConfig) -> Result<Self> {
        tokio::fs::create_dir_all(&config.data_dir)
            .await
            .with_context(|| format!("creating data directory {}", config.data_dir.display()))?;

        let api = ApiClient::new(&config.client())?;
        let session = Arc::new(Session::open(&config.data_dir).await?);
        tracing::debug!("Using server {}", api.base_url());

        Ok(Self {
            config,
            api,
            session,
        })
    }

    pub fn backend(&self) -> HttpBackend {
        HttpBackend::new(self.api.clone(), self.session.clone())
    }
}

/// Cut, pot and per-winner payouts of a settlement.
pub fn print_settlement(settlement: &Settlement) {
    println!("  Result: {}", settlement.result);
    println!("  Losing pool: {}", settlement.losers_total);
    println!(
        "  House cut ({:.0}%): {}",
        settlement.house_cut_rate * 100.0,
        settlement.house_cut
    );
    println!("  Distributable pot: {}", settlement.distributable_pot);

    if settlement.winners.is_empty() {
        println!("  No winning stakes; nothing is distributed.");
        return;
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Entry", "Player", "Stake", "Share", "Payout"]);

    for payout in &settlement.winners {
        table.add_row(vec![
            payout.wager.label.clone(),
            payout.wager.owner.clone().unwrap_or_else(|| "-".to_string()),
            payout.wager.amount.to_string(),
            payout.share.to_string(),
            payout.payout.to_string(),
        ]);
    }

    println!("{}", table);

    let drift = settlement.rounding_drift();
    if drift != 0 {
        println!("  Rounding difference across winners: {:+}", drift);
    }
}
