use super::{print_settlement, Context};
use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use comfy_table::{presets::UTF8_FULL, Table};
use tossup_core::{GameBackend, SideTotals};
use tossup_game::history::newest_first;
use tossup_game::{player_history, recent_results, results_strip, Settlement, Wager};

fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub async fn list_games(ctx: &Context, limit: Option<usize>, json: bool) -> Result<()> {
    let mut games = ctx.backend().list_games().await?;
    newest_first(&mut games);
    let shown = limit.unwrap_or(games.len());

    if json {
        let games: Vec<_> = games.iter().take(shown).collect();
        println!("{}", serde_json::to_string_pretty(&games)?);
        return Ok(());
    }

    if games.is_empty() {
        println!("No games found.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Game", "Starts", "Heads", "Tails", "Pool", "Result"]);

    for game in games.iter().take(shown) {
        let totals = game.side_totals();
        let result = game
            .result
            .map(|side| side.to_string())
            .unwrap_or_else(|| "Pending".to_string());

        table.add_row(vec![
            game.short_id().to_string(),
            format_time(game.start_time),
            totals.heads.to_string(),
            totals.tails.to_string(),
            game.total_pool.to_string(),
            result,
        ]);
    }

    println!("{}", table);
    if shown < games.len() {
        println!("Showing {} of {} games", shown, games.len());
    }
    Ok(())
}

pub async fn show_game(ctx: &Context, id: &str, json: bool) -> Result<()> {
    let game = ctx.backend().get_game(id).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&game)?);
        return Ok(());
    }

    let totals: SideTotals = game.side_totals();

    println!("Game {}:", game.id);
    println!("  Starts: {}", format_time(game.start_time));
    println!("  Created: {}", format_time(game.created_at));
    println!("  Pool: {}", game.total_pool);
    println!("  Heads: {}  Tails: {}", totals.heads, totals.tails);
    println!();

    if game.entries.is_empty() {
        println!("No entries yet.");
    } else {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Entry", "Player", "Side", "Amount"]);

        for entry in &game.entries {
            let side = entry
                .side()
                .map(|side| side.to_string())
                .unwrap_or_else(|| format!("? ({})", entry.bet));
            table.add_row(vec![
                entry.id.clone(),
                entry.center_id.clone(),
                side,
                entry.amount.to_string(),
            ]);
        }

        println!("Entries:");
        println!("{}", table);
    }

    let Some(result) = game.result else {
        println!("Result not published yet.");
        return Ok(());
    };

    let settlement = Settlement::compute(
        result,
        game.entries.iter().map(Wager::from),
        ctx.config.lifecycle().house_cut_rate,
    );

    println!();
    println!("{} Win!!!", result);
    print_settlement(&settlement);

    if let Some(user) = ctx.session.user() {
        let outcome = settlement.outcome_for(&user.id);
        if outcome.took_part() {
            println!();
            println!(
                "Your stake: {}  Returned: {}  Net: {:+}",
                outcome.staked,
                outcome.returned,
                outcome.net()
            );
        }
    }

    Ok(())
}

pub async fn show_points(ctx: &Context) -> Result<()> {
    let identity = ctx.session.require()?;
    let points = ctx.backend().points(&identity.user.id).await?;

    println!("Points for {}: {}", identity.user.phone, points);
    Ok(())
}

pub async fn show_history(ctx: &Context, limit: usize) -> Result<()> {
    let identity = ctx.session.require()?;
    let games = ctx.backend().user_games(&identity.user.id).await?;

    if games.is_empty() {
        println!("No games played yet.");
        return Ok(());
    }

    let rows = player_history(&games, &identity.user.id, limit);

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Game", "Played", "Entries", "Staked", "Pool", "Result"]);

    for row in &rows {
        table.add_row(vec![
            row.short_id.clone(),
            format_time(row.created_at),
            row.entry_count.to_string(),
            row.staked.to_string(),
            row.total_pool.to_string(),
            row.result
                .map(|side| side.to_string())
                .unwrap_or_else(|| "Pending".to_string()),
        ]);
    }

    println!("{}", table);

    let results = recent_results(&games, tossup_game::history::RECENT_RESULTS_LIMIT);
    if !results.is_empty() {
        println!("Recent results: {}", results_strip(&results));
    }
    Ok(())
}
