use super::Context;
use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tossup_core::CoinSide;
use tossup_game::{results_strip, ControllerView, GateState, Phase};

/// Countdown values worth announcing while betting is open.
const ANNOUNCED: [&str; 4] = ["01:00", "00:30", "00:10", "00:05"];

#[derive(Debug, PartialEq)]
enum Input {
    Bet(CoinSide, u64),
    Status,
    Quit,
    Empty,
    Invalid(String),
}

fn parse_input(line: &str) -> Input {
    let mut parts = line.split_whitespace();
    let Some(first) = parts.next() else {
        return Input::Empty;
    };

    match first.to_ascii_lowercase().as_str() {
        "q" | "quit" | "exit" => return Input::Quit,
        "s" | "status" => return Input::Status,
        _ => {}
    }

    let side: CoinSide = match first.parse() {
        Ok(side) => side,
        Err(e) => return Input::Invalid(e),
    };
    let amount = match parts.next().map(str::parse::<u64>) {
        Some(Ok(amount)) if amount > 0 => amount,
        _ => return Input::Invalid("Enter a side and a positive amount, e.g. 'h 100'".to_string()),
    };
    if parts.next().is_some() {
        return Input::Invalid("Too many arguments".to_string());
    }

    Input::Bet(side, amount)
}

/// Turns successive views into the lines worth printing.
#[derive(Default)]
struct Narrator {
    phase: Option<Phase>,
    game_id: Option<String>,
    submission: Option<GateState>,
    countdown: String,
    points: Option<i64>,
}

impl Narrator {
    fn narrate(&mut self, view: &ControllerView, user_id: &str) -> Vec<String> {
        let mut lines = Vec::new();
        let lifecycle = &view.lifecycle;
        let game_id = lifecycle.game.as_ref().map(|game| game.id.clone());

        let new_game = game_id.is_some() && game_id != self.game_id;
        if new_game {
            if let Some(game) = &lifecycle.game {
                lines.push(format!(
                    "Next game {} starts in {}. Place bets with 'h <amount>' or 't <amount>'.",
                    game.short_id(),
                    lifecycle.countdown
                ));
            }
        }

        if Some(lifecycle.phase) != self.phase || new_game {
            match lifecycle.phase {
                Phase::Idle => {
                    if self.phase.is_some() {
                        lines.push("Waiting for the next game...".to_string());
                    }
                }
                Phase::Timer => {}
                Phase::Flipping => lines.push("Betting closed. Flipping...".to_string()),
                Phase::Result => {
                    if let Some(outcome) = &lifecycle.outcome {
                        lines.push(outcome.headline());
                        let settlement = &outcome.settlement;
                        lines.push(format!(
                            "  Pool {}  House cut {}  Pot {}  Winners {}",
                            outcome.total_pool,
                            settlement.house_cut,
                            settlement.distributable_pot,
                            settlement.winners.len()
                        ));
                        let mine = settlement.outcome_for(user_id);
                        if mine.took_part() {
                            lines.push(format!(
                                "  You staked {} and got back {} ({:+})",
                                mine.staked,
                                mine.returned,
                                mine.net()
                            ));
                        }
                    }
                }
            }
        }

        if lifecycle.phase == Phase::Timer
            && lifecycle.countdown != self.countdown
            && ANNOUNCED.contains(&lifecycle.countdown.as_str())
        {
            lines.push(format!("{} until lock", lifecycle.countdown));
        }

        let submitted_now = lifecycle.submission == GateState::Submitted
            && self.submission != Some(GateState::Submitted);
        if submitted_now && !new_game {
            lines.push("Entries submitted.".to_string());
        }

        if let Some(points) = view.points.filter(|_| view.points != self.points) {
            lines.push(format!("Points: {}", points));
        }

        self.phase = Some(lifecycle.phase);
        self.game_id = game_id;
        self.submission = Some(lifecycle.submission);
        self.countdown = lifecycle.countdown.clone();
        self.points = view.points;
        lines
    }
}

fn print_status(view: &ControllerView) {
    let lifecycle = &view.lifecycle;
    match &lifecycle.game {
        Some(game) => println!(
            "Game {}: {:?}, {}",
            game.short_id(),
            lifecycle.phase,
            lifecycle.countdown
        ),
        None => println!("No upcoming game"),
    }

    if !lifecycle.entries.is_empty() {
        for entry in &lifecycle.entries {
            println!("  {} {} on {}", entry.id, entry.amount, entry.side);
        }
        println!("  Pending total: {}", lifecycle.pending_total);
    }
    if let Some(points) = view.points {
        println!("Points: {}", points);
    }
    if !view.recent_results.is_empty() {
        println!("Recent results: {}", results_strip(&view.recent_results));
    }
}

pub async fn play(ctx: &Context) -> Result<()> {
    let identity = ctx.session.require()?;
    let (handle, task) = tossup_game::start_live(ctx.backend(), ctx.config.lifecycle())?;

    println!("Playing as {}. Commands: 'h 100', 't 50', 's' for status, 'q' to quit.", identity.user.phone);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut views = handle.subscribe();
    let mut narrator = Narrator::default();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match parse_input(&line) {
                    Input::Bet(side, amount) => match handle.place_bet(side, amount).await {
                        Ok(entry) => println!("Added {} {} on {}", entry.id, entry.amount, entry.side),
                        Err(e) => println!("Bet not placed: {}", e),
                    },
                    Input::Status => print_status(&handle.view()),
                    Input::Quit => break,
                    Input::Empty => {}
                    Input::Invalid(message) => println!("{}", message),
                }
            }
            changed = views.changed() => {
                if changed.is_err() {
                    tracing::warn!("Game controller stopped unexpectedly");
                    break;
                }
                let view = views.borrow_and_update().clone();
                for line in narrator.narrate(&view, &identity.user.id) {
                    println!("{}", line);
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    handle.shutdown().await;
    let _ = task.await;
    println!("Bye.");
    Ok(())
}
