use super::print_settlement;
use anyhow::{bail, Result};
use tossup_core::CoinSide;
use tossup_game::{Settlement, Wager};

/// Parse a `side:amount` bet such as `heads:100` or `t:25`.
pub fn parse_bet(raw: &str) -> std::result::Result<(CoinSide, u64), String> {
    let (side, amount) = raw
        .split_once(':')
        .ok_or_else(|| format!("'{}' should look like heads:100", raw))?;

    let side: CoinSide = side.parse()?;
    let amount: u64 = amount
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a whole number", amount.trim()))?;
    if amount == 0 {
        return Err("Bet amount must be greater than 0".to_string());
    }

    Ok((side, amount))
}

pub fn preview(result: CoinSide, bets: &[(CoinSide, u64)], rate: f64) -> Result<()> {
    if !rate.is_finite() || !(0.0..=1.0).contains(&rate) {
        bail!("House cut rate must be between 0 and 1, got {}", rate);
    }

    let wagers = bets.iter().enumerate().map(|(i, (side, amount))| Wager {
        label: format!("#{}", 1001 + i),
        owner: None,
        side: Some(*side),
        amount: *amount,
    });

    let settlement = Settlement::compute(result, wagers, rate);

    println!("Payout preview for {} bets:", bets.len());
    print_settlement(&settlement);
    Ok(())
}
