use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use blackjack_lab::simulation::{ShoePolicy, SimulationConfig};
use blackjack_lab::{PlayerStrategy, Rule};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub rule: ConfigRule,
    pub blackjack_simulator: ConfigBlackjackSimulator,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigRule {
    pub number_of_decks: u8,
    pub cut_card_proportion: f64,
    pub dealer_hit_on_soft17: bool,
    pub allow_das: bool,
    pub allow_late_surrender: bool,
    pub allow_insurance: bool,
    pub max_split_hands: u8,
    pub split_aces_one_card: bool,

    pub payout_blackjack: String,
    pub payout_insurance: u64,
}

impl TryFrom<ConfigRule> for Rule {
    type Error = blackjack_lab::Error;

    fn try_from(config: ConfigRule) -> Result<Self, Self::Error> {
        let rule = Rule {
            number_of_decks: config.number_of_decks,
            cut_card_proportion: config.cut_card_proportion,
            dealer_hit_on_soft17: config.dealer_hit_on_soft17,
            allow_das: config.allow_das,
            allow_late_surrender: config.allow_late_surrender,
            allow_insurance: config.allow_insurance,
            max_split_hands: config.max_split_hands,
            split_aces_one_card: config.split_aces_one_card,
            payout_blackjack: config.payout_blackjack.parse()?,
            payout_insurance: config.payout_insurance,
        };
        rule.validate()?;
        Ok(rule)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigBlackjackSimulator {
    pub rounds: u64,
    /// In cents.
    pub bet: u64,
    pub starting_balance: u64,
    pub player_strategy: String,
    pub number_of_players: usize,
    pub player_seat: usize,
    pub shoe_policy: String,
    pub number_of_threads: usize,
    pub seed: u64,
}

impl Config {
    /// Builds the simulation settings, converting every string field.
    pub fn simulation_config(&self) -> anyhow::Result<SimulationConfig> {
        let simulator = &self.blackjack_simulator;
        let rule = Rule::try_from(self.rule.clone()).context("invalid rule")?;
        let player_strategy: PlayerStrategy = simulator
            .player_strategy
            .parse()
            .with_context(|| format!("unknown player_strategy {:?}", simulator.player_strategy))?;
        let shoe_policy: ShoePolicy = simulator
            .shoe_policy
            .parse()
            .with_context(|| format!("unknown shoe_policy {:?}", simulator.shoe_policy))?;
        Ok(SimulationConfig {
            rule,
            rounds: simulator.rounds,
            bet: simulator.bet,
            starting_balance: simulator.starting_balance,
            player_strategy,
            number_of_players: simulator.number_of_players,
            player_seat: simulator.player_seat,
            shoe_policy,
            number_of_threads: simulator.number_of_threads,
            seed: simulator.seed,
        })
    }
}

/// Reads the content of a given config file and parses it to a Config.
pub fn parse_config_from_file(filename: &Path) -> anyhow::Result<Config> {
    let file_content = fs::read_to_string(filename)
        .with_context(|| format!("cannot read config file {}", filename.display()))?;
    serde_yaml::from_str(&file_content)
        .with_context(|| format!("cannot parse config file {}", filename.display()))
}

/// `123450` cents is `$1,234.50`.
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    let dollars = (cents / 100).to_string();
    let mut grouped = String::with_capacity(dollars.len() + dollars.len() / 3);
    for (i, digit) in dollars.chars().enumerate() {
        if i > 0 && (dollars.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    format!("{}${}.{:02}", sign, grouped, cents % 100)
}

pub fn format_time(duration: Duration) -> String {
    format!("{:.2} seconds", duration.as_secs_f64())
}

/// Shortens a number with an SI suffix: 1200 is `1.2K`, 3000000 is `3M`.
pub fn abbreviate_number(number: f64) -> String {
    const SI_SYMBOL: [&str; 7] = ["", "K", "M", "G", "T", "P", "E"];

    let tier = if number == 0.0 {
        0
    } else {
        ((number.abs().log10() / 3.0) as usize).min(SI_SYMBOL.len() - 1)
    };
    if tier == 0 {
        return number.to_string();
    }
    let scaled = number / 10f64.powi(tier as i32 * 3);
    let fixed = format!("{:.1}", scaled);
    let digits = match fixed.strip_suffix(".0") {
        Some(whole) => whole.to_string(),
        None => fixed,
    };
    format!("{}{}", digits, SI_SYMBOL[tier])
}
