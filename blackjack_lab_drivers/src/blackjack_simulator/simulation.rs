use anyhow::Context;
use blackjack_lab::simulation::{SimulationConfig, SimulationResult, Simulator};
use blackjack_lab_drivers::{abbreviate_number, format_cents, format_time};
use log::warn;

pub fn simulate(config: SimulationConfig) -> anyhow::Result<SimulationResult> {
    let rounds = config.rounds;
    if rounds == 0 {
        warn!("rounds is 0, nothing will be played");
    }
    let simulator = Simulator::new(config).context("cannot start the simulator")?;
    simulator.run(rounds).context("simulation aborted")
}

pub fn print_report(config: &SimulationConfig, result: &SimulationResult) {
    println!(
        "Simulated {} rounds ({} hands) of {} in {}{}",
        abbreviate_number(result.rounds_played as f64),
        abbreviate_number(result.hands_played as f64),
        config.player_strategy,
        format_time(result.time_elapsed),
        if result.cancelled { ", cancelled" } else { "" }
    );
    println!(
        "Won: {}  Lost: {}  Pushed: {}",
        result.hands_won, result.hands_lost, result.hands_pushed
    );
    println!(
        "Wagered: {}  Earned: {}  Std dev per round: {}",
        format_cents(result.amount_wagered as i64),
        format_cents(result.amount_earned),
        format_cents(result.amount_earned_variance.sqrt().round() as i64)
    );
    println!("House edge: {:.3}%", result.house_edge * 100.0);
}
