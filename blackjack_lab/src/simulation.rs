use std::ops::AddAssign;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use serde_enum_str::{Deserialize_enum_str, Serialize_enum_str};

use crate::game::{Game, SeatSummary, MAX_PLAYERS};
use crate::strategy::NoInput;
use crate::{Error, PlayerStrategy, Result, Rule};

/// Whether the shoe is reshuffled before every round or dealt down to the
/// cut card. Only a fresh shoe per round can be split across threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_enum_str, Deserialize_enum_str)]
pub enum ShoePolicy {
    FreshPerRound,
    Persistent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub rule: Rule,
    pub rounds: u64,
    pub bet: u64,
    /// Balance of every seat at the start of each round.
    pub starting_balance: u64,
    /// Strategy of the measured seat. Other seats play basic strategy.
    pub player_strategy: PlayerStrategy,
    pub number_of_players: usize,
    pub player_seat: usize,
    pub shoe_policy: ShoePolicy,
    /// 0 uses every available core.
    pub number_of_threads: usize,
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            rule: Rule::default(),
            rounds: 100_000,
            bet: 1000,
            starting_balance: 10000 * 100,
            player_strategy: PlayerStrategy::BasicStrategy,
            number_of_players: 1,
            player_seat: 0,
            shoe_policy: ShoePolicy::FreshPerRound,
            number_of_threads: 0,
            seed: 0,
        }
    }
}

/// Partial sums over rounds. Sums from disjoint batches add up to the sums of
/// the whole run in any order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statistics {
    pub rounds_played: u64,
    pub hands_won: u64,
    pub hands_lost: u64,
    pub hands_pushed: u64,
    pub amount_wagered: u64,
    pub amount_earned: i64,
    earned_squares: i128,
}

impl Statistics {
    pub fn record(&mut self, seat: &SeatSummary) {
        let delta = seat.delta();
        self.rounds_played += 1;
        self.hands_won += seat.hands_won as u64;
        self.hands_lost += seat.hands_lost as u64;
        self.hands_pushed += seat.hands_pushed as u64;
        self.amount_wagered += seat.wagered;
        self.amount_earned += delta;
        self.earned_squares += delta as i128 * delta as i128;
    }

    pub fn hands_played(&self) -> u64 {
        self.hands_won + self.hands_lost + self.hands_pushed
    }

    /// Population variance of the per-round deltas.
    pub fn variance(&self) -> f64 {
        if self.rounds_played == 0 {
            return 0.0;
        }
        let n = self.rounds_played as i128;
        let sum = self.amount_earned as i128;
        (n * self.earned_squares - sum * sum) as f64 / (n * n) as f64
    }

    pub fn house_edge(&self) -> f64 {
        if self.amount_wagered == 0 {
            return 0.0;
        }
        -(self.amount_earned as f64) / self.amount_wagered as f64
    }
}

impl AddAssign for Statistics {
    fn add_assign(&mut self, other: Self) {
        self.rounds_played += other.rounds_played;
        self.hands_won += other.hands_won;
        self.hands_lost += other.hands_lost;
        self.hands_pushed += other.hands_pushed;
        self.amount_wagered += other.amount_wagered;
        self.amount_earned += other.amount_earned;
        self.earned_squares += other.earned_squares;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    pub rounds_played: u64,
    pub hands_played: u64,
    pub hands_won: u64,
    pub hands_lost: u64,
    pub hands_pushed: u64,
    pub amount_wagered: u64,
    pub amount_earned: i64,
    pub amount_earned_variance: f64,
    pub house_edge: f64,
    pub time_elapsed: Duration,
    /// The run was stopped before every round was played.
    pub cancelled: bool,
}

impl SimulationResult {
    pub fn new(statistics: &Statistics, time_elapsed: Duration, cancelled: bool) -> Self {
        SimulationResult {
            rounds_played: statistics.rounds_played,
            hands_played: statistics.hands_played(),
            hands_won: statistics.hands_won,
            hands_lost: statistics.hands_lost,
            hands_pushed: statistics.hands_pushed,
            amount_wagered: statistics.amount_wagered,
            amount_earned: statistics.amount_earned,
            amount_earned_variance: statistics.variance(),
            house_edge: statistics.house_edge(),
            time_elapsed,
            cancelled,
        }
    }
}

/// Plays many independent rounds and measures one seat.
pub struct Simulator {
    config: SimulationConfig,
    cancelled: Arc<AtomicBool>,
}

impl Simulator {
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.rule.validate()?;
        if !config.player_strategy.is_npc() {
            return Err(Error::InvalidConfig(format!(
                "{} cannot be simulated",
                config.player_strategy
            )));
        }
        if config.number_of_players == 0 || config.number_of_players > MAX_PLAYERS {
            return Err(Error::InvalidConfig(format!(
                "number_of_players must be in 1..={}",
                MAX_PLAYERS
            )));
        }
        if config.player_seat >= config.number_of_players {
            return Err(Error::InvalidConfig(format!(
                "player_seat {} is not at a table of {}",
                config.player_seat, config.number_of_players
            )));
        }
        if config.bet == 0 {
            return Err(Error::InvalidConfig(String::from("bet must be positive")));
        }
        Ok(Simulator {
            config,
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Setting the flag stops every worker before its next round. The run
    /// then returns what was played so far.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Plays `rounds` rounds. The first error of any worker stops the others
    /// and is returned.
    pub fn run(&self, rounds: u64) -> Result<SimulationResult> {
        let threads = self.number_of_workers(rounds);
        info!(
            "simulating {} rounds of {} on {} threads",
            rounds, self.config.player_strategy, threads
        );
        let start = Instant::now();
        let failed = AtomicBool::new(false);

        let outcomes: Vec<Result<Statistics>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..threads as u64)
                .map(|worker| {
                    let share = rounds / threads as u64
                        + u64::from(worker < rounds % threads as u64);
                    let failed = &failed;
                    scope.spawn(move || {
                        let outcome = self.play_rounds(worker, share, failed);
                        if outcome.is_err() {
                            failed.store(true, Ordering::Relaxed);
                        }
                        outcome
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
                .collect()
        });

        let mut statistics = Statistics::default();
        for outcome in outcomes {
            statistics += outcome?;
        }
        let cancelled = statistics.rounds_played < rounds;
        let result = SimulationResult::new(&statistics, start.elapsed(), cancelled);
        info!(
            "played {} rounds in {:?}, house edge {:.4}%{}",
            result.rounds_played,
            result.time_elapsed,
            result.house_edge * 100.0,
            if cancelled { " (cancelled)" } else { "" }
        );
        Ok(result)
    }

    fn number_of_workers(&self, rounds: u64) -> usize {
        let threads = match self.config.shoe_policy {
            ShoePolicy::Persistent => 1,
            ShoePolicy::FreshPerRound if self.config.number_of_threads == 0 => {
                thread::available_parallelism().map_or(1, |n| n.get())
            }
            ShoePolicy::FreshPerRound => self.config.number_of_threads,
        };
        threads.min(rounds.max(1) as usize)
    }

    fn play_rounds(&self, worker: u64, rounds: u64, failed: &AtomicBool) -> Result<Statistics> {
        let config = &self.config;
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        rng.set_stream(worker);
        let strategies: Vec<PlayerStrategy> = (0..config.number_of_players)
            .map(|seat| {
                if seat == config.player_seat {
                    config.player_strategy
                } else {
                    PlayerStrategy::BasicStrategy
                }
            })
            .collect();
        let mut game = Game::new(config.rule, &strategies, config.starting_balance, rng)?;

        let mut statistics = Statistics::default();
        for _ in 0..rounds {
            if self.cancelled.load(Ordering::Relaxed) || failed.load(Ordering::Relaxed) {
                break;
            }
            if config.shoe_policy == ShoePolicy::FreshPerRound {
                game.start_new_shoe()?;
            }
            game.reset_bankrolls(config.starting_balance)?;
            let summary = game.play_round(config.bet, &mut NoInput, &mut ())?;
            let seat = &summary.seats[config.player_seat];
            debug!(
                "worker {} round {}: {:+}",
                worker,
                statistics.rounds_played,
                seat.delta()
            );
            statistics.record(seat);
        }
        Ok(statistics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seat_with_delta(delta: i64) -> SeatSummary {
        SeatSummary {
            balance_before: 1000,
            balance_after: (1000 + delta) as u64,
            wagered: 100,
            hands_won: u32::from(delta > 0),
            hands_lost: u32::from(delta < 0),
            hands_pushed: u32::from(delta == 0),
            ..Default::default()
        }
    }

    #[test]
    fn variance_is_over_the_population() {
        let mut statistics = Statistics::default();
        for delta in [100, -50, 100, -50] {
            statistics.record(&seat_with_delta(delta));
        }
        assert_eq!(statistics.amount_earned, 100);
        assert_eq!(statistics.variance(), 5625.0);
        assert_eq!(statistics.house_edge(), -0.25);
        assert_eq!(statistics.hands_played(), 4);
        assert_eq!(Statistics::default().variance(), 0.0);
    }

    #[test]
    fn partial_sums_merge_in_any_order() {
        let deltas = [100, -50, 0, 250, -1000, 75, 15];
        let mut whole = Statistics::default();
        for delta in deltas {
            whole.record(&seat_with_delta(delta));
        }

        let mut left = Statistics::default();
        let mut right = Statistics::default();
        for (i, delta) in deltas.iter().enumerate() {
            if i % 3 == 0 {
                left.record(&seat_with_delta(*delta));
            } else {
                right.record(&seat_with_delta(*delta));
            }
        }
        let mut merged = right;
        merged += left;
        assert_eq!(merged, whole);
        left += right;
        assert_eq!(left, whole);
    }

    #[test]
    fn basic_strategy_house_edge() {
        let simulator = Simulator::new(SimulationConfig {
            seed: 2024,
            number_of_threads: 4,
            ..Default::default()
        })
        .unwrap();
        let result = simulator.run(200_000).unwrap();
        assert_eq!(result.rounds_played, 200_000);
        assert!(!result.cancelled);
        assert!(result.hands_played >= result.rounds_played);
        assert!(result.amount_wagered >= 200_000 * 1000);
        assert!(
            result.house_edge > -0.005 && result.house_edge < 0.02,
            "house edge {}",
            result.house_edge
        );
        assert!(result.amount_earned_variance > 0.0);
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let config = SimulationConfig {
            seed: 7,
            number_of_threads: 3,
            number_of_players: 3,
            player_seat: 1,
            player_strategy: PlayerStrategy::BasicStrategyI18,
            ..Default::default()
        };
        let first = Simulator::new(config.clone()).unwrap().run(3000).unwrap();
        let second = Simulator::new(config).unwrap().run(3000).unwrap();
        assert_eq!(first.amount_earned, second.amount_earned);
        assert_eq!(first.amount_wagered, second.amount_wagered);
        assert_eq!(first.hands_won, second.hands_won);
        assert_eq!(first.amount_earned_variance, second.amount_earned_variance);
    }

    #[test]
    fn persistent_shoe_runs_on_one_worker() {
        let simulator = Simulator::new(SimulationConfig {
            shoe_policy: ShoePolicy::Persistent,
            player_strategy: PlayerStrategy::BasicStrategyI18,
            number_of_threads: 8,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(simulator.number_of_workers(1000), 1);
        let result = simulator.run(1000).unwrap();
        assert_eq!(result.rounds_played, 1000);
    }

    #[test]
    fn persistent_shoe_dealt_to_the_last_card() {
        let simulator = Simulator::new(SimulationConfig {
            rule: Rule {
                number_of_decks: 1,
                cut_card_proportion: 1.0,
                ..Rule::default()
            },
            shoe_policy: ShoePolicy::Persistent,
            number_of_players: 3,
            ..Default::default()
        })
        .unwrap();
        let result = simulator.run(1000).unwrap();
        assert_eq!(result.rounds_played, 1000);
        assert!(!result.cancelled);
    }

    #[test]
    fn cancelled_run_returns_partial_result() {
        let simulator = Simulator::new(SimulationConfig::default()).unwrap();
        simulator.cancel_handle().store(true, Ordering::Relaxed);
        let result = simulator.run(1000).unwrap();
        assert!(result.cancelled);
        assert_eq!(result.rounds_played, 0);
        assert_eq!(result.house_edge, 0.0);
    }

    #[test]
    fn first_error_aborts_the_run() {
        let simulator = Simulator::new(SimulationConfig {
            starting_balance: 500,
            number_of_threads: 2,
            ..Default::default()
        })
        .unwrap();
        assert!(matches!(
            simulator.run(100),
            Err(Error::InsufficientBalance { amount: 1000, .. })
        ));
    }

    #[test]
    fn rejects_configs_it_cannot_run() {
        let config = |config: SimulationConfig| Simulator::new(config).err();
        assert!(config(SimulationConfig {
            player_strategy: PlayerStrategy::UserInput,
            ..Default::default()
        })
        .is_some());
        assert!(config(SimulationConfig {
            number_of_players: 2,
            player_seat: 2,
            ..Default::default()
        })
        .is_some());
        assert!(config(SimulationConfig {
            bet: 0,
            ..Default::default()
        })
        .is_some());
        assert!(config(SimulationConfig::default()).is_none());
    }
}
