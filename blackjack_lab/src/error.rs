use crate::{game::GamePhase, Decision};

/// Errors of the core crate. None of them is retried.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("insufficient balance for player {player}: {balance} < {amount}")]
    InsufficientBalance {
        player: usize,
        balance: u64,
        amount: u64,
    },
    #[error("illegal action {action:?}: {reason}")]
    IllegalAction {
        action: Decision,
        reason: &'static str,
    },
    #[error("{operation} is only allowed in another phase (current phase: {phase:?})")]
    WrongPhase {
        operation: &'static str,
        phase: GamePhase,
    },
    #[error("insurance is not offered against this upcard")]
    InsuranceNotOffered,
    #[error("there is no player at seat {0}")]
    NoSuchSeat(usize),
    #[error("the shoe ran out of cards")]
    ShoeExhausted,
    #[error("player input was cancelled")]
    Cancelled,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
