pub mod card;
mod error;
pub mod game;
pub mod simulation;
pub mod strategy;

use serde::{Deserialize, Serialize};
use serde_enum_str::{Deserialize_enum_str, Serialize_enum_str};

pub use card::{Card, Rank, Suit};
pub use error::{Error, Result};

/// Table rules shared by every round of a game.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub number_of_decks: u8,
    /// Proportion of the shoe dealt before the cut card comes out.
    pub cut_card_proportion: f64,
    pub dealer_hit_on_soft17: bool,
    pub allow_das: bool,
    pub allow_late_surrender: bool,
    pub allow_insurance: bool,
    /// Total number of hands a player may hold after splitting.
    pub max_split_hands: u8,
    /// Split aces receive exactly one card each and stand.
    pub split_aces_one_card: bool,

    pub payout_blackjack: BlackjackPayout,
    /// Insurance pays this many times the insurance bet.
    pub payout_insurance: u64,
}

impl Rule {
    pub fn validate(&self) -> Result<()> {
        if self.number_of_decks == 0 {
            return Err(Error::InvalidConfig(String::from(
                "number_of_decks must be positive",
            )));
        }
        if !(self.cut_card_proportion > 0.0 && self.cut_card_proportion <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "cut_card_proportion must be in (0, 1], got {}",
                self.cut_card_proportion
            )));
        }
        if self.max_split_hands == 0 {
            return Err(Error::InvalidConfig(String::from(
                "max_split_hands must be at least 1",
            )));
        }
        Ok(())
    }
}

impl Default for Rule {
    fn default() -> Self {
        Rule {
            number_of_decks: 6,
            cut_card_proportion: 0.75,
            dealer_hit_on_soft17: false,
            allow_das: true,
            allow_late_surrender: true,
            allow_insurance: true,
            max_split_hands: 4,
            split_aces_one_card: true,
            payout_blackjack: BlackjackPayout::THREE_TO_TWO,
            payout_insurance: 2,
        }
    }
}

/// Ratio paid on a natural, written as `"3:2"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlackjackPayout {
    numerator: u32,
    denominator: u32,
}

impl BlackjackPayout {
    pub const THREE_TO_TWO: BlackjackPayout = BlackjackPayout {
        numerator: 3,
        denominator: 2,
    };
    pub const SIX_TO_FIVE: BlackjackPayout = BlackjackPayout {
        numerator: 6,
        denominator: 5,
    };
    pub const EVEN_MONEY: BlackjackPayout = BlackjackPayout {
        numerator: 1,
        denominator: 1,
    };

    pub fn new(numerator: u32, denominator: u32) -> Result<Self> {
        if numerator == 0 || denominator == 0 {
            return Err(Error::InvalidConfig(format!(
                "blackjack payout {}:{} must have positive terms",
                numerator, denominator
            )));
        }
        Ok(BlackjackPayout {
            numerator,
            denominator,
        })
    }

    /// Winnings on top of the returned bet. Fractions of a cent are dropped.
    pub fn winnings(&self, bet: u64) -> u64 {
        bet * self.numerator as u64 / self.denominator as u64
    }
}

impl std::str::FromStr for BlackjackPayout {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidConfig(format!("invalid blackjack payout {:?}", s));
        let (numerator, denominator) = s.split_once(':').ok_or_else(invalid)?;
        let numerator = numerator.trim().parse().map_err(|_| invalid())?;
        let denominator = denominator.trim().parse().map_err(|_| invalid())?;
        BlackjackPayout::new(numerator, denominator)
    }
}

impl std::fmt::Display for BlackjackPayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.numerator, self.denominator)
    }
}

impl TryFrom<String> for BlackjackPayout {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<BlackjackPayout> for String {
    fn from(value: BlackjackPayout) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    Hit,
    Stand,
    Double,
    Split,
    Surrender,
}

/// Who decides for a seat. The set is closed: a seat is either driven by an
/// input collaborator or by one of the built-in charts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_enum_str, Deserialize_enum_str)]
pub enum PlayerStrategy {
    UserInput,
    BasicStrategy,
    BasicStrategyI18,
}

impl PlayerStrategy {
    pub fn is_npc(&self) -> bool {
        *self != PlayerStrategy::UserInput
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_payout() {
        let payout: BlackjackPayout = "3:2".parse().unwrap();
        assert_eq!(payout, BlackjackPayout::THREE_TO_TWO);
        assert_eq!(payout.to_string(), "3:2");
        assert_eq!(" 6 : 5 ".parse::<BlackjackPayout>().unwrap(), BlackjackPayout::SIX_TO_FIVE);
        assert!("3/2".parse::<BlackjackPayout>().is_err());
        assert!("3:0".parse::<BlackjackPayout>().is_err());
        assert!("x:2".parse::<BlackjackPayout>().is_err());
    }

    #[test]
    fn payout_winnings_are_exact_on_whole_cents() {
        assert_eq!(BlackjackPayout::THREE_TO_TWO.winnings(10000), 15000);
        assert_eq!(BlackjackPayout::SIX_TO_FIVE.winnings(1000), 1200);
        assert_eq!(BlackjackPayout::EVEN_MONEY.winnings(750), 750);
    }

    #[test]
    fn parse_strategy() {
        let strategy: PlayerStrategy = "BasicStrategyI18".parse().unwrap();
        assert_eq!(strategy, PlayerStrategy::BasicStrategyI18);
        assert!(strategy.is_npc());
        assert!(!PlayerStrategy::UserInput.is_npc());
        assert!("Martingale".parse::<PlayerStrategy>().is_err());
    }

    #[test]
    fn default_rule_is_valid() {
        assert!(Rule::default().validate().is_ok());
        let rule = Rule {
            number_of_decks: 0,
            ..Default::default()
        };
        assert!(rule.validate().is_err());
        let rule = Rule {
            cut_card_proportion: 1.5,
            ..Default::default()
        };
        assert!(rule.validate().is_err());
    }
}
