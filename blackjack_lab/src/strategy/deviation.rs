use serde::Serialize;

use super::HandShape;
use crate::game::shoe::CARDS_PER_DECK;
use crate::{Card, Decision, Rank};

/// Half-open true count range an index play applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CountRange {
    AtLeast(i8),
    Below(i8),
}

impl CountRange {
    pub fn contains(&self, true_count: f64) -> bool {
        match *self {
            CountRange::AtLeast(index) => true_count >= index as f64,
            CountRange::Below(index) => true_count < index as f64,
        }
    }
}

impl std::fmt::Display for CountRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CountRange::AtLeast(index) => write!(f, ">= {}", index),
            CountRange::Below(index) => write!(f, "< {}", index),
        }
    }
}

/// Play a hand differently from the chart when the count is in `range`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Deviation {
    pub shape: HandShape,
    /// Blackjack value of the dealer upcard, ace is 11.
    pub dealer_upcard: u8,
    pub range: CountRange,
    pub decision: Decision,
}

const fn deviation(shape: HandShape, dealer_upcard: u8, range: CountRange, decision: Decision) -> Deviation {
    Deviation {
        shape,
        dealer_upcard,
        range,
        decision,
    }
}

use CountRange::{AtLeast, Below};
use HandShape::{Hard, Pair};

/// Index plays in priority order: the four surrender indices first, then the
/// Illustrious 18 without insurance.
pub static INDEX_PLAYS: [Deviation; 21] = [
    deviation(Hard(14), 10, AtLeast(3), Decision::Surrender),
    deviation(Hard(15), 10, AtLeast(0), Decision::Surrender),
    deviation(Hard(15), 9, AtLeast(2), Decision::Surrender),
    deviation(Hard(15), 11, AtLeast(1), Decision::Surrender),
    deviation(Hard(16), 10, AtLeast(0), Decision::Stand),
    deviation(Hard(15), 10, AtLeast(4), Decision::Stand),
    deviation(Pair(Rank::Ten), 5, AtLeast(5), Decision::Split),
    deviation(Pair(Rank::Ten), 6, AtLeast(4), Decision::Split),
    deviation(Hard(10), 10, AtLeast(4), Decision::Double),
    deviation(Hard(12), 3, AtLeast(2), Decision::Stand),
    deviation(Hard(12), 2, AtLeast(3), Decision::Stand),
    deviation(Hard(11), 11, AtLeast(1), Decision::Double),
    deviation(Hard(9), 2, AtLeast(1), Decision::Double),
    deviation(Hard(10), 11, AtLeast(4), Decision::Double),
    deviation(Hard(9), 7, AtLeast(3), Decision::Double),
    deviation(Hard(16), 9, AtLeast(5), Decision::Stand),
    deviation(Hard(13), 2, Below(-1), Decision::Hit),
    deviation(Hard(12), 4, Below(0), Decision::Hit),
    deviation(Hard(12), 5, Below(-2), Decision::Hit),
    deviation(Hard(12), 6, Below(-1), Decision::Hit),
    deviation(Hard(13), 3, Below(-2), Decision::Hit),
];

pub const INSURANCE_INDEX: CountRange = AtLeast(3);

/// Hi-Lo running count of one shoe plus the index plays keyed on its true
/// count. Only cards seen face up are counted.
#[derive(Debug, Clone, PartialEq)]
pub struct HiLoDeviationChecker {
    number_of_decks: u8,
    running_count: i32,
    cards_seen: u32,
}

impl HiLoDeviationChecker {
    pub fn new(number_of_decks: u8) -> Self {
        HiLoDeviationChecker {
            number_of_decks,
            running_count: 0,
            cards_seen: 0,
        }
    }

    pub fn observe(&mut self, card: &Card) {
        if !card.visible {
            return;
        }
        self.running_count += card.count_value() as i32;
        self.cards_seen += 1;
    }

    /// Called whenever the shoe is reshuffled.
    pub fn reset(&mut self) {
        self.running_count = 0;
        self.cards_seen = 0;
    }

    pub fn running_count(&self) -> i32 {
        self.running_count
    }

    pub fn cards_seen(&self) -> u32 {
        self.cards_seen
    }

    /// Estimated decks left in the shoe, never below half a deck.
    pub fn decks_remaining(&self) -> f64 {
        let dealt = self.cards_seen as f64 / CARDS_PER_DECK as f64;
        (self.number_of_decks as f64 - dealt).max(0.5)
    }

    pub fn true_count(&self) -> f64 {
        self.running_count as f64 / self.decks_remaining()
    }

    /// First index play matching the hand, regardless of legality.
    pub fn suggest(&self, dealer_upcard: Rank, shape: HandShape, true_count: f64) -> Option<Decision> {
        self.matching(dealer_upcard, shape, true_count).next()
    }

    /// First matching index play that is also legal right now.
    pub fn suggest_legal(
        &self,
        dealer_upcard: Rank,
        shape: HandShape,
        true_count: f64,
        legal: &[Decision],
    ) -> Option<Decision> {
        self.matching(dealer_upcard, shape, true_count)
            .find(|decision| legal.contains(decision))
    }

    pub fn should_take_insurance(&self, true_count: f64) -> bool {
        INSURANCE_INDEX.contains(true_count)
    }

    fn matching(
        &self,
        dealer_upcard: Rank,
        shape: HandShape,
        true_count: f64,
    ) -> impl Iterator<Item = Decision> {
        INDEX_PLAYS
            .iter()
            .filter(move |play| {
                play.dealer_upcard == dealer_upcard.value()
                    && play.shape.same_row(&shape)
                    && play.range.contains(true_count)
            })
            .map(|play| play.decision)
    }
}
