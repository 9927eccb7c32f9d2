mod deviation;

use std::collections::VecDeque;

use log::trace;
use serde::Serialize;

use crate::game::hand::Hand;
use crate::{Card, Decision, Error, PlayerStrategy, Rank, Result};

pub use deviation::{CountRange, Deviation, HiLoDeviationChecker, INDEX_PLAYS, INSURANCE_INDEX};

/// How a hand is looked up in a strategy chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HandShape {
    Hard(u8),
    Soft(u8),
    Pair(Rank),
}

impl HandShape {
    /// Shape of the hand. A pair is only reported as such when splitting is
    /// still possible; otherwise it is looked up by its total.
    pub fn of(hand: &Hand, allow_pair: bool) -> HandShape {
        if allow_pair && hand.has_pairs() {
            HandShape::Pair(hand.cards()[0].rank)
        } else if hand.is_soft() {
            HandShape::Soft(hand.card_total())
        } else {
            HandShape::Hard(hand.card_total())
        }
    }

    /// Whether both shapes land on the same chart row. Pairs of ten-valued
    /// cards share a row.
    pub fn same_row(&self, other: &HandShape) -> bool {
        match (self, other) {
            (HandShape::Pair(a), HandShape::Pair(b)) => a.value() == b.value(),
            _ => self == other,
        }
    }
}

type Cell = (Decision, Option<Decision>);

const H: Cell = (Decision::Hit, None);
const S: Cell = (Decision::Stand, None);
const P: Cell = (Decision::Split, None);
const DH: Cell = (Decision::Double, Some(Decision::Hit));
const DS: Cell = (Decision::Double, Some(Decision::Stand));
const RH: Cell = (Decision::Surrender, Some(Decision::Hit));

// Columns are the dealer upcard: 2, 3, 4, 5, 6, 7, 8, 9, 10, A.
// Multi-deck, dealer stands on soft 17, double after split, late surrender.
const HARD_CHART: [[Cell; 10]; 13] = [
    [H, H, H, H, H, H, H, H, H, H], // 5
    [H, H, H, H, H, H, H, H, H, H],
    [H, H, H, H, H, H, H, H, H, H],
    [H, H, H, H, H, H, H, H, H, H],
    [H, DH, DH, DH, DH, H, H, H, H, H], // 9
    [DH, DH, DH, DH, DH, DH, DH, DH, H, H],
    [DH, DH, DH, DH, DH, DH, DH, DH, DH, H],
    [H, H, S, S, S, H, H, H, H, H], // 12
    [S, S, S, S, S, H, H, H, H, H],
    [S, S, S, S, S, H, H, H, H, H],
    [S, S, S, S, S, H, H, H, RH, H],
    [S, S, S, S, S, H, H, RH, RH, RH], // 16
    [S, S, S, S, S, S, S, S, S, S],    // 17, 17+
];

const SOFT_CHART: [[Cell; 10]; 9] = [
    [H, H, H, DH, DH, H, H, H, H, H], // A + 2
    [H, H, H, DH, DH, H, H, H, H, H],
    [H, H, DH, DH, DH, H, H, H, H, H],
    [H, H, DH, DH, DH, H, H, H, H, H],
    [H, DH, DH, DH, DH, H, H, H, H, H],
    [S, DS, DS, DS, DS, S, S, H, H, H], // A + 7
    [S, S, S, S, S, S, S, S, S, S],
    [S, S, S, S, S, S, S, S, S, S],
    [S, S, S, S, S, S, S, S, S, S], // A + 10
];

const PAIR_CHART: [[Cell; 10]; 10] = [
    [P, P, P, P, P, P, H, H, H, H], // 2-2
    [P, P, P, P, P, P, H, H, H, H],
    [H, H, H, P, P, H, H, H, H, H],
    [DH, DH, DH, DH, DH, DH, DH, DH, H, H], // 5-5
    [P, P, P, P, P, H, H, H, H, H],
    [P, P, P, P, P, P, H, H, H, H],
    [P, P, P, P, P, P, P, P, P, P], // 8-8
    [P, P, P, P, P, S, P, P, S, S],
    [S, S, S, S, S, S, S, S, S, S], // 10-10
    [P, P, P, P, P, P, P, P, P, P], // A-A
];

/// Static basic-strategy chart.
pub struct BasicStrategyChecker;

impl BasicStrategyChecker {
    /// First choice of the chart, or None when the shape is outside the chart
    /// (hard totals below 5, soft totals below 13, anything over 21).
    pub fn suggest(dealer_upcard: Rank, shape: HandShape) -> Option<Decision> {
        Self::lookup(dealer_upcard, shape).map(|cell| cell.0)
    }

    /// Chart recommendation restricted to `legal`. A pair that cannot be split
    /// is played by its total, and a double or a surrender that is not allowed
    /// falls back to the chart's secondary action.
    pub fn suggest_legal(dealer_upcard: Rank, hand: &Hand, legal: &[Decision]) -> Option<Decision> {
        let shape = HandShape::of(hand, legal.contains(&Decision::Split));
        let (first, second) = Self::lookup(dealer_upcard, shape)?;
        std::iter::once(first)
            .chain(second)
            .find(|decision| legal.contains(decision))
    }

    fn lookup(dealer_upcard: Rank, shape: HandShape) -> Option<Cell> {
        let col = (dealer_upcard.value() - 2) as usize;
        match shape {
            HandShape::Hard(total @ 5..=21) => {
                let row = (total.min(17) - 5) as usize;
                Some(HARD_CHART[row][col])
            }
            HandShape::Soft(total @ 13..=21) => Some(SOFT_CHART[(total - 13) as usize][col]),
            HandShape::Pair(rank) => Some(PAIR_CHART[(rank.value() - 2) as usize][col]),
            _ => None,
        }
    }
}

/// Everything a decision function may look at: the hand being played, the
/// dealer's upcard and the count state of the shoe.
#[derive(Debug, Clone, Copy)]
pub struct TableView<'a> {
    pub hand: &'a Hand,
    pub dealer_upcard: Card,
    pub counter: &'a HiLoDeviationChecker,
    pub balance: u64,
}

/// Source of decisions for a `UserInput` seat. Returning None cancels the
/// round.
pub trait PlayerInput {
    fn read_input(&mut self, view: &TableView<'_>, legal: &[Decision]) -> Option<Decision>;
    fn read_insurance(&mut self, view: &TableView<'_>) -> Option<bool>;
}

/// Input for tables without a human seat. Any question cancels.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoInput;

impl PlayerInput for NoInput {
    fn read_input(&mut self, _: &TableView<'_>, _: &[Decision]) -> Option<Decision> {
        None
    }

    fn read_insurance(&mut self, _: &TableView<'_>) -> Option<bool> {
        None
    }
}

/// Replays prepared answers in order. Cancels once they run out.
#[derive(Debug, Default, Clone)]
pub struct ScriptedInput {
    decisions: VecDeque<Decision>,
    insurance: VecDeque<bool>,
}

impl ScriptedInput {
    pub fn new(decisions: &[Decision]) -> Self {
        ScriptedInput {
            decisions: decisions.iter().copied().collect(),
            insurance: VecDeque::new(),
        }
    }

    pub fn with_insurance(mut self, answers: &[bool]) -> Self {
        self.insurance.extend(answers);
        self
    }
}

impl PlayerInput for ScriptedInput {
    fn read_input(&mut self, _: &TableView<'_>, _: &[Decision]) -> Option<Decision> {
        self.decisions.pop_front()
    }

    fn read_insurance(&mut self, _: &TableView<'_>) -> Option<bool> {
        self.insurance.pop_front()
    }
}

impl PlayerStrategy {
    /// Next action for the hand in `view`. Whatever the source, the action
    /// must be one of `legal`.
    pub fn decide<I: PlayerInput + ?Sized>(
        &self,
        view: &TableView<'_>,
        legal: &[Decision],
        input: &mut I,
    ) -> Result<Decision> {
        let decision = match self {
            PlayerStrategy::UserInput => input.read_input(view, legal).ok_or(Error::Cancelled)?,
            PlayerStrategy::BasicStrategy => basic_strategy_decision(view, legal),
            PlayerStrategy::BasicStrategyI18 => {
                let basic = basic_strategy_decision(view, legal);
                let upcard = view.dealer_upcard.rank;
                let true_count = view.counter.true_count();
                let shape = HandShape::of(view.hand, legal.contains(&Decision::Split));
                let total = HandShape::of(view.hand, false);
                // A pair the chart does not split is played by its total.
                let deviation = view
                    .counter
                    .suggest_legal(upcard, shape, true_count, legal)
                    .or_else(|| {
                        (shape != total && basic != Decision::Split)
                            .then(|| view.counter.suggest_legal(upcard, total, true_count, legal))
                            .flatten()
                    });
                // Index numbers are for games without surrender and never
                // override a surrender from the chart.
                match deviation {
                    Some(decision) if basic != Decision::Surrender => decision,
                    Some(Decision::Surrender) => Decision::Surrender,
                    _ => basic,
                }
            }
        };
        trace!(
            "{} {} vs {}: {:?}",
            self,
            view.hand.card_total(),
            view.dealer_upcard,
            decision
        );

        if !legal.contains(&decision) {
            return Err(Error::IllegalAction {
                action: decision,
                reason: "not in the legal actions for this hand",
            });
        }
        Ok(decision)
    }

    pub fn take_insurance<I: PlayerInput + ?Sized>(
        &self,
        view: &TableView<'_>,
        input: &mut I,
    ) -> Result<bool> {
        match self {
            PlayerStrategy::UserInput => input.read_insurance(view).ok_or(Error::Cancelled),
            PlayerStrategy::BasicStrategy => Ok(false),
            PlayerStrategy::BasicStrategyI18 => Ok(view
                .counter
                .should_take_insurance(view.counter.true_count())),
        }
    }
}

/// Falls back to drawing to 17 when the chart has no row for the hand.
fn basic_strategy_decision(view: &TableView<'_>, legal: &[Decision]) -> Decision {
    BasicStrategyChecker::suggest_legal(view.dealer_upcard.rank, view.hand, legal).unwrap_or(
        if view.hand.card_total() < 17 {
            Decision::Hit
        } else {
            Decision::Stand
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Suit;

    const ALL: [Decision; 5] = [
        Decision::Hit,
        Decision::Stand,
        Decision::Double,
        Decision::Split,
        Decision::Surrender,
    ];
    const HIT_STAND: [Decision; 2] = [Decision::Hit, Decision::Stand];

    fn hand_of(ranks: &[Rank]) -> Hand {
        let mut hand = Hand::new(0);
        for rank in ranks {
            hand.take_card(Card::new(*rank, Suit::Club), false);
        }
        hand
    }

    fn up(rank: Rank) -> Card {
        Card::new(rank, Suit::Diamond)
    }

    #[test]
    fn chart_first_choices() {
        use HandShape::*;
        assert_eq!(BasicStrategyChecker::suggest(Rank::Six, Hard(12)), Some(Decision::Stand));
        assert_eq!(BasicStrategyChecker::suggest(Rank::Two, Hard(12)), Some(Decision::Hit));
        assert_eq!(BasicStrategyChecker::suggest(Rank::King, Hard(11)), Some(Decision::Double));
        assert_eq!(BasicStrategyChecker::suggest(Rank::Ace, Hard(11)), Some(Decision::Hit));
        assert_eq!(
            BasicStrategyChecker::suggest(Rank::Ten, Hard(16)),
            Some(Decision::Surrender)
        );
        assert_eq!(BasicStrategyChecker::suggest(Rank::Ace, Hard(20)), Some(Decision::Stand));
        assert_eq!(BasicStrategyChecker::suggest(Rank::Six, Soft(18)), Some(Decision::Double));
        assert_eq!(BasicStrategyChecker::suggest(Rank::Nine, Soft(18)), Some(Decision::Hit));
        assert_eq!(
            BasicStrategyChecker::suggest(Rank::Ace, Pair(Rank::Eight)),
            Some(Decision::Split)
        );
        assert_eq!(
            BasicStrategyChecker::suggest(Rank::Seven, Pair(Rank::Nine)),
            Some(Decision::Stand)
        );
        assert_eq!(
            BasicStrategyChecker::suggest(Rank::Six, Pair(Rank::Queen)),
            Some(Decision::Stand)
        );
    }

    #[test]
    fn out_of_domain_shapes_have_no_recommendation() {
        use HandShape::*;
        assert_eq!(BasicStrategyChecker::suggest(Rank::Five, Hard(4)), None);
        assert_eq!(BasicStrategyChecker::suggest(Rank::Five, Hard(22)), None);
        assert_eq!(BasicStrategyChecker::suggest(Rank::Five, Soft(12)), None);
    }

    #[test]
    fn double_falls_back_after_the_first_decision() {
        let hand = hand_of(&[Rank::Six, Rank::Five]);
        assert_eq!(
            BasicStrategyChecker::suggest_legal(Rank::Six, &hand, &ALL),
            Some(Decision::Double)
        );
        assert_eq!(
            BasicStrategyChecker::suggest_legal(Rank::Six, &hand, &HIT_STAND),
            Some(Decision::Hit)
        );
        let hand = hand_of(&[Rank::Ace, Rank::Seven]);
        assert_eq!(
            BasicStrategyChecker::suggest_legal(Rank::Four, &hand, &HIT_STAND),
            Some(Decision::Stand)
        );
    }

    #[test]
    fn surrender_falls_back_to_secondary_action() {
        let hand = hand_of(&[Rank::Ten, Rank::Six]);
        assert_eq!(
            BasicStrategyChecker::suggest_legal(Rank::Ten, &hand, &ALL),
            Some(Decision::Surrender)
        );
        assert_eq!(
            BasicStrategyChecker::suggest_legal(Rank::Ten, &hand, &HIT_STAND),
            Some(Decision::Hit)
        );
    }

    #[test]
    fn pair_without_split_uses_total() {
        let hand = hand_of(&[Rank::Eight, Rank::Eight]);
        assert_eq!(
            BasicStrategyChecker::suggest_legal(Rank::Six, &hand, &ALL),
            Some(Decision::Split)
        );
        assert_eq!(
            BasicStrategyChecker::suggest_legal(Rank::Six, &hand, &HIT_STAND),
            Some(Decision::Stand)
        );
        let hand = hand_of(&[Rank::Two, Rank::Two]);
        assert_eq!(BasicStrategyChecker::suggest_legal(Rank::Six, &hand, &HIT_STAND), None);
    }

    #[test]
    fn strategies_dispatch() {
        let counter = HiLoDeviationChecker::new(1);
        let hand = hand_of(&[Rank::Ten, Rank::Two]);
        let view = TableView {
            hand: &hand,
            dealer_upcard: up(Rank::Two),
            counter: &counter,
            balance: 1000,
        };
        let decision = PlayerStrategy::BasicStrategy
            .decide(&view, &HIT_STAND, &mut NoInput)
            .unwrap();
        assert_eq!(decision, Decision::Hit);

        let err = PlayerStrategy::UserInput
            .decide(&view, &HIT_STAND, &mut NoInput)
            .unwrap_err();
        assert_eq!(err, Error::Cancelled);

        let mut input = ScriptedInput::new(&[Decision::Stand, Decision::Split]);
        let decision = PlayerStrategy::UserInput
            .decide(&view, &HIT_STAND, &mut input)
            .unwrap();
        assert_eq!(decision, Decision::Stand);
        let err = PlayerStrategy::UserInput
            .decide(&view, &HIT_STAND, &mut input)
            .unwrap_err();
        assert!(matches!(err, Error::IllegalAction { action: Decision::Split, .. }));
    }

    #[test]
    fn deviation_overrides_chart_at_high_count() {
        let mut counter = HiLoDeviationChecker::new(1);
        for _ in 0..5 {
            counter.observe(&Card::new(Rank::Five, Suit::Heart));
        }
        assert!(counter.true_count() >= 3.0);
        let hand = hand_of(&[Rank::Ten, Rank::Two]);
        let view = TableView {
            hand: &hand,
            dealer_upcard: up(Rank::Two),
            counter: &counter,
            balance: 1000,
        };
        assert_eq!(
            PlayerStrategy::BasicStrategyI18
                .decide(&view, &HIT_STAND, &mut NoInput)
                .unwrap(),
            Decision::Stand
        );
        assert_eq!(
            PlayerStrategy::BasicStrategy
                .decide(&view, &HIT_STAND, &mut NoInput)
                .unwrap(),
            Decision::Hit
        );
        assert!(PlayerStrategy::BasicStrategyI18
            .take_insurance(&view, &mut NoInput)
            .unwrap());
        assert!(!PlayerStrategy::BasicStrategy
            .take_insurance(&view, &mut NoInput)
            .unwrap());
    }

    #[test]
    fn unsplit_pairs_take_total_deviations() {
        let mut counter = HiLoDeviationChecker::new(1);
        for _ in 0..5 {
            counter.observe(&Card::new(Rank::Five, Suit::Heart));
        }
        assert!(counter.true_count() >= 4.0);
        let decide = |ranks: &[Rank]| {
            let hand = hand_of(ranks);
            let view = TableView {
                hand: &hand,
                dealer_upcard: up(Rank::King),
                counter: &counter,
                balance: 1000,
            };
            PlayerStrategy::BasicStrategyI18
                .decide(&view, &ALL, &mut NoInput)
                .unwrap()
        };
        assert_eq!(decide(&[Rank::Six, Rank::Four]), Decision::Double);
        assert_eq!(decide(&[Rank::Five, Rank::Five]), Decision::Double);
        assert_eq!(decide(&[Rank::Seven, Rank::Seven]), Decision::Surrender);
        assert_eq!(decide(&[Rank::Eight, Rank::Eight]), Decision::Split);
        assert_eq!(decide(&[Rank::Ten, Rank::Ten]), Decision::Stand);
    }

    #[test]
    fn chart_surrender_survives_count_deviation() {
        let counter = HiLoDeviationChecker::new(6);
        let hand = hand_of(&[Rank::Ten, Rank::Six]);
        let view = TableView {
            hand: &hand,
            dealer_upcard: up(Rank::King),
            counter: &counter,
            balance: 1000,
        };
        assert_eq!(
            PlayerStrategy::BasicStrategyI18
                .decide(&view, &ALL, &mut NoInput)
                .unwrap(),
            Decision::Surrender
        );
        assert_eq!(
            PlayerStrategy::BasicStrategyI18
                .decide(&view, &HIT_STAND, &mut NoInput)
                .unwrap(),
            Decision::Stand
        );
    }
}
