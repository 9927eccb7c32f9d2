use serde::Serialize;

use crate::Card;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HandStatus {
    Acting,
    Stood,
    Busted,
    Surrendered,
}

/// One bet and the cards played on it. A player holds more than one hand only
/// after a split.
#[derive(Debug, Clone, Serialize)]
pub struct Hand {
    id: usize,
    cards: Vec<Card>,
    bet: u64,
    status: HandStatus,
    doubled: bool,
    from_split: bool,
    /// Number of decisions already taken on this hand.
    decisions: u8,
}

impl Hand {
    pub fn new(id: usize) -> Hand {
        Hand {
            id,
            cards: Vec::with_capacity(4),
            bet: 0,
            status: HandStatus::Acting,
            doubled: false,
            from_split: false,
            decisions: 0,
        }
    }

    /// The hand receives a card. The dealer's hole card is prepended.
    pub fn take_card(&mut self, card: Card, prepend: bool) {
        if prepend {
            self.cards.insert(0, card);
        } else {
            self.cards.push(card);
        }
    }

    /// Empties the hand and returns the cards, e.g. to the discard pile.
    pub fn remove_cards(&mut self) -> Vec<Card> {
        std::mem::take(&mut self.cards)
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn visible_cards(&self) -> impl Iterator<Item = &Card> {
        self.cards.iter().filter(|card| card.visible)
    }

    /// Best total of the visible cards: aces start at 11 and drop to 1 one at a
    /// time while the total is over 21.
    pub fn card_total(&self) -> u8 {
        self.evaluate().0
    }

    /// Number of aces still counted as 11.
    pub fn soft_aces(&self) -> u8 {
        self.evaluate().1
    }

    pub fn is_soft(&self) -> bool {
        self.soft_aces() > 0
    }

    pub fn is_hard(&self) -> bool {
        !self.is_soft()
    }

    pub fn busted(&self) -> bool {
        self.card_total() > 21
    }

    pub fn blackjack(&self) -> bool {
        self.cards.len() == 2 && self.card_total() == 21
    }

    pub fn has_pairs(&self) -> bool {
        self.cards.len() == 2 && self.cards[0].rank == self.cards[1].rank
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn bet(&self) -> u64 {
        self.bet
    }

    pub fn status(&self) -> HandStatus {
        self.status
    }

    pub fn is_acting(&self) -> bool {
        self.status == HandStatus::Acting
    }

    pub fn is_doubled(&self) -> bool {
        self.doubled
    }

    pub fn is_from_split(&self) -> bool {
        self.from_split
    }

    pub fn decisions(&self) -> u8 {
        self.decisions
    }

    pub(crate) fn add_bet(&mut self, amount: u64) {
        self.bet += amount;
    }

    pub(crate) fn set_status(&mut self, status: HandStatus) {
        self.status = status;
    }

    pub(crate) fn record_decision(&mut self) {
        self.decisions += 1;
    }

    pub(crate) fn mark_doubled(&mut self) {
        self.doubled = true;
    }

    /// Turns every face-down card up and returns the cards that were revealed.
    pub(crate) fn reveal(&mut self) -> Vec<Card> {
        let mut revealed = Vec::new();
        for card in self.cards.iter_mut().filter(|card| !card.visible) {
            *card = card.revealed();
            revealed.push(*card);
        }
        revealed
    }

    /// Moves the second card of a pair into a new hand with no bet yet. The
    /// caller checks that splitting is legal and places the new bet.
    pub(crate) fn split_off(&mut self, new_id: usize) -> Hand {
        let card = self.cards.pop();
        self.from_split = true;
        let mut hand = Hand::new(new_id);
        hand.from_split = true;
        hand.cards.extend(card);
        hand
    }

    fn evaluate(&self) -> (u8, u8) {
        let mut total: u8 = 0;
        let mut aces: u8 = 0;
        for card in self.visible_cards() {
            total += card.value();
            if card.is_ace() {
                aces += 1;
            }
        }
        while total > 21 && aces > 0 {
            total -= 10;
            aces -= 1;
        }
        (total, aces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Rank, Suit};

    fn hand_of(ranks: &[Rank]) -> Hand {
        let mut hand = Hand::new(0);
        for rank in ranks {
            hand.take_card(Card::new(*rank, Suit::Heart), false);
        }
        hand
    }

    #[test]
    fn four_aces_make_soft_fourteen() {
        let hand = hand_of(&[Rank::Ace; 4]);
        assert_eq!(hand.card_total(), 14);
        assert_eq!(hand.soft_aces(), 1);
        assert!(hand.is_soft());
    }

    #[test]
    fn ace_drops_to_one_when_needed() {
        let hand = hand_of(&[Rank::Ace, Rank::Six]);
        assert_eq!(hand.card_total(), 17);
        assert!(hand.is_soft());

        let hand = hand_of(&[Rank::Ace, Rank::Six, Rank::Nine]);
        assert_eq!(hand.card_total(), 16);
        assert!(hand.is_hard());

        let hand = hand_of(&[Rank::Ace, Rank::Ace, Rank::Nine]);
        assert_eq!(hand.card_total(), 21);
        assert_eq!(hand.soft_aces(), 1);
    }

    #[test]
    fn blackjack_needs_exactly_two_cards() {
        assert!(hand_of(&[Rank::Ace, Rank::King]).blackjack());
        assert!(hand_of(&[Rank::Ten, Rank::Ace]).blackjack());
        assert!(!hand_of(&[Rank::Seven, Rank::Seven, Rank::Seven]).blackjack());
        assert!(!hand_of(&[Rank::King, Rank::Queen]).blackjack());
    }

    #[test]
    fn busted_iff_total_over_21() {
        let ranks = [
            Rank::Two,
            Rank::Ace,
            Rank::Five,
            Rank::King,
            Rank::Ace,
            Rank::Three,
            Rank::Nine,
        ];
        let mut hand = Hand::new(0);
        let mut naive = 0;
        for rank in ranks {
            let before = hand.card_total();
            let was_hard = hand.is_hard();
            hand.take_card(Card::new(rank, Suit::Club), false);
            naive += rank.value();
            assert_eq!(hand.busted(), hand.card_total() > 21);
            assert!(hand.card_total() <= naive);
            if was_hard && rank != Rank::Ace {
                assert_eq!(hand.card_total(), before + rank.value());
            }
        }
        assert!(hand.busted());
    }

    #[test]
    fn pairs_compare_ranks() {
        assert!(hand_of(&[Rank::Eight, Rank::Eight]).has_pairs());
        assert!(!hand_of(&[Rank::King, Rank::Queen]).has_pairs());
        assert!(!hand_of(&[Rank::Eight, Rank::Eight, Rank::Two]).has_pairs());
    }

    #[test]
    fn hole_card_is_prepended_and_hidden() {
        let mut hand = Hand::new(0);
        hand.take_card(Card::new(Rank::Nine, Suit::Spade), false);
        hand.take_card(Card::new(Rank::Ace, Suit::Spade).face_down(), true);
        assert_eq!(hand.cards()[0].rank, Rank::Ace);
        assert_eq!(hand.card_total(), 9);
        assert!(!hand.blackjack());

        let revealed = hand.reveal();
        assert_eq!(revealed, vec![Card::new(Rank::Ace, Suit::Spade)]);
        assert_eq!(hand.card_total(), 20);
        assert!(hand.reveal().is_empty());
    }

    #[test]
    fn remove_cards_is_idempotent() {
        let mut hand = hand_of(&[Rank::Two, Rank::Three]);
        assert_eq!(hand.remove_cards().len(), 2);
        assert!(hand.remove_cards().is_empty());
        assert_eq!(hand.card_total(), 0);
    }

    #[test]
    fn should_split_successfully() {
        let mut hand = Hand::new(0);
        hand.take_card(Card::new(Rank::Eight, Suit::Diamond), false);
        hand.take_card(Card::new(Rank::Eight, Suit::Club), false);
        hand.add_bet(100);
        let new_hand = hand.split_off(1);
        assert_eq!(hand.cards(), &[Card::new(Rank::Eight, Suit::Diamond)]);
        assert_eq!(new_hand.cards(), &[Card::new(Rank::Eight, Suit::Club)]);
        assert!(hand.is_from_split());
        assert!(new_hand.is_from_split());
        assert_eq!(new_hand.id(), 1);
        assert_eq!(new_hand.bet(), 0);
    }
}
