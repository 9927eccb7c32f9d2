use std::collections::BTreeMap;

use log::trace;
use serde::{Deserialize, Serialize};

use super::hand::Hand;
use crate::{BlackjackPayout, Card, Error, PlayerStrategy, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandWinner {
    Player,
    Dealer,
    Push,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandResult {
    pub winner: HandWinner,
    pub surrender: bool,
    pub blackjack: bool,
    /// Chips handed back to the player, bet included.
    pub returned: u64,
}

/// A seat at the table. Chips for a bet leave the balance when the bet is
/// placed and come back, with winnings, when the hand is settled.
#[derive(Debug, Clone)]
pub struct Player {
    id: usize,
    balance: u64,
    blackjack_payout: BlackjackPayout,
    hands: Vec<Hand>,
    hand_winner: BTreeMap<usize, HandResult>,
    insurance: u64,
    next_hand_id: usize,
    strategy: PlayerStrategy,
}

/// Serializable snapshot handed to renderers.
#[derive(Debug, Clone, Serialize)]
pub struct PlayerAttributes {
    pub id: usize,
    pub balance: u64,
    pub hands: Vec<Hand>,
    pub hand_winner: BTreeMap<usize, HandResult>,
}

impl Player {
    pub fn new(
        id: usize,
        balance: u64,
        strategy: PlayerStrategy,
        blackjack_payout: BlackjackPayout,
    ) -> Player {
        Player {
            id,
            balance,
            blackjack_payout,
            hands: Vec::new(),
            hand_winner: BTreeMap::new(),
            insurance: 0,
            next_hand_id: 0,
            strategy,
        }
    }

    /// Opens a new hand with the given bet. Returns the index of the hand.
    pub fn add_hand(&mut self, bet: u64) -> Result<usize> {
        self.check_balance(bet)?;
        let hand = Hand::new(self.next_hand_id);
        self.next_hand_id += 1;
        self.hands.push(hand);
        let index = self.hands.len() - 1;
        self.use_chips(bet, index)?;
        Ok(index)
    }

    /// Splits the pair at `hand_index`. The new hand sits right after the
    /// original one and carries the same bet. Returns its index.
    pub(crate) fn split_hand(&mut self, hand_index: usize) -> Result<usize> {
        let bet = self.hands[hand_index].bet();
        self.check_balance(bet)?;
        let new_hand = self.hands[hand_index].split_off(self.next_hand_id);
        self.next_hand_id += 1;
        self.hands.insert(hand_index + 1, new_hand);
        self.use_chips(bet, hand_index + 1)?;
        Ok(hand_index + 1)
    }

    pub fn take_card(&mut self, card: Card, hand_index: usize) {
        self.hands[hand_index].take_card(card, false);
    }

    /// Clears every hand and returns their cards.
    pub fn remove_cards(&mut self) -> Vec<Card> {
        let cards = self
            .hands
            .iter_mut()
            .flat_map(|hand| hand.remove_cards())
            .collect();
        self.hands.clear();
        cards
    }

    /// Moves chips from the balance onto a hand. Betting more than the balance
    /// is an error, never a partial bet.
    pub fn use_chips(&mut self, amount: u64, hand_index: usize) -> Result<()> {
        self.check_balance(amount)?;
        self.hands[hand_index].add_bet(amount);
        self.balance -= amount;
        trace!(
            "player {} bets {} on hand {}, balance {}",
            self.id,
            amount,
            hand_index,
            self.balance
        );
        Ok(())
    }

    pub fn add_chips(&mut self, amount: u64) {
        self.balance += amount;
    }

    pub(crate) fn place_insurance(&mut self, amount: u64) -> Result<()> {
        self.check_balance(amount)?;
        self.balance -= amount;
        self.insurance += amount;
        Ok(())
    }

    pub(crate) fn take_insurance_bet(&mut self) -> u64 {
        std::mem::take(&mut self.insurance)
    }

    /// Records the outcome of a hand and pays it out. A surrendered hand gets
    /// half of its bet back.
    pub fn set_hand_winner(
        &mut self,
        hand_index: usize,
        winner: HandWinner,
        surrender: bool,
    ) -> HandResult {
        let hand = &self.hands[hand_index];
        let blackjack = hand.blackjack() && !hand.is_from_split();
        let bet = hand.bet();
        let hand_id = hand.id();
        let returned = match winner {
            HandWinner::Player if blackjack => bet + self.blackjack_payout.winnings(bet),
            HandWinner::Player => bet * 2,
            HandWinner::Push => bet,
            HandWinner::Dealer if surrender => bet / 2,
            HandWinner::Dealer => 0,
        };
        let result = HandResult {
            winner,
            surrender,
            blackjack,
            returned,
        };
        self.add_chips(returned);
        self.hand_winner.insert(hand_id, result);
        trace!(
            "player {} hand {} result {:?}{}",
            self.id,
            hand_id,
            winner,
            if blackjack { " (blackjack)" } else { "" }
        );
        result
    }

    pub fn attributes(&self) -> PlayerAttributes {
        PlayerAttributes {
            id: self.id,
            balance: self.balance,
            hands: self.hands.clone(),
            hand_winner: self.hand_winner.clone(),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn balance(&self) -> u64 {
        self.balance
    }

    pub(crate) fn set_balance(&mut self, balance: u64) {
        self.balance = balance;
    }

    pub fn strategy(&self) -> PlayerStrategy {
        self.strategy
    }

    pub fn is_npc(&self) -> bool {
        self.strategy.is_npc()
    }

    pub fn hands(&self) -> &[Hand] {
        &self.hands
    }

    pub(crate) fn hand_mut(&mut self, hand_index: usize) -> &mut Hand {
        &mut self.hands[hand_index]
    }

    pub fn hand_winner(&self, hand_id: usize) -> Option<HandResult> {
        self.hand_winner.get(&hand_id).copied()
    }

    pub(crate) fn new_round(&mut self) {
        self.hands.clear();
        self.hand_winner.clear();
        self.insurance = 0;
        self.next_hand_id = 0;
    }

    fn check_balance(&self, amount: u64) -> Result<()> {
        if self.balance < amount {
            return Err(Error::InsufficientBalance {
                player: self.id,
                balance: self.balance,
                amount,
            });
        }
        Ok(())
    }
}

/// The house. Plays a single hand with a fixed rule and keeps a bank so that
/// chips are conserved between the dealer and the players.
#[derive(Debug, Clone)]
pub struct Dealer {
    hand: Hand,
    bank: i64,
    hit_on_soft17: bool,
}

impl Dealer {
    pub fn new(hit_on_soft17: bool) -> Dealer {
        Dealer {
            hand: Hand::new(0),
            bank: 0,
            hit_on_soft17,
        }
    }

    pub fn hand(&self) -> &Hand {
        &self.hand
    }

    pub(crate) fn hand_mut(&mut self) -> &mut Hand {
        &mut self.hand
    }

    /// The first card dealt to the dealer. The hole card is put in front of
    /// it, so it stays the upcard after the hole card is turned over.
    pub fn upcard(&self) -> Option<&Card> {
        match self.hand.cards() {
            [] => None,
            [upcard] | [_, upcard, ..] => Some(upcard),
        }
    }

    pub fn hole_card(&self) -> Option<&Card> {
        self.hand.cards().iter().find(|card| !card.visible)
    }

    /// Whether the two dealt cards, hole card included, form a natural.
    pub fn has_blackjack(&self) -> bool {
        let cards = self.hand.cards();
        cards.len() == 2 && cards.iter().map(|card| card.value()).sum::<u8>() == 21
    }

    pub fn should_hit(&self) -> bool {
        let total = self.hand.card_total();
        total < 17 || (total == 17 && self.hand.is_soft() && self.hit_on_soft17)
    }

    pub fn bank(&self) -> i64 {
        self.bank
    }

    pub(crate) fn collect(&mut self, amount: u64) {
        self.bank += amount as i64;
    }

    pub(crate) fn pay(&mut self, amount: u64) {
        self.bank -= amount as i64;
    }

    pub(crate) fn remove_cards(&mut self) -> Vec<Card> {
        self.hand.remove_cards()
    }
}
