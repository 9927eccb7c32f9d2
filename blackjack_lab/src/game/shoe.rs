use log::debug;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use strum::IntoEnumIterator;

use crate::{Card, Rank, Suit};

pub const CARDS_PER_DECK: usize = 52;

/// Represents a shoe in the real world. The random generator is owned by the
/// shoe so that a game seeded once is reproducible.
#[derive(Debug, Clone)]
pub struct Shoe {
    number_of_decks: u8,
    cut_card_index: usize,
    cards: Vec<Card>,
    current_index: usize,
    rng: ChaCha8Rng,
}

impl Shoe {
    /// Creates a new shoe with ordered cards. Call `shuffle` before dealing.
    pub fn new(number_of_decks: u8, cut_card_proportion: f64, rng: ChaCha8Rng) -> Shoe {
        let mut cards = Vec::with_capacity(number_of_decks as usize * CARDS_PER_DECK);
        for _ in 0..number_of_decks {
            for suit in Suit::iter() {
                for rank in Rank::iter() {
                    cards.push(Card::new(rank, suit));
                }
            }
        }
        let cut_card_index = (cut_card_proportion * cards.len() as f64) as usize;
        Shoe {
            number_of_decks,
            cut_card_index,
            cards,
            current_index: 0,
            rng,
        }
    }

    /// Creates a shoe that deals the given cards in order. The cut card sits
    /// behind the last card, so the order survives until the shoe runs out.
    pub fn stacked(cards: Vec<Card>) -> Shoe {
        let number_of_decks = cards.len().div_ceil(CARDS_PER_DECK).max(1) as u8;
        Shoe {
            number_of_decks,
            cut_card_index: cards.len(),
            cards,
            current_index: 0,
            rng: ChaCha8Rng::seed_from_u64(0),
        }
    }

    /// Returns the dealt cards back into the shoe and shuffles.
    pub fn shuffle(&mut self) {
        self.cards.shuffle(&mut self.rng);
        self.current_index = 0;
        debug!("shuffled a shoe of {} cards", self.cards.len());
    }

    /// Shuffles the discards back in when the shoe runs dry in the middle of
    /// a round. The cards in `in_play` stay on the table and count as dealt.
    pub fn shuffle_discards(&mut self, in_play: &[Card]) {
        let mut discards: Vec<Card> = self.cards.drain(..self.current_index).collect();
        let mut on_table = Vec::with_capacity(self.cards.len() + discards.len());
        for card in in_play {
            let position = discards
                .iter()
                .position(|discard| discard.rank == card.rank && discard.suit == card.suit);
            if let Some(position) = position {
                on_table.push(discards.swap_remove(position));
            }
        }
        discards.shuffle(&mut self.rng);
        self.current_index = on_table.len();
        debug!(
            "shuffled {} discards back in, {} cards on the table",
            discards.len(),
            on_table.len()
        );
        on_table.append(&mut discards);
        on_table.append(&mut self.cards);
        self.cards = on_table;
    }

    /// Deals a card if the shoe is not empty. Returns None if empty.
    pub fn deal_card(&mut self) -> Option<Card> {
        let card = self.cards.get(self.current_index).copied()?;
        self.current_index += 1;
        Some(card)
    }

    /// Checks if the cut card has been reached.
    pub fn reached_cut_card(&self) -> bool {
        self.current_index >= self.cut_card_index
    }

    pub fn number_of_decks(&self) -> u8 {
        self.number_of_decks
    }

    pub fn cards_dealt(&self) -> usize {
        self.current_index
    }

    pub fn cards_remaining(&self) -> usize {
        self.cards.len() - self.current_index
    }

    pub fn preview_next_few_cards(&self, number: usize) -> &[Card] {
        let end = (self.current_index + number).min(self.cards.len());
        &self.cards[self.current_index..end]
    }
}
