pub mod hand;
pub mod player;
pub mod shoe;

use blackjack_lab_macros::allowed_phase;
use log::{debug, trace};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use self::hand::{Hand, HandStatus};
use self::player::{Dealer, HandResult, HandWinner, Player};
use self::shoe::Shoe;
use crate::strategy::{HiLoDeviationChecker, PlayerInput, TableView};
use crate::{Card, Decision, Error, PlayerStrategy, Result, Rule};

pub const MAX_PLAYERS: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GamePhase {
    PlaceBets,
    DealInitialCards,
    DealerPeek,
    PlayHands,
    DealerPlay,
    Settle,
    RoundOver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Seat {
    Dealer,
    Player(usize),
}

/// Observer of a running game. Called synchronously; it only gets shared
/// references and cannot change the round.
pub trait GameEventHandler {
    fn on_shuffle(&mut self, _shoe: &Shoe) {}
    fn on_bet_placed(&mut self, _player: usize, _bet: u64) {}
    fn on_hand_changed(&mut self, _seat: Seat, _hand: &Hand) {}
    fn on_decision(&mut self, _player: usize, _decision: Decision) {}
    fn on_hand_settled(&mut self, _player: usize, _hand: &Hand, _result: HandResult) {}
    fn on_round_settled(&mut self, _summary: &RoundSummary) {}
}

impl GameEventHandler for () {}

/// What one seat got out of a round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeatSummary {
    pub player: usize,
    pub balance_before: u64,
    pub balance_after: u64,
    /// Main bets, doubles, splits and insurance.
    pub wagered: u64,
    pub hands_won: u32,
    pub hands_lost: u32,
    pub hands_pushed: u32,
}

impl SeatSummary {
    pub fn delta(&self) -> i64 {
        self.balance_after as i64 - self.balance_before as i64
    }

    pub fn hands_played(&self) -> u32 {
        self.hands_won + self.hands_lost + self.hands_pushed
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoundSummary {
    pub seats: Vec<SeatSummary>,
    pub dealer_total: u8,
    pub dealer_blackjack: bool,
}

/// One blackjack table: a shoe, a dealer and up to `MAX_PLAYERS` seats. A round
/// goes through the phases of `GamePhase` in order and every public operation
/// checks that it is called in its phase.
pub struct Game {
    rule: Rule,
    phase: GamePhase,
    shoe: Shoe,
    counter: HiLoDeviationChecker,
    players: Vec<Player>,
    dealer: Dealer,
    /// Player and hand index of the hand to act.
    active: Option<(usize, usize)>,
    balances_before: Vec<u64>,
    wagered: Vec<u64>,
}

impl Game {
    /// Creates a table with a freshly shuffled shoe.
    pub fn new(
        rule: Rule,
        strategies: &[PlayerStrategy],
        starting_balance: u64,
        rng: ChaCha8Rng,
    ) -> Result<Game> {
        let mut shoe = Shoe::new(rule.number_of_decks, rule.cut_card_proportion, rng);
        shoe.shuffle();
        Game::with_shoe(rule, strategies, starting_balance, shoe)
    }

    /// Creates a table dealing from `shoe` as it is.
    pub fn with_shoe(
        rule: Rule,
        strategies: &[PlayerStrategy],
        starting_balance: u64,
        shoe: Shoe,
    ) -> Result<Game> {
        rule.validate()?;
        if strategies.is_empty() || strategies.len() > MAX_PLAYERS {
            return Err(Error::InvalidConfig(format!(
                "number of players must be in 1..={}, got {}",
                MAX_PLAYERS,
                strategies.len()
            )));
        }
        let players: Vec<Player> = strategies
            .iter()
            .enumerate()
            .map(|(id, strategy)| {
                Player::new(id, starting_balance, *strategy, rule.payout_blackjack)
            })
            .collect();
        Ok(Game {
            counter: HiLoDeviationChecker::new(shoe.number_of_decks()),
            dealer: Dealer::new(rule.dealer_hit_on_soft17),
            phase: GamePhase::PlaceBets,
            active: None,
            balances_before: vec![starting_balance; players.len()],
            wagered: vec![0; players.len()],
            rule,
            shoe,
            players,
        })
    }

    /// Plays a whole round: every seat bets `bet`, decisions come from each
    /// seat's strategy (and from `input` for `UserInput` seats).
    #[allowed_phase(PlaceBets)]
    pub fn play_round<I, H>(&mut self, bet: u64, input: &mut I, handler: &mut H) -> Result<RoundSummary>
    where
        I: PlayerInput + ?Sized,
        H: GameEventHandler + ?Sized,
    {
        for player in 0..self.players.len() {
            self.place_bet(player, bet)?;
            handler.on_bet_placed(player, bet);
        }

        self.deal_initial_cards()?;
        for player in &self.players {
            for hand in player.hands() {
                handler.on_hand_changed(Seat::Player(player.id()), hand);
            }
        }
        handler.on_hand_changed(Seat::Dealer, self.dealer.hand());

        if self.insurance_offered() {
            for player in 0..self.players.len() {
                let strategy = self.players[player].strategy();
                let take = strategy.take_insurance(&self.table_view(player, 0)?, input)?;
                if take {
                    self.buy_insurance(player)?;
                }
            }
        }

        if !self.dealer_peeks()? {
            while let Some((player, hand_index)) = self.active {
                let legal = self.legal_actions()?;
                let strategy = self.players[player].strategy();
                let decision = strategy.decide(&self.table_view(player, hand_index)?, &legal, input)?;
                handler.on_decision(player, decision);
                self.play(decision)?;
                for hand in self.players[player].hands() {
                    handler.on_hand_changed(Seat::Player(player), hand);
                }
            }
            self.dealer_plays()?;
        }
        handler.on_hand_changed(Seat::Dealer, self.dealer.hand());

        let summary = self.settle()?;
        for player in &self.players {
            for hand in player.hands() {
                if let Some(result) = player.hand_winner(hand.id()) {
                    handler.on_hand_settled(player.id(), hand, result);
                }
            }
        }
        handler.on_round_settled(&summary);

        if self.finish_round()? {
            handler.on_shuffle(&self.shoe);
        }
        Ok(summary)
    }

    /// Opens a hand for `player` with `bet` taken from their balance. Returns
    /// the index of the hand.
    #[allowed_phase(PlaceBets)]
    pub fn place_bet(&mut self, player: usize, bet: u64) -> Result<usize> {
        let seat = self.players.get_mut(player).ok_or(Error::NoSuchSeat(player))?;
        let hand_index = seat.add_hand(bet)?;
        self.wagered[player] += bet;
        Ok(hand_index)
    }

    /// Two cards to every hand, one face up and one face down to the dealer.
    #[allowed_phase(PlaceBets)]
    pub fn deal_initial_cards(&mut self) -> Result<()> {
        self.phase = GamePhase::DealInitialCards;
        for round in 0..2 {
            for player in 0..self.players.len() {
                for hand_index in 0..self.players[player].hands().len() {
                    let card = self.draw(true)?;
                    self.players[player].take_card(card, hand_index);
                }
            }
            if round == 0 {
                let card = self.draw(true)?;
                self.dealer.hand_mut().take_card(card, false);
            } else {
                let card = self.draw(false)?;
                self.dealer.hand_mut().take_card(card, true);
            }
        }
        self.phase = GamePhase::DealerPeek;
        Ok(())
    }

    pub fn insurance_offered(&self) -> bool {
        self.phase == GamePhase::DealerPeek
            && self.rule.allow_insurance
            && self.dealer.upcard().map_or(false, Card::is_ace)
    }

    /// Side bet of half the player's stake that the dealer has a natural.
    #[allowed_phase(DealerPeek)]
    pub fn buy_insurance(&mut self, player: usize) -> Result<()> {
        if !self.insurance_offered() {
            return Err(Error::InsuranceNotOffered);
        }
        let seat = self.players.get_mut(player).ok_or(Error::NoSuchSeat(player))?;
        let amount = seat.hands().iter().map(Hand::bet).sum::<u64>() / 2;
        seat.place_insurance(amount)?;
        self.wagered[player] += amount;
        Ok(())
    }

    /// With an ace or ten up the dealer checks the hole card. Returns true
    /// when the dealer has a natural, in which case the round goes straight
    /// to settlement. Insurance bets are resolved here.
    #[allowed_phase(DealerPeek)]
    pub fn dealer_peeks(&mut self) -> Result<bool> {
        let peeks = self.dealer.upcard().map_or(false, |card| card.value() >= 10);
        let natural = peeks && self.dealer.has_blackjack();

        for player in &mut self.players {
            let insurance = player.take_insurance_bet();
            if insurance == 0 {
                continue;
            }
            self.dealer.collect(insurance);
            if natural {
                let returned = insurance * (1 + self.rule.payout_insurance);
                self.dealer.pay(returned);
                player.add_chips(returned);
            }
        }

        if natural {
            debug!("dealer peeks a natural");
            self.reveal_dealer();
            self.phase = GamePhase::Settle;
            return Ok(true);
        }

        for player in &mut self.players {
            for hand_index in 0..player.hands().len() {
                let hand = player.hand_mut(hand_index);
                if hand.blackjack() {
                    hand.set_status(HandStatus::Stood);
                }
            }
        }
        self.phase = GamePhase::PlayHands;
        self.advance();
        Ok(false)
    }

    /// The hand to act, as player and hand index.
    pub fn active_hand(&self) -> Option<(usize, usize)> {
        self.active
    }

    #[allowed_phase(PlayHands)]
    pub fn legal_actions(&self) -> Result<Vec<Decision>> {
        let (player, hand_index) = self.active_or_err(Decision::Stand)?;
        let player = &self.players[player];
        let hand = &player.hands()[hand_index];

        let mut legal = vec![Decision::Hit, Decision::Stand];
        let untouched = hand.cards().len() == 2 && hand.decisions() == 0;
        if untouched && (!hand.is_from_split() || self.rule.allow_das) {
            legal.push(Decision::Double);
        }
        if hand.has_pairs() && player.hands().len() < self.rule.max_split_hands as usize {
            legal.push(Decision::Split);
        }
        if self.rule.allow_late_surrender && untouched && !hand.is_from_split() {
            legal.push(Decision::Surrender);
        }
        Ok(legal)
    }

    #[allowed_phase(PlayHands)]
    pub fn play(&mut self, decision: Decision) -> Result<()> {
        match decision {
            Decision::Hit => self.play_hit(),
            Decision::Stand => self.play_stand(),
            Decision::Double => self.play_double(),
            Decision::Split => self.play_split(),
            Decision::Surrender => self.play_surrender(),
        }
    }

    #[allowed_phase(PlayHands)]
    pub fn play_hit(&mut self) -> Result<()> {
        let (player, hand_index) = self.check_legal(Decision::Hit)?;
        let card = self.draw(true)?;
        let hand = self.players[player].hand_mut(hand_index);
        hand.record_decision();
        hand.take_card(card, false);
        Self::stand_if_done(hand);
        self.advance();
        Ok(())
    }

    #[allowed_phase(PlayHands)]
    pub fn play_stand(&mut self) -> Result<()> {
        let (player, hand_index) = self.check_legal(Decision::Stand)?;
        let hand = self.players[player].hand_mut(hand_index);
        hand.record_decision();
        hand.set_status(HandStatus::Stood);
        self.advance();
        Ok(())
    }

    /// Doubles the bet and draws exactly one card.
    #[allowed_phase(PlayHands)]
    pub fn play_double(&mut self) -> Result<()> {
        let (player, hand_index) = self.check_legal(Decision::Double)?;
        let bet = self.players[player].hands()[hand_index].bet();
        self.players[player].use_chips(bet, hand_index)?;
        self.wagered[player] += bet;

        let card = self.draw(true)?;
        let hand = self.players[player].hand_mut(hand_index);
        hand.record_decision();
        hand.mark_doubled();
        hand.take_card(card, false);
        if hand.busted() {
            hand.set_status(HandStatus::Busted);
        } else {
            hand.set_status(HandStatus::Stood);
        }
        self.advance();
        Ok(())
    }

    /// Splits the pair into two hands with equal bets. Each hand gets its
    /// second card right away.
    #[allowed_phase(PlayHands)]
    pub fn play_split(&mut self) -> Result<()> {
        let (player, hand_index) = self.check_legal(Decision::Split)?;
        let bet = self.players[player].hands()[hand_index].bet();
        let new_index = self.players[player].split_hand(hand_index)?;
        self.wagered[player] += bet;

        let split_aces = self.players[player].hands()[hand_index].cards()[0].is_ace();
        for index in [hand_index, new_index] {
            let card = self.draw(true)?;
            let hand = self.players[player].hand_mut(index);
            hand.take_card(card, false);
            if split_aces && self.rule.split_aces_one_card {
                hand.set_status(HandStatus::Stood);
            } else {
                Self::stand_if_done(hand);
            }
        }
        self.advance();
        Ok(())
    }

    /// Gives up the hand for half of its bet. Settled right away.
    #[allowed_phase(PlayHands)]
    pub fn play_surrender(&mut self) -> Result<()> {
        let (player, hand_index) = self.check_legal(Decision::Surrender)?;
        let hand = self.players[player].hand_mut(hand_index);
        hand.record_decision();
        hand.set_status(HandStatus::Surrendered);
        let bet = hand.bet();
        let result = self.players[player].set_hand_winner(hand_index, HandWinner::Dealer, true);
        self.dealer.collect(bet);
        self.dealer.pay(result.returned);
        self.advance();
        Ok(())
    }

    /// The dealer turns the hole card and draws to the house rule. The dealer
    /// does not draw when no hand is left to beat.
    #[allowed_phase(DealerPlay)]
    pub fn dealer_plays(&mut self) -> Result<()> {
        self.reveal_dealer();
        let live_hands = self.players.iter().flat_map(Player::hands).any(|hand| {
            hand.status() == HandStatus::Stood && !(hand.blackjack() && !hand.is_from_split())
        });
        if live_hands {
            while self.dealer.should_hit() {
                let card = self.draw(true)?;
                self.dealer.hand_mut().take_card(card, false);
            }
        }
        trace!("dealer ends with {}", self.dealer.hand().card_total());
        self.phase = GamePhase::Settle;
        Ok(())
    }

    /// Pays every hand that was not surrendered.
    #[allowed_phase(Settle)]
    pub fn settle(&mut self) -> Result<RoundSummary> {
        let dealer_blackjack = self.dealer.has_blackjack();
        let dealer_total = self.dealer.hand().card_total();
        let dealer_busted = self.dealer.hand().busted();

        let mut seats = Vec::with_capacity(self.players.len());
        for player in &mut self.players {
            for hand_index in 0..player.hands().len() {
                let hand = &player.hands()[hand_index];
                if hand.status() == HandStatus::Surrendered {
                    continue;
                }
                let natural = hand.blackjack() && !hand.is_from_split();
                let total = hand.card_total();
                let winner = if hand.busted() {
                    HandWinner::Dealer
                } else if natural {
                    if dealer_blackjack {
                        HandWinner::Push
                    } else {
                        HandWinner::Player
                    }
                } else if dealer_blackjack {
                    HandWinner::Dealer
                } else if dealer_busted || total > dealer_total {
                    HandWinner::Player
                } else if total < dealer_total {
                    HandWinner::Dealer
                } else {
                    HandWinner::Push
                };
                let bet = hand.bet();
                let result = player.set_hand_winner(hand_index, winner, false);
                self.dealer.collect(bet);
                self.dealer.pay(result.returned);
            }

            let mut seat = SeatSummary {
                player: player.id(),
                balance_before: self.balances_before[player.id()],
                balance_after: player.balance(),
                wagered: self.wagered[player.id()],
                ..Default::default()
            };
            for hand in player.hands() {
                match player.hand_winner(hand.id()).map(|result| result.winner) {
                    Some(HandWinner::Player) => seat.hands_won += 1,
                    Some(HandWinner::Dealer) => seat.hands_lost += 1,
                    Some(HandWinner::Push) => seat.hands_pushed += 1,
                    None => {}
                }
            }
            debug!(
                "player {} settles {:+} on {} hands",
                seat.player,
                seat.delta(),
                seat.hands_played()
            );
            seats.push(seat);
        }

        self.phase = GamePhase::RoundOver;
        Ok(RoundSummary {
            seats,
            dealer_total,
            dealer_blackjack,
        })
    }

    /// Clears the table for the next round. Returns true when the cut card
    /// came out and the shoe was reshuffled.
    #[allowed_phase(RoundOver)]
    pub fn finish_round(&mut self) -> Result<bool> {
        for player in &mut self.players {
            player.new_round();
        }
        self.dealer.remove_cards();
        self.active = None;
        self.start_next_round();

        let shuffled = self.shoe.reached_cut_card();
        if shuffled {
            self.start_new_shoe()?;
        }
        Ok(shuffled)
    }

    /// Shuffles every card back into the shoe and resets the count.
    #[allowed_phase(PlaceBets)]
    pub fn start_new_shoe(&mut self) -> Result<()> {
        self.shoe.shuffle();
        self.counter.reset();
        Ok(())
    }

    /// Sets every seat's balance, e.g. to measure rounds independently.
    #[allowed_phase(PlaceBets)]
    pub fn reset_bankrolls(&mut self, balance: u64) -> Result<()> {
        for player in &mut self.players {
            player.set_balance(balance);
        }
        self.start_next_round();
        Ok(())
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn dealer(&self) -> &Dealer {
        &self.dealer
    }

    pub fn counter(&self) -> &HiLoDeviationChecker {
        &self.counter
    }

    pub fn shoe(&self) -> &Shoe {
        &self.shoe
    }

    /// What the player sees when deciding on one of their hands.
    pub fn table_view(&self, player: usize, hand_index: usize) -> Result<TableView<'_>> {
        let seat = self.players.get(player).ok_or(Error::NoSuchSeat(player))?;
        let hand = seat.hands().get(hand_index).ok_or(Error::WrongPhase {
            operation: "table_view",
            phase: self.phase,
        })?;
        let dealer_upcard = self.dealer.upcard().copied().ok_or(Error::WrongPhase {
            operation: "table_view",
            phase: self.phase,
        })?;
        Ok(TableView {
            hand,
            dealer_upcard,
            counter: &self.counter,
            balance: seat.balance(),
        })
    }

    fn draw(&mut self, face_up: bool) -> Result<Card> {
        if self.shoe.cards_remaining() == 0 {
            self.shuffle_discards();
        }
        let card = self.shoe.deal_card().ok_or(Error::ShoeExhausted)?;
        if face_up {
            self.counter.observe(&card);
            Ok(card)
        } else {
            Ok(card.face_down())
        }
    }

    /// Puts every card not on the table back into play. The count restarts
    /// from the cards still showing.
    fn shuffle_discards(&mut self) {
        let in_play: Vec<Card> = self
            .players
            .iter()
            .flat_map(|player| player.hands())
            .chain(std::iter::once(self.dealer.hand()))
            .flat_map(|hand| hand.cards())
            .copied()
            .collect();
        self.shoe.shuffle_discards(&in_play);
        self.counter.reset();
        for card in &in_play {
            self.counter.observe(card);
        }
    }

    fn reveal_dealer(&mut self) {
        for card in self.dealer.hand_mut().reveal() {
            self.counter.observe(&card);
        }
    }

    fn stand_if_done(hand: &mut Hand) {
        if hand.busted() {
            hand.set_status(HandStatus::Busted);
        } else if hand.card_total() == 21 {
            hand.set_status(HandStatus::Stood);
        }
    }

    /// Moves to the first hand still acting, or to the dealer when none is
    /// left.
    fn advance(&mut self) {
        self.active = self.players.iter().enumerate().find_map(|(player, seat)| {
            seat.hands()
                .iter()
                .position(Hand::is_acting)
                .map(|hand_index| (player, hand_index))
        });
        if self.active.is_none() {
            self.phase = GamePhase::DealerPlay;
        }
    }

    fn active_or_err(&self, action: Decision) -> Result<(usize, usize)> {
        self.active.ok_or(Error::IllegalAction {
            action,
            reason: "no hand is acting",
        })
    }

    fn check_legal(&self, action: Decision) -> Result<(usize, usize)> {
        let active = self.active_or_err(action)?;
        if !self.legal_actions()?.contains(&action) {
            return Err(Error::IllegalAction {
                action,
                reason: "not allowed on the acting hand",
            });
        }
        Ok(active)
    }

    fn start_next_round(&mut self) {
        self.phase = GamePhase::PlaceBets;
        self.balances_before = self.players.iter().map(Player::balance).collect();
        self.wagered.iter_mut().for_each(|wagered| *wagered = 0);
    }
}
