//! A match between several players, each with their own copy of the same network.
//!
//! A [`Game`] moves from [`GameStatus::NotStarted`] to [`GameStatus::Running`] when it is started
//! and to [`GameStatus::Over`] once the requested number of timesteps has been played. The only
//! way back is to build a new game from the model.
use crate::id::define_id_type;
use crate::market::PowerMarket;
use crate::model::Model;
use crate::simulation::Simulation;
use indexmap::{IndexMap, IndexSet};
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

pub mod headless;
pub mod state;
use state::{OtherPlayer, PlayerFullState, PlayerTimestepState, Scoreboard, ScoreboardEntry};

define_id_type! {PlayerID}

/// A command from a player or administrator which could not be carried out.
///
/// These errors are reported back to whoever issued the command. The state of the match is left
/// untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// No player with this ID has joined the match
    #[error("Unknown player: {0}")]
    UnknownPlayer(PlayerID),
    /// A player with this ID is already taking part
    #[error("Player {0} has already joined")]
    DuplicatePlayer(PlayerID),
    /// The command was meant for a different match
    #[error("Wrong match ID: {0}")]
    WrongMatch(String),
    /// The password given was wrong
    #[error("Invalid credentials")]
    BadCredential,
    /// The match is over, so no new players can join
    #[error("The match is not accepting new players")]
    NotAcceptingPlayers,
    /// The match has already been started
    #[error("The match has already started")]
    AlreadyStarted,
    /// Timesteps can only be played while the match is running
    #[error("The match is not running")]
    NotRunning,
    /// The ID is used by the market for imported power
    #[error("Player ID {0} is reserved for imported power")]
    ReservedPlayerID(PlayerID),
    /// A match must last for at least one timestep
    #[error("Number of timesteps must be greater than zero")]
    InvalidTimesteps,
    /// The match was reset while waiting for the next timestep
    #[error("The match has been reset")]
    MatchReset,
    /// The server running the match has shut down
    #[error("The match server has stopped")]
    ServerStopped,
}

/// The stage a match has reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    /// Players can join, but timesteps are not yet being played
    NotStarted,
    /// Timesteps are being played
    Running,
    /// All timesteps have been played
    Over,
}

/// A player taking part in a match
#[derive(Debug, Clone)]
pub struct Player {
    /// Display name
    pub name: String,
    /// The player's own copy of the network
    pub simulation: Simulation,
    /// Cash earned so far, less any penalties
    pub cash: f64,
    /// Reservoirs which should produce power in the next timestep
    planned_production: IndexSet<String>,
    /// The price at which to bid power in the next timestep
    price: f64,
    /// Power produced in the last timestep (MWh)
    pub production: f64,
    /// Penalty charged in the last timestep
    pub overflow_penalty: f64,
}

impl Player {
    fn new(name: &str, simulation: Simulation) -> Self {
        Self {
            name: name.to_string(),
            simulation,
            cash: 0.0,
            planned_production: IndexSet::new(),
            price: 0.0,
            production: 0.0,
            overflow_penalty: 0.0,
        }
    }

    /// Reservoirs which should produce power in the next timestep
    pub fn planned_production(&self) -> &IndexSet<String> {
        &self.planned_production
    }

    /// The price at which to bid power in the next timestep
    pub fn price(&self) -> f64 {
        self.price
    }
}

/// A single match
#[derive(Debug, Clone)]
pub struct Game {
    model: Arc<Model>,
    players: IndexMap<PlayerID, Player>,
    market: PowerMarket,
    timestep: usize,
    n_timesteps: Option<usize>,
    market_demand: f64,
    average_power_price: f64,
}

impl Game {
    /// Create a new match with no players
    pub fn new(model: Arc<Model>) -> Self {
        let market = PowerMarket::new(
            model.power_demand.clone(),
            model.parameters.market.clone(),
        );

        Self {
            model,
            players: IndexMap::new(),
            market,
            timestep: 0,
            n_timesteps: None,
            market_demand: 0.0,
            average_power_price: 0.0,
        }
    }

    /// The model the match was built from
    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    /// The market shared by all players
    pub fn market(&self) -> &PowerMarket {
        &self.market
    }

    /// The number of timesteps played so far
    pub fn timestep(&self) -> usize {
        self.timestep
    }

    /// The length of the match, once it has been started
    pub fn n_timesteps(&self) -> Option<usize> {
        self.n_timesteps
    }

    /// The stage the match has reached
    pub fn status(&self) -> GameStatus {
        if self.n_timesteps.is_none() {
            GameStatus::NotStarted
        } else if self.is_game_over() {
            GameStatus::Over
        } else {
            GameStatus::Running
        }
    }

    /// Whether all timesteps have been played
    pub fn is_game_over(&self) -> bool {
        self.n_timesteps.is_some_and(|n| self.timestep >= n)
    }

    /// Whether new players may join
    pub fn is_accepting_players(&self) -> bool {
        self.status() != GameStatus::Over
    }

    /// Add a new player, with their own copy of the network and no cash
    pub fn add_player(&mut self, player_id: PlayerID, name: &str) -> Result<(), CommandError> {
        if !self.is_accepting_players() {
            return Err(CommandError::NotAcceptingPlayers);
        }
        if self.players.contains_key(&player_id) {
            return Err(CommandError::DuplicatePlayer(player_id));
        }
        if self.is_reserved_player_id(player_id.as_str()) {
            return Err(CommandError::ReservedPlayerID(player_id));
        }

        info!("Player {player_id} ({name}) joined the match");
        let player = Player::new(name, Simulation::new(&self.model));
        self.players.insert(player_id, player);
        self.market.add_player();

        Ok(())
    }

    /// Whether an ID belongs to the market's import backstop rather than a player
    pub fn is_reserved_player_id(&self, player_id: &str) -> bool {
        self.model
            .parameters
            .market
            .import
            .as_ref()
            .is_some_and(|import| import.player_id.as_str() == player_id)
    }

    /// Start the match
    ///
    /// # Arguments
    ///
    /// * `n_timesteps` - The number of timesteps to play
    pub fn start(&mut self, n_timesteps: usize) -> Result<(), CommandError> {
        if n_timesteps == 0 {
            return Err(CommandError::InvalidTimesteps);
        }
        if self.n_timesteps.is_some() {
            return Err(CommandError::AlreadyStarted);
        }

        if let Some(available) = self
            .model
            .weather_timesteps()
            .filter(|&available| available < n_timesteps)
        {
            warn!(
                "There is only weather data for {available} timesteps. There will be no rain or \
                 snowmelt after that."
            );
        }

        info!(
            "Starting match with {} players for {n_timesteps} timesteps",
            self.players.len()
        );
        self.n_timesteps = Some(n_timesteps);
        self.market_demand = self.market.production_demand();

        Ok(())
    }

    /// Whether a player has joined the match
    pub fn has_player(&self, player_id: &str) -> bool {
        self.players.contains_key(player_id)
    }

    /// Get a player by ID
    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.players.get(player_id)
    }

    /// The IDs of all players, in the order in which they joined
    pub fn player_ids(&self) -> impl Iterator<Item = &PlayerID> {
        self.players.keys()
    }

    /// A player's cash
    pub fn cash(&self, player_id: &str) -> Option<f64> {
        self.player(player_id).map(|player| player.cash)
    }

    fn player_mut(&mut self, player_id: &str) -> Result<&mut Player, CommandError> {
        self.players
            .get_mut(player_id)
            .ok_or_else(|| CommandError::UnknownPlayer(player_id.into()))
    }

    /// Choose which reservoirs a player will produce power from in the next timestep and the price
    /// at which the power will be bid.
    ///
    /// Any previous plan for the timestep is replaced. Reservoirs which don't exist are ignored
    /// when the timestep is played.
    pub fn set_production<I, S>(
        &mut self,
        player_id: &str,
        reservoir_ids: I,
        price: f64,
    ) -> Result<(), CommandError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let player = self.player_mut(player_id)?;
        player.planned_production = reservoir_ids.into_iter().map(Into::into).collect();
        player.price = price;

        Ok(())
    }

    /// Play a single timestep.
    ///
    /// Each player's network is advanced according to their plan and whatever power they
    /// produce is bid into the market. Once every player has been processed, the market is
    /// cleared and earnings are paid out. Plans only apply to one timestep, so players who don't
    /// submit a new plan will produce nothing in the next timestep.
    ///
    /// Nothing happens unless the match is running.
    pub fn process_timestep(&mut self) -> Result<(), CommandError> {
        if self.status() != GameStatus::Running {
            return Err(CommandError::NotRunning);
        }

        let penalty_conversion_rate = self.model.parameters.game.penalty_conversion_rate;
        for (player_id, player) in &mut self.players {
            player.simulation.clear_production();
            for reservoir_id in &player.planned_production {
                player.simulation.set_production(reservoir_id, true);
            }

            let output = player.simulation.simulate_day();
            player.production = output.production;
            player.overflow_penalty = 0.0;
            if output.overflow_penalty > 0.0 {
                player.overflow_penalty =
                    (output.overflow_penalty * penalty_conversion_rate).max(0.0);
                player.cash -= player.overflow_penalty;
                warn!(
                    "Player {player_id} penalised {} for exceeding the maximum flow of a river",
                    player.overflow_penalty
                );
            }

            if output.production > 0.0 {
                self.market
                    .add_player_bid(player_id.clone(), output.production, player.price);
            }

            debug!(
                "Timestep {}: player {player_id} produced {} MWh",
                self.timestep, output.production
            );
        }

        self.average_power_price = self.market.process_bids();
        for (player_id, player) in &mut self.players {
            player.cash += self.market.result_for(player_id.as_str()).earnings;
            player.planned_production.clear();
            player.price = 0.0;
        }

        self.market.advance();
        self.timestep += 1;
        self.market_demand = self.market.production_demand();

        if self.is_game_over() {
            info!("Match over after {} timesteps", self.timestep);
        }

        Ok(())
    }

    /// Everything a player needs to know when they join
    pub fn full_state(&self, player_id: &str) -> Result<PlayerFullState, CommandError> {
        let (player_id, player) = self
            .players
            .get_key_value(player_id)
            .ok_or_else(|| CommandError::UnknownPlayer(player_id.into()))?;

        Ok(PlayerFullState {
            simulation: player.simulation.full_state(),
            player_id: player_id.clone(),
            name: player.name.clone(),
            cash: player.cash,
            status: self.status(),
            timestep: self.timestep,
        })
    }

    /// A player's view of the match at the end of a timestep.
    ///
    /// Other players are only visible by their name, cash and total water.
    pub fn timestep_state(&self, player_id: &str) -> Result<PlayerTimestepState, CommandError> {
        let player = self
            .player(player_id)
            .ok_or_else(|| CommandError::UnknownPlayer(player_id.into()))?;

        let other_players = self
            .players
            .iter()
            .filter(|(id, _)| id.as_str() != player_id)
            .map(|(id, other)| OtherPlayer {
                name: other.name.clone(),
                player_id: id.clone(),
                cash: other.cash,
                total_water: other.simulation.total_water(),
            })
            .collect();

        Ok(PlayerTimestepState {
            simulation: player.simulation.timestep_state(),
            cash: player.cash,
            market_demand: self.market_demand,
            accepted_bids: self.market.accepted_bids().to_vec(),
            overflow_penalty: player.overflow_penalty,
            average_power_price: self.average_power_price,
            production_result: self.market.result_for(player_id),
            is_game_over: self.is_game_over(),
            timestep: self.timestep,
            other_players,
        })
    }

    /// Players ranked by cash, richest first
    pub fn scoreboard(&self) -> Scoreboard {
        let mut entries: Vec<_> = self
            .players
            .iter()
            .map(|(id, player)| ScoreboardEntry {
                player_id: id.clone(),
                name: player.name.clone(),
                cash: player.cash,
                total_water: player.simulation.total_water(),
            })
            .collect();
        entries.sort_by(|a, b| b.cash.total_cmp(&a.cash));

        Scoreboard::new(self.status(), self.timestep, self.n_timesteps, entries)
    }
}
