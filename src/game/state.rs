//! What players and spectators get to see of a match.
use super::{GameStatus, PlayerID};
use crate::market::{AcceptedBid, ProductionResult};
use crate::simulation::state::{FullState, TimestepState};
use chrono::{Days, NaiveDate};
use serde::Serialize;

/// The date corresponding to the first timestep of a match
const START_DATE: (i32, u32, u32) = (2010, 1, 1);

/// The calendar date corresponding to a timestep, where each timestep is one day
pub fn timestep_date(timestep: usize) -> NaiveDate {
    let (year, month, day) = START_DATE;
    let start = NaiveDate::from_ymd_opt(year, month, day).expect("Start date should be valid");
    start + Days::new(timestep as u64)
}

/// Everything a player needs to know when they join a match
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerFullState {
    /// The player's network
    #[serde(flatten)]
    pub simulation: FullState,
    /// The player's ID
    pub player_id: PlayerID,
    /// The player's display name
    pub name: String,
    /// The player's cash
    pub cash: f64,
    /// The stage the match has reached
    pub status: GameStatus,
    /// The number of timesteps played so far
    pub timestep: usize,
}

/// A player's view of the match at the end of a timestep
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerTimestepState {
    /// The parts of the player's network which change every timestep
    #[serde(flatten)]
    pub simulation: TimestepState,
    /// The player's cash
    pub cash: f64,
    /// Demand for power in the coming timestep (MWh)
    pub market_demand: f64,
    /// All bids from the last clearing of the market, in merit order
    pub accepted_bids: Vec<AcceptedBid>,
    /// Penalty charged to the player in the last timestep
    pub overflow_penalty: f64,
    /// Average price paid for power in the last timestep
    pub average_power_price: f64,
    /// What the player sold in the last timestep
    pub production_result: ProductionResult,
    /// Whether all timesteps have been played
    pub is_game_over: bool,
    /// The number of timesteps played so far
    pub timestep: usize,
    /// Everyone else taking part
    pub other_players: Vec<OtherPlayer>,
}

/// What a player can see of their opponents
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OtherPlayer {
    /// Display name
    pub name: String,
    /// The opponent's ID
    pub player_id: PlayerID,
    /// The opponent's cash
    pub cash: f64,
    /// Total water in the opponent's reservoirs (m³)
    pub total_water: f64,
}

/// One row of the scoreboard
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreboardEntry {
    /// The player's ID
    pub player_id: PlayerID,
    /// Display name
    pub name: String,
    /// The player's cash
    pub cash: f64,
    /// Total water in the player's reservoirs (m³)
    pub total_water: f64,
}

/// Players ranked by cash, for display to spectators and the administrator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scoreboard {
    /// The stage the match has reached
    pub status: GameStatus,
    /// The number of timesteps played so far
    pub timestep: usize,
    /// The length of the match, once it has started
    pub n_timesteps: Option<usize>,
    /// The in-game date
    pub date: NaiveDate,
    /// Players, richest first
    pub entries: Vec<ScoreboardEntry>,
}

impl Scoreboard {
    /// Create a scoreboard. `entries` should already be sorted.
    pub fn new(
        status: GameStatus,
        timestep: usize,
        n_timesteps: Option<usize>,
        entries: Vec<ScoreboardEntry>,
    ) -> Self {
        Self {
            status,
            timestep,
            n_timesteps,
            date: timestep_date(timestep),
            entries,
        }
    }
}
