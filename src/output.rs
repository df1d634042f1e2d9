//! The module responsible for writing output data to disk.
use crate::game::state::{Scoreboard, timestep_date};
use crate::game::{Game, PlayerID};
use crate::reservoir::ReservoirID;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};

/// The root folder in which model-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "hydro_trader_results";

/// The output file name for players' cash
const PLAYER_CASH_FILE_NAME: &str = "player_cash.csv";

/// The output file name for the results of clearing the market
const MARKET_RESULTS_FILE_NAME: &str = "market_results.csv";

/// The output file name for reservoir levels
const RESERVOIR_LEVELS_FILE_NAME: &str = "reservoir_levels.csv";

/// The output file name for the final scoreboard
const SCOREBOARD_FILE_NAME: &str = "scoreboard.json";

/// Get the output folder for the model in the specified directory
pub fn get_output_dir(model_dir: &Path) -> Result<PathBuf> {
    let model_dir = model_dir
        .canonicalize() // canonicalise in case the user has specified "."
        .context("Could not resolve path to model")?;

    let model_name = model_dir
        .file_name()
        .context("Model cannot be in root folder")?
        .to_str()
        .context("Invalid chars in model dir name")?;

    Ok([OUTPUT_DIRECTORY_ROOT, model_name].iter().collect())
}

/// Create a new output directory, if it doesn't already exist
pub fn create_output_directory(output_dir: &Path) -> Result<()> {
    if output_dir.is_dir() {
        return Ok(());
    }

    fs::create_dir_all(output_dir)
        .with_context(|| format!("Could not create output folder {}", output_dir.display()))?;

    Ok(())
}

/// Write the scoreboard to a JSON file in the output folder
pub fn write_scoreboard(output_path: &Path, scoreboard: &Scoreboard) -> Result<()> {
    let file_path = output_path.join(SCOREBOARD_FILE_NAME);
    let file = File::create(&file_path)
        .with_context(|| format!("Could not create {}", file_path.display()))?;
    serde_json::to_writer_pretty(file, scoreboard)?;

    Ok(())
}

/// Represents a row in the player cash CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct PlayerCashRow {
    timestep: usize,
    date: NaiveDate,
    player_id: PlayerID,
    cash: f64,
    production: f64,
    overflow_penalty: f64,
}

/// Represents a row in the market results CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct MarketResultRow {
    timestep: usize,
    player_id: PlayerID,
    volume: f64,
    earnings: f64,
    clearing_price: f64,
}

/// Represents a row in the reservoir levels CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct ReservoirLevelRow {
    timestep: usize,
    player_id: PlayerID,
    reservoir_id: ReservoirID,
    water_amount: f64,
    production: f64,
}

/// An object for writing the progress of a match to file
pub struct DataWriter {
    cash_writer: csv::Writer<File>,
    market_writer: csv::Writer<File>,
    reservoir_writer: csv::Writer<File>,
}

impl DataWriter {
    /// Open CSV files to write output data to
    ///
    /// # Arguments
    ///
    /// * `output_path` - Folder where files will be saved
    pub fn create(output_path: &Path) -> Result<Self> {
        let new_writer = |file_name| {
            let file_path = output_path.join(file_name);
            csv::Writer::from_path(file_path)
        };

        Ok(Self {
            cash_writer: new_writer(PLAYER_CASH_FILE_NAME)?,
            market_writer: new_writer(MARKET_RESULTS_FILE_NAME)?,
            reservoir_writer: new_writer(RESERVOIR_LEVELS_FILE_NAME)?,
        })
    }

    /// Write the results of the most recent timestep of a match
    pub fn write_timestep(&mut self, game: &Game) -> Result<()> {
        let timestep = game.timestep();
        for player_id in game.player_ids() {
            let player = game
                .player(player_id.as_str())
                .expect("Player ID should be valid");
            self.cash_writer.serialize(PlayerCashRow {
                timestep,
                date: timestep_date(timestep),
                player_id: player_id.clone(),
                cash: player.cash,
                production: player.production,
                overflow_penalty: player.overflow_penalty,
            })?;

            for reservoir in player.simulation.iter_reservoirs() {
                self.reservoir_writer.serialize(ReservoirLevelRow {
                    timestep,
                    player_id: player_id.clone(),
                    reservoir_id: reservoir.id().clone(),
                    water_amount: reservoir.water_amount(),
                    production: reservoir.current_production(),
                })?;
            }
        }

        let market = game.market();
        for bid in market.accepted_bids() {
            self.market_writer.serialize(MarketResultRow {
                timestep,
                player_id: bid.player_id.clone(),
                volume: bid.volume,
                earnings: bid.earnings,
                clearing_price: market.clearing_price(),
            })?;
        }

        Ok(())
    }

    /// Flush the underlying streams
    pub fn flush(&mut self) -> Result<()> {
        self.cash_writer.flush()?;
        self.market_writer.flush()?;
        self.reservoir_writer.flush()?;

        Ok(())
    }
}
