//! Defines the `ModelParameters` struct, which represents the contents of `model.toml`.
use crate::game::PlayerID;
use crate::input::{check_non_negative, input_err_msg, read_toml};
use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use std::path::Path;

const MODEL_PARAMETERS_FILE_NAME: &str = "model.toml";

macro_rules! define_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            $value
        }
    };
}

define_param_default!(default_rain_height, f64, 0.01);
define_param_default!(default_demand_factor, f64, 1200.0);
define_param_default!(default_player_scale_factor, f64, 0.8);
define_param_default!(default_min_price, f64, 1e-6);
define_param_default!(default_max_price, f64, 100.0);
define_param_default!(default_tie_break_epsilon, f64, 1e-5);
define_param_default!(default_penalty_conversion_rate, f64, 1.0);

/// Represents the contents of the entire model file.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct ModelParameters {
    /// Height of rain falling on a reservoir's basin in a timestep in which it rains (m)
    #[serde(default = "default_rain_height")]
    pub rain_height: f64,
    /// Parameters for the power market
    #[serde(default)]
    pub market: MarketParameters,
    /// Parameters for the game
    #[serde(default)]
    pub game: GameParameters,
}

/// Parameters for the power market
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct MarketParameters {
    /// Demand per player (MWh), multiplied by the value in the demand series
    #[serde(default = "default_demand_factor")]
    pub demand_factor: f64,
    /// Scales demand according to the number of players
    #[serde(default = "default_player_scale_factor")]
    pub player_scale_factor: f64,
    /// The lowest price which can be bid
    #[serde(default = "default_min_price")]
    pub min_price: f64,
    /// The highest price which can be bid
    #[serde(default = "default_max_price")]
    pub max_price: f64,
    /// Size of the random perturbation used to order bids with equal prices
    #[serde(default = "default_tie_break_epsilon")]
    pub tie_break_epsilon: f64,
    /// Seed for the random number generator. If not given, the generator is seeded from entropy.
    #[serde(default)]
    pub seed: Option<u64>,
    /// An external supplier which meets any demand the players don't
    #[serde(default)]
    pub import: Option<ImportParameters>,
}

impl Default for MarketParameters {
    fn default() -> Self {
        Self {
            demand_factor: default_demand_factor(),
            player_scale_factor: default_player_scale_factor(),
            min_price: default_min_price(),
            max_price: default_max_price(),
            tie_break_epsilon: default_tie_break_epsilon(),
            seed: None,
            import: None,
        }
    }
}

/// An external supplier with unlimited volume at a fixed price
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct ImportParameters {
    /// The ID under which the supplier's bids are reported
    pub player_id: PlayerID,
    /// The price of imported power
    pub price: f64,
}

/// Parameters for the game
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct GameParameters {
    /// Conversion rate from river overflow penalty to cash
    #[serde(default = "default_penalty_conversion_rate")]
    pub penalty_conversion_rate: f64,
}

impl Default for GameParameters {
    fn default() -> Self {
        Self {
            penalty_conversion_rate: default_penalty_conversion_rate(),
        }
    }
}

/// Check that a parameter is finite and greater than zero
fn check_positive(name: &str, value: f64) -> Result<()> {
    ensure!(
        value.is_finite() && value > 0.0,
        "{name} must be a finite number greater than zero"
    );

    Ok(())
}

/// Check that the price limits are valid
fn check_price_limits(min_price: f64, max_price: f64) -> Result<()> {
    check_positive("min_price", min_price)?;
    check_positive("max_price", max_price)?;
    ensure!(
        min_price < max_price,
        "min_price must be less than max_price"
    );

    Ok(())
}

impl MarketParameters {
    /// Validate market parameters
    fn validate(&self) -> Result<()> {
        check_non_negative("demand_factor", self.demand_factor)?;
        check_non_negative("player_scale_factor", self.player_scale_factor)?;
        check_price_limits(self.min_price, self.max_price)?;
        check_non_negative("tie_break_epsilon", self.tie_break_epsilon)?;
        if let Some(import) = &self.import {
            check_positive("import.price", import.price)?;
        }

        Ok(())
    }
}

impl ModelParameters {
    /// Read a model file from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing model configuration files
    ///
    /// # Returns
    ///
    /// The model file contents as a [`ModelParameters`] struct or an error if the file is invalid
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<ModelParameters> {
        let file_path = model_dir.as_ref().join(MODEL_PARAMETERS_FILE_NAME);
        let model_params: ModelParameters = read_toml(&file_path)?;

        model_params
            .validate()
            .with_context(|| input_err_msg(file_path))?;

        Ok(model_params)
    }

    /// Validate parameters after reading in file
    fn validate(&self) -> Result<()> {
        check_non_negative("rain_height", self.rain_height)?;
        self.market.validate()?;
        check_non_negative(
            "penalty_conversion_rate",
            self.game.penalty_conversion_rate,
        )?;

        Ok(())
    }
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            rain_height: default_rain_height(),
            market: MarketParameters::default(),
            game: GameParameters::default(),
        }
    }
}
