//! A turn-based multiplayer game of hydropower production and power market trading.
//!
//! Each player runs their own copy of a network of reservoirs, rivers and snow-capped mountains.
//! Every timestep they choose which reservoirs generate power and the price they will accept for
//! it, then a shared power market decides whose power is bought.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod cli;
pub mod game;
pub mod id;
pub mod input;
pub mod log;
pub mod market;
pub mod model;
pub mod mountain;
pub mod output;
pub mod reservoir;
pub mod river;
pub mod server;
pub mod settings;
pub mod simulation;

#[cfg(test)]
mod fixture;

/// Get the path to the folder where program settings are stored
pub fn get_hydro_trader_config_dir() -> PathBuf {
    let Some(mut config_dir) = dirs::config_dir() else {
        panic!("Could not get path to config directory")
    };

    config_dir.push("hydro_trader");
    config_dir
}
