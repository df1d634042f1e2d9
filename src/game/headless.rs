//! Play a whole match in-process, without any network clients.
//!
//! Every player follows the same simple strategy: produce from all reservoirs, every timestep, at
//! a fixed price. This is mostly useful for trying out new models.
use super::state::Scoreboard;
use super::{Game, PlayerID};
use crate::model::Model;
use crate::output::{DataWriter, write_scoreboard};
use anyhow::{Result, ensure};
use log::info;
use std::path::Path;
use std::sync::Arc;

/// Settings for a headless match
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessOptions {
    /// The number of players
    pub n_players: usize,
    /// The number of timesteps to play
    pub n_timesteps: usize,
    /// The price at which every player bids their power
    pub price: f64,
}

/// Play a match from start to finish, writing results to `output_path`.
///
/// # Returns
///
/// The final scoreboard
pub fn run(model: Arc<Model>, options: &HeadlessOptions, output_path: &Path) -> Result<Scoreboard> {
    ensure!(options.n_players > 0, "A match needs at least one player");

    let mut game = Game::new(model.clone());
    for i in 1..=options.n_players {
        let player_id = PlayerID::from(format!("player{i}"));
        game.add_player(player_id, &format!("Player {i}"))?;
    }
    game.start(options.n_timesteps)?;

    let player_ids: Vec<PlayerID> = game.player_ids().cloned().collect();
    let reservoir_ids: Vec<String> = model
        .reservoirs
        .keys()
        .map(ToString::to_string)
        .collect();

    let mut writer = DataWriter::create(output_path)?;
    while !game.is_game_over() {
        for player_id in &player_ids {
            game.set_production(player_id.as_str(), reservoir_ids.iter().cloned(), options.price)?;
        }
        game.process_timestep()?;
        writer.write_timestep(&game)?;
    }
    writer.flush()?;

    let scoreboard = game.scoreboard();
    write_scoreboard(output_path, &scoreboard)?;
    for (rank, entry) in scoreboard.entries.iter().enumerate() {
        info!(
            "{}. {} ({}): cash {:.2}, water {:.0} m³",
            rank + 1,
            entry.name,
            entry.player_id,
            entry.cash,
            entry.total_water
        );
    }

    Ok(scoreboard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::model;
    use crate::game::GameStatus;
    use rstest::rstest;
    use tempfile::tempdir;

    #[rstest]
    fn test_run(model: Model) {
        let dir = tempdir().unwrap();
        let options = HeadlessOptions {
            n_players: 3,
            n_timesteps: 4,
            price: 0.5,
        };

        let scoreboard = run(Arc::new(model), &options, dir.path()).unwrap();
        assert_eq!(scoreboard.status, GameStatus::Over);
        assert_eq!(scoreboard.timestep, 4);
        assert_eq!(scoreboard.entries.len(), 3);
        assert!(dir.path().join("player_cash.csv").is_file());
        assert!(dir.path().join("market_results.csv").is_file());
        assert!(dir.path().join("scoreboard.json").is_file());
    }

    #[rstest]
    fn test_run_no_players(model: Model) {
        let dir = tempdir().unwrap();
        let options = HeadlessOptions {
            n_players: 0,
            n_timesteps: 4,
            price: 0.5,
        };

        assert!(run(Arc::new(model), &options, dir.path()).is_err());
    }
}
