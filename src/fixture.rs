//! Fixtures for tests
use crate::game::Game;
use crate::model::Model;
use crate::reservoir::ReservoirParameters;
use rstest::fixture;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

/// Assert that a command is rejected with the given error
macro_rules! assert_command_error {
    ($result:expr, $error:expr) => {
        assert_eq!($result.unwrap_err(), $error);
    };
}
pub(crate) use assert_command_error;

/// Parameters for a reservoir which isn't connected to anything
pub fn reservoir_parameters(id: &str) -> ReservoirParameters {
    ReservoirParameters {
        id: id.into(),
        water_area: 1000.0,
        basin_area: 10000.0,
        capacity: 100_000.0,
        initial_fill: 0.5,
        generator_efficiency: 0.9,
        generator_head_height: 50.0,
        max_generator_flow: 1.0,
        out_rivers: Vec::new(),
        in_rivers: Vec::new(),
    }
}

/// Write the input files for a small model to `dir`.
///
/// Two reservoirs are joined by a river, and the lower one drains into the ocean. A mountain feeds
/// the upper reservoir. There are four timesteps of weather and demand data.
pub fn write_model_files(dir: &Path) {
    let files = [
        ("model.toml", "[market]\nseed = 42\n"),
        (
            "reservoirs.csv",
            "id,water_area,basin_area,capacity,initial_fill,generator_efficiency,generator_head_height,max_generator_flow
upper,1000,10000,100000,0.5,0.9,50,1.0
lower,2000,5000,200000,0.5,0.8,30,2.0
",
        ),
        (
            "rivers.csv",
            "id,initial_water,length_in_timesteps,max_flow,input_reservoirs,output_reservoir
upper-lower,40,2,50,upper,lower
lower-ocean,1500,1,1000,lower,
",
        ),
        (
            "mountains.csv",
            "id,output_reservoir,snow_area
peak,upper,1000
",
        ),
        (
            "rainfall.csv",
            "reservoir_id,is_raining,forecast_probability
upper,0,0.2
upper,1,0.9
upper,0,0.1
upper,0,0.3
lower,0,0.1
lower,0,0.5
lower,1,0.7
lower,0,0.2
",
        ),
        (
            "snow.csv",
            "mountain_id,temperature,snow_height
peak,-1,2.0
peak,2,1.5
peak,3,1.0
peak,-2,1.0
",
        ),
        ("power_demand.csv", "demand\n1\n1\n0.5\n0\n"),
    ];

    for (file_name, contents) in files {
        fs::write(dir.join(file_name), contents).unwrap();
    }
}

#[fixture]
pub fn model() -> Model {
    let dir = tempdir().unwrap();
    write_model_files(dir.path());
    Model::from_path(dir.path()).unwrap()
}

#[fixture]
pub fn game(model: Model) -> Game {
    let mut game = Game::new(Arc::new(model));
    game.add_player("alice".into(), "Alice").unwrap();
    game.add_player("bob".into(), "Bob").unwrap();
    game
}
