//! Snapshots of a simulation which are sent to players.
use crate::mountain::{Mountain, MountainID};
use crate::reservoir::{Reservoir, ReservoirID};
use crate::river::{River, RiverID};
use indexmap::IndexMap;
use serde::Serialize;

/// The complete state of a player's network, sent when they join
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FullState {
    /// State of each reservoir
    pub reservoirs: IndexMap<ReservoirID, ReservoirFullState>,
    /// State of each river
    pub rivers: IndexMap<RiverID, RiverFullState>,
    /// State of each mountain
    pub mountains: IndexMap<MountainID, MountainFullState>,
}

/// Static and dynamic properties of a reservoir
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReservoirFullState {
    /// Volume of water held (m³)
    pub water_amount: f64,
    /// Height of water above the bottom of the reservoir (m)
    pub water_height: f64,
    /// Surface area of the reservoir (m²)
    pub water_area: f64,
    /// Area of the catchment basin collecting rain (m²)
    pub basin_area: f64,
    /// Maximum volume of water (m³)
    pub capacity: f64,
    /// Water delivered by rivers in the last timestep (m³)
    pub river_inflow: f64,
    /// Rain and meltwater received in the last timestep (m³)
    pub natural_inflow: f64,
    /// Overflow sent to rivers in the last timestep (m³)
    pub river_outflow: f64,
    /// Efficiency of the generator, between 0 and 1
    pub generator_efficiency: f64,
    /// Maximum flow through the generator (m³/s)
    pub max_generator_flow: f64,
    /// Head driving the generator (m)
    pub generator_head_height: f64,
    /// Flow through the generator in the last timestep (m³/s)
    pub generator_flow: f64,
    /// Whether it rained in the last timestep
    pub is_raining: bool,
    /// Forecast probability of rain in the next timestep
    pub forecast_probability: f64,
    /// Rivers flowing into the reservoir
    pub in_rivers: Vec<RiverID>,
    /// Rivers carrying the reservoir's overflow
    pub out_rivers: Vec<RiverID>,
}

impl From<&Reservoir> for ReservoirFullState {
    fn from(reservoir: &Reservoir) -> Self {
        let parameters = reservoir.parameters();
        Self {
            water_amount: reservoir.water_amount(),
            water_height: reservoir.water_height(),
            water_area: parameters.water_area,
            basin_area: parameters.basin_area,
            capacity: parameters.capacity,
            river_inflow: reservoir.river_inflow(),
            natural_inflow: reservoir.natural_inflow(),
            river_outflow: reservoir.river_outflow(),
            generator_efficiency: parameters.generator_efficiency,
            max_generator_flow: parameters.max_generator_flow,
            generator_head_height: parameters.generator_head_height,
            generator_flow: reservoir.generator_flow(),
            is_raining: reservoir.is_raining(),
            forecast_probability: reservoir.forecast_probability(),
            in_rivers: parameters.in_rivers.clone(),
            out_rivers: parameters.out_rivers.clone(),
        }
    }
}

/// Static and dynamic properties of a river
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiverFullState {
    /// Travel time from one end of the river to the other
    pub length_in_timesteps: usize,
    /// Flow above which a penalty is charged
    pub max_flow: f64,
    /// Total water in transit at the last timestep (m³)
    pub current_flow: f64,
    /// Water in transit, from head to tail
    pub water_queue: Vec<f64>,
    /// `None` if the river runs into the ocean
    pub output_reservoir: Option<ReservoirID>,
}

impl From<&River> for RiverFullState {
    fn from(river: &River) -> Self {
        let parameters = river.parameters();
        Self {
            length_in_timesteps: parameters.length_in_timesteps,
            max_flow: parameters.max_flow,
            current_flow: river.current_flow(),
            water_queue: river.water_queue().iter().copied().collect(),
            output_reservoir: parameters.output_reservoir.clone(),
        }
    }
}

/// Static and dynamic properties of a mountain
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MountainFullState {
    /// Height of the snowpack (m)
    pub snow_height: f64,
    /// Temperature (°C)
    pub temperature: f64,
    /// Area covered by snow (m²)
    pub snow_area: f64,
    /// The reservoir receiving the meltwater
    pub output_reservoir: ReservoirID,
}

impl From<&Mountain> for MountainFullState {
    fn from(mountain: &Mountain) -> Self {
        Self {
            snow_height: mountain.snow_height(),
            temperature: mountain.temperature(),
            snow_area: mountain.parameters().snow_area,
            output_reservoir: mountain.output_reservoir().clone(),
        }
    }
}

/// The parts of a player's network which change every timestep
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimestepState {
    /// State of each reservoir
    pub reservoirs: IndexMap<ReservoirID, ReservoirTimestepState>,
    /// State of each river
    pub rivers: IndexMap<RiverID, RiverTimestepState>,
    /// State of each mountain
    pub mountains: IndexMap<MountainID, MountainTimestepState>,
}

/// The state of a reservoir at the end of a timestep
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReservoirTimestepState {
    /// Volume of water held (m³)
    pub water_amount: f64,
    /// Maximum volume of water (m³)
    pub capacity: f64,
    /// Forecast probability of rain in the next timestep
    pub forecast_probability: f64,
    /// Whether it rained in the last timestep
    pub did_rain: bool,
}

impl From<&Reservoir> for ReservoirTimestepState {
    fn from(reservoir: &Reservoir) -> Self {
        Self {
            water_amount: reservoir.water_amount(),
            capacity: reservoir.capacity(),
            forecast_probability: reservoir.forecast_probability(),
            did_rain: reservoir.is_raining(),
        }
    }
}

/// The state of a river at the end of a timestep
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiverTimestepState {
    /// Water in transit, from head to tail
    pub flow: Vec<f64>,
}

impl From<&River> for RiverTimestepState {
    fn from(river: &River) -> Self {
        Self {
            flow: river.water_queue().iter().copied().collect(),
        }
    }
}

/// The state of a mountain at the end of a timestep
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MountainTimestepState {
    /// Height of the snowpack (m)
    pub snow_height: f64,
    /// Temperature (°C)
    pub temperature: f64,
}

impl From<&Mountain> for MountainTimestepState {
    fn from(mountain: &Mountain) -> Self {
        Self {
            snow_height: mountain.snow_height(),
            temperature: mountain.temperature(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::model;
    use crate::model::Model;
    use crate::simulation::Simulation;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    fn test_timestep_state_json(model: Model) {
        let state = Simulation::new(&model).timestep_state();
        let value = serde_json::to_value(&state).unwrap();

        assert_eq!(
            value["reservoirs"]["upper"],
            json!({
                "water_amount": 50_000.0,
                "capacity": 100_000.0,
                "forecast_probability": 0.2,
                "did_rain": false,
            })
        );
        assert_eq!(value["rivers"]["upper-lower"], json!({"flow": [20.0, 20.0]}));
        assert_eq!(
            value["mountains"]["peak"],
            json!({"snow_height": 2.0, "temperature": -1.0})
        );
    }

    #[rstest]
    fn test_full_state_json(model: Model) {
        let state = Simulation::new(&model).full_state();
        let value = serde_json::to_value(&state).unwrap();

        assert_eq!(value["reservoirs"]["upper"]["out_rivers"], json!(["upper-lower"]));
        assert_eq!(value["rivers"]["lower-ocean"]["output_reservoir"], json!(null));
        assert_eq!(value["mountains"]["peak"]["output_reservoir"], json!("upper"));
    }
}
