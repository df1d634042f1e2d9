//! One player's copy of the hydrological network.
//!
//! Nodes refer to one another by ID rather than by reference, so a [`Simulation`] can be built
//! afresh from a [`Model`] for each player without any graph-aware copying.
use crate::model::Model;
use crate::mountain::{Mountain, MountainID};
use crate::reservoir::{InflowSource, Reservoir, ReservoirID};
use crate::river::{River, RiverID};
use indexmap::IndexMap;

pub mod state;
use state::{
    FullState, MountainFullState, MountainTimestepState, ReservoirFullState,
    ReservoirTimestepState, RiverFullState, RiverTimestepState, TimestepState,
};

/// The result of simulating a single day
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DayOutput {
    /// Power produced across all reservoirs (MWh)
    pub production: f64,
    /// Penalty for rivers carrying more than their maximum flow, summed across all rivers
    pub overflow_penalty: f64,
}

/// A player's reservoirs, rivers and mountains
#[derive(Debug, Clone)]
pub struct Simulation {
    reservoirs: IndexMap<ReservoirID, Reservoir>,
    rivers: IndexMap<RiverID, River>,
    mountains: IndexMap<MountainID, Mountain>,
}

impl Simulation {
    /// Build a new simulation in its initial state from a model
    pub fn new(model: &Model) -> Self {
        let rain_height = model.parameters.rain_height;
        let reservoirs = model
            .reservoirs
            .iter()
            .map(|(id, parameters)| {
                let reservoir =
                    Reservoir::new(parameters.clone(), model.rainfall_for(id), rain_height);
                (id.clone(), reservoir)
            })
            .collect();
        let rivers = model
            .rivers
            .iter()
            .map(|(id, parameters)| (id.clone(), River::new(parameters.clone())))
            .collect();
        let mountains = model
            .mountains
            .iter()
            .map(|(id, parameters)| {
                let mountain = Mountain::new(parameters.clone(), model.snow_for(id));
                (id.clone(), mountain)
            })
            .collect();

        Self {
            reservoirs,
            rivers,
            mountains,
        }
    }

    /// Get a reservoir by ID
    pub fn reservoir(&self, id: &str) -> Option<&Reservoir> {
        self.reservoirs.get(id)
    }

    /// Get a river by ID
    pub fn river(&self, id: &str) -> Option<&River> {
        self.rivers.get(id)
    }

    /// Get a mountain by ID
    pub fn mountain(&self, id: &str) -> Option<&Mountain> {
        self.mountains.get(id)
    }

    /// Iterate over the reservoirs in input order
    pub fn iter_reservoirs(&self) -> impl Iterator<Item = &Reservoir> {
        self.reservoirs.values()
    }

    /// Set whether a reservoir should produce power in the next timestep.
    ///
    /// Unknown reservoir IDs are ignored.
    pub fn set_production(&mut self, reservoir_id: &str, is_producing: bool) {
        if let Some(reservoir) = self.reservoirs.get_mut(reservoir_id) {
            reservoir.set_producing(is_producing);
        }
    }

    /// Stop all reservoirs from producing
    pub fn clear_production(&mut self) {
        for reservoir in self.reservoirs.values_mut() {
            reservoir.set_producing(false);
        }
    }

    /// Advance the whole network by one timestep.
    ///
    /// Mountains are processed first, then reservoirs, then rivers. Meltwater reaches its
    /// reservoir straight away, whereas reservoir overflow enters the head of a river and only
    /// arrives downstream once it has travelled the length of the river. Afterwards, no reservoir
    /// is left producing.
    pub fn simulate_day(&mut self) -> DayOutput {
        for mountain in self.mountains.values_mut() {
            let melt = mountain.process_timestep();
            if melt > 0.0 {
                if let Some(reservoir) = self.reservoirs.get_mut(mountain.output_reservoir()) {
                    reservoir.add_inflow(InflowSource::Snowmelt, melt);
                }
            }
        }

        let mut production = 0.0;
        for reservoir in self.reservoirs.values_mut() {
            let overflow_per_river = reservoir.process_timestep();
            production += reservoir.current_production();

            if overflow_per_river > 0.0 {
                for river_id in reservoir.out_rivers() {
                    if let Some(river) = self.rivers.get_mut(river_id) {
                        river.add_inflow(overflow_per_river);
                    }
                }
            }
        }

        let mut overflow_penalty = 0.0;
        for river in self.rivers.values_mut() {
            let outflow = river.process_timestep();
            if let Some(reservoir) = river
                .output_reservoir()
                .and_then(|id| self.reservoirs.get_mut(id))
            {
                reservoir.add_inflow(InflowSource::River, outflow);
            }

            overflow_penalty += river.max_flow_penalty();
        }

        self.clear_production();

        DayOutput {
            production,
            overflow_penalty,
        }
    }

    /// Total volume of water held in all reservoirs (m³)
    pub fn total_water(&self) -> f64 {
        self.reservoirs.values().map(Reservoir::water_amount).sum()
    }

    /// Everything a player needs to know to reconstruct the network
    pub fn full_state(&self) -> FullState {
        FullState {
            reservoirs: self
                .reservoirs
                .iter()
                .map(|(id, reservoir)| (id.clone(), ReservoirFullState::from(reservoir)))
                .collect(),
            rivers: self
                .rivers
                .iter()
                .map(|(id, river)| (id.clone(), RiverFullState::from(river)))
                .collect(),
            mountains: self
                .mountains
                .iter()
                .map(|(id, mountain)| (id.clone(), MountainFullState::from(mountain)))
                .collect(),
        }
    }

    /// The parts of the network's state which change from one timestep to the next
    pub fn timestep_state(&self) -> TimestepState {
        TimestepState {
            reservoirs: self
                .reservoirs
                .iter()
                .map(|(id, reservoir)| (id.clone(), ReservoirTimestepState::from(reservoir)))
                .collect(),
            rivers: self
                .rivers
                .iter()
                .map(|(id, river)| (id.clone(), RiverTimestepState::from(river)))
                .collect(),
            mountains: self
                .mountains
                .iter()
                .map(|(id, mountain)| (id.clone(), MountainTimestepState::from(mountain)))
                .collect(),
        }
    }
}
