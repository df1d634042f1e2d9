//! Rivers carry water between reservoirs.
//!
//! A river is modelled as a delay line: a fixed-length queue of water volumes, one per timestep of
//! travel time. Rivers which carry too much water at once incur an escalating penalty.
use crate::id::define_id_type;
use crate::reservoir::ReservoirID;
use std::collections::VecDeque;
use std::sync::Arc;

define_id_type! {RiverID}

/// Penalty charged per unit of flow above a river's maximum
const PENALTY_PER_EXCESS_FLOW: f64 = 100.0;

/// Static properties of a river
#[derive(Debug, Clone, PartialEq)]
pub struct RiverParameters {
    /// A unique identifier for the river
    pub id: RiverID,
    /// Water in the river at the start of a match (m³), spread evenly along its length
    pub initial_water: f64,
    /// Travel time of water from one end of the river to the other
    pub length_in_timesteps: usize,
    /// Flow above which a penalty is charged
    pub max_flow: f64,
    /// Reservoirs whose overflow feeds this river
    pub input_reservoirs: Vec<ReservoirID>,
    /// The reservoir which receives the water; `None` means the river runs into the ocean
    pub output_reservoir: Option<ReservoirID>,
}

/// A river belonging to one player's simulation
#[derive(Debug, Clone)]
pub struct River {
    parameters: Arc<RiverParameters>,
    /// Water volumes in transit. The front is the head (upstream end).
    water_queue: VecDeque<f64>,
    current_flow: f64,
    consecutive_days_over_max: u32,
    cumulative_penalty: f64,
}

impl River {
    /// Create a new river with its initial water spread evenly along its length
    pub fn new(parameters: Arc<RiverParameters>) -> Self {
        let length = parameters.length_in_timesteps;
        let water_queue = if length > 0 {
            VecDeque::from(vec![parameters.initial_water / length as f64; length])
        } else {
            VecDeque::new()
        };

        Self {
            parameters,
            water_queue,
            current_flow: 0.0,
            consecutive_days_over_max: 0,
            cumulative_penalty: 0.0,
        }
    }

    /// The river's ID
    pub fn id(&self) -> &RiverID {
        &self.parameters.id
    }

    /// Static properties of the river
    pub fn parameters(&self) -> &RiverParameters {
        &self.parameters
    }

    /// The reservoir receiving this river's outflow, if any
    pub fn output_reservoir(&self) -> Option<&ReservoirID> {
        self.parameters.output_reservoir.as_ref()
    }

    /// Water volumes in transit, from head to tail
    pub fn water_queue(&self) -> &VecDeque<f64> {
        &self.water_queue
    }

    /// Total water in transit at the last timestep
    pub fn current_flow(&self) -> f64 {
        self.current_flow
    }

    /// Number of consecutive timesteps for which the flow has exceeded the maximum
    pub fn consecutive_days_over_max(&self) -> u32 {
        self.consecutive_days_over_max
    }

    /// Add water to the head of the river
    pub fn add_inflow(&mut self, volume: f64) {
        if let Some(head) = self.water_queue.front_mut() {
            *head += volume;
        }
    }

    /// Advance the river by one timestep.
    ///
    /// # Returns
    ///
    /// The volume of water leaving the tail of the river (m³). It is up to the caller to deliver
    /// this to the output reservoir.
    pub fn process_timestep(&mut self) -> f64 {
        self.current_flow = self.water_queue.iter().sum();

        let outflow = self.water_queue.pop_back().unwrap_or(0.0);
        self.water_queue.push_front(0.0);

        if self.current_flow > self.parameters.max_flow {
            self.consecutive_days_over_max += 1;
        } else {
            self.consecutive_days_over_max = 0;
            self.cumulative_penalty = 0.0;
        }

        outflow
    }

    /// Calculate the penalty for exceeding the river's maximum flow.
    ///
    /// The penalty for the current timestep is added to those of all preceding consecutive
    /// timesteps in which the maximum was exceeded, so a sustained violation costs more and more.
    ///
    /// # Returns
    ///
    /// The cumulative penalty, or zero if the flow is within the limit.
    pub fn max_flow_penalty(&mut self) -> f64 {
        if self.current_flow <= self.parameters.max_flow {
            self.cumulative_penalty = 0.0;
            return 0.0;
        }

        let today_penalty = PENALTY_PER_EXCESS_FLOW * (self.current_flow - self.parameters.max_flow);
        self.cumulative_penalty += today_penalty;

        self.cumulative_penalty
    }
}
