//! Reservoirs hold water and, optionally, convert it to power with a hydropower generator.
//!
//! A reservoir receives water from rivers, snowmelt and rainfall. Anything above its capacity is
//! sent on to its outgoing rivers as overflow.
use crate::id::define_id_type;
use crate::river::RiverID;
use serde::Deserialize;
use std::sync::Arc;

define_id_type! {ReservoirID}

/// Density of water (kg/m³)
const WATER_DENSITY: f64 = 1000.0;

/// Gravitational acceleration (m/s²)
const GRAVITY: f64 = 9.81;

/// Number of seconds in one timestep
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Number of hours in one timestep
const HOURS_PER_DAY: f64 = 24.0;

/// Lower bound for the fraction of maximum generator flow used when producing
const MIN_FLOW_FACTOR: f64 = 0.4;

/// Static properties of a reservoir.
///
/// These are read from the model files and shared (read-only) by every player's copy of the
/// reservoir.
#[derive(Debug, Clone, PartialEq)]
pub struct ReservoirParameters {
    /// A unique identifier for the reservoir
    pub id: ReservoirID,
    /// Surface area of the water (m²)
    pub water_area: f64,
    /// Area of the catchment basin which collects rain (m²)
    pub basin_area: f64,
    /// Maximum volume of water (m³)
    pub capacity: f64,
    /// Proportion of capacity filled at the start of a match
    pub initial_fill: f64,
    /// Generator efficiency (between 0 and 1)
    pub generator_efficiency: f64,
    /// Height of the generator drop (m)
    pub generator_head_height: f64,
    /// Maximum flow through the generator (m³/s)
    pub max_generator_flow: f64,
    /// Rivers receiving overflow from this reservoir
    pub out_rivers: Vec<RiverID>,
    /// Rivers delivering water to this reservoir
    pub in_rivers: Vec<RiverID>,
}

/// Rainfall data for one reservoir and timestep
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RainSample {
    /// Whether it rained
    pub is_raining: bool,
    /// The forecast probability of rain for the next timestep
    pub forecast_probability: f64,
}

/// Where a reservoir's inflow comes from.
///
/// The source only affects which flow counter is updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InflowSource {
    /// Water delivered by a river
    River,
    /// Water from melting snow on a mountain
    Snowmelt,
    /// Rain falling on the catchment basin
    Rain,
}

/// A reservoir belonging to one player's simulation
#[derive(Debug, Clone)]
pub struct Reservoir {
    parameters: Arc<ReservoirParameters>,
    rain_data: Arc<[RainSample]>,
    rain_height: f64,
    timestep: usize,
    water_amount: f64,
    river_inflow: f64,
    natural_inflow: f64,
    river_outflow: f64,
    is_producing: bool,
    current_production: f64,
    generator_flow: f64,
    is_raining: bool,
    forecast_probability: f64,
}

impl Reservoir {
    /// Create a new reservoir, filled to its initial level.
    ///
    /// # Arguments
    ///
    /// * `parameters` - Static properties of the reservoir
    /// * `rain_data` - Rainfall for each timestep
    /// * `rain_height` - Height of rain falling in a timestep in which it rains (m)
    pub fn new(
        parameters: Arc<ReservoirParameters>,
        rain_data: Arc<[RainSample]>,
        rain_height: f64,
    ) -> Self {
        let first = rain_data.first().copied();
        let water_amount = parameters.capacity * parameters.initial_fill;
        Self {
            parameters,
            rain_data,
            rain_height,
            timestep: 0,
            water_amount,
            river_inflow: 0.0,
            natural_inflow: 0.0,
            river_outflow: 0.0,
            is_producing: false,
            current_production: 0.0,
            generator_flow: 0.0,
            is_raining: first.is_some_and(|sample| sample.is_raining),
            forecast_probability: first.map_or(0.0, |sample| sample.forecast_probability),
        }
    }

    /// The reservoir's ID
    pub fn id(&self) -> &ReservoirID {
        &self.parameters.id
    }

    /// Static properties of the reservoir
    pub fn parameters(&self) -> &ReservoirParameters {
        &self.parameters
    }

    /// Rivers receiving this reservoir's overflow
    pub fn out_rivers(&self) -> &[RiverID] {
        &self.parameters.out_rivers
    }

    /// Current volume of water (m³)
    pub fn water_amount(&self) -> f64 {
        self.water_amount
    }

    /// Maximum volume of water (m³)
    pub fn capacity(&self) -> f64 {
        self.parameters.capacity
    }

    /// Water received from rivers this timestep (m³)
    pub fn river_inflow(&self) -> f64 {
        self.river_inflow
    }

    /// Water received from rain and snowmelt this timestep (m³)
    pub fn natural_inflow(&self) -> f64 {
        self.natural_inflow
    }

    /// Overflow sent to outgoing rivers this timestep (m³)
    pub fn river_outflow(&self) -> f64 {
        self.river_outflow
    }

    /// Whether the reservoir has been told to produce this timestep
    pub fn is_producing(&self) -> bool {
        self.is_producing
    }

    /// Power produced in the last timestep (MWh)
    pub fn current_production(&self) -> f64 {
        self.current_production
    }

    /// Flow through the generator in the last timestep (m³/s)
    pub fn generator_flow(&self) -> f64 {
        self.generator_flow
    }

    /// Whether it rained in the current timestep
    pub fn is_raining(&self) -> bool {
        self.is_raining
    }

    /// The forecast probability of rain
    pub fn forecast_probability(&self) -> f64 {
        self.forecast_probability
    }

    /// Height of the water (m). A reservoir with no water area is treated as dry.
    pub fn water_height(&self) -> f64 {
        if self.parameters.water_area > 0.0 {
            self.water_amount / self.parameters.water_area
        } else {
            0.0
        }
    }

    /// Percentage of capacity filled
    pub fn water_percentage(&self) -> f64 {
        if self.parameters.capacity > 0.0 {
            self.water_amount / self.parameters.capacity * 100.0
        } else {
            0.0
        }
    }

    /// Fill the reservoir to capacity
    pub fn fill(&mut self) {
        self.water_amount = self.parameters.capacity;
    }

    /// Add water to the reservoir.
    ///
    /// The volume is clamped to capacity. Any excess is lost here: overflow to rivers only happens
    /// in [`Reservoir::process_timestep`].
    pub fn add_inflow(&mut self, source: InflowSource, volume: f64) {
        match source {
            InflowSource::River => self.river_inflow += volume,
            InflowSource::Snowmelt | InflowSource::Rain => self.natural_inflow += volume,
        }
        self.water_amount = (self.water_amount + volume).clamp(0.0, self.parameters.capacity);
    }

    /// Set whether the reservoir should produce power in the next timestep
    pub fn set_producing(&mut self, is_producing: bool) {
        self.is_producing = is_producing;
    }

    /// Advance the reservoir by one timestep.
    ///
    /// Rain is applied, overflow is calculated and power is produced if requested.
    ///
    /// # Returns
    ///
    /// The volume of overflow to deliver to **each** outgoing river (m³).
    pub fn process_timestep(&mut self) -> f64 {
        self.river_inflow = 0.0;
        self.natural_inflow = 0.0;
        self.river_outflow = 0.0;

        self.timestep += 1;
        if let Some(sample) = self.rain_data.get(self.timestep).copied() {
            self.is_raining = sample.is_raining;
            self.forecast_probability = sample.forecast_probability;
            if sample.is_raining {
                self.add_inflow(
                    InflowSource::Rain,
                    self.parameters.basin_area * self.rain_height,
                );
            }
        }

        let overflow = (self.water_amount - self.parameters.capacity).max(0.0);
        self.water_amount = self.water_amount.min(self.parameters.capacity);

        // With no outgoing rivers the overflow is lost
        let n_rivers = self.parameters.out_rivers.len();
        let overflow_per_river = if overflow > 0.0 && n_rivers > 0 {
            self.river_outflow = overflow;
            overflow / n_rivers as f64
        } else {
            0.0
        };

        self.calculate_production();

        overflow_per_river
    }

    /// Produce power using the hydropower equation, `P = η·ρ·g·Q·h`.
    ///
    /// The flow rate, Q, depends on how full the reservoir is, but can never use more water than
    /// is available over the course of the day.
    fn calculate_production(&mut self) {
        self.current_production = 0.0;
        self.generator_flow = 0.0;
        if !self.is_producing {
            return;
        }

        let water_height = self.water_height();
        if water_height <= 0.0 {
            self.is_producing = false;
            return;
        }

        let parameters = &self.parameters;
        let max_water_height = parameters.capacity / parameters.water_area;
        let flow_factor = (water_height / max_water_height).clamp(MIN_FLOW_FACTOR, 1.0);
        let flow_rate = (flow_factor * parameters.max_generator_flow)
            .min(self.water_amount / SECONDS_PER_DAY);

        let power_watts = parameters.generator_efficiency
            * WATER_DENSITY
            * GRAVITY
            * flow_rate
            * parameters.generator_head_height;
        let power_mwh = power_watts / 1e6 * HOURS_PER_DAY;

        let water_used = (flow_rate * SECONDS_PER_DAY).min(self.water_amount);
        self.water_amount = (self.water_amount - water_used).max(0.0);
        self.generator_flow = flow_rate;
        self.current_production = power_mwh;
    }
}

/// Create a reservoir for use in tests
#[cfg(test)]
pub fn test_reservoir(capacity: f64, water_area: f64, initial_fill: f64) -> Reservoir {
    let parameters = ReservoirParameters {
        id: "reservoir1".into(),
        water_area,
        basin_area: 1000.0,
        capacity,
        initial_fill,
        generator_efficiency: 0.85,
        generator_head_height: 50.0,
        max_generator_flow: 10.0,
        out_rivers: Vec::new(),
        in_rivers: Vec::new(),
    };
    Reservoir::new(Arc::new(parameters), Arc::from(Vec::new()), 0.01)
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    #[case(100.0, 600.0)]
    #[case(500.0, 1000.0)]
    #[case(-700.0, 0.0)]
    fn test_add_inflow_clamps(#[case] volume: f64, #[case] expected: f64) {
        let mut reservoir = test_reservoir(1000.0, 10.0, 0.5);
        reservoir.add_inflow(InflowSource::River, volume);
        assert_approx_eq!(f64, reservoir.water_amount(), expected);
        assert_approx_eq!(f64, reservoir.river_inflow(), volume);
    }

    #[test]
    fn test_add_inflow_source() {
        let mut reservoir = test_reservoir(1000.0, 10.0, 0.0);
        reservoir.add_inflow(InflowSource::Snowmelt, 10.0);
        reservoir.add_inflow(InflowSource::Rain, 5.0);
        reservoir.add_inflow(InflowSource::River, 1.0);
        assert_approx_eq!(f64, reservoir.natural_inflow(), 15.0);
        assert_approx_eq!(f64, reservoir.river_inflow(), 1.0);
        assert_approx_eq!(f64, reservoir.water_amount(), 16.0);
    }

    #[test]
    fn test_water_height() {
        let reservoir = test_reservoir(1000.0, 10.0, 0.5);
        assert_approx_eq!(f64, reservoir.water_height(), 50.0);
        assert_approx_eq!(f64, reservoir.water_percentage(), 50.0);

        // No area means no height, rather than a division by zero
        let reservoir = test_reservoir(1000.0, 0.0, 0.5);
        assert_eq!(reservoir.water_height(), 0.0);
    }

    #[test]
    fn test_fill() {
        let mut reservoir = test_reservoir(1000.0, 10.0, 0.1);
        reservoir.fill();
        assert_eq!(reservoir.water_amount(), 1000.0);
    }

    #[test]
    fn test_rain() {
        let mut reservoir = test_reservoir(1000.0, 10.0, 0.0);
        let rain: Vec<_> = [false, true, false]
            .into_iter()
            .map(|is_raining| RainSample {
                is_raining,
                forecast_probability: 0.3,
            })
            .collect();
        reservoir.rain_data = Arc::from(rain);

        // basin_area * rain_height = 1000 * 0.01
        reservoir.process_timestep();
        assert!(reservoir.is_raining());
        assert_approx_eq!(f64, reservoir.forecast_probability(), 0.3);
        assert_approx_eq!(f64, reservoir.water_amount(), 10.0);
        assert_approx_eq!(f64, reservoir.natural_inflow(), 10.0);

        reservoir.process_timestep();
        assert!(!reservoir.is_raining());
        assert_approx_eq!(f64, reservoir.water_amount(), 10.0);

        // Rain data exhausted
        reservoir.process_timestep();
        assert_approx_eq!(f64, reservoir.water_amount(), 10.0);
    }

    #[test]
    fn test_overflow_split_between_rivers() {
        let mut reservoir = test_reservoir(1000.0, 10.0, 1.0);
        let mut parameters = reservoir.parameters().clone();
        parameters.out_rivers = vec!["river1".into(), "river2".into()];
        reservoir.parameters = Arc::new(parameters);
        reservoir.water_amount = 1100.0;

        assert_approx_eq!(f64, reservoir.process_timestep(), 50.0);
        assert_approx_eq!(f64, reservoir.river_outflow(), 100.0);
        assert_eq!(reservoir.water_amount(), 1000.0);
    }

    #[test]
    fn test_overflow_without_rivers_is_lost() {
        let mut reservoir = test_reservoir(1000.0, 10.0, 1.0);
        reservoir.water_amount = 1100.0;

        assert_eq!(reservoir.process_timestep(), 0.0);
        assert_eq!(reservoir.river_outflow(), 0.0);
        assert_eq!(reservoir.water_amount(), 1000.0);
    }

    #[test]
    fn test_production_height_limited() {
        // Max height is 100m and reservoir is half full, so half of max flow is used
        let mut reservoir = test_reservoir(1e6, 1e4, 0.5);
        reservoir.set_producing(true);
        reservoir.process_timestep();

        // 0.85 * 1000 * 9.81 * 5 * 50 W for 24 hours
        assert_approx_eq!(f64, reservoir.current_production(), 50.031, epsilon = 1e-9);
        assert_approx_eq!(f64, reservoir.generator_flow(), 5.0);
        assert_approx_eq!(f64, reservoir.water_amount(), 500_000.0 - 432_000.0);
    }

    #[test]
    fn test_production_water_limited() {
        // Flow factor is floored at 0.4, but there isn't enough water for a full day of that
        let mut reservoir = test_reservoir(1e6, 1e4, 0.1);
        reservoir.set_producing(true);
        reservoir.process_timestep();

        let flow_rate = 100_000.0 / SECONDS_PER_DAY;
        let expected = 0.85 * WATER_DENSITY * GRAVITY * flow_rate * 50.0 / 1e6 * 24.0;
        assert_approx_eq!(f64, reservoir.current_production(), expected, epsilon = 1e-9);
        assert_approx_eq!(f64, reservoir.water_amount(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_no_production_when_not_producing() {
        let mut reservoir = test_reservoir(1e6, 1e4, 0.5);
        reservoir.process_timestep();
        assert_eq!(reservoir.current_production(), 0.0);
        assert_eq!(reservoir.water_amount(), 500_000.0);
    }

    #[rstest]
    #[case(1e4, 0.0)] // Empty reservoir
    #[case(0.0, 0.5)] // No water area
    fn test_no_production_when_dry(#[case] water_area: f64, #[case] initial_fill: f64) {
        let mut reservoir = test_reservoir(1e6, water_area, initial_fill);
        reservoir.set_producing(true);
        reservoir.process_timestep();
        assert_eq!(reservoir.current_production(), 0.0);
        assert!(!reservoir.is_producing());
    }
}
