//! Mountains produce meltwater from their snowpack, which flows into a reservoir.
use crate::id::define_id_type;
use crate::reservoir::ReservoirID;
use std::sync::Arc;

define_id_type! {MountainID}

/// Static properties of a mountain
#[derive(Debug, Clone, PartialEq)]
pub struct MountainParameters {
    /// A unique identifier for the mountain
    pub id: MountainID,
    /// The reservoir receiving the meltwater
    pub output_reservoir: ReservoirID,
    /// Area covered by snow (m²)
    pub snow_area: f64,
}

/// Weather data for one mountain and timestep
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnowSample {
    /// Temperature (°C)
    pub temperature: f64,
    /// Height of the snowpack (m)
    pub snow_height: f64,
}

/// A mountain belonging to one player's simulation
#[derive(Debug, Clone)]
pub struct Mountain {
    parameters: Arc<MountainParameters>,
    snow_data: Arc<[SnowSample]>,
    timestep: usize,
    current_snow_height: f64,
    temperature: f64,
}

impl Mountain {
    /// Create a new mountain, starting at the first sample of the weather data
    pub fn new(parameters: Arc<MountainParameters>, snow_data: Arc<[SnowSample]>) -> Self {
        let first = snow_data.first().copied();
        Self {
            parameters,
            snow_data,
            timestep: 0,
            current_snow_height: first.map_or(0.0, |sample| sample.snow_height),
            temperature: first.map_or(0.0, |sample| sample.temperature),
        }
    }

    /// The mountain's ID
    pub fn id(&self) -> &MountainID {
        &self.parameters.id
    }

    /// Static properties of the mountain
    pub fn parameters(&self) -> &MountainParameters {
        &self.parameters
    }

    /// The reservoir receiving the meltwater
    pub fn output_reservoir(&self) -> &ReservoirID {
        &self.parameters.output_reservoir
    }

    /// Current height of the snowpack (m)
    pub fn snow_height(&self) -> f64 {
        self.current_snow_height
    }

    /// Current temperature (°C)
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Advance the mountain by one timestep.
    ///
    /// Snow melts if it is above freezing and the snowpack has shrunk since the last timestep.
    /// Once the weather data runs out, the mountain stays as it is and produces no more water.
    ///
    /// # Returns
    ///
    /// The volume of meltwater (m³). It is up to the caller to deliver this to the output
    /// reservoir within the same timestep.
    pub fn process_timestep(&mut self) -> f64 {
        if self.timestep >= self.snow_data.len() {
            return 0.0;
        }

        self.timestep += 1;
        let Some(sample) = self.snow_data.get(self.timestep).copied() else {
            return 0.0;
        };

        let previous_snow_height = self.current_snow_height;
        self.current_snow_height = sample.snow_height;
        self.temperature = sample.temperature;

        if self.temperature > 0.0 && previous_snow_height > self.current_snow_height {
            (previous_snow_height - self.current_snow_height) * self.parameters.snow_area
        } else {
            0.0
        }
    }
}
