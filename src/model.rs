//! Code for simulation models.
//!
//! A [`Model`] is the blueprint for a match: the topology of reservoirs, rivers and mountains, the
//! weather and demand series and the parameters of the market. Each player gets their own
//! [`Simulation`](crate::simulation::Simulation) built from the same model.
use crate::input::demand::read_power_demand;
use crate::input::mountain::read_mountains;
use crate::input::rainfall::{RainfallMap, read_rainfall};
use crate::input::reservoir::read_reservoirs;
use crate::input::river::{connect_rivers, read_rivers};
use crate::input::snow::{SnowMap, read_snow};
use crate::mountain::{MountainID, MountainParameters, SnowSample};
use crate::reservoir::{RainSample, ReservoirID, ReservoirParameters};
use crate::river::{RiverID, RiverParameters};
use anyhow::Result;
use indexmap::{IndexMap, IndexSet};
use log::info;
use std::path::Path;
use std::sync::Arc;

pub mod parameters;
pub use parameters::{GameParameters, ImportParameters, MarketParameters, ModelParameters};

/// Model definition
#[derive(Debug, Clone)]
pub struct Model {
    /// Parameters from the model file
    pub parameters: ModelParameters,
    /// Reservoirs, in input order
    pub reservoirs: IndexMap<ReservoirID, Arc<ReservoirParameters>>,
    /// Rivers, in input order
    pub rivers: IndexMap<RiverID, Arc<RiverParameters>>,
    /// Mountains, in input order
    pub mountains: IndexMap<MountainID, Arc<MountainParameters>>,
    /// Rainfall series for each reservoir
    pub rainfall: RainfallMap,
    /// Snow series for each mountain
    pub snow: SnowMap,
    /// Demand per player for each timestep
    pub power_demand: Arc<[f64]>,
}

impl Model {
    /// Read a model from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing model configuration files
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<Model> {
        let model_dir = model_dir.as_ref();
        let parameters = ModelParameters::from_path(model_dir)?;

        let mut reservoirs = read_reservoirs(model_dir)?;
        let reservoir_ids: IndexSet<ReservoirID> = reservoirs.keys().cloned().collect();
        let rivers = read_rivers(model_dir, &reservoir_ids)?;
        connect_rivers(&mut reservoirs, &rivers);

        let mountains = read_mountains(model_dir, &reservoir_ids)?;
        let mountain_ids: IndexSet<MountainID> = mountains.keys().cloned().collect();

        let model = Model {
            parameters,
            rainfall: read_rainfall(model_dir, &reservoir_ids)?,
            snow: read_snow(model_dir, &mountain_ids)?,
            power_demand: Arc::from(read_power_demand(model_dir)?),
            reservoirs: into_shared(reservoirs),
            rivers: into_shared(rivers),
            mountains: into_shared(mountains),
        };

        info!(
            "Loaded model with {} reservoirs, {} rivers and {} mountains",
            model.reservoirs.len(),
            model.rivers.len(),
            model.mountains.len()
        );

        Ok(model)
    }

    /// The number of timesteps for which there is weather data for every reservoir and mountain.
    ///
    /// Returns `None` for a model with no weather data at all.
    pub fn weather_timesteps(&self) -> Option<usize> {
        self.rainfall
            .values()
            .map(|series| series.len())
            .chain(self.snow.values().map(|series| series.len()))
            .min()
    }

    /// The rainfall series for a reservoir (empty if there is none)
    pub fn rainfall_for(&self, reservoir_id: &ReservoirID) -> Arc<[RainSample]> {
        self.rainfall
            .get(reservoir_id)
            .cloned()
            .unwrap_or_else(|| Arc::from(Vec::new()))
    }

    /// The snow series for a mountain (empty if there is none)
    pub fn snow_for(&self, mountain_id: &MountainID) -> Arc<[SnowSample]> {
        self.snow
            .get(mountain_id)
            .cloned()
            .unwrap_or_else(|| Arc::from(Vec::new()))
    }
}

/// Wrap each value of a map in an [`Arc`] so it can be shared between simulations
fn into_shared<K, V>(map: IndexMap<K, V>) -> IndexMap<K, Arc<V>>
where
    K: std::hash::Hash + Eq,
{
    map.into_iter()
        .map(|(id, value)| (id, Arc::new(value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{model, write_model_files};
    use rstest::rstest;
    use tempfile::tempdir;

    #[test]
    fn test_model_from_path() {
        let dir = tempdir().unwrap();
        write_model_files(dir.path());

        let model = Model::from_path(dir.path()).unwrap();
        assert_eq!(
            model.reservoirs.keys().map(ReservoirID::as_str).collect::<Vec<_>>(),
            ["upper", "lower"]
        );
        assert_eq!(
            model.reservoirs["upper"].out_rivers,
            [RiverID::from("upper-lower")]
        );
        assert_eq!(
            model.reservoirs["lower"].in_rivers,
            [RiverID::from("upper-lower")]
        );
        assert_eq!(model.mountains.len(), 1);
        assert_eq!(model.weather_timesteps(), Some(4));
        assert_eq!(model.power_demand.len(), 4);
    }

    #[test]
    fn test_model_from_path_missing_rainfall() {
        let dir = tempdir().unwrap();
        write_model_files(dir.path());
        std::fs::remove_file(dir.path().join("rainfall.csv")).unwrap();

        assert!(Model::from_path(dir.path()).is_err());
    }

    #[rstest]
    fn test_series_lookup(model: Model) {
        assert!(!model.rainfall_for(&"upper".into()).is_empty());
        assert!(model.rainfall_for(&"nowhere".into()).is_empty());
        assert!(model.snow_for(&"nowhere".into()).is_empty());
    }
}
