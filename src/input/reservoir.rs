//! Code for reading the reservoirs CSV file.
use super::*;
use crate::reservoir::{ReservoirID, ReservoirParameters};
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;

const RESERVOIRS_FILE_NAME: &str = "reservoirs.csv";

/// A map of [`ReservoirParameters`], keyed by reservoir ID
pub type ReservoirParametersMap = IndexMap<ReservoirID, ReservoirParameters>;

#[derive(PartialEq, Debug, Deserialize)]
struct ReservoirRaw {
    id: String,
    water_area: f64,
    basin_area: f64,
    capacity: f64,
    #[serde(deserialize_with = "deserialise_proportion")]
    initial_fill: f64,
    #[serde(deserialize_with = "deserialise_proportion")]
    generator_efficiency: f64,
    generator_head_height: f64,
    max_generator_flow: f64,
}

/// Read reservoirs from the reservoirs CSV file.
///
/// The connections to rivers are left empty; these are filled in once the rivers have been read.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
///
/// # Returns
///
/// A map of reservoirs, in the order in which they appear in the file
pub fn read_reservoirs(model_dir: &Path) -> Result<ReservoirParametersMap> {
    let file_path = model_dir.join(RESERVOIRS_FILE_NAME);
    let reservoirs_csv = read_csv(&file_path)?;
    read_reservoirs_from_iter(reservoirs_csv).with_context(|| input_err_msg(&file_path))
}

fn read_reservoirs_from_iter<I>(iter: I) -> Result<ReservoirParametersMap>
where
    I: Iterator<Item = ReservoirRaw>,
{
    let mut map = IndexMap::new();
    for raw in iter {
        ensure!(
            raw.capacity.is_finite() && raw.capacity > 0.0,
            "Capacity of reservoir {} must be a finite number greater than zero",
            raw.id
        );
        check_non_negative("water_area", raw.water_area)?;
        check_non_negative("basin_area", raw.basin_area)?;
        check_non_negative("generator_head_height", raw.generator_head_height)?;
        check_non_negative("max_generator_flow", raw.max_generator_flow)?;

        let id = ReservoirID::from(raw.id);
        let reservoir = ReservoirParameters {
            id: id.clone(),
            water_area: raw.water_area,
            basin_area: raw.basin_area,
            capacity: raw.capacity,
            initial_fill: raw.initial_fill,
            generator_efficiency: raw.generator_efficiency,
            generator_head_height: raw.generator_head_height,
            max_generator_flow: raw.max_generator_flow,
            out_rivers: Vec::new(),
            in_rivers: Vec::new(),
        };

        ensure!(
            map.insert(id.clone(), reservoir).is_none(),
            "Duplicate reservoir ID {id}"
        );
    }

    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn reservoir_raw(id: &str, capacity: f64) -> ReservoirRaw {
        ReservoirRaw {
            id: id.into(),
            water_area: 10.0,
            basin_area: 100.0,
            capacity,
            initial_fill: 0.5,
            generator_efficiency: 0.9,
            generator_head_height: 40.0,
            max_generator_flow: 20.0,
        }
    }

    #[test]
    fn test_read_reservoirs() {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(RESERVOIRS_FILE_NAME)).unwrap();
            writeln!(
                file,
                "id,water_area,basin_area,capacity,initial_fill,generator_efficiency,generator_head_height,max_generator_flow
upper,10,100,1000,0.5,0.9,40,20
lower,20,200,2000,1.0,0.8,30,10"
            )
            .unwrap();
        }

        let reservoirs = read_reservoirs(dir.path()).unwrap();
        assert_eq!(
            reservoirs.keys().map(ReservoirID::as_str).collect::<Vec<_>>(),
            ["upper", "lower"]
        );
        let lower = &reservoirs["lower"];
        assert_eq!(lower.capacity, 2000.0);
        assert_eq!(lower.initial_fill, 1.0);
        assert_eq!(lower.generator_efficiency, 0.8);
        assert!(lower.out_rivers.is_empty());
    }

    #[test]
    fn test_read_reservoirs_bad_efficiency() {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(RESERVOIRS_FILE_NAME)).unwrap();
            writeln!(
                file,
                "id,water_area,basin_area,capacity,initial_fill,generator_efficiency,generator_head_height,max_generator_flow
upper,10,100,1000,0.5,1.5,40,20"
            )
            .unwrap();
        }

        assert!(read_reservoirs(dir.path()).is_err());
    }

    #[test]
    fn test_read_reservoirs_from_iter_duplicate() {
        let iter = [reservoir_raw("a", 1.0), reservoir_raw("a", 2.0)].into_iter();
        assert_error!(read_reservoirs_from_iter(iter), "Duplicate reservoir ID a");
    }

    #[test]
    fn test_read_reservoirs_from_iter_bad_capacity() {
        let iter = std::iter::once(reservoir_raw("a", 0.0));
        assert_error!(
            read_reservoirs_from_iter(iter),
            "Capacity of reservoir a must be a finite number greater than zero"
        );
    }
}
