//! Code for reading the rainfall CSV file.
use super::*;
use crate::id::IDCollection;
use crate::reservoir::{RainSample, ReservoirID};
use anyhow::{Context, Result, ensure};
use indexmap::IndexSet;
use serde::Deserialize;
use serde::de::Deserializer;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

const RAINFALL_FILE_NAME: &str = "rainfall.csv";

/// Rainfall series for each reservoir, one sample per timestep
pub type RainfallMap = HashMap<ReservoirID, Arc<[RainSample]>>;

#[derive(PartialEq, Debug, Deserialize)]
struct RainfallRaw {
    reservoir_id: String,
    #[serde(deserialize_with = "deserialise_flag")]
    is_raining: bool,
    #[serde(deserialize_with = "deserialise_proportion")]
    forecast_probability: f64,
}

/// Read a boolean flag, accepting the spellings commonly found in weather data
fn deserialise_flag<'de, D>(deserialiser: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserialiser)?;
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "y" => Ok(true),
        "0" | "false" | "no" | "n" => Ok(false),
        _ => Err(serde::de::Error::custom(format!(
            "Invalid value for flag: {value}"
        ))),
    }
}

/// Read rainfall series from the rainfall CSV file.
///
/// Rows are grouped by reservoir and kept in file order, so the nth row for a reservoir gives the
/// weather at timestep n. Every reservoir must have at least one row.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `reservoir_ids` - All possible reservoir IDs
pub fn read_rainfall(model_dir: &Path, reservoir_ids: &IndexSet<ReservoirID>) -> Result<RainfallMap> {
    let file_path = model_dir.join(RAINFALL_FILE_NAME);
    let rainfall_csv = read_csv(&file_path)?;
    read_rainfall_from_iter(rainfall_csv, reservoir_ids).with_context(|| input_err_msg(&file_path))
}

fn read_rainfall_from_iter<I>(iter: I, reservoir_ids: &IndexSet<ReservoirID>) -> Result<RainfallMap>
where
    I: Iterator<Item = RainfallRaw>,
{
    let mut series: HashMap<ReservoirID, Vec<RainSample>> = HashMap::new();
    for raw in iter {
        let id = reservoir_ids.get_id_by_str(&raw.reservoir_id)?;
        series.entry(id).or_default().push(RainSample {
            is_raining: raw.is_raining,
            forecast_probability: raw.forecast_probability,
        });
    }

    for id in reservoir_ids {
        ensure!(
            series.contains_key(id),
            "Missing rainfall data for reservoir {id}"
        );
    }

    Ok(series
        .into_iter()
        .map(|(id, samples)| (id, Arc::from(samples)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn reservoir_ids() -> IndexSet<ReservoirID> {
        ["upper", "lower"].into_iter().map(ReservoirID::from).collect()
    }

    #[test]
    fn test_read_rainfall() {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(RAINFALL_FILE_NAME)).unwrap();
            writeln!(
                file,
                "reservoir_id,is_raining,forecast_probability
upper,1,0.8
lower,no,0.1
upper,False,0.2
lower,Y,0.6"
            )
            .unwrap();
        }

        let rainfall = read_rainfall(dir.path(), &reservoir_ids()).unwrap();
        assert_eq!(
            *rainfall["upper"],
            [
                RainSample {
                    is_raining: true,
                    forecast_probability: 0.8
                },
                RainSample {
                    is_raining: false,
                    forecast_probability: 0.2
                }
            ]
        );
        assert_eq!(
            rainfall["lower"].iter().map(|s| s.is_raining).collect::<Vec<_>>(),
            [false, true]
        );
    }

    #[test]
    fn test_read_rainfall_bad_flag() {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(RAINFALL_FILE_NAME)).unwrap();
            writeln!(
                file,
                "reservoir_id,is_raining,forecast_probability\nupper,maybe,0.8\nlower,0,0.1"
            )
            .unwrap();
        }

        assert!(read_rainfall(dir.path(), &reservoir_ids()).is_err());
    }

    #[test]
    fn test_read_rainfall_from_iter_missing_reservoir() {
        let iter = std::iter::once(RainfallRaw {
            reservoir_id: "upper".into(),
            is_raining: true,
            forecast_probability: 0.5,
        });
        assert_error!(
            read_rainfall_from_iter(iter, &reservoir_ids()),
            "Missing rainfall data for reservoir lower"
        );
    }
}
