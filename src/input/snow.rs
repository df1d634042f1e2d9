//! Code for reading the snow CSV file.
use super::*;
use crate::id::IDCollection;
use crate::mountain::{MountainID, SnowSample};
use anyhow::{Context, Result, ensure};
use indexmap::IndexSet;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

const SNOW_FILE_NAME: &str = "snow.csv";

/// Snow series for each mountain, one sample per timestep
pub type SnowMap = HashMap<MountainID, Arc<[SnowSample]>>;

#[derive(PartialEq, Debug, Deserialize)]
struct SnowRaw {
    mountain_id: String,
    temperature: f64,
    snow_height: f64,
}

/// Read snow series from the snow CSV file.
///
/// Every mountain must have at least one row. If there are no mountains, the file may be omitted.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `mountain_ids` - All possible mountain IDs
pub fn read_snow(model_dir: &Path, mountain_ids: &IndexSet<MountainID>) -> Result<SnowMap> {
    let file_path = model_dir.join(SNOW_FILE_NAME);
    if mountain_ids.is_empty() {
        return Ok(SnowMap::new());
    }

    let snow_csv = read_csv(&file_path)?;
    read_snow_from_iter(snow_csv, mountain_ids).with_context(|| input_err_msg(&file_path))
}

fn read_snow_from_iter<I>(iter: I, mountain_ids: &IndexSet<MountainID>) -> Result<SnowMap>
where
    I: Iterator<Item = SnowRaw>,
{
    let mut series: HashMap<MountainID, Vec<SnowSample>> = HashMap::new();
    for raw in iter {
        let id = mountain_ids.get_id_by_str(&raw.mountain_id)?;
        ensure!(
            raw.temperature.is_finite(),
            "Invalid temperature for mountain {id}"
        );
        check_non_negative("snow_height", raw.snow_height)?;

        series.entry(id).or_default().push(SnowSample {
            temperature: raw.temperature,
            snow_height: raw.snow_height,
        });
    }

    for id in mountain_ids {
        ensure!(
            series.contains_key(id),
            "Missing snow data for mountain {id}"
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

    fn mountain_ids() -> IndexSet<MountainID> {
        std::iter::once(MountainID::from("peak")).collect()
    }

    #[test]
    fn test_read_snow() {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(SNOW_FILE_NAME)).unwrap();
            writeln!(
                file,
                "mountain_id,temperature,snow_height\npeak,-2.5,1.2\npeak,1.0,1.1"
            )
            .unwrap();
        }

        let snow = read_snow(dir.path(), &mountain_ids()).unwrap();
        assert_eq!(
            *snow["peak"],
            [
                SnowSample {
                    temperature: -2.5,
                    snow_height: 1.2
                },
                SnowSample {
                    temperature: 1.0,
                    snow_height: 1.1
                }
            ]
        );
    }

    #[test]
    fn test_read_snow_no_mountains() {
        let dir = tempdir().unwrap();
        assert!(read_snow(dir.path(), &IndexSet::new()).unwrap().is_empty());
    }

    #[test]
    fn test_read_snow_from_iter_negative_height() {
        let iter = std::iter::once(SnowRaw {
            mountain_id: "peak".into(),
            temperature: 0.0,
            snow_height: -1.0,
        });
        assert_error!(
            read_snow_from_iter(iter, &mountain_ids()),
            "snow_height must be a finite number greater than or equal to zero"
        );
    }

    #[test]
    fn test_read_snow_from_iter_missing_mountain() {
        assert_error!(
            read_snow_from_iter(std::iter::empty(), &mountain_ids()),
            "Missing snow data for mountain peak"
        );
    }
}
