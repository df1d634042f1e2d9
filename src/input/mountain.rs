//! Code for reading the mountains CSV file.
use super::*;
use crate::id::IDCollection;
use crate::mountain::{MountainID, MountainParameters};
use crate::reservoir::ReservoirID;
use anyhow::{Context, Result, ensure};
use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;
use std::path::Path;

const MOUNTAINS_FILE_NAME: &str = "mountains.csv";

/// A map of [`MountainParameters`], keyed by mountain ID
pub type MountainParametersMap = IndexMap<MountainID, MountainParameters>;

#[derive(PartialEq, Debug, Deserialize)]
struct MountainRaw {
    id: String,
    output_reservoir: String,
    snow_area: f64,
}

/// Read mountains from the mountains CSV file.
///
/// A model does not need to have any mountains, so this file is optional.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `reservoir_ids` - All possible reservoir IDs
pub fn read_mountains(
    model_dir: &Path,
    reservoir_ids: &IndexSet<ReservoirID>,
) -> Result<MountainParametersMap> {
    let file_path = model_dir.join(MOUNTAINS_FILE_NAME);
    let mountains_csv = read_csv_optional(&file_path)?;
    read_mountains_from_iter(mountains_csv, reservoir_ids)
        .with_context(|| input_err_msg(&file_path))
}

fn read_mountains_from_iter<I>(
    iter: I,
    reservoir_ids: &IndexSet<ReservoirID>,
) -> Result<MountainParametersMap>
where
    I: Iterator<Item = MountainRaw>,
{
    let mut map = IndexMap::new();
    for raw in iter {
        check_non_negative("snow_area", raw.snow_area)?;
        let output_reservoir = reservoir_ids.get_id_by_str(&raw.output_reservoir)?;

        let id = MountainID::from(raw.id);
        let mountain = MountainParameters {
            id: id.clone(),
            output_reservoir,
            snow_area: raw.snow_area,
        };

        ensure!(
            map.insert(id.clone(), mountain).is_none(),
            "Duplicate mountain ID {id}"
        );
    }

    Ok(map)
}
