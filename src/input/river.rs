//! Code for reading the rivers CSV file.
use super::*;
use crate::id::IDCollection;
use crate::input::reservoir::ReservoirParametersMap;
use crate::reservoir::ReservoirID;
use crate::river::{RiverID, RiverParameters};
use anyhow::{Context, Result, ensure};
use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;
use std::path::Path;

const RIVERS_FILE_NAME: &str = "rivers.csv";

/// A map of [`RiverParameters`], keyed by river ID
pub type RiverParametersMap = IndexMap<RiverID, RiverParameters>;

#[derive(PartialEq, Debug, Deserialize)]
struct RiverRaw {
    id: String,
    initial_water: f64,
    length_in_timesteps: usize,
    max_flow: f64,
    #[serde(default)]
    input_reservoirs: String,
    #[serde(default)]
    output_reservoir: Option<String>,
}

/// Parse a string of reservoir IDs separated by semicolons.
///
/// The string may be empty, for rivers which aren't fed by any reservoir.
fn parse_reservoir_list(
    s: &str,
    reservoir_ids: &IndexSet<ReservoirID>,
) -> Result<Vec<ReservoirID>> {
    s.split(';')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| reservoir_ids.get_id_by_str(id))
        .collect()
}

/// Read rivers from the rivers CSV file.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `reservoir_ids` - All possible reservoir IDs
///
/// # Returns
///
/// A map of rivers, in the order in which they appear in the file
pub fn read_rivers(
    model_dir: &Path,
    reservoir_ids: &IndexSet<ReservoirID>,
) -> Result<RiverParametersMap> {
    let file_path = model_dir.join(RIVERS_FILE_NAME);
    let rivers_csv = read_csv(&file_path)?;
    read_rivers_from_iter(rivers_csv, reservoir_ids).with_context(|| input_err_msg(&file_path))
}

fn read_rivers_from_iter<I>(
    iter: I,
    reservoir_ids: &IndexSet<ReservoirID>,
) -> Result<RiverParametersMap>
where
    I: Iterator<Item = RiverRaw>,
{
    let mut map = IndexMap::new();
    for raw in iter {
        ensure!(
            raw.length_in_timesteps > 0,
            "River {} must be at least one timestep long",
            raw.id
        );
        check_non_negative("initial_water", raw.initial_water)?;
        check_non_negative("max_flow", raw.max_flow)?;

        let input_reservoirs = parse_reservoir_list(&raw.input_reservoirs, reservoir_ids)?;
        let output_reservoir = raw
            .output_reservoir
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| reservoir_ids.get_id_by_str(id))
            .transpose()?;

        let id = RiverID::from(raw.id);
        let river = RiverParameters {
            id: id.clone(),
            initial_water: raw.initial_water,
            length_in_timesteps: raw.length_in_timesteps,
            max_flow: raw.max_flow,
            input_reservoirs,
            output_reservoir,
        };

        ensure!(
            map.insert(id.clone(), river).is_none(),
            "Duplicate river ID {id}"
        );
    }

    Ok(map)
}

/// Record which rivers flow out of and into each reservoir
pub fn connect_rivers(reservoirs: &mut ReservoirParametersMap, rivers: &RiverParametersMap) {
    for river in rivers.values() {
        for reservoir_id in &river.input_reservoirs {
            let reservoir = reservoirs
                .get_mut(reservoir_id)
                .expect("River input should have been validated");
            if !reservoir.out_rivers.contains(&river.id) {
                reservoir.out_rivers.push(river.id.clone());
            }
        }

        if let Some(reservoir_id) = &river.output_reservoir {
            let reservoir = reservoirs
                .get_mut(reservoir_id)
                .expect("River output should have been validated");
            reservoir.in_rivers.push(river.id.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, reservoir_parameters};
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn reservoir_ids() -> IndexSet<ReservoirID> {
        ["upper", "lower"].into_iter().map(ReservoirID::from).collect()
    }

    fn river_raw(id: &str, input_reservoirs: &str, output_reservoir: Option<&str>) -> RiverRaw {
        RiverRaw {
            id: id.into(),
            initial_water: 10.0,
            length_in_timesteps: 2,
            max_flow: 100.0,
            input_reservoirs: input_reservoirs.into(),
            output_reservoir: output_reservoir.map(String::from),
        }
    }

    #[test]
    fn test_parse_reservoir_list() {
        let ids = reservoir_ids();
        assert!(parse_reservoir_list("", &ids).unwrap().is_empty());
        assert_eq!(
            parse_reservoir_list("upper; lower", &ids).unwrap(),
            [ReservoirID::from("upper"), ReservoirID::from("lower")]
        );
        assert!(parse_reservoir_list("upper;middle", &ids).is_err());
    }

    #[test]
    fn test_read_rivers() {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(RIVERS_FILE_NAME)).unwrap();
            writeln!(
                file,
                "id,initial_water,length_in_timesteps,max_flow,input_reservoirs,output_reservoir
upper-lower,10,2,100,upper,lower
lower-ocean,0,3,50,lower,"
            )
            .unwrap();
        }

        let rivers = read_rivers(dir.path(), &reservoir_ids()).unwrap();
        assert_eq!(rivers.len(), 2);
        assert_eq!(
            rivers["upper-lower"].output_reservoir,
            Some("lower".into())
        );
        assert_eq!(rivers["lower-ocean"].output_reservoir, None);
        assert_eq!(rivers["lower-ocean"].length_in_timesteps, 3);
    }

    #[test]
    fn test_read_rivers_from_iter_unknown_reservoir() {
        let iter = std::iter::once(river_raw("river", "upper", Some("middle")));
        assert_error!(
            read_rivers_from_iter(iter, &reservoir_ids()),
            "Unknown ID middle found"
        );
    }

    #[test]
    fn test_read_rivers_from_iter_zero_length() {
        let mut raw = river_raw("river", "upper", None);
        raw.length_in_timesteps = 0;
        assert_error!(
            read_rivers_from_iter(std::iter::once(raw), &reservoir_ids()),
            "River river must be at least one timestep long"
        );
    }

    #[test]
    fn test_read_rivers_from_iter_duplicate() {
        let iter = [river_raw("river", "", None), river_raw("river", "", None)].into_iter();
        assert_error!(
            read_rivers_from_iter(iter, &reservoir_ids()),
            "Duplicate river ID river"
        );
    }

    #[test]
    fn test_connect_rivers() {
        let mut reservoirs: ReservoirParametersMap = ["upper", "lower"]
            .into_iter()
            .map(|id| (ReservoirID::from(id), reservoir_parameters(id)))
            .collect();
        let rivers = read_rivers_from_iter(
            [
                river_raw("upper-lower", "upper", Some("lower")),
                river_raw("both-ocean", "upper;lower", None),
            ]
            .into_iter(),
            &reservoir_ids(),
        )
        .unwrap();

        connect_rivers(&mut reservoirs, &rivers);
        assert_eq!(
            reservoirs["upper"].out_rivers,
            [RiverID::from("upper-lower"), RiverID::from("both-ocean")]
        );
        assert!(reservoirs["upper"].in_rivers.is_empty());
        assert_eq!(reservoirs["lower"].out_rivers, [RiverID::from("both-ocean")]);
        assert_eq!(reservoirs["lower"].in_rivers, [RiverID::from("upper-lower")]);
    }
}
