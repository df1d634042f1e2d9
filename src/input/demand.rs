//! Code for reading the power demand CSV file.
use super::*;
use anyhow::{Context, Result};
use log::warn;
use serde::Deserialize;
use std::path::Path;

const POWER_DEMAND_FILE_NAME: &str = "power_demand.csv";

#[derive(PartialEq, Debug, Deserialize)]
struct DemandRaw {
    demand: f64,
}

/// Read the power demand series from the power demand CSV file.
///
/// Each row gives the demand per player for one timestep. The file is optional: if it is absent,
/// there is no demand and no power will be sold.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
pub fn read_power_demand(model_dir: &Path) -> Result<Vec<f64>> {
    let file_path = model_dir.join(POWER_DEMAND_FILE_NAME);
    let demand_csv = read_csv_optional(&file_path)?;
    let demand =
        read_power_demand_from_iter(demand_csv).with_context(|| input_err_msg(&file_path))?;
    if demand.is_empty() {
        warn!("No power demand data found. Demand will be zero for the whole match.");
    }

    Ok(demand)
}

fn read_power_demand_from_iter<I>(iter: I) -> Result<Vec<f64>>
where
    I: Iterator<Item = DemandRaw>,
{
    iter.map(|raw| {
        check_non_negative("demand", raw.demand)?;
        Ok(raw.demand)
    })
    .collect()
}
