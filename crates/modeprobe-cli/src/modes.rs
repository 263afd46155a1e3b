// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Catalog listing.

use crate::error::CliError;
use crate::utils::format_fps;
use clap::Args as ClapArgs;
use modeprobe::catalog::{ApiVersion, ModeCatalog};
use modeprobe::sim::nominal_facts;
use serde::Serialize;

#[derive(ClapArgs, Debug)]
pub struct Args {
    /// Driver API version used to gate catalog entries
    #[arg(long, default_value_t = ApiVersion::default())]
    api_version: ApiVersion,
}

#[derive(Debug, Serialize)]
struct ModeListing {
    code: i32,
    name: &'static str,
    fourcc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    since: Option<String>,
    width: u32,
    height: u32,
    fps: f64,
    field_dominance: &'static str,
}

pub fn execute(args: Args, json: bool) -> Result<(), CliError> {
    log::debug!("Executing modes command: {:?}", args);

    let catalog = ModeCatalog::new(args.api_version);
    let listings: Vec<ModeListing> = catalog
        .entries()
        .into_iter()
        .map(|entry| {
            let facts = nominal_facts(entry.id);
            ModeListing {
                code: entry.code,
                name: entry.name,
                fourcc: entry.id.to_string(),
                since: entry.since.map(|v| v.to_string()),
                width: facts.map_or(0, |f| f.width),
                height: facts.map_or(0, |f| f.height),
                fps: facts.map_or(0.0, |f| f.frame_rate.as_f64()),
                field_dominance: facts.map_or("unknown", |f| f.field_dominance.description()),
            }
        })
        .collect();

    if json {
        let json_str = serde_json::to_string_pretty(&listings)
            .map_err(|e| CliError::General(format!("JSON serialization failed: {}", e)))?;
        println!("{}", json_str);
        return Ok(());
    }

    println!("Display modes (API {}):", catalog.api_version());
    for mode in &listings {
        println!(
            "  {:>2}  {:<4}  {:<20} {:>4}x{:<4} {:>8} fps  {}",
            mode.code,
            mode.fourcc,
            mode.name,
            mode.width,
            mode.height,
            format_fps(mode.fps),
            mode.field_dominance
        );
    }
    println!("{} modes", listings.len());

    Ok(())
}
