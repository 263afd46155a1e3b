// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::error::CliError;
use clap::Args as ClapArgs;
use modeprobe::driver;
use serde::Serialize;

#[derive(ClapArgs, Debug)]
pub struct Args {
    /// Driver runtime library to probe (overrides MODEPROBE_DRIVER_LIBRARY)
    #[arg(long)]
    library: Option<String>,
}

#[derive(Debug, Serialize)]
struct DriverInfo {
    version: String,
    library: String,
    loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    enumeration: Option<bool>,
    entry_points: Vec<EntryPoint>,
}

#[derive(Debug, Serialize)]
struct EntryPoint {
    symbol: &'static str,
    present: bool,
}

pub fn execute(args: Args, json: bool) -> Result<(), CliError> {
    log::debug!("Executing info command: {:?}", args);

    let library = args.library.unwrap_or_else(driver::library_path);

    // An explicit path bypasses the process-wide runtime.
    let loaded = driver::DriverRuntime::load(&library);

    let info = match &loaded {
        Ok(runtime) => DriverInfo {
            version: env!("CARGO_PKG_VERSION").to_string(),
            library: runtime.path().to_string(),
            loaded: true,
            error: None,
            enumeration: Some(runtime.supports_enumeration()),
            entry_points: runtime
                .entry_points()
                .into_iter()
                .map(|(symbol, present)| EntryPoint { symbol, present })
                .collect(),
        },
        Err(err) => {
            log::debug!("driver runtime unavailable: {}", err);
            DriverInfo {
                version: env!("CARGO_PKG_VERSION").to_string(),
                library: library.clone(),
                loaded: false,
                error: Some(err.to_string()),
                enumeration: None,
                entry_points: Vec::new(),
            }
        }
    };

    if json {
        let json_str = serde_json::to_string_pretty(&info)
            .map_err(|e| CliError::General(format!("JSON serialization failed: {}", e)))?;
        println!("{}", json_str);
        return Ok(());
    }

    println!("modeprobe {}", info.version);
    println!("Driver runtime: {}", info.library);
    match &info.error {
        None => {
            println!("  Status: loaded");
            if let Some(enumeration) = info.enumeration {
                println!(
                    "  Device enumeration: {}",
                    if enumeration { "yes" } else { "no" }
                );
            }
            for entry in &info.entry_points {
                println!(
                    "  {:<44} {}",
                    entry.symbol,
                    if entry.present { "yes" } else { "no" }
                );
            }
        }
        Some(err) => {
            println!("  Status: not available");
            println!("  Reason: {}", err);
        }
    }

    Ok(())
}
