// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Capture driver runtime probe
//!
//! Loads the vendor driver runtime (`libDeckLinkAPI.so` by default) at run
//! time and reports which of its factory entry points are exported. No
//! compile-time linking is involved, so the crate builds and runs on hosts
//! without the driver installed.
//!
//! The environment variable `MODEPROBE_DRIVER_LIBRARY` overrides the library
//! path.
//!
//! ```no_run
//! use modeprobe::driver;
//!
//! match driver::init() {
//!     Ok(runtime) => {
//!         for (symbol, present) in runtime.entry_points() {
//!             println!("{}: {}", symbol, if present { "yes" } else { "no" });
//!         }
//!     }
//!     Err(err) => eprintln!("{}", err),
//! }
//! ```

use std::sync::{Mutex, OnceLock};

use crate::Error;

/// Library loaded when `MODEPROBE_DRIVER_LIBRARY` is not set.
pub const DEFAULT_LIBRARY: &str = "libDeckLinkAPI.so";

/// Environment variable overriding the library path.
pub const LIBRARY_ENV: &str = "MODEPROBE_DRIVER_LIBRARY";

/// Factory entry points looked up in the runtime, newest interface first.
pub const ENTRY_POINTS: &[&str] = &[
    "CreateDeckLinkIteratorInstance_0004",
    "CreateDeckLinkIteratorInstance_0003",
    "CreateDeckLinkIteratorInstance_0002",
    "CreateDeckLinkDiscoveryInstance_0003",
    "CreateDeckLinkAPIInformationInstance_0001",
    "CreateVideoConversionInstance_0001",
];

static RUNTIME: OnceLock<DriverRuntime> = OnceLock::new();
static INIT_LOCK: Mutex<()> = Mutex::new(());

/// A loaded driver runtime library.
#[derive(Debug)]
pub struct DriverRuntime {
    path: String,
    library: libloading::Library,
}

impl DriverRuntime {
    /// Load the runtime from `path`.
    pub fn load(path: &str) -> Result<DriverRuntime, Error> {
        // Loading runs the library's initialisers; the driver runtime has no
        // preconditions on them.
        let library = unsafe { libloading::Library::new(path)? };
        log::debug!("loaded driver runtime {}", path);
        Ok(DriverRuntime {
            path: path.to_owned(),
            library,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether the runtime exports `symbol`.
    pub fn has_symbol(&self, symbol: &str) -> bool {
        // The symbol is only resolved, never called.
        unsafe {
            self.library
                .get::<unsafe extern "C" fn()>(symbol.as_bytes())
                .is_ok()
        }
    }

    /// Every known entry point with whether it is exported.
    pub fn entry_points(&self) -> Vec<(&'static str, bool)> {
        ENTRY_POINTS
            .iter()
            .map(|symbol| (*symbol, self.has_symbol(symbol)))
            .collect()
    }

    /// Whether devices can be enumerated through this runtime.
    pub fn supports_enumeration(&self) -> bool {
        ENTRY_POINTS
            .iter()
            .filter(|symbol| symbol.starts_with("CreateDeckLinkIteratorInstance"))
            .any(|symbol| self.has_symbol(symbol))
    }
}

/// Path the runtime is loaded from.
pub fn library_path() -> String {
    std::env::var(LIBRARY_ENV).unwrap_or_else(|_| DEFAULT_LIBRARY.to_string())
}

/// Load the driver runtime once and return the shared instance.
///
/// Later calls return the cached runtime. A failed load is not cached.
pub fn init() -> Result<&'static DriverRuntime, Error> {
    if let Some(runtime) = RUNTIME.get() {
        return Ok(runtime);
    }

    let _guard = INIT_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    // Double-check after acquiring lock
    if let Some(runtime) = RUNTIME.get() {
        return Ok(runtime);
    }

    let runtime = DriverRuntime::load(&library_path())?;
    Ok(RUNTIME.get_or_init(|| runtime))
}

/// The runtime if [`init`] already succeeded.
pub fn try_runtime() -> Option<&'static DriverRuntime> {
    RUNTIME.get()
}
