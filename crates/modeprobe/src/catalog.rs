// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Display mode catalog
//!
//! Translates the opaque [`DisplayModeId`] a capture device reports into a
//! structured [`ModeDescriptor`]: the legacy numeric code and symbolic name
//! from a fixed table, combined with the geometry, frame rate and field
//! dominance the device reports for that mode.
//!
//! | Code | Name | Id |
//! |------|------|----|
//! | 0-2, 14-15 | SD (NTSC, PAL, progressive variants) | `ntsc`, `pal `, ... |
//! | 3-10, 16-18 | HD 1080 progressive/interlaced | `23ps`, `Hp25`, `Hi59`, ... |
//! | 11-13 | HD 720 progressive | `hp50`, `hp59`, `hp60` |
//! | 19-24 | 2K and 2K DCI | `2k23`, `2d24`, ... |
//! | 25-35 | 4K and 4K DCI | `4k23`, `4k59`, `4d25`, ... |
//!
//! Codes 30-32 (4K at 50/59.94/60) only exist from driver API 10.3.1. A
//! catalog built for an older [`ApiVersion`] treats them as unknown.
//!
//! # Example
//!
//! ```
//! use modeprobe::catalog::{ApiVersion, ModeCatalog};
//! use modeprobe::device::DisplayModeId;
//!
//! let catalog = ModeCatalog::default();
//! let entry = catalog.lookup(DisplayModeId::new(b"Hp59")).unwrap();
//! assert_eq!(entry.code, 17);
//! assert_eq!(entry.name, "bmdModeHD1080p5994");
//!
//! let legacy = ModeCatalog::new(ApiVersion::new(10, 2, 0));
//! assert!(legacy.lookup(DisplayModeId::new(b"4k60")).is_none());
//! ```

use std::fmt;
use std::str::FromStr;

use crate::device::{CaptureDevice, DisplayModeId, FieldDominance, FrameRate, ModeFacts};
use crate::Error;

/// Driver API version, packed as `0xMMmmpp00` like the driver headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApiVersion(u32);

impl ApiVersion {
    /// First API version exposing 4K at 50, 59.94 and 60 fps.
    pub const HFR_4K: ApiVersion = ApiVersion::new(10, 3, 1);

    pub const fn new(major: u8, minor: u8, patch: u8) -> Self {
        ApiVersion(((major as u32) << 24) | ((minor as u32) << 16) | ((patch as u32) << 8))
    }

    pub const fn from_raw(raw: u32) -> Self {
        ApiVersion(raw)
    }

    pub const fn as_raw(&self) -> u32 {
        self.0
    }

    pub fn major(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub fn minor(&self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub fn patch(&self) -> u8 {
        (self.0 >> 8) as u8
    }
}

impl Default for ApiVersion {
    fn default() -> Self {
        ApiVersion::HFR_4K
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major(), self.minor(), self.patch())
    }
}

impl FromStr for ApiVersion {
    type Err = String;

    /// Parse `major[.minor[.patch]]`, e.g. `10.3.1` or `11`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = [0u8; 3];
        let mut count = 0;
        for part in s.trim().split('.') {
            if count == parts.len() {
                return Err(format!("too many components in API version: {}", s));
            }
            parts[count] = part
                .parse::<u8>()
                .map_err(|_| format!("invalid API version component {:?} in {}", part, s))?;
            count += 1;
        }
        Ok(ApiVersion::new(parts[0], parts[1], parts[2]))
    }
}

/// One row of the catalog table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: DisplayModeId,
    /// Legacy numeric code printed by older tooling.
    pub code: i32,
    /// Symbolic name as spelled in the driver headers.
    pub name: &'static str,
    /// Minimum driver API version for this mode, if gated.
    pub since: Option<ApiVersion>,
}

const fn entry(id: &[u8; 4], code: i32, name: &'static str) -> CatalogEntry {
    CatalogEntry {
        id: DisplayModeId::new(id),
        code,
        name,
        since: None,
    }
}

const fn gated(id: &[u8; 4], code: i32, name: &'static str) -> CatalogEntry {
    CatalogEntry {
        id: DisplayModeId::new(id),
        code,
        name,
        since: Some(ApiVersion::HFR_4K),
    }
}

static ENTRIES: [CatalogEntry; 36] = [
    entry(b"ntsc", 0, "bmdModeNTSC"),
    entry(b"nt23", 1, "bmdModeNTSC2398"),
    entry(b"pal ", 2, "bmdModePAL"),
    entry(b"ntsp", 14, "bmdModeNTSCp"),
    entry(b"palp", 15, "bmdModePALp"),
    entry(b"23ps", 3, "bmdModeHD1080p2398"),
    entry(b"24ps", 4, "bmdModeHD1080p24"),
    entry(b"Hp25", 5, "bmdModeHD1080p25"),
    entry(b"Hp29", 6, "bmdModeHD1080p2997"),
    entry(b"Hp30", 7, "bmdModeHD1080p30"),
    entry(b"Hi50", 8, "bmdModeHD1080i50"),
    entry(b"Hi59", 9, "bmdModeHD1080i5994"),
    entry(b"Hi60", 10, "bmdModeHD1080i6000"),
    entry(b"Hp50", 16, "bmdModeHD1080p50"),
    entry(b"Hp59", 17, "bmdModeHD1080p5994"),
    entry(b"Hp60", 18, "bmdModeHD1080p6000"),
    entry(b"hp50", 11, "bmdModeHD720p50"),
    entry(b"hp59", 12, "bmdModeHD720p5994"),
    entry(b"hp60", 13, "bmdModeHD720p60"),
    entry(b"2k23", 19, "bmdMode2k2398"),
    entry(b"2k24", 20, "bmdMode2k24"),
    entry(b"2k25", 21, "bmdMode2k25"),
    entry(b"2d23", 22, "bmdMode2kDCI2398"),
    entry(b"2d24", 23, "bmdMode2kDCI24"),
    entry(b"2d25", 24, "bmdMode2kDCI25"),
    entry(b"4k23", 25, "bmdMode4K2160p2398"),
    entry(b"4k24", 26, "bmdMode4K2160p24"),
    entry(b"4k25", 27, "bmdMode4K2160p25"),
    entry(b"4k29", 28, "bmdMode4K2160p2997"),
    entry(b"4k30", 29, "bmdMode4K2160p30"),
    gated(b"4k50", 30, "bmdMode4K2160p50"),
    gated(b"4k59", 31, "bmdMode4K2160p5994"),
    gated(b"4k60", 32, "bmdMode4K2160p60"),
    entry(b"4d23", 33, "bmdMode4kDCI2398"),
    entry(b"4d24", 34, "bmdMode4kDCI24"),
    entry(b"4d25", 35, "bmdMode4kDCI25"),
];

/// Structured description of a detected display mode.
///
/// Only produced by [`ModeCatalog::describe`] and friends; there is no public
/// constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeDescriptor {
    id: DisplayModeId,
    code: i32,
    name: &'static str,
    width: u32,
    height: u32,
    frame_rate: FrameRate,
    field_dominance: FieldDominance,
}

impl ModeDescriptor {
    pub(crate) fn from_parts(entry: &CatalogEntry, facts: ModeFacts) -> Self {
        Self {
            id: entry.id,
            code: entry.code,
            name: entry.name,
            width: facts.width,
            height: facts.height,
            frame_rate: facts.frame_rate,
            field_dominance: facts.field_dominance,
        }
    }

    pub fn id(&self) -> DisplayModeId {
        self.id
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn frame_rate(&self) -> FrameRate {
        self.frame_rate
    }

    pub fn field_dominance(&self) -> FieldDominance {
        self.field_dominance
    }
}

impl fmt::Display for ModeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}x{} @ {}, {})",
            self.name, self.width, self.height, self.frame_rate, self.field_dominance
        )
    }
}

/// Fixed, stateless mode table filtered by driver API version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModeCatalog {
    api_version: ApiVersion,
}

impl ModeCatalog {
    /// Create a catalog exposing the modes available at `api_version`.
    pub fn new(api_version: ApiVersion) -> Self {
        Self { api_version }
    }

    pub fn api_version(&self) -> ApiVersion {
        self.api_version
    }

    /// All entries visible at this catalog's API version, in legacy code order.
    pub fn entries(&self) -> Vec<&'static CatalogEntry> {
        let mut entries: Vec<&'static CatalogEntry> =
            ENTRIES.iter().filter(|e| self.visible(e)).collect();
        entries.sort_by_key(|e| e.code);
        entries
    }

    /// Look up a mode identifier.
    ///
    /// Returns `None` for identifiers outside the table and for gated
    /// identifiers above this catalog's API version.
    pub fn lookup(&self, id: DisplayModeId) -> Option<&'static CatalogEntry> {
        ENTRIES.iter().find(|e| e.id == id && self.visible(e))
    }

    /// Look up a legacy numeric code.
    pub fn by_code(&self, code: i32) -> Option<&'static CatalogEntry> {
        ENTRIES.iter().find(|e| e.code == code && self.visible(e))
    }

    /// Look up a symbolic name (`bmdModeHD1080p5994`).
    pub fn by_name(&self, name: &str) -> Option<&'static CatalogEntry> {
        ENTRIES.iter().find(|e| e.name == name && self.visible(e))
    }

    /// Describe `id` by combining the table entry with facts queried from `device`.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownMode`] if `id` is not in the table. This is a normal
    ///   outcome; callers report the mode as unknown and carry on.
    /// - [`Error::Device`] if the device cannot describe the mode.
    pub fn describe(
        &self,
        id: DisplayModeId,
        device: &dyn CaptureDevice,
    ) -> Result<ModeDescriptor, Error> {
        let entry = self.lookup(id).ok_or(Error::UnknownMode(id))?;
        let facts = device.mode_facts(id)?;
        Ok(ModeDescriptor::from_parts(entry, facts))
    }

    /// Describe `id` from facts that were already queried.
    pub fn describe_with(
        &self,
        id: DisplayModeId,
        facts: ModeFacts,
    ) -> Result<ModeDescriptor, Error> {
        let entry = self.lookup(id).ok_or(Error::UnknownMode(id))?;
        Ok(ModeDescriptor::from_parts(entry, facts))
    }

    fn visible(&self, entry: &CatalogEntry) -> bool {
        entry.since.map_or(true, |since| self.api_version >= since)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn table_is_consistent() {
        let ids: HashSet<_> = ENTRIES.iter().map(|e| e.id).collect();
        let codes: HashSet<_> = ENTRIES.iter().map(|e| e.code).collect();
        let names: HashSet<_> = ENTRIES.iter().map(|e| e.name).collect();
        assert_eq!(ids.len(), ENTRIES.len());
        assert_eq!(codes.len(), ENTRIES.len());
        assert_eq!(names.len(), ENTRIES.len());
        assert_eq!(codes, (0..36).collect::<HashSet<i32>>());
    }

    #[test]
    fn entries_sorted_by_code() {
        let codes: Vec<i32> = ModeCatalog::default()
            .entries()
            .iter()
            .map(|e| e.code)
            .collect();
        assert_eq!(codes, (0..36).collect::<Vec<i32>>());
    }

    #[test]
    fn gated_modes_hidden_on_old_api() {
        let catalog = ModeCatalog::new(ApiVersion::new(10, 3, 0));
        assert_eq!(catalog.entries().len(), 33);
        for code in 30..=32 {
            assert!(catalog.by_code(code).is_none());
        }
        assert!(catalog.by_name("bmdMode4K2160p5994").is_none());
        assert!(catalog.lookup(DisplayModeId::new(b"4k30")).is_some());
    }

    #[test]
    fn gated_modes_visible_from_threshold() {
        let catalog = ModeCatalog::new(ApiVersion::HFR_4K);
        let entry = catalog.lookup(DisplayModeId::new(b"4k59")).unwrap();
        assert_eq!(entry.code, 31);
        assert_eq!(entry.since, Some(ApiVersion::HFR_4K));
    }

    #[test]
    fn api_version_parse() {
        assert_eq!("10.3.1".parse::<ApiVersion>(), Ok(ApiVersion::HFR_4K));
        assert_eq!("11".parse::<ApiVersion>(), Ok(ApiVersion::new(11, 0, 0)));
        assert_eq!(ApiVersion::HFR_4K.as_raw(), 0x0a03_0100);
        assert_eq!(ApiVersion::HFR_4K.to_string(), "10.3.1");
        assert!("10.x".parse::<ApiVersion>().is_err());
        assert!("1.2.3.4".parse::<ApiVersion>().is_err());
    }

    #[test]
    fn describe_with_facts() {
        let catalog = ModeCatalog::default();
        let facts = ModeFacts {
            width: 1280,
            height: 720,
            frame_rate: FrameRate::new(50, 1),
            field_dominance: FieldDominance::ProgressiveFrame,
        };
        let desc = catalog
            .describe_with(DisplayModeId::new(b"hp50"), facts)
            .unwrap();
        assert_eq!(desc.code(), 11);
        assert_eq!(desc.name(), "bmdModeHD720p50");
        assert_eq!(desc.width(), 1280);
        assert_eq!(
            desc.to_string(),
            "bmdModeHD720p50 (1280x720 @ 50/1, progressive frame)"
        );

        match catalog.describe_with(DisplayModeId::new(b"zzzz"), facts) {
            Err(Error::UnknownMode(id)) => assert_eq!(id, DisplayModeId::new(b"zzzz")),
            other => panic!("expected UnknownMode, got {:?}", other),
        }
    }
}
