/// Data layer: table extraction, grouping, and merging.
///
/// Architecture:
/// ```text
///  <date>_..._<wavelength>.csv  (one per measurement)
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  marker → header → rows → RawTable, label, wavelength
///   └──────────┘
///        │  BTreeMap<wavelength, Vec<SourceTable>>
///        ▼
///   ┌──────────┐
///   │  merge    │  outer join on power_percentage_values → MergedTable
///   └──────────┘
/// ```

pub mod loader;
pub mod merge;
pub mod model;
