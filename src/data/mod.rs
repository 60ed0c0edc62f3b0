/// Data layer: core types, loading, cleansing and the invalid-data ledger.
///
/// Architecture:
/// ```text
///  .csv / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → Table (raw)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ pipeline  │  below_zero → missing_value → outlier → latitude → longitude
///   └──────────┘
///        │
///        ├──────────────▶ Table (filtered, shares rows with raw)
///        ▼
///   ┌──────────┐
///   │  ledger   │  vessel → problem → column → removed count
///   └──────────┘
/// ```

pub mod ledger;
pub mod loader;
pub mod model;
pub mod pipeline;

#[cfg(test)]
pub(crate) mod fixtures;
