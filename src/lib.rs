//! fitforge - workout-export normalizer and activity encoder
//!
//! fitforge ingests the heterogeneous workout-export JSON a fitness-equipment
//! platform produces and renders each workout into interoperable activity
//! files through a deterministic pipeline: source-shape adaptation →
//! canonical normalization → series reconstruction → TCX/FIT encoding.
//!
//! ## Modules
//!
//! - **adapters**: map the three source shapes onto one canonical `Workout`
//! - **series**: heart-rate anchor interpolation and sample ordering
//! - **encoders**: TCX trackpoint documents and FIT activity messages

pub mod adapters;
pub mod clock;
pub mod encoders;
pub mod error;
pub mod options;
pub mod pipeline;
pub mod series;
pub mod types;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::ExportError;
pub use options::resolve_export_opts;
pub use pipeline::{apply_time_override, Exporter, SourceShape};
pub use types::{Metrics, SeriesPoint, Source, Workout, WorkoutExportOpts};

/// Crate version embedded in encoder output
pub const FORGE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name embedded in encoder output
pub const PRODUCER_NAME: &str = "fitforge";
