//! Daily tuber crop growth simulation driven by weather, cultivar and soil parameters.
pub mod canopy;
pub mod climate;
pub mod errors;
pub mod model;
pub mod output;
pub mod parameters;
pub mod stress;
pub mod water;

pub use climate::{ClimateSeries, WeatherDay};
pub use errors::{SolanumError, SolanumResult};
pub use model::{DailyOutput, SimulationState, SolanumModel};
pub use output::{ResultsRow, ResultsTable};
pub use parameters::{ParameterSet, RawParameters};
