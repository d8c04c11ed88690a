mod engine;
mod tax;
mod types;

pub use engine::{aggregate_percentiles, run_simulation, simulate_trajectory};
pub use tax::compute_deductions;
pub use types::{
    Parameters, PercentileRow, SimulationError, SimulationRun, Trajectory, YearSnapshot,
};
