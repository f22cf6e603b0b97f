mod gs;

pub use gs::{GsSolver, SolverBody, SolverConfig};
