pub mod basic;
pub mod decode;
pub mod greedy;
pub mod milp;
pub mod model;

use std::time::Duration;

use log::{debug, info};

use crate::{
    config::OptimizerConfig,
    itinerary::Itinerary,
    problem::{Catalog, CityId, TripParams},
};
use milp::{MilpSolver, SolveOutcome};

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("origin and destination are the same city")]
    SameOriginAndDestination,
    #[error("city {0} is not in the catalog")]
    UnknownCity(CityId),
    #[error("no flights available")]
    NoFlights,
}

#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    #[error("solver backend failed: {0}")]
    Backend(String),
    #[error("model is unbounded")]
    Unbounded,
    #[error("solver worker panicked")]
    Panicked,
    #[error("could not start solver worker: {0}")]
    Spawn(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Solver(#[from] SolverError),
}

/// Build, solve and decode a single model. `Ok(None)` means the solver
/// reported the model infeasible or ran out of time.
pub fn solve_trip(
    catalog: &Catalog,
    params: &TripParams,
    solver: &impl MilpSolver,
    config: &OptimizerConfig,
    time_limit: Duration,
) -> Result<Option<Itinerary>, PipelineError> {
    let model = model::build_trip_model(catalog, params, config)?;
    let model::TripModel { program, handles } = model;

    match solver.solve(program, time_limit)? {
        SolveOutcome::Optimal {
            assignment,
            objective,
        } => {
            debug!("Optimal objective {:.2}", objective);
            let solution = decode::ModelSolution::extract(&handles, &assignment, objective);
            Ok(Some(decode::decode(
                catalog,
                params,
                &solution,
                config.decode_max_steps,
            )))
        }
        SolveOutcome::Infeasible => {
            info!("Model infeasible");
            Ok(None)
        }
        SolveOutcome::TimeLimitReached => {
            info!("Solver hit the {:.1}s time limit", time_limit.as_secs_f64());
            Ok(None)
        }
    }
}
