use std::{
    collections::HashMap,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::mpsc::{channel, RecvTimeoutError},
    time::{Duration, Instant},
};

use good_lp::{default_solver, ResolutionError, Solution, SolverModel, Variable};
use log::{debug, warn};

use super::{model::LinearProgram, SolverError};

/// Variable values from a solved program. Variables the solver did not
/// report read as zero.
#[derive(Debug, Default, Clone)]
pub struct Assignment {
    values: HashMap<Variable, f64>,
}

impl Assignment {
    pub fn value(&self, var: Variable) -> f64 {
        self.values.get(&var).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, var: Variable, value: f64) {
        self.values.insert(var, value);
    }
}

#[derive(Debug)]
pub enum SolveOutcome {
    Optimal { assignment: Assignment, objective: f64 },
    Infeasible,
    TimeLimitReached,
}

/// Anything that can take a built program and return a status within a
/// time limit.
pub trait MilpSolver: Send + Sync {
    fn solve(&self, program: LinearProgram, time_limit: Duration) -> Result<SolveOutcome, SolverError>;
}

/// `good_lp` with its default backend, run on a worker thread so the
/// caller gets control back when the time limit expires. A timed-out worker
/// is left to finish on its own.
#[derive(Debug, Default, Clone, Copy)]
pub struct GoodLpSolver;

impl MilpSolver for GoodLpSolver {
    fn solve(&self, program: LinearProgram, time_limit: Duration) -> Result<SolveOutcome, SolverError> {
        let _p = hprof::enter("milp solve");
        let start_time = Instant::now();
        let (tx, rx) = channel();

        std::thread::Builder::new()
            .name("milp-worker".into())
            .spawn(move || {
                let result = catch_unwind(AssertUnwindSafe(|| run(program)));
                let _ = tx.send(result);
            })?;

        let outcome = match rx.recv_timeout(time_limit) {
            Ok(Ok(result)) => result,
            Ok(Err(_)) | Err(RecvTimeoutError::Disconnected) => {
                warn!("Solver worker died");
                Err(SolverError::Panicked)
            }
            Err(RecvTimeoutError::Timeout) => Ok(SolveOutcome::TimeLimitReached),
        };
        debug!(
            "Solve finished in {:.3}s",
            start_time.elapsed().as_secs_f64()
        );
        outcome
    }
}

fn run(program: LinearProgram) -> Result<SolveOutcome, SolverError> {
    let LinearProgram {
        vars,
        objective,
        constraints,
        registry,
    } = program;

    let mut model = vars.minimise(objective.clone()).using(default_solver);
    for c in constraints {
        model.add_constraint(c);
    }

    match model.solve() {
        Ok(solution) => {
            let mut assignment = Assignment::default();
            for var in registry {
                assignment.set(var, solution.value(var));
            }
            Ok(SolveOutcome::Optimal {
                assignment,
                objective: solution.eval(objective),
            })
        }
        Err(ResolutionError::Infeasible) => Ok(SolveOutcome::Infeasible),
        Err(ResolutionError::Unbounded) => Err(SolverError::Unbounded),
        Err(e) => Err(SolverError::Backend(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::OptimizerConfig, instances, problem::TripParams, solvers::model};

    #[test]
    pub fn solves_the_three_city_model() {
        let catalog = instances::three_cities();
        let config = OptimizerConfig::default();
        let params =
            TripParams::from_request(&catalog, &instances::request("AAA", "CCC"), &config).unwrap();
        let model = model::build_trip_model(&catalog, &params, &config).unwrap();

        let outcome = GoodLpSolver
            .solve(model.program, Duration::from_secs(30))
            .unwrap();
        match outcome {
            SolveOutcome::Optimal {
                assignment,
                objective,
            } => {
                let chosen = model
                    .handles
                    .flights
                    .iter()
                    .filter(|f| assignment.value(f.var) > 0.5)
                    .count();
                assert_eq!(chosen, 2);
                // 350 in fares, plus a transfer in each of the three cities.
                assert!((objective - (350.0 + 20.0 + 15.0 + 25.0)).abs() < 1e-4);
            }
            other => panic!("expected optimal, got {:?}", other),
        }
    }

    #[test]
    pub fn reports_infeasible_models() {
        let catalog = instances::three_cities();
        let config = OptimizerConfig::default();
        let mut params =
            TripParams::from_request(&catalog, &instances::request("AAA", "CCC"), &config).unwrap();
        params.max_flight_hours = 1.0;
        let model = model::build_trip_model(&catalog, &params, &config).unwrap();

        assert!(matches!(
            GoodLpSolver.solve(model.program, Duration::from_secs(30)),
            Ok(SolveOutcome::Infeasible)
        ));
    }
}
