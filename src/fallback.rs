use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    time::Instant,
};

use log::{info, warn};

use crate::{
    config::OptimizerConfig,
    itinerary::{Itinerary, OptimizationLevel},
    parser::TripRequest,
    problem::{Catalog, FlightId, RequestError, TripParams},
    solvers::{basic, greedy, milp::MilpSolver, solve_trip, ModelError, PipelineError},
};

/// Result of one tier: either a finished itinerary or a hand-off to the
/// next tier.
pub enum Stage {
    Done(Itinerary),
    Continue,
}

type StageFn<'a, S> = fn(&FallbackOptimizer<'a, S>, &TripParams) -> Result<Stage, PipelineError>;

/// Runs the tiers in order until one produces a complete route. Always
/// returns an itinerary for a valid request; when every tier fails the
/// result is an empty route at the error level.
pub struct FallbackOptimizer<'a, S: MilpSolver> {
    catalog: &'a Catalog,
    solver: &'a S,
    config: &'a OptimizerConfig,
}

impl<'a, S: MilpSolver> FallbackOptimizer<'a, S> {
    pub fn new(catalog: &'a Catalog, solver: &'a S, config: &'a OptimizerConfig) -> Self {
        FallbackOptimizer {
            catalog,
            solver,
            config,
        }
    }

    pub fn optimize(&self, request: &TripRequest) -> Result<Itinerary, RequestError> {
        let params = TripParams::from_request(self.catalog, request, self.config)?;
        Ok(self.optimize_params(&params))
    }

    pub fn optimize_params(&self, params: &TripParams) -> Itinerary {
        let _p = hprof::enter("fallback");
        let start_time = Instant::now();

        let stages: [(&str, StageFn<'a, S>); 4] = [
            ("exact", Self::exact),
            ("relaxed", Self::relaxed),
            ("greedy", Self::greedy),
            ("basic", Self::basic),
        ];

        // Last failure other than an empty flight set, reported if no tier succeeds.
        let mut failure: Option<String> = None;
        for (name, stage) in stages {
            info!("Trying {} tier", name);
            match catch_unwind(AssertUnwindSafe(|| stage(self, params))) {
                Ok(Ok(Stage::Done(itinerary))) => {
                    let level = itinerary.metadata.level;
                    let note = itinerary.metadata.note.clone();
                    info!(
                        "{} tier succeeded, total cost {:.2}",
                        name, itinerary.costs.total
                    );
                    return itinerary.stamp(level, note, start_time.elapsed().as_secs_f64());
                }
                Ok(Ok(Stage::Continue)) => info!("{} tier found no route", name),
                Ok(Err(PipelineError::Model(ModelError::NoFlights))) => {
                    warn!("{} tier failed: no flights available", name)
                }
                Ok(Err(e)) => {
                    warn!("{} tier failed: {}", name, e);
                    failure = Some(e.to_string());
                }
                Err(_) => {
                    warn!("{} tier panicked", name);
                    failure = Some(format!("{} tier panicked", name));
                }
            }
        }

        let origin = &self.catalog.city(params.origin).code;
        let destination = &self.catalog.city(params.destination).code;
        let note = match failure {
            Some(e) => format!("Optimization failed: {}", e),
            None => format!(
                "No route found: no flights available from {} to {} on or after {}",
                origin, destination, params.travel_date
            ),
        };
        warn!("{}", note);
        Itinerary::empty(origin, destination, note.clone()).stamp(
            OptimizationLevel::Error,
            note,
            start_time.elapsed().as_secs_f64(),
        )
    }

    fn solved(&self, params: &TripParams, level: OptimizationLevel, note: &str) -> Result<Stage, PipelineError> {
        let time_limit = self.config.exact_time_limit();
        match solve_trip(self.catalog, params, self.solver, self.config, time_limit)? {
            Some(itinerary) if itinerary.is_complete() => Ok(Stage::Done(itinerary.stamp(level, note, 0.0))),
            Some(_) => {
                warn!("Decoded route does not reach the destination");
                Ok(Stage::Continue)
            }
            None => Ok(Stage::Continue),
        }
    }

    fn exact(&self, params: &TripParams) -> Result<Stage, PipelineError> {
        self.solved(params, OptimizationLevel::Optimal, "Optimal itinerary")
    }

    fn relaxed(&self, params: &TripParams) -> Result<Stage, PipelineError> {
        self.solved(
            &params.relaxed(self.config),
            OptimizationLevel::Good,
            "Stay bounds and flight-time budget were relaxed",
        )
    }

    fn from_route(&self, params: &TripParams, route: Vec<FlightId>, level: OptimizationLevel, note: &str) -> Stage {
        Stage::Done(Itinerary::from_flights(
            self.catalog,
            params.origin,
            params.destination,
            route.iter().map(|f| &self.catalog.flights[*f]),
            level,
            note,
        ))
    }

    fn greedy(&self, params: &TripParams) -> Result<Stage, PipelineError> {
        Ok(match greedy::solve_greedy(self.catalog, params, self.config.greedy_max_hops) {
            Some(route) => self.from_route(
                params,
                route,
                OptimizationLevel::Feasible,
                "Heuristic route, stay costs not included",
            ),
            None => Stage::Continue,
        })
    }

    fn basic(&self, params: &TripParams) -> Result<Stage, PipelineError> {
        Ok(match basic::basic_route(self.catalog, params, self.config) {
            Some(route) => self.from_route(
                params,
                route,
                OptimizationLevel::Basic,
                "Cheapest direct or one-stop route, required cities ignored",
            ),
            None => Stage::Continue,
        })
    }
}
