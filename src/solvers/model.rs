use std::collections::BTreeMap;

use good_lp::{variable, Constraint, Expression, ProblemVariables, Variable, VariableDefinition};
use log::debug;
use typed_index_collections::TiVec;

use super::ModelError;
use crate::{
    config::OptimizerConfig,
    problem::{Catalog, CityId, FlightId, TripParams},
};

/// Variables, constraints and objective, ready to hand to a solver.
pub struct LinearProgram {
    pub(crate) vars: ProblemVariables,
    pub(crate) objective: Expression,
    pub(crate) constraints: Vec<Constraint>,
    /// Every variable added, so the solver can read back a full assignment.
    pub(crate) registry: Vec<Variable>,
}

impl LinearProgram {
    fn new() -> Self {
        LinearProgram {
            vars: ProblemVariables::new(),
            objective: Expression::default(),
            constraints: Vec::new(),
            registry: Vec::new(),
        }
    }

    fn add_var(&mut self, def: VariableDefinition) -> Variable {
        let var = self.vars.add(def);
        self.registry.push(var);
        var
    }

    fn add_constr(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    pub fn n_vars(&self) -> usize {
        self.registry.len()
    }

    pub fn n_constraints(&self) -> usize {
        self.constraints.len()
    }
}

pub struct FlightVar {
    pub from: CityId,
    pub to: CityId,
    pub flight: FlightId,
    pub var: Variable,
}

/// Where each decision lives in the program, for decoding the assignment.
pub struct ModelHandles {
    pub flights: Vec<FlightVar>,
    pub visited: TiVec<CityId, Variable>,
    pub days: TiVec<CityId, Variable>,
    pub whole_days: TiVec<CityId, Variable>,
    pub ready: TiVec<CityId, Variable>,
    pub order: TiVec<CityId, Variable>,
    pub big_m: f64,
}

pub struct TripModel {
    pub program: LinearProgram,
    pub handles: ModelHandles,
}

fn sum(vars: impl IntoIterator<Item = Variable>) -> Expression {
    let mut e = Expression::default();
    for v in vars {
        e.add_mul(1.0, v);
    }
    e
}

fn per_city(
    lp: &mut LinearProgram,
    catalog: &Catalog,
    prefix: &str,
    def: impl Fn() -> VariableDefinition,
) -> TiVec<CityId, Variable> {
    catalog
        .cities
        .iter()
        .map(|c| lp.add_var(def().name(format!("{}_{}", prefix, c.code))))
        .collect()
}

/// Flights on or after the travel date, grouped by ordered city pair.
fn eligible_arcs(catalog: &Catalog, params: &TripParams) -> BTreeMap<(CityId, CityId), Vec<FlightId>> {
    catalog
        .arcs()
        .filter_map(|(pair, flights)| {
            let flights = flights
                .iter()
                .copied()
                .filter(|f| catalog.flights[*f].date >= params.travel_date)
                .collect::<Vec<_>>();
            (!flights.is_empty()).then(|| (pair, flights))
        })
        .collect()
}

pub fn build_trip_model(
    catalog: &Catalog,
    params: &TripParams,
    config: &OptimizerConfig,
) -> Result<TripModel, ModelError> {
    let _p = hprof::enter("build model");

    if params.origin == params.destination {
        return Err(ModelError::SameOriginAndDestination);
    }
    for city in [params.origin, params.destination] {
        if catalog.cities.get(city).is_none() {
            return Err(ModelError::UnknownCity(city));
        }
    }

    let arcs = eligible_arcs(catalog, params);
    let latest_arrival = arcs
        .values()
        .flatten()
        .map(|f| catalog.flights[*f].arrival())
        .fold(None, |acc: Option<f64>, a| Some(acc.map_or(a, |m| m.max(a))))
        .ok_or(ModelError::NoFlights)?;
    let big_m = latest_arrival + params.hours_per_day * params.total_days + config.big_m_margin;
    let n = catalog.cities.len() as f64;
    let code = |c: CityId| catalog.city(c).code.as_str();

    let mut lp = LinearProgram::new();

    // Flight choice
    let mut flights = Vec::new();
    for ((from, to), fs) in arcs.iter() {
        for f in fs.iter() {
            let var = lp.add_var(variable().binary().name(format!(
                "x_{}_{}_{}",
                code(*from),
                code(*to),
                catalog.flights[*f].key
            )));
            flights.push(FlightVar {
                from: *from,
                to: *to,
                flight: *f,
                var,
            });
        }
    }

    let visited = per_city(&mut lp, catalog, "y", || variable().binary());
    let ready = per_city(&mut lp, catalog, "t", || variable().min(0.0));
    let days = per_city(&mut lp, catalog, "d", || variable().min(0.0));
    let whole_days = per_city(&mut lp, catalog, "dias", || variable().integer().min(0.0));
    let order = per_city(&mut lp, catalog, "u", || variable().min(0.0).max(n));

    // Objective
    let mut objective = Expression::default();
    for fv in flights.iter() {
        objective.add_mul(catalog.flights[fv.flight].price, fv.var);
    }
    for (city, costs) in params.costs.iter_enumerated() {
        let daily = costs.hotel + costs.food * params.travellers + config.whole_day_tiebreak;
        objective.add_mul(daily, whole_days[city]);
        objective.add_mul(costs.transfer, visited[city]);
    }
    lp.objective = objective;

    // Origin and destination are always visited; so are the cities the
    // traveller insists on.
    lp.add_constr(Expression::from(visited[params.origin]).eq(1.0));
    lp.add_constr(Expression::from(visited[params.destination]).eq(1.0));
    for city in params.must_visit.iter() {
        lp.add_constr(Expression::from(visited[*city]).eq(1.0));
    }

    // At most one flight per ordered pair
    let mut arc_flow: BTreeMap<(CityId, CityId), Expression> = BTreeMap::new();
    for fv in flights.iter() {
        arc_flow
            .entry((fv.from, fv.to))
            .or_default()
            .add_mul(1.0, fv.var);
    }
    for flow in arc_flow.values() {
        lp.add_constr(flow.clone().leq(1.0));
    }

    // Flow conservation and degree/visit coupling. The visit flag is pinned
    // to 1 at both ends, so it stands in for the constant there.
    for (city, _) in catalog.cities.iter_enumerated() {
        let outgoing = flights.iter().filter(|f| f.from == city).map(|f| f.var).collect::<Vec<_>>();
        let incoming = flights.iter().filter(|f| f.to == city).map(|f| f.var).collect::<Vec<_>>();
        let out_flow = sum(outgoing.iter().copied());
        let in_flow = sum(incoming.iter().copied());
        let y = visited[city];

        if city == params.origin {
            lp.add_constr((out_flow.clone() - in_flow.clone() - y).eq(0.0));
            lp.add_constr((out_flow - y).eq(0.0));
            if !incoming.is_empty() {
                lp.add_constr(in_flow.leq(0.0));
            }
        } else if city == params.destination {
            lp.add_constr((out_flow.clone() - in_flow.clone() + y).eq(0.0));
            lp.add_constr((in_flow - y).eq(0.0));
            if !outgoing.is_empty() {
                lp.add_constr(out_flow.leq(0.0));
            }
        } else {
            if !incoming.is_empty() || !outgoing.is_empty() {
                lp.add_constr((out_flow.clone() - in_flow.clone()).eq(0.0));
            }
            lp.add_constr((in_flow - y).eq(0.0));
            lp.add_constr((out_flow - y).eq(0.0));
        }
    }

    // Node potentials against subtours
    for (city, _) in catalog.cities.iter_enumerated() {
        lp.add_constr((order[city] - n * visited[city]).leq(0.0));
    }
    lp.add_constr(Expression::from(order[params.origin]).eq(0.0));
    for ((from, to), flow) in arc_flow.iter() {
        lp.add_constr((order[*from] - order[*to] + flow.clone() * n).leq(n - 1.0));
    }

    // Stay duration, zero when the city is not visited
    let mut total_days = Expression::default();
    for (city, bounds) in params.stays.iter_enumerated() {
        let y = visited[city];
        lp.add_constr((days[city] - bounds.max * y).leq(0.0));
        lp.add_constr((days[city] - bounds.min * y).geq(0.0));
        lp.add_constr((whole_days[city] - days[city]).geq(0.0));
        lp.add_constr((whole_days[city] - bounds.max.ceil() * y).leq(0.0));
        total_days.add_mul(1.0, days[city]);
    }
    lp.add_constr(total_days.eq(params.total_days));

    // Sequencing: leave after the stay, arrive after landing.
    for fv in flights.iter() {
        let flight = &catalog.flights[fv.flight];
        lp.add_constr(
            (ready[fv.from] + params.hours_per_day * days[fv.from] + big_m * fv.var)
                .leq(flight.departure + big_m),
        );
        lp.add_constr((ready[fv.to] - big_m * fv.var).geq(flight.arrival() - big_m));
    }
    lp.add_constr(Expression::from(ready[params.origin]).eq(0.0));

    // Total time in the air
    let mut air_time = Expression::default();
    for fv in flights.iter() {
        air_time.add_mul(catalog.flights[fv.flight].duration, fv.var);
    }
    lp.add_constr(air_time.leq(params.max_flight_hours));

    debug!(
        "Built trip model {}->{}: {} arcs, {} vars, {} constraints, big-M {:.1}",
        code(params.origin),
        code(params.destination),
        arc_flow.len(),
        lp.n_vars(),
        lp.n_constraints(),
        big_m
    );

    Ok(TripModel {
        program: lp,
        handles: ModelHandles {
            flights,
            visited,
            days,
            whole_days,
            ready,
            order,
            big_m,
        },
    })
}
