use std::collections::{BTreeMap, HashSet};

use log::{debug, warn};
use typed_index_collections::TiVec;

use super::{milp::Assignment, model::ModelHandles};
use crate::{
    itinerary::{
        CostBreakdown, FlightInfo, Itinerary, Leg, Metadata, OptimizationLevel, Route, StayCost,
        StayDetails,
    },
    problem::{Catalog, CityId, FlightId, TripParams},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stay {
    NotVisited,
    Visited { days: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChosenFlight {
    pub from: CityId,
    pub to: CityId,
    pub flight: FlightId,
}

/// The decisions read back from a solved model.
#[derive(Debug, Clone)]
pub struct ModelSolution {
    pub chosen: Vec<ChosenFlight>,
    pub stays: TiVec<CityId, Stay>,
    pub whole_days: TiVec<CityId, u32>,
    pub objective: f64,
    ready: TiVec<CityId, f64>,
}

impl ModelSolution {
    pub fn new(chosen: Vec<ChosenFlight>, stays: TiVec<CityId, Stay>, whole_days: TiVec<CityId, u32>) -> Self {
        let ready = stays.iter().map(|_| 0.0).collect();
        ModelSolution {
            chosen,
            stays,
            whole_days,
            objective: 0.0,
            ready,
        }
    }

    pub fn extract(handles: &ModelHandles, assignment: &Assignment, objective: f64) -> Self {
        let chosen = handles
            .flights
            .iter()
            .filter(|f| assignment.value(f.var) > 0.5)
            .map(|f| ChosenFlight {
                from: f.from,
                to: f.to,
                flight: f.flight,
            })
            .collect();

        let stays = handles
            .visited
            .iter_enumerated()
            .map(|(city, y)| {
                if assignment.value(*y) > 0.5 {
                    Stay::Visited {
                        days: assignment.value(handles.days[city]),
                    }
                } else {
                    Stay::NotVisited
                }
            })
            .collect();

        let whole_days = handles
            .whole_days
            .iter()
            .map(|v| assignment.value(*v).round().max(0.0) as u32)
            .collect();

        let ready = handles.ready.iter().map(|v| assignment.value(*v)).collect();

        ModelSolution {
            chosen,
            stays,
            whole_days,
            objective,
            ready,
        }
    }
}

/// Turn a solved model into an itinerary: walk the chosen flights from the
/// origin, then price the stays along the walked path.
pub fn decode(
    catalog: &Catalog,
    params: &TripParams,
    solution: &ModelSolution,
    max_steps: usize,
) -> Itinerary {
    let _p = hprof::enter("decode");
    let code = |c: CityId| catalog.city(c).code.clone();

    let mut successor: BTreeMap<CityId, ChosenFlight> = BTreeMap::new();
    for chosen in solution.chosen.iter() {
        if let Some(prev) = successor.insert(chosen.from, *chosen) {
            warn!(
                "Two chosen flights leave {}: {} and {}",
                code(chosen.from),
                prev.flight,
                chosen.flight
            );
            successor.insert(chosen.from, prev);
        }
    }

    let mut path = vec![params.origin];
    let mut legs = Vec::new();
    let mut current = params.origin;
    let mut steps = 0;
    while current != params.destination {
        if steps == max_steps {
            warn!("Path walk stopped after {} steps, chosen flights form a cycle", steps);
            break;
        }
        steps += 1;

        let Some(next) = successor.get(&current) else {
            warn!("Incomplete path, no chosen flight leaves {}", code(current));
            break;
        };

        let flight = match catalog.flight(next.flight) {
            Some(f) => FlightInfo::from(f),
            None => {
                warn!("Chosen flight {} is not in the catalog", next.flight);
                FlightInfo {
                    id: next.flight.to_string(),
                    duration_minutes: None,
                    ..Default::default()
                }
            }
        };
        debug!(
            "Leg {}->{} {} (ready at {:.1}h)",
            code(next.from),
            code(next.to),
            flight.id,
            solution.ready.get(next.to).copied().unwrap_or(0.0)
        );
        legs.push(Leg {
            from: code(next.from),
            to: code(next.to),
            flight,
        });
        path.push(next.to);
        current = next.to;
    }

    // Fares come from the chosen set rather than the walk, so a broken walk
    // still prices what the model picked.
    let flights_cost = solution
        .chosen
        .iter()
        .filter_map(|c| catalog.flight(c.flight))
        .map(|f| f.price)
        .sum::<f64>();

    let mut details = StayDetails::default();
    let mut costs = CostBreakdown {
        flights: flights_cost,
        ..Default::default()
    };
    let mut priced = HashSet::new();
    for city in path.iter().copied() {
        let days = solution.whole_days.get(city).copied().unwrap_or(0);
        if days == 0 || !priced.insert(city) {
            continue;
        }
        let rates = params.costs[city];
        let name = code(city);

        let hotel = rates.hotel * days as f64;
        let food_daily = rates.food * params.travellers;
        let food = food_daily * days as f64;
        costs.hotel += hotel;
        costs.food += food;
        costs.transfer += rates.transfer;

        details.hotel.push(StayCost {
            city: name.clone(),
            days,
            daily: rates.hotel,
            total: hotel,
        });
        details.food.push(StayCost {
            city: name.clone(),
            days,
            daily: food_daily,
            total: food,
        });
        details.transfer.push(StayCost {
            city: name,
            days,
            daily: rates.transfer,
            total: rates.transfer,
        });
    }
    costs.total = costs.flights + costs.hotel + costs.food + costs.transfer;

    Itinerary {
        route: Route {
            origin: code(params.origin),
            destination: code(params.destination),
            path: path.into_iter().map(code).collect(),
            legs,
        },
        costs,
        details,
        metadata: Metadata {
            level: OptimizationLevel::Optimal,
            note: String::new(),
            elapsed: 0.0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::OptimizerConfig, instances};

    fn setup() -> (Catalog, TripParams) {
        let catalog = instances::three_cities();
        let params = TripParams::from_request(
            &catalog,
            &instances::request("AAA", "CCC"),
            &OptimizerConfig::default(),
        )
        .unwrap();
        (catalog, params)
    }

    fn chosen(catalog: &Catalog, code: &str) -> ChosenFlight {
        let (id, f) = catalog
            .flights
            .iter_enumerated()
            .find(|(_, f)| f.code == code)
            .unwrap();
        ChosenFlight {
            from: f.from,
            to: f.to,
            flight: id,
        }
    }

    fn no_stays(catalog: &Catalog) -> (TiVec<CityId, Stay>, TiVec<CityId, u32>) {
        (
            catalog.cities.iter().map(|_| Stay::NotVisited).collect(),
            catalog.cities.iter().map(|_| 0).collect(),
        )
    }

    #[test]
    pub fn walks_from_origin_to_destination() {
        let (catalog, params) = setup();
        let (stays, mut days) = no_stays(&catalog);
        let c = catalog.city_id("CCC").unwrap();
        days[c] = 2;
        // Listed out of order on purpose.
        let solution = ModelSolution::new(
            vec![chosen(&catalog, "XY300"), chosen(&catalog, "XY200")],
            stays,
            days,
        );

        let it = decode(&catalog, &params, &solution, 100);
        assert_eq!(it.route.path, vec!["AAA", "BBB", "CCC"]);
        assert_eq!(it.route.legs.len(), 2);
        assert_eq!(it.route.legs[0].flight.code, "XY200");
        assert_eq!(it.costs.flights, 350.0);
        // CCC: hotel 120, food 40, transfer 25
        assert_eq!(it.costs.hotel, 240.0);
        assert_eq!(it.costs.food, 80.0);
        assert_eq!(it.costs.transfer, 25.0);
        assert_eq!(it.costs.total, 350.0 + 240.0 + 80.0 + 25.0);
        assert_eq!(it.details.hotel.len(), 1);
        assert_eq!(it.details.hotel[0].city, "CCC");
        assert_eq!(it.details.hotel[0].days, 2);
    }

    #[test]
    pub fn incomplete_path_is_returned_partially() {
        let (catalog, params) = setup();
        let (stays, mut days) = no_stays(&catalog);
        // BBB has days but is never reached on the walk.
        days[catalog.city_id("BBB").unwrap()] = 1;
        let solution = ModelSolution::new(vec![chosen(&catalog, "XY300")], stays, days);

        let it = decode(&catalog, &params, &solution, 100);
        assert_eq!(it.route.path, vec!["AAA"]);
        assert!(it.route.legs.is_empty());
        assert_eq!(it.costs.flights, 150.0);
        assert!(it.details.hotel.is_empty());
        assert!(!it.is_complete());
    }

    #[test]
    pub fn cycle_guard_stops_the_walk() {
        let (catalog, params) = setup();
        let (stays, days) = no_stays(&catalog);
        let a = catalog.city_id("AAA").unwrap();
        let b = catalog.city_id("BBB").unwrap();
        let ab = chosen(&catalog, "XY200");
        let ba = ChosenFlight {
            from: b,
            to: a,
            flight: ab.flight,
        };
        let solution = ModelSolution::new(vec![ab, ba], stays, days);

        let it = decode(&catalog, &params, &solution, 5);
        assert_eq!(it.route.legs.len(), 5);
        assert_eq!(it.route.path.len(), 6);
    }

    #[test]
    pub fn unknown_flight_yields_an_empty_leg() {
        let (catalog, params) = setup();
        let (stays, days) = no_stays(&catalog);
        let a = catalog.city_id("AAA").unwrap();
        let c = catalog.city_id("CCC").unwrap();
        let solution = ModelSolution::new(
            vec![ChosenFlight {
                from: a,
                to: c,
                flight: FlightId::from(999),
            }],
            stays,
            days,
        );

        let it = decode(&catalog, &params, &solution, 100);
        assert_eq!(it.route.path, vec!["AAA", "CCC"]);
        assert_eq!(it.route.legs[0].flight.duration_minutes, None);
        assert_eq!(it.route.legs[0].flight.price, 0.0);
        assert_eq!(it.costs.total, 0.0);
    }
}
