use std::collections::BTreeSet;

use chrono::NaiveDate;
use log::{debug, trace};

use crate::problem::{Catalog, CityId, Flight, FlightId, TripParams};

/// What the next hop should aim for, in order of preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    RequiredCity,
    Destination,
    AnyUnvisited,
}

fn cheapest<'a>(
    candidates: impl Iterator<Item = (FlightId, &'a Flight)>,
) -> Option<(FlightId, &'a Flight)> {
    candidates.min_by(|(_, a), (_, b)| a.price.total_cmp(&b.price))
}

/// Build a route one hop at a time without any model. Each hop takes the
/// cheapest flight out of the current city dated on or after the search
/// date, and moves the search date to the day after that flight. Returns
/// `None` if no flight leads on or the hop limit is reached first.
pub fn solve_greedy(catalog: &Catalog, params: &TripParams, max_hops: usize) -> Option<Vec<FlightId>> {
    let _p = hprof::enter("greedy");

    let mut current = params.origin;
    let mut search_date: NaiveDate = params.travel_date;
    let mut visited = BTreeSet::from([params.origin]);
    let mut pending = params.must_visit.clone();
    let mut route = Vec::new();

    for hop in 0..max_hops {
        let outgoing = || {
            catalog
                .flights_from(current)
                .filter(|(_, f)| f.date >= search_date && !visited.contains(&f.to))
        };

        let choice = [Target::RequiredCity, Target::Destination, Target::AnyUnvisited]
            .into_iter()
            .find_map(|target| {
                let wanted = |to: CityId| match target {
                    Target::RequiredCity => pending.contains(&to),
                    Target::Destination => to == params.destination,
                    Target::AnyUnvisited => true,
                };
                cheapest(outgoing().filter(|(_, f)| wanted(f.to))).map(|c| (target, c))
            });

        let Some((target, (id, flight))) = choice else {
            debug!(
                "Greedy stuck in {} after {} hops",
                catalog.city(current).code,
                hop
            );
            return None;
        };
        trace!(
            "Greedy hop {}: {} -> {} ({:?}, {:.2})",
            hop,
            catalog.city(flight.from).code,
            catalog.city(flight.to).code,
            target,
            flight.price
        );

        route.push(id);
        visited.insert(flight.to);
        pending.remove(&flight.to);
        current = flight.to;
        search_date = flight.date.succ_opt().unwrap_or(flight.date);

        if current == params.destination {
            if !pending.is_empty() {
                debug!("Greedy reached the destination with {} required cities left", pending.len());
            }
            return Some(route);
        }
    }

    debug!("Greedy gave up after {} hops", max_hops);
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::OptimizerConfig, instances};

    fn params(catalog: &Catalog, must_visit: &[&str]) -> TripParams {
        let mut request = instances::request("AAA", "CCC");
        request.must_visit = must_visit.iter().map(|c| c.to_string()).collect();
        TripParams::from_request(catalog, &request, &OptimizerConfig::default()).unwrap()
    }

    fn codes(catalog: &Catalog, route: &[FlightId]) -> Vec<String> {
        route.iter().map(|f| catalog.flights[*f].code.clone()).collect()
    }

    #[test]
    pub fn goes_straight_to_the_destination() {
        let catalog = instances::three_cities();
        let route = solve_greedy(&catalog, &params(&catalog, &[]), 20).unwrap();
        assert_eq!(codes(&catalog, &route), vec!["XY100"]);
    }

    #[test]
    pub fn required_city_comes_first() {
        let catalog = instances::three_cities_with_overnight();
        let route = solve_greedy(&catalog, &params(&catalog, &["BBB"]), 20).unwrap();
        // Same-day XY300 is skipped because the search moved to the next day.
        assert_eq!(codes(&catalog, &route), vec!["XY200", "XY301"]);
    }

    #[test]
    pub fn dead_end_fails() {
        let catalog = instances::three_cities();
        // After BBB on the 10th there is nothing left on the 11th.
        assert!(solve_greedy(&catalog, &params(&catalog, &["BBB"]), 20).is_none());
    }

    #[test]
    pub fn unreachable_required_city_is_skipped() {
        let catalog = instances::three_cities_with_island();
        let route = solve_greedy(&catalog, &params(&catalog, &["DDD"]), 20).unwrap();
        assert_eq!(codes(&catalog, &route), vec!["XY100"]);
    }

    #[test]
    pub fn hop_limit_is_respected() {
        let catalog = instances::three_cities_with_overnight();
        assert!(solve_greedy(&catalog, &params(&catalog, &["BBB"]), 1).is_none());
    }
}
