use log::debug;

use crate::{
    config::OptimizerConfig,
    problem::{Catalog, FlightId, TripParams},
};

/// Cheapest flight from origin to destination departing on the travel date.
pub fn cheapest_direct(catalog: &Catalog, params: &TripParams) -> Option<FlightId> {
    catalog
        .flights_from(params.origin)
        .filter(|(_, f)| f.to == params.destination && f.date == params.travel_date)
        .min_by(|(_, a), (_, b)| a.price.total_cmp(&b.price))
        .map(|(id, _)| id)
}

/// Cheapest pair of flights through one intermediate city, the first leaving
/// on the travel date and the second departing within the connection window
/// after the first lands.
pub fn cheapest_one_stop(
    catalog: &Catalog,
    params: &TripParams,
    config: &OptimizerConfig,
) -> Option<(FlightId, FlightId)> {
    let mut best: Option<(f64, FlightId, FlightId)> = None;
    for (first_id, first) in catalog
        .flights_from(params.origin)
        .filter(|(_, f)| f.date == params.travel_date && f.to != params.destination)
    {
        let earliest = first.arrival() + config.min_connection_hours;
        let latest = first.arrival() + config.max_connection_hours;
        for (second_id, second) in catalog.flights_from(first.to).filter(|(_, f)| {
            f.to == params.destination && f.departure >= earliest && f.departure <= latest
        }) {
            let cost = first.price + second.price;
            if best.map_or(true, |(c, _, _)| cost < c) {
                best = Some((cost, first_id, second_id));
            }
        }
    }
    best.map(|(_, a, b)| (a, b))
}

/// The last-resort route: a direct flight, else a single connection.
/// Required cities are not considered.
pub fn basic_route(catalog: &Catalog, params: &TripParams, config: &OptimizerConfig) -> Option<Vec<FlightId>> {
    let _p = hprof::enter("basic route");
    if let Some(direct) = cheapest_direct(catalog, params) {
        debug!("Basic route: direct flight {}", catalog.flights[direct].key);
        return Some(vec![direct]);
    }
    if let Some((a, b)) = cheapest_one_stop(catalog, params, config) {
        debug!(
            "Basic route: {} then {}",
            catalog.flights[a].key, catalog.flights[b].key
        );
        return Some(vec![a, b]);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instances;

    fn params(catalog: &Catalog) -> TripParams {
        TripParams::from_request(
            catalog,
            &instances::request("AAA", "CCC"),
            &OptimizerConfig::default(),
        )
        .unwrap()
    }

    #[test]
    pub fn direct_flight_wins() {
        let catalog = instances::three_cities();
        let p = params(&catalog);
        let route = basic_route(&catalog, &p, &OptimizerConfig::default()).unwrap();
        assert_eq!(route.len(), 1);
        assert_eq!(catalog.flights[route[0]].code, "XY100");
    }

    #[test]
    pub fn one_stop_respects_connection_window() {
        let catalog = instances::three_cities_with_overnight();
        let p = params(&catalog);
        let config = OptimizerConfig::default();

        // XY200 lands 10:00, XY300 leaves 14:00: a 4h connection.
        let (a, b) = cheapest_one_stop(&catalog, &p, &config).unwrap();
        assert_eq!(catalog.flights[a].code, "XY200");
        assert_eq!(catalog.flights[b].code, "XY300");

        let tight = OptimizerConfig {
            max_connection_hours: 3.0,
            ..OptimizerConfig::default()
        };
        assert!(cheapest_one_stop(&catalog, &p, &tight).is_none());

        let loose = OptimizerConfig {
            min_connection_hours: 5.0,
            max_connection_hours: 30.0,
            ..OptimizerConfig::default()
        };
        let (_, b) = cheapest_one_stop(&catalog, &p, &loose).unwrap();
        assert_eq!(catalog.flights[b].code, "XY301");
    }

    #[test]
    pub fn nothing_on_the_travel_date() {
        let catalog = instances::three_cities();
        let mut p = params(&catalog);
        p.travel_date = p.travel_date.succ_opt().unwrap();
        assert!(basic_route(&catalog, &p, &OptimizerConfig::default()).is_none());
    }
}
