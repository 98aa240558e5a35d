use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use derive_more::{Display, From};
use log::{debug, warn};
use typed_index_collections::TiVec;

use crate::config::OptimizerConfig;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Display)]
#[display(fmt = "c{}", _0)]
pub struct CityId(u32);

impl From<CityId> for usize {
    fn from(v: CityId) -> Self {
        v.0 as usize
    }
}

impl From<usize> for CityId {
    fn from(x: usize) -> Self {
        CityId(x as u32)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Display)]
#[display(fmt = "f{}", _0)]
pub struct FlightId(u32);

impl From<FlightId> for usize {
    fn from(v: FlightId) -> Self {
        v.0 as usize
    }
}

impl From<usize> for FlightId {
    fn from(x: usize) -> Self {
        FlightId(x as u32)
    }
}

/// Canonical flight identifier, `{code}_{date}_{departure time}`. Built once
/// when the catalog is loaded and used both for model variable names and for
/// lookups from the outside.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Display, From)]
pub struct FlightKey(String);

impl FlightKey {
    pub fn new(code: &str, date: NaiveDate, departure_time: NaiveTime) -> Self {
        FlightKey(format!(
            "{}_{}_{}",
            code,
            date.format("%Y-%m-%d"),
            departure_time.format("%H:%M:%S")
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone)]
pub struct City {
    pub code: String,
    pub name: String,
    pub country: String,
    pub hotel_daily: f64,
    pub food_daily: f64,
    pub transfer: f64,
}

#[derive(Debug, Clone)]
pub struct Flight {
    pub key: FlightKey,
    pub from: CityId,
    pub to: CityId,
    pub carrier: String,
    pub code: String,
    pub date: NaiveDate,
    pub departure_time: NaiveTime,
    /// Hours since the catalog epoch.
    pub departure: f64,
    /// Hours.
    pub duration: f64,
    pub price: f64,
}

impl Flight {
    pub fn arrival(&self) -> f64 {
        self.departure + self.duration
    }

    pub fn duration_minutes(&self) -> f64 {
        self.duration * 60.0
    }
}

#[derive(Debug, Default)]
pub struct Catalog {
    pub epoch: NaiveDateTime,
    pub cities: TiVec<CityId, City>,
    pub flights: TiVec<FlightId, Flight>,
    city_index: HashMap<String, CityId>,
    flight_index: HashMap<FlightKey, FlightId>,
    arcs: BTreeMap<(CityId, CityId), Vec<FlightId>>,
}

impl Catalog {
    pub fn new(epoch: NaiveDateTime) -> Self {
        Catalog {
            epoch,
            ..Default::default()
        }
    }

    pub fn add_city(&mut self, city: City) -> CityId {
        if let Some(id) = self.city_index.get(&city.code) {
            warn!("City {} listed twice, keeping the first entry", city.code);
            return *id;
        }
        let code = city.code.clone();
        let id = self.cities.push_and_get_key(city);
        self.city_index.insert(code, id);
        id
    }

    /// Adds a flight between two distinct known cities. Returns `None` for a
    /// flight that starts and ends in the same city, or if the key is already
    /// present.
    #[allow(clippy::too_many_arguments)]
    pub fn add_flight(
        &mut self,
        from: CityId,
        to: CityId,
        carrier: &str,
        code: &str,
        date: NaiveDate,
        departure_time: NaiveTime,
        duration_minutes: f64,
        price: f64,
    ) -> Option<FlightId> {
        let key = FlightKey::new(code, date, departure_time);
        if from == to {
            warn!("Flight {} starts and ends in {}, skipping", key, self.cities[from].code);
            return None;
        }
        if self.flight_index.contains_key(&key) {
            warn!("Duplicate flight {}, skipping", key);
            return None;
        }

        let departure =
            (NaiveDateTime::new(date, departure_time) - self.epoch).num_seconds() as f64 / 3600.0;
        let id = self.flights.push_and_get_key(Flight {
            key: key.clone(),
            from,
            to,
            carrier: carrier.to_string(),
            code: code.to_string(),
            date,
            departure_time,
            departure,
            duration: duration_minutes / 60.0,
            price,
        });
        self.flight_index.insert(key, id);
        self.arcs.entry((from, to)).or_default().push(id);
        Some(id)
    }

    pub fn city_id(&self, code: &str) -> Option<CityId> {
        self.city_index.get(code).copied()
    }

    pub fn city(&self, id: CityId) -> &City {
        &self.cities[id]
    }

    pub fn flight(&self, id: FlightId) -> Option<&Flight> {
        self.flights.get(id)
    }

    pub fn flight_by_key(&self, key: &FlightKey) -> Option<FlightId> {
        self.flight_index.get(key).copied()
    }

    /// Ordered city pairs with at least one flight, and their flights.
    pub fn arcs(&self) -> impl Iterator<Item = ((CityId, CityId), &[FlightId])> {
        self.arcs.iter().map(|(k, v)| (*k, v.as_slice()))
    }

    pub fn flights_from(&self, from: CityId) -> impl Iterator<Item = (FlightId, &Flight)> {
        self.flights
            .iter_enumerated()
            .filter(move |(_, f)| f.from == from)
    }

    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let min = self.flights.iter().map(|f| f.date).min()?;
        let max = self.flights.iter().map(|f| f.date).max()?;
        Some((min, max))
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("round trip itineraries are not supported")]
    RoundTripUnsupported,
    #[error("{0} not found in the catalog")]
    UnknownCity(String),
    #[error("origin and destination must differ")]
    SameOriginAndDestination,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StayBounds {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CityCosts {
    pub hotel: f64,
    pub food: f64,
    pub transfer: f64,
}

/// Everything the model builder and the fallback tiers need to know about a
/// single request, resolved against a catalog.
#[derive(Debug, Clone)]
pub struct TripParams {
    pub origin: CityId,
    pub destination: CityId,
    pub travel_date: NaiveDate,
    pub total_days: f64,
    pub stays: TiVec<CityId, StayBounds>,
    pub must_visit: BTreeSet<CityId>,
    pub max_flight_hours: f64,
    pub costs: TiVec<CityId, CityCosts>,
    /// Adults plus weighted children, applied to food costs.
    pub travellers: f64,
    pub hours_per_day: f64,
}

impl TripParams {
    pub fn from_request(
        catalog: &Catalog,
        request: &crate::parser::TripRequest,
        config: &OptimizerConfig,
    ) -> Result<Self, RequestError> {
        if request.round_trip {
            return Err(RequestError::RoundTripUnsupported);
        }
        let origin = catalog
            .city_id(&request.origin)
            .ok_or_else(|| RequestError::UnknownCity(request.origin.clone()))?;
        let destination = catalog
            .city_id(&request.destination)
            .ok_or_else(|| RequestError::UnknownCity(request.destination.clone()))?;
        if origin == destination {
            return Err(RequestError::SameOriginAndDestination);
        }

        let total_days = request.days_per_city.values().map(|d| *d as f64).sum::<f64>();
        let mut stays: TiVec<CityId, StayBounds> = catalog
            .cities
            .iter()
            .map(|_| StayBounds {
                min: 0.0,
                max: total_days,
            })
            .collect();

        let mut must_visit = BTreeSet::new();
        for code in request.must_visit.iter() {
            match catalog.city_id(code) {
                Some(id) => {
                    must_visit.insert(id);
                }
                None => warn!("Must-visit city {} not in catalog, ignoring", code),
            }
        }
        for (code, days) in request.days_per_city.iter() {
            match catalog.city_id(code) {
                Some(id) => {
                    stays[id] = StayBounds {
                        min: *days as f64,
                        max: *days as f64,
                    };
                    if *days > 0 {
                        must_visit.insert(id);
                    }
                }
                None => warn!("Stay requested in unknown city {}, ignoring", code),
            }
        }
        must_visit.remove(&origin);
        must_visit.remove(&destination);

        let costs = catalog
            .cities
            .iter()
            .map(|c| CityCosts {
                hotel: if request.include_hotel { c.hotel_daily } else { 0.0 },
                food: if request.include_food { c.food_daily } else { 0.0 },
                transfer: if request.include_transfer { c.transfer } else { 0.0 },
            })
            .collect();

        let travellers =
            request.adults as f64 + config.child_cost_weight * request.children as f64;

        debug!(
            "Request {}->{} on {}: {} days, {} must-visit cities",
            request.origin,
            request.destination,
            request.travel_date,
            total_days,
            must_visit.len()
        );

        Ok(TripParams {
            origin,
            destination,
            travel_date: request.travel_date,
            total_days,
            stays,
            must_visit,
            max_flight_hours: config.max_flight_hours,
            costs,
            travellers,
            hours_per_day: config.hours_per_day,
        })
    }

    /// Widened stay bounds and a larger flight-time budget, for the second
    /// fallback tier.
    pub fn relaxed(&self, config: &OptimizerConfig) -> Self {
        let mut relaxed = self.clone();
        for bounds in relaxed.stays.iter_mut() {
            bounds.min = (bounds.min * config.relax_min_days_factor).max(0.0);
            bounds.max = (bounds.max * config.relax_max_days_factor).min(self.total_days);
        }
        relaxed.max_flight_hours = self.max_flight_hours * config.relax_flight_hours_factor;
        relaxed
    }

    pub fn with_flight_budget(&self, max_flight_hours: f64) -> Self {
        TripParams {
            max_flight_hours,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instances;

    #[test]
    pub fn flight_keys_are_canonical() {
        let catalog = instances::three_cities();
        let a = catalog.city_id("AAA").unwrap();
        let c = catalog.city_id("CCC").unwrap();
        let direct = catalog
            .flights
            .iter()
            .find(|f| f.from == a && f.to == c)
            .unwrap();
        assert_eq!(direct.key.as_str(), "XY100_2026-03-10_09:00:00");
        assert_eq!(catalog.flight_by_key(&direct.key).map(|id| &catalog.flights[id].key), Some(&direct.key));
        assert_eq!(direct.departure, 9.0);
        assert_eq!(direct.duration, 3.0);
    }

    #[test]
    pub fn duplicate_flights_are_skipped() {
        let mut catalog = instances::three_cities();
        let n = catalog.flights.len();
        let a = catalog.city_id("AAA").unwrap();
        let c = catalog.city_id("CCC").unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let time = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        assert!(catalog
            .add_flight(a, c, "XY", "XY100", date, time, 180.0, 1.0)
            .is_none());
        assert_eq!(catalog.flights.len(), n);
    }

    #[test]
    pub fn round_flights_are_skipped() {
        let mut catalog = instances::three_cities();
        let n = catalog.flights.len();
        let a = catalog.city_id("AAA").unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let time = NaiveTime::from_hms_opt(6, 0, 0).unwrap();
        assert!(catalog
            .add_flight(a, a, "XY", "XY900", date, time, 30.0, 1.0)
            .is_none());
        assert_eq!(catalog.flights.len(), n);
        assert!(catalog.flights_from(a).all(|(_, f)| f.to != a));
    }

    #[test]
    pub fn date_range_spans_all_flights() {
        let catalog = instances::three_cities();
        let (min, max) = catalog.date_range().unwrap();
        assert_eq!(min, NaiveDate::from_ymd_opt(2026, 3, 10).unwrap());
        assert_eq!(max, NaiveDate::from_ymd_opt(2026, 3, 10).unwrap());
        assert!(Catalog::default().date_range().is_none());
    }

    #[test]
    pub fn request_validation() {
        let catalog = instances::three_cities();
        let config = OptimizerConfig::default();

        let mut request = instances::request("AAA", "CCC");
        request.round_trip = true;
        assert_eq!(
            TripParams::from_request(&catalog, &request, &config).unwrap_err(),
            RequestError::RoundTripUnsupported
        );

        let request = instances::request("ZZZ", "CCC");
        assert_eq!(
            TripParams::from_request(&catalog, &request, &config).unwrap_err(),
            RequestError::UnknownCity("ZZZ".to_string())
        );

        let request = instances::request("AAA", "AAA");
        assert_eq!(
            TripParams::from_request(&catalog, &request, &config).unwrap_err(),
            RequestError::SameOriginAndDestination
        );
    }

    #[test]
    pub fn requested_days_pin_stays_and_visits() {
        let catalog = instances::three_cities();
        let config = OptimizerConfig::default();
        let mut request = instances::request("AAA", "CCC");
        request.days_per_city.insert("BBB".to_string(), 2);
        request.days_per_city.insert("CCC".to_string(), 1);
        request.children = 2;
        request.include_hotel = false;

        let params = TripParams::from_request(&catalog, &request, &config).unwrap();
        let b = catalog.city_id("BBB").unwrap();
        let c = catalog.city_id("CCC").unwrap();
        assert_eq!(params.total_days, 3.0);
        assert_eq!(params.stays[b], StayBounds { min: 2.0, max: 2.0 });
        assert_eq!(params.stays[c], StayBounds { min: 1.0, max: 1.0 });
        assert!(params.must_visit.contains(&b));
        assert!(!params.must_visit.contains(&c));
        assert_eq!(params.travellers, 1.0 + 2.0 * 0.75);
        assert!(params.costs.iter().all(|c| c.hotel == 0.0));
    }

    #[test]
    pub fn relaxation_widens_bounds() {
        let catalog = instances::three_cities();
        let config = OptimizerConfig::default();
        let mut request = instances::request("AAA", "CCC");
        request.days_per_city.insert("BBB".to_string(), 2);
        request.days_per_city.insert("CCC".to_string(), 2);
        let params = TripParams::from_request(&catalog, &request, &config).unwrap();
        let relaxed = params.relaxed(&config);

        assert!(relaxed.max_flight_hours > params.max_flight_hours);
        for (strict, loose) in params.stays.iter().zip(relaxed.stays.iter()) {
            assert!(loose.min <= strict.min);
            if strict.min > 0.0 {
                assert!(loose.min < strict.min);
            }
            assert!(loose.max <= params.total_days);
        }
        let b = catalog.city_id("BBB").unwrap();
        assert_eq!(relaxed.stays[b].min, 1.0);
        assert!((relaxed.stays[b].max - 2.6).abs() < 1e-9);
    }
}
