use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime};

use crate::{
    parser::TripRequest,
    problem::{Catalog, City, CityId},
};

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, day).unwrap()
}

fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn city(code: &str, hotel: f64, food: f64, transfer: f64) -> City {
    City {
        code: code.to_string(),
        name: code.to_string(),
        country: String::new(),
        hotel_daily: hotel,
        food_daily: food,
        transfer,
    }
}

fn base() -> (Catalog, [CityId; 3]) {
    let mut catalog = Catalog::new(date(10).and_time(NaiveTime::default()));
    let a = catalog.add_city(city("AAA", 100.0, 30.0, 20.0));
    let b = catalog.add_city(city("BBB", 80.0, 25.0, 15.0));
    let c = catalog.add_city(city("CCC", 120.0, 40.0, 25.0));
    (catalog, [a, b, c])
}

fn with_flights() -> (Catalog, [CityId; 3]) {
    let (mut catalog, [a, b, c]) = base();
    catalog.add_flight(a, c, "XY", "XY100", date(10), time(9, 0), 180.0, 500.0);
    catalog.add_flight(a, b, "XY", "XY200", date(10), time(8, 0), 120.0, 200.0);
    catalog.add_flight(b, c, "XY", "XY300", date(10), time(14, 0), 90.0, 150.0);
    (catalog, [a, b, c])
}

/// Cities AAA, BBB and CCC without any flights.
pub fn no_flights() -> Catalog {
    base().0
}

/// A direct AAA->CCC flight for 500, and AAA->BBB->CCC for 200 + 150,
/// all on 2026-03-10.
pub fn three_cities() -> Catalog {
    with_flights().0
}

/// `three_cities` plus a BBB->CCC departure the next day, so a one-day
/// stay in BBB is possible.
pub fn three_cities_with_overnight() -> Catalog {
    let (mut catalog, [_, b, c]) = with_flights();
    catalog.add_flight(b, c, "XY", "XY301", date(11), time(14, 0), 90.0, 180.0);
    catalog
}

/// `three_cities` plus a city DDD that no flight touches.
pub fn three_cities_with_island() -> Catalog {
    let mut catalog = three_cities();
    catalog.add_city(city("DDD", 50.0, 10.0, 5.0));
    catalog
}

/// A one-way request for a single adult on 2026-03-10 with every cost
/// category included.
pub fn request(origin: &str, destination: &str) -> TripRequest {
    TripRequest {
        round_trip: false,
        origin: origin.to_string(),
        destination: destination.to_string(),
        must_visit: Vec::new(),
        travel_date: date(10),
        adults: 1,
        children: 0,
        days_per_city: BTreeMap::new(),
        include_food: true,
        include_hotel: true,
        include_transfer: true,
    }
}
