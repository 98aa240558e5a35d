use serde::{Deserialize, Serialize};

use crate::problem::{Catalog, CityId, Flight};

/// Which fallback tier produced an itinerary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OptimizationLevel {
    #[serde(rename = "otima")]
    Optimal,
    #[serde(rename = "boa")]
    Good,
    #[serde(rename = "viavel")]
    Feasible,
    #[serde(rename = "basica")]
    Basic,
    #[serde(rename = "erro")]
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Itinerary {
    #[serde(rename = "rota")]
    pub route: Route,
    #[serde(rename = "custos")]
    pub costs: CostBreakdown,
    #[serde(rename = "detalhes")]
    pub details: StayDetails,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    #[serde(rename = "origem")]
    pub origin: String,
    #[serde(rename = "destino")]
    pub destination: String,
    #[serde(rename = "caminho")]
    pub path: Vec<String>,
    #[serde(rename = "trechos")]
    pub legs: Vec<Leg>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    #[serde(rename = "origem")]
    pub from: String,
    #[serde(rename = "destino")]
    pub to: String,
    #[serde(rename = "voo")]
    pub flight: FlightInfo,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FlightInfo {
    pub id: String,
    #[serde(rename = "cia")]
    pub carrier: String,
    #[serde(rename = "codigo")]
    pub code: String,
    #[serde(rename = "data")]
    pub date: String,
    #[serde(rename = "saida")]
    pub departure: String,
    /// `None` when the flight could not be resolved against the catalog.
    #[serde(rename = "duracao_min")]
    pub duration_minutes: Option<f64>,
    #[serde(rename = "preco")]
    pub price: f64,
}

impl From<&Flight> for FlightInfo {
    fn from(f: &Flight) -> Self {
        FlightInfo {
            id: f.key.to_string(),
            carrier: f.carrier.clone(),
            code: f.code.clone(),
            date: f.date.format("%Y-%m-%d").to_string(),
            departure: f.departure_time.format("%H:%M:%S").to_string(),
            duration_minutes: Some(f.duration_minutes()),
            price: f.price,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub total: f64,
    #[serde(rename = "voos")]
    pub flights: f64,
    #[serde(rename = "hospedagem")]
    pub hotel: f64,
    #[serde(rename = "alimentacao")]
    pub food: f64,
    #[serde(rename = "transporte")]
    pub transfer: f64,
}

impl CostBreakdown {
    pub fn flights_only(flights: f64) -> Self {
        CostBreakdown {
            total: flights,
            flights,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StayDetails {
    #[serde(rename = "hospedagem")]
    pub hotel: Vec<StayCost>,
    #[serde(rename = "alimentacao")]
    pub food: Vec<StayCost>,
    #[serde(rename = "transporte")]
    pub transfer: Vec<StayCost>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StayCost {
    #[serde(rename = "cidade")]
    pub city: String,
    #[serde(rename = "diarias")]
    pub days: u32,
    #[serde(rename = "custo_dia")]
    pub daily: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(rename = "nivel_otimizacao")]
    pub level: OptimizationLevel,
    #[serde(rename = "nota")]
    pub note: String,
    /// Seconds.
    #[serde(rename = "tempo_computacao")]
    pub elapsed: f64,
}

impl Itinerary {
    /// A structurally valid itinerary with no legs, used whenever nothing
    /// better can be produced.
    pub fn empty(origin: &str, destination: &str, note: impl Into<String>) -> Self {
        Itinerary {
            route: Route {
                origin: origin.to_string(),
                destination: destination.to_string(),
                path: vec![origin.to_string(), destination.to_string()],
                legs: Vec::new(),
            },
            costs: CostBreakdown::default(),
            details: StayDetails::default(),
            metadata: Metadata {
                level: OptimizationLevel::Error,
                note: note.into(),
                elapsed: 0.0,
            },
        }
    }

    /// An itinerary that only pays for flights, as built by the model-free
    /// tiers.
    pub fn from_flights<'a>(
        catalog: &Catalog,
        origin: CityId,
        destination: CityId,
        flights: impl IntoIterator<Item = &'a Flight>,
        level: OptimizationLevel,
        note: impl Into<String>,
    ) -> Self {
        let mut path = vec![catalog.city(origin).code.clone()];
        let mut legs = Vec::new();
        let mut total = 0.0;
        for f in flights {
            let from = catalog.city(f.from).code.clone();
            let to = catalog.city(f.to).code.clone();
            path.push(to.clone());
            legs.push(Leg {
                from,
                to,
                flight: f.into(),
            });
            total += f.price;
        }

        Itinerary {
            route: Route {
                origin: catalog.city(origin).code.clone(),
                destination: catalog.city(destination).code.clone(),
                path,
                legs,
            },
            costs: CostBreakdown::flights_only(total),
            details: StayDetails::default(),
            metadata: Metadata {
                level,
                note: note.into(),
                elapsed: 0.0,
            },
        }
    }

    pub fn stamp(mut self, level: OptimizationLevel, note: impl Into<String>, elapsed: f64) -> Self {
        self.metadata = Metadata {
            level,
            note: note.into(),
            elapsed: (elapsed * 100.0).round() / 100.0,
        };
        self
    }

    /// Summed flight durations, in hours.
    pub fn travel_hours(&self) -> f64 {
        self.route
            .legs
            .iter()
            .map(|l| l.flight.duration_minutes.unwrap_or(0.0) / 60.0)
            .sum()
    }

    pub fn stops(&self) -> usize {
        self.route.legs.len().saturating_sub(1)
    }

    pub fn is_complete(&self) -> bool {
        self.route.path.first() == Some(&self.route.origin)
            && self.route.path.last() == Some(&self.route.destination)
    }
}
