use crate::problem::{Catalog, City};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use log::{debug, info, warn};
use serde::{Deserialize, Deserializer, Serialize};
use std::{collections::BTreeMap, path::Path};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("malformed catalog: {0}")]
    Json(#[from] serde_json::Error),
    #[error("bad date/time {value:?} in {field}")]
    DateTime { field: &'static str, value: String },
}

/// Prices and durations show up both as JSON numbers and as strings.
fn number_or_string<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(f64),
        Str(String),
    }
    match Raw::deserialize(d)? {
        Raw::Num(x) => Ok(x),
        Raw::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Deserialize, Debug, Default)]
struct RawMetadata {
    inicio: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct RawTransport {
    #[serde(default, deserialize_with = "number_or_string")]
    transfer_ida_volta: f64,
}

#[derive(Deserialize, Debug)]
struct RawCity {
    #[serde(default)]
    nome: String,
    #[serde(default)]
    pais: String,
    #[serde(default, deserialize_with = "number_or_string")]
    custo_diaria_hotel: f64,
    #[serde(default, deserialize_with = "number_or_string")]
    custo_refeicao_diaria: f64,
    #[serde(default)]
    transporte: RawTransport,
}

#[derive(Deserialize, Debug)]
struct RawFlight {
    origem: String,
    destino: String,
    data_voo: String,
    hora_saida: String,
    #[serde(default, alias = "companhia")]
    cia: String,
    voo_cod: String,
    #[serde(deserialize_with = "number_or_string")]
    tempo_voo: f64,
    #[serde(deserialize_with = "number_or_string")]
    custo_passagem: f64,
}

#[derive(Deserialize, Debug)]
struct RawCatalog {
    #[serde(default)]
    metadata: RawMetadata,
    nos: BTreeMap<String, RawCity>,
    #[serde(default)]
    arestas: Vec<RawFlight>,
}

fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, CatalogError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| CatalogError::DateTime {
        field,
        value: value.to_string(),
    })
}

fn parse_time(field: &'static str, value: &str) -> Result<NaiveTime, CatalogError> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|_| CatalogError::DateTime {
            field,
            value: value.to_string(),
        })
}

fn parse_datetime(field: &'static str, value: &str) -> Result<NaiveDateTime, CatalogError> {
    let value = value.trim();
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(dt);
        }
    }
    Ok(parse_date(field, value)?.and_time(NaiveTime::default()))
}

pub fn read_catalog_file(path: impl AsRef<Path>) -> Result<Catalog, CatalogError> {
    let path = path.as_ref();
    let txt = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.to_string_lossy().to_string(),
        source,
    })?;
    parse_catalog(&txt)
}

pub fn parse_catalog(json: &str) -> Result<Catalog, CatalogError> {
    let _p = hprof::enter("parse catalog");
    let raw: RawCatalog = serde_json::from_str(json)?;

    let epoch = match raw.metadata.inicio.as_deref() {
        Some(inicio) => parse_datetime("metadata.inicio", inicio)?,
        None => {
            let mut earliest: Option<NaiveDate> = None;
            for f in raw.arestas.iter() {
                let date = parse_date("data_voo", &f.data_voo)?;
                earliest = Some(earliest.map_or(date, |e| e.min(date)));
            }
            earliest.unwrap_or_default().and_time(NaiveTime::default())
        }
    };
    debug!("Catalog epoch {}", epoch);

    let mut catalog = Catalog::new(epoch);
    for (code, city) in raw.nos {
        catalog.add_city(City {
            code,
            name: city.nome,
            country: city.pais,
            hotel_daily: city.custo_diaria_hotel,
            food_daily: city.custo_refeicao_diaria,
            transfer: city.transporte.transfer_ida_volta,
        });
    }

    let mut n_skipped = 0;
    for f in raw.arestas {
        let (from, to) = match (catalog.city_id(&f.origem), catalog.city_id(&f.destino)) {
            (Some(from), Some(to)) => (from, to),
            _ => {
                warn!(
                    "Flight {} {}->{} references an unknown city, skipping",
                    f.voo_cod, f.origem, f.destino
                );
                n_skipped += 1;
                continue;
            }
        };
        let date = parse_date("data_voo", &f.data_voo)?;
        let time = parse_time("hora_saida", &f.hora_saida)?;
        if catalog
            .add_flight(from, to, &f.cia, &f.voo_cod, date, time, f.tempo_voo, f.custo_passagem)
            .is_none()
        {
            n_skipped += 1;
        }
    }

    info!(
        "Loaded catalog with {} cities and {} flights ({} skipped)",
        catalog.cities.len(),
        catalog.flights.len(),
        n_skipped
    );
    Ok(catalog)
}

/// A single-direction trip request, as produced by the front end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripRequest {
    #[serde(rename = "ida_volta", default)]
    pub round_trip: bool,
    #[serde(rename = "origem")]
    pub origin: String,
    #[serde(rename = "destino")]
    pub destination: String,
    #[serde(rename = "locais_visitar", default)]
    pub must_visit: Vec<String>,
    #[serde(rename = "data_ida")]
    pub travel_date: NaiveDate,
    #[serde(rename = "numero_adultos", default = "one")]
    pub adults: u32,
    #[serde(rename = "numero_criancas", default)]
    pub children: u32,
    #[serde(rename = "dias_por_cidade", default)]
    pub days_per_city: BTreeMap<String, u32>,
    #[serde(rename = "incluir_refeicao", default = "yes")]
    pub include_food: bool,
    #[serde(rename = "incluir_hospedagem", default = "yes")]
    pub include_hotel: bool,
    #[serde(rename = "incluir_transporte", default = "yes")]
    pub include_transfer: bool,
}

fn one() -> u32 {
    1
}

fn yes() -> bool {
    true
}

pub fn read_request_file(path: impl AsRef<Path>) -> Result<TripRequest, CatalogError> {
    let path = path.as_ref();
    let txt = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.to_string_lossy().to_string(),
        source,
    })?;
    Ok(serde_json::from_str(&txt)?)
}
