use std::time::{Duration, Instant};

use log::{info, warn};
use serde::Serialize;

use crate::{
    config::OptimizerConfig,
    itinerary::{Itinerary, OptimizationLevel},
    parser::TripRequest,
    problem::{Catalog, RequestError, TripParams},
    solvers::{milp::MilpSolver, solve_trip},
};

/// Per-axis scores in `[0, 10]`, higher is better.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Scores {
    #[serde(rename = "custo")]
    pub cost: f64,
    #[serde(rename = "tempo")]
    pub time: f64,
    #[serde(rename = "conforto")]
    pub comfort: f64,
    #[serde(rename = "geral")]
    pub overall: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TripOption {
    #[serde(flatten)]
    pub itinerary: Itinerary,
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "descricao")]
    pub description: String,
    #[serde(rename = "custo_total")]
    pub total_cost: f64,
    /// Summed flight durations, in hours.
    #[serde(rename = "tempo_total_viagem")]
    pub travel_hours: f64,
    #[serde(rename = "numero_escalas")]
    pub stops: usize,
    #[serde(rename = "pontuacao")]
    pub scores: Scores,
    #[serde(rename = "vantagens")]
    pub strengths: Vec<String>,
    #[serde(rename = "desvantagens")]
    pub weaknesses: Vec<String>,
    pub id: usize,
    pub ranking: usize,
}

impl TripOption {
    pub fn new(itinerary: Itinerary, title: &str, description: &str) -> Self {
        TripOption {
            total_cost: itinerary.costs.total,
            travel_hours: itinerary.travel_hours(),
            stops: itinerary.stops(),
            itinerary,
            title: title.to_string(),
            description: description.to_string(),
            scores: Scores::default(),
            strengths: Vec::new(),
            weaknesses: Vec::new(),
            id: 0,
            ranking: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OptionsMetadata {
    #[serde(rename = "tempo_computacao")]
    pub elapsed: f64,
    #[serde(rename = "numero_opcoes_geradas")]
    pub generated: usize,
    #[serde(rename = "numero_opcoes_solicitadas")]
    pub requested: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MultiOptionResult {
    #[serde(rename = "opcoes")]
    pub options: Vec<TripOption>,
    /// Rank of the recommended option.
    #[serde(rename = "recomendacao")]
    pub recommendation: Option<usize>,
    pub metadata: OptionsMetadata,
}

/// One re-parameterised solve.
#[derive(Debug, Clone)]
struct Variant {
    title: &'static str,
    description: &'static str,
    max_flight_hours: f64,
    time_limit: Duration,
}

fn inverted(value: f64, min: f64, max: f64) -> f64 {
    if max > min {
        10.0 * (1.0 - (value - min) / (max - min))
    } else {
        10.0
    }
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

/// Collapse options that cost nearly the same and stop equally often. The
/// earlier option wins.
pub fn dedupe(options: Vec<TripOption>, cost_threshold: f64) -> Vec<TripOption> {
    let mut unique: Vec<TripOption> = Vec::new();
    for option in options {
        let duplicate = unique.iter().any(|u| {
            (u.total_cost - option.total_cost).abs() < cost_threshold && u.stops == option.stops
        });
        if duplicate {
            info!(
                "Dropping option '{}', too close to an earlier one",
                option.title
            );
        } else {
            unique.push(option);
        }
    }
    unique
}

/// Min-max scores per axis with lower raw values scoring higher, then tags.
pub fn score(options: &mut [TripOption]) {
    let (cost_lo, cost_hi) = bounds(options.iter().map(|o| o.total_cost));
    let (time_lo, time_hi) = bounds(options.iter().map(|o| o.travel_hours));
    let (stops_lo, stops_hi) = bounds(options.iter().map(|o| o.stops as f64));

    for option in options.iter_mut() {
        let cost = inverted(option.total_cost, cost_lo, cost_hi);
        let time = inverted(option.travel_hours, time_lo, time_hi);
        let comfort = inverted(option.stops as f64, stops_lo, stops_hi);
        option.scores = Scores {
            cost: round1(cost),
            time: round1(time),
            comfort: round1(comfort),
            overall: round1((cost + time + comfort) / 3.0),
        };
        option.strengths = strengths(option);
        option.weaknesses = weaknesses(option);
    }
}

pub fn strengths(option: &TripOption) -> Vec<String> {
    let s = &option.scores;
    let mut tags = Vec::new();
    if s.cost >= 8.0 {
        tags.push("Lowest price".to_string());
    }
    if s.time >= 8.0 {
        tags.push("Fast trip".to_string());
    }
    if s.comfort >= 8.0 {
        tags.push("Most comfortable".to_string());
    }
    match option.stops {
        0 => tags.push("Direct flight".to_string()),
        1 => tags.push("Only 1 stop".to_string()),
        _ => {}
    }
    if s.overall >= 9.0 {
        tags.push("Excellent value".to_string());
    }
    if tags.is_empty() {
        tags.push("Viable option".to_string());
    }
    tags
}

pub fn weaknesses(option: &TripOption) -> Vec<String> {
    let s = &option.scores;
    let mut tags = Vec::new();
    if s.cost <= 4.0 {
        tags.push("Higher price".to_string());
    }
    if s.time <= 4.0 {
        tags.push("Longer duration".to_string());
    }
    match option.stops {
        0 => {}
        1 => tags.push("1 stop".to_string()),
        n => tags.push(format!("{} stops", n)),
    }
    if s.comfort <= 4.0 {
        tags.push("Less comfortable".to_string());
    }
    if tags.is_empty() {
        tags.push("No significant drawbacks".to_string());
    }
    tags
}

/// Solves the same request under several flight-time budgets and ranks the
/// distinct results.
pub struct OptionGenerator<'a, S: MilpSolver> {
    catalog: &'a Catalog,
    solver: &'a S,
    config: &'a OptimizerConfig,
}

impl<'a, S: MilpSolver> OptionGenerator<'a, S> {
    pub fn new(catalog: &'a Catalog, solver: &'a S, config: &'a OptimizerConfig) -> Self {
        OptionGenerator {
            catalog,
            solver,
            config,
        }
    }

    pub fn generate(&self, request: &TripRequest) -> Result<MultiOptionResult, RequestError> {
        let params = TripParams::from_request(self.catalog, request, self.config)?;
        Ok(self.generate_params(&params))
    }

    pub fn generate_params(&self, params: &TripParams) -> MultiOptionResult {
        let _p = hprof::enter("options");
        let start_time = Instant::now();
        let baseline = params.max_flight_hours;
        let limit = self.config.option_time_limit();

        let variants = [
            Variant {
                title: "Cheapest",
                description: "Lowest total cost, may have more stops",
                max_flight_hours: baseline,
                time_limit: limit,
            },
            Variant {
                title: "Best value",
                description: "Balance between price and comfort",
                max_flight_hours: baseline * self.config.balanced_flight_hours_factor,
                time_limit: limit,
            },
            Variant {
                title: "Fastest and most comfortable",
                description: "Direct flights, shortest total time",
                max_flight_hours: self.config.direct_flight_hours,
                time_limit: limit,
            },
        ];

        let mut options = self.run_variants(params, &variants);
        if options.len() < variants.len() {
            let extra = Variant {
                title: "Alternative",
                description: "Intermediate option",
                max_flight_hours: baseline * self.config.intermediate_flight_hours_factor,
                time_limit: self.config.extra_option_time_limit(),
            };
            options.extend(self.run_variants(params, std::slice::from_ref(&extra)));
        }

        let mut options = dedupe(options, self.config.duplicate_cost_threshold);
        score(&mut options);
        options.sort_by(|a, b| b.scores.overall.total_cmp(&a.scores.overall));
        let generated = options.len();
        options.truncate(self.config.num_options);
        for (i, option) in options.iter_mut().enumerate() {
            option.id = i + 1;
            option.ranking = i + 1;
        }

        let elapsed = start_time.elapsed().as_secs_f64();
        info!(
            "Generated {} options ({} kept) in {:.2}s",
            generated,
            options.len(),
            elapsed
        );
        MultiOptionResult {
            recommendation: (!options.is_empty()).then(|| 1),
            options,
            metadata: OptionsMetadata {
                elapsed: round2(elapsed),
                generated,
                requested: self.config.num_options,
            },
        }
    }

    fn run_variants(&self, params: &TripParams, variants: &[Variant]) -> Vec<TripOption> {
        let results: Vec<Option<TripOption>> = if self.config.parallel_options && variants.len() > 1 {
            std::thread::scope(|s| {
                let handles = variants
                    .iter()
                    .map(|v| s.spawn(move || self.run_variant(params, v)))
                    .collect::<Vec<_>>();
                handles
                    .into_iter()
                    .map(|h| {
                        h.join().unwrap_or_else(|_| {
                            warn!("Option worker panicked");
                            None
                        })
                    })
                    .collect()
            })
        } else {
            variants.iter().map(|v| self.run_variant(params, v)).collect()
        };
        results.into_iter().flatten().collect()
    }

    fn run_variant(&self, params: &TripParams, variant: &Variant) -> Option<TripOption> {
        let start_time = Instant::now();
        let params = params.with_flight_budget(variant.max_flight_hours);
        match solve_trip(self.catalog, &params, self.solver, self.config, variant.time_limit) {
            Ok(Some(itinerary)) if itinerary.is_complete() => {
                let itinerary = itinerary.stamp(
                    OptimizationLevel::Optimal,
                    variant.description,
                    start_time.elapsed().as_secs_f64(),
                );
                info!(
                    "Option '{}' ({:.1}h budget): cost {:.2}",
                    variant.title, variant.max_flight_hours, itinerary.costs.total
                );
                Some(TripOption::new(itinerary, variant.title, variant.description))
            }
            Ok(Some(_)) => {
                warn!("Option '{}' decoded to an incomplete route", variant.title);
                None
            }
            Ok(None) => {
                info!(
                    "Option '{}' ({:.1}h budget): no solution",
                    variant.title, variant.max_flight_hours
                );
                None
            }
            Err(e) => {
                warn!("Option '{}' failed: {}", variant.title, e);
                None
            }
        }
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::{
        instances,
        solvers::{
            milp::{GoodLpSolver, SolveOutcome},
            model::LinearProgram,
            SolverError,
        },
    };

    fn option(cost: f64, hours: f64, stops: usize) -> TripOption {
        let mut o = TripOption::new(Itinerary::empty("AAA", "CCC", ""), "t", "d");
        o.total_cost = cost;
        o.travel_hours = hours;
        o.stops = stops;
        o
    }

    #[test]
    pub fn scores_are_bounded_and_favour_the_cheapest() {
        let mut options = vec![
            option(900.0, 4.0, 0),
            option(350.0, 9.5, 2),
            option(600.0, 6.0, 1),
        ];
        score(&mut options);
        for o in options.iter() {
            for s in [o.scores.cost, o.scores.time, o.scores.comfort, o.scores.overall] {
                assert!((0.0..=10.0).contains(&s));
            }
        }
        assert_eq!(options[1].scores.cost, 10.0);
        assert!(options.iter().all(|o| o.scores.cost <= options[1].scores.cost));
        assert_eq!(options[0].scores.cost, 0.0);
        assert_eq!(options[0].scores.time, 10.0);
        assert_eq!(options[2].scores.comfort, 5.0);
    }

    #[test]
    pub fn ties_score_ten() {
        let mut options = vec![option(500.0, 3.0, 1), option(500.0, 3.0, 1)];
        score(&mut options);
        for o in options.iter() {
            assert_eq!(o.scores, Scores { cost: 10.0, time: 10.0, comfort: 10.0, overall: 10.0 });
        }
    }

    #[test]
    pub fn near_duplicates_collapse() {
        let mut options = vec![
            option(500.0, 3.0, 1),
            option(560.0, 5.0, 1),
            option(540.0, 2.0, 0),
            option(650.0, 3.0, 1),
        ];
        options[0].title = "first".to_string();
        let kept = dedupe(options, 100.0);
        assert_eq!(kept.len(), 3);
        assert_eq!(kept[0].title, "first");
        assert_eq!(
            kept.iter().map(|o| o.total_cost).collect::<Vec<_>>(),
            vec![500.0, 540.0, 650.0]
        );
    }

    #[test]
    pub fn tags_follow_scores_and_stops() {
        let mut o = option(0.0, 0.0, 0);
        o.scores = Scores { cost: 10.0, time: 10.0, comfort: 10.0, overall: 10.0 };
        assert_eq!(
            strengths(&o),
            vec!["Lowest price", "Fast trip", "Most comfortable", "Direct flight", "Excellent value"]
        );
        assert_eq!(weaknesses(&o), vec!["No significant drawbacks"]);

        let mut o = option(0.0, 0.0, 3);
        o.scores = Scores { cost: 6.0, time: 2.0, comfort: 0.0, overall: 2.7 };
        assert_eq!(strengths(&o), vec!["Viable option"]);
        assert_eq!(weaknesses(&o), vec!["Longer duration", "3 stops", "Less comfortable"]);

        let mut o = option(0.0, 0.0, 1);
        o.scores = Scores { cost: 5.0, time: 5.0, comfort: 5.0, overall: 5.0 };
        assert_eq!(strengths(&o), vec!["Only 1 stop"]);
        assert_eq!(weaknesses(&o), vec!["1 stop"]);
    }

    #[test]
    pub fn direct_option_ranks_first() {
        let catalog = instances::three_cities();
        let config = OptimizerConfig {
            direct_flight_hours: 3.0,
            ..OptimizerConfig::default()
        };
        let result = OptionGenerator::new(&catalog, &GoodLpSolver, &config)
            .generate(&instances::request("AAA", "CCC"))
            .unwrap();

        // Baseline and balanced both find the 350 connection.
        assert_eq!(result.metadata.generated, 2);
        assert_eq!(result.metadata.requested, 3);
        assert_eq!(result.recommendation, Some(1));

        let first = &result.options[0];
        assert_eq!(first.ranking, 1);
        assert_eq!(first.stops, 0);
        assert_eq!(first.total_cost, 500.0);
        assert!(first.strengths.contains(&"Direct flight".to_string()));

        let second = &result.options[1];
        assert_eq!(second.id, 2);
        assert_eq!(second.total_cost, 350.0);
        assert_eq!(second.scores.cost, 10.0);
        assert_eq!(second.travel_hours, 3.5);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["opcoes"][0]["rota"]["caminho"], serde_json::json!(["AAA", "CCC"]));
        assert_eq!(json["opcoes"][0]["numero_escalas"], 0);
        assert_eq!(json["recomendacao"], 1);
    }

    struct Counting(AtomicUsize);

    impl MilpSolver for Counting {
        fn solve(&self, _: LinearProgram, _: Duration) -> Result<SolveOutcome, SolverError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(SolveOutcome::Infeasible)
        }
    }

    #[test]
    pub fn extra_run_when_variants_fail() {
        let catalog = instances::three_cities();
        let config = OptimizerConfig {
            parallel_options: false,
            ..OptimizerConfig::default()
        };
        let solver = Counting(AtomicUsize::new(0));
        let result = OptionGenerator::new(&catalog, &solver, &config)
            .generate(&instances::request("AAA", "CCC"))
            .unwrap();
        assert_eq!(solver.0.load(Ordering::SeqCst), 4);
        assert!(result.options.is_empty());
        assert_eq!(result.recommendation, None);
        assert_eq!(result.metadata.generated, 0);
    }
}
