use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for the whole optimization pipeline. Every field has a default,
/// so a config file only needs to list what it overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub hours_per_day: f64,
    /// Baseline ceiling on the summed duration of chosen flights, in hours.
    pub max_flight_hours: f64,
    pub child_cost_weight: f64,
    pub big_m_margin: f64,
    /// Objective weight per whole day. Keeps the integer day count tight
    /// when all daily cost categories are switched off.
    pub whole_day_tiebreak: f64,

    pub exact_time_limit_secs: f64,
    pub relax_min_days_factor: f64,
    pub relax_max_days_factor: f64,
    pub relax_flight_hours_factor: f64,
    pub greedy_max_hops: usize,
    pub min_connection_hours: f64,
    pub max_connection_hours: f64,
    pub decode_max_steps: usize,

    pub option_time_limit_secs: f64,
    pub extra_option_time_limit_secs: f64,
    pub balanced_flight_hours_factor: f64,
    pub direct_flight_hours: f64,
    pub intermediate_flight_hours_factor: f64,
    pub duplicate_cost_threshold: f64,
    pub num_options: usize,
    pub parallel_options: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig {
            hours_per_day: 24.0,
            max_flight_hours: 48.0,
            child_cost_weight: 0.75,
            big_m_margin: 10.0,
            whole_day_tiebreak: 1e-3,

            exact_time_limit_secs: 30.0,
            relax_min_days_factor: 0.5,
            relax_max_days_factor: 1.3,
            relax_flight_hours_factor: 1.5,
            greedy_max_hops: 20,
            min_connection_hours: 2.0,
            max_connection_hours: 12.0,
            decode_max_steps: 100,

            option_time_limit_secs: 20.0,
            extra_option_time_limit_secs: 15.0,
            balanced_flight_hours_factor: 0.75,
            direct_flight_hours: 15.0,
            intermediate_flight_hours_factor: 0.6,
            duplicate_cost_threshold: 100.0,
            num_options: 3,
            parallel_options: true,
        }
    }
}

impl OptimizerConfig {
    pub fn exact_time_limit(&self) -> Duration {
        Duration::from_secs_f64(self.exact_time_limit_secs)
    }

    pub fn option_time_limit(&self) -> Duration {
        Duration::from_secs_f64(self.option_time_limit_secs)
    }

    pub fn extra_option_time_limit(&self) -> Duration {
        Duration::from_secs_f64(self.extra_option_time_limit_secs)
    }
}
