pub mod config;
pub mod fallback;
pub mod instances;
pub mod itinerary;
pub mod options;
pub mod parser;
pub mod problem;
pub mod solvers;
