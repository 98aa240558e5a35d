use std::path::PathBuf;

use log::{error, info};
use smarttrip::{
    config::OptimizerConfig,
    fallback::FallbackOptimizer,
    instances,
    options::OptionGenerator,
    parser,
    problem::Catalog,
    solvers::milp::GoodLpSolver,
};
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(name = "smarttrip")]
struct Opt {
    /// Generate several ranked options instead of a single itinerary
    #[structopt(short, long)]
    multiple: bool,

    /// Number of options to keep with --multiple
    #[structopt(long)]
    options: Option<usize>,

    /// JSON file overriding optimizer settings
    #[structopt(long, parse(from_os_str))]
    config: Option<PathBuf>,

    /// Print the profiling tree when done
    #[structopt(long)]
    profile: bool,

    /// Print the first and last flight dates in the catalog
    #[structopt(long)]
    dates: bool,

    /// Solve the bundled three-city instance
    #[structopt(long)]
    demo: bool,

    #[structopt(name = "CATALOG", parse(from_os_str))]
    catalog: Option<PathBuf>,

    #[structopt(name = "REQUEST", parse(from_os_str))]
    request: Option<PathBuf>,
}

fn load_config(opt: &Opt) -> Result<OptimizerConfig, Box<dyn std::error::Error>> {
    let mut config = match &opt.config {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => OptimizerConfig::default(),
    };
    if let Some(n) = opt.options {
        config.num_options = n;
    }
    Ok(config)
}

fn run(opt: &Opt) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(opt)?;

    let (catalog, request) = if opt.demo {
        (instances::three_cities(), instances::request("AAA", "CCC"))
    } else {
        let catalog: Catalog = match &opt.catalog {
            Some(path) => parser::read_catalog_file(path)?,
            None => return Err("no catalog file given".into()),
        };
        if opt.dates {
            match catalog.date_range() {
                Some((first, last)) => println!(
                    "{}",
                    serde_json::json!({ "data_inicio": first, "data_fim": last })
                ),
                None => println!("{}", serde_json::json!({})),
            }
            return Ok(());
        }
        let request = match &opt.request {
            Some(path) => parser::read_request_file(path)?,
            None => return Err("no request file given".into()),
        };
        (catalog, request)
    };

    info!(
        "Planning {} -> {} on {}",
        request.origin, request.destination, request.travel_date
    );
    let solver = GoodLpSolver;
    let output = if opt.multiple {
        let result = OptionGenerator::new(&catalog, &solver, &config).generate(&request)?;
        serde_json::to_string_pretty(&result)?
    } else {
        let itinerary = FallbackOptimizer::new(&catalog, &solver, &config).optimize(&request)?;
        serde_json::to_string_pretty(&itinerary)?
    };
    println!("{}", output);
    Ok(())
}

pub fn main() {
    pretty_env_logger::init();
    let opt = Opt::from_args();

    hprof::start_frame();
    let result = run(&opt);
    hprof::end_frame();

    if opt.profile {
        hprof::profiler().print_timing();
    }
    if let Err(e) = result {
        error!("{}", e);
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
