use anyhow::{Context, Result, anyhow};

use pn_reach::config::AnalysisConfig;
use pn_reach::net::Net;
use pn_reach::net::io::read_description;
use pn_reach::options::Options;
use pn_reach::pipeline::Analyzer;
use pn_reach::report::LogSink;

fn main() {
    let e = env_logger::Env::new()
        .filter_or("PN_LOG", "info")
        .write_style("PN_LOG_STYLE");
    env_logger::init_from_env(e);

    if let Err(err) = run() {
        log::error!("{err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // Flags from PN_FLAGS come first so the command line can override them.
    let mut flags = shellwords::split(&std::env::var("PN_FLAGS").unwrap_or_default())
        .map_err(|err| anyhow!("invalid PN_FLAGS: {err}"))?;
    flags.extend(std::env::args().skip(1));
    let options = Options::parse_from_args(&flags).map_err(|err| anyhow!("{err}"))?;
    log::debug!("PN options: {:?}", options);

    let mut config = AnalysisConfig::load_from_file(&options.config)?;
    for (place, weight) in &options.weights {
        config.weights.places.insert(place.clone(), *weight);
    }

    let description = read_description(&options.net, options.format)
        .with_context(|| format!("Failed to load net: {:?}", options.net))?;
    let net = Net::from_description(&description);
    log::info!(
        "loaded {:?}: {} places, {} transitions",
        options.net,
        net.places_len(),
        net.transitions_len()
    );

    if let Some(dot) = &options.dot {
        net.write_dot(dot)
            .with_context(|| format!("Failed to write DOT file: {:?}", dot))?;
    }

    let mut sink = LogSink;
    let report = Analyzer::new(&net, config).run(Some(&mut sink))?;
    println!("{report}");

    if let Some(output) = &options.output {
        report
            .save_to_file(output)
            .with_context(|| format!("Failed to save report: {:?}", output))?;
    }
    Ok(())
}
