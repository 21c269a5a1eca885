//! Parsing Options.
//! `pn <NET> [--format json|ron|pnml] [--config FILE] [--output FILE] [--dot FILE] [--weights id=w,...]`

use clap::{Arg, Command};
use std::error::Error;
use std::path::PathBuf;

use crate::net::Format;

fn make_options_parser() -> clap::Command {
    let parser = Command::new("pn")
        .no_binary_name(true)
        .version("v0.1.0")
        .about("Reachability, deadlock and optimisation analysis of 1-bounded Petri nets")
        .arg(
            Arg::new("net")
                .value_name("NET")
                .help("Net description (JSON, RON or PNML)")
                .required(true),
        )
        .arg(
            Arg::new("format")
                .short('f')
                .long("format")
                .help("Format of the net description; guessed from the extension if absent")
                .value_parser(["json", "ron", "pnml"]),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("TOML analysis configuration")
                .default_value("pn.toml"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Path to file where the report will be stored (plus FILE.json)"),
        )
        .arg(
            Arg::new("dot")
                .long("dot")
                .value_name("FILE")
                .help("Write the net in Graphviz format"),
        )
        .arg(
            Arg::new("weights")
                .short('w')
                .long("weights")
                .value_name("ID=W,...")
                .help("Objective weights per place, overriding the configuration"),
        );
    parser
}

#[derive(Debug)]
pub struct Options {
    pub net: PathBuf,
    pub format: Format,
    pub config: PathBuf,
    pub output: Option<PathBuf>,
    pub dot: Option<PathBuf>,
    pub weights: Vec<(String, u64)>,
}

impl Options {
    pub fn parse_from_str(s: &str) -> Result<Self, Box<dyn Error>> {
        let flags = shellwords::split(s)?;
        Self::parse_from_args(&flags)
    }

    pub fn parse_from_args(flags: &[String]) -> Result<Self, Box<dyn Error>> {
        let app = make_options_parser();
        let matches = app.try_get_matches_from(flags.iter())?;

        let net = match matches.get_one::<String>("net") {
            Some(net) => PathBuf::from(net),
            None => return Err("missing net description")?,
        };
        let format = match matches.get_one::<String>("format").map(String::as_str) {
            Some("json") => Format::Json,
            Some("ron") => Format::Ron,
            Some("pnml") => Format::Pnml,
            Some(other) => return Err(format!("unsupported format `{other}`"))?,
            None => Format::from_path(&net),
        };
        let config = matches
            .get_one::<String>("config")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("pn.toml"));
        let output = matches.get_one::<String>("output").map(PathBuf::from);
        let dot = matches.get_one::<String>("dot").map(PathBuf::from);
        let weights = match matches.get_one::<String>("weights") {
            Some(spec) => parse_weights(spec)?,
            None => Vec::new(),
        };

        Ok(Options {
            net,
            format,
            config,
            output,
            dot,
            weights,
        })
    }
}

/// `a=2,b=0` → `[("a", 2), ("b", 0)]`.
pub fn parse_weights(spec: &str) -> Result<Vec<(String, u64)>, Box<dyn Error>> {
    spec.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| -> Result<(String, u64), Box<dyn Error>> {
            let (place, weight) = item
                .split_once('=')
                .ok_or_else(|| format!("expected ID=WEIGHT, found `{item}`"))?;
            let weight = weight
                .trim()
                .parse::<u64>()
                .map_err(|err| format!("invalid weight `{weight}` for place `{place}`: {err}"))?;
            Ok((place.trim().to_string(), weight))
        })
        .collect()
}
