//! 端到端场景：从网描述文件出发运行完整流水线.
use std::collections::BTreeSet;
use std::path::PathBuf;

use pn_reach::analysis::StateSpace;
use pn_reach::net::io::read_description;
use pn_reach::net::{BoolMarking, Format, IndexVec, Net};
use pn_reach::relaxed::lp::ConstraintSense;
use pn_reach::relaxed::{
    MarkingConstraint, Query, RelaxedSearch, SearchOutcome, Weights, find_deadlock, optimize,
};
use pn_reach::report::{CollectSink, Phase};
use pn_reach::symbolic::SymbolicReachability;
use pn_reach::{AnalysisConfig, Analyzer};

fn load(name: &str) -> Net {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("nets").join(name);
    let description = read_description(&path, Format::from_path(&path)).unwrap();
    Net::from_description(&description)
}

fn bools(values: &[bool]) -> BoolMarking {
    BoolMarking::new(IndexVec::from(values.to_vec()))
}

#[test]
fn deadlock_chain_scenario() {
    let net = load("chain.json");

    let space = StateSpace::explore(&net);
    let explicit: BTreeSet<_> = space
        .markings()
        .map(|marking| marking.to_boolean().unwrap())
        .collect();
    let expected: BTreeSet<_> = [
        bools(&[true, false, false]),
        bools(&[false, true, false]),
        bools(&[false, false, true]),
    ]
    .into_iter()
    .collect();
    assert_eq!(explicit, expected);

    let reach = SymbolicReachability::compute(&net).unwrap();
    assert_eq!(reach.count(), 3);
    assert_eq!(reach.markings().into_iter().collect::<BTreeSet<_>>(), expected);

    let outcome = find_deadlock(&RelaxedSearch::new(&net, &reach)).unwrap();
    let marking = &outcome.candidate().unwrap().marking;
    assert_eq!(marking, &bools(&[false, false, true]));
    for transition in net.transition_ids() {
        assert!(!net.is_enabled(transition, &marking.to_marking()));
    }
}

#[test]
fn pnml_chain_matches_json_chain() {
    let net = load("deadlock_chain.pnml");
    assert_eq!(net.to_description(), load("chain.json").to_description());

    let reach = SymbolicReachability::compute(&net).unwrap();
    let outcome = find_deadlock(&RelaxedSearch::new(&net, &reach)).unwrap();
    let marking = net
        .decode(&outcome.candidate().unwrap().marking.to_marking())
        .unwrap();
    assert_eq!((marking["P1"], marking["P2"], marking["P3"]), (0, 0, 1));
}

#[test]
fn optimization_scenario() {
    let net = load("chain.json");
    let reach = SymbolicReachability::compute(&net).unwrap();
    let outcome = optimize(&RelaxedSearch::new(&net, &reach), &Weights::default()).unwrap();

    let candidate = outcome.candidate().unwrap();
    assert_eq!(candidate.objective_value, Some(1.0));
    assert!(reach.contains(&candidate.marking).unwrap());
    let tokens: u64 = candidate.marking.to_marking().total();
    assert_eq!(tokens, 1);
}

#[test]
fn mutex_never_admits_both_processes() {
    let net = load("mutex.ron");
    // The place-to-place arc in the description is dropped on load.
    assert_eq!(net.to_description().arcs.len(), 12);

    let reach = SymbolicReachability::compute(&net).unwrap();
    assert_eq!(reach.count(), 3);

    let both = Query {
        constraints: vec![MarkingConstraint {
            terms: vec![
                (net.place_id("crit0").unwrap(), 1.0),
                (net.place_id("crit1").unwrap(), 1.0),
            ],
            sense: ConstraintSense::GreaterEqual,
            rhs: 2.0,
        }],
        objective: None,
    };
    let outcome = RelaxedSearch::new(&net, &reach).run(&both).unwrap();
    assert!(matches!(outcome, SearchOutcome::Exhausted { .. }));

    let deadlock = find_deadlock(&RelaxedSearch::new(&net, &reach)).unwrap();
    assert_eq!(deadlock.candidate(), None);
}

#[test]
fn pipeline_report_round_trips_to_disk() {
    let net = load("mutex.ron");
    let mut sink = CollectSink::default();
    let report = Analyzer::new(&net, AnalysisConfig::default())
        .run(Some(&mut sink))
        .unwrap();

    assert_eq!(sink.events.len(), 4);
    assert_eq!(sink.events[1].phase, Phase::Symbolic);
    assert_eq!(report.explicit.as_ref().unwrap().stats.state_count, 3);
    assert!(!report.deadlock.as_ref().unwrap().has_deadlock);

    let optimum = report.optimum.as_ref().unwrap();
    assert_eq!(optimum.value, Some(3.0));
    let marking = optimum.marking.as_ref().unwrap();
    assert_eq!(marking["lock"], 1);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mutex.txt");
    report.save_to_file(&path).unwrap();
    let json: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("mutex.txt.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(json["symbolic"]["reachable_markings"], 3);
    assert_eq!(json["deadlock"]["has_deadlock"], false);
}
