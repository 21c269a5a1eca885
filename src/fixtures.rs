//! Nets shared by the unit tests.
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::net::Net;

/// P1 -T1-> P2 -T2-> P3, one token in P1.
pub(crate) fn chain_net() -> Net {
    let mut net = Net::empty();
    net.add_place("P1", "P1", 1);
    net.add_place("P2", "P2", 0);
    net.add_place("P3", "P3", 0);
    net.add_transition("T1", "T1");
    net.add_transition("T2", "T2");
    net.add_arc("P1", "T1");
    net.add_arc("T1", "P2");
    net.add_arc("P2", "T2");
    net.add_arc("T2", "P3");
    net
}

/// `t` re-produces its only input and adds a token to `c`; since `b` is
/// never marked, `t` is dead, but the state equation lets `c` fill up.
pub(crate) fn phantom_net() -> Net {
    let mut net = Net::empty();
    net.add_place("s", "s", 1);
    net.add_place("b", "b", 0);
    net.add_place("c", "c", 0);
    net.add_transition("t", "t");
    net.add_arc("b", "t");
    net.add_arc("t", "b");
    net.add_arc("t", "c");
    net
}

/// Two philosophers sharing two forks; grabbing forks one at a time can
/// deadlock when each holds a single fork.
pub(crate) fn philosophers_net() -> Net {
    let mut net = Net::empty();
    for fork in ["fork0", "fork1"] {
        net.add_place(fork, fork, 1);
    }
    for phil in 0..2 {
        let (left, right) = (format!("fork{phil}"), format!("fork{}", (phil + 1) % 2));
        let think = format!("think{phil}");
        let one = format!("hasleft{phil}");
        let eat = format!("eat{phil}");
        net.add_place(think.as_str(), "thinking", 1);
        net.add_place(one.as_str(), "holding left", 0);
        net.add_place(eat.as_str(), "eating", 0);

        let take_left = format!("takeleft{phil}");
        let take_right = format!("takeright{phil}");
        let release = format!("release{phil}");
        net.add_transition(take_left.as_str(), "take left fork");
        net.add_transition(take_right.as_str(), "take right fork");
        net.add_transition(release.as_str(), "release forks");

        net.add_arc(&think, &take_left);
        net.add_arc(&left, &take_left);
        net.add_arc(&take_left, &one);
        net.add_arc(&one, &take_right);
        net.add_arc(&right, &take_right);
        net.add_arc(&take_right, &eat);
        net.add_arc(&eat, &release);
        net.add_arc(&release, &think);
        net.add_arc(&release, &left);
        net.add_arc(&release, &right);
    }
    net
}

/// Random synchronised product of state machines. Every component holds
/// exactly one token, so the net is 1-bounded by construction; transitions
/// move the token inside one component or synchronise two components, and
/// may test a place of a third component through a self-loop.
pub(crate) fn random_safe_net(seed: u64) -> Net {
    let mut rng = StdRng::seed_from_u64(seed);
    let components = rng.random_range(1..=3usize);
    let mut net = Net::empty();
    let mut places: Vec<Vec<String>> = Vec::new();

    for c in 0..components {
        let size = rng.random_range(2..=3usize);
        let marked = rng.random_range(0..size);
        let ids: Vec<String> = (0..size).map(|i| format!("c{c}s{i}")).collect();
        for (i, id) in ids.iter().enumerate() {
            net.add_place(id.as_str(), id.as_str(), u64::from(i == marked));
        }
        places.push(ids);
    }

    let transitions = rng.random_range(1..=6usize);
    for t in 0..transitions {
        let id = format!("t{t}");
        net.add_transition(id.as_str(), id.as_str());

        let first = rng.random_range(0..components);
        let mut moved = vec![first];
        if components > 1 && rng.random_bool(0.4) {
            let second = (first + rng.random_range(1..components)) % components;
            moved.push(second);
        }
        for &c in &moved {
            let from = &places[c][rng.random_range(0..places[c].len())];
            let to = &places[c][rng.random_range(0..places[c].len())];
            net.add_arc(from, &id);
            net.add_arc(&id, to);
        }

        if rng.random_bool(0.3) {
            let c = rng.random_range(0..components);
            if !moved.contains(&c) {
                let guard = &places[c][rng.random_range(0..places[c].len())];
                net.add_arc(guard, &id);
                net.add_arc(&id, guard);
            }
        }
    }
    net
}
