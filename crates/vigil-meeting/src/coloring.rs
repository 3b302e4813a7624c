//! Welsh–Powell coloring of the meeting conflict graph.
//!
//! Two meetings conflict iff their participant sets overlap: an agent cannot
//! be at both at the same tick. Meetings are colored in insertion order with
//! the lowest color no already-colored conflicting meeting uses. Greedy
//! coloring always terminates, so there is no failure case.

use std::collections::BTreeSet;

use vigil_topology::AgentId;

/// Check whether two participant sets share an agent.
pub fn conflicts(a: &BTreeSet<AgentId>, b: &BTreeSet<AgentId>) -> bool {
    a.intersection(b).next().is_some()
}

/// Color every participant set; returns one color per input, in order.
pub fn welsh_powell(participants: &[BTreeSet<AgentId>]) -> Vec<usize> {
    let mut colors: Vec<usize> = Vec::with_capacity(participants.len());

    for (i, set) in participants.iter().enumerate() {
        let taken: BTreeSet<usize> = participants[..i]
            .iter()
            .zip(&colors)
            .filter(|(other, _)| conflicts(set, other))
            .map(|(_, &c)| c)
            .collect();
        let color = (0..).find(|c| !taken.contains(c)).unwrap_or(0);
        colors.push(color);
    }
    colors
}

/// Number of colors used.
pub fn color_count(colors: &[usize]) -> usize {
    colors.iter().max().map_or(0, |&c| c + 1)
}
