//! Strongly connected components (Tarjan)
//!
//! Generalizes the `SccFinder` style used elsewhere in this codebase for
//! settlement netting to run over an arbitrary restricted node subset —
//! needed by the delta pipeline, which only wants SCCs within the affected
//! sub-graph, not the whole snapshot. Trivial SCCs (size < 2) are dropped
//! for cycle purposes.

use crate::graph::model::TradeGraph;
use crate::graph::types::ParticipantId;
use std::collections::BTreeSet;

/// One strongly connected component, as a sorted set of participant ids.
pub type Scc = BTreeSet<ParticipantId>;

struct TarjanState {
    index: usize,
    indices: Vec<Option<usize>>,
    lowlinks: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<ParticipantId>,
    sccs: Vec<Scc>,
    in_scope: Vec<bool>,
}

/// Find all non-trivial SCCs reachable using only nodes in `scope` (pass
/// `None` to run over the whole graph). Components are returned in reverse
/// topological order of the condensation, matching Tarjan's natural
/// pop-order, and participants within a component are sorted for
/// deterministic downstream iteration.
pub fn find_sccs(graph: &TradeGraph, scope: Option<&BTreeSet<ParticipantId>>) -> Vec<Scc> {
    let n = graph.participant_count();
    if n == 0 {
        return Vec::new();
    }

    let in_scope: Vec<bool> = (0..n)
        .map(|i| match scope {
            Some(s) => s.contains(&ParticipantId(i as u32)),
            None => true,
        })
        .collect();

    let mut state = TarjanState {
        index: 0,
        indices: vec![None; n],
        lowlinks: vec![0; n],
        on_stack: vec![false; n],
        stack: Vec::new(),
        sccs: Vec::new(),
        in_scope,
    };

    for v in 0..n {
        if state.in_scope[v] && state.indices[v].is_none() {
            strongconnect(graph, ParticipantId(v as u32), &mut state);
        }
    }

    state.sccs.into_iter().filter(|scc| scc.len() >= 2).collect()
}

fn strongconnect(graph: &TradeGraph, v: ParticipantId, state: &mut TarjanState) {
    let vi = v.0 as usize;
    state.indices[vi] = Some(state.index);
    state.lowlinks[vi] = state.index;
    state.index += 1;
    state.stack.push(v);
    state.on_stack[vi] = true;

    for (&w, _edges) in graph.out_edges_by_id(v) {
        let wi = w.0 as usize;
        if !state.in_scope[wi] {
            continue;
        }
        if state.indices[wi].is_none() {
            strongconnect(graph, w, state);
            state.lowlinks[vi] = state.lowlinks[vi].min(state.lowlinks[wi]);
        } else if state.on_stack[wi] {
            state.lowlinks[vi] = state.lowlinks[vi].min(state.indices[wi].unwrap());
        }
    }

    if Some(state.lowlinks[vi]) == state.indices[vi] {
        let mut scc = BTreeSet::new();
        loop {
            let w = state.stack.pop().expect("tarjan stack must not underflow at root");
            state.on_stack[w.0 as usize] = false;
            scc.insert(w);
            if w == v {
                break;
            }
        }
        state.sccs.push(scc);
    }
}
