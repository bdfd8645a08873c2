// SPDX-License-Identifier: Apache-2.0

//! Topological ordering of the combinational sub-graph.
//!
//! Register updates, memory writes, and synchronous read ports cross the
//! clock boundary, so they are excluded from the dependency graph here; that
//! exclusion is exactly what makes a legal design acyclic.

use std::collections::VecDeque;

use crate::block::Block;
use crate::ir::NetId;

/// Returns the combinational nets in a dependency-respecting evaluation
/// order, or the set of nets stuck on a combinational cycle.
///
/// The order is deterministic for a given block (Kahn's scheme with a FIFO
/// ready queue seeded in net insertion order).
pub fn comb_schedule(block: &Block) -> Result<Vec<NetId>, Vec<NetId>> {
    let net_count = block.net_count();
    // Membership map: net index -> is combinational.
    let mut is_comb = vec![false; net_count];
    // Producing combinational net per signal index.
    let mut comb_producer: Vec<Option<usize>> = vec![None; block.signal_slot_count()];

    let mut comb_total = 0usize;
    for (id, net) in block.nets() {
        if net.op.is_combinational() && !block.is_sync_read(net) {
            is_comb[id.index] = true;
            comb_total += 1;
            if let Some(dest) = net.dest {
                comb_producer[dest.index] = Some(id.index);
            }
        }
    }

    let mut indegree = vec![0usize; net_count];
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); net_count];
    for (id, net) in block.nets() {
        if !is_comb[id.index] {
            continue;
        }
        for &arg in &net.args {
            if let Some(parent) = comb_producer[arg.index] {
                children[parent].push(id.index);
                indegree[id.index] += 1;
            }
        }
    }

    let mut queue: VecDeque<usize> = VecDeque::new();
    for i in 0..net_count {
        if is_comb[i] && indegree[i] == 0 {
            queue.push_back(i);
        }
    }

    let mut order: Vec<NetId> = Vec::with_capacity(comb_total);
    while let Some(index) = queue.pop_front() {
        order.push(NetId { index });
        for &child in &children[index] {
            indegree[child] -= 1;
            if indegree[child] == 0 {
                queue.push_back(child);
            }
        }
    }

    if order.len() != comb_total {
        let stuck: Vec<NetId> = (0..net_count)
            .filter(|&i| is_comb[i] && !order.iter().any(|n| n.index == i))
            .map(|index| NetId { index })
            .collect();
        log::debug!(
            "combinational cycle: scheduled {} of {} nets, stuck: {:?}",
            order.len(),
            comb_total,
            stuck
        );
        return Err(stuck);
    }
    Ok(order)
}
