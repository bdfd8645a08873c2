// SPDX-License-Identifier: Apache-2.0

//! Common-subexpression elimination.
//!
//! Nets are keyed by kind, kind metadata, ordered argument identities, and
//! destination width; structural duplicates are merged onto the earliest net
//! in dependency order. Registers and memory ports carry state and are never
//! merged, nor are nets driving outputs (an output must keep its own
//! driver).

use std::collections::{HashMap, HashSet};

use crate::block::Block;
use crate::errors::{PassError, StructuralError};
use crate::ir::{NetOp, SignalId, SignalRole};
use crate::topo;

pub fn cse(block: &mut Block) -> Result<(), PassError> {
    let schedule = topo::comb_schedule(block).map_err(|nets| PassError::Invalid {
        pass: "cse",
        source: StructuralError::CombinationalCycle { nets },
    })?;

    let mut canonical: HashMap<(NetOp, Vec<SignalId>, usize), SignalId> = HashMap::new();
    let mut subst: HashMap<SignalId, SignalId> = HashMap::new();
    let mut dropped: HashSet<usize> = HashSet::new();

    // Walking in dependency order and resolving arguments through the merge
    // map as we go lets whole duplicated trees collapse in one pass.
    for net_id in schedule {
        let net = block.net(net_id);
        if matches!(net.op, NetOp::Reg | NetOp::MemRead(_) | NetOp::MemWrite(_)) {
            continue;
        }
        let dest = net.dest.expect("combinational net has a destination");
        if !matches!(block.signal(dest).role, SignalRole::Wire) {
            continue;
        }
        let args: Vec<SignalId> = net
            .args
            .iter()
            .map(|&a| super::resolve(&subst, a))
            .collect();
        let key = (net.op.clone(), args, block.signal(dest).width);
        match canonical.get(&key) {
            Some(&keep) => {
                subst.insert(dest, keep);
                dropped.insert(net_id.index);
            }
            None => {
                canonical.insert(key, dest);
            }
        }
    }

    if dropped.is_empty() {
        return Ok(());
    }
    log::debug!(
        "cse '{}': merging {} duplicate nets",
        block.name(),
        dropped.len()
    );
    block.retain_nets(|id, _| !dropped.contains(&id.index));
    super::rewire_args(block, &subst);
    for &dest in subst.keys() {
        block
            .remove_signal(dest)
            .expect("merged duplicate destination is unreferenced");
    }
    super::check("cse", block)
}
