// SPDX-License-Identifier: Apache-2.0

//! Removes directional wire nets by forwarding their consumers to the source.
//!
//! Only same-width copies into plain wires are forwarded: a truncating copy
//! changes the value and a copy into an output is the output's driver.

use std::collections::{HashMap, HashSet};

use crate::block::Block;
use crate::errors::PassError;
use crate::ir::{NetOp, SignalId, SignalRole};

pub fn copy_forward(block: &mut Block) -> Result<(), PassError> {
    let mut forward: HashMap<SignalId, SignalId> = HashMap::new();
    let mut dropped: HashSet<usize> = HashSet::new();
    for (id, net) in block.nets() {
        if !matches!(net.op, NetOp::Copy) {
            continue;
        }
        let dest = net.dest.expect("copy net has a destination");
        let src = net.args[0];
        if block.signal(dest).width != block.signal(src).width {
            continue;
        }
        if !matches!(block.signal(dest).role, SignalRole::Wire) {
            continue;
        }
        forward.insert(dest, src);
        dropped.insert(id.index);
    }
    if forward.is_empty() {
        return Ok(());
    }
    log::debug!(
        "copy_forward '{}': forwarding {} wire nets",
        block.name(),
        forward.len()
    );

    block.retain_nets(|id, _| !dropped.contains(&id.index));
    super::rewire_args(block, &forward);
    for &dest in forward.keys() {
        block
            .remove_signal(dest)
            .expect("forwarded copy destination is unreferenced");
    }
    super::check("copy_forward", block)
}
