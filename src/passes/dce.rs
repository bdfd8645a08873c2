// SPDX-License-Identifier: Apache-2.0

//! Dead-code elimination.
//!
//! Roots are the nets driving declared outputs, register updates, and memory
//! write ports; everything not reachable backward from a root is removed.
//! The result is a fresh compacted container with densely renumbered ids;
//! names are the stable handles across the sweep.

use std::collections::HashMap;

use crate::block::Block;
use crate::errors::PassError;
use crate::ir::{NetOp, SignalId, SignalRole};

pub fn dce(block: &Block) -> Result<Block, PassError> {
    let net_count = block.net_count();
    let mut live = vec![false; net_count];
    let mut worklist: Vec<usize> = Vec::new();
    for (id, net) in block.nets() {
        let is_root = matches!(net.op, NetOp::Reg | NetOp::MemWrite(_))
            || net
                .dest
                .map_or(false, |d| matches!(block.signal(d).role, SignalRole::Output));
        if is_root {
            live[id.index] = true;
            worklist.push(id.index);
        }
    }
    while let Some(index) = worklist.pop() {
        let net = block.net(crate::ir::NetId { index });
        for &arg in &net.args {
            if let Some(producer) = block.producer(arg) {
                if !live[producer.index] {
                    live[producer.index] = true;
                    worklist.push(producer.index);
                }
            }
        }
    }

    // Signals referenced by any live net survive.
    let mut referenced = vec![false; block.signal_slot_count()];
    for (id, net) in block.nets() {
        if !live[id.index] {
            continue;
        }
        for &arg in &net.args {
            referenced[arg.index] = true;
        }
        if let Some(dest) = net.dest {
            referenced[dest.index] = true;
        }
    }

    let mut result = Block::new(block.name());
    for (_, memory) in block.memories() {
        // Memories are kept wholesale so memory ids stay aligned.
        result
            .add_memory(&memory.name, memory.width, memory.addr_width, memory.sync_read)
            .expect("memory parameters were already validated");
    }
    let mut old_to_new: HashMap<SignalId, SignalId> = HashMap::new();
    for (id, signal) in block.signals() {
        if !referenced[id.index] {
            if matches!(signal.role, SignalRole::Input) {
                log::warn!("input '{}' was removed by dead-code elimination", signal.name);
            } else {
                log::trace!("dce dropping unreferenced signal '{}'", signal.name);
            }
            continue;
        }
        let new_id = result
            .add_signal(Some(&signal.name), signal.width, signal.role.clone())
            .expect("signal was already validated");
        old_to_new.insert(id, new_id);
    }
    for (id, net) in block.nets() {
        if !live[id.index] {
            continue;
        }
        let args: Vec<SignalId> = net.args.iter().map(|a| old_to_new[a]).collect();
        let dest = net.dest.map(|d| old_to_new[&d]);
        result
            .add_net(net.op.clone(), args, dest)
            .expect("live net was already validated");
    }
    log::debug!(
        "dce '{}': {} -> {} nets",
        block.name(),
        net_count,
        result.net_count()
    );
    super::check("dce", &result)?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_removes_exactly_the_unreachable() {
        let mut block = Block::new("dead");
        let a = block.input("a", 4).unwrap();
        let b = block.input("b", 4).unwrap();
        let live_sum = block.add(a, b).unwrap();
        let _dead_mul = block.mul(a, b).unwrap();
        let _dead_not = block.not_(a).unwrap();
        let q = block.output("q", 5).unwrap();
        block.assign(q, live_sum).unwrap();

        let swept = dce(&block).unwrap();
        assert_eq!(swept.net_count(), 2);
        assert!(swept.signal_by_name("q").is_some());
        assert!(swept.signal_by_name("a").is_some());
    }

    #[test]
    fn test_registers_and_writes_are_roots() {
        let mut block = Block::new("roots");
        let a = block.input("a", 4).unwrap();
        // A register nothing observes still survives.
        let r = block.register("r", 4).unwrap();
        block.set_reg_next(r, a).unwrap();
        // A memory write port likewise.
        let mem = block.memory("m", 4, 2, false).unwrap();
        let addr = block.input("addr", 2).unwrap();
        block.mem_write(mem, addr, a, None).unwrap();
        let q = block.output("q", 4).unwrap();
        block.assign(q, a).unwrap();

        let swept = dce(&block).unwrap();
        assert!(swept.nets().any(|(_, n)| matches!(n.op, NetOp::Reg)));
        assert!(swept
            .nets()
            .any(|(_, n)| matches!(n.op, NetOp::MemWrite(_))));
    }

    #[test]
    fn test_rerun_is_a_no_op() {
        let mut block = Block::new("fix");
        let a = block.input("a", 4).unwrap();
        let n = block.not_(a).unwrap();
        let _dead = block.xor(a, n).unwrap();
        let q = block.output("q", 4).unwrap();
        block.assign(q, n).unwrap();

        let once = dce(&block).unwrap();
        let twice = dce(&once).unwrap();
        assert_eq!(once.net_count(), twice.net_count());
        let ops1: Vec<&'static str> = once.nets().map(|(_, n)| n.op.operator()).collect();
        let ops2: Vec<&'static str> = twice.nets().map(|(_, n)| n.op.operator()).collect();
        assert_eq!(ops1, ops2);
    }
}
