// SPDX-License-Identifier: Apache-2.0

//! Constant propagation.
//!
//! Any combinational net whose every argument is a compile-time constant is
//! evaluated immediately and its consumers rewired to a fresh constant
//! signal, transitively until no more progress is made. One-bit logic nets
//! with a single constant argument additionally reduce to a constant, a
//! forward, or an inverter. Registers and memory ports carry state and are
//! never folded.

use std::collections::{HashMap, HashSet};

use crate::bits::Bits;
use crate::block::Block;
use crate::errors::PassError;
use crate::ir::{NetId, NetOp, SignalId, SignalRole};

fn const_value(block: &Block, id: SignalId) -> Option<Bits> {
    match &block.signal(id).role {
        SignalRole::Const(value) => Some(value.clone()),
        _ => None,
    }
}

fn foldable(op: &NetOp) -> bool {
    !matches!(op, NetOp::Reg | NetOp::MemRead(_) | NetOp::MemWrite(_))
}

/// One folding sweep; returns whether anything changed.
fn fold_pass(block: &mut Block) -> Result<bool, PassError> {
    let mut subst: HashMap<SignalId, SignalId> = HashMap::new();
    let mut dropped: HashSet<usize> = HashSet::new();
    // (net, replacement op, replacement args) for partial one-bit reductions
    // and output-driving folds.
    let mut rewrites: Vec<(NetId, NetOp, Vec<SignalId>)> = Vec::new();
    // Folded constants to mint, paired with the net they replace.
    let mut minted: Vec<(NetId, Bits)> = Vec::new();

    for (id, net) in block.nets() {
        if !foldable(&net.op) {
            continue;
        }
        let dest = net.dest.expect("foldable net has a destination");
        let dest_width = block.signal(dest).width;
        let values: Vec<Option<Bits>> = net
            .args
            .iter()
            .map(|&a| const_value(block, a))
            .collect();
        if values.iter().all(|v| v.is_some()) {
            // A same-width copy of a constant is already canonical: forward a
            // wire destination to the constant itself and leave an
            // output-driving copy alone (re-minting it would never converge).
            if matches!(net.op, NetOp::Copy)
                && block.signal(net.args[0]).width == dest_width
            {
                if matches!(block.signal(dest).role, SignalRole::Wire) {
                    subst.insert(dest, net.args[0]);
                    dropped.insert(id.index);
                }
                continue;
            }
            let args: Vec<&Bits> = values.iter().map(|v| v.as_ref().unwrap()).collect();
            minted.push((id, net.op.eval(&args, dest_width)));
            continue;
        }
        // One-bit two-input logic with a single known side: decide by truth
        // table over the unknown side.
        if dest_width == 1
            && matches!(net.op, NetOp::And | NetOp::Or | NetOp::Xor | NetOp::Nand)
        {
            let (const_side, other) = match (&values[0], &values[1]) {
                (Some(c), None) => (c.clone(), net.args[1]),
                (None, Some(c)) => (c.clone(), net.args[0]),
                _ => continue,
            };
            if block.signal(other).width != 1 {
                continue;
            }
            let zero = Bits::zero(1);
            let one = Bits::from_u64(1, 1).unwrap();
            let out0 = net.op.eval(&[&const_side, &zero], 1);
            let out1 = net.op.eval(&[&const_side, &one], 1);
            if out0 == out1 {
                minted.push((id, out0));
            } else if out0.is_zero() {
                // Identity in the unknown operand.
                rewrites.push((id, NetOp::Copy, vec![other]));
            } else {
                rewrites.push((id, NetOp::Not, vec![other]));
            }
        }
    }

    if minted.is_empty() && rewrites.is_empty() && subst.is_empty() {
        return Ok(false);
    }
    log::debug!(
        "const_prop '{}': folding {} nets, rewriting {}",
        block.name(),
        minted.len(),
        rewrites.len()
    );

    for (net_id, value) in minted {
        let dest = block.net(net_id).dest.unwrap();
        let const_sig = block
            .const_bits(value)
            .expect("folded constant has a legal width");
        if matches!(block.signal(dest).role, SignalRole::Wire) {
            subst.insert(dest, const_sig);
            dropped.insert(net_id.index);
        } else {
            // Outputs keep a driving net; it becomes a copy of the constant.
            rewrites.push((net_id, NetOp::Copy, vec![const_sig]));
        }
    }
    for (net_id, op, args) in rewrites {
        let net = block.net_mut(net_id);
        net.op = op;
        net.args = args;
    }
    block.retain_nets(|id, _| !dropped.contains(&id.index));
    super::rewire_args(block, &subst);
    for &dest in subst.keys() {
        block
            .remove_signal(dest)
            .expect("folded destination is unreferenced");
    }
    Ok(true)
}

pub fn const_prop(block: &mut Block) -> Result<(), PassError> {
    while fold_pass(block)? {}
    super::check("const_prop", block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::RoleTag;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_folds_transitively() {
        let mut block = Block::new("fold");
        let two = block.const_u64(8, 2).unwrap();
        let three = block.const_u64(8, 3).unwrap();
        let five = block.add(two, three).unwrap();
        let ten = block.mul(five, five).unwrap();
        let q = block.output("q", 8).unwrap();
        block.assign(q, ten).unwrap();
        block.validate().unwrap();

        const_prop(&mut block).unwrap();
        // Everything collapses to a single copy of a constant into q.
        assert_eq!(block.net_count(), 1);
        let driver = block.producer(q).unwrap();
        assert!(matches!(block.net(driver).op, NetOp::Copy));
        let const_sig = block.net(driver).args[0];
        match &block.signal(const_sig).role {
            SignalRole::Const(value) => assert_eq!(value.to_u64(), Some(25)),
            role => panic!("expected const, got {:?}", role.tag()),
        }
    }

    #[test]
    fn test_partial_one_bit_reductions() {
        let mut block = Block::new("partial");
        let a = block.input("a", 1).unwrap();
        let one = block.const_u64(1, 1).unwrap();
        let zero = block.const_u64(1, 0).unwrap();
        // a & 1 == a; a ^ 1 == ~a; a & 0 == 0.
        let and1 = block.and(a, one).unwrap();
        let xor1 = block.xor(a, one).unwrap();
        let and0 = block.and(a, zero).unwrap();
        let q1 = block.output("q1", 1).unwrap();
        block.assign(q1, and1).unwrap();
        let q2 = block.output("q2", 1).unwrap();
        block.assign(q2, xor1).unwrap();
        let q3 = block.output("q3", 1).unwrap();
        block.assign(q3, and0).unwrap();

        const_prop(&mut block).unwrap();
        // a & 1 became a copy of a.
        let and1_driver = block.producer(and1).unwrap();
        assert!(matches!(block.net(and1_driver).op, NetOp::Copy));
        assert_eq!(block.net(and1_driver).args, vec![a]);
        // a ^ 1 became an inverter.
        let xor1_driver = block.producer(xor1).unwrap();
        assert!(matches!(block.net(xor1_driver).op, NetOp::Not));
        // a & 0 folded away entirely; q3 is now driven by a constant copy.
        assert!(block.producer(and0).is_none());
        let q3 = block.signal_by_name("q3").unwrap();
        let q3_driver = block.producer(q3).unwrap();
        assert!(matches!(block.net(q3_driver).op, NetOp::Copy));
        assert!(matches!(
            block.signal(block.net(q3_driver).args[0]).role,
            SignalRole::Const(_)
        ));
    }

    #[test]
    fn test_idempotent_up_to_renaming() {
        let mut block = Block::new("idem");
        let two = block.const_u64(4, 2).unwrap();
        let three = block.const_u64(4, 3).unwrap();
        let sum = block.add(two, three).unwrap();
        let a = block.input("a", 5).unwrap();
        let total = block.add(sum, a).unwrap();
        let q = block.output("q", 6).unwrap();
        block.assign(q, total).unwrap();

        const_prop(&mut block).unwrap();
        let nets_once = block.net_count();
        let ops_once: Vec<&'static str> =
            block.nets().map(|(_, n)| n.op.operator()).collect();
        const_prop(&mut block).unwrap();
        let ops_twice: Vec<&'static str> =
            block.nets().map(|(_, n)| n.op.operator()).collect();
        assert_eq!(block.net_count(), nets_once);
        assert_eq!(ops_once, ops_twice);
    }

    #[test]
    fn test_register_never_folded() {
        let mut block = Block::new("reg");
        let r = block.register("r", 4).unwrap();
        let c = block.const_u64(4, 9).unwrap();
        block.set_reg_next(r, c).unwrap();
        let q = block.output("q", 4).unwrap();
        block.assign(q, r).unwrap();

        const_prop(&mut block).unwrap();
        assert!(block
            .nets()
            .any(|(_, n)| matches!(n.op, NetOp::Reg)));
    }
}
