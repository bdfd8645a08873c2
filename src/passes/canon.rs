// SPDX-License-Identifier: Apache-2.0

//! Canonicalization of selects and concatenations.
//!
//! Chains of adjacent bit-selects collapse into one select on the original
//! source, nested concatenations flatten into a single multi-way concat, and
//! a concat of selects on one common source becomes a single wider select.
//! Identity selects/concats degrade to plain copies. The point is to expose
//! structural equality for the CSE pass; the dead inner nets are left for
//! the dead-code sweep.

use crate::block::Block;
use crate::errors::PassError;
use crate::ir::{NetId, NetOp, SignalId};

/// If `signal` is produced by a select net, returns (source, indices).
fn select_producer(block: &Block, signal: SignalId) -> Option<(SignalId, Vec<usize>)> {
    let producer = block.producer(signal)?;
    match &block.net(producer).op {
        NetOp::Select(indices) => Some((block.net(producer).args[0], indices.clone())),
        _ => None,
    }
}

/// If `signal` is produced by a non-truncating concat net, returns its args.
fn concat_producer(block: &Block, signal: SignalId) -> Option<Vec<SignalId>> {
    let producer = block.producer(signal)?;
    let net = block.net(producer);
    if !matches!(net.op, NetOp::Concat) {
        return None;
    }
    let natural: usize = net.args.iter().map(|&a| block.signal(a).width).sum();
    if block.signal(signal).width != natural {
        // A truncated concat destination dropped high bits; splicing the
        // arguments back in would resurrect them.
        return None;
    }
    Some(net.args.clone())
}

/// One rewrite attempt on one net; returns whether it changed.
fn rewrite_net(block: &mut Block, id: NetId) -> bool {
    let net = block.net(id);
    match net.op.clone() {
        NetOp::Select(outer) => {
            let src = net.args[0];
            // Identity select degrades to a copy.
            if outer.len() == block.signal(src).width
                && outer.iter().enumerate().all(|(i, &index)| i == index)
            {
                block.net_mut(id).op = NetOp::Copy;
                return true;
            }
            if let Some((inner_src, inner)) = select_producer(block, src) {
                let composed: Vec<usize> = outer.iter().map(|&i| inner[i]).collect();
                let net = block.net_mut(id);
                net.op = NetOp::Select(composed);
                net.args = vec![inner_src];
                return true;
            }
            false
        }
        NetOp::Concat => {
            let args = net.args.clone();
            if args.len() == 1 {
                block.net_mut(id).op = NetOp::Copy;
                return true;
            }
            // Flatten one nested concat per attempt.
            for (position, &arg) in args.iter().enumerate() {
                if let Some(inner_args) = concat_producer(block, arg) {
                    let mut flattened = args.clone();
                    flattened.splice(position..position + 1, inner_args);
                    block.net_mut(id).args = flattened;
                    return true;
                }
            }
            // A concat whose every argument selects from one source is a
            // single wider select on that source.
            let mut parts: Vec<(SignalId, Vec<usize>)> = Vec::new();
            for &arg in &args {
                match select_producer(block, arg) {
                    Some((src, indices))
                        if indices.len() == block.signal(arg).width =>
                    {
                        parts.push((src, indices));
                    }
                    _ => return false,
                }
            }
            let src = parts[0].0;
            if parts.iter().any(|(s, _)| *s != src) {
                return false;
            }
            // Concat args are msb-first; select indices are lsb-first.
            let mut indices = Vec::new();
            for (_, part) in parts.iter().rev() {
                indices.extend(part.iter().copied());
            }
            let net = block.net_mut(id);
            net.op = NetOp::Select(indices);
            net.args = vec![src];
            true
        }
        _ => false,
    }
}

pub fn canon(block: &mut Block) -> Result<(), PassError> {
    let mut total = 0usize;
    loop {
        let mut changed = false;
        for index in 0..block.net_count() {
            if rewrite_net(block, NetId { index }) {
                changed = true;
                total += 1;
            }
        }
        if !changed {
            break;
        }
    }
    if total > 0 {
        log::debug!("canon '{}': {} rewrites", block.name(), total);
    }
    super::check("canon", block)
}
