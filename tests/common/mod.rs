// SPDX-License-Identifier: Apache-2.0

//! Shared helpers for the integration tests: a design exercising every
//! operation kind, random stimulus generation, and by-name trace comparison.

#![allow(dead_code)]

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use bitrtl::bits::Bits;
use bitrtl::block::Block;
use bitrtl::ir::SignalId;
use bitrtl::trace::SimulationTrace;

pub const ALU_OUTPUTS: &[&str] = &[
    "and_q", "or_q", "xor_q", "nand_q", "not_q", "eq_q", "lt_q", "gt_q", "add_q", "sub_q",
    "mul_q", "mux_q", "cat_q", "sel_q", "trunc_q", "coerce_q", "acc_q", "mem_q", "smem_q",
];

/// Input names and widths of the ALU design, in stimulus order.
pub const ALU_INPUTS: &[(&str, usize)] =
    &[("a", 8), ("b", 8), ("sel", 1), ("en", 1), ("addr", 4)];

/// Builds a design that exercises every operation kind: the full logic and
/// arithmetic set, width coercion, truncation, a register accumulator, and
/// one asynchronous plus one synchronous memory.
pub fn build_alu_block() -> Block {
    let mut block = Block::new("alu");
    let a = block.input("a", 8).unwrap();
    let b = block.input("b", 8).unwrap();
    let sel = block.input("sel", 1).unwrap();
    let en = block.input("en", 1).unwrap();
    let addr = block.input("addr", 4).unwrap();

    let mut emit = |block: &mut Block, name: &str, sig: SignalId| {
        let width = block.signal_width(sig);
        let out = block.output(name, width).unwrap();
        block.assign(out, sig).unwrap();
    };

    let and = block.and(a, b).unwrap();
    emit(&mut block, "and_q", and);
    let or = block.or(a, b).unwrap();
    emit(&mut block, "or_q", or);
    let xor = block.xor(a, b).unwrap();
    emit(&mut block, "xor_q", xor);
    let nand = block.nand(a, b).unwrap();
    emit(&mut block, "nand_q", nand);
    let not = block.not_(a).unwrap();
    emit(&mut block, "not_q", not);
    let eq = block.eq(a, b).unwrap();
    emit(&mut block, "eq_q", eq);
    let lt = block.lt(a, b).unwrap();
    emit(&mut block, "lt_q", lt);
    let gt = block.gt(a, b).unwrap();
    emit(&mut block, "gt_q", gt);
    let add = block.add(a, b).unwrap();
    emit(&mut block, "add_q", add);
    let sub = block.sub(a, b).unwrap();
    emit(&mut block, "sub_q", sub);
    let mul = block.mul(a, b).unwrap();
    emit(&mut block, "mul_q", mul);
    let mux = block.mux(sel, a, b).unwrap();
    emit(&mut block, "mux_q", mux);
    let cat = block.concat(&[a, b]).unwrap();
    emit(&mut block, "cat_q", cat);
    let slice = block.select_range(a, 2, 6).unwrap();
    emit(&mut block, "sel_q", slice);

    // Truncating assignment: the 9-bit sum squeezed into 4 bits.
    let trunc = block.output("trunc_q", 4).unwrap();
    block.assign(trunc, add).unwrap();

    // Implicit zero-extension: comparing an 8-bit against a 4-bit operand.
    let coerce = block.eq(a, addr).unwrap();
    emit(&mut block, "coerce_q", coerce);

    // Accumulator register.
    let acc = block.register("acc", 8).unwrap();
    let acc_next = block.add(acc, a).unwrap();
    block.set_reg_next(acc, acc_next).unwrap();
    emit(&mut block, "acc_q", acc);

    // Async-read memory written from `a` under an enable.
    let mem = block.memory("scratch", 8, 4, false).unwrap();
    block.mem_write(mem, addr, a, Some(en)).unwrap();
    let mem_data = block.mem_read(mem, addr).unwrap();
    emit(&mut block, "mem_q", mem_data);

    // Sync-read memory written from `b` every cycle.
    let smem = block.memory("table", 8, 4, true).unwrap();
    block.mem_write(smem, addr, b, None).unwrap();
    let smem_data = block.mem_read(smem, addr).unwrap();
    emit(&mut block, "smem_q", smem_data);

    block.validate().unwrap();
    block
}

/// Random stimulus for a block with the given named inputs.
pub fn random_steps(
    block: &Block,
    inputs: &[(&str, usize)],
    cycles: usize,
    seed: u64,
) -> Vec<HashMap<SignalId, Bits>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..cycles)
        .map(|_| {
            inputs
                .iter()
                .map(|&(name, width)| {
                    let signal = block
                        .signal_by_name(name)
                        .unwrap_or_else(|| panic!("input '{}' not found", name));
                    let max = if width >= 64 { u64::MAX } else { (1 << width) - 1 };
                    let value = rng.gen_range(0..=max);
                    (signal, Bits::from_u64(width, value).unwrap())
                })
                .collect()
        })
        .collect()
}

/// Asserts that two traces agree, value for value, on every named signal.
pub fn assert_traces_equal(
    left: &SimulationTrace,
    right: &SimulationTrace,
    names: &[&str],
) {
    for &name in names {
        let lhs = left
            .values_by_name(name)
            .unwrap_or_else(|| panic!("'{}' missing from left trace", name));
        let rhs = right
            .values_by_name(name)
            .unwrap_or_else(|| panic!("'{}' missing from right trace", name));
        assert_eq!(lhs, rhs, "trace mismatch on '{}'", name);
    }
}
