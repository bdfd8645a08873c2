// SPDX-License-Identifier: Apache-2.0

//! Synthesis must preserve cycle-by-cycle external behavior bit for bit, for
//! every operation kind. Random stimulus is pushed through the original and
//! the lowered container and the output traces compared by name.

mod common;

use std::collections::HashMap;

use bitrtl::bits::Bits;
use bitrtl::block::Block;
use bitrtl::sim::{SimConfig, Simulation};
use bitrtl::synth::{is_lowered, synthesize};
use test_case::test_case;

#[test]
fn test_alu_block_synthesis_preserves_traces() {
    let _ = env_logger::builder().is_test(true).try_init();
    let block = common::build_alu_block();
    let lowered = synthesize(&block).unwrap();
    lowered.validate().unwrap();
    assert!(is_lowered(&lowered));

    let steps = common::random_steps(&block, common::ALU_INPUTS, 64, 0x5eed);
    let lowered_steps = common::random_steps(&lowered, common::ALU_INPUTS, 64, 0x5eed);

    let mut orig_sim = Simulation::new(&block, SimConfig::default()).unwrap();
    let mut synth_sim = Simulation::new(&lowered, SimConfig::default()).unwrap();
    let orig_trace = orig_sim.step_multiple(&steps).unwrap().clone();
    let synth_trace = synth_sim.step_multiple(&lowered_steps).unwrap().clone();
    common::assert_traces_equal(&orig_trace, &synth_trace, common::ALU_OUTPUTS);
}

#[test_case(1; "one bit")]
#[test_case(2; "two bits")]
#[test_case(7; "odd width")]
#[test_case(16; "sixteen bits")]
#[test_case(64; "limb boundary")]
#[test_case(65; "past limb boundary")]
fn test_adder_synthesis_across_widths(width: usize) {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut block = Block::new("adder");
    let a = block.input("a", width).unwrap();
    let b = block.input("b", width).unwrap();
    let sum = block.add(a, b).unwrap();
    let q = block.output("q", width + 1).unwrap();
    block.assign(q, sum).unwrap();
    block.validate().unwrap();
    let lowered = synthesize(&block).unwrap();

    let inputs = [("a", width), ("b", width)];
    let steps = common::random_steps(&block, &inputs, 32, width as u64);
    let lowered_steps = common::random_steps(&lowered, &inputs, 32, width as u64);
    let mut orig_sim = Simulation::new(&block, SimConfig::default()).unwrap();
    let mut synth_sim = Simulation::new(&lowered, SimConfig::default()).unwrap();
    let orig_trace = orig_sim.step_multiple(&steps).unwrap().clone();
    let synth_trace = synth_sim.step_multiple(&lowered_steps).unwrap().clone();
    common::assert_traces_equal(&orig_trace, &synth_trace, &["q"]);
}

#[test_case(3; "three bit operands")]
#[test_case(8; "byte operands")]
fn test_multiplier_synthesis_exhaustive_small(width: usize) {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut block = Block::new("mult");
    let a = block.input("a", width).unwrap();
    let b = block.input("b", width).unwrap();
    let product = block.mul(a, b).unwrap();
    let q = block.output("q", 2 * width).unwrap();
    block.assign(q, product).unwrap();
    let lowered = synthesize(&block).unwrap();

    let la = lowered.signal_by_name("a").unwrap();
    let lb = lowered.signal_by_name("b").unwrap();
    let mut sim = Simulation::new(&lowered, SimConfig::default()).unwrap();
    let limit = 1u64 << width;
    // Exhaustive for width 3; strided sampling for byte operands.
    let stride = if width <= 4 { 1 } else { 13 };
    let mut expected = Vec::new();
    let mut steps = Vec::new();
    let mut x = 0u64;
    while x < limit {
        let mut y = 0u64;
        while y < limit {
            steps.push(HashMap::from([
                (la, Bits::from_u64(width, x).unwrap()),
                (lb, Bits::from_u64(width, y).unwrap()),
            ]));
            expected.push(x * y);
            y += stride;
        }
        x += stride;
    }
    let trace = sim.step_multiple(&steps).unwrap();
    let observed: Vec<u64> = trace
        .values_by_name("q")
        .unwrap()
        .iter()
        .map(|v| v.to_u64().unwrap())
        .collect();
    assert_eq!(observed, expected);
}

#[test]
fn test_comparison_synthesis_exhaustive() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut block = Block::new("cmp");
    let a = block.input("a", 4).unwrap();
    let b = block.input("b", 4).unwrap();
    let lt = block.lt(a, b).unwrap();
    let gt = block.gt(a, b).unwrap();
    let eq = block.eq(a, b).unwrap();
    let q_lt = block.output("q_lt", 1).unwrap();
    block.assign(q_lt, lt).unwrap();
    let q_gt = block.output("q_gt", 1).unwrap();
    block.assign(q_gt, gt).unwrap();
    let q_eq = block.output("q_eq", 1).unwrap();
    block.assign(q_eq, eq).unwrap();
    let lowered = synthesize(&block).unwrap();

    let la = lowered.signal_by_name("a").unwrap();
    let lb = lowered.signal_by_name("b").unwrap();
    let mut sim = Simulation::new(&lowered, SimConfig::default()).unwrap();
    for x in 0u64..16 {
        for y in 0u64..16 {
            let out = sim
                .step(&HashMap::from([
                    (la, Bits::from_u64(4, x).unwrap()),
                    (lb, Bits::from_u64(4, y).unwrap()),
                ]))
                .unwrap();
            let lowered_lt = lowered.signal_by_name("q_lt").unwrap();
            let lowered_gt = lowered.signal_by_name("q_gt").unwrap();
            let lowered_eq = lowered.signal_by_name("q_eq").unwrap();
            assert_eq!(out[&lowered_lt].to_u64(), Some((x < y) as u64), "{} < {}", x, y);
            assert_eq!(out[&lowered_gt].to_u64(), Some((x > y) as u64), "{} > {}", x, y);
            assert_eq!(out[&lowered_eq].to_u64(), Some((x == y) as u64), "{} == {}", x, y);
        }
    }
}

#[test]
fn test_validate_clean_after_synthesis() {
    let block = common::build_alu_block();
    let lowered = synthesize(&block).unwrap();
    lowered.validate().unwrap();
    // Synthesis of a synthesized block is the identity transformation up to
    // renaming: everything is already primitive.
    let again = synthesize(&lowered).unwrap();
    assert!(is_lowered(&again));
}
