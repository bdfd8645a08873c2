// SPDX-License-Identifier: Apache-2.0

//! The interpreted and compiled evaluators must produce bit-identical traces
//! for the same container and input sequence.

mod common;

use bitrtl::compile_sim::CompiledSimulation;
use bitrtl::sim::{SimConfig, Simulation};
use bitrtl::synth::synthesize;

#[test]
fn test_backends_agree_on_alu_block() {
    let _ = env_logger::builder().is_test(true).try_init();
    let block = common::build_alu_block();
    let steps = common::random_steps(&block, common::ALU_INPUTS, 128, 0xfeed);

    let mut interp = Simulation::new(&block, SimConfig::default()).unwrap();
    let mut compiled = CompiledSimulation::new(&block, SimConfig::default()).unwrap();
    let interp_trace = interp.step_multiple(&steps).unwrap().clone();
    let compiled_trace = compiled.step_multiple(&steps).unwrap().clone();
    assert_eq!(interp_trace, compiled_trace);
}

#[test]
fn test_backends_agree_on_synthesized_block() {
    let _ = env_logger::builder().is_test(true).try_init();
    let block = common::build_alu_block();
    let lowered = synthesize(&block).unwrap();
    let steps = common::random_steps(&lowered, common::ALU_INPUTS, 64, 0xbead);

    let mut interp = Simulation::new(&lowered, SimConfig::default()).unwrap();
    let mut compiled = CompiledSimulation::new(&lowered, SimConfig::default()).unwrap();
    let interp_trace = interp.step_multiple(&steps).unwrap().clone();
    let compiled_trace = compiled.step_multiple(&steps).unwrap().clone();
    assert_eq!(interp_trace, compiled_trace);
}

#[test]
fn test_backends_agree_with_configured_initial_state() {
    let _ = env_logger::builder().is_test(true).try_init();
    let block = common::build_alu_block();
    let acc = block.signal_by_name("acc").unwrap();
    let scratch = block
        .memories()
        .find(|(_, m)| m.name == "scratch")
        .map(|(id, _)| id)
        .unwrap();
    let config = SimConfig {
        default_value: 0,
        register_init: std::collections::HashMap::from([(
            acc,
            bitrtl::bits::Bits::from_u64(8, 0x2a).unwrap(),
        )]),
        memory_init: std::collections::HashMap::from([(
            scratch,
            (0u64..16)
                .map(|i| (i, bitrtl::bits::Bits::from_u64(8, (i * 3) & 0xff).unwrap()))
                .collect(),
        )]),
        traced: None,
    };
    let steps = common::random_steps(&block, common::ALU_INPUTS, 32, 0xabcd);

    let mut interp = Simulation::new(&block, config.clone()).unwrap();
    let mut compiled = CompiledSimulation::new(&block, config).unwrap();
    let interp_trace = interp.step_multiple(&steps).unwrap().clone();
    let compiled_trace = compiled.step_multiple(&steps).unwrap().clone();
    assert_eq!(interp_trace, compiled_trace);
}

#[test]
fn test_backend_error_behavior_matches() {
    let block = common::build_alu_block();
    let mut interp = Simulation::new(&block, SimConfig::default()).unwrap();
    let mut compiled = CompiledSimulation::new(&block, SimConfig::default()).unwrap();
    let empty = std::collections::HashMap::new();
    let interp_err = interp.step(&empty).unwrap_err();
    let compiled_err = compiled.step(&empty).unwrap_err();
    assert!(matches!(interp_err, bitrtl::errors::SimError::MissingInput { .. }));
    assert!(matches!(compiled_err, bitrtl::errors::SimError::MissingInput { .. }));
    assert_eq!(interp.trace().len(), 0);
    assert_eq!(compiled.trace().len(), 0);
}
