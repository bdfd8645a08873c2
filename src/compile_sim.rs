// SPDX-License-Identifier: Apache-2.0

//! The compiled evaluator.
//!
//! Construction is a one-time, synchronous compilation step: the block's
//! combinational schedule, per-operation metadata, and commit lists are
//! flattened into a slot-indexed program specialized to the container's
//! exact shape. Per-cycle stepping then executes the program directly with
//! no graph traversal, no name or id hashing, and no width lookups.
//!
//! The public stepping surface matches [`crate::sim::Simulation`] and the
//! two back ends produce bit-identical traces for the same input sequence.

use std::collections::HashMap;

use bitvec::vec::BitVec;

use crate::bits::Bits;
use crate::block::Block;
use crate::errors::SimError;
use crate::ir::{NetOp, SignalId};
use crate::sim::{default_traced, init_memories, init_signal_values, SimConfig};
use crate::topo;
use crate::trace::SimulationTrace;

/// One compiled operation: argument and destination value slots are
/// pre-resolved, as is the destination width.
enum Instr {
    Eval {
        op: NetOp,
        args: Vec<usize>,
        dest: usize,
        width: usize,
    },
    ReadMem {
        mem: usize,
        addr: usize,
        dest: usize,
        width: usize,
    },
}

pub struct CompiledSimulation<'a> {
    block: &'a Block,
    program: Vec<Instr>,
    /// One value slot per signal arena slot.
    slots: Vec<Bits>,
    mems: Vec<HashMap<Bits, Bits>>,
    default_value: u64,
    /// (register slot, next-value slot, width).
    reg_commits: Vec<(usize, usize, usize)>,
    /// (data slot, addr slot, memory index, width).
    sync_read_commits: Vec<(usize, usize, usize, usize)>,
    /// (memory index, addr slot, data slot, enable slot).
    write_commits: Vec<(usize, usize, usize, usize)>,
    /// Input signal -> (slot, width).
    input_slots: HashMap<SignalId, (usize, usize)>,
    inputs: Vec<SignalId>,
    traced: Vec<SignalId>,
    trace: SimulationTrace,
}

impl<'a> CompiledSimulation<'a> {
    pub fn new(block: &'a Block, config: SimConfig) -> Result<Self, SimError> {
        block.validate()?;
        let schedule = topo::comb_schedule(block)
            .expect("validated block has an acyclic combinational sub-graph");

        let slots = init_signal_values(block, &config);
        let mems = init_memories(block, &config)?;

        // Compile the schedule. `seeded` tracks which slots hold a value
        // before the program runs; every instruction argument must be seeded
        // or produced by an earlier instruction, otherwise the compile is
        // wrong.
        let mut seeded: BitVec = BitVec::repeat(false, block.signal_slot_count());
        for (id, signal) in block.signals() {
            if signal.role.is_source() {
                seeded.set(id.index, true);
            }
        }
        let mut reg_commits = Vec::new();
        let mut sync_read_commits = Vec::new();
        let mut write_commits = Vec::new();
        for (_, net) in block.nets() {
            match net.op {
                NetOp::Reg => {
                    let dest = net.dest.unwrap();
                    reg_commits.push((
                        dest.index,
                        net.args[0].index,
                        block.signal(dest).width,
                    ));
                }
                NetOp::MemRead(mem) if block.memory_by_id(mem).sync_read => {
                    let dest = net.dest.unwrap();
                    seeded.set(dest.index, true);
                    sync_read_commits.push((
                        dest.index,
                        net.args[0].index,
                        mem.index,
                        block.signal(dest).width,
                    ));
                }
                NetOp::MemWrite(mem) => {
                    write_commits.push((
                        mem.index,
                        net.args[0].index,
                        net.args[1].index,
                        net.args[2].index,
                    ));
                }
                _ => {}
            }
        }

        let mut program = Vec::with_capacity(schedule.len());
        for net_id in schedule {
            let net = block.net(net_id);
            let dest = net.dest.expect("combinational net has a destination");
            let width = block.signal(dest).width;
            for &arg in &net.args {
                debug_assert!(
                    seeded[arg.index],
                    "compile error: slot for {:?} read before written",
                    arg
                );
            }
            seeded.set(dest.index, true);
            let args: Vec<usize> = net.args.iter().map(|a| a.index).collect();
            program.push(match net.op {
                NetOp::MemRead(mem) => Instr::ReadMem {
                    mem: mem.index,
                    addr: args[0],
                    dest: dest.index,
                    width,
                },
                ref op => Instr::Eval {
                    op: op.clone(),
                    args,
                    dest: dest.index,
                    width,
                },
            });
        }
        log::debug!(
            "compiled '{}': {} instructions, {} register commits, {} write ports",
            block.name(),
            program.len(),
            reg_commits.len(),
            write_commits.len()
        );

        let inputs = block.inputs();
        let input_slots = inputs
            .iter()
            .map(|&id| (id, (id.index, block.signal(id).width)))
            .collect();
        let traced = config.traced.clone().unwrap_or_else(|| default_traced(block));
        let names = traced
            .iter()
            .map(|&id| block.signal(id).name.clone())
            .collect();
        Ok(CompiledSimulation {
            block,
            program,
            slots,
            mems,
            default_value: config.default_value,
            reg_commits,
            sync_read_commits,
            write_commits,
            input_slots,
            inputs,
            trace: SimulationTrace::new(traced.clone(), names),
            traced,
        })
    }

    fn check_inputs(&self, provided: &HashMap<SignalId, Bits>) -> Result<(), SimError> {
        for (&id, value) in provided {
            match self.input_slots.get(&id) {
                None => {
                    return Err(SimError::UnknownInput {
                        signal: id,
                        name: self.block.signal(id).name.clone(),
                    });
                }
                Some(&(_, width)) => {
                    if !value.fits_width(width) {
                        return Err(SimError::ValueOutOfRange {
                            signal: id,
                            name: self.block.signal(id).name.clone(),
                            width,
                            value: value.to_string(),
                        });
                    }
                }
            }
        }
        for &input in &self.inputs {
            if !provided.contains_key(&input) {
                return Err(SimError::MissingInput {
                    signal: input,
                    name: self.block.signal(input).name.clone(),
                });
            }
        }
        Ok(())
    }

    fn mem_lookup(&self, mem: usize, addr: &Bits, width: usize) -> Bits {
        match self.mems[mem].get(addr) {
            Some(word) => word.clone(),
            None => Bits::from_u64_trunc(width, self.default_value),
        }
    }

    /// Advances one clock cycle by executing the compiled program.
    pub fn step(
        &mut self,
        provided: &HashMap<SignalId, Bits>,
    ) -> Result<HashMap<SignalId, Bits>, SimError> {
        self.check_inputs(provided)?;
        for (&id, value) in provided {
            let (slot, width) = self.input_slots[&id];
            self.slots[slot] = value.with_width(width);
        }

        for instr in &self.program {
            match instr {
                Instr::Eval {
                    op,
                    args,
                    dest,
                    width,
                } => {
                    let result = {
                        let arg_values: Vec<&Bits> =
                            args.iter().map(|&slot| &self.slots[slot]).collect();
                        op.eval(&arg_values, *width)
                    };
                    self.slots[*dest] = result;
                }
                Instr::ReadMem {
                    mem,
                    addr,
                    dest,
                    width,
                } => {
                    let result = self.mem_lookup(*mem, &self.slots[*addr], *width);
                    self.slots[*dest] = result;
                }
            }
        }

        let reg_next: Vec<(usize, Bits)> = self
            .reg_commits
            .iter()
            .map(|&(dest, src, width)| (dest, self.slots[src].with_width(width)))
            .collect();
        let read_next: Vec<(usize, Bits)> = self
            .sync_read_commits
            .iter()
            .map(|&(dest, addr, mem, width)| {
                (dest, self.mem_lookup(mem, &self.slots[addr], width))
            })
            .collect();
        let writes: Vec<(usize, Bits, Bits, bool)> = self
            .write_commits
            .iter()
            .map(|&(mem, addr, data, enable)| {
                (
                    mem,
                    self.slots[addr].clone(),
                    self.slots[data].clone(),
                    !self.slots[enable].is_zero(),
                )
            })
            .collect();

        for (dest, value) in reg_next {
            self.slots[dest] = value;
        }
        for (dest, value) in read_next {
            self.slots[dest] = value;
        }
        for (mem, addr, data, enabled) in writes {
            if enabled {
                self.mems[mem].insert(addr, data);
            }
        }

        let Self { slots, trace, .. } = self;
        trace.record(|id| slots[id.index].clone());
        Ok(self
            .traced
            .iter()
            .map(|&id| (id, self.slots[id.index].clone()))
            .collect())
    }

    pub fn step_multiple(
        &mut self,
        steps: &[HashMap<SignalId, Bits>],
    ) -> Result<&SimulationTrace, SimError> {
        for inputs in steps {
            self.step(inputs)?;
        }
        Ok(&self.trace)
    }

    pub fn trace(&self) -> &SimulationTrace {
        &self.trace
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn b(width: usize, value: u64) -> Bits {
        Bits::from_u64(width, value).unwrap()
    }

    #[test]
    fn test_compiled_counter_matches_expected_sequence() {
        let mut block = Block::new("counter");
        let r = block.register("count", 8).unwrap();
        let one = block.const_u64(8, 1).unwrap();
        let next = block.add(r, one).unwrap();
        block.set_reg_next(r, next).unwrap();
        let q = block.output("q", 8).unwrap();
        block.assign(q, r).unwrap();

        let mut sim = CompiledSimulation::new(&block, SimConfig::default()).unwrap();
        for _ in 0..5 {
            sim.step(&HashMap::new()).unwrap();
        }
        let observed: Vec<u64> = sim
            .trace()
            .values_by_name("q")
            .unwrap()
            .iter()
            .map(|v| v.to_u64().unwrap())
            .collect();
        assert_eq!(observed, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_compiled_matches_interpreter_on_small_design() {
        let mut block = Block::new("mix");
        let a = block.input("a", 8).unwrap();
        let c = block.input("b", 8).unwrap();
        let sum = block.add(a, c).unwrap();
        let lt = block.lt(a, c).unwrap();
        let pick = block.mux(lt, a, c).unwrap();
        let q1 = block.output("q1", 9).unwrap();
        block.assign(q1, sum).unwrap();
        let q2 = block.output("q2", 8).unwrap();
        block.assign(q2, pick).unwrap();

        let steps: Vec<HashMap<SignalId, Bits>> = (0u64..8)
            .map(|i| HashMap::from([(a, b(8, i * 37 % 256)), (c, b(8, i * 101 % 256))]))
            .collect();
        let mut interp = crate::sim::Simulation::new(&block, SimConfig::default()).unwrap();
        let mut compiled = CompiledSimulation::new(&block, SimConfig::default()).unwrap();
        let t1 = interp.step_multiple(&steps).unwrap().clone();
        let t2 = compiled.step_multiple(&steps).unwrap().clone();
        assert_eq!(t1, t2);
    }
}
