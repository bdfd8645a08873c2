// SPDX-License-Identifier: Apache-2.0

//! The interpreted cycle-accurate simulator.
//!
//! Per cycle: apply inputs, settle combinational values in a topological
//! order derived once at construction, capture every register next-value and
//! memory write from the settled snapshot, then commit all of them as one
//! clock edge. No register update may observe another register's new value
//! within the same cycle; that ordering is the engine's core contract.

use std::collections::HashMap;

use crate::bits::Bits;
use crate::block::Block;
use crate::errors::SimError;
use crate::ir::{MemId, NetId, NetOp, RoleTag, SignalId, SignalRole};
use crate::topo;
use crate::trace::SimulationTrace;

/// Initial-state and tracing configuration. Registers and memory words not
/// named here start at `default_value` (masked to their width).
#[derive(Debug, Clone, Default)]
pub struct SimConfig {
    pub default_value: u64,
    pub register_init: HashMap<SignalId, Bits>,
    pub memory_init: HashMap<MemId, Vec<(u64, Bits)>>,
    /// Signals to record each cycle; defaults to outputs and registers.
    pub traced: Option<Vec<SignalId>>,
}

pub struct Simulation<'a> {
    block: &'a Block,
    schedule: Vec<NetId>,
    /// Settled value per signal slot. Registers and sync-read data hold
    /// their persistent state here between cycles.
    values: Vec<Bits>,
    /// Sparse contents per memory, keyed by address value.
    mems: Vec<HashMap<Bits, Bits>>,
    default_value: u64,
    /// (register signal, next-value signal) per register-update net.
    reg_updates: Vec<(SignalId, SignalId)>,
    /// (data signal, address signal, memory index) per synchronous read port.
    sync_reads: Vec<(SignalId, SignalId, usize)>,
    /// (memory index, addr, data, enable) per write port.
    write_ports: Vec<(usize, SignalId, SignalId, SignalId)>,
    inputs: Vec<SignalId>,
    trace: SimulationTrace,
    traced: Vec<SignalId>,
}

pub(crate) fn default_traced(block: &Block) -> Vec<SignalId> {
    let mut traced = block.signals_of_role(RoleTag::Output);
    traced.extend(block.signals_of_role(RoleTag::Register));
    traced.sort();
    traced
}

/// Initial per-signal values: constants hold their value, registers their
/// configured reset, everything else the default. Shared by both evaluator
/// back ends so they start from identical state.
pub(crate) fn init_signal_values(block: &Block, config: &SimConfig) -> Vec<Bits> {
    // Retired slots keep a placeholder; they are never read.
    let mut values: Vec<Bits> = vec![Bits::zero(1); block.signal_slot_count()];
    for (id, signal) in block.signals() {
        values[id.index] = match &signal.role {
            SignalRole::Const(value) => value.clone(),
            SignalRole::Register => match config.register_init.get(&id) {
                Some(v) => v.with_width(signal.width),
                None => Bits::from_u64_trunc(signal.width, config.default_value),
            },
            _ => Bits::from_u64_trunc(signal.width, config.default_value),
        };
    }
    values
}

/// Initial sparse memory contents per memory, from the config's init maps.
pub(crate) fn init_memories(
    block: &Block,
    config: &SimConfig,
) -> Result<Vec<HashMap<Bits, Bits>>, SimError> {
    let mut mems: Vec<HashMap<Bits, Bits>> = Vec::new();
    for (mem_id, memory) in block.memories() {
        let mut contents = HashMap::new();
        if let Some(init) = config.memory_init.get(&mem_id) {
            for &(addr, ref word) in init {
                if memory.addr_width < 64 && (addr >> memory.addr_width) != 0 {
                    return Err(SimError::InitOutOfRange {
                        mem: memory.name.clone(),
                        addr,
                    });
                }
                contents.insert(
                    Bits::from_u64_trunc(memory.addr_width, addr),
                    word.with_width(memory.width),
                );
            }
        }
        mems.push(contents);
    }
    Ok(mems)
}

impl<'a> Simulation<'a> {
    pub fn new(block: &'a Block, config: SimConfig) -> Result<Self, SimError> {
        block.validate()?;
        let schedule = topo::comb_schedule(block)
            .expect("validated block has an acyclic combinational sub-graph");

        let values = init_signal_values(block, &config);
        let mems = init_memories(block, &config)?;

        let mut reg_updates = Vec::new();
        let mut sync_reads = Vec::new();
        let mut write_ports = Vec::new();
        for (_, net) in block.nets() {
            match net.op {
                NetOp::Reg => {
                    reg_updates.push((net.dest.unwrap(), net.args[0]));
                }
                NetOp::MemRead(mem) if block.memory_by_id(mem).sync_read => {
                    sync_reads.push((net.dest.unwrap(), net.args[0], mem.index));
                }
                NetOp::MemWrite(mem) => {
                    write_ports.push((mem.index, net.args[0], net.args[1], net.args[2]));
                }
                _ => {}
            }
        }

        let traced = config.traced.clone().unwrap_or_else(|| default_traced(block));
        let names = traced
            .iter()
            .map(|&id| block.signal(id).name.clone())
            .collect();
        Ok(Simulation {
            block,
            schedule,
            values,
            mems,
            default_value: config.default_value,
            reg_updates,
            sync_reads,
            write_ports,
            inputs: block.inputs(),
            trace: SimulationTrace::new(traced.clone(), names),
            traced,
        })
    }

    fn check_inputs(&self, provided: &HashMap<SignalId, Bits>) -> Result<(), SimError> {
        for (&id, value) in provided {
            let signal = self.block.signal(id);
            if signal.role.tag() != RoleTag::Input {
                return Err(SimError::UnknownInput {
                    signal: id,
                    name: signal.name.clone(),
                });
            }
            if !value.fits_width(signal.width) {
                return Err(SimError::ValueOutOfRange {
                    signal: id,
                    name: signal.name.clone(),
                    width: signal.width,
                    value: value.to_string(),
                });
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

    fn mem_lookup(&self, mem_index: usize, addr: &Bits, width: usize) -> Bits {
        match self.mems[mem_index].get(addr) {
            Some(word) => word.clone(),
            None => Bits::from_u64_trunc(width, self.default_value),
        }
    }

    /// Advances one clock cycle. On error nothing is mutated: the state stays
    /// at the last committed cycle.
    pub fn step(
        &mut self,
        provided: &HashMap<SignalId, Bits>,
    ) -> Result<HashMap<SignalId, Bits>, SimError> {
        self.check_inputs(provided)?;
        for (&id, value) in provided {
            self.values[id.index] = value.with_width(self.block.signal(id).width);
        }

        // Settle: combinational nets in dependency order. Registers and sync
        // read data read out whatever `values` currently holds for them.
        for &net_id in &self.schedule {
            let net = self.block.net(net_id);
            let dest = net.dest.expect("combinational net has a destination");
            let dest_width = self.block.signal(dest).width;
            let result = match net.op {
                NetOp::MemRead(mem) => {
                    let addr = &self.values[net.args[0].index];
                    self.mem_lookup(mem.index, addr, dest_width)
                }
                ref op => {
                    let args: Vec<&Bits> =
                        net.args.iter().map(|&a| &self.values[a.index]).collect();
                    op.eval(&args, dest_width)
                }
            };
            self.values[dest.index] = result;
        }

        // Capture the whole next state from the settled snapshot before
        // touching any of it.
        let reg_next: Vec<(SignalId, Bits)> = self
            .reg_updates
            .iter()
            .map(|&(dest, src)| {
                let width = self.block.signal(dest).width;
                (dest, self.values[src.index].with_width(width))
            })
            .collect();
        let read_next: Vec<(SignalId, Bits)> = self
            .sync_reads
            .iter()
            .map(|&(dest, addr, mem_index)| {
                let width = self.block.signal(dest).width;
                let addr = &self.values[addr.index];
                (dest, self.mem_lookup(mem_index, addr, width))
            })
            .collect();
        let writes: Vec<(usize, Bits, Bits, bool)> = self
            .write_ports
            .iter()
            .map(|&(mem_index, addr, data, enable)| {
                (
                    mem_index,
                    self.values[addr.index].clone(),
                    self.values[data.index].clone(),
                    !self.values[enable.index].is_zero(),
                )
            })
            .collect();

        // Commit: one synchronous clock edge.
        for (dest, value) in reg_next {
            self.values[dest.index] = value;
        }
        for (dest, value) in read_next {
            self.values[dest.index] = value;
        }
        for (mem_index, addr, data, enabled) in writes {
            if enabled {
                self.mems[mem_index].insert(addr, data);
            }
        }

        let Self { values, trace, .. } = self;
        trace.record(|id| values[id.index].clone());
        Ok(self
            .traced
            .iter()
            .map(|&id| (id, self.values[id.index].clone()))
            .collect())
    }

    /// Runs one step per input map and returns the accumulated trace.
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
