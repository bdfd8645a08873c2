// SPDX-License-Identifier: Apache-2.0

//! Synthesis: lowering every operation to a minimal primitive subset.
//!
//! The result contains only single-bit `And`/`Or`/`Xor`/`Not`/`Copy` gates,
//! single-index `Select`s, 2-way `Concat`s, 1-bit `Reg` updates, and
//! word-wide memory ports. Arithmetic expands to ripple-carry full-adder
//! chains, comparisons to equality-prefix chains, multiplication to a
//! shift-add array. Inputs and outputs keep their declared names and widths
//! so the same stimulus and trace comparisons work before and after
//! synthesis; bits are peeled off inputs with selects and reassembled at
//! outputs and memory ports with right-folds of 2-way concats.

use std::collections::HashMap;

use crate::block::Block;
use crate::errors::{BuildError, PassError};
use crate::ir::{Net, NetOp, SignalId, SignalRole};

pub fn synthesize(block: &Block) -> Result<Block, PassError> {
    block.validate().map_err(|source| PassError::Invalid {
        pass: "synthesize",
        source,
    })?;
    let lowered = lower(block).map_err(|source| PassError::Build {
        pass: "synthesize",
        source,
    })?;
    lowered
        .validate()
        .map_err(|source| PassError::Invalid {
            pass: "synthesize",
            source,
        })?;
    log::debug!(
        "synthesize '{}': {} nets -> {} primitive nets",
        block.name(),
        block.net_count(),
        lowered.net_count()
    );
    Ok(lowered)
}

struct Lowering<'a> {
    source: &'a Block,
    out: Block,
    /// (original signal, bit index) -> single-bit signal in `out`.
    bits: HashMap<(SignalId, usize), SignalId>,
    false_bit: Option<SignalId>,
    true_bit: Option<SignalId>,
}

fn lower(block: &Block) -> Result<Block, BuildError> {
    let mut ctx = Lowering {
        source: block,
        out: Block::new(block.name()),
        bits: HashMap::new(),
        false_bit: None,
        true_bit: None,
    };
    for (_, memory) in block.memories() {
        ctx.out
            .add_memory(&memory.name, memory.width, memory.addr_width, memory.sync_read)?;
    }

    // Create the per-bit population of every original signal, plus the
    // word-wide boundary signals for inputs and outputs.
    let mut output_words: Vec<(SignalId, SignalId)> = Vec::new();
    for (id, signal) in block.signals() {
        match &signal.role {
            SignalRole::Input => {
                let word = ctx.out.input(&signal.name, signal.width)?;
                for i in 0..signal.width {
                    let bit = ctx.out.select(word, vec![i])?;
                    ctx.bits.insert((id, i), bit);
                }
            }
            SignalRole::Output => {
                let word = ctx.out.output(&signal.name, signal.width)?;
                for i in 0..signal.width {
                    let bit = ctx.out.wire(1)?;
                    ctx.bits.insert((id, i), bit);
                }
                output_words.push((id, word));
            }
            SignalRole::Const(value) => {
                for i in 0..signal.width {
                    let bit = if value.get_bit(i) {
                        ctx.true_bit()?
                    } else {
                        ctx.false_bit()?
                    };
                    ctx.bits.insert((id, i), bit);
                }
            }
            SignalRole::Register => {
                for i in 0..signal.width {
                    let name = format!("{}_b{}", signal.name, i);
                    let bit = match ctx.out.register(&name, 1) {
                        Ok(bit) => bit,
                        Err(BuildError::DuplicateName(_)) => {
                            ctx.out.add_signal(None, 1, SignalRole::Register)?
                        }
                        Err(err) => return Err(err),
                    };
                    ctx.bits.insert((id, i), bit);
                }
            }
            SignalRole::Wire => {
                for i in 0..signal.width {
                    let bit = ctx.out.wire(1)?;
                    ctx.bits.insert((id, i), bit);
                }
            }
        }
    }

    for (_, net) in block.nets() {
        ctx.lower_net(net)?;
    }

    // Reassemble each output word from its bits with a fold of 2-way
    // concats.
    for (id, word) in output_words {
        let bits: Vec<SignalId> = (0..block.signal(id).width)
            .map(|i| ctx.bits[&(id, i)])
            .collect();
        let assembled = ctx.concat_fold(&bits)?;
        ctx.out.assign(word, assembled)?;
    }
    Ok(ctx.out)
}

impl<'a> Lowering<'a> {
    fn false_bit(&mut self) -> Result<SignalId, BuildError> {
        if let Some(bit) = self.false_bit {
            return Ok(bit);
        }
        let bit = self.out.const_u64(1, 0)?;
        self.false_bit = Some(bit);
        Ok(bit)
    }

    fn true_bit(&mut self) -> Result<SignalId, BuildError> {
        if let Some(bit) = self.true_bit {
            return Ok(bit);
        }
        let bit = self.out.const_u64(1, 1)?;
        self.true_bit = Some(bit);
        Ok(bit)
    }

    fn bit(&self, signal: SignalId, index: usize) -> SignalId {
        self.bits[&(signal, index)]
    }

    fn arg_bits(&self, signal: SignalId) -> Vec<SignalId> {
        (0..self.source.signal(signal).width)
            .map(|i| self.bit(signal, i))
            .collect()
    }

    fn assign_dest(&mut self, dest: SignalId, index: usize, value: SignalId) -> Result<(), BuildError> {
        let bit = self.bit(dest, index);
        self.out.assign(bit, value)?;
        Ok(())
    }

    /// Right-fold of 2-way concatenations over lsb-first bits.
    fn concat_fold(&mut self, bits: &[SignalId]) -> Result<SignalId, BuildError> {
        let mut acc = bits[0];
        for &bit in &bits[1..] {
            acc = self.out.concat(&[bit, acc])?;
        }
        Ok(acc)
    }

    fn full_adder(
        &mut self,
        a: SignalId,
        b: SignalId,
        cin: SignalId,
    ) -> Result<(SignalId, SignalId), BuildError> {
        let partial = self.out.xor(a, b)?;
        let sum = self.out.xor(partial, cin)?;
        let c0 = self.out.and(a, b)?;
        let c1 = self.out.and(a, cin)?;
        let c2 = self.out.and(b, cin)?;
        let c01 = self.out.or(c0, c1)?;
        let cout = self.out.or(c01, c2)?;
        Ok((sum, cout))
    }

    /// Ripple-carry chain; returns `width` sum bits plus the carry out.
    fn ripple_add(
        &mut self,
        a: &[SignalId],
        b: &[SignalId],
        mut carry: SignalId,
    ) -> Result<(Vec<SignalId>, SignalId), BuildError> {
        let mut sums = Vec::with_capacity(a.len());
        for (&ai, &bi) in a.iter().zip(b.iter()) {
            let (sum, cout) = self.full_adder(ai, bi, carry)?;
            sums.push(sum);
            carry = cout;
        }
        Ok((sums, carry))
    }

    /// The unsigned comparison prefix chain: for each position `i` the term
    /// `lhs_i & ~rhs_i & all-higher-bits-equal`, OR-folded.
    fn compare_chain(
        &mut self,
        a: &[SignalId],
        b: &[SignalId],
        greater: bool,
    ) -> Result<SignalId, BuildError> {
        let width = a.len();
        // equal[j] for j >= 1; position 0 never needs it.
        let mut equal: Vec<Option<SignalId>> = vec![None; width];
        for j in 1..width {
            let x = self.out.xor(a[j], b[j])?;
            equal[j] = Some(self.out.not_(x)?);
        }
        let mut result: Option<SignalId> = None;
        for i in 0..width {
            let mut term = if greater {
                let nb = self.out.not_(b[i])?;
                self.out.and(a[i], nb)?
            } else {
                let na = self.out.not_(a[i])?;
                self.out.and(na, b[i])?
            };
            for j in i + 1..width {
                term = self.out.and(term, equal[j].unwrap())?;
            }
            result = Some(match result {
                Some(acc) => self.out.or(acc, term)?,
                None => term,
            });
        }
        Ok(result.expect("comparison operands have at least one bit"))
    }

    /// Shift-add multiplier array over `2 * width` accumulator bits.
    fn shift_add_mul(
        &mut self,
        a: &[SignalId],
        b: &[SignalId],
    ) -> Result<Vec<SignalId>, BuildError> {
        let width = a.len();
        let zero = self.false_bit()?;
        let mut acc: Vec<SignalId> = vec![zero; 2 * width];
        for (j, &bj) in b.iter().enumerate() {
            let partial: Vec<SignalId> = a
                .iter()
                .map(|&ai| self.out.and(ai, bj))
                .collect::<Result<_, _>>()?;
            let mut carry = self.false_bit()?;
            for (i, &pi) in partial.iter().enumerate() {
                let (sum, cout) = self.full_adder(acc[j + i], pi, carry)?;
                acc[j + i] = sum;
                carry = cout;
            }
            // Propagate the carry through the remaining accumulator bits.
            for k in j + width..2 * width {
                let sum = self.out.xor(acc[k], carry)?;
                let cout = self.out.and(acc[k], carry)?;
                acc[k] = sum;
                carry = cout;
            }
        }
        Ok(acc)
    }

    fn lower_net(&mut self, net: &Net) -> Result<(), BuildError> {
        let dest_width = |this: &Self| {
            net.dest
                .map(|d| this.source.signal(d).width)
                .unwrap_or(0)
        };
        match &net.op {
            NetOp::And | NetOp::Or | NetOp::Xor | NetOp::Nand => {
                let dest = net.dest.unwrap();
                for i in 0..dest_width(self) {
                    let a = self.bit(net.args[0], i);
                    let b = self.bit(net.args[1], i);
                    let bit = match net.op {
                        NetOp::And => self.out.and(a, b)?,
                        NetOp::Or => self.out.or(a, b)?,
                        NetOp::Xor => self.out.xor(a, b)?,
                        NetOp::Nand => {
                            let and = self.out.and(a, b)?;
                            self.out.not_(and)?
                        }
                        _ => unreachable!(),
                    };
                    self.assign_dest(dest, i, bit)?;
                }
            }
            NetOp::Not => {
                let dest = net.dest.unwrap();
                for i in 0..dest_width(self) {
                    let a = self.bit(net.args[0], i);
                    let bit = self.out.not_(a)?;
                    self.assign_dest(dest, i, bit)?;
                }
            }
            NetOp::Copy => {
                let dest = net.dest.unwrap();
                for i in 0..dest_width(self) {
                    let a = self.bit(net.args[0], i);
                    self.assign_dest(dest, i, a)?;
                }
            }
            NetOp::Eq => {
                let dest = net.dest.unwrap();
                let a = self.arg_bits(net.args[0]);
                let b = self.arg_bits(net.args[1]);
                let mut any_diff = self.out.xor(a[0], b[0])?;
                for i in 1..a.len() {
                    let diff = self.out.xor(a[i], b[i])?;
                    any_diff = self.out.or(any_diff, diff)?;
                }
                let equal = self.out.not_(any_diff)?;
                self.assign_dest(dest, 0, equal)?;
            }
            NetOp::Lt | NetOp::Gt => {
                let dest = net.dest.unwrap();
                let a = self.arg_bits(net.args[0]);
                let b = self.arg_bits(net.args[1]);
                let result = self.compare_chain(&a, &b, matches!(net.op, NetOp::Gt))?;
                self.assign_dest(dest, 0, result)?;
            }
            NetOp::Add | NetOp::Sub => {
                let dest = net.dest.unwrap();
                let a = self.arg_bits(net.args[0]);
                let b = self.arg_bits(net.args[1]);
                let subtract = matches!(net.op, NetOp::Sub);
                let (operand, carry_in) = if subtract {
                    let inverted: Vec<SignalId> = b
                        .iter()
                        .map(|&bit| self.out.not_(bit))
                        .collect::<Result<_, _>>()?;
                    (inverted, self.true_bit()?)
                } else {
                    (b, self.false_bit()?)
                };
                let (mut sums, cout) = self.ripple_add(&a, &operand, carry_in)?;
                if subtract {
                    // Bit w of (a - b) mod 2^(w+1) is the inverted carry of
                    // the a + !b + 1 chain: the complement of bit w of !b is
                    // folded in here.
                    let borrow = self.out.not_(cout)?;
                    sums.push(borrow);
                } else {
                    sums.push(cout);
                }
                for i in 0..dest_width(self) {
                    self.assign_dest(dest, i, sums[i])?;
                }
            }
            NetOp::Mul => {
                let dest = net.dest.unwrap();
                let a = self.arg_bits(net.args[0]);
                let b = self.arg_bits(net.args[1]);
                let acc = self.shift_add_mul(&a, &b)?;
                for i in 0..dest_width(self) {
                    self.assign_dest(dest, i, acc[i])?;
                }
            }
            NetOp::Mux => {
                let dest = net.dest.unwrap();
                let sel = self.bit(net.args[0], 0);
                let not_sel = self.out.not_(sel)?;
                for i in 0..dest_width(self) {
                    let a = self.bit(net.args[1], i);
                    let b = self.bit(net.args[2], i);
                    let keep_a = self.out.and(not_sel, a)?;
                    let keep_b = self.out.and(sel, b)?;
                    let bit = self.out.or(keep_a, keep_b)?;
                    self.assign_dest(dest, i, bit)?;
                }
            }
            NetOp::Concat => {
                let dest = net.dest.unwrap();
                // args are msb-first; build the flat bit list lsb-first.
                let mut flat = Vec::new();
                for &arg in net.args.iter().rev() {
                    flat.extend(self.arg_bits(arg));
                }
                for i in 0..dest_width(self) {
                    self.assign_dest(dest, i, flat[i])?;
                }
            }
            NetOp::Select(indices) => {
                let dest = net.dest.unwrap();
                for i in 0..dest_width(self) {
                    let bit = self.bit(net.args[0], indices[i]);
                    self.assign_dest(dest, i, bit)?;
                }
            }
            NetOp::Reg => {
                let dest = net.dest.unwrap();
                for i in 0..dest_width(self) {
                    let next = self.bit(net.args[0], i);
                    let reg_bit = self.bit(dest, i);
                    self.out.add_net(NetOp::Reg, vec![next], Some(reg_bit))?;
                }
            }
            NetOp::MemRead(mem) => {
                let dest = net.dest.unwrap();
                let addr_bits = self.arg_bits(net.args[0]);
                let addr = self.concat_fold(&addr_bits)?;
                let data = self.out.mem_read(*mem, addr)?;
                for i in 0..dest_width(self) {
                    let bit = self.out.select(data, vec![i])?;
                    self.assign_dest(dest, i, bit)?;
                }
            }
            NetOp::MemWrite(mem) => {
                let addr_bits = self.arg_bits(net.args[0]);
                let addr = self.concat_fold(&addr_bits)?;
                let data_bits = self.arg_bits(net.args[1]);
                let data = self.concat_fold(&data_bits)?;
                let enable = self.bit(net.args[2], 0);
                self.out.mem_write(*mem, addr, data, Some(enable))?;
            }
        }
        Ok(())
    }
}

/// True when every net in the block already belongs to the primitive subset
/// that `synthesize` targets.
pub fn is_lowered(block: &Block) -> bool {
    block.nets().all(|(_, net)| {
        let dest_width = net
            .dest
            .map(|d| block.signal(d).width)
            .unwrap_or(1);
        match &net.op {
            NetOp::And | NetOp::Or | NetOp::Xor | NetOp::Not | NetOp::Reg => dest_width == 1,
            NetOp::Copy => true,
            NetOp::Select(indices) => indices.len() == 1,
            NetOp::Concat => net.args.len() <= 2,
            NetOp::MemRead(_) | NetOp::MemWrite(_) => true,
            _ => false,
        }
    })
}
