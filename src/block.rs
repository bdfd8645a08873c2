// SPDX-License-Identifier: Apache-2.0

//! The graph container. A [`Block`] owns every signal, net, and memory of one
//! design, enforces the construction-time contracts at insertion, and can
//! re-check the full set of structural invariants via [`Block::validate`].
//!
//! All construction goes through an explicit `&mut Block`; there is no
//! process-wide working container.

use std::collections::HashMap;

use crate::bits::Bits;
use crate::errors::{BuildError, StructuralError};
use crate::ir::{MemId, Memory, Net, NetId, NetOp, RoleTag, Signal, SignalId, SignalRole};
use crate::topo;

pub struct Block {
    name: String,
    signals: Vec<Signal>,
    /// Parallel to `signals`; a retired slot's id is never reissued.
    retired: Vec<bool>,
    nets: Vec<Net>,
    memories: Vec<Memory>,
    /// Parallel to `signals`: index of the producing net, if any.
    producer: Vec<Option<usize>>,
    names: HashMap<String, SignalId>,
    tmp_counter: usize,
}

impl Block {
    pub fn new(name: &str) -> Self {
        Block {
            name: name.to_string(),
            signals: Vec::new(),
            retired: Vec::new(),
            nets: Vec::new(),
            memories: Vec::new(),
            producer: Vec::new(),
            names: HashMap::new(),
            tmp_counter: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // -- structural queries ------------------------------------------------

    pub fn signal(&self, id: SignalId) -> &Signal {
        assert!(
            id.index < self.signals.len() && !self.retired[id.index],
            "stale or foreign signal id {:?}",
            id
        );
        &self.signals[id.index]
    }

    pub fn signal_width(&self, id: SignalId) -> usize {
        self.signal(id).width
    }

    pub fn signals(&self) -> impl Iterator<Item = (SignalId, &Signal)> {
        self.signals
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.retired[*i])
            .map(|(i, s)| (SignalId { index: i }, s))
    }

    pub fn net(&self, id: NetId) -> &Net {
        &self.nets[id.index]
    }

    pub(crate) fn net_mut(&mut self, id: NetId) -> &mut Net {
        &mut self.nets[id.index]
    }

    pub fn nets(&self) -> impl Iterator<Item = (NetId, &Net)> {
        self.nets
            .iter()
            .enumerate()
            .map(|(i, n)| (NetId { index: i }, n))
    }

    pub fn net_count(&self) -> usize {
        self.nets.len()
    }

    /// Size of the signal arena including retired slots; ids index into a
    /// dense array of this length.
    pub fn signal_slot_count(&self) -> usize {
        self.signals.len()
    }

    pub fn memory_by_id(&self, id: MemId) -> &Memory {
        &self.memories[id.index]
    }

    pub fn memories(&self) -> impl Iterator<Item = (MemId, &Memory)> {
        self.memories
            .iter()
            .enumerate()
            .map(|(i, m)| (MemId { index: i }, m))
    }

    pub fn signal_by_name(&self, name: &str) -> Option<SignalId> {
        self.names.get(name).copied()
    }

    pub fn signals_of_role(&self, tag: RoleTag) -> Vec<SignalId> {
        self.signals()
            .filter(|(_, s)| s.role.tag() == tag)
            .map(|(id, _)| id)
            .collect()
    }

    pub fn inputs(&self) -> Vec<SignalId> {
        self.signals_of_role(RoleTag::Input)
    }

    pub fn outputs(&self) -> Vec<SignalId> {
        self.signals_of_role(RoleTag::Output)
    }

    pub fn registers(&self) -> Vec<SignalId> {
        self.signals_of_role(RoleTag::Register)
    }

    /// The net driving `signal`, if any.
    pub fn producer(&self, signal: SignalId) -> Option<NetId> {
        self.producer[signal.index].map(|index| NetId { index })
    }

    /// Every net that reads `signal`.
    pub fn consumers(&self, signal: SignalId) -> Vec<NetId> {
        self.nets()
            .filter(|(_, net)| net.args.contains(&signal))
            .map(|(id, _)| id)
            .collect()
    }

    // -- entity construction ----------------------------------------------

    fn fresh_name(&mut self, prefix: &str) -> String {
        loop {
            self.tmp_counter += 1;
            let candidate = format!("{}{}", prefix, self.tmp_counter);
            if !self.names.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    pub fn add_signal(
        &mut self,
        name: Option<&str>,
        width: usize,
        role: SignalRole,
    ) -> Result<SignalId, BuildError> {
        if width == 0 {
            return Err(BuildError::ZeroWidth);
        }
        if let SignalRole::Const(value) = &role {
            if value.width() != width {
                return Err(BuildError::ConstDoesNotFit { width });
            }
        }
        let name = match name {
            Some(n) => {
                if self.names.contains_key(n) {
                    return Err(BuildError::DuplicateName(n.to_string()));
                }
                n.to_string()
            }
            None => self.fresh_name("tmp"),
        };
        let id = SignalId {
            index: self.signals.len(),
        };
        self.names.insert(name.clone(), id);
        self.signals.push(Signal { name, width, role });
        self.retired.push(false);
        self.producer.push(None);
        Ok(id)
    }

    /// Removes a signal that no net produces or consumes.
    pub fn remove_signal(&mut self, id: SignalId) -> Result<(), BuildError> {
        self.check_signal(id)?;
        if self.producer[id.index].is_some() || !self.consumers(id).is_empty() {
            return Err(BuildError::SignalInUse(id));
        }
        let name = self.signals[id.index].name.clone();
        self.names.remove(&name);
        self.retired[id.index] = true;
        Ok(())
    }

    pub fn add_memory(
        &mut self,
        name: &str,
        width: usize,
        addr_width: usize,
        sync_read: bool,
    ) -> Result<MemId, BuildError> {
        if width == 0 || addr_width == 0 {
            return Err(BuildError::ZeroWidth);
        }
        let id = MemId {
            index: self.memories.len(),
        };
        self.memories.push(Memory {
            name: name.to_string(),
            width,
            addr_width,
            sync_read,
        });
        Ok(id)
    }

    fn check_signal(&self, id: SignalId) -> Result<(), BuildError> {
        if id.index >= self.signals.len() || self.retired[id.index] {
            return Err(BuildError::UnknownSignal(id));
        }
        Ok(())
    }

    fn malformed(op: &NetOp, reason: String) -> BuildError {
        BuildError::MalformedOperation {
            op: op.operator(),
            reason,
        }
    }

    /// Per-kind arity/width rule. `reason` strings name the offending widths
    /// so both `add_net` and `validate` can report them.
    fn check_net_shape(
        &self,
        op: &NetOp,
        arg_widths: &[usize],
        dest_width: Option<usize>,
    ) -> Result<(), String> {
        if let Some(arity) = op.arity() {
            if arg_widths.len() != arity {
                return Err(format!(
                    "expected {} arguments, got {}",
                    arity,
                    arg_widths.len()
                ));
            }
        } else if arg_widths.is_empty() {
            return Err("expected at least one argument".to_string());
        }
        let dest = match (op, dest_width) {
            (NetOp::MemWrite(_), None) => 0,
            (NetOp::MemWrite(_), Some(_)) => {
                return Err("memory write has no destination".to_string());
            }
            (_, Some(w)) => w,
            (_, None) => return Err("operation requires a destination".to_string()),
        };
        let equal_args = || -> Result<usize, String> {
            if arg_widths[0] != arg_widths[1] {
                return Err(format!(
                    "argument widths {} and {} must match",
                    arg_widths[0], arg_widths[1]
                ));
            }
            Ok(arg_widths[0])
        };
        let dest_at_most = |limit: usize| -> Result<(), String> {
            if dest > limit {
                return Err(format!(
                    "destination width {} exceeds {} (upper bits would be unassigned)",
                    dest, limit
                ));
            }
            Ok(())
        };
        match op {
            NetOp::And | NetOp::Or | NetOp::Xor | NetOp::Nand => {
                let w = equal_args()?;
                dest_at_most(w)
            }
            NetOp::Not | NetOp::Copy => dest_at_most(arg_widths[0]),
            NetOp::Eq | NetOp::Lt | NetOp::Gt => {
                equal_args()?;
                if dest != 1 {
                    return Err(format!("destination width {} must be 1", dest));
                }
                Ok(())
            }
            NetOp::Add | NetOp::Sub => {
                let w = equal_args()?;
                dest_at_most(w + 1)
            }
            NetOp::Mul => {
                let w = equal_args()?;
                dest_at_most(2 * w)
            }
            NetOp::Mux => {
                if arg_widths[0] != 1 {
                    return Err(format!(
                        "select argument width {} must be 1",
                        arg_widths[0]
                    ));
                }
                if arg_widths[1] != arg_widths[2] {
                    return Err(format!(
                        "case widths {} and {} must match",
                        arg_widths[1], arg_widths[2]
                    ));
                }
                dest_at_most(arg_widths[1])
            }
            NetOp::Concat => dest_at_most(arg_widths.iter().sum()),
            NetOp::Select(indices) => {
                if indices.is_empty() {
                    return Err("select requires at least one index".to_string());
                }
                for &index in indices {
                    if index >= arg_widths[0] {
                        return Err(format!(
                            "select index {} out of range for source width {}",
                            index, arg_widths[0]
                        ));
                    }
                }
                dest_at_most(indices.len())
            }
            NetOp::Reg => dest_at_most(arg_widths[0]),
            NetOp::MemRead(mem) => {
                let mem = self
                    .memories
                    .get(mem.index)
                    .ok_or_else(|| format!("unknown memory {:?}", mem))?;
                if arg_widths[0] != mem.addr_width {
                    return Err(format!(
                        "address width {} must equal memory address width {}",
                        arg_widths[0], mem.addr_width
                    ));
                }
                if dest != mem.width {
                    return Err(format!(
                        "read data width {} must equal memory word width {}",
                        dest, mem.width
                    ));
                }
                Ok(())
            }
            NetOp::MemWrite(mem) => {
                let mem = self
                    .memories
                    .get(mem.index)
                    .ok_or_else(|| format!("unknown memory {:?}", mem))?;
                if arg_widths[0] != mem.addr_width {
                    return Err(format!(
                        "address width {} must equal memory address width {}",
                        arg_widths[0], mem.addr_width
                    ));
                }
                if arg_widths[1] != mem.width {
                    return Err(format!(
                        "write data width {} must equal memory word width {}",
                        arg_widths[1], mem.width
                    ));
                }
                if arg_widths[2] != 1 {
                    return Err(format!(
                        "write enable width {} must be 1",
                        arg_widths[2]
                    ));
                }
                Ok(())
            }
        }
    }

    /// Role compatibility for one net.
    fn check_net_roles(
        &self,
        op: &NetOp,
        args: &[SignalId],
        dest: Option<SignalId>,
    ) -> Result<(), BuildError> {
        for &arg in args {
            if matches!(self.signal(arg).role, SignalRole::Output) {
                return Err(BuildError::RoleMismatch {
                    signal: arg,
                    role: "output",
                    expected: "a readable signal",
                });
            }
        }
        if let Some(dest) = dest {
            let role = &self.signal(dest).role;
            match role {
                SignalRole::Input | SignalRole::Const(_) => {
                    return Err(BuildError::RoleMismatch {
                        signal: dest,
                        role: role.name(),
                        expected: "a drivable signal",
                    });
                }
                SignalRole::Register => {
                    if !matches!(op, NetOp::Reg) {
                        return Err(BuildError::RoleMismatch {
                            signal: dest,
                            role: "register",
                            expected: "a register-update destination",
                        });
                    }
                }
                SignalRole::Wire | SignalRole::Output => {
                    if matches!(op, NetOp::Reg) {
                        return Err(BuildError::RoleMismatch {
                            signal: dest,
                            role: role.name(),
                            expected: "register",
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Registers an operation. The destination's producer link is added
    /// atomically with the net; all arity/width/role rules are enforced here
    /// and failure leaves the block unchanged.
    pub fn add_net(
        &mut self,
        op: NetOp,
        args: Vec<SignalId>,
        dest: Option<SignalId>,
    ) -> Result<NetId, BuildError> {
        for &arg in &args {
            self.check_signal(arg)?;
        }
        if let Some(dest) = dest {
            self.check_signal(dest)?;
            if args.contains(&dest) {
                return Err(BuildError::SelfLoop(dest));
            }
            if self.producer[dest.index].is_some() {
                return Err(BuildError::AlreadyDriven(dest));
            }
        }
        self.check_net_roles(&op, &args, dest)?;
        let arg_widths: Vec<usize> = args.iter().map(|&a| self.signal(a).width).collect();
        let dest_width = dest.map(|d| self.signal(d).width);
        self.check_net_shape(&op, &arg_widths, dest_width)
            .map_err(|reason| Self::malformed(&op, reason))?;

        let id = NetId {
            index: self.nets.len(),
        };
        if let Some(dest) = dest {
            self.producer[dest.index] = Some(id.index);
        }
        self.nets.push(Net { op, args, dest });
        Ok(id)
    }

    /// Drops every net the predicate rejects and rebuilds the producer index.
    /// Net ids are invalidated. Crate-internal: passes use this after they
    /// have rewired consumers.
    pub(crate) fn retain_nets(&mut self, mut keep: impl FnMut(NetId, &Net) -> bool) {
        let mut index = 0usize;
        let nets = std::mem::take(&mut self.nets);
        self.nets = nets
            .into_iter()
            .filter(|net| {
                let keep_it = keep(NetId { index }, net);
                index += 1;
                keep_it
            })
            .collect();
        self.rebuild_producers();
    }

    pub(crate) fn rebuild_producers(&mut self) {
        self.producer = vec![None; self.signals.len()];
        for (i, net) in self.nets.iter().enumerate() {
            if let Some(dest) = net.dest {
                debug_assert!(
                    self.producer[dest.index].is_none(),
                    "duplicate producer for {:?}",
                    dest
                );
                self.producer[dest.index] = Some(i);
            }
        }
    }

    // -- validation --------------------------------------------------------

    /// Re-checks every structural invariant from scratch. Side-effect free
    /// and safe to run after any pass.
    pub fn validate(&self) -> Result<(), StructuralError> {
        // Unique names over the live signals.
        let mut seen = HashMap::new();
        for (id, signal) in self.signals() {
            if seen.insert(signal.name.clone(), id).is_some() {
                return Err(StructuralError::DuplicateName(signal.name.clone()));
            }
        }

        // Single assignment, recomputed rather than trusting the index.
        let mut produced: Vec<usize> = vec![0; self.signals.len()];
        for (_, net) in self.nets() {
            if let Some(dest) = net.dest {
                produced[dest.index] += 1;
                if produced[dest.index] > 1 {
                    let signal = self.signal(dest);
                    return Err(StructuralError::MultipleProducers {
                        signal: dest,
                        name: signal.name.clone(),
                    });
                }
            }
        }

        // Per-net shape and role rules.
        for (id, net) in self.nets() {
            let arg_widths: Vec<usize> =
                net.args.iter().map(|&a| self.signal(a).width).collect();
            let dest_width = net.dest.map(|d| self.signal(d).width);
            if let Err(reason) = self.check_net_shape(&net.op, &arg_widths, dest_width) {
                return Err(StructuralError::BadNet { net: id, reason });
            }
            if let Err(err) = self.check_net_roles(&net.op, &net.args, net.dest) {
                return Err(StructuralError::BadNet {
                    net: id,
                    reason: err.to_string(),
                });
            }
        }

        // Connectivity: every non-source signal needs a driver; a wire that
        // touches nothing at all is a declaration error.
        let mut consumed: Vec<bool> = vec![false; self.signals.len()];
        for (_, net) in self.nets() {
            for &arg in &net.args {
                consumed[arg.index] = true;
            }
        }
        for (id, signal) in self.signals() {
            let driven = produced[id.index] > 0;
            match signal.role {
                SignalRole::Wire | SignalRole::Output | SignalRole::Register => {
                    if !driven {
                        if consumed[id.index] || !matches!(signal.role, SignalRole::Wire) {
                            return Err(StructuralError::Undriven {
                                signal: id,
                                name: signal.name.clone(),
                            });
                        }
                        return Err(StructuralError::Unconnected {
                            signal: id,
                            name: signal.name.clone(),
                        });
                    }
                }
                SignalRole::Input | SignalRole::Const(_) => {
                    if !consumed[id.index] {
                        log::warn!(
                            "{} '{}' is never read",
                            signal.role.name(),
                            signal.name
                        );
                    }
                }
            }
        }

        // Combinational acyclicity, with sequential elements as cycle breaks.
        if let Err(cycle) = topo::comb_schedule(self) {
            return Err(StructuralError::CombinationalCycle { nets: cycle });
        }
        Ok(())
    }

    /// True when a `MemRead` net's data is registered rather than
    /// combinational.
    pub fn is_sync_read(&self, net: &Net) -> bool {
        match net.op {
            NetOp::MemRead(mem) => self.memory_by_id(mem).sync_read,
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Builder API: each method creates the destination signal at the operation's
// natural width and registers the net atomically. The only implicit width
// coercion in the system lives in `coerce_operands`, applied to
// comparison/arithmetic operand matching.
// ---------------------------------------------------------------------------

impl Block {
    pub fn wire(&mut self, width: usize) -> Result<SignalId, BuildError> {
        self.add_signal(None, width, SignalRole::Wire)
    }

    pub fn input(&mut self, name: &str, width: usize) -> Result<SignalId, BuildError> {
        self.add_signal(Some(name), width, SignalRole::Input)
    }

    pub fn output(&mut self, name: &str, width: usize) -> Result<SignalId, BuildError> {
        self.add_signal(Some(name), width, SignalRole::Output)
    }

    pub fn register(&mut self, name: &str, width: usize) -> Result<SignalId, BuildError> {
        self.add_signal(Some(name), width, SignalRole::Register)
    }

    pub fn const_bits(&mut self, value: Bits) -> Result<SignalId, BuildError> {
        let width = value.width();
        let name = match value.to_u64() {
            Some(v) => {
                let n = self.fresh_name("const");
                format!("{}_{}", n, v)
            }
            None => self.fresh_name("const"),
        };
        self.add_signal(Some(&name), width, SignalRole::Const(value))
    }

    pub fn const_u64(&mut self, width: usize, value: u64) -> Result<SignalId, BuildError> {
        let bits = Bits::from_u64(width, value).ok_or(BuildError::ConstDoesNotFit { width })?;
        self.const_bits(bits)
    }

    pub fn memory(
        &mut self,
        name: &str,
        width: usize,
        addr_width: usize,
        sync_read: bool,
    ) -> Result<MemId, BuildError> {
        self.add_memory(name, width, addr_width, sync_read)
    }

    fn op_result(
        &mut self,
        op: NetOp,
        args: Vec<SignalId>,
        width: usize,
    ) -> Result<SignalId, BuildError> {
        let dest = self.wire(width)?;
        match self.add_net(op, args, Some(dest)) {
            Ok(_) => Ok(dest),
            Err(err) => {
                // Roll back the freshly created destination so a failed build
                // leaves no dangling wire behind.
                self.remove_signal(dest).ok();
                Err(err)
            }
        }
    }

    fn bitwise(&mut self, op: NetOp, a: SignalId, b: SignalId) -> Result<SignalId, BuildError> {
        self.check_signal(a)?;
        self.check_signal(b)?;
        let (wa, wb) = (self.signal(a).width, self.signal(b).width);
        if wa != wb {
            return Err(Self::malformed(
                &op,
                format!("argument widths {} and {} must match", wa, wb),
            ));
        }
        self.op_result(op, vec![a, b], wa)
    }

    pub fn and(&mut self, a: SignalId, b: SignalId) -> Result<SignalId, BuildError> {
        self.bitwise(NetOp::And, a, b)
    }

    pub fn or(&mut self, a: SignalId, b: SignalId) -> Result<SignalId, BuildError> {
        self.bitwise(NetOp::Or, a, b)
    }

    pub fn xor(&mut self, a: SignalId, b: SignalId) -> Result<SignalId, BuildError> {
        self.bitwise(NetOp::Xor, a, b)
    }

    pub fn nand(&mut self, a: SignalId, b: SignalId) -> Result<SignalId, BuildError> {
        self.bitwise(NetOp::Nand, a, b)
    }

    pub fn not_(&mut self, a: SignalId) -> Result<SignalId, BuildError> {
        self.check_signal(a)?;
        let width = self.signal(a).width;
        self.op_result(NetOp::Not, vec![a], width)
    }

    /// Zero-extends the narrower of two operands. This is the system's only
    /// implicit width coercion and applies to comparisons and arithmetic
    /// only.
    fn coerce_operands(
        &mut self,
        a: SignalId,
        b: SignalId,
    ) -> Result<(SignalId, SignalId, usize), BuildError> {
        self.check_signal(a)?;
        self.check_signal(b)?;
        let (wa, wb) = (self.signal(a).width, self.signal(b).width);
        let width = wa.max(wb);
        let a = self.zero_extend(a, width)?;
        let b = self.zero_extend(b, width)?;
        Ok((a, b, width))
    }

    pub fn eq(&mut self, a: SignalId, b: SignalId) -> Result<SignalId, BuildError> {
        let (a, b, _) = self.coerce_operands(a, b)?;
        self.op_result(NetOp::Eq, vec![a, b], 1)
    }

    pub fn lt(&mut self, a: SignalId, b: SignalId) -> Result<SignalId, BuildError> {
        let (a, b, _) = self.coerce_operands(a, b)?;
        self.op_result(NetOp::Lt, vec![a, b], 1)
    }

    pub fn gt(&mut self, a: SignalId, b: SignalId) -> Result<SignalId, BuildError> {
        let (a, b, _) = self.coerce_operands(a, b)?;
        self.op_result(NetOp::Gt, vec![a, b], 1)
    }

    pub fn add(&mut self, a: SignalId, b: SignalId) -> Result<SignalId, BuildError> {
        let (a, b, width) = self.coerce_operands(a, b)?;
        self.op_result(NetOp::Add, vec![a, b], width + 1)
    }

    pub fn sub(&mut self, a: SignalId, b: SignalId) -> Result<SignalId, BuildError> {
        let (a, b, width) = self.coerce_operands(a, b)?;
        self.op_result(NetOp::Sub, vec![a, b], width + 1)
    }

    pub fn mul(&mut self, a: SignalId, b: SignalId) -> Result<SignalId, BuildError> {
        let (a, b, width) = self.coerce_operands(a, b)?;
        self.op_result(NetOp::Mul, vec![a, b], 2 * width)
    }

    /// Two-way select: `sel == 0` picks `a`, otherwise `b`. Case widths must
    /// match exactly.
    pub fn mux(
        &mut self,
        sel: SignalId,
        a: SignalId,
        b: SignalId,
    ) -> Result<SignalId, BuildError> {
        self.check_signal(sel)?;
        self.check_signal(a)?;
        self.check_signal(b)?;
        let width = self.signal(a).width;
        self.op_result(NetOp::Mux, vec![sel, a, b], width)
    }

    /// Concatenation; the first argument lands in the most significant bits.
    pub fn concat(&mut self, args: &[SignalId]) -> Result<SignalId, BuildError> {
        let mut width = 0usize;
        for &arg in args {
            self.check_signal(arg)?;
            width += self.signal(arg).width;
        }
        if args.is_empty() {
            return Err(Self::malformed(
                &NetOp::Concat,
                "expected at least one argument".to_string(),
            ));
        }
        self.op_result(NetOp::Concat, args.to_vec(), width)
    }

    /// Arbitrary bit gather; destination bit `i` is `src` bit `indices[i]`.
    pub fn select(
        &mut self,
        src: SignalId,
        indices: Vec<usize>,
    ) -> Result<SignalId, BuildError> {
        self.check_signal(src)?;
        let width = indices.len();
        if width == 0 {
            return Err(Self::malformed(
                &NetOp::Select(indices),
                "select requires at least one index".to_string(),
            ));
        }
        self.op_result(NetOp::Select(indices), vec![src], width)
    }

    /// The sub-range `[start, limit)` of `src`, start inclusive, limit
    /// exclusive.
    pub fn select_range(
        &mut self,
        src: SignalId,
        start: usize,
        limit: usize,
    ) -> Result<SignalId, BuildError> {
        if start >= limit {
            return Err(Self::malformed(
                &NetOp::Select(vec![]),
                format!("empty range [{}, {})", start, limit),
            ));
        }
        self.select(src, (start..limit).collect())
    }

    /// Returns `src` unchanged when already at `width`; otherwise builds the
    /// structural zero extension `Concat(zeros, src)`.
    pub fn zero_extend(
        &mut self,
        src: SignalId,
        width: usize,
    ) -> Result<SignalId, BuildError> {
        self.check_signal(src)?;
        let current = self.signal(src).width;
        if current == width {
            return Ok(src);
        }
        if current > width {
            return Err(Self::malformed(
                &NetOp::Concat,
                format!("cannot zero-extend width {} down to {}", current, width),
            ));
        }
        let zeros = self.const_bits(Bits::zero(width - current))?;
        self.concat(&[zeros, src])
    }

    /// Truncates or zero-extends `src` to exactly `width`.
    pub fn fit_to_width(
        &mut self,
        src: SignalId,
        width: usize,
    ) -> Result<SignalId, BuildError> {
        self.check_signal(src)?;
        let current = self.signal(src).width;
        if current == width {
            Ok(src)
        } else if current > width {
            self.select_range(src, 0, width)
        } else {
            self.zero_extend(src, width)
        }
    }

    /// Truncating assignment of `src` into an existing wire or output; the
    /// destination takes the low bits when narrower.
    pub fn assign(&mut self, dest: SignalId, src: SignalId) -> Result<NetId, BuildError> {
        self.add_net(NetOp::Copy, vec![src], Some(dest))
    }

    /// Sets the register's next-value expression. The value is fitted to the
    /// register width: wider values truncate, narrower ones zero-extend.
    pub fn set_reg_next(
        &mut self,
        reg: SignalId,
        value: SignalId,
    ) -> Result<NetId, BuildError> {
        self.check_signal(reg)?;
        if !matches!(self.signal(reg).role, SignalRole::Register) {
            return Err(BuildError::RoleMismatch {
                signal: reg,
                role: self.signal(reg).role.name(),
                expected: "register",
            });
        }
        let width = self.signal(reg).width;
        let value = self.fit_to_width(value, width)?;
        self.add_net(NetOp::Reg, vec![value], Some(reg))
    }

    /// Builds a read port and returns the word-wide data signal. A narrower
    /// address zero-extends; a wider one is an error.
    pub fn mem_read(&mut self, mem: MemId, addr: SignalId) -> Result<SignalId, BuildError> {
        let memory = self
            .memories
            .get(mem.index)
            .ok_or(BuildError::UnknownMemory(mem))?;
        let (addr_width, word_width) = (memory.addr_width, memory.width);
        self.check_signal(addr)?;
        if self.signal(addr).width > addr_width {
            return Err(Self::malformed(
                &NetOp::MemRead(mem),
                format!(
                    "address width {} exceeds memory address width {}",
                    self.signal(addr).width,
                    addr_width
                ),
            ));
        }
        let addr = self.zero_extend(addr, addr_width)?;
        self.op_result(NetOp::MemRead(mem), vec![addr], word_width)
    }

    /// Builds a write port. `enable` defaults to constant 1.
    pub fn mem_write(
        &mut self,
        mem: MemId,
        addr: SignalId,
        data: SignalId,
        enable: Option<SignalId>,
    ) -> Result<NetId, BuildError> {
        let memory = self
            .memories
            .get(mem.index)
            .ok_or(BuildError::UnknownMemory(mem))?;
        let (addr_width, word_width) = (memory.addr_width, memory.width);
        self.check_signal(addr)?;
        self.check_signal(data)?;
        if self.signal(addr).width > addr_width {
            return Err(Self::malformed(
                &NetOp::MemWrite(mem),
                format!(
                    "address width {} exceeds memory address width {}",
                    self.signal(addr).width,
                    addr_width
                ),
            ));
        }
        if self.signal(data).width > word_width {
            return Err(Self::malformed(
                &NetOp::MemWrite(mem),
                format!(
                    "write data width {} exceeds memory word width {}",
                    self.signal(data).width,
                    word_width
                ),
            ));
        }
        let addr = self.zero_extend(addr, addr_width)?;
        let data = self.zero_extend(data, word_width)?;
        let enable = match enable {
            Some(e) => e,
            None => self.const_u64(1, 1)?,
        };
        self.add_net(NetOp::MemWrite(mem), vec![addr, data, enable], None)
    }
}
