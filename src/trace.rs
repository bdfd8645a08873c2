// SPDX-License-Identifier: Apache-2.0

//! Storage for per-cycle observed values.

use crate::bits::Bits;
use crate::ir::SignalId;

/// A waveform record: one value history per traced signal, appended to at
/// every committed cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationTrace {
    signals: Vec<SignalId>,
    names: Vec<String>,
    history: Vec<Vec<Bits>>,
}

impl SimulationTrace {
    pub(crate) fn new(signals: Vec<SignalId>, names: Vec<String>) -> Self {
        let history = vec![Vec::new(); signals.len()];
        SimulationTrace {
            signals,
            names,
            history,
        }
    }

    pub(crate) fn record(&mut self, mut lookup: impl FnMut(SignalId) -> Bits) {
        for (i, &signal) in self.signals.iter().enumerate() {
            self.history[i].push(lookup(signal));
        }
    }

    /// Number of committed cycles recorded.
    pub fn len(&self) -> usize {
        self.history.first().map_or(0, |h| h.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn signals(&self) -> &[SignalId] {
        &self.signals
    }

    /// Full history of one traced signal.
    pub fn values(&self, signal: SignalId) -> Option<&[Bits]> {
        let i = self.signals.iter().position(|&s| s == signal)?;
        Some(&self.history[i])
    }

    /// Full history looked up by signal name; the stable handle across passes
    /// that renumber signals.
    pub fn values_by_name(&self, name: &str) -> Option<&[Bits]> {
        let i = self.names.iter().position(|n| n == name)?;
        Some(&self.history[i])
    }

    /// All traced (name, value) pairs at one cycle.
    pub fn cycle(&self, cycle: usize) -> Vec<(&str, &Bits)> {
        self.names
            .iter()
            .zip(self.history.iter())
            .map(|(name, h)| (name.as_str(), &h[cycle]))
            .collect()
    }
}
