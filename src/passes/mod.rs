// SPDX-License-Identifier: Apache-2.0

//! Graph-to-graph rewrites that preserve cycle-by-cycle behavior.
//!
//! Each pass is total over valid containers, composable, and idempotent at
//! fixpoint. A pass validates its result and reports [`PassError`] instead
//! of ever returning a container it believes to be broken.

pub mod canon;
pub mod const_prop;
pub mod copy_forward;
pub mod cse;
pub mod dce;

pub use canon::canon;
pub use const_prop::const_prop;
pub use copy_forward::copy_forward;
pub use cse::cse;
pub use dce::dce;

use std::collections::HashMap;

use crate::block::Block;
use crate::errors::PassError;
use crate::ir::SignalId;

/// Follows a substitution chain to its root. Chains are acyclic because a
/// substitution always points at an older signal.
pub(crate) fn resolve(map: &HashMap<SignalId, SignalId>, mut id: SignalId) -> SignalId {
    while let Some(&next) = map.get(&id) {
        id = next;
    }
    id
}

/// Rewrites every net argument through the substitution map.
pub(crate) fn rewire_args(block: &mut Block, map: &HashMap<SignalId, SignalId>) {
    if map.is_empty() {
        return;
    }
    let net_count = block.net_count();
    for index in 0..net_count {
        let id = crate::ir::NetId { index };
        let args = block.net(id).args.clone();
        let new_args: Vec<SignalId> = args.iter().map(|&a| resolve(map, a)).collect();
        if new_args != args {
            block.net_mut(id).args = new_args;
        }
    }
}

/// Post-pass validation, wrapping any violation as a fatal pass error.
pub(crate) fn check(pass: &'static str, block: &Block) -> Result<(), PassError> {
    block
        .validate()
        .map_err(|source| PassError::Invalid { pass, source })
}

/// The default optimization driver: forward copies, fold constants,
/// canonicalize selects/concats, merge common subexpressions, and sweep dead
/// logic, repeated until the net count stops shrinking.
///
/// Produces a fresh compacted container in place of `block`; signal ids from
/// before the call are invalidated, names remain stable handles.
pub fn optimize(block: &mut Block) -> Result<(), PassError> {
    loop {
        let before = block.net_count();
        copy_forward(block)?;
        const_prop(block)?;
        canon(block)?;
        cse(block)?;
        *block = dce(block)?;
        if block.net_count() >= before {
            return Ok(());
        }
        log::debug!(
            "optimize '{}': {} -> {} nets, running another round",
            block.name(),
            before,
            block.net_count()
        );
    }
}
