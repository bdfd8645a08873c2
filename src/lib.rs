// SPDX-License-Identifier: Apache-2.0

//! bitrtl: a circuit intermediate representation over fixed-width bit
//! vectors, with synthesis to primitive gates, behavior-preserving
//! optimization passes, and cycle-accurate simulation (interpreted and
//! compiled back ends).
//!
//! Quick tour:
//! ```
//! use bitrtl::bits::Bits;
//! use bitrtl::block::Block;
//! use bitrtl::sim::{SimConfig, Simulation};
//! use std::collections::HashMap;
//!
//! let mut block = Block::new("adder");
//! let a = block.input("a", 8).unwrap();
//! let b = block.input("b", 8).unwrap();
//! let sum = block.add(a, b).unwrap();
//! let q = block.output("q", 8).unwrap();
//! block.assign(q, sum).unwrap();
//! block.validate().unwrap();
//!
//! let mut sim = Simulation::new(&block, SimConfig::default()).unwrap();
//! let out = sim
//!     .step(&HashMap::from([
//!         (a, Bits::from_u64(8, 3).unwrap()),
//!         (b, Bits::from_u64(8, 4).unwrap()),
//!     ]))
//!     .unwrap();
//! assert_eq!(out[&q].to_u64(), Some(7));
//! ```

pub mod bits;
pub mod block;
pub mod compile_sim;
pub mod errors;
pub mod ir;
pub mod passes;
pub mod sim;
pub mod synth;
pub mod topo;
pub mod trace;
