//! # oplite core
//!
//! Pure Rust sync-committee verification for the oplite light client.
//!
//! This crate contains **no networking code** and **no async runtime**. Every
//! committee, update and block body a prover or beacon node hands the client
//! passes through these functions before it is trusted.
//!
//! ## Trust Model
//!
//! - **Committee transitions** (`consensus::transition`): an update for period
//!   `P` is accepted only if the committee of `P` signed its attested header
//!   with a two-thirds supermajority and the next committee is proven against
//!   that header's state root.
//!
//! - **Execution info** (`types::body`): the execution payload is unsigned, so
//!   it is trusted only when the block body's `tree_hash_root` equals the
//!   signed header's `body_root`.
//!
//! ## Usage
//!
//! ```ignore
//! use oplite_core::{verify_committee_transition, ChainConfig};
//!
//! let next = verify_committee_transition(&ChainConfig::mainnet(), &committee, period, &update)?;
//! ```

pub mod codec;
pub mod config;
pub mod consensus;
pub mod merkle;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use config::{ChainConfig, ConfigError, Fork};
pub use consensus::{
    period::{current_period, period_at_slot, slot_at_time},
    sync_committee::{committee_hash, verify_signed_header, VerificationError},
    transition::{verify_committee_transition, verify_optimistic_update},
};
pub use codec::SszError;
pub use ethereum_types::H256;
pub use merkle::Root;
pub use tree_hash::TreeHash;
pub use types::{beacon::*, body::*};
