//! # oplite client
//!
//! A sync-committee light client that follows the chain head through
//! untrusted provers.
//!
//! Provers serve committees and committee transitions; a beacon node serves
//! the head. None of them is trusted: every committee is reached from the
//! genesis committee through updates verified by `oplite-core`, and every
//! execution block is checked against a header the trusted committee signed.
//!
//! Two sync strategies are provided:
//!
//! - [`SequentialSync`] asks provers one after another, keeping verified
//!   progress when it has to move on to the next.
//! - [`TournamentSync`] asks all of them and settles disagreements by making
//!   the sides prove their claim, so a single honest prover is enough.
//!
//! ## Usage
//!
//! ```ignore
//! use oplite_client::{Client, ClientConfig, HttpBeaconFeed, HttpProver};
//!
//! let client = Client::tournament(config, provers, feed)?;
//! let head = client.get_next_valid_execution_info().await?;
//! client.subscribe(|info| println!("block {}", info.block_number)).await;
//! ```

pub mod beacon_api;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod feed;
pub mod network;
pub mod prover;
pub mod store;

#[cfg(test)]
mod test_utils;

pub use client::{
    Client, ProverInfo, SequentialSync, Subscription, SyncContext, SyncStrategy, TournamentSync,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ClientConfig, GenesisData, RetryConfig};
pub use error::{ClientError, ProverError, StoreError};
pub use feed::{BeaconFeed, HttpBeaconFeed};
pub use network::{NetworkError, DEFAULT_REQUEST_TIMEOUT};
pub use prover::{BeaconApiProver, HttpProver, PeriodRequest, Prover, StoreProver};
pub use store::{MemoryStore, Store};
