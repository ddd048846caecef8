use crate::config::{ChainConfig, ConfigError};
use crate::types::beacon::{Slot, SyncPeriod};

/// Sync committee period containing `slot`.
pub fn period_at_slot(config: &ChainConfig, slot: Slot) -> Result<SyncPeriod, ConfigError> {
    let slots_per_period = config.slots_per_period();
    if slots_per_period == 0 {
        return Err(ConfigError::ZeroLength("slots_per_period"));
    }
    Ok(slot / slots_per_period)
}

/// Slot at UNIX time `now`. Times before genesis map to slot 0.
pub fn slot_at_time(config: &ChainConfig, genesis_time: u64, now: u64) -> Result<Slot, ConfigError> {
    if config.seconds_per_slot == 0 {
        return Err(ConfigError::ZeroLength("seconds_per_slot"));
    }
    Ok(now.saturating_sub(genesis_time) / config.seconds_per_slot)
}

/// The period the chain is in at UNIX time `now`.
pub fn current_period(
    config: &ChainConfig,
    genesis_time: u64,
    now: u64,
) -> Result<SyncPeriod, ConfigError> {
    period_at_slot(config, slot_at_time(config, genesis_time, now)?)
}
