pub mod beacon;
pub mod body;
pub mod serde_utils;
