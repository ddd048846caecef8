pub mod period;
pub mod sync_committee;
pub mod transition;

pub use period::*;
pub use sync_committee::*;
pub use transition::*;
