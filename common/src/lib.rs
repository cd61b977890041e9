//! Tradesim Common Types
//!
//! Value types shared by the FX crate and the simulator: currency codes,
//! monetary amounts, and the clock used to age cached data.

pub mod monetary;
pub mod time;

pub use monetary::*;
pub use time::*;
