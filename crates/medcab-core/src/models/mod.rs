//! Domain models for the medcab system.

mod allocation;
mod drug;
mod transaction;
mod unit;

pub use allocation::*;
pub use drug::*;
pub use transaction::*;
pub use unit::*;
