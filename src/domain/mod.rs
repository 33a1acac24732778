pub mod signal;
pub mod trade;

pub use signal::*;
pub use trade::*;
