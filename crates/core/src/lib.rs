pub mod error;
pub mod stat;

pub use error::{MeterError, Result};
pub use stat::{CpuInfo, CpuStat};
