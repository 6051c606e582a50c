pub mod reduce;
pub mod rolling_policy;
pub mod window;

pub use rolling_policy::RollingPolicy;
pub use window::{Bucket, RollingWindow, Window};
