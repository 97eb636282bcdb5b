//! Stream combinators for subscriber rate control

mod throttle;

pub use throttle::{Throttle, ThrottleExt};
