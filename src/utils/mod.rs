pub mod clock;

pub use clock::{system_clock, Clock, SharedClock, SystemClock, TokioClock};
