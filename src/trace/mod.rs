pub use clock::{Clock, Monotonic};
pub use tick::Tick;
pub use tracer::{Config, State, Tracer};

mod clock;
mod tick;
mod tracer;
