pub use channel::Channel;
pub use router::{Outcome, Router};
pub use sink::{Batch, Sink};
pub use socket::Socket;
pub use stdout::Stdout;

mod channel;
mod router;
mod sink;
mod socket;
mod stdout;
