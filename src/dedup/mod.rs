pub use dedup::{Config, Decision, Dedup, Strategy};
pub use fingerprint::Fingerprint;

mod dedup;
mod fingerprint;
