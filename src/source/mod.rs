pub use source::{Source, DROP_REPORT};

mod source;
