pub use augment::{Augment, Enrich};
pub use object::{Meta, Object, Owner};

mod augment;
mod object;

#[cfg(test)]
mod test;
