mod reference;
mod unwind;

pub use reference::{new_reference, REFERENCE_PREFIX};
pub use unwind::{catch_panic, PanicError};
