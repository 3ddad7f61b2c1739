pub mod bookkeeper;

pub use bookkeeper::{Bookkeeper, DeletePolicy};
