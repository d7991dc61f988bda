//! Query descriptors and the engine that resolves them into record trees.

pub mod compile;
mod descriptor;
mod page;
mod stack;

pub use descriptor::*;
pub use page::{Paginated, DEFAULT_PAGE_SIZE};
pub use stack::QueryStack;
