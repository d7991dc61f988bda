//! Model operations: reads, mutations, validation and their `must_*` variants.

mod crud;
mod must;
mod transform;
mod validation;
pub use crud::ModelHandle;
pub use validation::RequestValidator;
