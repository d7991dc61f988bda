//! modelkit: schema-driven data access. Models are declared once as JSON metadata; the engine
//! turns query descriptors into store operations, eager-loads relations, paginates, validates
//! and migrates.

pub mod config;
pub mod error;
pub mod migration;
pub mod query;
pub mod service;
pub mod settings;
pub mod sql;
pub mod state;
pub mod store;
pub mod value;

pub use config::{load_dir, load_model, MetaData, Model};
pub use error::{Fault, ModelError, Result, StoreError, ValidationErrors};
pub use migration::{migrate, migrate_all, MigrationReport};
pub use query::{Direction, Operator, Paginated, QueryDescriptor, QueryStack, Where, With};
pub use service::ModelHandle;
pub use settings::Settings;
pub use state::{AppState, Registry};
pub use store::{MemoryStore, PgStore, Store};
pub use value::{Record, Value, INDEX_PLACEHOLDER};
