//! Seeding engine: resolves references and expressions in a seed document
//! and inserts its records, one at a time, in document order.

pub mod errors;
pub mod memory;
pub mod model;
pub mod resolver;
pub mod seeder;
pub mod sequencer;

pub use errors::SeedError;
pub use memory::InMemoryStore;
pub use model::{CollectionReport, ExpressionFallback, SeedOptions, SeedOutcome, SeedReport};
pub use resolver::{ExpressionFailure, ValueResolver};
pub use seeder::Seeder;
pub use sequencer::{Step, StepFuture, run_sequentially};

pub use seedkit_core::{ModelRegistry, ModelSpec, RecordCache, Store};
pub use seedkit_expr::{Capabilities, DependencyLoader};
