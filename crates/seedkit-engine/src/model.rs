use serde::{Deserialize, Serialize};

use seedkit_core::RecordCache;

/// Options for a seeding run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedOptions {
    /// Drop each target collection, when it exists, before inserting into it.
    #[serde(default)]
    pub drop_collections: bool,
    /// Fail the run when an expression cannot be evaluated instead of keeping
    /// the declared text.
    #[serde(default)]
    pub strict_expressions: bool,
}

/// Summary of one seeded collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionReport {
    pub collection: String,
    pub model: String,
    pub dropped: bool,
    pub records_inserted: u64,
    pub generated_ids: u64,
}

/// Expression that failed to evaluate and was kept as literal text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionFallback {
    pub collection: String,
    pub record: String,
    pub expression: String,
    pub error: String,
}

/// Report for a seeding run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedReport {
    pub run_id: String,
    pub collections: Vec<CollectionReport>,
    pub records_total: u64,
    pub dependencies_loaded: Vec<String>,
    pub expression_fallbacks: Vec<ExpressionFallback>,
    pub duration_ms: u64,
}

impl SeedReport {
    pub fn new(run_id: String) -> Self {
        Self {
            run_id,
            collections: Vec::new(),
            records_total: 0,
            dependencies_loaded: Vec::new(),
            expression_fallbacks: Vec::new(),
            duration_ms: 0,
        }
    }

    pub fn start_collection(&mut self, collection: &str, model: &str, dropped: bool) {
        self.collections.push(CollectionReport {
            collection: collection.to_string(),
            model: model.to_string(),
            dropped,
            records_inserted: 0,
            generated_ids: 0,
        });
    }

    /// Count an insert against the collection currently being seeded.
    pub fn record_insert(&mut self, generated_id: bool) {
        self.records_total += 1;
        if let Some(current) = self.collections.last_mut() {
            current.records_inserted += 1;
            if generated_id {
                current.generated_ids += 1;
            }
        }
    }

    pub fn record_fallback(&mut self, fallback: ExpressionFallback) {
        self.expression_fallbacks.push(fallback);
    }
}

/// Everything a successful run produces.
#[derive(Debug, Clone)]
pub struct SeedOutcome {
    pub run_id: String,
    pub cache: RecordCache,
    pub report: SeedReport,
}
