use std::sync::Arc;
use std::time::Instant;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use seedkit_core::{CollectionBlock, ID_FIELD, RecordCache, SeedDocument, Store};
use seedkit_expr::{Capabilities, DependencyLoader, ExpressionEnvironment};

use crate::errors::SeedError;
use crate::model::{ExpressionFallback, SeedOptions, SeedOutcome, SeedReport};
use crate::resolver::ValueResolver;
use crate::sequencer::{Step, run_sequentially};

/// Inserts the records of a seed document through a [`Store`].
///
/// Collections are seeded in document order and records in declaration
/// order, one insert at a time, so a record can reference anything declared
/// before it. A failure stops the run; records already inserted stay in the
/// store.
pub struct Seeder {
    store: Arc<dyn Store>,
    loader: Arc<dyn DependencyLoader>,
    options: SeedOptions,
}

impl Seeder {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            loader: Arc::new(Capabilities::new()),
            options: SeedOptions::default(),
        }
    }

    pub fn with_loader(mut self, loader: Arc<dyn DependencyLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_capabilities(self, capabilities: Capabilities) -> Self {
        self.with_loader(Arc::new(capabilities))
    }

    pub fn with_options(mut self, options: SeedOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &SeedOptions {
        &self.options
    }

    /// Seed `document` and return the cache of inserted records.
    pub async fn load(&self, document: &Value) -> Result<RecordCache, SeedError> {
        self.run(document).await.map(|outcome| outcome.cache)
    }

    /// Seed `document` and return the cache together with a run report.
    pub async fn run(&self, document: &Value) -> Result<SeedOutcome, SeedError> {
        self.run_with_id(uuid::Uuid::new_v4().to_string(), document).await
    }

    /// Like [`Seeder::run`], tagging logs and the report with `run_id`.
    pub async fn run_with_id(
        &self,
        run_id: String,
        document: &Value,
    ) -> Result<SeedOutcome, SeedError> {
        let start = Instant::now();
        let mut run = RunContext::new(
            run_id.clone(),
            Arc::clone(&self.store),
            self.options.clone(),
        );

        info!(
            run_id = %run_id,
            engine = self.store.engine(),
            drop_collections = self.options.drop_collections,
            strict_expressions = self.options.strict_expressions,
            "seeding started"
        );

        match self.execute(&mut run, document).await {
            Ok(()) => {
                let outcome = run.finish(start);
                info!(
                    run_id = %run_id,
                    collections = outcome.report.collections.len(),
                    records = outcome.report.records_total,
                    fallbacks = outcome.report.expression_fallbacks.len(),
                    duration_ms = outcome.report.duration_ms,
                    "seeding completed"
                );
                Ok(outcome)
            }
            Err(err) => {
                warn!(
                    run_id = %run_id,
                    code = err.code(),
                    records = run.report.records_total,
                    error = %err,
                    "seeding failed"
                );
                Err(err)
            }
        }
    }

    async fn execute(&self, run: &mut RunContext, document: &Value) -> Result<(), SeedError> {
        let document = SeedDocument::from_value(document)?;

        for (name, locator) in &document.dependencies {
            let loaded = run
                .env
                .register_once(name, locator, self.loader.as_ref())
                .await
                .map_err(|source| SeedError::DependencyLoad {
                    name: name.clone(),
                    source,
                })?;
            if loaded {
                debug!(name = %name, locator = %locator, "dependency registered");
                run.report.dependencies_loaded.push(name.clone());
            }
        }

        if document.collections.is_empty() {
            return Ok(());
        }

        let steps = document
            .collections
            .into_iter()
            .map(|block| RunStep::deferred(move |run| Box::pin(seed_collection(run, block))))
            .collect();
        run_sequentially(run, steps).await
    }
}

type RunStep = Step<'static, RunContext, ()>;

/// State owned by a single seeding run.
struct RunContext {
    run_id: String,
    store: Arc<dyn Store>,
    options: SeedOptions,
    cache: RecordCache,
    env: ExpressionEnvironment,
    report: SeedReport,
}

impl RunContext {
    fn new(run_id: String, store: Arc<dyn Store>, options: SeedOptions) -> Self {
        Self {
            report: SeedReport::new(run_id.clone()),
            run_id,
            store,
            options,
            cache: RecordCache::new(),
            env: ExpressionEnvironment::new(),
        }
    }

    fn finish(self, start: Instant) -> SeedOutcome {
        let mut report = self.report;
        report.duration_ms = start.elapsed().as_millis() as u64;
        SeedOutcome {
            run_id: self.run_id,
            cache: self.cache,
            report,
        }
    }
}

/// Where a record goes and how its identifier is handled.
struct RecordTarget {
    collection: String,
    model: String,
    key: String,
    generated_id: bool,
}

async fn seed_collection(run: &mut RunContext, block: CollectionBlock) -> Result<(), SeedError> {
    let CollectionBlock {
        key: collection,
        model,
        records,
    } = block;

    run.cache.open_bucket(&collection);
    let model = model.ok_or_else(|| SeedError::MissingModel {
        collection: collection.clone(),
    })?;
    let generated_id = run.store.uses_generated_identifier(&model)?;

    let mut dropped = false;
    if run.options.drop_collections && run.store.model_exists(&model).await? {
        run.store.drop_collection(&model).await?;
        dropped = true;
        info!(collection = %collection, model = %model, "collection dropped");
    }
    run.report.start_collection(&collection, &model, dropped);

    info!(
        collection = %collection,
        model = %model,
        records = records.len(),
        "seeding collection"
    );
    if records.is_empty() {
        return Ok(());
    }

    let steps = records
        .into_iter()
        .map(|(key, declaration)| {
            let target = RecordTarget {
                collection: collection.clone(),
                model: model.clone(),
                key,
                generated_id,
            };
            RunStep::deferred(move |run| Box::pin(seed_record(run, target, declaration)))
        })
        .collect();
    run_sequentially(run, steps).await?;

    debug!(collection = %collection, model = %model, "collection seeded");
    Ok(())
}

async fn seed_record(
    run: &mut RunContext,
    target: RecordTarget,
    declaration: Map<String, Value>,
) -> Result<(), SeedError> {
    let (mut record, failures) = {
        let mut resolver =
            ValueResolver::new(&run.cache, &run.env).strict(run.options.strict_expressions);
        let record = resolver.resolve_record(&declaration)?;
        (record, resolver.into_failures())
    };

    for failure in failures {
        warn!(
            collection = %target.collection,
            record = %target.key,
            expression = %failure.expression,
            error = %failure.error,
            "expression failed, keeping declared text"
        );
        run.report.record_fallback(ExpressionFallback {
            collection: target.collection.clone(),
            record: target.key.clone(),
            expression: failure.expression,
            error: failure.error.to_string(),
        });
    }

    let generate = target.generated_id && !has_identifier(&record);
    if generate {
        record.insert(ID_FIELD.to_string(), run.store.generate_identifier());
    }

    let stored = run.store.insert(&target.model, record).await?;
    debug!(
        collection = %target.collection,
        record = %target.key,
        generated_id = generate,
        "record inserted"
    );
    run.cache.insert(&target.collection, &target.key, stored);
    run.report.record_insert(generate);
    Ok(())
}

fn has_identifier(record: &Map<String, Value>) -> bool {
    record.get(ID_FIELD).is_some_and(|id| !id.is_null())
}
