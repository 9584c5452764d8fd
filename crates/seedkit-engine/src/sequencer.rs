use std::future::Future;
use std::pin::Pin;

use crate::errors::SeedError;

/// Boxed future produced by a deferred step; it may borrow the context.
pub type StepFuture<'c, T> = Pin<Box<dyn Future<Output = Result<T, SeedError>> + Send + 'c>>;

type DeferredFn<'a, C, T> = Box<dyn for<'c> FnOnce(&'c mut C) -> StepFuture<'c, T> + Send + 'a>;

/// One unit of sequential work.
pub enum Step<'a, C, T> {
    /// Started only once every earlier step has completed.
    Deferred(DeferredFn<'a, C, T>),
    /// Already available; contributes its value without doing any work.
    Ready(T),
}

impl<'a, C, T> Step<'a, C, T> {
    pub fn deferred<F>(run: F) -> Self
    where
        F: for<'c> FnOnce(&'c mut C) -> StepFuture<'c, T> + Send + 'a,
    {
        Step::Deferred(Box::new(run))
    }

    pub fn ready(value: T) -> Self {
        Step::Ready(value)
    }
}

/// Run `steps` strictly one after another against `ctx` and return the value
/// of the last one. The first failure is returned and later steps never start.
pub async fn run_sequentially<C, T>(ctx: &mut C, steps: Vec<Step<'_, C, T>>) -> Result<T, SeedError>
where
    C: Send,
    T: Send,
{
    let mut last = None;
    for step in steps {
        let value = match step {
            Step::Deferred(run) => run(&mut *ctx).await?,
            Step::Ready(value) => value,
        };
        last = Some(value);
    }
    last.ok_or_else(|| SeedError::Usage("run_sequentially needs at least one step".to_string()))
}
