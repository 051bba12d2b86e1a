//! Fan-out/fan-in over a batch of independent calls
//!
//! Every item of a batch is launched at once on the current task and the
//! results are joined in input order, each tagged with its input index. A task
//! that panics becomes a `Panicked` failure in its own slot; its siblings run
//! to completion.

use futures::FutureExt;
use futures::future::join_all;
use log::warn;
use std::any::Any;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Instant;

use crate::api::resilience::{ApiLogger, CallFailure, CallOutcome, FailureKind};

/// Launch `operation` for every item concurrently and collect the outcomes.
///
/// Each outcome is tagged with the index of its input. If building an item's
/// future fails (an `Err` or a panic while constructing it), the item is logged
/// and has no entry, so the output can be shorter than the input. Use
/// [`pair_with_inputs`] to line the results back up with the items.
pub async fn run_all<I, T, F, Fut>(
    logger: &ApiLogger,
    label: &str,
    items: Vec<I>,
    operation: F,
) -> Vec<(usize, CallOutcome<T>)>
where
    F: Fn(I) -> anyhow::Result<Fut>,
    Fut: Future<Output = CallOutcome<T>>,
{
    let started = Instant::now();
    let total = items.len();

    let mut launched = Vec::with_capacity(total);
    for (index, item) in items.into_iter().enumerate() {
        match catch_unwind(AssertUnwindSafe(|| operation(item))) {
            Ok(Ok(task)) => {
                let task = AssertUnwindSafe(task).catch_unwind();
                launched.push(task.map(move |joined| (index, joined)));
            }
            Ok(Err(e)) => warn!("{}: could not start task {}: {:#}", label, index, e),
            Err(panic) => warn!(
                "{}: task {} panicked during setup: {}",
                label,
                index,
                panic_message(panic.as_ref())
            ),
        }
    }

    let outcomes: Vec<(usize, CallOutcome<T>)> = join_all(launched)
        .await
        .into_iter()
        .map(|(index, joined)| match joined {
            Ok(outcome) => (index, outcome),
            Err(panic) => (
                index,
                CallOutcome::FatalFailure(CallFailure::new(
                    FailureKind::Panicked,
                    panic_message(panic.as_ref()),
                )),
            ),
        })
        .collect();

    let succeeded = outcomes.iter().filter(|(_, o)| o.is_success()).count();
    logger.log_batch_operation(label, total, started.elapsed(), succeeded);

    outcomes
}

/// Line indexed outcomes up with the inputs they came from.
///
/// An input with no outcome gets a `NotStarted` failure.
pub fn pair_with_inputs<I, T>(
    items: Vec<I>,
    outcomes: Vec<(usize, CallOutcome<T>)>,
) -> Vec<(I, CallOutcome<T>)> {
    let mut slots: Vec<Option<CallOutcome<T>>> = items.iter().map(|_| None).collect();
    for (index, outcome) in outcomes {
        if let Some(slot) = slots.get_mut(index) {
            *slot = Some(outcome);
        }
    }

    items
        .into_iter()
        .zip(slots)
        .map(|(item, slot)| {
            let outcome = slot.unwrap_or_else(|| {
                CallOutcome::FatalFailure(CallFailure::new(
                    FailureKind::NotStarted,
                    "task could not be started",
                ))
            });
            (item, outcome)
        })
        .collect()
}

/// Drop the input indices from a batch
pub fn outcomes_only<T>(outcomes: Vec<(usize, CallOutcome<T>)>) -> Vec<CallOutcome<T>> {
    outcomes.into_iter().map(|(_, outcome)| outcome).collect()
}

/// Split a batch into its successful payloads and its failures
pub fn split_outcomes<T>(outcomes: Vec<CallOutcome<T>>) -> (Vec<T>, Vec<CallFailure>) {
    let mut values = Vec::new();
    let mut failures = Vec::new();
    for outcome in outcomes {
        match outcome.into_result() {
            Ok(value) => values.push(value),
            Err(failure) => failures.push(failure),
        }
    }
    (values, failures)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "task panicked".to_string()
    }
}
