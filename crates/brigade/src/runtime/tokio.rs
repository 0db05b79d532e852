//! The pipeline on the [`tokio`](https://docs.rs/tokio) runtime.
//!
//! Same stages, same closing order as [`Pipeline::run`], but every stage task
//! is a Tokio task and the channels are [`AsyncRendezvous`]. Each stage's
//! tasks live in their own `JoinSet`, and draining that set is the stage's
//! completion barrier.
//!
//! Runs can be cancelled through a [`CancellationToken`]. Cancelling aborts
//! every outstanding stage task and closes both channels.

use crate::pipeline::panic_message;
use crate::{
    AsyncRendezvous, Channel, CompletionRecord, Error, IntakeRecord, Observer, OrderIndex,
    Pipeline, PipelineReport, RandSource, Result, Stage,
};
use portable_atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
#[cfg(feature = "tracing")]
use tracing::instrument;

/// Async intake stage. See [`intake`](crate::intake).
///
/// # Errors
///
/// Returns [`Error::ChannelClosed`] if `tickets` was closed early.
pub async fn intake_async<R, O>(
    pipeline: &Pipeline<R, O>,
    order: OrderIndex,
    tickets: &AsyncRendezvous<IntakeRecord>,
) -> Result<()>
where
    R: RandSource,
    O: Observer,
{
    let ticket = pipeline.take_order(order);
    tickets.send(ticket, Stage::Intake).await
}

/// Async process stage. See [`process`](crate::process).
///
/// # Errors
///
/// Returns [`Error::Drained`] if `tickets` closed before a ticket arrived
/// and [`Error::ChannelClosed`] if `pass` was closed early.
pub async fn process_async<R, O>(
    pipeline: &Pipeline<R, O>,
    tickets: &AsyncRendezvous<IntakeRecord>,
    pass: &AsyncRendezvous<CompletionRecord>,
) -> Result<()>
where
    R: RandSource,
    O: Observer,
{
    let ticket = tickets.recv().await.ok_or(Error::Drained {
        channel: Channel::Tickets,
        stage: Stage::Process,
    })?;
    let dish = pipeline.cook(ticket);
    pass.send(dish, Stage::Process).await
}

/// Async deliver stage. See [`deliver`](crate::deliver).
///
/// # Errors
///
/// Returns [`Error::Drained`] if `pass` closed before a dish arrived.
pub async fn deliver_async<R, O>(
    pipeline: &Pipeline<R, O>,
    pass: &AsyncRendezvous<CompletionRecord>,
) -> Result<()>
where
    R: RandSource,
    O: Observer,
{
    let dish = pass.recv().await.ok_or(Error::Drained {
        channel: Channel::Pass,
        stage: Stage::Deliver,
    })?;
    pipeline.serve(dish);
    Ok(())
}

/// Runs `order_count` orders on the current Tokio runtime and resolves once
/// every one has been delivered.
///
/// # Panics
///
/// Panics with `order pipeline aborted: {err}` if a stage task finds a
/// channel closed or drained, or if a stage task panics.
pub async fn run_pipeline_async<R, O>(
    pipeline: Arc<Pipeline<R, O>>,
    order_count: usize,
) -> PipelineReport
where
    R: RandSource + Send + Sync + 'static,
    O: Observer + 'static,
{
    match run_pipeline_until_cancelled(pipeline, order_count, CancellationToken::new()).await {
        Ok(report) => report,
        Err(err) => unreachable!("uncancellable run failed: {err}"),
    }
}

/// Like [`run_pipeline_async`], but gives up when `cancel` fires.
///
/// # Errors
///
/// Returns [`Error::Cancelled`] if `cancel` fired before every order was
/// delivered. Outstanding stage tasks are aborted.
///
/// # Panics
///
/// Panics if a stage task finds a channel closed or drained, or if a stage
/// task panics.
#[cfg_attr(feature = "tracing", instrument(level = "debug", skip(pipeline, cancel)))]
pub async fn run_pipeline_until_cancelled<R, O>(
    pipeline: Arc<Pipeline<R, O>>,
    order_count: usize,
    cancel: CancellationToken,
) -> Result<PipelineReport>
where
    R: RandSource + Send + Sync + 'static,
    O: Observer + 'static,
{
    if order_count == 0 {
        return Ok(PipelineReport::default());
    }

    let tickets = Arc::new(AsyncRendezvous::new(Channel::Tickets));
    let pass = Arc::new(AsyncRendezvous::new(Channel::Pass));
    let served = Arc::new(AtomicUsize::new(0));

    let mut intakes = JoinSet::new();
    let mut processes = JoinSet::new();
    let mut deliveries = JoinSet::new();

    for order in 0..order_count {
        let (pipeline_, tickets_) = (Arc::clone(&pipeline), Arc::clone(&tickets));
        intakes.spawn(async move { intake_async(&pipeline_, order, &tickets_).await });

        let (pipeline_, tickets_, pass_) = (
            Arc::clone(&pipeline),
            Arc::clone(&tickets),
            Arc::clone(&pass),
        );
        processes.spawn(async move { process_async(&pipeline_, &tickets_, &pass_).await });

        let (pipeline_, pass_, served_) =
            (Arc::clone(&pipeline), Arc::clone(&pass), Arc::clone(&served));
        deliveries.spawn(async move {
            deliver_async(&pipeline_, &pass_).await?;
            served_.fetch_add(1, Ordering::Relaxed);
            Ok::<_, Error>(())
        });
    }

    #[cfg(feature = "tracing")]
    tracing::trace!("Spawned {} stage tasks", 3 * order_count);

    let outcome = async {
        wait_stage(Stage::Intake, &mut intakes, &cancel).await?;
        let tickets_handed_off = pipeline.close_channel(Channel::Tickets, tickets.close());

        wait_stage(Stage::Process, &mut processes, &cancel).await?;
        let dishes_handed_off = pipeline.close_channel(Channel::Pass, pass.close());

        wait_stage(Stage::Deliver, &mut deliveries, &cancel).await?;

        Ok::<_, Error>(PipelineReport {
            orders: order_count,
            tickets: tickets_handed_off,
            dishes: dishes_handed_off,
            delivered: served.load(Ordering::Relaxed),
        })
    }
    .await;

    if outcome.is_err() {
        #[cfg(feature = "tracing")]
        tracing::warn!("Run cancelled, aborting outstanding stage tasks");
        tickets.abort();
        pass.abort();
        intakes.abort_all();
        processes.abort_all();
        deliveries.abort_all();
    }

    outcome
}

/// Waits for every task of one stage. This is the stage's completion
/// barrier. A failed or panicked task aborts the run; the remaining tasks are
/// aborted when their `JoinSet`s drop.
async fn wait_stage(
    stage: Stage,
    tasks: &mut JoinSet<Result<()>>,
    cancel: &CancellationToken,
) -> Result<()> {
    loop {
        let joined = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Error::Cancelled),
            joined = tasks.join_next() => joined,
        };

        match joined {
            None => return Ok(()),
            Some(Ok(Ok(()))) => {}
            Some(Ok(Err(err))) => panic!("order pipeline aborted: {err}"),
            Some(Err(join_err)) => match join_err.try_into_panic() {
                Ok(payload) => {
                    let err = Error::StagePanicked {
                        stage,
                        message: panic_message(payload.as_ref()),
                    };
                    panic!("order pipeline aborted: {err}");
                }
                Err(join_err) => panic!("order pipeline aborted: {stage} task {join_err}"),
            },
        }
    }
}
