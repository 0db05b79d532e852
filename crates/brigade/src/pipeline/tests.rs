use super::{RunState, panic_message};
use crate::{
    Channel, Error, Event, NoopObserver, Observer, OrderIndex, OrderState, Pipeline,
    PipelineReport, Recorder, Roster, SeededRandom, Stage, Station, run_pipeline,
};
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

fn recorded() -> Pipeline<crate::ThreadRandom, Recorder> {
    Pipeline::new().with_observer(Recorder::default())
}

/// Runs `orders` on a helper thread and fails the test if the run does not
/// finish within `budget`.
fn run_within(orders: usize, budget: Duration) -> (PipelineReport, Recorder) {
    let (done_tx, done_rx) = mpsc::channel();
    thread::spawn(move || {
        let pipeline = recorded();
        let report = pipeline.run(orders);
        let _ = done_tx.send((report, pipeline.into_observer()));
    });
    done_rx
        .recv_timeout(budget)
        .unwrap_or_else(|_| panic!("pipeline with {orders} orders did not finish in {budget:?}"))
}

/// Panics when asked to observe the intake of `order`.
struct RejectIntake {
    order: OrderIndex,
}

impl Observer for RejectIntake {
    fn observe(&self, event: Event) {
        if let Event::Intake { order, .. } = event {
            if order == self.order {
                panic!("observer rejected order {order}");
            }
        }
    }
}

fn assert_complete_run(orders: usize, report: PipelineReport, recorder: &Recorder) {
    assert_eq!(
        report,
        PipelineReport {
            orders,
            tickets: orders,
            dishes: orders,
            delivered: orders,
        }
    );

    for stage in Stage::ALL {
        let seen = recorder.orders_at(stage);
        assert_eq!(seen.len(), orders, "{stage} events");
        let unique: HashSet<_> = seen.iter().copied().collect();
        assert_eq!(unique, (0..orders).collect::<HashSet<_>>(), "{stage} order indices");
    }
}

#[test]
fn zero_orders_launch_nothing() {
    let pipeline = recorded();
    let report = pipeline.run(0);
    assert_eq!(report, PipelineReport::default());
    assert!(pipeline.observer().events().is_empty());
}

#[test]
fn one_order_passes_each_stage_once() {
    let pipeline = recorded();
    let report = pipeline.run(1);
    let recorder = pipeline.observer();
    assert_complete_run(1, report, recorder);

    let stages: Vec<_> = recorder.events().iter().filter_map(Event::stage).collect();
    assert_eq!(stages, Stage::ALL);
    assert_eq!(recorder.closure(Channel::Tickets).map(|(_, n)| n), Some(1));
    assert_eq!(recorder.closure(Channel::Pass).map(|(_, n)| n), Some(1));
}

#[test]
fn five_orders_are_each_delivered_once() {
    let pipeline = recorded();
    let report = pipeline.run(5);
    assert_complete_run(5, report, pipeline.observer());

    let mut delivered = pipeline.observer().deliveries();
    delivered.sort_unstable();
    assert_eq!(delivered, vec![0, 1, 2, 3, 4]);
}

#[test]
fn every_order_moves_forward_one_stage_at_a_time() {
    let pipeline = recorded();
    pipeline.run(50);

    let timelines = pipeline.observer().timelines();
    assert_eq!(timelines.len(), 50);
    for (order, stages) in timelines {
        let state = stages
            .iter()
            .try_fold(OrderState::Pending, |state, &stage| state.advance(stage));
        assert_eq!(
            state,
            Some(OrderState::Delivered),
            "order {order} went {stages:?}"
        );
    }
}

#[test]
fn causal_order_per_order_index() {
    let pipeline = recorded();
    pipeline.run(100);
    let recorder = pipeline.observer();

    for order in 0..100 {
        let taken = recorder.position(Stage::Intake, order).unwrap();
        let cooked = recorder.position(Stage::Process, order).unwrap();
        let served = recorder.position(Stage::Deliver, order).unwrap();
        assert!(taken < cooked && cooked < served, "order {order}");
    }
}

#[test]
fn tickets_close_only_after_every_intake() {
    for _ in 0..20 {
        let pipeline = recorded();
        pipeline.run(5);
        let recorder = pipeline.observer();

        let (closed_at, handoffs) = recorder.closure(Channel::Tickets).unwrap();
        assert_eq!(handoffs, 5, "tickets closed before every intake send completed");
        for order in 0..5 {
            assert!(recorder.position(Stage::Intake, order).unwrap() < closed_at);
        }

        let (pass_closed_at, dishes) = recorder.closure(Channel::Pass).unwrap();
        assert_eq!(dishes, 5, "pass closed before every process send completed");
        assert!(closed_at < pass_closed_at);
        for order in 0..5 {
            assert!(recorder.position(Stage::Process, order).unwrap() < pass_closed_at);
        }
    }
}

#[test]
fn workers_come_from_their_rosters() {
    let pipeline = recorded();
    pipeline.run(200);

    let waiters = Roster::front_of_house();
    let chefs = Roster::back_of_house();
    for event in pipeline.observer().events() {
        match event {
            Event::Intake { waiter, chef, .. } | Event::Deliver { waiter, chef, .. } => {
                assert!(waiters.contains(&waiter), "unknown waiter {waiter}");
                assert!(chefs.contains(&chef), "unknown chef {chef}");
            }
            Event::Process { chef, .. } => assert!(chefs.contains(&chef), "unknown chef {chef}"),
            Event::ChannelClosed { .. } => {}
        }
    }
}

#[test]
fn ticketed_chef_cooks_and_is_credited_at_delivery() {
    let pipeline = recorded();
    pipeline.run(30);
    let events = pipeline.observer().events();

    for order in 0..30 {
        let chefs: Vec<_> = events
            .iter()
            .filter(|event| event.order() == Some(order))
            .map(|event| match event {
                Event::Intake { chef, .. }
                | Event::Process { chef, .. }
                | Event::Deliver { chef, .. } => chef.clone(),
                Event::ChannelClosed { .. } => unreachable!(),
            })
            .collect();
        assert_eq!(chefs.len(), 3);
        assert!(chefs.windows(2).all(|pair| pair[0] == pair[1]), "{chefs:?}");
    }
}

#[test]
fn custom_rosters_are_used() {
    let waiters = Roster::new(Station::FrontOfHouse, ["Ana"]).unwrap();
    let chefs = Roster::new(Station::BackOfHouse, ["Remy"]).unwrap();
    let pipeline = Pipeline::new()
        .with_rosters(waiters, chefs)
        .unwrap()
        .with_rand(SeededRandom::new(9))
        .with_observer(Recorder::default());
    pipeline.run(10);

    let tally = pipeline.observer().tally();
    assert_eq!(tally.intakes.get("Ana"), Some(&10));
    assert_eq!(tally.cooked.get("Remy"), Some(&10));
    assert_eq!(tally.deliveries.get("Ana"), Some(&10));
}

#[test]
fn overlapping_rosters_are_rejected() {
    let waiters = Roster::new(Station::FrontOfHouse, ["A", "Bob"]).unwrap();
    let err = Pipeline::new()
        .with_rosters(waiters, Roster::back_of_house())
        .err()
        .unwrap();
    assert_eq!(err.to_string(), "worker \"Bob\" is on both rosters");
}

#[test]
fn no_deadlock_across_order_counts() {
    for orders in [0, 1, 5, 100, 1000] {
        let (report, recorder) = run_within(orders, Duration::from_secs(60));
        assert_complete_run(orders, report, &recorder);
    }
}

#[test]
fn pipeline_can_run_repeatedly() {
    let pipeline = Pipeline::new().with_observer(NoopObserver);
    for _ in 0..10 {
        assert_eq!(pipeline.run(8).delivered, 8);
    }
}

#[test]
fn default_entry_point_runs_to_completion() {
    assert_eq!(run_pipeline(5).delivered, 5);
}

#[test]
#[should_panic(expected = "order pipeline aborted: intake task panicked: observer rejected order 0")]
fn failing_stage_aborts_the_run() {
    Pipeline::new()
        .with_observer(RejectIntake { order: 0 })
        .run(5);
}

#[test]
fn failing_stage_releases_every_task() {
    let (done_tx, done_rx) = mpsc::channel();
    thread::spawn(move || {
        let outcome = panic::catch_unwind(|| {
            Pipeline::new()
                .with_observer(RejectIntake { order: 3 })
                .run(50)
        });
        let _ = done_tx.send(outcome.map_err(|payload| panic_message(payload.as_ref())));
    });

    let outcome = done_rx
        .recv_timeout(Duration::from_secs(30))
        .expect("aborted run did not return");
    assert_eq!(
        outcome.unwrap_err(),
        "order pipeline aborted: intake task panicked: observer rejected order 3"
    );
}

#[test]
fn first_failure_is_kept_and_channels_are_released() {
    let run = RunState::new();
    run.fail(Error::Drained {
        channel: Channel::Tickets,
        stage: Stage::Process,
    });
    run.fail(Error::ChannelClosed {
        channel: Channel::Pass,
        stage: Stage::Process,
    });
    assert!(run.tickets.is_closed());
    assert!(run.pass.is_closed());

    let payload = panic::catch_unwind(AssertUnwindSafe(|| run.abort_if_failed())).unwrap_err();
    assert_eq!(
        panic_message(payload.as_ref()),
        "order pipeline aborted: process stage found tickets channel closed and drained"
    );
}

#[test]
#[should_panic(expected = "order pipeline aborted: pass channel closed twice")]
fn failed_close_names_the_channel() {
    recorded().close_channel(
        Channel::Pass,
        Err(Error::AlreadyClosed {
            channel: Channel::Pass,
        }),
    );
}
