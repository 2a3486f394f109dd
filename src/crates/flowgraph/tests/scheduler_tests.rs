//! End-to-end tests driving full pipelines through the scheduler

mod common;

use common::*;
use flowgraph::{Batch, FlowGraphConfig, Pipeline, Scheduler, Stage, WORKER_COUNT};
use std::sync::atomic::Ordering;
use std::time::Duration;

fn quiet_config() -> FlowGraphConfig {
    FlowGraphConfig::default().with_tt_checker(false)
}

fn scheduler_for(stages: Vec<Box<dyn Stage<Msg>>>, config: FlowGraphConfig) -> Scheduler<Msg> {
    let pipeline = stages
        .into_iter()
        .fold(Pipeline::builder().with_config(config), |builder, stage| {
            builder.boxed_stage(stage)
        })
        .build()
        .unwrap();
    Scheduler::new(pipeline)
}

async fn finish(scheduler: &Scheduler<Msg>) {
    tokio::time::timeout(Duration::from_secs(5), scheduler.wait())
        .await
        .expect("workers should exit");
    scheduler.close();
}

#[tokio::test]
async fn test_batches_flow_in_order_through_every_stage() {
    init_tracing();
    let events = event_log();
    let (source, tx) = ChannelSource::new(&events);
    let first = Recorder::new("pass1", &events);
    let tail = Recorder::new("pass2", &events);
    let (first_seen, tail_seen) = (first.seen(), tail.seen());

    let scheduler = scheduler_for(
        vec![Box::new(source), Box::new(first), Box::new(tail)],
        quiet_config(),
    );
    scheduler.start().unwrap();

    for v in 1..=5 {
        tx.send(Batch::normal([v])).await.unwrap();
    }
    wait_until("five batches at the tail", || tail_seen.lock().len() == 5).await;

    assert_eq!(*first_seen.lock(), vec![1, 2, 3, 4, 5]);
    assert_eq!(*tail_seen.lock(), vec![1, 2, 3, 4, 5]);

    drop(tx);
    finish(&scheduler).await;
}

#[tokio::test]
async fn test_source_sentinel_stops_both_workers_and_close_cascades() {
    let events = event_log();
    let (source, tx) = ChannelSource::new(&events);
    let scheduler = scheduler_for(
        vec![
            Box::new(source),
            Box::new(Recorder::new("pass1", &events)),
            Box::new(Recorder::new("pass2", &events)),
        ],
        quiet_config(),
    );
    scheduler.start().unwrap();
    assert_eq!(scheduler.pending_workers(), WORKER_COUNT);

    tx.send(Batch::normal([7])).await.unwrap();
    tx.send(Batch::Shutdown).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), scheduler.wait())
        .await
        .expect("both workers should exit");

    assert!(scheduler.source_stopped());
    assert!(scheduler.chain_stopped());
    assert_eq!(scheduler.pending_workers(), 0);

    scheduler.close();
    scheduler.close();
    let closes: Vec<String> = events
        .lock()
        .iter()
        .filter(|e| e.ends_with(":close"))
        .cloned()
        .collect();
    assert_eq!(closes, vec!["source:close", "pass1:close", "pass2:close"]);
    assert!(scheduler.is_closed());
}

#[tokio::test]
async fn test_downstream_sentinel_stops_only_chain_worker() {
    let events = event_log();
    let (source, tx) = ChannelSource::new(&events);
    let tail = Recorder::new("tail", &events);
    let tail_seen = tail.seen();
    let scheduler = scheduler_for(
        vec![
            Box::new(source),
            Box::new(StopAt::new("stopper", 2)),
            Box::new(tail),
        ],
        quiet_config(),
    );
    scheduler.start().unwrap();

    tx.send(Batch::normal([1])).await.unwrap();
    tx.send(Batch::normal([2])).await.unwrap();
    wait_until("chain worker to exit", || {
        scheduler.chain_stopped() && scheduler.pending_workers() == 1
    })
    .await;

    assert!(!scheduler.source_stopped());
    assert_eq!(*tail_seen.lock(), vec![1]);

    // the source keeps running until it emits its own sentinel
    drop(tx);
    finish(&scheduler).await;
    assert!(scheduler.source_stopped());
}

#[tokio::test]
async fn test_rejected_inputs_never_reach_transform() {
    let events = event_log();
    let (source, tx) = ChannelSource::new(&events);
    let filter = EvenFilter::new("evens");
    let tail = Recorder::new("tail", &events);
    let (transformed, tail_seen) = (filter.transformed(), tail.seen());
    let scheduler = scheduler_for(
        vec![Box::new(source), Box::new(filter), Box::new(tail)],
        quiet_config(),
    );
    scheduler.start().unwrap();

    for v in 1..=6 {
        tx.send(Batch::normal([v])).await.unwrap();
    }
    wait_until("even batches at the tail", || tail_seen.lock().len() == 3).await;

    assert_eq!(*transformed.lock(), vec![2, 4, 6]);
    assert_eq!(*tail_seen.lock(), vec![2, 4, 6]);

    drop(tx);
    finish(&scheduler).await;
}

#[tokio::test]
async fn test_rejection_past_first_stage_restarts_pass() {
    let events = event_log();
    let (source, tx) = ChannelSource::new(&events);
    let head = Recorder::new("a", &events);
    let filter = EvenFilter::new("evens");
    let tail = Recorder::new("tail", &events);
    let (head_seen, transformed, tail_seen) = (head.seen(), filter.transformed(), tail.seen());
    let scheduler = scheduler_for(
        vec![
            Box::new(source),
            Box::new(head),
            Box::new(filter),
            Box::new(tail),
        ],
        quiet_config(),
    );
    scheduler.start().unwrap();

    for v in 1..=6 {
        tx.send(Batch::normal([v])).await.unwrap();
    }
    wait_until("even batches at the tail", || tail_seen.lock().len() == 3).await;

    // every batch passes the head; odd ones are dropped at the filter and
    // the next pass starts again from the head
    assert_eq!(*head_seen.lock(), vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(*transformed.lock(), vec![2, 4, 6]);
    assert_eq!(*tail_seen.lock(), vec![2, 4, 6]);

    drop(tx);
    finish(&scheduler).await;
    assert!(scheduler.chain_stopped());
}

#[tokio::test]
async fn test_block_holds_stage_until_unblock() {
    let events = event_log();
    let (source, tx) = ChannelSource::new(&events);
    let gate = Recorder::new("gate", &events);
    let tail = Recorder::new("tail", &events);
    let (gate_seen, tail_seen) = (gate.seen(), tail.seen());
    let scheduler = scheduler_for(
        vec![Box::new(source), Box::new(gate), Box::new(tail)],
        quiet_config(),
    );
    scheduler.start().unwrap();

    let ctx = scheduler.pipeline().find("gate").unwrap();
    ctx.block().await;
    assert!(ctx.is_blocked());

    tx.send(Batch::normal([1])).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(gate_seen.lock().is_empty());
    assert!(tail_seen.lock().is_empty());

    ctx.unblock();
    assert!(!ctx.is_blocked());
    wait_until("batch to pass the gate", || tail_seen.lock().len() == 1).await;
    assert_eq!(*gate_seen.lock(), vec![1]);

    drop(tx);
    finish(&scheduler).await;
}

#[tokio::test]
async fn test_block_all_skips_source() {
    let events = event_log();
    let (source, tx) = ChannelSource::new(&events);
    let scheduler = scheduler_for(
        vec![
            Box::new(source),
            Box::new(Recorder::new("a", &events)),
            Box::new(Recorder::new("b", &events)),
        ],
        quiet_config(),
    );
    scheduler.start().unwrap();

    scheduler.block_all().await;
    let pipeline = scheduler.pipeline();
    assert!(!pipeline.source().is_blocked());
    assert!(pipeline.find("a").unwrap().is_blocked());
    assert!(pipeline.find("b").unwrap().is_blocked());

    scheduler.unblock_all();
    assert!(pipeline.iter().all(|ctx| !ctx.is_blocked()));

    drop(tx);
    finish(&scheduler).await;
}

#[tokio::test]
async fn test_full_queue_stalls_source() {
    let events = event_log();
    let (source, tx) = ChannelSource::new(&events);
    let produced = source.produced();
    let gate = Recorder::new("gate", &events).with_queue_length(1);
    let tail = Recorder::new("tail", &events);
    let tail_seen = tail.seen();
    let scheduler = scheduler_for(
        vec![Box::new(source), Box::new(gate), Box::new(tail)],
        quiet_config(),
    );
    scheduler.start().unwrap();

    let ctx = scheduler.pipeline().find("gate").unwrap();
    ctx.block().await;
    for v in 1..=5 {
        tx.send(Batch::normal([v])).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    // one batch held by the chain worker, one in the queue, one stuck in delivery
    assert_eq!(produced.load(Ordering::SeqCst), 3);

    ctx.unblock();
    wait_until("all batches at the tail", || tail_seen.lock().len() == 5).await;
    assert_eq!(*tail_seen.lock(), vec![1, 2, 3, 4, 5]);

    drop(tx);
    finish(&scheduler).await;
}

#[tokio::test]
async fn test_stage_finishes_before_next_stage_begins() {
    let events = event_log();
    let (source, tx) = ChannelSource::new(&events);
    let delay = Duration::from_millis(5);
    let tail = Recorder::new("b", &events).with_delay(delay);
    let tail_seen = tail.seen();
    let scheduler = scheduler_for(
        vec![
            Box::new(source),
            Box::new(Recorder::new("a", &events).with_delay(delay)),
            Box::new(tail),
        ],
        quiet_config(),
    );
    scheduler.start().unwrap();

    for v in 1..=4 {
        tx.send(Batch::normal([v])).await.unwrap();
    }
    wait_until("four batches at the tail", || tail_seen.lock().len() == 4).await;
    drop(tx);
    finish(&scheduler).await;

    let log: Vec<String> = events
        .lock()
        .iter()
        .filter(|e| !e.ends_with(":close"))
        .cloned()
        .collect();

    // non-source stages share one worker, so transforms never interleave
    for pair in log.chunks(2) {
        let begin = pair[0].replace(":begin:", ":");
        let end = pair[1].replace(":end:", ":");
        assert_eq!(begin, end, "interleaved transforms in {:?}", log);
    }
    for v in 1..=4 {
        let a_end = log.iter().position(|e| *e == format!("a:end:{}", v)).unwrap();
        let b_begin = log.iter().position(|e| *e == format!("b:begin:{}", v)).unwrap();
        assert!(a_end < b_begin, "a:{} must finish before b:{} starts", v, v);
    }
}

#[tokio::test(start_paused = true)]
async fn test_watchdog_tracks_idle_stages() {
    let events = event_log();
    let (source, tx) = ChannelSource::new(&events);
    let config = FlowGraphConfig::default().with_tt_check_interval(Duration::from_secs(1));
    let scheduler = scheduler_for(
        vec![
            Box::new(source),
            Box::new(Recorder::new("pass1", &events)),
            Box::new(Recorder::new("tail", &events)),
        ],
        config,
    );
    scheduler.start().unwrap();
    let checker = scheduler.watchdog().unwrap();
    assert!(checker.is_running());

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(
        checker.stalled(),
        vec![
            "flowgraph-node-pass1",
            "flowgraph-node-source",
            "flowgraph-node-tail"
        ]
    );

    tx.send(Batch::normal([1])).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(checker.stalled().is_empty());

    drop(tx);
    finish(&scheduler).await;
    assert!(checker.names().is_empty());
    assert!(!checker.is_running());
}
