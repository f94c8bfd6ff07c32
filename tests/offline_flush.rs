mod common;

use common::{record, setup_service, setup_service_with, student};
use safepath_lib::application::ports::remote_store::RemoteAttendanceStore;
use safepath_lib::application::services::analytics_log::EVENT_QUEUE_FLUSH;
use safepath_lib::application::services::{AttendanceEvent, AttendanceServiceTrait};
use safepath_lib::domain::entities::{AttendanceDraft, FlushReport, NotificationKind};
use safepath_lib::domain::value_objects::{AttendanceType, StudentId};
use safepath_lib::shared::config::AppConfig;
use std::time::Duration;

fn draft(timestamp: i64) -> AttendanceDraft {
    AttendanceDraft::new(student(), AttendanceType::Login, timestamp)
}

async fn wait_until<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}

#[tokio::test]
async fn scenario_e_coalesces_offline_taps_in_one_bucket() {
    let ctx = setup_service(false).await;
    let queue = ctx.service.queue();

    for (i, ts) in [1_000, 20_000, 45_000].iter().enumerate() {
        queue
            .enqueue(record(&format!("q{i}"), *ts, AttendanceType::Login))
            .unwrap();
    }

    let entries = queue.snapshot().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].timestamp, 45_000);
}

#[tokio::test]
async fn reconnect_flushes_queue_and_marks_log_synced() {
    let ctx = setup_service(false).await;
    ctx.service.produce(draft(1_000)).await.unwrap();
    ctx.service.produce(draft(120_000)).await.unwrap();
    assert_eq!(ctx.service.queue().len().unwrap(), 2);
    assert!(ctx
        .service
        .history_for(&student())
        .unwrap()
        .iter()
        .all(|r| !r.synced));

    let report = ctx
        .service
        .handle_connectivity(true)
        .await
        .unwrap()
        .expect("reconnect should flush");

    assert_eq!(report.sent, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(ctx.service.queue().len().unwrap(), 0);
    assert!(ctx
        .service
        .history_for(&student())
        .unwrap()
        .iter()
        .all(|r| r.synced));

    let summary = ctx
        .sink
        .items()
        .into_iter()
        .find(|item| item.kind == NotificationKind::Info)
        .expect("flush summary");
    assert_eq!(summary.message, "Synced 2 offline records");

    // すでにオンラインなら再フラッシュしない
    assert!(ctx.service.handle_connectivity(true).await.unwrap().is_none());
}

#[tokio::test]
async fn partial_flush_keeps_failures_until_next_attempt() {
    let ctx = setup_service(false).await;
    for ts in [1_000, 61_000, 121_000] {
        ctx.service.produce(draft(ts)).await.unwrap();
    }

    ctx.remote.set_failing(true);
    let report = ctx.service.handle_connectivity(true).await.unwrap().unwrap();
    assert_eq!(report.sent, 0);
    assert_eq!(report.failed, 3);
    assert_eq!(report.remaining, 3);
    assert!(ctx
        .sink
        .items()
        .iter()
        .all(|item| item.kind != NotificationKind::Info));

    let status = ctx.service.queue_status().unwrap();
    assert_eq!(status.pending, 3);
    assert_eq!(status.metrics.consecutive_failure, 1);

    ctx.remote.set_failing(false);
    let report = ctx.service.flush_now().await.unwrap();
    assert_eq!(report.sent, 3);
    assert_eq!(ctx.service.queue().len().unwrap(), 0);

    let status = ctx.service.queue_status().unwrap();
    assert_eq!(status.metrics.consecutive_failure, 0);
    assert_eq!(status.metrics.total_sent, 3);
    assert_eq!(status.metrics.flush_cycles, 2);
}

#[tokio::test]
async fn empty_queue_flush_records_nothing() {
    let ctx = setup_service(true).await;

    let report = ctx.service.flush_now().await.unwrap();
    assert_eq!(report, FlushReport::default());

    let status = ctx.service.queue_status().unwrap();
    assert_eq!(status.metrics.flush_cycles, 0);
    assert_eq!(status.metrics.last_trigger, None);
    assert!(ctx
        .service
        .analytics()
        .events()
        .unwrap()
        .iter()
        .all(|event| event.name != EVENT_QUEUE_FLUSH));
    assert!(ctx.sink.items().is_empty());
}

#[tokio::test]
async fn flush_treats_remote_rejection_as_resolved() {
    let ctx = setup_service(false).await;
    ctx.service.produce(draft(10_000)).await.unwrap();

    // 別端末が同じバケットに新しい記録を書き込んだ状態
    let newer = record("other-device", 50_000, AttendanceType::Logout);
    ctx.remote.inner().commit(&newer).await.unwrap();

    let report = ctx.service.handle_connectivity(true).await.unwrap().unwrap();
    assert_eq!(report.sent, 1);
    assert_eq!(report.failed, 0);
    assert!(ctx.service.queue().is_empty().unwrap());
    assert!(ctx.service.history_for(&student()).unwrap()[0].synced);
}

#[tokio::test]
async fn flush_events_are_published() {
    let ctx = setup_service(false).await;
    ctx.service.produce(draft(1_000)).await.unwrap();
    let mut events = ctx.service.subscribe_events();

    ctx.service.handle_connectivity(true).await.unwrap();

    match events.recv().await.unwrap() {
        AttendanceEvent::Flushed(report) => assert_eq!(report.sent, 1),
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn watcher_flushes_on_reconnect() {
    let ctx = setup_service(false).await;
    ctx.service.produce(draft(1_000)).await.unwrap();
    ctx.service.produce(draft(61_000)).await.unwrap();

    let handle = ctx.service.spawn_connectivity_watcher();
    tokio::task::yield_now().await;
    assert!(ctx.service.set_online(true));

    let service = ctx.service.clone();
    wait_until(|| service.queue().len().map(|n| n == 0).unwrap_or(false)).await;
    assert!(ctx
        .service
        .history_for(&student())
        .unwrap()
        .iter()
        .all(|r| r.synced));

    handle.abort();
}

#[tokio::test]
async fn watcher_flushes_periodically_while_online() {
    let mut config = AppConfig::default();
    config.sync.flush_interval_secs = 1;
    let ctx = setup_service_with(true, config).await;

    ctx.remote.set_failing(true);
    ctx.service.produce(draft(1_000)).await.unwrap();
    assert_eq!(ctx.service.queue().len().unwrap(), 1);
    ctx.remote.set_failing(false);

    let handle = ctx.service.spawn_connectivity_watcher();
    let service = ctx.service.clone();
    wait_until(|| service.queue().len().map(|n| n == 0).unwrap_or(false)).await;
    assert_eq!(
        ctx.service.queue_status().unwrap().metrics.last_trigger.as_deref(),
        Some("interval")
    );

    handle.abort();
}

#[tokio::test]
async fn other_students_are_unaffected_by_flush() {
    let ctx = setup_service(false).await;
    let other = StudentId::new("student-002".to_string()).unwrap();
    ctx.service.produce(draft(1_000)).await.unwrap();
    ctx.service
        .produce(AttendanceDraft::new(other.clone(), AttendanceType::Login, 2_000))
        .await
        .unwrap();
    assert_eq!(ctx.service.queue().len().unwrap(), 2);

    let report = ctx.service.handle_connectivity(true).await.unwrap().unwrap();
    assert_eq!(report.sent, 2);
    assert_eq!(ctx.service.history_for(&other).unwrap().len(), 1);
    assert!(ctx.service.history_for(&other).unwrap()[0].synced);
}
