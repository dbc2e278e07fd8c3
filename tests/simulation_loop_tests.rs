use pontual_device::kernel::event::{
    AttendanceAction, AttendanceEvent, Heartbeat, ATTENDANCE_TOPIC, HEARTBEAT_TOPIC,
};
use pontual_device::kernel::sampler::{SamplingPolicy, ScriptedRandom, ThreadRandom};
use pontual_device::services::mqtt::{BrokerSettings, MockBroker, MockConnector};
use pontual_device::{BadgeRegistry, BrokerEvent, SimulatedDevice};
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

fn device(broker: &MockBroker) -> SimulatedDevice<MockConnector> {
    SimulatedDevice::new("DEVICE_321", BrokerSettings::default(), broker.connector())
}

fn cancel_after(secs: u64) -> CancellationToken {
    let cancel = CancellationToken::new();
    let stopper = cancel.clone();
    tokio::spawn(async move {
        sleep(Duration::from_secs(secs)).await;
        stopper.cancel();
    });
    cancel
}

fn decode(payloads: &[Vec<u8>]) -> Vec<AttendanceEvent> {
    payloads
        .iter()
        .map(|p| serde_json::from_slice(p).expect("valid attendance payload"))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_loop_follows_scripted_choices() {
    let broker = MockBroker::new();
    // Picks go badge, action, badge, action...
    let random = ScriptedRandom::new()
        .with_intervals([5, 5, 5, 5])
        .with_indices([0, 0, 1, 1, 2, 0]);
    let mut device = device(&broker).with_random(random);
    device.connect().await.unwrap();

    let cancel = cancel_after(17);
    device.run_simulation(&cancel).await;

    let events = decode(&broker.published_on(ATTENDANCE_TOPIC));
    let seen: Vec<(&str, AttendanceAction)> = events
        .iter()
        .map(|e| (e.rfid_tag.as_str(), e.action))
        .collect();
    assert_eq!(
        seen,
        vec![
            ("RFID001", AttendanceAction::CheckIn),
            ("RFID002", AttendanceAction::CheckOut),
            ("RFID003", AttendanceAction::CheckIn),
        ]
    );
    assert!(events.iter().all(|e| e.device_id == "DEVICE_321"));
}

#[tokio::test(start_paused = true)]
async fn test_loop_waits_while_disconnected() {
    let broker = MockBroker::new();
    let mut device = device(&broker).with_random(ScriptedRandom::new().with_intervals([5; 10]));

    let cancel = cancel_after(32);
    device.run_simulation(&cancel).await;

    assert_eq!(broker.network_calls(), 0);
    let snapshot = device.telemetry();
    assert_eq!(snapshot.loop_errors, 0);
    assert_eq!(snapshot.publish_stats.published, 0);
}

#[tokio::test(start_paused = true)]
async fn test_loop_resumes_publishing_after_reconnect() {
    let broker = MockBroker::new();
    let mut device = device(&broker).with_random(ScriptedRandom::new().with_intervals([5; 10]));
    device.connect().await.unwrap();

    let notifier = broker.clone();
    tokio::spawn(async move {
        // Offline for the wakeups at 5 and 10, back for 15 and 20.
        sleep(Duration::from_secs(2)).await;
        notifier.notify(BrokerEvent::disconnected("wifi dropped")).await;
        sleep(Duration::from_secs(10)).await;
        notifier.notify(BrokerEvent::Connected).await;
    });

    let cancel = cancel_after(22);
    device.run_simulation(&cancel).await;

    assert_eq!(broker.published_on(ATTENDANCE_TOPIC).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_transient_error_pauses_then_continues() {
    let broker = MockBroker::new();
    let mut device = device(&broker)
        .with_registry(BadgeRegistry::default())
        .with_random(ScriptedRandom::new().with_intervals([5; 10]))
        .with_error_pause(Duration::from_secs(5));
    device.connect().await.unwrap();

    // Errors at 5 and 15; each followed by a 5 s pause.
    let cancel = cancel_after(22);
    device.run_simulation(&cancel).await;

    assert_eq!(device.telemetry().loop_errors, 2);
    assert!(broker.published_on(ATTENDANCE_TOPIC).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_publish_failures_do_not_pause_the_loop() {
    let broker = MockBroker::new();
    broker.set_fail_publish(true);
    let mut device = device(&broker).with_random(ScriptedRandom::new().with_intervals([5; 10]));
    device.connect().await.unwrap();

    let cancel = cancel_after(21);
    device.run_simulation(&cancel).await;

    let snapshot = device.telemetry();
    assert_eq!(snapshot.publish_stats.failed, 4);
    assert_eq!(snapshot.loop_errors, 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_loop_returns_before_first_scan() {
    let broker = MockBroker::new();
    let mut device = device(&broker);
    device.connect().await.unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let started = tokio::time::Instant::now();
    device.run_simulation(&cancel).await;

    assert_eq!(started.elapsed(), Duration::ZERO);
    assert!(broker.published_on(ATTENDANCE_TOPIC).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_random_run_stays_within_registry_and_actions() {
    let broker = MockBroker::new();
    let mut device = device(&broker).with_random(ThreadRandom::seeded(99));
    device.connect().await.unwrap();

    // At most 3600 / 5 scans in an hour, at least 3600 / 15 - 1.
    let cancel = cancel_after(3_600);
    device.run_simulation(&cancel).await;

    let events = decode(&broker.published_on(ATTENDANCE_TOPIC));
    assert!(events.len() >= 239 && events.len() <= 720, "got {}", events.len());
    let registry = BadgeRegistry::demo();
    assert!(events.iter().all(|e| registry.contains(&e.rfid_tag)));
    assert!(events.iter().any(|e| e.action == AttendanceAction::CheckIn));
    assert!(events.iter().any(|e| e.action == AttendanceAction::CheckOut));
}

#[test]
fn test_sampled_intervals_cover_five_to_fifteen() {
    let policy = SamplingPolicy::default();
    let mut random = ThreadRandom::new();
    let mut counts = [0u32; 16];
    for _ in 0..11_000 {
        let secs = policy.next_interval(&mut random).as_secs();
        assert!((5..=15).contains(&secs), "sampled {secs}");
        counts[secs as usize] += 1;
    }
    // Roughly uniform: each of the 11 values expected ~1000 times.
    for secs in 5..=15 {
        assert!(counts[secs] > 700, "{secs}s sampled only {} times", counts[secs]);
    }
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_only_while_connected() {
    let broker = MockBroker::new();
    let mut device = device(&broker).with_heartbeat(Some(Duration::from_secs(30)));
    device.connect().await.unwrap();

    sleep(Duration::from_secs(65)).await;
    let beats = broker.published_on(HEARTBEAT_TOPIC);
    assert_eq!(beats.len(), 2);
    let first: Heartbeat = serde_json::from_slice(&beats[0]).unwrap();
    let second: Heartbeat = serde_json::from_slice(&beats[1]).unwrap();
    assert_eq!(first.device_id, "DEVICE_321");
    assert_eq!(first.status, "online");
    // Uptime runs on the runtime clock.
    assert_eq!((first.uptime_secs, second.uptime_secs), (30, 60));

    broker.notify(BrokerEvent::disconnected("gone")).await;
    sleep(Duration::from_secs(60)).await;
    assert_eq!(broker.published_on(HEARTBEAT_TOPIC).len(), 2);

    device.shutdown().await;
    assert_eq!(device.telemetry().heartbeat_stats.sent, 2);
    assert_eq!(device.recent_activity().heartbeat_stats.sent, 2);
}
