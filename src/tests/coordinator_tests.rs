// Push and pull updates sharing one gate, as wired up on the device

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use super::fakes::{FakeReleaseClient, MemorySink, RecordingDisplay, RecordingPublisher};
use crate::config::Config;
use crate::network::ConnectivityAnnouncer;
use crate::ota::auto_update::{AutoUpdateChecker, AutoUpdateSettings, CheckOutcome};
use crate::ota::{PushUpdateHandler, UpdateCoordinator, UpdateError, UpdateGate, UpdateOrigin};
use crate::system::DeviceIdentity;

fn pull_settings(version: Option<&str>) -> AutoUpdateSettings {
    AutoUpdateSettings {
        enabled: true,
        interval_secs: 300,
        release_base_url: "https://example.com/releases".to_string(),
        firmware: "esp32".to_string(),
        version: version.map(str::to_string),
    }
}

#[test]
fn test_gate_is_safe_before_and_after_every_pull_outcome() {
    let mut clients = Vec::new();
    clients.push(FakeReleaseClient::redirect_to("v2"));
    clients.push(FakeReleaseClient::redirect_to("v1"));
    let mut truncated = FakeReleaseClient::redirect_to("v2");
    truncated.truncate_body = true;
    clients.push(truncated);
    let mut refused = FakeReleaseClient::redirect_to("v2");
    refused.download_error = Some(UpdateError::Connect("refused".into()));
    clients.push(refused);

    for client in clients {
        let gate = UpdateGate::new();
        let coordinator = UpdateCoordinator::new(gate.clone());
        let mut checker = AutoUpdateChecker::new(pull_settings(Some("v1")), client, MemorySink::default(), coordinator);

        assert!(!gate.is_unsafe());
        let outcome = checker.poll(300);
        assert!(
            matches!(
                outcome,
                CheckOutcome::Succeeded(_) | CheckOutcome::NoUpdateAvailable | CheckOutcome::Failed(_)
            ),
            "{:?}",
            outcome
        );
        assert!(!gate.is_unsafe(), "gate left unsafe after {:?}", outcome);
    }
}

#[test]
fn test_sensing_sees_flash_window_of_push_upload() {
    let gate = UpdateGate::new();
    let suppression = gate.suppression();
    let coordinator = UpdateCoordinator::new(gate.clone());

    let transitions = Arc::new(Mutex::new(Vec::new()));
    let log = transitions.clone();
    gate.subscribe(move |unsafe_now| {
        if let Ok(mut log) = log.lock() {
            log.push(unsafe_now);
        }
    });

    let mut handler = PushUpdateHandler::new(coordinator, RecordingDisplay::default(), None);
    let mut sink = MemorySink::default();
    handler
        .receive(&mut Cursor::new(vec![0xE9u8; 5000]), Some(5000), None, &mut sink)
        .unwrap();

    assert!(!suppression.is_sensing_suppressed());
    assert_eq!(*transitions.lock().unwrap(), vec![true, false]);
}

#[test]
fn test_push_upload_rejected_while_pull_in_flight() {
    let gate = UpdateGate::new();
    let coordinator = UpdateCoordinator::new(gate.clone());
    let pull = coordinator.try_begin(UpdateOrigin::Pull).unwrap();

    let mut handler = PushUpdateHandler::new(coordinator.clone(), RecordingDisplay::default(), None);
    let mut sink = MemorySink::default();
    let err = handler
        .receive(&mut Cursor::new(vec![1u8; 64]), Some(64), None, &mut sink)
        .unwrap_err();

    assert_eq!(err, UpdateError::Busy(UpdateOrigin::Pull));
    assert!(!sink.begun);
    assert!(gate.is_unsafe());
    drop(pull);
    assert!(!gate.is_unsafe());
}

#[test]
fn test_concurrent_claims_admit_exactly_one_session() {
    let coordinator = UpdateCoordinator::new(UpdateGate::new());
    let winners = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(std::sync::Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let coordinator = coordinator.clone();
            let winners = winners.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let origin = if i % 2 == 0 { UpdateOrigin::Push } else { UpdateOrigin::Pull };
                barrier.wait();
                if let Ok(ticket) = coordinator.try_begin(origin) {
                    winners.fetch_add(1, Ordering::SeqCst);
                    // Hold the slot until every thread has tried
                    thread::sleep(std::time::Duration::from_millis(200));
                    ticket.succeed();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(winners.load(Ordering::SeqCst), 1);
    assert!(!coordinator.gate().is_unsafe());
}

#[test]
fn test_kitchen_announcement_cycle() {
    let identity = DeviceIdentity::new([0xAA, 0xBB, 0xCC, 0x00, 0x11, 0x22], "Kitchen", "ESP32-S3");
    let config = Config {
        room: "Kitchen".to_string(),
        discovery: true,
        weather: true,
        ..Default::default()
    };

    let mut announcer = ConnectivityAnnouncer::new(RecordingPublisher::default(), &identity, &config)
        .unwrap()
        .with_retry(crate::network::RetryBudget::immediate(10));

    assert!(announcer.send_discovery_motion());
    assert_eq!(announcer.publisher().attempts, 0);

    assert!(announcer.send_discovery_weather());
    assert_eq!(
        announcer.publisher().topics(),
        vec![
            "homeassistant/sensor/espresence_Kitchen/temperature/config",
            "homeassistant/sensor/espresence_Kitchen/humidity/config",
            "homeassistant/sensor/espresence_Kitchen/pressure/config",
        ]
    );
}
