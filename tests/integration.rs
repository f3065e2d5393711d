//! Integration tests for heading requests and their manager.

use heading_feed::{
    ErrorReason, Heading, HeadingData, HeadingManager, HeadingProvider, ManagerConfig,
    RequestState, Timestamp,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

fn reading(degrees: f64, millis: i64) -> HeadingData {
    Ok(Heading::new(degrees, 1.0).at(Timestamp::from_millis(millis)))
}

fn record_into(seen: &Arc<Mutex<Vec<HeadingData>>>) -> impl Fn(&HeadingData) + Send + Sync + 'static {
    let sink = Arc::clone(seen);
    move |data: &HeadingData| sink.lock().unwrap().push(data.clone())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Provider that counts start/stop demand changes.
#[derive(Default)]
struct DemandProvider {
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl HeadingProvider for DemandProvider {
    fn start_updates(&self) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }

    fn stop_updates(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

// --- Realistic Workflow Tests ---

#[test]
fn test_pause_resume_stop_workflow() {
    let manager = HeadingManager::new(ManagerConfig::default());
    let request = manager.create_heading_request(None, None).unwrap();

    let first = Arc::new(Mutex::new(Vec::new()));
    let second = Arc::new(Mutex::new(Vec::new()));
    request.register_callback(record_into(&first));
    request.register_callback(record_into(&second));

    request.start();
    manager.dispatch(reading(10.0, 0));

    request.pause();
    manager.dispatch(reading(20.0, 100));

    request.start();
    manager.dispatch(reading(30.0, 200));

    request.stop();

    for seen in [&first, &second] {
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].as_ref().unwrap().magnetic_heading, 10.0);
        assert_eq!(seen[1].as_ref().unwrap().magnetic_heading, 30.0);
        assert_eq!(seen[2], Err(ErrorReason::Cancelled));
    }

    assert_eq!(request.state(), RequestState::Expired);
    assert_eq!(manager.request_count(), 0);
}

#[test]
fn test_independent_filters_per_request() {
    let manager = HeadingManager::default();
    let precise = manager.create_heading_request(Some(5.0), None).unwrap();
    let throttled = manager
        .create_heading_request(None, Some(Duration::from_secs(2)))
        .unwrap();
    let precise_stream = precise.stream(16);
    let throttled_stream = throttled.stream(16);
    precise.start();
    throttled.start();

    manager.dispatch(Ok(Heading::new(1.0, 2.0).at(Timestamp::from_millis(0))));
    manager.dispatch(Ok(Heading::new(2.0, 9.0).at(Timestamp::from_millis(1_000))));
    manager.dispatch(Ok(Heading::new(3.0, 2.0).at(Timestamp::from_millis(2_500))));

    let precise_seen: Vec<f64> = std::iter::from_fn(|| precise_stream.try_recv().ok())
        .map(|d| d.unwrap().magnetic_heading)
        .collect();
    let throttled_seen: Vec<f64> = std::iter::from_fn(|| throttled_stream.try_recv().ok())
        .map(|d| d.unwrap().magnetic_heading)
        .collect();

    assert_eq!(precise_seen, vec![1.0, 3.0]);
    assert_eq!(throttled_seen, vec![1.0, 3.0]);
}

#[test]
fn test_stop_notifies_each_callback_once() {
    let provider = Arc::new(DemandProvider::default());
    let manager = HeadingManager::with_provider(ManagerConfig::default(), provider.clone());
    let request = manager.create_heading_request(None, None).unwrap();
    request.start();

    let counters: Vec<Arc<AtomicUsize>> = (0..5).map(|_| Arc::new(AtomicUsize::new(0))).collect();
    for counter in &counters {
        let counter = Arc::clone(counter);
        request.register_callback(move |data| {
            assert_eq!(data, &Err(ErrorReason::Cancelled));
            counter.fetch_add(1, Ordering::SeqCst);
        });
    }

    request.stop();
    request.stop();
    manager.dispatch(reading(1.0, 0));

    assert!(counters.iter().all(|c| c.load(Ordering::SeqCst) == 1));
    // One removal: the provider saw the set empty exactly once
    assert_eq!(provider.starts.load(Ordering::SeqCst), 1);
    assert_eq!(provider.stops.load(Ordering::SeqCst), 1);
    assert!(!manager.remove_request(&request));
}

#[test]
fn test_provider_demand_through_lifecycle() {
    init_tracing();
    let provider = Arc::new(DemandProvider::default());
    let manager = HeadingManager::with_provider(ManagerConfig::default(), provider.clone());

    let a = manager.create_heading_request(None, None).unwrap();
    let b = manager.create_heading_request(None, None).unwrap();
    a.stop();
    assert_eq!(provider.starts.load(Ordering::SeqCst), 1);
    assert_eq!(provider.stops.load(Ordering::SeqCst), 0);

    manager.dispatch_error(ErrorReason::PermissionDenied);
    assert!(b.is_expired());
    assert_eq!(provider.stops.load(Ordering::SeqCst), 1);
}

#[test]
fn test_pump_with_concurrent_control() {
    init_tracing();
    let manager = HeadingManager::default();
    let request = manager.create_heading_request(None, None).unwrap();
    let stream = request.stream(1024);
    request.start();

    let pump = manager.spawn_pump().unwrap();
    let sender = pump.sender();
    let producer = thread::spawn(move || {
        for i in 0..500 {
            if sender.send(reading(i as f64, i)).is_err() {
                break;
            }
        }
    });

    // Control calls race with delivery on the pump thread
    let controller = {
        let request = Arc::clone(&request);
        thread::spawn(move || {
            for _ in 0..50 {
                request.pause();
                request.start();
            }
            request.stop();
        })
    };

    producer.join().unwrap();
    controller.join().unwrap();
    pump.shutdown();

    let events: Vec<HeadingData> = std::iter::from_fn(|| stream.try_recv().ok()).collect();
    let cancel_at = events
        .iter()
        .position(|e| e == &Err(ErrorReason::Cancelled))
        .expect("cancel delivered");

    // Nothing after the terminal event
    assert_eq!(cancel_at, events.len() - 1);
    assert_eq!(manager.request_count(), 0);
}

#[test]
fn test_requests_across_managers_have_distinct_ids() {
    let a = HeadingManager::default();
    let b = HeadingManager::default();

    let ra = a.create_heading_request(None, None).unwrap();
    let rb = b.create_heading_request(None, None).unwrap();

    assert_ne!(ra.id(), rb.id());
    assert_ne!(*ra, *rb);
    assert!(!a.contains(rb.id()));
}
