//! End-to-end event bus behavior against the in-process host.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bridge_desktop::InProcessHost;
use bridge_traits::StaticHostLocator;
use core_bridge::{
    BridgeConfig, DuplicateBusPolicy, HandlerPanicPolicy, ModuleEventBus, ModuleEventKind,
    ModuleEventMap,
};
use serde::Deserialize;
use serde_json::json;

struct Radio;
impl ModuleEventMap for Radio {
    const MODULE_NAME: &'static str = "Radio";
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
struct Station {
    frequency: f32,
}

struct Tuned;
impl ModuleEventKind<Radio> for Tuned {
    const EVENT_TYPE: &'static str = "tuned";
    type Payload = Station;
}

struct Muted;
impl ModuleEventKind<Radio> for Muted {
    const EVENT_TYPE: &'static str = "muted";
    type Payload = bool;
}

fn radio_bus() -> (Arc<InProcessHost>, ModuleEventBus<Radio>) {
    let host = Arc::new(InProcessHost::new());
    let bus = ModuleEventBus::with_locator(Arc::new(StaticHostLocator::new(host.clone())));
    (host, bus)
}

#[test]
fn test_fan_out_and_selective_unsubscribe() {
    let (host, bus) = radio_bus();
    let seen_a = Arc::new(Mutex::new(Vec::new()));
    let seen_b = Arc::new(Mutex::new(Vec::new()));

    let sink_a = Arc::clone(&seen_a);
    let a = bus.add_listener::<Tuned, _>(move |station| sink_a.lock().unwrap().push(station));
    let sink_b = Arc::clone(&seen_b);
    bus.add_listener::<Tuned, _>(move |station| sink_b.lock().unwrap().push(station));

    host.emit("Radio", "tuned", json!({ "frequency": 101.5 }));
    a.unsubscribe();
    host.emit("Radio", "tuned", json!({ "frequency": 98.0 }));

    assert_eq!(*seen_a.lock().unwrap(), vec![Station { frequency: 101.5 }]);
    assert_eq!(
        *seen_b.lock().unwrap(),
        vec![Station { frequency: 101.5 }, Station { frequency: 98.0 }]
    );
    assert!(bus.is_registered());
}

#[test]
fn test_host_listener_tracks_active_subscriptions() {
    let (host, bus) = radio_bus();
    assert_eq!(host.listener_activity("Radio").added, 1);

    let tuned = bus.add_listener::<Tuned, _>(|_| {});
    let muted = bus.add_listener::<Muted, _>(|_| {});

    tuned.unsubscribe();
    assert!(host.has_listener("Radio"));
    muted.unsubscribe();
    assert!(!host.has_listener("Radio"));
    assert_eq!(host.listener_activity("Radio").removed, 1);

    bus.add_listener::<Muted, _>(|_| {});
    assert!(host.has_listener("Radio"));
    assert_eq!(host.listener_activity("Radio").added, 2);
}

#[test]
fn test_dispose_with_active_subscribers() {
    let (host, bus) = radio_bus();
    let hits = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&hits);
    bus.add_listener::<Tuned, _>(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let counter = Arc::clone(&hits);
    bus.add_listener::<Muted, _>(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    bus.dispose();
    assert_eq!(bus.handler_count(), 0);
    assert!(!host.has_listener("Radio"));
    host.emit("Radio", "tuned", json!({ "frequency": 90.0 }));
    host.emit("Radio", "muted", json!(true));
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    // disposing twice is harmless and does not detach again
    bus.dispose();
    assert_eq!(host.listener_activity("Radio").removed, 1);
}

#[test]
fn test_propagate_policy_lets_panics_through() {
    let host = Arc::new(InProcessHost::new());
    let config = BridgeConfig::builder()
        .host_locator(Arc::new(StaticHostLocator::new(host.clone())))
        .handler_panic_policy(HandlerPanicPolicy::Propagate)
        .build()
        .unwrap();
    let bus = ModuleEventBus::<Radio>::with_config(&config);

    bus.add_listener::<Muted, _>(|_| panic!("boom"));

    let outcome = catch_unwind(AssertUnwindSafe(|| host.emit("Radio", "muted", json!(true))));
    assert!(outcome.is_err());
    // the bus keeps working after the panic
    assert!(bus.is_registered());
    assert_eq!(bus.handler_count_for::<Muted>(), 1);
}

struct Exclusive;
impl ModuleEventMap for Exclusive {
    const MODULE_NAME: &'static str = "ExclusiveRadio";
}

struct Pulse;
impl ModuleEventKind<Exclusive> for Pulse {
    const EVENT_TYPE: &'static str = "pulse";
    type Payload = u32;
}

#[test]
fn test_reject_policy_keeps_first_bus_attached() {
    let host = Arc::new(InProcessHost::new());
    let config = BridgeConfig::builder()
        .host_locator(Arc::new(StaticHostLocator::new(host.clone())))
        .duplicate_bus_policy(DuplicateBusPolicy::Reject)
        .build()
        .unwrap();

    let first = ModuleEventBus::<Exclusive>::with_config(&config);
    let second = ModuleEventBus::<Exclusive>::with_config(&config);

    assert!(first.is_registered());
    assert!(!second.is_registered());
    assert!(second.add_listener::<Pulse, _>(|_| {}).is_noop());
    assert_eq!(host.listener_activity("ExclusiveRadio").added, 1);

    // once the first bus lets go, the second may attach
    first.dispose();
    assert!(!second.add_listener::<Pulse, _>(|_| {}).is_noop());
    assert!(second.is_registered());
    second.dispose();
}

#[test]
fn test_warn_policy_last_registration_wins() {
    let host = Arc::new(InProcessHost::new());
    let locator = Arc::new(StaticHostLocator::new(host.clone()));

    let older = ModuleEventBus::<Radio>::with_locator(locator.clone());
    let newer = ModuleEventBus::<Radio>::with_locator(locator);
    assert!(!older.is_registered());
    assert!(newer.is_registered());
    assert_eq!(host.listener_activity("Radio").added, 2);

    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    newer.add_listener::<Muted, _>(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    // the replaced bus must not take the newer listener down with it
    older.dispose();
    assert!(newer.is_registered());
    assert!(host.has_listener("Radio"));
    assert_eq!(host.listener_activity("Radio").removed, 0);

    newer.add_listener::<Muted, _>(|_| {});
    host.emit("Radio", "muted", json!(true));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(host.listener_activity("Radio").added, 2);

    newer.dispose();
    assert!(!host.has_listener("Radio"));
}

#[test]
fn test_replaced_bus_attaches_again_on_add_listener() {
    let host = Arc::new(InProcessHost::new());
    let locator = Arc::new(StaticHostLocator::new(host.clone()));

    let first = ModuleEventBus::<Radio>::with_locator(locator.clone());
    let second = ModuleEventBus::<Radio>::with_locator(locator);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    second.add_listener::<Tuned, _>(move |station| sink.lock().unwrap().push(("second", station)));

    let sink = Arc::clone(&seen);
    first.add_listener::<Tuned, _>(move |station| sink.lock().unwrap().push(("first", station)));
    assert!(first.is_registered());
    assert!(!second.is_registered());

    host.emit("Radio", "tuned", json!({ "frequency": 88.1 }));
    assert_eq!(
        *seen.lock().unwrap(),
        vec![("first", Station { frequency: 88.1 })]
    );

    // the last handler of the replaced bus goes away without detaching
    second.dispose();
    assert!(host.has_listener("Radio"));
    first.dispose();
}
