//! # Module Event Bus
//!
//! Demultiplexes the host's single per-module event channel into typed,
//! independently subscribable event streams.
//!
//! ## Overview
//!
//! The host delivers every event of a module to one callback registered
//! through `addWebfModuleListener(moduleName, callback)`. A
//! [`ModuleEventBus`] owns that callback and fans each event out to the
//! handlers registered for its `type` tag.
//!
//! ```text
//!                      ┌──────────────────────┐
//!   host emits         │   ModuleEventBus     │   "themechange"  ┌───────────┐
//!  {type, detail} ────>│  (one host listener) ├─────────────────>│ handler A │
//!                      │                      │                  └───────────┘
//!                      │  type -> handler set │   "themechange"  ┌───────────┐
//!                      │                      ├─────────────────>│ handler B │
//!                      └──────────────────────┘                  └───────────┘
//! ```
//!
//! ## Lifecycle
//!
//! - The host listener is attached at construction and again before every
//!   [`add_listener`](ModuleEventBus::add_listener) if it is not attached yet.
//!   Attaching is idempotent.
//! - A host without `addWebfModuleListener` leaves the bus unregistered and
//!   `add_listener` returns a no-op [`Subscription`].
//! - Unsubscribing the last handler of the last event type detaches the host
//!   listener.
//! - [`dispose`](ModuleEventBus::dispose) detaches and clears every handler
//!   regardless of how many are active. The bus stays usable afterwards.
//! - The host keeps one listener per module. With
//!   [`DuplicateBusPolicy::Warn`] a second bus for the same module replaces
//!   the first one's listener; the replaced bus reports
//!   [`is_registered`](ModuleEventBus::is_registered) `false`, never detaches
//!   the newer listener, and attaches again on its next `add_listener`.
//!
//! ## Usage
//!
//! ```ignore
//! use core_bridge::events::{ModuleEventBus, ModuleEventKind, ModuleEventMap};
//!
//! pub struct Theme;
//! impl ModuleEventMap for Theme {
//!     const MODULE_NAME: &'static str = "Theme";
//! }
//!
//! pub struct ThemeChange;
//! impl ModuleEventKind<Theme> for ThemeChange {
//!     const EVENT_TYPE: &'static str = "themechange";
//!     type Payload = serde_json::Value;
//! }
//!
//! let bus = ModuleEventBus::<Theme>::new();
//! let subscription = bus.add_listener::<ThemeChange, _>(|detail| {
//!     tracing::info!(?detail, "Theme changed");
//! });
//! subscription.unsubscribe();
//! ```
//!
//! Dispatch is synchronous with the host's emission call. Handlers must not
//! block.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use bridge_traits::host::{HostLocator, HostPrimitive, ModuleEvent, ModuleHost};
use bridge_traits::platform::{ModuleListener, PlatformSendSync};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, trace, warn};

use crate::config::{BridgeConfig, DuplicateBusPolicy, HandlerPanicPolicy};

/// A module whose events can be subscribed to.
pub trait ModuleEventMap: 'static {
    /// Module name as known to the host.
    const MODULE_NAME: &'static str;
}

/// One event type of module `M` and the shape of its payload.
pub trait ModuleEventKind<M: ModuleEventMap> {
    /// Value of the event's `type` tag.
    const EVENT_TYPE: &'static str;

    type Payload: DeserializeOwned;

    /// What to do with an event that arrives without a `detail`.
    const MISSING_PAYLOAD: MissingPayload = MissingPayload::Error;
}

/// Handling of events whose `detail` is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingPayload {
    /// Log at `error` level and skip the handlers.
    Error,
    /// Skip the handlers without logging.
    Ignore,
    /// Deliver `null` decoded as the payload type (e.g. `Option<T>` or `()`).
    Deliver,
}

#[cfg(not(target_arch = "wasm32"))]
type RawHandler = Arc<dyn Fn(Option<&Value>) + Send + Sync>;

#[cfg(target_arch = "wasm32")]
type RawHandler = Arc<dyn Fn(Option<&Value>)>;

static NEXT_BUS_ID: AtomicU64 = AtomicU64::new(1);

// (host, module name) -> id of the bus whose listener that host currently holds.
static MODULE_CLAIMS: Lazy<Mutex<HashMap<ClaimKey, u64>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

type ClaimKey = (usize, &'static str);

fn host_key(host: &Arc<dyn ModuleHost>) -> usize {
    Arc::as_ptr(host) as *const () as usize
}

#[derive(Default)]
struct BusState {
    handlers: HashMap<&'static str, BTreeMap<u64, RawHandler>>,
    /// Host this bus attached its listener to.
    attached_to: Option<usize>,
    next_handler_id: u64,
}

struct BusInner {
    module_name: &'static str,
    bus_id: u64,
    locator: Arc<dyn HostLocator>,
    panic_policy: HandlerPanicPolicy,
    duplicate_policy: DuplicateBusPolicy,
    state: Mutex<BusState>,
}

impl BusInner {
    fn state(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_registered(self: &Arc<Self>) -> bool {
        let mut state = self.state();

        let host = self
            .locator
            .locate_host()
            .filter(|host| host.supports(HostPrimitive::AddModuleListener));
        let Some(host) = host else {
            debug!(
                module = self.module_name,
                "Host does not expose {}, event bus stays unregistered",
                HostPrimitive::AddModuleListener
            );
            // The host went away and took its listener with it.
            self.forget_attachment(&mut state);
            return false;
        };

        let key = host_key(&host);
        match state.attached_to {
            Some(attached) if attached == key && self.owns_claim(key) => return true,
            Some(attached) if attached == key => debug!(
                module = self.module_name,
                bus_id = self.bus_id,
                "Host listener was replaced by another bus, attaching again"
            ),
            Some(_) => debug!(
                module = self.module_name,
                bus_id = self.bus_id,
                "Module host changed, attaching to the new one"
            ),
            None => {}
        }
        self.forget_attachment(&mut state);

        if !self.claim_module(key) {
            return false;
        }

        let weak = Arc::downgrade(self);
        let listener: ModuleListener = Arc::new(move |event: ModuleEvent| {
            if let Some(inner) = weak.upgrade() {
                inner.dispatch(event);
            }
        });

        match host.add_module_listener(self.module_name, listener) {
            Ok(()) => {
                debug!(module = self.module_name, bus_id = self.bus_id, "Attached module listener");
                state.attached_to = Some(key);
                true
            }
            Err(err) => {
                warn!(module = self.module_name, error = %err, "Failed to attach module listener");
                self.release_claim(key);
                false
            }
        }
    }

    fn claim_module(&self, host: usize) -> bool {
        let mut claims = MODULE_CLAIMS.lock().unwrap_or_else(PoisonError::into_inner);
        match claims.get(&(host, self.module_name)) {
            Some(&owner) if owner != self.bus_id => match self.duplicate_policy {
                DuplicateBusPolicy::Warn => {
                    warn!(
                        module = self.module_name,
                        previous_bus = owner,
                        bus_id = self.bus_id,
                        "Another event bus already listens to this module, replacing its listener"
                    );
                    claims.insert((host, self.module_name), self.bus_id);
                    true
                }
                DuplicateBusPolicy::Reject => {
                    error!(
                        module = self.module_name,
                        owner,
                        bus_id = self.bus_id,
                        "Another event bus already listens to this module, refusing to attach"
                    );
                    false
                }
            },
            _ => {
                claims.insert((host, self.module_name), self.bus_id);
                true
            }
        }
    }

    /// Whether `host` currently holds this bus's listener.
    fn owns_claim(&self, host: usize) -> bool {
        let claims = MODULE_CLAIMS.lock().unwrap_or_else(PoisonError::into_inner);
        claims.get(&(host, self.module_name)) == Some(&self.bus_id)
    }

    fn release_claim(&self, host: usize) {
        let mut claims = MODULE_CLAIMS.lock().unwrap_or_else(PoisonError::into_inner);
        if claims.get(&(host, self.module_name)) == Some(&self.bus_id) {
            claims.remove(&(host, self.module_name));
        }
    }

    /// Drop the attachment record without calling the host.
    fn forget_attachment(&self, state: &mut BusState) {
        if let Some(attached) = state.attached_to.take() {
            self.release_claim(attached);
        }
    }

    fn is_attached(&self, state: &BusState) -> bool {
        state
            .attached_to
            .is_some_and(|attached| self.owns_claim(attached))
    }

    /// Detach the host listener. Caller holds the state lock.
    fn detach(&self, state: &mut BusState) {
        let Some(attached) = state.attached_to.take() else {
            return;
        };

        // A newer bus owns the host listener now; leave it in place.
        if !self.owns_claim(attached) {
            debug!(
                module = self.module_name,
                bus_id = self.bus_id,
                "Host listener belongs to another bus, skipping detach"
            );
            return;
        }

        match self.locator.locate_host() {
            Some(host)
                if host_key(&host) == attached
                    && host.supports(HostPrimitive::RemoveModuleListener) =>
            {
                if let Err(err) = host.remove_module_listener(self.module_name) {
                    warn!(module = self.module_name, error = %err, "Failed to detach module listener");
                } else {
                    debug!(module = self.module_name, bus_id = self.bus_id, "Detached module listener");
                }
            }
            _ => debug!(module = self.module_name, "Host gone, nothing to detach"),
        }

        self.release_claim(attached);
    }

    fn insert_handler(&self, event_type: &'static str, handler: RawHandler) -> u64 {
        let mut state = self.state();
        state.next_handler_id += 1;
        let id = state.next_handler_id;
        state
            .handlers
            .entry(event_type)
            .or_default()
            .insert(id, handler);
        id
    }

    fn remove_handler(&self, event_type: &'static str, id: u64) {
        let mut state = self.state();
        let Some(set) = state.handlers.get_mut(event_type) else {
            return;
        };
        if set.remove(&id).is_none() {
            return;
        }
        if set.is_empty() {
            state.handlers.remove(event_type);
        }
        if state.handlers.is_empty() {
            self.detach(&mut state);
        }
    }

    fn dispatch(&self, event: ModuleEvent) {
        let Some(event_type) = event.event_type.as_deref() else {
            trace!(module = self.module_name, "Module event without type, ignoring");
            return;
        };

        let handlers: Vec<RawHandler> = self
            .state()
            .handlers
            .get(event_type)
            .map(|set| set.values().cloned().collect())
            .unwrap_or_default();

        trace!(
            module = self.module_name,
            event_type,
            handlers = handlers.len(),
            "Dispatching module event"
        );

        for handler in handlers {
            match self.panic_policy {
                HandlerPanicPolicy::Propagate => handler(event.detail.as_ref()),
                HandlerPanicPolicy::CatchAndLog => {
                    let outcome = catch_unwind(AssertUnwindSafe(|| handler(event.detail.as_ref())));
                    if let Err(panic) = outcome {
                        error!(
                            module = self.module_name,
                            event_type,
                            panic = panic_message(panic.as_ref()),
                            "Event handler panicked"
                        );
                    }
                }
            }
        }
    }
}

impl Drop for BusInner {
    fn drop(&mut self) {
        let attached = self
            .state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .attached_to
            .take();
        if let Some(attached) = attached {
            self.release_claim(attached);
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

fn decode_payload<M: ModuleEventMap, K: ModuleEventKind<M>>(
    detail: Option<&Value>,
) -> Option<K::Payload> {
    let decoded: Result<K::Payload, serde_json::Error> = match detail {
        Some(detail) => serde_json::from_value(detail.clone()),
        None => match K::MISSING_PAYLOAD {
            MissingPayload::Ignore => return None,
            MissingPayload::Error => {
                error!(
                    module = M::MODULE_NAME,
                    event_type = K::EVENT_TYPE,
                    "Module event arrived without payload"
                );
                return None;
            }
            MissingPayload::Deliver => serde_json::from_value(Value::Null),
        },
    };

    match decoded {
        Ok(payload) => Some(payload),
        Err(err) => {
            error!(
                module = M::MODULE_NAME,
                event_type = K::EVENT_TYPE,
                error = %err,
                "Module event payload has an unexpected shape"
            );
            None
        }
    }
}

/// Per-module event bus.
///
/// Cheap to clone; clones share the same host listener and handlers.
pub struct ModuleEventBus<M: ModuleEventMap> {
    inner: Arc<BusInner>,
    _module: PhantomData<fn() -> M>,
}

impl<M: ModuleEventMap> Clone for ModuleEventBus<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _module: PhantomData,
        }
    }
}

impl<M: ModuleEventMap> fmt::Debug for ModuleEventBus<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state();
        f.debug_struct("ModuleEventBus")
            .field("module_name", &self.inner.module_name)
            .field("bus_id", &self.inner.bus_id)
            .field("listener_registered", &self.inner.is_attached(&state))
            .field("event_types", &state.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<M: ModuleEventMap> Default for ModuleEventBus<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: ModuleEventMap> ModuleEventBus<M> {
    /// Create a bus using the default configuration.
    pub fn new() -> Self {
        Self::with_config(&BridgeConfig::default())
    }

    pub fn with_locator(locator: Arc<dyn HostLocator>) -> Self {
        Self::with_config(&BridgeConfig {
            host_locator: locator,
            ..BridgeConfig::default()
        })
    }

    pub fn with_config(config: &BridgeConfig) -> Self {
        let inner = Arc::new(BusInner {
            module_name: M::MODULE_NAME,
            bus_id: NEXT_BUS_ID.fetch_add(1, Ordering::Relaxed),
            locator: Arc::clone(&config.host_locator),
            panic_policy: config.handler_panic_policy,
            duplicate_policy: config.duplicate_bus_policy,
            state: Mutex::new(BusState::default()),
        });
        inner.ensure_registered();

        Self {
            inner,
            _module: PhantomData,
        }
    }

    pub fn module_name(&self) -> &'static str {
        M::MODULE_NAME
    }

    /// Whether the host listener is currently attached.
    ///
    /// A bus whose listener was replaced by a newer bus for the same module
    /// reports `false` until it attaches again.
    pub fn is_registered(&self) -> bool {
        let state = self.inner.state();
        self.inner.is_attached(&state)
    }

    /// Total number of handlers across all event types.
    pub fn handler_count(&self) -> usize {
        self.inner.state().handlers.values().map(BTreeMap::len).sum()
    }

    pub fn handler_count_for<K: ModuleEventKind<M>>(&self) -> usize {
        self.inner
            .state()
            .handlers
            .get(K::EVENT_TYPE)
            .map_or(0, BTreeMap::len)
    }

    /// Subscribe `handler` to events of kind `K`.
    ///
    /// Returns a no-op subscription when the host cannot deliver module
    /// events. That is not an error: the runtime may simply not support
    /// them.
    pub fn add_listener<K, F>(&self, handler: F) -> Subscription
    where
        K: ModuleEventKind<M> + 'static,
        F: Fn(K::Payload) + PlatformSendSync + 'static,
    {
        if !self.inner.ensure_registered() {
            return Subscription::noop();
        }

        let raw: RawHandler = Arc::new(move |detail: Option<&Value>| {
            if let Some(payload) = decode_payload::<M, K>(detail) {
                handler(payload);
            }
        });
        let id = self.inner.insert_handler(K::EVENT_TYPE, raw);
        trace!(module = M::MODULE_NAME, event_type = K::EVENT_TYPE, id, "Added event handler");

        Subscription {
            target: Some((Arc::downgrade(&self.inner), K::EVENT_TYPE, id)),
        }
    }

    /// Detach the host listener and drop every handler.
    pub fn dispose(&self) {
        let mut state = self.inner.state();
        self.inner.detach(&mut state);
        state.handlers.clear();
        debug!(module = M::MODULE_NAME, "Disposed event bus");
    }

    /// Wrap this bus so that it is disposed when the returned guard drops.
    pub fn scoped(self) -> ScopedEventBus<M> {
        ScopedEventBus { bus: self }
    }
}

/// Handle returned by [`ModuleEventBus::add_listener`].
///
/// Dropping it does not unsubscribe; use [`into_guard`](Self::into_guard)
/// for that.
#[derive(Clone)]
pub struct Subscription {
    target: Option<(Weak<BusInner>, &'static str, u64)>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            Some((_, event_type, id)) => f
                .debug_struct("Subscription")
                .field("event_type", event_type)
                .field("id", id)
                .finish(),
            None => f.write_str("Subscription(noop)"),
        }
    }
}

impl Subscription {
    /// A subscription that does nothing when unsubscribed.
    pub fn noop() -> Self {
        Self { target: None }
    }

    pub fn is_noop(&self) -> bool {
        self.target.is_none()
    }

    /// Remove the handler. Calling this more than once is harmless.
    pub fn unsubscribe(&self) {
        if let Some((bus, event_type, id)) = &self.target {
            if let Some(inner) = bus.upgrade() {
                inner.remove_handler(event_type, *id);
            }
        }
    }

    /// Unsubscribe automatically when the returned guard drops.
    pub fn into_guard(self) -> SubscriptionGuard {
        SubscriptionGuard { subscription: self }
    }
}

/// Unsubscribes on drop.
#[derive(Debug)]
pub struct SubscriptionGuard {
    subscription: Subscription,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.subscription.unsubscribe();
    }
}

/// Event bus that is disposed when dropped.
///
/// ```ignore
/// {
///     let bus = ModuleEventBus::<Ble>::new().scoped();
///     bus.add_listener::<ConnectionStateChanged, _>(|state| { /* ... */ });
///     // ...
/// } // host listener detached here
/// ```
#[derive(Debug)]
pub struct ScopedEventBus<M: ModuleEventMap> {
    bus: ModuleEventBus<M>,
}

impl<M: ModuleEventMap> Deref for ScopedEventBus<M> {
    type Target = ModuleEventBus<M>;

    fn deref(&self) -> &Self::Target {
        &self.bus
    }
}

impl<M: ModuleEventMap> Drop for ScopedEventBus<M> {
    fn drop(&mut self) {
        self.bus.dispose();
    }
}

/// Declare an accessor returning the process-wide bus of a module.
///
/// ```ignore
/// core_bridge::shared_event_bus!(pub fn theme_events() -> Theme);
/// theme_events().add_listener::<ThemeChange, _>(|_| {});
/// ```
#[macro_export]
macro_rules! shared_event_bus {
    ($(#[$meta:meta])* $vis:vis fn $name:ident() -> $map:ty) => {
        $(#[$meta])*
        #[cfg(not(target_arch = "wasm32"))]
        $vis fn $name() -> $crate::events::ModuleEventBus<$map> {
            static BUS: $crate::__private::Lazy<$crate::events::ModuleEventBus<$map>> =
                $crate::__private::Lazy::new($crate::events::ModuleEventBus::new);
            ::std::clone::Clone::clone(&*BUS)
        }

        $(#[$meta])*
        #[cfg(target_arch = "wasm32")]
        $vis fn $name() -> $crate::events::ModuleEventBus<$map> {
            ::std::thread_local! {
                static BUS: $crate::events::ModuleEventBus<$map> = $crate::events::ModuleEventBus::new();
            }
            BUS.with(::std::clone::Clone::clone)
        }
    };
}
