//! ClientEventManager.
//!
//! The manager is responsible for:
//! - Validating events at the untrusted boundary (`log_raw_event`)
//! - Holding the ordered filterer and listener registries
//! - Gating every dispatch on the readiness gate
//! - Fanning each accepted event out exactly once per consumer, isolating
//!   consumer failures from each other and from the producer
//!
//! Each accepted event is dispatched by its own tokio task. Within one event
//! filterers run before listeners, both in registration order. There is no
//! ordering between events.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::ready::ReadyGate;
use super::types::{
    AdditionalParameters, AnalyticsEvent, ClientEvent, EventOriginator, EventParams,
    EventValidationError, FilterResult,
};

/// A registered event consumer. Returning `Err` (or panicking) is logged and
/// does not affect other listeners.
pub type EventListener =
    Arc<dyn Fn(&ClientEvent, Option<&EventParams>) -> anyhow::Result<()> + Send + Sync>;

/// A registered veto point. Returning `Err` (or panicking) counts as
/// [`FilterResult::ProcessEvent`].
pub type EventFilterer = Arc<dyn Fn(&ClientEvent) -> anyhow::Result<FilterResult> + Send + Sync>;

/// In-process publish/subscribe hub for analytics events.
///
/// Cloning is cheap; clones share registries and the readiness gate.
#[derive(Clone)]
pub struct ClientEventManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    filterers: RwLock<Vec<EventFilterer>>,
    listeners: RwLock<Vec<EventListener>>,
    ready: ReadyGate,
    runtime: Option<Handle>,
    last_dispatch: Mutex<Option<JoinHandle<()>>>,
}

impl ClientEventManager {
    /// Create a manager whose dispatches wait for `ready`.
    ///
    /// Dispatch tasks run on the runtime current at construction, or on the
    /// caller's runtime when the manager was built outside of one.
    pub fn new(ready: ReadyGate) -> Self {
        Self::build(ready, Handle::try_current().ok())
    }

    /// Create a manager that dispatches on `runtime`.
    pub fn with_runtime(ready: ReadyGate, runtime: Handle) -> Self {
        Self::build(ready, Some(runtime))
    }

    fn build(ready: ReadyGate, runtime: Option<Handle>) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                filterers: RwLock::new(Vec::new()),
                listeners: RwLock::new(Vec::new()),
                ready,
                runtime,
                last_dispatch: Mutex::new(None),
            }),
        }
    }

    /// Append a listener. It receives every event dispatched after this call
    /// that no filterer cancels.
    pub fn register_event_listener<F>(&self, listener: F)
    where
        F: Fn(&ClientEvent, Option<&EventParams>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        write(&self.inner.listeners).push(Arc::new(listener));
    }

    /// Append a filterer. Filterers see only the event, not its parameters.
    pub fn register_event_filterer<F>(&self, filterer: F)
    where
        F: Fn(&ClientEvent) -> anyhow::Result<FilterResult> + Send + Sync + 'static,
    {
        write(&self.inner.filterers).push(Arc::new(filterer));
    }

    /// Schedule dispatch of `event`.
    ///
    /// Returns immediately. Without a runtime to dispatch on, the event is
    /// dropped with a warning.
    pub fn log_event(&self, event: ClientEvent, params: Option<EventParams>) {
        let Some(runtime) = self
            .inner
            .runtime
            .clone()
            .or_else(|| Handle::try_current().ok())
        else {
            warn!(
                event_type = %event.event_type,
                "No tokio runtime available, dropping event"
            );
            return;
        };
        debug!(
            event_type = %event.event_type,
            originator = %event.event_originator,
            "Scheduling event dispatch"
        );
        let inner = Arc::clone(&self.inner);
        let handle = runtime.spawn(async move { inner.dispatch(event, params).await });
        *lock(&self.inner.last_dispatch) = Some(handle);
    }

    /// Validate an event from an untrusted producer and schedule it.
    ///
    /// Validation failures are returned before anything is scheduled.
    pub fn log_raw_event(
        &self,
        raw: &Value,
        params: Option<EventParams>,
    ) -> Result<(), EventValidationError> {
        let event = ClientEvent::from_json(raw)?;
        self.log_event(event, params);
        Ok(())
    }

    /// Log an event produced by the subscriptions runtime itself.
    pub fn log_swg_event(
        &self,
        event_type: AnalyticsEvent,
        is_from_user_action: Option<bool>,
        event_params: Option<EventParams>,
    ) {
        let mut event = ClientEvent::new(event_type, EventOriginator::SwgClient)
            .with_user_action(is_from_user_action);
        event.additional_parameters = event_params.map(AdditionalParameters::Internal);
        self.log_event(event, None);
    }

    /// The readiness gate every dispatch waits on.
    pub fn ready(&self) -> ReadyGate {
        self.inner.ready.clone()
    }

    /// Whether the event came from a publisher-side client.
    pub fn is_publisher_event(event: &ClientEvent) -> bool {
        matches!(
            event.event_originator,
            EventOriginator::PropensityClient
                | EventOriginator::PublisherClient
                | EventOriginator::AmpClient
        )
    }

    /// Wait for the most recently scheduled dispatch to finish.
    ///
    /// Only the latest dispatch is tracked; earlier ones may still be running.
    pub async fn last_dispatch(&self) {
        let handle = lock(&self.inner.last_dispatch).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Dispatch task did not complete");
            }
        }
    }
}

impl ManagerInner {
    async fn dispatch(&self, event: ClientEvent, params: Option<EventParams>) {
        if let Err(e) = self.ready.wait().await {
            warn!(event_type = %event.event_type, error = %e, "Dropping event");
            return;
        }

        // Consumers registered after this point do not see the event.
        let filterers = read(&self.filterers).clone();
        let listeners = read(&self.listeners).clone();

        for (index, filterer) in filterers.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| filterer(&event))) {
                Ok(Ok(FilterResult::ProcessEvent)) => {}
                Ok(Ok(FilterResult::CancelEvent)) => {
                    debug!(
                        event_type = %event.event_type,
                        filterer = index,
                        "Event cancelled by filterer"
                    );
                    return;
                }
                Ok(Err(e)) => {
                    error!(event_type = %event.event_type, filterer = index, error = %e, "Event filterer failed");
                }
                Err(panic) => {
                    error!(
                        event_type = %event.event_type,
                        filterer = index,
                        panic = panic_message(panic.as_ref()),
                        "Event filterer panicked"
                    );
                }
            }
        }

        for (index, listener) in listeners.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| listener(&event, params.as_ref()))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(event_type = %event.event_type, listener = index, error = %e, "Event listener failed");
                }
                Err(panic) => {
                    error!(
                        event_type = %event.event_type,
                        listener = index,
                        panic = panic_message(panic.as_ref()),
                        "Event listener panicked"
                    );
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::events::ready::ready_gate;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::mpsc;

    type Log = Arc<Mutex<Vec<String>>>;

    fn new_log() -> Log {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    fn recording_listener(
        log: &Log,
        name: &'static str,
    ) -> impl Fn(&ClientEvent, Option<&EventParams>) -> anyhow::Result<()> + Send + Sync + 'static
    {
        let log = Arc::clone(log);
        move |event: &ClientEvent, _: Option<&EventParams>| {
            log.lock()
                .unwrap()
                .push(format!("{name}:{}", event.event_type));
            Ok(())
        }
    }

    fn recording_filterer(
        log: &Log,
        name: &'static str,
        verdict: FilterResult,
    ) -> impl Fn(&ClientEvent) -> anyhow::Result<FilterResult> + Send + Sync + 'static {
        let log = Arc::clone(log);
        move |event: &ClientEvent| {
            log.lock()
                .unwrap()
                .push(format!("{name}:{}", event.event_type));
            Ok(verdict)
        }
    }

    fn paywall_event() -> ClientEvent {
        ClientEvent::new(
            AnalyticsEvent::ImpressionPaywall,
            EventOriginator::PublisherClient,
        )
    }

    #[tokio::test]
    async fn test_filterers_then_listeners_in_registration_order() {
        let manager = ClientEventManager::new(ReadyGate::resolved());
        let log = new_log();
        manager.register_event_listener(recording_listener(&log, "l1"));
        manager.register_event_filterer(recording_filterer(&log, "f1", FilterResult::ProcessEvent));
        manager.register_event_listener(recording_listener(&log, "l2"));
        manager.register_event_filterer(recording_filterer(&log, "f2", FilterResult::ProcessEvent));

        manager.log_event(paywall_event(), None);
        manager.last_dispatch().await;

        assert_eq!(
            entries(&log),
            vec![
                "f1:IMPRESSION_PAYWALL",
                "f2:IMPRESSION_PAYWALL",
                "l1:IMPRESSION_PAYWALL",
                "l2:IMPRESSION_PAYWALL",
            ]
        );
    }

    #[tokio::test]
    async fn test_cancel_stops_remaining_filterers_and_all_listeners() {
        let manager = ClientEventManager::new(ReadyGate::resolved());
        let log = new_log();
        manager.register_event_listener(recording_listener(&log, "before"));
        manager.register_event_filterer(recording_filterer(&log, "f1", FilterResult::CancelEvent));
        manager.register_event_filterer(recording_filterer(&log, "f2", FilterResult::ProcessEvent));
        manager.register_event_listener(recording_listener(&log, "after"));

        manager.log_event(paywall_event(), None);
        manager.last_dispatch().await;

        assert_eq!(entries(&log), vec!["f1:IMPRESSION_PAYWALL"]);
    }

    #[tokio::test]
    async fn test_failing_filterer_counts_as_proceed() {
        let manager = ClientEventManager::new(ReadyGate::resolved());
        let log = new_log();
        manager.register_event_filterer(|_| Err(anyhow::anyhow!("filter exploded")));
        manager.register_event_filterer(|_| panic!("filter panicked"));
        manager.register_event_listener(recording_listener(&log, "l1"));

        manager.log_event(paywall_event(), None);
        manager.last_dispatch().await;

        assert_eq!(entries(&log), vec!["l1:IMPRESSION_PAYWALL"]);
    }

    #[tokio::test]
    async fn test_failing_listener_does_not_block_siblings() {
        let manager = ClientEventManager::new(ReadyGate::resolved());
        let log = new_log();
        manager.register_event_listener(recording_listener(&log, "l1"));
        manager.register_event_listener(|_, _| Err(anyhow::anyhow!("listener exploded")));
        manager.register_event_listener(recording_listener(&log, "l3"));
        manager.register_event_listener(|_, _| panic!("listener panicked"));
        manager.register_event_listener(recording_listener(&log, "l5"));

        manager.log_event(paywall_event(), None);
        manager.last_dispatch().await;

        assert_eq!(
            entries(&log),
            vec![
                "l1:IMPRESSION_PAYWALL",
                "l3:IMPRESSION_PAYWALL",
                "l5:IMPRESSION_PAYWALL",
            ]
        );
    }

    #[tokio::test]
    async fn test_invalid_raw_event_is_rejected_before_dispatch() {
        let manager = ClientEventManager::new(ReadyGate::resolved());
        let log = new_log();
        manager.register_event_filterer(recording_filterer(&log, "f1", FilterResult::ProcessEvent));
        manager.register_event_listener(recording_listener(&log, "l1"));

        let invalid = [
            json!({"eventType": 123456, "eventOriginator": 1}),
            json!({"eventType": 1, "eventOriginator": 42}),
            json!({"eventType": 1, "eventOriginator": 1, "additionalParameters": 7}),
            json!({"eventType": 1, "eventOriginator": 1, "isFromUserAction": "true"}),
        ];
        for raw in &invalid {
            assert!(manager.log_raw_event(raw, None).is_err(), "accepted {raw}");
        }
        manager.last_dispatch().await;
        tokio::task::yield_now().await;

        assert!(entries(&log).is_empty());

        manager
            .log_raw_event(&json!({"eventType": 3000, "eventOriginator": 5}), None)
            .unwrap();
        manager.last_dispatch().await;
        assert_eq!(entries(&log), vec!["f1:EVENT_CUSTOM", "l1:EVENT_CUSTOM"]);
    }

    #[tokio::test]
    async fn test_dispatch_waits_for_readiness() {
        let (trigger, gate) = ready_gate();
        let manager = ClientEventManager::new(gate);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let first_tx = tx.clone();
        manager.register_event_listener(move |event, _| {
            first_tx.send(("first", event.event_type))?;
            Ok(())
        });

        manager.log_event(paywall_event(), None);
        manager.log_swg_event(AnalyticsEvent::ImpressionOffers, Some(true), None);

        // Registered while both events are parked on the gate.
        manager.register_event_listener(move |event, _| {
            tx.send(("late", event.event_type))?;
            Ok(())
        });

        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
        assert!(!manager.ready().is_ready());

        trigger.resolve();

        let mut received = Vec::new();
        for _ in 0..4 {
            let item = tokio::time::timeout(Duration::from_secs(1), rx.recv())
                .await
                .unwrap()
                .unwrap();
            received.push(item);
        }
        received.sort_by_key(|(name, event)| (event.code(), *name));
        assert_eq!(
            received,
            vec![
                ("first", AnalyticsEvent::ImpressionPaywall),
                ("late", AnalyticsEvent::ImpressionPaywall),
                ("first", AnalyticsEvent::ImpressionOffers),
                ("late", AnalyticsEvent::ImpressionOffers),
            ]
        );
    }

    #[tokio::test]
    async fn test_closed_gate_drops_events() {
        let (trigger, gate) = ready_gate();
        let manager = ClientEventManager::new(gate);
        let log = new_log();
        manager.register_event_listener(recording_listener(&log, "l1"));

        manager.log_event(paywall_event(), None);
        drop(trigger);
        manager.last_dispatch().await;

        assert!(entries(&log).is_empty());
    }

    #[tokio::test]
    async fn test_log_swg_event_wraps_internal_params() {
        let manager = ClientEventManager::new(ReadyGate::resolved());
        let captured: Arc<Mutex<Option<ClientEvent>>> = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&captured);
        manager.register_event_listener(move |event, params| {
            assert!(params.is_none());
            *sink.lock().unwrap() = Some(event.clone());
            Ok(())
        });

        let params = EventParams {
            sku: Some("basic_monthly".to_string()),
            ..EventParams::default()
        };
        manager.log_swg_event(AnalyticsEvent::ActionOfferSelected, Some(true), Some(params.clone()));
        manager.last_dispatch().await;

        let event = captured.lock().unwrap().clone().unwrap();
        assert_eq!(event.event_originator, EventOriginator::SwgClient);
        assert_eq!(event.event_type, AnalyticsEvent::ActionOfferSelected);
        assert_eq!(event.is_from_user_action, Some(true));
        assert_eq!(
            event.additional_parameters,
            Some(AdditionalParameters::Internal(params))
        );
    }

    #[tokio::test]
    async fn test_listener_receives_dispatch_params() {
        let manager = ClientEventManager::new(ReadyGate::resolved());
        let seen = new_log();
        let sink = Arc::clone(&seen);
        manager.register_event_listener(move |_, params| {
            let sku = params.and_then(|p| p.sku.clone()).unwrap_or_default();
            sink.lock().unwrap().push(sku);
            Ok(())
        });

        let params = EventParams {
            sku: Some("premium".to_string()),
            ..EventParams::default()
        };
        manager.log_event(paywall_event(), Some(params));
        manager.last_dispatch().await;

        assert_eq!(entries(&seen), vec!["premium"]);
    }

    #[test]
    fn test_is_publisher_event() {
        for originator in EventOriginator::ALL {
            let event = ClientEvent::new(AnalyticsEvent::ImpressionAd, originator);
            let expected = matches!(
                originator,
                EventOriginator::PropensityClient
                    | EventOriginator::PublisherClient
                    | EventOriginator::AmpClient
            );
            assert_eq!(
                ClientEventManager::is_publisher_event(&event),
                expected,
                "{originator}"
            );
        }
    }

    #[test]
    fn test_logging_without_runtime_drops_event() {
        let log = new_log();
        let manager = ClientEventManager::new(ReadyGate::resolved());
        manager.register_event_listener(recording_listener(&log, "l"));

        manager.log_swg_event(AnalyticsEvent::ImpressionPaywall, None, None);
        manager
            .log_raw_event(&json!({"eventType": 1, "eventOriginator": 1}), None)
            .unwrap();

        assert!(entries(&log).is_empty());
    }

    #[test]
    fn test_sync_caller_dispatches_on_captured_runtime() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let log = new_log();
        let manager =
            ClientEventManager::with_runtime(ReadyGate::resolved(), runtime.handle().clone());
        manager.register_event_listener(recording_listener(&log, "l"));

        manager.log_swg_event(AnalyticsEvent::ImpressionPaywall, None, None);
        runtime.block_on(manager.last_dispatch());

        assert_eq!(entries(&log), vec!["l:IMPRESSION_PAYWALL"]);
    }
}
