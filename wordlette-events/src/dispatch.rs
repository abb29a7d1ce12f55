//! The event dispatcher.
//!
//! Listeners register into one of three phase buckets (`before`, `main`,
//! `after`) keyed by the event's concrete type. Emitting runs each phase as
//! a concurrent fan-out and waits for the whole phase before starting the
//! next; observers then receive every event sequentially, in registration
//! order, since they typically re-emit into another dispatcher.
//!
//! Registration returns a [`ListenerHandle`]. Owners unsubscribe in their
//! own teardown path, either with [`EventDispatch::stop`] or by holding a
//! [`ListenerGuard`] that stops the listener when dropped.

use crate::event::Event;
use dashmap::DashMap;
use futures::future::{BoxFuture, try_join_all};
use std::any::TypeId;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("listener failed: {0}")]
    Listener(String),
}

type ErasedCallback =
    Arc<dyn Fn(Arc<dyn Event>) -> BoxFuture<'static, Result<(), DispatchError>> + Send + Sync>;

struct Registered {
    id: u64,
    callback: ErasedCallback,
}

/// Which bucket a handle points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Before,
    Main,
    After,
    Observer,
}

/// Identifies one registration; pass it to [`EventDispatch::stop`].
#[derive(Debug, Clone, Copy)]
pub struct ListenerHandle {
    id: u64,
    phase: Phase,
    type_id: TypeId,
}

/// Phase-ordered publish/subscribe over typed events.
#[derive(Clone, Default)]
pub struct EventDispatch {
    before: Arc<DashMap<TypeId, Vec<Registered>>>,
    main: Arc<DashMap<TypeId, Vec<Registered>>>,
    after: Arc<DashMap<TypeId, Vec<Registered>>>,
    observers: Arc<RwLock<Vec<Registered>>>,
    next_id: Arc<AtomicU64>,
}

impl std::fmt::Debug for EventDispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatch").finish_non_exhaustive()
    }
}

impl EventDispatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a main-phase listener for events of type `E`.
    pub fn listen<E, F, Fut>(&self, callback: F) -> ListenerHandle
    where
        E: Event + Clone,
        F: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DispatchError>> + Send + 'static,
    {
        self.register::<E, F, Fut>(Phase::Main, callback)
    }

    /// Register a before-phase listener.
    pub fn before<E, F, Fut>(&self, callback: F) -> ListenerHandle
    where
        E: Event + Clone,
        F: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DispatchError>> + Send + 'static,
    {
        self.register::<E, F, Fut>(Phase::Before, callback)
    }

    /// Register an after-phase listener.
    pub fn after<E, F, Fut>(&self, callback: F) -> ListenerHandle
    where
        E: Event + Clone,
        F: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DispatchError>> + Send + 'static,
    {
        self.register::<E, F, Fut>(Phase::After, callback)
    }

    fn register<E, F, Fut>(&self, phase: Phase, callback: F) -> ListenerHandle
    where
        E: Event + Clone,
        F: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DispatchError>> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let type_id = TypeId::of::<E>();

        // Erase the event type; a non-matching payload is skipped rather
        // than failed, since buckets are keyed by exact type anyway.
        let erased: ErasedCallback = Arc::new(move |event: Arc<dyn Event>| {
            match event.as_any().downcast_ref::<E>() {
                Some(typed) => Box::pin(callback(typed.clone())),
                None => Box::pin(async { Ok(()) }),
            }
        });

        let bucket = match phase {
            Phase::Before => &self.before,
            Phase::Main => &self.main,
            Phase::After => &self.after,
            Phase::Observer => unreachable!("observers register through observe()"),
        };
        bucket
            .entry(type_id)
            .or_default()
            .push(Registered { id, callback: erased });

        trace!(?phase, listener = id, "listener registered");
        ListenerHandle { id, phase, type_id }
    }

    /// Register a catch-all forwarding target, invoked for every emitted
    /// event after all three phases complete.
    pub fn observe<F, Fut>(&self, callback: F) -> ListenerHandle
    where
        F: Fn(Arc<dyn Event>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DispatchError>> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let erased: ErasedCallback = Arc::new(move |event| Box::pin(callback(event)));
        self.observers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(Registered { id, callback: erased });

        trace!(observer = id, "observer registered");
        ListenerHandle {
            id,
            phase: Phase::Observer,
            type_id: TypeId::of::<()>(),
        }
    }

    /// Remove one registration. Stopping an already-stopped handle is a
    /// no-op.
    pub fn stop(&self, handle: ListenerHandle) {
        match handle.phase {
            Phase::Observer => {
                self.observers
                    .write()
                    .unwrap_or_else(|e| e.into_inner())
                    .retain(|r| r.id != handle.id);
            }
            phase => {
                let bucket = match phase {
                    Phase::Before => &self.before,
                    Phase::Main => &self.main,
                    Phase::After => &self.after,
                    Phase::Observer => unreachable!(),
                };
                if let Some(mut listeners) = bucket.get_mut(&handle.type_id) {
                    listeners.retain(|r| r.id != handle.id);
                }
            }
        }
        trace!(listener = handle.id, "listener stopped");
    }

    /// Tie a registration's lifetime to a scope.
    pub fn guard(&self, handle: ListenerHandle) -> ListenerGuard {
        ListenerGuard {
            dispatch: self.clone(),
            handle,
        }
    }

    /// Emit an event through all three phases, then the observers.
    ///
    /// Each phase is a concurrent fan-out awaited to completion before the
    /// next phase starts. The first listener error wins and propagates;
    /// cancelling phase siblings is best-effort. Emitting an event type
    /// with no listeners is a no-op.
    pub async fn emit<E: Event>(&self, event: E) -> Result<(), DispatchError> {
        let type_id = TypeId::of::<E>();
        let event: Arc<dyn Event> = Arc::new(event);
        debug!(event = event.event_name(), "emitting");

        self.run_phase(&self.before, type_id, &event).await?;
        self.run_phase(&self.main, type_id, &event).await?;
        self.run_phase(&self.after, type_id, &event).await?;

        let observers: Vec<ErasedCallback> = {
            let observers = self.observers.read().unwrap_or_else(|e| e.into_inner());
            observers.iter().map(|r| r.callback.clone()).collect()
        };
        for observer in observers {
            observer(event.clone()).await?;
        }
        Ok(())
    }

    async fn run_phase(
        &self,
        bucket: &DashMap<TypeId, Vec<Registered>>,
        type_id: TypeId,
        event: &Arc<dyn Event>,
    ) -> Result<(), DispatchError> {
        // Snapshot the callbacks so listeners may (un)register while the
        // phase runs without holding the bucket lock across awaits.
        let callbacks: Vec<ErasedCallback> = match bucket.get(&type_id) {
            Some(listeners) => listeners.iter().map(|r| r.callback.clone()).collect(),
            None => return Ok(()),
        };

        try_join_all(callbacks.iter().map(|cb| cb(event.clone()))).await?;
        Ok(())
    }

    /// How many listeners are registered for `E` in the main phase.
    pub fn listener_count<E: Event>(&self) -> usize {
        self.main
            .get(&TypeId::of::<E>())
            .map(|l| l.len())
            .unwrap_or(0)
    }
}

/// Stops its listener when dropped.
///
/// The owner of a listener keeps the guard alongside whatever state the
/// callback captures; when the owner is torn down, the registration goes
/// with it and the listener is never invoked again.
pub struct ListenerGuard {
    dispatch: EventDispatch,
    handle: ListenerHandle,
}

impl ListenerGuard {
    /// Release the guard without stopping the listener.
    pub fn forget(self) {
        std::mem::forget(self);
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.dispatch.stop(self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Clone)]
    struct Saved {
        value: i32,
    }

    impl Event for Saved {
        fn event_name(&self) -> &str {
            "saved"
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    #[derive(Clone)]
    struct Other;

    impl Event for Other {
        fn event_name(&self) -> &str {
            "other"
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    fn record(
        log: &Arc<Mutex<Vec<&'static str>>>,
        tag: &'static str,
    ) -> impl Fn(Saved) -> futures::future::Ready<Result<(), DispatchError>> {
        let log = log.clone();
        move |_event| {
            log.lock().unwrap().push(tag);
            futures::future::ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_phase_ordering() {
        let dispatch = EventDispatch::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        dispatch.before(record(&log, "before"));
        dispatch.listen(record(&log, "listen"));
        dispatch.after(record(&log, "after"));

        dispatch.emit(Saved { value: 1 }).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["before", "listen", "after"]);
    }

    #[tokio::test]
    async fn test_exact_type_match_only() {
        let dispatch = EventDispatch::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        dispatch.listen(record(&log, "saved"));

        dispatch.emit(Other).await.unwrap();
        assert!(log.lock().unwrap().is_empty());

        dispatch.emit(Saved { value: 1 }).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["saved"]);
    }

    #[tokio::test]
    async fn test_emit_with_no_listeners_is_noop() {
        let dispatch = EventDispatch::new();
        dispatch.emit(Saved { value: 1 }).await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_removes_listener() {
        let dispatch = EventDispatch::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let handle = dispatch.listen(record(&log, "once"));
        assert_eq!(dispatch.listener_count::<Saved>(), 1);

        dispatch.stop(handle);
        assert_eq!(dispatch.listener_count::<Saved>(), 0);

        dispatch.emit(Saved { value: 1 }).await.unwrap();
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dropped_guard_unsubscribes_silently() {
        let dispatch = EventDispatch::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        {
            let _guard = dispatch.guard(dispatch.listen(record(&log, "short-lived")));
            dispatch.emit(Saved { value: 1 }).await.unwrap();
        }

        // The owner's scope ended; emitting must neither invoke nor fail.
        dispatch.emit(Saved { value: 2 }).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["short-lived"]);
    }

    #[tokio::test]
    async fn test_observers_run_after_phases_in_order() {
        let dispatch = EventDispatch::new();
        let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

        {
            let log = log.clone();
            dispatch.after(move |_event: Saved| {
                log.lock().unwrap().push("after".into());
                futures::future::ready(Ok(()))
            });
        }
        for tag in ["first", "second"] {
            let log = log.clone();
            dispatch.observe(move |event| {
                log.lock().unwrap().push(format!("{tag}:{}", event.event_name()));
                futures::future::ready(Ok(()))
            });
        }

        dispatch.emit(Saved { value: 1 }).await.unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["after", "first:saved", "second:saved"]
        );
    }

    #[tokio::test]
    async fn test_first_error_wins() {
        let dispatch = EventDispatch::new();
        dispatch.listen(|_event: Saved| {
            futures::future::ready(Err(DispatchError::Listener("bad listener".into())))
        });

        let err = dispatch.emit(Saved { value: 1 }).await.unwrap_err();
        assert!(err.to_string().contains("bad listener"));
    }

    #[tokio::test]
    async fn test_failing_before_phase_skips_main() {
        let dispatch = EventDispatch::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        dispatch.before(|_event: Saved| {
            futures::future::ready(Err(DispatchError::Listener("gate".into())))
        });
        dispatch.listen(record(&log, "main"));

        assert!(dispatch.emit(Saved { value: 1 }).await.is_err());
        assert!(log.lock().unwrap().is_empty());
    }
}
