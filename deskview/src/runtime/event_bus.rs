//! Type-keyed publish/subscribe registry.
//!
//! Every concrete event type gets its own listener collection, stored behind
//! its [`TypeId`] and recovered by downcasting. Listeners run synchronously on
//! whichever thread calls [`EventBus::emit`]; the bus never hops threads, so
//! thread affinity is the emitter's business (windows and web views only emit
//! from the main thread because native callbacks arrive there).
//!
//! ```rust,ignore
//! let bus = EventBus::new();
//! let id = bus.connect(|event: &mut WindowResize| println!("{:?}", event.size));
//! bus.connect::<WindowShow, _>(|| println!("shown or hidden"));
//! bus.emit(&mut WindowResize::new(ViewSize::new(800, 600)));
//! bus.disconnect::<WindowResize>(id);
//! ```
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::framework::util::HashMap;

/// Marker for payloads that can travel through an [`EventBus`].
pub trait Event: 'static {}

/// Payloads whose triggering native action can be vetoed by a listener. The
/// bus does not look at the flag; whoever emitted the event reads it right
/// after `emit` returns.
pub trait Cancelable {
    fn cancel(&mut self);
    fn is_cancelled(&self) -> bool;
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

type Callback<E> = Arc<dyn Fn(&mut E) + Send + Sync>;
type Listeners<E> = IndexMap<ListenerId, Arc<Listener<E>>>;

struct Listener<E> {
    connected: AtomicBool,
    callback: Callback<E>,
}

/// Type-erased view of one `Listeners<E>` collection.
trait ListenerSet: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn disconnect_all(&mut self);
}

impl<E: Event> ListenerSet for Listeners<E> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn disconnect_all(&mut self) {
        for (_, listener) in self.drain(..) {
            listener.connected.store(false, Ordering::SeqCst);
        }
    }
}

/// Calling convention marker for listeners that take the event.
pub struct WithEvent;

/// Calling convention marker for listeners that take no arguments.
pub struct WithoutEvent;

/// Anything that can be connected as a listener for `E`. Implemented for
/// closures taking `&mut E` and for closures taking nothing; the marker
/// parameter lets the compiler pick the convention at connect time.
pub trait IntoListener<E, Marker> {
    fn into_callback(self) -> Callback<E>;
}

impl<E, F> IntoListener<E, WithEvent> for F
where
    E: Event,
    F: Fn(&mut E) + Send + Sync + 'static,
{
    fn into_callback(self) -> Callback<E> {
        Arc::new(self)
    }
}

impl<E, F> IntoListener<E, WithoutEvent> for F
where
    E: Event,
    F: Fn() + Send + Sync + 'static,
{
    fn into_callback(self) -> Callback<E> {
        Arc::new(move |_: &mut E| self())
    }
}

#[derive(Default)]
pub struct EventBus {
    connections: RwLock<HashMap<TypeId, Box<dyn ListenerSet>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect<E, M>(&self, listener: impl IntoListener<E, M>) -> ListenerId
    where
        E: Event,
    {
        let id = ListenerId::next();
        let listener = Arc::new(Listener {
            connected: AtomicBool::new(true),
            callback: listener.into_callback(),
        });

        let mut connections = self.connections.write();
        let listeners = connections
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::new(Listeners::<E>::new()));

        if let Some(listeners) = listeners.as_any_mut().downcast_mut::<Listeners<E>>() {
            listeners.insert(id, listener);
        }

        id
    }

    /// Removes a listener. Returns false when `id` was not connected for `E`.
    ///
    /// Once this returns, the listener is not started again, including by an
    /// emission already running on another thread.
    pub fn disconnect<E: Event>(&self, id: ListenerId) -> bool {
        let mut connections = self.connections.write();
        let removed = connections
            .get_mut(&TypeId::of::<E>())
            .and_then(|listeners| listeners.as_any_mut().downcast_mut::<Listeners<E>>())
            .and_then(|listeners| listeners.shift_remove(&id));

        match removed {
            Some(listener) => {
                listener.connected.store(false, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    /// Invokes every listener connected for `E`, in connection order.
    ///
    /// The listener set is snapshotted under the shared lock and the lock is
    /// released before the first listener runs, so a listener may connect or
    /// disconnect without deadlocking. Listeners connected during an emission
    /// run from the next one; listeners disconnected during it are skipped.
    pub fn emit<E: Event>(&self, event: &mut E) {
        let listeners: Vec<Arc<Listener<E>>> = {
            let connections = self.connections.read();
            match connections
                .get(&TypeId::of::<E>())
                .and_then(|listeners| listeners.as_any().downcast_ref::<Listeners<E>>())
            {
                Some(listeners) => listeners.values().cloned().collect(),
                None => return,
            }
        };

        for listener in listeners {
            if listener.connected.load(Ordering::SeqCst) {
                (listener.callback)(event);
            }
        }
    }

    pub fn count<E: Event>(&self) -> usize {
        self.connections
            .read()
            .get(&TypeId::of::<E>())
            .and_then(|listeners| listeners.as_any().downcast_ref::<Listeners<E>>())
            .map_or(0, IndexMap::len)
    }

    pub fn clear(&self) {
        let mut connections = self.connections.write();
        for listeners in connections.values_mut() {
            listeners.disconnect_all();
        }
        connections.clear();
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("event_types", &self.connections.read().len())
            .finish()
    }
}
