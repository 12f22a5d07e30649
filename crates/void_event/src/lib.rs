//! # void_event - Native Event Bus Transport
//!
//! Interface-based publish/subscribe buses with:
//! - Single-target or addressed delivery
//! - Immediate dispatch and an optional deferred queue
//! - Priority-ordered handlers
//! - Per-thread "current address" tracking while an event is being delivered
//!
//! A bus is parameterised by its handler interface `I` (usually a trait
//! object such as `dyn TickEvents + Send`) and its address type `A`.
//! Handlers are shared objects; the bus never owns their lifetime beyond the
//! connection.
//!
//! ```ignore
//! trait TickEvents {
//!     fn on_tick(&mut self, dt: f32);
//! }
//! type TickBus = dyn TickEvents + Send;
//!
//! let bus: EventBus<TickBus> = EventBus::new("TickBus", BusPolicy::SINGLE);
//! let id = bus.connect(Arc::new(Mutex::new(MyHandler)) as SharedHandler<TickBus>)?;
//! bus.broadcast(|h| h.on_tick(0.016));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use thiserror::Error;

/// Handler priority
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Low = 0,
    Normal = 1,
    High = 2,
    Critical = 3,
}

impl Default for Priority {
    fn default() -> Self {
        Self::Normal
    }
}

/// How handlers are reached
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AddressPolicy {
    /// Every handler receives every event
    #[default]
    Single,
    /// Handlers connect at an address and events may target one address
    ById,
}

/// Whether events may be deferred
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum QueuePolicy {
    /// Events are delivered on the calling thread immediately
    #[default]
    Immediate,
    /// Events may also be queued and delivered by [`EventBus::execute_queue`]
    Queued,
}

/// Addressing and queuing policy of a bus, fixed at construction
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BusPolicy {
    pub address: AddressPolicy,
    pub queue: QueuePolicy,
}

impl BusPolicy {
    /// Single target, immediate only
    pub const SINGLE: Self = Self {
        address: AddressPolicy::Single,
        queue: QueuePolicy::Immediate,
    };

    /// Addressed, immediate only
    pub const ADDRESSED: Self = Self {
        address: AddressPolicy::ById,
        queue: QueuePolicy::Immediate,
    };

    /// Enable the deferred queue
    pub const fn with_queue(mut self) -> Self {
        self.queue = QueuePolicy::Queued;
        self
    }

    pub fn is_addressed(&self) -> bool {
        self.address == AddressPolicy::ById
    }

    pub fn is_queued(&self) -> bool {
        self.queue == QueuePolicy::Queued
    }
}

/// Types usable as bus addresses
pub trait BusAddress: Clone + PartialEq + Send + Sync + 'static {}

impl<T: Clone + PartialEq + Send + Sync + 'static> BusAddress for T {}

/// Errors raised by bus operations that the policy forbids
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// Addressed bus used without an address
    #[error("bus '{0}' is addressed; an address is required")]
    AddressRequired(String),

    /// Address supplied to a single-target bus
    #[error("bus '{0}' is not addressed")]
    NotAddressed(String),

    /// Deferred operation on a bus without a queue
    #[error("bus '{0}' does not support queuing")]
    QueueDisabled(String),
}

/// Result type for bus operations
pub type Result<T> = std::result::Result<T, BusError>;

/// Handler connection ID
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandlerId(pub u64);

/// A handler object shared between its owner and the bus
pub type SharedHandler<I> = Arc<Mutex<I>>;

/// Deferred broadcast or addressed call
pub type QueuedEvent<I> = Box<dyn Fn(&mut I) + Send>;

struct Connection<I: ?Sized, A> {
    id: HandlerId,
    priority: Priority,
    address: Option<A>,
    handler: SharedHandler<I>,
}

impl<I: ?Sized, A: Clone> Clone for Connection<I, A> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            priority: self.priority,
            address: self.address.clone(),
            handler: Arc::clone(&self.handler),
        }
    }
}

enum QueuedCall<I: ?Sized, A> {
    Broadcast(QueuedEvent<I>),
    Event(A, QueuedEvent<I>),
    Function(Box<dyn FnOnce() + Send>),
}

/// Publish/subscribe bus for handlers implementing `I`
pub struct EventBus<I: ?Sized, A = ()> {
    name: String,
    policy: BusPolicy,
    connections: RwLock<Vec<Connection<I, A>>>,
    queue_tx: Sender<QueuedCall<I, A>>,
    queue_rx: Receiver<QueuedCall<I, A>>,
    next_handler_id: AtomicU64,
    /// Addresses being delivered, per dispatching thread
    dispatching: Mutex<HashMap<ThreadId, Vec<A>>>,
}

impl<I, A> EventBus<I, A>
where
    I: ?Sized + Send + 'static,
    A: BusAddress,
{
    /// Create a new bus
    pub fn new(name: impl Into<String>, policy: BusPolicy) -> Self {
        let (queue_tx, queue_rx) = crossbeam_channel::unbounded();
        Self {
            name: name.into(),
            policy,
            connections: RwLock::new(Vec::new()),
            queue_tx,
            queue_rx,
            next_handler_id: AtomicU64::new(1),
            dispatching: Mutex::new(HashMap::new()),
        }
    }

    /// Bus name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bus policy
    pub fn policy(&self) -> BusPolicy {
        self.policy
    }

    // ========== Connections ==========

    /// Connect a handler to a single-target bus
    pub fn connect(&self, handler: SharedHandler<I>) -> Result<HandlerId> {
        self.connect_with_priority(handler, Priority::Normal)
    }

    /// Connect a handler to a single-target bus with a priority
    pub fn connect_with_priority(
        &self,
        handler: SharedHandler<I>,
        priority: Priority,
    ) -> Result<HandlerId> {
        if self.policy.is_addressed() {
            return Err(BusError::AddressRequired(self.name.clone()));
        }
        Ok(self.insert(None, handler, priority))
    }

    /// Connect a handler at an address on an addressed bus
    pub fn connect_to(&self, address: A, handler: SharedHandler<I>) -> Result<HandlerId> {
        self.connect_to_with_priority(address, handler, Priority::Normal)
    }

    /// Connect a handler at an address with a priority
    pub fn connect_to_with_priority(
        &self,
        address: A,
        handler: SharedHandler<I>,
        priority: Priority,
    ) -> Result<HandlerId> {
        if !self.policy.is_addressed() {
            return Err(BusError::NotAddressed(self.name.clone()));
        }
        Ok(self.insert(Some(address), handler, priority))
    }

    fn insert(&self, address: Option<A>, handler: SharedHandler<I>, priority: Priority) -> HandlerId {
        let id = HandlerId(self.next_handler_id.fetch_add(1, Ordering::Relaxed));
        let mut connections = self.connections.write();
        // Higher priority first; equal priorities keep connection order
        let position = connections
            .iter()
            .position(|c| c.priority < priority)
            .unwrap_or(connections.len());
        connections.insert(
            position,
            Connection {
                id,
                priority,
                address,
                handler,
            },
        );
        log::trace!("bus '{}': connected handler {:?}", self.name, id);
        id
    }

    /// Disconnect a handler. Returns false when the id is unknown.
    pub fn disconnect(&self, id: HandlerId) -> bool {
        let mut connections = self.connections.write();
        let before = connections.len();
        connections.retain(|c| c.id != id);
        let removed = connections.len() != before;
        if removed {
            log::trace!("bus '{}': disconnected handler {:?}", self.name, id);
        }
        removed
    }

    /// Whether a handler is connected
    pub fn is_connected(&self, id: HandlerId) -> bool {
        self.connections.read().iter().any(|c| c.id == id)
    }

    /// Whether a handler is connected at `address`
    pub fn is_connected_to(&self, id: HandlerId, address: &A) -> bool {
        self.connections
            .read()
            .iter()
            .any(|c| c.id == id && c.address.as_ref() == Some(address))
    }

    /// Address a handler is connected at
    pub fn address_of(&self, id: HandlerId) -> Option<A> {
        self.connections
            .read()
            .iter()
            .find(|c| c.id == id)
            .and_then(|c| c.address.clone())
    }

    /// Number of connected handlers
    pub fn handler_count(&self) -> usize {
        self.connections.read().len()
    }

    /// Whether any handler is connected at `address`
    pub fn has_handlers_at(&self, address: &A) -> bool {
        self.connections
            .read()
            .iter()
            .any(|c| c.address.as_ref() == Some(address))
    }

    // ========== Immediate Dispatch ==========

    /// Deliver to every handler. Returns how many handlers were called.
    pub fn broadcast(&self, mut f: impl FnMut(&mut I)) -> usize {
        self.dispatch(self.targets(None), |h| f(h)).0
    }

    /// Deliver to every handler and keep the last handler's result
    pub fn broadcast_result<R>(&self, f: impl FnMut(&mut I) -> R) -> Option<R> {
        self.dispatch(self.targets(None), f).1
    }

    /// Deliver to the handlers at `address`
    pub fn event(&self, address: &A, mut f: impl FnMut(&mut I)) -> Result<usize> {
        self.require_addressed()?;
        Ok(self.dispatch(self.targets(Some(address)), |h| f(h)).0)
    }

    /// Deliver to the handlers at `address` and keep the last result
    pub fn event_result<R>(&self, address: &A, f: impl FnMut(&mut I) -> R) -> Result<Option<R>> {
        self.require_addressed()?;
        Ok(self.dispatch(self.targets(Some(address)), f).1)
    }

    /// Address of the event being delivered on the calling thread
    pub fn current_address(&self) -> Option<A> {
        self.dispatching
            .lock()
            .get(&thread::current().id())
            .and_then(|stack| stack.last().cloned())
    }

    fn require_addressed(&self) -> Result<()> {
        if self.policy.is_addressed() {
            Ok(())
        } else {
            Err(BusError::NotAddressed(self.name.clone()))
        }
    }

    /// Snapshot of the matching connections, so handlers may connect or
    /// disconnect while an event is being delivered.
    fn targets(&self, address: Option<&A>) -> Vec<Connection<I, A>> {
        let connections = self.connections.read();
        match address {
            Some(address) => connections
                .iter()
                .filter(|c| c.address.as_ref() == Some(address))
                .cloned()
                .collect(),
            None => connections.clone(),
        }
    }

    fn dispatch<R>(
        &self,
        targets: Vec<Connection<I, A>>,
        mut f: impl FnMut(&mut I) -> R,
    ) -> (usize, Option<R>) {
        let count = targets.len();
        let mut last = None;
        for connection in targets {
            let _scope = connection
                .address
                .clone()
                .map(|address| DispatchScope::enter(self, address));
            let mut handler = connection.handler.lock();
            last = Some(f(&mut *handler));
        }
        log::trace!("bus '{}': delivered to {} handler(s)", self.name, count);
        (count, last)
    }

    // ========== Deferred Dispatch ==========

    /// Queue a broadcast for [`execute_queue`](Self::execute_queue)
    pub fn queue_broadcast(&self, f: impl Fn(&mut I) + Send + 'static) -> Result<()> {
        self.push(QueuedCall::Broadcast(Box::new(f)))
    }

    /// Queue an addressed event for [`execute_queue`](Self::execute_queue)
    pub fn queue_event(&self, address: A, f: impl Fn(&mut I) + Send + 'static) -> Result<()> {
        self.require_addressed()?;
        self.push(QueuedCall::Event(address, Box::new(f)))
    }

    /// Queue an arbitrary function
    pub fn queue_function(&self, f: impl FnOnce() + Send + 'static) -> Result<()> {
        self.push(QueuedCall::Function(Box::new(f)))
    }

    fn push(&self, call: QueuedCall<I, A>) -> Result<()> {
        if !self.policy.is_queued() {
            return Err(BusError::QueueDisabled(self.name.clone()));
        }
        // The bus holds the receiver, so the channel can never be disconnected
        let _ = self.queue_tx.send(call);
        Ok(())
    }

    /// Execute everything queued so far. Calls queued while executing are
    /// left for the next pass. Returns how many queued calls ran.
    pub fn execute_queue(&self) -> usize {
        let pending: Vec<_> = self.queue_rx.try_iter().take(self.queue_rx.len()).collect();
        let executed = pending.len();
        for call in pending {
            match call {
                QueuedCall::Broadcast(f) => {
                    self.dispatch(self.targets(None), |h| f(h));
                }
                QueuedCall::Event(address, f) => {
                    self.dispatch(self.targets(Some(&address)), |h| f(h));
                }
                QueuedCall::Function(f) => f(),
            }
        }
        executed
    }

    /// Drop all queued calls without executing them
    pub fn clear_queue(&self) {
        while self.queue_rx.try_recv().is_ok() {}
    }

    /// Number of queued calls
    pub fn pending_count(&self) -> usize {
        self.queue_rx.len()
    }

    /// Check if there are queued calls
    pub fn has_pending(&self) -> bool {
        !self.queue_rx.is_empty()
    }
}

impl<I: ?Sized, A> fmt::Debug for EventBus<I, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .field("handlers", &self.connections.read().len())
            .field("pending", &self.queue_rx.len())
            .finish()
    }
}

/// Pushes an address on the current thread's dispatch stack for the
/// duration of one delivery.
struct DispatchScope<'a, I: ?Sized, A: BusAddress> {
    bus: &'a EventBus<I, A>,
    thread: ThreadId,
}

impl<'a, I: ?Sized, A: BusAddress> DispatchScope<'a, I, A> {
    fn enter(bus: &'a EventBus<I, A>, address: A) -> Self {
        let thread = thread::current().id();
        bus.dispatching.lock().entry(thread).or_default().push(address);
        Self { bus, thread }
    }
}

impl<I: ?Sized, A: BusAddress> Drop for DispatchScope<'_, I, A> {
    fn drop(&mut self) {
        let mut dispatching = self.bus.dispatching.lock();
        if let Some(stack) = dispatching.get_mut(&self.thread) {
            stack.pop();
            if stack.is_empty() {
                dispatching.remove(&self.thread);
            }
        }
    }
}

/// Prelude
pub mod prelude {
    pub use crate::{
        AddressPolicy, BusAddress, BusError, BusPolicy, EventBus, HandlerId, Priority,
        QueuePolicy, SharedHandler,
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    trait Counter {
        fn add(&mut self, amount: u32);
        fn total(&mut self) -> u32;
    }

    type CounterBus = dyn Counter + Send;

    struct Tally {
        label: &'static str,
        total: u32,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Counter for Tally {
        fn add(&mut self, amount: u32) {
            self.total += amount;
            self.log.lock().push(self.label);
        }

        fn total(&mut self) -> u32 {
            self.total
        }
    }

    fn tally(label: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> SharedHandler<CounterBus> {
        Arc::new(Mutex::new(Tally {
            label,
            total: 0,
            log: log.clone(),
        }))
    }

    #[test]
    fn test_broadcast_reaches_all_handlers() {
        let bus: EventBus<CounterBus> = EventBus::new("Counter", BusPolicy::SINGLE);
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.connect(tally("a", &log)).unwrap();
        bus.connect(tally("b", &log)).unwrap();

        assert_eq!(bus.broadcast(|h| h.add(2)), 2);
        assert_eq!(bus.broadcast_result(|h| h.total()), Some(2));
        assert_eq!(*log.lock(), vec!["a", "b"]);
    }

    #[test]
    fn test_priority() {
        let bus: EventBus<CounterBus> = EventBus::new("Counter", BusPolicy::SINGLE);
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.connect_with_priority(tally("low", &log), Priority::Low).unwrap();
        bus.connect_with_priority(tally("high", &log), Priority::High).unwrap();
        bus.connect(tally("normal", &log)).unwrap();

        bus.broadcast(|h| h.add(1));

        // High priority should be first
        assert_eq!(*log.lock(), vec!["high", "normal", "low"]);
    }

    #[test]
    fn test_addressed_event() {
        let bus: EventBus<CounterBus, u32> = EventBus::new("Counter", BusPolicy::ADDRESSED);
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = bus.connect_to(1, tally("one", &log)).unwrap();
        bus.connect_to(2, tally("two", &log)).unwrap();

        assert_eq!(bus.event(&1, |h| h.add(5)), Ok(1));
        assert_eq!(bus.event_result(&1, |h| h.total()), Ok(Some(5)));
        assert_eq!(bus.event_result(&2, |h| h.total()), Ok(Some(0)));
        assert_eq!(bus.event(&3, |h| h.add(5)), Ok(0));
        assert!(bus.is_connected_to(a, &1));
        assert!(!bus.is_connected_to(a, &2));
        assert_eq!(*log.lock(), vec!["one"]);
    }

    #[test]
    fn test_policy_violations() {
        let single: EventBus<CounterBus> = EventBus::new("Single", BusPolicy::SINGLE);
        let log = Arc::new(Mutex::new(Vec::new()));
        assert!(matches!(
            single.connect_to((), tally("x", &log)),
            Err(BusError::NotAddressed(_))
        ));
        assert!(matches!(
            single.queue_broadcast(|h| h.add(1)),
            Err(BusError::QueueDisabled(_))
        ));

        let addressed: EventBus<CounterBus, u32> = EventBus::new("Addressed", BusPolicy::ADDRESSED);
        assert!(matches!(
            addressed.connect(tally("x", &log)),
            Err(BusError::AddressRequired(_))
        ));
    }

    #[test]
    fn test_queue_executes_in_order() {
        let bus: EventBus<CounterBus, u32> =
            EventBus::new("Queued", BusPolicy::ADDRESSED.with_queue());
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.connect_to(7, tally("seven", &log)).unwrap();

        let ran = Arc::new(AtomicU32::new(0));
        let ran_clone = ran.clone();
        bus.queue_event(7, |h| h.add(3)).unwrap();
        bus.queue_broadcast(|h| h.add(1)).unwrap();
        bus.queue_function(move || {
            ran_clone.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        assert_eq!(bus.pending_count(), 3);
        assert_eq!(bus.event_result(&7, |h| h.total()), Ok(Some(0)));
        assert_eq!(bus.execute_queue(), 3);
        assert!(!bus.has_pending());
        assert_eq!(bus.event_result(&7, |h| h.total()), Ok(Some(4)));
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_current_address_during_dispatch() {
        struct AddressRecorder {
            bus: Arc<EventBus<dyn Counter + Send, u32>>,
            seen: Arc<Mutex<Vec<Option<u32>>>>,
        }

        impl Counter for AddressRecorder {
            fn add(&mut self, _amount: u32) {
                self.seen.lock().push(self.bus.current_address());
            }

            fn total(&mut self) -> u32 {
                0
            }
        }

        let bus: Arc<EventBus<CounterBus, u32>> =
            Arc::new(EventBus::new("AddressRecorder", BusPolicy::ADDRESSED));
        let seen = Arc::new(Mutex::new(Vec::new()));
        for address in [4, 9] {
            let recorder: SharedHandler<CounterBus> = Arc::new(Mutex::new(AddressRecorder {
                bus: bus.clone(),
                seen: seen.clone(),
            }));
            bus.connect_to(address, recorder).unwrap();
        }

        bus.event(&9, |h| h.add(1)).unwrap();
        bus.broadcast(|h| h.add(1));

        assert_eq!(*seen.lock(), vec![Some(9), Some(4), Some(9)]);
        assert_eq!(bus.current_address(), None);
    }

    #[test]
    fn test_disconnect() {
        let bus: EventBus<CounterBus> = EventBus::new("Counter", BusPolicy::SINGLE);
        let log = Arc::new(Mutex::new(Vec::new()));
        let id = bus.connect(tally("a", &log)).unwrap();
        assert!(bus.is_connected(id));
        assert!(bus.disconnect(id));
        assert!(!bus.disconnect(id));
        assert_eq!(bus.broadcast(|h| h.add(1)), 0);
        assert_eq!(bus.handler_count(), 0);
    }
}
