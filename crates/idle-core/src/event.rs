//! Typed simulation events with pre-allocated ring buffers.
//!
//! Events are emitted while a tick is applied (and by purchases between
//! ticks) and delivered in one batch at the end of the next
//! [`Engine::step`](crate::engine::Engine::step). Each event kind has its own
//! [`EventBuffer`] with a fixed capacity; when full the oldest entries are
//! dropped.
//!
//! Listeners are passive: they observe and cannot mutate the economy.
//! Suppressed kinds are never buffered.

use crate::id::{EntityId, ModifierId};
use crate::number::{BigNumber, Ticks};

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// A simulation event. All events carry the tick at which they occurred.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    EntityProduced {
        producer: EntityId,
        entity: EntityId,
        quantity: BigNumber,
        tick: Ticks,
    },
    EntityConsumed {
        consumer: EntityId,
        entity: EntityId,
        quantity: BigNumber,
        tick: Ticks,
    },
    UpkeepConsumed {
        consumer: EntityId,
        entity: EntityId,
        quantity: BigNumber,
        tick: Ticks,
    },
    UpkeepShortfall {
        entity: EntityId,
        lost: BigNumber,
        tick: Ticks,
    },
    EntityBought {
        entity: EntityId,
        quantity: BigNumber,
        tick: Ticks,
    },
    ProgressCompleted {
        entity: EntityId,
        tick: Ticks,
    },
    ModifierActivated {
        modifier: ModifierId,
        tick: Ticks,
    },
    ModifierDeactivated {
        modifier: ModifierId,
        tick: Ticks,
    },
}

/// Discriminant-only mirror of [`Event`], used for subscription and buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    EntityProduced,
    EntityConsumed,
    UpkeepConsumed,
    UpkeepShortfall,
    EntityBought,
    ProgressCompleted,
    ModifierActivated,
    ModifierDeactivated,
}

const EVENT_KIND_COUNT: usize = 8;

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::EntityProduced { .. } => EventKind::EntityProduced,
            Event::EntityConsumed { .. } => EventKind::EntityConsumed,
            Event::UpkeepConsumed { .. } => EventKind::UpkeepConsumed,
            Event::UpkeepShortfall { .. } => EventKind::UpkeepShortfall,
            Event::EntityBought { .. } => EventKind::EntityBought,
            Event::ProgressCompleted { .. } => EventKind::ProgressCompleted,
            Event::ModifierActivated { .. } => EventKind::ModifierActivated,
            Event::ModifierDeactivated { .. } => EventKind::ModifierDeactivated,
        }
    }
}

impl EventKind {
    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// EventBuffer
// ---------------------------------------------------------------------------

/// Fixed-capacity ring buffer. When full, the oldest event is overwritten.
#[derive(Debug)]
pub struct EventBuffer {
    events: Vec<Option<Event>>,
    /// Next write position; the oldest entry once the buffer has wrapped.
    head: usize,
    len: usize,
    total_written: u64,
}

impl EventBuffer {
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
            total_written: 0,
        }
    }

    pub fn push(&mut self, event: Event) {
        self.events[self.head] = Some(event);
        self.head = (self.head + 1) % self.capacity();
        if self.len < self.capacity() {
            self.len += 1;
        }
        self.total_written += 1;
    }

    pub fn capacity(&self) -> usize {
        self.events.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Lifetime count, including dropped events. Not reset by `clear`.
    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Event> + '_ {
        let start = if self.len < self.capacity() { 0 } else { self.head };
        (0..self.len).filter_map(move |i| self.events[(start + i) % self.capacity()].as_ref())
    }

    pub fn clear(&mut self) {
        for slot in &mut self.events {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// A passive listener receives events read-only.
pub type PassiveListener = Box<dyn FnMut(&Event)>;

/// One ring buffer per event kind, listener lists, and suppression flags.
pub struct EventBus {
    buffers: [Option<EventBuffer>; EVENT_KIND_COUNT],
    suppressed: [bool; EVENT_KIND_COUNT],
    listeners: [Vec<PassiveListener>; EVENT_KIND_COUNT],
    default_capacity: usize,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("buffers", &self.buffers)
            .field("suppressed", &self.suppressed)
            .field("default_capacity", &self.default_capacity)
            .finish_non_exhaustive()
    }
}

impl EventBus {
    pub fn new(default_capacity: usize) -> Self {
        Self {
            buffers: Default::default(),
            suppressed: [false; EVENT_KIND_COUNT],
            listeners: Default::default(),
            default_capacity,
        }
    }

    /// Stop recording a kind. Its buffer is dropped.
    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = true;
        self.buffers[kind.index()] = None;
    }

    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed[kind.index()]
    }

    pub fn emit(&mut self, event: Event) {
        let idx = event.kind().index();
        if self.suppressed[idx] {
            return;
        }
        let capacity = self.default_capacity;
        self.buffers[idx]
            .get_or_insert_with(|| EventBuffer::new(capacity))
            .push(event);
    }

    /// Listeners run in registration order during delivery.
    pub fn on(&mut self, kind: EventKind, listener: PassiveListener) {
        self.listeners[kind.index()].push(listener);
    }

    /// Hand every buffered event to its listeners, oldest first, then clear
    /// the buffers.
    pub fn deliver(&mut self) {
        for idx in 0..EVENT_KIND_COUNT {
            let Some(buffer) = self.buffers[idx].as_mut() else {
                continue;
            };
            if buffer.is_empty() {
                continue;
            }
            let events: Vec<Event> = buffer.iter().cloned().collect();
            buffer.clear();
            for listener in &mut self.listeners[idx] {
                for event in &events {
                    listener(event);
                }
            }
        }
    }

    pub fn buffer(&self, kind: EventKind) -> Option<&EventBuffer> {
        self.buffers[kind.index()].as_ref()
    }

    pub fn buffered_count(&self, kind: EventKind) -> usize {
        self.buffer(kind).map(|b| b.len()).unwrap_or(0)
    }

    pub fn total_emitted(&self, kind: EventKind) -> u64 {
        self.buffer(kind).map(|b| b.total_written()).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn make_entity_id() -> EntityId {
        let mut sm = SlotMap::<EntityId, ()>::with_key();
        sm.insert(())
    }

    fn bought(entity: EntityId, n: u32) -> Event {
        Event::EntityBought {
            entity,
            quantity: BigNumber::from(n),
            tick: n as u64,
        }
    }

    #[test]
    fn ring_buffer_drops_oldest() {
        let mut buf = EventBuffer::new(3);
        let e = make_entity_id();
        for i in 0..5 {
            buf.push(bought(e, i));
        }
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.total_written(), 5);
        let ticks: Vec<Ticks> = buf
            .iter()
            .map(|ev| match ev {
                Event::EntityBought { tick, .. } => *tick,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(ticks, vec![2, 3, 4]);
    }

    #[test]
    fn clear_keeps_lifetime_count() {
        let mut buf = EventBuffer::new(4);
        buf.push(bought(make_entity_id(), 1));
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.total_written(), 1);
    }

    #[test]
    fn deliver_reaches_listeners_and_clears() {
        let mut bus = EventBus::new(16);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        bus.on(
            EventKind::EntityBought,
            Box::new(move |ev| sink.borrow_mut().push(ev.clone())),
        );
        let e = make_entity_id();
        bus.emit(bought(e, 1));
        bus.emit(bought(e, 2));
        bus.emit(Event::ProgressCompleted { entity: e, tick: 3 });
        assert_eq!(bus.buffered_count(EventKind::EntityBought), 2);

        bus.deliver();
        assert_eq!(seen.borrow().len(), 2);
        assert_eq!(bus.buffered_count(EventKind::EntityBought), 0);
        assert_eq!(bus.total_emitted(EventKind::EntityBought), 2);
    }

    #[test]
    fn suppressed_kinds_are_not_buffered() {
        let mut bus = EventBus::default();
        bus.suppress(EventKind::EntityBought);
        bus.emit(bought(make_entity_id(), 1));
        assert!(bus.is_suppressed(EventKind::EntityBought));
        assert!(bus.buffer(EventKind::EntityBought).is_none());
    }
}
