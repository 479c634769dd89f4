/// Timer queue for the audio thread
///
/// Holds the gap timers and fade steps of the looping manager. Time only
/// moves when the owner calls `set_now`, so the audio thread feeds it the
/// wall clock and tests feed it virtual time.
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

/// Identity of a scheduled timer, also used as its freshness token
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

/// Deadline-ordered queue of pending events
#[derive(Debug)]
pub struct TimerQueue<E> {
    now: Instant,
    next_id: u64,
    pending: BTreeMap<(Instant, TimerId), E>,
    deadlines: HashMap<TimerId, Instant>,
}

impl<E> TimerQueue<E> {
    pub fn new(now: Instant) -> Self {
        Self {
            now,
            next_id: 0,
            pending: BTreeMap::new(),
            deadlines: HashMap::new(),
        }
    }

    pub fn now(&self) -> Instant {
        self.now
    }

    /// Move the clock forward. Going backwards is ignored.
    pub fn set_now(&mut self, now: Instant) {
        if now > self.now {
            self.now = now;
        }
    }

    /// Schedule `event` to fire `delay` after the current time
    pub fn schedule(&mut self, delay: Duration, event: E) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;

        let deadline = self.now + delay;
        self.pending.insert((deadline, id), event);
        self.deadlines.insert(id, deadline);
        id
    }

    /// Cancel a pending timer. Returns false if it already fired or was cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.deadlines.remove(&id) {
            Some(deadline) => self.pending.remove(&(deadline, id)).is_some(),
            None => false,
        }
    }

    /// Pop the earliest timer that is due at the current time
    pub fn pop_due(&mut self) -> Option<(TimerId, E)> {
        let (&(deadline, id), _) = self.pending.iter().next()?;
        if deadline > self.now {
            return None;
        }
        self.deadlines.remove(&id);
        self.pending.remove(&(deadline, id)).map(|event| (id, event))
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.keys().next().map(|(deadline, _)| *deadline)
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.deadlines.contains_key(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
