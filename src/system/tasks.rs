//! Cooperative task scheduling.
//!
//! Long-lived protocol work on a single-core device is split into short steps.
//! A step never blocks: it does a bounded amount of I/O and then hands its
//! successor back to a [`Scheduler`] as one of three primitives:
//!
//! - [`Scheduler::now`]: run at the next opportunity, optionally ahead of other
//!   work via [`Priority::High`].
//! - [`Scheduler::after`]: run once a delay has elapsed.
//! - [`Scheduler::race`]: run exactly one of two items, whichever becomes
//!   eligible first, and cancel the other. An [`Item::When`] side is a
//!   condition re-evaluated on every tick.
//!
//! Steps and conditions are plain values chosen by the [`Task`], so every
//! pending action is visible and comparable in tests.
//!
//! Each primitive either queues everything it was given or nothing, and
//! reports [`QueueFull`] in the second case.
//!
//! [`TaskList`] is a small fixed-capacity runner implementing [`Scheduler`]
//! for firmware that has no scheduler of its own.
//!
//! ```ignore
//! let mut tasks: TaskList<Step, Condition, 16> = TaskList::new();
//! session.start(&mut tasks)?;
//! loop {
//!     tasks.tick(clock.now_ms(), &mut session);
//! }
//! ```

use heapless::Vec;

/// Relative priority of items that become eligible at the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Priority {
    /// Regular work.
    #[default]
    Normal,
    /// Runs before any eligible [`Priority::Normal`] item.
    High,
}

/// One side of a race.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item<S, C> {
    /// Eligible immediately.
    Now(S, Priority),
    /// Eligible once the delay in milliseconds has elapsed.
    After(u32, S),
    /// Eligible as soon as the condition holds.
    When(C, S),
}

/// The scheduler has no room for another item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct QueueFull;

/// The scheduling primitives a [`Task`] uses to queue its next steps.
pub trait Scheduler<S, C> {
    /// Run `step` at the next scheduling opportunity.
    fn now(&mut self, step: S, priority: Priority) -> Result<(), QueueFull>;

    /// Run `step` no earlier than `delay_ms` from now.
    fn after(&mut self, delay_ms: u32, step: S) -> Result<(), QueueFull>;

    /// Run whichever of `first` and `second` becomes eligible first and
    /// cancel the other. Neither side is queued unless both fit.
    fn race(&mut self, first: Item<S, C>, second: Item<S, C>) -> Result<(), QueueFull>;
}

/// A state machine driven by a scheduler.
pub trait Task {
    /// Continuation type naming the next action.
    type Step;
    /// Condition type evaluated for [`Item::When`].
    type Condition;

    /// Execute one step, scheduling its successors on `scheduler`.
    fn run<S>(&mut self, step: Self::Step, scheduler: &mut S)
    where
        S: Scheduler<Self::Step, Self::Condition>;

    /// Evaluate a condition. Called on every tick for each pending
    /// [`Item::When`].
    fn poll(&mut self, condition: &Self::Condition) -> bool;
}

#[derive(Debug)]
enum Trigger<C> {
    At(u64),
    When(C),
}

#[derive(Debug)]
struct Entry<S, C> {
    seq: u32,
    trigger: Trigger<C>,
    step: S,
    priority: Priority,
    race: Option<u32>,
}

/// A fixed-capacity cooperative runner.
///
/// Holds at most `N` pending items and rejects new ones with [`QueueFull`]
/// beyond that. Size `N` for the largest number of items the task keeps
/// pending at once.
#[derive(Debug)]
pub struct TaskList<S, C, const N: usize> {
    entries: Vec<Entry<S, C>, N>,
    now_ms: u64,
    next_seq: u32,
    next_race: u32,
}

impl<S, C, const N: usize> TaskList<S, C, N> {
    /// Create an empty runner with its clock at zero.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            now_ms: 0,
            next_seq: 0,
            next_race: 0,
        }
    }

    /// Number of pending items, counting both sides of every race.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The clock value seen by the last [`TaskList::tick`].
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Pending steps in submission order.
    pub fn pending(&self) -> impl Iterator<Item = &S> + '_ {
        let mut order: Vec<(u32, &S), N> = Vec::new();
        for entry in &self.entries {
            let _ = order.push((entry.seq, &entry.step));
        }
        order.sort_unstable_by_key(|(seq, _)| *seq);
        order.into_iter().map(|(_, step)| step)
    }

    /// Earliest time at which a delayed item becomes due, if any.
    pub fn next_deadline(&self) -> Option<u64> {
        self.entries
            .iter()
            .filter_map(|entry| match entry.trigger {
                Trigger::At(at) => Some(at),
                Trigger::When(_) => None,
            })
            .min()
    }

    /// Advance the clock to `now_ms` and run eligible steps.
    ///
    /// Eligible items run highest priority first, then in submission order.
    /// Steps scheduled while ticking may run in the same tick. At most `N`
    /// steps run per call. Returns the number of steps run.
    pub fn tick<T>(&mut self, now_ms: u64, task: &mut T) -> usize
    where
        T: Task<Step = S, Condition = C>,
    {
        self.now_ms = self.now_ms.max(now_ms);
        let mut ran = 0;
        while ran < N {
            let Some(index) = self.next_eligible(task) else {
                break;
            };
            let entry = self.entries.swap_remove(index);
            if let Some(race) = entry.race {
                self.entries.retain(|other| other.race != Some(race));
            }
            task.run(entry.step, self);
            ran += 1;
        }
        ran
    }

    fn next_eligible<T>(&self, task: &mut T) -> Option<usize>
    where
        T: Task<Step = S, Condition = C>,
    {
        let mut best: Option<(usize, Priority, u32)> = None;
        for (index, entry) in self.entries.iter().enumerate() {
            let eligible = match &entry.trigger {
                Trigger::At(at) => *at <= self.now_ms,
                Trigger::When(condition) => task.poll(condition),
            };
            if !eligible {
                continue;
            }
            let better = match best {
                None => true,
                Some((_, priority, seq)) => {
                    entry.priority > priority || (entry.priority == priority && entry.seq < seq)
                }
            };
            if better {
                best = Some((index, entry.priority, entry.seq));
            }
        }
        best.map(|(index, _, _)| index)
    }

    fn push(
        &mut self,
        trigger: Trigger<C>,
        step: S,
        priority: Priority,
        race: Option<u32>,
    ) -> Result<(), QueueFull> {
        let entry = Entry {
            seq: self.next_seq,
            trigger,
            step,
            priority,
            race,
        };
        self.next_seq = self.next_seq.wrapping_add(1);
        self.entries.push(entry).map_err(|_| {
            debug!("task list full at {} items", N);
            QueueFull
        })
    }

    fn push_item(&mut self, item: Item<S, C>, race: Option<u32>) -> Result<(), QueueFull> {
        match item {
            Item::Now(step, priority) => self.push(Trigger::At(self.now_ms), step, priority, race),
            Item::After(delay_ms, step) => self.push(
                Trigger::At(self.now_ms + u64::from(delay_ms)),
                step,
                Priority::Normal,
                race,
            ),
            Item::When(condition, step) => {
                self.push(Trigger::When(condition), step, Priority::Normal, race)
            }
        }
    }
}

impl<S, C, const N: usize> Default for TaskList<S, C, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, C, const N: usize> Scheduler<S, C> for TaskList<S, C, N> {
    fn now(&mut self, step: S, priority: Priority) -> Result<(), QueueFull> {
        self.push_item(Item::Now(step, priority), None)
    }

    fn after(&mut self, delay_ms: u32, step: S) -> Result<(), QueueFull> {
        self.push_item(Item::After(delay_ms, step), None)
    }

    fn race(&mut self, first: Item<S, C>, second: Item<S, C>) -> Result<(), QueueFull> {
        if self.entries.len() + 2 > N {
            debug!("task list full at {} items, race rejected", N);
            return Err(QueueFull);
        }
        let race = self.next_race;
        self.next_race = self.next_race.wrapping_add(1);
        self.push_item(first, Some(race))?;
        self.push_item(second, Some(race))
    }
}
