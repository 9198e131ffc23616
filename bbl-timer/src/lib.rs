//
// BNG Blaster core - O(1) hierarchical timer wheel.
//
// Timers that share an identical `(sec, nsec)` duration are grouped into one
// bucket. Because the wheel's clock only ever moves forward, a bucket's
// FIFO queue stays sorted by expiration for free: a timer inserted later
// always expires later than one inserted earlier at the same duration. That
// invariant is what makes `walk` an O(1)-per-expired-timer operation instead
// of a sorted-structure scan.
//
// An intrusive doubly-linked list would give O(1) unlink on `change`, but
// that needs `unsafe` pointer juggling and this workspace forbids unsafe
// code (see the workspace lints). Timer identity is a generational-arena
// index instead: cheap to compare, impossible to use-after-free, at the
// cost of `change` being O(bucket length) rather than true O(1) unlink.
// That trade-off is recorded in DESIGN.md.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use generational_arena::{Arena, Index};
use rand::Rng;
use tracing::trace;

/// Opaque handle returned by [`TimerRoot::add`]. Stable across periodic
/// refires; stale after [`TimerRoot::del`] followed by a `gc` pass.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct TimerHandle(Index);

type BucketKey = (u64, u32);

struct Timer {
    name: &'static str,
    bucket: BucketKey,
    duration: Duration,
    expire: Instant,
    periodic: bool,
    delete: bool,
    callback: Option<Box<dyn FnMut()>>,
}

#[derive(Default)]
pub struct TimerRoot {
    arena: Arena<Timer>,
    buckets: HashMap<BucketKey, VecDeque<TimerHandle>>,
    /// Timers popped off a bucket during `walk` that are awaiting a `gc`
    /// sweep before their storage is actually released, matching the
    /// source's two-phase "mark, then GC frees" lifecycle.
    gc: Vec<TimerHandle>,
}

fn bucket_key(d: Duration) -> BucketKey {
    (d.as_secs(), d.subsec_nanos())
}

impl TimerRoot {
    pub fn new() -> Self {
        TimerRoot::default()
    }

    /// Number of live buckets (distinct timer durations in use).
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Number of timers awaiting garbage collection.
    pub fn gc_pending(&self) -> usize {
        self.gc.len()
    }

    fn insert(
        &mut self,
        name: &'static str,
        duration: Duration,
        expire: Instant,
        periodic: bool,
        cb: Box<dyn FnMut()>,
    ) -> TimerHandle {
        let key = bucket_key(duration);
        let timer = Timer {
            name,
            bucket: key,
            duration,
            expire,
            periodic,
            delete: false,
            callback: Some(cb),
        };
        let index = self.arena.insert(timer);
        let handle = TimerHandle(index);
        self.buckets.entry(key).or_default().push_back(handle);
        handle
    }

    /// Adds a one-shot timer expiring `duration` after `now`.
    pub fn add(
        &mut self,
        now: Instant,
        name: &'static str,
        duration: Duration,
        cb: impl FnMut() + 'static,
    ) -> TimerHandle {
        self.insert(name, duration, now + duration, false, Box::new(cb))
    }

    /// Adds a periodic timer that re-arms itself for `duration` every time
    /// it fires.
    pub fn add_periodic(
        &mut self,
        now: Instant,
        name: &'static str,
        duration: Duration,
        cb: impl FnMut() + 'static,
    ) -> TimerHandle {
        self.insert(name, duration, now + duration, true, Box::new(cb))
    }

    /// Marks a timer for deletion. The timer's callback is guaranteed never
    /// to run again, even if it already reached the head of its bucket
    /// before `del` was called (I-TIMER).
    pub fn del(&mut self, handle: TimerHandle) {
        if let Some(timer) = self.arena.get_mut(handle.0) {
            timer.delete = true;
        }
    }

    /// Reprograms a live timer to a new duration, preserving its handle.
    pub fn change(&mut self, now: Instant, handle: TimerHandle, duration: Duration) {
        let Some(timer) = self.arena.get_mut(handle.0) else {
            return;
        };
        let old_key = timer.bucket;
        if let Some(bucket) = self.buckets.get_mut(&old_key) {
            bucket.retain(|h| *h != handle);
        }
        let new_key = bucket_key(duration);
        timer.bucket = new_key;
        timer.duration = duration;
        timer.expire = now + duration;
        self.buckets.entry(new_key).or_default().push_back(handle);
    }

    /// Spreads the initial expirations of every timer currently sitting in
    /// the bucket for `duration` uniformly across `[now, now+duration)`, so
    /// that timers armed together (e.g. thousands of sessions' keepalives)
    /// do not all fire on the same tick.
    pub fn smear_bucket(&mut self, now: Instant, duration: Duration) {
        let key = bucket_key(duration);
        let Some(bucket) = self.buckets.get(&key) else {
            return;
        };
        let mut handles: Vec<TimerHandle> = bucket.iter().copied().collect();
        let mut rng = rand::rng();
        for &handle in &handles {
            if let Some(timer) = self.arena.get_mut(handle.0) {
                let jitter_nanos = if duration.is_zero() {
                    0
                } else {
                    rng.random_range(0..duration.as_nanos().min(u64::MAX as u128) as u64)
                };
                timer.expire = now + Duration::from_nanos(jitter_nanos);
            }
        }
        // Smearing reassigns expirations independently of insertion order,
        // so the bucket queue must be re-sorted to restore the "head is
        // nearest expiry" invariant that `walk` relies on. This is the one
        // place in the wheel that is not O(1), and it only ever runs once,
        // right after configuration load, before any session is active.
        let arena = &self.arena;
        handles.sort_by_key(|h| arena.get(h.0).map(|t| t.expire));
        self.buckets.insert(key, handles.into_iter().collect());
    }

    /// Applies [`smear_bucket`](Self::smear_bucket) to every bucket. Called
    /// once after configuration finishes loading.
    pub fn smear_all_buckets(&mut self, now: Instant) {
        let durations: Vec<Duration> = self
            .arena
            .iter()
            .map(|(_, t)| t.duration)
            .collect();
        let mut seen = std::collections::HashSet::new();
        for duration in durations {
            if seen.insert(bucket_key(duration)) {
                self.smear_bucket(now, duration);
            }
        }
    }

    /// Inspects the head of every bucket and fires whatever has expired by
    /// `now`. O(1) per expired timer; buckets with nothing due are skipped
    /// in O(1) as well since only the head is examined.
    pub fn walk(&mut self, now: Instant) {
        let keys: Vec<BucketKey> = self.buckets.keys().copied().collect();
        for key in keys {
            loop {
                let Some(bucket) = self.buckets.get_mut(&key) else {
                    break;
                };
                let Some(&handle) = bucket.front() else {
                    break;
                };
                let expire = match self.arena.get(handle.0) {
                    Some(t) => t.expire,
                    None => {
                        bucket.pop_front();
                        continue;
                    }
                };
                if expire > now {
                    break;
                }
                bucket.pop_front();
                self.fire(handle, now);
            }
        }
    }

    fn fire(&mut self, handle: TimerHandle, now: Instant) {
        let (delete, periodic, duration, name, mut cb) = {
            let Some(timer) = self.arena.get_mut(handle.0) else {
                return;
            };
            (
                timer.delete,
                timer.periodic,
                timer.duration,
                timer.name,
                timer.callback.take(),
            )
        };
        if delete {
            trace!(timer = name, "skipping deleted timer");
            self.gc.push(handle);
            return;
        }
        if let Some(cb) = cb.as_mut() {
            cb();
        }
        if periodic {
            if let Some(timer) = self.arena.get_mut(handle.0) {
                if timer.delete {
                    self.gc.push(handle);
                    return;
                }
                timer.callback = cb;
                timer.expire = now + duration;
                self.buckets.entry(timer.bucket).or_default().push_back(handle);
            }
        } else {
            self.gc.push(handle);
        }
    }

    /// Frees storage for every timer that fired (or was deleted) since the
    /// last sweep. Keeping this separate from `walk` mirrors the source's
    /// "mark, then GC frees" split and keeps `walk` itself allocation-free
    /// on the hot path.
    pub fn gc(&mut self) {
        for handle in self.gc.drain(..) {
            self.arena.remove(handle.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn one_shot_fires_once() {
        let mut root = TimerRoot::new();
        let now = Instant::now();
        let fired = Rc::new(RefCell::new(0));
        let fired_cb = fired.clone();
        root.add(now, "t", Duration::from_millis(100), move || {
            *fired_cb.borrow_mut() += 1;
        });
        root.walk(now);
        assert_eq!(*fired.borrow(), 0);
        root.walk(now + Duration::from_millis(150));
        assert_eq!(*fired.borrow(), 1);
        root.walk(now + Duration::from_millis(300));
        assert_eq!(*fired.borrow(), 1);
    }

    #[test]
    fn periodic_keeps_firing() {
        let mut root = TimerRoot::new();
        let now = Instant::now();
        let fired = Rc::new(RefCell::new(0));
        let fired_cb = fired.clone();
        root.add_periodic(now, "p", Duration::from_millis(100), move || {
            *fired_cb.borrow_mut() += 1;
        });
        let mut t = now;
        for _ in 0..5 {
            t += Duration::from_millis(100);
            root.walk(t);
        }
        assert_eq!(*fired.borrow(), 5);
    }

    #[test]
    fn deleted_timer_never_fires() {
        let mut root = TimerRoot::new();
        let now = Instant::now();
        let fired = Rc::new(RefCell::new(0));
        let fired_cb = fired.clone();
        let handle = root.add(now, "t", Duration::from_millis(100), move || {
            *fired_cb.borrow_mut() += 1;
        });
        root.del(handle);
        root.walk(now + Duration::from_millis(200));
        assert_eq!(*fired.borrow(), 0);
        root.gc();
        assert_eq!(root.gc_pending(), 0);
    }

    #[test]
    fn gc_defers_free_until_swept() {
        let mut root = TimerRoot::new();
        let now = Instant::now();
        root.add(now, "t", Duration::from_millis(10), || {});
        root.walk(now + Duration::from_millis(10));
        assert_eq!(root.gc_pending(), 1);
        root.gc();
        assert_eq!(root.gc_pending(), 0);
    }

    #[test]
    fn change_preserves_handle_identity() {
        let mut root = TimerRoot::new();
        let now = Instant::now();
        let fired = Rc::new(RefCell::new(0));
        let fired_cb = fired.clone();
        let handle = root.add(now, "t", Duration::from_millis(100), move || {
            *fired_cb.borrow_mut() += 1;
        });
        root.change(now, handle, Duration::from_millis(10));
        root.walk(now + Duration::from_millis(20));
        assert_eq!(*fired.borrow(), 1);
        root.del(handle);
        root.walk(now + Duration::from_millis(200));
        assert_eq!(*fired.borrow(), 1);
    }

    #[test]
    fn smear_spreads_within_interval() {
        let mut root = TimerRoot::new();
        let now = Instant::now();
        for _ in 0..20 {
            root.add(now, "t", Duration::from_millis(100), || {});
        }
        root.smear_all_buckets(now);
        // None should have jumped past the bucket's own interval.
        root.walk(now + Duration::from_millis(100));
        assert_eq!(root.gc_pending(), 20);
    }
}
