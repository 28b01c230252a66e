//! GPU timing for replayed draw calls.
//!
//! Each timed draw call gets a slot, numbered in stream order. If timings are
//! being collected and a context is bound, the slot holds a `TIME_ELAPSED`
//! query wrapped around the draw; otherwise it's a gap, whose time is zero.
//!
//! Query results arrive asynchronously, so slots are resolved in batches. The
//! slots from `last_query_index` up to `query_index` are in flight; draining
//! them first waits for the most recently issued query (the fence) to become
//! available. The GPU finishes queries in order, so once the fence is ready,
//! every earlier query is too. Draining happens at each buffer swap, and
//! whenever the number of slots in flight reaches its limit.

use crate::driver::Driver;

use std::ops::Range;
use std::str::FromStr;
use tracing::trace;

/// Timer query results are in nanoseconds; we report milliseconds.
pub const NANOSECONDS_TO_MILLISECONDS: f64 = 1.0e-6;

/// How to wait for the fence query.
///
/// Neither strategy gives up: reading a query result before the GPU has
/// produced it gets garbage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceWait {
    /// Poll in a tight loop.
    Spin,

    /// Yield the thread between polls.
    Yield,
}

impl Default for FenceWait {
    fn default() -> FenceWait {
        FenceWait::Spin
    }
}

impl FromStr for FenceWait {
    type Err = String;

    fn from_str(s: &str) -> Result<FenceWait, String> {
        match s {
            "spin" => Ok(FenceWait::Spin),
            "yield" => Ok(FenceWait::Yield),
            _ => Err(format!("unrecognized fence wait strategy: {:?}", s)),
        }
    }
}

pub struct GpuTimings<Q> {
    /// The query for each slot, until it's resolved. `None` for gaps.
    queries: Vec<Option<Q>>,

    /// The serial number of the call that occupies each slot.
    serials: Vec<usize>,

    /// Each slot's GPU time in milliseconds, once resolved. Zero until then,
    /// and forever for gaps.
    times: Vec<f64>,

    /// The first slot not yet resolved.
    last_query_index: usize,

    /// The next slot to be allocated.
    query_index: usize,

    /// The most recently issued query, if it hasn't been drained.
    last_gpu_query: Option<Q>,

    /// The query begun for the draw call now in progress.
    active: Option<Q>,

    max_in_flight: usize,
    fence_wait: FenceWait,
}

impl<Q: Copy + PartialEq + std::fmt::Debug> GpuTimings<Q> {
    /// Create an empty pipeline that drains early whenever `max_in_flight`
    /// slots are waiting. A limit of zero is treated as one.
    pub fn new(max_in_flight: usize, fence_wait: FenceWait) -> GpuTimings<Q> {
        GpuTimings {
            queries: vec![],
            serials: vec![],
            times: vec![],
            last_query_index: 0,
            query_index: 0,
            last_gpu_query: None,
            active: None,
            max_in_flight: max_in_flight.max(1),
            fence_wait,
        }
    }

    /// Start timing a draw call.
    pub fn begin<D>(&mut self, driver: &D)
    where
        D: Driver<Query = Q> + ?Sized,
    {
        debug_assert!(self.active.is_none(), "timer queries can't nest");
        self.active = Some(driver.begin_timer_query());
    }

    /// Finish timing the draw call begun by `begin`, giving it the next slot.
    ///
    /// If that leaves the limit of slots in flight, drain them now and return
    /// the range resolved.
    pub fn end<D>(&mut self, driver: &D, serial: usize) -> Option<Range<usize>>
    where
        D: Driver<Query = Q> + ?Sized,
    {
        let query = self.active.take();
        if query.is_some() {
            driver.end_timer_query();
            self.last_gpu_query = query;
        }
        self.push(query, serial);

        if self.in_flight() >= self.max_in_flight {
            Some(self.drain(driver))
        } else {
            None
        }
    }

    /// Give the timed call `serial` a slot with no query.
    ///
    /// Gaps own nothing on the GPU, so when the slots in flight are all gaps
    /// and reach the limit, they are resolved on the spot. A run that still
    /// holds queries is left for the next drain, since gaps are recorded
    /// exactly when no context is current to poll them with.
    pub fn record_gap(&mut self, serial: usize) {
        self.push(None, serial);
        if self.last_gpu_query.is_none() && self.in_flight() >= self.max_in_flight {
            trace!(slots = self.in_flight(), "resolving gap slots");
            self.last_query_index = self.query_index;
        }
    }

    fn push(&mut self, query: Option<Q>, serial: usize) {
        debug_assert_eq!(self.query_index, self.queries.len());
        self.queries.push(query);
        self.serials.push(serial);
        self.times.push(0.0);
        self.query_index += 1;
    }

    /// Wait for the in-flight slots' queries to complete, record their times,
    /// and delete them. Return the range of slots resolved.
    pub fn drain<D>(&mut self, driver: &D) -> Range<usize>
    where
        D: Driver<Query = Q> + ?Sized,
    {
        self.wait_for_fence(driver);

        let range = self.last_query_index..self.query_index;
        for slot in range.clone() {
            let elapsed = match self.queries[slot].take() {
                Some(query) => {
                    let ticks = driver.query_result(query);
                    driver.delete_query(query);
                    ticks as f64 * NANOSECONDS_TO_MILLISECONDS
                }
                None => 0.0,
            };
            self.times[slot] = elapsed;
            trace!(slot, serial = self.serials[slot], elapsed_ms = elapsed, "gpu time");
        }

        self.last_gpu_query = None;
        self.last_query_index = self.query_index;
        range
    }

    /// Give up on the in-flight slots without waiting for their results,
    /// deleting their queries. Their times stay zero. Return the range of
    /// slots abandoned.
    ///
    /// The queries must belong to the current context. Call this before
    /// releasing a context that is about to be destroyed.
    pub fn discard<D>(&mut self, driver: &D) -> Range<usize>
    where
        D: Driver<Query = Q> + ?Sized,
    {
        let range = self.last_query_index..self.query_index;
        for slot in range.clone() {
            if let Some(query) = self.queries[slot].take() {
                driver.delete_query(query);
            }
        }
        if !range.is_empty() {
            trace!(start = range.start, end = range.end, "discarded gpu time slots");
        }

        self.last_gpu_query = None;
        self.last_query_index = self.query_index;
        range
    }

    fn wait_for_fence<D>(&self, driver: &D)
    where
        D: Driver<Query = Q> + ?Sized,
    {
        let fence = match self.last_gpu_query {
            Some(fence) => fence,
            None => return,
        };
        while !driver.query_available(fence) {
            match self.fence_wait {
                FenceWait::Spin => std::hint::spin_loop(),
                FenceWait::Yield => std::thread::yield_now(),
            }
        }
    }

    /// The number of slots allocated but not yet resolved. This can pass the
    /// limit only while gaps pile up behind queries no context can drain.
    pub fn in_flight(&self) -> usize {
        self.query_index - self.last_query_index
    }

    pub fn last_query_index(&self) -> usize {
        self.last_query_index
    }

    pub fn query_index(&self) -> usize {
        self.query_index
    }

    pub fn last_gpu_query(&self) -> Option<Q> {
        self.last_gpu_query
    }

    /// Resolved GPU times in milliseconds, by slot.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// The serial number of the call in `slot`.
    pub fn serial(&self, slot: usize) -> Option<usize> {
        self.serials.get(slot).copied()
    }

    /// The total GPU time of the slots in `range`, in milliseconds.
    pub fn total(&self, range: Range<usize>) -> f64 {
        self.times[range].iter().sum()
    }
}
