//! A headless backend that performs no rendering.
//!
//! `NullWindowing` and `NullDriver` accept every request, remember what they
//! were asked to do, and answer timer queries with made-up GPU times. This is
//! enough to check that a recording replays cleanly (handles resolve, binds
//! succeed, frames complete) without a display, and it's what the tests use to
//! see exactly which native operations the replayer performed.

use crate::driver::Driver;
use crate::glws::{Profile, Visual, Windowing, WindowingError};

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

/// A surface that exists only as a serial number.
#[derive(Debug)]
pub struct NullSurface {
    pub serial: u32,
    pub visual: Visual,
}

/// A context that exists only as a serial number.
#[derive(Debug)]
pub struct NullContext {
    pub serial: u32,
    /// The serial number of the context this one shares objects with.
    pub shared_with: Option<u32>,
    pub profile: Profile,
}

/// A windowing operation, as performed on a `NullWindowing`.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowingOp {
    CreateSurface { serial: u32 },
    CreateContext { serial: u32, shared_with: Option<u32>, profile: Profile },
    MakeCurrent { surface: Option<u32>, context: Option<u32>, ok: bool },
    SwapBuffers { surface: u32 },
}

#[derive(Debug, Default)]
pub struct NullWindowing {
    next_serial: u32,
    ops: Vec<WindowingOp>,
    fail_surface_creation: bool,
    fail_context_creation: bool,
    fail_make_current: bool,
}

impl NullWindowing {
    pub fn new() -> NullWindowing {
        NullWindowing::default()
    }

    /// Make subsequent surface creation requests fail.
    pub fn fail_surface_creation(&mut self, fail: bool) {
        self.fail_surface_creation = fail;
    }

    /// Make subsequent context creation requests fail.
    pub fn fail_context_creation(&mut self, fail: bool) {
        self.fail_context_creation = fail;
    }

    /// Make subsequent `make_current` requests fail.
    pub fn fail_make_current(&mut self, fail: bool) {
        self.fail_make_current = fail;
    }

    /// Every operation performed so far, in order.
    pub fn ops(&self) -> &[WindowingOp] {
        &self.ops
    }

    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    pub fn surfaces_created(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, WindowingOp::CreateSurface { .. }))
            .count()
    }

    pub fn contexts_created(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, WindowingOp::CreateContext { .. }))
            .count()
    }

    pub fn make_current_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, WindowingOp::MakeCurrent { .. }))
            .count()
    }

    pub fn swap_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, WindowingOp::SwapBuffers { .. }))
            .count()
    }

    fn next_serial(&mut self) -> u32 {
        self.next_serial += 1;
        self.next_serial
    }
}

impl Windowing for NullWindowing {
    type Surface = NullSurface;
    type Context = NullContext;

    fn create_surface(&mut self, visual: &Visual) -> Result<NullSurface, WindowingError> {
        if self.fail_surface_creation {
            return Err(WindowingError("null surface creation disabled".to_string()));
        }
        let serial = self.next_serial();
        self.ops.push(WindowingOp::CreateSurface { serial });
        Ok(NullSurface {
            serial,
            visual: *visual,
        })
    }

    fn create_context(
        &mut self,
        _visual: &Visual,
        share: Option<&NullContext>,
        profile: Profile,
    ) -> Result<NullContext, WindowingError> {
        if self.fail_context_creation {
            return Err(WindowingError("null context creation disabled".to_string()));
        }
        let serial = self.next_serial();
        let shared_with = share.map(|context| context.serial);
        self.ops.push(WindowingOp::CreateContext {
            serial,
            shared_with,
            profile,
        });
        Ok(NullContext {
            serial,
            shared_with,
            profile,
        })
    }

    fn make_current(
        &mut self,
        surface: Option<&NullSurface>,
        context: Option<&NullContext>,
    ) -> bool {
        // Like GLX: binding nothing to nothing releases the current context,
        // but a surface without a context (or vice versa) is an error.
        let ok = !self.fail_make_current && surface.is_some() == context.is_some();
        self.ops.push(WindowingOp::MakeCurrent {
            surface: surface.map(|s| s.serial),
            context: context.map(|c| c.serial),
            ok,
        });
        ok
    }

    fn swap_buffers(&mut self, surface: &NullSurface) {
        self.ops.push(WindowingOp::SwapBuffers {
            surface: surface.serial,
        });
    }
}

/// A driver operation, as performed on a `NullDriver`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DriverOp {
    Flush,
    BeginQuery(u32),
    EndQuery(u32),
    PollQuery(u32),
    ReadQuery(u32),
    DeleteQuery(u32),
    DrawArrays { mode: u32, first: i32, count: i32 },
    Clear(u32),
    ReadPixels { width: u32, height: u32 },
}

struct NullQuery {
    elapsed: u64,
    polls_remaining: u32,
}

#[derive(Default)]
pub struct NullDriver {
    ops: RefCell<Vec<DriverOp>>,
    queries: RefCell<HashMap<u32, NullQuery>>,
    next_query: Cell<u32>,
    active_query: Cell<Option<u32>>,

    /// The GPU time, in nanoseconds, that newly begun queries will report.
    elapsed: Cell<u64>,

    /// How many times a newly begun query reports "not yet" before its
    /// result becomes available.
    polls_until_ready: Cell<u32>,
}

impl NullDriver {
    pub fn new() -> NullDriver {
        NullDriver::default()
    }

    /// Set the GPU time that queries begun from now on will report.
    pub fn set_elapsed(&self, nanoseconds: u64) {
        self.elapsed.set(nanoseconds);
    }

    /// Set how many polls queries begun from now on take to become available.
    pub fn set_polls_until_ready(&self, polls: u32) {
        self.polls_until_ready.set(polls);
    }

    /// Every operation performed so far, in order.
    pub fn ops(&self) -> Vec<DriverOp> {
        self.ops.borrow().clone()
    }

    pub fn clear_ops(&self) {
        self.ops.borrow_mut().clear();
    }

    pub fn count(&self, matching: impl Fn(&DriverOp) -> bool) -> usize {
        self.ops.borrow().iter().filter(|op| matching(op)).count()
    }

    /// The number of query objects created and not yet deleted.
    pub fn live_queries(&self) -> usize {
        self.queries.borrow().len()
    }

    fn record(&self, op: DriverOp) {
        self.ops.borrow_mut().push(op);
    }
}

impl Driver for NullDriver {
    type Query = u32;

    fn flush(&self) {
        self.record(DriverOp::Flush);
    }

    fn begin_timer_query(&self) -> u32 {
        let query = self.next_query.get() + 1;
        self.next_query.set(query);
        self.queries.borrow_mut().insert(
            query,
            NullQuery {
                elapsed: self.elapsed.get(),
                polls_remaining: self.polls_until_ready.get(),
            },
        );
        self.active_query.set(Some(query));
        self.record(DriverOp::BeginQuery(query));
        query
    }

    fn end_timer_query(&self) {
        if let Some(query) = self.active_query.take() {
            self.record(DriverOp::EndQuery(query));
        }
    }

    fn query_available(&self, query: u32) -> bool {
        self.record(DriverOp::PollQuery(query));
        match self.queries.borrow_mut().get_mut(&query) {
            Some(state) if state.polls_remaining > 0 => {
                state.polls_remaining -= 1;
                false
            }
            Some(_) => true,
            // Deleted or never created: GL would raise an error; treat it as
            // ready so that nothing spins forever.
            None => true,
        }
    }

    fn query_result(&self, query: u32) -> u64 {
        self.record(DriverOp::ReadQuery(query));
        self.queries
            .borrow()
            .get(&query)
            .map_or(0, |state| state.elapsed)
    }

    fn delete_query(&self, query: u32) {
        self.record(DriverOp::DeleteQuery(query));
        self.queries.borrow_mut().remove(&query);
    }

    fn draw_arrays(&self, mode: u32, first: i32, count: i32) {
        self.record(DriverOp::DrawArrays { mode, first, count });
    }

    fn clear(&self, mask: u32) {
        self.record(DriverOp::Clear(mask));
    }

    fn read_pixels_rgba8(&self, width: u32, height: u32) -> Vec<u8> {
        self.record(DriverOp::ReadPixels { width, height });
        // Each row is filled with its own index, so flips are visible.
        (0..height)
            .flat_map(|row| std::iter::repeat(row as u8).take(width as usize * 4))
            .collect()
    }
}
