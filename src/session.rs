//! Replaying recorded calls.
//!
//! A `ReplaySession` holds everything a replay needs: the windowing system and
//! driver to replay against, the replay-side stand-ins for recorded handles,
//! the current binding, the GPU timing pipeline, and frame statistics. Calls
//! are replayed strictly in recorded order on the calling thread.

use crate::binding::{CurrentBinding, Transition};
use crate::call::Call;
use crate::dispatch::{self, Disposition};
use crate::driver::Driver;
use crate::error::Error;
use crate::frames::{FrameReport, FrameStats};
use crate::glws::{Profile, Windowing};
use crate::options::ReplayOptions;
use crate::registry::HandleRegistry;
use crate::timing::GpuTimings;
use crate::var::{Str, Var};

use std::collections::HashSet;
use std::ops::Range;
use tracing::{debug, trace, warn};

pub struct ReplaySession<W: Windowing, D: Driver> {
    windowing: W,
    driver: D,
    options: ReplayOptions,
    registry: HandleRegistry<W>,
    binding: CurrentBinding,
    timings: GpuTimings<D::Query>,
    frames: FrameStats,

    /// Names of unsupported functions we've already warned about.
    unsupported: HashSet<String>,
}

impl<W: Windowing, D: Driver> ReplaySession<W, D> {
    pub fn new(windowing: W, driver: D, options: ReplayOptions) -> ReplaySession<W, D> {
        let (width, height) = options.window_size;
        ReplaySession {
            registry: HandleRegistry::new(options.visual(), options.default_profile),
            binding: CurrentBinding::new(),
            timings: GpuTimings::new(options.max_in_flight_queries, options.fence_wait),
            frames: FrameStats::new(options.snapshot_prefix.clone(), width, height),
            unsupported: HashSet::new(),
            windowing,
            driver,
            options,
        }
    }

    /// Replay `calls` in order. `variable` is the recording's variable-length
    /// data, which calls refer to by offset.
    pub fn replay(&mut self, calls: &[Call], variable: &[u8]) -> Result<(), Error> {
        for (serial, call) in calls.iter().enumerate() {
            self.replay_one(call, variable, serial)?;
        }
        Ok(())
    }

    pub fn replay_one(&mut self, call: &Call, variable: &[u8], serial: usize) -> Result<(), Error> {
        let call = *call;
        use Call::*;
        match call {
            create_context { share_list, returned } => {
                let profile = self.options.default_profile;
                self.create_context(serial, returned, share_list, profile)
            }
            create_new_context { share_list, returned, .. } => {
                let profile = self.options.default_profile;
                self.create_context(serial, returned, share_list, profile)
            }
            create_context_attribs { share_context, attrib_list, returned, .. } => {
                let attribs: Vec<i32> = argument(attrib_list, variable, serial)?;
                let profile = Profile::from_attrib_list(&attribs, self.options.default_profile);
                self.create_context(serial, returned, share_context, profile)
            }
            destroy_context { ctx } => {
                self.destroy_context(ctx);
                Ok(())
            }
            make_current { drawable, ctx, .. } => self.make_current(drawable, ctx),
            // The read drawable only matters for reads from the window, which
            // replay reproduces from the draw drawable.
            make_context_current { draw, ctx, .. } => self.make_current(draw, ctx),
            swap_buffers { drawable } => self.swap_buffers(drawable),
            draw_arrays { mode, first, count } => {
                self.timed(serial, |driver| driver.draw_arrays(mode, first, count));
                Ok(())
            }
            clear { mask } => {
                self.timed(serial, |driver| driver.clear(mask));
                Ok(())
            }
            flush {} => {
                if self.binding.is_bound() {
                    self.driver.flush();
                }
                Ok(())
            }
            other { name } => self.other(name, variable, serial),
        }
    }

    /// Create a context and file it under `returned`, the handle the
    /// recorded process got back.
    fn create_context(
        &mut self,
        serial: usize,
        returned: u64,
        share_id: u64,
        profile: Profile,
    ) -> Result<(), Error> {
        if returned == 0 {
            debug!("call {}: recorded context creation failed, creating nothing", serial);
            return Ok(());
        }

        // A recording can reuse the handle of a context it destroyed without
        // telling us. If that handle is current, it's about to be replaced.
        self.release_if_current(returned);

        let context = self
            .registry
            .create_context(&mut self.windowing, returned, share_id, profile)?;
        self.registry.register_context(returned, context);
        debug!(
            "call {}: created {} context for 0x{:x}, sharing with 0x{:x}",
            serial, profile, returned, share_id
        );
        Ok(())
    }

    fn destroy_context(&mut self, id: u64) {
        self.release_if_current(id);
        self.registry.destroy_context(id);
    }

    fn release_if_current(&mut self, id: u64) {
        let key = self.registry.lookup_context(id);
        if key.is_some() && self.binding.context() == key {
            debug!("releasing current context 0x{:x}", id);
            // Queries die with their context; delete them while it's current.
            if self.options.gpu_timings {
                let abandoned = self.timings.discard(&self.driver);
                if !abandoned.is_empty() {
                    debug!("abandoned {} timer queries with context 0x{:x}", abandoned.len(), id);
                }
            }
            self.binding.release(&mut self.windowing);
        }
    }

    fn make_current(&mut self, drawable: u64, ctx: u64) -> Result<(), Error> {
        let surface = self.registry.resolve_surface(&mut self.windowing, drawable)?;
        let context = self.registry.resolve_context(&mut self.windowing, ctx, 0)?;

        let frames = &mut self.frames;
        let driver = &self.driver;
        let transition = self.binding.make_current(
            &mut self.windowing,
            driver,
            &self.registry,
            surface,
            context,
            || frames.frame_complete(driver, true),
        )?;

        if transition == Transition::Unbound && (drawable, ctx) != (0, 0) {
            debug!(
                "binding context 0x{:x} to drawable 0x{:x} left nothing current",
                ctx, drawable
            );
        }
        Ok(())
    }

    fn swap_buffers(&mut self, drawable: u64) -> Result<(), Error> {
        // Count the frame when its commands have been submitted, not when it
        // reaches the screen.
        let bound = self.binding.is_bound();
        self.frames.frame_complete(&self.driver, bound)?;

        // GLX swaps the drawable named in the call, but the recorded process
        // always swapped the one it was drawing to.
        let registry = &self.registry;
        let surface = self.binding.surface().and_then(|key| registry.surface(key));
        match surface {
            Some(surface) if self.options.double_buffer => self.windowing.swap_buffers(surface),
            Some(_) => self.driver.flush(),
            None => warn!(
                "glXSwapBuffers on drawable 0x{:x} with nothing current; not swapping",
                drawable
            ),
        }

        // Queries can only be polled with a context current; leave them in
        // flight until a later swap or `finish` has one.
        if self.options.gpu_timings && bound {
            let range = self.timings.drain(&self.driver);
            self.record_gpu_times(range);
        }
        Ok(())
    }

    /// Replay a draw call, timing it if requested.
    fn timed<F: FnOnce(&D)>(&mut self, serial: usize, draw: F) {
        if !self.binding.is_bound() {
            debug!("call {}: draw call with nothing current, skipping", serial);
            if self.options.gpu_timings {
                self.timings.record_gap(serial);
            }
            return;
        }

        if !self.options.gpu_timings {
            draw(&self.driver);
            return;
        }

        self.timings.begin(&self.driver);
        draw(&self.driver);
        if let Some(range) = self.timings.end(&self.driver, serial) {
            debug!("call {}: drained timer queries early", serial);
            self.record_gpu_times(range);
        }
    }

    fn record_gpu_times(&mut self, range: Range<usize>) {
        if range.is_empty() {
            return;
        }
        let total = self.timings.total(range.clone());
        trace!(
            "resolved {} timer queries, {:.3} ms of GPU time",
            range.len(),
            total
        );
        self.frames.record_gpu_time(total);
    }

    fn other(&mut self, name: Var<Str>, variable: &[u8], serial: usize) -> Result<(), Error> {
        let name: &str = argument(name, variable, serial)?;
        match dispatch::lookup(name) {
            Some(Disposition::Ignore) => trace!("call {}: ignoring {}", serial, name),
            // Recorded by name alone, we have no arguments to replay it with.
            Some(Disposition::Replay) | None => {
                if self.unsupported.insert(name.to_owned()) {
                    warn!("call {}: unsupported call {}", serial, name);
                }
            }
        }
        Ok(())
    }

    /// Resolve any timer queries still in flight, and report on the replay.
    pub fn finish(&mut self) -> FrameReport {
        if self.options.gpu_timings && self.binding.is_bound() {
            let range = self.timings.drain(&self.driver);
            self.record_gpu_times(range);
        }
        self.frames.finish()
    }

    pub fn options(&self) -> &ReplayOptions {
        &self.options
    }

    pub fn windowing(&self) -> &W {
        &self.windowing
    }

    pub fn windowing_mut(&mut self) -> &mut W {
        &mut self.windowing
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn registry(&self) -> &HandleRegistry<W> {
        &self.registry
    }

    pub fn binding(&self) -> &CurrentBinding {
        &self.binding
    }

    pub fn timings(&self) -> &GpuTimings<D::Query> {
        &self.timings
    }

    pub fn frames(&self) -> &FrameStats {
        &self.frames
    }

    /// The names of unsupported functions this replay has encountered.
    pub fn unsupported_calls(&self) -> impl Iterator<Item = &str> {
        self.unsupported.iter().map(String::as_str)
    }
}

fn argument<'b, T, U>(var: Var<T>, variable: &'b [u8], serial: usize) -> Result<U, Error>
where
    T: crate::var::DeserializeAs<'b, U>,
{
    var.get(variable)
        .map_err(|source| Error::Argument { serial, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::Binding;
    use crate::glws::{Api, GLX_CONTEXT_MAJOR_VERSION_ARB, GLX_CONTEXT_MINOR_VERSION_ARB};
    use crate::null::{DriverOp, NullDriver, NullWindowing, WindowingOp};
    use crate::var::write_var;

    const WINDOW: u64 = 0x400001;

    fn session(options: ReplayOptions) -> ReplaySession<NullWindowing, NullDriver> {
        ReplaySession::new(NullWindowing::new(), NullDriver::new(), options)
    }

    fn run(session: &mut ReplaySession<NullWindowing, NullDriver>, calls: &[Call], variable: &[u8]) {
        session.replay(calls, variable).unwrap();
    }

    #[test]
    fn one_frame() {
        let mut s = session(ReplayOptions::default());
        run(&mut s, &[
            Call::create_context { share_list: 0, returned: 0xaaa },
            Call::make_current { drawable: WINDOW, ctx: 0xaaa, returned: 1 },
            Call::clear { mask: 0x4000 },
            Call::draw_arrays { mode: 4, first: 0, count: 3 },
            Call::swap_buffers { drawable: WINDOW },
        ], &[]);

        assert!(s.binding().is_bound());
        assert_eq!(s.frames().frames(), 1);
        assert_eq!(s.windowing().swap_count(), 1);
        assert_eq!(s.windowing().contexts_created(), 1);
        assert_eq!(s.windowing().surfaces_created(), 1);
        assert_eq!(
            s.driver().ops(),
            vec![
                DriverOp::Clear(0x4000),
                DriverOp::DrawArrays { mode: 4, first: 0, count: 3 },
            ]
        );
    }

    #[test]
    fn failed_creation_creates_nothing() {
        let mut s = session(ReplayOptions::default());
        run(&mut s, &[
            Call::create_context { share_list: 0, returned: 0 },
            Call::create_new_context { config: 1, render_type: 0x8014, share_list: 0, returned: 0 },
        ], &[]);
        assert_eq!(s.registry().context_count(), 0);
        assert!(s.windowing().ops().is_empty());
    }

    #[test]
    fn created_contexts_share() {
        let mut s = session(ReplayOptions::default());
        run(&mut s, &[
            Call::create_context { share_list: 0, returned: 0xaaa },
            Call::create_new_context { config: 1, render_type: 0x8014, share_list: 0xaaa, returned: 0xbbb },
        ], &[]);
        assert_eq!(
            s.windowing().ops()[1],
            WindowingOp::CreateContext { serial: 2, shared_with: Some(1), profile: Profile::COMPAT }
        );
    }

    #[test]
    fn attrib_list_selects_profile() {
        let mut variable = vec![];
        let attribs = vec![GLX_CONTEXT_MAJOR_VERSION_ARB, 3, GLX_CONTEXT_MINOR_VERSION_ARB, 3, 0];
        let attrib_list = write_var(&attribs, &mut variable).unwrap();

        let mut s = session(ReplayOptions::default());
        run(&mut s, &[
            Call::create_context_attribs { config: 1, share_context: 0, attrib_list, returned: 0xaaa },
        ], &variable);
        let expected = Profile { api: Api::Gl, major: 3, minor: 3, core: true };
        assert_eq!(
            s.windowing().ops(),
            &[WindowingOp::CreateContext { serial: 1, shared_with: None, profile: expected }]
        );
    }

    #[test]
    fn bad_argument_offset_is_an_error() {
        let mut s = session(ReplayOptions::default());
        let call = Call::create_context_attribs {
            config: 1,
            share_context: 0,
            attrib_list: Var::new(1000),
            returned: 0xaaa,
        };
        match s.replay(&[call], &[0; 8]) {
            Err(Error::Argument { serial: 0, .. }) => (),
            other => panic!("expected argument error, got {:?}", other),
        }
    }

    #[test]
    fn destroying_current_context_unbinds() {
        let mut s = session(ReplayOptions::default());
        run(&mut s, &[
            Call::create_context { share_list: 0, returned: 0xaaa },
            Call::make_current { drawable: WINDOW, ctx: 0xaaa, returned: 1 },
            Call::destroy_context { ctx: 0xaaa },
        ], &[]);
        assert_eq!(s.binding().state(), Binding::Unbound);
        assert_eq!(s.registry().context_count(), 0);
        assert_eq!(
            s.windowing().ops().last(),
            Some(&WindowingOp::MakeCurrent { surface: None, context: None, ok: true })
        );

        // Destroying unknown contexts is harmless.
        run(&mut s, &[
            Call::destroy_context { ctx: 0xaaa },
            Call::destroy_context { ctx: 0 },
        ], &[]);
    }

    #[test]
    fn recreating_current_context_unbinds() {
        let mut s = session(ReplayOptions::default());
        run(&mut s, &[
            Call::create_context { share_list: 0, returned: 0xaaa },
            Call::make_current { drawable: WINDOW, ctx: 0xaaa, returned: 1 },
            Call::create_context { share_list: 0, returned: 0xaaa },
        ], &[]);
        assert!(!s.binding().is_bound());
        assert_eq!(s.registry().context_count(), 1);

        // Binding the new context is an effective switch.
        run(&mut s, &[Call::make_current { drawable: WINDOW, ctx: 0xaaa, returned: 1 }], &[]);
        assert!(s.binding().is_bound());
    }

    #[test]
    fn sharers_outlive_their_share_context() {
        let mut s = session(ReplayOptions::default());
        run(&mut s, &[
            Call::create_context { share_list: 0, returned: 0xaaa },
            Call::create_context { share_list: 0xaaa, returned: 0xbbb },
            Call::destroy_context { ctx: 0xaaa },
            Call::make_current { drawable: WINDOW, ctx: 0xbbb, returned: 1 },
            Call::draw_arrays { mode: 4, first: 0, count: 3 },
            Call::swap_buffers { drawable: WINDOW },
        ], &[]);
        assert!(s.binding().is_bound());
        assert_eq!(s.binding().context(), s.registry().lookup_context(0xbbb));
        assert_eq!(s.windowing().swap_count(), 1);
        assert_eq!(s.windowing().contexts_created(), 2);
        assert_eq!(s.driver().count(|op| matches!(op, DriverOp::DrawArrays { .. })), 1);

        // Sharing with the destroyed handle gets a new context in its place.
        run(&mut s, &[Call::create_context { share_list: 0xaaa, returned: 0xccc }], &[]);
        assert_eq!(s.windowing().contexts_created(), 4);
        assert_eq!(
            &s.windowing().ops()[5..],
            &[
                WindowingOp::CreateContext { serial: 4, shared_with: None, profile: Profile::COMPAT },
                WindowingOp::CreateContext { serial: 5, shared_with: Some(4), profile: Profile::COMPAT },
            ]
        );
        assert_eq!(s.registry().context_count(), 3);
    }

    #[test]
    fn swap_with_nothing_current() {
        let mut s = session(ReplayOptions::default());
        run(&mut s, &[
            Call::draw_arrays { mode: 4, first: 0, count: 3 },
            Call::swap_buffers { drawable: WINDOW },
        ], &[]);
        assert_eq!(s.frames().frames(), 1);
        assert_eq!(s.windowing().swap_count(), 0);
        assert!(s.driver().ops().is_empty());
    }

    #[test]
    fn make_context_current_ignores_read_drawable() {
        let mut s = session(ReplayOptions::default());
        run(&mut s, &[
            Call::make_context_current { draw: WINDOW, read: 0x500001, ctx: 0xaaa, returned: 1 },
        ], &[]);
        assert_eq!(s.windowing().surfaces_created(), 1);
        assert_eq!(
            s.windowing().ops().last(),
            Some(&WindowingOp::MakeCurrent { surface: Some(1), context: Some(2), ok: true })
        );
    }

    #[test]
    fn single_buffered_frames() {
        let options = ReplayOptions { double_buffer: false, ..ReplayOptions::default() };
        let mut s = session(options);
        run(&mut s, &[
            Call::make_current { drawable: WINDOW, ctx: 0xaaa, returned: 1 },
            Call::make_current { drawable: WINDOW, ctx: 0xbbb, returned: 1 },
            Call::swap_buffers { drawable: WINDOW },
        ], &[]);

        // One frame from the switch, one from the swap.
        assert_eq!(s.frames().frames(), 2);
        assert_eq!(s.windowing().swap_count(), 0);
        assert_eq!(s.driver().count(|op| *op == DriverOp::Flush), 2);
    }

    #[test]
    fn gpu_times_are_collected_at_swaps() {
        let options = ReplayOptions { gpu_timings: true, ..ReplayOptions::default() };
        let mut s = session(options);
        s.driver().set_elapsed(2_000_000);
        run(&mut s, &[
            Call::clear { mask: 0x4000 },
            Call::make_current { drawable: WINDOW, ctx: 0xaaa, returned: 1 },
            Call::clear { mask: 0x4000 },
            Call::draw_arrays { mode: 4, first: 0, count: 3 },
            Call::swap_buffers { drawable: WINDOW },
        ], &[]);

        let timings = s.timings();
        assert_eq!(timings.query_index(), 3);
        assert_eq!(timings.last_query_index(), 3);
        assert_eq!(timings.serial(0), Some(0));
        assert_eq!(timings.times()[0], 0.0);
        assert!((s.frames().gpu_ms() - 4.0).abs() < 1e-9);
        assert_eq!(s.driver().live_queries(), 0);

        // Nothing timed since the last swap: nothing to wait for.
        s.driver().clear_ops();
        run(&mut s, &[Call::swap_buffers { drawable: WINDOW }], &[]);
        assert_eq!(s.driver().count(|op| matches!(op, DriverOp::PollQuery(_))), 0);
    }

    #[test]
    fn destroying_current_context_abandons_queries() {
        let options = ReplayOptions { gpu_timings: true, ..ReplayOptions::default() };
        let mut s = session(options);
        s.driver().set_elapsed(1_000_000);
        run(&mut s, &[
            Call::make_current { drawable: WINDOW, ctx: 0xaaa, returned: 1 },
            Call::draw_arrays { mode: 4, first: 0, count: 3 },
        ], &[]);
        s.driver().clear_ops();

        run(&mut s, &[Call::destroy_context { ctx: 0xaaa }], &[]);
        assert_eq!(s.driver().ops(), vec![DriverOp::DeleteQuery(1)]);
        assert_eq!(s.timings().in_flight(), 0);

        // The swap counts the frame but touches no queries.
        s.driver().clear_ops();
        run(&mut s, &[Call::swap_buffers { drawable: WINDOW }], &[]);
        assert!(s.driver().ops().is_empty());
        assert_eq!(s.frames().frames(), 1);
        assert_eq!(s.frames().gpu_ms(), 0.0);
        assert_eq!(s.driver().live_queries(), 0);
    }

    #[test]
    fn unbound_swap_leaves_queries_in_flight() {
        let options = ReplayOptions { gpu_timings: true, ..ReplayOptions::default() };
        let mut s = session(options);
        s.driver().set_elapsed(1_000_000);
        run(&mut s, &[
            Call::make_current { drawable: WINDOW, ctx: 0xaaa, returned: 1 },
            Call::draw_arrays { mode: 4, first: 0, count: 3 },
            Call::make_current { drawable: 0, ctx: 0, returned: 1 },
            Call::draw_arrays { mode: 4, first: 0, count: 3 },
            Call::swap_buffers { drawable: WINDOW },
        ], &[]);
        assert_eq!(s.driver().count(|op| matches!(op, DriverOp::PollQuery(_) | DriverOp::ReadQuery(_))), 0);
        assert_eq!(s.timings().in_flight(), 2);
        assert_eq!(s.timings().last_gpu_query(), Some(1));

        // Once something is current again, the next swap resolves them.
        run(&mut s, &[
            Call::make_current { drawable: WINDOW, ctx: 0xaaa, returned: 1 },
            Call::swap_buffers { drawable: WINDOW },
        ], &[]);
        assert_eq!(s.timings().in_flight(), 0);
        assert_eq!(s.timings().last_query_index(), 2);
        assert!((s.frames().gpu_ms() - 1.0).abs() < 1e-9);
        assert_eq!(s.driver().live_queries(), 0);
    }

    #[test]
    fn finish_drains_leftover_queries() {
        let options = ReplayOptions { gpu_timings: true, ..ReplayOptions::default() };
        let mut s = session(options);
        s.driver().set_elapsed(500_000);
        run(&mut s, &[
            Call::make_current { drawable: WINDOW, ctx: 0xaaa, returned: 1 },
            Call::clear { mask: 0x4000 },
        ], &[]);
        let report = s.finish();
        assert_eq!(report.frames, 0);
        assert!((report.gpu_ms.unwrap() - 0.5).abs() < 1e-9);
        assert_eq!(s.driver().live_queries(), 0);
    }

    #[test]
    fn unsupported_calls_warn_once() {
        let mut variable = vec![];
        let ignored = write_var("glXQueryVersion", &mut variable).unwrap();
        let pixmap = write_var("glXCreateGLXPixmap", &mut variable).unwrap();
        let font = write_var("glXUseXFont", &mut variable).unwrap();

        let mut s = session(ReplayOptions::default());
        run(&mut s, &[
            Call::other { name: ignored },
            Call::other { name: pixmap },
            Call::other { name: font },
            Call::other { name: pixmap },
        ], &variable);

        let mut unsupported: Vec<&str> = s.unsupported_calls().collect();
        unsupported.sort();
        assert_eq!(unsupported, vec!["glXCreateGLXPixmap", "glXUseXFont"]);
    }

    #[test]
    fn flush_only_when_current() {
        let mut s = session(ReplayOptions::default());
        run(&mut s, &[
            Call::flush {},
            Call::make_current { drawable: WINDOW, ctx: 0xaaa, returned: 1 },
            Call::flush {},
        ], &[]);
        assert_eq!(s.driver().ops(), vec![DriverOp::Flush]);
    }
}
