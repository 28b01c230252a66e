//! Tracking the current surface and context.
//!
//! Recordings bind the same pair over and over, often through different
//! recorded handles that resolve to the same replay-side objects. Only an
//! effective switch touches the driver: the outgoing pair is flushed, and if
//! it was single-buffered, the switch also marks the end of a frame, since
//! there will be no swap to do it.

use crate::driver::Driver;
use crate::error::Error;
use crate::glws::Windowing;
use crate::handles::{ContextKey, SurfaceKey};
use crate::registry::HandleRegistry;

use tracing::debug;

/// What is current.
///
/// A surface without a context, or a context without a surface, is not a
/// state we can be in: a partial bind leaves us `Unbound`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Unbound,
    Bound {
        surface: SurfaceKey,
        context: ContextKey,
    },
}

impl Binding {
    fn as_pair(self) -> (Option<SurfaceKey>, Option<ContextKey>) {
        match self {
            Binding::Unbound => (None, None),
            Binding::Bound { surface, context } => (Some(surface), Some(context)),
        }
    }
}

/// The outcome of a `make_current` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The requested pair was already current. Nothing was done.
    Unchanged,

    /// The requested pair is now current.
    Bound,

    /// The bind failed, or asked for a partial binding. Nothing is current.
    Unbound,
}

pub struct CurrentBinding {
    state: Binding,
}

impl CurrentBinding {
    pub fn new() -> CurrentBinding {
        CurrentBinding {
            state: Binding::Unbound,
        }
    }

    pub fn state(&self) -> Binding {
        self.state
    }

    pub fn is_bound(&self) -> bool {
        self.state != Binding::Unbound
    }

    pub fn surface(&self) -> Option<SurfaceKey> {
        self.state.as_pair().0
    }

    pub fn context(&self) -> Option<ContextKey> {
        self.state.as_pair().1
    }

    /// Make `context` current on `surface`.
    ///
    /// If a pair is bound and it is not the one requested, flush it first,
    /// and if our surfaces are single-buffered, call `frame_complete` too.
    /// Errors from `frame_complete` are passed along, and leave the binding as
    /// it was.
    pub fn make_current<W, D, F>(
        &mut self,
        windowing: &mut W,
        driver: &D,
        registry: &HandleRegistry<W>,
        surface: Option<SurfaceKey>,
        context: Option<ContextKey>,
        frame_complete: F,
    ) -> Result<Transition, Error>
    where
        W: Windowing,
        D: Driver + ?Sized,
        F: FnOnce() -> Result<(), Error>,
    {
        if self.state.as_pair() == (surface, context) {
            debug!("make_current: pair already current");
            return Ok(Transition::Unchanged);
        }

        if self.is_bound() {
            driver.flush();
            if !registry.visual().double_buffered {
                frame_complete()?;
            }
        }

        let native_surface = surface.and_then(|key| registry.surface(key));
        let native_context = context.and_then(|key| registry.context(key));
        let ok = windowing.make_current(native_surface, native_context);

        self.state = match (ok, surface, context) {
            (true, Some(surface), Some(context)) => Binding::Bound { surface, context },
            _ => Binding::Unbound,
        };

        if self.is_bound() {
            debug!("make_current: switched to {:?}", self.state);
            Ok(Transition::Bound)
        } else {
            debug!("make_current: nothing bound (native bind succeeded: {})", ok);
            Ok(Transition::Unbound)
        }
    }

    /// Unbind whatever is current, without flushing it.
    ///
    /// This is for when the current context is about to be destroyed.
    pub fn release<W: Windowing>(&mut self, windowing: &mut W) {
        if self.is_bound() {
            windowing.make_current(None, None);
            self.state = Binding::Unbound;
        }
    }
}

impl Default for CurrentBinding {
    fn default() -> CurrentBinding {
        CurrentBinding::new()
    }
}
