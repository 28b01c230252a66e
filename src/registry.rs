//! Virtualization of recorded surface and context handles.

use crate::error::Error;
use crate::glws::{Profile, Visual, Windowing};
use crate::handles::{ContextKey, HandleMap, SurfaceKey};

use tracing::debug;

/// The replay-side surfaces and contexts standing in for the recorded
/// process's drawables and contexts.
///
/// The registry owns every object it creates. Other parts of the replayer
/// hold `SurfaceKey` and `ContextKey` values, and look the objects up here
/// when they need them.
pub struct HandleRegistry<W: Windowing> {
    surfaces: HandleMap<SurfaceKey, W::Surface>,
    contexts: HandleMap<ContextKey, W::Context>,

    /// The visual for every surface and context we create.
    visual: Visual,

    /// The profile for contexts created without a more specific request.
    default_profile: Profile,
}

impl<W: Windowing> HandleRegistry<W> {
    pub fn new(visual: Visual, default_profile: Profile) -> HandleRegistry<W> {
        HandleRegistry {
            surfaces: HandleMap::new(),
            contexts: HandleMap::new(),
            visual,
            default_profile,
        }
    }

    pub fn visual(&self) -> &Visual {
        &self.visual
    }

    pub fn default_profile(&self) -> Profile {
        self.default_profile
    }

    /// Return the surface standing in for the recorded drawable `id`,
    /// creating one if this is the first we've heard of it.
    ///
    /// Return `None` if `id` is zero.
    pub fn resolve_surface(
        &mut self,
        windowing: &mut W,
        id: u64,
    ) -> Result<Option<SurfaceKey>, Error> {
        let visual = &self.visual;
        let resolved = self
            .surfaces
            .get_or_create(id, || windowing.create_surface(visual))
            .map_err(|source| Error::CreateSurface { id, source })?;
        if let Some((_, true)) = resolved {
            debug!("created surface for drawable 0x{:x}", id);
        }
        Ok(resolved.map(|(key, _)| key))
    }

    /// Return the context standing in for the recorded context `id`,
    /// creating one if this is the first we've heard of it.
    ///
    /// If a context must be created and `share_id` is nonzero, the new context
    /// shares objects with the context standing in for `share_id`, which is
    /// itself resolved (and perhaps created) first.
    ///
    /// Return `None` if `id` is zero.
    pub fn resolve_context(
        &mut self,
        windowing: &mut W,
        id: u64,
        share_id: u64,
    ) -> Result<Option<ContextKey>, Error> {
        if id == 0 {
            return Ok(None);
        }
        if let Some(key) = self.contexts.lookup(id) {
            return Ok(Some(key));
        }

        // A context can't share with itself before it exists.
        let share_id = if share_id == id { 0 } else { share_id };
        let context = self.create_context(windowing, id, share_id, self.default_profile)?;
        debug!("creating context for recorded context 0x{:x} on demand", id);
        Ok(self.register_context(id, context))
    }

    /// Create a new context with `profile`, sharing with whatever stands in
    /// for `share_id`. The new context is not entered in the map; `id` is only
    /// for error reporting.
    ///
    /// A `share_id` whose context was destroyed is resolved like any other
    /// handle we haven't seen: a fresh stand-in is created for it.
    pub fn create_context(
        &mut self,
        windowing: &mut W,
        id: u64,
        share_id: u64,
        profile: Profile,
    ) -> Result<W::Context, Error> {
        let share = self.resolve_context(windowing, share_id, 0)?;
        let share = share.and_then(|key| self.contexts.get(key));
        windowing
            .create_context(&self.visual, share, profile)
            .map_err(|source| Error::CreateContext { id, source })
    }

    /// Enter `context` in the map under the recorded handle `id`, releasing
    /// whatever was there before.
    ///
    /// This is how contexts from creation calls get their handles: the
    /// recorded call's return value is the key. Return `None` if `id` is zero,
    /// in which case `context` is released.
    pub fn register_context(&mut self, id: u64, context: W::Context) -> Option<ContextKey> {
        match self.contexts.insert(id, context) {
            Ok((key, old)) => {
                if old.is_some() {
                    debug!("recorded context 0x{:x} replaced an existing context", id);
                }
                Some(key)
            }
            Err(_context) => None,
        }
    }

    /// Release the context standing in for `id`. Unknown ids, and zero, are
    /// ignored.
    pub fn destroy_context(&mut self, id: u64) {
        if self.contexts.remove(id).is_some() {
            debug!("destroyed context for recorded context 0x{:x}", id);
        }
    }

    /// Return the key for `id` without creating anything.
    pub fn lookup_context(&self, id: u64) -> Option<ContextKey> {
        self.contexts.lookup(id)
    }

    pub fn surface(&self, key: SurfaceKey) -> Option<&W::Surface> {
        self.surfaces.get(key)
    }

    pub fn context(&self, key: ContextKey) -> Option<&W::Context> {
        self.contexts.get(key)
    }

    pub fn surface_count(&self) -> usize {
        self.surfaces.len()
    }

    pub fn context_count(&self) -> usize {
        self.contexts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::null::{NullWindowing, WindowingOp};

    fn registry() -> HandleRegistry<NullWindowing> {
        let visual = Visual {
            double_buffered: true,
            samples: 1,
            width: 64,
            height: 64,
        };
        HandleRegistry::new(visual, Profile::COMPAT)
    }

    #[test]
    fn resolve_is_idempotent() {
        let mut ws = NullWindowing::new();
        let mut reg = registry();

        let s1 = reg.resolve_surface(&mut ws, 0x400001).unwrap();
        let s2 = reg.resolve_surface(&mut ws, 0x400001).unwrap();
        assert!(s1.is_some());
        assert_eq!(s1, s2);

        let c1 = reg.resolve_context(&mut ws, 0xaaa, 0).unwrap();
        let c2 = reg.resolve_context(&mut ws, 0xaaa, 0).unwrap();
        assert!(c1.is_some());
        assert_eq!(c1, c2);

        assert_eq!(ws.surfaces_created(), 1);
        assert_eq!(ws.contexts_created(), 1);
    }

    #[test]
    fn zero_resolves_to_nothing() {
        let mut ws = NullWindowing::new();
        let mut reg = registry();
        assert_eq!(reg.resolve_surface(&mut ws, 0).unwrap(), None);
        assert_eq!(reg.resolve_context(&mut ws, 0, 0).unwrap(), None);
        assert!(ws.ops().is_empty());
    }

    #[test]
    fn sharing_resolves_the_share_context_first() {
        let mut ws = NullWindowing::new();
        let mut reg = registry();

        let a = reg.resolve_context(&mut ws, 0xaaa, 0).unwrap().unwrap();
        let b = reg.resolve_context(&mut ws, 0xbbb, 0xaaa).unwrap().unwrap();
        assert_ne!(a, b);

        let a_serial = reg.context(a).unwrap().serial;
        assert_eq!(reg.context(b).unwrap().shared_with, Some(a_serial));

        // Sharing with something never seen creates it.
        let c = reg.resolve_context(&mut ws, 0xccc, 0xddd).unwrap().unwrap();
        let d = reg.lookup_context(0xddd).unwrap();
        assert_eq!(
            reg.context(c).unwrap().shared_with,
            Some(reg.context(d).unwrap().serial)
        );
        assert_eq!(reg.context_count(), 4);
    }

    #[test]
    fn sharing_with_a_destroyed_context() {
        let mut ws = NullWindowing::new();
        let mut reg = registry();
        let a = reg.resolve_context(&mut ws, 0xaaa, 0).unwrap().unwrap();
        let b = reg.resolve_context(&mut ws, 0xbbb, 0xaaa).unwrap().unwrap();
        let old_serial = reg.context(a).unwrap().serial;

        // Contexts sharing with a destroyed one are left alone.
        reg.destroy_context(0xaaa);
        assert_eq!(reg.context(b).unwrap().shared_with, Some(old_serial));

        let context = reg.create_context(&mut ws, 0xccc, 0xaaa, Profile::COMPAT).unwrap();
        let new_a = reg.lookup_context(0xaaa).unwrap();
        let new_serial = reg.context(new_a).unwrap().serial;
        assert_ne!(new_serial, old_serial);
        assert_eq!(context.shared_with, Some(new_serial));
        assert_eq!(ws.contexts_created(), 4);
    }

    #[test]
    fn destroy_unknown_is_a_no_op() {
        let mut ws = NullWindowing::new();
        let mut reg = registry();
        reg.resolve_context(&mut ws, 0xaaa, 0).unwrap();

        reg.destroy_context(0x1234);
        reg.destroy_context(0);
        assert_eq!(reg.context_count(), 1);

        reg.destroy_context(0xaaa);
        assert_eq!(reg.context_count(), 0);
        assert_eq!(reg.lookup_context(0xaaa), None);
    }

    #[test]
    fn creation_failure_is_reported() {
        let mut ws = NullWindowing::new();
        ws.fail_context_creation(true);
        let mut reg = registry();
        match reg.resolve_context(&mut ws, 0xaaa, 0) {
            Err(Error::CreateContext { id: 0xaaa, .. }) => (),
            other => panic!("expected context creation failure, got {:?}", other),
        }
        assert_eq!(reg.context_count(), 0);

        ws.fail_surface_creation(true);
        match reg.resolve_surface(&mut ws, 7) {
            Err(Error::CreateSurface { id: 7, .. }) => (),
            other => panic!("expected surface creation failure, got {:?}", other),
        }
        assert!(!ws.ops().iter().any(|op| matches!(op, WindowingOp::CreateSurface { .. })));
    }

    #[test]
    fn register_replaces() {
        let mut ws = NullWindowing::new();
        let mut reg = registry();
        let first = reg.resolve_context(&mut ws, 0xaaa, 0).unwrap().unwrap();
        let context = reg.create_context(&mut ws, 0xaaa, 0, Profile::COMPAT).unwrap();
        let second = reg.register_context(0xaaa, context).unwrap();
        assert_ne!(first, second);
        assert_eq!(reg.context(first).map(|c| c.serial), None);
        assert_eq!(reg.lookup_context(0xaaa), Some(second));

        let context = reg.create_context(&mut ws, 0, 0, Profile::COMPAT).unwrap();
        assert_eq!(reg.register_context(0, context), None);
        assert_eq!(reg.context_count(), 1);
    }
}
