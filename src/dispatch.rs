//! Which recorded functions replay does something with.
//!
//! Functions with a `Call` variant of their own are replayed. A recording
//! mentions everything else by name, in `Call::other`. Those names are either
//! listed here as safe to ignore (queries whose answers replay doesn't need),
//! or unsupported.

/// What replay does with a recorded function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Replay has a handler for it.
    Replay,

    /// Recorded, but has no effect at replay.
    Ignore,
}

#[rustfmt::skip]
pub static GLX_CALLBACKS: &[(&str, Disposition)] = &[
    ("glXChooseFBConfig", Disposition::Ignore),
    ("glXChooseFBConfigSGIX", Disposition::Ignore),
    ("glXChooseVisual", Disposition::Ignore),
    ("glXCreateContextAttribsARB", Disposition::Replay),
    ("glXCreateContext", Disposition::Replay),
    ("glXCreateNewContext", Disposition::Replay),
    ("glXDestroyContext", Disposition::Replay),
    ("glXGetAGPOffsetMESA", Disposition::Ignore),
    ("glXGetClientString", Disposition::Ignore),
    ("glXGetConfig", Disposition::Ignore),
    ("glXGetContextIDEXT", Disposition::Ignore),
    ("glXGetCurrentContext", Disposition::Ignore),
    ("glXGetCurrentDisplayEXT", Disposition::Ignore),
    ("glXGetCurrentDisplay", Disposition::Ignore),
    ("glXGetCurrentDrawable", Disposition::Ignore),
    ("glXGetCurrentReadDrawable", Disposition::Ignore),
    ("glXGetCurrentReadDrawableSGI", Disposition::Ignore),
    ("glXGetFBConfigAttrib", Disposition::Ignore),
    ("glXGetFBConfigAttribSGIX", Disposition::Ignore),
    ("glXGetFBConfigFromVisualSGIX", Disposition::Ignore),
    ("glXGetFBConfigs", Disposition::Ignore),
    ("glXGetMscRateOML", Disposition::Ignore),
    ("glXGetProcAddressARB", Disposition::Ignore),
    ("glXGetProcAddress", Disposition::Ignore),
    ("glXGetSelectedEvent", Disposition::Ignore),
    ("glXGetSelectedEventSGIX", Disposition::Ignore),
    ("glXGetSyncValuesOML", Disposition::Ignore),
    ("glXGetVideoSyncSGI", Disposition::Ignore),
    ("glXGetVisualFromFBConfig", Disposition::Ignore),
    ("glXGetVisualFromFBConfigSGIX", Disposition::Ignore),
    ("glXIsDirect", Disposition::Ignore),
    ("glXMakeContextCurrent", Disposition::Replay),
    ("glXMakeCurrent", Disposition::Replay),
    ("glXQueryChannelDeltasSGIX", Disposition::Ignore),
    ("glXQueryChannelRectSGIX", Disposition::Ignore),
    ("glXQueryContextInfoEXT", Disposition::Ignore),
    ("glXQueryContext", Disposition::Ignore),
    ("glXQueryDrawable", Disposition::Ignore),
    ("glXQueryExtension", Disposition::Ignore),
    ("glXQueryExtensionsString", Disposition::Ignore),
    ("glXQueryFrameCountNV", Disposition::Ignore),
    ("glXQueryGLXPbufferSGIX", Disposition::Ignore),
    ("glXQueryMaxSwapBarriersSGIX", Disposition::Ignore),
    ("glXQueryMaxSwapGroupsNV", Disposition::Ignore),
    ("glXQueryServerString", Disposition::Ignore),
    ("glXQuerySwapGroupNV", Disposition::Ignore),
    ("glXQueryVersion", Disposition::Ignore),
    ("glXSwapBuffers", Disposition::Replay),
    ("glXSwapIntervalEXT", Disposition::Ignore),
    ("glXSwapIntervalSGI", Disposition::Ignore),
    ("glXWaitForMscOML", Disposition::Ignore),
    ("glXWaitForSbcOML", Disposition::Ignore),
    ("glXWaitGL", Disposition::Ignore),
    ("glXWaitVideoSyncSGI", Disposition::Ignore),
    ("glXWaitX", Disposition::Ignore),
];

/// The GL functions replay handles itself.
pub static GL_CALLBACKS: &[(&str, Disposition)] = &[
    ("glClear", Disposition::Replay),
    ("glDrawArrays", Disposition::Replay),
    ("glFlush", Disposition::Replay),
];

/// Return what replay does with the function `name`, or `None` if it's
/// unsupported.
pub fn lookup(name: &str) -> Option<Disposition> {
    GLX_CALLBACKS
        .iter()
        .chain(GL_CALLBACKS)
        .find(|&&(entry, _)| entry == name)
        .map(|&(_, disposition)| disposition)
}
