//! Replay session configuration.

use crate::glws::{Profile, Visual};
use crate::timing::FenceWait;

#[derive(Debug, Clone, PartialEq)]
pub struct ReplayOptions {
    /// Create double-buffered surfaces. With single-buffered surfaces, context
    /// switches mark frame boundaries.
    pub double_buffer: bool,

    /// The profile for contexts whose creation call doesn't specify one.
    pub default_profile: Profile,

    pub samples: u32,

    /// Width and height of every surface created.
    pub window_size: (u32, u32),

    /// Time timed draw calls with GPU timer queries.
    pub gpu_timings: bool,

    /// Drain timer queries early once this many are waiting.
    pub max_in_flight_queries: usize,

    pub fence_wait: FenceWait,

    /// If set, write a PNG of each completed frame to
    /// `<prefix><frame number>.png`.
    pub snapshot_prefix: Option<String>,
}

impl ReplayOptions {
    /// The visual that surfaces and contexts are created with.
    pub fn visual(&self) -> Visual {
        Visual {
            double_buffered: self.double_buffer,
            samples: self.samples,
            width: self.window_size.0,
            height: self.window_size.1,
        }
    }
}

impl Default for ReplayOptions {
    fn default() -> ReplayOptions {
        ReplayOptions {
            double_buffer: true,
            default_profile: Profile::COMPAT,
            samples: 1,
            window_size: (1024, 768),
            gpu_timings: false,
            max_in_flight_queries: 1024,
            fence_wait: FenceWait::Spin,
            snapshot_prefix: None,
        }
    }
}
