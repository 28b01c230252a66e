//! Replay recorded GLX and GL call streams.
//!
//! A recording holds the calls a program made to create, bind, and destroy
//! GLX contexts, swap buffers, and draw, along with the handles those calls
//! used and returned. Those handles are pointers and XIDs from the recording
//! process, so replay creates its own surfaces and contexts to stand in for
//! them, on first mention, and replays the calls against those.
//!
//! The pieces:
//!
//! - `FileRecording` reads a recording from disk, and `FileStream` writes one.
//!
//! - `ReplaySession` replays calls against a `Windowing` implementation, which
//!   creates and binds surfaces and contexts, and a `Driver`, which issues the
//!   GL calls replay needs itself. The `null` module has implementations of
//!   both that do no rendering at all.
//!
//! - `HandleRegistry` maps recorded handles to replay-side objects,
//!   `CurrentBinding` tracks what's current, and `GpuTimings` measures how long
//!   draw calls take on the GPU, resolving the measurements at each buffer
//!   swap.

pub mod binding;
pub mod call;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod file_stream;
pub mod frames;
pub mod glws;
pub mod handles;
pub mod null;
pub mod options;
pub mod raw;
pub mod registry;
pub mod session;
pub mod timing;
pub mod var;

pub use binding::{Binding, CurrentBinding, Transition};
pub use call::Call;
pub use driver::Driver;
pub use error::Error;
pub use file_stream::{FileRecording, FileStream};
pub use frames::{FrameReport, FrameStats};
pub use glws::{Profile, Visual, Windowing, WindowingError};
pub use options::ReplayOptions;
pub use registry::HandleRegistry;
pub use session::ReplaySession;
pub use timing::{FenceWait, GpuTimings};
