use docopt::Docopt;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use glx_replay::null::{NullDriver, NullWindowing};
use glx_replay::{FenceWait, FileRecording, Profile, ReplayOptions, ReplaySession};

use std::error::Error as _;
use std::{io, process};

static USAGE: &str = "
Replay a glx-replay recording.

Surfaces and contexts are created on a headless backend that does no
rendering, so this checks that the recording's handles, bindings, and frames
replay cleanly. Set RUST_LOG=debug to see what each call did.

Usage:
  glxreplay [options] <dir>
  glxreplay (-h | --help)

Options:
  -h --help                   Show this screen.
  --single-buffer             Create single-buffered surfaces.
  --profile=<profile>         Default context profile: compat, 3.2core, es2.0, ...
                              [default: compat]
  --samples=<n>               Multisample count for surfaces. [default: 1]
  --gpu-timings               Time draw calls with GPU timer queries.
  --max-queries=<n>           Drain timer queries once this many are waiting.
                              [default: 1024]
  --fence=<strategy>          How to wait for timer queries: spin or yield.
                              [default: spin]
  --snapshot-prefix=<prefix>  Write each frame to <prefix>NNNNNNNNNN.png.
";

#[derive(Debug, Deserialize)]
struct Args {
    arg_dir: String,
    flag_single_buffer: bool,
    flag_profile: String,
    flag_samples: u32,
    flag_gpu_timings: bool,
    flag_max_queries: usize,
    flag_fence: String,
    flag_snapshot_prefix: Option<String>,
}

impl Args {
    fn options(&self) -> Result<ReplayOptions, String> {
        Ok(ReplayOptions {
            double_buffer: !self.flag_single_buffer,
            default_profile: self.flag_profile.parse::<Profile>()?,
            samples: self.flag_samples,
            gpu_timings: self.flag_gpu_timings,
            max_in_flight_queries: self.flag_max_queries,
            fence_wait: self.flag_fence.parse::<FenceWait>()?,
            snapshot_prefix: self.flag_snapshot_prefix.clone(),
            ..ReplayOptions::default()
        })
    }
}

fn main() {
    let args: Args = Docopt::new(USAGE)
        .and_then(|d| d.deserialize())
        .unwrap_or_else(|e| e.exit());

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let options = args.options().unwrap_or_else(|message| {
        eprintln!("glxreplay: {}", message);
        process::exit(2);
    });

    if let Err(err) = run(&args.arg_dir, options) {
        eprintln!("glxreplay: {}: {}", args.arg_dir, err);
        let mut source = err.source();
        while let Some(cause) = source {
            eprintln!("  caused by: {}", cause);
            source = cause.source();
        }
        process::exit(1);
    }
}

fn run(dir: &str, options: ReplayOptions) -> Result<(), glx_replay::Error> {
    let recording = FileRecording::open(dir)?;
    tracing::info!("replaying {} calls from {}", recording.calls.len(), dir);

    let mut session = ReplaySession::new(NullWindowing::new(), NullDriver::new(), options);
    session.replay(&recording.calls, &recording.variable)?;
    session.finish();
    Ok(())
}
