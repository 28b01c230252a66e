#![no_main]
use libfuzzer_sys::fuzz_target;

use glx_replay::null::{NullDriver, NullWindowing};
use glx_replay::{FileRecording, ReplayOptions, ReplaySession};

// Arbitrary bytes must either be rejected when opened, or replay without
// panicking. Argument errors are fine; crashes are not.
fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }
    let split = data[0] as usize % data.len();
    let (calls, variable) = data[1..].split_at(split.min(data.len() - 1));

    let recording = match FileRecording::from_bytes(calls, variable.to_vec()) {
        Ok(recording) => recording,
        Err(_) => return,
    };

    let options = ReplayOptions {
        gpu_timings: true,
        max_in_flight_queries: 4,
        ..ReplayOptions::default()
    };
    let mut session = ReplaySession::new(NullWindowing::new(), NullDriver::new(), options);
    let _ = session.replay(&recording.calls, &recording.variable);
});
