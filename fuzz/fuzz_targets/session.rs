#![no_main]
use libfuzzer_sys::fuzz_target;

use glx_replay::null::{NullDriver, NullWindowing};
use glx_replay::{Binding, Call, ReplayOptions, ReplaySession};

/// A small handle space, so that calls keep running into each other.
fn handle(byte: u8) -> u64 {
    (byte % 4) as u64 * 0x100
}

fn call(op: u8, a: u8, b: u8) -> Call {
    match op % 10 {
        0 => Call::create_context { share_list: handle(b), returned: handle(a) },
        1 => Call::create_new_context { config: 1, render_type: 0x8014, share_list: handle(b), returned: handle(a) },
        2 => Call::destroy_context { ctx: handle(a) },
        3 => Call::make_current { drawable: handle(a), ctx: handle(b), returned: 1 },
        4 => Call::make_context_current { draw: handle(a), read: handle(a), ctx: handle(b), returned: 1 },
        5 => Call::swap_buffers { drawable: handle(a) },
        6 => Call::draw_arrays { mode: 4, first: 0, count: a as i32 },
        7 => Call::clear { mask: 0x4000 },
        8 => Call::flush {},
        _ => Call::destroy_context { ctx: handle(b) },
    }
}

fuzz_target!(|data: &[u8]| {
    let options = ReplayOptions {
        double_buffer: data.first().map_or(true, |b| b & 1 == 0),
        gpu_timings: true,
        max_in_flight_queries: 3,
        ..ReplayOptions::default()
    };
    let mut session = ReplaySession::new(NullWindowing::new(), NullDriver::new(), options);

    for (serial, chunk) in data.chunks_exact(3).enumerate() {
        let call = call(chunk[0], chunk[1], chunk[2]);
        session.replay_one(&call, &[], serial).expect("null backend never fails");

        // Whatever is bound must still exist.
        if let Binding::Bound { surface, context } = session.binding().state() {
            assert!(session.registry().surface(surface).is_some());
            assert!(session.registry().context(context).is_some());
        }

        let timings = session.timings();
        assert!(timings.last_query_index() <= timings.query_index());
        assert!(session.driver().live_queries() <= timings.in_flight());
        // Only gaps stuck behind undrainable queries may pass the limit.
        if timings.last_gpu_query().is_none() {
            assert!(timings.in_flight() < 3);
        }
    }
});
