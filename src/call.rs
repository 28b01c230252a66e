//! A representation for recorded GLX and GL calls.

use crate::raw;
use crate::var::{Seq, Str, Var};

/// A recorded call.
///
/// Each variant stands for one recorded function, and holds its arguments and,
/// where replay needs it, the value the function returned in the recorded
/// process. Handles from the recorded process (`GLXContext` pointers,
/// `GLXDrawable` XIDs) are recorded as `u64` values; they mean nothing in the
/// replaying process, and only serve as keys.
///
/// A recording's `calls` file is just an array of these, so every field must
/// be plain integer data: with `repr(u32)`, checking the discriminant is enough
/// to know that a block of bytes is a valid `Call`. That rules out `bool` and
/// `Option` fields; GLX `Bool` values are recorded as `i32`, and an absent
/// attribute list is recorded as an empty one.
#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug)]
#[repr(u32)]
#[rustfmt::skip]
pub enum Call {
    create_context { share_list: u64, returned: u64 },
    create_new_context { config: u64, render_type: i32, share_list: u64, returned: u64 },
    create_context_attribs { config: u64, share_context: u64, attrib_list: Var<Seq<i32>>, returned: u64 },
    destroy_context { ctx: u64 },
    make_current { drawable: u64, ctx: u64, returned: i32 },
    make_context_current { draw: u64, read: u64, ctx: u64, returned: i32 },
    swap_buffers { drawable: u64 },
    draw_arrays { mode: u32, first: i32, count: i32 },
    clear { mask: u32 },
    flush {},
    other { name: Var<Str> },
}

// Safe because every field of every variant is integer data, and
// `FileRecording` checks discriminants before reading `Call`s from a file.
unsafe impl raw::Simple for Call {}

impl Call {
    /// The number of variants. Discriminants run from zero up to this.
    pub const VARIANT_COUNT: u32 = 11;

    /// Return true if `tag` is the discriminant of some `Call` variant.
    pub fn is_valid_discriminant(tag: u32) -> bool {
        tag < Call::VARIANT_COUNT
    }

    /// Return this call's discriminant.
    pub fn discriminant(&self) -> u32 {
        // Safe because a `repr(u32)` enum starts with its `u32` tag.
        unsafe { raw::read_unaligned::<u32>(raw::as_bytes(self)) }
    }

    /// Return the name of the recorded function this call stands for.
    ///
    /// For `other`, the name lives in the variable-length data; this returns
    /// `None`.
    pub fn function_name(&self) -> Option<&'static str> {
        use Call::*;
        Some(match self {
            create_context { .. } => "glXCreateContext",
            create_new_context { .. } => "glXCreateNewContext",
            create_context_attribs { .. } => "glXCreateContextAttribsARB",
            destroy_context { .. } => "glXDestroyContext",
            make_current { .. } => "glXMakeCurrent",
            make_context_current { .. } => "glXMakeContextCurrent",
            swap_buffers { .. } => "glXSwapBuffers",
            draw_arrays { .. } => "glDrawArrays",
            clear { .. } => "glClear",
            flush {} => "glFlush",
            other { .. } => return None,
        })
    }

    /// Return true if this is a draw call whose GPU time we measure.
    pub fn is_timed(&self) -> bool {
        matches!(self, Call::draw_arrays { .. } | Call::clear { .. })
    }
}

#[test]
fn test_discriminants() {
    let calls = [
        Call::create_context { share_list: 0, returned: 1 },
        Call::create_new_context { config: 0, render_type: 0, share_list: 0, returned: 1 },
        Call::create_context_attribs { config: 0, share_context: 0, attrib_list: Var::new(0), returned: 1 },
        Call::destroy_context { ctx: 1 },
        Call::make_current { drawable: 1, ctx: 1, returned: 1 },
        Call::make_context_current { draw: 1, read: 1, ctx: 1, returned: 1 },
        Call::swap_buffers { drawable: 1 },
        Call::draw_arrays { mode: 4, first: 0, count: 3 },
        Call::clear { mask: 0x4000 },
        Call::flush {},
        Call::other { name: Var::new(0) },
    ];
    assert_eq!(calls.len() as u32, Call::VARIANT_COUNT);
    for (expected, call) in calls.iter().enumerate() {
        assert_eq!(call.discriminant(), expected as u32);
        assert!(Call::is_valid_discriminant(call.discriminant()));
    }
    assert!(!Call::is_valid_discriminant(Call::VARIANT_COUNT));
}
