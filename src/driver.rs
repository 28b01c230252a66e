//! The GL driver interface.
//!
//! These are the GL entry points the replay core itself needs: flushing, the
//! timer query lifecycle, the draw calls we time, and reading back pixels for
//! snapshots. They all act on whatever context is current.

use gleam::gl::{self, GLuint, Gl};

pub trait Driver {
    /// A GPU timer query object.
    type Query: Copy + PartialEq + std::fmt::Debug;

    fn flush(&self);

    /// Create a query object and start timing with it.
    fn begin_timer_query(&self) -> Self::Query;

    /// Stop timing the query begun most recently.
    fn end_timer_query(&self);

    /// Return true if `query`'s result is available.
    fn query_available(&self, query: Self::Query) -> bool;

    /// Return `query`'s result, in nanoseconds of GPU time.
    ///
    /// Only call this once `query_available` has returned true.
    fn query_result(&self, query: Self::Query) -> u64;

    fn delete_query(&self, query: Self::Query);

    fn draw_arrays(&self, mode: u32, first: i32, count: i32);

    fn clear(&self, mask: u32);

    /// Read back a `width` by `height` block of RGBA8 pixels from the current
    /// read buffer, bottom row first.
    fn read_pixels_rgba8(&self, width: u32, height: u32) -> Vec<u8>;
}

/// A real GL context, through gleam.
///
/// This is where a windowing backend that makes native contexts current plugs
/// in: hand the session the `Rc<dyn Gl>` for its contexts' shared function
/// pointers. The bundled binaries replay headless on `null::NullDriver`, and
/// never load GL.
impl Driver for dyn Gl {
    type Query = GLuint;

    fn flush(&self) {
        Gl::flush(self)
    }

    fn begin_timer_query(&self) -> GLuint {
        let query = self.gen_queries(1)[0];
        self.begin_query(gl::TIME_ELAPSED, query);
        query
    }

    fn end_timer_query(&self) {
        self.end_query(gl::TIME_ELAPSED);
    }

    fn query_available(&self, query: GLuint) -> bool {
        self.get_query_object_iv(query, gl::QUERY_RESULT_AVAILABLE) != 0
    }

    fn query_result(&self, query: GLuint) -> u64 {
        self.get_query_object_ui64v(query, gl::QUERY_RESULT)
    }

    fn delete_query(&self, query: GLuint) {
        self.delete_queries(&[query]);
    }

    fn draw_arrays(&self, mode: u32, first: i32, count: i32) {
        Gl::draw_arrays(self, mode, first, count)
    }

    fn clear(&self, mask: u32) {
        Gl::clear(self, mask)
    }

    fn read_pixels_rgba8(&self, width: u32, height: u32) -> Vec<u8> {
        self.read_pixels(
            0,
            0,
            width as gl::GLsizei,
            height as gl::GLsizei,
            gl::RGBA,
            gl::UNSIGNED_BYTE,
        )
    }
}

/// Drivers behind a reference count are still drivers. This lets a session
/// hold an `Rc<dyn Gl>`, the way gleam hands them out.
impl<D: Driver + ?Sized> Driver for std::rc::Rc<D> {
    type Query = D::Query;

    fn flush(&self) {
        (**self).flush()
    }

    fn begin_timer_query(&self) -> D::Query {
        (**self).begin_timer_query()
    }

    fn end_timer_query(&self) {
        (**self).end_timer_query()
    }

    fn query_available(&self, query: D::Query) -> bool {
        (**self).query_available(query)
    }

    fn query_result(&self, query: D::Query) -> u64 {
        (**self).query_result(query)
    }

    fn delete_query(&self, query: D::Query) {
        (**self).delete_query(query)
    }

    fn draw_arrays(&self, mode: u32, first: i32, count: i32) {
        (**self).draw_arrays(mode, first, count)
    }

    fn clear(&self, mask: u32) {
        (**self).clear(mask)
    }

    fn read_pixels_rgba8(&self, width: u32, height: u32) -> Vec<u8> {
        (**self).read_pixels_rgba8(width, height)
    }
}
