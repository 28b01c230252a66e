//! Recordings saved to the filesystem.
//!
//! A recording is a directory holding two files:
//!
//! - `calls` starts with a `Header`, followed by an array of `Call` values in
//!   their in-memory form.
//!
//! - `variable` holds the variable-length data that `Call`s refer to by
//!   offset, as described in the `var` module.

use std::io::prelude::*;
use std::path::{Path, PathBuf};
use std::{fs, io, mem};

use crate::call::Call;
use crate::error::{Error, HeaderSummary};
use crate::raw::{self, Simple};
use crate::var::MarkedWrite;

/// The magic number at the front of every `calls` file.
///
/// Since this is stored as a `u32`, it comes out differently on big-endian
/// and little-endian machines, which is what we want: recordings aren't
/// portable between them.
pub const GLXR_MAGIC: u32 = 0x474c_5852;

/// A stream of recorded calls being written to files on disk.
pub struct FileStream {
    calls: io::BufWriter<fs::File>,
    variable: io::BufWriter<fs::File>,
    bytes_written: usize,
    call_serial: usize,
}

impl FileStream {
    pub fn create<P: AsRef<Path>>(dir: P) -> io::Result<FileStream> {
        let dir = dir.as_ref();

        match fs::create_dir(dir) {
            Err(e) if e.kind() != io::ErrorKind::AlreadyExists => {
                return Err(e);
            }
            _ => (),
        }

        let mut calls = io::BufWriter::new(fs::File::create(dir.join("calls"))?);
        let variable = io::BufWriter::new(fs::File::create(dir.join("variable"))?);

        calls.write_all(raw::as_bytes(&Header::current()))?;

        Ok(FileStream {
            calls,
            variable,
            bytes_written: 0,
            call_serial: 0,
        })
    }

    /// Append `call` to the calls file. Return its serial number.
    pub fn write_call(&mut self, call: &Call) -> io::Result<usize> {
        let n = self.call_serial;
        self.calls.write_all(raw::as_bytes(call))?;
        self.call_serial += 1;
        Ok(n)
    }

    /// Return the serial number of the next call to be written.
    pub fn call_serial(&self) -> usize {
        self.call_serial
    }
}

/// Writing to a `FileStream` appends to the variable-length data.
impl io::Write for FileStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.variable.write(buf)?;
        self.bytes_written += written;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.calls.flush()?;
        self.variable.flush()?;
        Ok(())
    }
}

impl MarkedWrite for FileStream {
    fn mark(&self) -> usize {
        self.bytes_written
    }
}

/// A recording read back into memory.
pub struct FileRecording {
    pub calls: Vec<Call>,
    pub variable: Vec<u8>,
}

impl FileRecording {
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<FileRecording, Error> {
        let dir = dir.as_ref();
        let calls_path = dir.join("calls");
        let calls_bytes = fs::read(&calls_path)?;
        let variable = fs::read(dir.join("variable"))?;

        let calls = parse_calls(&calls_bytes, calls_path)?;
        Ok(FileRecording { calls, variable })
    }

    /// Build a recording from the contents of its `calls` and `variable`
    /// files.
    pub fn from_bytes(calls: &[u8], variable: Vec<u8>) -> Result<FileRecording, Error> {
        let calls = parse_calls(calls, PathBuf::from("calls"))?;
        Ok(FileRecording { calls, variable })
    }
}

/// Check the header on `bytes`, and then each call's discriminant, and return
/// the calls.
fn parse_calls(bytes: &[u8], path: PathBuf) -> Result<Vec<Call>, Error> {
    if bytes.is_empty() {
        return Err(Error::EmptyRecording { path });
    }

    let header_size = mem::size_of::<Header>();
    let expected = Header::current();
    if bytes.len() < header_size {
        return Err(Error::HeaderMismatch {
            expected: expected.summary(),
            actual: Header::zeros().summary(),
        });
    }

    // Safe because every field of `Header` is an integer.
    let header: Header = unsafe { raw::read_unaligned(bytes) };
    header.check()?;

    let body = &bytes[header_size..];
    let call_size = mem::size_of::<Call>();
    let extra = body.len() % call_size;
    if extra != 0 {
        return Err(Error::PartialCall { extra });
    }

    body.chunks_exact(call_size)
        .enumerate()
        .map(|(serial, chunk)| {
            // Safe because every bit pattern is a valid `u32`.
            let tag: u32 = unsafe { raw::read_unaligned(chunk) };
            if !Call::is_valid_discriminant(tag) {
                return Err(Error::BadDiscriminant { serial, tag });
            }
            // Safe because the discriminant is valid, and every field of every
            // variant is integer data.
            Ok(unsafe { raw::read_unaligned::<Call>(chunk) })
        })
        .collect()
}

#[derive(Copy, Clone, Debug)]
#[repr(C, packed)]
struct Header {
    magic: u32,
    size_of_usize: u8,
    size_of_call: u8,
    max_alignment: u8,
    padding: u8,
}

unsafe impl Simple for Header {}

impl Header {
    /// The header for recordings made by this build.
    fn current() -> Header {
        // The header had better not cause the content to be misaligned.
        assert!(mem::size_of::<Header>() % mem::align_of::<Call>() == 0);

        // The properties we want to stick into the header had better actually
        // fit in a single byte.
        assert!(mem::size_of::<Call>() <= 255);

        Header {
            magic: GLXR_MAGIC,
            size_of_usize: mem::size_of::<usize>() as u8,
            size_of_call: mem::size_of::<Call>() as u8,
            max_alignment: mem::align_of::<Call>() as u8,
            padding: b'P',
        }
    }

    fn zeros() -> Header {
        Header {
            magic: 0,
            size_of_usize: 0,
            size_of_call: 0,
            max_alignment: 0,
            padding: 0,
        }
    }

    fn summary(&self) -> HeaderSummary {
        HeaderSummary {
            magic: self.magic,
            size_of_usize: self.size_of_usize,
            size_of_call: self.size_of_call,
            max_alignment: self.max_alignment,
        }
    }

    fn check(&self) -> Result<(), Error> {
        let expected = Header::current().summary();
        let actual = self.summary();
        if expected != actual {
            return Err(Error::HeaderMismatch { expected, actual });
        }
        Ok(())
    }
}

#[test]
fn test_bad_recordings() {
    let path = PathBuf::from("calls");
    assert!(matches!(
        parse_calls(&[], path.clone()),
        Err(Error::EmptyRecording { .. })
    ));

    let mut bytes = raw::as_bytes(&Header::current()).to_vec();
    bytes[0] ^= 0xff;
    assert!(matches!(
        parse_calls(&bytes, path.clone()),
        Err(Error::HeaderMismatch { .. })
    ));

    let mut bytes = raw::as_bytes(&Header::current()).to_vec();
    bytes.extend_from_slice(raw::as_bytes(&Call::flush {}));
    bytes.extend_from_slice(&[0; 3]);
    assert!(matches!(
        parse_calls(&bytes, path.clone()),
        Err(Error::PartialCall { extra: 3 })
    ));

    let mut bytes = raw::as_bytes(&Header::current()).to_vec();
    bytes.extend_from_slice(raw::as_bytes(&Call::flush {}));
    let mut bogus = raw::as_bytes(&Call::flush {}).to_vec();
    bogus[..4].copy_from_slice(raw::as_bytes(&1000_u32));
    bytes.extend_from_slice(&bogus);
    assert!(matches!(
        parse_calls(&bytes, path),
        Err(Error::BadDiscriminant { serial: 1, tag: 1000 })
    ));
}
