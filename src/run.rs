//! Run production and the fixed-width value codec.
//!
//! A run is a file of ascending `u32` values in the host's native byte
//! representation, no header, byte length always a multiple of 4. Runs are
//! produced here by filling the arena from the input, sorting it in place
//! and writing the sorted prefix out; the merge engine later streams them
//! back through [`RunReader`].

use std::io::{self, Read, Write};

use crate::arena::{Arena, VALUE_SIZE};

/// Reads the next value from a stream. Returns `Ok(None)` at a clean end of
/// stream; a trailing partial value is reported as `UnexpectedEof` since
/// valid run files are always a whole number of values.
pub fn read_value<R: Read>(reader: &mut R) -> io::Result<Option<u32>> {
    let mut buf = [0u8; VALUE_SIZE];
    let mut filled = 0;
    while filled < VALUE_SIZE {
        match reader.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "stream ends with a partial value",
                ))
            }
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(Some(u32::from_ne_bytes(buf)))
}

/// Writes a single value to a stream.
pub fn write_value<W: Write>(writer: &mut W, value: u32) -> io::Result<()> {
    writer.write_all(&value.to_ne_bytes())
}

/// Writes a whole run of values to a stream.
pub fn write_run<W: Write>(writer: &mut W, values: &[u32]) -> io::Result<()> {
    for &value in values {
        write_value(writer, value)?;
    }
    Ok(())
}

/// Exclusively-owned sequential value stream over one run.
///
/// While a reader sits in the merge heap the heap owns it; once its stream
/// is exhausted it is dropped, which closes the underlying file.
pub struct RunReader<R> {
    reader: R,
}

impl<R: Read> RunReader<R> {
    pub fn new(reader: R) -> Self {
        RunReader { reader }
    }

    /// Returns the next value of the run, or `None` when the run is
    /// exhausted.
    pub fn next_value(&mut self) -> io::Result<Option<u32>> {
        read_value(&mut self.reader)
    }
}

/// Produces generation-0 runs by filling the arena from the input, sorting
/// in place and handing the sorted prefix to the caller.
pub struct RunProducer<'a, R: Read> {
    input: R,
    arena: &'a mut Arena,
    finished: bool,
}

impl<'a, R: Read> RunProducer<'a, R> {
    pub fn new(input: R, arena: &'a mut Arena) -> Self {
        RunProducer {
            input,
            arena,
            finished: false,
        }
    }

    /// Fills the arena with the next chunk of input and sorts it. Returns
    /// the sorted values of the run, or `None` once the input is exhausted.
    ///
    /// Values are ordered by plain unsigned comparison; equal values are
    /// interchangeable so an unstable sort is used.
    pub fn next_run(&mut self) -> io::Result<Option<&[u32]>> {
        if self.finished {
            return Ok(None);
        }

        let values = self.arena.values_mut();
        let mut count = 0;
        while count < values.len() {
            match read_value(&mut self.input)? {
                Some(value) => {
                    values[count] = value;
                    count += 1;
                }
                None => {
                    self.finished = true;
                    break;
                }
            }
        }

        if count == 0 {
            return Ok(None);
        }

        let run = &mut values[..count];
        run.sort_unstable();
        Ok(Some(run))
    }
}
