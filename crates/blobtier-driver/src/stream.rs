use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};

use blobtier_types::ByteRange;
use bytes::Bytes;

use crate::error::DriverResult;

/// Finite sequence of content chunks read from an open staged file.
///
/// Chunks are at most `buffer_size` bytes. With a range, the stream starts
/// at `range.start` and stops after `range.len()` bytes or at end of file,
/// whichever comes first. After an error the stream is exhausted.
#[derive(Debug)]
pub struct ChunkStream {
    reader: Option<File>,
    remaining: Option<u64>,
    buffer_size: usize,
    yielded: u64,
}

impl ChunkStream {
    /// Stream `file` from its current position, or over `range` when given.
    pub fn open(mut file: File, range: Option<ByteRange>, buffer_size: usize) -> io::Result<Self> {
        let remaining = match range {
            Some(range) if range.is_empty() => return Ok(Self::empty()),
            Some(range) => {
                file.seek(SeekFrom::Start(range.start))?;
                Some(range.len())
            }
            None => None,
        };
        Ok(Self {
            reader: Some(file),
            remaining,
            buffer_size: buffer_size.max(1),
            yielded: 0,
        })
    }

    /// A stream that yields nothing.
    pub fn empty() -> Self {
        Self { reader: None, remaining: Some(0), buffer_size: 1, yielded: 0 }
    }

    /// Bytes handed out so far.
    pub fn bytes_yielded(&self) -> u64 {
        self.yielded
    }

    /// Drain the stream into one buffer.
    pub fn concat(self) -> DriverResult<Vec<u8>> {
        let mut out = Vec::new();
        for chunk in self {
            out.extend_from_slice(&chunk?);
        }
        Ok(out)
    }

    fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };
        let want = match self.remaining {
            Some(0) => return Ok(None),
            Some(left) => left.min(self.buffer_size as u64) as usize,
            None => self.buffer_size,
        };

        let mut buf = vec![0u8; want];
        let n = loop {
            match reader.read(&mut buf) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        };
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        if let Some(left) = self.remaining.as_mut() {
            *left -= n as u64;
        }
        self.yielded += n as u64;
        Ok(Some(Bytes::from(buf)))
    }
}

impl Iterator for ChunkStream {
    type Item = DriverResult<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_chunk() {
            Ok(Some(chunk)) => Some(Ok(chunk)),
            Ok(None) => {
                self.reader = None;
                None
            }
            Err(e) => {
                self.reader = None;
                Some(Err(e.into()))
            }
        }
    }
}
