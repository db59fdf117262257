use std::io::{self, Read, Seek, SeekFrom};

/// A seekable byte source with a known size.
///
/// The size is determined once, when the source is created. Reads never fail
/// with an error: a read that cannot be satisfied returns the number of bytes
/// that were obtained, and the caller decides what a short read means.
#[derive(Debug)]
pub struct Source<R: Read + Seek> {
    inner: R,
    size: u64,
    position: u64,
}

impl<R: Read + Seek> Source<R> {
    /// Wrap a seekable reader.
    ///
    /// The initial position is the start of the source.
    pub fn new(mut inner: R) -> io::Result<Self> {
        let size = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        Ok(Source {
            inner,
            size,
            position: 0,
        })
    }

    /// The total number of bytes in the source.
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// The current position.
    #[inline]
    pub fn tell(&self) -> u64 {
        self.position
    }

    /// Move to an absolute position.
    ///
    /// Positions past the end are accepted; reads there return no bytes.
    pub fn seek(&mut self, position: u64) -> io::Result<u64> {
        let position = self.inner.seek(SeekFrom::Start(position))?;
        self.position = position;
        Ok(position)
    }

    /// Read as many bytes as possible into `buf`, up to its length.
    ///
    /// Returns the number of bytes read.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let mut done = 0;
        while done < buf.len() {
            match self.inner.read(&mut buf[done..]) {
                Ok(0) => break,
                Ok(n) => done += n,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(_) => break,
            }
        }
        self.position += done as u64;
        done
    }

    /// Consume the source and return the inner reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}
