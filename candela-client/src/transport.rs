//! Byte transport seam
//!
//! The codec never opens connections itself; it only needs a byte sink
//! and a byte source. Anything speaking `embedded-io` gets the trait for
//! free through the blanket impl.

/// A bidirectional byte pipe to the device
pub trait Transport {
    type Error;

    /// Send a complete byte sequence
    fn send(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Read available bytes into `buf`
    ///
    /// Returns the number of bytes read; 0 means the peer is gone.
    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
}

impl<T> Transport for T
where
    T: embedded_io::Read + embedded_io::Write,
{
    type Error = T::Error;

    fn send(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        self.write_all(bytes)?;
        self.flush()
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.read(buf)
    }
}
