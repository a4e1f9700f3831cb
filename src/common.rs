use core::fmt;

/// Serial sink for complete output frames.
///
/// The expander hands a full frame (one byte per register) to this trait
/// whenever the Main buffer must become visible on the output pins.
/// [`BitbangChain`][crate::BitbangChain] is the hardware implementation;
/// tests substitute a recording stand-in.
pub trait ShiftChain {
    type Error;

    /// Serialize `frame` to the register chain and latch it.
    ///
    /// `frame[0]` belongs to the register closest to the controller.  The
    /// whole frame must go out within a single latch window so the parallel
    /// outputs never expose a partially transmitted state.
    fn transmit(&mut self, frame: &[u8]) -> Result<(), Self::Error>;
}

/// Operation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// A pin or segment index lies outside the chain, or a segment is wider
    /// than 16 bits.
    PinOutOfRange,
    /// Virtual port parameters do not describe a usable pin range.
    InvalidPortConfiguration,
    /// A port value does not fit into the port's pin count.
    ValueOutOfRange,
    /// Error reported by the underlying pin driver.
    Pin(E),
}

impl<E> From<crate::buffer::OutOfRange> for Error<E> {
    fn from(_: crate::buffer::OutOfRange) -> Self {
        Error::PinOutOfRange
    }
}

impl<E: fmt::Debug> embedded_hal::digital::Error for Error<E> {
    fn kind(&self) -> embedded_hal::digital::ErrorKind {
        embedded_hal::digital::ErrorKind::Other
    }
}
