//! Virtual ports: contiguous pin groups addressed with port-local indices.

use embedded_hal::digital::PinState;

use crate::buffer::BitBuffer;
use crate::common::{Error, ShiftChain};
use crate::expander::{Driver, Hc595};
use crate::mutex::PortMutex;

/// Most pins a virtual port can group.
pub const MAX_PORT_PINS: u8 = 16;

/// View over a contiguous range of expander pins.
///
/// A port numbers its pins from `0` to `pin_count() - 1`; port-local pin `p`
/// maps to expander pin `start_pin() + p`.  The port holds no state of its
/// own beyond the mapping: every operation delegates to the owning expander
/// and serializes through the expander's guards, so ports may be used
/// concurrently with direct expander calls or with other, even overlapping,
/// ports.  Overlap is deliberate and not policed; keeping overlapping ports
/// consistent is the caller's concern.
///
/// Ports are created through [`Hc595::port()`][crate::Hc595::port], which
/// validates the range and fails with
/// [`InvalidPortConfiguration`][Error::InvalidPortConfiguration] instead of
/// handing out a partially usable view.
pub struct VirtualPort<'a, const N: usize, MM, MA> {
    owner: &'a Hc595<N, MM, MA>,
    start: u8,
    count: u8,
    max_value: u16,
    stamp_mask: [u8; N],
}

impl<'a, const N: usize, CH, MM, MA> VirtualPort<'a, N, MM, MA>
where
    CH: ShiftChain,
    MM: PortMutex<Port = Driver<N, CH>>,
    MA: PortMutex<Port = Option<BitBuffer<N>>>,
{
    pub(crate) fn new(
        owner: &'a Hc595<N, MM, MA>,
        start: u8,
        count: u8,
    ) -> Result<Self, Error<CH::Error>> {
        if count == 0 || count > MAX_PORT_PINS {
            return Err(Error::InvalidPortConfiguration);
        }
        let end = usize::from(start) + usize::from(count);
        if end - 1 > BitBuffer::<N>::MAX_BIT {
            return Err(Error::InvalidPortConfiguration);
        }

        let mut stamp_mask = [0x00; N];
        for pin in usize::from(start)..end {
            stamp_mask[pin / 8] |= 1 << (pin % 8);
        }

        Ok(Self {
            owner,
            start,
            count,
            max_value: ((1u32 << count) - 1) as u16,
            stamp_mask,
        })
    }

    fn rebase(&self, pin: u8) -> Result<u8, Error<CH::Error>> {
        if pin >= self.count {
            return Err(Error::PinOutOfRange);
        }
        Ok(self.start + pin)
    }

    /// Expander pin backing port-local pin 0.
    pub fn start_pin(&self) -> u8 {
        self.start
    }

    /// Number of pins grouped by this port.
    pub fn pin_count(&self) -> u8 {
        self.count
    }

    /// Largest value the port can hold, `2^pin_count - 1`.
    pub fn max_value(&self) -> u16 {
        self.max_value
    }

    /// Buffer-length mask with exactly this port's bits set.
    ///
    /// Ready for reuse with the expander's masked operations, e.g. to clear
    /// the whole port via [`Hc595::clear_mask()`][crate::Hc595::clear_mask].
    pub fn stamp_mask(&self) -> &[u8; N] {
        &self.stamp_mask
    }

    /// Read the buffered state of port-local `pin`.
    pub fn read(&self, pin: u8) -> Result<PinState, Error<CH::Error>> {
        self.owner.read(self.rebase(pin)?)
    }

    /// Set port-local `pin` to `state` and flush.
    pub fn write(&self, pin: u8, state: PinState) -> Result<(), Error<CH::Error>> {
        self.owner.write(self.rebase(pin)?, state)
    }

    pub fn set_high(&self, pin: u8) -> Result<(), Error<CH::Error>> {
        self.write(pin, PinState::High)
    }

    pub fn set_low(&self, pin: u8) -> Result<(), Error<CH::Error>> {
        self.write(pin, PinState::Low)
    }

    /// Invert port-local `pin` and flush.
    pub fn toggle(&self, pin: u8) -> Result<(), Error<CH::Error>> {
        self.owner.toggle(self.rebase(pin)?)
    }

    /// Read the whole port as one right-aligned value.
    ///
    /// Bit 0 of the result is port-local pin 0.
    pub fn read_port(&self) -> Result<u16, Error<CH::Error>> {
        self.owner.read_segment(self.start, self.count)
    }

    /// Write the whole port from one right-aligned value and flush.
    ///
    /// Values above [`Self::max_value()`] are rejected with
    /// [`Error::ValueOutOfRange`]; pins outside the port keep their state.
    pub fn write_port(&self, value: u16) -> Result<(), Error<CH::Error>> {
        if value > self.max_value {
            return Err(Error::ValueOutOfRange);
        }
        self.owner.write_segment(self.start, self.count, value)
    }

    /// Set every pin of the port high and flush.
    pub fn set_all_high(&self) -> Result<(), Error<CH::Error>> {
        self.owner.set_mask(&self.stamp_mask)
    }

    /// Set every pin of the port low and flush.
    pub fn set_all_low(&self) -> Result<(), Error<CH::Error>> {
        self.owner.clear_mask(&self.stamp_mask)
    }

    /// Invert every pin of the port and flush.
    pub fn toggle_all(&self) -> Result<(), Error<CH::Error>> {
        self.owner.toggle_mask(&self.stamp_mask)
    }
}

#[cfg(test)]
mod tests {
    use embedded_hal::digital::PinState;

    use crate::common::Error;
    use crate::testing::RecordingChain;
    use crate::Hc595;

    #[test]
    fn invalid_configurations_are_rejected() {
        let chain = RecordingChain::new();
        let xp = Hc595::<2, _, _>::new(chain.clone()).unwrap();
        assert!(matches!(
            xp.port(0, 0),
            Err(Error::InvalidPortConfiguration)
        ));
        assert!(matches!(
            xp.port(0, 17),
            Err(Error::InvalidPortConfiguration)
        ));
        assert!(matches!(
            xp.port(12, 5),
            Err(Error::InvalidPortConfiguration)
        ));
        assert!(xp.port(12, 4).is_ok());
        assert!(xp.port(0, 16).is_ok());
    }

    #[test]
    fn write_port_sets_only_the_port_pins() {
        let chain = RecordingChain::new();
        let xp = Hc595::<2, _, _>::with_seed(chain.clone(), [0b0000_1001, 0xff]).unwrap();
        let port = xp.port(4, 4).unwrap();

        port.write_port(0b1010).unwrap();
        // Port pins 0..4 map to expander pins 4..8: pin4=0, pin5=1, pin6=0,
        // pin7=1; pins 0-3 and 8+ keep their previous state.
        assert_eq!(xp.snapshot(), [0b1010_1001, 0xff]);
        assert_eq!(port.read_port().unwrap(), 0b1010);
    }

    #[test]
    fn port_local_pins_rebase_onto_expander_pins() {
        let chain = RecordingChain::new();
        let xp = Hc595::<2, _, _>::new(chain.clone()).unwrap();
        let port = xp.port(9, 3).unwrap();

        port.set_high(0).unwrap();
        port.write(2, PinState::High).unwrap();
        assert_eq!(xp.snapshot(), [0x00, 0b0000_1010]);
        assert_eq!(port.read(2).unwrap(), PinState::High);

        port.toggle(2).unwrap();
        assert_eq!(port.read(2).unwrap(), PinState::Low);
        assert!(matches!(port.read(3), Err(Error::PinOutOfRange)));
        assert!(matches!(
            port.write(3, PinState::High),
            Err(Error::PinOutOfRange)
        ));
    }

    #[test]
    fn overlapping_ports_observe_each_other() {
        let chain = RecordingChain::new();
        let xp = Hc595::<2, _, _>::new(chain.clone()).unwrap();
        let low = xp.port(0, 8).unwrap();
        let high = xp.port(4, 8).unwrap();

        low.set_high(5).unwrap();
        assert_eq!(high.read(1).unwrap(), PinState::High);

        high.write_port(0x00).unwrap();
        assert_eq!(low.read(5).unwrap(), PinState::Low);
    }

    #[test]
    fn write_port_rejects_values_beyond_capacity() {
        let chain = RecordingChain::new();
        let xp = Hc595::<2, _, _>::new(chain.clone()).unwrap();
        let port = xp.port(4, 4).unwrap();
        assert_eq!(port.max_value(), 0x0f);
        assert!(matches!(port.write_port(0x10), Err(Error::ValueOutOfRange)));
        assert_eq!(xp.snapshot(), [0x00, 0x00]);

        let full = xp.port(0, 16).unwrap();
        assert_eq!(full.max_value(), 0xffff);
        full.write_port(0xffff).unwrap();
        assert_eq!(xp.snapshot(), [0xff, 0xff]);
    }

    #[test]
    fn stamp_mask_covers_exactly_the_port_bits() {
        let chain = RecordingChain::new();
        let xp = Hc595::<2, _, _>::new(chain.clone()).unwrap();
        let port = xp.port(6, 4).unwrap();
        assert_eq!(port.stamp_mask(), &[0b1100_0000, 0b0000_0011]);
    }

    #[test]
    fn whole_port_operations_leave_other_pins_alone() {
        let chain = RecordingChain::new();
        let xp = Hc595::<2, _, _>::with_seed(chain.clone(), [0b0010_0001, 0b1000_0100]).unwrap();
        let port = xp.port(6, 4).unwrap();

        port.set_all_high().unwrap();
        assert_eq!(xp.snapshot(), [0b1110_0001, 0b1000_0111]);
        port.toggle_all().unwrap();
        assert_eq!(xp.snapshot(), [0b0010_0001, 0b1000_0100]);
        port.set_all_low().unwrap();
        assert_eq!(xp.snapshot(), [0b0010_0001, 0b1000_0100]);
    }

    #[test]
    fn port_accessors() {
        let chain = RecordingChain::new();
        let xp = Hc595::<2, _, _>::new(chain.clone()).unwrap();
        let port = xp.port(4, 4).unwrap();
        assert_eq!(port.start_pin(), 4);
        assert_eq!(port.pin_count(), 4);
    }
}
