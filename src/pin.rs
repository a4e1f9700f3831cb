use embedded_hal::digital::{self as hal_digital, PinState};

use crate::buffer::BitBuffer;
use crate::common::{Error, ShiftChain};
use crate::expander::{Driver, Hc595};
use crate::mutex::PortMutex;

/// Handle to a single expander pin.
///
/// `Pin` is not constructed directly; use [`Hc595::pin()`][crate::Hc595::pin]
/// to obtain one.  It borrows the expander for its whole lifetime and routes
/// every operation through the expander's guards, so pin handles may be used
/// alongside direct expander calls, virtual ports and other pin handles.
///
/// The handle implements the `embedded-hal` output-pin traits, which lets an
/// expander pin be passed to any driver expecting a GPIO output.
pub struct Pin<'a, const N: usize, MM, MA> {
    owner: &'a Hc595<N, MM, MA>,
    index: u8,
}

impl<'a, const N: usize, CH, MM, MA> Pin<'a, N, MM, MA>
where
    CH: ShiftChain,
    MM: PortMutex<Port = Driver<N, CH>>,
    MA: PortMutex<Port = Option<BitBuffer<N>>>,
{
    pub(crate) fn new(owner: &'a Hc595<N, MM, MA>, index: u8) -> Self {
        Self { owner, index }
    }

    /// Expander pin index this handle refers to.
    pub fn index(&self) -> u8 {
        self.index
    }

    pub fn set_high(&mut self) -> Result<(), Error<CH::Error>> {
        self.owner.write(self.index, PinState::High)
    }

    pub fn set_low(&mut self) -> Result<(), Error<CH::Error>> {
        self.owner.write(self.index, PinState::Low)
    }

    pub fn set_state(&mut self, state: PinState) -> Result<(), Error<CH::Error>> {
        self.owner.write(self.index, state)
    }

    pub fn toggle(&mut self) -> Result<(), Error<CH::Error>> {
        self.owner.toggle(self.index)
    }

    pub fn is_set_high(&self) -> Result<bool, Error<CH::Error>> {
        Ok(self.owner.read(self.index)? == PinState::High)
    }

    pub fn is_set_low(&self) -> Result<bool, Error<CH::Error>> {
        Ok(self.owner.read(self.index)? == PinState::Low)
    }
}

impl<'a, const N: usize, CH, MM, MA> hal_digital::ErrorType for Pin<'a, N, MM, MA>
where
    CH: ShiftChain,
    CH::Error: core::fmt::Debug,
    MM: PortMutex<Port = Driver<N, CH>>,
    MA: PortMutex<Port = Option<BitBuffer<N>>>,
{
    type Error = Error<CH::Error>;
}

impl<'a, const N: usize, CH, MM, MA> hal_digital::OutputPin for Pin<'a, N, MM, MA>
where
    CH: ShiftChain,
    CH::Error: core::fmt::Debug,
    MM: PortMutex<Port = Driver<N, CH>>,
    MA: PortMutex<Port = Option<BitBuffer<N>>>,
{
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Pin::set_low(self)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Pin::set_high(self)
    }
}

impl<'a, const N: usize, CH, MM, MA> hal_digital::StatefulOutputPin for Pin<'a, N, MM, MA>
where
    CH: ShiftChain,
    CH::Error: core::fmt::Debug,
    MM: PortMutex<Port = Driver<N, CH>>,
    MA: PortMutex<Port = Option<BitBuffer<N>>>,
{
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        Pin::is_set_high(self)
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        Pin::is_set_low(self)
    }

    fn toggle(&mut self) -> Result<(), Self::Error> {
        Pin::toggle(self)
    }
}

#[cfg(test)]
mod tests {
    use embedded_hal::digital::StatefulOutputPin;

    use crate::common::Error;
    use crate::testing::RecordingChain;
    use crate::Hc595;

    #[test]
    fn pin_handle_drives_its_bit() {
        let chain = RecordingChain::new();
        let xp = Hc595::<2, _, _>::new(chain.clone()).unwrap();
        let mut pin = xp.pin(10).unwrap();

        pin.set_high().unwrap();
        assert!(pin.is_set_high().unwrap());
        assert_eq!(chain.last_frame(), Some(vec![0x00, 0x04]));

        pin.toggle().unwrap();
        assert!(pin.is_set_low().unwrap());
        assert_eq!(chain.last_frame(), Some(vec![0x00, 0x00]));
    }

    #[test]
    fn pin_handle_works_through_hal_traits() {
        fn blink<P: StatefulOutputPin>(pin: &mut P) -> Result<(), P::Error> {
            pin.set_high()?;
            pin.toggle()?;
            Ok(())
        }

        let chain = RecordingChain::new();
        let xp = Hc595::<1, _, _>::new(chain.clone()).unwrap();
        let mut pin = xp.pin(0).unwrap();
        blink(&mut pin).unwrap();
        assert_eq!(chain.last_frame(), Some(vec![0x00]));
        assert_eq!(chain.flush_count(), 3);
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let chain = RecordingChain::new();
        let xp = Hc595::<1, _, _>::new(chain.clone()).unwrap();
        assert!(matches!(xp.pin(8), Err(Error::PinOutOfRange)));
        assert!(xp.pin(7).is_ok());
    }
}
