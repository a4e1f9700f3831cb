//! Bit-banged three-wire access to a 74HC595-class register chain.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{OutputPin, PinState};

use crate::common::ShiftChain;

/// Minimum data/clock setup time of the 74HC595-class parts, in microseconds.
pub const DEFAULT_PULSE_WIDTH_US: u32 = 10;

/// Serializer for a chain of shift registers behind three GPIO lines.
///
/// The three pins are the serial-data input (`DS`), the shift-clock input
/// (`SH_CP`) and the storage/latch clock input (`ST_CP`) of the first
/// register in the daisy-chain.  All pins must already be configured as
/// push-pull outputs; the constructor takes ownership and brings the lines
/// to their idle levels (shift-clock high, data low, latch high).
///
/// Transmission frames the serial shifting with a latch pulse: the latch
/// line goes low, all bytes are shifted out, and the closing latch edge
/// copies the registers' internal storage to the parallel outputs in one
/// step.  Without that framing the output pins would flicker through every
/// intermediate shift state.
pub struct BitbangChain<Ds, Shcp, Stcp, D> {
    data: Ds,
    shift_clock: Shcp,
    latch: Stcp,
    delay: D,
    pulse_width_us: u32,
}

impl<Ds, Shcp, Stcp, D, E> BitbangChain<Ds, Shcp, Stcp, D>
where
    Ds: OutputPin<Error = E>,
    Shcp: OutputPin<Error = E>,
    Stcp: OutputPin<Error = E>,
    D: DelayNs,
{
    /// Take ownership of the control lines, using the datasheet minimum
    /// pulse width.
    pub fn new(data: Ds, shift_clock: Shcp, latch: Stcp, delay: D) -> Result<Self, E> {
        Self::with_pulse_width(data, shift_clock, latch, delay, DEFAULT_PULSE_WIDTH_US)
    }

    /// Take ownership of the control lines with a caller-chosen pulse width.
    ///
    /// Longer widths trade update rate for signal integrity on long chains.
    pub fn with_pulse_width(
        mut data: Ds,
        mut shift_clock: Shcp,
        mut latch: Stcp,
        delay: D,
        pulse_width_us: u32,
    ) -> Result<Self, E> {
        shift_clock.set_high()?;
        data.set_low()?;
        latch.set_high()?;
        Ok(Self {
            data,
            shift_clock,
            latch,
            delay,
            pulse_width_us,
        })
    }

    /// Shift one byte into the chain, most significant bit first.
    ///
    /// Only fills the registers' internal storage; the caller latches once
    /// the whole frame has been shifted.
    fn shift_out(&mut self, byte: u8) -> Result<(), E> {
        for bit in (0..8).rev() {
            self.shift_clock.set_low()?;
            self.data
                .set_state(PinState::from(byte & (1 << bit) != 0))?;
            self.delay.delay_us(self.pulse_width_us);
            // The rising edge shifts the bit into the register.
            self.shift_clock.set_high()?;
        }
        Ok(())
    }
}

impl<Ds, Shcp, Stcp, D, E> ShiftChain for BitbangChain<Ds, Shcp, Stcp, D>
where
    Ds: OutputPin<Error = E>,
    Shcp: OutputPin<Error = E>,
    Stcp: OutputPin<Error = E>,
    D: DelayNs,
{
    type Error = E;

    fn transmit(&mut self, frame: &[u8]) -> Result<(), E> {
        self.latch.set_low()?;
        // Far-end register first: every later byte pushes the earlier ones
        // one register further down the chain.
        for &byte in frame.iter().rev() {
            self.shift_out(byte)?;
        }
        self.latch.set_high()
    }
}

#[cfg(test)]
mod tests {
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::digital::{Mock as PinMock, State, Transaction};

    use super::*;

    fn data_line(frame: &[u8]) -> Vec<Transaction> {
        // Idle level from the constructor, then one state per bit.
        let mut t = vec![Transaction::set(State::Low)];
        for &byte in frame.iter().rev() {
            for bit in (0..8).rev() {
                let state = if byte & (1 << bit) != 0 {
                    State::High
                } else {
                    State::Low
                };
                t.push(Transaction::set(state));
            }
        }
        t
    }

    fn clock_line(bits: usize) -> Vec<Transaction> {
        let mut t = vec![Transaction::set(State::High)];
        for _ in 0..bits {
            t.push(Transaction::set(State::Low));
            t.push(Transaction::set(State::High));
        }
        t
    }

    fn latch_line() -> Vec<Transaction> {
        vec![
            Transaction::set(State::High),
            Transaction::set(State::Low),
            Transaction::set(State::High),
        ]
    }

    #[test]
    fn transmit_frames_bytes_with_latch_pulse() {
        let frame = [0xa5, 0x3c];
        let mut data = PinMock::new(&data_line(&frame));
        let mut clock = PinMock::new(&clock_line(16));
        let mut latch = PinMock::new(&latch_line());

        let mut chain =
            BitbangChain::new(data.clone(), clock.clone(), latch.clone(), NoopDelay::new())
                .unwrap();
        chain.transmit(&frame).unwrap();

        data.done();
        clock.done();
        latch.done();
    }

    #[test]
    fn far_register_byte_is_sent_first_msb_first() {
        // Frame for a 16 pin chain with only pin 15 high: the register-1
        // byte 0x80 must hit the wire before the register-0 byte 0x00, so
        // the data line shows exactly one leading high bit.
        let mut expectations = vec![
            Transaction::set(State::Low),  // idle
            Transaction::set(State::High), // MSB of byte 1
        ];
        expectations.extend(std::iter::repeat(Transaction::set(State::Low)).take(15));

        let mut data = PinMock::new(&expectations);
        let mut clock = PinMock::new(&clock_line(16));
        let mut latch = PinMock::new(&latch_line());

        let mut chain =
            BitbangChain::new(data.clone(), clock.clone(), latch.clone(), NoopDelay::new())
                .unwrap();
        chain.transmit(&[0x00, 0x80]).unwrap();

        data.done();
        clock.done();
        latch.done();
    }

    #[test]
    fn single_register_frame() {
        let frame = [0x01];
        let mut data = PinMock::new(&data_line(&frame));
        let mut clock = PinMock::new(&clock_line(8));
        let mut latch = PinMock::new(&latch_line());

        let mut chain = BitbangChain::with_pulse_width(
            data.clone(),
            clock.clone(),
            latch.clone(),
            NoopDelay::new(),
            1,
        )
        .unwrap();
        chain.transmit(&frame).unwrap();

        data.done();
        clock.done();
        latch.done();
    }
}
