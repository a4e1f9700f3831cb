//! The expander core: Main buffer ownership, the staged-edit protocol and
//! the public pin manipulation API.

use core::cell::RefCell;

use embedded_hal::digital::PinState;

use crate::buffer::BitBuffer;
use crate::common::{Error, ShiftChain};
use crate::mutex::PortMutex;
use crate::pin::Pin;
use crate::port::VirtualPort;

/// The Main buffer together with the transmitter it is flushed through.
///
/// Guarded as a unit by the expander's Main mutex: whoever holds the guard
/// may both mutate the buffer and serialize it to the chain, so no two
/// callers can ever interleave on the physical lines.
pub struct Driver<const N: usize, CH> {
    chain: CH,
    buffer: BitBuffer<N>,
}

impl<const N: usize, CH: ShiftChain> Driver<N, CH> {
    fn new(chain: CH, buffer: BitBuffer<N>) -> Self {
        Self { chain, buffer }
    }

    fn flush(&mut self) -> Result<(), Error<CH::Error>> {
        self.chain
            .transmit(self.buffer.as_bytes())
            .map_err(Error::Pin)
    }

    /// Replace Main with the staged buffer, if one is pending.
    fn adopt(&mut self, staged: &mut Option<BitBuffer<N>>) -> bool {
        match staged.take() {
            Some(pending) => {
                self.buffer = pending;
                true
            }
            None => false,
        }
    }
}

/// GPIO output expander over `N` daisy-chained 74HC595 shift registers.
///
/// The expander owns two in-memory buffers:
///
/// * the **Main buffer**, which always mirrors the last state flushed to the
///   physical registers, and
/// * an optional **staged buffer**, created on the first deferred write and
///   holding batched edits that have not been flushed yet.
///
/// While a staged buffer exists, Main is stale for every pin written to the
/// staged buffer since its creation.  Every operation that reads or mutates
/// Main therefore reconciles first: the staged buffer is merged into Main
/// (or discarded, for operations that replace the whole buffer anyway) and
/// the staged state ends.  Merging and discarding are the only two ways out
/// of a deferred-edit sequence, so no edit is ever silently lost and no
/// read ever observes stale data.
///
/// Direct mutators flush the Main buffer to the hardware exactly once per
/// call.  The deferred-write path exists so that a batch of single-bit
/// edits costs one flush instead of one per bit:
///
/// ```no_run
/// # use embedded_hal_mock::eh1::delay::NoopDelay;
/// # use embedded_hal_mock::eh1::digital::Mock as PinMock;
/// # use embedded_hal::digital::PinState;
/// # use hc595_expander::{BitbangChain, Hc595};
/// # let (ds, shcp, stcp) = (PinMock::new(&[]), PinMock::new(&[]), PinMock::new(&[]));
/// let chain = BitbangChain::new(ds, shcp, stcp, NoopDelay::new()).unwrap();
/// let expander = Hc595::<2, _, _>::new(chain).unwrap();
///
/// expander.write_deferred(3, PinState::High).unwrap();
/// expander.write_deferred(7, PinState::High).unwrap();
/// expander.write_deferred(12, PinState::Low).unwrap();
/// expander.commit_staged().unwrap(); // one hardware flush
/// ```
///
/// Two [`PortMutex`] guards serialize concurrent access, one for Main (and
/// the chain) and one for the staged buffer.  Every path that needs both
/// takes the Main guard first; only that fixed order is used, so lock-order
/// inversion cannot occur.  With the default [`RefCell`] guards the
/// expander is single-context; pick `std::sync::Mutex` (feature `std`) or
/// `critical_section::Mutex` (feature `critical-section`) via
/// [`Hc595::with_mutex()`] for shared use.
pub struct Hc595<const N: usize, MM, MA> {
    main: MM,
    staged: MA,
}

impl<const N: usize, CH> Hc595<N, RefCell<Driver<N, CH>>, RefCell<Option<BitBuffer<N>>>>
where
    CH: ShiftChain,
{
    /// Create an expander with all pins low, using `RefCell` guards.
    ///
    /// The zeroed Main buffer is flushed immediately so the outputs are in a
    /// known state from the start.
    pub fn new(chain: CH) -> Result<Self, Error<CH::Error>> {
        Self::with_mutex(chain, [0x00; N])
    }

    /// Create an expander with caller-provided initial content, using
    /// `RefCell` guards.
    pub fn with_seed(chain: CH, seed: [u8; N]) -> Result<Self, Error<CH::Error>> {
        Self::with_mutex(chain, seed)
    }
}

impl<const N: usize, CH, MM, MA> Hc595<N, MM, MA>
where
    CH: ShiftChain,
    MM: PortMutex<Port = Driver<N, CH>>,
    MA: PortMutex<Port = Option<BitBuffer<N>>>,
{
    /// Create an expander with explicitly chosen mutex types.
    ///
    /// `seed` becomes the initial Main buffer content and is flushed before
    /// the constructor returns.
    pub fn with_mutex(mut chain: CH, seed: [u8; N]) -> Result<Self, Error<CH::Error>> {
        let buffer = BitBuffer::from_bytes(seed);
        chain.transmit(buffer.as_bytes()).map_err(Error::Pin)?;
        Ok(Self {
            main: PortMutex::create(Driver::new(chain, buffer)),
            staged: PortMutex::create(None),
        })
    }

    /// Number of daisy-chained registers.
    pub const fn register_count(&self) -> usize {
        N
    }

    /// Highest valid pin index, `N * 8 - 1`.
    pub const fn max_pin(&self) -> u8 {
        BitBuffer::<N>::MAX_BIT as u8
    }

    fn check_pin(pin: u8) -> Result<(), Error<CH::Error>> {
        if usize::from(pin) > BitBuffer::<N>::MAX_BIT {
            return Err(Error::PinOutOfRange);
        }
        Ok(())
    }

    /// Merge a pending staged buffer into Main.
    ///
    /// Returns whether a merge happened.  Must be called with the Main guard
    /// held; takes the staged guard (Main before staged is the global lock
    /// order).
    fn reconcile(&self, main: &mut Driver<N, CH>) -> bool {
        self.staged.lock(|staged| main.adopt(staged))
    }

    /// Read the buffered state of `pin`.
    ///
    /// If a deferred-edit sequence is in progress it is committed first so
    /// the returned state can never be stale.
    pub fn read(&self, pin: u8) -> Result<PinState, Error<CH::Error>> {
        Self::check_pin(pin)?;
        self.main.lock(|m| {
            if self.reconcile(m) {
                m.flush()?;
            }
            Ok(PinState::from(m.buffer.get(pin)?))
        })
    }

    /// Set `pin` to `state` and flush.
    pub fn write(&self, pin: u8, state: PinState) -> Result<(), Error<CH::Error>> {
        Self::check_pin(pin)?;
        self.main.lock(|m| {
            self.reconcile(m);
            m.buffer.set(pin, state == PinState::High)?;
            m.flush()
        })
    }

    /// Set `pin` high and flush.
    pub fn set_high(&self, pin: u8) -> Result<(), Error<CH::Error>> {
        self.write(pin, PinState::High)
    }

    /// Set `pin` low and flush.
    pub fn set_low(&self, pin: u8) -> Result<(), Error<CH::Error>> {
        self.write(pin, PinState::Low)
    }

    /// Invert `pin` and flush.
    pub fn toggle(&self, pin: u8) -> Result<(), Error<CH::Error>> {
        Self::check_pin(pin)?;
        self.main.lock(|m| {
            self.reconcile(m);
            m.buffer.toggle(pin)?;
            m.flush()
        })
    }

    /// Set every pin high and flush.
    ///
    /// A pending staged buffer is discarded, not merged: the new content
    /// covers every pin, so the deferred edits are superseded anyway.
    pub fn set_all_high(&self) -> Result<(), Error<CH::Error>> {
        self.main.lock(|m| {
            self.discard_staged();
            m.buffer.fill(0xff);
            m.flush()
        })
    }

    /// Set every pin low and flush.  Discards a pending staged buffer.
    pub fn set_all_low(&self) -> Result<(), Error<CH::Error>> {
        self.main.lock(|m| {
            self.discard_staged();
            m.buffer.fill(0x00);
            m.flush()
        })
    }

    /// Invert every pin and flush.
    pub fn toggle_all(&self) -> Result<(), Error<CH::Error>> {
        self.main.lock(|m| {
            self.reconcile(m);
            m.buffer.toggle_all();
            m.flush()
        })
    }

    /// Set every pin selected by `mask` high and flush.
    ///
    /// A set bit in the mask selects the pin of the same index for
    /// modification; clear mask bits leave their pins untouched.  The mask
    /// is copied before the operation starts, so later changes to the
    /// caller's array cannot affect it.
    pub fn set_mask(&self, mask: &[u8; N]) -> Result<(), Error<CH::Error>> {
        let mask = *mask;
        self.main.lock(|m| {
            self.reconcile(m);
            m.buffer.set_masked(&mask);
            m.flush()
        })
    }

    /// Set every pin selected by `mask` low and flush.
    pub fn clear_mask(&self, mask: &[u8; N]) -> Result<(), Error<CH::Error>> {
        let mask = *mask;
        self.main.lock(|m| {
            self.reconcile(m);
            m.buffer.clear_masked(&mask);
            m.flush()
        })
    }

    /// Invert every pin selected by `mask` and flush.
    pub fn toggle_mask(&self, mask: &[u8; N]) -> Result<(), Error<CH::Error>> {
        let mask = *mask;
        self.main.lock(|m| {
            self.reconcile(m);
            m.buffer.toggle_masked(&mask);
            m.flush()
        })
    }

    /// Copy `values` into the pins selected by `mask` and flush.
    ///
    /// Pins not selected by the mask keep their current state.
    pub fn write_masked(&self, mask: &[u8; N], values: &[u8; N]) -> Result<(), Error<CH::Error>> {
        let mask = *mask;
        let values = *values;
        self.main.lock(|m| {
            self.reconcile(m);
            m.buffer.stamp_masked(&mask, &values);
            m.flush()
        })
    }

    /// Replace the whole Main buffer with `content` and flush.
    ///
    /// A pending staged buffer is discarded without merging: the full
    /// replacement supersedes any deferred edits.
    pub fn overwrite(&self, content: &[u8; N]) -> Result<(), Error<CH::Error>> {
        let content = *content;
        self.main.lock(|m| {
            self.discard_staged();
            m.buffer.copy_from(&content);
            m.flush()
        })
    }

    /// Read `count` pins starting at `start` as one right-aligned value.
    ///
    /// Bit 0 of the result is pin `start`.  `count` must lie in `1..=16`.
    /// Commits a pending deferred-edit sequence first, like [`Self::read()`].
    pub fn read_segment(&self, start: u8, count: u8) -> Result<u16, Error<CH::Error>> {
        BitBuffer::<N>::check_segment(start, count)?;
        self.main.lock(|m| {
            if self.reconcile(m) {
                m.flush()?;
            }
            Ok(m.buffer.read_segment(start, count)?)
        })
    }

    /// Write `count` pins starting at `start` from a right-aligned value,
    /// then flush.  Value bits above `count` are ignored.
    pub fn write_segment(&self, start: u8, count: u8, value: u16) -> Result<(), Error<CH::Error>> {
        BitBuffer::<N>::check_segment(start, count)?;
        self.main.lock(|m| {
            self.reconcile(m);
            m.buffer.write_segment(start, count, value)?;
            m.flush()
        })
    }

    /// Set `pin` to `state` in the staged buffer without flushing.
    ///
    /// Starts a deferred-edit sequence if none is in progress by cloning
    /// Main into a fresh staged buffer.  The edit reaches the hardware when
    /// the sequence is committed, either explicitly via
    /// [`Self::commit_staged()`] or implicitly by the next operation that
    /// touches Main.
    pub fn write_deferred(&self, pin: u8, state: PinState) -> Result<(), Error<CH::Error>> {
        Self::check_pin(pin)?;
        self.main.lock(|m| {
            self.staged.lock(|staged| {
                let pending = staged.get_or_insert_with(|| m.buffer.clone());
                pending.set(pin, state == PinState::High)?;
                Ok(())
            })
        })
    }

    /// Invert `pin` in the staged buffer without flushing.
    pub fn toggle_deferred(&self, pin: u8) -> Result<(), Error<CH::Error>> {
        Self::check_pin(pin)?;
        self.main.lock(|m| {
            self.staged.lock(|staged| {
                let pending = staged.get_or_insert_with(|| m.buffer.clone());
                pending.toggle(pin)?;
                Ok(())
            })
        })
    }

    /// Seed the staged buffer with a copy of Main.
    ///
    /// With `overwrite` false an already existing staged buffer is left
    /// untouched and `false` is returned.
    pub fn copy_main_to_staged(&self, overwrite: bool) -> bool {
        self.main.lock(|m| {
            self.staged.lock(|staged| {
                if staged.is_some() && !overwrite {
                    return false;
                }
                *staged = Some(m.buffer.clone());
                true
            })
        })
    }

    /// Merge the staged buffer into Main and flush once.
    ///
    /// Returns `Ok(false)` if no deferred-edit sequence was in progress.
    pub fn commit_staged(&self) -> Result<bool, Error<CH::Error>> {
        self.main.lock(|m| {
            if self.reconcile(m) {
                m.flush()?;
                Ok(true)
            } else {
                Ok(false)
            }
        })
    }

    /// Drop the staged buffer, losing any deferred edits.
    ///
    /// Idempotent; the expander is guaranteed to be in the clean state
    /// afterwards.
    pub fn discard_staged(&self) {
        self.staged.lock(|staged| *staged = None);
    }

    /// Whether a deferred-edit sequence is in progress.
    pub fn is_staged(&self) -> bool {
        self.staged.lock(|staged| staged.is_some())
    }

    /// Copy of the current Main buffer content, for diagnostics.
    ///
    /// Does not reconcile: while a deferred-edit sequence is in progress
    /// this is the last *flushed* state, not the pending one.
    pub fn snapshot(&self) -> [u8; N] {
        self.main.lock(|m| *m.buffer.as_bytes())
    }

    /// Copy of the staged buffer content, if any, for diagnostics.
    pub fn staged_snapshot(&self) -> Option<[u8; N]> {
        self.staged
            .lock(|staged| staged.as_ref().map(|b| *b.as_bytes()))
    }

    /// Handle to a single pin, usable as an `embedded-hal` output pin.
    pub fn pin(&self, index: u8) -> Result<Pin<'_, N, MM, MA>, Error<CH::Error>> {
        Self::check_pin(index)?;
        Ok(Pin::new(self, index))
    }

    /// View over `count` contiguous pins starting at `start`.
    ///
    /// `count` must lie in `1..=16` and the range must not extend past
    /// [`Self::max_pin()`].  Ports may overlap freely; all of them serialize
    /// through the owning expander's guards.
    pub fn port(
        &self,
        start: u8,
        count: u8,
    ) -> Result<VirtualPort<'_, N, MM, MA>, Error<CH::Error>> {
        VirtualPort::new(self, start, count)
    }
}
