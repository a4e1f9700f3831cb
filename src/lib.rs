//! GPIO output expander driver for daisy-chained 74HC595-class shift
//! registers.
//!
//! A 74HC595 adds eight digital output pins behind three GPIO lines
//! (serial data, shift clock, latch clock); daisy-chaining registers
//! extends the pin count by eight per chip.  This crate keeps an in-memory
//! mirror of the whole chain, offers Arduino-style pin manipulation on top
//! of it — single pins, bulk and masked updates, contiguous "virtual
//! ports" — and serializes the mirror to the hardware whenever it changes.
//!
//! The chain length is a const generic: `Hc595<2, _, _>` drives two
//! registers, i.e. sixteen output pins.  The three control lines are
//! consumed as [`embedded_hal::digital::OutputPin`]s together with an
//! [`embedded_hal::delay::DelayNs`] for the datasheet pulse timing, so the
//! driver runs on any HAL.
//!
//! ## Example
//!
//! ```no_run
//! # use embedded_hal_mock::eh1::delay::NoopDelay;
//! # use embedded_hal_mock::eh1::digital::Mock as PinMock;
//! use embedded_hal::digital::PinState;
//! use hc595_expander::{BitbangChain, Hc595};
//!
//! # let (ds, shcp, stcp) = (PinMock::new(&[]), PinMock::new(&[]), PinMock::new(&[]));
//! // ds, shcp, stcp: OutputPin implementations wired to the first register.
//! let chain = BitbangChain::new(ds, shcp, stcp, NoopDelay::new()).unwrap();
//! let expander = Hc595::<2, _, _>::new(chain).unwrap();
//!
//! expander.write(3, PinState::High).unwrap();
//! expander.toggle(3).unwrap();
//!
//! // Group related pins into a virtual port with port-local numbering:
//! let traffic_light = expander.port(4, 3).unwrap();
//! traffic_light.write_port(0b001).unwrap(); // red on, yellow/green off
//!
//! // Batch several edits into a single hardware update:
//! expander.write_deferred(0, PinState::High).unwrap();
//! expander.write_deferred(1, PinState::High).unwrap();
//! expander.commit_staged().unwrap();
//! ```
//!
//! Buffer consistency is maintained by the expander itself: deferred edits
//! live in a staged buffer that is merged into the Main buffer (or
//! discarded by full-buffer replacements) before any other operation reads
//! or writes it.  See [`Hc595`] for the protocol details.
//!
//! Concurrent use is supported by choosing the guard types at construction
//! time via [`Hc595::with_mutex()`] — see [`PortMutex`].
#![cfg_attr(not(test), no_std)]

#[cfg(all(not(test), feature = "std"))]
extern crate std;

mod buffer;
mod chain;
mod common;
mod expander;
mod mutex;
mod pin;
mod port;

#[cfg(test)]
mod testing;

pub use buffer::{BitBuffer, OutOfRange};
pub use chain::{BitbangChain, DEFAULT_PULSE_WIDTH_US};
pub use common::{Error, ShiftChain};
pub use expander::{Driver, Hc595};
pub use mutex::PortMutex;
pub use pin::Pin;
pub use port::{VirtualPort, MAX_PORT_PINS};
