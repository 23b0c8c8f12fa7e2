//! # Register Bus
//!
//! This module defines the sized access window through which all
//! controller registers are reached. See [`BusDevice`] for a starting
//! point.
//!
//! Both the UHCI I/O register block and the PCI configuration space of
//! the controller are modelled as a [`BusDevice`]. Whether the backing
//! is real port I/O or the [emulated](crate::device::uhci::emulated)
//! register file is invisible to the power-state code.

use std::fmt::{Debug, Display, Formatter};
use std::{
    convert::{TryFrom, TryInto},
    fmt,
    sync::Arc,
};

/// The size of bus requests.
///
/// We don't use plain integers here to prevent use with illegal
/// sizes. [`RequestSize`] can be converted from and to [`u64`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum RequestSize {
    Size1 = 1,
    Size2 = 2,
    Size4 = 4,
}

impl From<RequestSize> for u8 {
    fn from(r: RequestSize) -> Self {
        r as Self
    }
}

impl From<RequestSize> for u64 {
    fn from(r: RequestSize) -> Self {
        r as Self
    }
}

impl Display for RequestSize {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let val = u8::from(*self);
        write!(f, "{val}")
    }
}

impl RequestSize {
    /// The mask covering all bits a request of this size can carry.
    #[must_use]
    pub const fn value_mask(self) -> u64 {
        match self {
            Self::Size1 => 0xFF,
            Self::Size2 => 0xFFFF,
            Self::Size4 => 0xFFFF_FFFF,
        }
    }
}

/// An attempt was made to convert a size into a [`RequestSize`] that
/// cannot be represented.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illegal register access size")]
pub struct IllegalRequestSize {}

impl TryFrom<u32> for RequestSize {
    type Error = IllegalRequestSize;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        u64::from(value).try_into()
    }
}

impl TryFrom<u64> for RequestSize {
    type Error = IllegalRequestSize;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Size1),
            2 => Ok(Self::Size2),
            4 => Ok(Self::Size4),
            _ => Err(IllegalRequestSize {}),
        }
    }
}

/// The address-size pair for [`BusDevice`] read/write operations.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Request {
    /// The offset of the request in bytes, relative to the start of
    /// the register block.
    pub addr: u64,

    /// The size of this request.
    pub size: RequestSize,
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let size: u64 = self.size.into();

        write!(f, "{:#06x}+{:x}", self.addr, size)
    }
}

impl Request {
    /// Create a new request from address and size.
    #[must_use]
    pub const fn new(addr: u64, size: RequestSize) -> Self {
        Self { addr, size }
    }
}

/// A block of registers that answers sized read/write requests.
///
/// Register accesses are side-effecting: reading a status register may
/// observe hardware progress, writing a command register may start a
/// reset. Implementations must therefore not cache or coalesce accesses.
pub trait BusDevice: Debug {
    /// Return the size of this register block. The device has to
    /// respond to requests between `0` and `size - 1`.
    fn size(&self) -> u64;

    /// Read a register.
    ///
    /// Only the low `req.size` bytes of the result carry data.
    fn read(&self, req: Request) -> u64;

    /// Write a register.
    ///
    /// Bits of `value` above `req.size` bytes are ignored.
    fn write(&self, req: Request, value: u64);
}

/// A version of [`BusDevice`] that does not mandate thread-safety.
///
/// This trait is meant for devices that are simple enough that they
/// don't want to care about their own thread safety and are fine when
/// they get wrapped into a [`std::sync::Mutex`].
pub trait SingleThreadedBusDevice {
    /// See [`BusDevice::size`].
    fn size(&self) -> u64;

    /// See [`BusDevice::read`].
    fn read(&mut self, req: Request) -> u64;

    /// See [`BusDevice::write`].
    fn write(&mut self, req: Request, value: u64);
}

/// Each [`SingleThreadedBusDevice`] can be easily wrapped into a mutex to
/// become a normal [`BusDevice`].
impl<T: SingleThreadedBusDevice + Debug + Send> BusDevice for std::sync::Mutex<T> {
    fn size(&self) -> u64 {
        self.lock().unwrap().size()
    }

    fn write(&self, req: Request, value: u64) {
        self.lock().unwrap().write(req, value)
    }

    fn read(&self, req: Request) -> u64 {
        self.lock().unwrap().read(req)
    }
}

/// A reference-counted reference to a [`BusDevice`].
pub type BusDeviceRef = Arc<dyn BusDevice + Send + Sync>;

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use proptest::prelude::*;

    impl Arbitrary for RequestSize {
        type Parameters = ();
        type Strategy = BoxedStrategy<Self>;

        fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
            Strategy::boxed(prop_oneof![
                Just(Self::Size1),
                Just(Self::Size2),
                Just(Self::Size4),
            ])
        }
    }

    #[test]
    fn invalid_sizes_are_not_converted_to_request_size() {
        for invalid_size in [0u64, 3, 7, 8, 300, u64::MAX] {
            assert_eq!(
                RequestSize::try_from(invalid_size),
                Err(IllegalRequestSize {})
            );
        }
    }

    proptest! {
        #[test]
        fn request_sizes_to_integer_and_back_conversion_is_identity(rs: RequestSize) {
            assert_eq!(u64::from(rs).try_into(), Ok(rs));
        }

        #[test]
        fn value_mask_covers_exactly_the_request_bytes(rs: RequestSize) {
            assert_eq!(rs.value_mask().count_ones(), 8 * u32::from(u8::from(rs)));
        }
    }

    #[test]
    fn requests_display_offset_and_size() {
        assert_eq!(
            Request::new(0x10, RequestSize::Size2).to_string(),
            "0x0010+2"
        );
    }

    #[derive(Debug, Default)]
    struct Scratch {
        value: u64,
    }

    impl SingleThreadedBusDevice for Scratch {
        fn size(&self) -> u64 {
            4
        }

        fn read(&mut self, req: Request) -> u64 {
            self.value & req.size.value_mask()
        }

        fn write(&mut self, req: Request, value: u64) {
            self.value = value & req.size.value_mask();
        }
    }

    #[test]
    fn single_threaded_devices_work_behind_a_mutex() {
        let dev: BusDeviceRef = Arc::new(Mutex::new(Scratch::default()));

        dev.write(Request::new(0, RequestSize::Size2), 0x1_2345);
        assert_eq!(dev.read(Request::new(0, RequestSize::Size4)), 0x2345);
        assert_eq!(dev.size(), 4);
    }
}
