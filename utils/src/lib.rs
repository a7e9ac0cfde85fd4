//! Leverage common functionality across the ella sparse array crates.

mod clock;
pub use clock::{Clock, SystemClock};
mod time;
pub use time::SystemTimeExt;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;

/// A macro to create a `NonZeroU64` from a literal or expression.
///
/// Panics (at compile time when used in a `const`) if the value is zero.
#[macro_export]
macro_rules! NZU64 {
    ($val:expr) => {
        match ::std::num::NonZeroU64::new($val) {
            Some(v) => v,
            None => panic!("value must be non-zero"),
        }
    };
}
