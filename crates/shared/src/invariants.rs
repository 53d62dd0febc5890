//! Bounded numeric wrappers for validated configuration values.

use std::fmt;
use std::time::Duration;

/// Out-of-range error for bounded numeric wrappers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundsError<T> {
    /// Raw value provided.
    pub value: T,
    /// Inclusive minimum.
    pub min: T,
    /// Inclusive maximum.
    pub max: T,
}

impl<T: fmt::Display> fmt::Display for BoundsError<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "value {} is outside [{}, {}]",
            self.value, self.min, self.max
        )
    }
}

impl<T: fmt::Debug + fmt::Display> std::error::Error for BoundsError<T> {}

macro_rules! bounded_int {
    ($(#[$meta:meta])* $name:ident, $int:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name<const MIN: $int, const MAX: $int>($int);

        impl<const MIN: $int, const MAX: $int> $name<MIN, MAX> {
            /// Create a bounded value when within the inclusive range.
            pub const fn new(value: $int) -> Option<Self> {
                if value < MIN || value > MAX {
                    None
                } else {
                    Some(Self(value))
                }
            }

            /// Create a bounded value or return a bounds error.
            pub const fn try_new(value: $int) -> Result<Self, BoundsError<$int>> {
                match Self::new(value) {
                    Some(value) => Ok(value),
                    None => Err(BoundsError {
                        value,
                        min: MIN,
                        max: MAX,
                    }),
                }
            }

            /// Return the wrapped value.
            pub const fn get(self) -> $int {
                self.0
            }
        }

        impl<const MIN: $int, const MAX: $int> fmt::Display for $name<MIN, MAX> {
            fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(formatter, "{}", self.0)
            }
        }
    };
}

bounded_int!(
    /// Bounded `u32` with const generic limits.
    BoundedU32,
    u32
);

bounded_int!(
    /// Bounded `u64` with const generic limits.
    BoundedU64,
    u64
);

impl<const MIN: u64, const MAX: u64> BoundedU64<MIN, MAX> {
    /// Interpret the value as a millisecond duration.
    pub const fn as_millis_duration(self) -> Duration {
        Duration::from_millis(self.0)
    }
}
