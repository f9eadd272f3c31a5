//! Logging shim
//!
//! Routes to `log` or `defmt` depending on the enabled feature, and to
//! nothing otherwise. Format strings stay within the subset both accept.

#![allow(unused_imports, unused_macros)]

cfg_if::cfg_if! {
    if #[cfg(feature = "log")] {
        pub(crate) use log::{debug, error, info, warn};
    } else if #[cfg(feature = "defmt")] {
        pub(crate) use defmt::{debug, error, info, warn};
    } else {
        macro_rules! debug {
            ($($arg:tt)*) => {{ let _ = ::core::format_args!($($arg)*); }};
        }
        macro_rules! info {
            ($($arg:tt)*) => {{ let _ = ::core::format_args!($($arg)*); }};
        }
        macro_rules! warn {
            ($($arg:tt)*) => {{ let _ = ::core::format_args!($($arg)*); }};
        }
        macro_rules! error {
            ($($arg:tt)*) => {{ let _ = ::core::format_args!($($arg)*); }};
        }
        pub(crate) use {debug, error, info, warn};
    }
}
