#![cfg_attr(not(test), no_std)]

mod align;
mod addr;

pub use self::align::*;
pub use self::addr::*;
