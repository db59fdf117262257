// Style.
#![allow(clippy::nonminimal_bool)]
#![allow(clippy::single_match)]

pub mod readelf;

#[cfg(feature = "visit")]
pub mod elfsyms;
