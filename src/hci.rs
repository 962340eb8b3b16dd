//! Host Controller Interface codes and handles used at the host boundary.

pub use {consts::*, handle::*};

mod consts;
mod handle;
