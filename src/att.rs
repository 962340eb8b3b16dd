//! Attribute handles, values, and error codes ([Vol 3] Part F).

pub use {consts::*, handle::*, value::*};

mod consts;
mod handle;
mod value;
