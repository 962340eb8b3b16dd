//! Generic Access Profile ([Vol 3] Part C) types shared by the server, the
//! client, and the host boundary.

pub use {addr::*, conn::*, uuid::*};

mod addr;
mod conn;
mod uuid;
