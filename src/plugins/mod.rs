//! Reference security interceptors.
//!
//! Each plugin claims the header it is responsible for in its Before hook,
//! so no later interceptor or handler can weaken it through the generic
//! header API.

pub mod csp;
pub mod framing;
pub mod hsts;

pub use csp::{Csp, DisableCsp};
pub use framing::{AllowFraming, Framing};
pub use hsts::Hsts;
