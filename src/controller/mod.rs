mod builder;
mod controller;
mod worker;

pub use builder::*;
pub use controller::*;
pub(crate) use worker::*;
