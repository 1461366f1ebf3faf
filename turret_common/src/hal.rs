//! Hardware abstraction layer traits.
//!
//! Control modules talk to hardware only through the traits in
//! [`driver`]; concrete drivers live in `turret_hal`.

pub mod driver;
