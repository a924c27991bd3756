//! Network services: the two TCP command dialects.
//!
//! Both dialects drive the same [`Rotator`](crate::surface::Rotator)
//! surface and never touch controller state directly, so commands from
//! either port are immediately visible on the other.

pub mod rotctld;
pub mod web;
