extern crate core;

pub mod hash;
pub mod key;
