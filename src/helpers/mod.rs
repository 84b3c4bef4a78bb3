//! Helper functions shared by the listing and post views

mod date;

pub use date::*;
