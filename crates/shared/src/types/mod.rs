//! Common types used across the application.

pub mod id;
pub mod money;

pub use id::*;
pub use money::{STORAGE_SCALE, fits_storage, max_stored_amount, round_for_storage};
