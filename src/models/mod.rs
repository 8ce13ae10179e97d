//! Core data models shared by every provider.

pub mod address;
pub mod admin;
pub mod point;

pub use address::{Address, AddressBuilder, AddressCollection, Country};
pub use admin::{AdminLevel, AdminLevelCollection, MAX_ADMIN_LEVEL};
pub use point::{Bounds, GeoPoint};

/// Invariant violations when building model values directly.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("admin level {0} is outside 1..={max}", max = MAX_ADMIN_LEVEL)]
    AdminLevelOutOfRange(u8),

    #[error("admin level {0} appears more than once")]
    DuplicateAdminLevel(u8),
}
