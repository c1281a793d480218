// Live device and profile registries
// Lookups return None for absent entities; callers decide whether that is an error.

mod devices;
mod profiles;

pub use devices::DeviceArray;
pub use profiles::ProfileArray;

/// How strictly an id lookup honours the owner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupFlags {
    /// Only the exact (id, owner) pair
    Exact,
    /// Exact pair first, then the first entity with that id
    OwnerOptional,
}
