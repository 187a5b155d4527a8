//! Newtype-style value types

use serde::Serialize;

/// Permission bits of a mapping that matter for symbolization
///
/// Writability is visible in the permission string but nothing downstream
/// needs it, so it is not tracked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MapFlags {
    pub readable: bool,
    pub executable: bool,
}

impl MapFlags {
    /// Build flags from a `/proc/<pid>/maps` permission field such as `r-xp`
    ///
    /// Only the first (`r`) and third (`x`) characters are consulted.
    #[must_use]
    pub fn from_perms(perms: &str) -> Self {
        let bytes = perms.as_bytes();
        Self {
            readable: bytes.first() == Some(&b'r'),
            executable: bytes.get(2) == Some(&b'x'),
        }
    }

    /// Readable and nothing else we track (the header half of a split image)
    #[must_use]
    pub fn is_read_only(self) -> bool {
        self.readable && !self.executable
    }
}
