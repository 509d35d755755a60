use crate::concurrency::lock::LockMode;

/// Access a transaction requests when fetching a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permissions {
    ReadOnly,
    ReadWrite,
}

impl Permissions {
    /// Lock mode needed to hold this permission.
    pub fn lock_mode(&self) -> LockMode {
        match self {
            Permissions::ReadOnly => LockMode::Shared,
            Permissions::ReadWrite => LockMode::Exclusive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_mode_mapping() {
        assert_eq!(Permissions::ReadOnly.lock_mode(), LockMode::Shared);
        assert_eq!(Permissions::ReadWrite.lock_mode(), LockMode::Exclusive);
    }
}
