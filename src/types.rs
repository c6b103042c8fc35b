//! core type-safe wrappers around raw engine values.

use std::fmt;
use std::hash::{Hash, Hasher};

use libgit2_sys as raw;

/// Object identifier, a thin wrapper over the engine's id struct.
///
/// The raw struct is only reachable within the crate; consumers see hex
/// rendering and byte access.
#[derive(Clone, Copy)]
pub struct Oid {
    raw: raw::git_oid,
}

impl Oid {
    pub(crate) fn from_raw(raw: raw::git_oid) -> Self {
        Self { raw }
    }

    /// raw id struct (for internal use only)
    pub(crate) fn as_raw(&self) -> &raw::git_oid {
        &self.raw
    }

    /// the id as raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw.id
    }

    /// short form of the id
    pub fn short(&self) -> String {
        self.to_string()[..7].to_string()
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.raw.id.iter() {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl PartialEq for Oid {
    fn eq(&self, other: &Self) -> bool {
        self.raw.id == other.raw.id
    }
}

impl Eq for Oid {}

impl Hash for Oid {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.id.hash(state);
    }
}

/// An enumeration whose named variants cover the raw values this build
/// knows about.
///
/// Implementors list every named variant in [`KnownValues::ALL`]; that list
/// drives generic decoding, so a variant missing from it silently decodes
/// as custom.
pub trait KnownValues: Copy + PartialEq + Sized + 'static {
    /// every named variant, in declaration order
    const ALL: &'static [Self];

    /// the raw engine value for this variant
    fn raw(self) -> u32;
}

/// A raw engine value that is either one of the named variants or an
/// arbitrary value this build does not know by name.
///
/// Decoding never fails and encoding never loses information: an
/// unrecognized raw value is carried verbatim in [`Extensible::Custom`]
/// and round-trips back out unchanged. This is how option values survive
/// an engine that is newer than the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Extensible<K> {
    /// a value this build knows by name
    Known(K),
    /// a raw value carried through verbatim
    Custom(u32),
}

impl<K: KnownValues> Extensible<K> {
    /// Decode a raw value, preferring the first named variant that matches.
    pub fn from_raw(value: u32) -> Self {
        K::ALL
            .iter()
            .copied()
            .find(|known| known.raw() == value)
            .map(Extensible::Known)
            .unwrap_or(Extensible::Custom(value))
    }

    /// Encode back into the raw engine value.
    pub fn to_raw(self) -> u32 {
        match self {
            Extensible::Known(known) => known.raw(),
            Extensible::Custom(value) => value,
        }
    }
}

impl<K: KnownValues> From<K> for Extensible<K> {
    fn from(known: K) -> Self {
        Extensible::Known(known)
    }
}

/// Permission sharing applied to a newly created repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShareMode {
    /// permissions follow the process umask
    Umask,
    /// group-writable, as `git init --shared=group`
    Group,
    /// world-readable, as `git init --shared=all`
    All,
}

impl KnownValues for ShareMode {
    const ALL: &'static [Self] = &[ShareMode::Umask, ShareMode::Group, ShareMode::All];

    fn raw(self) -> u32 {
        match self {
            ShareMode::Umask => raw::GIT_REPOSITORY_INIT_SHARED_UMASK as u32,
            ShareMode::Group => raw::GIT_REPOSITORY_INIT_SHARED_GROUP as u32,
            ShareMode::All => raw::GIT_REPOSITORY_INIT_SHARED_ALL as u32,
        }
    }
}

/// Directory mode for repository creation: a named sharing mode or a raw
/// POSIX mode carried through verbatim.
pub type InitMode = Extensible<ShareMode>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_values_round_trip() {
        for mode in ShareMode::ALL {
            let decoded = InitMode::from_raw(mode.raw());
            assert_eq!(decoded, Extensible::Known(*mode));
            assert_eq!(decoded.to_raw(), mode.raw());
        }
    }

    #[test]
    fn test_custom_values_survive_verbatim() {
        let decoded = InitMode::from_raw(0o777);
        assert_eq!(decoded, Extensible::Custom(0o777));
        assert_eq!(decoded.to_raw(), 0o777);
    }

    #[test]
    fn test_known_raw_values_are_distinct() {
        for (i, a) in ShareMode::ALL.iter().enumerate() {
            for b in &ShareMode::ALL[i + 1..] {
                assert_ne!(a.raw(), b.raw());
            }
        }
    }

    #[test]
    fn test_from_known_variant() {
        let mode: InitMode = ShareMode::Group.into();
        assert_eq!(mode.to_raw(), 0o2775);
    }
}
