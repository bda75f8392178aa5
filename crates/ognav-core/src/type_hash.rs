//! Deterministic hash-based type identity.
//!
//! Registered classes are identified by [`TypeHash`], a 64-bit hash computed
//! from the class name. Hashes are deterministic, so an embedder can refer to
//! a class (e.g. as a superclass or a method parameter type) before it has
//! been registered, and registration order never matters.
//!
//! # Examples
//!
//! ```
//! use ognav_core::TypeHash;
//!
//! let a = TypeHash::from_name("Root");
//! let b = TypeHash::from_name("Root");
//! assert_eq!(a, b);
//! assert_ne!(a, TypeHash::from_name("Bean2"));
//! ```

use std::fmt;

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

/// Separator constant mixed in when hashing member identities, so a method
/// hash can never collide with the plain hash of a longer class name.
const SEP: u64 = 0x4bc94d6bd06053ad;

/// 64-bit identity of a registered class.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeHash(pub u64);

impl TypeHash {
    /// Hash of a class name. `const`, so hashes can appear in constants.
    pub const fn from_name(name: &str) -> Self {
        TypeHash(fnv1a(name.as_bytes(), FNV_OFFSET))
    }

    /// Identity of a member declared on a class, used as a stable cache key
    /// for per-(class, method) resolution results.
    ///
    /// `ordinal` distinguishes overloads sharing a name; it is the
    /// declaration index within the class.
    pub const fn member(class: TypeHash, name: &str, ordinal: u32) -> Self {
        let mut h = class.0 ^ SEP;
        h = fnv1a(name.as_bytes(), h);
        h = h.wrapping_mul(FNV_PRIME) ^ (ordinal as u64);
        TypeHash(h)
    }
}

const fn fnv1a(bytes: &[u8], seed: u64) -> u64 {
    let mut hash = seed;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
        i += 1;
    }
    hash
}

impl fmt::Debug for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHash({:#018x})", self.0)
    }
}

impl fmt::Display for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}
