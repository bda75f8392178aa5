//! Runtime/static type descriptors and assignability ranking.
//!
//! [`TypeTag`] describes the type of a [`Value`](crate::Value) as seen by
//! overload resolution and by the specialization compiler's cast decisions.
//! Registered method signatures are written in terms of tags; a signature may
//! also contain an unbound generic variable ([`TypeTag::Var`]) that is
//! materialized per concrete subclass during resolution.

use std::fmt;

use crate::type_hash::TypeHash;

/// Type descriptor for values and declared member signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    /// Matches any value; weakest possible parameter type.
    Any,
    /// The null value (runtime only; not a declarable parameter type).
    Null,
    Bool,
    Int,
    Float,
    String,
    /// Built-in array/collection, indexable with `[n]`.
    Array,
    /// A registered class.
    Object(TypeHash),
    /// Unbound generic variable in a declared signature, e.g. `T` on a
    /// generic base class. Must be materialized before invocation.
    Var(&'static str),
}

/// Access to the registered superclass chain, needed to rank
/// derived-to-base conversions. Implemented by the type registry.
pub trait ClassHierarchy {
    fn superclass_of(&self, class: TypeHash) -> Option<TypeHash>;
}

impl TypeTag {
    /// True for types that can hold null (reference types in the original's
    /// terms). A null argument is applicable to any of these.
    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            TypeTag::Any | TypeTag::String | TypeTag::Array | TypeTag::Object(_)
        )
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, TypeTag::Int | TypeTag::Float)
    }

    /// Whether a value of type `from` can be used where `self` is required,
    /// without an explicit narrowing step.
    pub fn accepts(&self, from: &TypeTag, hierarchy: &dyn ClassHierarchy) -> bool {
        conversion_cost(self, from, hierarchy).is_some()
    }
}

/// Number of superclass steps from `derived` up to `base`, if `derived`
/// transitively extends (or is) `base`.
pub fn derivation_distance(
    derived: TypeHash,
    base: TypeHash,
    hierarchy: &dyn ClassHierarchy,
) -> Option<u32> {
    let mut current = derived;
    let mut distance = 0;
    loop {
        if current == base {
            return Some(distance);
        }
        match hierarchy.superclass_of(current) {
            Some(next) => {
                current = next;
                distance += 1;
            }
            None => return None,
        }
    }
}

/// Cost of converting an argument of type `arg` to a parameter of type
/// `param`. `None` means not applicable. Lower is more specific:
///
/// - `0` exact match
/// - `1` numeric widening (`Int` -> `Float`)
/// - `2 + d` derived class passed where a base `d` steps up is required
/// - `4` null passed for a reference-type parameter
/// - `8` anything passed for `Any`
///
/// These are the ranking weights behind "most specific applicable signature
/// wins"; ties are broken later by declaration order.
pub fn conversion_cost(
    param: &TypeTag,
    arg: &TypeTag,
    hierarchy: &dyn ClassHierarchy,
) -> Option<u32> {
    if param == arg {
        return Some(0);
    }
    match (param, arg) {
        (TypeTag::Any, _) => Some(8),
        (_, TypeTag::Null) if param.is_reference() => Some(4),
        (TypeTag::Float, TypeTag::Int) => Some(1),
        (TypeTag::Object(base), TypeTag::Object(concrete)) => {
            derivation_distance(*concrete, *base, hierarchy).map(|d| 2 + d)
        }
        _ => None,
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::Any => write!(f, "any"),
            TypeTag::Null => write!(f, "null"),
            TypeTag::Bool => write!(f, "bool"),
            TypeTag::Int => write!(f, "int"),
            TypeTag::Float => write!(f, "float"),
            TypeTag::String => write!(f, "string"),
            TypeTag::Array => write!(f, "array"),
            TypeTag::Object(hash) => write!(f, "object({hash})"),
            TypeTag::Var(name) => write!(f, "{name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FlatHierarchy;
    impl ClassHierarchy for FlatHierarchy {
        fn superclass_of(&self, _class: TypeHash) -> Option<TypeHash> {
            None
        }
    }

    struct ChainHierarchy;
    impl ClassHierarchy for ChainHierarchy {
        fn superclass_of(&self, class: TypeHash) -> Option<TypeHash> {
            if class == TypeHash::from_name("Derived") {
                Some(TypeHash::from_name("Mid"))
            } else if class == TypeHash::from_name("Mid") {
                Some(TypeHash::from_name("Base"))
            } else {
                None
            }
        }
    }

    #[test]
    fn test_exact_match_is_cheapest() {
        let h = FlatHierarchy;
        assert_eq!(conversion_cost(&TypeTag::Int, &TypeTag::Int, &h), Some(0));
        assert_eq!(conversion_cost(&TypeTag::Float, &TypeTag::Int, &h), Some(1));
        assert_eq!(conversion_cost(&TypeTag::Int, &TypeTag::Float, &h), None);
    }

    #[test]
    fn test_derivation_distance_ranks_most_derived() {
        let h = ChainHierarchy;
        let derived = TypeTag::Object(TypeHash::from_name("Derived"));
        let mid = TypeTag::Object(TypeHash::from_name("Mid"));
        let base = TypeTag::Object(TypeHash::from_name("Base"));
        assert_eq!(conversion_cost(&mid, &derived, &h), Some(3));
        assert_eq!(conversion_cost(&base, &derived, &h), Some(4));
        assert_eq!(conversion_cost(&derived, &base, &h), None);
    }

    #[test]
    fn test_null_applicable_to_reference_types_only() {
        let h = FlatHierarchy;
        assert!(TypeTag::String.accepts(&TypeTag::Null, &h));
        assert!(TypeTag::Object(TypeHash::from_name("X")).accepts(&TypeTag::Null, &h));
        assert!(!TypeTag::Int.accepts(&TypeTag::Null, &h));
    }
}
