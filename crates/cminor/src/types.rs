//! Type operations (C2): construction helpers already live on
//! `cminor_ast::{ParsedType, TypeSpecifier}`; this module holds everything
//! with real *logic* - canonicalisation, equality, assignment
//! compatibility, promotion, the mixing rules, range checking, array
//! sizing, and union-kind classification. Grounded on `cminor_type.c`'s
//! `type_equals`/`type_compatible`/`type_promote_binary` family in
//! `original_source/`, and spec.md S4.2 verbatim for every rule.

use cminor_ast::{ArraySize, BasicType, Expression, ExpressionKind, StructMember, TypeSpecifier};
use std::rc::Rc;

use crate::header::HeaderIndex;

/// `canonical(type, index)`: resolves a `Named` typedef-tag type to the
/// canonical target recorded on its `TypedefDefinition`, preserving
/// `is_unsigned` accumulated along the chain (spec.md S4.2
/// "Canonicalisation", S8 property 3). Non-named types and names that
/// don't resolve to a typedef are returned unchanged.
pub fn canonical(ty: &TypeSpecifier, index: &HeaderIndex) -> TypeSpecifier {
    match ty {
        TypeSpecifier::Named {
            basic_type: BasicType::TypedefName,
            identity,
            is_unsigned,
            ..
        } => match index.find_typedef(&identity.name) {
            Some(def) => {
                let mut target = def
                    .canonical
                    .borrow()
                    .clone()
                    .unwrap_or_else(|| def.resolved_type.borrow().clone().unwrap_or_else(|| ty.clone()));
                if *is_unsigned {
                    target = force_unsigned(target, true);
                }
                target
            }
            None => ty.clone(),
        },
        other => other.clone(),
    }
}

pub(crate) fn force_unsigned(ty: TypeSpecifier, unsigned: bool) -> TypeSpecifier {
    match ty {
        TypeSpecifier::Basic { basic_type, is_const, .. } => TypeSpecifier::Basic {
            basic_type,
            is_unsigned: unsigned,
            is_const,
        },
        TypeSpecifier::Named {
            basic_type,
            identity,
            is_typedef,
            is_const,
            members,
            ..
        } => TypeSpecifier::Named {
            basic_type,
            identity,
            is_typedef,
            is_unsigned: unsigned,
            is_const,
            members,
        },
        other => other,
    }
}

/// Structural equality (spec.md S4.2 "Equality"). `signed int` and
/// `unsigned int` are *not* equal - `is_unsigned` is compared for `Basic`.
pub fn equals(a: &TypeSpecifier, b: &TypeSpecifier) -> bool {
    match (a, b) {
        (
            TypeSpecifier::Basic {
                basic_type: bt1,
                is_unsigned: u1,
                ..
            },
            TypeSpecifier::Basic {
                basic_type: bt2,
                is_unsigned: u2,
                ..
            },
        ) => bt1 == bt2 && u1 == u2,
        (TypeSpecifier::Pointer { inner: i1, .. }, TypeSpecifier::Pointer { inner: i2, .. }) => {
            equals(i1, i2)
        }
        (TypeSpecifier::Array { element: e1, .. }, TypeSpecifier::Array { element: e2, .. }) => {
            equals(e1, e2)
        }
        (TypeSpecifier::Named { identity: id1, .. }, TypeSpecifier::Named { identity: id2, .. }) => {
            id1.name == id2.name
        }
        _ => false,
    }
}

/// True if `ty`'s only integral leaf differs from its counterpart by
/// signedness - the narrow pointer-compatibility model of spec.md S4.2
/// "Compatibility": `char*` <-> `unsigned char*`, `int**` <-> `unsigned int**`.
fn differs_only_in_leaf_signedness(a: &TypeSpecifier, b: &TypeSpecifier) -> bool {
    match (a, b) {
        (TypeSpecifier::Pointer { inner: i1, .. }, TypeSpecifier::Pointer { inner: i2, .. }) => {
            differs_only_in_leaf_signedness(i1, i2)
        }
        (
            TypeSpecifier::Basic {
                basic_type: bt1,
                is_unsigned: u1,
                ..
            },
            TypeSpecifier::Basic {
                basic_type: bt2,
                is_unsigned: u2,
                ..
            },
        ) => bt1 == bt2 && u1 != u2,
        _ => false,
    }
}

/// `compatible(target, source, index)` (spec.md S4.2 "Compatibility").
pub fn compatible(target: &TypeSpecifier, source: &TypeSpecifier, index: &HeaderIndex) -> bool {
    let ct = canonical(target, index);
    let cs = canonical(source, index);
    if equals(&ct, &cs) {
        return true;
    }
    matches!((&ct, &cs), (TypeSpecifier::Pointer { .. }, TypeSpecifier::Pointer { .. }))
        && differs_only_in_leaf_signedness(&ct, &cs)
}

/// Unary promotion: `signed {char,short} -> int`, `unsigned {char,short}
/// -> unsigned int`, others unchanged (spec.md S4.2 "Promotion").
pub fn unary_promote(ty: &TypeSpecifier) -> TypeSpecifier {
    match ty {
        TypeSpecifier::Basic {
            basic_type: BasicType::Char | BasicType::Short,
            is_unsigned,
            ..
        } => TypeSpecifier::Basic {
            basic_type: BasicType::Int,
            is_unsigned: *is_unsigned,
            is_const: false,
        },
        TypeSpecifier::Named {
            basic_type: BasicType::Enum,
            ..
        } => TypeSpecifier::basic(BasicType::Int),
        other => other.clone(),
    }
}

/// Binary promotion, applied to a pair of numeric exact types (spec.md
/// S4.2 "Promotion", S8 property 4: commutative, closed over
/// `{int,uint,long,ulong,float,double}`).
pub fn binary_promote(a: &TypeSpecifier, b: &TypeSpecifier) -> TypeSpecifier {
    if is_basic(a, BasicType::Double) || is_basic(b, BasicType::Double) {
        return TypeSpecifier::basic(BasicType::Double);
    }
    if is_basic(a, BasicType::Float) || is_basic(b, BasicType::Float) {
        return TypeSpecifier::basic(BasicType::Float);
    }
    let pa = unary_promote(a);
    let pb = unary_promote(b);
    let is_long = is_basic(&pa, BasicType::Long) || is_basic(&pb, BasicType::Long);
    let is_unsigned = pa.is_unsigned() && pb.is_unsigned();
    let basic_type = if is_long { BasicType::Long } else { BasicType::Int };
    if is_unsigned {
        TypeSpecifier::unsigned_basic(basic_type)
    } else {
        TypeSpecifier::basic(basic_type)
    }
}

fn is_basic(ty: &TypeSpecifier, bt: BasicType) -> bool {
    matches!(ty, TypeSpecifier::Basic { basic_type, .. } if *basic_type == bt)
}

fn integral_rank(ty: &TypeSpecifier) -> Option<u8> {
    match ty {
        TypeSpecifier::Basic {
            basic_type: BasicType::Char,
            ..
        } => Some(0),
        TypeSpecifier::Basic {
            basic_type: BasicType::Short,
            ..
        } => Some(1),
        TypeSpecifier::Basic {
            basic_type: BasicType::Int,
            ..
        } => Some(2),
        TypeSpecifier::Basic {
            basic_type: BasicType::Long,
            ..
        } => Some(3),
        TypeSpecifier::Named {
            basic_type: BasicType::Enum,
            ..
        } => Some(2),
        _ => None,
    }
}

/// Mixed-signedness rule shared by comparison and division/modulo
/// (spec.md S4.2 "Mixing rules"): forbidden unless the unsigned side is
/// strictly narrower and fits entirely into the signed side.
pub fn mixed_signedness_allowed(a: &TypeSpecifier, b: &TypeSpecifier) -> bool {
    if a.is_unsigned() == b.is_unsigned() {
        return true;
    }
    let (unsigned, signed) = if a.is_unsigned() { (a, b) } else { (b, a) };
    match (integral_rank(unsigned), integral_rank(signed)) {
        (Some(ur), Some(sr)) => ur < sr,
        _ => false,
    }
}

/// `value_fits_in`: integer ranges of spec.md S4.2 "Range checking".
pub fn value_fits_in(value: i64, value_is_unsigned: bool, target: BasicType, target_unsigned: bool) -> bool {
    if value_is_unsigned && (value as u64) > i64::MAX as u64 {
        // Genuinely huge unsigned value: only fits an unsigned 64-bit target.
        return target == BasicType::Long && target_unsigned;
    }
    match (target, target_unsigned) {
        (BasicType::Char, false) => (-128..=127).contains(&value),
        (BasicType::Char, true) => (0..=255).contains(&value),
        (BasicType::Short, false) => (-32768..=32767).contains(&value),
        (BasicType::Short, true) => (0..=65535).contains(&value),
        (BasicType::Int, false) => value >= i32::MIN as i64 && value <= i32::MAX as i64,
        (BasicType::Int, true) => value >= 0 && value <= u32::MAX as i64,
        (BasicType::Long, _) => true,
        _ => false,
    }
}

/// `compute_array_size`: product of constant dimensions of nested array
/// types; `None` on non-constant or non-array input (spec.md S4.2 "Array
/// total size").
pub fn compute_array_size(ty: &TypeSpecifier) -> Option<i64> {
    match ty {
        TypeSpecifier::Array {
            element,
            size: ArraySize::Constant(n),
            ..
        } => {
            let rest = compute_array_size(element).unwrap_or(1);
            Some(n * rest)
        }
        TypeSpecifier::Array { .. } => None,
        _ => Some(1),
    }
}

/// Classification of a union declaration (spec.md S4.2 "Union kinds").
pub fn union_kind(members: &[Rc<StructMember>]) -> cminor_ast::UnionKind {
    use cminor_ast::UnionKind::*;

    if members.len() == 2 {
        let tys: Vec<BasicType> = members.iter().map(|m| m.parsed_type.basic_type).collect();
        let has = |bt: BasicType| tys.contains(&bt);
        if has(BasicType::Int) && has(BasicType::Float) && members.iter().all(|m| m.parsed_type.kind == cminor_ast::TypeKind::Basic) {
            return TypePunIntFloat;
        }
        if has(BasicType::Long) && has(BasicType::Double) && members.iter().all(|m| m.parsed_type.kind == cminor_ast::TypeKind::Basic) {
            return TypePunLongDouble;
        }
    }
    // Every member pointer/aggregate, or mixed/primitive-heavy: both
    // collapse to Reference (boxed) - spec.md S4.2 never produces
    // Unsupported in this language.
    Reference
}

/// Folds the narrow subset of expressions legal as array-size expressions
/// once a header index is available: literal integers, unary +/-, +/-/*
/// over them, and enum-constant identifiers (spec.md S4.2 "Array total
/// size": "Enum-constant array bounds are accepted"). `parser::expr`'s own
/// `const_eval` handles the identical literal-folding subset at parse time,
/// before any index exists, for enum values and `case` labels.
pub fn const_eval_with_index(expr: &Expression, index: &HeaderIndex) -> Option<i64> {
    match &expr.kind {
        ExpressionKind::Int(v) => Some(*v as i64),
        ExpressionKind::UInt(v) => Some(*v as i64),
        ExpressionKind::Long(v) => Some(*v),
        ExpressionKind::ULong(v) => Some(*v as i64),
        ExpressionKind::Minus(inner) => const_eval_with_index(inner, index).map(|v| -v),
        ExpressionKind::Plus(inner) => const_eval_with_index(inner, index),
        ExpressionKind::Binary(cminor_ast::BinaryOp::Add, a, b) => {
            Some(const_eval_with_index(a, index)? + const_eval_with_index(b, index)?)
        }
        ExpressionKind::Binary(cminor_ast::BinaryOp::Sub, a, b) => {
            Some(const_eval_with_index(a, index)? - const_eval_with_index(b, index)?)
        }
        ExpressionKind::Binary(cminor_ast::BinaryOp::Mul, a, b) => {
            Some(const_eval_with_index(a, index)? * const_eval_with_index(b, index)?)
        }
        ExpressionKind::Identifier(id) => index.find_enum_member(&id.name).map(|m| m.value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cminor_ast::TypeIdentity;

    fn int() -> TypeSpecifier {
        TypeSpecifier::basic(BasicType::Int)
    }
    fn uint() -> TypeSpecifier {
        TypeSpecifier::unsigned_basic(BasicType::Int)
    }
    fn long() -> TypeSpecifier {
        TypeSpecifier::basic(BasicType::Long)
    }
    fn float() -> TypeSpecifier {
        TypeSpecifier::basic(BasicType::Float)
    }
    fn double() -> TypeSpecifier {
        TypeSpecifier::basic(BasicType::Double)
    }
    fn ulong() -> TypeSpecifier {
        TypeSpecifier::unsigned_basic(BasicType::Long)
    }

    #[test]
    fn signed_and_unsigned_int_are_not_equal() {
        assert!(!equals(&int(), &uint()));
    }

    #[test]
    fn property_3_typedef_chain_canonicalises_flat_and_tracks_unsigned() {
        let index = HeaderIndex::new();
        let file = index.store().get_or_create("a.c");
        index.add_file(file.clone());

        let c_def = Rc::new(cminor_ast::TypedefDefinition {
            name: "C".to_string(),
            parsed_type: cminor_ast::ParsedType::basic(BasicType::Int),
            resolved_type: std::cell::RefCell::new(Some(uint())),
            canonical: std::cell::RefCell::new(Some(uint())),
            source_path: None,
        });
        file.add_typedef(c_def.clone());

        let b_named = TypeSpecifier::Named {
            basic_type: BasicType::TypedefName,
            identity: TypeIdentity {
                name: "C".to_string(),
                search_name: Some("C".to_string()),
            },
            is_typedef: true,
            is_unsigned: false,
            is_const: false,
            members: None,
        };
        let b_def = Rc::new(cminor_ast::TypedefDefinition {
            name: "B".to_string(),
            parsed_type: cminor_ast::ParsedType::basic(BasicType::Int),
            resolved_type: std::cell::RefCell::new(Some(b_named.clone())),
            canonical: std::cell::RefCell::new(Some(uint())),
            source_path: None,
        });
        file.add_typedef(b_def.clone());

        let a_named = TypeSpecifier::Named {
            basic_type: BasicType::TypedefName,
            identity: TypeIdentity {
                name: "B".to_string(),
                search_name: Some("B".to_string()),
            },
            is_typedef: true,
            is_unsigned: false,
            is_const: false,
            members: None,
        };
        let resolved = canonical(&a_named, &index);
        assert_eq!(resolved.kind(), cminor_ast::TypeKind::Basic);
        assert!(resolved.is_unsigned());
    }

    #[test]
    fn property_4_binary_promotion_is_commutative_and_closed() {
        let candidates = [int(), uint(), long(), ulong(), float(), double()];
        for l in &candidates {
            for r in &candidates {
                let lr = binary_promote(l, r);
                let rl = binary_promote(r, l);
                assert_eq!(lr, rl, "not commutative for {:?}/{:?}", l, r);
                let expect_unsigned = l.is_unsigned() && r.is_unsigned();
                match &lr {
                    TypeSpecifier::Basic {
                        basic_type: BasicType::Int | BasicType::Long | BasicType::Float | BasicType::Double,
                        is_unsigned,
                        ..
                    } => {
                        if !matches!(lr, TypeSpecifier::Basic { basic_type: BasicType::Float | BasicType::Double, .. }) {
                            assert_eq!(*is_unsigned, expect_unsigned);
                        }
                    }
                    other => panic!("unexpected promoted type {:?}", other),
                }
            }
        }
    }

    #[test]
    fn mixed_signedness_narrow_unsigned_fits_signed() {
        let uchar = TypeSpecifier::unsigned_basic(BasicType::Char);
        assert!(mixed_signedness_allowed(&uchar, &int()));
        assert!(!mixed_signedness_allowed(&uint(), &int()));
    }

    #[test]
    fn range_checking_matches_spec_bounds() {
        assert!(value_fits_in(127, false, BasicType::Char, false));
        assert!(!value_fits_in(128, false, BasicType::Char, false));
        assert!(value_fits_in(255, false, BasicType::Char, true));
        assert!(!value_fits_in(-1, false, BasicType::Char, true));
        assert!(value_fits_in(4294967295, false, BasicType::Int, true));
    }

    #[test]
    fn compatible_allows_leaf_signedness_mismatch_on_pointers() {
        let index = HeaderIndex::new();
        let char_ptr = TypeSpecifier::basic(BasicType::Char).pointer_to();
        let uchar_ptr = TypeSpecifier::unsigned_basic(BasicType::Char).pointer_to();
        assert!(compatible(&char_ptr, &uchar_ptr, &index));
        assert!(!compatible(&int(), &float(), &index));
    }

    #[test]
    fn union_kind_classifies_int_float_pun() {
        let members = vec![
            Rc::new(StructMember::new("i", cminor_ast::ParsedType::basic(BasicType::Int))),
            Rc::new(StructMember::new("f", cminor_ast::ParsedType::basic(BasicType::Float))),
        ];
        assert_eq!(union_kind(&members), cminor_ast::UnionKind::TypePunIntFloat);
    }

    #[test]
    fn array_size_multiplies_nested_constant_dimensions() {
        let inner = TypeSpecifier::Array {
            element: Box::new(int()),
            size: ArraySize::Constant(4),
            is_const: false,
        };
        let outer = TypeSpecifier::Array {
            element: Box::new(inner),
            size: ArraySize::Constant(3),
            is_const: false,
        };
        assert_eq!(compute_array_size(&outer), Some(12));
    }
}
