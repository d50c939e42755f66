//! Semantic types and comparability rules.
use std::fmt;

use crate::error::{Error, Result};
use crate::expr::CmpOp;
use crate::schema::{AttrKind, Attribute, EntityType};
use crate::value::Value;

/// Closed set of types the translator reasons about.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SemanticType {
    Numeric,
    Text,
    None,
    Bool,
    /// Literal tuple of constants or parameters.
    List,
    /// A single entity instance.
    Entity(EntityType),
    /// All instances of an entity; only valid as a qualifier source.
    Entities(EntityType),
    /// To-many attribute.
    Set(EntityType),
}

impl SemanticType {
    pub fn is_primitive(&self) -> bool {
        matches!(self, SemanticType::Numeric | SemanticType::Text)
    }

    pub fn entity(&self) -> Option<&EntityType> {
        match self {
            SemanticType::Entity(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemanticType::Numeric => f.write_str("numeric"),
            SemanticType::Text => f.write_str("text"),
            SemanticType::None => f.write_str("none"),
            SemanticType::Bool => f.write_str("bool"),
            SemanticType::List => f.write_str("list"),
            SemanticType::Entity(e) => write!(f, "{}", e),
            SemanticType::Entities(e) => write!(f, "collection of {}", e),
            SemanticType::Set(e) => write!(f, "set of {}", e),
        }
    }
}

/// Semantic type of a runtime value bound to a query variable.
pub fn normalize_value(value: &Value) -> Result<SemanticType> {
    match value {
        Value::Null => Ok(SemanticType::None),
        Value::Int(_) | Value::Float(_) => Ok(SemanticType::Numeric),
        Value::Text(_) => Ok(SemanticType::Text),
        Value::Object(obj) => Ok(SemanticType::Entity(obj.entity().clone())),
        Value::Entities(entity) => Ok(SemanticType::Entities(entity.clone())),
        Value::Bool(_) => Err(Error::UnsupportedType("bool".into())),
        Value::List(_) => Err(Error::UnsupportedType("list".into())),
    }
}

/// Semantic type of an attribute of `owner`.
pub fn normalize_attr(owner: &EntityType, attr: &Attribute) -> Result<SemanticType> {
    let target = || {
        owner.target(attr).ok_or_else(|| {
            Error::Schema(format!("unresolved reference {}.{}", owner, attr.name))
        })
    };
    match &attr.kind {
        AttrKind::Int | AttrKind::Float => Ok(SemanticType::Numeric),
        AttrKind::Text => Ok(SemanticType::Text),
        AttrKind::Ref(_) => Ok(SemanticType::Entity(target()?)),
        AttrKind::Set(_) => Ok(SemanticType::Set(target()?)),
    }
}

/// Whether `t1 op t2` is a valid comparison.
///
/// Errors only for shapes that are recognized but not supported;
/// plain incompatibility is reported as `false`.
pub fn comparable(op: CmpOp, t1: &SemanticType, t2: &SemanticType) -> Result<bool> {
    use SemanticType as T;

    let none1 = *t1 == T::None;
    let none2 = *t2 == T::None;
    match op {
        CmpOp::Is | CmpOp::IsNot => Ok(none1 != none2),
        CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => {
            Ok(*t1 == T::Numeric && *t2 == T::Numeric)
        }
        CmpOp::Eq | CmpOp::Ne => {
            if none1 || none2 {
                return Ok(none1 != none2);
            }
            Ok(match (t1, t2) {
                (T::Entity(a), T::Entity(b)) => a.same_root(b),
                (a, b) if a.is_primitive() => a == b,
                _ => false,
            })
        }
        CmpOp::In | CmpOp::NotIn => match (t1, t2) {
            (left, T::List) => Ok(left.is_primitive() || left.entity().is_some()),
            (T::Entity(left), T::Set(item)) => Ok(left.same_root(item)),
            (left, T::Set(item)) if left.is_primitive() => Err(Error::not_implemented(format!(
                "{} {} set of {}",
                left,
                op.symbol(),
                item
            ))),
            _ => Ok(false),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Diagram, EntityDef};

    fn diagram() -> std::sync::Arc<Diagram> {
        Diagram::builder("zoo")
            .entity(EntityDef::new("Animal").primary_key("id", AttrKind::Int))
            .entity(EntityDef::new("Cat").base("Animal"))
            .entity(
                EntityDef::new("Keeper")
                    .primary_key("id", AttrKind::Int)
                    .set("animals", "Animal"),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_normalize_value() {
        assert_eq!(normalize_value(&Value::Int(1)).unwrap(), SemanticType::Numeric);
        assert_eq!(normalize_value(&Value::Float(1.5)).unwrap(), SemanticType::Numeric);
        assert_eq!(normalize_value(&Value::Text("a".into())).unwrap(), SemanticType::Text);
        assert_eq!(normalize_value(&Value::Null).unwrap(), SemanticType::None);
        assert!(matches!(
            normalize_value(&Value::Bool(true)),
            Err(Error::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_identity_needs_exactly_one_none() {
        let n = SemanticType::None;
        let num = SemanticType::Numeric;
        assert!(comparable(CmpOp::Is, &num, &n).unwrap());
        assert!(!comparable(CmpOp::Is, &n, &n).unwrap());
        assert!(!comparable(CmpOp::IsNot, &num, &num).unwrap());
    }

    #[test]
    fn test_ordering_numeric_only() {
        let num = SemanticType::Numeric;
        let txt = SemanticType::Text;
        assert!(comparable(CmpOp::Lt, &num, &num).unwrap());
        assert!(!comparable(CmpOp::Lt, &txt, &txt).unwrap());
        assert!(!comparable(CmpOp::Ge, &num, &txt).unwrap());
    }

    #[test]
    fn test_equality_rules() {
        let d = diagram();
        let animal = SemanticType::Entity(d.entity("Animal").unwrap());
        let cat = SemanticType::Entity(d.entity("Cat").unwrap());
        let keeper = SemanticType::Entity(d.entity("Keeper").unwrap());
        let n = SemanticType::None;

        assert!(!comparable(CmpOp::Eq, &n, &n).unwrap());
        assert!(comparable(CmpOp::Eq, &animal, &n).unwrap());
        assert!(comparable(CmpOp::Ne, &cat, &animal).unwrap());
        assert!(!comparable(CmpOp::Eq, &cat, &keeper).unwrap());
        assert!(!comparable(CmpOp::Eq, &SemanticType::Numeric, &SemanticType::Text).unwrap());
    }

    #[test]
    fn test_membership_rules() {
        let d = diagram();
        let keeper = d.entity("Keeper").unwrap();
        let animals = normalize_attr(&keeper, keeper.attr("animals").unwrap()).unwrap();
        let cat = SemanticType::Entity(d.entity("Cat").unwrap());

        assert!(comparable(CmpOp::In, &SemanticType::Numeric, &SemanticType::List).unwrap());
        assert!(comparable(CmpOp::In, &cat, &animals).unwrap());
        assert!(!comparable(CmpOp::In, &SemanticType::Numeric, &SemanticType::Text).unwrap());
        assert!(matches!(
            comparable(CmpOp::NotIn, &SemanticType::Numeric, &animals),
            Err(Error::NotImplemented(_))
        ));
    }
}
