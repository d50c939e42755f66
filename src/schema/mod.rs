//! Entity metadata: tables, attributes, keys and relationships.
//!
//! A [`Diagram`] groups entity definitions that may reference each
//! other. Every query is compiled against exactly one diagram.
mod hydrate;

pub use hydrate::{AttrOffsets, Projection};

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

static NEXT_DIAGRAM_ID: AtomicU64 = AtomicU64::new(1);

/// Declared kind of an attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrKind {
    Int,
    Float,
    Text,
    /// To-one reference to another entity.
    Ref(String),
    /// To-many collection of another entity; has no columns of its own.
    Set(String),
}

#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: String,
    pub kind: AttrKind,
    pub columns: Vec<String>,
    pub required: bool,
    /// Position among the primary key attributes, if part of the key.
    pub pk_offset: Option<usize>,
}

impl Attribute {
    pub fn is_collection(&self) -> bool {
        matches!(self.kind, AttrKind::Set(_))
    }
}

#[derive(Debug)]
pub struct Entity {
    pub name: String,
    pub table: String,
    pub base: Option<String>,
    root: usize,
    attrs: Vec<Attribute>,
    pk: Vec<usize>,
}

/// A set of entity definitions that share one database.
#[derive(Debug)]
pub struct Diagram {
    id: u64,
    name: String,
    entities: Vec<Entity>,
    index: HashMap<String, usize>,
}

impl Diagram {
    pub fn builder(name: impl Into<String>) -> DiagramBuilder {
        DiagramBuilder {
            name: name.into(),
            defs: Vec::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle to a named entity of this diagram.
    pub fn entity(self: &Arc<Self>, name: &str) -> Option<EntityType> {
        self.index.get(name).map(|&index| EntityType {
            diagram: Arc::clone(self),
            index,
        })
    }
}

/// Shared handle to one entity of a diagram.
///
/// Equality and hashing use the diagram id and entity position, so two
/// handles compare equal exactly when they denote the same entity.
#[derive(Clone)]
pub struct EntityType {
    diagram: Arc<Diagram>,
    index: usize,
}

impl EntityType {
    fn def(&self) -> &Entity {
        &self.diagram.entities[self.index]
    }

    fn sibling(&self, index: usize) -> EntityType {
        EntityType {
            diagram: Arc::clone(&self.diagram),
            index,
        }
    }

    pub fn name(&self) -> &str {
        &self.def().name
    }

    pub fn table(&self) -> &str {
        &self.def().table
    }

    pub fn diagram(&self) -> &Arc<Diagram> {
        &self.diagram
    }

    /// Root of the inheritance hierarchy (itself when it has no base).
    pub fn root(&self) -> EntityType {
        self.sibling(self.def().root)
    }

    pub fn same_root(&self, other: &EntityType) -> bool {
        self.diagram.id == other.diagram.id && self.def().root == other.def().root
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.def().attrs
    }

    pub fn attr(&self, name: &str) -> Option<&Attribute> {
        self.def().attrs.iter().find(|a| a.name == name)
    }

    pub fn pk_attrs(&self) -> impl Iterator<Item = &Attribute> {
        self.def().pk.iter().map(move |&i| &self.def().attrs[i])
    }

    pub fn pk_columns(&self) -> Vec<String> {
        self.pk_attrs()
            .flat_map(|a| a.columns.iter().cloned())
            .collect()
    }

    pub fn pk_is_composite(&self) -> bool {
        self.def().pk.len() > 1
    }

    /// Entity an attribute of this entity points to, for references and
    /// collections.
    pub fn target(&self, attr: &Attribute) -> Option<EntityType> {
        match &attr.kind {
            AttrKind::Ref(name) | AttrKind::Set(name) => self.diagram.entity(name),
            _ => None,
        }
    }
}

impl PartialEq for EntityType {
    fn eq(&self, other: &Self) -> bool {
        self.diagram.id == other.diagram.id && self.index == other.index
    }
}

impl Eq for EntityType {}

impl Hash for EntityType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.diagram.id.hash(state);
        self.index.hash(state);
    }
}

impl fmt::Debug for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.diagram.name, self.name())
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Declaration of one entity, consumed by [`DiagramBuilder`].
#[derive(Debug, Clone)]
pub struct EntityDef {
    name: String,
    table: Option<String>,
    base: Option<String>,
    attrs: Vec<AttrDef>,
    pk: Vec<String>,
}

#[derive(Debug, Clone)]
struct AttrDef {
    name: String,
    kind: AttrKind,
    required: bool,
    column: Option<String>,
}

impl EntityDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: None,
            base: None,
            attrs: Vec::new(),
            pk: Vec::new(),
        }
    }

    /// Table name; defaults to the lowercased entity name.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Inherit table, key and attributes from `base`.
    pub fn base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    /// Add a key attribute. Calling this more than once makes the key
    /// composite, in declaration order.
    pub fn primary_key(mut self, name: impl Into<String>, kind: AttrKind) -> Self {
        let name = name.into();
        self.pk.push(name.clone());
        self.push_attr(name, kind, true)
    }

    pub fn required(self, name: impl Into<String>, kind: AttrKind) -> Self {
        self.push_attr(name.into(), kind, true)
    }

    pub fn optional(self, name: impl Into<String>, kind: AttrKind) -> Self {
        self.push_attr(name.into(), kind, false)
    }

    pub fn set(self, name: impl Into<String>, entity: impl Into<String>) -> Self {
        self.push_attr(name.into(), AttrKind::Set(entity.into()), false)
    }

    /// Override the column of the most recently added scalar attribute.
    pub fn column(mut self, column: impl Into<String>) -> Self {
        if let Some(attr) = self.attrs.last_mut() {
            attr.column = Some(column.into());
        }
        self
    }

    fn push_attr(mut self, name: String, kind: AttrKind, required: bool) -> Self {
        self.attrs.push(AttrDef {
            name,
            kind,
            required,
            column: None,
        });
        self
    }
}

pub struct DiagramBuilder {
    name: String,
    defs: Vec<EntityDef>,
}

impl DiagramBuilder {
    pub fn entity(mut self, def: EntityDef) -> Self {
        self.defs.push(def);
        self
    }

    /// Resolve bases, keys and foreign-key columns.
    pub fn build(self) -> Result<Arc<Diagram>> {
        let mut index = HashMap::new();
        for (i, def) in self.defs.iter().enumerate() {
            if index.insert(def.name.clone(), i).is_some() {
                return Err(Error::Schema(format!("duplicate entity {}", def.name)));
            }
        }

        let mut resolver = Resolver {
            defs: &self.defs,
            index: &index,
            chains: HashMap::new(),
            pk_columns: HashMap::new(),
        };

        let mut entities = Vec::with_capacity(self.defs.len());
        for def in &self.defs {
            let chain = resolver.chain(&def.name, &mut HashSet::new())?;
            let root_def = &self.defs[chain[0]];
            if def.base.is_some() && !def.pk.is_empty() {
                return Err(Error::Schema(format!(
                    "entity {} inherits its key and cannot declare one",
                    def.name
                )));
            }
            if root_def.pk.is_empty() {
                return Err(Error::Schema(format!(
                    "entity {} has no primary key",
                    root_def.name
                )));
            }

            let mut attrs: Vec<Attribute> = Vec::new();
            for &i in &chain {
                for attr in &self.defs[i].attrs {
                    if attrs.iter().any(|a| a.name == attr.name) {
                        return Err(Error::Schema(format!(
                            "attribute {}.{} is declared twice",
                            def.name, attr.name
                        )));
                    }
                    let columns = resolver.attr_columns(attr, &mut HashSet::new())?;
                    let pk_offset = root_def.pk.iter().position(|p| *p == attr.name);
                    attrs.push(Attribute {
                        name: attr.name.clone(),
                        kind: attr.kind.clone(),
                        columns,
                        required: attr.required || pk_offset.is_some(),
                        pk_offset,
                    });
                }
            }

            let mut pk = Vec::with_capacity(root_def.pk.len());
            for name in &root_def.pk {
                let pos = attrs
                    .iter()
                    .position(|a| a.name == *name)
                    .filter(|&pos| !attrs[pos].is_collection())
                    .ok_or_else(|| {
                        Error::Schema(format!("key attribute {}.{} is invalid", def.name, name))
                    })?;
                pk.push(pos);
            }

            entities.push(Entity {
                name: def.name.clone(),
                table: root_def
                    .table
                    .clone()
                    .unwrap_or_else(|| root_def.name.to_lowercase()),
                base: def.base.clone(),
                root: chain[0],
                attrs,
                pk,
            });
        }

        Ok(Arc::new(Diagram {
            id: NEXT_DIAGRAM_ID.fetch_add(1, Ordering::Relaxed),
            name: self.name,
            entities,
            index,
        }))
    }
}

struct Resolver<'a> {
    defs: &'a [EntityDef],
    index: &'a HashMap<String, usize>,
    chains: HashMap<String, Vec<usize>>,
    pk_columns: HashMap<String, Vec<String>>,
}

impl Resolver<'_> {
    fn lookup(&self, name: &str) -> Result<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| Error::Schema(format!("unknown entity {}", name)))
    }

    /// Inheritance chain, root first.
    fn chain(&mut self, name: &str, seen: &mut HashSet<String>) -> Result<Vec<usize>> {
        if let Some(chain) = self.chains.get(name) {
            return Ok(chain.clone());
        }
        if !seen.insert(name.to_string()) {
            return Err(Error::Schema(format!("inheritance cycle through {}", name)));
        }
        let i = self.lookup(name)?;
        let defs = self.defs;
        let mut chain = match &defs[i].base {
            Some(base) => self.chain(base, seen)?,
            None => Vec::new(),
        };
        chain.push(i);
        self.chains.insert(name.to_string(), chain.clone());
        Ok(chain)
    }

    fn pk_columns(&mut self, name: &str, seen: &mut HashSet<String>) -> Result<Vec<String>> {
        if let Some(columns) = self.pk_columns.get(name) {
            return Ok(columns.clone());
        }
        if !seen.insert(name.to_string()) {
            return Err(Error::Schema(format!("primary key cycle through {}", name)));
        }
        let chain = self.chain(name, &mut HashSet::new())?;
        let defs = self.defs;
        let root = &defs[chain[0]];
        let mut columns = Vec::new();
        for key in &root.pk {
            let attr = root
                .attrs
                .iter()
                .find(|a| a.name == *key)
                .ok_or_else(|| Error::Schema(format!("unknown key attribute {}", key)))?;
            columns.extend(self.attr_columns(attr, seen)?);
        }
        self.pk_columns.insert(name.to_string(), columns.clone());
        Ok(columns)
    }

    fn attr_columns(&mut self, attr: &AttrDef, seen: &mut HashSet<String>) -> Result<Vec<String>> {
        match &attr.kind {
            AttrKind::Set(target) => {
                self.lookup(target)?;
                Ok(Vec::new())
            }
            AttrKind::Ref(target) => {
                let target_columns = self.pk_columns(target, seen)?;
                let base = attr.column.clone().unwrap_or_else(|| attr.name.clone());
                if target_columns.len() == 1 {
                    Ok(vec![base])
                } else {
                    Ok(target_columns
                        .iter()
                        .map(|c| format!("{}_{}", base, c))
                        .collect())
                }
            }
            _ => Ok(vec![attr
                .column
                .clone()
                .unwrap_or_else(|| attr.name.clone())]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diagram() -> Arc<Diagram> {
        Diagram::builder("school")
            .entity(
                EntityDef::new("Group")
                    .primary_key("dept", AttrKind::Int)
                    .primary_key("number", AttrKind::Int)
                    .set("students", "Student"),
            )
            .entity(
                EntityDef::new("Person")
                    .table("people")
                    .primary_key("id", AttrKind::Int)
                    .required("name", AttrKind::Text),
            )
            .entity(
                EntityDef::new("Student")
                    .base("Person")
                    .optional("group", AttrKind::Ref("Group".into()))
                    .optional("mentor", AttrKind::Ref("Person".into()))
                    .column("mentor_id"),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_composite_reference_columns() {
        let d = diagram();
        let student = d.entity("Student").unwrap();
        let group = student.attr("group").unwrap();
        assert_eq!(group.columns, vec!["group_dept", "group_number"]);
        assert_eq!(
            student.target(group).unwrap(),
            d.entity("Group").unwrap()
        );
    }

    #[test]
    fn test_single_reference_uses_attribute_column() {
        let d = diagram();
        let student = d.entity("Student").unwrap();
        assert_eq!(student.attr("mentor").unwrap().columns, vec!["mentor_id"]);
    }

    #[test]
    fn test_inheritance_shares_table_and_key() {
        let d = diagram();
        let student = d.entity("Student").unwrap();
        let person = d.entity("Person").unwrap();
        assert_eq!(student.table(), "people");
        assert_eq!(student.root(), person);
        assert!(student.same_root(&person));
        assert_eq!(student.pk_columns(), vec!["id"]);
        assert!(student.attr("name").is_some());
    }

    #[test]
    fn test_composite_key() {
        let d = diagram();
        let group = d.entity("Group").unwrap();
        assert!(group.pk_is_composite());
        assert_eq!(group.pk_columns(), vec!["dept", "number"]);
        assert_eq!(group.table(), "group");
        assert!(group.attr("students").unwrap().columns.is_empty());
    }

    #[test]
    fn test_unknown_reference_rejected() {
        let err = Diagram::builder("bad")
            .entity(
                EntityDef::new("A")
                    .primary_key("id", AttrKind::Int)
                    .required("b", AttrKind::Ref("B".into())),
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn test_missing_key_rejected() {
        let err = Diagram::builder("bad")
            .entity(EntityDef::new("A").required("x", AttrKind::Int))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("no primary key"));
    }

    #[test]
    fn test_distinct_diagrams_are_distinct() {
        let a = diagram().entity("Person").unwrap();
        let b = diagram().entity("Person").unwrap();
        assert_ne!(a, b);
    }
}
