//! Projection layout and row hydration.
use anyhow::anyhow;

use super::{AttrKind, EntityType};
use crate::ast::Expression;
use crate::value::{Object, Row, Value};

/// Row offsets of every loaded attribute, in projection order.
pub type AttrOffsets = Vec<(String, Vec<usize>)>;

/// SELECT list for one entity alias together with its hydration map.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub columns: Vec<Expression>,
    pub offsets: AttrOffsets,
}

impl EntityType {
    /// Columns of every non-collection attribute, qualified by `alias`.
    pub fn projection(&self, alias: &str) -> Projection {
        let mut columns = Vec::new();
        let mut offsets = Vec::new();
        for attr in self.attributes().iter().filter(|a| !a.is_collection()) {
            let start = columns.len();
            columns.extend(
                attr.columns
                    .iter()
                    .map(|c| Expression::column(alias, c.as_str())),
            );
            offsets.push((attr.name.clone(), (start..columns.len()).collect()));
        }
        Projection { columns, offsets }
    }

    /// Build objects from rows laid out by [`EntityType::projection`].
    pub fn hydrate(&self, rows: Vec<Row>, offsets: &AttrOffsets) -> anyhow::Result<Vec<Object>> {
        rows.into_iter()
            .map(|row| self.hydrate_row(&row, offsets))
            .collect()
    }

    fn hydrate_row(&self, row: &Row, offsets: &AttrOffsets) -> anyhow::Result<Object> {
        let mut obj = Object::new(self.clone());
        for (name, positions) in offsets {
            let mut cells = Vec::with_capacity(positions.len());
            for &pos in positions {
                let cell = row.get(pos).ok_or_else(|| {
                    anyhow!(
                        "row has {} columns, {}.{} expects column {}",
                        row.len(),
                        self.name(),
                        name,
                        pos
                    )
                })?;
                cells.push(cell.clone());
            }
            let attr = self
                .attr(name)
                .ok_or_else(|| anyhow!("{} has no attribute {}", self.name(), name))?;
            if attr.required && cells.iter().all(Value::is_null) {
                return Err(anyhow!("required attribute {}.{} is NULL", self.name(), name));
            }
            let value = match &attr.kind {
                AttrKind::Ref(_) => {
                    let target = self
                        .target(attr)
                        .ok_or_else(|| anyhow!("unresolved reference {}.{}", self.name(), name))?;
                    if cells.iter().all(Value::is_null) {
                        Value::Null
                    } else {
                        Value::Object(target.stub(cells)?)
                    }
                }
                _ => cells.into_iter().next().unwrap_or(Value::Null),
            };
            obj.set(name.clone(), value);
        }
        Ok(obj)
    }

    /// Key-only instance built from raw key column values.
    fn stub(&self, raw: Vec<Value>) -> anyhow::Result<Object> {
        let mut obj = Object::new(self.clone());
        let mut raw = raw.into_iter();
        for attr in self.pk_attrs() {
            let cells: Vec<Value> = raw.by_ref().take(attr.columns.len()).collect();
            if cells.len() != attr.columns.len() {
                return Err(anyhow!("short key for {}", self.name()));
            }
            let value = match self.target(attr) {
                Some(target) => Value::Object(target.stub(cells)?),
                None => cells.into_iter().next().unwrap_or(Value::Null),
            };
            obj.set(attr.name.clone(), value);
        }
        Ok(obj)
    }
}
