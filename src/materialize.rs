//! Result materializer: rebuilds the requested nested shape from rows.
//!
//! Only paths tagged [`Command::Select`] are emitted. Fields and relations
//! touched solely by grouping, ordering or filtering stay out of the output.

use serde_json::{Map, Value};

use crate::exec::{Related, Row};
use crate::tree::{Command, NodeId, QueryTree};

/// Materialize `row`, bound to the entity of `node`, as a JSON object.
pub fn materialize<R: Row>(row: &R, tree: &QueryTree, node: NodeId) -> Value {
    let current = tree.node(node);
    let mut result = Map::new();

    for field in current.fields() {
        if field.commands.contains(Command::Select) {
            let value = row.field(&field.name).unwrap_or(Value::Null);
            result.insert(field.name.clone(), value);
        }
    }

    for &child_id in current.children() {
        let child = tree.node(child_id);
        if !child.commands.contains(Command::Select) {
            continue;
        }
        let value = match row.related(&child.name) {
            Some(Related::One(Some(related))) => materialize(&related, tree, child_id),
            Some(Related::One(None)) | None => Value::Null,
            Some(Related::Many(rows)) => {
                let items = rows.iter().map(|related| match &child.shadow_field {
                    // Bridge through the junction row to the real target
                    Some(shadow) => match related.related(shadow) {
                        Some(Related::One(Some(target))) => materialize(&target, tree, child_id),
                        _ => Value::Null,
                    },
                    None => materialize(related, tree, child_id),
                });
                Value::Array(items.collect())
            }
        };
        result.insert(child.name.clone(), value);
    }

    Value::Object(result)
}

/// Materialize every row from the root of `tree`.
pub fn materialize_all<R: Row>(rows: &[R], tree: &QueryTree) -> Vec<Value> {
    rows.iter()
        .map(|row| materialize(row, tree, tree.root()))
        .collect()
}
