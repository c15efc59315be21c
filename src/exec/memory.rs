//! In-memory execution against JSON records.
//!
//! Records are JSON objects keyed by column name, stored per entity. The
//! store evaluates a compiled spec with inner-join semantics: every join
//! extends each candidate tuple with all matching records, so a to-many
//! join repeats the root row once per match, as SQL would.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};

use crate::catalog::{RelationKind, SchemaCatalog};
use crate::lang::{AggregateFunction, Comparator, Literal, LogicalOperator};
use crate::planner::{ColumnRef, CompiledSpec, Predicate, PredicateValue, Resolved};

use super::{ExecutionError, Executor, Related, Row};

type Record = Map<String, Value>;

/// Records per entity, bound to the catalog that describes them.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    catalog: SchemaCatalog,
    records: HashMap<String, Vec<Record>>,
}

impl MemoryStore {
    pub fn new(catalog: SchemaCatalog) -> Self {
        Self {
            catalog,
            records: HashMap::new(),
        }
    }

    /// Load records from `{"entity": [{"column": value, ..}, ..], ..}`.
    pub fn from_json(catalog: SchemaCatalog, json: &str) -> Result<Self, ExecutionError> {
        let value: Value = serde_json::from_str(json).map_err(ExecutionError::new)?;
        Self::from_value(catalog, value)
    }

    pub fn from_value(catalog: SchemaCatalog, value: Value) -> Result<Self, ExecutionError> {
        let Value::Object(tables) = value else {
            return Err(ExecutionError::msg("dataset must be a JSON object"));
        };
        let mut store = Self::new(catalog);
        for (entity, rows) in tables {
            let Value::Array(rows) = rows else {
                return Err(ExecutionError::msg(format!(
                    "records of '{}' must be an array",
                    entity
                )));
            };
            for row in rows {
                let Value::Object(record) = row else {
                    return Err(ExecutionError::msg(format!(
                        "record of '{}' must be an object",
                        entity
                    )));
                };
                store.insert(&entity, record)?;
            }
        }
        tracing::debug!(
            entities = store.records.len(),
            records = store.records.values().map(Vec::len).sum::<usize>(),
            "loaded dataset"
        );
        Ok(store)
    }

    pub fn insert(&mut self, entity: &str, record: Record) -> Result<(), ExecutionError> {
        if !self.catalog.contains(entity) {
            return Err(ExecutionError::msg(format!("unknown entity '{}'", entity)));
        }
        self.records.entry(entity.to_string()).or_default().push(record);
        Ok(())
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    fn records(&self, entity: &str) -> &[Record] {
        self.records.get(entity).map(Vec::as_slice).unwrap_or(&[])
    }

    fn row(&self, entity: &str, index: usize) -> MemoryRow<'_> {
        MemoryRow {
            store: self,
            entity: entity.to_string(),
            index,
            extras: BTreeMap::new(),
        }
    }

    /// Indices of `entity` records whose `column` equals `value`.
    fn matching(&self, entity: &str, column: &str, value: &Value) -> Vec<usize> {
        self.records(entity)
            .iter()
            .enumerate()
            .filter(|(_, r)| r.get(column).is_some_and(|v| values_equal(v, value)))
            .map(|(i, _)| i)
            .collect()
    }
}

/// A record of one entity, plus extra output columns for result rows.
#[derive(Debug, Clone)]
pub struct MemoryRow<'s> {
    store: &'s MemoryStore,
    entity: String,
    index: usize,
    extras: BTreeMap<String, Value>,
}

impl<'s> MemoryRow<'s> {
    fn record(&self) -> Option<&'s Record> {
        self.store.records(&self.entity).get(self.index)
    }

    fn column(&self, column: &str) -> Option<&'s Value> {
        self.record()?.get(column)
    }

    fn primary_key(&self) -> Option<&'s Value> {
        let entity = self.store.catalog.entity(&self.entity)?;
        self.column(&entity.primary_key()?.column)
    }

    fn rows(&self, entity: &str, indices: Vec<usize>) -> Vec<MemoryRow<'s>> {
        indices
            .into_iter()
            .map(|i| self.store.row(entity, i))
            .collect()
    }
}

impl PartialEq for MemoryRow<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.store, other.store)
            && self.entity == other.entity
            && self.index == other.index
            && self.extras == other.extras
    }
}

impl<'s> Row for MemoryRow<'s> {
    fn field(&self, name: &str) -> Option<Value> {
        // Aggregate outputs win over record fields of the same name
        if let Some(value) = self.extras.get(name) {
            return Some(value.clone());
        }
        let field = self.store.catalog.entity(&self.entity)?.field(name)?;
        Some(self.column(&field.column).cloned().unwrap_or(Value::Null))
    }

    fn related(&self, name: &str) -> Option<Related<Self>> {
        let entity = self.store.catalog.entity(&self.entity)?;
        let related = match entity.relation(name)? {
            RelationKind::ForeignKey { target, column } => {
                let pk = self.store.catalog.entity(target)?.primary_key()?;
                let row = self
                    .column(column)
                    .filter(|v| !v.is_null())
                    .and_then(|key| self.store.matching(target, &pk.column, key).first().copied())
                    .map(|i| self.store.row(target, i));
                Related::One(row)
            }
            RelationKind::ReverseOne { target, column, .. } => match self.primary_key() {
                Some(key) => Related::Many(self.rows(target, self.store.matching(target, column, key))),
                None => Related::Many(Vec::new()),
            },
            RelationKind::ReverseMany {
                junction,
                near_column,
                ..
            } => match self.primary_key() {
                Some(key) => {
                    Related::Many(self.rows(junction, self.store.matching(junction, near_column, key)))
                }
                None => Related::Many(Vec::new()),
            },
        };
        Some(related)
    }
}

// ============================================================================
// Value semantics
// ============================================================================

/// SQL-like ordering: numbers numerically, strings lexically, NULL and
/// mismatched types are incomparable.
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    compare_values(a, b) == Some(Ordering::Equal)
}

/// Rank of a value's type in sort keys. NULL ranks last.
fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Bool(_) => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Array(_) => 3,
        Value::Object(_) => 4,
        Value::Null => 5,
    }
}

/// Total sort key ordering: by type rank first, then by value.
fn sort_order(a: &Value, b: &Value) -> Ordering {
    type_rank(a).cmp(&type_rank(b)).then_with(|| match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.total_cmp(&y)
        }
        _ => compare_values(a, b).unwrap_or(Ordering::Equal),
    })
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Integer(n) => Value::from(*n),
        Literal::String(s) => Value::String(s.clone()),
    }
}

fn compare(op: Comparator, a: &Value, b: &Value) -> bool {
    let Some(ordering) = compare_values(a, b) else {
        return false;
    };
    match op {
        Comparator::Eq => ordering == Ordering::Equal,
        Comparator::Ne => ordering != Ordering::Equal,
        Comparator::Lt => ordering == Ordering::Less,
        Comparator::Gt => ordering == Ordering::Greater,
        Comparator::Le => ordering != Ordering::Greater,
        Comparator::Ge => ordering != Ordering::Less,
    }
}

fn aggregate(function: AggregateFunction, values: &[&Value]) -> Value {
    let present: Vec<&Value> = values.iter().copied().filter(|v| !v.is_null()).collect();
    match function {
        AggregateFunction::Count => Value::from(present.len()),
        AggregateFunction::Sum => {
            if present.is_empty() {
                return Value::Null;
            }
            let exact = present
                .iter()
                .map(|v| v.as_i64())
                .try_fold(0i64, |acc, n| acc.checked_add(n?));
            match exact {
                Some(total) => Value::from(total),
                // Non-integers or overflow
                None => Value::from(present.iter().filter_map(|v| v.as_f64()).sum::<f64>()),
            }
        }
        AggregateFunction::Avg => {
            let numbers: Vec<f64> = present.iter().filter_map(|v| v.as_f64()).collect();
            if numbers.is_empty() {
                return Value::Null;
            }
            Value::from(numbers.iter().sum::<f64>() / numbers.len() as f64)
        }
        AggregateFunction::Min | AggregateFunction::Max => {
            let wanted = if function == AggregateFunction::Min {
                Ordering::Less
            } else {
                Ordering::Greater
            };
            present
                .into_iter()
                .reduce(|best, v| {
                    if compare_values(v, best) == Some(wanted) {
                        v
                    } else {
                        best
                    }
                })
                .cloned()
                .unwrap_or(Value::Null)
        }
    }
}

// ============================================================================
// Execution
// ============================================================================

/// A joined tuple: one record index per bound table, in binding order.
type Tuple = Vec<usize>;

struct Bindings<'a> {
    store: &'a MemoryStore,
    /// Entity per position.
    entities: Vec<&'a str>,
    positions: HashMap<&'a str, usize>,
}

impl<'a> Bindings<'a> {
    fn value(&self, tuple: &Tuple, column: &ColumnRef) -> Result<&'a Value, ExecutionError> {
        static NULL: Value = Value::Null;
        let position = *self.positions.get(column.relation.as_str()).ok_or_else(|| {
            ExecutionError::msg(format!("unbound relation '{}'", column.relation))
        })?;
        let record = &self.store.records(self.entities[position])[tuple[position]];
        Ok(record.get(&column.column).unwrap_or(&NULL))
    }

    fn resolved(&self, tuple: &Tuple, resolved: &Resolved) -> Result<&'a Value, ExecutionError> {
        match resolved {
            Resolved::Column(column) => self.value(tuple, column),
            Resolved::Table { relation } => Err(ExecutionError::msg(format!(
                "'{}' is a table, not a value",
                relation
            ))),
        }
    }

    fn eval(&self, tuple: &Tuple, predicate: &Predicate) -> Result<bool, ExecutionError> {
        match predicate {
            Predicate::Compare { column, op, value } => {
                let left = self.value(tuple, column)?;
                let right = match value {
                    PredicateValue::Literal(lit) => literal_value(lit),
                    PredicateValue::Column(other) => self.value(tuple, other)?.clone(),
                };
                Ok(compare(*op, left, &right))
            }
            Predicate::Logical { left, op, right } => {
                let left = self.eval(tuple, left)?;
                let right = self.eval(tuple, right)?;
                Ok(match op {
                    LogicalOperator::And => left && right,
                    LogicalOperator::Or => left || right,
                    LogicalOperator::Xor => left != right,
                })
            }
        }
    }
}

impl<'s> Executor for &'s MemoryStore {
    type Row = MemoryRow<'s>;

    fn execute(&self, spec: &CompiledSpec) -> Result<Vec<MemoryRow<'s>>, ExecutionError> {
        let store: &'s MemoryStore = *self;
        let mut bindings = Bindings {
            store,
            entities: vec![spec.model.entity.as_str()],
            positions: HashMap::from([(spec.model.binding(), 0)]),
        };

        let mut tuples: Vec<Tuple> = (0..store.records(&spec.model.entity).len())
            .map(|i| vec![i])
            .collect();

        for join in &spec.joins {
            let right = join.right.entity.as_str();
            let mut joined = Vec::new();
            for tuple in &tuples {
                let key = bindings.value(tuple, &join.on.left)?;
                for index in store.matching(right, &join.on.right.column, key) {
                    let mut extended = tuple.clone();
                    extended.push(index);
                    joined.push(extended);
                }
            }
            bindings
                .positions
                .insert(join.right.binding(), bindings.entities.len());
            bindings.entities.push(right);
            tuples = joined;
        }

        if let Some(predicate) = &spec.predicate {
            let mut kept = Vec::with_capacity(tuples.len());
            for tuple in tuples {
                if bindings.eval(&tuple, predicate)? {
                    kept.push(tuple);
                }
            }
            tuples = kept;
        }

        // Group: one output row per distinct key, aggregates as extra columns
        let grouped = !spec.group_by.is_empty() || spec.aggregates().next().is_some();
        let mut rows: Vec<(Tuple, BTreeMap<String, Value>)> = if grouped {
            let mut groups: Vec<(Vec<&Value>, Vec<Tuple>)> = Vec::new();
            for tuple in tuples {
                let key = spec
                    .group_by
                    .iter()
                    .map(|r| bindings.resolved(&tuple, r))
                    .collect::<Result<Vec<_>, _>>()?;
                let existing = groups.iter_mut().find(|(k, _)| {
                    k.len() == key.len() && k.iter().zip(&key).all(|(a, b)| a == b)
                });
                match existing {
                    Some((_, members)) => members.push(tuple),
                    None => groups.push((key, vec![tuple])),
                }
            }

            let mut rows = Vec::with_capacity(groups.len());
            for (_, members) in groups {
                let mut extras = BTreeMap::new();
                for (function, resolved, alias) in spec.aggregates() {
                    let values = members
                        .iter()
                        .map(|t| bindings.resolved(t, resolved))
                        .collect::<Result<Vec<_>, _>>()?;
                    extras.insert(alias.to_string(), aggregate(function, &values));
                }
                if let Some(first) = members.into_iter().next() {
                    rows.push((first, extras));
                }
            }
            rows
        } else {
            tuples.into_iter().map(|t| (t, BTreeMap::new())).collect()
        };

        if !spec.order_by.is_empty() {
            let mut keyed = Vec::with_capacity(rows.len());
            for (tuple, extras) in rows {
                let key = spec
                    .order_by
                    .iter()
                    .map(|r| bindings.resolved(&tuple, r))
                    .collect::<Result<Vec<_>, _>>()?;
                keyed.push((key, tuple, extras));
            }
            keyed.sort_by(|(a, _, _), (b, _, _)| {
                a.iter()
                    .zip(b)
                    .map(|(x, y)| sort_order(x, y))
                    .find(|o| o.is_ne())
                    .unwrap_or(Ordering::Equal)
            });
            rows = keyed.into_iter().map(|(_, t, e)| (t, e)).collect();
        }

        rows.truncate(spec.limit);

        tracing::debug!(model = %spec.model.entity, rows = rows.len(), "executed query");
        Ok(rows
            .into_iter()
            .map(|(tuple, extras)| MemoryRow {
                store,
                entity: spec.model.entity.clone(),
                index: tuple[0],
                extras,
            })
            .collect())
    }
}
