//! Mutation operator interpreter.
//!
//! An update document maps operator names to `{path: argument}` objects.
//! Operators form a closed set and are applied in a fixed order; the same
//! leaf path must not be touched by two operators within one update (the
//! engine accepts such input but the result is unspecified).

use crate::error::{UpdateError, UpdateResult};
use crate::path::{get_path, get_path_mut, parse_path, slot_mut, unset_path, Segment};
use crate::value::{as_date, compare_values, values_equal};
use serde_json::{Map, Number, Value};
use std::cmp::Ordering;

/// Closed set of supported update operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpdateOp {
    Set,
    Unset,
    Inc,
    Mul,
    Min,
    Max,
    Push,
    Pull,
    AddToSet,
}

impl UpdateOp {
    /// Fixed application order; operators in one update run in this sequence
    /// regardless of their order in the input document.
    const APPLICATION_ORDER: [UpdateOp; 9] = [
        UpdateOp::Set,
        UpdateOp::Unset,
        UpdateOp::Inc,
        UpdateOp::Mul,
        UpdateOp::Min,
        UpdateOp::Max,
        UpdateOp::Push,
        UpdateOp::Pull,
        UpdateOp::AddToSet,
    ];

    fn parse(name: &str) -> Option<Self> {
        match name {
            "$set" => Some(UpdateOp::Set),
            "$unset" => Some(UpdateOp::Unset),
            "$inc" => Some(UpdateOp::Inc),
            "$mul" => Some(UpdateOp::Mul),
            "$min" => Some(UpdateOp::Min),
            "$max" => Some(UpdateOp::Max),
            "$push" => Some(UpdateOp::Push),
            "$pull" => Some(UpdateOp::Pull),
            "$addToSet" => Some(UpdateOp::AddToSet),
            _ => None,
        }
    }

    fn order(self) -> usize {
        Self::APPLICATION_ORDER
            .iter()
            .position(|op| *op == self)
            .unwrap_or(usize::MAX)
    }
}

/// Apply `update` to `doc`, returning the transformed document.
///
/// `doc` is never mutated. `update` must be a non-empty object whose keys
/// are all operator names; anything else fails with
/// [`UpdateError::InvalidQuery`].
pub fn apply(doc: &Value, update: &Value) -> UpdateResult<Value> {
    let operations = parse_update(update)?;
    let mut working = doc.clone();
    for (op, arguments) in &operations {
        for (path, argument) in arguments {
            apply_operator(&mut working, *op, path, argument)?;
        }
    }
    Ok(working)
}

fn parse_update(update: &Value) -> UpdateResult<Vec<(UpdateOp, Map<String, Value>)>> {
    let map = update
        .as_object()
        .ok_or_else(|| UpdateError::invalid("update must be a JSON object"))?;
    if map.is_empty() {
        return Err(UpdateError::invalid("update must not be empty"));
    }
    let mut operations = Vec::with_capacity(map.len());
    for (key, value) in map {
        if !key.starts_with('$') {
            return Err(UpdateError::invalid(format!(
                "update keys must be operators, found '{}'",
                key
            )));
        }
        let op = UpdateOp::parse(key)
            .ok_or_else(|| UpdateError::invalid(format!("unknown update operator '{}'", key)))?;
        let arguments = value.as_object().ok_or_else(|| {
            UpdateError::invalid(format!("{} requires an object of path/argument pairs", key))
        })?;
        operations.push((op, arguments.clone()));
    }
    operations.sort_by_key(|(op, _)| op.order());
    Ok(operations)
}

fn apply_operator(doc: &mut Value, op: UpdateOp, path: &str, argument: &Value) -> UpdateResult<()> {
    let segments = parse_path(path)?;
    match op {
        UpdateOp::Set => {
            *slot_mut(doc, &segments, path)? = argument.clone();
            Ok(())
        }
        UpdateOp::Unset => {
            unset_path(doc, &segments);
            Ok(())
        }
        UpdateOp::Inc => apply_arithmetic(doc, Arith::Inc, &segments, path, argument),
        UpdateOp::Mul => apply_arithmetic(doc, Arith::Mul, &segments, path, argument),
        UpdateOp::Min => apply_bound(doc, Bound::Min, &segments, path, argument),
        UpdateOp::Max => apply_bound(doc, Bound::Max, &segments, path, argument),
        UpdateOp::Push => apply_push(doc, &segments, path, argument),
        UpdateOp::Pull => apply_pull(doc, &segments, path, argument),
        UpdateOp::AddToSet => apply_add_to_set(doc, &segments, path, argument),
    }
}

#[derive(Debug, Clone, Copy)]
enum Arith {
    Inc,
    Mul,
}

impl Arith {
    fn name(self) -> &'static str {
        match self {
            Arith::Inc => "$inc",
            Arith::Mul => "$mul",
        }
    }
}

fn apply_arithmetic(
    doc: &mut Value,
    arith: Arith,
    segments: &[Segment],
    path: &str,
    argument: &Value,
) -> UpdateResult<()> {
    if !argument.is_number() {
        return Err(UpdateError::invalid(format!(
            "{} requires a numeric argument at path '{}'",
            arith.name(),
            path
        )));
    }
    let current = match get_path(doc, segments) {
        None => None,
        Some(Value::Number(n)) => Some(n.clone()),
        Some(_) => {
            return Err(UpdateError::invalid(format!(
                "{} target at path '{}' is not numeric",
                arith.name(),
                path
            )));
        }
    };
    let result = arithmetic_value(arith, current, argument)?;
    *slot_mut(doc, segments, path)? = result;
    Ok(())
}

/// Missing targets start from zero. Integer arithmetic stays integral; any
/// float on either side, or integer overflow, falls back to f64.
fn arithmetic_value(arith: Arith, current: Option<Number>, argument: &Value) -> UpdateResult<Value> {
    let current_int = match &current {
        None => Some(0),
        Some(n) => n.as_i64(),
    };
    if let (Some(a), Some(b)) = (current_int, argument.as_i64()) {
        let exact = match arith {
            Arith::Inc => a.checked_add(b),
            Arith::Mul => a.checked_mul(b),
        };
        if let Some(value) = exact {
            return Ok(Value::from(value));
        }
    }
    let a = current
        .as_ref()
        .and_then(Number::as_f64)
        .unwrap_or(0.0);
    let b = argument.as_f64().unwrap_or(0.0);
    let result = match arith {
        Arith::Inc => a + b,
        Arith::Mul => a * b,
    };
    Number::from_f64(result)
        .map(Value::Number)
        .ok_or_else(|| {
            UpdateError::invalid(format!("{} produced a non-finite number", arith.name()))
        })
}

#[derive(Debug, Clone, Copy)]
enum Bound {
    Min,
    Max,
}

impl Bound {
    fn name(self) -> &'static str {
        match self {
            Bound::Min => "$min",
            Bound::Max => "$max",
        }
    }
}

fn apply_bound(
    doc: &mut Value,
    bound: Bound,
    segments: &[Segment],
    path: &str,
    argument: &Value,
) -> UpdateResult<()> {
    let replace = match get_path(doc, segments) {
        None => true,
        Some(current) => {
            let ordering = compare_values(current, argument).ok_or_else(|| {
                UpdateError::invalid(format!(
                    "{} cannot compare values at path '{}'",
                    bound.name(),
                    path
                ))
            })?;
            match bound {
                Bound::Min => ordering == Ordering::Greater,
                Bound::Max => ordering == Ordering::Less,
            }
        }
    };
    if replace {
        *slot_mut(doc, segments, path)? = argument.clone();
    }
    Ok(())
}

/// Expand a `$push`/`$addToSet` argument: `{$each: [...]}` contributes each
/// element in order, anything else contributes itself as one element.
fn expand_push_argument(argument: &Value) -> UpdateResult<Vec<Value>> {
    if let Some(map) = argument.as_object() {
        if let Some(each) = map.get("$each") {
            if map.len() > 1 {
                let extra = map
                    .keys()
                    .find(|key| key.as_str() != "$each")
                    .map(String::as_str)
                    .unwrap_or_default();
                return Err(UpdateError::invalid(format!(
                    "unsupported modifier '{}' alongside $each",
                    extra
                )));
            }
            let items = each
                .as_array()
                .ok_or_else(|| UpdateError::invalid("$each requires an array argument"))?;
            return Ok(items.clone());
        }
    }
    Ok(vec![argument.clone()])
}

/// Resolve the target array for `$push`/`$addToSet`, creating it when the
/// path is absent. Any present non-array value is a type error.
fn array_slot_mut<'a>(
    doc: &'a mut Value,
    segments: &[Segment],
    path: &str,
    op_name: &str,
) -> UpdateResult<&'a mut Vec<Value>> {
    match get_path(doc, segments) {
        None | Some(Value::Array(_)) => {}
        Some(_) => {
            return Err(UpdateError::invalid(format!(
                "{} requires an array at path '{}'",
                op_name, path
            )));
        }
    }
    let slot = slot_mut(doc, segments, path)?;
    if slot.is_null() {
        *slot = Value::Array(Vec::new());
    }
    match slot {
        Value::Array(items) => Ok(items),
        _ => Err(UpdateError::invalid(format!(
            "{} requires an array at path '{}'",
            op_name, path
        ))),
    }
}

fn apply_push(
    doc: &mut Value,
    segments: &[Segment],
    path: &str,
    argument: &Value,
) -> UpdateResult<()> {
    let items = expand_push_argument(argument)?;
    let target = array_slot_mut(doc, segments, path, "$push")?;
    target.extend(items);
    Ok(())
}

fn apply_add_to_set(
    doc: &mut Value,
    segments: &[Segment],
    path: &str,
    argument: &Value,
) -> UpdateResult<()> {
    let items = expand_push_argument(argument)?;
    let target = array_slot_mut(doc, segments, path, "$addToSet")?;
    for item in items {
        if !target.iter().any(|existing| values_equal(existing, &item)) {
            target.push(item);
        }
    }
    Ok(())
}

fn apply_pull(
    doc: &mut Value,
    segments: &[Segment],
    path: &str,
    criterion: &Value,
) -> UpdateResult<()> {
    let criterion = PullCriterion::parse(criterion)?;
    match get_path_mut(doc, segments) {
        None => Ok(()),
        Some(Value::Array(items)) => {
            items.retain(|element| !criterion.matches(element));
            Ok(())
        }
        Some(_) => Err(UpdateError::invalid(format!(
            "$pull requires an array at path '{}'",
            path
        ))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PredOp {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
    Ne,
}

enum FieldCond {
    Equals(Value),
    Predicates(Vec<(PredOp, Value)>),
}

/// Parsed `$pull` criterion. Three forms: plain equality, an element-wise
/// predicate object, or a per-field subset match.
enum PullCriterion {
    Equals(Value),
    Predicates(Vec<(PredOp, Value)>),
    Subset(Vec<(String, FieldCond)>),
}

impl PullCriterion {
    fn parse(criterion: &Value) -> UpdateResult<Self> {
        let Some(map) = criterion.as_object() else {
            return Ok(PullCriterion::Equals(criterion.clone()));
        };
        if as_date(criterion).is_some() || map.is_empty() {
            return Ok(PullCriterion::Equals(criterion.clone()));
        }
        if map.keys().all(|key| key.starts_with('$')) {
            return Ok(PullCriterion::Predicates(parse_predicates(map)?));
        }
        let mut fields = Vec::with_capacity(map.len());
        for (field, condition) in map {
            if field.starts_with('$') {
                return Err(UpdateError::invalid(format!(
                    "misplaced operator '{}' in $pull criterion",
                    field
                )));
            }
            let condition = match condition.as_object() {
                Some(inner)
                    if !inner.is_empty() && inner.keys().all(|key| key.starts_with('$')) =>
                {
                    FieldCond::Predicates(parse_predicates(inner)?)
                }
                _ => FieldCond::Equals(condition.clone()),
            };
            fields.push((field.clone(), condition));
        }
        Ok(PullCriterion::Subset(fields))
    }

    fn matches(&self, element: &Value) -> bool {
        match self {
            PullCriterion::Equals(target) => values_equal(element, target),
            PullCriterion::Predicates(predicates) => {
                // Element-wise predicates never apply to plain object
                // elements; tagged dates remain comparable.
                if element.is_object() && as_date(element).is_none() {
                    return false;
                }
                predicates
                    .iter()
                    .all(|(op, operand)| predicate_holds(element, *op, operand))
            }
            PullCriterion::Subset(fields) => {
                let Some(map) = element.as_object() else {
                    return false;
                };
                fields.iter().all(|(field, condition)| match map.get(field) {
                    None => false,
                    Some(value) => match condition {
                        FieldCond::Equals(target) => values_equal(value, target),
                        FieldCond::Predicates(predicates) => predicates
                            .iter()
                            .all(|(op, operand)| predicate_holds(value, *op, operand)),
                    },
                })
            }
        }
    }
}

fn parse_predicates(map: &Map<String, Value>) -> UpdateResult<Vec<(PredOp, Value)>> {
    map.iter()
        .map(|(key, operand)| {
            let op = match key.as_str() {
                "$gt" => PredOp::Gt,
                "$gte" => PredOp::Gte,
                "$lt" => PredOp::Lt,
                "$lte" => PredOp::Lte,
                "$eq" => PredOp::Eq,
                "$ne" => PredOp::Ne,
                other => {
                    return Err(UpdateError::invalid(format!(
                        "unsupported operator '{}' in $pull criterion",
                        other
                    )));
                }
            };
            Ok((op, operand.clone()))
        })
        .collect()
}

fn predicate_holds(value: &Value, op: PredOp, operand: &Value) -> bool {
    match op {
        PredOp::Eq => values_equal(value, operand),
        PredOp::Ne => !values_equal(value, operand),
        PredOp::Gt => compare_values(value, operand) == Some(Ordering::Greater),
        PredOp::Lt => compare_values(value, operand) == Some(Ordering::Less),
        PredOp::Gte => matches!(
            compare_values(value, operand),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        PredOp::Lte => matches!(
            compare_values(value, operand),
            Some(Ordering::Less | Ordering::Equal)
        ),
    }
}
