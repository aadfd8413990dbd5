//! Scalar coercion applied to model JSON before the typed parse.
//!
//! Models often answer `"45 minutes"` where an integer is expected or a
//! bare string where a list is expected. These helpers rewrite such values
//! in place at the paths a schema declares, leaving well-typed values alone.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::schema::ArtifactSchema;

static LEADING_INTEGER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+)").expect("leading integer regex should be valid"));

/// Coerces every integer and list field `schema` declares. Returns the
/// number of values rewritten.
pub(crate) fn coerce(value: &mut Value, schema: &ArtifactSchema) -> usize {
    let mut rewritten = 0;
    for path in schema.integer_fields {
        rewritten += visit(value, path, &mut coerce_integer);
    }
    for path in schema.list_fields {
        rewritten += visit(value, path, &mut coerce_list);
    }
    rewritten
}

fn visit(value: &mut Value, path: &[&str], apply: &mut dyn FnMut(&mut Value) -> bool) -> usize {
    let Some((head, rest)) = path.split_first() else {
        return usize::from(apply(value));
    };
    match (*head, value) {
        ("[]", Value::Array(items)) => items.iter_mut().map(|item| visit(item, rest, apply)).sum(),
        (key, Value::Object(map)) => map.get_mut(key).map_or(0, |child| visit(child, rest, apply)),
        _ => 0,
    }
}

fn coerce_integer(value: &mut Value) -> bool {
    let coerced = match value {
        Value::String(s) => LEADING_INTEGER
            .captures(s)
            .and_then(|caps| caps[1].parse::<u64>().ok()),
        Value::Number(n) if n.as_u64().is_none() => n
            .as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= f64::from(u32::MAX))
            .map(|f| f as u64),
        _ => None,
    };
    match coerced {
        Some(n) => {
            *value = Value::from(n);
            true
        }
        None => false,
    }
}

fn coerce_list(value: &mut Value) -> bool {
    if let Value::String(s) = value {
        let item = Value::String(std::mem::take(s));
        *value = Value::Array(vec![item]);
        true
    } else {
        false
    }
}
