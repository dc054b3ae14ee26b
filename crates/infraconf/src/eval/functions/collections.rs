use super::{
    integer, list, next, object, string, FuncDef, FunctionError, Param, GENERATED_LIMIT,
};
use crate::value::Value;
use indexmap::IndexMap;

pub(super) fn functions() -> Vec<FuncDef> {
    vec![
        FuncDef::new("chunklist", |args, _| {
            let mut args = args.into_iter();
            let items = list(next(&mut args));
            let size = integer(&next(&mut args), "size")?;
            if size < 0 {
                return Err(FunctionError::failed("chunk size must not be negative"));
            }
            if size == 0 {
                return Ok(Value::Array(vec![Value::Array(items)]));
            }
            Ok(Value::Array(
                items
                    .chunks(size as usize)
                    .map(|chunk| Value::Array(chunk.to_vec()))
                    .collect(),
            ))
        })
        .param(Param::list("list"))
        .param(Param::number("size")),
        FuncDef::new("coalesce", |args, _| {
            Ok(args
                .into_iter()
                .find(|value| !value.is_null() && value.as_str() != Some(""))
                .unwrap_or_default())
        })
        .variadic(Param::any("vals")),
        FuncDef::new("coalescelist", |args, _| {
            Ok(args
                .into_iter()
                .find(|value| value.as_array().is_some_and(|items| !items.is_empty()))
                .unwrap_or(Value::Array(Vec::new())))
        })
        .variadic(Param::list("lists")),
        FuncDef::new("compact", |args, _| {
            Ok(Value::Array(
                args.into_iter()
                    .flat_map(list)
                    .filter(|value| !value.is_null() && value.as_str() != Some(""))
                    .collect(),
            ))
        })
        .param(Param::list("list")),
        FuncDef::new("concat", |args, _| {
            Ok(Value::Array(args.into_iter().flat_map(list).collect()))
        })
        .variadic(Param::list("lists")),
        FuncDef::new("contains", |args, _| {
            let mut args = args.into_iter();
            let items = list(next(&mut args));
            let needle = next(&mut args);
            Ok(items.contains(&needle).into())
        })
        .param(Param::list("list"))
        .param(Param::any("value")),
        FuncDef::new("distinct", |args, _| {
            let mut unique = Vec::new();
            for value in args.into_iter().flat_map(list) {
                if !unique.contains(&value) {
                    unique.push(value);
                }
            }
            Ok(Value::Array(unique))
        })
        .param(Param::list("list")),
        FuncDef::new("element", |args, _| {
            let mut args = args.into_iter();
            let items = list(next(&mut args));
            let index = integer(&next(&mut args), "index")?;
            if items.is_empty() {
                return Err(FunctionError::failed("cannot use element on an empty list"));
            }
            if index < 0 {
                return Err(FunctionError::failed("index must not be negative"));
            }
            Ok(items[index as usize % items.len()].clone())
        })
        .param(Param::list("list"))
        .param(Param::number("index")),
        FuncDef::new("flatten", |args, _| {
            let mut flat = Vec::new();
            args.into_iter().for_each(|value| flatten(value, &mut flat));
            Ok(Value::Array(flat))
        })
        .param(Param::list("list")),
        FuncDef::new("index", |args, _| {
            let mut args = args.into_iter();
            let items = list(next(&mut args));
            let needle = next(&mut args);
            items
                .iter()
                .position(|item| *item == needle)
                .map(|index| Value::Integer(index as i64))
                .ok_or_else(|| FunctionError::failed(format!("{needle} is not in the list")))
        })
        .param(Param::list("list"))
        .param(Param::any("value")),
        FuncDef::new("keys", |args, _| {
            Ok(Value::Array(
                args.into_iter()
                    .flat_map(object)
                    .map(|(key, _)| Value::String(key))
                    .collect(),
            ))
        })
        .param(Param::object("map")),
        FuncDef::new("values", |args, _| {
            Ok(Value::Array(
                args.into_iter()
                    .flat_map(object)
                    .map(|(_, value)| value)
                    .collect(),
            ))
        })
        .param(Param::object("map")),
        FuncDef::new("length", |args, _| {
            let len = match args.into_iter().next().unwrap_or_default() {
                Value::String(s) => s.chars().count(),
                Value::Array(items) => items.len(),
                Value::Object(map) => map.len(),
                Value::Null => 0,
                other => {
                    return Err(FunctionError::failed(format!(
                        "cannot take the length of a {}",
                        other.kind()
                    )))
                }
            };
            Ok(Value::Integer(len as i64))
        })
        .param(Param::any("value")),
        FuncDef::new("lookup", |args, _| {
            let mut args = args.into_iter();
            let map = object(next(&mut args));
            let key = string(next(&mut args));
            let default = args.next();
            match (map.get(&key), default) {
                (Some(value), _) => Ok(value.clone()),
                (None, Some(default)) => Ok(default),
                (None, None) => Err(FunctionError::failed(format!(
                    "key `{key}` not found and no default given"
                ))),
            }
        })
        .param(Param::object("map"))
        .param(Param::string("key"))
        .variadic(Param::any("default")),
        FuncDef::new("merge", |args, _| {
            let mut merged = IndexMap::new();
            for map in args.into_iter().map(object) {
                merged.extend(map);
            }
            Ok(Value::Object(merged))
        })
        .variadic(Param::any("maps")),
        FuncDef::new("range", |args, _| range(&args)).variadic(Param::number("bounds")),
        FuncDef::new("reverse", |args, _| {
            let mut items: Vec<Value> = args.into_iter().flat_map(list).collect();
            items.reverse();
            Ok(Value::Array(items))
        })
        .param(Param::list("list")),
        FuncDef::new("setintersection", |args, _| {
            let mut sets = args.into_iter().map(list);
            let mut result = dedup(sets.next().unwrap_or_default());
            for set in sets {
                result.retain(|value| set.contains(value));
            }
            Ok(Value::Array(result))
        })
        .param(Param::list("first"))
        .variadic(Param::list("others")),
        FuncDef::new("setsubtract", |args, _| {
            let mut args = args.into_iter();
            let mut result = dedup(list(next(&mut args)));
            let remove = list(next(&mut args));
            result.retain(|value| !remove.contains(value));
            Ok(Value::Array(result))
        })
        .param(Param::list("a"))
        .param(Param::list("b")),
        FuncDef::new("setunion", |args, _| {
            Ok(Value::Array(dedup(args.into_iter().flat_map(list).collect())))
        })
        .param(Param::list("first"))
        .variadic(Param::list("others")),
        FuncDef::new("slice", |args, _| {
            let mut args = args.into_iter();
            let items = list(next(&mut args));
            let start = integer(&next(&mut args), "start_index")?;
            let end = integer(&next(&mut args), "end_index")?;
            if start < 0 || end < start || end as usize > items.len() {
                return Err(FunctionError::failed(format!(
                    "invalid slice [{start}, {end}) of a list of length {}",
                    items.len()
                )));
            }
            Ok(Value::Array(items[start as usize..end as usize].to_vec()))
        })
        .param(Param::list("list"))
        .param(Param::number("start_index"))
        .param(Param::number("end_index")),
        FuncDef::new("sort", |args, _| {
            let mut items: Vec<String> = args.into_iter().flat_map(list).map(string).collect();
            items.sort();
            Ok(items.into())
        })
        .param(Param::list("list")),
        FuncDef::new("zipmap", |args, _| {
            let mut args = args.into_iter();
            let keys = list(next(&mut args));
            let values = list(next(&mut args));
            if keys.len() != values.len() {
                return Err(FunctionError::failed(format!(
                    "{} keys but {} values",
                    keys.len(),
                    values.len()
                )));
            }
            Ok(Value::Object(
                keys.into_iter().map(string).zip(values).collect(),
            ))
        })
        .param(Param::list("keys"))
        .param(Param::list("values")),
    ]
}

fn flatten(value: Value, into: &mut Vec<Value>) {
    match value {
        Value::Array(items) => items.into_iter().for_each(|item| flatten(item, into)),
        other => into.push(other),
    }
}

fn dedup(values: Vec<Value>) -> Vec<Value> {
    let mut unique = Vec::with_capacity(values.len());
    for value in values {
        if !unique.contains(&value) {
            unique.push(value);
        }
    }
    unique
}

/// `range(limit)`, `range(start, limit)` or `range(start, limit, step)`
fn range(args: &[Value]) -> Result<Value, FunctionError> {
    let bounds = args
        .iter()
        .map(|arg| integer(arg, "bounds"))
        .collect::<Result<Vec<_>, _>>()?;

    let (start, limit, step) = match bounds.as_slice() {
        [limit] => (0, *limit, 1),
        [start, limit] => (*start, *limit, if start <= limit { 1 } else { -1 }),
        [start, limit, step] => (*start, *limit, *step),
        _ => {
            return Err(FunctionError::failed(
                "range takes one, two or three arguments",
            ))
        }
    };

    if step == 0 {
        return Err(FunctionError::failed("step must not be zero"));
    }
    if (step > 0 && start > limit) || (step < 0 && start < limit) {
        return Err(FunctionError::failed(
            "step moves away from the limit",
        ));
    }

    let mut values = Vec::new();
    let before_limit = |c: i64| if step > 0 { c < limit } else { c > limit };
    let mut current = Some(start);
    while let Some(value) = current.filter(|&c| before_limit(c)) {
        if values.len() == GENERATED_LIMIT {
            return Err(FunctionError::failed(format!(
                "range would produce more than {GENERATED_LIMIT} elements"
            )));
        }
        values.push(Value::Integer(value));
        current = value.checked_add(step);
    }
    Ok(Value::Array(values))
}
