//! Builtin functions and methods available to every template

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::error::EvalError;
use crate::render::value::{Value, MAX_SEQUENCE_LEN};

/// A function implemented in Rust, called with positional arguments
pub type NativeFn = fn(&[Value]) -> Result<Value, EvalError>;

/// Look up a builtin by name
pub fn builtin(name: &str) -> Option<NativeFn> {
    let f: NativeFn = match name {
        "len" => len,
        "str" => to_str,
        "int" => to_int,
        "float" => to_float,
        "bool" => to_bool,
        "list" => to_list,
        "range" => range,
        "reversed" => reversed,
        "sorted" => sorted,
        "enumerate" => enumerate,
        "min" => min,
        "max" => max,
        "abs" => abs,
        _ => return None,
    };
    Some(f)
}

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<(), EvalError> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            format!("{}", min)
        } else {
            format!("{} to {}", min, max)
        };
        return Err(EvalError::arguments(format!(
            "{}() takes {} arguments ({} given)",
            name,
            expected,
            args.len()
        )));
    }
    Ok(())
}

fn int_arg(name: &str, value: &Value) -> Result<i64, EvalError> {
    value.as_int().ok_or_else(|| {
        EvalError::type_mismatch(format!(
            "{}() expects an integer, not '{}'",
            name,
            value.type_name()
        ))
    })
}

fn str_arg<'v>(name: &str, value: &'v Value) -> Result<&'v str, EvalError> {
    value.as_str().ok_or_else(|| {
        EvalError::type_mismatch(format!(
            "{}() expects a string, not '{}'",
            name,
            value.type_name()
        ))
    })
}

fn len(args: &[Value]) -> Result<Value, EvalError> {
    arity("len", args, 1, 1)?;
    let n = match &args[0] {
        Value::Str(s) | Value::Safe(s) => s.chars().count(),
        Value::List(items) => items.len(),
        Value::Map(map) => map.len(),
        other => {
            return Err(EvalError::type_mismatch(format!(
                "object of type '{}' has no len()",
                other.type_name()
            )))
        }
    };
    i64::try_from(n).map(Value::Int).map_err(|_| EvalError::Overflow)
}

fn to_str(args: &[Value]) -> Result<Value, EvalError> {
    arity("str", args, 0, 1)?;
    Ok(Value::Str(args.first().map(Value::to_string).unwrap_or_default()))
}

fn to_int(args: &[Value]) -> Result<Value, EvalError> {
    arity("int", args, 1, 1)?;
    match &args[0] {
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Int(n) => Ok(Value::Int(*n)),
        Value::Float(x) if x.is_finite() => Ok(Value::Int(x.trunc() as i64)),
        Value::Str(s) | Value::Safe(s) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| {
            EvalError::type_mismatch(format!("invalid literal for int(): {:?}", s))
        }),
        other => Err(EvalError::type_mismatch(format!(
            "int() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

fn to_float(args: &[Value]) -> Result<Value, EvalError> {
    arity("float", args, 1, 1)?;
    match &args[0] {
        Value::Bool(b) => Ok(Value::Float(f64::from(u8::from(*b)))),
        Value::Int(n) => Ok(Value::Float(*n as f64)),
        Value::Float(x) => Ok(Value::Float(*x)),
        Value::Str(s) | Value::Safe(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
            EvalError::type_mismatch(format!("could not convert string to float: {:?}", s))
        }),
        other => Err(EvalError::type_mismatch(format!(
            "float() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

fn to_bool(args: &[Value]) -> Result<Value, EvalError> {
    arity("bool", args, 0, 1)?;
    Ok(Value::Bool(args.first().map_or(false, Value::is_truthy)))
}

fn to_list(args: &[Value]) -> Result<Value, EvalError> {
    arity("list", args, 0, 1)?;
    match args.first() {
        Some(value) => value.iter_items().map(Value::List),
        None => Ok(Value::List(Vec::new())),
    }
}

fn range(args: &[Value]) -> Result<Value, EvalError> {
    arity("range", args, 1, 3)?;
    let ints = args
        .iter()
        .map(|v| int_arg("range", v))
        .collect::<Result<Vec<_>, _>>()?;
    let (start, stop, step) = match ints.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => return Err(EvalError::arguments("range expected 1 to 3 arguments")),
    };
    if step == 0 {
        return Err(EvalError::arguments("range() arg 3 must not be zero"));
    }
    let (start, stop, step) = (i128::from(start), i128::from(stop), i128::from(step));
    let count = if (step > 0 && start < stop) || (step < 0 && start > stop) {
        (stop - start - step.signum()) / step + 1
    } else {
        0
    };
    let count = usize::try_from(count).map_err(|_| EvalError::Overflow)?;
    if count > MAX_SEQUENCE_LEN {
        return Err(EvalError::Overflow);
    }
    let mut items = Vec::with_capacity(count);
    let mut n = start;
    for _ in 0..count {
        let value = i64::try_from(n).map_err(|_| EvalError::Overflow)?;
        items.push(Value::Int(value));
        n += step;
    }
    Ok(Value::List(items))
}

fn reversed(args: &[Value]) -> Result<Value, EvalError> {
    arity("reversed", args, 1, 1)?;
    let mut items = args[0].iter_items()?;
    items.reverse();
    Ok(Value::List(items))
}

/// Sort with a fallible comparison; the first failure wins
fn sort_values(items: &mut [Value]) -> Result<(), EvalError> {
    let mut failure = None;
    items.sort_by(|a, b| match a.compare(b) {
        Ok(ordering) => ordering,
        Err(err) => {
            failure.get_or_insert(err);
            Ordering::Equal
        }
    });
    match failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn sorted(args: &[Value]) -> Result<Value, EvalError> {
    arity("sorted", args, 1, 1)?;
    let mut items = args[0].iter_items()?;
    sort_values(&mut items)?;
    Ok(Value::List(items))
}

fn enumerate(args: &[Value]) -> Result<Value, EvalError> {
    arity("enumerate", args, 1, 2)?;
    let start = match args.get(1) {
        Some(v) => int_arg("enumerate", v)?,
        None => 0,
    };
    let items = args[0].iter_items()?;
    let mut out = Vec::with_capacity(items.len());
    for (offset, item) in items.into_iter().enumerate() {
        let index = i64::try_from(offset)
            .ok()
            .and_then(|o| start.checked_add(o))
            .ok_or(EvalError::Overflow)?;
        out.push(Value::List(vec![Value::Int(index), item]));
    }
    Ok(Value::List(out))
}

fn extreme(name: &str, args: &[Value], wanted: Ordering) -> Result<Value, EvalError> {
    let items = match args {
        [] => {
            let message = format!("{}() expected at least 1 argument", name);
            return Err(EvalError::arguments(message));
        }
        [single] => single.iter_items()?,
        many => many.to_vec(),
    };
    let mut best: Option<Value> = None;
    for item in items {
        best = Some(match best {
            Some(current) if item.compare(&current)? != wanted => current,
            _ => item,
        });
    }
    best.ok_or_else(|| EvalError::arguments(format!("{}() arg is an empty sequence", name)))
}

fn min(args: &[Value]) -> Result<Value, EvalError> {
    extreme("min", args, Ordering::Less)
}

fn max(args: &[Value]) -> Result<Value, EvalError> {
    extreme("max", args, Ordering::Greater)
}

fn abs(args: &[Value]) -> Result<Value, EvalError> {
    arity("abs", args, 1, 1)?;
    match &args[0] {
        Value::Float(x) => Ok(Value::Float(x.abs())),
        other => {
            let n = int_arg("abs", other)?;
            n.checked_abs().map(Value::Int).ok_or(EvalError::Overflow)
        }
    }
}

/// Call a method on a string or dict receiver
pub fn call_method(receiver: &Value, name: &str, args: &[Value]) -> Result<Value, EvalError> {
    match receiver {
        Value::Str(s) | Value::Safe(s) => str_method(receiver, s, name, args),
        Value::Map(map) => map_method(map, name, args),
        other => Err(EvalError::type_mismatch(format!(
            "'{}' object has no attribute '{}'",
            other.type_name(),
            name
        ))),
    }
}

fn str_method(receiver: &Value, s: &str, name: &str, args: &[Value]) -> Result<Value, EvalError> {
    match name {
        "join" => {
            arity("join", args, 1, 1)?;
            let items = args[0].iter_items()?;
            let all_safe = receiver.is_safe() && items.iter().all(Value::is_safe);
            let parts = items
                .iter()
                .map(|item| str_arg("join", item))
                .collect::<Result<Vec<_>, _>>()?;
            let joined = parts.join(s);
            Ok(if all_safe {
                Value::Safe(joined)
            } else {
                Value::Str(joined)
            })
        }
        "upper" => {
            arity("upper", args, 0, 0)?;
            Ok(Value::Str(s.to_uppercase()))
        }
        "lower" => {
            arity("lower", args, 0, 0)?;
            Ok(Value::Str(s.to_lowercase()))
        }
        "strip" => {
            arity("strip", args, 0, 1)?;
            let stripped = match args.first() {
                Some(chars) => {
                    let chars = str_arg("strip", chars)?;
                    s.trim_matches(|c| chars.contains(c))
                }
                None => s.trim(),
            };
            Ok(Value::Str(stripped.to_string()))
        }
        "split" => {
            arity("split", args, 0, 1)?;
            let parts: Vec<Value> = match args.first() {
                Some(sep) => {
                    let sep = str_arg("split", sep)?;
                    if sep.is_empty() {
                        return Err(EvalError::arguments("empty separator"));
                    }
                    s.split(sep).map(Value::from).collect()
                }
                None => s.split_whitespace().map(Value::from).collect(),
            };
            Ok(Value::List(parts))
        }
        "splitlines" => {
            arity("splitlines", args, 0, 0)?;
            Ok(Value::List(s.lines().map(Value::from).collect()))
        }
        "replace" => {
            arity("replace", args, 2, 2)?;
            let old = str_arg("replace", &args[0])?;
            let new = str_arg("replace", &args[1])?;
            Ok(Value::Str(s.replace(old, new)))
        }
        "startswith" => {
            arity("startswith", args, 1, 1)?;
            Ok(Value::Bool(s.starts_with(str_arg("startswith", &args[0])?)))
        }
        "endswith" => {
            arity("endswith", args, 1, 1)?;
            Ok(Value::Bool(s.ends_with(str_arg("endswith", &args[0])?)))
        }
        _ => Err(EvalError::type_mismatch(format!(
            "'{}' object has no attribute '{}'",
            receiver.type_name(),
            name
        ))),
    }
}

fn map_method(
    map: &BTreeMap<String, Value>,
    name: &str,
    args: &[Value],
) -> Result<Value, EvalError> {
    match name {
        "get" => {
            arity("get", args, 1, 2)?;
            let key = str_arg("get", &args[0])?;
            Ok(map
                .get(key)
                .cloned()
                .unwrap_or_else(|| args.get(1).cloned().unwrap_or_default()))
        }
        "keys" => {
            arity("keys", args, 0, 0)?;
            Ok(Value::List(map.keys().cloned().map(Value::Str).collect()))
        }
        "values" => {
            arity("values", args, 0, 0)?;
            Ok(Value::List(map.values().cloned().collect()))
        }
        "items" => {
            arity("items", args, 0, 0)?;
            Ok(Value::List(
                map.iter()
                    .map(|(k, v)| Value::List(vec![Value::Str(k.clone()), v.clone()]))
                    .collect(),
            ))
        }
        _ => Err(EvalError::type_mismatch(format!(
            "'dict' object has no attribute '{}'",
            name
        ))),
    }
}
