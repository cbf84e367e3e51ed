//! Runtime values and their operators

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::EvalError;

/// Upper bound on the bytes of a repeated string and the items of a built
/// list
pub const MAX_SEQUENCE_LEN: usize = 1 << 24;

/// A value produced while rendering
///
/// `Safe` is text that must not be escaped again: the output of an
/// escaping strategy, or text a template marked with `safe(...)`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// The "no output" value; expressions evaluating to it emit nothing
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Safe(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

#[derive(Debug, Clone, Copy)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn to_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(x) => x,
        }
    }
}

impl Value {
    pub fn safe(text: impl Into<String>) -> Self {
        Value::Safe(text.into())
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn is_safe(&self) -> bool {
        matches!(self, Value::Safe(_))
    }

    /// Type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Safe(_) => "Markup",
            Value::List(_) => "list",
            Value::Map(_) => "dict",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(x) => *x != 0.0,
            Value::Str(s) | Value::Safe(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
        }
    }

    /// The text of a string value, safe or not
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) | Value::Safe(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    fn as_number(&self) -> Option<Number> {
        match self {
            Value::Bool(b) => Some(Number::Int(i64::from(*b))),
            Value::Int(n) => Some(Number::Int(*n)),
            Value::Float(x) => Some(Number::Float(*x)),
            _ => None,
        }
    }

    /// Debug-style rendering: strings are quoted
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) | Value::Safe(s) => quote(s),
            other => other.to_string(),
        }
    }

    /// Items of an iterable value: list items, characters or map keys
    pub fn iter_items(&self) -> Result<Vec<Value>, EvalError> {
        match self {
            Value::List(items) => Ok(items.clone()),
            Value::Str(s) | Value::Safe(s) => {
                Ok(s.chars().map(|c| Value::Str(c.to_string())).collect())
            }
            Value::Map(map) => Ok(map.keys().cloned().map(Value::Str).collect()),
            other => Err(EvalError::type_mismatch(format!(
                "'{}' object is not iterable",
                other.type_name()
            ))),
        }
    }

    /// `==`: numbers compare across int and float, safe and plain
    /// strings compare by text
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equals(y))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|((ka, va), (kb, vb))| ka == kb && va.equals(vb))
            }
            (Value::None, Value::None) => true,
            _ => match (self.as_number(), other.as_number()) {
                (Some(Number::Int(a)), Some(Number::Int(b))) => a == b,
                (Some(a), Some(b)) => a.to_f64() == b.to_f64(),
                _ => match (self.as_str(), other.as_str()) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                },
            },
        }
    }

    /// Ordering for `<`, `sorted`, `min` and `max`
    pub fn compare(&self, other: &Value) -> Result<Ordering, EvalError> {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return match (a, b) {
                (Number::Int(a), Number::Int(b)) => Ok(a.cmp(&b)),
                (a, b) => a.to_f64().partial_cmp(&b.to_f64()).ok_or_else(|| {
                    EvalError::type_mismatch("cannot order NaN")
                }),
            };
        }
        if let (Some(a), Some(b)) = (self.as_str(), other.as_str()) {
            return Ok(a.cmp(b));
        }
        if let (Value::List(a), Value::List(b)) = (self, other) {
            for (x, y) in a.iter().zip(b) {
                match x.compare(y)? {
                    Ordering::Equal => continue,
                    unequal => return Ok(unequal),
                }
            }
            return Ok(a.len().cmp(&b.len()));
        }
        Err(EvalError::type_mismatch(format!(
            "'<' not supported between instances of '{}' and '{}'",
            self.type_name(),
            other.type_name()
        )))
    }

    pub fn add(&self, other: &Value) -> Result<Value, EvalError> {
        match (self, other) {
            (Value::Safe(a), Value::Safe(b)) => Ok(Value::Safe(format!("{}{}", a, b))),
            (Value::List(a), Value::List(b)) => {
                Ok(Value::List(a.iter().chain(b).cloned().collect()))
            }
            _ => {
                if let (Some(a), Some(b)) = (self.as_str(), other.as_str()) {
                    return Ok(Value::Str(format!("{}{}", a, b)));
                }
                self.arithmetic(other, "+", i64::checked_add, |a, b| a + b)
            }
        }
    }

    pub fn sub(&self, other: &Value) -> Result<Value, EvalError> {
        self.arithmetic(other, "-", i64::checked_sub, |a, b| a - b)
    }

    pub fn mul(&self, other: &Value) -> Result<Value, EvalError> {
        match (self, other) {
            (Value::Str(_) | Value::Safe(_) | Value::List(_), _) if other.as_int().is_some() => {
                self.repeat(other.as_int().unwrap_or(0))
            }
            (_, Value::Str(_) | Value::Safe(_) | Value::List(_)) if self.as_int().is_some() => {
                other.repeat(self.as_int().unwrap_or(0))
            }
            _ => self.arithmetic(other, "*", i64::checked_mul, |a, b| a * b),
        }
    }

    fn repeat(&self, times: i64) -> Result<Value, EvalError> {
        let times = usize::try_from(times).unwrap_or(0);
        let len = match self {
            Value::Str(s) | Value::Safe(s) => s.len(),
            Value::List(items) => items.len(),
            _ => 0,
        };
        match len.checked_mul(times) {
            Some(total) if total <= MAX_SEQUENCE_LEN => {}
            _ => return Err(EvalError::Overflow),
        }
        match self {
            Value::Str(s) => Ok(Value::Str(s.repeat(times))),
            Value::Safe(s) => Ok(Value::Safe(s.repeat(times))),
            Value::List(items) => {
                let mut out = Vec::with_capacity(len * times);
                for _ in 0..times {
                    out.extend(items.iter().cloned());
                }
                Ok(Value::List(out))
            }
            other => Err(EvalError::type_mismatch(format!(
                "cannot repeat '{}'",
                other.type_name()
            ))),
        }
    }

    /// True division, always a float
    pub fn div(&self, other: &Value) -> Result<Value, EvalError> {
        let (a, b) = self.numbers(other, "/")?;
        if b.to_f64() == 0.0 {
            return Err(EvalError::DivisionByZero);
        }
        Ok(Value::Float(a.to_f64() / b.to_f64()))
    }

    /// Floor division, rounding toward negative infinity
    pub fn floor_div(&self, other: &Value) -> Result<Value, EvalError> {
        match self.numbers(other, "//")? {
            (Number::Int(_), Number::Int(0)) => Err(EvalError::DivisionByZero),
            (Number::Int(a), Number::Int(b)) => {
                let q = a.checked_div(b).ok_or(EvalError::Overflow)?;
                if a % b != 0 && ((a < 0) != (b < 0)) {
                    Ok(Value::Int(q - 1))
                } else {
                    Ok(Value::Int(q))
                }
            }
            (a, b) => {
                if b.to_f64() == 0.0 {
                    return Err(EvalError::DivisionByZero);
                }
                Ok(Value::Float((a.to_f64() / b.to_f64()).floor()))
            }
        }
    }

    /// Modulo with the sign of the divisor
    pub fn rem(&self, other: &Value) -> Result<Value, EvalError> {
        match self.numbers(other, "%")? {
            (Number::Int(_), Number::Int(0)) => Err(EvalError::DivisionByZero),
            (Number::Int(a), Number::Int(b)) => {
                let r = a.checked_rem(b).ok_or(EvalError::Overflow)?;
                if r != 0 && ((r < 0) != (b < 0)) {
                    Ok(Value::Int(r + b))
                } else {
                    Ok(Value::Int(r))
                }
            }
            (a, b) => {
                let (a, b) = (a.to_f64(), b.to_f64());
                if b == 0.0 {
                    return Err(EvalError::DivisionByZero);
                }
                let r = a % b;
                if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
                    Ok(Value::Float(r + b))
                } else {
                    Ok(Value::Float(r))
                }
            }
        }
    }

    pub fn pow(&self, other: &Value) -> Result<Value, EvalError> {
        match self.numbers(other, "**")? {
            (Number::Int(a), Number::Int(b)) if b >= 0 => {
                let exp = u32::try_from(b).map_err(|_| EvalError::Overflow)?;
                a.checked_pow(exp).map(Value::Int).ok_or(EvalError::Overflow)
            }
            (a, b) => {
                if a.to_f64() == 0.0 && b.to_f64() < 0.0 {
                    return Err(EvalError::DivisionByZero);
                }
                Ok(Value::Float(a.to_f64().powf(b.to_f64())))
            }
        }
    }

    pub fn neg(&self) -> Result<Value, EvalError> {
        match self.as_number() {
            Some(Number::Int(n)) => n.checked_neg().map(Value::Int).ok_or(EvalError::Overflow),
            Some(Number::Float(x)) => Ok(Value::Float(-x)),
            None => Err(EvalError::type_mismatch(format!(
                "bad operand type for unary -: '{}'",
                self.type_name()
            ))),
        }
    }

    pub fn pos(&self) -> Result<Value, EvalError> {
        match self.as_number() {
            Some(Number::Int(n)) => Ok(Value::Int(n)),
            Some(Number::Float(x)) => Ok(Value::Float(x)),
            None => Err(EvalError::type_mismatch(format!(
                "bad operand type for unary +: '{}'",
                self.type_name()
            ))),
        }
    }

    /// `item in self`
    pub fn contains(&self, item: &Value) -> Result<bool, EvalError> {
        match self {
            Value::Str(s) | Value::Safe(s) => match item.as_str() {
                Some(needle) => Ok(s.contains(needle)),
                None => Err(EvalError::type_mismatch(format!(
                    "'in <string>' requires string as left operand, not {}",
                    item.type_name()
                ))),
            },
            Value::List(items) => Ok(items.iter().any(|v| v.equals(item))),
            Value::Map(map) => Ok(item.as_str().map_or(false, |k| map.contains_key(k))),
            other => Err(EvalError::type_mismatch(format!(
                "argument of type '{}' is not iterable",
                other.type_name()
            ))),
        }
    }

    /// `self[index]`
    pub fn index(&self, index: &Value) -> Result<Value, EvalError> {
        match self {
            Value::List(items) => {
                let i = resolve_index(index, items.len())?;
                Ok(items[i].clone())
            }
            Value::Str(s) | Value::Safe(s) => {
                let chars: Vec<char> = s.chars().collect();
                let i = resolve_index(index, chars.len())?;
                Ok(Value::Str(chars[i].to_string()))
            }
            Value::Map(map) => {
                let key = index.as_str().ok_or_else(|| {
                    EvalError::type_mismatch(format!(
                        "dict keys are strings, not '{}'",
                        index.type_name()
                    ))
                })?;
                map.get(key)
                    .cloned()
                    .ok_or_else(|| EvalError::MissingKey(key.to_string()))
            }
            other => Err(EvalError::type_mismatch(format!(
                "'{}' object is not subscriptable",
                other.type_name()
            ))),
        }
    }

    /// `self.name` looks up a dict key
    pub fn attribute(&self, name: &str) -> Result<Value, EvalError> {
        match self {
            Value::Map(map) => map
                .get(name)
                .cloned()
                .ok_or_else(|| EvalError::MissingKey(name.to_string())),
            other => Err(EvalError::type_mismatch(format!(
                "'{}' object has no attribute '{}'",
                other.type_name(),
                name
            ))),
        }
    }

    fn numbers(&self, other: &Value, op: &str) -> Result<(Number, Number), EvalError> {
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err(self.unsupported(other, op)),
        }
    }

    fn arithmetic(
        &self,
        other: &Value,
        op: &str,
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
    ) -> Result<Value, EvalError> {
        match self.numbers(other, op)? {
            (Number::Int(a), Number::Int(b)) => {
                int_op(a, b).map(Value::Int).ok_or(EvalError::Overflow)
            }
            (a, b) => Ok(Value::Float(float_op(a.to_f64(), b.to_f64()))),
        }
    }

    fn unsupported(&self, other: &Value, op: &str) -> EvalError {
        EvalError::type_mismatch(format!(
            "unsupported operand type(s) for {}: '{}' and '{}'",
            op,
            self.type_name(),
            other.type_name()
        ))
    }
}

fn resolve_index(index: &Value, len: usize) -> Result<usize, EvalError> {
    let i = index.as_int().ok_or_else(|| {
        EvalError::type_mismatch(format!(
            "indices must be integers, not '{}'",
            index.type_name()
        ))
    })?;
    let resolved = if i < 0 { i + len as i64 } else { i };
    if resolved < 0 || resolved >= len as i64 {
        return Err(EvalError::IndexOutOfRange { index: i, len });
    }
    Ok(resolved as usize)
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

fn format_float(x: f64) -> String {
    if x.is_nan() {
        "nan".to_string()
    } else if x.is_infinite() {
        if x > 0.0 { "inf" } else { "-inf" }.to_string()
    } else {
        format!("{:?}", x)
    }
}

/// Output text of a value
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", format_float(*x)),
            Value::Str(s) | Value::Safe(s) => write!(f, "{}", s),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(Value::repr).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Value::Map(map) => {
                let parts: Vec<String> = map
                    .iter()
                    .map(|(k, v)| format!("{}: {}", quote(k), v.repr()))
                    .collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::None, Into::into)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Map(map)
    }
}
