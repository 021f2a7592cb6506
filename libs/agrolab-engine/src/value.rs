//! Values that cross the sandbox boundary.
//!
//! Plain data (numbers, strings, lists, string-keyed dicts) is copied across.
//! Anything else stays inside the worker and is addressed by an opaque handle,
//! so checks can keep calling methods on instances the submission created.

use serde_json::{json, Map, Number, Value};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum PyValue {
    None,
    Bool(bool),
    Int(i64),
    /// Integer outside the i64 range, kept as its decimal digits
    BigInt(String),
    Float(f64),
    Str(String),
    List(Vec<PyValue>),
    Dict(BTreeMap<String, PyValue>),
    Object { id: u64, type_name: String },
}

impl PyValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PyValue::Int(i) => Some(*i as f64),
            PyValue::BigInt(digits) => digits.parse().ok(),
            PyValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PyValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[PyValue]> {
        match self {
            PyValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&PyValue> {
        match self {
            PyValue::Dict(map) => map.get(key),
            _ => None,
        }
    }

    /// Python truthiness for the plain variants. Opaque objects count as true.
    pub fn truthy(&self) -> bool {
        match self {
            PyValue::None => false,
            PyValue::Bool(b) => *b,
            PyValue::Int(i) => *i != 0,
            PyValue::BigInt(_) => true,
            PyValue::Float(f) => *f != 0.0,
            PyValue::Str(s) => !s.is_empty(),
            PyValue::List(items) => !items.is_empty(),
            PyValue::Dict(map) => !map.is_empty(),
            PyValue::Object { .. } => true,
        }
    }

    /// Name of the Python type this value came from
    pub fn type_name(&self) -> &str {
        match self {
            PyValue::None => "NoneType",
            PyValue::Bool(_) => "bool",
            PyValue::Int(_) | PyValue::BigInt(_) => "int",
            PyValue::Float(_) => "float",
            PyValue::Str(_) => "str",
            PyValue::List(_) => "list",
            PyValue::Dict(_) => "dict",
            PyValue::Object { type_name, .. } => type_name,
        }
    }

    /// Equality with Python's numeric semantics (`1 == 1.0`, `True == 1`)
    pub fn loosely_equals(&self, other: &PyValue) -> bool {
        match (self, other) {
            (PyValue::List(a), PyValue::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loosely_equals(y))
            }
            (PyValue::Dict(a), PyValue::Dict(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|w| v.loosely_equals(w)))
            }
            (PyValue::BigInt(a), PyValue::BigInt(b)) => a == b,
            (PyValue::BigInt(_), PyValue::Int(_) | PyValue::Bool(_))
            | (PyValue::Int(_) | PyValue::Bool(_), PyValue::BigInt(_)) => false,
            _ => match (self.numeric(), other.numeric()) {
                (Some(a), Some(b)) => a == b,
                _ => self == other,
            },
        }
    }

    fn numeric(&self) -> Option<f64> {
        match self {
            PyValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            other => other.as_f64(),
        }
    }

    /// Tagged JSON understood by the worker harness
    pub fn to_wire(&self) -> Value {
        match self {
            PyValue::None => Value::Null,
            PyValue::Bool(b) => Value::Bool(*b),
            PyValue::Int(i) => Value::Number((*i).into()),
            PyValue::BigInt(digits) => json!({ "$int": digits }),
            PyValue::Float(f) => match Number::from_f64(*f) {
                Some(n) => Value::Number(n),
                None => json!({ "$float": non_finite_repr(*f) }),
            },
            PyValue::Str(s) => Value::String(s.clone()),
            PyValue::List(items) => Value::Array(items.iter().map(PyValue::to_wire).collect()),
            PyValue::Dict(map) => {
                let inner: Map<String, Value> =
                    map.iter().map(|(k, v)| (k.clone(), v.to_wire())).collect();
                json!({ "$dict": inner })
            }
            PyValue::Object { id, .. } => json!({ "$ref": id }),
        }
    }

    pub fn from_wire(raw: &Value) -> Result<PyValue, String> {
        match raw {
            Value::Null => Ok(PyValue::None),
            Value::Bool(b) => Ok(PyValue::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(PyValue::Int(i)),
                None => n
                    .as_f64()
                    .map(PyValue::Float)
                    .ok_or_else(|| format!("unrepresentable number {}", n)),
            },
            Value::String(s) => Ok(PyValue::Str(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(PyValue::from_wire)
                .collect::<Result<Vec<_>, _>>()
                .map(PyValue::List),
            Value::Object(map) => {
                if let Some(id) = map.get("$ref") {
                    let id = id.as_u64().ok_or("object handle must be an integer")?;
                    let type_name = map
                        .get("$type")
                        .and_then(Value::as_str)
                        .unwrap_or("object")
                        .to_string();
                    return Ok(PyValue::Object { id, type_name });
                }
                if let Some(inner) = map.get("$dict") {
                    let inner = inner.as_object().ok_or("$dict payload must be an object")?;
                    let mut out = BTreeMap::new();
                    for (k, v) in inner {
                        out.insert(k.clone(), PyValue::from_wire(v)?);
                    }
                    return Ok(PyValue::Dict(out));
                }
                if let Some(repr) = map.get("$float").and_then(Value::as_str) {
                    return parse_non_finite(repr).map(PyValue::Float);
                }
                if let Some(digits) = map.get("$int").and_then(Value::as_str) {
                    return parse_big_int(digits);
                }
                Err(format!("unrecognised value encoding: {}", raw))
            }
        }
    }
}

fn parse_big_int(digits: &str) -> Result<PyValue, String> {
    let magnitude = digits.strip_prefix('-').unwrap_or(digits);
    if magnitude.is_empty() || !magnitude.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("bad integer literal {}", digits));
    }
    match digits.parse::<i64>() {
        Ok(i) => Ok(PyValue::Int(i)),
        Err(_) => Ok(PyValue::BigInt(digits.to_string())),
    }
}

fn non_finite_repr(f: f64) -> &'static str {
    if f.is_nan() {
        "nan"
    } else if f > 0.0 {
        "inf"
    } else {
        "-inf"
    }
}

fn parse_non_finite(repr: &str) -> Result<f64, String> {
    match repr {
        "nan" => Ok(f64::NAN),
        "inf" => Ok(f64::INFINITY),
        "-inf" => Ok(f64::NEG_INFINITY),
        other => other
            .parse::<f64>()
            .map_err(|e| format!("bad float literal {}: {}", other, e)),
    }
}

/// Renders values the way Python's `repr` would, so messages read naturally to learners
impl fmt::Display for PyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PyValue::None => f.write_str("None"),
            PyValue::Bool(true) => f.write_str("True"),
            PyValue::Bool(false) => f.write_str("False"),
            PyValue::Int(i) => write!(f, "{}", i),
            PyValue::BigInt(digits) => f.write_str(digits),
            PyValue::Float(x) => write!(f, "{}", format_float(*x)),
            PyValue::Str(s) => write!(f, "'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            PyValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            PyValue::Dict(map) => {
                f.write_str("{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "'{}': {}", k, v)?;
                }
                f.write_str("}")
            }
            PyValue::Object { type_name, .. } => write!(f, "<{} object>", type_name),
        }
    }
}

pub(crate) fn format_float(x: f64) -> String {
    if x.is_nan() {
        "nan".to_string()
    } else if x.is_infinite() {
        non_finite_repr(x).to_string()
    } else if x.fract() == 0.0 && x.abs() < 1e16 {
        format!("{:.1}", x)
    } else {
        format!("{}", x)
    }
}

impl From<f64> for PyValue {
    fn from(x: f64) -> Self {
        PyValue::Float(x)
    }
}

impl From<i64> for PyValue {
    fn from(i: i64) -> Self {
        PyValue::Int(i)
    }
}

impl From<i32> for PyValue {
    fn from(i: i32) -> Self {
        PyValue::Int(i64::from(i))
    }
}

impl From<bool> for PyValue {
    fn from(b: bool) -> Self {
        PyValue::Bool(b)
    }
}

impl From<&str> for PyValue {
    fn from(s: &str) -> Self {
        PyValue::Str(s.to_string())
    }
}

impl From<String> for PyValue {
    fn from(s: String) -> Self {
        PyValue::Str(s)
    }
}

impl From<&PyValue> for PyValue {
    fn from(v: &PyValue) -> Self {
        v.clone()
    }
}

impl<T: Into<PyValue>> From<Vec<T>> for PyValue {
    fn from(items: Vec<T>) -> Self {
        PyValue::List(items.into_iter().map(Into::into).collect())
    }
}

/// Build an argument list: `args![5.0, 8.5, "Gliniasta"]`
#[macro_export]
macro_rules! args {
    () => { ::std::vec::Vec::<$crate::value::PyValue>::new() };
    ($($arg:expr),+ $(,)?) => {
        vec![$($crate::value::PyValue::from($arg)),+]
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_plain_values() {
        let raw = json!([null, true, 3, 42.5, "pole", { "$dict": { "laczny_plon": 58 } }]);
        let value = PyValue::from_wire(&raw).unwrap();
        let items = value.as_list().unwrap();
        assert_eq!(items[0], PyValue::None);
        assert_eq!(items[1], PyValue::Bool(true));
        assert_eq!(items[2], PyValue::Int(3));
        assert_eq!(items[3], PyValue::Float(42.5));
        assert_eq!(items[4], PyValue::Str("pole".to_string()));
        assert_eq!(items[5].get("laczny_plon"), Some(&PyValue::Int(58)));
    }

    #[test]
    fn test_decode_handles_and_special_floats() {
        let obj = PyValue::from_wire(&json!({ "$ref": 7, "$type": "PoleUprawne" })).unwrap();
        assert_eq!(
            obj,
            PyValue::Object { id: 7, type_name: "PoleUprawne".to_string() }
        );
        assert_eq!(obj.to_wire(), json!({ "$ref": 7 }));

        let inf = PyValue::from_wire(&json!({ "$float": "inf" })).unwrap();
        assert_eq!(inf, PyValue::Float(f64::INFINITY));
        let nan = PyValue::from_wire(&json!({ "$float": "nan" })).unwrap();
        assert!(nan.as_f64().unwrap().is_nan());

        let big = PyValue::from_wire(&json!({ "$int": "100000000000000000000" })).unwrap();
        assert_eq!(big.as_f64(), Some(1e20));
    }

    #[test]
    fn test_integers_beyond_i64_stay_integers() {
        let big = PyValue::from_wire(&json!({ "$int": "-100000000000000000000" })).unwrap();
        assert_eq!(big, PyValue::BigInt("-100000000000000000000".to_string()));
        assert_eq!(big.type_name(), "int");
        assert_eq!(big.to_string(), "-100000000000000000000");
        assert!(big.truthy());
        assert_eq!(big.to_wire(), json!({ "$int": "-100000000000000000000" }));

        let same = PyValue::BigInt("-100000000000000000000".to_string());
        assert!(big.loosely_equals(&same));
        assert!(big.loosely_equals(&PyValue::Float(-1e20)));
        assert!(!big.loosely_equals(&PyValue::Int(i64::MIN)));

        assert_eq!(
            PyValue::from_wire(&json!({ "$int": "42" })).unwrap(),
            PyValue::Int(42)
        );
        assert!(PyValue::from_wire(&json!({ "$int": "12x" })).is_err());
    }

    #[test]
    fn test_whole_floats_stay_floats() {
        let value = PyValue::from_wire(&json!(42.0)).unwrap();
        assert_eq!(value, PyValue::Float(42.0));
        assert_eq!(value.to_string(), "42.0");
    }

    #[test]
    fn test_unknown_encoding_is_an_error() {
        assert!(PyValue::from_wire(&json!({ "plain": 1 })).is_err());
    }

    #[test]
    fn test_python_style_display() {
        assert_eq!(PyValue::Int(0).to_string(), "0");
        assert_eq!(PyValue::Float(42.5).to_string(), "42.5");
        assert_eq!(PyValue::Bool(false).to_string(), "False");
        assert_eq!(PyValue::from("it's").to_string(), "'it\\'s'");
        assert_eq!(PyValue::from(vec![1, 2]).to_string(), "[1, 2]");
    }

    #[test]
    fn test_loose_numeric_equality() {
        assert!(PyValue::Int(58).loosely_equals(&PyValue::Float(58.0)));
        assert!(PyValue::Bool(true).loosely_equals(&PyValue::Int(1)));
        assert!(!PyValue::from("1").loosely_equals(&PyValue::Int(1)));
        assert!(PyValue::from(vec![1.0, 2.0]).loosely_equals(&PyValue::from(vec![1, 2])));
    }

    #[test]
    fn test_args_macro() {
        let args = args![5.0, 8.5, "Gliniasta"];
        assert_eq!(args.len(), 3);
        assert_eq!(args[2], PyValue::Str("Gliniasta".to_string()));
        assert!(args![].is_empty());
    }

    #[test]
    fn test_truthiness() {
        assert!(!PyValue::None.truthy());
        assert!(!PyValue::Float(0.0).truthy());
        assert!(PyValue::from("x").truthy());
        assert!(PyValue::Object { id: 1, type_name: "X".into() }.truthy());
    }
}
