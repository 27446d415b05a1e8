//! Template functions (global functions available in templates)

use minijinja::{Error, ErrorKind, Value};

/// Fail with a custom error message
///
/// Usage: {{ fail("Something went wrong") }}
pub fn fail(message: String) -> Result<Value, Error> {
    Err(Error::new(ErrorKind::InvalidOperation, message))
}

/// Create a dict from key-value pairs
///
/// Usage: {{ dict("key1", value1, "key2", value2) }}
pub fn dict(args: Vec<Value>) -> Result<Value, Error> {
    if args.len() % 2 != 0 {
        return Err(Error::new(
            ErrorKind::InvalidOperation,
            "dict requires an even number of arguments (key-value pairs)",
        ));
    }

    let mut map = serde_json::Map::new();
    for chunk in args.chunks(2) {
        let key = chunk[0]
            .as_str()
            .ok_or_else(|| Error::new(ErrorKind::InvalidOperation, "dict keys must be strings"))?;
        let value: serde_json::Value = serde_json::to_value(&chunk[1])
            .map_err(|e| Error::new(ErrorKind::InvalidOperation, e.to_string()))?;
        map.insert(key.to_string(), value);
    }

    Ok(Value::from_serialize(serde_json::Value::Object(map)))
}

/// Create a list from values
///
/// Usage: {{ list("a", "b", "c") }}
pub fn list(args: Vec<Value>) -> Value {
    Value::from(args)
}

/// Get a value with a default if undefined
///
/// Usage: {{ get(values, "key", "default") }}
pub fn get(obj: Value, key: String, default: Option<Value>) -> Value {
    match obj.get_attr(&key) {
        Ok(v) if !v.is_undefined() => v,
        _ => default.unwrap_or(Value::UNDEFINED),
    }
}

/// Return first non-empty value
///
/// Usage: {{ coalesce(a, b, c) }}
pub fn coalesce(args: Vec<Value>) -> Value {
    args.into_iter()
        .find(|arg| {
            !arg.is_undefined() && !arg.is_none() && !arg.as_str().is_some_and(str::is_empty)
        })
        .unwrap_or(Value::UNDEFINED)
}

/// Usage: {{ ternary(true_value, false_value, condition) }}
pub fn ternary(true_val: Value, false_val: Value, condition: Value) -> Value {
    if condition.is_true() { true_val } else { false_val }
}

/// Usage: {{ tostring(value) }}
pub fn tostring(value: Value) -> String {
    match value.as_str() {
        Some(s) => s.to_string(),
        None => value.to_string(),
    }
}

/// Printf-style formatting
///
/// Usage: {{ printf("%s-%d", name, count) }}
///
/// Supports `%s`, `%d`, `%v` and `%%`.
pub fn printf(format: String, args: Vec<Value>) -> Result<String, Error> {
    let mut result = String::with_capacity(format.len() + args.len() * 8);
    let mut chars = format.chars();
    let mut args = args.into_iter();

    while let Some(c) = chars.next() {
        if c != '%' {
            result.push(c);
            continue;
        }

        match chars.next() {
            Some('%') => result.push('%'),
            Some(spec @ ('s' | 'd' | 'v')) => {
                let arg = args.next().ok_or_else(|| {
                    Error::new(
                        ErrorKind::InvalidOperation,
                        format!("printf: missing argument for %{}", spec),
                    )
                })?;
                if spec == 'd' && arg.as_i64().is_none() {
                    return Err(Error::new(
                        ErrorKind::InvalidOperation,
                        format!("printf: %d expects an integer, got {}", arg),
                    ));
                }
                result.push_str(&tostring(arg));
            }
            Some(other) => {
                result.push('%');
                result.push(other);
            }
            None => result.push('%'),
        }
    }

    Ok(result)
}
