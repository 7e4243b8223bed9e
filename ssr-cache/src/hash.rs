//! Deterministic 32-bit rolling hash (spec §4.7) plus the `generateKey`
//! construction spec §6 pins as `<component_path>:<code_hash>:<props_hash>`
//! (or, with no code, `<component_path>:<props_hash>`).

use serde_json::Value;

/// Fixed 32-bit rolling hash. Must stay stable across releases — it is
/// part of the cache-key format, not an implementation detail.
pub fn simple_hash(input: &str) -> u32 {
    let mut hash: u32 = 0;
    for byte in input.bytes() {
        hash = hash.wrapping_mul(31).wrapping_add(u32::from(byte));
    }
    hash
}

/// Base36, lowercase, no leading zero padding (`0` hashes to `"0"`).
pub fn to_base36(mut value: u32) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::new();
    while value > 0 {
        buf.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    buf.reverse();
    String::from_utf8(buf).unwrap()
}

/// Canonical JSON text for `value` with every object's keys sorted, so
/// `{"b":1,"a":2}` and `{"a":2,"b":1}` hash identically.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key).unwrap());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

/// `generateKey(component_path, props, code?)` (spec §4.7/§6).
pub fn generate_key(component_path: &str, props: &Value, code: Option<&str>) -> String {
    let props_hash = to_base36(simple_hash(&canonical_json(props)));
    match code {
        Some(code) => {
            let code_hash = to_base36(simple_hash(code));
            format!("{component_path}:{code_hash}:{props_hash}")
        }
        None => format!("{component_path}:{props_hash}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(simple_hash("hello"), simple_hash("hello"));
        assert_ne!(simple_hash("hello"), simple_hash("world"));
    }

    #[test]
    fn base36_round_trips_zero() {
        assert_eq!(to_base36(0), "0");
    }

    #[test]
    fn canonical_json_ignores_key_order() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(canonical_json(&a), canonical_json(&b));
    }

    #[test]
    fn generate_key_is_deterministic_and_order_independent() {
        let a = generate_key("/src/App.tsx", &json!({"b": 1, "a": 2}), Some("const x = 1;"));
        let b = generate_key("/src/App.tsx", &json!({"a": 2, "b": 1}), Some("const x = 1;"));
        assert_eq!(a, b);

        let without_code = generate_key("/src/App.tsx", &json!({}), None);
        assert!(!without_code.contains("::"));
        assert_eq!(without_code.matches(':').count(), 1);
    }
}
