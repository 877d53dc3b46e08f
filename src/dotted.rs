//! Dotted-path access into JSON objects (`a.b.c`)

use serde_json::{Map, Value};

fn segments(key: &str) -> Vec<&str> {
    key.split('.').collect()
}

fn child<'a>(value: &'a Value, seg: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(seg),
        Value::Array(items) => seg.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

/// Value at `key`, if every segment exists
pub fn get<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    let segs = segments(key);
    let (first, rest) = segs.split_first()?;
    rest.iter().try_fold(map.get(*first)?, |value, seg| child(value, seg))
}

/// Mutable value at `key`, if every segment exists
pub fn get_mut<'a>(map: &'a mut Map<String, Value>, key: &str) -> Option<&'a mut Value> {
    let segs = segments(key);
    let (first, rest) = segs.split_first()?;
    let mut current = map.get_mut(*first)?;
    for seg in rest {
        current = match current {
            Value::Object(inner) => inner.get_mut(*seg)?,
            Value::Array(items) => items.get_mut(seg.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Write `value` at `key`, creating missing intermediates.
///
/// Numeric segments index into existing arrays; an index one past the end
/// appends. Scalar intermediates are replaced by objects.
pub fn set(map: &mut Map<String, Value>, key: &str, value: Value) {
    set_in(map, &segments(key), value);
}

fn set_in(map: &mut Map<String, Value>, segs: &[&str], value: Value) {
    match segs {
        [] => {}
        [last] => {
            map.insert((*last).to_string(), value);
        }
        [head, rest @ ..] => {
            let entry = map
                .entry((*head).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            set_value(entry, rest, value);
        }
    }
}

fn set_value(target: &mut Value, segs: &[&str], value: Value) {
    let Some((head, rest)) = segs.split_first() else {
        *target = value;
        return;
    };

    if let Value::Array(items) = target {
        if let Ok(index) = head.parse::<usize>() {
            if index < items.len() {
                set_value(&mut items[index], rest, value);
                return;
            }
            if index == items.len() {
                let mut item = Value::Object(Map::new());
                set_value(&mut item, rest, value);
                items.push(item);
                return;
            }
        }
    }

    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(inner) = target {
        set_in(inner, segs, value);
    }
}

/// True if the last segment is present in its parent, whatever its value
pub fn has_own(map: &Map<String, Value>, key: &str) -> bool {
    match key.rsplit_once('.') {
        None => map.contains_key(key),
        Some((parent, last)) => match get(map, parent) {
            Some(Value::Object(inner)) => inner.contains_key(last),
            Some(Value::Array(items)) => last.parse::<usize>().is_ok_and(|i| i < items.len()),
            _ => false,
        },
    }
}

/// Remove `key`, keeping the order of the remaining siblings
pub fn remove(map: &mut Map<String, Value>, key: &str) -> Option<Value> {
    match key.rsplit_once('.') {
        None => map.shift_remove(key),
        Some((parent, last)) => match get_mut(map, parent)? {
            Value::Object(inner) => inner.shift_remove(last),
            Value::Array(items) => {
                let index = last.parse::<usize>().ok().filter(|i| *i < items.len())?;
                Some(items.remove(index))
            }
            _ => None,
        },
    }
}

/// Parse a CLI value: JSON when it parses, a plain string otherwise
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_set_creates_intermediates() {
        let mut map = Map::new();
        set(&mut map, "a.b.c.d", json!({"e": "f"}));
        assert_eq!(get(&map, "a.b.c.d.e"), Some(&json!("f")));
    }

    #[test]
    fn test_set_replaces_scalar_intermediate() {
        let mut map = object(json!({"a": "scalar"}));
        set(&mut map, "a.b", json!(1));
        assert_eq!(Value::Object(map), json!({"a": {"b": 1}}));
    }

    #[test]
    fn test_get_through_arrays() {
        let map = object(json!({"list": [{"name": "x"}]}));
        assert_eq!(get(&map, "list.0.name"), Some(&json!("x")));
        assert_eq!(get(&map, "list.1.name"), None);
    }

    #[test]
    fn test_set_through_arrays() {
        let mut map = object(json!({"list": [{"name": "x"}, {"name": "z"}]}));
        set(&mut map, "list.0.name", json!("y"));
        set(&mut map, "list.2.name", json!("w"));
        set(&mut map, "list.1", json!("plain"));

        assert_eq!(
            Value::Object(map),
            json!({"list": [{"name": "y"}, "plain", {"name": "w"}]})
        );
    }

    #[test]
    fn test_array_index_past_end_is_a_key() {
        let mut map = object(json!({"list": [1]}));
        set(&mut map, "list.5", json!(2));
        assert_eq!(Value::Object(map), json!({"list": {"5": 2}}));
    }

    #[test]
    fn test_has_own_and_remove_in_arrays() {
        let mut map = object(json!({"list": [null, "b", "c"]}));
        assert!(has_own(&map, "list.0"));
        assert!(!has_own(&map, "list.3"));

        assert_eq!(remove(&mut map, "list.1"), Some(json!("b")));
        assert_eq!(remove(&mut map, "list.9"), None);
        assert_eq!(Value::Object(map), json!({"list": [null, "c"]}));
    }

    #[test]
    fn test_has_own_sees_null() {
        let map = object(json!({"a": {"b": null}}));
        assert!(has_own(&map, "a.b"));
        assert!(!has_own(&map, "a.c"));
        assert!(!has_own(&map, "x.y"));
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut map = object(json!({"a": 1, "b": 2, "c": 3}));
        assert_eq!(remove(&mut map, "a"), Some(json!(1)));
        let keys: Vec<_> = map.keys().cloned().collect();
        assert_eq!(keys, vec!["b", "c"]);
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("true"), json!(true));
        assert_eq!(parse_value("[1,2]"), json!([1, 2]));
        assert_eq!(parse_value("bar"), json!("bar"));
    }
}
