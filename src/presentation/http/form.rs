//! Extended url-encoded bodies.
//!
//! Bracket keys build nested objects and arrays:
//! `user[name]=a&tags[]=x&tags[]=y` becomes
//! `{"user":{"name":"a"},"tags":["x","y"]}`. Repeating a plain key turns
//! its value into an array.

use serde_json::{Map, Value};

/// Maximum number of bracket segments; the remainder becomes one literal key
pub const MAX_DEPTH: usize = 5;

#[derive(Debug, PartialEq, Eq)]
enum Segment {
    Key(String),
    Push,
}

fn parse_key(key: &str) -> Vec<Segment> {
    let literal = || vec![Segment::Key(key.to_owned())];

    let open = match key.find('[') {
        Some(0) | None => return literal(),
        Some(open) => open,
    };

    let (head, mut rest) = key.split_at(open);
    let mut segments = vec![Segment::Key(head.to_owned())];

    while let Some(inner) = rest.strip_prefix('[') {
        if segments.len() > MAX_DEPTH {
            segments.push(Segment::Key(rest.to_owned()));
            return segments;
        }
        let Some(close) = inner.find(']') else {
            return literal();
        };
        let name = &inner[..close];
        segments.push(if name.is_empty() {
            Segment::Push
        } else {
            Segment::Key(name.to_owned())
        });
        rest = &inner[close + 1..];
    }

    if rest.is_empty() {
        segments
    } else {
        literal()
    }
}

fn assign(slot: &mut Value, path: &[Segment], value: String) {
    match path.split_first() {
        None => match slot {
            Value::Null => *slot = Value::String(value),
            Value::Array(items) => items.push(Value::String(value)),
            Value::String(_) => {
                let previous = slot.take();
                *slot = Value::Array(vec![previous, Value::String(value)]);
            }
            // A scalar never overwrites a nested structure
            _ => {}
        },
        Some((Segment::Key(key), rest)) => {
            if slot.is_null() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(map) = slot {
                assign(map.entry(key.clone()).or_insert(Value::Null), rest, value);
            }
        }
        Some((Segment::Push, rest)) => {
            if slot.is_null() {
                *slot = Value::Array(Vec::new());
            }
            if let Value::Array(items) = slot {
                let mut child = Value::Null;
                assign(&mut child, rest, value);
                items.push(child);
            }
        }
    }
}

/// Build a JSON object from decoded url-encoded pairs
pub fn nest(pairs: Vec<(String, String)>) -> Value {
    let mut root = Value::Object(Map::new());
    for (key, value) in pairs {
        assign(&mut root, &parse_key(&key), value);
    }
    root
}
