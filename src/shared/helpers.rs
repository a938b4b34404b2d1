//! String and identifier helpers.

use rand::Rng;

/// Upper-case the first character, leaving the rest untouched
pub fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Random decimal string of exactly `length` digits, never starting with `0`
pub fn generate_random_digits(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|position| {
            let digit = if position == 0 {
                rng.random_range(1..=9)
            } else {
                rng.random_range(0..=9)
            };
            char::from(b'0' + digit)
        })
        .collect()
}
