//! Sequential typed access to `##`-separated payload fields
//!
//! Every `next_*` call consumes one field, whether or not it parses. A call
//! returns `None` when the fields are exhausted, when the field is blank after
//! trimming, or when it does not parse as the requested type.

use super::FIELD_DELIMITER;
use tracing::trace;

pub struct PayloadReader<'a> {
    remaining: Option<&'a str>,
}

impl<'a> PayloadReader<'a> {
    pub fn new(payload: &'a str) -> Self {
        Self {
            remaining: (!payload.is_empty()).then_some(payload),
        }
    }

    /// Number of fields not yet consumed.
    pub fn fields_remaining(&self) -> usize {
        self.remaining
            .map(|rest| rest.matches(FIELD_DELIMITER).count() + 1)
            .unwrap_or(0)
    }

    pub fn next_i32(&mut self) -> Option<i32> {
        let field = self.next_field()?;
        integer_prefix(field).and_then(|v| i32::try_from(v).ok())
    }

    pub fn next_u32(&mut self) -> Option<u32> {
        let field = self.next_field()?;
        integer_prefix(field).and_then(|v| u32::try_from(v).ok())
    }

    pub fn next_f32(&mut self) -> Option<f32> {
        let field = self.next_field()?;
        float_prefix(field)
    }

    /// Accepts `true`/`1` and `false`/`0`, case-insensitively.
    pub fn next_bool(&mut self) -> Option<bool> {
        let field = self.next_field()?.to_ascii_lowercase();
        match field.as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        }
    }

    fn next_field(&mut self) -> Option<&'a str> {
        let rest = self.remaining?;
        let field = match rest.find(FIELD_DELIMITER) {
            Some(idx) => {
                let next = &rest[idx + FIELD_DELIMITER.len()..];
                self.remaining = (!next.is_empty()).then_some(next);
                &rest[..idx]
            }
            None => {
                self.remaining = None;
                rest
            }
        };

        let field = field.trim();
        if field.is_empty() {
            trace!("Skipping blank payload field");
            return None;
        }
        Some(field)
    }
}

// Leading sign and digits; "12abc" reads as 12, "abc" fails, and so do
// "00", "-0" and "0abc".
fn integer_prefix(field: &str) -> Option<i64> {
    let bytes = field.as_bytes();
    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == digits_start {
        return None;
    }
    let value: i64 = field[..end].parse().ok()?;
    // A zero result only counts when the field is literally "0"
    if value == 0 && field != "0" {
        return None;
    }
    Some(value)
}

// Longest numeric prefix that parses; fails when nothing was consumed.
fn float_prefix(field: &str) -> Option<f32> {
    if let Ok(value) = field.parse::<f32>() {
        return Some(value);
    }
    let candidate = field
        .bytes()
        .take_while(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'))
        .count();
    (1..=candidate)
        .rev()
        .find_map(|end| field[..end].parse::<f32>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_advances_past_failed_field() {
        let mut reader = PayloadReader::new("0##abc##1");
        assert_eq!(reader.next_i32(), Some(0));
        assert_eq!(reader.next_f32(), None);
        assert_eq!(reader.next_bool(), Some(true));
        assert_eq!(reader.next_bool(), None);
    }

    #[test]
    fn data_payload() {
        let mut reader = PayloadReader::new("0.25## -0.75 ##TRUE");
        assert_eq!(reader.fields_remaining(), 3);
        assert_eq!(reader.next_f32(), Some(0.25));
        assert_eq!(reader.next_f32(), Some(-0.75));
        assert_eq!(reader.next_bool(), Some(true));
        assert_eq!(reader.fields_remaining(), 0);
    }

    #[test]
    fn integers() {
        let mut reader = PayloadReader::new("-42##12abc##x1##4294967295##-1##99999999999");
        assert_eq!(reader.next_i32(), Some(-42));
        assert_eq!(reader.next_i32(), Some(12));
        assert_eq!(reader.next_i32(), None);
        assert_eq!(reader.next_u32(), Some(u32::MAX));
        assert_eq!(reader.next_u32(), None);
        assert_eq!(reader.next_i32(), None);
    }

    #[test]
    fn zero_only_from_literal_zero() {
        let mut reader = PayloadReader::new("0##00##-0##0abc##+0## 0 ");
        assert_eq!(reader.next_i32(), Some(0));
        assert_eq!(reader.next_i32(), None);
        assert_eq!(reader.next_i32(), None);
        assert_eq!(reader.next_u32(), None);
        assert_eq!(reader.next_u32(), None);
        assert_eq!(reader.next_u32(), Some(0));
    }

    #[test]
    fn floats_take_numeric_prefix() {
        let mut reader = PayloadReader::new("1.5abc##.5##1e2##-##nan");
        assert_eq!(reader.next_f32(), Some(1.5));
        assert_eq!(reader.next_f32(), Some(0.5));
        assert_eq!(reader.next_f32(), Some(100.0));
        assert_eq!(reader.next_f32(), None);
        assert!(reader.next_f32().is_some_and(f32::is_nan));
    }

    #[test]
    fn booleans() {
        let mut reader = PayloadReader::new("False##0##yes##1");
        assert_eq!(reader.next_bool(), Some(false));
        assert_eq!(reader.next_bool(), Some(false));
        assert_eq!(reader.next_bool(), None);
        assert_eq!(reader.next_bool(), Some(true));
    }

    #[test]
    fn blank_fields_fail() {
        let mut reader = PayloadReader::new("1####  ##2##");
        assert_eq!(reader.next_i32(), Some(1));
        assert_eq!(reader.next_i32(), None);
        assert_eq!(reader.next_i32(), None);
        assert_eq!(reader.next_i32(), Some(2));
        assert_eq!(reader.next_i32(), None);
    }
}
