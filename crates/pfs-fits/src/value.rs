//! Keyword values: the part of a header card after the `= ` indicator.

use crate::error::{Error, Result};

/// A parsed FITS header value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// FITS logical value (`T` or `F`).
    Logical(bool),
    /// FITS integer value.
    Integer(i64),
    /// FITS floating-point value.
    Float(f64),
    /// FITS character string (content between single quotes, trailing
    /// blanks removed).
    String(String),
}

impl Value {
    /// Short name of the value kind, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Logical(_) => "logical",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
        }
    }
}

/// Parse the value field of a card (everything after `= `, or after the `=`
/// of a `HIERARCH` card).
///
/// Returns the value, if one is present, and the comment, if one is present.
/// An undefined value (blank before the `/`) yields `None` for the value.
pub fn parse_value(field: &str) -> (Option<Value>, Option<String>) {
    let text = field.trim_start();
    if text.starts_with('\'') {
        return parse_string(text);
    }

    let (val_text, comment) = match text.find('/') {
        Some(idx) => (&text[..idx], clean_comment(&text[idx + 1..])),
        None => (text, None),
    };
    let val_text = val_text.trim();
    if val_text.is_empty() {
        return (None, comment);
    }

    let value = match val_text {
        "T" => Some(Value::Logical(true)),
        "F" => Some(Value::Logical(false)),
        _ if looks_integral(val_text) => match val_text.parse::<i64>() {
            Ok(n) => Some(Value::Integer(n)),
            // Too wide for i64; keep it as a float rather than losing the card.
            Err(_) => parse_float_str(val_text).map(Value::Float),
        },
        _ => parse_float_str(val_text).map(Value::Float),
    };
    (value, comment)
}

fn looks_integral(text: &str) -> bool {
    !text.contains(['.', 'E', 'e', 'D', 'd'])
}

/// Parse a float, accepting the Fortran `D` exponent.
fn parse_float_str(s: &str) -> Option<f64> {
    s.replace(['D', 'd'], "E").parse::<f64>().ok()
}

fn clean_comment(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Parse a quoted string; `''` inside the quotes is a literal quote.
fn parse_string(text: &str) -> (Option<Value>, Option<String>) {
    let bytes = text.as_bytes();
    let mut value = String::new();
    let mut i = 1;
    while i < bytes.len() {
        if bytes[i] == b'\'' {
            if bytes.get(i + 1) == Some(&b'\'') {
                value.push('\'');
                i += 2;
                continue;
            }
            i += 1;
            break;
        }
        value.push(bytes[i] as char);
        i += 1;
    }

    let remainder = &text[i.min(text.len())..];
    let comment = remainder
        .find('/')
        .and_then(|idx| clean_comment(&remainder[idx + 1..]));
    let trimmed = value.trim_end().to_string();
    (Some(Value::String(trimmed)), comment)
}

/// Render a value as the text that follows the value indicator.
///
/// Floats use the shortest representation that reads back to the same
/// `f64`, always with a decimal point and an exponent. Non-finite floats and
/// non-printable string characters cannot be stored in a header.
pub fn format_value(keyword: &str, value: &Value) -> Result<String> {
    match value {
        Value::Logical(b) => Ok(String::from(if *b { "T" } else { "F" })),
        Value::Integer(n) => Ok(n.to_string()),
        Value::Float(f) => {
            if !f.is_finite() {
                return Err(Error::invalid_value(keyword, "non-finite float"));
            }
            Ok(format_float(*f))
        }
        Value::String(s) => format_string(keyword, s),
    }
}

fn format_float(f: f64) -> String {
    let s = format!("{f:E}");
    match s.split_once('E') {
        Some((mantissa, exponent)) if !mantissa.contains('.') => {
            format!("{mantissa}.0E{exponent}")
        }
        _ => s,
    }
}

fn format_string(keyword: &str, s: &str) -> Result<String> {
    let mut out = String::with_capacity(s.len() + 10);
    out.push('\'');
    for ch in s.chars() {
        if !(' '..='~').contains(&ch) {
            return Err(Error::invalid_value(
                keyword,
                format!("character {ch:?} is not printable ASCII"),
            ));
        }
        if ch == '\'' {
            out.push('\'');
        }
        out.push(ch);
    }
    // The standard asks for at least 8 characters between the quotes.
    while out.len() < 9 {
        out.push(' ');
    }
    out.push('\'');
    Ok(out)
}

/// Is a value fixed-format (numbers and logicals are right-justified to
/// column 30 on standard cards)?
pub(crate) fn is_fixed_format(value: &Value) -> bool {
    !matches!(value, Value::String(_))
}
