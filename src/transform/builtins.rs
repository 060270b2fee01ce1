//! Built-in Transformations
//!
//! The fixed set every registry created with
//! [`TransformationRegistry::with_builtins`](super::TransformationRegistry::with_builtins)
//! starts from. Their output is visible in generated content, so the
//! semantics here are part of the template language.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Datelike;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use super::registry::{TransformCategory, Transformation};
use crate::error::TransformError;
use crate::value::{parse_date, parse_float, Value};

/// Characters left unescaped by URI component encoding.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

const DEFAULT_TRUNCATE_LENGTH: usize = 50;
const DEFAULT_JOIN_SEPARATOR: &str = ", ";
const DEFAULT_DATE_FORMAT: &str = "MM/DD/YYYY";

type TransformResult = Result<Value, TransformError>;

pub(crate) fn builtin_transformations() -> Vec<Transformation> {
    vec![
        Transformation::new("uppercase", "Uppercase", TransformCategory::String, uppercase)
            .with_description("Convert text to uppercase")
            .with_example("{{name|uppercase}}"),
        Transformation::new("lowercase", "Lowercase", TransformCategory::String, lowercase)
            .with_description("Convert text to lowercase")
            .with_example("{{email|lowercase}}"),
        Transformation::new("capitalize", "Capitalize", TransformCategory::String, capitalize)
            .with_description("Capitalize the first letter of each word")
            .with_example("{{name|capitalize}}"),
        Transformation::new("trim", "Trim", TransformCategory::String, trim)
            .with_description("Remove leading and trailing whitespace"),
        Transformation::new("truncate", "Truncate", TransformCategory::String, truncate)
            .with_description("Cut text to a maximum length, appending '...'")
            .with_example("{{description|truncate:100}}"),
        Transformation::new("round", "Round", TransformCategory::Number, round)
            .with_description("Round to a number of decimal places")
            .with_example("{{price|round:2}}"),
        Transformation::new("abs", "Absolute Value", TransformCategory::Number, abs)
            .with_description("Absolute value of a number"),
        Transformation::new("join", "Join", TransformCategory::Array, join)
            .with_description("Join array items with a separator")
            .with_example("{{tags|join:\" | \"}}"),
        Transformation::new("first", "First Item", TransformCategory::Array, first)
            .with_description("First item of an array"),
        Transformation::new("last", "Last Item", TransformCategory::Array, last)
            .with_description("Last item of an array"),
        Transformation::new("length", "Length", TransformCategory::Array, length)
            .with_description("Length of a string or array"),
        Transformation::new("dateFormat", "Format Date", TransformCategory::Date, date_format)
            .with_description("Format a date using MM, DD and YYYY tokens")
            .with_example("{{createdAt|dateFormat:YYYY-MM-DD}}"),
        Transformation::new("json", "To JSON", TransformCategory::Conversion, json)
            .with_description("Serialize the value as JSON"),
        Transformation::new("number", "To Number", TransformCategory::Conversion, number)
            .with_description("Convert the value to a number"),
        Transformation::new("string", "To String", TransformCategory::Conversion, string)
            .with_description("Convert the value to a string"),
        Transformation::new("default", "Default Value", TransformCategory::Utility, default_value)
            .with_description("Fallback when the value is empty or missing")
            .with_example("{{nickname|default:\"N/A\"}}"),
        Transformation::new("urlEncode", "URL Encode", TransformCategory::Utility, url_encode)
            .with_description("Percent-encode for use in a URL component"),
        Transformation::new("base64", "Base64 Encode", TransformCategory::Utility, base64_encode)
            .with_description("Encode the value as base64"),
    ]
}

/// Applies `f` to string values; everything else passes through.
fn map_string(value: &Value, f: impl FnOnce(&str) -> String) -> TransformResult {
    Ok(match value {
        Value::String(s) => Value::String(f(s)),
        other => other.clone(),
    })
}

fn usize_arg(
    transformation: &str,
    args: &[String],
    default: usize,
) -> Result<usize, TransformError> {
    match args.first() {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| TransformError::InvalidArgument {
            transformation: transformation.to_string(),
            argument: raw.clone(),
        }),
    }
}

fn uppercase(value: &Value, _args: &[String]) -> TransformResult {
    map_string(value, str::to_uppercase)
}

fn lowercase(value: &Value, _args: &[String]) -> TransformResult {
    map_string(value, str::to_lowercase)
}

fn capitalize(value: &Value, _args: &[String]) -> TransformResult {
    map_string(value, |s| {
        s.split(' ')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => {
                        let rest = chars.as_str().to_lowercase();
                        first.to_uppercase().chain(rest.chars()).collect()
                    }
                    None => String::new(),
                }
            })
            .collect::<Vec<String>>()
            .join(" ")
    })
}

fn trim(value: &Value, _args: &[String]) -> TransformResult {
    map_string(value, |s| s.trim().to_string())
}

/// Lengths are counted in Unicode scalar values, not UTF-16 units.
fn truncate(value: &Value, args: &[String]) -> TransformResult {
    let limit = usize_arg("truncate", args, DEFAULT_TRUNCATE_LENGTH)?;
    map_string(value, |s| {
        if s.chars().count() <= limit {
            s.to_string()
        } else {
            let mut cut: String = s.chars().take(limit).collect();
            cut.push_str("...");
            cut
        }
    })
}

fn round(value: &Value, args: &[String]) -> TransformResult {
    let places = match args.first() {
        None => 0,
        Some(raw) => raw
            .trim()
            .parse::<i32>()
            .map_err(|_| TransformError::InvalidArgument {
                transformation: "round".to_string(),
                argument: raw.clone(),
            })?,
    };
    let factor = 10f64.powi(places);
    let scaled = parse_float(value) * factor;
    let floor = scaled.floor();
    // Halves round toward positive infinity.
    let rounded = if scaled - floor >= 0.5 { floor + 1.0 } else { floor };
    Ok(Value::Number(rounded / factor))
}

fn abs(value: &Value, _args: &[String]) -> TransformResult {
    Ok(Value::Number(parse_float(value).abs()))
}

fn join(value: &Value, args: &[String]) -> TransformResult {
    let separator = args.first().map(String::as_str).unwrap_or(DEFAULT_JOIN_SEPARATOR);
    Ok(match value {
        Value::Array(items) => Value::String(
            items
                .iter()
                .map(|item| match item {
                    Value::Undefined | Value::Null => String::new(),
                    other => other.to_js_string(),
                })
                .collect::<Vec<_>>()
                .join(separator),
        ),
        other => Value::String(other.to_js_string()),
    })
}

fn first(value: &Value, _args: &[String]) -> TransformResult {
    Ok(match value {
        Value::Array(items) => items.first().cloned().unwrap_or_default(),
        other => other.clone(),
    })
}

fn last(value: &Value, _args: &[String]) -> TransformResult {
    Ok(match value {
        Value::Array(items) => items.last().cloned().unwrap_or_default(),
        other => other.clone(),
    })
}

/// String length in Unicode scalar values, so `"héllo"` and `"😀"` count
/// 5 and 1.
fn length(value: &Value, _args: &[String]) -> TransformResult {
    let len = match value {
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        _ => 0,
    };
    Ok(Value::Number(len as f64))
}

fn date_format(value: &Value, args: &[String]) -> TransformResult {
    let Some(date) = parse_date(value) else {
        return Ok(value.clone());
    };
    let format = args.first().map(String::as_str).unwrap_or(DEFAULT_DATE_FORMAT);
    let formatted = format
        .replace("YYYY", &date.year().to_string())
        .replace("MM", &format!("{:02}", date.month()))
        .replace("DD", &format!("{:02}", date.day()));
    Ok(Value::String(formatted))
}

fn json(value: &Value, _args: &[String]) -> TransformResult {
    if value.is_undefined() {
        return Ok(Value::Undefined);
    }
    Ok(Value::String(
        serde_json::to_string(value).unwrap_or_else(|_| value.to_js_string()),
    ))
}

fn number(value: &Value, _args: &[String]) -> TransformResult {
    Ok(Value::Number(value.to_number()))
}

fn string(value: &Value, _args: &[String]) -> TransformResult {
    Ok(Value::String(value.to_js_string()))
}

fn default_value(value: &Value, args: &[String]) -> TransformResult {
    let is_empty = match value {
        Value::Undefined | Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    };
    if is_empty {
        let fallback = args.first().cloned().unwrap_or_default();
        Ok(Value::String(fallback))
    } else {
        Ok(value.clone())
    }
}

fn url_encode(value: &Value, _args: &[String]) -> TransformResult {
    let text = value.to_js_string();
    Ok(Value::String(
        utf8_percent_encode(&text, URI_COMPONENT).to_string(),
    ))
}

/// Encodes the Latin-1 bytes of the string form; characters beyond U+00FF
/// cannot be represented and fail the transformation.
fn base64_encode(value: &Value, _args: &[String]) -> TransformResult {
    let text = value.to_js_string();
    let bytes = text
        .chars()
        .map(|c| u8::try_from(u32::from(c)))
        .collect::<Result<Vec<u8>, _>>()
        .map_err(|_| TransformError::InvalidInput {
            transformation: "base64".to_string(),
            reason: "string contains characters outside the Latin-1 range".to_string(),
        })?;
    Ok(Value::String(STANDARD.encode(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn s(text: &str) -> Value {
        Value::from(text)
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn test_case_conversion() {
        assert_eq!(uppercase(&s("Hello"), &[]).unwrap(), s("HELLO"));
        assert_eq!(lowercase(&s("HeLLo"), &[]).unwrap(), s("hello"));
        assert_eq!(uppercase(&Value::Number(1.0), &[]).unwrap(), Value::Number(1.0));
    }

    #[test]
    fn test_capitalize_words() {
        assert_eq!(capitalize(&s("hELLO wORLD"), &[]).unwrap(), s("Hello World"));
        assert_eq!(capitalize(&s("a  b"), &[]).unwrap(), s("A  B"));
        assert_eq!(capitalize(&s(""), &[]).unwrap(), s(""));
    }

    #[test]
    fn test_trim() {
        assert_eq!(trim(&s("  x y \n"), &[]).unwrap(), s("x y"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate(&s("hello"), &args(&["5"])).unwrap(), s("hello"));
        assert_eq!(truncate(&s("hello"), &args(&["3"])).unwrap(), s("hel..."));
        let long = "x".repeat(60);
        let out = truncate(&s(&long), &[]).unwrap();
        assert_eq!(out.as_str().unwrap().len(), 53);
        assert!(truncate(&s("hello"), &args(&["ten"])).is_err());
    }

    #[test]
    fn test_round_and_abs() {
        assert_eq!(round(&s("3.14159"), &args(&["2"])).unwrap(), Value::Number(3.14));
        assert_eq!(round(&Value::Number(2.5), &[]).unwrap(), Value::Number(3.0));
        assert_eq!(round(&Value::Number(-2.5), &[]).unwrap(), Value::Number(-2.0));
        assert_eq!(
            round(&Value::Number(0.49999999999999994), &[]).unwrap(),
            Value::Number(0.0)
        );
        assert_eq!(
            round(&Value::Number(9007199254740991.0), &[]).unwrap(),
            Value::Number(9007199254740991.0)
        );
        let Value::Number(n) = round(&s("not-a-number"), &args(&["2"])).unwrap() else {
            panic!("round must yield a number");
        };
        assert!(n.is_nan());
        assert_eq!(abs(&s("-4.5"), &[]).unwrap(), Value::Number(4.5));
    }

    #[test]
    fn test_array_transformations() {
        let list = Value::from(json!(["a", "b", null, 3]));
        assert_eq!(join(&list, &[]).unwrap(), s("a, b, , 3"));
        assert_eq!(join(&list, &args(&["-"])).unwrap(), s("a-b--3"));
        assert_eq!(join(&Value::Number(5.0), &[]).unwrap(), s("5"));
        assert_eq!(first(&list, &[]).unwrap(), s("a"));
        assert_eq!(last(&list, &[]).unwrap(), Value::Number(3.0));
        assert_eq!(first(&Value::Array(vec![]), &[]).unwrap(), Value::Undefined);
        assert_eq!(first(&s("abc"), &[]).unwrap(), s("abc"));
        assert_eq!(length(&list, &[]).unwrap(), Value::Number(4.0));
        assert_eq!(length(&s("héllo"), &[]).unwrap(), Value::Number(5.0));
        assert_eq!(length(&s("😀"), &[]).unwrap(), Value::Number(1.0));
        assert_eq!(length(&Value::Null, &[]).unwrap(), Value::Number(0.0));
    }

    #[test]
    fn test_date_format() {
        let date = Value::Date(Utc.with_ymd_and_hms(2024, 3, 7, 12, 0, 0).unwrap());
        assert_eq!(date_format(&date, &[]).unwrap(), s("03/07/2024"));
        assert_eq!(
            date_format(&s("2024-11-22"), &args(&["YYYY-MM-DD"])).unwrap(),
            s("2024-11-22")
        );
        assert_eq!(date_format(&s("not a date"), &[]).unwrap(), s("not a date"));
    }

    #[test]
    fn test_conversions() {
        assert_eq!(json(&s("hi"), &[]).unwrap(), s("\"hi\""));
        assert_eq!(json(&Value::from(json!({"a": [1]})), &[]).unwrap(), s(r#"{"a":[1]}"#));
        assert_eq!(json(&Value::Undefined, &[]).unwrap(), Value::Undefined);
        assert_eq!(number(&s("42"), &[]).unwrap(), Value::Number(42.0));
        assert_eq!(string(&Value::Bool(true), &[]).unwrap(), s("true"));
        assert_eq!(string(&Value::from(json!([1, 2])), &[]).unwrap(), s("1,2"));
    }

    #[test]
    fn test_default_value() {
        let fallback = args(&["N/A"]);
        assert_eq!(default_value(&Value::Undefined, &fallback).unwrap(), s("N/A"));
        assert_eq!(default_value(&Value::Null, &fallback).unwrap(), s("N/A"));
        assert_eq!(default_value(&s(""), &fallback).unwrap(), s("N/A"));
        assert_eq!(default_value(&Value::Number(0.0), &fallback).unwrap(), Value::Number(0.0));
        assert_eq!(default_value(&Value::Null, &[]).unwrap(), s(""));
    }

    #[test]
    fn test_url_encode() {
        assert_eq!(
            url_encode(&s("a b&c=d/é"), &[]).unwrap(),
            s("a%20b%26c%3Dd%2F%C3%A9")
        );
        assert_eq!(url_encode(&s("keep-_.!~*'()"), &[]).unwrap(), s("keep-_.!~*'()"));
    }

    #[test]
    fn test_base64() {
        assert_eq!(base64_encode(&s("hello"), &[]).unwrap(), s("aGVsbG8="));
        assert_eq!(base64_encode(&s("é"), &[]).unwrap(), s("6Q=="));
        assert!(base64_encode(&s("€"), &[]).is_err());
    }
}
