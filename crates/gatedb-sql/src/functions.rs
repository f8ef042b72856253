//! The built-in scalar function catalog (§6.E).

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use gatedb_types::Value;

const NAMES: &[&str] = &[
    "UPPER", "LOWER", "LENGTH", "CHAR_LENGTH", "CONCAT", "SUBSTR", "REPLACE", "TRIM", "LEFT",
    "RIGHT", "REVERSE", "REPEAT", "LPAD", "RPAD", "POSITION", "STARTS_WITH", "ENDS_WITH", "ABS",
    "ROUND", "CEIL", "FLOOR", "POWER", "SQRT", "MOD", "SIGN", "LN", "EXP", "PI", "COALESCE",
    "IFNULL", "NULLIF", "IIF", "CAST", "TYPEOF", "GREATEST", "LEAST", "DATE", "TIME", "DATETIME",
    "CURRENT_DATE", "STRFTIME",
];

/// Whether `name` (case-insensitive) is a recognized built-in.
pub fn is_known(name: &str) -> bool {
    NAMES.iter().any(|n| n.eq_ignore_ascii_case(name))
}

/// Invoke a built-in by name with already-evaluated arguments. Returns
/// `None` only for `CAST`'s unsupported target types; every other
/// mismatch (wrong arity, wrong type) degrades to `Value::Null` per the
/// evaluator's general null-propagation stance (§4.I).
pub fn call(name: &str, args: &[Value]) -> Option<Value> {
    let upper = name.to_ascii_uppercase();
    Some(match upper.as_str() {
        "UPPER" => Value::String(text(args, 0)?.to_uppercase()),
        "LOWER" => Value::String(text(args, 0)?.to_lowercase()),
        "LENGTH" | "CHAR_LENGTH" => Value::Int(text(args, 0)?.chars().count() as i64),
        "CONCAT" => Value::String(args.iter().filter_map(|a| a.as_string()).collect::<Vec<_>>().join("")),
        "SUBSTR" => {
            let s = text(args, 0)?;
            let chars: Vec<char> = s.chars().collect();
            let start = (int(args, 1)? - 1).max(0) as usize;
            let len = args.get(2).and_then(Value::as_f64).map(|n| n as usize).unwrap_or(chars.len());
            if start >= chars.len() {
                Value::String(String::new())
            } else {
                let end = (start + len).min(chars.len());
                Value::String(chars[start..end].iter().collect())
            }
        }
        "REPLACE" => {
            let s = text(args, 0)?;
            let from = text(args, 1)?;
            let to = text(args, 2)?;
            Value::String(s.replace(&from, &to))
        }
        "TRIM" => Value::String(text(args, 0)?.trim().to_string()),
        "LEFT" => {
            let s = text(args, 0)?;
            let n = int(args, 1)?.max(0) as usize;
            Value::String(s.chars().take(n).collect())
        }
        "RIGHT" => {
            let s = text(args, 0)?;
            let n = int(args, 1)?.max(0) as usize;
            let chars: Vec<char> = s.chars().collect();
            let start = chars.len().saturating_sub(n);
            Value::String(chars[start..].iter().collect())
        }
        "REVERSE" => Value::String(text(args, 0)?.chars().rev().collect()),
        "REPEAT" => {
            let s = text(args, 0)?;
            let n = int(args, 1)?.max(0) as usize;
            Value::String(s.repeat(n))
        }
        "LPAD" => pad(args, true)?,
        "RPAD" => pad(args, false)?,
        "POSITION" => {
            let needle = text(args, 0)?;
            let haystack = text(args, 1)?;
            match haystack.find(&needle) {
                Some(byte_idx) => Value::Int(haystack[..byte_idx].chars().count() as i64 + 1),
                None => Value::Int(0),
            }
        }
        "STARTS_WITH" => Value::Bool(text(args, 0)?.starts_with(&text(args, 1)?)),
        "ENDS_WITH" => Value::Bool(text(args, 0)?.ends_with(&text(args, 1)?)),
        "ABS" => Value::Real(args.first()?.as_f64()?.abs()).normalize_if_whole(args.first()),
        "ROUND" => {
            let n = args.first()?.as_f64()?;
            let digits = args.get(1).and_then(Value::as_f64).unwrap_or(0.0) as i32;
            let factor = 10f64.powi(digits);
            let rounded = (n * factor).round() / factor;
            if digits <= 0 {
                Value::Int(rounded as i64)
            } else {
                Value::Real(rounded)
            }
        }
        "CEIL" => Value::Int(args.first()?.as_f64()?.ceil() as i64),
        "FLOOR" => Value::Int(args.first()?.as_f64()?.floor() as i64),
        "POWER" => Value::Real(args.first()?.as_f64()?.powf(args.get(1)?.as_f64()?)),
        "SQRT" => Value::Real(args.first()?.as_f64()?.sqrt()),
        "MOD" => {
            let b = args.get(1)?.as_f64()?;
            if b == 0.0 {
                return Some(Value::Null);
            }
            Value::Int((args.first()?.as_f64()? % b) as i64)
        }
        "SIGN" => Value::Int(args.first()?.as_f64()?.signum() as i64),
        "LN" => Value::Real(args.first()?.as_f64()?.ln()),
        "EXP" => Value::Real(args.first()?.as_f64()?.exp()),
        "PI" => Value::Real(std::f64::consts::PI),
        "COALESCE" => args.iter().find(|v| !v.is_null()).cloned().unwrap_or(Value::Null),
        "IFNULL" => {
            let a = args.first()?;
            if a.is_null() {
                args.get(1).cloned().unwrap_or(Value::Null)
            } else {
                a.clone()
            }
        }
        "NULLIF" => {
            let (a, b) = (args.first()?, args.get(1)?);
            if a == b {
                Value::Null
            } else {
                a.clone()
            }
        }
        "IIF" => {
            if matches!(args.first(), Some(Value::Bool(true))) {
                args.get(1).cloned().unwrap_or(Value::Null)
            } else {
                args.get(2).cloned().unwrap_or(Value::Null)
            }
        }
        "CAST" => {
            let target = text(args, 1)?;
            return cast(args.first()?, &target);
        }
        "TYPEOF" => Value::String(typeof_name(args.first()?).to_string()),
        "GREATEST" => args
            .iter()
            .filter(|v| !v.is_null())
            .max_by(|a, b| gatedb_types::compare_values(a, b))?
            .clone(),
        "LEAST" => args
            .iter()
            .filter(|v| !v.is_null())
            .min_by(|a, b| gatedb_types::compare_values(a, b))?
            .clone(),
        "DATE" => Value::String(date_part(args.first())),
        "TIME" => Value::String(time_part(args.first())),
        "DATETIME" => Value::String(datetime_part(args.first())),
        "CURRENT_DATE" => Value::String(Local::now().date_naive().format("%Y-%m-%d").to_string()),
        "STRFTIME" => {
            let fmt = text(args, 0)?;
            let date = datetime_part(args.get(1));
            let parsed = NaiveDateTime::parse_from_str(&date, "%Y-%m-%d %H:%M:%S")
                .or_else(|_| NaiveDate::parse_from_str(&date, "%Y-%m-%d").map(|d| d.and_hms_opt(0, 0, 0).unwrap()))
                .ok()?;
            Value::String(parsed.format(&strftime_to_chrono(&fmt)).to_string())
        }
        _ => return None,
    })
}

trait NormalizeExt {
    fn normalize_if_whole(self, original: Option<&Value>) -> Value;
}
impl NormalizeExt for Value {
    fn normalize_if_whole(self, original: Option<&Value>) -> Value {
        if matches!(original, Some(Value::Int(_))) {
            if let Value::Real(r) = self {
                return Value::Int(r as i64);
            }
        }
        self
    }
}

fn text(args: &[Value], i: usize) -> Option<String> {
    args.get(i)?.as_string()
}

fn int(args: &[Value], i: usize) -> Option<i64> {
    args.get(i)?.as_f64().map(|n| n as i64)
}

fn pad(args: &[Value], left: bool) -> Option<Value> {
    let s = text(args, 0)?;
    let target_len = int(args, 1)?.max(0) as usize;
    let fill = args.get(2).and_then(Value::as_string).unwrap_or_else(|| " ".to_string());
    let mut chars: Vec<char> = s.chars().collect();
    if chars.len() >= target_len || fill.is_empty() {
        chars.truncate(target_len);
        return Some(Value::String(chars.into_iter().collect()));
    }
    let fill_chars: Vec<char> = fill.chars().collect();
    let mut pad_str = Vec::new();
    while pad_str.len() < target_len - chars.len() {
        pad_str.extend(fill_chars.iter());
    }
    pad_str.truncate(target_len - chars.len());
    let result: Vec<char> = if left {
        pad_str.into_iter().chain(chars).collect()
    } else {
        chars.append(&mut pad_str);
        chars
    };
    Some(Value::String(result.into_iter().collect()))
}

fn typeof_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Int(_) => "integer",
        Value::Real(_) => "real",
        Value::String(_) => "text",
        Value::Seq(_) => "sequence",
        Value::Map(_) => "mapping",
    }
}

fn cast(v: &Value, target: &str) -> Option<Value> {
    match target.to_ascii_uppercase().as_str() {
        "INTEGER" | "INT" => Some(match v {
            Value::Int(_) => v.clone(),
            Value::Real(r) => Value::Int(*r as i64),
            Value::Bool(b) => Value::Int(if *b { 1 } else { 0 }),
            Value::String(s) => Value::Int(s.trim().parse().ok()?),
            Value::Null => Value::Null,
            _ => return None,
        }),
        "REAL" | "FLOAT" | "DOUBLE" => Some(match v {
            Value::Real(_) => v.clone(),
            Value::Int(i) => Value::Real(*i as f64),
            Value::String(s) => Value::Real(s.trim().parse().ok()?),
            Value::Null => Value::Null,
            _ => return None,
        }),
        "TEXT" => Some(v.as_string().map(Value::String).unwrap_or(Value::Null)),
        "BOOLEAN" | "BOOL" => Some(match v {
            Value::Bool(_) => v.clone(),
            Value::Int(i) => Value::Bool(*i != 0),
            Value::String(s) => Value::Bool(s.eq_ignore_ascii_case("true")),
            Value::Null => Value::Null,
            _ => return None,
        }),
        _ => Some(v.clone()),
    }
}

fn now_or(arg: Option<&Value>) -> Option<chrono::DateTime<Local>> {
    match arg.and_then(Value::as_string) {
        Some(s) if s.eq_ignore_ascii_case("now") => Some(Local::now()),
        Some(_) | None => None,
    }
}

fn date_part(arg: Option<&Value>) -> String {
    if let Some(now) = now_or(arg) {
        return now.date_naive().format("%Y-%m-%d").to_string();
    }
    match arg.and_then(Value::as_string) {
        Some(s) => s.split_whitespace().next().unwrap_or(&s).to_string(),
        None => Local::now().date_naive().format("%Y-%m-%d").to_string(),
    }
}

fn time_part(arg: Option<&Value>) -> String {
    if let Some(now) = now_or(arg) {
        return now.time().format("%H:%M:%S").to_string();
    }
    match arg.and_then(Value::as_string) {
        Some(s) => s.split_whitespace().nth(1).map(str::to_string).unwrap_or_else(|| "00:00:00".to_string()),
        None => NaiveTime::from_hms_opt(0, 0, 0).unwrap().format("%H:%M:%S").to_string(),
    }
}

fn datetime_part(arg: Option<&Value>) -> String {
    if let Some(now) = now_or(arg) {
        return now.naive_local().format("%Y-%m-%d %H:%M:%S").to_string();
    }
    match arg.and_then(Value::as_string) {
        Some(s) if s.contains(' ') => s,
        Some(s) => format!("{} 00:00:00", s),
        None => Local::now().naive_local().format("%Y-%m-%d %H:%M:%S").to_string(),
    }
}

fn strftime_to_chrono(fmt: &str) -> String {
    // SQLite-style `%Y-%m-%d` directives map 1:1 onto chrono's; this is
    // an identity pass kept as a named seam in case gatedb ever needs to
    // diverge from chrono's directive set.
    fmt.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_functions() {
        assert_eq!(call("UPPER", &[Value::String("abc".into())]), Some(Value::String("ABC".into())));
        assert_eq!(call("LENGTH", &[Value::String("abc".into())]), Some(Value::Int(3)));
        assert_eq!(
            call("SUBSTR", &[Value::String("hello".into()), Value::Int(2), Value::Int(3)]),
            Some(Value::String("ell".into()))
        );
        assert_eq!(call("REVERSE", &[Value::String("abc".into())]), Some(Value::String("cba".into())));
    }

    #[test]
    fn math_functions() {
        assert_eq!(call("ABS", &[Value::Int(-5)]), Some(Value::Int(5)));
        assert_eq!(call("CEIL", &[Value::Real(1.2)]), Some(Value::Int(2)));
        assert_eq!(call("ROUND", &[Value::Real(1.2345), Value::Int(2)]), Some(Value::Real(1.23)));
    }

    #[test]
    fn cast_string_to_integer() {
        assert_eq!(call("CAST", &[Value::String("42".into()), Value::String("INTEGER".into())]), Some(Value::Int(42)));
    }

    #[test]
    fn typeof_reports_tag() {
        assert_eq!(call("TYPEOF", &[Value::Int(1)]), Some(Value::String("integer".into())));
    }

    #[test]
    fn unknown_function_rejected_by_is_known() {
        assert!(!is_known("NOT_A_FUNCTION"));
        assert!(is_known("upper"));
    }
}
