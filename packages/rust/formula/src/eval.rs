//! In-process evaluation of a parsed formula against a record.
//!
//! Evaluation never fails: absent fields read as blank and unparseable
//! dates simply do not match.

use chrono::{Datelike, NaiveDate};
use contentpipe_shared::Record;

use crate::parser::{CompareOp, Expr, Function};

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Value {
    fn truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0,
            Self::Text(s) => {
                let s = s.trim();
                !s.is_empty() && s != "0" && !s.eq_ignore_ascii_case("false")
            }
        }
    }

    fn text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Number(n) => format_number(*n),
            Self::Bool(true) => "1".into(),
            Self::Bool(false) => "0".into(),
        }
    }

    fn number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Evaluation context: the record plus the date `TODAY()` resolves to.
pub(crate) struct Context<'a> {
    pub record: &'a Record,
    pub today: NaiveDate,
}

pub(crate) fn matches(expr: &Expr, ctx: &Context<'_>) -> bool {
    eval(expr, ctx).truthy()
}

fn eval(expr: &Expr, ctx: &Context<'_>) -> Value {
    match expr {
        Expr::Field(name) => Value::Text(ctx.record.text(name)),
        Expr::Str(s) => Value::Text(s.clone()),
        Expr::Number(n) => Value::Number(n.parse().unwrap_or(0.0)),
        Expr::Compare(op, lhs, rhs) => {
            let equal = values_equal(&eval(lhs, ctx), &eval(rhs, ctx));
            Value::Bool(match op {
                CompareOp::Eq => equal,
                CompareOp::Ne => !equal,
            })
        }
        Expr::Call(function, args) => call(*function, args, ctx),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    let numeric = matches!(a, Value::Number(_) | Value::Bool(_))
        || matches!(b, Value::Number(_) | Value::Bool(_));
    if numeric {
        if let (Some(x), Some(y)) = (a.number(), b.number()) {
            return x == y;
        }
    }
    a.text() == b.text()
}

fn call(function: Function, args: &[Expr], ctx: &Context<'_>) -> Value {
    match function {
        Function::And => Value::Bool(args.iter().all(|a| matches(a, ctx))),
        Function::Or => Value::Bool(args.iter().any(|a| matches(a, ctx))),
        Function::Not => Value::Bool(!matches(&args[0], ctx)),
        Function::Blank => Value::Text(String::new()),
        Function::Today => Value::Text(ctx.today.format("%Y-%m-%d").to_string()),
        Function::DateStr => {
            let text = eval(&args[0], ctx).text();
            Value::Text(text.chars().take(10).collect())
        }
        Function::Find => {
            let needle = eval(&args[0], ctx).text();
            let haystack = eval(&args[1], ctx).text();
            if needle.is_empty() {
                return Value::Number(0.0);
            }
            let position = haystack
                .find(&needle)
                .map(|byte_idx| haystack[..byte_idx].chars().count() + 1)
                .unwrap_or(0);
            Value::Number(position as f64)
        }
        Function::IsSame => {
            let a = parse_date(&eval(&args[0], ctx).text());
            let b = parse_date(&eval(&args[1], ctx).text());
            let unit = eval(&args[2], ctx).text();
            let same = match (a, b) {
                (Some(a), Some(b)) => match unit.as_str() {
                    "day" => a == b,
                    "month" => a.year() == b.year() && a.month() == b.month(),
                    "year" => a.year() == b.year(),
                    _ => false,
                },
                _ => false,
            };
            Value::Bool(same)
        }
    }
}

/// Calendar date of an ISO 8601 date or datetime string.
fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let head: String = s.chars().take(10).collect();
    NaiveDate::parse_from_str(&head, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use contentpipe_shared::{FieldValue, Fields};

    use super::*;
    use crate::parser::parse;

    fn record(pairs: &[(&str, FieldValue)]) -> Record {
        let fields: Fields = pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
        Record::new("rec1", fields)
    }

    fn check(formula: &str, rec: &Record) -> bool {
        let today = NaiveDate::from_ymd_opt(2024, 12, 5).unwrap();
        matches(&parse(formula).unwrap(), &Context { record: rec, today })
    }

    #[test]
    fn absent_field_is_blank() {
        let rec = record(&[]);
        assert!(check("{html} = ''", &rec));
        assert!(check("{html} = BLANK()", &rec));
        assert!(!check("NOT({html} = '')", &rec));
        assert!(!check("{html}", &rec));
    }

    #[test]
    fn state_equality() {
        let rec = record(&[("state", "READY_TO_PUBLISH".into())]);
        assert!(check("{state} = 'READY_TO_PUBLISH'", &rec));
        assert!(check("{state} != 'INIT'", &rec));
        assert!(!check("AND({state} = 'READY_TO_PUBLISH', {wp_id} != '')", &rec));
        assert!(check("OR({state} = 'INIT', {state} = 'READY_TO_PUBLISH')", &rec));
    }

    #[test]
    fn find_in_list_field() {
        let rec = record(&[(
            "platform",
            FieldValue::List(vec!["MEDIUM".into(), "INSTAGRAM".into()]),
        )]);
        assert!(check("FIND('INSTAGRAM', {platform})", &rec));
        assert!(!check("FIND('WORDPRESS', {platform})", &rec));
        assert!(check("FIND('MEDIUM', {platform}) = 1", &rec));
    }

    #[test]
    fn same_day_as_today() {
        let rec = record(&[("publish_date", "2024-12-05T09:00:00.000Z".into())]);
        assert!(check("IS_SAME({publish_date}, TODAY(), 'day')", &rec));
        assert!(check("DATESTR({publish_date}) = '2024-12-05'", &rec));

        let other = record(&[("publish_date", "2024-12-04".into())]);
        assert!(!check("IS_SAME({publish_date}, TODAY(), 'day')", &other));
        assert!(check("IS_SAME({publish_date}, TODAY(), 'month')", &other));

        let garbage = record(&[("publish_date", "soon".into())]);
        assert!(!check("IS_SAME({publish_date}, TODAY(), 'day')", &garbage));
    }

    #[test]
    fn numeric_comparison() {
        let rec = record(&[("count", "3".into()), ("flag", "0".into())]);
        assert!(check("{count} = 3", &rec));
        assert!(check("{count} = 3.0", &rec));
        assert!(!check("{flag}", &rec));
    }
}
