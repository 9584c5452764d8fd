use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde_json::{Number, Value};

use crate::errors::ExprError;
use crate::parser::{BinaryOp, Expr, LogicalOp, UnaryOp};

/// Variable bound to the record fragment being declared.
pub const SELF_BINDING: &str = "this";

/// Names visible to an expression.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'s> {
    bindings: &'s BTreeMap<String, Value>,
    this: &'s Value,
}

impl<'s> Scope<'s> {
    pub fn new(bindings: &'s BTreeMap<String, Value>, this: &'s Value) -> Self {
        Self { bindings, this }
    }

    fn lookup(&self, name: &str) -> Result<&'s Value, ExprError> {
        if name == SELF_BINDING {
            return Ok(self.this);
        }
        self.bindings
            .get(name)
            .ok_or_else(|| ExprError::UnknownIdentifier(name.to_string()))
    }
}

/// Evaluate a parsed expression against `scope`.
pub fn evaluate(expr: &Expr, scope: &Scope<'_>) -> Result<Value, ExprError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Array(items) => items
            .iter()
            .map(|item| evaluate(item, scope))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Expr::Ident(_) | Expr::Member(..) | Expr::Index(..) => {
            access(expr, scope).map(Cow::into_owned)
        }
        Expr::Call(name, args) => {
            let args = args
                .iter()
                .map(|arg| evaluate(arg, scope))
                .collect::<Result<Vec<_>, _>>()?;
            call(name, &args)
        }
        Expr::Unary(op, operand) => {
            let operand = evaluate(operand, scope)?;
            match op {
                UnaryOp::Not => Ok(Value::Bool(!truthy(&operand))),
                UnaryOp::Neg => match as_num(&operand) {
                    Some(Num::Int(value)) => match value.checked_neg() {
                        Some(negated) => Ok(Value::from(negated)),
                        None => float_value(-(value as f64)),
                    },
                    Some(Num::Float(value)) => float_value(-value),
                    None => Err(ExprError::Type(format!("cannot negate {}", kind(&operand)))),
                },
            }
        }
        Expr::Logical(op, left, right) => {
            let left = evaluate(left, scope)?;
            match (op, truthy(&left)) {
                (LogicalOp::And, false) | (LogicalOp::Or, true) => Ok(left),
                _ => evaluate(right, scope),
            }
        }
        Expr::Conditional(condition, when_true, when_false) => {
            if truthy(&evaluate(condition, scope)?) {
                evaluate(when_true, scope)
            } else {
                evaluate(when_false, scope)
            }
        }
        Expr::Binary(op, left, right) => {
            let left = evaluate(left, scope)?;
            let right = evaluate(right, scope)?;
            binary(*op, &left, &right)
        }
    }
}

static NULL: Value = Value::Null;

/// Evaluate a name or a member/index path, borrowing from the scope where
/// possible so only the final value is copied.
fn access<'s>(expr: &Expr, scope: &Scope<'s>) -> Result<Cow<'s, Value>, ExprError> {
    match expr {
        Expr::Ident(name) => scope.lookup(name).map(Cow::Borrowed),
        Expr::Member(target, property) => match access(target, scope)? {
            Cow::Borrowed(target) => member(target, property),
            Cow::Owned(target) => {
                member(&target, property).map(|value| Cow::Owned(value.into_owned()))
            }
        },
        Expr::Index(target, index) => {
            let target = access(target, scope)?;
            let index = evaluate(index, scope)?;
            match target {
                Cow::Borrowed(target) => index_into(target, &index),
                Cow::Owned(target) => {
                    index_into(&target, &index).map(|value| Cow::Owned(value.into_owned()))
                }
            }
        }
        other => evaluate(other, scope).map(Cow::Owned),
    }
}

fn member<'v>(target: &'v Value, property: &str) -> Result<Cow<'v, Value>, ExprError> {
    match target {
        Value::Object(object) => Ok(Cow::Borrowed(object.get(property).unwrap_or(&NULL))),
        Value::Array(items) if property == "length" => Ok(Cow::Owned(Value::from(items.len()))),
        Value::Array(items) => Ok(Cow::Borrowed(
            property
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get(index))
                .unwrap_or(&NULL),
        )),
        Value::String(text) if property == "length" => {
            Ok(Cow::Owned(Value::from(text.chars().count())))
        }
        other => Err(ExprError::Type(format!(
            "cannot read property '{property}' of {}",
            kind(other)
        ))),
    }
}

fn index_into<'v>(target: &'v Value, index: &Value) -> Result<Cow<'v, Value>, ExprError> {
    match (target, index) {
        (Value::Object(_), Value::String(key)) => member(target, key),
        (Value::Array(items), Value::Number(number)) => Ok(Cow::Borrowed(
            number
                .as_u64()
                .and_then(|index| usize::try_from(index).ok())
                .and_then(|index| items.get(index))
                .unwrap_or(&NULL),
        )),
        (target, index) => Err(ExprError::Type(format!(
            "cannot index {} with {}",
            kind(target),
            kind(index)
        ))),
    }
}

fn call(name: &str, args: &[Value]) -> Result<Value, ExprError> {
    match name {
        "upper" => string_arg(name, args).map(|text| Value::String(text.to_uppercase())),
        "lower" => string_arg(name, args).map(|text| Value::String(text.to_lowercase())),
        "trim" => string_arg(name, args).map(|text| Value::String(text.trim().to_string())),
        "len" => match single_arg(name, args)? {
            Value::String(text) => Ok(Value::from(text.chars().count())),
            Value::Array(items) => Ok(Value::from(items.len())),
            Value::Object(object) => Ok(Value::from(object.len())),
            other => Err(ExprError::Type(format!("len() of {}", kind(other)))),
        },
        "string" => single_arg(name, args).map(|value| Value::String(to_text(value))),
        "concat" => Ok(Value::String(args.iter().map(to_text).collect())),
        "now" => {
            expect_arity(name, args, 0)?;
            Ok(Value::String(chrono::Utc::now().to_rfc3339()))
        }
        _ => Err(ExprError::UnknownFunction(name.to_string())),
    }
}

fn expect_arity(name: &str, args: &[Value], expected: usize) -> Result<(), ExprError> {
    if args.len() != expected {
        return Err(ExprError::Arity {
            name: name.to_string(),
            expected: expected.to_string(),
            found: args.len(),
        });
    }
    Ok(())
}

fn single_arg<'a>(name: &str, args: &'a [Value]) -> Result<&'a Value, ExprError> {
    expect_arity(name, args, 1)?;
    Ok(&args[0])
}

fn string_arg<'a>(name: &str, args: &'a [Value]) -> Result<&'a str, ExprError> {
    single_arg(name, args)?
        .as_str()
        .ok_or_else(|| ExprError::Type(format!("{name}() expects a string")))
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, ExprError> {
    match op {
        BinaryOp::Add if left.is_string() || right.is_string() => {
            Ok(Value::String(format!("{}{}", to_text(left), to_text(right))))
        }
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            let (Some(lhs), Some(rhs)) = (as_num(left), as_num(right)) else {
                return Err(ExprError::Type(format!(
                    "cannot apply {op:?} to {} and {}",
                    kind(left),
                    kind(right)
                )));
            };
            arithmetic(op, lhs, rhs)
        }
        BinaryOp::Eq => Ok(Value::Bool(loose_equal(left, right))),
        BinaryOp::Ne => Ok(Value::Bool(!loose_equal(left, right))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = compare(left, right)?;
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn as_f64(self) -> f64 {
        match self {
            Num::Int(value) => value as f64,
            Num::Float(value) => value,
        }
    }
}

fn as_num(value: &Value) -> Option<Num> {
    value
        .as_i64()
        .map(Num::Int)
        .or_else(|| value.as_f64().map(Num::Float))
}

fn arithmetic(op: BinaryOp, lhs: Num, rhs: Num) -> Result<Value, ExprError> {
    if let (Num::Int(a), Num::Int(b)) = (lhs, rhs) {
        let exact = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            BinaryOp::Div if b == 0 => return Err(ExprError::DivisionByZero),
            BinaryOp::Div if a.checked_rem(b) == Some(0) => a.checked_div(b),
            BinaryOp::Div => None,
            BinaryOp::Rem if b == 0 => return Err(ExprError::DivisionByZero),
            BinaryOp::Rem => a.checked_rem(b),
            _ => None,
        };
        if let Some(value) = exact {
            return Ok(Value::from(value));
        }
    }

    let (a, b) = (lhs.as_f64(), rhs.as_f64());
    let value = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div | BinaryOp::Rem if b == 0.0 => return Err(ExprError::DivisionByZero),
        BinaryOp::Div => a / b,
        BinaryOp::Rem => a % b,
        _ => return Err(ExprError::Type(format!("{op:?} is not arithmetic"))),
    };
    float_value(value)
}

fn float_value(value: f64) -> Result<Value, ExprError> {
    Number::from_f64(value)
        .map(Value::Number)
        .ok_or(ExprError::NonFinite)
}

fn loose_equal(left: &Value, right: &Value) -> bool {
    match (as_num(left), as_num(right)) {
        (Some(Num::Int(a)), Some(Num::Int(b))) => a == b,
        (Some(a), Some(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

fn compare(left: &Value, right: &Value) -> Result<Ordering, ExprError> {
    if let (Some(a), Some(b)) = (as_num(left), as_num(right)) {
        return a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .ok_or(ExprError::NonFinite);
    }
    if let (Some(a), Some(b)) = (left.as_str(), right.as_str()) {
        return Ok(a.cmp(b));
    }
    Err(ExprError::Type(format!(
        "cannot compare {} with {}",
        kind(left),
        kind(right)
    )))
}

/// JavaScript-like truthiness.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|value| value != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Text form used by concatenation and `string()`.
pub fn to_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
