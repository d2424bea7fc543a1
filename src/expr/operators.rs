//! The fixed operator table (§4.2).
//!
//! Each function implements one operator family's nil-safety contract
//! exactly as specified: comparisons return `false` on non-numeric
//! operands rather than propagating an error, arithmetic returns `null`,
//! date comparisons return `false` on unparseable operands, and
//! `some`/`all`/`none` have their own vacuous-truth rules on an empty
//! collection. `var` is handled directly by the resolver since it needs
//! access to definitions/derived state that the other operators don't.

use crate::expr::resolver::EvalContext;
use crate::value::{as_date, as_number, truthy, values_equal, Value};

/// Dispatches a non-`var` operator application.
pub fn apply(op: &str, arg: &Value, ctx: &mut EvalContext) -> Value {
    match op {
        "==" => eq(arg, ctx, false),
        "!=" => eq(arg, ctx, true),
        "<" => compare(arg, ctx, |a, b| a < b),
        "<=" => compare(arg, ctx, |a, b| a <= b),
        ">" => compare(arg, ctx, |a, b| a > b),
        ">=" => compare(arg, ctx, |a, b| a >= b),
        "and" => logical(arg, ctx, true),
        "or" => logical(arg, ctx, false),
        "not" | "!" => {
            let operand = single_arg(arg, ctx);
            Value::Bool(!truthy(&operand))
        }
        "if" => if_op(arg, ctx),
        "+" => arithmetic(arg, ctx, |a, b| a + b),
        "-" => arithmetic(arg, ctx, |a, b| a - b),
        "*" => arithmetic(arg, ctx, |a, b| a * b),
        "/" => divide(arg, ctx),
        "before" => date_compare(arg, ctx, |a, b| a < b),
        "after" => date_compare(arg, ctx, |a, b| a > b),
        "in" => in_op(arg, ctx),
        "some" => collection_op(arg, ctx, CollectionOp::Some),
        "all" => collection_op(arg, ctx, CollectionOp::All),
        "none" => collection_op(arg, ctx, CollectionOp::None),
        unknown => {
            ctx.warn(format!("unknown operator '{unknown}'"));
            Value::Null
        }
    }
}

/// Operator arguments are conventionally an array of sub-expressions;
/// a bare (non-array) value is treated as a single-element argument
/// list, which keeps genuinely-unary operators ergonomic.
fn sub_exprs(arg: &Value) -> Vec<&Value> {
    match arg {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

fn single_arg(arg: &Value, ctx: &mut EvalContext) -> Value {
    match sub_exprs(arg).first() {
        Some(expr) => ctx.eval(expr),
        None => Value::Null,
    }
}

fn eval_pair(arg: &Value, ctx: &mut EvalContext) -> (Value, Value) {
    let exprs = sub_exprs(arg);
    let a = exprs.first().map(|e| ctx.eval(e)).unwrap_or(Value::Null);
    let b = exprs.get(1).map(|e| ctx.eval(e)).unwrap_or(Value::Null);
    (a, b)
}

fn eq(arg: &Value, ctx: &mut EvalContext, negate: bool) -> Value {
    let (a, b) = eval_pair(arg, ctx);
    let equal = values_equal(&a, &b);
    Value::Bool(if negate { !equal } else { equal })
}

fn compare(arg: &Value, ctx: &mut EvalContext, f: impl Fn(f64, f64) -> bool) -> Value {
    let (a, b) = eval_pair(arg, ctx);
    match (as_number(&a), as_number(&b)) {
        (Some(x), Some(y)) => Value::Bool(f(x, y)),
        _ => Value::Bool(false),
    }
}

fn logical(arg: &Value, ctx: &mut EvalContext, is_and: bool) -> Value {
    for expr in sub_exprs(arg) {
        let value = ctx.eval(expr);
        let t = truthy(&value);
        if is_and && !t {
            return Value::Bool(false);
        }
        if !is_and && t {
            return Value::Bool(true);
        }
    }
    Value::Bool(is_and)
}

fn if_op(arg: &Value, ctx: &mut EvalContext) -> Value {
    let exprs = sub_exprs(arg);
    let mut i = 0;
    while i + 1 < exprs.len() {
        let cond = ctx.eval(exprs[i]);
        if truthy(&cond) {
            return ctx.eval(exprs[i + 1]);
        }
        i += 2;
    }
    // Odd trailing element is the else branch.
    if i < exprs.len() {
        return ctx.eval(exprs[i]);
    }
    Value::Null
}

fn arithmetic(arg: &Value, ctx: &mut EvalContext, f: impl Fn(f64, f64) -> f64) -> Value {
    let (a, b) = eval_pair(arg, ctx);
    match (as_number(&a), as_number(&b)) {
        (Some(x), Some(y)) => serde_json::Number::from_f64(f(x, y))
            .map(Value::Number)
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn divide(arg: &Value, ctx: &mut EvalContext) -> Value {
    let (a, b) = eval_pair(arg, ctx);
    match (as_number(&a), as_number(&b)) {
        (Some(_), Some(y)) if y == 0.0 => Value::Null,
        (Some(x), Some(y)) => serde_json::Number::from_f64(x / y)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn date_compare(arg: &Value, ctx: &mut EvalContext, f: impl Fn(Instant, Instant) -> bool) -> Value {
    let (a, b) = eval_pair(arg, ctx);
    match (as_date(&a), as_date(&b)) {
        (Some(x), Some(y)) => Value::Bool(f(x, y)),
        _ => Value::Bool(false),
    }
}

/// Alias so the date-comparison closure bound above reads cleanly.
type Instant = chrono::DateTime<chrono::Utc>;

fn in_op(arg: &Value, ctx: &mut EvalContext) -> Value {
    let (needle, haystack) = eval_pair(arg, ctx);
    match &haystack {
        Value::Array(items) => Value::Bool(items.iter().any(|item| values_equal(item, &needle))),
        Value::String(s) => match needle.as_str() {
            Some(n) => Value::Bool(s.contains(n)),
            None => Value::Bool(false),
        },
        _ => Value::Bool(false),
    }
}

enum CollectionOp {
    Some,
    All,
    None,
}

fn collection_op(arg: &Value, ctx: &mut EvalContext, kind: CollectionOp) -> Value {
    let exprs = sub_exprs(arg);
    let Some(array_expr) = exprs.first() else {
        return Value::Bool(matches!(kind, CollectionOp::All | CollectionOp::None));
    };
    let Some(predicate) = exprs.get(1) else {
        return Value::Bool(matches!(kind, CollectionOp::All | CollectionOp::None));
    };

    let collection = ctx.eval(array_expr);
    let items = match collection {
        Value::Array(items) => items,
        _ => Vec::new(),
    };

    if items.is_empty() {
        return Value::Bool(matches!(kind, CollectionOp::All | CollectionOp::None));
    }

    match kind {
        CollectionOp::Some => Value::Bool(
            items
                .into_iter()
                .any(|item| truthy(&ctx.eval_with_element(item, predicate))),
        ),
        CollectionOp::All => Value::Bool(
            items
                .into_iter()
                .all(|item| truthy(&ctx.eval_with_element(item, predicate))),
        ),
        CollectionOp::None => Value::Bool(
            !items
                .into_iter()
                .any(|item| truthy(&ctx.eval_with_element(item, predicate))),
        ),
    }
}
