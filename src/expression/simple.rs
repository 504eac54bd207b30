//! Bundled expression engine.
//!
//! A small tree-walking evaluator over [`parser::Expr`](super::parser::Expr).
//! Null propagates through arithmetic, comparison and `||`; `AND`/`OR` use
//! three-valued logic. Unknown functions, wrong arities and invalid literal
//! `regexp_match` patterns are compile errors; unknown fields are evaluation
//! errors.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use regex_lite::Regex;

use crate::types::Value;
use super::context::VAR_FEATURE;
use super::parser::{parse, BinaryOp, Expr, UnaryOp};
use super::{CompiledExpression, ExpressionContext, ExpressionEngine, ExpressionError};

/// Longest text `lpad` will produce.
pub const MAX_PAD_WIDTH: usize = 4096;

/// Function table: name, minimum and maximum argument count.
const FUNCTIONS: &[(&str, usize, usize)] = &[
    ("concat", 0, usize::MAX),
    ("upper", 1, 1),
    ("lower", 1, 1),
    ("length", 1, 1),
    ("coalesce", 1, usize::MAX),
    ("to_string", 1, 1),
    ("to_int", 1, 1),
    ("to_real", 1, 1),
    ("lpad", 3, 3),
    ("regexp_match", 2, 2),
    ("attribute", 1, 2),
];

/// The bundled expression engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleExpressionEngine;

impl SimpleExpressionEngine {
    /// Create the engine.
    pub fn new() -> Self {
        Self
    }
}

impl ExpressionEngine for SimpleExpressionEngine {
    fn compile(&self, text: &str) -> Result<Arc<dyn CompiledExpression>, ExpressionError> {
        let ast = parse(text)?;
        validate(&ast)?;
        let mut patterns = HashMap::new();
        collect_patterns(&ast, &mut patterns)?;
        Ok(Arc::new(SimpleExpression {
            source: text.to_string(),
            ast,
            patterns,
        }))
    }
}

/// Compiled form produced by [`SimpleExpressionEngine`].
#[derive(Debug, Clone)]
pub struct SimpleExpression {
    source: String,
    ast: Expr,
    /// Literal `regexp_match` patterns, compiled once.
    patterns: HashMap<String, Regex>,
}

impl CompiledExpression for SimpleExpression {
    fn evaluate(&self, context: &ExpressionContext<'_>) -> Result<Value, ExpressionError> {
        self.eval(&self.ast, context)
    }

    fn source(&self) -> &str {
        &self.source
    }
}

fn validate(expr: &Expr) -> Result<(), ExpressionError> {
    match expr {
        Expr::Literal(_) | Expr::Field(_) | Expr::Variable(_) => Ok(()),
        Expr::Unary { expr, .. } | Expr::IsNull { expr, .. } => validate(expr),
        Expr::Binary { left, right, .. } => {
            validate(left)?;
            validate(right)
        }
        Expr::Call { name, args } => {
            let (_, min, max) = FUNCTIONS
                .iter()
                .find(|(n, _, _)| n == name)
                .ok_or_else(|| ExpressionError::UnknownFunction(name.clone()))?;
            if args.len() < *min || args.len() > *max {
                let expected = if min == max {
                    min.to_string()
                } else if *max == usize::MAX {
                    format!("at least {}", min)
                } else {
                    format!("{} to {}", min, max)
                };
                return Err(ExpressionError::Arity { name: name.clone(), expected, got: args.len() });
            }
            args.iter().try_for_each(validate)
        }
    }
}

impl SimpleExpression {
    fn eval(&self, expr: &Expr, ctx: &ExpressionContext<'_>) -> Result<Value, ExpressionError> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Field(name) => field(name, ctx),
            Expr::Variable(name) => {
                if name == VAR_FEATURE {
                    return Err(ExpressionError::Type(
                        "$feature can only be used as the first argument of attribute()".to_string(),
                    ));
                }
                ctx.variable(name).ok_or_else(|| ExpressionError::UnknownVariable(name.clone()))
            }
            Expr::Unary { op, expr } => {
                let v = self.eval(expr, ctx)?;
                match (op, v) {
                    (_, Value::Null) => Ok(Value::Null),
                    (UnaryOp::Not, v) => Ok(Value::Bool(!v.is_truthy())),
                    (UnaryOp::Neg, Value::Int(i)) => i
                        .checked_neg()
                        .map(Value::Int)
                        .ok_or_else(|| ExpressionError::Eval("integer overflow".to_string())),
                    (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
                    (UnaryOp::Neg, v) => Err(ExpressionError::Type(format!("cannot negate {}", v.type_name()))),
                }
            }
            Expr::IsNull { expr, negated } => {
                let is_null = self.eval(expr, ctx)?.is_null();
                Ok(Value::Bool(is_null != *negated))
            }
            Expr::Binary { op: BinaryOp::And, left, right } => {
                let l = self.eval(left, ctx)?;
                if !l.is_null() && !l.is_truthy() {
                    return Ok(Value::Bool(false));
                }
                let r = self.eval(right, ctx)?;
                Ok(match (l.is_null(), r.is_null()) {
                    (_, false) if !r.is_truthy() => Value::Bool(false),
                    (true, _) | (_, true) => Value::Null,
                    _ => Value::Bool(true),
                })
            }
            Expr::Binary { op: BinaryOp::Or, left, right } => {
                let l = self.eval(left, ctx)?;
                if l.is_truthy() {
                    return Ok(Value::Bool(true));
                }
                let r = self.eval(right, ctx)?;
                Ok(match (l.is_null(), r.is_null()) {
                    (_, false) if r.is_truthy() => Value::Bool(true),
                    (true, _) | (_, true) => Value::Null,
                    _ => Value::Bool(false),
                })
            }
            Expr::Binary { op, left, right } => {
                let l = self.eval(left, ctx)?;
                let r = self.eval(right, ctx)?;
                binary(*op, l, r)
            }
            Expr::Call { name, args } => self.call(name, args, ctx),
        }
    }

    fn call(&self, name: &str, args: &[Expr], ctx: &ExpressionContext<'_>) -> Result<Value, ExpressionError> {
        if name == "attribute" {
            return self.attribute(args, ctx);
        }
        let values = args
            .iter()
            .map(|a| self.eval(a, ctx))
            .collect::<Result<Vec<_>, _>>()?;
        let text_fn = |f: fn(&str) -> Value| -> Result<Value, ExpressionError> {
            match &values[0] {
                Value::Null => Ok(Value::Null),
                v => Ok(f(&v.to_text())),
            }
        };
        match name {
            "concat" => Ok(Value::Text(values.iter().map(Value::to_text).collect())),
            "upper" => text_fn(|s| Value::Text(s.to_uppercase())),
            "lower" => text_fn(|s| Value::Text(s.to_lowercase())),
            "length" => text_fn(|s| Value::Int(s.chars().count() as i64)),
            "to_string" => text_fn(|s| Value::text(s)),
            "coalesce" => Ok(values.iter().find(|v| !v.is_null()).cloned().unwrap_or(Value::Null)),
            "to_int" => match &values[0] {
                Value::Null => Ok(Value::Null),
                v => v
                    .as_i64()
                    .map(Value::Int)
                    .ok_or_else(|| ExpressionError::Type(format!("cannot convert '{}' to integer", v))),
            },
            "to_real" => match &values[0] {
                Value::Null => Ok(Value::Null),
                v => v
                    .as_f64()
                    .map(Value::Float)
                    .ok_or_else(|| ExpressionError::Type(format!("cannot convert '{}' to real", v))),
            },
            "lpad" => {
                if values[0].is_null() {
                    return Ok(Value::Null);
                }
                let text = values[0].to_text();
                let width = values[1]
                    .as_i64()
                    .filter(|w| *w >= 0)
                    .ok_or_else(|| ExpressionError::Type("lpad width must be a non-negative integer".to_string()))?;
                let width = usize::try_from(width)
                    .ok()
                    .filter(|w| *w <= MAX_PAD_WIDTH)
                    .ok_or_else(|| {
                        ExpressionError::Eval(format!("lpad width {} exceeds the limit of {}", width, MAX_PAD_WIDTH))
                    })?;
                let fill = values[2].to_text().chars().next().unwrap_or(' ');
                let len = text.chars().count();
                if len >= width {
                    Ok(Value::Text(text.chars().take(width).collect()))
                } else {
                    Ok(Value::Text(std::iter::repeat(fill).take(width - len).chain(text.chars()).collect()))
                }
            }
            "regexp_match" => {
                if values[0].is_null() || values[1].is_null() {
                    return Ok(Value::Null);
                }
                let pattern = values[1].to_text();
                let subject = values[0].to_text();
                match self.patterns.get(&pattern) {
                    Some(re) => Ok(Value::Bool(re.is_match(&subject))),
                    None => Ok(Value::Bool(compile_pattern(&pattern)?.is_match(&subject))),
                }
            }
            other => Err(ExpressionError::UnknownFunction(other.to_string())),
        }
    }

    /// `attribute('field')` or `attribute($feature, 'field')`. A missing field is null.
    fn attribute(&self, args: &[Expr], ctx: &ExpressionContext<'_>) -> Result<Value, ExpressionError> {
        let name_arg = match args {
            [name] => name,
            [Expr::Variable(v), name] if v == VAR_FEATURE => name,
            [_, _] => {
                return Err(ExpressionError::Type(
                    "attribute() expects $feature as its first argument".to_string(),
                ))
            }
            _ => {
                return Err(ExpressionError::Arity {
                    name: "attribute".to_string(),
                    expected: "1 to 2".to_string(),
                    got: args.len(),
                })
            }
        };
        let feature = ctx.feature().ok_or(ExpressionError::NoFeature)?;
        let name = self.eval(name_arg, ctx)?.to_text();
        Ok(feature.attribute(&name).cloned().unwrap_or(Value::Null))
    }
}

/// Compile every `regexp_match` pattern given as a text literal.
fn collect_patterns(expr: &Expr, patterns: &mut HashMap<String, Regex>) -> Result<(), ExpressionError> {
    match expr {
        Expr::Literal(_) | Expr::Field(_) | Expr::Variable(_) => Ok(()),
        Expr::Unary { expr, .. } | Expr::IsNull { expr, .. } => collect_patterns(expr, patterns),
        Expr::Binary { left, right, .. } => {
            collect_patterns(left, patterns)?;
            collect_patterns(right, patterns)
        }
        Expr::Call { name, args } => {
            if name == "regexp_match" {
                if let Some(Expr::Literal(Value::Text(pattern))) = args.get(1) {
                    if !patterns.contains_key(pattern) {
                        patterns.insert(pattern.clone(), compile_pattern(pattern)?);
                    }
                }
            }
            args.iter().try_for_each(|a| collect_patterns(a, patterns))
        }
    }
}

fn compile_pattern(pattern: &str) -> Result<Regex, ExpressionError> {
    Regex::new(pattern).map_err(|e| ExpressionError::Eval(format!("invalid regular expression: {}", e)))
}

fn field(name: &str, ctx: &ExpressionContext<'_>) -> Result<Value, ExpressionError> {
    let feature = ctx.feature().ok_or(ExpressionError::NoFeature)?;
    feature
        .attribute(name)
        .cloned()
        .ok_or_else(|| ExpressionError::UnknownField(name.to_string()))
}

/// Comparison used by the comparison operators.
///
/// Text against text is lexical; if either side is a number and the other
/// converts to one, the comparison is numeric; otherwise the total order.
fn compare(l: &Value, r: &Value) -> Ordering {
    match (l, r) {
        (Value::Text(a), Value::Text(b)) => a.cmp(b),
        (Value::Int(_) | Value::Float(_), _) | (_, Value::Int(_) | Value::Float(_)) => {
            match (l.as_f64(), r.as_f64()) {
                (Some(a), Some(b)) => a.total_cmp(&b),
                _ => l.total_cmp(r),
            }
        }
        _ => l.total_cmp(r),
    }
}

fn numeric(v: &Value, op: BinaryOp) -> Result<Value, ExpressionError> {
    match v {
        Value::Int(_) | Value::Float(_) => Ok(v.clone()),
        Value::Text(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .or_else(|_| s.trim().parse::<f64>().map(Value::Float))
            .map_err(|_| ExpressionError::Type(format!("cannot convert '{}' to number for {:?}", s, op))),
        other => Err(ExpressionError::Type(format!("cannot apply {:?} to {}", op, other.type_name()))),
    }
}

fn binary(op: BinaryOp, l: Value, r: Value) -> Result<Value, ExpressionError> {
    if l.is_null() || r.is_null() {
        return Ok(Value::Null);
    }
    let cmp = |pred: fn(Ordering) -> bool| -> Result<Value, ExpressionError> {
        Ok(Value::Bool(pred(compare(&l, &r))))
    };
    match op {
        BinaryOp::Eq => cmp(|o| o == Ordering::Equal),
        BinaryOp::Ne => cmp(|o| o != Ordering::Equal),
        BinaryOp::Lt => cmp(|o| o == Ordering::Less),
        BinaryOp::Le => cmp(|o| o != Ordering::Greater),
        BinaryOp::Gt => cmp(|o| o == Ordering::Greater),
        BinaryOp::Ge => cmp(|o| o != Ordering::Less),
        BinaryOp::Concat => Ok(Value::Text(format!("{}{}", l.to_text(), r.to_text()))),
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            arithmetic(op, numeric(&l, op)?, numeric(&r, op)?)
        }
        // `eval` short-circuits these before reaching here.
        BinaryOp::And => Ok(Value::Bool(l.is_truthy() && r.is_truthy())),
        BinaryOp::Or => Ok(Value::Bool(l.is_truthy() || r.is_truthy())),
    }
}

fn arithmetic(op: BinaryOp, l: Value, r: Value) -> Result<Value, ExpressionError> {
    let overflow = || ExpressionError::Eval("integer overflow".to_string());
    if let (Value::Int(a), Value::Int(b)) = (&l, &r) {
        let (a, b) = (*a, *b);
        return match op {
            BinaryOp::Add => a.checked_add(b).map(Value::Int).ok_or_else(overflow),
            BinaryOp::Sub => a.checked_sub(b).map(Value::Int).ok_or_else(overflow),
            BinaryOp::Mul => a.checked_mul(b).map(Value::Int).ok_or_else(overflow),
            BinaryOp::Div if b == 0 => Ok(Value::Null),
            BinaryOp::Div if a.checked_rem(b) == Some(0) => a.checked_div(b).map(Value::Int).ok_or_else(overflow),
            BinaryOp::Div => Ok(Value::Float(a as f64 / b as f64)),
            BinaryOp::Mod if b == 0 => Ok(Value::Null),
            _ => a.checked_rem(b).map(Value::Int).ok_or_else(overflow),
        };
    }
    let (a, b) = match (l.as_f64(), r.as_f64()) {
        (Some(a), Some(b)) => (a, b),
        _ => return Err(ExpressionError::Type(format!("non-numeric operand for {:?}", op))),
    };
    Ok(match op {
        BinaryOp::Add => Value::Float(a + b),
        BinaryOp::Sub => Value::Float(a - b),
        BinaryOp::Mul => Value::Float(a * b),
        BinaryOp::Div | BinaryOp::Mod if b == 0.0 => Value::Null,
        BinaryOp::Div => Value::Float(a / b),
        _ => Value::Float(a % b),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Feature;

    fn eval_str(text: &str, ctx: &ExpressionContext<'_>) -> Result<Value, ExpressionError> {
        SimpleExpressionEngine::new().compile(text)?.evaluate(ctx)
    }

    fn city() -> Feature {
        Feature::new(9)
            .with_attribute("name", "Bergen")
            .with_attribute("pop", 285_000_i64)
            .with_attribute("area", 465.3)
            .with_attribute("note", Value::Null)
    }

    #[test]
    fn test_arithmetic_and_comparison() {
        let f = city();
        let ctx = ExpressionContext::new().with_feature(&f);
        assert_eq!(eval_str("pop / 1000 > 200", &ctx).unwrap(), Value::Bool(true));
        assert_eq!(eval_str("7 / 2", &ctx).unwrap(), Value::Float(3.5));
        assert_eq!(eval_str("6 / 2", &ctx).unwrap(), Value::Int(3));
        assert_eq!(eval_str("1 / 0", &ctx).unwrap(), Value::Null);
        assert_eq!(eval_str("-(2 + 3) * 2", &ctx).unwrap(), Value::Int(-10));
        assert_eq!(eval_str("'10' + 5", &ctx).unwrap(), Value::Int(15));
    }

    #[test]
    fn test_null_propagation_and_three_valued_logic() {
        let f = city();
        let ctx = ExpressionContext::new().with_feature(&f);
        assert_eq!(eval_str("note = 1", &ctx).unwrap(), Value::Null);
        assert_eq!(eval_str("note || 'x'", &ctx).unwrap(), Value::Null);
        assert_eq!(eval_str("note IS NULL", &ctx).unwrap(), Value::Bool(true));
        assert_eq!(eval_str("note = 1 OR pop > 0", &ctx).unwrap(), Value::Bool(true));
        assert_eq!(eval_str("note = 1 AND pop > 0", &ctx).unwrap(), Value::Null);
        assert_eq!(eval_str("note = 1 AND pop < 0", &ctx).unwrap(), Value::Bool(false));
        assert_eq!(eval_str("NOT (pop < 0)", &ctx).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_functions() {
        let f = city();
        let ctx = ExpressionContext::new().with_feature(&f).with_variable("page_number", 3_i64);
        assert_eq!(eval_str("concat('x_', name, note)", &ctx).unwrap(), Value::text("x_Bergen"));
        assert_eq!(eval_str("upper(name)", &ctx).unwrap(), Value::text("BERGEN"));
        assert_eq!(eval_str("length(name)", &ctx).unwrap(), Value::Int(6));
        assert_eq!(eval_str("coalesce(note, name)", &ctx).unwrap(), Value::text("Bergen"));
        assert_eq!(eval_str("lpad($page_number, 3, '0')", &ctx).unwrap(), Value::text("003"));
        assert_eq!(eval_str("to_int(area)", &ctx).unwrap(), Value::Int(465));
        assert_eq!(eval_str("regexp_match(name, '^B')", &ctx).unwrap(), Value::Bool(true));
        assert_eq!(eval_str("attribute($feature, 'name')", &ctx).unwrap(), Value::text("Bergen"));
        assert_eq!(eval_str("attribute('missing')", &ctx).unwrap(), Value::Null);
        assert_eq!(eval_str("'p' || @atlas_featurenumber", &ctx).unwrap(), Value::text("p3"));
        assert_eq!(eval_str("$id", &ctx).unwrap(), Value::Int(9));
    }

    #[test]
    fn test_compile_errors() {
        let engine = SimpleExpressionEngine::new();
        assert!(matches!(engine.compile("frobnicate(1)"), Err(ExpressionError::UnknownFunction(_))));
        assert!(matches!(engine.compile("upper(1, 2)"), Err(ExpressionError::Arity { .. })));
        assert!(matches!(engine.compile("name ="), Err(ExpressionError::Parse { .. })));
    }

    #[test]
    fn test_evaluation_errors() {
        let f = city();
        let ctx = ExpressionContext::new().with_feature(&f);
        assert_eq!(
            eval_str("concat('x_', bad_field)", &ctx).unwrap_err(),
            ExpressionError::UnknownField("bad_field".to_string())
        );
        assert!(matches!(eval_str("name * 2", &ctx), Err(ExpressionError::Type(_))));
        assert!(matches!(eval_str("$nope", &ctx), Err(ExpressionError::UnknownVariable(_))));
        assert_eq!(eval_str("name", &ExpressionContext::new()).unwrap_err(), ExpressionError::NoFeature);
    }

    #[test]
    fn test_lpad_width_is_bounded() {
        let f = city();
        let ctx = ExpressionContext::new().with_feature(&f);
        let at_limit = eval_str(&format!("lpad('a', {}, 'x')", MAX_PAD_WIDTH), &ctx).unwrap();
        assert_eq!(at_limit.to_text().len(), MAX_PAD_WIDTH);
        assert!(matches!(
            eval_str(&format!("lpad('a', {}, 'x')", MAX_PAD_WIDTH + 1), &ctx),
            Err(ExpressionError::Eval(_))
        ));
        assert!(matches!(eval_str("lpad(name, 99999999999999, 'x')", &ctx), Err(ExpressionError::Eval(_))));
    }

    #[test]
    fn test_literal_patterns_compiled_once() {
        let text = "regexp_match(name, '^B') OR regexp_match(name, '^B') OR regexp_match(name, 'n$')";
        let mut patterns = HashMap::new();
        collect_patterns(&parse(text).unwrap(), &mut patterns).unwrap();
        let mut keys: Vec<&str> = patterns.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["^B", "n$"]);

        // Non-literal patterns are left to evaluation
        patterns.clear();
        collect_patterns(&parse("regexp_match(name, pattern)").unwrap(), &mut patterns).unwrap();
        assert!(patterns.is_empty());

        let f = city();
        let ctx = ExpressionContext::new().with_feature(&f);
        assert_eq!(eval_str(text, &ctx).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_pattern_errors() {
        let engine = SimpleExpressionEngine::new();
        assert!(matches!(engine.compile("regexp_match(name, '(')"), Err(ExpressionError::Eval(_))));

        let f = city().with_attribute("pattern", "[");
        let ctx = ExpressionContext::new().with_feature(&f);
        assert!(matches!(eval_str("regexp_match(name, pattern)", &ctx), Err(ExpressionError::Eval(_))));
    }
}
