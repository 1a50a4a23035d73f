//! Constant folding for `const` declarations.
//!
//! Values are folded with Go semantics: untyped integers are exact (held in
//! an `i128`), typed integers wrap to their declared width, and a reference to
//! a typed constant gives the result that type.

use crate::error::SwagError;
use crate::registry::{is_builtin_type, ConstId, FileId, Registry};
use crate::syntax::ast::{BinaryOp, Expr, LitKind, TypeExpr, TypeId, UnaryOp};
use crate::syntax::lexer::unescape;
use log::{debug, warn};
use std::collections::HashMap;

/// A folded constant value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Int(i128),
    Float(f64),
    String(String),
    Bool(bool),
}

impl ConstValue {
    pub fn to_json(&self) -> Option<serde_json::Value> {
        match self {
            ConstValue::Int(i) => {
                if let Ok(v) = i64::try_from(*i) {
                    Some(v.into())
                } else {
                    u64::try_from(*i).ok().map(Into::into)
                }
            }
            ConstValue::Float(f) => serde_json::Number::from_f64(*f).map(serde_json::Value::Number),
            ConstValue::String(s) => Some(s.clone().into()),
            ConstValue::Bool(b) => Some((*b).into()),
        }
    }
}

/// The type a constant ends up with.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConstType {
    #[default]
    Untyped,
    /// A predeclared type such as `int` or `uint16`.
    Builtin(String),
    /// A type declared in the registry.
    Named(TypeId),
    /// A named type that is not indexed (e.g. from the standard library).
    Foreign(String),
}

#[derive(Debug, Clone)]
pub struct Evaluated {
    pub value: ConstValue,
    pub ty: ConstType,
}

/// One row of a package's constant table.
#[derive(Debug, Clone)]
pub struct ConstEntry {
    pub id: ConstId,
    pub name: String,
    /// `None` when the expression cannot be folded.
    pub value: Option<ConstValue>,
    pub ty: ConstType,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IntKind {
    Untyped,
    Signed(u32),
    Unsigned(u32),
}

/// Underlying representation of a constant type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    Untyped,
    Int(IntKind),
    Float,
    String,
    Bool,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failure {
    Unfoldable,
    Circular,
}

type EvalResult = std::result::Result<Evaluated, Failure>;

struct Evaluator<'r> {
    registry: &'r Registry,
    results: HashMap<ConstId, Option<Evaluated>>,
    visiting: Vec<ConstId>,
}

/// Folds the constants of one package, in declaration order.
pub fn evaluate_all(registry: &Registry, package_path: &str) -> Vec<ConstEntry> {
    let Some(package) = registry.package(package_path) else {
        return Vec::new();
    };
    let mut evaluator = Evaluator::new(registry);
    package
        .const_order
        .iter()
        .map(|&id| {
            let evaluated = evaluator.eval_const(id).ok();
            let constant = registry.constant(id);
            ConstEntry {
                id,
                name: constant.name.clone(),
                value: evaluated.as_ref().map(|e| e.value.clone()),
                ty: evaluated.map(|e| e.ty).unwrap_or_default(),
                comment: constant.comment.clone(),
            }
        })
        .collect()
}

/// Folds every constant whose value has not been computed yet.
pub fn evaluate_pending(registry: &Registry) -> Vec<(ConstId, Option<Evaluated>)> {
    let mut evaluator = Evaluator::new(registry);
    let mut out = Vec::new();
    for package in registry.packages() {
        for &id in &package.const_order {
            if registry.constant(id).value.is_some() {
                continue;
            }
            let evaluated = evaluator.eval_const(id).ok();
            if evaluated.is_none() {
                debug!(
                    "Constant {}.{} is not foldable",
                    package.path,
                    registry.constant(id).name
                );
            }
            out.push((id, evaluated));
        }
    }
    out
}

impl<'r> Evaluator<'r> {
    fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            results: HashMap::new(),
            visiting: Vec::new(),
        }
    }

    fn eval_const(&mut self, id: ConstId) -> EvalResult {
        if let Some(done) = self.results.get(&id) {
            return done.clone().ok_or(Failure::Unfoldable);
        }
        if self.visiting.contains(&id) {
            let chain: Vec<String> = self
                .visiting
                .iter()
                .skip_while(|&&v| v != id)
                .chain(std::iter::once(&id))
                .map(|&v| self.registry.constant(v).name.clone())
                .collect();
            warn!("{}", SwagError::CircularConstant(chain.join(" -> ")));
            return Err(Failure::Circular);
        }

        let constant = self.registry.constant(id);
        if let Some(existing) = &constant.value {
            return Ok(Evaluated {
                value: existing.clone(),
                ty: constant.value_type.clone(),
            });
        }

        self.visiting.push(id);
        let result = match &constant.expr {
            Some(expr) => self.eval(expr, constant.file, constant.iota),
            None => Err(Failure::Unfoldable),
        };
        let result = match (&constant.ty, result) {
            (Some(declared), Ok(value)) => {
                let target = self.resolve_type(declared, constant.file);
                convert(self.registry, value, target)
            }
            (_, result) => result,
        };
        self.visiting.pop();
        self.results.insert(id, result.clone().ok());
        result
    }

    fn resolve_type(&self, ty: &TypeExpr, file: FileId) -> ConstType {
        match ty {
            TypeExpr::Ident(name) if is_builtin_type(name) => ConstType::Builtin(name.clone()),
            TypeExpr::Ident(_) | TypeExpr::Qualified { .. } => {
                let written = ty.to_string();
                match self.registry.lookup_type(&written, file) {
                    Some((id, _)) => ConstType::Named(id),
                    None => ConstType::Foreign(written),
                }
            }
            other => ConstType::Foreign(other.to_string()),
        }
    }

    fn package_of(&self, file: FileId) -> &'r str {
        &self.registry.file(file).package_path
    }

    fn eval(&mut self, expr: &Expr, file: FileId, iota: i64) -> EvalResult {
        match expr {
            Expr::Lit { kind, value } => literal(*kind, value),
            Expr::Ident(name) => match name.as_str() {
                "true" => Ok(untyped(ConstValue::Bool(true))),
                "false" => Ok(untyped(ConstValue::Bool(false))),
                "iota" => Ok(untyped(ConstValue::Int(iota as i128))),
                _ => {
                    let id = self
                        .registry
                        .find_const(self.package_of(file), name)
                        .ok_or(Failure::Unfoldable)?;
                    self.eval_const(id)
                }
            },
            Expr::Selector { package, name } => {
                let path = self
                    .registry
                    .find_package_path(package, file)
                    .ok_or(Failure::Unfoldable)?;
                let id = self
                    .registry
                    .find_const(&path, name)
                    .ok_or(Failure::Unfoldable)?;
                self.eval_const(id)
            }
            Expr::Paren(inner) => self.eval(inner, file, iota),
            Expr::Unary { op, expr } => {
                let operand = self.eval(expr, file, iota)?;
                self.unary(*op, operand)
            }
            Expr::Binary { op, lhs, rhs } => {
                let l = self.eval(lhs, file, iota)?;
                let r = self.eval(rhs, file, iota)?;
                self.binary(*op, l, r)
            }
            Expr::Call { func, args } => self.call(func, args, file, iota),
            Expr::Type(_) | Expr::Other => Err(Failure::Unfoldable),
        }
    }

    fn call(&mut self, func: &Expr, args: &[Expr], file: FileId, iota: i64) -> EvalResult {
        if args.len() != 1 {
            return Err(Failure::Unfoldable);
        }
        if matches!(func, Expr::Ident(name) if name == "len") {
            return match self.eval(&args[0], file, iota)?.value {
                ConstValue::String(s) => Ok(Evaluated {
                    value: ConstValue::Int(s.len() as i128),
                    ty: ConstType::Builtin("int".to_string()),
                }),
                _ => Err(Failure::Unfoldable),
            };
        }
        let target = match func {
            Expr::Ident(name) if is_builtin_type(name) => {
                if name == "any" || name == "error" {
                    return Err(Failure::Unfoldable);
                }
                ConstType::Builtin(name.clone())
            }
            Expr::Ident(name) => match self.registry.lookup_type(name, file) {
                Some((id, _)) => ConstType::Named(id),
                None => return Err(Failure::Unfoldable),
            },
            Expr::Selector { package, name } => {
                match self.registry.lookup_type(&format!("{}.{}", package, name), file) {
                    Some((id, _)) => ConstType::Named(id),
                    None => return Err(Failure::Unfoldable),
                }
            }
            Expr::Paren(inner) => return self.call(inner, args, file, iota),
            _ => return Err(Failure::Unfoldable),
        };
        let value = self.eval(&args[0], file, iota)?;
        convert(self.registry, value, target)
    }

    fn unary(&self, op: UnaryOp, operand: Evaluated) -> EvalResult {
        let kind = int_kind(self.registry, &operand.ty);
        let value = match (op, operand.value) {
            (UnaryOp::Plus, v @ (ConstValue::Int(_) | ConstValue::Float(_))) => v,
            (UnaryOp::Neg, ConstValue::Int(i)) => ConstValue::Int(wrap(i.checked_neg().ok_or(Failure::Unfoldable)?, kind)),
            (UnaryOp::Neg, ConstValue::Float(f)) => ConstValue::Float(-f),
            (UnaryOp::Not, ConstValue::Bool(b)) => ConstValue::Bool(!b),
            (UnaryOp::BitNot, ConstValue::Int(i)) => match kind {
                IntKind::Unsigned(bits) => ConstValue::Int(i ^ mask(bits)),
                _ => ConstValue::Int(wrap(!i, kind)),
            },
            _ => return Err(Failure::Unfoldable),
        };
        Ok(Evaluated {
            value,
            ty: operand.ty,
        })
    }

    fn binary(&self, op: BinaryOp, l: Evaluated, r: Evaluated) -> EvalResult {
        match op {
            BinaryOp::Shl | BinaryOp::Shr => return self.shift(op, l, r),
            BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge => return compare(op, &l.value, &r.value).map(|b| untyped(ConstValue::Bool(b))),
            BinaryOp::LogicalAnd | BinaryOp::LogicalOr => {
                return match (l.value, r.value) {
                    (ConstValue::Bool(a), ConstValue::Bool(b)) => {
                        let v = if op == BinaryOp::LogicalAnd { a && b } else { a || b };
                        Ok(untyped(ConstValue::Bool(v)))
                    }
                    _ => Err(Failure::Unfoldable),
                };
            }
            _ => {}
        }

        let ty = if l.ty != ConstType::Untyped { l.ty } else { r.ty };
        let kind = int_kind(self.registry, &ty);
        let value = match (l.value, r.value) {
            (ConstValue::Int(a), ConstValue::Int(b)) => ConstValue::Int(wrap(int_op(op, a, b)?, kind)),
            (ConstValue::String(a), ConstValue::String(b)) if op == BinaryOp::Add => {
                ConstValue::String(a + &b)
            }
            (a, b) => {
                let (Some(x), Some(y)) = (as_float(&a), as_float(&b)) else {
                    return Err(Failure::Unfoldable);
                };
                let f = match op {
                    BinaryOp::Add => x + y,
                    BinaryOp::Sub => x - y,
                    BinaryOp::Mul => x * y,
                    BinaryOp::Div if y != 0.0 => x / y,
                    _ => return Err(Failure::Unfoldable),
                };
                if matches!(class_of(self.registry, &ty), Class::Int(_)) && f.fract() == 0.0 {
                    ConstValue::Int(wrap(f as i128, kind))
                } else {
                    ConstValue::Float(f)
                }
            }
        };
        Ok(Evaluated { value, ty })
    }

    fn shift(&self, op: BinaryOp, l: Evaluated, r: Evaluated) -> EvalResult {
        let count = match r.value {
            ConstValue::Int(c) if c >= 0 => c,
            ConstValue::Float(f) if f >= 0.0 && f.fract() == 0.0 => f as i128,
            _ => return Err(Failure::Unfoldable),
        };
        let base = match l.value {
            ConstValue::Int(i) => i,
            ConstValue::Float(f) if f.fract() == 0.0 && l.ty == ConstType::Untyped => f as i128,
            _ => return Err(Failure::Unfoldable),
        };
        let kind = int_kind(self.registry, &l.ty);
        let value = if op == BinaryOp::Shl {
            let fits = count < 127 && (base == 0 || (base.unsigned_abs().leading_zeros() as i128) > count + 1);
            if fits {
                wrap(base << count, kind)
            } else if kind != IntKind::Untyped && count < 128 {
                wrap(((base as u128) << count) as i128, kind)
            } else if kind != IntKind::Untyped {
                0
            } else {
                return Err(Failure::Unfoldable);
            }
        } else {
            base >> count.min(127)
        };
        Ok(Evaluated {
            value: ConstValue::Int(value),
            ty: l.ty,
        })
    }
}

fn untyped(value: ConstValue) -> Evaluated {
    Evaluated {
        value,
        ty: ConstType::Untyped,
    }
}

fn literal(kind: LitKind, raw: &str) -> EvalResult {
    let value = match kind {
        LitKind::Int => ConstValue::Int(parse_int_literal(raw).ok_or(Failure::Unfoldable)?),
        LitKind::Float => ConstValue::Float(raw.replace('_', "").parse().map_err(|_| Failure::Unfoldable)?),
        LitKind::Char => {
            let body = raw
                .strip_prefix('\'')
                .and_then(|r| r.strip_suffix('\''))
                .ok_or(Failure::Unfoldable)?;
            let decoded = unescape(body).map_err(|_| Failure::Unfoldable)?;
            let ch = decoded.chars().next().ok_or(Failure::Unfoldable)?;
            ConstValue::Int(ch as i128)
        }
        LitKind::String => ConstValue::String(raw.to_string()),
        LitKind::Imag => return Err(Failure::Unfoldable),
    };
    Ok(untyped(value))
}

/// Parses decimal, hex, octal and binary integer literals with `_` separators.
fn parse_int_literal(raw: &str) -> Option<i128> {
    let digits = raw.replace('_', "");
    let lower = digits.to_ascii_lowercase();
    let (radix, body) = if let Some(rest) = lower.strip_prefix("0x") {
        (16, rest.to_string())
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (2, rest.to_string())
    } else if let Some(rest) = lower.strip_prefix("0o") {
        (8, rest.to_string())
    } else if lower.len() > 1 && lower.starts_with('0') {
        (8, lower[1..].to_string())
    } else {
        (10, lower)
    };
    i128::from_str_radix(&body, radix).ok()
}

fn builtin_class(name: &str) -> Class {
    match name {
        "int" | "int64" => Class::Int(IntKind::Signed(64)),
        "int8" => Class::Int(IntKind::Signed(8)),
        "int16" => Class::Int(IntKind::Signed(16)),
        "int32" | "rune" => Class::Int(IntKind::Signed(32)),
        "uint" | "uint64" | "uintptr" => Class::Int(IntKind::Unsigned(64)),
        "uint8" | "byte" => Class::Int(IntKind::Unsigned(8)),
        "uint16" => Class::Int(IntKind::Unsigned(16)),
        "uint32" => Class::Int(IntKind::Unsigned(32)),
        "float32" | "float64" => Class::Float,
        "string" => Class::String,
        "bool" => Class::Bool,
        _ => Class::Other,
    }
}

fn class_of(registry: &Registry, ty: &ConstType) -> Class {
    match ty {
        ConstType::Untyped => Class::Untyped,
        ConstType::Builtin(name) => builtin_class(name),
        ConstType::Foreign(_) => Class::Other,
        ConstType::Named(id) => {
            let mut current = *id;
            // Follow `type A B` chains a few levels.
            for _ in 0..8 {
                let def = registry.type_def(current);
                match &def.ty {
                    TypeExpr::Ident(name) if is_builtin_type(name) => return builtin_class(name),
                    TypeExpr::Ident(_) | TypeExpr::Qualified { .. } => {
                        match registry.lookup_type(&def.ty.to_string(), def.file) {
                            Some((next, _)) => current = next,
                            None => return Class::Other,
                        }
                    }
                    _ => return Class::Other,
                }
            }
            Class::Other
        }
    }
}

fn int_kind(registry: &Registry, ty: &ConstType) -> IntKind {
    match class_of(registry, ty) {
        Class::Int(kind) => kind,
        _ => IntKind::Untyped,
    }
}

fn convert(registry: &Registry, value: Evaluated, target: ConstType) -> EvalResult {
    let converted = match (class_of(registry, &target), value.value) {
        (Class::Int(kind), ConstValue::Int(i)) => ConstValue::Int(wrap(i, kind)),
        (Class::Int(kind), ConstValue::Float(f)) if f.fract() == 0.0 => ConstValue::Int(wrap(f as i128, kind)),
        (Class::Float, ConstValue::Int(i)) => ConstValue::Float(i as f64),
        (Class::Float, v @ ConstValue::Float(_)) => v,
        (Class::String, ConstValue::Int(i)) => {
            let ch = u32::try_from(i)
                .ok()
                .and_then(char::from_u32)
                .unwrap_or(char::REPLACEMENT_CHARACTER);
            ConstValue::String(ch.to_string())
        }
        (Class::String, v @ ConstValue::String(_)) => v,
        (Class::Bool, v @ ConstValue::Bool(_)) => v,
        (Class::Other | Class::Untyped, v) => v,
        _ => return Err(Failure::Unfoldable),
    };
    Ok(Evaluated {
        value: converted,
        ty: target,
    })
}

fn mask(bits: u32) -> i128 {
    if bits >= 127 {
        i128::MAX
    } else {
        (1i128 << bits) - 1
    }
}

/// Truncates `value` to the width of `kind`.
fn wrap(value: i128, kind: IntKind) -> i128 {
    match kind {
        IntKind::Untyped => value,
        IntKind::Unsigned(bits) => value & mask(bits),
        IntKind::Signed(bits) => {
            let truncated = value & mask(bits);
            let sign_bit = 1i128 << (bits - 1);
            if truncated & sign_bit != 0 {
                truncated - (1i128 << bits)
            } else {
                truncated
            }
        }
    }
}

fn int_op(op: BinaryOp, a: i128, b: i128) -> std::result::Result<i128, Failure> {
    let result = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div => a.checked_div(b),
        BinaryOp::Rem => a.checked_rem(b),
        BinaryOp::And => Some(a & b),
        BinaryOp::Or => Some(a | b),
        BinaryOp::Xor => Some(a ^ b),
        BinaryOp::AndNot => Some(a & !b),
        _ => None,
    };
    result.ok_or(Failure::Unfoldable)
}

fn as_float(value: &ConstValue) -> Option<f64> {
    match value {
        ConstValue::Int(i) => Some(*i as f64),
        ConstValue::Float(f) => Some(*f),
        _ => None,
    }
}

fn compare(op: BinaryOp, l: &ConstValue, r: &ConstValue) -> std::result::Result<bool, Failure> {
    use std::cmp::Ordering;
    let ordering = match (l, r) {
        (ConstValue::Int(a), ConstValue::Int(b)) => a.cmp(b),
        (ConstValue::String(a), ConstValue::String(b)) => a.cmp(b),
        (ConstValue::Bool(a), ConstValue::Bool(b)) => match op {
            BinaryOp::Eq => return Ok(a == b),
            BinaryOp::Ne => return Ok(a != b),
            _ => return Err(Failure::Unfoldable),
        },
        (a, b) => {
            let (Some(x), Some(y)) = (as_float(a), as_float(b)) else {
                return Err(Failure::Unfoldable);
            };
            x.partial_cmp(&y).ok_or(Failure::Unfoldable)?
        }
    };
    Ok(match op {
        BinaryOp::Eq => ordering == Ordering::Equal,
        BinaryOp::Ne => ordering != Ordering::Equal,
        BinaryOp::Lt => ordering == Ordering::Less,
        BinaryOp::Le => ordering != Ordering::Greater,
        BinaryOp::Gt => ordering == Ordering::Greater,
        _ => ordering != Ordering::Less,
    })
}
