use std::fmt;

/// Index of a type declaration inside the registry's declaration arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub usize);

/// A parsed Go source file, reduced to what declaration indexing needs.
#[derive(Debug, Clone, Default)]
pub struct GoFile {
    pub package_name: String,
    pub imports: Vec<ImportSpec>,
    pub decls: Vec<Decl>,
    /// Every comment group of the file in source order.
    pub comments: Vec<CommentGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpec {
    /// Explicit alias, `_` or `.`.
    pub name: Option<String>,
    pub path: String,
}

/// Adjacent comments with no blank line or token between them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommentGroup {
    /// Raw comments including their markers.
    pub comments: Vec<String>,
    pub start_line: usize,
    pub end_line: usize,
}

impl CommentGroup {
    /// Comment text split into lines with `//`, `/*` and `*/` removed.
    pub fn lines(&self) -> Vec<String> {
        let mut out = Vec::new();
        for comment in &self.comments {
            if let Some(body) = comment.strip_prefix("//") {
                out.push(body.to_string());
            } else {
                let body = comment
                    .trim_start_matches("/*")
                    .trim_end_matches("*/");
                out.extend(body.lines().map(str::to_string));
            }
        }
        out
    }

    /// Comment text the way a doc reader sees it: lines trimmed, joined by newlines.
    pub fn text(&self) -> String {
        self.lines()
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.starts_with("go:") && !l.starts_with("+build"))
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone)]
pub enum Decl {
    Type(TypeSpec),
    Const(Vec<ValueSpec>),
    Func(FuncDecl),
}

#[derive(Debug, Clone)]
pub struct TypeSpec {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    /// `type A = B`
    pub is_alias: bool,
    pub ty: TypeExpr,
    pub doc: Option<CommentGroup>,
    pub comment: Option<CommentGroup>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeParam {
    pub name: String,
    pub constraint: TypeExpr,
}

/// One `name [type] [= value]` line of a const block.
#[derive(Debug, Clone)]
pub struct ValueSpec {
    pub names: Vec<String>,
    pub ty: Option<TypeExpr>,
    pub values: Vec<Expr>,
    /// Position of the spec inside its block, the value of `iota`.
    pub iota: i64,
    pub doc: Option<CommentGroup>,
    pub comment: Option<CommentGroup>,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub struct FuncDecl {
    pub name: String,
    pub has_receiver: bool,
    pub doc: Option<CommentGroup>,
    /// Type declarations found at the top level of the function body.
    pub local_types: Vec<TypeSpec>,
    pub line: usize,
}

/// A struct field or an embedded type.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Empty for embedded fields.
    pub names: Vec<String>,
    pub ty: TypeExpr,
    /// Tag content without the surrounding quotes.
    pub tag: Option<String>,
    pub doc: Option<CommentGroup>,
    pub comment: Option<CommentGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq, Copy)]
pub enum ChanDir {
    Both,
    Send,
    Recv,
}

/// A mention of a type, as written in source or in an annotation.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    Ident(String),
    Qualified { package: String, name: String },
    Generic { base: Box<TypeExpr>, args: Vec<TypeExpr> },
    Pointer(Box<TypeExpr>),
    Slice(Box<TypeExpr>),
    Array(Box<TypeExpr>),
    Map { key: Box<TypeExpr>, value: Box<TypeExpr> },
    Chan(ChanDir, Box<TypeExpr>),
    Func,
    Interface { methods: usize, embeds: Vec<TypeExpr> },
    Struct(Vec<Field>),
    /// `~T` inside a constraint.
    Tilde(Box<TypeExpr>),
    /// `A | B` inside a constraint.
    Union(Vec<TypeExpr>),
    /// A reference already bound to a declaration, produced by generic substitution.
    Resolved(TypeId),
}

impl TypeExpr {
    pub fn ident(name: impl Into<String>) -> Self {
        TypeExpr::Ident(name.into())
    }

    /// Strips every pointer layer.
    pub fn deref(&self) -> &TypeExpr {
        match self {
            TypeExpr::Pointer(inner) => inner.deref(),
            other => other,
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Ident(name) => write!(f, "{}", name),
            TypeExpr::Qualified { package, name } => write!(f, "{}.{}", package, name),
            TypeExpr::Generic { base, args } => {
                write!(f, "{}[", base)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, "]")
            }
            TypeExpr::Pointer(inner) => write!(f, "*{}", inner),
            TypeExpr::Slice(inner) => write!(f, "[]{}", inner),
            TypeExpr::Array(inner) => write!(f, "[...]{}", inner),
            TypeExpr::Map { key, value } => write!(f, "map[{}]{}", key, value),
            TypeExpr::Chan(_, inner) => write!(f, "chan {}", inner),
            TypeExpr::Func => write!(f, "func"),
            TypeExpr::Interface { .. } => write!(f, "interface{{}}"),
            TypeExpr::Struct(_) => write!(f, "struct{{}}"),
            TypeExpr::Tilde(inner) => write!(f, "~{}", inner),
            TypeExpr::Union(terms) => {
                for (i, term) in terms.iter().enumerate() {
                    if i > 0 {
                        write!(f, "|")?;
                    }
                    write!(f, "{}", term)?;
                }
                Ok(())
            }
            TypeExpr::Resolved(id) => write!(f, "#{}", id.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LitKind {
    Int,
    Float,
    Imag,
    Char,
    String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    AndNot,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LogicalAnd,
    LogicalOr,
}

impl BinaryOp {
    pub fn from_token(text: &str) -> Option<Self> {
        Some(match text {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Rem,
            "&" => BinaryOp::And,
            "|" => BinaryOp::Or,
            "^" => BinaryOp::Xor,
            "&^" => BinaryOp::AndNot,
            "<<" => BinaryOp::Shl,
            ">>" => BinaryOp::Shr,
            "==" => BinaryOp::Eq,
            "!=" => BinaryOp::Ne,
            "<" => BinaryOp::Lt,
            "<=" => BinaryOp::Le,
            ">" => BinaryOp::Gt,
            ">=" => BinaryOp::Ge,
            "&&" => BinaryOp::LogicalAnd,
            "||" => BinaryOp::LogicalOr,
            _ => return None,
        })
    }

    /// Go operator precedence, higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::LogicalOr => 1,
            BinaryOp::LogicalAnd => 2,
            BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge => 3,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Or | BinaryOp::Xor => 4,
            BinaryOp::Mul
            | BinaryOp::Div
            | BinaryOp::Rem
            | BinaryOp::Shl
            | BinaryOp::Shr
            | BinaryOp::And
            | BinaryOp::AndNot => 5,
        }
    }
}

/// Expressions as they appear in constant declarations.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Lit { kind: LitKind, value: String },
    Ident(String),
    Selector { package: String, name: String },
    Paren(Box<Expr>),
    Unary { op: UnaryOp, expr: Box<Expr> },
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Call { func: Box<Expr>, args: Vec<Expr> },
    /// A type in expression position, e.g. the target of `[]byte("x")`.
    Type(TypeExpr),
    /// Anything that can never be a constant (composite or function literals).
    Other,
}
