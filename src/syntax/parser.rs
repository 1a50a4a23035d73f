use super::ast::*;
use super::lexer::{Lexer, RawComment, Token, TokenKind};
use super::SyntaxError;
use std::collections::HashMap;

type PResult<T> = Result<T, SyntaxError>;

/// Parses a whole Go source file.
pub fn parse_file(source: &str) -> PResult<GoFile> {
    let (tokens, comments) = Lexer::new(source).tokenize()?;
    Parser::new(tokens, comments).file()
}

/// Parses a single type expression such as `[]web.Pet` or `map[string]int`.
pub fn parse_type_expr(source: &str) -> PResult<TypeExpr> {
    let (tokens, comments) = Lexer::new(source).tokenize()?;
    let mut parser = Parser::new(tokens, comments);
    let ty = parser.parse_type()?;
    parser.skip_semis();
    if parser.peek().kind != TokenKind::Eof {
        return Err(parser.error(format!("unexpected {:?} after type", parser.peek().text)));
    }
    Ok(ty)
}

/// Parses a single constant expression.
pub fn parse_expr(source: &str) -> PResult<Expr> {
    let (tokens, comments) = Lexer::new(source).tokenize()?;
    let mut parser = Parser::new(tokens, comments);
    let expr = parser.expr()?;
    parser.skip_semis();
    if parser.peek().kind != TokenKind::Eof {
        return Err(parser.error(format!("unexpected {:?} after expression", parser.peek().text)));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    groups: Vec<CommentGroup>,
    /// end line -> group, for groups standing on their own lines
    docs: HashMap<usize, usize>,
    /// start line -> group, for groups that follow a token on the same line
    trailing: HashMap<usize, usize>,
}

impl Parser {
    fn new(tokens: Vec<Token>, comments: Vec<RawComment>) -> Self {
        let mut groups: Vec<CommentGroup> = Vec::new();
        let mut docs = HashMap::new();
        let mut trailing = HashMap::new();
        let mut last: Option<&RawComment> = None;
        let mut group_trailing = false;

        for comment in &comments {
            let continues = match last {
                Some(prev) => {
                    !comment.trailing
                        && prev.token_index == comment.token_index
                        && comment.start_line <= prev.end_line + 1
                        && (!group_trailing || comment.start_line == prev.end_line)
                }
                None => false,
            };
            if continues {
                if let Some(group) = groups.last_mut() {
                    group.comments.push(comment.text.clone());
                    group.end_line = comment.end_line;
                }
            } else {
                if let Some(group) = groups.last() {
                    Self::index_group(&mut docs, &mut trailing, groups.len() - 1, group, group_trailing);
                }
                group_trailing = comment.trailing;
                groups.push(CommentGroup {
                    comments: vec![comment.text.clone()],
                    start_line: comment.start_line,
                    end_line: comment.end_line,
                });
            }
            last = Some(comment);
        }
        if let Some(group) = groups.last() {
            Self::index_group(&mut docs, &mut trailing, groups.len() - 1, group, group_trailing);
        }

        Self {
            tokens,
            pos: 0,
            groups,
            docs,
            trailing,
        }
    }

    fn index_group(
        docs: &mut HashMap<usize, usize>,
        trailing: &mut HashMap<usize, usize>,
        index: usize,
        group: &CommentGroup,
        is_trailing: bool,
    ) {
        if is_trailing {
            trailing.insert(group.start_line, index);
        } else {
            docs.insert(group.end_line, index);
        }
    }

    fn doc_before(&self, line: usize) -> Option<CommentGroup> {
        if line == 0 {
            return None;
        }
        self.docs.get(&(line - 1)).map(|&i| self.groups[i].clone())
    }

    fn line_comment(&self, line: usize) -> Option<CommentGroup> {
        self.trailing.get(&line).map(|&i| self.groups[i].clone())
    }

    // ----- token helpers -------------------------------------------------

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    fn next(&mut self) -> Token {
        let tok = self.peek().clone();
        if tok.kind != TokenKind::Eof {
            self.pos += 1;
        }
        tok
    }

    fn last_line(&self) -> usize {
        let mut idx = self.pos;
        while idx > 0 {
            idx -= 1;
            if self.tokens[idx].kind != TokenKind::Semicolon {
                return self.tokens[idx].line;
            }
        }
        0
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(self.peek().line, message)
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if self.peek().is_punct(p) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, p: &str) -> PResult<()> {
        if self.eat_punct(p) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{}', found {:?}", p, self.peek().text)))
        }
    }

    fn expect_ident(&mut self) -> PResult<String> {
        if self.peek().kind == TokenKind::Ident {
            Ok(self.next().text)
        } else {
            Err(self.error(format!("expected identifier, found {:?}", self.peek().text)))
        }
    }

    fn skip_semis(&mut self) {
        while self.peek().kind == TokenKind::Semicolon {
            self.pos += 1;
        }
    }

    /// Ends a spec or field: a semicolon, or nothing before a closing token.
    fn end_of_item(&mut self, close: &str) -> PResult<()> {
        if self.peek().kind == TokenKind::Semicolon {
            self.skip_semis();
            Ok(())
        } else if self.peek().is_punct(close) || self.peek().kind == TokenKind::Eof {
            Ok(())
        } else {
            Err(self.error(format!("unexpected {:?}", self.peek().text)))
        }
    }

    /// Skips a bracketed region starting at the current opening token.
    fn skip_balanced(&mut self) -> PResult<()> {
        let start_line = self.peek().line;
        let mut depth = 0usize;
        loop {
            let tok = self.next();
            match tok.kind {
                TokenKind::Eof => {
                    return Err(SyntaxError::new(start_line, "unbalanced brackets"));
                }
                TokenKind::Punct => match tok.text.as_str() {
                    "(" | "[" | "{" => depth += 1,
                    ")" | "]" | "}" => {
                        depth = depth.saturating_sub(1);
                        if depth == 0 {
                            return Ok(());
                        }
                    }
                    _ => {}
                },
                _ => {}
            }
        }
    }

    fn starts_type(&self) -> bool {
        let tok = self.peek();
        match tok.kind {
            TokenKind::Ident => true,
            TokenKind::Keyword => matches!(
                tok.text.as_str(),
                "map" | "chan" | "func" | "struct" | "interface"
            ),
            TokenKind::Punct => matches!(tok.text.as_str(), "*" | "[" | "(" | "<-"),
            _ => false,
        }
    }

    // ----- file level ----------------------------------------------------

    fn file(mut self) -> PResult<GoFile> {
        self.skip_semis();
        if !self.peek().is_keyword("package") {
            return Err(self.error("expected 'package' clause"));
        }
        self.next();
        let package_name = self.expect_ident()?;
        self.skip_semis();

        let mut file = GoFile {
            package_name,
            ..GoFile::default()
        };

        loop {
            self.skip_semis();
            let tok = self.peek().clone();
            if tok.kind == TokenKind::Eof {
                break;
            }
            let doc = self.doc_before(tok.line);
            if tok.kind != TokenKind::Keyword {
                return Err(self.error(format!("unexpected {:?} at top level", tok.text)));
            }
            self.next();
            match tok.text.as_str() {
                "import" => self.import_decl(&mut file.imports)?,
                "type" => {
                    for spec in self.type_decl(doc)? {
                        file.decls.push(Decl::Type(spec));
                    }
                }
                "const" => file.decls.push(Decl::Const(self.const_decl(doc)?)),
                "var" => self.skip_var_decl()?,
                "func" => file.decls.push(Decl::Func(self.func_decl(doc, tok.line)?)),
                other => return Err(self.error(format!("unexpected keyword {:?}", other))),
            }
        }

        file.comments = std::mem::take(&mut self.groups);
        Ok(file)
    }

    fn import_decl(&mut self, imports: &mut Vec<ImportSpec>) -> PResult<()> {
        if self.eat_punct("(") {
            loop {
                self.skip_semis();
                if self.eat_punct(")") {
                    break;
                }
                imports.push(self.import_spec()?);
                self.end_of_item(")")?;
            }
        } else {
            imports.push(self.import_spec()?);
        }
        Ok(())
    }

    fn import_spec(&mut self) -> PResult<ImportSpec> {
        let name = match self.peek().kind {
            TokenKind::Ident => Some(self.next().text),
            TokenKind::Punct if self.peek().is_punct(".") => {
                self.next();
                Some(".".to_string())
            }
            _ => None,
        };
        if self.peek().kind != TokenKind::String {
            return Err(self.error("expected import path"));
        }
        let path = self.next().text;
        Ok(ImportSpec { name, path })
    }

    fn type_decl(&mut self, doc: Option<CommentGroup>) -> PResult<Vec<TypeSpec>> {
        let mut specs = Vec::new();
        if self.eat_punct("(") {
            loop {
                self.skip_semis();
                if self.eat_punct(")") {
                    break;
                }
                let own_doc = self.doc_before(self.peek().line);
                specs.push(self.type_spec(own_doc)?);
                self.end_of_item(")")?;
            }
        } else {
            specs.push(self.type_spec(doc)?);
        }
        Ok(specs)
    }

    fn type_spec(&mut self, doc: Option<CommentGroup>) -> PResult<TypeSpec> {
        let line = self.peek().line;
        let name = self.expect_ident()?;
        let type_params = if self.peek().is_punct("[") && self.looks_like_type_params() {
            self.type_params()?
        } else {
            Vec::new()
        };
        let is_alias = self.eat_punct("=");
        let ty = self.parse_type()?;
        let comment = self.line_comment(self.last_line());
        Ok(TypeSpec {
            name,
            type_params,
            is_alias,
            ty,
            doc,
            comment,
            line,
        })
    }

    fn looks_like_type_params(&self) -> bool {
        if self.peek_at(1).kind != TokenKind::Ident {
            return false;
        }
        let third = self.peek_at(2);
        match third.kind {
            TokenKind::Ident => true,
            TokenKind::Keyword => matches!(
                third.text.as_str(),
                "interface" | "func" | "map" | "chan" | "struct"
            ),
            TokenKind::Punct => matches!(third.text.as_str(), "," | "*" | "[" | "~"),
            _ => false,
        }
    }

    fn type_params(&mut self) -> PResult<Vec<TypeParam>> {
        self.expect_punct("[")?;
        let mut entries: Vec<(String, Option<TypeExpr>)> = Vec::new();
        loop {
            if self.peek().is_punct("]") {
                break;
            }
            let name = self.expect_ident()?;
            let constraint = if self.peek().is_punct(",") || self.peek().is_punct("]") {
                None
            } else {
                Some(self.constraint()?)
            };
            entries.push((name, constraint));
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct("]")?;

        // `[K, V any]` gives both names the constraint written last.
        let mut params = Vec::with_capacity(entries.len());
        let mut carried = TypeExpr::ident("any");
        for (name, constraint) in entries.into_iter().rev() {
            if let Some(c) = constraint {
                carried = c;
            }
            params.push(TypeParam {
                name,
                constraint: carried.clone(),
            });
        }
        params.reverse();
        Ok(params)
    }

    fn constraint(&mut self) -> PResult<TypeExpr> {
        let mut terms = vec![self.constraint_term()?];
        while self.eat_punct("|") {
            terms.push(self.constraint_term()?);
        }
        if terms.len() == 1 {
            Ok(terms.remove(0))
        } else {
            Ok(TypeExpr::Union(terms))
        }
    }

    fn constraint_term(&mut self) -> PResult<TypeExpr> {
        if self.eat_punct("~") {
            Ok(TypeExpr::Tilde(Box::new(self.parse_type()?)))
        } else {
            self.parse_type()
        }
    }

    fn const_decl(&mut self, doc: Option<CommentGroup>) -> PResult<Vec<ValueSpec>> {
        let mut specs = Vec::new();
        if self.eat_punct("(") {
            let mut iota = 0i64;
            loop {
                self.skip_semis();
                if self.eat_punct(")") {
                    break;
                }
                let own_doc = self.doc_before(self.peek().line);
                specs.push(self.value_spec(iota, own_doc)?);
                self.end_of_item(")")?;
                iota += 1;
            }
        } else {
            specs.push(self.value_spec(0, doc)?);
        }
        Ok(specs)
    }

    fn value_spec(&mut self, iota: i64, doc: Option<CommentGroup>) -> PResult<ValueSpec> {
        let line = self.peek().line;
        let mut names = vec![self.expect_ident()?];
        while self.eat_punct(",") {
            names.push(self.expect_ident()?);
        }
        let ty = if self.starts_type() {
            Some(self.parse_type()?)
        } else {
            None
        };
        let mut values = Vec::new();
        if self.eat_punct("=") {
            values.push(self.expr()?);
            while self.eat_punct(",") {
                values.push(self.expr()?);
            }
        }
        let comment = self.line_comment(self.last_line());
        Ok(ValueSpec {
            names,
            ty,
            values,
            iota,
            doc,
            comment,
            line,
        })
    }

    fn skip_var_decl(&mut self) -> PResult<()> {
        if self.peek().is_punct("(") {
            return self.skip_balanced();
        }
        loop {
            let tok = self.peek();
            match tok.kind {
                TokenKind::Semicolon | TokenKind::Eof => return Ok(()),
                TokenKind::Punct if matches!(tok.text.as_str(), "(" | "[" | "{") => {
                    self.skip_balanced()?
                }
                _ => {
                    self.next();
                }
            }
        }
    }

    fn func_decl(&mut self, doc: Option<CommentGroup>, line: usize) -> PResult<FuncDecl> {
        let mut has_receiver = false;
        if self.peek().is_punct("(") {
            has_receiver = true;
            self.skip_balanced()?;
        }
        let name = self.expect_ident()?;
        if self.peek().is_punct("[") {
            self.skip_balanced()?;
        }
        if !self.peek().is_punct("(") {
            return Err(self.error("expected function parameters"));
        }
        self.skip_balanced()?;
        if self.peek().is_punct("(") {
            self.skip_balanced()?;
        } else if !self.peek().is_punct("{") && self.starts_type() {
            self.parse_type()?;
        }
        let mut local_types = Vec::new();
        if self.peek().is_punct("{") {
            self.func_body(&mut local_types)?;
        }
        Ok(FuncDecl {
            name,
            has_receiver,
            doc,
            local_types,
            line,
        })
    }

    fn func_body(&mut self, local_types: &mut Vec<TypeSpec>) -> PResult<()> {
        let start_line = self.peek().line;
        self.expect_punct("{")?;
        let mut depth = 0usize;
        let mut statement_start = true;
        loop {
            let tok = self.peek().clone();
            match tok.kind {
                TokenKind::Eof => {
                    return Err(SyntaxError::new(start_line, "function body not terminated"));
                }
                TokenKind::Semicolon => {
                    self.next();
                    statement_start = true;
                }
                TokenKind::Keyword if tok.text == "type" && depth == 0 && statement_start => {
                    self.next();
                    let doc = self.doc_before(tok.line);
                    local_types.extend(self.type_decl(doc)?);
                    statement_start = false;
                }
                TokenKind::Punct if matches!(tok.text.as_str(), "(" | "[" | "{") => {
                    self.next();
                    depth += 1;
                    statement_start = tok.text == "{";
                }
                TokenKind::Punct if matches!(tok.text.as_str(), ")" | "]" | "}") => {
                    self.next();
                    if depth == 0 {
                        if tok.text == "}" {
                            return Ok(());
                        }
                        return Err(SyntaxError::new(tok.line, "unbalanced brackets"));
                    }
                    depth -= 1;
                    statement_start = false;
                }
                _ => {
                    self.next();
                    statement_start = false;
                }
            }
        }
    }

    // ----- types ---------------------------------------------------------

    fn parse_type(&mut self) -> PResult<TypeExpr> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Ident => {
                self.next();
                let mut ty = if self.eat_punct(".") {
                    TypeExpr::Qualified {
                        package: tok.text,
                        name: self.expect_ident()?,
                    }
                } else {
                    TypeExpr::Ident(tok.text)
                };
                if self.peek().is_punct("[") {
                    ty = TypeExpr::Generic {
                        base: Box::new(ty),
                        args: self.type_args()?,
                    };
                }
                Ok(ty)
            }
            TokenKind::Punct => match tok.text.as_str() {
                "*" => {
                    self.next();
                    Ok(TypeExpr::Pointer(Box::new(self.parse_type()?)))
                }
                "[" => {
                    self.next();
                    if self.eat_punct("]") {
                        return Ok(TypeExpr::Slice(Box::new(self.parse_type()?)));
                    }
                    if !self.eat_punct("...") {
                        self.expr()?;
                    }
                    self.expect_punct("]")?;
                    Ok(TypeExpr::Array(Box::new(self.parse_type()?)))
                }
                "(" => {
                    self.next();
                    let inner = self.parse_type()?;
                    self.expect_punct(")")?;
                    Ok(inner)
                }
                "<-" => {
                    self.next();
                    if !self.peek().is_keyword("chan") {
                        return Err(self.error("expected 'chan' after '<-'"));
                    }
                    self.next();
                    Ok(TypeExpr::Chan(ChanDir::Recv, Box::new(self.parse_type()?)))
                }
                _ => Err(self.error(format!("expected type, found {:?}", tok.text))),
            },
            TokenKind::Keyword => match tok.text.as_str() {
                "map" => {
                    self.next();
                    self.expect_punct("[")?;
                    let key = self.parse_type()?;
                    self.expect_punct("]")?;
                    let value = self.parse_type()?;
                    Ok(TypeExpr::Map {
                        key: Box::new(key),
                        value: Box::new(value),
                    })
                }
                "chan" => {
                    self.next();
                    let dir = if self.eat_punct("<-") {
                        ChanDir::Send
                    } else {
                        ChanDir::Both
                    };
                    Ok(TypeExpr::Chan(dir, Box::new(self.parse_type()?)))
                }
                "func" => {
                    self.next();
                    self.skip_signature()?;
                    Ok(TypeExpr::Func)
                }
                "interface" => {
                    self.next();
                    self.interface_type()
                }
                "struct" => {
                    self.next();
                    self.struct_type()
                }
                _ => Err(self.error(format!("expected type, found {:?}", tok.text))),
            },
            _ => Err(self.error(format!("expected type, found {:?}", tok.text))),
        }
    }

    fn type_args(&mut self) -> PResult<Vec<TypeExpr>> {
        self.expect_punct("[")?;
        let mut args = Vec::new();
        loop {
            if self.peek().is_punct("]") {
                break;
            }
            args.push(self.parse_type()?);
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct("]")?;
        Ok(args)
    }

    fn skip_signature(&mut self) -> PResult<()> {
        if !self.peek().is_punct("(") {
            return Err(self.error("expected '(' in function type"));
        }
        self.skip_balanced()?;
        if self.peek().is_punct("(") {
            self.skip_balanced()?;
        } else if self.starts_type() {
            self.parse_type()?;
        }
        Ok(())
    }

    fn interface_type(&mut self) -> PResult<TypeExpr> {
        self.expect_punct("{")?;
        let mut methods = 0;
        let mut embeds = Vec::new();
        loop {
            self.skip_semis();
            if self.eat_punct("}") {
                break;
            }
            if self.peek().kind == TokenKind::Ident && self.peek_at(1).is_punct("(") {
                self.next();
                self.skip_signature()?;
                methods += 1;
            } else {
                embeds.push(self.constraint()?);
            }
            self.end_of_item("}")?;
        }
        Ok(TypeExpr::Interface { methods, embeds })
    }

    fn struct_type(&mut self) -> PResult<TypeExpr> {
        self.expect_punct("{")?;
        let mut fields = Vec::new();
        loop {
            self.skip_semis();
            if self.eat_punct("}") {
                break;
            }
            let doc = self.doc_before(self.peek().line);
            let (names, ty) = self.field_names_and_type()?;
            let tag = if self.peek().kind == TokenKind::String {
                Some(self.next().text)
            } else {
                None
            };
            let comment = self.line_comment(self.last_line());
            fields.push(Field {
                names,
                ty,
                tag,
                doc,
                comment,
            });
            self.end_of_item("}")?;
        }
        Ok(TypeExpr::Struct(fields))
    }

    fn field_names_and_type(&mut self) -> PResult<(Vec<String>, TypeExpr)> {
        if self.peek().kind != TokenKind::Ident {
            // Embedded `*T` or `*pkg.T`.
            return Ok((Vec::new(), self.parse_type()?));
        }
        let next = self.peek_at(1).clone();
        let embedded = match next.kind {
            TokenKind::Semicolon | TokenKind::String | TokenKind::Eof => true,
            TokenKind::Punct if next.text == "." || next.text == "}" => true,
            TokenKind::Punct if next.text == "[" => !self.bracket_starts_array_field(),
            _ => false,
        };
        if embedded {
            return Ok((Vec::new(), self.parse_type()?));
        }
        let mut names = vec![self.expect_ident()?];
        while self.eat_punct(",") {
            names.push(self.expect_ident()?);
        }
        Ok((names, self.parse_type()?))
    }

    /// `Name [N]T` is a field with an array type; `Base[T]` is an embedded generic.
    fn bracket_starts_array_field(&self) -> bool {
        if self.peek_at(2).is_punct("]") {
            return true;
        }
        let mut depth = 0usize;
        let mut offset = 1;
        loop {
            let tok = self.peek_at(offset);
            if tok.kind == TokenKind::Eof {
                return false;
            }
            if tok.kind == TokenKind::Punct {
                match tok.text.as_str() {
                    "(" | "[" | "{" => depth += 1,
                    ")" | "]" | "}" => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    _ => {}
                }
            }
            offset += 1;
        }
        let after = self.peek_at(offset + 1);
        match after.kind {
            TokenKind::Ident => true,
            TokenKind::Keyword => matches!(
                after.text.as_str(),
                "map" | "chan" | "func" | "struct" | "interface"
            ),
            TokenKind::Punct => matches!(after.text.as_str(), "*" | "[" | "(" | "<-"),
            _ => false,
        }
    }

    // ----- expressions ---------------------------------------------------

    fn expr(&mut self) -> PResult<Expr> {
        self.binary_expr(1)
    }

    fn binary_expr(&mut self, min_prec: u8) -> PResult<Expr> {
        let mut lhs = self.unary_expr()?;
        loop {
            let tok = self.peek();
            if tok.kind != TokenKind::Punct {
                break;
            }
            let Some(op) = BinaryOp::from_token(&tok.text) else {
                break;
            };
            let prec = op.precedence();
            if prec < min_prec {
                break;
            }
            self.next();
            let rhs = self.binary_expr(prec + 1)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn unary_expr(&mut self) -> PResult<Expr> {
        let tok = self.peek().clone();
        if tok.kind == TokenKind::Punct {
            let op = match tok.text.as_str() {
                "+" => Some(UnaryOp::Plus),
                "-" => Some(UnaryOp::Neg),
                "!" => Some(UnaryOp::Not),
                "^" => Some(UnaryOp::BitNot),
                _ => None,
            };
            if let Some(op) = op {
                self.next();
                let expr = self.unary_expr()?;
                return Ok(Expr::Unary {
                    op,
                    expr: Box::new(expr),
                });
            }
            if matches!(tok.text.as_str(), "&" | "<-" | "*") {
                self.next();
                self.unary_expr()?;
                return Ok(Expr::Other);
            }
        }
        self.primary_expr()
    }

    fn primary_expr(&mut self) -> PResult<Expr> {
        let tok = self.peek().clone();
        let mut expr = match tok.kind {
            TokenKind::Int | TokenKind::Float | TokenKind::Imag | TokenKind::Char | TokenKind::String => {
                self.next();
                let kind = match tok.kind {
                    TokenKind::Int => LitKind::Int,
                    TokenKind::Float => LitKind::Float,
                    TokenKind::Imag => LitKind::Imag,
                    TokenKind::Char => LitKind::Char,
                    _ => LitKind::String,
                };
                Expr::Lit {
                    kind,
                    value: tok.text,
                }
            }
            TokenKind::Ident => {
                self.next();
                Expr::Ident(tok.text)
            }
            TokenKind::Punct if tok.text == "(" => {
                self.next();
                let inner = self.expr()?;
                self.expect_punct(")")?;
                Expr::Paren(Box::new(inner))
            }
            _ if self.starts_type() => {
                let ty = self.parse_type()?;
                if self.peek().is_punct("{") {
                    self.skip_balanced()?;
                    return Ok(Expr::Other);
                }
                Expr::Type(ty)
            }
            _ => return Err(self.error(format!("expected expression, found {:?}", tok.text))),
        };

        loop {
            if self.eat_punct(".") {
                let name = self.expect_ident()?;
                expr = match expr {
                    Expr::Ident(package) => Expr::Selector { package, name },
                    _ => Expr::Other,
                };
            } else if self.peek().is_punct("(") {
                self.next();
                let mut args = Vec::new();
                loop {
                    if self.peek().is_punct(")") {
                        break;
                    }
                    args.push(self.expr()?);
                    self.eat_punct("...");
                    if !self.eat_punct(",") {
                        break;
                    }
                }
                self.expect_punct(")")?;
                expr = Expr::Call {
                    func: Box::new(expr),
                    args,
                };
            } else if self.peek().is_punct("[") {
                self.skip_balanced()?;
                expr = Expr::Other;
            } else {
                break;
            }
        }
        Ok(expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_package_and_imports() {
        let file = parse_file(
            r#"
package api

import "fmt"
import (
    "net/http"
    myv1 "example.com/path1/v1"
    _ "example.com/web"
    . "example.com/dot"
)
"#,
        )
        .unwrap();
        assert_eq!(file.package_name, "api");
        assert_eq!(file.imports.len(), 5);
        assert_eq!(file.imports[0].path, "fmt");
        assert_eq!(file.imports[2].name.as_deref(), Some("myv1"));
        assert_eq!(file.imports[3].name.as_deref(), Some("_"));
        assert_eq!(file.imports[4].name.as_deref(), Some("."));
    }

    #[test]
    fn test_parse_struct_with_tags_and_comments() {
        let file = parse_file(
            r#"
package web

// Pet is a pet
type Pet struct {
    // The identifier
    ID   int    `json:"id" example:"1"`
    Name string `json:"name"` // pet name
    Tags []Tag
    *Base
    cross.Embedded
    Items [4]Item
    Data map[string]interface{}
}
"#,
        )
        .unwrap();
        let Decl::Type(spec) = &file.decls[0] else {
            panic!("expected type declaration");
        };
        assert_eq!(spec.name, "Pet");
        assert_eq!(spec.doc.as_ref().unwrap().text(), "Pet is a pet");
        let TypeExpr::Struct(fields) = &spec.ty else {
            panic!("expected struct");
        };
        assert_eq!(fields.len(), 7);
        assert_eq!(fields[0].names, vec!["ID"]);
        assert_eq!(fields[0].tag.as_deref(), Some(r#"json:"id" example:"1""#));
        assert_eq!(fields[0].doc.as_ref().unwrap().text(), "The identifier");
        assert_eq!(fields[1].comment.as_ref().unwrap().text(), "pet name");
        assert_eq!(fields[2].ty, TypeExpr::Slice(Box::new(TypeExpr::ident("Tag"))));
        assert!(fields[3].names.is_empty());
        assert_eq!(fields[3].ty, TypeExpr::Pointer(Box::new(TypeExpr::ident("Base"))));
        assert!(fields[4].names.is_empty());
        assert_eq!(fields[5].names, vec!["Items"]);
        assert_eq!(fields[5].ty, TypeExpr::Array(Box::new(TypeExpr::ident("Item"))));
        assert!(matches!(fields[6].ty, TypeExpr::Map { .. }));
    }

    #[test]
    fn test_parse_generic_type_params() {
        let file = parse_file(
            r#"
package types

type Pair[K comparable, V any] struct {
    Key   K
    Value V
}

type Both[T, U any] struct{}

type Pager[T query[T, F], F Filter] struct {
    Rows []T
}

type Number interface {
    ~int | ~float64
}
"#,
        )
        .unwrap();
        let specs: Vec<&TypeSpec> = file
            .decls
            .iter()
            .filter_map(|d| match d {
                Decl::Type(t) => Some(t),
                _ => None,
            })
            .collect();
        assert_eq!(specs[0].type_params.len(), 2);
        assert_eq!(specs[0].type_params[0].constraint, TypeExpr::ident("comparable"));
        assert_eq!(specs[1].type_params[0].constraint, TypeExpr::ident("any"));
        assert_eq!(specs[1].type_params[1].name, "U");
        assert!(matches!(specs[2].type_params[0].constraint, TypeExpr::Generic { .. }));
        let TypeExpr::Interface { embeds, .. } = &specs[3].ty else {
            panic!("expected interface");
        };
        assert!(matches!(embeds[0], TypeExpr::Union(_)));
    }

    #[test]
    fn test_array_type_decl_is_not_type_params() {
        let file = parse_file("package a\ntype Buf [N]byte\nconst N = 4\n").unwrap();
        let Decl::Type(spec) = &file.decls[0] else {
            panic!("expected type");
        };
        assert!(spec.type_params.is_empty());
        assert!(matches!(spec.ty, TypeExpr::Array(_)));
    }

    #[test]
    fn test_parse_const_block_with_iota_and_comments() {
        let file = parse_file(
            r#"
package types

const (
    None Class = -1
    A    Class = consts.Base + (iota+1-1)*2/2%100 - (1&1 | 1) + (2 ^ 2) // AAA
    B                                                                   /* BBB */
    C
)
"#,
        )
        .unwrap();
        let Decl::Const(specs) = &file.decls[0] else {
            panic!("expected const block");
        };
        assert_eq!(specs.len(), 4);
        assert_eq!(specs[1].iota, 1);
        assert_eq!(specs[1].comment.as_ref().unwrap().text(), "AAA");
        assert_eq!(specs[2].comment.as_ref().unwrap().text(), "BBB");
        assert!(specs[2].values.is_empty());
        assert!(specs[3].ty.is_none());
    }

    #[test]
    fn test_precedence_of_binary_operators() {
        let expr = parse_expr("1 + 2*3").unwrap();
        let Expr::Binary { op, rhs, .. } = expr else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Add);
        assert!(matches!(*rhs, Expr::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn test_func_decl_with_local_types_and_skipped_body() {
        let file = parse_file(
            r#"
package web

// GetPet godoc
// @Router /pets [get]
func (h *Handler) GetPet(w http.ResponseWriter, r *http.Request) (err error) {
    type Response struct {
        Name string
    }
    if x := f(); x != nil {
        type Nested int
        return map[string]int{"a": 1}
    }
    var v = func() {}
    _ = v
    return nil
}

var handlers = map[string]func(){
    "a": func() {},
}
"#,
        )
        .unwrap();
        let Decl::Func(func) = &file.decls[0] else {
            panic!("expected func");
        };
        assert_eq!(func.name, "GetPet");
        assert!(func.has_receiver);
        assert_eq!(func.doc.as_ref().unwrap().lines().len(), 2);
        assert_eq!(func.local_types.len(), 1);
        assert_eq!(func.local_types[0].name, "Response");
    }

    #[test]
    fn test_parse_type_expr_from_annotation() {
        assert_eq!(
            parse_type_expr("[]web.Pet").unwrap(),
            TypeExpr::Slice(Box::new(TypeExpr::Qualified {
                package: "web".to_string(),
                name: "Pet".to_string()
            }))
        );
        let generic = parse_type_expr("web.GenericResponse[types.Post]").unwrap();
        assert_eq!(generic.to_string(), "web.GenericResponse[types.Post]");
        assert!(parse_type_expr("web.Pet extra").is_err());
    }

    #[test]
    fn test_type_alias_and_channel_fields() {
        let file = parse_file(
            "package a\ntype A = b.C\ntype S struct {\n Ch <-chan int\n F func(int) error\n}\n",
        )
        .unwrap();
        let Decl::Type(alias) = &file.decls[0] else {
            panic!("expected alias");
        };
        assert!(alias.is_alias);
        let Decl::Type(s) = &file.decls[1] else {
            panic!("expected struct");
        };
        let TypeExpr::Struct(fields) = &s.ty else {
            panic!("expected struct");
        };
        assert!(matches!(fields[0].ty, TypeExpr::Chan(ChanDir::Recv, _)));
        assert_eq!(fields[1].ty, TypeExpr::Func);
    }
}
