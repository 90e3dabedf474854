//! Recursive descent parser for the reference language.
//!
//! ```text
//! module    := stmt*
//! stmt      := "import" IDENT "from" STRING
//!            | "declare" IDENT
//!            | "export"? ("let" | "const")? IDENT ("=" expr)?
//!            | IDENT assign_op expr
//!            | expr
//! expr      := term (("+" | "-") term)*
//! term      := unary (("*" | "/") unary)*
//! unary     := "-" unary | primary
//! primary   := NUMBER | STRING | IDENT call? | "(" expr ")"
//! call      := "(" (expr ("," expr)*)? ")"
//! ```
//!
//! Statements end at `;`, a line break, or end of input. After an error the
//! parser skips to the next statement boundary and continues.

use super::lexer::{tokenize, Spanned, Token};

// ============================================================================
// AST
// ============================================================================

/// A parsed source file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Module {
    pub statements: Vec<Stmt>,
}

impl Module {
    /// Import specifiers with their offsets, in source order.
    pub fn imports(&self) -> impl Iterator<Item = (&str, usize)> {
        self.statements.iter().filter_map(|stmt| match stmt {
            Stmt::Import {
                specifier, offset, ..
            } => Some((specifier.as_str(), *offset)),
            _ => None,
        })
    }
}

/// An identifier occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Name {
    pub text: String,
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Let,
    Const,
    /// `export x = ...` without a keyword.
    Implicit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
}

impl AssignOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Assign => "=",
            Self::Add => "+=",
            Self::Sub => "-=",
            Self::Mul => "*=",
            Self::Div => "/=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Import {
        binding: Name,
        specifier: String,
        /// Offset of the specifier literal.
        offset: usize,
    },
    Declare {
        name: Name,
    },
    Variable {
        exported: bool,
        kind: VarKind,
        name: Name,
        init: Option<Expr>,
    },
    Assign {
        target: Name,
        op: AssignOp,
        value: Expr,
    },
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Number(String),
    Str(String),
    Name(Name),
    Neg(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        callee: Name,
        args: Vec<Expr>,
    },
    Paren(Box<Expr>),
}

/// A syntax error at a byte offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub offset: usize,
    pub code: &'static str,
    pub message: String,
}

// ============================================================================
// Parser
// ============================================================================

/// Parse a whole file. Lexer and parser errors are returned together, in
/// offset order.
pub fn parse(text: &str) -> (Module, Vec<SyntaxError>) {
    let (tokens, lex_errors) = tokenize(text);
    let mut parser = Parser {
        tokens,
        pos: 0,
        errors: lex_errors
            .into_iter()
            .map(|e| SyntaxError {
                offset: e.offset,
                code: e.code,
                message: e.message,
            })
            .collect(),
    };

    let mut module = Module::default();
    loop {
        // Empty statements.
        while parser.at(&Token::Semi) {
            parser.advance();
        }
        if parser.at(&Token::Eof) {
            break;
        }
        let start = parser.pos;
        match parser.statement() {
            Ok(stmt) => module.statements.push(stmt),
            Err(err) => {
                parser.errors.push(err);
                parser.recover(start);
            }
        }
    }

    let mut errors = parser.errors;
    errors.sort_by_key(|e| e.offset);
    (module, errors)
}

type ParseResult<T> = Result<T, SyntaxError>;

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    errors: Vec<SyntaxError>,
}

impl Parser {
    fn current(&self) -> &Spanned {
        // `tokenize` always ends the stream with Eof and `advance` never
        // moves past it.
        &self.tokens[self.pos]
    }

    fn peek(&self) -> &Token {
        &self.tokens[(self.pos + 1).min(self.tokens.len() - 1)].token
    }

    fn at(&self, token: &Token) -> bool {
        &self.current().token == token
    }

    fn advance(&mut self) -> Spanned {
        let token = self.current().clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn error<T>(&self, code: &'static str, message: impl Into<String>) -> ParseResult<T> {
        Err(SyntaxError {
            offset: self.current().offset,
            code,
            message: message.into(),
        })
    }

    fn expect(&mut self, token: Token, text: &str) -> ParseResult<Spanned> {
        if self.at(&token) {
            Ok(self.advance())
        } else {
            self.error("TS1005", format!("'{text}' expected."))
        }
    }

    fn name(&mut self) -> ParseResult<Name> {
        match &self.current().token {
            Token::Ident(text) => {
                let name = Name {
                    text: text.clone(),
                    offset: self.current().offset,
                };
                self.advance();
                Ok(name)
            }
            _ => self.error("TS1003", "Identifier expected."),
        }
    }

    /// Skip to just past the next statement boundary. Always makes progress
    /// past the statement that started at `start`.
    fn recover(&mut self, start: usize) {
        if self.pos == start {
            self.advance();
        }
        loop {
            let current = self.current();
            if current.token == Token::Eof || current.newline_before {
                return;
            }
            if current.token == Token::Semi {
                self.advance();
                return;
            }
            self.advance();
        }
    }

    fn end_statement(&mut self) -> ParseResult<()> {
        let current = self.current();
        if current.token == Token::Semi {
            self.advance();
            Ok(())
        } else if current.token == Token::Eof || current.newline_before {
            Ok(())
        } else {
            self.error("TS1005", "';' expected.")
        }
    }

    fn statement(&mut self) -> ParseResult<Stmt> {
        let is_assignment = matches!(self.current().token, Token::Ident(_))
            && assign_op(self.peek()).is_some();

        let stmt = match self.current().token {
            Token::Import => self.import()?,
            Token::Declare => {
                self.advance();
                Stmt::Declare { name: self.name()? }
            }
            Token::Export => {
                self.advance();
                self.variable(true)?
            }
            Token::Let | Token::Const => self.variable(false)?,
            _ if is_assignment => self.assignment()?,
            _ => Stmt::Expr(self.expr()?),
        };
        self.end_statement()?;
        Ok(stmt)
    }

    fn import(&mut self) -> ParseResult<Stmt> {
        self.expect(Token::Import, "import")?;
        let binding = self.name()?;
        self.expect(Token::From, "from")?;
        match &self.current().token {
            Token::Str(specifier) => {
                let stmt = Stmt::Import {
                    binding,
                    specifier: specifier.clone(),
                    offset: self.current().offset,
                };
                self.advance();
                Ok(stmt)
            }
            _ => self.error("TS1141", "String literal expected."),
        }
    }

    fn variable(&mut self, exported: bool) -> ParseResult<Stmt> {
        let kind = match self.current().token {
            Token::Let => VarKind::Let,
            Token::Const => VarKind::Const,
            _ => VarKind::Implicit,
        };
        if kind != VarKind::Implicit {
            self.advance();
        }

        let name = self.name()?;
        let init = if self.at(&Token::Eq) {
            self.advance();
            Some(self.expr()?)
        } else {
            None
        };

        match (kind, &init) {
            (VarKind::Const, None) => {
                return Err(SyntaxError {
                    offset: name.offset,
                    code: "TS1155",
                    message: "'const' declarations must be initialized.".to_string(),
                })
            }
            (VarKind::Implicit, None) => return self.error("TS1005", "'=' expected."),
            _ => {}
        }

        Ok(Stmt::Variable {
            exported,
            kind,
            name,
            init,
        })
    }

    fn assignment(&mut self) -> ParseResult<Stmt> {
        let target = self.name()?;
        let op = assign_op(&self.advance().token).unwrap_or(AssignOp::Assign);
        let value = self.expr()?;
        Ok(Stmt::Assign { target, op, value })
    }

    fn expr(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.current().token {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.term()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn term(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.current().token {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        if self.at(&Token::Minus) {
            self.advance();
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        match self.current().token.clone() {
            Token::Number(n) => {
                self.advance();
                Ok(Expr::Number(n))
            }
            Token::Str(s) => {
                self.advance();
                Ok(Expr::Str(s))
            }
            Token::Ident(_) => {
                let name = self.name()?;
                if self.at(&Token::LParen) && !self.current().newline_before {
                    self.advance();
                    let args = self.arguments()?;
                    Ok(Expr::Call { callee: name, args })
                } else {
                    Ok(Expr::Name(name))
                }
            }
            Token::LParen => {
                self.advance();
                let inner = self.expr()?;
                self.expect(Token::RParen, ")")?;
                Ok(Expr::Paren(Box::new(inner)))
            }
            _ => self.error("TS1109", "Expression expected."),
        }
    }

    fn arguments(&mut self) -> ParseResult<Vec<Expr>> {
        let mut args = Vec::new();
        if self.at(&Token::RParen) {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            if self.at(&Token::Comma) {
                self.advance();
                continue;
            }
            self.expect(Token::RParen, ")")?;
            return Ok(args);
        }
    }
}

fn assign_op(token: &Token) -> Option<AssignOp> {
    match token {
        Token::Eq => Some(AssignOp::Assign),
        Token::PlusEq => Some(AssignOp::Add),
        Token::MinusEq => Some(AssignOp::Sub),
        Token::StarEq => Some(AssignOp::Mul),
        Token::SlashEq => Some(AssignOp::Div),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn errors(text: &str) -> Vec<(usize, &'static str, String)> {
        parse(text)
            .1
            .into_iter()
            .map(|e| (e.offset, e.code, e.message))
            .collect()
    }

    #[test]
    fn test_parse_declarations() {
        let (module, errors) = parse("import b from \"b.src\";\nexport x = 1\nconst y = x * (2 + b)");
        assert!(errors.is_empty());
        assert_eq!(module.statements.len(), 3);
        assert_eq!(module.imports().collect::<Vec<_>>(), vec![("b.src", 14)]);

        match &module.statements[1] {
            Stmt::Variable {
                exported,
                kind,
                name,
                init,
            } => {
                assert!(*exported);
                assert_eq!(*kind, VarKind::Implicit);
                assert_eq!(name.text, "x");
                assert_eq!(init, &Some(Expr::Number("1".into())));
            }
            other => panic!("unexpected statement: {other:?}"),
        }
    }

    #[test]
    fn test_precedence() {
        let (module, _) = parse("a - b * -c");
        let Stmt::Expr(Expr::Binary { op, rhs, .. }) = &module.statements[0] else {
            panic!("expected binary expression");
        };
        assert_eq!(*op, BinaryOp::Sub);
        assert!(matches!(**rhs, Expr::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn test_missing_expression() {
        assert_eq!(
            errors("x += "),
            vec![(5, "TS1109", "Expression expected.".to_string())]
        );
    }

    #[test]
    fn test_recovery_keeps_following_statements() {
        let (module, errors) = parse("x = \nlet y = 2\nf(1, 2) 3\nlet z = 4;");
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].code, "TS1109");
        assert_eq!(errors[1].message, "';' expected.");

        let names: Vec<_> = module
            .statements
            .iter()
            .filter_map(|s| match s {
                Stmt::Variable { name, .. } => Some(name.text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["y", "z"]);
    }

    #[test]
    fn test_declaration_errors() {
        assert_eq!(errors("const c")[0].1, "TS1155");
        assert_eq!(errors("export 1")[0].1, "TS1003");
        assert_eq!(errors("import m from m")[0].1, "TS1141");
        assert_eq!(errors("import m \"m\"")[0].2, "'from' expected.");
        assert_eq!(errors("(1 + 2")[0].2, "')' expected.");
    }

    #[test]
    fn test_empty_statements() {
        let (module, errors) = parse(";;let a = 1;;");
        assert!(errors.is_empty());
        assert_eq!(module.statements.len(), 1);
    }
}
