//! Lexer and recursive-descent parser for the reference expression language.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! or      := and ( OR and )*
//! and     := not ( AND not )*
//! not     := NOT not | cmp
//! cmp     := add ( ( = | <> | != | < | <= | > | >= ) add | IS [NOT] NULL )*
//! add     := mul ( ( + | - | '||' ) mul )*
//! mul     := unary ( ( * | / | % ) unary )*
//! unary   := - unary | primary
//! primary := number | 'string' | TRUE | FALSE | NULL
//!          | ident | "quoted field" | $var | @var
//!          | ident '(' args ')' | '(' or ')'
//! ```

use crate::types::Value;
use super::ExpressionError;

/// Deepest nesting of parentheses, calls and prefix operators.
pub const MAX_NESTING: usize = 64;

/// Most tokens a single expression may hold. Bounds the depth of operator
/// chains, which the parser builds iteratively.
pub const MAX_TOKENS: usize = 1024;

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `OR`
    Or,
    /// `AND`
    And,
    /// `=`
    Eq,
    /// `<>` or `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `||`
    Concat,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `NOT`
    Not,
    /// `-`
    Neg,
}

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal value.
    Literal(Value),
    /// Attribute of the context feature.
    Field(String),
    /// Context variable, sigil stripped.
    Variable(String),
    /// Unary operation.
    Unary {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        expr: Box<Expr>,
    },
    /// Binary operation.
    Binary {
        /// Operator.
        op: BinaryOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// `expr IS [NOT] NULL`.
    IsNull {
        /// Tested expression.
        expr: Box<Expr>,
        /// True for `IS NOT NULL`.
        negated: bool,
    },
    /// Function call, name lowercased.
    Call {
        /// Function name.
        name: String,
        /// Arguments.
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    QuotedIdent(String),
    Var(String),
    Op(&'static str),
    LParen,
    RParen,
    Comma,
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
}

impl Lexer {
    fn new(src: &str) -> Self {
        Self { chars: src.chars().collect(), pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn error(&self, message: impl Into<String>) -> ExpressionError {
        ExpressionError::Parse { position: self.pos, message: message.into() }
    }

    fn tokenize(mut self) -> Result<Vec<(usize, Token)>, ExpressionError> {
        let mut tokens = Vec::new();
        while let Some(c) = self.peek() {
            let start = self.pos;
            if c.is_whitespace() {
                self.pos += 1;
                continue;
            }
            let token = match c {
                '(' => {
                    self.pos += 1;
                    Token::LParen
                }
                ')' => {
                    self.pos += 1;
                    Token::RParen
                }
                ',' => {
                    self.pos += 1;
                    Token::Comma
                }
                '\'' => Token::Str(self.quoted('\'')?),
                '"' => Token::QuotedIdent(self.quoted('"')?),
                '$' | '@' => {
                    self.pos += 1;
                    let name = self.word();
                    if name.is_empty() {
                        return Err(self.error("expected variable name"));
                    }
                    Token::Var(name)
                }
                c if c.is_ascii_digit() || (c == '.' && self.peek_at(1).is_some_and(|d| d.is_ascii_digit())) => {
                    self.number()?
                }
                c if c.is_alphabetic() || c == '_' => Token::Ident(self.word()),
                _ => Token::Op(self.operator()?),
            };
            tokens.push((start, token));
        }
        Ok(tokens)
    }

    fn word(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    /// Reads a quoted run; a doubled quote character escapes itself.
    fn quoted(&mut self, quote: char) -> Result<String, ExpressionError> {
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated quoted string")),
                Some(c) if c == quote => {
                    if self.peek_at(1) == Some(quote) {
                        out.push(quote);
                        self.pos += 2;
                    } else {
                        self.pos += 1;
                        return Ok(out);
                    }
                }
                Some(c) => {
                    out.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn number(&mut self) -> Result<Token, ExpressionError> {
        let start = self.pos;
        let mut seen_dot = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.pos += 1;
            } else if c == '.' && !seen_dot {
                seen_dot = true;
                self.pos += 1;
            } else {
                break;
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if seen_dot {
            text.parse().map(Token::Float).map_err(|_| self.error(format!("invalid number '{}'", text)))
        } else {
            text.parse().map(Token::Int).map_err(|_| self.error(format!("invalid number '{}'", text)))
        }
    }

    fn operator(&mut self) -> Result<&'static str, ExpressionError> {
        let two: String = self.chars[self.pos..(self.pos + 2).min(self.chars.len())].iter().collect();
        for op in ["||", "<>", "!=", "<=", ">="] {
            if two == op {
                self.pos += 2;
                return Ok(op);
            }
        }
        let op = match self.peek() {
            Some('+') => "+",
            Some('-') => "-",
            Some('*') => "*",
            Some('/') => "/",
            Some('%') => "%",
            Some('=') => "=",
            Some('<') => "<",
            Some('>') => ">",
            Some(c) => return Err(self.error(format!("unexpected character '{}'", c))),
            None => return Err(self.error("unexpected end of input")),
        };
        self.pos += 1;
        Ok(op)
    }
}

/// Parse expression text into a tree.
pub fn parse(text: &str) -> Result<Expr, ExpressionError> {
    let tokens = Lexer::new(text).tokenize()?;
    if tokens.is_empty() {
        return Err(ExpressionError::Parse { position: 0, message: "empty expression".to_string() });
    }
    if let Some((at, _)) = tokens.get(MAX_TOKENS) {
        return Err(ExpressionError::Parse {
            position: *at,
            message: format!("expression longer than {} tokens", MAX_TOKENS),
        });
    }
    let mut parser = Parser { tokens, pos: 0, len: text.chars().count(), depth: 0 };
    let expr = parser.parse_or()?;
    if let Some((at, token)) = parser.tokens.get(parser.pos) {
        return Err(ExpressionError::Parse {
            position: *at,
            message: format!("unexpected token {:?}", token),
        });
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    len: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map(|(p, _)| *p).unwrap_or(self.len)
    }

    fn error(&self, message: impl Into<String>) -> ExpressionError {
        ExpressionError::Parse { position: self.position(), message: message.into() }
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        self.pos += 1;
        token
    }

    fn keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(s)) if s.eq_ignore_ascii_case(kw))
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if self.keyword(kw) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_op(&mut self, ops: &[&'static str]) -> Option<&'static str> {
        match self.peek() {
            Some(Token::Op(op)) if ops.contains(op) => {
                let op = *op;
                self.pos += 1;
                Some(op)
            }
            _ => None,
        }
    }

    /// Run a recursive production one nesting level deeper.
    fn nested(&mut self, production: fn(&mut Self) -> Result<Expr, ExpressionError>) -> Result<Expr, ExpressionError> {
        if self.depth >= MAX_NESTING {
            return Err(self.error(format!("expression nested deeper than {} levels", MAX_NESTING)));
        }
        self.depth += 1;
        let result = production(self);
        self.depth -= 1;
        result
    }

    fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary { op, left: Box::new(left), right: Box::new(right) }
    }

    fn parse_or(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_and()?;
        while self.eat_keyword("or") {
            let right = self.parse_and()?;
            left = Self::binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_not()?;
        while self.eat_keyword("and") {
            let right = self.parse_not()?;
            left = Self::binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ExpressionError> {
        if self.eat_keyword("not") {
            let expr = self.nested(Self::parse_not)?;
            return Ok(Expr::Unary { op: UnaryOp::Not, expr: Box::new(expr) });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_additive()?;
        loop {
            if self.eat_keyword("is") {
                let negated = self.eat_keyword("not");
                if !self.eat_keyword("null") {
                    return Err(self.error("expected NULL after IS"));
                }
                left = Expr::IsNull { expr: Box::new(left), negated };
                continue;
            }
            let op = match self.eat_op(&["=", "<>", "!=", "<", "<=", ">", ">="]) {
                Some("=") => BinaryOp::Eq,
                Some("<>") | Some("!=") => BinaryOp::Ne,
                Some("<") => BinaryOp::Lt,
                Some("<=") => BinaryOp::Le,
                Some(">") => BinaryOp::Gt,
                Some(">=") => BinaryOp::Ge,
                _ => return Ok(left),
            };
            let right = self.parse_additive()?;
            left = Self::binary(op, left, right);
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_multiplicative()?;
        while let Some(op) = self.eat_op(&["+", "-", "||"]) {
            let op = match op {
                "+" => BinaryOp::Add,
                "-" => BinaryOp::Sub,
                _ => BinaryOp::Concat,
            };
            let right = self.parse_multiplicative()?;
            left = Self::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_unary()?;
        while let Some(op) = self.eat_op(&["*", "/", "%"]) {
            let op = match op {
                "*" => BinaryOp::Mul,
                "/" => BinaryOp::Div,
                _ => BinaryOp::Mod,
            };
            let right = self.parse_unary()?;
            left = Self::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExpressionError> {
        if self.eat_op(&["-"]).is_some() {
            let expr = self.nested(Self::parse_unary)?;
            return Ok(Expr::Unary { op: UnaryOp::Neg, expr: Box::new(expr) });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ExpressionError> {
        let at = self.position();
        match self.advance() {
            Some(Token::Int(i)) => Ok(Expr::Literal(Value::Int(i))),
            Some(Token::Float(f)) => Ok(Expr::Literal(Value::Float(f))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::Text(s))),
            Some(Token::QuotedIdent(name)) => Ok(Expr::Field(name)),
            Some(Token::Var(name)) => Ok(Expr::Variable(name)),
            Some(Token::LParen) => {
                let expr = self.nested(Self::parse_or)?;
                match self.advance() {
                    Some(Token::RParen) => Ok(expr),
                    _ => Err(ExpressionError::Parse { position: at, message: "unbalanced parenthesis".to_string() }),
                }
            }
            Some(Token::Ident(word)) => {
                if matches!(self.peek(), Some(Token::LParen)) {
                    self.pos += 1;
                    let args = self.parse_args()?;
                    return Ok(Expr::Call { name: word.to_lowercase(), args });
                }
                match word.to_ascii_lowercase().as_str() {
                    "true" => Ok(Expr::Literal(Value::Bool(true))),
                    "false" => Ok(Expr::Literal(Value::Bool(false))),
                    "null" => Ok(Expr::Literal(Value::Null)),
                    "and" | "or" | "not" | "is" => Err(ExpressionError::Parse {
                        position: at,
                        message: format!("unexpected keyword '{}'", word),
                    }),
                    _ => Ok(Expr::Field(word)),
                }
            }
            Some(token) => Err(ExpressionError::Parse { position: at, message: format!("unexpected token {:?}", token) }),
            None => Err(ExpressionError::Parse { position: at, message: "unexpected end of input".to_string() }),
        }
    }

    /// Arguments after an opening parenthesis, through the closing one.
    fn parse_args(&mut self) -> Result<Vec<Expr>, ExpressionError> {
        let mut args = Vec::new();
        if matches!(self.peek(), Some(Token::RParen)) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.nested(Self::parse_or)?);
            match self.advance() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => return Ok(args),
                _ => return Err(self.error("expected ',' or ')' in argument list")),
            }
        }
    }
}
