use crate::traits::SlopeFunction;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Longest expression text accepted by the parser, in characters.
pub const MAX_EXPRESSION_LEN: usize = 4096;

/// Deepest nesting of parentheses, unary operators and exponents accepted by the parser.
pub const MAX_NESTING: usize = 64;

/// Divisors with a magnitude below this are treated as zero.
pub const DIVISION_EPSILON: f64 = f64::EPSILON;

const MAX_ARITY: usize = 2;

// --- Errors ---

/// Raised while turning text into an [`Expression`]. Positions are character offsets.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("syntax error at position {position}: {message}")]
    Syntax { message: String, position: usize },
    #[error("unsupported construct at position {position}: {construct}")]
    UnsupportedConstruct { construct: String, position: usize },
    #[error("`{function}` expects {expected} argument(s), got {found} (position {position})")]
    Arity {
        function: &'static str,
        expected: Arity,
        found: usize,
        position: usize,
    },
    #[error("expression is longer than {limit} characters")]
    TooLong { limit: usize },
    #[error("expression nests deeper than {limit} levels")]
    TooDeep { limit: usize },
}

/// Raised while evaluating a parsed expression at a point.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("division by zero")]
    DivisionByZero,
    #[error("`{operation}` produced a non-finite value")]
    NonFiniteResult { operation: &'static str },
    #[error("`{function}` expects {expected} argument(s), got {found}")]
    Arity {
        function: &'static str,
        expected: Arity,
        found: usize,
    },
}

/// Boundary-level classification of an evaluation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnsupportedConstruct,
    DivisionByZero,
    NonFiniteResult,
    ArityError,
    ParseError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::UnsupportedConstruct => "UnsupportedConstruct",
            ErrorKind::DivisionByZero => "DivisionByZero",
            ErrorKind::NonFiniteResult => "NonFiniteResult",
            ErrorKind::ArityError => "ArityError",
            ErrorKind::ParseError => "ParseError",
        };
        f.write_str(label)
    }
}

impl ParseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ParseError::UnsupportedConstruct { .. } => ErrorKind::UnsupportedConstruct,
            ParseError::Arity { .. } => ErrorKind::ArityError,
            ParseError::Syntax { .. } | ParseError::TooLong { .. } | ParseError::TooDeep { .. } => {
                ErrorKind::ParseError
            }
        }
    }
}

impl EvalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EvalError::Parse(err) => err.kind(),
            EvalError::DivisionByZero => ErrorKind::DivisionByZero,
            EvalError::NonFiniteResult { .. } => ErrorKind::NonFiniteResult,
            EvalError::Arity { .. } => ErrorKind::ArityError,
        }
    }
}

// --- Whitelist tables ---

/// Inclusive bounds on the number of arguments a function takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    pub min: usize,
    pub max: usize,
}

impl Arity {
    const fn exactly(n: usize) -> Self {
        Self { min: n, max: n }
    }

    pub fn accepts(&self, count: usize) -> bool {
        (self.min..=self.max).contains(&count)
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.min == self.max {
            write!(f, "{}", self.min)
        } else {
            write!(f, "{} to {}", self.min, self.max)
        }
    }
}

/// Functions callable from an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Asinh,
    Acosh,
    Atanh,
    Exp,
    Ln,
    Log10,
    Log2,
    Sqrt,
    Pow,
    Abs,
    Floor,
    Ceil,
    Round,
    Factorial,
}

/// Every name the parser resolves to a function. Aliases map to the same variant.
static FUNCTIONS: &[(&str, Function)] = &[
    ("sin", Function::Sin),
    ("cos", Function::Cos),
    ("tan", Function::Tan),
    ("arcsin", Function::Asin),
    ("arccos", Function::Acos),
    ("arctan", Function::Atan),
    ("asin", Function::Asin),
    ("acos", Function::Acos),
    ("atan", Function::Atan),
    ("sinh", Function::Sinh),
    ("cosh", Function::Cosh),
    ("tanh", Function::Tanh),
    ("arcsinh", Function::Asinh),
    ("arccosh", Function::Acosh),
    ("arctanh", Function::Atanh),
    ("asinh", Function::Asinh),
    ("acosh", Function::Acosh),
    ("atanh", Function::Atanh),
    ("exp", Function::Exp),
    ("log", Function::Ln),
    ("ln", Function::Ln),
    ("log10", Function::Log10),
    ("log2", Function::Log2),
    ("sqrt", Function::Sqrt),
    ("pow", Function::Pow),
    ("abs", Function::Abs),
    ("fabs", Function::Abs),
    ("floor", Function::Floor),
    ("ceil", Function::Ceil),
    ("round", Function::Round),
    ("factorial", Function::Factorial),
];

/// Named constants. `euler` is an alias of `e`.
static CONSTANTS: &[(&str, Constant)] = &[
    ("pi", Constant::Pi),
    ("e", Constant::E),
    ("euler", Constant::E),
    ("inf", Constant::Inf),
];

impl Function {
    pub fn lookup(name: &str) -> Option<Function> {
        FUNCTIONS
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, function)| *function)
    }

    /// Canonical name, used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            Function::Sin => "sin",
            Function::Cos => "cos",
            Function::Tan => "tan",
            Function::Asin => "arcsin",
            Function::Acos => "arccos",
            Function::Atan => "arctan",
            Function::Sinh => "sinh",
            Function::Cosh => "cosh",
            Function::Tanh => "tanh",
            Function::Asinh => "arcsinh",
            Function::Acosh => "arccosh",
            Function::Atanh => "arctanh",
            Function::Exp => "exp",
            Function::Ln => "log",
            Function::Log10 => "log10",
            Function::Log2 => "log2",
            Function::Sqrt => "sqrt",
            Function::Pow => "pow",
            Function::Abs => "abs",
            Function::Floor => "floor",
            Function::Ceil => "ceil",
            Function::Round => "round",
            Function::Factorial => "factorial",
        }
    }

    pub fn category(self) -> &'static str {
        match self {
            Function::Sin
            | Function::Cos
            | Function::Tan
            | Function::Asin
            | Function::Acos
            | Function::Atan => "trigonometric",
            Function::Sinh
            | Function::Cosh
            | Function::Tanh
            | Function::Asinh
            | Function::Acosh
            | Function::Atanh => "hyperbolic",
            Function::Exp | Function::Ln | Function::Log10 | Function::Log2 => "exponential",
            Function::Sqrt | Function::Pow | Function::Abs => "power",
            Function::Floor | Function::Ceil | Function::Round => "rounding",
            Function::Factorial => "special",
        }
    }

    pub fn arity(self) -> Arity {
        match self {
            Function::Pow => Arity::exactly(2),
            Function::Round => Arity { min: 1, max: 2 },
            _ => Arity::exactly(1),
        }
    }

    /// Applies the function. `args` must already satisfy [`Function::arity`].
    fn apply(self, args: &[f64]) -> Result<f64, EvalError> {
        if !self.arity().accepts(args.len()) {
            return Err(EvalError::Arity {
                function: self.name(),
                expected: self.arity(),
                found: args.len(),
            });
        }
        let a = args[0];
        let value = match self {
            Function::Sin => a.sin(),
            Function::Cos => a.cos(),
            Function::Tan => a.tan(),
            Function::Asin => a.asin(),
            Function::Acos => a.acos(),
            Function::Atan => a.atan(),
            Function::Sinh => a.sinh(),
            Function::Cosh => a.cosh(),
            Function::Tanh => a.tanh(),
            Function::Asinh => a.asinh(),
            Function::Acosh => a.acosh(),
            Function::Atanh => a.atanh(),
            Function::Exp => a.exp(),
            Function::Ln => a.ln(),
            Function::Log10 => a.log10(),
            Function::Log2 => a.log2(),
            Function::Sqrt => a.sqrt(),
            Function::Pow => a.powf(args[1]),
            Function::Abs => a.abs(),
            Function::Floor => a.floor(),
            Function::Ceil => a.ceil(),
            Function::Round => match args.get(1) {
                None => a.round_ties_even(),
                Some(&decimals) => round_to_decimals(a, decimals)
                    .ok_or(EvalError::NonFiniteResult { operation: "round" })?,
            },
            Function::Factorial => {
                factorial(a).ok_or(EvalError::NonFiniteResult { operation: "factorial" })?
            }
        };
        check_finite(self.name(), value, args)
    }
}

fn round_to_decimals(value: f64, decimals: f64) -> Option<f64> {
    if decimals.is_nan() || decimals.fract() != 0.0 {
        return None;
    }
    // Past the f64 exponent range, rounding either keeps every digit or none.
    if decimals > 308.0 {
        return Some(value);
    }
    if decimals < -308.0 {
        return Some(0.0);
    }
    let scale = 10f64.powi(decimals as i32);
    let scaled = value * scale;
    if !scaled.is_finite() {
        return Some(value);
    }
    Some(scaled.round_ties_even() / scale)
}

/// `n!` for non-negative integral `n`; `None` outside that domain or on overflow.
fn factorial(n: f64) -> Option<f64> {
    if !n.is_finite() || n < 0.0 || n.fract() != 0.0 || n > 170.0 {
        return None;
    }
    Some((2..=n as u64).fold(1.0, |acc, k| acc * k as f64))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constant {
    Pi,
    E,
    Inf,
}

impl Constant {
    pub fn lookup(name: &str) -> Option<Constant> {
        CONSTANTS
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, constant)| *constant)
    }

    pub fn value(self) -> f64 {
        match self {
            Constant::Pi => std::f64::consts::PI,
            Constant::E => std::f64::consts::E,
            Constant::Inf => f64::INFINITY,
        }
    }
}

/// A name an expression may read: one of the two state variables or a constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    X,
    Y,
    Constant(Constant),
}

impl Symbol {
    pub fn lookup(name: &str) -> Option<Symbol> {
        match name {
            "x" => Some(Symbol::X),
            "y" => Some(Symbol::Y),
            _ => Constant::lookup(name).map(Symbol::Constant),
        }
    }

    fn value(self, x: f64, y: f64) -> f64 {
        match self {
            Symbol::X => x,
            Symbol::Y => y,
            Symbol::Constant(constant) => constant.value(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "^",
        }
    }

    fn apply(self, a: f64, b: f64) -> Result<f64, EvalError> {
        let value = match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => {
                if b.abs() < DIVISION_EPSILON {
                    return Err(EvalError::DivisionByZero);
                }
                a / b
            }
            BinaryOp::Pow => a.powf(b),
        };
        check_finite(self.symbol(), value, &[a, b])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Neg,
}

impl UnaryOp {
    fn apply(self, a: f64) -> f64 {
        match self {
            UnaryOp::Plus => a,
            UnaryOp::Neg => -a,
        }
    }
}

/// NaN is always an error. Infinity is an error only when every input was finite,
/// so an explicit `inf` may flow through (`exp(-inf)` is 0).
fn check_finite(operation: &'static str, value: f64, inputs: &[f64]) -> Result<f64, EvalError> {
    if value.is_nan() || (value.is_infinite() && inputs.iter().all(|v| v.is_finite())) {
        return Err(EvalError::NonFiniteResult { operation });
    }
    Ok(value)
}

// --- AST ---

/// Abstract Syntax Tree nodes for expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(f64),
    Variable(Symbol),
    BinaryOp(BinaryOp, Box<Expr>, Box<Expr>),
    UnaryOp(UnaryOp, Box<Expr>),
    Call(Function, Vec<Expr>),
}

impl Expr {
    /// Recursively evaluates the tree with `x` and `y` bound to the given values.
    pub fn evaluate(&self, x: f64, y: f64) -> Result<f64, EvalError> {
        match self {
            Expr::Literal(value) => Ok(*value),
            Expr::Variable(symbol) => Ok(symbol.value(x, y)),
            Expr::BinaryOp(op, left, right) => {
                let a = left.evaluate(x, y)?;
                let b = right.evaluate(x, y)?;
                op.apply(a, b)
            }
            Expr::UnaryOp(op, operand) => Ok(op.apply(operand.evaluate(x, y)?)),
            Expr::Call(function, args) => {
                if args.len() > MAX_ARITY {
                    return Err(EvalError::Arity {
                        function: function.name(),
                        expected: function.arity(),
                        found: args.len(),
                    });
                }
                let mut values = [0.0; MAX_ARITY];
                for (slot, arg) in values.iter_mut().zip(args) {
                    *slot = arg.evaluate(x, y)?;
                }
                function.apply(&values[..args.len()])
            }
        }
    }
}

/// A parsed, immutable `f(x, y)` together with the text it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    root: Expr,
}

impl Expression {
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        parse(input)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> &Expr {
        &self.root
    }

    /// Evaluates at `(x, y)`. The result is always finite.
    pub fn evaluate(&self, x: f64, y: f64) -> Result<f64, EvalError> {
        let value = self.root.evaluate(x, y)?;
        if !value.is_finite() {
            return Err(EvalError::NonFiniteResult { operation: "result" });
        }
        Ok(value)
    }
}

impl FromStr for Expression {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

impl SlopeFunction for Expression {
    fn slope(&self, x: f64, y: f64) -> Result<f64, EvalError> {
        self.evaluate(x, y)
    }
}

/// Evaluates a parsed expression at `(x, y)`.
pub fn evaluate(expr: &Expression, x: f64, y: f64) -> Result<f64, EvalError> {
    expr.evaluate(x, y)
}

/// Point at which [`validate`] probes an expression.
pub const PROBE_POINT: (f64, f64) = (1.0, 1.0);

/// Heuristic check: the text parses and evaluates to a finite value at `x = 1, y = 1`.
/// A failure at the probe point does not mean the expression is invalid everywhere.
pub fn validate(input: &str) -> bool {
    parse(input)
        .map(|expr| expr.evaluate(PROBE_POINT.0, PROBE_POINT.1).is_ok())
        .unwrap_or(false)
}

// --- Parser ---

/// Parses a string expression into an [`Expression`].
pub fn parse(input: &str) -> Result<Expression, ParseError> {
    if input.chars().count() > MAX_EXPRESSION_LEN {
        return Err(ParseError::TooLong {
            limit: MAX_EXPRESSION_LEN,
        });
    }
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        end: input.chars().count(),
    };
    let root = parser.parse_expression()?;
    if let Some((token, position)) = parser.peek() {
        return Err(ParseError::Syntax {
            message: format!("unexpected {}", token.describe()),
            position,
        });
    }
    Ok(Expression {
        source: input.to_string(),
        root,
    })
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Identifier(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
    Comma,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {n}"),
            Token::Identifier(name) => format!("identifier `{name}`"),
            Token::Plus => "`+`".to_string(),
            Token::Minus => "`-`".to_string(),
            Token::Star => "`*`".to_string(),
            Token::Slash => "`/`".to_string(),
            Token::Caret => "`^`".to_string(),
            Token::LParen => "`(`".to_string(),
            Token::RParen => "`)`".to_string(),
            Token::Comma => "`,`".to_string(),
        }
    }
}

fn unsupported(construct: impl Into<String>, position: usize) -> ParseError {
    ParseError::UnsupportedConstruct {
        construct: construct.into(),
        position,
    }
}

fn tokenize(input: &str) -> Result<Vec<(Token, usize)>, ParseError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() || (c == '.' && next.is_some_and(|d| d.is_ascii_digit())) {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            // Exponent only when digits follow, so `2e` stays a syntax error.
            if i < chars.len() && matches!(chars[i], 'e' | 'E') {
                let mut j = i + 1;
                if j < chars.len() && matches!(chars[j], '+' | '-') {
                    j += 1;
                }
                if j < chars.len() && chars[j].is_ascii_digit() {
                    i = j;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            let text: String = chars[start..i].iter().collect();
            let value = text.parse::<f64>().map_err(|_| ParseError::Syntax {
                message: format!("invalid number literal `{text}`"),
                position: start,
            })?;
            tokens.push((Token::Number(value), start));
        } else if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push((Token::Identifier(chars[start..i].iter().collect()), start));
        } else {
            let start = i;
            let token = match (c, next) {
                ('*', Some('*')) => {
                    i += 1;
                    Token::Caret
                }
                ('/', Some('/')) => return Err(unsupported("floor division `//`", i)),
                ('+', _) => Token::Plus,
                ('-', _) => Token::Minus,
                ('*', _) => Token::Star,
                ('/', _) => Token::Slash,
                ('^', _) => Token::Caret,
                ('(', _) => Token::LParen,
                (')', _) => Token::RParen,
                (',', _) => Token::Comma,
                ('=', Some('=')) | ('<', _) | ('>', _) | ('!', _) => {
                    return Err(unsupported("comparison operator", i))
                }
                ('=', _) => return Err(unsupported("assignment or keyword argument `=`", i)),
                ('.', _) => return Err(unsupported("attribute access `.`", i)),
                ('[', _) | (']', _) => return Err(unsupported("indexing or list literal", i)),
                ('{', _) | ('}', _) => return Err(unsupported("set or dict literal", i)),
                ('\'', _) | ('"', _) => return Err(unsupported("string literal", i)),
                ('%', _) => return Err(unsupported("modulo operator `%`", i)),
                ('&', _) | ('|', _) | ('~', _) => return Err(unsupported("bitwise operator", i)),
                (':', _) => return Err(unsupported("slice or lambda body `:`", i)),
                (';', _) => return Err(unsupported("statement separator `;`", i)),
                _ => return Err(unsupported(format!("character `{c}`"), i)),
            };
            tokens.push((token, start));
            i += 1;
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    depth: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<(Token, usize)> {
        self.tokens.get(self.pos).cloned()
    }

    fn consume(&mut self) -> Option<(Token, usize)> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token) -> Result<usize, ParseError> {
        match self.consume() {
            Some((token, position)) if token == expected => Ok(position),
            Some((token, position)) => Err(ParseError::Syntax {
                message: format!("expected {}, found {}", expected.describe(), token.describe()),
                position,
            }),
            None => Err(ParseError::Syntax {
                message: format!("expected {}, found end of input", expected.describe()),
                position: self.end,
            }),
        }
    }

    fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_term()?;

        while let Some((token, _)) = self.peek() {
            let op = match token {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.consume();
            let right = self.parse_term()?;
            left = Expr::BinaryOp(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;

        while let Some((token, _)) = self.peek() {
            let op = match token {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                _ => break,
            };
            self.consume();
            let right = self.parse_unary()?;
            left = Expr::BinaryOp(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    /// Every recursive path passes through here, so this is where nesting is bounded.
    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(ParseError::TooDeep { limit: MAX_NESTING });
        }
        let result = self.parse_signed();
        self.depth -= 1;
        result
    }

    fn parse_signed(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek() {
            Some((Token::Minus, _)) => UnaryOp::Neg,
            Some((Token::Plus, _)) => UnaryOp::Plus,
            _ => return self.parse_power(),
        };
        self.consume();
        let operand = self.parse_unary()?;
        Ok(Expr::UnaryOp(op, Box::new(operand)))
    }

    /// `a ^ b ^ c` groups as `a ^ (b ^ c)`; `-a ^ b` is `-(a ^ b)`.
    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let base = self.parse_primary()?;
        if let Some((Token::Caret, _)) = self.peek() {
            self.consume();
            let exponent = self.parse_unary()?;
            return Ok(Expr::BinaryOp(BinaryOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.consume() {
            Some((Token::Number(n), _)) => Ok(Expr::Literal(n)),
            Some((Token::Identifier(name), position)) => {
                if let Some((Token::LParen, _)) = self.peek() {
                    self.consume();
                    self.parse_call(&name, position)
                } else {
                    Symbol::lookup(&name)
                        .map(Expr::Variable)
                        .ok_or_else(|| unsupported(format!("identifier `{name}`"), position))
                }
            }
            Some((Token::LParen, _)) => {
                let expr = self.parse_expression()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            Some((token, position)) => Err(ParseError::Syntax {
                message: format!("unexpected {}", token.describe()),
                position,
            }),
            None => Err(ParseError::Syntax {
                message: "unexpected end of input".to_string(),
                position: self.end,
            }),
        }
    }

    fn parse_call(&mut self, name: &str, position: usize) -> Result<Expr, ParseError> {
        let function = Function::lookup(name)
            .ok_or_else(|| unsupported(format!("call to `{name}`"), position))?;

        let mut args = Vec::new();
        if let Some((Token::RParen, _)) = self.peek() {
            self.consume();
        } else {
            loop {
                args.push(self.parse_expression()?);
                match self.consume() {
                    Some((Token::Comma, _)) => continue,
                    Some((Token::RParen, _)) => break,
                    Some((token, at)) => {
                        return Err(ParseError::Syntax {
                            message: format!("expected `,` or `)`, found {}", token.describe()),
                            position: at,
                        })
                    }
                    None => {
                        return Err(ParseError::Syntax {
                            message: "expected `)`, found end of input".to_string(),
                            position: self.end,
                        })
                    }
                }
            }
        }

        if !function.arity().accepts(args.len()) {
            return Err(ParseError::Arity {
                function: function.name(),
                expected: function.arity(),
                found: args.len(),
                position,
            });
        }
        Ok(Expr::Call(function, args))
    }
}

// --- Catalog ---

#[derive(Debug, Clone, Serialize)]
pub struct FunctionGroup {
    pub category: &'static str,
    pub names: Vec<&'static str>,
}

/// Everything an expression may reference, for help text in front ends.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolCatalog {
    pub functions: Vec<FunctionGroup>,
    pub constants: Vec<&'static str>,
    pub variables: Vec<&'static str>,
    pub operators: Vec<&'static str>,
}

pub fn allowed_symbols() -> SymbolCatalog {
    let mut functions: Vec<FunctionGroup> = Vec::new();
    for &(name, function) in FUNCTIONS {
        let category = function.category();
        match functions.iter_mut().find(|group| group.category == category) {
            Some(group) => group.names.push(name),
            None => functions.push(FunctionGroup {
                category,
                names: vec![name],
            }),
        }
    }

    SymbolCatalog {
        functions,
        constants: CONSTANTS.iter().map(|(name, _)| *name).collect(),
        variables: vec!["x", "y"],
        operators: vec!["+", "-", "*", "/", "^", "**", "()"],
    }
}
