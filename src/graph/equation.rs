//! Equation parsing for dynamic zones
//!
//! Grammar: `DEST = EXPR` where `EXPR` is infix over `$field` references,
//! numeric literals, parentheses and `+ - * /` with conventional precedence
//! and left associativity; a unary leading minus is allowed. Parsing emits
//! a flat list of binary operations threaded through `_tmp_N` temporaries;
//! the reverse direction reconstructs one equation per final destination
//! with minimal parentheses.

use strum_macros::{Display, EnumString, IntoStaticStr};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum EquationError {
    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("expected {expected}, found {found}")]
    UnexpectedToken { expected: String, found: String },

    #[error("unexpected end of equation")]
    UnexpectedEnd,

    #[error("empty field reference")]
    EmptyField,

    #[error("unknown operation: {0}")]
    UnknownOperation(String),
}

/// The four binary operators, named the way math nodes are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl BinaryOp {
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Add | BinaryOp::Subtract => 1,
            BinaryOp::Multiply | BinaryOp::Divide => 2,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            BinaryOp::Add => '+',
            BinaryOp::Subtract => '-',
            BinaryOp::Multiply => '*',
            BinaryOp::Divide => '/',
        }
    }
}

/// A source or operand of a flat operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A column name (`$name` in equation syntax).
    Field(String),
    /// A `_tmp_N` intermediate produced earlier in the same zone.
    Temp(String),
    /// A numeric literal.
    Number(f64),
}

impl Operand {
    pub fn from_name(name: &str) -> Operand {
        if name.starts_with("_tmp_") {
            Operand::Temp(name.to_owned())
        } else {
            Operand::Field(name.to_owned())
        }
    }

    /// The temp name, when this operand is one.
    pub fn temp_name(&self) -> Option<&str> {
        match self {
            Operand::Temp(name) => Some(name),
            _ => None,
        }
    }
}

/// One binary operation of the flat list: `dest = src op operand`.
#[derive(Debug, Clone, PartialEq)]
pub struct MathOp {
    pub op: BinaryOp,
    pub src: Operand,
    pub operand: Operand,
    pub dest: String,
}

// === Tokenizer ===

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Field(String),
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Eq,
    End,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(s) => format!("identifier '{s}'"),
            Token::Field(s) => format!("field '${s}'"),
            Token::Number(n) => format!("number {n}"),
            Token::Plus => "'+'".into(),
            Token::Minus => "'-'".into(),
            Token::Star => "'*'".into(),
            Token::Slash => "'/'".into(),
            Token::LParen => "'('".into(),
            Token::RParen => "')'".into(),
            Token::Eq => "'='".into(),
            Token::End => "end of input".into(),
        }
    }
}

struct Tokenizer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            pos: 0,
        }
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.input.len() && self.input[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn next(&mut self) -> Result<Token, EquationError> {
        self.skip_whitespace();
        let Some(&c) = self.input.get(self.pos) else {
            return Ok(Token::End);
        };
        self.pos += 1;
        match c {
            b'+' => Ok(Token::Plus),
            b'-' => Ok(Token::Minus),
            b'*' => Ok(Token::Star),
            b'/' => Ok(Token::Slash),
            b'(' => Ok(Token::LParen),
            b')' => Ok(Token::RParen),
            b'=' => Ok(Token::Eq),
            b'$' => {
                let start = self.pos;
                while self
                    .input
                    .get(self.pos)
                    .is_some_and(|c| c.is_ascii_alphanumeric() || *c == b'_')
                {
                    self.pos += 1;
                }
                if self.pos == start {
                    return Err(EquationError::EmptyField);
                }
                Ok(Token::Field(
                    String::from_utf8_lossy(&self.input[start..self.pos]).into_owned(),
                ))
            }
            c if c.is_ascii_digit() || c == b'.' => {
                let start = self.pos - 1;
                while self
                    .input
                    .get(self.pos)
                    .is_some_and(|c| c.is_ascii_digit() || *c == b'.')
                {
                    self.pos += 1;
                }
                let text = String::from_utf8_lossy(&self.input[start..self.pos]).into_owned();
                text.parse()
                    .map(Token::Number)
                    .map_err(|_| EquationError::UnexpectedChar {
                        ch: c as char,
                        pos: start,
                    })
            }
            c if (c as char).is_alphabetic() || c == b'_' => {
                let start = self.pos - 1;
                while self
                    .input
                    .get(self.pos)
                    .is_some_and(|c| c.is_ascii_alphanumeric() || *c == b'_')
                {
                    self.pos += 1;
                }
                Ok(Token::Ident(
                    String::from_utf8_lossy(&self.input[start..self.pos]).into_owned(),
                ))
            }
            other => Err(EquationError::UnexpectedChar {
                ch: other as char,
                pos: self.pos - 1,
            }),
        }
    }
}

// === Parser ===

#[derive(Debug)]
enum Ast {
    Number(f64),
    Field(String),
    BinOp {
        op: BinaryOp,
        left: Box<Ast>,
        right: Box<Ast>,
    },
}

struct Parser<'a> {
    tokenizer: Tokenizer<'a>,
    current: Token,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Result<Self, EquationError> {
        let mut tokenizer = Tokenizer::new(input);
        let current = tokenizer.next()?;
        Ok(Self { tokenizer, current })
    }

    fn advance(&mut self) -> Result<Token, EquationError> {
        let next = self.tokenizer.next()?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn expect(&mut self, token: Token) -> Result<(), EquationError> {
        if self.current == token {
            self.advance()?;
            Ok(())
        } else {
            Err(EquationError::UnexpectedToken {
                expected: token.describe(),
                found: self.current.describe(),
            })
        }
    }

    /// IDENT '=' expression END
    fn parse_equation(&mut self) -> Result<(String, Ast), EquationError> {
        let dest = match self.advance()? {
            Token::Ident(name) => name,
            other => {
                return Err(EquationError::UnexpectedToken {
                    expected: "destination identifier".into(),
                    found: other.describe(),
                });
            }
        };
        self.expect(Token::Eq)?;
        let expr = self.parse_expression()?;
        self.expect(Token::End)?;
        Ok((dest, expr))
    }

    /// term (('+' | '-') term)*
    fn parse_expression(&mut self) -> Result<Ast, EquationError> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.current {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Subtract,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_term()?;
            left = Ast::BinOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    /// factor (('*' | '/') factor)*
    fn parse_term(&mut self) -> Result<Ast, EquationError> {
        let mut left = self.parse_factor()?;
        loop {
            let op = match self.current {
                Token::Star => BinaryOp::Multiply,
                Token::Slash => BinaryOp::Divide,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_factor()?;
            left = Ast::BinOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    /// primary | '-' factor
    fn parse_factor(&mut self) -> Result<Ast, EquationError> {
        if self.current == Token::Minus {
            self.advance()?;
            let inner = self.parse_factor()?;
            // A negated literal folds; anything else becomes 0 - x.
            return Ok(match inner {
                Ast::Number(n) => Ast::Number(-n),
                other => Ast::BinOp {
                    op: BinaryOp::Subtract,
                    left: Box::new(Ast::Number(0.0)),
                    right: Box::new(other),
                },
            });
        }
        self.parse_primary()
    }

    /// FIELD | NUMBER | '(' expression ')'
    fn parse_primary(&mut self) -> Result<Ast, EquationError> {
        match self.advance()? {
            Token::Field(name) => Ok(Ast::Field(name)),
            Token::Number(n) => Ok(Ast::Number(n)),
            Token::LParen => {
                let inner = self.parse_expression()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::End => Err(EquationError::UnexpectedEnd),
            other => Err(EquationError::UnexpectedToken {
                expected: "field, number or '('".into(),
                found: other.describe(),
            }),
        }
    }
}

/// Post-order emission of the flat op list.
fn emit(ast: Ast, ops: &mut Vec<MathOp>, tmp_counter: &mut usize) -> Operand {
    match ast {
        Ast::Number(n) => Operand::Number(n),
        Ast::Field(name) => Operand::Field(name),
        Ast::BinOp { op, left, right } => {
            let src = emit(*left, ops, tmp_counter);
            let operand = emit(*right, ops, tmp_counter);
            let dest = format!("_tmp_{tmp_counter}");
            *tmp_counter += 1;
            ops.push(MathOp {
                op,
                src,
                operand,
                dest: dest.clone(),
            });
            Operand::Temp(dest)
        }
    }
}

/// Parse one equation into flat operations. The caller threads
/// `tmp_counter` across equations so temp names never collide.
pub fn parse_equation(
    equation: &str,
    tmp_counter: &mut usize,
) -> Result<Vec<MathOp>, EquationError> {
    let (dest, ast) = Parser::new(equation)?.parse_equation()?;

    let mut ops = Vec::new();
    match emit(ast, &mut ops, tmp_counter) {
        Operand::Temp(_) => {
            // The outermost operation writes the caller's destination.
            if let Some(last) = ops.last_mut() {
                last.dest = dest;
                *tmp_counter -= 1;
            }
        }
        // Op-less right-hand sides (D = $A, D = 5) become an identity add.
        operand => ops.push(MathOp {
            op: BinaryOp::Add,
            src: operand,
            operand: Operand::Number(0.0),
            dest,
        }),
    }
    Ok(ops)
}

/// Parse a batch of equations with a shared temp counter starting at 0.
pub fn parse_equations(equations: &[String]) -> Result<Vec<MathOp>, EquationError> {
    let mut ops = Vec::new();
    let mut tmp_counter = 0;
    for equation in equations {
        ops.extend(parse_equation(equation, &mut tmp_counter)?);
    }
    Ok(ops)
}

fn render_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Render the expression tree rooted at `operand`, inserting parentheses
/// only where the inner operator binds looser than the outer one, or
/// equally on the right of a left-associative operator.
fn render_operand(
    operand: &Operand,
    ops_by_dest: &std::collections::HashMap<&str, &MathOp>,
    parent_precedence: u8,
    is_right: bool,
) -> String {
    match operand {
        Operand::Number(n) => render_number(*n),
        Operand::Field(name) => format!("${name}"),
        Operand::Temp(name) => match ops_by_dest.get(name.as_str()) {
            Some(op) => render_op(op, ops_by_dest, parent_precedence, is_right),
            None => format!("${name}"),
        },
    }
}

fn render_op(
    op: &MathOp,
    ops_by_dest: &std::collections::HashMap<&str, &MathOp>,
    parent_precedence: u8,
    is_right: bool,
) -> String {
    let precedence = op.op.precedence();
    let left = render_operand(&op.src, ops_by_dest, precedence, false);
    let right = render_operand(&op.operand, ops_by_dest, precedence, true);
    let text = format!("{left} {} {right}", op.op.symbol());

    let needs_parens =
        precedence < parent_precedence || (precedence == parent_precedence && is_right);
    if needs_parens {
        format!("({text})")
    } else {
        text
    }
}

/// Reconstruct one equation string per final destination (dest values that
/// never feed another op's src or operand).
pub fn reconstruct_equations(ops: &[MathOp]) -> Vec<String> {
    let ops_by_dest: std::collections::HashMap<&str, &MathOp> =
        ops.iter().map(|op| (op.dest.as_str(), op)).collect();

    let mut consumed: std::collections::HashSet<&str> = std::collections::HashSet::new();
    for op in ops {
        if let Some(name) = op.src.temp_name() {
            consumed.insert(name);
        }
        if let Some(name) = op.operand.temp_name() {
            consumed.insert(name);
        }
    }

    ops.iter()
        .filter(|op| !consumed.contains(op.dest.as_str()))
        .map(|op| format!("{} = {}", op.dest, render_op(op, &ops_by_dest, 0, false)))
        .collect()
}
