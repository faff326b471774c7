use crate::error::ExpressionError;
use crate::traits::{DynamicalSystem, Scalar};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

/// OpCodes for the stack-based virtual machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OpCode {
    /// Pushes a constant.
    LoadConst(f64),
    /// Pushes the current time.
    LoadTime,
    /// Pushes a state variable by index.
    LoadVar(usize),
    /// Pushes a parameter by index.
    LoadParam(usize),
    /// Pops (b, a), pushes a + b.
    Add,
    /// Pops (b, a), pushes a - b.
    Sub,
    /// Pops (b, a), pushes a * b.
    Mul,
    /// Pops (b, a), pushes a / b.
    Div,
    /// Pops (b, a), pushes a ^ b.
    Pow,
    Neg,
    Sin,
    Cos,
    Exp,
    Ln,
    Sqrt,
    Abs,
}

/// A compiled sequence of operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bytecode {
    pub ops: Vec<OpCode>,
}

impl Bytecode {
    /// Deepest stack the program reaches, for preallocating `VM` scratch.
    pub fn max_stack_depth(&self) -> usize {
        let mut depth = 0usize;
        let mut max = 0usize;
        for op in &self.ops {
            match op {
                OpCode::LoadConst(_) | OpCode::LoadTime | OpCode::LoadVar(_) | OpCode::LoadParam(_) => {
                    depth += 1;
                }
                OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Div | OpCode::Pow => {
                    depth = depth.saturating_sub(1);
                }
                _ => {}
            }
            max = max.max(depth);
        }
        max
    }
}

/// Stateless evaluator for `Bytecode`.
pub struct VM;

impl VM {
    /// Runs `bytecode` against the given time, state and parameters. `stack`
    /// is scratch space and is cleared first.
    pub fn execute<T: Scalar>(
        bytecode: &Bytecode,
        t: T,
        vars: &[T],
        params: &[T],
        stack: &mut Vec<T>,
    ) -> T {
        stack.clear();

        for op in &bytecode.ops {
            match op {
                OpCode::LoadConst(val) => stack.push(T::from_f64(*val).unwrap_or_else(T::nan)),
                OpCode::LoadTime => stack.push(t),
                OpCode::LoadVar(idx) => stack.push(vars[*idx]),
                OpCode::LoadParam(idx) => stack.push(params[*idx]),
                OpCode::Add => binary(stack, |a, b| a + b),
                OpCode::Sub => binary(stack, |a, b| a - b),
                OpCode::Mul => binary(stack, |a, b| a * b),
                OpCode::Div => binary(stack, |a, b| a / b),
                OpCode::Pow => binary(stack, |a, b| a.powf(b)),
                OpCode::Neg => unary(stack, |a| -a),
                OpCode::Sin => unary(stack, |a| a.sin()),
                OpCode::Cos => unary(stack, |a| a.cos()),
                OpCode::Exp => unary(stack, |a| a.exp()),
                OpCode::Ln => unary(stack, |a| a.ln()),
                OpCode::Sqrt => unary(stack, |a| a.sqrt()),
                OpCode::Abs => unary(stack, |a| a.abs()),
            }
        }

        pop(stack)
    }
}

// Compiled bytecode never underflows; NaN only shows up for hand-built programs.
fn pop<T: Scalar>(stack: &mut Vec<T>) -> T {
    stack.pop().unwrap_or_else(T::nan)
}

fn unary<T: Scalar>(stack: &mut Vec<T>, f: impl Fn(T) -> T) {
    let a = pop(stack);
    stack.push(f(a));
}

fn binary<T: Scalar>(stack: &mut Vec<T>, f: impl Fn(T, T) -> T) {
    let b = pop(stack);
    let a = pop(stack);
    stack.push(f(a, b));
}

// --- AST ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "^",
        }
    }

    fn precedence(self) -> u8 {
        match self {
            BinaryOp::Add | BinaryOp::Sub => 1,
            BinaryOp::Mul | BinaryOp::Div => 2,
            BinaryOp::Pow => 4,
        }
    }
}

const NEG_PRECEDENCE: u8 = 3;
const ATOM_PRECEDENCE: u8 = 5;

/// Expression tree produced by [`parse`].
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Variable(String),
    Binary(Box<Expr>, BinaryOp, Box<Expr>),
    Neg(Box<Expr>),
    Call(String, Box<Expr>),
}

impl Expr {
    pub fn var(name: &str) -> Self {
        Expr::Variable(name.to_string())
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Binary(_, op, _) => op.precedence(),
            Expr::Neg(_) => NEG_PRECEDENCE,
            Expr::Number(n) if *n < 0.0 => NEG_PRECEDENCE,
            _ => ATOM_PRECEDENCE,
        }
    }

    /// Names referenced as variables, in order of first appearance.
    pub fn symbols(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols(&self, out: &mut Vec<String>) {
        match self {
            Expr::Number(_) => {}
            Expr::Variable(name) => {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
            Expr::Binary(left, _, right) => {
                left.collect_symbols(out);
                right.collect_symbols(out);
            }
            Expr::Neg(inner) | Expr::Call(_, inner) => inner.collect_symbols(out),
        }
    }
}

macro_rules! impl_expr_binary {
    ($trait:ident, $method:ident, $op:expr) => {
        impl std::ops::$trait for Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                Expr::Binary(Box::new(self), $op, Box::new(rhs))
            }
        }
    };
}

impl_expr_binary!(Add, add, BinaryOp::Add);
impl_expr_binary!(Sub, sub, BinaryOp::Sub);
impl_expr_binary!(Mul, mul, BinaryOp::Mul);
impl_expr_binary!(Div, div, BinaryOp::Div);

impl std::ops::Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::Neg(Box::new(self))
    }
}

impl Expr {
    pub fn call(name: &str, arg: Expr) -> Self {
        Expr::Call(name.to_string(), Box::new(arg))
    }

    pub fn pow(self, exponent: Expr) -> Self {
        Expr::Binary(Box::new(self), BinaryOp::Pow, Box::new(exponent))
    }
}

fn write_child(f: &mut fmt::Formatter<'_>, child: &Expr, parens: bool) -> fmt::Result {
    if parens {
        write!(f, "({child})")
    } else {
        write!(f, "{child}")
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(n) => write!(f, "{n}"),
            Expr::Variable(name) => write!(f, "{name}"),
            Expr::Binary(left, op, right) => {
                let prec = op.precedence();
                // `^` is right-associative, everything else left-associative.
                let (left_parens, right_parens) = if *op == BinaryOp::Pow {
                    (left.precedence() <= prec, right.precedence() < NEG_PRECEDENCE)
                } else {
                    (left.precedence() < prec, right.precedence() <= prec)
                };
                write_child(f, left, left_parens)?;
                write!(f, " {} ", op.symbol())?;
                write_child(f, right, right_parens)
            }
            Expr::Neg(inner) => {
                write!(f, "-")?;
                write_child(f, inner, inner.precedence() < NEG_PRECEDENCE)
            }
            Expr::Call(name, arg) => write!(f, "{name}({arg})"),
        }
    }
}

// --- Compiler ---

/// Compiles an [`Expr`] into [`Bytecode`], resolving names to indices.
/// Lookup order is: time symbol, state variables, parameters.
pub struct Compiler {
    pub time_name: Option<String>,
    pub var_map: HashMap<String, usize>,
    pub param_map: HashMap<String, usize>,
}

impl Compiler {
    pub fn new(var_names: &[String], param_names: &[String]) -> Self {
        let var_map = var_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        let param_map = param_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();

        Self {
            time_name: None,
            var_map,
            param_map,
        }
    }

    /// Binds `name` to the integration time.
    pub fn with_time(mut self, name: &str) -> Self {
        self.time_name = Some(name.to_string());
        self
    }

    pub fn compile(&self, expr: &Expr) -> Result<Bytecode, ExpressionError> {
        let mut ops = Vec::new();
        self.compile_recursive(expr, &mut ops)?;
        Ok(Bytecode { ops })
    }

    fn compile_recursive(&self, expr: &Expr, ops: &mut Vec<OpCode>) -> Result<(), ExpressionError> {
        match expr {
            Expr::Number(n) => ops.push(OpCode::LoadConst(*n)),
            Expr::Variable(name) => ops.push(self.resolve(name)?),
            Expr::Binary(left, op, right) => {
                self.compile_recursive(left, ops)?;
                self.compile_recursive(right, ops)?;
                ops.push(match op {
                    BinaryOp::Add => OpCode::Add,
                    BinaryOp::Sub => OpCode::Sub,
                    BinaryOp::Mul => OpCode::Mul,
                    BinaryOp::Div => OpCode::Div,
                    BinaryOp::Pow => OpCode::Pow,
                });
            }
            Expr::Neg(inner) => {
                self.compile_recursive(inner, ops)?;
                ops.push(OpCode::Neg);
            }
            Expr::Call(func, arg) => {
                let code = match func.as_str() {
                    "sin" => OpCode::Sin,
                    "cos" => OpCode::Cos,
                    "exp" => OpCode::Exp,
                    "ln" | "log" => OpCode::Ln,
                    "sqrt" => OpCode::Sqrt,
                    "abs" => OpCode::Abs,
                    _ => return Err(ExpressionError::UnknownFunction(func.clone())),
                };
                self.compile_recursive(arg, ops)?;
                ops.push(code);
            }
        }
        Ok(())
    }

    fn resolve(&self, name: &str) -> Result<OpCode, ExpressionError> {
        if self.time_name.as_deref() == Some(name) {
            return Ok(OpCode::LoadTime);
        }
        if let Some(&idx) = self.var_map.get(name) {
            return Ok(OpCode::LoadVar(idx));
        }
        if let Some(&idx) = self.param_map.get(name) {
            return Ok(OpCode::LoadParam(idx));
        }
        Err(ExpressionError::UnknownSymbol(name.to_string()))
    }
}

/// Parses and compiles a single expression.
pub fn compile_expression(
    source: &str,
    compiler: &Compiler,
) -> Result<(Expr, Bytecode), ExpressionError> {
    let expr = parse(source)?;
    let code = compiler.compile(&expr)?;
    Ok((expr, code))
}

// --- Parser ---

/// Parses a string expression into an AST.
///
/// Grammar, loosest first: `+ -`, `* /`, unary `-`, `^` (right-assoc),
/// then numbers, names, calls `name(expr)` and parentheses.
pub fn parse(input: &str) -> Result<Expr, ExpressionError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.parse_expression()?;
    match parser.tokens.get(parser.pos) {
        None => Ok(expr),
        Some((_, position)) => Err(ExpressionError::TrailingInput {
            position: *position,
        }),
    }
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
}

fn tokenize(input: &str) -> Result<Vec<(Token, usize)>, ExpressionError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let start = i;
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_digit() || c == '.' {
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            // Exponent suffix: 1e3, 2.5E-4
            if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                let signed = matches!(chars.get(i + 1), Some('+') | Some('-'));
                let digit_at = if signed { i + 2 } else { i + 1 };
                if chars.get(digit_at).is_some_and(|d| d.is_ascii_digit()) {
                    i = digit_at;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            let literal: String = chars[start..i].iter().collect();
            let value = literal
                .parse()
                .map_err(|_| ExpressionError::InvalidNumber(literal.clone()))?;
            tokens.push((Token::Number(value), start));
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let ident = chars[start..i].iter().collect();
            tokens.push((Token::Identifier(ident), start));
            continue;
        }

        let token = match c {
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '^' => Token::Caret,
            '(' => Token::LParen,
            ')' => Token::RParen,
            other => return Err(ExpressionError::UnexpectedChar(other)),
        };
        tokens.push((token, start));
        i += 1;
    }

    Ok(tokens)
}

/// Deepest expression tree the parser will build. Compiling and printing
/// recurse over the tree, so this also bounds their stack use.
pub const MAX_EXPRESSION_DEPTH: usize = 256;

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    // Tree depth above the node being parsed.
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(token, _)| token)
    }

    fn consume(&mut self) -> Option<(Token, usize)> {
        let next = self.tokens.get(self.pos).cloned();
        if next.is_some() {
            self.pos += 1;
        }
        next
    }

    fn descend(&mut self) -> Result<(), ExpressionError> {
        self.depth += 1;
        if self.depth > MAX_EXPRESSION_DEPTH {
            return Err(ExpressionError::TooDeep {
                limit: MAX_EXPRESSION_DEPTH,
            });
        }
        Ok(())
    }

    fn parse_expression(&mut self) -> Result<Expr, ExpressionError> {
        let entry = self.depth;
        let mut left = self.parse_term()?;

        while let Some(token) = self.peek() {
            let op = match token {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.consume();
            // Left-associative chains deepen the tree on the left.
            self.descend()?;
            let right = self.parse_term()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        self.depth = entry;
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, ExpressionError> {
        let entry = self.depth;
        let mut left = self.parse_unary()?;

        while let Some(token) = self.peek() {
            let op = match token {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                _ => break,
            };
            self.consume();
            self.descend()?;
            let right = self.parse_unary()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        self.depth = entry;
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExpressionError> {
        if let Some(Token::Minus) = self.peek() {
            self.consume();
            self.descend()?;
            let inner = self.parse_unary()?;
            self.depth -= 1;
            return Ok(Expr::Neg(Box::new(inner)));
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Result<Expr, ExpressionError> {
        let base = self.parse_primary()?;
        if let Some(Token::Caret) = self.peek() {
            self.consume();
            self.descend()?;
            let exponent = self.parse_unary()?;
            self.depth -= 1;
            return Ok(Expr::Binary(
                Box::new(base),
                BinaryOp::Pow,
                Box::new(exponent),
            ));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr, ExpressionError> {
        match self.consume() {
            Some((Token::Number(n), _)) => Ok(Expr::Number(n)),
            Some((Token::Identifier(name), _)) => {
                if let Some(Token::LParen) = self.peek() {
                    self.consume();
                    self.descend()?;
                    let arg = self.parse_expression()?;
                    self.depth -= 1;
                    self.expect_rparen()?;
                    Ok(Expr::Call(name, Box::new(arg)))
                } else {
                    Ok(Expr::Variable(name))
                }
            }
            Some((Token::LParen, _)) => {
                self.descend()?;
                let expr = self.parse_expression()?;
                self.depth -= 1;
                self.expect_rparen()?;
                Ok(expr)
            }
            Some((_, position)) => Err(ExpressionError::UnexpectedToken { position }),
            None => Err(ExpressionError::UnexpectedEnd),
        }
    }

    fn expect_rparen(&mut self) -> Result<(), ExpressionError> {
        match self.consume() {
            Some((Token::RParen, _)) => Ok(()),
            _ => Err(ExpressionError::UnbalancedParen),
        }
    }
}

// --- EquationSystem ---

/// A `DynamicalSystem` whose right-hand side is one compiled expression per
/// state variable.
pub struct EquationSystem<T: Scalar> {
    pub equations: Vec<Bytecode>,
    pub params: Vec<T>,
    // Scratch stack reused across evaluations. Makes the system !Sync.
    stack: RefCell<Vec<T>>,
}

impl<T: Scalar> EquationSystem<T> {
    pub fn new(equations: Vec<Bytecode>, params: Vec<T>) -> Self {
        Self {
            equations,
            params,
            stack: RefCell::new(Vec::with_capacity(64)),
        }
    }

    /// Evaluates equation `index` without touching the others.
    pub fn evaluate(&self, index: usize, t: T, x: &[T]) -> T {
        let mut stack = self.stack.borrow_mut();
        VM::execute(&self.equations[index], t, x, &self.params, &mut stack)
    }
}

impl<T: Scalar> DynamicalSystem<T> for EquationSystem<T> {
    fn dimension(&self) -> usize {
        self.equations.len()
    }

    fn apply(&self, t: T, x: &[T], out: &mut [T]) {
        let mut stack = self.stack.borrow_mut();
        for (i, eq) in self.equations.iter().enumerate() {
            out[i] = VM::execute(eq, t, x, &self.params, &mut stack);
        }
    }
}

/// Builds an `EquationSystem<f64>` from source strings. `t` is bound to time.
pub fn build_system(
    equations: &[&str],
    var_names: &[String],
    param_names: &[String],
    params: Vec<f64>,
) -> Result<EquationSystem<f64>, ExpressionError> {
    let compiler = Compiler::new(var_names, param_names).with_time("t");
    let bytecodes = equations
        .iter()
        .map(|source| compile_expression(source, &compiler).map(|(_, code)| code))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(EquationSystem::new(bytecodes, params))
}
