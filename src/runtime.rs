use crate::environment::{FunctionTable, Scope, ScopeStack, Variable};
use crate::error::{runtime_error, Result, RuntimeErrorKind};
use crate::parser::{
    ArithOp, BinaryOp, Declaration, Expr, ExprType, FunctionDecl, Literal, LoopGuard, LoopStep, Program,
    StepOp, Stmt, StmtType, VariadicOp,
};
use crate::tokenizer::{is_numbar_text, is_numbr_text};
use log::{debug, trace};
use std::{
    fmt::{self, Display, Formatter},
    io::{self, BufRead, Write},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Numbr,
    Numbar,
    Yarn,
    Troof,
    Noob,
}

impl Display for ValueType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Numbr => "NUMBR",
            ValueType::Numbar => "NUMBAR",
            ValueType::Yarn => "YARN",
            ValueType::Troof => "TROOF",
            ValueType::Noob => "NOOB",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Numbr(i64),
    Numbar(f64),
    Yarn(String),
    Troof(bool),
    Noob,
}

/// Displays the YARN form of the value, which is what VISIBLE prints.
impl Display for Value {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Value::Numbr(n) => write!(f, "{}", n),
            Value::Numbar(n) if n.is_finite() && n.fract() == 0.0 => write!(f, "{:.1}", n),
            Value::Numbar(n) => write!(f, "{}", n),
            Value::Yarn(s) => write!(f, "{}", s),
            Value::Troof(true) => write!(f, "WIN"),
            Value::Troof(false) => write!(f, "FAIL"),
            Value::Noob => Ok(()),
        }
    }
}

impl From<&Literal> for Value {
    fn from(literal: &Literal) -> Self {
        match literal {
            Literal::Numbr(n) => Value::Numbr(*n),
            Literal::Numbar(n) => Value::Numbar(*n),
            Literal::Yarn(s) => Value::Yarn(s.clone()),
            Literal::Troof(b) => Value::Troof(*b),
            Literal::Noob => Value::Noob,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(n) => n,
        }
    }
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Numbr(_) => ValueType::Numbr,
            Value::Numbar(_) => ValueType::Numbar,
            Value::Yarn(_) => ValueType::Yarn,
            Value::Troof(_) => ValueType::Troof,
            Value::Noob => ValueType::Noob,
        }
    }

    /// Classifies raw input text the same way the lexer classifies literals.
    pub fn infer(text: &str) -> Value {
        if is_numbr_text(text) {
            if let Ok(n) = text.parse() {
                return Value::Numbr(n);
            }
        }
        if is_numbar_text(text) {
            if let Ok(n) = text.parse() {
                return Value::Numbar(n);
            }
        }
        match text {
            "WIN" => Value::Troof(true),
            "FAIL" => Value::Troof(false),
            _ => Value::Yarn(text.to_string()),
        }
    }

    pub fn to_troof(&self) -> bool {
        match self {
            Value::Numbr(n) => *n != 0,
            Value::Numbar(n) => *n != 0.0,
            Value::Yarn(s) => !s.is_empty(),
            Value::Troof(b) => *b,
            Value::Noob => false,
        }
    }

    pub fn to_yarn(&self) -> String {
        self.to_string()
    }

    pub fn to_numbr(&self, index: usize) -> Result<i64> {
        match self {
            Value::Numbr(n) => Ok(*n),
            Value::Numbar(n) => Ok(n.trunc() as i64),
            Value::Yarn(s) => match s.trim().parse() {
                Ok(n) if is_numbr_text(s.trim()) => Ok(n),
                _ => runtime_error(
                    RuntimeErrorKind::Type,
                    format!("cannot cast YARN \"{}\" to NUMBR", s),
                    index,
                ),
            },
            Value::Troof(b) => Ok(*b as i64),
            Value::Noob => Ok(0),
        }
    }

    pub fn to_numbar(&self, index: usize) -> Result<f64> {
        match self {
            Value::Numbr(n) => Ok(*n as f64),
            Value::Numbar(n) => Ok(*n),
            Value::Yarn(s) => {
                let text = s.trim();
                match text.parse() {
                    Ok(n) if is_numbr_text(text) || is_numbar_text(text) => Ok(n),
                    _ => runtime_error(
                        RuntimeErrorKind::Type,
                        format!("cannot cast YARN \"{}\" to NUMBAR", s),
                        index,
                    ),
                }
            }
            Value::Troof(true) => Ok(1.0),
            Value::Troof(false) => Ok(0.0),
            Value::Noob => Ok(0.0),
        }
    }

    fn to_number(&self, index: usize) -> Result<Number> {
        match self {
            Value::Numbar(n) => Ok(Number::Float(*n)),
            Value::Yarn(s) if is_numbar_text(s.trim()) => self.to_numbar(index).map(Number::Float),
            Value::Yarn(s) if !is_numbr_text(s.trim()) => runtime_error(
                RuntimeErrorKind::Type,
                format!("YARN \"{}\" is not numeric", s),
                index,
            ),
            _ => self.to_numbr(index).map(Number::Int),
        }
    }

    /// Produces a new value of type `target` following the coercion table.
    pub fn cast(&self, target: ValueType, index: usize) -> Result<Value> {
        match target {
            ValueType::Numbr => self.to_numbr(index).map(Value::Numbr),
            ValueType::Numbar => self.to_numbar(index).map(Value::Numbar),
            ValueType::Yarn => Ok(Value::Yarn(self.to_yarn())),
            ValueType::Troof => Ok(Value::Troof(self.to_troof())),
            ValueType::Noob => match self {
                Value::Noob => Ok(Value::Noob),
                _ => runtime_error(
                    RuntimeErrorKind::Type,
                    format!("cannot cast {} to NOOB", self.value_type()),
                    index,
                ),
            },
        }
    }
}

fn arithmetic(operator: ArithOp, left: Number, right: Number, index: usize) -> Result<Value> {
    let by_zero = right.as_f64() == 0.0;
    match operator {
        ArithOp::Quoshunt if by_zero => {
            return runtime_error(RuntimeErrorKind::Arithmetic, "division by zero", index)
        }
        ArithOp::Mod if by_zero => {
            return runtime_error(RuntimeErrorKind::Arithmetic, "modulo by zero", index)
        }
        _ => (),
    }

    match (left, right) {
        (Number::Int(a), Number::Int(b)) => {
            let result = match operator {
                ArithOp::Sum => a.checked_add(b),
                ArithOp::Diff => a.checked_sub(b),
                ArithOp::Produkt => a.checked_mul(b),
                ArithOp::Quoshunt => a.checked_div(b),
                ArithOp::Mod => a.checked_rem(b),
                ArithOp::Biggr => Some(a.max(b)),
                ArithOp::Smallr => Some(a.min(b)),
            };
            match result {
                Some(n) => Ok(Value::Numbr(n)),
                None => runtime_error(RuntimeErrorKind::Arithmetic, "NUMBR overflow", index),
            }
        }
        (a, b) => {
            let (a, b) = (a.as_f64(), b.as_f64());
            let result = match operator {
                ArithOp::Sum => a + b,
                ArithOp::Diff => a - b,
                ArithOp::Produkt => a * b,
                ArithOp::Quoshunt => a / b,
                ArithOp::Mod => a % b,
                ArithOp::Biggr => a.max(b),
                ArithOp::Smallr => a.min(b),
            };
            Ok(Value::Numbar(result))
        }
    }
}

/// Equality of two values of the same kind.
fn equal(left: &Value, right: &Value, index: usize) -> Result<bool> {
    if left.value_type() != right.value_type() {
        return runtime_error(
            RuntimeErrorKind::Type,
            format!(
                "cannot compare {} with {}",
                left.value_type(),
                right.value_type()
            ),
            index,
        );
    }
    Ok(left == right)
}

#[derive(Debug, Clone)]
pub struct Options {
    /// Upper bound on iterations of any single loop; `None` is unbounded.
    pub max_iterations: Option<usize>,
    pub max_call_depth: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            max_iterations: None,
            max_call_depth: 512,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub output: Vec<String>,
    pub variables: Vec<Variable>,
}

/// Runs `program` against stdin and stdout.
pub fn run(program: &Program, options: Options) -> Result<RunOutcome> {
    let stdin = io::stdin();
    run_with_io(program, stdin.lock(), io::stdout(), options)
}

pub fn run_with_io<R: BufRead, W: Write>(
    program: &Program,
    input: R,
    output: W,
    options: Options,
) -> Result<RunOutcome> {
    Interpreter {
        input,
        output,
        options,
        scopes: ScopeStack::new(),
        functions: FunctionTable::new(),
        it: Value::Noob,
        lines: Vec::new(),
    }
    .run(program)
}

enum Flow {
    Normal,
    Break,
    Return(Value),
}

struct Interpreter<'p, R, W> {
    input: R,
    output: W,
    options: Options,
    scopes: ScopeStack,
    functions: FunctionTable<'p>,
    it: Value,
    lines: Vec<String>,
}

impl<'p, R: BufRead, W: Write> Interpreter<'p, R, W> {
    fn run(mut self, program: &'p Program) -> Result<RunOutcome> {
        for function in &program.functions {
            if self.functions.insert(&function.name, function).is_some() {
                return runtime_error(
                    RuntimeErrorKind::Name,
                    format!("function '{}' is already defined", function.name),
                    function.index,
                );
            }
            debug!(
                "registered function {}({})",
                function.name,
                function.params.join(", ")
            );
        }

        for declaration in &program.declarations {
            self.declare(declaration)?;
        }

        // Parser guarantees no GTFO/FOUND YR at top level
        self.execute_block(&program.body)?;
        self.output.flush()?;

        debug!("program finished with {} output lines", self.lines.len());

        Ok(RunOutcome {
            output: self.lines,
            variables: self.scopes.into_global().variables(),
        })
    }

    fn execute_block(&mut self, statements: &'p [Stmt]) -> Result<Flow> {
        for stmt in statements {
            match self.execute(stmt)? {
                Flow::Normal => (),
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn execute(&mut self, stmt: &'p Stmt) -> Result<Flow> {
        trace!("token {}: {:?}", stmt.index, stmt.stmt_type);

        match &stmt.stmt_type {
            StmtType::Visible(operands) => {
                let mut line = String::new();
                for operand in operands {
                    line.push_str(&self.evaluate(operand)?.to_yarn());
                }
                writeln!(self.output, "{}", line)?;
                self.lines.push(line.clone());
                self.it = Value::Yarn(line);
            }
            StmtType::Gimmeh(name) => {
                if !self.scopes.current().contains(name) {
                    return undeclared(name, stmt.index);
                }
                let value = self.read_input(stmt.index)?;
                self.scopes.current_mut().assign(name, value);
            }
            StmtType::Declare(declaration) => self.declare(declaration)?,
            StmtType::Assign { name, value } => {
                let value = self.evaluate(value)?;
                self.it = value.clone();
                if !self.scopes.current_mut().assign(name, value) {
                    return undeclared(name, stmt.index);
                }
            }
            StmtType::Retype { name, target } => {
                let Some(binding) = self.scopes.current_mut().get_mut(name) else {
                    return undeclared(name, stmt.index);
                };
                binding.value = binding.value.cast(*target, stmt.index)?;
                binding.declared_type = *target;
            }
            StmtType::Conditional {
                then_branch,
                else_ifs,
                else_branch,
            } => {
                if self.it.to_troof() {
                    return self.execute_block(then_branch);
                }
                for (guard, body) in else_ifs {
                    let value = self.evaluate(guard)?;
                    let taken = value.to_troof();
                    self.it = value;
                    if taken {
                        return self.execute_block(body);
                    }
                }
                return self.execute_block(else_branch);
            }
            StmtType::Switch { cases, default } => {
                let subject = self.it.clone();
                let mut matched = false;

                for case in cases {
                    // Once a case matches, later bodies run until GTFO
                    matched = matched || Value::from(&case.literal) == subject;
                    if matched {
                        match self.execute_block(&case.body)? {
                            Flow::Normal => (),
                            Flow::Break => return Ok(Flow::Normal),
                            flow => return Ok(flow),
                        }
                    }
                }

                if let Some(default) = default.as_ref().filter(|_| !matched) {
                    return match self.execute_block(default)? {
                        Flow::Break => Ok(Flow::Normal),
                        flow => Ok(flow),
                    };
                }
            }
            StmtType::Loop {
                label,
                step,
                guard,
                body,
            } => {
                let temporary = match step {
                    Some(LoopStep { variable, .. })
                        if !self.scopes.current().contains(variable) =>
                    {
                        self.scopes.current_mut().declare(variable, Value::Numbr(0));
                        Some(variable)
                    }
                    _ => None,
                };

                let flow = self.execute_loop(label, step.as_ref(), guard.as_ref(), body, stmt.index);

                if let Some(variable) = temporary {
                    self.scopes.current_mut().remove(variable);
                }
                return flow;
            }
            StmtType::Return(expr) => return Ok(Flow::Return(self.evaluate(expr)?)),
            StmtType::Break => return Ok(Flow::Break),
            StmtType::Expression(expr) => {
                self.it = self.evaluate(expr)?;
            }
        }

        Ok(Flow::Normal)
    }

    fn declare(&mut self, declaration: &'p Declaration) -> Result<()> {
        let value = match &declaration.initializer {
            Some(expr) => {
                let value = self.evaluate(expr)?;
                self.it = value.clone();
                value
            }
            None => Value::Noob,
        };
        if !self.scopes.current_mut().declare(&declaration.name, value) {
            return runtime_error(
                RuntimeErrorKind::Name,
                format!("variable '{}' is already declared", declaration.name),
                declaration.index,
            );
        }
        Ok(())
    }

    fn read_input(&mut self, index: usize) -> Result<Value> {
        self.output.flush()?;

        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) => runtime_error(RuntimeErrorKind::Input, "end of input", index),
            Ok(_) => Ok(Value::infer(line.trim_end_matches(['\n', '\r']))),
            Err(err) => runtime_error(
                RuntimeErrorKind::Input,
                format!("failed to read input: {}", err),
                index,
            ),
        }
    }

    fn execute_loop(
        &mut self,
        label: &str,
        step: Option<&LoopStep>,
        guard: Option<&'p LoopGuard>,
        body: &'p [Stmt],
        index: usize,
    ) -> Result<Flow> {
        let mut iterations = 0usize;

        loop {
            if let Some(guard) = guard {
                let (expr, stop_when) = match guard {
                    LoopGuard::Til(expr) => (expr, true),
                    LoopGuard::Wile(expr) => (expr, false),
                };
                let value = self.evaluate(expr)?;
                let truth = value.to_troof();
                self.it = value;
                if truth == stop_when {
                    break;
                }
            }

            if self.options.max_iterations.is_some_and(|max| iterations >= max) {
                return runtime_error(
                    RuntimeErrorKind::Limit,
                    format!("loop '{}' exceeded {} iterations", label, iterations),
                    index,
                );
            }
            iterations += 1;

            match self.execute_block(body)? {
                Flow::Normal => (),
                Flow::Break => break,
                flow => return Ok(flow),
            }

            if let Some(LoopStep { op, variable }) = step {
                let Some(binding) = self.scopes.current().get(variable) else {
                    return undeclared(variable, index);
                };
                let delta = match op {
                    StepOp::Uppin => Number::Int(1),
                    StepOp::Nerfin => Number::Int(-1),
                };
                let current = binding.value.to_number(index)?;
                let next = arithmetic(ArithOp::Sum, current, delta, index)?;
                self.scopes.current_mut().assign(variable, next);
            }
        }

        trace!("loop '{}' ran {} iterations", label, iterations);
        Ok(Flow::Normal)
    }

    fn evaluate(&mut self, expr: &'p Expr) -> Result<Value> {
        match &expr.expr_type {
            ExprType::Literal(literal) => Ok(Value::from(literal)),
            ExprType::Variable(name) => match self.scopes.current().get(name) {
                Some(binding) => Ok(binding.value.clone()),
                None => undeclared(name, expr.index),
            },
            ExprType::It => Ok(self.it.clone()),
            ExprType::Binary {
                operator,
                left,
                right,
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                evaluate_binary(*operator, &left, &right, expr.index)
            }
            ExprType::Not(operand) => Ok(Value::Troof(!self.evaluate(operand)?.to_troof())),
            ExprType::Variadic { operator, operands } => {
                // Every operand is evaluated, no short-circuit
                let mut truths = Vec::with_capacity(operands.len());
                for operand in operands {
                    truths.push(self.evaluate(operand)?.to_troof());
                }
                Ok(Value::Troof(match operator {
                    VariadicOp::All => truths.iter().all(|&t| t),
                    VariadicOp::Any => truths.iter().any(|&t| t),
                }))
            }
            ExprType::Smoosh(operands) => {
                let mut joined = String::new();
                for operand in operands {
                    joined.push_str(&self.evaluate(operand)?.to_yarn());
                }
                Ok(Value::Yarn(joined))
            }
            ExprType::Cast { expr: inner, target } => {
                self.evaluate(inner)?.cast(*target, expr.index)
            }
            ExprType::Call { name, arguments } => self.call(name, arguments, expr.index),
        }
    }

    fn call(&mut self, name: &str, arguments: &'p [Expr], index: usize) -> Result<Value> {
        let function: &'p FunctionDecl = match self.functions.get(name).copied() {
            Some(function) => function,
            None => {
                return runtime_error(
                    RuntimeErrorKind::Name,
                    format!("function '{}' is not defined", name),
                    index,
                )
            }
        };

        if function.params.len() != arguments.len() {
            return runtime_error(
                RuntimeErrorKind::Arity,
                format!(
                    "function '{}' expects {} arguments but got {}",
                    name,
                    function.params.len(),
                    arguments.len()
                ),
                index,
            );
        }

        if self.scopes.depth() >= self.options.max_call_depth {
            return runtime_error(
                RuntimeErrorKind::Limit,
                format!("call depth exceeded {}", self.options.max_call_depth),
                index,
            );
        }

        let mut frame = Scope::new();
        for (param, argument) in function.params.iter().zip(arguments) {
            let value = self.evaluate(argument)?;
            frame.declare(param, value);
        }

        self.scopes.push_frame(frame);
        let flow = self.execute_block(&function.body);
        self.scopes.pop_frame();

        let result = match flow? {
            Flow::Return(value) => value,
            Flow::Normal | Flow::Break => Value::Noob,
        };
        self.it = result.clone();
        Ok(result)
    }
}

fn evaluate_binary(operator: BinaryOp, left: &Value, right: &Value, index: usize) -> Result<Value> {
    match operator {
        BinaryOp::Arithmetic(op) => {
            arithmetic(op, left.to_number(index)?, right.to_number(index)?, index)
        }
        BinaryOp::BothSaem => equal(left, right, index).map(Value::Troof),
        BinaryOp::Diffrint => equal(left, right, index).map(|same| Value::Troof(!same)),
        BinaryOp::BothOf => Ok(Value::Troof(left.to_troof() && right.to_troof())),
        BinaryOp::EitherOf => Ok(Value::Troof(left.to_troof() || right.to_troof())),
        BinaryOp::WonOf => Ok(Value::Troof(left.to_troof() != right.to_troof())),
    }
}

fn undeclared<T>(name: &str, index: usize) -> Result<T> {
    runtime_error(
        RuntimeErrorKind::Name,
        format!("variable '{}' is not declared", name),
        index,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::parser::parse;
    use crate::tokenizer::tokenize;
    use pretty_assertions::assert_eq;

    fn run_source(source: &str, input: &str, options: Options) -> Result<RunOutcome> {
        let program = parse(&tokenize(source))?;
        run_with_io(&program, input.as_bytes(), io::sink(), options)
    }

    fn output_of(source: &str) -> Result<Vec<String>> {
        Ok(run_source(source, "", Options::default())?.output)
    }

    fn program(declarations: &str, body: &str) -> String {
        format!("HAI\nWAZZUP\n{}\nBUHBYE\n{}\nKTHXBYE", declarations, body)
    }

    fn error_kind(result: Result<RunOutcome>) -> RuntimeErrorKind {
        match result {
            Err(err) => err
                .runtime_kind()
                .unwrap_or_else(|| panic!("expected runtime error, got {}", err)),
            Ok(outcome) => panic!("expected error, got {:?}", outcome),
        }
    }

    #[test]
    fn test_sum_of_declared_variable() -> Result<()> {
        let output = output_of("HAI WAZZUP I HAS A X ITZ 5 BUHBYE VISIBLE SUM OF X AN 3 KTHXBYE")?;
        assert_eq!(output, vec!["8"]);
        Ok(())
    }

    #[test]
    fn test_smoosh_concatenation() -> Result<()> {
        let output = output_of(&program("", "VISIBLE SMOOSH \"A\" AN \"B\" AN 1 MKAY"))?;
        assert_eq!(output, vec!["AB1"]);

        let output = output_of(&program(
            "I HAS A n ITZ 2.5",
            "VISIBLE \"n=\" + n AN \" \" AN WIN",
        ))?;
        assert_eq!(output, vec!["n=2.5 WIN"]);
        Ok(())
    }

    #[test]
    fn test_conditional_takes_else_on_fail() -> Result<()> {
        let output = output_of(&program(
            "",
            "FAIL\nO RLY? YA RLY VISIBLE \"T\" NO WAI VISIBLE \"F\" OIC",
        ))?;
        assert_eq!(output, vec!["F"]);
        Ok(())
    }

    #[test]
    fn test_conditional_mebbe_chain() -> Result<()> {
        let body = "BOTH SAEM x AN 1\nO RLY?\nYA RLY\nVISIBLE \"one\"\n\
                    MEBBE BOTH SAEM x AN 2\nVISIBLE \"two\"\n\
                    MEBBE BOTH SAEM x AN 3\nVISIBLE \"three\"\n\
                    NO WAI\nVISIBLE \"many\"\nOIC";
        assert_eq!(output_of(&program("I HAS A x ITZ 2", body))?, vec!["two"]);
        assert_eq!(output_of(&program("I HAS A x ITZ 3", body))?, vec!["three"]);
        assert_eq!(output_of(&program("I HAS A x ITZ 9", body))?, vec!["many"]);
        assert_eq!(output_of(&program("I HAS A x ITZ 1", body))?, vec!["one"]);
        Ok(())
    }

    #[test]
    fn test_switch_default_skipped_after_match() -> Result<()> {
        let body = "x\nWTF?\nOMG 1\nVISIBLE \"one\"\nOMGWTF\nVISIBLE \"default\"\nOIC";
        assert_eq!(output_of(&program("I HAS A x ITZ 1", body))?, vec!["one"]);
        assert_eq!(output_of(&program("I HAS A x ITZ 2", body))?, vec!["default"]);
        Ok(())
    }

    #[test]
    fn test_switch_matches_and_breaks() -> Result<()> {
        let body = "x\nWTF? OMG 1 VISIBLE \"one\" GTFO OMG 2 VISIBLE \"two\" OIC";
        assert_eq!(output_of(&program("I HAS A x ITZ 2", body))?, vec!["two"]);
        assert_eq!(output_of(&program("I HAS A x ITZ 1", body))?, vec!["one"]);
        assert!(output_of(&program("I HAS A x ITZ 3", body))?.is_empty());
        Ok(())
    }

    #[test]
    fn test_switch_falls_through_cases_but_not_default() -> Result<()> {
        let body = "x\nWTF?\nOMG \"a\"\nVISIBLE \"a\"\nOMG \"b\"\nVISIBLE \"b\"\n\
                    OMGWTF\nVISIBLE \"default\"\nOIC";
        assert_eq!(
            output_of(&program("I HAS A x ITZ \"a\"", body))?,
            vec!["a", "b"]
        );
        assert_eq!(output_of(&program("I HAS A x ITZ \"b\"", body))?, vec!["b"]);
        assert_eq!(
            output_of(&program("I HAS A x ITZ \"z\"", body))?,
            vec!["default"]
        );
        Ok(())
    }

    #[test]
    fn test_loop_til_and_wile() -> Result<()> {
        let output = output_of(&program(
            "",
            "IM IN YR up UPPIN YR i TIL BOTH SAEM i AN 3\nVISIBLE i\nIM OUTTA YR up",
        ))?;
        assert_eq!(output, vec!["0", "1", "2"]);

        let output = output_of(&program(
            "I HAS A n ITZ 3",
            "IM IN YR down NERFIN YR n WILE DIFFRINT n AN 0\nVISIBLE n\nIM OUTTA YR down\nVISIBLE n",
        ))?;
        assert_eq!(output, vec!["3", "2", "1", "0"]);
        Ok(())
    }

    #[test]
    fn test_loop_guard_checked_before_first_iteration() -> Result<()> {
        let output = output_of(&program(
            "",
            "IM IN YR l TIL WIN\nVISIBLE \"body\"\nIM OUTTA YR l",
        ))?;
        assert!(output.is_empty());
        Ok(())
    }

    #[test]
    fn test_loop_temporary_variable_is_removed() -> Result<()> {
        let result = run_source(
            &program(
                "",
                "IM IN YR l UPPIN YR i TIL BOTH SAEM i AN 2\nIM OUTTA YR l\nVISIBLE i",
            ),
            "",
            Options::default(),
        );
        assert_eq!(error_kind(result), RuntimeErrorKind::Name);
        Ok(())
    }

    #[test]
    fn test_endless_loop_hits_iteration_cap() {
        let options = Options {
            max_iterations: Some(50),
            ..Options::default()
        };
        let result = run_source(
            &program("", "IM IN YR forever WILE WIN\nVISIBLE 1\nIM OUTTA YR forever"),
            "",
            options,
        );
        assert_eq!(error_kind(result), RuntimeErrorKind::Limit);
    }

    #[test]
    fn test_gtfo_leaves_loop() -> Result<()> {
        let output = output_of(&program(
            "I HAS A n ITZ 0",
            "IM IN YR l UPPIN YR n\n\
             BOTH SAEM n AN 2\nO RLY? YA RLY GTFO OIC\nVISIBLE n\nIM OUTTA YR l\nVISIBLE n",
        ))?;
        assert_eq!(output, vec!["0", "1", "2"]);
        Ok(())
    }

    #[test]
    fn test_functions_and_recursion() -> Result<()> {
        let source = "HAI\nWAZZUP\nI HAS A r\nBUHBYE\n\
                      r R I IZ fact YR 5 MKAY\nVISIBLE r\nVISIBLE IT\n\
                      HOW IZ I fact YR n\n\
                      BOTH SAEM n AN 0\nO RLY?\nYA RLY\nFOUND YR 1\nOIC\n\
                      FOUND YR PRODUKT OF n AN I IZ fact YR DIFF OF n AN 1 MKAY\n\
                      IF U SAY SO\nKTHXBYE";
        assert_eq!(output_of(source)?, vec!["120", "120"]);
        Ok(())
    }

    #[test]
    fn test_function_without_found_yr_returns_noob() -> Result<()> {
        let source = "HAI\nHOW IZ I shout YR msg\nVISIBLE msg\nGTFO\nVISIBLE \"unreachable\"\nIF U SAY SO\n\
                      WAZZUP\nI HAS A r ITZ I IZ shout YR \"hi\" MKAY\nBUHBYE\nKTHXBYE";
        let outcome = run_source(source, "", Options::default())?;
        assert_eq!(outcome.output, vec!["hi"]);
        assert_eq!(outcome.variables[0].value, Value::Noob);
        Ok(())
    }

    #[test]
    fn test_function_scope_is_isolated() {
        let source = "HAI\nHOW IZ I peek\nFOUND YR g\nIF U SAY SO\n\
                      WAZZUP\nI HAS A g ITZ 1\nBUHBYE\nI IZ peek MKAY\nKTHXBYE";
        assert_eq!(
            error_kind(run_source(source, "", Options::default())),
            RuntimeErrorKind::Name
        );
    }

    #[test]
    fn test_arity_checked_before_side_effects() {
        let source = "HAI\nHOW IZ I f YR a\nVISIBLE \"body\"\nIF U SAY SO\n\
                      WAZZUP\nBUHBYE\nI IZ f YR 1 AN YR 2 MKAY\nKTHXBYE";
        let program = parse(&tokenize(source)).expect("valid program");
        let mut sink = Vec::new();
        let result = run_with_io(&program, "".as_bytes(), &mut sink, Options::default());
        assert_eq!(error_kind(result), RuntimeErrorKind::Arity);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_duplicate_function_and_undefined_call() {
        let source = "HAI\nHOW IZ I f\nIF U SAY SO\nHOW IZ I f\nIF U SAY SO\nWAZZUP\nBUHBYE\nKTHXBYE";
        assert_eq!(
            error_kind(run_source(source, "", Options::default())),
            RuntimeErrorKind::Name
        );
        assert_eq!(
            error_kind(run_source(&program("", "I IZ nope MKAY"), "", Options::default())),
            RuntimeErrorKind::Name
        );
    }

    #[test]
    fn test_runaway_recursion_hits_depth_limit() {
        let source = "HAI\nHOW IZ I f\nFOUND YR I IZ f MKAY\nIF U SAY SO\nWAZZUP\nBUHBYE\nI IZ f MKAY\nKTHXBYE";
        let options = Options {
            max_call_depth: 32,
            ..Options::default()
        };
        assert_eq!(error_kind(run_source(source, "", options)), RuntimeErrorKind::Limit);
    }

    #[test]
    fn test_declaration_rules() {
        assert_eq!(
            error_kind(run_source(
                &program("I HAS A x\nI HAS A x", ""),
                "",
                Options::default()
            )),
            RuntimeErrorKind::Name
        );
        assert_eq!(
            error_kind(run_source(&program("", "VISIBLE y"), "", Options::default())),
            RuntimeErrorKind::Name
        );
        assert_eq!(
            error_kind(run_source(&program("", "y R 1"), "", Options::default())),
            RuntimeErrorKind::Name
        );
    }

    #[test]
    fn test_error_carries_token_index() {
        // HAI WAZZUP BUHBYE VISIBLE QUOSHUNT OF 1 AN 0 KTHXBYE
        let result = run_source(
            "HAI WAZZUP BUHBYE VISIBLE QUOSHUNT OF 1 AN 0 KTHXBYE",
            "",
            Options::default(),
        );
        match result {
            Err(Error::Runtime { kind, index, .. }) => {
                assert_eq!(kind, RuntimeErrorKind::Arithmetic);
                assert_eq!(index, 4);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_arithmetic_promotion_and_errors() -> Result<()> {
        let output = output_of(&program(
            "",
            "VISIBLE SUM OF 1 AN 2.5\nVISIBLE QUOSHUNT OF 7 AN 2\nVISIBLE MOD OF 7 AN 3\n\
             VISIBLE BIGGR OF 3 AN 9\nVISIBLE SMALLR OF 3 AN 1.5\nVISIBLE SUM OF \"4\" AN WIN\n\
             VISIBLE PRODUKT OF \"1.5\" AN 2",
        ))?;
        assert_eq!(output, vec!["3.5", "3", "1", "9", "1.5", "5", "3.0"]);

        for body in [
            "QUOSHUNT OF 1 AN 0",
            "MOD OF 1 AN 0",
            "QUOSHUNT OF 1.0 AN 0.0",
            "SUM OF 9223372036854775807 AN 1",
        ] {
            assert_eq!(
                error_kind(run_source(&program("", body), "", Options::default())),
                RuntimeErrorKind::Arithmetic
            );
        }
        assert_eq!(
            error_kind(run_source(&program("", "SUM OF \"cat\" AN 1"), "", Options::default())),
            RuntimeErrorKind::Type
        );
        Ok(())
    }

    #[test]
    fn test_sum_is_commutative() {
        let pairs = [(0, 0), (3, -7), (-12, 12), (1 << 40, 99), (i64::MIN, 0)];
        for (a, b) in pairs {
            let forward = arithmetic(ArithOp::Sum, Number::Int(a), Number::Int(b), 0).ok();
            let backward = arithmetic(ArithOp::Sum, Number::Int(b), Number::Int(a), 0).ok();
            assert_eq!(forward, backward);
            assert_eq!(forward, Some(Value::Numbr(a + b)));
        }
    }

    #[test]
    fn test_comparison_requires_same_type() -> Result<()> {
        let output = output_of(&program(
            "I HAS A x ITZ 3",
            "VISIBLE BOTH SAEM x AN 3\nVISIBLE DIFFRINT x AN 4\nVISIBLE BOTH SAEM \"a\" AN \"a\"\n\
             VISIBLE BOTH SAEM MAEK x A NUMBAR AN 3.0",
        ))?;
        assert_eq!(output, vec!["WIN", "WIN", "WIN", "WIN"]);

        assert_eq!(
            error_kind(run_source(
                &program("", "BOTH SAEM 1 AN 1.0"),
                "",
                Options::default()
            )),
            RuntimeErrorKind::Type
        );
        Ok(())
    }

    #[test]
    fn test_logic_operators() -> Result<()> {
        let output = output_of(&program(
            "",
            "VISIBLE BOTH OF WIN AN 0\nVISIBLE EITHER OF \"\" AN 1\nVISIBLE WON OF WIN AN WIN\n\
             VISIBLE NOT NOOB\nVISIBLE ALL OF WIN AN 1 AN \"x\" MKAY\nVISIBLE ANY OF FAIL AN 0 AN \"\" MKAY",
        ))?;
        assert_eq!(output, vec!["FAIL", "WIN", "FAIL", "WIN", "WIN", "FAIL"]);
        Ok(())
    }

    #[test]
    fn test_variadic_evaluates_every_operand() -> Result<()> {
        let source = "HAI\nHOW IZ I loud\nVISIBLE \"side effect\"\nFOUND YR WIN\nIF U SAY SO\n\
                      WAZZUP\nBUHBYE\nVISIBLE ANY OF WIN AN I IZ loud MKAY MKAY\nKTHXBYE";
        assert_eq!(output_of(source)?, vec!["side effect", "WIN"]);
        Ok(())
    }

    #[test]
    fn test_retype_and_cast() -> Result<()> {
        let outcome = run_source(
            &program(
                "I HAS A s ITZ \"42\"\nI HAS A f ITZ 3.99\nI HAS A t",
                "s IS NOW A NUMBR\nf IS NOW A NUMBR\nVISIBLE MAEK t A TROOF\nVISIBLE MAEK f YARN\nt IS NOW A YARN",
            ),
            "",
            Options::default(),
        )?;
        assert_eq!(outcome.output, vec!["FAIL", "3"]);
        assert_eq!(
            outcome.variables,
            vec![
                Variable {
                    identifier: "s".to_string(),
                    declared_type: ValueType::Numbr,
                    value: Value::Numbr(42),
                },
                Variable {
                    identifier: "f".to_string(),
                    declared_type: ValueType::Numbr,
                    value: Value::Numbr(3),
                },
                Variable {
                    identifier: "t".to_string(),
                    declared_type: ValueType::Yarn,
                    value: Value::Yarn(String::new()),
                },
            ]
        );

        assert_eq!(
            error_kind(run_source(
                &program("I HAS A s ITZ \"cat\"", "s IS NOW A NUMBR"),
                "",
                Options::default()
            )),
            RuntimeErrorKind::Type
        );
        assert_eq!(
            error_kind(run_source(
                &program("I HAS A s ITZ 1", "s IS NOW A NOOB"),
                "",
                Options::default()
            )),
            RuntimeErrorKind::Type
        );
        Ok(())
    }

    #[test]
    fn test_gimmeh_infers_type() -> Result<()> {
        let outcome = run_source(
            &program(
                "I HAS A a\nI HAS A b\nI HAS A c\nI HAS A d",
                "GIMMEH a\nGIMMEH b\nGIMMEH c\nGIMMEH d",
            ),
            "12\n-3.5\nWIN\nhello there\r\n",
            Options::default(),
        )?;
        let values: Vec<_> = outcome.variables.into_iter().map(|v| v.value).collect();
        assert_eq!(
            values,
            vec![
                Value::Numbr(12),
                Value::Numbar(-3.5),
                Value::Troof(true),
                Value::Yarn("hello there".to_string()),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_gimmeh_at_end_of_input() {
        assert_eq!(
            error_kind(run_source(
                &program("I HAS A a", "GIMMEH a"),
                "",
                Options::default()
            )),
            RuntimeErrorKind::Input
        );
    }

    #[test]
    fn test_it_register() -> Result<()> {
        let output = output_of(&program(
            "I HAS A x ITZ 4",
            "SUM OF x AN 1\nVISIBLE IT\nVISIBLE IT\nx R 100\nVISIBLE IT",
        ))?;
        assert_eq!(output, vec!["5", "5", "100"]);
        Ok(())
    }

    #[test]
    fn test_assignment_feeds_conditional() -> Result<()> {
        let body = "SUM OF 1 AN 1\nx R 0\nO RLY? YA RLY VISIBLE \"T\" NO WAI VISIBLE \"F\" OIC";
        assert_eq!(output_of(&program("I HAS A x", body))?, vec!["F"]);

        let output = output_of(&program(
            "I HAS A flag ITZ WIN",
            "O RLY? YA RLY VISIBLE \"T\" NO WAI VISIBLE \"F\" OIC",
        ))?;
        assert_eq!(output, vec!["T"]);
        Ok(())
    }

    #[test]
    fn test_numbar_keeps_full_precision() -> Result<()> {
        let output = output_of(&program(
            "I HAS A s ITZ \"3.14159\"",
            "VISIBLE 3.14159\nVISIBLE SMOOSH 0.1 AN \"|\" AN 2.0 MKAY\n\
             s IS NOW A NUMBAR\ns IS NOW A YARN\nVISIBLE s\nVISIBLE MAEK 7 A NUMBAR",
        ))?;
        assert_eq!(output, vec!["3.14159", "0.1|2.0", "3.14159", "7.0"]);
        Ok(())
    }

    #[test]
    fn test_outcome_reports_globals() -> Result<()> {
        let outcome = run_source(
            &program("I HAS A x ITZ WIN\nI HAS A y", "y R SMOOSH x AN \"!\" MKAY"),
            "",
            Options::default(),
        )?;
        assert_eq!(
            outcome.variables[1],
            Variable {
                identifier: "y".to_string(),
                declared_type: ValueType::Yarn,
                value: Value::Yarn("WIN!".to_string()),
            }
        );
        Ok(())
    }
}
