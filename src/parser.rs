use crate::{
    error::{syntax_error, Result},
    runtime::ValueType,
    tokenizer::{Token, TokenKind},
};
use log::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub functions: Vec<FunctionDecl>,
    pub declarations: Vec<Declaration>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub name: String,
    pub initializer: Option<Expr>,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub stmt_type: StmtType,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtType {
    Visible(Vec<Expr>),
    Gimmeh(String),
    Declare(Declaration),
    Assign {
        name: String,
        value: Expr,
    },
    Retype {
        name: String,
        target: ValueType,
    },
    Conditional {
        then_branch: Vec<Stmt>,
        else_ifs: Vec<(Expr, Vec<Stmt>)>,
        else_branch: Vec<Stmt>,
    },
    Switch {
        cases: Vec<Case>,
        default: Option<Vec<Stmt>>,
    },
    Loop {
        label: String,
        step: Option<LoopStep>,
        guard: Option<LoopGuard>,
        body: Vec<Stmt>,
    },
    Return(Expr),
    Break,
    Expression(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Case {
    pub literal: Literal,
    pub body: Vec<Stmt>,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOp {
    Uppin,
    Nerfin,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopStep {
    pub op: StepOp,
    pub variable: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoopGuard {
    Til(Expr),
    Wile(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub expr_type: ExprType,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprType {
    Literal(Literal),
    Variable(String),
    It,
    Binary {
        operator: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Not(Box<Expr>),
    Variadic {
        operator: VariadicOp,
        operands: Vec<Expr>,
    },
    Smoosh(Vec<Expr>),
    Cast {
        expr: Box<Expr>,
        target: ValueType,
    },
    Call {
        name: String,
        arguments: Vec<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Numbr(i64),
    Numbar(f64),
    Yarn(String),
    Troof(bool),
    Noob,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Sum,
    Diff,
    Produkt,
    Quoshunt,
    Mod,
    Biggr,
    Smallr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Arithmetic(ArithOp),
    BothSaem,
    Diffrint,
    BothOf,
    EitherOf,
    WonOf,
}

impl BinaryOp {
    fn from_keyword(keyword: &str) -> Option<Self> {
        let op = match keyword {
            "SUM OF" => BinaryOp::Arithmetic(ArithOp::Sum),
            "DIFF OF" => BinaryOp::Arithmetic(ArithOp::Diff),
            "PRODUKT OF" => BinaryOp::Arithmetic(ArithOp::Produkt),
            "QUOSHUNT OF" => BinaryOp::Arithmetic(ArithOp::Quoshunt),
            "MOD OF" => BinaryOp::Arithmetic(ArithOp::Mod),
            "BIGGR OF" => BinaryOp::Arithmetic(ArithOp::Biggr),
            "SMALLR OF" => BinaryOp::Arithmetic(ArithOp::Smallr),
            "BOTH SAEM" => BinaryOp::BothSaem,
            "DIFFRINT" => BinaryOp::Diffrint,
            "BOTH OF" => BinaryOp::BothOf,
            "EITHER OF" => BinaryOp::EitherOf,
            "WON OF" => BinaryOp::WonOf,
            _ => return None,
        };
        Some(op)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariadicOp {
    All,
    Any,
}

pub fn parse(tokens: &[Token]) -> Result<Program> {
    check_block_comments(tokens)?;

    let significant: Vec<(usize, &Token)> = tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| !t.is_comment())
        .collect();

    let mut parser = Parser {
        tokens: significant,
        cursor: 0,
        functions: Vec::new(),
        in_function: false,
        breakable_depth: 0,
        last_index: tokens.len().saturating_sub(1),
    };

    let program = parser.parse_program()?;
    debug!(
        "parsed program: {} functions, {} declarations, {} statements",
        program.functions.len(),
        program.declarations.len(),
        program.body.len()
    );
    Ok(program)
}

fn check_block_comments(tokens: &[Token]) -> Result<()> {
    let mut open = None;
    for (index, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::CommentBlockStart => open = Some(index),
            TokenKind::CommentBlockEnd => open = None,
            _ => (),
        }
    }
    match open {
        Some(index) => syntax_error("unterminated OBTW comment block", index, &tokens[index].text),
        None => Ok(()),
    }
}

const BLOCK_END: &[&str] = &["OIC"];
const BRANCH_END: &[&str] = &["MEBBE", "NO WAI", "OIC"];
const CASE_END: &[&str] = &["OMG", "OMGWTF", "OIC"];

struct Parser<'a> {
    tokens: Vec<(usize, &'a Token)>,
    cursor: usize,
    functions: Vec<FunctionDecl>,
    in_function: bool,
    breakable_depth: usize,
    last_index: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> Option<&'a Token> {
        self.tokens.get(self.cursor + offset).map(|(_, t)| *t)
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        self.peek().is_some_and(|t| t.is_keyword(keyword))
    }

    fn current_index(&self) -> usize {
        self.tokens
            .get(self.cursor)
            .map_or(self.last_index, |(i, _)| *i)
    }

    fn advance(&mut self) -> Option<(usize, &'a Token)> {
        let next = self.tokens.get(self.cursor).copied();
        if next.is_some() {
            self.cursor += 1;
        }
        next
    }

    fn error_here<T>(&self, message: impl Into<String>) -> Result<T> {
        match self.tokens.get(self.cursor) {
            Some((index, token)) => syntax_error(message, *index, &token.text),
            None => syntax_error(message, self.last_index, "end of input"),
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<usize> {
        if self.peek_keyword(keyword) {
            let index = self.current_index();
            self.cursor += 1;
            Ok(index)
        } else {
            self.error_here(format!("expected '{}'", keyword))
        }
    }

    fn expect_identifier(&mut self, what: &str) -> Result<(usize, String)> {
        match self.peek() {
            Some(token) if token.kind == TokenKind::Varident => {
                let index = self.current_index();
                self.cursor += 1;
                Ok((index, token.text.clone()))
            }
            _ => self.error_here(format!("expected {}", what)),
        }
    }

    /// Identifiers that can be bound or written; the IT register is not one.
    fn expect_target(&mut self, what: &str) -> Result<(usize, String)> {
        if self.peek().is_some_and(|t| t.kind == TokenKind::Varident && t.text == "IT") {
            return self.error_here(format!("IT cannot be used as {}", what));
        }
        self.expect_identifier(what)
    }

    fn parse_program(&mut self) -> Result<Program> {
        self.expect_keyword("HAI")?;

        // Optional version, e.g. HAI 1.2
        if self.peek().is_some_and(|t| {
            matches!(t.kind, TokenKind::NumbarLiteral | TokenKind::NumbrLiteral)
        }) {
            self.cursor += 1;
        }

        while self.peek_keyword("HOW IZ I") {
            self.parse_function()?;
        }

        self.expect_keyword("WAZZUP")?;
        let mut declarations = Vec::new();
        while !self.peek_keyword("BUHBYE") {
            if !self.peek_keyword("I HAS A") {
                return self.error_here("only variable declarations are allowed in WAZZUP");
            }
            declarations.push(self.parse_declaration()?);
        }
        self.expect_keyword("BUHBYE")?;

        let body = self.parse_block(&["KTHXBYE"])?;
        self.expect_keyword("KTHXBYE")?;

        if self.cursor < self.tokens.len() {
            return self.error_here("KTHXBYE must be the last token of the program");
        }

        Ok(Program {
            functions: std::mem::take(&mut self.functions),
            declarations,
            body,
        })
    }

    /// Parses statements until one of `terminators` is next, without consuming it.
    fn parse_block(&mut self, terminators: &[&str]) -> Result<Vec<Stmt>> {
        let mut statements = Vec::new();

        loop {
            let Some(token) = self.peek() else {
                return self.error_here(format!("expected '{}'", terminators.join("' or '")));
            };

            if token.kind == TokenKind::Keyword && terminators.contains(&token.text.as_str()) {
                return Ok(statements);
            }

            if token.is_keyword("HOW IZ I") {
                self.parse_function()?;
                continue;
            }

            statements.push(self.parse_statement()?);
        }
    }

    fn parse_statement(&mut self) -> Result<Stmt> {
        let index = self.current_index();
        let Some(token) = self.peek() else {
            return self.error_here("expected statement");
        };

        let stmt_type = match token.kind {
            TokenKind::Keyword => match token.text.as_str() {
                "VISIBLE" => self.parse_visible()?,
                "GIMMEH" => {
                    self.cursor += 1;
                    let (_, name) = self.expect_target("a GIMMEH target")?;
                    StmtType::Gimmeh(name)
                }
                "I HAS A" => StmtType::Declare(self.parse_declaration()?),
                "O RLY?" => self.parse_conditional()?,
                "WTF?" => self.parse_switch()?,
                "IM IN YR" => self.parse_loop()?,
                "FOUND YR" => {
                    if !self.in_function {
                        return self.error_here("FOUND YR outside of a function");
                    }
                    self.cursor += 1;
                    StmtType::Return(self.parse_expression()?)
                }
                "GTFO" => {
                    if !self.in_function && self.breakable_depth == 0 {
                        return self.error_here("GTFO outside of a loop, switch or function");
                    }
                    self.cursor += 1;
                    StmtType::Break
                }
                _ => StmtType::Expression(self.parse_expression()?),
            },
            TokenKind::Varident => match self.peek_at(1) {
                Some(next) if next.is_keyword("R") => {
                    let (_, name) = self.expect_target("an assignment target")?;
                    self.cursor += 1; // Skip 'R'
                    StmtType::Assign {
                        name,
                        value: self.parse_expression()?,
                    }
                }
                Some(next) if next.is_keyword("IS NOW A") => {
                    let (_, name) = self.expect_target("a retype target")?;
                    self.cursor += 1; // Skip 'IS NOW A'
                    StmtType::Retype {
                        name,
                        target: self.parse_type()?,
                    }
                }
                _ => StmtType::Expression(self.parse_expression()?),
            },
            _ => StmtType::Expression(self.parse_expression()?),
        };

        Ok(Stmt { stmt_type, index })
    }

    fn parse_declaration(&mut self) -> Result<Declaration> {
        let index = self.expect_keyword("I HAS A")?;
        let (_, name) = self.expect_target("a variable name after 'I HAS A'")?;

        let initializer = if self.peek_keyword("ITZ") {
            self.cursor += 1;
            Some(self.parse_expression()?)
        } else {
            None
        };

        Ok(Declaration {
            name,
            initializer,
            index,
        })
    }

    fn parse_visible(&mut self) -> Result<StmtType> {
        self.cursor += 1; // Skip 'VISIBLE'

        let mut operands = vec![self.parse_expression()?];
        while self
            .peek()
            .is_some_and(|t| t.is_keyword("AN") || t.kind == TokenKind::ConcatOp)
        {
            self.cursor += 1;
            operands.push(self.parse_expression()?);
        }

        Ok(StmtType::Visible(operands))
    }

    fn parse_conditional(&mut self) -> Result<StmtType> {
        self.cursor += 1; // Skip 'O RLY?'

        let then_branch = if self.peek_keyword("YA RLY") {
            self.cursor += 1;
            self.parse_block(BRANCH_END)?
        } else {
            Vec::new()
        };

        let mut else_ifs = Vec::new();
        while self.peek_keyword("MEBBE") {
            self.cursor += 1;
            let guard = self.parse_expression()?;
            let body = self.parse_block(BRANCH_END)?;
            else_ifs.push((guard, body));
        }

        let else_branch = if self.peek_keyword("NO WAI") {
            self.cursor += 1;
            self.parse_block(BLOCK_END)?
        } else {
            Vec::new()
        };

        self.expect_keyword("OIC")?;

        Ok(StmtType::Conditional {
            then_branch,
            else_ifs,
            else_branch,
        })
    }

    fn parse_switch(&mut self) -> Result<StmtType> {
        self.cursor += 1; // Skip 'WTF?'
        self.breakable_depth += 1;

        let mut cases = Vec::new();
        while self.peek_keyword("OMG") {
            self.cursor += 1;
            let index = self.current_index();
            let literal = self.parse_literal()?;
            let body = self.parse_block(CASE_END)?;
            cases.push(Case {
                literal,
                body,
                index,
            });
        }

        let default = if self.peek_keyword("OMGWTF") {
            self.cursor += 1;
            Some(self.parse_block(BLOCK_END)?)
        } else {
            None
        };

        self.expect_keyword("OIC")?;
        self.breakable_depth -= 1;

        Ok(StmtType::Switch { cases, default })
    }

    fn parse_loop(&mut self) -> Result<StmtType> {
        self.cursor += 1; // Skip 'IM IN YR'
        let (_, label) = self.expect_identifier("a loop label")?;

        let step = match self.peek() {
            Some(t) if t.is_keyword("UPPIN") || t.is_keyword("NERFIN") => {
                let op = if t.is_keyword("UPPIN") {
                    StepOp::Uppin
                } else {
                    StepOp::Nerfin
                };
                self.cursor += 1;
                self.expect_keyword("YR")?;
                let (_, variable) = self.expect_target("a loop variable")?;
                Some(LoopStep { op, variable })
            }
            _ => None,
        };

        let guard = match self.peek() {
            Some(t) if t.is_keyword("TIL") => {
                self.cursor += 1;
                Some(LoopGuard::Til(self.parse_expression()?))
            }
            Some(t) if t.is_keyword("WILE") => {
                self.cursor += 1;
                Some(LoopGuard::Wile(self.parse_expression()?))
            }
            _ => None,
        };

        self.breakable_depth += 1;
        let body = self.parse_block(&["IM OUTTA YR"])?;
        self.breakable_depth -= 1;

        self.expect_keyword("IM OUTTA YR")?;
        let closing_index = self.current_index();
        let (_, closing) = self.expect_identifier("a loop label after 'IM OUTTA YR'")?;
        if closing != label {
            return syntax_error(
                format!("loop '{}' closed with label '{}'", label, closing),
                closing_index,
                &closing,
            );
        }

        Ok(StmtType::Loop {
            label,
            step,
            guard,
            body,
        })
    }

    fn parse_function(&mut self) -> Result<()> {
        if self.in_function {
            return self.error_here("functions cannot be declared inside a function");
        }
        let index = self.expect_keyword("HOW IZ I")?;
        let (_, name) = self.expect_identifier("a function name")?;

        let mut params: Vec<String> = Vec::new();
        if self.peek_keyword("YR") {
            loop {
                self.expect_keyword("YR")?;
                let param_index = self.current_index();
                let (_, param) = self.expect_target("a parameter name")?;
                if params.contains(&param) {
                    return syntax_error(
                        format!("duplicate parameter '{}'", param),
                        param_index,
                        &param,
                    );
                }
                params.push(param);

                if !self.peek_keyword("AN") {
                    break;
                }
                self.cursor += 1; // Skip 'AN'
            }
        }

        self.in_function = true;
        let saved_depth = std::mem::replace(&mut self.breakable_depth, 0);
        let body = self.parse_block(&["IF U SAY SO"])?;
        self.breakable_depth = saved_depth;
        self.in_function = false;

        self.expect_keyword("IF U SAY SO")?;

        self.functions.push(FunctionDecl {
            name,
            params,
            body,
            index,
        });
        Ok(())
    }

    fn parse_type(&mut self) -> Result<ValueType> {
        let target = match self.peek() {
            Some(t) if t.kind == TokenKind::Keyword => match t.text.as_str() {
                "NUMBR" => ValueType::Numbr,
                "NUMBAR" => ValueType::Numbar,
                "YARN" => ValueType::Yarn,
                "TROOF" => ValueType::Troof,
                "NOOB" => ValueType::Noob,
                _ => return self.error_here("expected a type"),
            },
            _ => return self.error_here("expected a type"),
        };
        self.cursor += 1;
        Ok(target)
    }

    fn parse_literal(&mut self) -> Result<Literal> {
        let Some((index, token)) = self.advance() else {
            return self.error_here("expected a literal");
        };

        match token.kind {
            TokenKind::NumbrLiteral => match token.text.parse() {
                Ok(n) => Ok(Literal::Numbr(n)),
                Err(_) => syntax_error("NUMBR literal out of range", index, &token.text),
            },
            TokenKind::NumbarLiteral => match token.text.parse() {
                Ok(n) => Ok(Literal::Numbar(n)),
                Err(_) => syntax_error("invalid NUMBAR literal", index, &token.text),
            },
            TokenKind::YarnLiteral => unescape_yarn(&token.text)
                .map(Literal::Yarn)
                .or_else(|message| syntax_error(message, index, &token.text)),
            TokenKind::TroofLiteral => Ok(Literal::Troof(token.text == "WIN")),
            _ if token.is_keyword("NOOB") => Ok(Literal::Noob),
            _ => syntax_error("expected a literal", index, &token.text),
        }
    }

    fn parse_expression(&mut self) -> Result<Expr> {
        let index = self.current_index();
        let Some(token) = self.peek() else {
            return self.error_here("expected expression");
        };

        let expr_type = match token.kind {
            TokenKind::NumbrLiteral
            | TokenKind::NumbarLiteral
            | TokenKind::YarnLiteral
            | TokenKind::TroofLiteral => ExprType::Literal(self.parse_literal()?),
            TokenKind::Varident => {
                self.cursor += 1;
                if token.text == "IT" {
                    ExprType::It
                } else {
                    ExprType::Variable(token.text.clone())
                }
            }
            TokenKind::Keyword => {
                if let Some(operator) = BinaryOp::from_keyword(&token.text) {
                    self.cursor += 1;
                    let left = self.parse_expression()?;
                    if self.peek_keyword("AN") {
                        self.cursor += 1;
                    }
                    let right = self.parse_expression()?;
                    ExprType::Binary {
                        operator,
                        left: Box::new(left),
                        right: Box::new(right),
                    }
                } else {
                    match token.text.as_str() {
                        "NOT" => {
                            self.cursor += 1;
                            ExprType::Not(Box::new(self.parse_expression()?))
                        }
                        "ALL OF" | "ANY OF" => {
                            let operator = if token.text == "ALL OF" {
                                VariadicOp::All
                            } else {
                                VariadicOp::Any
                            };
                            self.cursor += 1;
                            ExprType::Variadic {
                                operator,
                                operands: self.parse_operand_list()?,
                            }
                        }
                        "SMOOSH" => {
                            self.cursor += 1;
                            ExprType::Smoosh(self.parse_operand_list()?)
                        }
                        "MAEK" => {
                            self.cursor += 1;
                            let expr = self.parse_expression()?;
                            if self.peek_keyword("A") {
                                self.cursor += 1;
                            }
                            ExprType::Cast {
                                expr: Box::new(expr),
                                target: self.parse_type()?,
                            }
                        }
                        "I IZ" => self.parse_call()?,
                        "NOOB" => ExprType::Literal(self.parse_literal()?),
                        _ => return self.error_here("expected expression"),
                    }
                }
            }
            _ => return self.error_here("expected expression"),
        };

        Ok(Expr { expr_type, index })
    }

    /// `expr (AN expr)* MKAY?`
    fn parse_operand_list(&mut self) -> Result<Vec<Expr>> {
        let mut operands = vec![self.parse_expression()?];
        while self.peek_keyword("AN") {
            self.cursor += 1;
            operands.push(self.parse_expression()?);
        }
        if self.peek_keyword("MKAY") {
            self.cursor += 1;
        }
        Ok(operands)
    }

    fn parse_call(&mut self) -> Result<ExprType> {
        self.cursor += 1; // Skip 'I IZ'
        let (_, name) = self.expect_identifier("a function name after 'I IZ'")?;

        let mut arguments = Vec::new();
        if self.peek_keyword("YR") {
            self.cursor += 1;
            arguments.push(self.parse_expression()?);
            while self.peek_keyword("AN") {
                self.cursor += 1;
                if self.peek_keyword("YR") {
                    self.cursor += 1;
                }
                arguments.push(self.parse_expression()?);
            }
        }
        if self.peek_keyword("MKAY") {
            self.cursor += 1;
        }

        Ok(ExprType::Call { name, arguments })
    }
}

/// Strips the quotes of a YARN literal and resolves `:` escapes.
pub fn unescape_yarn(raw: &str) -> std::result::Result<String, String> {
    let inner = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .ok_or_else(|| "malformed YARN literal".to_string())?;

    let mut unescaped = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != ':' {
            unescaped.push(c);
            continue;
        }
        match chars.next() {
            Some(')') => unescaped.push('\n'),
            Some('>') => unescaped.push('\t'),
            Some('o') => unescaped.push('\x07'),
            Some('"') => unescaped.push('"'),
            Some(':') => unescaped.push(':'),
            Some(other) => return Err(format!("unknown escape ':{}'", other)),
            None => return Err("dangling ':' at end of YARN literal".to_string()),
        }
    }
    Ok(unescaped)
}
