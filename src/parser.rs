use std::convert::TryFrom;
use std::mem::swap;

use tracing::debug;
#[cfg(feature = "debug-logging")]
use tracing::trace;

use crate::chunk::{ArithmeticOp, Chunk, Segment};
use crate::code_gen::{Generator, Operator};
use crate::common::{CompileError, CompileResult};
use crate::lexer::{Lexer, Token, TokenType};
use crate::symbol_table::{Kind, SymbolError, SymbolTable};

/// Single-pass compilation engine: every grammar production is a method
/// that consumes its tokens and emits instructions as it goes.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token<'a>,
    previous: Token<'a>,
    symbols: SymbolTable,
    generator: Generator,
    labels: LabelCounter,
    class_name: &'a str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SubroutineKind {
    Constructor,
    Function,
    Method,
}

/// What the prologue of a subroutine needs to know about it.
struct Subroutine<'a> {
    name: &'a str,
    kind: SubroutineKind,
    n_params: u16,
    n_locals: u16,
}

/// Label numbers are unique within one class compilation.
#[derive(Default)]
struct LabelCounter {
    next: usize,
}

impl LabelCounter {
    fn next(&mut self) -> usize {
        let label = self.next;
        self.next += 1;
        label
    }
}

impl<'a> Parser<'a> {
    pub fn new(lexer: Lexer<'a>) -> Self {
        let current = lexer.error_token("Before start");
        let previous = lexer.error_token("Before start");
        Self {
            lexer,
            current,
            previous,
            symbols: SymbolTable::new(),
            generator: Generator::new(),
            labels: LabelCounter::default(),
            class_name: "",
        }
    }

    /// Pulls the next token. A malformed token is charged to `production`,
    /// the construct that was reading past the previous token.
    pub fn advance(&mut self, production: &'static str) -> CompileResult<()> {
        swap(&mut self.current, &mut self.previous);
        self.current = self.lexer.next();

        #[cfg(feature = "debug-logging")]
        trace!(line = self.current.line, "{:?} '{}'", self.current.tok_type, self.current.source);

        if self.current.tok_type == TokenType::Error {
            return Err(CompileError::Lexical {
                line: self.current.line,
                production,
                message: self.current.source.to_string(),
            });
        }
        Ok(())
    }

    pub fn end(self) -> Chunk {
        self.generator.end()
    }

    fn check(&self, tok_type: TokenType) -> bool {
        self.current.tok_type == tok_type
    }

    fn match_tok(&mut self, tok_type: TokenType, production: &'static str) -> CompileResult<bool> {
        if self.check(tok_type) {
            self.advance(production)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn consume(&mut self, tok_type: TokenType, production: &'static str) -> CompileResult<()> {
        if self.check(tok_type) {
            self.advance(production)
        } else {
            Err(self.error_at_current(production, tok_type.describe()))
        }
    }

    fn identifier(&mut self, production: &'static str) -> CompileResult<&'a str> {
        self.consume(TokenType::Identifier, production)?;
        Ok(self.previous.source)
    }

    fn error_at_current(&self, production: &'static str, expected: &'static str) -> CompileError {
        Self::syntax_error(&self.current, production, expected)
    }

    fn error(&self, production: &'static str, expected: &'static str) -> CompileError {
        Self::syntax_error(&self.previous, production, expected)
    }

    fn syntax_error(token: &Token<'a>, production: &'static str, expected: &'static str) -> CompileError {
        CompileError::Syntax {
            line: token.line,
            production,
            expected,
            found: token.source.to_string(),
            category: token.tok_type.category(),
        }
    }

    fn symbol_error(&self, production: &'static str, source: SymbolError) -> CompileError {
        CompileError::Symbol {
            line: self.previous.line,
            production,
            found: self.previous.source.to_string(),
            category: self.previous.tok_type.category(),
            source,
        }
    }

    fn count_up(&self, count: u16, by: u16, production: &'static str, what: &'static str) -> CompileResult<u16> {
        count.checked_add(by).ok_or(CompileError::TooMany {
            line: self.previous.line,
            production,
            what,
        })
    }

    fn define(&mut self, name: &str, type_name: &str, kind: Kind, production: &'static str) -> CompileResult<()> {
        match self.symbols.define(name, type_name, kind) {
            Ok(_) => Ok(()),
            Err(e) => Err(self.symbol_error(production, e)),
        }
    }

    /// Storage location of a declared variable.
    fn resolve(&self, name: &str, production: &'static str) -> CompileResult<(Segment, u16)> {
        let location = self
            .symbols
            .kind_of(name)
            .and_then(|kind| Ok((kind.segment(), self.symbols.index_of(name)?)));
        location.map_err(|e| self.symbol_error(production, e))
    }

    pub fn class(&mut self) -> CompileResult<()> {
        self.consume(TokenType::Class, "class")?;
        self.class_name = self.identifier("class")?;
        self.consume(TokenType::LeftBrace, "class")?;

        let mut field_count = 0;
        while self.check(TokenType::Static) || self.check(TokenType::Field) {
            let declared = self.class_var_declaration()?;
            field_count = self.count_up(field_count, declared, "class", "fields")?;
        }
        debug!(
            class = self.class_name,
            fields = field_count,
            statics = self.symbols.var_count(Kind::Static),
            "declared class variables"
        );
        while self.check(TokenType::Constructor)
            || self.check(TokenType::Function)
            || self.check(TokenType::Method)
        {
            self.subroutine(field_count)?;
        }

        self.consume(TokenType::RightBrace, "class")?;
        self.consume(TokenType::Eof, "class")
    }

    /// Returns how many object fields the declaration added.
    fn class_var_declaration(&mut self) -> CompileResult<u16> {
        const PRODUCTION: &str = "classVarDec";
        let kind = if self.match_tok(TokenType::Static, PRODUCTION)? {
            Kind::Static
        } else {
            self.consume(TokenType::Field, PRODUCTION)?;
            Kind::Field
        };
        let type_name = self.type_name(PRODUCTION)?;

        let mut declared = 0;
        loop {
            let name = self.identifier(PRODUCTION)?;
            self.define(name, type_name, kind, PRODUCTION)?;
            declared = self.count_up(declared, 1, PRODUCTION, "variables")?;
            if !self.match_tok(TokenType::Comma, PRODUCTION)? {
                break;
            }
        }
        self.consume(TokenType::SemiColon, PRODUCTION)?;

        Ok(if kind == Kind::Field { declared } else { 0 })
    }

    fn type_name(&mut self, production: &'static str) -> CompileResult<&'a str> {
        match self.current.tok_type {
            TokenType::Int | TokenType::Char | TokenType::Boolean | TokenType::Identifier => {
                self.advance(production)?;
                Ok(self.previous.source)
            }
            _ => Err(self.error_at_current(production, "type")),
        }
    }

    fn subroutine(&mut self, field_count: u16) -> CompileResult<()> {
        const PRODUCTION: &str = "subroutineDec";
        let kind = match self.current.tok_type {
            TokenType::Constructor => SubroutineKind::Constructor,
            TokenType::Function => SubroutineKind::Function,
            TokenType::Method => SubroutineKind::Method,
            _ => return Err(self.error_at_current(PRODUCTION, "subroutine declaration")),
        };
        self.advance(PRODUCTION)?;
        self.symbols.start_subroutine();
        if kind == SubroutineKind::Method {
            let class_name = self.class_name;
            self.define("this", class_name, Kind::Argument, PRODUCTION)?;
        }

        if !self.match_tok(TokenType::Void, PRODUCTION)? {
            self.type_name(PRODUCTION)?;
        }
        let name = self.identifier(PRODUCTION)?;
        self.consume(TokenType::LeftParen, PRODUCTION)?;
        let n_params = self.parameter_list()?;
        self.consume(TokenType::RightParen, PRODUCTION)?;

        let subroutine = Subroutine {
            name,
            kind,
            n_params,
            n_locals: 0,
        };
        self.subroutine_body(subroutine, field_count)
    }

    fn parameter_list(&mut self) -> CompileResult<u16> {
        const PRODUCTION: &str = "parameterList";
        if self.check(TokenType::RightParen) {
            return Ok(0);
        }
        let mut count = 0;
        loop {
            let type_name = self.type_name(PRODUCTION)?;
            let name = self.identifier(PRODUCTION)?;
            self.define(name, type_name, Kind::Argument, PRODUCTION)?;
            count = self.count_up(count, 1, PRODUCTION, "parameters")?;
            if !self.match_tok(TokenType::Comma, PRODUCTION)? {
                return Ok(count);
            }
        }
    }

    fn subroutine_body(&mut self, mut subroutine: Subroutine<'a>, field_count: u16) -> CompileResult<()> {
        const PRODUCTION: &str = "subroutineBody";
        self.consume(TokenType::LeftBrace, PRODUCTION)?;
        while self.check(TokenType::Var) {
            let declared = self.var_declaration()?;
            subroutine.n_locals = self.count_up(subroutine.n_locals, declared, PRODUCTION, "locals")?;
        }

        self.generator
            .emit_function(self.class_name, subroutine.name, subroutine.n_locals);
        match subroutine.kind {
            SubroutineKind::Constructor => {
                self.generator.emit_push(Segment::Constant, field_count);
                self.generator.emit_call("Memory.alloc", 1);
                self.generator.emit_pop(Segment::Pointer, 0);
            }
            SubroutineKind::Method => {
                self.generator.emit_push(Segment::Argument, 0);
                self.generator.emit_pop(Segment::Pointer, 0);
            }
            SubroutineKind::Function => (),
        }

        self.statements()?;
        self.consume(TokenType::RightBrace, PRODUCTION)?;

        debug!(
            class = self.class_name,
            subroutine = subroutine.name,
            kind = ?subroutine.kind,
            params = subroutine.n_params,
            locals = subroutine.n_locals,
            "compiled subroutine"
        );
        Ok(())
    }

    /// Returns the number of locals declared.
    fn var_declaration(&mut self) -> CompileResult<u16> {
        const PRODUCTION: &str = "varDec";
        self.consume(TokenType::Var, PRODUCTION)?;
        let type_name = self.type_name(PRODUCTION)?;
        let mut count = 0;
        loop {
            let name = self.identifier(PRODUCTION)?;
            self.define(name, type_name, Kind::Local, PRODUCTION)?;
            count = self.count_up(count, 1, PRODUCTION, "locals")?;
            if !self.match_tok(TokenType::Comma, PRODUCTION)? {
                break;
            }
        }
        self.consume(TokenType::SemiColon, PRODUCTION)?;
        Ok(count)
    }

    fn statements(&mut self) -> CompileResult<()> {
        loop {
            match self.current.tok_type {
                TokenType::Let => self.let_statement()?,
                TokenType::Do => self.do_statement()?,
                TokenType::While => self.while_statement()?,
                TokenType::Return => self.return_statement()?,
                TokenType::If => self.if_statement()?,
                TokenType::RightBrace => return Ok(()),
                _ => return Err(self.error_at_current("statements", "statement or '}'")),
            }
        }
    }

    fn let_statement(&mut self) -> CompileResult<()> {
        const PRODUCTION: &str = "letStatement";
        self.consume(TokenType::Let, PRODUCTION)?;
        let name = self.identifier(PRODUCTION)?;
        let (segment, index) = self.resolve(name, PRODUCTION)?;

        if self.match_tok(TokenType::LeftBracket, PRODUCTION)? {
            self.generator.emit_push(segment, index);
            self.expression()?;
            self.consume(TokenType::RightBracket, PRODUCTION)?;
            self.generator.emit_arithmetic(ArithmeticOp::Add);

            self.consume(TokenType::Equal, PRODUCTION)?;
            self.expression()?;
            self.consume(TokenType::SemiColon, PRODUCTION)?;

            // The value is parked in temp while `that` is repointed at the element.
            self.generator.emit_pop(Segment::Temp, 0);
            self.generator.emit_pop(Segment::Pointer, 1);
            self.generator.emit_push(Segment::Temp, 0);
            self.generator.emit_pop(Segment::That, 0);
        } else {
            self.consume(TokenType::Equal, PRODUCTION)?;
            self.expression()?;
            self.consume(TokenType::SemiColon, PRODUCTION)?;
            self.generator.emit_pop(segment, index);
        }
        Ok(())
    }

    fn do_statement(&mut self) -> CompileResult<()> {
        const PRODUCTION: &str = "doStatement";
        self.consume(TokenType::Do, PRODUCTION)?;
        let name = self.identifier(PRODUCTION)?;
        self.subroutine_call(name)?;
        self.consume(TokenType::SemiColon, PRODUCTION)?;
        // discard the return value
        self.generator.emit_pop(Segment::Temp, 0);
        Ok(())
    }

    fn while_statement(&mut self) -> CompileResult<()> {
        const PRODUCTION: &str = "whileStatement";
        self.consume(TokenType::While, PRODUCTION)?;
        let label = self.labels.next();
        let start = format!("WHILE_START{}", label);
        let end = format!("WHILE_END{}", label);

        self.generator.emit_label(&start);
        self.consume(TokenType::LeftParen, PRODUCTION)?;
        self.expression()?;
        self.consume(TokenType::RightParen, PRODUCTION)?;
        self.generator.emit_arithmetic(ArithmeticOp::Not);
        self.generator.emit_if_goto(&end);

        self.consume(TokenType::LeftBrace, PRODUCTION)?;
        self.statements()?;
        self.consume(TokenType::RightBrace, PRODUCTION)?;

        self.generator.emit_goto(&start);
        self.generator.emit_label(&end);
        Ok(())
    }

    fn if_statement(&mut self) -> CompileResult<()> {
        const PRODUCTION: &str = "ifStatement";
        self.consume(TokenType::If, PRODUCTION)?;
        let label = self.labels.next();
        let if_false = format!("IF_FALSE{}", label);
        let if_end = format!("IF_END{}", label);

        self.consume(TokenType::LeftParen, PRODUCTION)?;
        self.expression()?;
        self.consume(TokenType::RightParen, PRODUCTION)?;
        self.generator.emit_arithmetic(ArithmeticOp::Not);
        self.generator.emit_if_goto(&if_false);

        self.consume(TokenType::LeftBrace, PRODUCTION)?;
        self.statements()?;
        self.consume(TokenType::RightBrace, PRODUCTION)?;
        self.generator.emit_goto(&if_end);
        self.generator.emit_label(&if_false);

        if self.match_tok(TokenType::Else, PRODUCTION)? {
            self.consume(TokenType::LeftBrace, PRODUCTION)?;
            self.statements()?;
            self.consume(TokenType::RightBrace, PRODUCTION)?;
        }
        self.generator.emit_label(&if_end);
        Ok(())
    }

    fn return_statement(&mut self) -> CompileResult<()> {
        const PRODUCTION: &str = "returnStatement";
        self.consume(TokenType::Return, PRODUCTION)?;
        if self.check(TokenType::SemiColon) {
            // every subroutine hands a value back, even void ones
            self.generator.emit_push(Segment::Constant, 0);
        } else {
            self.expression()?;
        }
        self.consume(TokenType::SemiColon, PRODUCTION)?;
        self.generator.emit_return();
        Ok(())
    }

    /// Operators apply strictly left to right; there is no precedence.
    fn expression(&mut self) -> CompileResult<()> {
        self.term()?;
        while let Some(operator) = binary_operator(self.current.tok_type) {
            self.advance("expression")?;
            self.term()?;
            self.generator.emit_operator(operator);
        }
        Ok(())
    }

    fn term(&mut self) -> CompileResult<()> {
        const PRODUCTION: &str = "term";
        self.advance(PRODUCTION)?;
        match self.previous.tok_type {
            TokenType::Integer => {
                let value = self.previous.source.parse::<u16>().map_err(|_| CompileError::Lexical {
                    line: self.previous.line,
                    production: PRODUCTION,
                    message: "Integer constant out of range.".to_string(),
                })?;
                self.generator.emit_push(Segment::Constant, value);
            }
            TokenType::Str => self.string()?,
            TokenType::True => {
                self.generator.emit_push(Segment::Constant, 0);
                self.generator.emit_arithmetic(ArithmeticOp::Not);
            }
            TokenType::False | TokenType::Null => self.generator.emit_push(Segment::Constant, 0),
            TokenType::This => self.generator.emit_push(Segment::Pointer, 0),
            TokenType::Identifier => {
                let name = self.previous.source;
                match self.current.tok_type {
                    TokenType::LeftParen | TokenType::Dot => self.subroutine_call(name)?,
                    TokenType::LeftBracket => {
                        let (segment, index) = self.resolve(name, PRODUCTION)?;
                        self.advance(PRODUCTION)?;
                        self.generator.emit_push(segment, index);
                        self.expression()?;
                        self.consume(TokenType::RightBracket, PRODUCTION)?;
                        self.generator.emit_arithmetic(ArithmeticOp::Add);
                        self.generator.emit_pop(Segment::Pointer, 1);
                        self.generator.emit_push(Segment::That, 0);
                    }
                    _ => {
                        let (segment, index) = self.resolve(name, PRODUCTION)?;
                        self.generator.emit_push(segment, index);
                    }
                }
            }
            TokenType::LeftParen => {
                self.expression()?;
                self.consume(TokenType::RightParen, PRODUCTION)?;
            }
            TokenType::Minus => {
                self.term()?;
                self.generator.emit_arithmetic(ArithmeticOp::Neg);
            }
            TokenType::Tilde => {
                self.term()?;
                self.generator.emit_arithmetic(ArithmeticOp::Not);
            }
            _ => return Err(self.error(PRODUCTION, "term")),
        }
        Ok(())
    }

    /// String constants are built at runtime one character at a time.
    fn string(&mut self) -> CompileResult<()> {
        let source = self.previous.source;
        let text = &source[1..source.len() - 1];
        let length = u16::try_from(text.len()).map_err(|_| CompileError::Lexical {
            line: self.previous.line,
            production: "term",
            message: "String constant too long.".to_string(),
        })?;
        self.generator.emit_push(Segment::Constant, length);
        self.generator.emit_call("String.new", 1);
        for c in text.bytes() {
            self.generator.emit_push(Segment::Constant, u16::from(c));
            self.generator.emit_call("String.appendChar", 2);
        }
        Ok(())
    }

    /// Compiles a call whose leading identifier has already been consumed.
    /// A receiver that resolves to a variable is passed as an implicit first
    /// argument; an unresolved one names a class and contributes nothing.
    fn subroutine_call(&mut self, name: &'a str) -> CompileResult<()> {
        const PRODUCTION: &str = "subroutineCall";
        let (target, receivers) = if self.match_tok(TokenType::Dot, PRODUCTION)? {
            let member = self.identifier(PRODUCTION)?;
            let receiver_class = self.symbols.type_of(name).ok().map(str::to_string);
            match receiver_class {
                Some(class_name) => {
                    let (segment, index) = self.resolve(name, PRODUCTION)?;
                    self.generator.emit_push(segment, index);
                    (format!("{}.{}", class_name, member), 1)
                }
                None => (format!("{}.{}", name, member), 0),
            }
        } else {
            self.generator.emit_push(Segment::Pointer, 0);
            (format!("{}.{}", self.class_name, name), 1)
        };

        self.consume(TokenType::LeftParen, PRODUCTION)?;
        let n_args = self.expression_list()?;
        self.consume(TokenType::RightParen, PRODUCTION)?;
        let n_args = self.count_up(n_args, receivers, PRODUCTION, "arguments")?;
        self.generator.emit_call(&target, n_args);
        Ok(())
    }

    /// Returns the number of expressions compiled.
    fn expression_list(&mut self) -> CompileResult<u16> {
        const PRODUCTION: &str = "expressionList";
        if self.check(TokenType::RightParen) {
            return Ok(0);
        }
        self.expression()?;
        let mut count = 1;
        while self.match_tok(TokenType::Comma, PRODUCTION)? {
            self.expression()?;
            count = self.count_up(count, 1, PRODUCTION, "arguments")?;
        }
        Ok(count)
    }
}

fn binary_operator(tok_type: TokenType) -> Option<Operator> {
    match tok_type {
        TokenType::Plus => Some(Operator::Add),
        TokenType::Minus => Some(Operator::Sub),
        TokenType::Star => Some(Operator::Mul),
        TokenType::Slash => Some(Operator::Div),
        TokenType::Amp => Some(Operator::And),
        TokenType::Pipe => Some(Operator::Or),
        TokenType::Less => Some(Operator::Less),
        TokenType::Greater => Some(Operator::Greater),
        TokenType::Equal => Some(Operator::Equal),
        _ => None,
    }
}
