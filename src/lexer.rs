use std::fmt;

pub struct Lexer<'a> {
    source: &'a [u8],
    start: usize,
    current: usize,
    line: u32,
}

#[derive(Clone, Copy, Debug)]
pub struct Token<'a> {
    pub tok_type: TokenType,
    pub source: &'a str,
    pub line: u32,
}

impl<'a> Token<'a> {
    pub fn new(tok_type: TokenType, source: &'a str, line: u32) -> Self {
        Self {
            tok_type,
            source,
            line,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenType {
    LeftParen, RightParen,
    LeftBrace, RightBrace,
    LeftBracket, RightBracket,
    Dot, Comma, SemiColon,
    Plus, Minus, Star, Slash,
    Amp, Pipe, Tilde,
    Less, Greater, Equal,

    Identifier, Str, Integer,

    Class, Constructor, Function, Method,
    Field, Static, Var,
    Int, Char, Boolean, Void,
    True, False, Null, This,
    Let, Do, If, Else, While, Return,

    Error,
    Eof,
}

/// Coarse token classification used when reporting errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Category {
    Keyword,
    Symbol,
    Identifier,
    IntegerConstant,
    StringConstant,
    EndOfInput,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Keyword => "keyword",
            Category::Symbol => "symbol",
            Category::Identifier => "identifier",
            Category::IntegerConstant => "integerConstant",
            Category::StringConstant => "stringConstant",
            Category::EndOfInput => "end of input",
        };
        f.write_str(name)
    }
}

impl TokenType {
    pub fn category(&self) -> Category {
        use TokenType::*;
        match self {
            LeftParen | RightParen | LeftBrace | RightBrace | LeftBracket | RightBracket | Dot
            | Comma | SemiColon | Plus | Minus | Star | Slash | Amp | Pipe | Tilde | Less
            | Greater | Equal => Category::Symbol,
            Identifier => Category::Identifier,
            Str => Category::StringConstant,
            Integer => Category::IntegerConstant,
            Error | Eof => Category::EndOfInput,
            _ => Category::Keyword,
        }
    }

    /// How the token is named in "expected ..." diagnostics.
    pub fn describe(&self) -> &'static str {
        use TokenType::*;
        match self {
            LeftParen => "'('",
            RightParen => "')'",
            LeftBrace => "'{'",
            RightBrace => "'}'",
            LeftBracket => "'['",
            RightBracket => "']'",
            Dot => "'.'",
            Comma => "','",
            SemiColon => "';'",
            Plus => "'+'",
            Minus => "'-'",
            Star => "'*'",
            Slash => "'/'",
            Amp => "'&'",
            Pipe => "'|'",
            Tilde => "'~'",
            Less => "'<'",
            Greater => "'>'",
            Equal => "'='",
            Identifier => "identifier",
            Str => "string constant",
            Integer => "integer constant",
            Class => "'class'",
            Constructor => "'constructor'",
            Function => "'function'",
            Method => "'method'",
            Field => "'field'",
            Static => "'static'",
            Var => "'var'",
            Int => "'int'",
            Char => "'char'",
            Boolean => "'boolean'",
            Void => "'void'",
            True => "'true'",
            False => "'false'",
            Null => "'null'",
            This => "'this'",
            Let => "'let'",
            Do => "'do'",
            If => "'if'",
            Else => "'else'",
            While => "'while'",
            Return => "'return'",
            Error => "valid token",
            Eof => "end of input",
        }
    }
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        Self {
            source,
            start: 0,
            current: 0,
            line: 1,
        }
    }

    pub fn next(&mut self) -> Token<'a> {
        if let Some(error) = self.skip_whitespace() {
            return error;
        }
        self.start = self.current;
        if self.is_at_end() {
            return self.make_token(TokenType::Eof);
        }
        match self.advance() {
            '(' => self.make_token(TokenType::LeftParen),
            ')' => self.make_token(TokenType::RightParen),
            '{' => self.make_token(TokenType::LeftBrace),
            '}' => self.make_token(TokenType::RightBrace),
            '[' => self.make_token(TokenType::LeftBracket),
            ']' => self.make_token(TokenType::RightBracket),
            '.' => self.make_token(TokenType::Dot),
            ',' => self.make_token(TokenType::Comma),
            ';' => self.make_token(TokenType::SemiColon),
            '+' => self.make_token(TokenType::Plus),
            '-' => self.make_token(TokenType::Minus),
            '*' => self.make_token(TokenType::Star),
            '/' => self.make_token(TokenType::Slash),
            '&' => self.make_token(TokenType::Amp),
            '|' => self.make_token(TokenType::Pipe),
            '~' => self.make_token(TokenType::Tilde),
            '<' => self.make_token(TokenType::Less),
            '>' => self.make_token(TokenType::Greater),
            '=' => self.make_token(TokenType::Equal),
            '"' => self.string(),
            c => {
                if c.is_ascii_digit() {
                    self.number()
                } else if c.is_ascii_alphabetic() || c == '_' {
                    self.identifier()
                } else {
                    self.error_token("Unexpected character.")
                }
            }
        }
    }

    /// Returns an error token for an unterminated block comment.
    fn skip_whitespace(&mut self) -> Option<Token<'a>> {
        loop {
            match self.peek() {
                ' ' | '\r' | '\t' => self.current += 1,
                '\n' => {
                    self.current += 1;
                    self.line += 1;
                }
                '/' => match self.peek_2() {
                    '/' => {
                        // comment until the end of the line
                        while self.peek() != '\n' && !self.is_at_end() {
                            self.current += 1;
                        }
                    }
                    '*' => {
                        self.current += 2;
                        loop {
                            if self.is_at_end() {
                                return Some(self.error_token("Unterminated comment."));
                            }
                            if self.peek() == '*' && self.peek_2() == '/' {
                                self.current += 2;
                                break;
                            }
                            if self.peek() == '\n' {
                                self.line += 1;
                            }
                            self.current += 1;
                        }
                    }
                    _ => return None,
                },
                _ => return None,
            }
        }
    }

    fn peek(&self) -> char {
        if self.is_at_end() {
            '\0'
        } else {
            self.source[self.current].into()
        }
    }

    fn peek_2(&self) -> char {
        if self.current + 1 >= self.source.len() {
            '\0'
        } else {
            self.source[self.current + 1].into()
        }
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn advance(&mut self) -> char {
        self.current += 1;
        self.source[self.current - 1].into()
    }

    fn lexeme(&self) -> &'a str {
        // Token boundaries only ever fall on ASCII bytes.
        std::str::from_utf8(&self.source[self.start..self.current]).unwrap_or("")
    }

    fn make_token(&self, tok_type: TokenType) -> Token<'a> {
        Token::new(tok_type, self.lexeme(), self.line)
    }

    pub fn error_token(&self, message: &'static str) -> Token<'a> {
        Token::new(TokenType::Error, message, self.line)
    }

    fn string(&mut self) -> Token<'a> {
        loop {
            match self.peek() {
                '"' => break,
                '\n' => return self.error_token("Unterminated string."),
                _ if self.is_at_end() => return self.error_token("Unterminated string."),
                c if !c.is_ascii() => {
                    return self.error_token("Non-ASCII character in string constant.")
                }
                _ => self.current += 1,
            }
        }
        // the length is pushed as a constant, so it must fit in 15 bits
        if self.current - self.start - 1 > 32767 {
            return self.error_token("String constant too long.");
        }
        self.current += 1; // consume closing quote
        self.make_token(TokenType::Str)
    }

    fn number(&mut self) -> Token<'a> {
        while self.peek().is_ascii_digit() {
            self.current += 1;
        }
        match self.lexeme().parse::<u32>() {
            Ok(value) if value <= 32767 => self.make_token(TokenType::Integer),
            _ => self.error_token("Integer constant out of range."),
        }
    }

    fn identifier(&mut self) -> Token<'a> {
        while self.peek().is_ascii_alphanumeric() || self.peek() == '_' {
            self.current += 1;
        }
        self.make_token(self.identifier_type())
    }

    fn identifier_type(&self) -> TokenType {
        match self.lexeme() {
            "class" => TokenType::Class,
            "constructor" => TokenType::Constructor,
            "function" => TokenType::Function,
            "method" => TokenType::Method,
            "field" => TokenType::Field,
            "static" => TokenType::Static,
            "var" => TokenType::Var,
            "int" => TokenType::Int,
            "char" => TokenType::Char,
            "boolean" => TokenType::Boolean,
            "void" => TokenType::Void,
            "true" => TokenType::True,
            "false" => TokenType::False,
            "null" => TokenType::Null,
            "this" => TokenType::This,
            "let" => TokenType::Let,
            "do" => TokenType::Do,
            "if" => TokenType::If,
            "else" => TokenType::Else,
            "while" => TokenType::While,
            "return" => TokenType::Return,
            _ => TokenType::Identifier,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn scan(source: &str) -> Vec<(TokenType, String, u32)> {
        let mut lexer = Lexer::new(source.as_bytes());
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next();
            let done = matches!(token.tok_type, TokenType::Eof | TokenType::Error);
            tokens.push((token.tok_type, token.source.to_string(), token.line));
            if done {
                break;
            }
        }
        tokens
    }

    fn types(source: &str) -> Vec<TokenType> {
        scan(source).into_iter().map(|(t, _, _)| t).collect()
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(
            types("class Main_1 { field int x; }"),
            vec![
                TokenType::Class,
                TokenType::Identifier,
                TokenType::LeftBrace,
                TokenType::Field,
                TokenType::Int,
                TokenType::Identifier,
                TokenType::SemiColon,
                TokenType::RightBrace,
                TokenType::Eof,
            ]
        );
        assert_eq!(types("classy"), vec![TokenType::Identifier, TokenType::Eof]);
    }

    #[test]
    fn comments_are_skipped_and_lines_counted() {
        let tokens = scan("// header\n/** doc\n * more */ let /* inline */ x\n= 3;");
        assert_eq!(
            tokens,
            vec![
                (TokenType::Let, "let".to_string(), 3),
                (TokenType::Identifier, "x".to_string(), 3),
                (TokenType::Equal, "=".to_string(), 4),
                (TokenType::Integer, "3".to_string(), 4),
                (TokenType::SemiColon, ";".to_string(), 4),
                (TokenType::Eof, "".to_string(), 4),
            ]
        );
    }

    #[test]
    fn division_is_not_a_comment() {
        assert_eq!(
            types("a/b"),
            vec![TokenType::Identifier, TokenType::Slash, TokenType::Identifier, TokenType::Eof]
        );
    }

    #[test]
    fn string_constant_keeps_quotes() {
        let tokens = scan("\"Hello, world\"");
        assert_eq!(tokens[0], (TokenType::Str, "\"Hello, world\"".to_string(), 1));
    }

    #[test]
    fn lexical_errors() {
        assert_eq!(scan("\"open\n\"").last().map(|t| t.1.clone()), Some("Unterminated string.".to_string()));
        assert_eq!(scan("32768").last().map(|t| t.1.clone()), Some("Integer constant out of range.".to_string()));
        assert_eq!(scan("/* never closed").last().map(|t| t.1.clone()), Some("Unterminated comment.".to_string()));
        assert_eq!(scan("x # y").last().map(|t| t.0), Some(TokenType::Error));
    }

    #[test]
    fn string_length_limit() {
        let longest = format!("\"{}\"", "a".repeat(32767));
        assert_eq!(types(&longest), vec![TokenType::Str, TokenType::Eof]);

        let too_long = format!("\"{}\"", "a".repeat(32768));
        assert_eq!(
            scan(&too_long).last().map(|t| t.1.clone()),
            Some("String constant too long.".to_string())
        );
    }

    #[test]
    fn largest_integer_is_accepted() {
        assert_eq!(types("32767"), vec![TokenType::Integer, TokenType::Eof]);
    }

    #[test]
    fn eof_repeats() {
        let mut lexer = Lexer::new(b"x");
        assert_eq!(lexer.next().tok_type, TokenType::Identifier);
        assert_eq!(lexer.next().tok_type, TokenType::Eof);
        assert_eq!(lexer.next().tok_type, TokenType::Eof);
    }

    #[test]
    fn categories() {
        assert_eq!(TokenType::While.category(), Category::Keyword);
        assert_eq!(TokenType::Tilde.category(), Category::Symbol);
        assert_eq!(TokenType::Integer.category().to_string(), "integerConstant");
    }
}
