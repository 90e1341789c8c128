use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use crate::CheckError;
use crate::parser::ast::Modifier;

#[derive(PartialEq, Debug, Clone)]
pub enum Token {
    // Keywords
    Package,
    Import,
    Class,
    Interface,
    Enum,
    Extends,
    Implements,
    Throws,
    Void,
    Modifier(Modifier),

    // Identifiers and literals
    Identifier(String),
    StringLiteral(String),
    CharLiteral(String),
    NumberLiteral(String),

    // Punctuation the declaration parser cares about
    LeftBrace,
    RightBrace,
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Comma,
    Semicolon,
    Dot,
    Ellipsis,
    At,
    Less,
    Greater,
    Question,
    Equal,
    Star,

    // Anything else that only shows up inside skipped bodies and initializers
    Operator(char),

    // End of file
    EOF,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Package => f.write_str("package"),
            Token::Import => f.write_str("import"),
            Token::Class => f.write_str("class"),
            Token::Interface => f.write_str("interface"),
            Token::Enum => f.write_str("enum"),
            Token::Extends => f.write_str("extends"),
            Token::Implements => f.write_str("implements"),
            Token::Throws => f.write_str("throws"),
            Token::Void => f.write_str("void"),
            Token::Modifier(m) => f.write_str(m.keyword()),
            Token::Identifier(name) => f.write_str(name),
            Token::StringLiteral(s) => write!(f, "\"{}\"", s),
            Token::CharLiteral(s) => write!(f, "'{}'", s),
            Token::NumberLiteral(n) => f.write_str(n),
            Token::LeftBrace => f.write_str("{"),
            Token::RightBrace => f.write_str("}"),
            Token::LeftParen => f.write_str("("),
            Token::RightParen => f.write_str(")"),
            Token::LeftBracket => f.write_str("["),
            Token::RightBracket => f.write_str("]"),
            Token::Comma => f.write_str(","),
            Token::Semicolon => f.write_str(";"),
            Token::Dot => f.write_str("."),
            Token::Ellipsis => f.write_str("..."),
            Token::At => f.write_str("@"),
            Token::Less => f.write_str("<"),
            Token::Greater => f.write_str(">"),
            Token::Question => f.write_str("?"),
            Token::Equal => f.write_str("="),
            Token::Star => f.write_str("*"),
            Token::Operator(c) => write!(f, "{}", c),
            Token::EOF => f.write_str("<eof>"),
        }
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct SpannedToken {
    pub token: Token,
    pub start: (usize, usize), // (line, column)
    pub end: (usize, usize),
}

pub struct Lexer<'src> {
    chars: Peekable<Chars<'src>>,
    line: usize,
    column: usize,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Lexer {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.chars.next();
        if let Some(c) = ch {
            self.column += 1;
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            }
        }
        ch
    }

    fn peek(&mut self) -> Option<&char> {
        self.chars.peek()
    }

    fn error(&self, message: impl Into<String>, start: (usize, usize)) -> CheckError {
        CheckError::Lexer {
            message: message.into(),
            line: start.0,
            column: start.1,
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(&c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(&c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn skip_block_comment(&mut self, start: (usize, usize)) -> Result<(), CheckError> {
        while let Some(c) = self.advance() {
            if c == '*' && self.peek() == Some(&'/') {
                self.advance();
                return Ok(());
            }
        }
        Err(self.error("Unterminated block comment", start))
    }

    fn read_identifier(&mut self, first_char: char) -> String {
        let mut identifier = String::new();
        identifier.push(first_char);

        while let Some(&c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == '$' {
                identifier.push(c);
                self.advance();
            } else {
                break;
            }
        }

        identifier
    }

    // kept as text, numbers never need a value here
    fn read_number(&mut self, first_char: char) -> String {
        let mut number = String::new();
        number.push(first_char);

        while let Some(&c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == '.' {
                number.push(c);
                self.advance();
            } else {
                break;
            }
        }

        number
    }

    fn read_quoted(&mut self, quote: char, start: (usize, usize)) -> Result<String, CheckError> {
        let mut text = String::new();

        while let Some(c) = self.advance() {
            if c == quote {
                return Ok(text);
            } else if c == '\\' {
                match self.advance() {
                    Some(escaped) => {
                        text.push('\\');
                        text.push(escaped);
                    }
                    None => break,
                }
            } else if c == '\n' {
                break;
            } else {
                text.push(c);
            }
        }

        Err(self.error("Unterminated literal", start))
    }

    pub fn next_token(&mut self) -> Result<SpannedToken, CheckError> {
        loop {
            self.skip_whitespace();

            let start = (self.line, self.column);

            // Check for EOF
            let c = match self.advance() {
                Some(c) => c,
                None => {
                    return Ok(SpannedToken {
                        token: Token::EOF,
                        start,
                        end: start,
                    });
                }
            };

            let token = match c {
                '{' => Token::LeftBrace,
                '}' => Token::RightBrace,
                '(' => Token::LeftParen,
                ')' => Token::RightParen,
                '[' => Token::LeftBracket,
                ']' => Token::RightBracket,
                ',' => Token::Comma,
                ';' => Token::Semicolon,
                '@' => Token::At,
                '<' => Token::Less,
                '>' => Token::Greater,
                '?' => Token::Question,
                '=' => Token::Equal,
                '*' => Token::Star,
                '.' => {
                    if self.peek() == Some(&'.') {
                        self.advance();
                        if self.peek() != Some(&'.') {
                            return Err(self.error("Unexpected '..'", start));
                        }
                        self.advance();
                        Token::Ellipsis
                    } else if self.peek().is_some_and(|c| c.is_ascii_digit()) {
                        Token::NumberLiteral(self.read_number('.'))
                    } else {
                        Token::Dot
                    }
                }
                '/' => match self.peek() {
                    Some(&'/') => {
                        self.skip_line_comment();
                        continue;
                    }
                    Some(&'*') => {
                        self.advance();
                        self.skip_block_comment(start)?;
                        continue;
                    }
                    _ => Token::Operator('/'),
                },
                '"' => Token::StringLiteral(self.read_quoted('"', start)?),
                '\'' => Token::CharLiteral(self.read_quoted('\'', start)?),
                '0'..='9' => Token::NumberLiteral(self.read_number(c)),
                c if c.is_alphabetic() || c == '_' || c == '$' => {
                    let identifier = self.read_identifier(c);
                    match identifier.as_str() {
                        "package" => Token::Package,
                        "import" => Token::Import,
                        "class" => Token::Class,
                        "interface" => Token::Interface,
                        "enum" => Token::Enum,
                        "extends" => Token::Extends,
                        "implements" => Token::Implements,
                        "throws" => Token::Throws,
                        "void" => Token::Void,
                        keyword => match Modifier::from_keyword(keyword) {
                            Some(modifier) => Token::Modifier(modifier),
                            None => Token::Identifier(identifier),
                        },
                    }
                }
                '+' | '-' | '%' | '!' | '~' | '&' | '|' | '^' | ':' | '#' | '\\' => {
                    Token::Operator(c)
                }
                _ => return Err(self.error(format!("Unexpected character: {}", c), start)),
            };

            let end = (self.line, self.column);
            return Ok(SpannedToken { token, start, end });
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<SpannedToken>, CheckError> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token()?;
            let is_eof = token.token == Token::EOF;
            tokens.push(token);

            if is_eof {
                break;
            }
        }

        Ok(tokens)
    }
}
