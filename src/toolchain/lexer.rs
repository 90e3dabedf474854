//! Tokenizer for the reference language.

use std::iter::Peekable;
use std::str::CharIndices;

/// A lexical token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Ident(String),
    Number(String),
    Str(String),

    // Keywords
    Import,
    From,
    Export,
    Let,
    Const,
    Declare,

    // Operators
    Eq,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Comma,
    Semi,

    Eof,
}

impl Token {
    fn keyword(word: &str) -> Option<Self> {
        match word {
            "import" => Some(Self::Import),
            "from" => Some(Self::From),
            "export" => Some(Self::Export),
            "let" => Some(Self::Let),
            "const" => Some(Self::Const),
            "declare" => Some(Self::Declare),
            _ => None,
        }
    }
}

/// A token with its byte offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
    /// A line break separates this token from the previous one.
    pub newline_before: bool,
}

/// A tokenizer problem; the lexer keeps going after reporting it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub offset: usize,
    pub code: &'static str,
    pub message: String,
}

/// Split text into tokens. The result always ends with [`Token::Eof`].
pub fn tokenize(text: &str) -> (Vec<Spanned>, Vec<LexError>) {
    let mut lexer = Lexer {
        text,
        chars: text.char_indices().peekable(),
        tokens: Vec::new(),
        errors: Vec::new(),
        newline_before: false,
    };
    lexer.run();
    (lexer.tokens, lexer.errors)
}

struct Lexer<'a> {
    text: &'a str,
    chars: Peekable<CharIndices<'a>>,
    tokens: Vec<Spanned>,
    errors: Vec<LexError>,
    newline_before: bool,
}

impl Lexer<'_> {
    fn run(&mut self) {
        while let Some((offset, c)) = self.chars.next() {
            let token = match c {
                '\n' => {
                    self.newline_before = true;
                    continue;
                }
                c if c.is_whitespace() => continue,
                '/' if self.eat('/') => {
                    self.skip_line();
                    continue;
                }
                '/' if self.eat('*') => {
                    self.skip_block_comment();
                    continue;
                }
                '"' | '\'' => match self.string(c) {
                    Some(s) => Token::Str(s),
                    None => {
                        self.error(offset, "TS1002", "Unterminated string literal.");
                        continue;
                    }
                },
                c if c.is_ascii_digit() => Token::Number(self.number(offset)),
                c if is_ident_start(c) => {
                    let word = self.identifier(offset);
                    Token::keyword(word).unwrap_or_else(|| Token::Ident(word.to_string()))
                }
                '=' => Token::Eq,
                '+' => self.compound(Token::Plus, Token::PlusEq),
                '-' => self.compound(Token::Minus, Token::MinusEq),
                '*' => self.compound(Token::Star, Token::StarEq),
                '/' => self.compound(Token::Slash, Token::SlashEq),
                '(' => Token::LParen,
                ')' => Token::RParen,
                ',' => Token::Comma,
                ';' => Token::Semi,
                _ => {
                    self.error(offset, "TS1127", "Invalid character.");
                    continue;
                }
            };
            self.push(token, offset);
        }

        let end = self.text.len();
        self.push(Token::Eof, end);
    }

    fn push(&mut self, token: Token, offset: usize) {
        self.tokens.push(Spanned {
            token,
            offset,
            newline_before: std::mem::take(&mut self.newline_before),
        });
    }

    fn error(&mut self, offset: usize, code: &'static str, message: &str) {
        self.errors.push(LexError {
            offset,
            code,
            message: message.to_string(),
        });
    }

    fn eat(&mut self, expected: char) -> bool {
        self.chars.next_if(|&(_, c)| c == expected).is_some()
    }

    fn compound(&mut self, plain: Token, assign: Token) -> Token {
        if self.eat('=') {
            assign
        } else {
            plain
        }
    }

    fn skip_line(&mut self) {
        while self.chars.next_if(|&(_, c)| c != '\n').is_some() {}
    }

    fn skip_block_comment(&mut self) {
        let start = self.chars.peek().map_or(self.text.len(), |&(i, _)| i) - 2;
        while let Some((_, c)) = self.chars.next() {
            match c {
                '\n' => self.newline_before = true,
                '*' if self.eat('/') => return,
                _ => {}
            }
        }
        self.error(start, "TS1010", "'*/' expected.");
    }

    /// Read the rest of a quoted string. `None` when the line or text ends first.
    fn string(&mut self, quote: char) -> Option<String> {
        let mut value = String::new();
        loop {
            let (_, c) = self.chars.next_if(|&(_, c)| c != '\n')?;
            match c {
                c if c == quote => return Some(value),
                '\\' => {
                    let (_, escaped) = self.chars.next_if(|&(_, c)| c != '\n')?;
                    value.push(match escaped {
                        'n' => '\n',
                        'r' => '\r',
                        't' => '\t',
                        '0' => '\0',
                        other => other,
                    });
                }
                c => value.push(c),
            }
        }
    }

    fn number(&mut self, start: usize) -> String {
        let mut end = start + 1;
        let mut seen_dot = false;
        while let Some(&(i, c)) = self.chars.peek() {
            if c.is_ascii_digit() || (c == '.' && !seen_dot) {
                seen_dot |= c == '.';
                end = i + 1;
                self.chars.next();
            } else {
                break;
            }
        }
        self.text[start..end].to_string()
    }

    fn identifier(&mut self, start: usize) -> &str {
        let mut end = start + 1;
        while let Some((i, c)) = self.chars.next_if(|&(_, c)| is_ident_part(c)) {
            end = i + c.len_utf8();
        }
        &self.text[start..end]
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}
