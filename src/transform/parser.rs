use super::{Stage, Template, TemplatePiece, TransformError};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Str(String),
    Int(usize),
    Ident(String),
    Pipe,
    LParen,
    RParen,
    Comma,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Arg {
    Str(String),
    Int(usize),
}

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

pub(super) fn parse_program(input: &str) -> Result<Vec<Stage>, TransformError> {
    if input.trim().is_empty() {
        return Err(TransformError::Empty);
    }
    let tokens = lex(input)?;
    let mut parser = Parser {
        input,
        tokens,
        pos: 0,
    };

    let mut stages = vec![parser.stage()?];
    while let Some((offset, token)) = parser.next() {
        if token != Token::Pipe {
            return Err(syntax(input, offset, "expected '|' between stages"));
        }
        stages.push(parser.stage()?);
    }
    Ok(stages)
}

fn syntax(input: &str, offset: usize, message: impl Into<String>) -> TransformError {
    TransformError::Syntax {
        input: input.to_string(),
        offset,
        message: message.into(),
    }
}

fn lex(input: &str) -> Result<Vec<(usize, Token)>, TransformError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some((offset, ch)) = chars.next() {
        let token = match ch {
            c if c.is_whitespace() => continue,
            '|' => Token::Pipe,
            '(' => Token::LParen,
            ')' => Token::RParen,
            ',' => Token::Comma,
            '"' => {
                let mut value = String::new();
                let mut closed = false;
                while let Some((at, ch)) = chars.next() {
                    match ch {
                        '"' => {
                            closed = true;
                            break;
                        }
                        '\\' => {
                            let escaped = match chars.next() {
                                Some((_, '"')) => '"',
                                Some((_, '\\')) => '\\',
                                Some((_, 'n')) => '\n',
                                Some((_, 't')) => '\t',
                                Some((_, other)) => {
                                    return Err(syntax(
                                        input,
                                        at,
                                        format!("unknown escape '\\{other}'"),
                                    ))
                                }
                                None => break,
                            };
                            value.push(escaped);
                        }
                        other => value.push(other),
                    }
                }
                if !closed {
                    return Err(syntax(input, offset, "unterminated string"));
                }
                Token::Str(value)
            }
            c if c.is_ascii_digit() => {
                let mut digits = String::from(c);
                while let Some((_, d)) = chars.next_if(|(_, d)| d.is_ascii_digit()) {
                    digits.push(d);
                }
                let value = digits
                    .parse()
                    .map_err(|_| syntax(input, offset, "integer out of range"))?;
                Token::Int(value)
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::from(c);
                while let Some((_, d)) =
                    chars.next_if(|(_, d)| d.is_ascii_alphanumeric() || *d == '_')
                {
                    ident.push(d);
                }
                Token::Ident(ident)
            }
            other => return Err(syntax(input, offset, format!("unexpected character '{other}'"))),
        };
        tokens.push((offset, token));
    }
    Ok(tokens)
}

impl Parser<'_> {
    fn next(&mut self) -> Option<(usize, Token)> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, token)| token)
    }

    fn end_offset(&self) -> usize {
        self.input.len()
    }

    fn stage(&mut self) -> Result<Stage, TransformError> {
        match self.next() {
            Some((_, Token::Str(value))) => Ok(Stage::Literal(value)),
            Some((offset, Token::Ident(name))) => {
                let args = if self.peek() == Some(&Token::LParen) {
                    self.pos += 1;
                    self.args()?
                } else {
                    Vec::new()
                };
                build_stage(self.input, offset, &name, args)
            }
            Some((offset, _)) => Err(syntax(self.input, offset, "expected a stage")),
            None => Err(syntax(self.input, self.end_offset(), "expected a stage")),
        }
    }

    /// Arguments after an opening parenthesis, through the closing one.
    fn args(&mut self) -> Result<Vec<Arg>, TransformError> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            match self.next() {
                Some((_, Token::Str(value))) => args.push(Arg::Str(value)),
                Some((_, Token::Int(value))) => args.push(Arg::Int(value)),
                Some((offset, _)) => {
                    return Err(syntax(self.input, offset, "expected a string or integer argument"))
                }
                None => return Err(syntax(self.input, self.end_offset(), "unclosed '('")),
            }
            match self.next() {
                Some((_, Token::Comma)) => continue,
                Some((_, Token::RParen)) => return Ok(args),
                Some((offset, _)) => return Err(syntax(self.input, offset, "expected ',' or ')'")),
                None => return Err(syntax(self.input, self.end_offset(), "unclosed '('")),
            }
        }
    }
}

fn build_stage(input: &str, offset: usize, name: &str, args: Vec<Arg>) -> Result<Stage, TransformError> {
    let arity = |expected: &'static str| TransformError::Arity {
        stage: name.to_string(),
        expected,
    };

    let stage = match (name, args.as_slice()) {
        ("original", []) => Stage::Original,
        ("normalized", []) => Stage::Normalized,
        ("group", [Arg::Int(n)]) => Stage::Group(*n),
        ("ngroup", [Arg::Int(n)]) => Stage::NormalizedGroup(*n),
        ("template", [Arg::Str(s)]) => Stage::Template(parse_template(input, offset, s)?),
        ("upper", []) => Stage::Upper,
        ("lower", []) => Stage::Lower,
        ("title_case", []) => Stage::TitleCase,
        ("capitalize", []) => Stage::Capitalize,
        ("trim", []) => Stage::Trim,
        ("prefix", [Arg::Str(s)]) => Stage::Prefix(s.clone()),
        ("suffix", [Arg::Str(s)]) => Stage::Suffix(s.clone()),
        ("wrap", [Arg::Str(s)]) => Stage::Wrap(s.clone(), s.clone()),
        ("wrap", [Arg::Str(open), Arg::Str(close)]) => Stage::Wrap(open.clone(), close.clone()),
        ("replace", [Arg::Str(from), Arg::Str(to)]) => {
            if from.is_empty() {
                return Err(syntax(input, offset, "replace() needs a non-empty search string"));
            }
            Stage::Replace(from.clone(), to.clone())
        }
        ("skip", []) => Stage::Skip,
        ("skip_if_eq", [Arg::Str(s)]) => Stage::SkipIfEq(s.clone()),

        ("original" | "normalized" | "upper" | "lower" | "title_case" | "capitalize" | "trim"
        | "skip", _) => return Err(arity("no arguments")),
        ("group" | "ngroup", _) => return Err(arity("one integer")),
        ("template" | "prefix" | "suffix" | "skip_if_eq", _) => return Err(arity("one string")),
        ("wrap", _) => return Err(arity("one or two strings")),
        ("replace", _) => return Err(arity("two strings")),
        (other, _) => {
            return Err(TransformError::UnknownStage {
                stage: other.to_string(),
            })
        }
    };
    Ok(stage)
}

/// Split a template into literal text and `$n` / `${n}` group references.
fn parse_template(input: &str, offset: usize, source: &str) -> Result<Template, TransformError> {
    let mut pieces = Vec::new();
    let mut text = String::new();
    let mut chars = source.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            text.push(ch);
            continue;
        }
        let group = match chars.peek().copied() {
            Some('$') => {
                chars.next();
                text.push('$');
                continue;
            }
            Some(d) if d.is_ascii_digit() => {
                chars.next();
                d.to_digit(10).map(|n| n as usize)
            }
            Some('{') => {
                chars.next();
                let mut digits = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    digits.push(c);
                }
                if !closed || digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
                    return Err(syntax(input, offset, "template group must look like ${n}"));
                }
                Some(
                    digits
                        .parse()
                        .map_err(|_| syntax(input, offset, "template group out of range"))?,
                )
            }
            _ => None,
        };
        match group {
            Some(index) => {
                if !text.is_empty() {
                    pieces.push(TemplatePiece::Text(std::mem::take(&mut text)));
                }
                pieces.push(TemplatePiece::Group(index));
            }
            None => text.push('$'),
        }
    }
    if !text.is_empty() {
        pieces.push(TemplatePiece::Text(text));
    }
    Ok(Template { pieces })
}
