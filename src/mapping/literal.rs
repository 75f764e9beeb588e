//! Parser for the list/tuple literals stored in mapping cells, e.g.
//! `[[0, 120], [15]]` or `[['day', 'night'], (1, None)]`.
//!
//! Only constants and containers are accepted: integers, floats, quoted
//! strings, `True`/`False`/`None`, lists and tuples.

use anyhow::{bail, Result};
use serde::Serialize;
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Literal {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Literal>),
    Tuple(Vec<Literal>),
}

impl Literal {
    /// Integer value; floats truncate toward zero, bools are 0/1.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Literal::Int(v) => Some(*v),
            Literal::Float(f) if f.is_finite() => Some(f.trunc() as i64),
            Literal::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Exact numeric equality with an integer: `10.0` equals `10`, `10.5`
    /// equals nothing.
    pub fn equals_int(&self, value: i64) -> bool {
        match self {
            Literal::Int(v) => *v == value,
            Literal::Float(f) => f.fract() == 0.0 && *f == value as f64,
            Literal::Bool(b) => i64::from(*b) == value,
            _ => false,
        }
    }

    /// Elements of a list or tuple.
    pub fn as_seq(&self) -> Option<&[Literal]> {
        match self {
            Literal::List(items) | Literal::Tuple(items) => Some(items),
            _ => None,
        }
    }

    pub fn into_seq(self) -> Option<Vec<Literal>> {
        match self {
            Literal::List(items) | Literal::Tuple(items) => Some(items),
            _ => None,
        }
    }
}

impl FromStr for Literal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_literal(s)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write_items(f: &mut fmt::Formatter<'_>, items: &[Literal]) -> fmt::Result {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", item)?;
            }
            Ok(())
        }

        match self {
            Literal::None => write!(f, "None"),
            Literal::Bool(true) => write!(f, "True"),
            Literal::Bool(false) => write!(f, "False"),
            Literal::Int(v) => write!(f, "{}", v),
            Literal::Float(v) => write!(f, "{:?}", v),
            Literal::Str(s) => write!(f, "{:?}", s),
            Literal::List(items) => {
                write!(f, "[")?;
                write_items(f, items)?;
                write!(f, "]")
            }
            Literal::Tuple(items) => {
                write!(f, "(")?;
                write_items(f, items)?;
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Parse a whole cell. Trailing input after the value is an error; a
/// top-level `1, 2` reads as a tuple.
pub fn parse_literal(src: &str) -> Result<Literal> {
    let mut p = Parser { src, pos: 0 };
    p.skip_ws();
    if p.peek().is_none() {
        bail!("empty literal");
    }
    let first = p.value()?;
    p.skip_ws();

    let value = if p.peek() == Some(',') {
        let mut items = vec![first];
        while p.eat(',') {
            p.skip_ws();
            if p.peek().is_none() {
                break;
            }
            items.push(p.value()?);
            p.skip_ws();
        }
        Literal::Tuple(items)
    } else {
        first
    };

    p.skip_ws();
    if let Some(c) = p.peek() {
        bail!(
            "unexpected {:?} at offset {} in literal {:?}",
            c,
            p.pos,
            src
        );
    }
    Ok(value)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, want: char) -> bool {
        if self.peek() == Some(want) {
            self.pos += want.len_utf8();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn value(&mut self) -> Result<Literal> {
        self.skip_ws();
        match self.peek() {
            Some('[') => {
                self.bump();
                Ok(Literal::List(self.items(']')?))
            }
            Some('(') => self.parenthesized(),
            Some(q @ ('\'' | '"')) => {
                self.bump();
                self.string(q).map(Literal::Str)
            }
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => self.number(),
            Some(c) if c.is_alphabetic() || c == '_' => self.name(),
            Some(c) => bail!(
                "unexpected {:?} at offset {} in literal {:?}",
                c,
                self.pos,
                self.src
            ),
            None => bail!("literal {:?} ended early", self.src),
        }
    }

    /// Comma-separated values up to `close`; a trailing comma is allowed.
    fn items(&mut self, close: char) -> Result<Vec<Literal>> {
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.eat(close) {
                return Ok(items);
            }
            items.push(self.value()?);
            self.skip_ws();
            if self.eat(close) {
                return Ok(items);
            }
            if !self.eat(',') {
                match self.peek() {
                    Some(c) => bail!(
                        "expected ',' or {:?} at offset {} in literal {:?}, found {:?}",
                        close,
                        self.pos,
                        self.src,
                        c
                    ),
                    None => bail!("unclosed {:?} in literal {:?}", close, self.src),
                }
            }
        }
    }

    /// `()` and `(x,)` are tuples, `(x)` is just `x`.
    fn parenthesized(&mut self) -> Result<Literal> {
        self.bump();
        self.skip_ws();
        if self.eat(')') {
            return Ok(Literal::Tuple(Vec::new()));
        }
        let first = self.value()?;
        self.skip_ws();
        if self.eat(')') {
            return Ok(first);
        }
        if !self.eat(',') {
            bail!(
                "expected ',' or ')' at offset {} in literal {:?}",
                self.pos,
                self.src
            );
        }
        let mut items = vec![first];
        items.extend(self.items(')')?);
        Ok(Literal::Tuple(items))
    }

    fn string(&mut self, quote: char) -> Result<String> {
        let mut out = String::new();
        loop {
            match self.bump() {
                None => bail!("unterminated string in literal {:?}", self.src),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some('0') => out.push('\0'),
                    Some(c @ ('\\' | '\'' | '"')) => out.push(c),
                    Some(c) => {
                        out.push('\\');
                        out.push(c);
                    }
                    None => bail!("unterminated string in literal {:?}", self.src),
                },
                Some(c) => out.push(c),
            }
        }
    }

    fn number(&mut self) -> Result<Literal> {
        let start = self.pos;
        if matches!(self.peek(), Some('-' | '+')) {
            self.bump();
            self.skip_ws();
        }
        let digits_start = self.pos;
        let mut is_float = false;
        let mut prev = '\0';
        while let Some(c) = self.peek() {
            let accept = match c {
                '0'..='9' | '_' => true,
                '.' | 'e' | 'E' => {
                    is_float = true;
                    true
                }
                '+' | '-' => prev == 'e' || prev == 'E',
                _ => false,
            };
            if !accept {
                break;
            }
            prev = c;
            self.bump();
        }

        let sign = &self.src[start..digits_start];
        let body: String = self.src[digits_start..self.pos]
            .chars()
            .filter(|c| *c != '_')
            .collect();
        let negative = sign.trim() == "-";
        if body.is_empty() {
            bail!(
                "expected a number at offset {} in literal {:?}",
                start,
                self.src
            );
        }

        if is_float {
            let v: f64 = match body.parse() {
                Ok(v) => v,
                Err(_) => bail!("invalid float {:?} in literal {:?}", body, self.src),
            };
            Ok(Literal::Float(if negative { -v } else { v }))
        } else {
            let text = if negative { format!("-{}", body) } else { body };
            match text.parse::<i64>() {
                Ok(v) => Ok(Literal::Int(v)),
                Err(_) => bail!("invalid integer {:?} in literal {:?}", text, self.src),
            }
        }
    }

    fn name(&mut self) -> Result<Literal> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.bump();
        }
        match &self.src[start..self.pos] {
            "None" => Ok(Literal::None),
            "True" => Ok(Literal::Bool(true)),
            "False" => Ok(Literal::Bool(false)),
            other => bail!(
                "name {:?} is not a constant in literal {:?}",
                other,
                self.src
            ),
        }
    }
}
