//! Server-side scan filters and the filter expression grammar.
//!
//! Expressions look like
//! `PrefixFilter('user') AND SKIP ValueFilter(!=, 'binary:')`.
//!
//! | Filter | Arguments |
//! |--------|-----------|
//! | `PrefixFilter` | `'row-prefix'` |
//! | `ColumnPrefixFilter` | `'qualifier-prefix'` |
//! | `RowFilter`, `FamilyFilter`, `QualifierFilter`, `ValueFilter` | `op, 'comparator'` |
//! | `SingleColumnValueFilter` | `'family', 'qualifier', op, 'comparator'` |
//! | `FirstKeyOnlyFilter`, `KeyOnlyFilter` | none |
//!
//! Operators are `<`, `<=`, `=`, `!=`, `>`, `>=`. Comparators are
//! `binary:`, `binaryprefix:`, `substring:` and `regexstring:`; the last two
//! only accept `=` and `!=`. `SKIP` binds tighter than `AND`, which binds
//! tighter than `OR`. Quotes inside strings are doubled: `'it''s'`.

use std::cmp::Ordering;

use regex::bytes::Regex;

use crate::cell::KeyValue;
use crate::error::FilterParseError;

/// Comparison applied between a cell field and a comparator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Less,
    LessOrEqual,
    Equal,
    NotEqual,
    GreaterOrEqual,
    Greater,
}

impl CompareOp {
    /// Whether `actual.cmp(expected) == ordering` satisfies this operator.
    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Less => ordering == Ordering::Less,
            CompareOp::LessOrEqual => ordering != Ordering::Greater,
            CompareOp::Equal => ordering == Ordering::Equal,
            CompareOp::NotEqual => ordering != Ordering::Equal,
            CompareOp::GreaterOrEqual => ordering != Ordering::Less,
            CompareOp::Greater => ordering == Ordering::Greater,
        }
    }
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone)]
pub enum Comparator {
    /// Lexicographic byte comparison
    Binary(Vec<u8>),
    /// Lexicographic comparison of the leading bytes only
    BinaryPrefix(Vec<u8>),
    /// Case-insensitive containment; stored lowercased
    Substring(String),
    RegexString(Regex),
}

impl Comparator {
    pub fn matches(&self, op: CompareOp, actual: &[u8]) -> bool {
        match self {
            Comparator::Binary(expected) => op.accepts(actual.cmp(expected.as_slice())),
            Comparator::BinaryPrefix(prefix) => {
                let n = prefix.len().min(actual.len());
                op.accepts(actual[..n].cmp(prefix.as_slice()))
            }
            Comparator::Substring(needle) => {
                let found = String::from_utf8_lossy(actual).to_lowercase().contains(needle.as_str());
                (op == CompareOp::Equal) == found
            }
            Comparator::RegexString(re) => (op == CompareOp::Equal) == re.is_match(actual),
        }
    }
}

/// A parsed scan filter.
#[derive(Debug, Clone)]
pub enum Filter {
    /// Rows whose key starts with the prefix
    Prefix(Vec<u8>),
    /// Cells whose qualifier starts with the prefix
    ColumnPrefix(Vec<u8>),
    Row { op: CompareOp, comparator: Comparator },
    Family { op: CompareOp, comparator: Comparator },
    Qualifier { op: CompareOp, comparator: Comparator },
    Value { op: CompareOp, comparator: Comparator },
    /// Whole row passes when the named column's value matches, or the
    /// column is absent from the row
    SingleColumnValue {
        family: Vec<u8>,
        qualifier: Vec<u8>,
        op: CompareOp,
        comparator: Comparator,
    },
    /// Only the first cell of each row
    FirstKeyOnly,
    /// Cells pass with their values stripped
    KeyOnly,
    /// Whole row is dropped if the inner filter rejects any of its cells
    Skip(Box<Filter>),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    /// Cells of one row that pass the filter, in their original order.
    pub fn apply(&self, row: &[KeyValue]) -> Vec<KeyValue> {
        let strip = self.strips_values();
        (0..row.len())
            .filter(|&i| self.includes(row, i))
            .map(|i| if strip { row[i].without_value() } else { row[i].clone() })
            .collect()
    }

    fn includes(&self, row: &[KeyValue], index: usize) -> bool {
        let cell = &row[index];
        match self {
            Filter::Prefix(prefix) => cell.row().starts_with(prefix),
            Filter::ColumnPrefix(prefix) => cell.qualifier().starts_with(prefix),
            Filter::Row { op, comparator } => comparator.matches(*op, cell.row()),
            Filter::Family { op, comparator } => comparator.matches(*op, cell.family()),
            Filter::Qualifier { op, comparator } => comparator.matches(*op, cell.qualifier()),
            Filter::Value { op, comparator } => comparator.matches(*op, cell.value()),
            Filter::SingleColumnValue { family, qualifier, op, comparator } => row
                .iter()
                .find(|c| c.family() == family.as_slice() && c.qualifier() == qualifier.as_slice())
                .map_or(true, |c| comparator.matches(*op, c.value())),
            Filter::FirstKeyOnly => index == 0,
            Filter::KeyOnly => true,
            Filter::Skip(inner) => (0..row.len()).all(|i| inner.includes(row, i)),
            Filter::And(filters) => filters.iter().all(|f| f.includes(row, index)),
            Filter::Or(filters) => filters.iter().any(|f| f.includes(row, index)),
        }
    }

    fn strips_values(&self) -> bool {
        match self {
            Filter::KeyOnly => true,
            Filter::Skip(inner) => inner.strips_values(),
            Filter::And(filters) | Filter::Or(filters) => filters.iter().any(Filter::strips_values),
            _ => false,
        }
    }
}

/// Turns a filter expression into a `Filter`.
pub trait FilterParser: Send + Sync {
    fn parse(&self, expression: &str) -> Result<Filter, FilterParseError>;
}

/// Parser for the grammar described in the module docs.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParseFilter;

impl FilterParser for ParseFilter {
    fn parse(&self, expression: &str) -> Result<Filter, FilterParseError> {
        let tokens = tokenize(expression)?;
        let mut parser = Parser { tokens, pos: 0, end: expression.len() };
        let filter = parser.or_expr()?;
        match parser.peek() {
            None => Ok(filter),
            Some((at, token)) => Err(FilterParseError::new(*at, format!("unexpected {}", token.describe()))),
        }
    }
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Op(CompareOp),
    LParen,
    RParen,
    Comma,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(name) => format!("`{}`", name),
            Token::Str(_) => "string literal".to_string(),
            Token::Op(_) => "comparison operator".to_string(),
            Token::LParen => "`(`".to_string(),
            Token::RParen => "`)`".to_string(),
            Token::Comma => "`,`".to_string(),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<(usize, Token)>, FilterParseError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let start = i;
        match bytes[i] {
            b' ' | b'\t' | b'\n' | b'\r' => {
                i += 1;
                continue;
            }
            b'(' => { tokens.push((start, Token::LParen)); i += 1; }
            b')' => { tokens.push((start, Token::RParen)); i += 1; }
            b',' => { tokens.push((start, Token::Comma)); i += 1; }
            b'<' | b'>' | b'=' | b'!' => {
                let two = bytes.get(i + 1) == Some(&b'=');
                let op = match (bytes[i], two) {
                    (b'<', true) => CompareOp::LessOrEqual,
                    (b'<', false) => CompareOp::Less,
                    (b'>', true) => CompareOp::GreaterOrEqual,
                    (b'>', false) => CompareOp::Greater,
                    (b'!', true) => CompareOp::NotEqual,
                    (b'=', _) => CompareOp::Equal,
                    _ => return Err(FilterParseError::new(start, "expected `!=`")),
                };
                i += if two && bytes[i] != b'=' { 2 } else { 1 };
                tokens.push((start, Token::Op(op)));
            }
            b'\'' => {
                let mut text = Vec::new();
                i += 1;
                loop {
                    match bytes.get(i) {
                        None => return Err(FilterParseError::new(start, "unterminated string literal")),
                        Some(b'\'') if bytes.get(i + 1) == Some(&b'\'') => {
                            text.push(b'\'');
                            i += 2;
                        }
                        Some(b'\'') => {
                            i += 1;
                            break;
                        }
                        Some(&b) => {
                            text.push(b);
                            i += 1;
                        }
                    }
                }
                // Only ASCII quote bytes were removed, so this stays valid UTF-8.
                tokens.push((start, Token::Str(String::from_utf8_lossy(&text).into_owned())));
            }
            b if b.is_ascii_alphabetic() || b == b'_' => {
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                tokens.push((start, Token::Ident(input[start..i].to_string())));
            }
            _ => {
                let ch = input[start..].chars().next().unwrap_or('?');
                return Err(FilterParseError::new(start, format!("unexpected character `{}`", ch)));
            }
        }
    }
    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Recursive-descent parser
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    /// Byte length of the input, reported for errors at end of input
    end: usize,
}

enum Arg {
    Str(usize, String),
    Op(usize, CompareOp),
}

impl Parser {
    fn peek(&self) -> Option<&(usize, Token)> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<(usize, Token)> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some((_, Token::Ident(name))) if name == keyword)
    }

    fn expect(&mut self, expected: Token) -> Result<usize, FilterParseError> {
        match self.next() {
            Some((at, token)) if token == expected => Ok(at),
            Some((at, token)) => Err(FilterParseError::new(
                at,
                format!("expected {}, found {}", expected.describe(), token.describe()),
            )),
            None => Err(FilterParseError::new(self.end, format!("expected {}", expected.describe()))),
        }
    }

    fn or_expr(&mut self) -> Result<Filter, FilterParseError> {
        let mut terms = vec![self.and_expr()?];
        while self.at_keyword("OR") {
            self.pos += 1;
            terms.push(self.and_expr()?);
        }
        Ok(if terms.len() == 1 { terms.remove(0) } else { Filter::Or(terms) })
    }

    fn and_expr(&mut self) -> Result<Filter, FilterParseError> {
        let mut terms = vec![self.unary()?];
        while self.at_keyword("AND") {
            self.pos += 1;
            terms.push(self.unary()?);
        }
        Ok(if terms.len() == 1 { terms.remove(0) } else { Filter::And(terms) })
    }

    fn unary(&mut self) -> Result<Filter, FilterParseError> {
        if self.at_keyword("SKIP") {
            self.pos += 1;
            return Ok(Filter::Skip(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Filter, FilterParseError> {
        match self.next() {
            Some((_, Token::LParen)) => {
                let inner = self.or_expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some((at, Token::Ident(name))) => {
                let args = self.arguments()?;
                build_filter(at, &name, args)
            }
            Some((at, token)) => Err(FilterParseError::new(
                at,
                format!("expected filter name, found {}", token.describe()),
            )),
            None => Err(FilterParseError::new(self.end, "expected filter expression")),
        }
    }

    fn arguments(&mut self) -> Result<Vec<Arg>, FilterParseError> {
        self.expect(Token::LParen)?;
        let mut args = Vec::new();
        if matches!(self.peek(), Some((_, Token::RParen))) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            match self.next() {
                Some((at, Token::Str(s))) => args.push(Arg::Str(at, s)),
                Some((at, Token::Op(op))) => args.push(Arg::Op(at, op)),
                Some((at, token)) => {
                    return Err(FilterParseError::new(
                        at,
                        format!("expected argument, found {}", token.describe()),
                    ))
                }
                None => return Err(FilterParseError::new(self.end, "unterminated argument list")),
            }
            match self.next() {
                Some((_, Token::Comma)) => continue,
                Some((_, Token::RParen)) => return Ok(args),
                Some((at, token)) => {
                    return Err(FilterParseError::new(
                        at,
                        format!("expected `,` or `)`, found {}", token.describe()),
                    ))
                }
                None => return Err(FilterParseError::new(self.end, "unterminated argument list")),
            }
        }
    }
}

fn build_filter(at: usize, name: &str, args: Vec<Arg>) -> Result<Filter, FilterParseError> {
    let arity = |expected: usize| {
        if args.len() == expected {
            Ok(())
        } else {
            Err(FilterParseError::new(
                at,
                format!("{} takes {} argument(s), got {}", name, expected, args.len()),
            ))
        }
    };

    match name {
        "PrefixFilter" => {
            arity(1)?;
            Ok(Filter::Prefix(string_arg(&args[0])?.into_bytes()))
        }
        "ColumnPrefixFilter" => {
            arity(1)?;
            Ok(Filter::ColumnPrefix(string_arg(&args[0])?.into_bytes()))
        }
        "RowFilter" | "FamilyFilter" | "QualifierFilter" | "ValueFilter" => {
            arity(2)?;
            let op = op_arg(&args[0])?;
            let comparator = comparator_arg(&args[1], op)?;
            Ok(match name {
                "RowFilter" => Filter::Row { op, comparator },
                "FamilyFilter" => Filter::Family { op, comparator },
                "QualifierFilter" => Filter::Qualifier { op, comparator },
                _ => Filter::Value { op, comparator },
            })
        }
        "SingleColumnValueFilter" => {
            arity(4)?;
            let family = string_arg(&args[0])?.into_bytes();
            let qualifier = string_arg(&args[1])?.into_bytes();
            let op = op_arg(&args[2])?;
            let comparator = comparator_arg(&args[3], op)?;
            Ok(Filter::SingleColumnValue { family, qualifier, op, comparator })
        }
        "FirstKeyOnlyFilter" => {
            arity(0)?;
            Ok(Filter::FirstKeyOnly)
        }
        "KeyOnlyFilter" => {
            arity(0)?;
            Ok(Filter::KeyOnly)
        }
        other => Err(FilterParseError::new(at, format!("unknown filter `{}`", other))),
    }
}

fn string_arg(arg: &Arg) -> Result<String, FilterParseError> {
    match arg {
        Arg::Str(_, s) => Ok(s.clone()),
        Arg::Op(at, _) => Err(FilterParseError::new(*at, "expected string argument")),
    }
}

fn op_arg(arg: &Arg) -> Result<CompareOp, FilterParseError> {
    match arg {
        Arg::Op(_, op) => Ok(*op),
        Arg::Str(at, _) => Err(FilterParseError::new(*at, "expected comparison operator")),
    }
}

fn comparator_arg(arg: &Arg, op: CompareOp) -> Result<Comparator, FilterParseError> {
    let (at, raw) = match arg {
        Arg::Str(at, s) => (*at, s.as_str()),
        Arg::Op(at, _) => return Err(FilterParseError::new(*at, "expected comparator string")),
    };
    let (kind, operand) = raw
        .split_once(':')
        .ok_or_else(|| FilterParseError::new(at, format!("comparator `{}` has no type prefix", raw)))?;
    let equality_only = || {
        if matches!(op, CompareOp::Equal | CompareOp::NotEqual) {
            Ok(())
        } else {
            Err(FilterParseError::new(at, format!("{} comparator only supports = and !=", kind)))
        }
    };

    match kind {
        "binary" => Ok(Comparator::Binary(operand.as_bytes().to_vec())),
        "binaryprefix" => Ok(Comparator::BinaryPrefix(operand.as_bytes().to_vec())),
        "substring" => {
            equality_only()?;
            Ok(Comparator::Substring(operand.to_lowercase()))
        }
        "regexstring" => {
            equality_only()?;
            Regex::new(operand)
                .map(Comparator::RegexString)
                .map_err(|e| FilterParseError::new(at, format!("invalid regex: {}", e)))
        }
        other => Err(FilterParseError::new(at, format!("unknown comparator type `{}`", other))),
    }
}
