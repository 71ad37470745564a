use std::collections::HashSet;

/// Decides whether a recorded license identifier or SPDX expression is
/// acceptable without human review.
#[derive(Debug, Clone, Default)]
pub struct LicensePolicy {
    allowed: HashSet<String>,
}

impl LicensePolicy {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed: allowed
                .into_iter()
                .map(|id| normalize(id.as_ref()).to_ascii_lowercase())
                .collect(),
        }
    }

    /// Evaluate an SPDX expression against the allow list.
    ///
    /// `AND` binds tighter than `OR`, parentheses override precedence,
    /// `WITH` exceptions are evaluated on their base license and `/` is read as `OR`.
    /// A missing license is never allowed.
    pub fn allows(&self, license: Option<&str>) -> bool {
        let Some(license) = license.map(str::trim).filter(|l| !l.is_empty()) else {
            return false;
        };
        if self.allowed.is_empty() {
            return false;
        }
        if self.allows_id(license) {
            return true;
        }

        let tokens = tokenize(&license.replace('/', " OR "));
        let mut parser = ExprParser {
            tokens,
            pos: 0,
            policy: self,
        };
        let allowed = parser.parse_or();
        // Trailing garbage means we did not understand the expression
        allowed && parser.pos == parser.tokens.len()
    }

    fn allows_id(&self, id: &str) -> bool {
        self.allowed.contains(&normalize(id).to_ascii_lowercase())
    }
}

#[derive(Debug, PartialEq, Clone)]
enum Token {
    Id(String),
    And,
    Or,
    With,
    LParen,
    RParen,
}

fn tokenize(expr: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = expr.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                tokens.push(Token::LParen);
                chars.next();
            }
            ')' => {
                tokens.push(Token::RParen);
                chars.next();
            }
            _ => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || c == '(' || c == ')' {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                tokens.push(match word.as_str() {
                    "AND" | "and" => Token::And,
                    "OR" | "or" => Token::Or,
                    "WITH" | "with" => Token::With,
                    _ => Token::Id(word),
                });
            }
        }
    }
    tokens
}

/// Recursive descent over:
///
/// ```text
/// or_expr  := and_expr ( "OR" and_expr )*
/// and_expr := atom ( "AND" atom )*
/// atom     := "(" or_expr ")" | id ( "WITH" id )?
/// ```
struct ExprParser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    policy: &'a LicensePolicy,
}

impl ExprParser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_or(&mut self) -> bool {
        let mut allowed = self.parse_and();
        while matches!(self.peek(), Some(Token::Or)) {
            self.bump();
            let rhs = self.parse_and();
            allowed = allowed || rhs;
        }
        allowed
    }

    fn parse_and(&mut self) -> bool {
        let mut allowed = self.parse_atom();
        while matches!(self.peek(), Some(Token::And)) {
            self.bump();
            let rhs = self.parse_atom();
            allowed = allowed && rhs;
        }
        allowed
    }

    fn parse_atom(&mut self) -> bool {
        match self.bump() {
            Some(Token::LParen) => {
                let allowed = self.parse_or();
                if !matches!(self.bump(), Some(Token::RParen)) {
                    return false;
                }
                allowed
            }
            Some(Token::Id(id)) => {
                if matches!(self.peek(), Some(Token::With)) {
                    self.bump();
                    self.bump();
                }
                self.policy.allows_id(&id)
            }
            _ => false,
        }
    }
}

/// Map common non-SPDX spellings onto SPDX identifiers.
pub fn normalize(raw: &str) -> &str {
    match raw.trim() {
        "Apache 2.0" | "Apache License 2.0" | "Apache License, Version 2.0" | "Apache2" => {
            "Apache-2.0"
        }
        "MIT License" | "The MIT License" | "Expat" => "MIT",
        "BSD" | "BSD License" | "New BSD" | "Modified BSD" => "BSD-3-Clause",
        "Simplified BSD" | "FreeBSD" => "BSD-2-Clause",
        "ISC License" => "ISC",
        "Ruby" | "ruby" => "Ruby",
        "MPL 2.0" | "Mozilla Public License 2.0" => "MPL-2.0",
        "GPLv2" | "GPL v2" => "GPL-2.0",
        "GPLv3" | "GPL v3" => "GPL-3.0",
        "LGPLv2.1" | "LGPL v2.1" => "LGPL-2.1",
        "Public Domain" | "CC0" => "CC0-1.0",
        other => other,
    }
}
