//! Directive line recognition and the `#if`-expression grammar.
//!
//! Grounded on the teacher's `directive.rs`: a `regex`-based line
//! recognizer (`DIRECTIVE_PATTERN`) feeding a `peg` grammar for the
//! expression sublanguage, the same split the teacher makes between
//! "is this even a directive line" and "parse its payload".

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

lazy_static! {
    static ref DIRECTIVE_PATTERN: Regex =
        Regex::new(r"^\s*#\s*([A-Za-z_]\w*)?\s*(.*?)\s*$").unwrap();
    static ref DEFINE_NAME_PATTERN: Regex =
        Regex::new(r"^([A-Za-z_]\w*)(\((.*?)\))?\s*(.*)$").unwrap();
    static ref LINE_PATTERN: Regex =
        Regex::new(r#"^(\d+)(?:\s+"([^"]*)")?$"#).unwrap();
    static ref INCLUDE_PATTERN: Regex = Regex::new(r#"^(?:"([^"]+)"|<([^>]+)>)$"#).unwrap();
}

#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Include { target: String, is_quoted: bool },
    Define {
        name: String,
        params: Option<Vec<String>>,
        is_variadic: bool,
        body: String,
    },
    Undef(String),
    If(String),
    Elif(String),
    Ifdef(String),
    Ifndef(String),
    Else,
    Endif,
    Line { line: i32, path: Option<String> },
    Pragma(String),
    /// A `#` line whose keyword we don't recognize. spec.md S4.1 "Errors":
    /// silently consumed.
    Unknown,
}

/// Returns `None` for a line that is not a directive at all (the caller
/// decides that from column-0 `#` placement before calling this).
pub fn parse_directive(line: &str) -> Option<Directive> {
    let caps = DIRECTIVE_PATTERN.captures(line)?;
    let keyword = caps.get(1)?.as_str();
    let rest = caps.get(2).map(|m| m.as_str()).unwrap_or("").trim();

    Some(match keyword {
        "include" => {
            let m = INCLUDE_PATTERN.captures(rest)?;
            if let Some(q) = m.get(1) {
                Directive::Include {
                    target: q.as_str().to_string(),
                    is_quoted: true,
                }
            } else {
                let a = m.get(2)?;
                Directive::Include {
                    target: a.as_str().to_string(),
                    is_quoted: false,
                }
            }
        }
        "define" => {
            let m = DEFINE_NAME_PATTERN.captures(rest)?;
            let name = m.get(1)?.as_str().to_string();
            let body = m.get(4).map(|x| x.as_str()).unwrap_or("").to_string();
            match m.get(3) {
                Some(params_str) => {
                    let mut is_variadic = false;
                    let mut params = Vec::new();
                    for raw in params_str.as_str().split(',') {
                        let p = raw.trim();
                        if p.is_empty() {
                            continue;
                        }
                        if p == "..." {
                            is_variadic = true;
                        } else {
                            params.push(p.to_string());
                        }
                    }
                    Directive::Define {
                        name,
                        params: Some(params),
                        is_variadic,
                        body,
                    }
                }
                None => Directive::Define {
                    name,
                    params: None,
                    is_variadic: false,
                    body,
                },
            }
        }
        "undef" => Directive::Undef(rest.to_string()),
        "if" => Directive::If(rest.to_string()),
        "elif" => Directive::Elif(rest.to_string()),
        "ifdef" => Directive::Ifdef(rest.to_string()),
        "ifndef" => Directive::Ifndef(rest.to_string()),
        "else" => Directive::Else,
        "endif" => Directive::Endif,
        "line" => {
            let m = LINE_PATTERN.captures(rest)?;
            let line: i32 = m.get(1)?.as_str().parse().ok()?;
            let path = m.get(2).map(|p| p.as_str().to_string());
            Directive::Line { line, path }
        }
        "pragma" => Directive::Pragma(rest.to_string()),
        _ => Directive::Unknown,
    })
}

peg::parser! {
    /// The exact grammar of spec.md S4.1: integer literals, identifiers,
    /// `defined NAME`/`defined(NAME)`, unary `!`, `&&`/`||`. No other
    /// operators - deliberately narrower than the teacher's own `#if`
    /// grammar (which supports arbitrary C expressions), matching how
    /// narrowly spec.md scopes this sublanguage.
    pub grammar if_expr() for str {
        pub rule expr() -> IfExpr = precedence!{
            a:(@) _ "||" _ b:@ { IfExpr::Or(Box::new(a), Box::new(b)) }
            --
            a:(@) _ "&&" _ b:@ { IfExpr::And(Box::new(a), Box::new(b)) }
            --
            "!" _ a:@ { IfExpr::Not(Box::new(a)) }
            --
            a:atom() { a }
        }

        rule atom() -> IfExpr
            = "defined" _ "(" _ n:ident() _ ")" { IfExpr::Defined(n) }
            / "defined" _ n:ident() { IfExpr::Defined(n) }
            / n:number() { IfExpr::Number(n) }
            / n:ident() { IfExpr::Ident(n) }
            / "(" _ e:expr() _ ")" { e }

        rule ident() -> String
            = s:$(['a'..='z' | 'A'..='Z' | '_'] ['a'..='z' | 'A'..='Z' | '0'..='9' | '_']*) { s.to_string() }

        rule number() -> i64
            = "0x" s:$(['0'..='9' | 'a'..='f' | 'A'..='F']+) suffix() {
                i64::from_str_radix(s, 16).unwrap_or(0)
            }
            / s:$(['0'..='9']+) suffix() { s.parse().unwrap_or(0) }

        rule suffix() = ['u' | 'U' | 'l' | 'L']*

        rule _() = [' ' | '\t']*
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IfExpr {
    Number(i64),
    Ident(String),
    Defined(String),
    Not(Box<IfExpr>),
    And(Box<IfExpr>, Box<IfExpr>),
    Or(Box<IfExpr>, Box<IfExpr>),
}

impl IfExpr {
    /// `defined_names`: the macro table's key set at the moment of
    /// evaluation. Non-`defined` identifiers are assumed already
    /// macro-expanded by the caller; any that remain are undefined and
    /// evaluate to 0 (spec.md S4.1 "`#if` expression grammar").
    pub fn eval(&self, defined_names: &HashSet<String>) -> i64 {
        match self {
            IfExpr::Number(n) => *n,
            IfExpr::Ident(_) => 0,
            IfExpr::Defined(name) => i64::from(defined_names.contains(name)),
            IfExpr::Not(inner) => i64::from(inner.eval(defined_names) == 0),
            IfExpr::And(a, b) => {
                i64::from(a.eval(defined_names) != 0 && b.eval(defined_names) != 0)
            }
            IfExpr::Or(a, b) => {
                i64::from(a.eval(defined_names) != 0 || b.eval(defined_names) != 0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_include_quoted() {
        assert_eq!(
            parse_directive(r#"#include "foo.h""#),
            Some(Directive::Include {
                target: "foo.h".to_string(),
                is_quoted: true
            })
        );
    }

    #[test]
    fn parses_function_like_define_with_variadic() {
        match parse_directive("#define LOG(fmt, ...) printf(fmt, __VA_ARGS__)") {
            Some(Directive::Define {
                name,
                params: Some(params),
                is_variadic,
                body,
            }) => {
                assert_eq!(name, "LOG");
                assert_eq!(params, vec!["fmt".to_string()]);
                assert!(is_variadic);
                assert_eq!(body, "printf(fmt, __VA_ARGS__)");
            }
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn evaluates_defined_and_not() {
        let mut defined = HashSet::new();
        defined.insert("FOO".to_string());
        let expr = if_expr::expr("!defined(BAR) && defined(FOO)").unwrap();
        assert_eq!(expr.eval(&defined), 1);
    }

    #[test]
    fn undefined_identifier_is_zero() {
        let defined = HashSet::new();
        let expr = if_expr::expr("BAR || 0").unwrap();
        assert_eq!(expr.eval(&defined), 0);
    }
}
