//! Macro table, argument parsing, and substitution. Grounded on the
//! teacher's `frontend/expand/iterative.rs` (Dave Prosser's expansion
//! algorithm) but scaled down to spec.md S4.1's re-entry-guard model: a
//! macro being expanded is marked *busy* for the lifetime of its expansion
//! frame and cannot be re-entered, rather than carrying a per-token hide
//! set through arbitrary rescanning.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Macro {
    pub name: String,
    pub params: Option<Vec<String>>,
    pub is_variadic: bool,
    pub body: String,
}

impl Macro {
    pub fn is_function_like(&self) -> bool {
        self.params.is_some()
    }

    pub fn fixed_param_count(&self) -> usize {
        self.params.as_ref().map_or(0, |p| p.len())
    }
}

#[derive(Debug, Default)]
pub struct MacroTable {
    macros: HashMap<String, Macro>,
}

impl MacroTable {
    pub fn new() -> Self {
        MacroTable {
            macros: HashMap::new(),
        }
    }

    pub fn define(&mut self, m: Macro) {
        log::debug!("#define {}", m.name);
        self.macros.insert(m.name.clone(), m);
    }

    pub fn undef(&mut self, name: &str) {
        log::debug!("#undef {}", name);
        self.macros.remove(name);
    }

    pub fn get(&self, name: &str) -> Option<&Macro> {
        self.macros.get(name)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    pub fn defined_names(&self) -> std::collections::HashSet<String> {
        self.macros.keys().cloned().collect()
    }
}

/// A single token-ish unit of macro body/argument text: either an
/// identifier (substitution candidate), or an opaque run of other
/// characters (operators, whitespace, string/char literals kept intact so
/// substitution never reaches inside a literal).
#[derive(Debug, Clone, PartialEq)]
enum Word {
    Ident(String),
    Other(String),
}

fn words(text: &str) -> Vec<Word> {
    let mut out = Vec::new();
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            out.push(Word::Ident(chars[start..i].iter().collect()));
        } else if c == '"' || c == '\'' {
            let quote = c;
            let start = i;
            i += 1;
            while i < chars.len() {
                if chars[i] == '\\' && i + 1 < chars.len() {
                    i += 2;
                    continue;
                }
                if chars[i] == quote {
                    i += 1;
                    break;
                }
                i += 1;
            }
            out.push(Word::Other(chars[start..i].iter().collect()));
        } else {
            let start = i;
            while i < chars.len()
                && !(chars[i].is_ascii_alphabetic() || chars[i] == '_' || chars[i] == '"' || chars[i] == '\'')
            {
                i += 1;
            }
            out.push(Word::Other(chars[start..i].iter().collect()));
        }
    }
    out
}

/// Reassembles substituted words back into text, inserting a space
/// between two adjacent identifier words so they never fuse into one
/// token (spec.md S4.1 "Argument substitution").
fn rejoin(words: Vec<Word>) -> String {
    let mut out = String::new();
    let mut prev_was_ident = false;
    for w in words {
        match w {
            Word::Ident(s) => {
                if prev_was_ident {
                    out.push(' ');
                }
                out.push_str(&s);
                prev_was_ident = true;
            }
            Word::Other(s) => {
                out.push_str(&s);
                prev_was_ident = false;
            }
        }
    }
    out
}

/// Counts the non-blank tokens in `text` - used to decide whether a
/// substituted macro body needs parenthesizing to preserve its grouping
/// when spliced into a surrounding expression (spec.md S8 scenario S1).
pub fn significant_token_count(text: &str) -> usize {
    words(text)
        .into_iter()
        .filter(|w| match w {
            Word::Ident(_) => true,
            Word::Other(s) => !s.trim().is_empty(),
        })
        .count()
}

/// Given text starting just past a function-like macro invocation's `(`,
/// reads actual arguments up to the matching `)`, splitting on top-level
/// commas and respecting nested parens and quoted literals (spec.md S4.1
/// "Macro argument parsing"). Returns the arguments and the byte offset of
/// the character just past the closing `)`.
pub fn parse_actuals(text: &str) -> Option<(Vec<String>, usize)> {
    let chars: Vec<char> = text.chars().collect();
    let mut depth = 1usize;
    let mut i = 0usize;
    let mut current = String::new();
    let mut actuals = Vec::new();
    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' | '\'' => {
                let quote = c;
                current.push(c);
                i += 1;
                while i < chars.len() {
                    if chars[i] == '\\' && i + 1 < chars.len() {
                        current.push(chars[i]);
                        current.push(chars[i + 1]);
                        i += 2;
                        continue;
                    }
                    current.push(chars[i]);
                    if chars[i] == quote {
                        i += 1;
                        break;
                    }
                    i += 1;
                }
                continue;
            }
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth -= 1;
                if depth == 0 {
                    if !current.trim().is_empty() || !actuals.is_empty() {
                        actuals.push(current.trim().to_string());
                    }
                    return Some((actuals, i + 1));
                }
                current.push(c);
            }
            ',' if depth == 1 => {
                actuals.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
        i += 1;
    }
    None
}

/// Substitutes parameters (and `__VA_ARGS__`) in a macro body with the
/// given actual argument texts, then hands back expandable text for the
/// caller to push as a new expansion frame (spec.md S4.1 "Argument
/// substitution").
pub fn substitute(m: &Macro, actuals: &[String]) -> String {
    let params = match &m.params {
        Some(p) => p.as_slice(),
        None => return m.body.clone(),
    };
    let varargs = if m.is_variadic && actuals.len() > params.len() {
        actuals[params.len()..].join(", ")
    } else {
        String::new()
    };

    let mut out = Vec::new();
    for w in words(&m.body) {
        match w {
            Word::Ident(name) => {
                if name == "__VA_ARGS__" {
                    out.push(Word::Other(varargs.clone()));
                } else if let Some(idx) = params.iter().position(|p| p == &name) {
                    out.push(Word::Other(actuals.get(idx).cloned().unwrap_or_default()));
                } else {
                    out.push(Word::Ident(name));
                }
            }
            other => out.push(other),
        }
    }
    rejoin(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_actuals() {
        let (actuals, consumed) = parse_actuals("a, f(b, c), \"x,y\")").unwrap();
        assert_eq!(actuals, vec!["a", "f(b, c)", "\"x,y\""]);
        assert_eq!(consumed, "a, f(b, c), \"x,y\")".len());
    }

    #[test]
    fn substitutes_params_without_fusing_identifiers() {
        let m = Macro {
            name: "B".to_string(),
            params: None,
            is_variadic: false,
            body: "A+A".to_string(),
        };
        assert_eq!(substitute(&m, &[]), "A+A");
    }

    #[test]
    fn substitutes_variadic_args() {
        let m = Macro {
            name: "LOG".to_string(),
            params: Some(vec!["fmt".to_string()]),
            is_variadic: true,
            body: "printf(fmt, __VA_ARGS__)".to_string(),
        };
        let out = substitute(&m, &["\"%d\"".to_string(), "x".to_string(), "y".to_string()]);
        assert_eq!(out, "printf(\"%d\", x, y)");
    }
}
