//! Import extraction from Python source.
//!
//! This is a statement-level scanner, not a parser: it splits the source into
//! logical statements and picks out `import` and `from ... import` forms. That
//! is enough to tell which modules a file pulls in, including imports nested in
//! functions or `try` blocks.

use regex::Regex;
use std::sync::LazyLock;

static MODULE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\.*[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$|^\.+$").expect("invalid regex"));

/// Dotted names of everything `source` imports, in order of first appearance.
///
/// `from a.b import c` yields `a.b.c`; `from a import *` yields `a`. Relative
/// imports keep their leading dots.
#[must_use]
pub fn extract_imports(source: &[u8]) -> Vec<String> {
    let source = String::from_utf8_lossy(source);
    let mut modules: Vec<String> = Vec::new();

    for statement in logical_statements(&source) {
        for module in statement_imports(&statement) {
            if !modules.contains(&module) {
                modules.push(module);
            }
        }
    }

    modules
}

/// The first imported module containing one of `frameworks`, with that framework.
#[must_use]
pub fn find_framework<'a>(imports: &'a [String], frameworks: &'a [String]) -> Option<(&'a str, &'a str)> {
    imports.iter().find_map(|module| {
        frameworks
            .iter()
            .find(|framework| module.contains(framework.as_str()))
            .map(|framework| (module.as_str(), framework.as_str()))
    })
}

fn statement_imports(statement: &str) -> Vec<String> {
    let cleaned = statement.replace(['(', ')'], " ");
    let mut tokens = cleaned.split_whitespace();

    match tokens.next() {
        Some("import") => {
            let rest: Vec<&str> = tokens.collect();
            rest.join(" ")
                .split(',')
                .filter_map(|part| part.split_whitespace().next())
                .filter(|name| is_module_name(name))
                .map(str::to_string)
                .collect()
        }

        Some("from") => {
            let Some(module) = tokens.next().filter(|m| is_module_name(m)) else {
                return Vec::new();
            };

            if tokens.next() != Some("import") {
                return Vec::new();
            }

            let rest: Vec<&str> = tokens.collect();
            rest.join(" ")
                .split(',')
                .filter_map(|part| part.split_whitespace().next())
                .filter_map(|name| {
                    if name == "*" {
                        Some(module.to_string())
                    } else if is_identifier(name) {
                        let separator = if module.ends_with('.') { "" } else { "." };
                        Some(format!("{module}{separator}{name}"))
                    } else {
                        None
                    }
                })
                .collect()
        }

        _ => Vec::new(),
    }
}

fn is_module_name(name: &str) -> bool {
    MODULE_NAME.is_match(name)
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty() && !name.contains('.') && MODULE_NAME.is_match(name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StringState {
    Code,
    Single(char),
    Triple(char),
}

/// Split source into logical statements.
///
/// Comments and triple-quoted string contents are dropped. Backslash
/// continuations and open brackets join physical lines, and `;` separates
/// statements on one line.
fn logical_statements(source: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut state = StringState::Code;
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            StringState::Triple(quote) => {
                if c == '\\' {
                    let _ = chars.next();
                } else if c == quote && chars.peek() == Some(&quote) {
                    let _ = chars.next();
                    if chars.peek() == Some(&quote) {
                        let _ = chars.next();
                        state = StringState::Code;
                    }
                }
            }

            StringState::Single(quote) => {
                if c == '\\' {
                    let _ = chars.next();
                } else if c == quote {
                    current.push(c);
                    state = StringState::Code;
                } else if c == '\n' {
                    state = StringState::Code;
                    flush(&mut statements, &mut current, &mut depth);
                } else {
                    current.push(c);
                }
            }

            StringState::Code => match c {
                '#' => {
                    while chars.peek().is_some_and(|&next| next != '\n') {
                        let _ = chars.next();
                    }
                }
                '\\' if chars.peek() == Some(&'\n') => {
                    let _ = chars.next();
                    current.push(' ');
                }
                '\'' | '"' => {
                    let mut lookahead = chars.clone();
                    if lookahead.next() == Some(c) && lookahead.next() == Some(c) {
                        let _ = chars.next();
                        let _ = chars.next();
                        state = StringState::Triple(c);
                    } else {
                        current.push(c);
                        state = StringState::Single(c);
                    }
                }
                '(' | '[' | '{' => {
                    depth += 1;
                    current.push(c);
                }
                ')' | ']' | '}' => {
                    depth = depth.saturating_sub(1);
                    current.push(c);
                }
                ';' if depth == 0 => flush(&mut statements, &mut current, &mut depth),
                '\n' if depth == 0 => flush(&mut statements, &mut current, &mut depth),
                '\n' | '\r' => current.push(' '),
                _ => current.push(c),
            },
        }
    }

    flush(&mut statements, &mut current, &mut depth);
    statements
}

fn flush(statements: &mut Vec<String>, current: &mut String, depth: &mut usize) {
    let statement = current.trim();
    if !statement.is_empty() {
        statements.push(statement.to_string());
    }
    current.clear();
    *depth = 0;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frameworks() -> Vec<String> {
        vec!["tensorflow".to_string(), "torch".to_string(), "keras".to_string()]
    }

    fn imports(source: &str) -> Vec<String> {
        extract_imports(source.as_bytes())
    }

    #[test]
    fn test_tensorflow_alias_is_a_framework_import() {
        let found = imports("import tensorflow as tf\n");
        assert_eq!(found, vec!["tensorflow"]);
        assert_eq!(find_framework(&found, &frameworks()), Some(("tensorflow", "tensorflow")));
    }

    #[test]
    fn test_pandas_is_not_a_framework_import() {
        let found = imports("import pandas as pd\nfrom pandas import DataFrame\n");
        assert_eq!(found, vec!["pandas", "pandas.DataFrame"]);
        assert_eq!(find_framework(&found, &frameworks()), None);
    }

    #[test]
    fn test_dotted_names_match_by_substring() {
        let found = imports("from torch.nn import functional as F\n");
        assert_eq!(found, vec!["torch.nn.functional"]);
        assert_eq!(find_framework(&found, &frameworks()), Some(("torch.nn.functional", "torch")));

        let found = imports("import pytorch_lightning\n");
        assert_eq!(find_framework(&found, &frameworks()), Some(("pytorch_lightning", "torch")));
    }

    #[test]
    fn test_multiple_names_and_aliases() {
        assert_eq!(imports("import os, sys as system, numpy.linalg\n"), vec!["os", "sys", "numpy.linalg"]);
    }

    #[test]
    fn test_parenthesized_from_import_spans_lines() {
        let source = "from keras.layers import (\n    Dense,\n    Dropout,  # regularization\n)\n";
        assert_eq!(imports(source), vec!["keras.layers.Dense", "keras.layers.Dropout"]);
    }

    #[test]
    fn test_backslash_continuation_and_semicolons() {
        assert_eq!(imports("import os, \\\n    json\n"), vec!["os", "json"]);
        assert_eq!(imports("x = 1; import re; y = 2\n"), vec!["re"]);
    }

    #[test]
    fn test_comments_and_docstrings_are_ignored() {
        let source = r#"
"""
Example:
    import tensorflow
"""
# import torch
text = "import keras"
def f():
    '''import torch'''
    return 1
"#;
        assert!(imports(source).is_empty());
    }

    #[test]
    fn test_nested_imports_count() {
        let source = "try:\n    import torch\nexcept ImportError:\n    torch = None\n";
        assert_eq!(imports(source), vec!["torch"]);
    }

    #[test]
    fn test_relative_and_star_imports() {
        assert_eq!(imports("from . import utils\n"), vec![".utils"]);
        assert_eq!(imports("from ..models import Net\n"), vec!["..models.Net"]);
        assert_eq!(imports("from tensorflow.keras import *\n"), vec!["tensorflow.keras"]);
    }

    #[test]
    fn test_not_an_import() {
        assert!(imports("important = True\nfrom_date = None\nprint('from x import y')\n").is_empty());
    }

    #[test]
    fn test_invalid_utf8_is_tolerated() {
        let mut source = b"# caf\xe9\nimport torch\n".to_vec();
        source.extend_from_slice(b"s = '\xff'\n");
        assert_eq!(extract_imports(&source), vec!["torch"]);
    }
}
