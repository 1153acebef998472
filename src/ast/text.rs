//! Line and indentation helpers used when emitting new source fragments.

/// Byte offset of the start of the line containing `offset`.
pub fn line_start(source: &str, offset: usize) -> usize {
    source[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0)
}

/// Leading whitespace of the line containing `offset`.
pub fn line_indent(source: &str, offset: usize) -> &str {
    let start = line_start(source, offset);
    let rest = &source[start..];
    let len = rest
        .find(|c: char| c != ' ' && c != '\t')
        .unwrap_or(rest.len());
    &rest[..len]
}

/// Indentation unit used by the file: a tab, or the smallest non-zero run of
/// leading spaces. Defaults to two spaces.
pub fn detect_indent_unit(source: &str) -> String {
    let mut smallest: Option<usize> = None;
    for line in source.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if line.starts_with('\t') {
            return "\t".to_string();
        }
        let spaces = line.len() - line.trim_start_matches(' ').len();
        if spaces > 0 && smallest.map_or(true, |s| spaces < s) {
            smallest = Some(spaces);
        }
    }
    " ".repeat(smallest.unwrap_or(2))
}

/// Re-indent a fragment whose first line carries no indentation and whose
/// following lines are indented relative to `from`. Every non-blank line of
/// the result starts with `to`.
pub fn reindent(fragment: &str, from: &str, to: &str) -> String {
    fragment
        .split('\n')
        .enumerate()
        .map(|(i, line)| {
            if line.trim().is_empty() {
                String::new()
            } else if i == 0 {
                format!("{}{}", to, line)
            } else {
                format!("{}{}", to, line.strip_prefix(from).unwrap_or(line.trim_start()))
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Whether `name` is a syntactically valid JavaScript identifier.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// Words that may not be used as binding names.
pub const RESERVED_WORDS: &[&str] = &[
    "await", "break", "case", "catch", "class", "const", "continue", "debugger", "default",
    "delete", "do", "else", "enum", "export", "extends", "false", "finally", "for", "function",
    "if", "implements", "import", "in", "instanceof", "interface", "let", "new", "null",
    "package", "private", "protected", "public", "return", "static", "super", "switch", "this",
    "throw", "true", "try", "typeof", "var", "void", "while", "with", "yield", "arguments",
    "eval",
];

/// Global names that resolve without a declaration.
pub const BUILTIN_GLOBALS: &[&str] = &[
    "undefined", "NaN", "Infinity", "globalThis", "window", "document", "console", "process",
    "require", "module", "exports", "__dirname", "__filename", "Math", "JSON", "Date", "Object",
    "Array", "String", "Number", "Boolean", "Symbol", "BigInt", "Promise", "Error", "TypeError",
    "RangeError", "SyntaxError", "ReferenceError", "RegExp", "Map", "Set", "WeakMap", "WeakSet",
    "Reflect", "Proxy", "Intl", "parseInt", "parseFloat", "isNaN", "isFinite", "setTimeout",
    "clearTimeout", "setInterval", "clearInterval", "setImmediate", "queueMicrotask", "fetch",
    "Buffer", "URL", "URLSearchParams", "TextEncoder", "TextDecoder", "structuredClone",
    "encodeURIComponent", "decodeURIComponent", "encodeURI", "decodeURI",
];

pub fn is_reserved(name: &str) -> bool {
    RESERVED_WORDS.contains(&name)
}

pub fn is_builtin(name: &str) -> bool {
    BUILTIN_GLOBALS.contains(&name)
}
