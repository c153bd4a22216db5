//! Locating obfuscated transform functions inside minified player script text

use crate::error::ResolveError;
use crate::Result;
use regex::Regex;
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

/// Which obfuscated transform a token belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformKind {
    /// The `s` value of a cipher query string
    Signature,
    /// The throttling `n` query parameter
    N,
}

impl TransformKind {
    /// Short tag used in solver requests and diagnostics
    pub fn as_str(&self) -> &'static str {
        match self {
            TransformKind::Signature => "sig",
            TransformKind::N => "n",
        }
    }
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved transform function and the runnable source needed to call it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformIdentity {
    /// Name the function is callable by once `code` has been evaluated
    pub name: String,
    /// Lookup variable, dependencies and the function declaration
    pub code: String,
    /// Statements between the function's outer braces
    pub body: String,
}

/// A function definition located in the script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSource {
    pub name: String,
    pub params: Vec<String>,
    /// Text between the outer braces
    pub body: String,
    /// Normalised `function NAME(..){..}` or `var NAME=function(..){..};`
    pub declaration: String,
}

/// Name captured by one pattern attempt, with an optional array index
#[derive(Debug, Clone, PartialEq, Eq)]
struct NameMatch {
    name: String,
    index: Option<usize>,
}

impl NameMatch {
    fn direct(name: &str) -> Self {
        Self {
            name: name.to_string(),
            index: None,
        }
    }
}

type NameAttempt = fn(&str) -> Option<NameMatch>;

const SIGNATURE_ATTEMPTS: &[(&str, NameAttempt)] = &[
    ("decodeURIComponent call", sig_decode_uri_call),
    ("split/join body", sig_split_join_body),
    ("split prologue", sig_split_prologue),
];

const N_ATTEMPTS: &[(&str, NameAttempt)] = &[
    ("n parameter call site", n_call_site),
    ("_w8_ return", n_w8_return),
    ("try/catch guard", n_try_catch_guard),
    ("typeof guard", n_typeof_guard),
];

const GUARD_PATTERN: &str = r#";\s*if\s*\(\s*typeof\s+[a-zA-Z0-9_$]+\s*===?\s*(?:"undefined"|'undefined'|[$\w]+\[\d+\])\s*\)\s*return\s+[$\w]+;"#;

const GLOBAL_LOOKUP_PATTERN: &str = r#"["']use\s+strict["'];\s*(var\s+([a-zA-Z0-9_$]+)\s*=\s*(?:"(?:[^"\\]|\\.)+"\.split\((?:"[^"]+"|'[^']+')\)|'(?:[^'\\]|\\.)+'\.split\((?:"[^"]+"|'[^']+')\)|\[\s*(?:(?:"(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*')\s*,?\s*)+\]))[;,]"#;

const BUILTINS: &[&str] = &[
    "Array", "Date", "JSON", "Math", "Number", "Object", "RegExp", "String", "decodeURIComponent",
    "encodeURIComponent", "parseInt", "window", "document", "navigator", "this",
];

fn compile(pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(regex) => Some(regex),
        Err(e) => {
            debug!("Skipping pattern that failed to compile: {}", e);
            None
        }
    }
}

/// Find the name of the transform function for `kind`.
///
/// Attempts run in order and the first structural match wins. A name bound to
/// a global array is replaced by the array element it indexes.
pub fn find_function_name(kind: TransformKind, script: &str) -> Option<String> {
    let attempts = match kind {
        TransformKind::Signature => SIGNATURE_ATTEMPTS,
        TransformKind::N => N_ATTEMPTS,
    };

    for (label, attempt) in attempts {
        match attempt(script) {
            Some(found) => {
                let name = resolve_array_indirection(&found, script);
                debug!("{} function name via {}: {}", kind, label, name);
                return Some(name);
            }
            None => debug!("{} name attempt '{}' missed", kind, label),
        }
    }

    None
}

/// `X&&(X=NAME(decodeURIComponent(X)))`
fn sig_decode_uri_call(script: &str) -> Option<NameMatch> {
    let re = compile(
        r"(?:^|[^a-zA-Z0-9_$])([a-zA-Z0-9_$]+)&&\(([a-zA-Z0-9_$]+)=([a-zA-Z0-9_$]{2,})\(decodeURIComponent\(([a-zA-Z0-9_$]+)\)\)",
    )?;

    let found = re
        .captures_iter(script)
        .find(|caps| caps[1] == caps[2] && caps[2] == caps[4])
        .map(|caps| NameMatch::direct(&caps[3]));
    found
}

/// `NAME=function(a){a=a.split("");...;return a.join("")`
fn sig_split_join_body(script: &str) -> Option<NameMatch> {
    let re = compile(
        r#"([a-zA-Z0-9_$]+)\s*=\s*function\(\s*([a-zA-Z0-9_$]+)\s*\)\s*\{\s*([a-zA-Z0-9_$]+)\s*=\s*([a-zA-Z0-9_$]+)\.split\(\s*""\s*\)\s*;\s*[^}]+;\s*return\s+([a-zA-Z0-9_$]+)\.join\(\s*""\s*\)"#,
    )?;

    let found = re
        .captures_iter(script)
        .find(|caps| caps[2] == caps[3] && caps[3] == caps[4] && caps[4] == caps[5])
        .map(|caps| NameMatch::direct(&caps[1]));
    found
}

/// `NAME=function(a){a=a.split("")` with an optional first helper call
fn sig_split_prologue(script: &str) -> Option<NameMatch> {
    let re = compile(
        r#"(?:^|[^a-zA-Z0-9_$])([a-zA-Z0-9_$]{2,})\s*=\s*function\(\s*a\s*\)\s*\{\s*a\s*=\s*a\.split\(\s*""\s*\)(?:;[a-zA-Z0-9_$]{2}\.[a-zA-Z0-9_$]{2}\(a,\d+\))?"#,
    )?;

    re.captures(script).map(|caps| NameMatch::direct(&caps[1]))
}

/// Call sites that feed the `n` query value through the transform
fn n_call_site(script: &str) -> Option<NameMatch> {
    let indexed = |caps: &regex::Captures, name: usize, idx: usize| NameMatch {
        name: caps[name].to_string(),
        index: caps.get(idx).and_then(|m| m.as_str().parse().ok()),
    };

    // .get("n"))&&(b=NAME[idx](b)
    let getter = compile(
        r#"\.get\("n"\)\)&&\([a-zA-Z0-9_$]+=([a-zA-Z0-9_$]+)(?:\[(\d+)\])?\([a-zA-Z0-9_$]\)"#,
    )?;
    if let Some(caps) = getter.captures(script) {
        return Some(indexed(&caps, 1, 2));
    }

    // b=String.fromCharCode(110) or X&&(b="nn"[+X]), then c=a.get(b))&&(c=NAME[idx](c)
    let char_code = compile(
        r#"(?:b=String\.fromCharCode\(110\)|([a-zA-Z0-9_$.]+)&&\(b="nn"\[\+([a-zA-Z0-9_$.]+)\])(?:,[a-zA-Z0-9_$]+\(a\))?,c=a\.(?:get\(b\)|[a-zA-Z0-9_$]+\[b\]\|\|null)\)&&\(c=([a-zA-Z0-9_$]+)(?:\[(\d+)\])?\([a-zA-Z]\)"#,
    )?;
    let found = char_code.captures_iter(script).find(|caps| {
        match (caps.get(1), caps.get(2)) {
            (Some(a), Some(b)) => a.as_str() == b.as_str(),
            _ => true,
        }
    });
    if let Some(caps) = found {
        return Some(indexed(&caps, 3, 4));
    }

    // X=NAME[idx](a),Y.set("n",X)
    let setter = compile(
        r#"(?:^|[^a-zA-Z0-9_$])([a-zA-Z0-9_$]+)=([a-zA-Z0-9_$]+)(?:\[(\d+)\])?\([a-zA-Z]\),[a-zA-Z0-9_$]+\.set\((?:"n+"|[a-zA-Z0-9_$]+),([a-zA-Z0-9_$]+)\)"#,
    )?;
    let found = setter
        .captures_iter(script)
        .find(|caps| caps[1] == caps[4])
        .map(|caps| indexed(&caps, 2, 3));
    found
}

/// `;NAME=function(a){...return "..._w8_"+a` within one function
fn n_w8_return(script: &str) -> Option<NameMatch> {
    let ret = compile(r#"return\s*["'][\w-]+_w8_["']\s*\+\s*[a-zA-Z0-9_$]+"#)?;
    let start = compile(r";\s*([a-zA-Z0-9_$]+)\s*=\s*function\([a-zA-Z0-9_$]+\)\s*\{")?;

    for hit in ret.find_iter(script) {
        let head = &script[..hit.start()];
        let nearest = start.captures_iter(head).last();
        if let Some(caps) = nearest {
            let opened = caps.get(0).map(|m| m.end()).unwrap_or(0);
            if !head[opened..].contains("};") {
                return Some(NameMatch::direct(&caps[1]));
            }
        }
    }

    None
}

/// A function whose body is wrapped by `try{..}catch(e){return helper[i]+arg}`
fn n_try_catch_guard(script: &str) -> Option<NameMatch> {
    let guard = compile(
        r"catch\(\s*[a-zA-Z0-9_$]+\s*\)\s*\{\s*return\s+[a-zA-Z0-9_$]+\[\d+\]\s*\+\s*([a-zA-Z0-9_$]+)\s*\}",
    )?;

    for caps in guard.captures_iter(script) {
        let Some(whole) = caps.get(0) else { continue };
        let start = compile(&format!(
            r"(?:^|[^a-zA-Z0-9_$.])([a-zA-Z0-9_$]+)\s*=\s*function\(\s*{}\s*\)\s*\{{",
            regex::escape(&caps[1])
        ))?;
        let nearest = start.captures_iter(&script[..whole.start()]).last();
        if let Some(def) = nearest {
            return Some(NameMatch::direct(&def[1]));
        }
    }

    None
}

/// A 3-character function name preceding the `typeof` guard idiom
fn n_typeof_guard(script: &str) -> Option<NameMatch> {
    let guard = compile(GUARD_PATTERN)?;
    let start = compile(
        r"(?:^|[^a-zA-Z0-9_$.])([a-zA-Z0-9_$]{3})\s*=\s*function\(\s*[a-zA-Z0-9_$]+\s*\)\s*\{",
    )?;

    for hit in guard.find_iter(script) {
        let head = &script[..hit.start()];
        let nearest = start.captures_iter(head).last();
        if let Some(caps) = nearest {
            let opened = caps.get(0).map(|m| m.end()).unwrap_or(0);
            if !head[opened..].contains("};") {
                return Some(NameMatch::direct(&caps[1]));
            }
        }
    }

    None
}

/// `var NAME=[a,b,...];` maps NAME[idx] to the element; anything else is used as-is
fn resolve_array_indirection(found: &NameMatch, script: &str) -> String {
    let pattern = format!(r"var\s+{}\s*=\s*\[([^\]]*)\]\s*;", regex::escape(&found.name));
    let element = compile(&pattern)
        .and_then(|re| re.captures(script))
        .and_then(|caps| {
            caps[1]
                .split(',')
                .nth(found.index.unwrap_or(0))
                .map(|s| s.trim().to_string())
        })
        .filter(|element| !element.is_empty() && element.chars().all(is_ident_char));

    match element {
        Some(element) => {
            debug!("Resolved {} through global array to {}", found.name, element);
            element
        }
        None => found.name.clone(),
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Locate the definition of `name` in any of the supported forms
pub fn locate_function(name: &str, script: &str) -> Option<FunctionSource> {
    let escaped = regex::escape(name);
    let declaration = compile(&format!(
        r"(?:^|[^a-zA-Z0-9_$.])(function\s+{}\s*\()",
        escaped
    ))?;
    let expression = compile(&format!(
        r"(?:^|[^a-zA-Z0-9_$.])((?:(?:var|let|const)\s+)?{}\s*=\s*function\s*\()",
        escaped
    ))?;

    let (params_start, is_expression) = if let Some(caps) = declaration.captures(script) {
        (caps.get(1)?.end(), false)
    } else {
        (expression.captures(script)?.get(1)?.end(), true)
    };

    let params_end = params_start + script[params_start..].find(')')?;
    let params_text = &script[params_start..params_end];
    let open = params_end + 1 + script[params_end + 1..].find('{')?;
    if !script[params_end + 1..open].trim().is_empty() {
        return None;
    }

    let close = matching_brace(script, open).or_else(|| {
        debug!("Unbalanced body for {}, falling back to '}};' terminator", name);
        script[open..].find("};").map(|idx| open + idx)
    })?;
    let body = &script[open + 1..close];

    let declaration = if is_expression {
        format!("var {}=function({}){{{}}};", name, params_text, body)
    } else {
        format!("function {}({}){{{}}}", name, params_text, body)
    };

    Some(FunctionSource {
        name: name.to_string(),
        params: params_text
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect(),
        body: body.to_string(),
        declaration,
    })
}

/// Runnable source for `name`: the global lookup variable (when present)
/// followed by the normalised declaration with the `typeof` guard removed.
pub fn extract_function_body(name: &str, script: &str) -> Option<String> {
    let function = locate_function(name, script)?;
    let mut parts = Vec::new();
    if let Some((_, code)) = global_lookup(script) {
        parts.push(format!("{};", code));
    }
    parts.push(strip_guard(&function.declaration));
    Some(parts.join("\n"))
}

/// Resolve name and runnable source for `kind` in one step
pub fn extract_identity(kind: TransformKind, script: &str) -> Result<TransformIdentity> {
    let name = find_function_name(kind, script).ok_or_else(|| {
        ResolveError::ExtractionFailure(format!("Failed to extract {} function name", kind))
    })?;
    let missing_code =
        || ResolveError::ExtractionFailure(format!("Failed to extract {} function code", kind));
    let function = locate_function(&name, script).ok_or_else(missing_code)?;
    let source = extract_function_body(&name, script).ok_or_else(missing_code)?;

    // Dependency initializers never read the lookup variable
    let mut parts = Vec::new();
    if kind == TransformKind::Signature {
        let lookup_name = global_lookup(script).map(|(n, _)| n);
        parts.extend(
            extract_dependencies(&function, script)
                .into_iter()
                .filter(|(dep, _)| Some(dep) != lookup_name.as_ref())
                .map(|(_, code)| code),
        );
    }
    parts.push(source);

    Ok(TransformIdentity {
        name,
        code: parts.join("\n"),
        body: function.body,
    })
}

/// `var NAME="...".split("...")` or a literal string array right after `"use strict";`
pub fn global_lookup(script: &str) -> Option<(String, String)> {
    let caps = compile(GLOBAL_LOOKUP_PATTERN)?.captures(script)?;
    Some((caps[2].to_string(), caps[1].to_string()))
}

/// Check whether the script carries the `if(typeof X==="undefined")return X;` guard
pub fn has_guard_idiom(script: &str) -> bool {
    compile(GUARD_PATTERN).is_some_and(|re| re.is_match(script))
}

fn strip_guard(code: &str) -> String {
    match compile(GUARD_PATTERN) {
        Some(re) => re.replace_all(code, ";").into_owned(),
        None => code.to_string(),
    }
}

/// Declarations of helper objects and lookup arrays referenced by the function.
///
/// Returns `(name, declaration)` pairs in first-reference order. Parameters,
/// locals and builtins are skipped, as are names with no declaration.
pub fn extract_dependencies(function: &FunctionSource, script: &str) -> Vec<(String, String)> {
    let mut names: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    let member_call = compile(r"(?:^|[^a-zA-Z0-9_$.])([a-zA-Z0-9_$]+)\.[a-zA-Z0-9_$]+\(");
    let indexed = compile(r"[;{]([a-zA-Z0-9_$]+)\[");
    let scanned = format!("{{{}", function.body);

    let candidates = member_call
        .iter()
        .flat_map(|re| re.captures_iter(&scanned).map(|c| c[1].to_string()).collect::<Vec<_>>())
        .chain(
            indexed
                .iter()
                .flat_map(|re| re.captures_iter(&scanned).map(|c| c[1].to_string()).collect::<Vec<_>>()),
        );

    for candidate in candidates {
        if candidate == function.name
            || function.params.contains(&candidate)
            || BUILTINS.contains(&candidate.as_str())
            || candidate.chars().all(|c| c.is_ascii_digit())
            || is_declared_locally(&candidate, &function.body)
        {
            continue;
        }
        if seen.insert(candidate.clone()) {
            names.push(candidate);
        }
    }

    names
        .into_iter()
        .filter_map(|name| {
            let code = locate_declaration(&name, script)?;
            debug!("Including dependency {} ({} chars)", name, code.len());
            Some((name, code))
        })
        .collect()
}

fn is_declared_locally(name: &str, body: &str) -> bool {
    let pattern = format!(
        r"(?:(?:var|let|const)\s+|,\s*){}\s*=",
        regex::escape(name)
    );
    compile(&pattern).is_some_and(|re| re.is_match(body))
}

/// Full `var|let|const NAME=...;` statement, or a function definition
fn locate_declaration(name: &str, script: &str) -> Option<String> {
    let pattern = format!(
        r"(?:^|[^a-zA-Z0-9_$.])((?:var|let|const)\s+{}\s*=)",
        regex::escape(name)
    );
    if let Some(caps) = compile(&pattern).and_then(|re| re.captures(script)) {
        let start = caps.get(1)?.start();
        let end = statement_end(script, start)?;
        return Some(script[start..=end].to_string());
    }

    locate_function(name, script).map(|function| function.declaration)
}

/// Bytes after which a `/` opens a regex literal instead of dividing
const REGEX_PRECEDERS: &[u8] = b"(,=[:!&|?{};";

fn opens_regex_literal(bytes: &[u8], slash: usize) -> bool {
    match bytes[..slash].iter().rev().find(|b| !b.is_ascii_whitespace()) {
        Some(prev) => REGEX_PRECEDERS.contains(prev),
        None => true,
    }
}

/// Index of the `/` closing the regex literal opened at `slash`
fn regex_literal_end(bytes: &[u8], slash: usize) -> Option<usize> {
    let mut in_class = false;
    let mut i = slash + 1;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'\n' => return None,
            b'[' => in_class = true,
            b']' => in_class = false,
            b'/' if !in_class => return Some(i),
            _ => {}
        }
        i += 1;
    }

    None
}

/// Walk `script` from `start`, skipping string and regex literals.
///
/// `visit` sees every other byte with its index and stops the walk by
/// returning `Some`.
fn scan_code<F>(script: &str, start: usize, mut visit: F) -> Option<usize>
where
    F: FnMut(usize, u8) -> Option<usize>,
{
    let bytes = script.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = start;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == q {
                quote = None;
            }
        } else {
            match b {
                b'"' | b'\'' | b'`' => quote = Some(b),
                b'/' if opens_regex_literal(bytes, i) => {
                    if let Some(end) = regex_literal_end(bytes, i) {
                        i = end + 1;
                        continue;
                    }
                }
                _ => {
                    if let Some(found) = visit(i, b) {
                        return Some(found);
                    }
                }
            }
        }
        i += 1;
    }

    None
}

/// Index of the matching `}` for the `{` at `open`
fn matching_brace(script: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    scan_code(script, open, |i, b| {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        None
    })
}

/// Index of the first top-level `;` at or after `start`
fn statement_end(script: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    scan_code(script, start, |i, b| {
        match b {
            b'{' | b'[' | b'(' => depth += 1,
            b'}' | b']' | b')' => depth = depth.saturating_sub(1),
            b';' if depth == 0 => return Some(i),
            _ => {}
        }
        None
    })
}
