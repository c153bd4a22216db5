//! Native execution of the Swap/Splice/Reverse transform class

use regex::Regex;
use std::collections::HashMap;
use tracing::debug;

/// One step of a simple transform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// Exchange index 0 with index `n mod len`
    Swap(usize),
    /// Drop the first `n` characters
    Splice(usize),
    Reverse,
}

/// Outcome of inspecting a transform body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Simple(Vec<Instruction>),
    NotRepresentable,
}

enum Statement {
    Split(String),
    Call {
        object: String,
        function: String,
        arg: String,
        value: usize,
    },
    Join(String),
}

struct StatementPatterns {
    split: Regex,
    call: Regex,
    join: Regex,
}

impl StatementPatterns {
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            split: Regex::new(r#"^([a-zA-Z0-9_$]+)\s*=\s*([a-zA-Z0-9_$]+)\.split\(\s*""\s*\)$"#)?,
            call: Regex::new(
                r"^([a-zA-Z0-9_$]+)\.([a-zA-Z0-9_$]+)\(\s*([a-zA-Z0-9_$]+)\s*(?:,\s*(\d+)\s*)?\)$",
            )?,
            join: Regex::new(r#"^return\s+([a-zA-Z0-9_$]+)\.join\(\s*""\s*\)$"#)?,
        })
    }

    fn parse(&self, statement: &str) -> Option<Statement> {
        if let Some(caps) = self.split.captures(statement) {
            return (caps[1] == caps[2]).then(|| Statement::Split(caps[1].to_string()));
        }
        if let Some(caps) = self.join.captures(statement) {
            return Some(Statement::Join(caps[1].to_string()));
        }
        let caps = self.call.captures(statement)?;
        Some(Statement::Call {
            object: caps[1].to_string(),
            function: caps[2].to_string(),
            arg: caps[3].to_string(),
            value: match caps.get(4) {
                Some(m) => m.as_str().parse().ok()?,
                None => 0,
            },
        })
    }
}

/// Decide whether `source` (a function body) is a plain sequence of helper calls.
///
/// Any statement other than the split prologue, a `helper.fn(a,N)` call or the
/// join epilogue makes the body `NotRepresentable`, as does a helper whose
/// definition cannot be found or classified.
pub fn classify(source: &str, script: &str) -> Classification {
    let Ok(patterns) = StatementPatterns::new() else {
        return Classification::NotRepresentable;
    };

    let statements: Vec<&str> = source
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let parsed: Option<Vec<Statement>> = statements.iter().map(|s| patterns.parse(s)).collect();
    let Some(parsed) = parsed else {
        debug!("Transform body has statements outside the helper-call shape");
        return Classification::NotRepresentable;
    };

    let (Some(Statement::Split(arg)), Some(Statement::Join(joined))) =
        (parsed.first(), parsed.last())
    else {
        return Classification::NotRepresentable;
    };
    if arg != joined || parsed.len() < 2 {
        return Classification::NotRepresentable;
    }

    let mut operations: HashMap<String, Option<Instruction>> = HashMap::new();
    let mut instructions = Vec::with_capacity(parsed.len() - 2);

    for statement in &parsed[1..parsed.len() - 1] {
        let Statement::Call {
            object,
            function,
            arg: call_arg,
            value,
        } = statement
        else {
            return Classification::NotRepresentable;
        };
        if call_arg != arg {
            return Classification::NotRepresentable;
        }

        let operation = operations
            .entry(function.clone())
            .or_insert_with(|| classify_helper(object, function, script));
        let instruction = match operation {
            Some(Instruction::Swap(_)) => Instruction::Swap(*value),
            Some(Instruction::Splice(_)) => Instruction::Splice(*value),
            Some(Instruction::Reverse) => Instruction::Reverse,
            None => {
                debug!("Helper {}.{} is not a simple operation", object, function);
                return Classification::NotRepresentable;
            }
        };
        instructions.push(instruction);
    }

    Classification::Simple(instructions)
}

/// Map a helper definition `fn:function(..){..}` to its operation
fn classify_helper(object: &str, function: &str, script: &str) -> Option<Instruction> {
    let definition = Regex::new(&format!(
        r"(?:^|[^a-zA-Z0-9_$]){}\s*:\s*function\s*\([^)]*\)\s*\{{([^}}]*)\}}",
        regex::escape(function)
    ))
    .ok()?;

    let body = helper_object(object, script)
        .and_then(|helpers| definition.captures(&helpers).map(|c| c[1].to_string()))
        .or_else(|| definition.captures(script).map(|c| c[1].to_string()))?;

    if body.contains(".splice") {
        Some(Instruction::Splice(0))
    } else if body.contains(".length") {
        Some(Instruction::Swap(0))
    } else if body.contains(".reverse") {
        Some(Instruction::Reverse)
    } else {
        None
    }
}

/// Text of `var OBJ={...};` when present
fn helper_object(object: &str, script: &str) -> Option<String> {
    let start = Regex::new(&format!(
        r"(?:^|[^a-zA-Z0-9_$.])(?:var|let|const)\s+{}\s*=\s*\{{",
        regex::escape(object)
    ))
    .ok()?
    .find(script)?;

    let text = &script[start.end()..];
    let mut depth = 1usize;
    for (idx, c) in text.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[..idx].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

/// Run `instructions` over the characters of `input`
pub fn apply(instructions: &[Instruction], input: &str) -> String {
    let mut chars: Vec<char> = input.chars().collect();

    for instruction in instructions {
        match *instruction {
            Instruction::Swap(n) => {
                if !chars.is_empty() {
                    let idx = n % chars.len();
                    chars.swap(0, idx);
                }
            }
            Instruction::Splice(n) => {
                chars.drain(..n.min(chars.len()));
            }
            Instruction::Reverse => chars.reverse(),
        }
    }

    chars.into_iter().collect()
}
