//! Naming and explanation collaborator.
//!
//! The external assistant (typically an AI service) is an unreliable
//! dependency: every call goes through [`NamingService`], which validates the
//! answer and falls back to the deterministic [`HeuristicNamer`] on any error
//! or unusable name. Nothing in the pipeline waits on the assistant's
//! availability.

use crate::ast::text::{is_builtin, is_reserved, is_valid_identifier};
use crate::config::RefactoringConfig;
use crate::errors::Result;
use crate::smells::SolidPrinciple;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SolidAdvice {
    pub principle: String,
    pub suggestion: String,
    pub explanation: String,
}

/// External naming assistant. Implementations may fail at any time.
pub trait NamingAssistant: Send + Sync {
    fn suggest_method_name(&self, code: &str, context: Option<&str>) -> Result<String>;

    fn suggest_variable_name(
        &self,
        current_name: &str,
        usage: &str,
        type_hint: Option<&str>,
    ) -> Result<String>;

    fn suggest_solid_refactoring(
        &self,
        class_code: &str,
        principle: SolidPrinciple,
    ) -> Result<SolidAdvice>;
}

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z_$][A-Za-z0-9_$]*").expect("valid identifier regex"));

const VERBS: &[&str] = &[
    "validate", "calculate", "compute", "fetch", "load", "save", "parse", "format", "render",
    "update", "create", "build", "send", "check", "filter", "sort", "transform", "convert",
    "initialize", "init", "log", "print", "read", "write", "remove", "delete", "reset", "apply",
    "collect", "normalize", "prepare", "register", "notify", "process", "handle",
];

const KEYWORDS: &[&str] = &[
    "const", "let", "var", "if", "else", "for", "while", "do", "return", "function", "new", "this",
    "true", "false", "null", "undefined", "of", "in", "typeof", "instanceof", "await", "async",
    "throw", "try", "catch", "finally", "switch", "case", "break", "continue", "default", "length",
];

/// Known poor names and their replacements.
const NAME_TABLE: &[(&str, &str)] = &[
    ("tmp", "temporaryValue"),
    ("temp", "temporaryValue"),
    ("data", "payload"),
    ("obj", "entity"),
    ("arr", "items"),
    ("str", "text"),
    ("num", "count"),
    ("val", "currentValue"),
    ("res", "response"),
    ("req", "request"),
    ("err", "error"),
    ("e", "error"),
    ("cb", "callback"),
    ("el", "element"),
    ("idx", "index"),
    ("cnt", "count"),
    ("msg", "message"),
    ("cfg", "config"),
    ("info", "details"),
    ("foo", "primaryValue"),
    ("bar", "secondaryValue"),
    ("d", "date"),
    ("n", "count"),
    ("s", "text"),
    ("fn", "handler"),
];

/// Deterministic naming rules used whenever the assistant is unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicNamer;

impl HeuristicNamer {
    /// Verb from the first recognizable action in `code`, noun from the first
    /// meaningful identifier; `extractedFunction` when neither is found.
    pub fn method_name(&self, code: &str) -> String {
        let words: Vec<&str> = IDENTIFIER.find_iter(code).map(|m| m.as_str()).collect();
        let verb = words.iter().find_map(|w| {
            let lower = w.to_lowercase();
            VERBS.iter().find(|v| lower.starts_with(*v)).copied()
        });
        let noun = words
            .iter()
            .find(|w| is_meaningful_noun(w) && !VERBS.iter().any(|v| w.to_lowercase().starts_with(v)));

        match (verb, noun) {
            (Some(verb), Some(noun)) => format!("{}{}", verb, capitalize(noun)),
            (Some(verb), None) => format!("{}Values", verb),
            (None, Some(noun)) if code.contains("return") => format!("compute{}", capitalize(noun)),
            (None, Some(noun)) => format!("process{}", capitalize(noun)),
            (None, None) => "extractedFunction".to_string(),
        }
    }

    pub fn variable_name(&self, current_name: &str, usage: &str, type_hint: Option<&str>) -> String {
        if type_hint == Some("boolean") {
            return condition_name(usage);
        }
        NAME_TABLE
            .iter()
            .find(|(bad, _)| *bad == current_name)
            .map(|(_, good)| good.to_string())
            .unwrap_or_else(|| format!("{}Value", current_name))
    }

    pub fn function_name(&self, current_name: &str) -> String {
        NAME_TABLE
            .iter()
            .find(|(bad, _)| *bad == current_name)
            .map(|(_, good)| good.to_string())
            .unwrap_or_else(|| format!("{}Action", current_name))
    }

    pub fn class_name(&self, current_name: &str) -> String {
        const GENERIC: &[&str] = &["Manager", "Handler", "Helper", "Utils", "Util", "Processor", "Data", "Info", "Stuff"];
        for suffix in GENERIC {
            if let Some(stem) = current_name.strip_suffix(suffix) {
                if !stem.is_empty() {
                    return format!("{}Service", stem);
                }
            }
        }
        format!("{}Entity", capitalize(current_name))
    }

    pub fn solid_advice(&self, class_name: &str, principle: SolidPrinciple) -> SolidAdvice {
        let (suggestion, explanation) = match principle {
            SolidPrinciple::SingleResponsibility => (
                format!("Split {} into smaller classes grouped by responsibility", class_name),
                "A class with many methods usually has more than one reason to change; \
                 moving cohesive method groups into their own classes isolates those reasons."
                    .to_string(),
            ),
            SolidPrinciple::InterfaceSegregation => (
                format!("Introduce narrower interfaces for the members {} actually uses", class_name),
                "Clients should not depend on members they do not use; smaller role \
                 interfaces keep implementations focused."
                    .to_string(),
            ),
            SolidPrinciple::DependencyInversion => (
                format!("Inject the collaborators of {} instead of constructing them", class_name),
                "Constructing concrete types inside a class couples it to those \
                 implementations; accepting them as constructor parameters allows substitution."
                    .to_string(),
            ),
        };
        SolidAdvice {
            principle: principle.abbreviation().to_string(),
            suggestion,
            explanation,
        }
    }
}

fn is_meaningful_noun(word: &str) -> bool {
    word.len() >= 3
        && !KEYWORDS.contains(&word)
        && !is_builtin(word)
        && word.chars().next().map(|c| c.is_alphabetic()).unwrap_or(false)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `is<Subject>Valid` from the first meaningful identifier of a boolean expression.
fn condition_name(expression: &str) -> String {
    IDENTIFIER
        .find_iter(expression)
        .map(|m| m.as_str())
        .find(|w| is_meaningful_noun(w))
        .map(|w| {
            let subject = w.strip_prefix("is").filter(|s| s.starts_with(char::is_uppercase)).unwrap_or(w);
            format!("is{}Valid", capitalize(subject))
        })
        .unwrap_or_else(|| "isConditionMet".to_string())
}

/// Assistant calls with validation and deterministic fallback.
#[derive(Clone, Default)]
pub struct NamingService {
    assistant: Option<Arc<dyn NamingAssistant>>,
    heuristics: HeuristicNamer,
}

impl std::fmt::Debug for NamingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamingService")
            .field("assistant", &self.assistant.is_some())
            .finish()
    }
}

impl NamingService {
    pub fn heuristic() -> Self {
        Self::default()
    }

    pub fn with_assistant(assistant: Arc<dyn NamingAssistant>) -> Self {
        Self {
            assistant: Some(assistant),
            heuristics: HeuristicNamer,
        }
    }

    /// Use `assistant` only when the configuration enables it.
    pub fn from_config(config: &RefactoringConfig, assistant: Option<Arc<dyn NamingAssistant>>) -> Self {
        match assistant {
            Some(assistant) if config.ai_enabled => Self::with_assistant(assistant),
            _ => Self::heuristic(),
        }
    }

    pub fn heuristics(&self) -> &HeuristicNamer {
        &self.heuristics
    }

    pub fn method_name(&self, code: &str, context: Option<&str>) -> String {
        self.ask(|a| a.suggest_method_name(code, context))
            .unwrap_or_else(|| self.heuristics.method_name(code))
    }

    pub fn variable_name(&self, current_name: &str, usage: &str, type_hint: Option<&str>) -> String {
        self.ask(|a| a.suggest_variable_name(current_name, usage, type_hint))
            .filter(|name| name != current_name)
            .unwrap_or_else(|| self.heuristics.variable_name(current_name, usage, type_hint))
    }

    pub fn solid_advice(&self, class_name: &str, class_code: &str, principle: SolidPrinciple) -> SolidAdvice {
        if let Some(assistant) = &self.assistant {
            match assistant.suggest_solid_refactoring(class_code, principle) {
                Ok(advice) if !advice.suggestion.trim().is_empty() => return advice,
                Ok(_) => log::debug!("Naming assistant returned empty advice, using heuristics"),
                Err(e) => log::debug!("Naming assistant failed: {}. Using heuristics", e),
            }
        }
        self.heuristics.solid_advice(class_name, principle)
    }

    fn ask(&self, call: impl FnOnce(&dyn NamingAssistant) -> Result<String>) -> Option<String> {
        let assistant = self.assistant.as_ref()?;
        match call(assistant.as_ref()) {
            Ok(name) => {
                let name = name.trim().to_string();
                if is_valid_identifier(&name) && !is_reserved(&name) {
                    Some(name)
                } else {
                    log::debug!("Naming assistant proposed unusable name '{}', using heuristics", name);
                    None
                }
            }
            Err(e) => {
                log::debug!("Naming assistant failed: {}. Using heuristics", e);
                None
            }
        }
    }
}
