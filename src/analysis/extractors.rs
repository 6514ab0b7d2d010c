//! Closed extractor dispatch: one table of plain functions per language.
//!
//! Adding a language means adding a `Language` variant, one module under
//! `languages/`, and one arm in `extractors_for`. Call sites never change.

use std::collections::{BTreeMap, BTreeSet};

use crate::analysis::facts::{
    CallExpression, ClassDefinition, ExportStatement, FunctionDefinition, ImportStatement,
    SourceLocation,
};
use crate::analysis::languages::{ecmascript, go, java, python};
use crate::error::AnalysisError;
use crate::parser::{Language, ParsedFile};

/// The fact extractors for one language.
///
/// Every extractor is a pure function of one parsed file. None of them fail:
/// malformed input produces whatever facts could be recovered.
pub struct ExtractorSet {
    pub functions: fn(&ParsedFile) -> Vec<FunctionDefinition>,
    pub classes: fn(&ParsedFile) -> Vec<ClassDefinition>,
    pub imports: fn(&ParsedFile) -> Vec<ImportStatement>,
    pub exports: fn(&ParsedFile) -> Vec<ExportStatement>,
    pub calls: fn(&ParsedFile, &LocalSymbols) -> Vec<CallExpression>,
}

static ECMASCRIPT_EXTRACTORS: ExtractorSet = ExtractorSet {
    functions: ecmascript::extract_functions,
    classes: ecmascript::extract_classes,
    imports: ecmascript::extract_imports,
    exports: ecmascript::extract_exports,
    calls: ecmascript::extract_calls,
};

static PYTHON_EXTRACTORS: ExtractorSet = ExtractorSet {
    functions: python::extract_functions,
    classes: python::extract_classes,
    imports: python::extract_imports,
    exports: python::extract_exports,
    calls: python::extract_calls,
};

static JAVA_EXTRACTORS: ExtractorSet = ExtractorSet {
    functions: java::extract_functions,
    classes: java::extract_classes,
    imports: java::extract_imports,
    exports: java::extract_exports,
    calls: java::extract_calls,
};

static GO_EXTRACTORS: ExtractorSet = ExtractorSet {
    functions: go::extract_functions,
    classes: go::extract_classes,
    imports: go::extract_imports,
    exports: go::extract_exports,
    calls: go::extract_calls,
};

/// The extractor table for `language`.
pub fn extractors_for(language: Language) -> &'static ExtractorSet {
    match language {
        Language::TypeScript | Language::Tsx | Language::JavaScript => &ECMASCRIPT_EXTRACTORS,
        Language::Python => &PYTHON_EXTRACTORS,
        Language::Java => &JAVA_EXTRACTORS,
        Language::Go => &GO_EXTRACTORS,
    }
}

/// The extractor table for a textual language tag.
///
/// Fails only when the tag names no supported language.
pub fn extractors_for_tag(tag: &str) -> Result<&'static ExtractorSet, AnalysisError> {
    let language: Language = tag.parse()?;
    Ok(extractors_for(language))
}

pub fn extract_functions(parsed: &ParsedFile) -> Vec<FunctionDefinition> {
    (extractors_for(parsed.language).functions)(parsed)
}

pub fn extract_classes(parsed: &ParsedFile) -> Vec<ClassDefinition> {
    (extractors_for(parsed.language).classes)(parsed)
}

pub fn extract_imports(parsed: &ParsedFile) -> Vec<ImportStatement> {
    (extractors_for(parsed.language).imports)(parsed)
}

pub fn extract_exports(parsed: &ParsedFile) -> Vec<ExportStatement> {
    (extractors_for(parsed.language).exports)(parsed)
}

/// Names declared in the file being analyzed, used to resolve call targets
/// without looking at any other file.
#[derive(Debug, Default, Clone)]
pub struct LocalSymbols {
    functions: BTreeSet<String>,
    methods: BTreeMap<String, BTreeSet<String>>,
}

impl LocalSymbols {
    pub fn new(functions: &[FunctionDefinition], classes: &[ClassDefinition]) -> Self {
        let mut symbols = Self::default();
        for f in functions {
            symbols.functions.insert(f.qualified_name.clone());
        }
        for c in classes {
            let entry = symbols.methods.entry(c.name.clone()).or_default();
            for m in &c.methods {
                entry.insert(m.function.name.clone());
            }
        }
        symbols
    }

    fn class_method(&self, class: &str, method: &str) -> Option<String> {
        self.methods
            .get(class)
            .filter(|methods| methods.contains(method))
            .map(|_| format!("{}.{}", class, method))
    }

    /// Resolve a call site to a qualified name declared in this file.
    pub fn resolve(&self, call: &RawCall) -> Option<String> {
        match &call.receiver {
            None => {
                if self.functions.contains(&call.callee) {
                    return Some(call.callee.clone());
                }
                // Implicit `this` (Java) or a sibling method.
                call.enclosing_class
                    .as_deref()
                    .and_then(|class| self.class_method(class, &call.callee))
            }
            Some(_) if call.receiver_is_self => call
                .enclosing_class
                .as_deref()
                .and_then(|class| self.class_method(class, &call.callee)),
            // Static-style call on a class declared here.
            Some(receiver) => self
                .class_method(receiver, &call.callee)
                .or_else(|| {
                    let qualified = format!("{}.{}", receiver, call.callee);
                    self.functions.contains(&qualified).then_some(qualified)
                }),
        }
    }
}

/// A call site before local resolution.
#[derive(Debug, Clone)]
pub struct RawCall {
    pub caller: String,
    pub callee: String,
    pub receiver: Option<String>,
    /// The receiver is `this`/`self`/the Go method receiver.
    pub receiver_is_self: bool,
    pub enclosing_class: Option<String>,
    pub arguments: Vec<String>,
    pub location: SourceLocation,
}

impl RawCall {
    pub fn resolve(self, symbols: &LocalSymbols) -> CallExpression {
        let resolved_callee = symbols.resolve(&self);
        CallExpression {
            caller: self.caller,
            callee: self.callee,
            resolved_callee,
            arguments: self.arguments,
            location: self.location,
        }
    }
}

/// Longest argument snippet kept verbatim on a call record.
pub const MAX_ARGUMENT_LEN: usize = 80;

/// Argument text, truncated on a character boundary.
pub fn argument_snippet(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() <= MAX_ARGUMENT_LEN {
        return text.to_string();
    }
    let mut out: String = text.chars().take(MAX_ARGUMENT_LEN).collect();
    out.push_str("...");
    out
}
