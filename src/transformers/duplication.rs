use super::analysis::{analyze_range, call_site, function_text, locate_range, unique_name, BlockAnalysis, FinalReturn, Placement, StatementRange};
use super::{Change, Transformer};
use crate::ast::text::{detect_indent_unit, is_reserved, is_valid_identifier, line_indent, reindent};
use crate::ast::{collapse_whitespace, parse_source, ScopeTable, SyntaxTree, TreeEditor};
use crate::collaborator::NamingService;
use crate::core::Location;
use crate::errors::{RefactronError, Result};
use std::mem::discriminant;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct DuplicationRequest {
    /// Statement ranges holding the duplicated code.
    pub instances: Vec<Location>,
    pub shared_name: Option<String>,
}

/// Replaces every duplicated instance with a call to one shared function.
///
/// Instances may differ only in the names of their variables. Those are
/// mapped onto the first instance's names, which become the shared
/// function's parameters and locals.
#[derive(Debug, Clone, Default)]
pub struct DuplicationTransformer {
    naming: NamingService,
}

impl DuplicationTransformer {
    pub fn new(naming: NamingService) -> Self {
        Self { naming }
    }

    fn fail(&self, message: impl Into<String>) -> RefactronError {
        RefactronError::transformation(self.name(), message)
    }

    fn check_compatible(
        &self,
        tree: &SyntaxTree,
        instances: &[(StatementRange, BlockAnalysis)],
    ) -> Result<()> {
        let (first_range, first) = &instances[0];
        let canonical = canonical_text(tree, first_range, first);
        for (range, analysis) in &instances[1..] {
            if canonical_text(tree, range, analysis) != canonical {
                return Err(self.fail(format!(
                    "instance at line {} differs from line {} beyond variable names",
                    tree.node(range.first()).start.line,
                    tree.node(first_range.first()).start.line
                )));
            }
            let same_result = discriminant(&analysis.final_return) == discriminant(&first.final_return)
                && analysis.live_out.as_ref().map(|l| l.keyword) == first.live_out.as_ref().map(|l| l.keyword);
            let same_identity = match (&analysis.final_return, &first.final_return) {
                (
                    FinalReturn::Identifier { declared_inside: a, .. },
                    FinalReturn::Identifier { declared_inside: b, .. },
                ) => a == b,
                _ => true,
            };
            if !same_result || !same_identity {
                return Err(self.fail("instances hand their results back differently"));
            }
        }
        if instances.iter().any(|(_, a)| a.uses_this) {
            return Err(self.fail("duplicated code depends on `this`"));
        }
        Ok(())
    }
}

/// Range text with comments dropped, whitespace collapsed and every variable
/// replaced by its position among the range's outer or local bindings.
fn canonical_text(tree: &SyntaxTree, range: &StatementRange, analysis: &BlockAnalysis) -> String {
    let mut cuts: Vec<(std::ops::Range<usize>, String)> = analysis
        .param_uses
        .iter()
        .map(|(id, i)| (tree.node(*id).span.clone(), format!("$p{}", i)))
        .chain(
            analysis
                .local_uses
                .iter()
                .map(|(id, i)| (tree.node(*id).span.clone(), format!("$l{}", i))),
        )
        .collect();
    cuts.extend(
        range
            .comments(tree)
            .into_iter()
            .map(|id| (tree.node(id).span.clone(), " ".to_string())),
    );
    cuts.sort_by_key(|(span, _)| span.start);

    let source = tree.source();
    let span = range.span(tree);
    let mut out = String::with_capacity(span.len());
    let mut cursor = span.start;
    for (cut, replacement) in cuts {
        if cut.start < cursor {
            continue;
        }
        out.push_str(&source[cursor..cut.start]);
        out.push_str(&replacement);
        cursor = cut.end;
    }
    out.push_str(&source[cursor..span.end]);
    collapse_whitespace(&out)
}

impl Transformer for DuplicationTransformer {
    type Request = DuplicationRequest;

    fn name(&self) -> &'static str {
        "remove_duplication"
    }

    fn rewrite(&self, source: &str, file: &Path, request: &DuplicationRequest) -> Result<(String, Vec<Change>)> {
        if request.instances.len() < 2 {
            return Err(self.fail(format!(
                "duplication removal needs at least two instances, got {}",
                request.instances.len()
            )));
        }
        let tree = parse_source(source, file)?;
        let scopes = ScopeTable::build(&tree);

        let mut instances = Vec::with_capacity(request.instances.len());
        for location in &request.instances {
            let range = locate_range(&tree, location, self.name())?;
            let analysis = analyze_range(&tree, &scopes, &range, self.name())?;
            instances.push((range, analysis));
        }
        for (i, (a, _)) in instances.iter().enumerate() {
            let a_span = a.span(&tree);
            if instances[i + 1..].iter().any(|(b, _)| {
                let b_span = b.span(&tree);
                a_span.start < b_span.end && b_span.start < a_span.end
            }) {
                return Err(self.fail("duplicate instances overlap"));
            }
        }
        self.check_compatible(&tree, &instances)?;

        let (first_range, first) = &instances[0];
        let base = match &request.shared_name {
            Some(name) => name.clone(),
            None => self.naming.method_name(first_range.text(&tree), None),
        };
        if !is_valid_identifier(&base) || is_reserved(&base) {
            return Err(RefactronError::reserved_name(
                base.clone(),
                format!("'{}' is not a usable function name", base),
            ));
        }
        let name = unique_name(&base, &scopes.all_names());

        let unit = detect_indent_unit(source);
        let first_indent = line_indent(source, tree.node(first_range.first()).span.start);
        let body = reindent(first_range.text(&tree), first_indent, &unit);
        let function = function_text(&name, &first.param_names, &body, first, Placement::TopLevel, "", &unit);

        // The shared function follows the last top-level statement holding an instance.
        let anchor = instances
            .iter()
            .filter_map(|(range, _)| tree.top_level_statement(range.first()))
            .max()
            .ok_or_else(|| self.fail("duplicate instances lie outside the program"))?;
        let anchor_range = instances.iter().position(|(range, _)| range.contains(&tree, anchor));

        let mut editor = TreeEditor::new(&tree);
        let mut changes = Vec::with_capacity(instances.len() + 1);
        for (i, (range, analysis)) in instances.iter().enumerate() {
            let indent = line_indent(source, tree.node(range.first()).span.start);
            let call = call_site(analysis, &name, &analysis.param_names, indent);
            let replacement = if anchor_range == Some(i) {
                format!("{}\n\n{}", call, function)
            } else {
                call.clone()
            };
            editor.replace_range(range.first(), range.last(), replacement)?;
            changes.push(Change::modify(range.location(&tree), range.text(&tree), call));
        }
        if anchor_range.is_none() {
            editor.insert_after(anchor, format!("\n\n{}", function))?;
        }
        let end = tree.node(anchor).end;
        changes.push(Change::add(Location::new(file, end, end), function));

        log::debug!(
            "Replaced {} duplicate instances with calls to '{}'",
            instances.len(),
            name
        );
        Ok((editor.render(), changes))
    }
}
