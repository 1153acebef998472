use super::analysis::{analyze_range, call_site, function_text, locate_range, unique_name, BlockAnalysis, Placement, StatementRange};
use super::{Change, Transformer};
use crate::ast::text::{detect_indent_unit, is_reserved, is_valid_identifier, line_indent, reindent};
use crate::ast::{parse_source, NodeId, NodeKind, ScopeTable, SyntaxTree, TreeEditor};
use crate::collaborator::NamingService;
use crate::core::Location;
use crate::errors::{RefactronError, Result};
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractMethodRequest {
    /// Lines of the statements to extract.
    pub target: Location,
    /// Name for the new function; asked from the naming service when absent.
    pub method_name: Option<String>,
}

/// Moves a run of statements into a new function and calls it in place.
///
/// The function is declared after the enclosing top-level statement, or as a
/// sibling method when the statements use `this`.
#[derive(Debug, Clone, Default)]
pub struct ExtractMethodTransformer {
    naming: NamingService,
}

struct Target {
    placement: Placement,
    /// Node the new function is inserted after; `None` places it right after
    /// the call site.
    anchor: Option<NodeId>,
    indent: String,
    class: Option<NodeId>,
}

impl ExtractMethodTransformer {
    pub fn new(naming: NamingService) -> Self {
        Self { naming }
    }

    fn target(&self, tree: &SyntaxTree, range: &StatementRange, analysis: &BlockAnalysis) -> Result<Target> {
        if analysis.uses_this {
            let receiver = tree.ancestors(range.first()).find(|a| match tree.kind(*a) {
                NodeKind::Function { is_arrow, .. } => !is_arrow,
                NodeKind::Method { .. } => true,
                _ => false,
            });
            let method = receiver
                .filter(|m| matches!(tree.kind(*m), NodeKind::Method { .. }))
                .filter(|m| {
                    tree.parent(*m)
                        .map(|p| matches!(tree.kind(p), NodeKind::ClassBody))
                        .unwrap_or(false)
                })
                .ok_or_else(|| {
                    RefactronError::transformation(self.name(), "block uses `this` outside a class method")
                })?;
            let is_static = tree.text(method).trim_start().starts_with("static");
            return Ok(Target {
                placement: Placement::Method { is_static },
                anchor: Some(method),
                indent: line_indent(tree.source(), tree.node(method).span.start).to_string(),
                class: tree.enclosing_class(method),
            });
        }

        let anchor = if range.list == tree.root() {
            None
        } else {
            tree.top_level_statement(range.first())
        };
        Ok(Target {
            placement: Placement::TopLevel,
            anchor,
            indent: String::new(),
            class: None,
        })
    }
}

impl Transformer for ExtractMethodTransformer {
    type Request = ExtractMethodRequest;

    fn name(&self) -> &'static str {
        "extract_method"
    }

    fn rewrite(&self, source: &str, file: &Path, request: &ExtractMethodRequest) -> Result<(String, Vec<Change>)> {
        let tree = parse_source(source, file)?;
        let scopes = ScopeTable::build(&tree);
        let range = locate_range(&tree, &request.target, self.name())?;
        let analysis = analyze_range(&tree, &scopes, &range, self.name())?;
        let target = self.target(&tree, &range, &analysis)?;
        let unit = detect_indent_unit(source);
        let block = range.text(&tree);

        let base = match &request.method_name {
            Some(name) => name.clone(),
            None => {
                let context = tree.enclosing_function(range.first()).map(|f| tree.function_name(f));
                self.naming.method_name(block, context.as_deref())
            }
        };
        if !is_valid_identifier(&base) || is_reserved(&base) {
            return Err(RefactronError::reserved_name(
                base.clone(),
                format!("'{}' is not a usable function name", base),
            ));
        }
        let mut taken = scopes.all_names();
        if let Some(class_scope) = target.class.and_then(|c| scopes.scope_of_node(c)) {
            taken.extend(
                scopes
                    .members()
                    .iter()
                    .filter(|m| m.class_scope == class_scope)
                    .map(|m| m.name.as_str()),
            );
        }
        let name = unique_name(&base, &taken);

        let block_indent = line_indent(source, tree.node(range.first()).span.start).to_string();
        let body = reindent(block, &block_indent, &format!("{}{}", target.indent, unit));
        let function = function_text(
            &name,
            &analysis.param_names,
            &body,
            &analysis,
            target.placement,
            &target.indent,
            &unit,
        );
        let callee = match target.placement {
            Placement::Method { .. } => format!("this.{}", name),
            Placement::TopLevel => name.clone(),
        };
        let call = call_site(&analysis, &callee, &analysis.param_names, &block_indent);

        let mut editor = TreeEditor::new(&tree);
        let insertion = match target.anchor {
            Some(anchor) => {
                editor.replace_range(range.first(), range.last(), call.clone())?;
                editor.insert_after(anchor, format!("\n\n{}", function))?;
                tree.node(anchor).end
            }
            None => {
                editor.replace_range(range.first(), range.last(), format!("{}\n\n{}", call, function))?;
                tree.node(range.last()).end
            }
        };

        log::debug!(
            "Extracting {} statement(s) into '{}' with {} parameter(s)",
            range.statements.len(),
            name,
            analysis.param_names.len()
        );
        let changes = vec![
            Change::modify(range.location(&tree), block, call),
            Change::add(Location::new(file, insertion, insertion), function),
        ];
        Ok((editor.render(), changes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transformers::ChangeKind;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn extract(source: &str, first: usize, last: usize, name: &str) -> super::super::TransformResult {
        ExtractMethodTransformer::default().transform(
            source,
            Path::new("t.js"),
            &ExtractMethodRequest {
                target: Location::lines("t.js", first, last),
                method_name: Some(name.to_string()),
            },
        )
    }

    #[test]
    fn test_extracts_statements_into_function() {
        let source = indoc! {"
            function report(order) {
              const subtotal = order.price * order.qty;
              const tax = subtotal * 0.2;
              console.log(subtotal, tax);
              send(order);
            }
        "};
        let result = extract(source, 2, 4, "logTotals");
        assert!(result.success, "{:?}", result.error);
        assert_eq!(
            result.code,
            indoc! {"
                function report(order) {
                  logTotals(order);
                  send(order);
                }

                function logTotals(order) {
                  const subtotal = order.price * order.qty;
                  const tax = subtotal * 0.2;
                  console.log(subtotal, tax);
                }
            "}
        );
        let kinds: Vec<_> = result.changes.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![ChangeKind::Modify, ChangeKind::Add]);
    }

    #[test]
    fn test_variables_inside_bare_block_become_params() {
        let source = "function f(a) {\n  go();\n  { use(a); }\n  done();\n}\n";
        let result = extract(source, 2, 4, "helper");
        assert!(result.success, "{:?}", result.error);
        assert_eq!(
            result.code,
            indoc! {"
                function f(a) {
                  helper(a);
                }

                function helper(a) {
                  go();
                  { use(a); }
                  done();
                }
            "}
        );
    }

    #[test]
    fn test_final_return_of_declared_value() {
        let source = indoc! {"
            function price(item) {
              const base = item.cost * 2;
              const total = base + item.fee;
              return total;
            }
        "};
        let result = extract(source, 2, 4, "computeTotal");
        assert!(result.success, "{:?}", result.error);
        assert_eq!(
            result.code,
            indoc! {"
                function price(item) {
                  const total = computeTotal(item);
                  return total;
                }

                function computeTotal(item) {
                  const base = item.cost * 2;
                  const total = base + item.fee;
                  return total;
                }
            "}
        );
    }

    #[test]
    fn test_this_usage_extracts_async_method() {
        let source = indoc! {"
            class Repo {
              async save(item) {
                const row = await this.db.insert(item);
                this.cache.set(row.id, row);
                return true;
              }
            }
        "};
        let result = extract(source, 3, 4, "storeRow");
        assert!(result.success, "{:?}", result.error);
        assert_eq!(
            result.code,
            indoc! {"
                class Repo {
                  async save(item) {
                    await this.storeRow(item);
                    return true;
                  }

                  async storeRow(item) {
                    const row = await this.db.insert(item);
                    this.cache.set(row.id, row);
                  }
                }
            "}
        );
    }

    #[test]
    fn test_reassigned_outer_variable_is_returned() {
        let source = indoc! {"
            function count(items) {
              let total = 0;
              for (const item of items) {
                total += item.size;
              }
              return total;
            }
        "};
        let result = extract(source, 3, 5, "sumSizes");
        assert!(result.success, "{:?}", result.error);
        assert!(result.code.contains("  total = sumSizes(items, total);\n"));
        assert!(result.code.contains("function sumSizes(items, total) {\n"));
        assert!(result.code.contains("  return total;\n}\n"));
    }

    #[test]
    fn test_name_collision_gets_suffix() {
        let source = "function logTotals() {}\nfunction f(a) {\n  use(a);\n  use(a + 1);\n}\n";
        let result = extract(source, 3, 4, "logTotals");
        assert!(result.success, "{:?}", result.error);
        assert!(result.code.contains("logTotals2(a);"));
    }

    #[test]
    fn test_failure_returns_original() {
        let source = "function f(a) {\n  if (a) { return 1; }\n  go();\n  return 2;\n}\n";
        let result = extract(source, 2, 3, "helper");
        assert!(!result.success);
        assert_eq!(result.code, source);
        assert!(result.changes.is_empty());
    }

    #[test]
    fn test_program_level_statements() {
        let source = "const a = load();\nprint(a);\nprint(a * 2);\n";
        let result = extract(source, 2, 3, "printBoth");
        assert!(result.success, "{:?}", result.error);
        assert_eq!(
            result.code,
            "const a = load();\nprintBoth();\n\nfunction printBoth() {\n  print(a);\n  print(a * 2);\n}\n"
        );
    }
}
