//! Ordering of suggestions into a run plan.
//!
//! Dependencies come from pairwise rules between refactoring types, gated on
//! the two suggestions touching overlapping code (their before-code shares a
//! non-keyword identifier). The order is a topological sort of the
//! dependency graph that breaks ties by priority.

use crate::ast::text::is_reserved;
use crate::suggestions::{RefactoringSuggestion, RefactoringType};
use once_cell::sync::Lazy;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use regex::Regex;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet};

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z_$][A-Za-z0-9_$]*").expect("valid identifier regex"));

/// `refactoring_id` must run after every id in `depends_on`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dependency {
    pub refactoring_id: String,
    pub depends_on: Vec<String>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanWarning {
    /// The dependencies form a cycle; the plan uses priority order instead.
    DependencyCycle { involved: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefactoringPlan {
    pub ordered: Vec<RefactoringSuggestion>,
    pub dependencies: Vec<Dependency>,
    pub estimated_minutes: u32,
    pub warnings: Vec<PlanWarning>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RefactoringPlanner;

/// Why `later` has to wait for `earlier`, if it does.
fn rule(later: RefactoringType, earlier: RefactoringType) -> Option<&'static str> {
    use RefactoringType::*;
    match (later, earlier) {
        (ExtractMethod | RemoveDuplication | SplitClass, Rename) => {
            Some("renames run before structural changes to the same code")
        }
        (RemoveDuplication, ExtractMethod) => Some("extraction runs before duplication removal"),
        (ExtractMethod, SimplifyConditional) => {
            Some("conditionals are simplified before the code around them is extracted")
        }
        (SplitClass | IntroduceInterface, ExtractMethod | RemoveDuplication | SimplifyConditional) => {
            Some("method-level rewrites run before class-level redesign")
        }
        (IntroduceInterface, Rename) => Some("method-level rewrites run before class-level redesign"),
        _ => None,
    }
}

fn identifiers(code: &str) -> HashSet<&str> {
    IDENTIFIER
        .find_iter(code)
        .map(|m| m.as_str())
        .filter(|name| !is_reserved(name))
        .collect()
}

/// Priority descending, then risk ascending, then effort ascending.
fn sort_key(suggestion: &RefactoringSuggestion) -> (Reverse<i32>, i32, i32) {
    (
        Reverse(suggestion.priority),
        suggestion.risk_level.weight(),
        suggestion.estimated_effort.weight(),
    )
}

impl RefactoringPlanner {
    pub fn new() -> Self {
        Self
    }

    /// Dependencies between suggestions that touch overlapping code.
    pub fn identify_dependencies(&self, suggestions: &[RefactoringSuggestion]) -> Vec<Dependency> {
        let names: Vec<HashSet<&str>> = suggestions.iter().map(|s| identifiers(&s.before_code)).collect();
        let mut dependencies = Vec::new();

        for (a, later) in suggestions.iter().enumerate() {
            let mut depends_on = Vec::new();
            let mut reasons = BTreeSet::new();
            for (b, earlier) in suggestions.iter().enumerate() {
                if a == b || later.id == earlier.id {
                    continue;
                }
                let Some(reason) = rule(later.refactoring_type(), earlier.refactoring_type()) else {
                    continue;
                };
                if names[a].is_disjoint(&names[b]) {
                    continue;
                }
                depends_on.push(earlier.id.clone());
                reasons.insert(reason);
            }
            if !depends_on.is_empty() {
                dependencies.push(Dependency {
                    refactoring_id: later.id.clone(),
                    depends_on,
                    reason: reasons.into_iter().collect::<Vec<_>>().join("; "),
                });
            }
        }
        dependencies
    }

    /// Topological order over `dependencies`, ties broken by priority. On a
    /// cycle the priority order is returned with a warning.
    pub fn order_refactorings(
        &self,
        suggestions: &[RefactoringSuggestion],
        dependencies: &[Dependency],
    ) -> (Vec<RefactoringSuggestion>, Option<PlanWarning>) {
        let mut sorted: Vec<RefactoringSuggestion> = suggestions.to_vec();
        sorted.sort_by_key(sort_key);

        let mut graph: DiGraph<usize, ()> = DiGraph::new();
        let nodes: Vec<NodeIndex> = (0..sorted.len()).map(|rank| graph.add_node(rank)).collect();
        let by_id: HashMap<&str, NodeIndex> = sorted
            .iter()
            .zip(&nodes)
            .map(|(s, node)| (s.id.as_str(), *node))
            .collect();
        for dependency in dependencies {
            let Some(&later) = by_id.get(dependency.refactoring_id.as_str()) else {
                continue;
            };
            for id in &dependency.depends_on {
                match by_id.get(id.as_str()) {
                    Some(&earlier) if earlier != later => {
                        graph.update_edge(earlier, later, ());
                    }
                    Some(_) => {}
                    None => log::debug!("Ignoring dependency on '{}' outside this batch", id),
                }
            }
        }

        let mut in_degree: Vec<usize> = nodes
            .iter()
            .map(|n| graph.neighbors_directed(*n, Direction::Incoming).count())
            .collect();
        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree == 0)
            .map(|(rank, _)| Reverse(rank))
            .collect();
        let mut order = Vec::with_capacity(sorted.len());
        while let Some(Reverse(rank)) = ready.pop() {
            order.push(rank);
            for next in graph.neighbors_directed(nodes[rank], Direction::Outgoing) {
                let next_rank = graph[next];
                in_degree[next_rank] -= 1;
                if in_degree[next_rank] == 0 {
                    ready.push(Reverse(next_rank));
                }
            }
        }

        if order.len() < sorted.len() {
            let emitted: HashSet<usize> = order.iter().copied().collect();
            let involved: Vec<String> = (0..sorted.len())
                .filter(|rank| !emitted.contains(rank))
                .map(|rank| sorted[rank].id.clone())
                .collect();
            log::warn!(
                "Dependency cycle among {} refactoring(s) ({}); falling back to priority order",
                involved.len(),
                involved.join(", ")
            );
            return (sorted, Some(PlanWarning::DependencyCycle { involved }));
        }

        let mut slots: Vec<Option<RefactoringSuggestion>> = sorted.into_iter().map(Some).collect();
        let ordered = order.into_iter().filter_map(|rank| slots[rank].take()).collect();
        (ordered, None)
    }

    pub fn estimate_minutes(&self, suggestions: &[RefactoringSuggestion]) -> u32 {
        suggestions
            .iter()
            .map(|s| s.estimated_effort.minutes())
            .sum()
    }

    pub fn plan(&self, suggestions: &[RefactoringSuggestion]) -> RefactoringPlan {
        let dependencies = self.identify_dependencies(suggestions);
        let (ordered, warning) = self.order_refactorings(suggestions, &dependencies);
        let estimated_minutes = self.estimate_minutes(&ordered);
        log::info!(
            "Planned {} refactoring(s) with {} dependency record(s), about {} minutes",
            ordered.len(),
            dependencies.len(),
            estimated_minutes
        );
        RefactoringPlan {
            ordered,
            dependencies,
            estimated_minutes,
            warnings: warning.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Effort, IdentifierKind, Location, RiskLevel, Scope};
    use crate::suggestions::SuggestionKind;
    use crate::transformers::SimplificationStrategy;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn kind_for(refactoring: RefactoringType) -> SuggestionKind {
        match refactoring {
            RefactoringType::ExtractMethod => SuggestionKind::ExtractMethod {
                method_name: "helper".into(),
                parameters: vec![],
                return_type: "void".into(),
            },
            RefactoringType::RemoveDuplication => SuggestionKind::RemoveDuplication {
                shared_method_name: "shared".into(),
                instances: vec![],
                similarity: 0.9,
            },
            RefactoringType::SimplifyConditional => SuggestionKind::SimplifyConditional {
                strategy: SimplificationStrategy::ExtractVariable,
                variable_name: None,
            },
            RefactoringType::Rename => SuggestionKind::Rename {
                old_name: "a".into(),
                new_name: "b".into(),
                identifier_kind: IdentifierKind::Variable,
                scope: Scope::module(),
            },
            RefactoringType::SplitClass | RefactoringType::IntroduceInterface => {
                let advice = crate::collaborator::HeuristicNamer.solid_advice(
                    "Widget",
                    crate::smells::SolidPrinciple::SingleResponsibility,
                );
                if refactoring == RefactoringType::SplitClass {
                    SuggestionKind::SplitClass {
                        class_name: "Widget".into(),
                        advice,
                    }
                } else {
                    SuggestionKind::IntroduceInterface {
                        class_name: "Widget".into(),
                        advice,
                    }
                }
            }
        }
    }

    fn suggestion(id: &str, refactoring: RefactoringType, priority: i32, before: &str) -> RefactoringSuggestion {
        RefactoringSuggestion {
            id: id.to_string(),
            title: id.to_string(),
            description: String::new(),
            before_code: before.to_string(),
            after_code: before.to_string(),
            diff: String::new(),
            benefits: vec![],
            risk_level: RiskLevel::Low,
            estimated_effort: Effort::Low,
            priority,
            location: Location::lines("a.js", 1, 1),
            kind: kind_for(refactoring),
        }
    }

    fn ids(suggestions: &[RefactoringSuggestion]) -> Vec<&str> {
        suggestions.iter().map(|s| s.id.as_str()).collect()
    }

    #[test]
    fn test_rename_runs_before_extract_on_shared_code() {
        let suggestions = vec![
            suggestion("extract", RefactoringType::ExtractMethod, 29, "total = price * qty;"),
            suggestion("rename", RefactoringType::Rename, 9, "let qty = 1;"),
        ];
        let planner = RefactoringPlanner::new();
        let dependencies = planner.identify_dependencies(&suggestions);
        assert_eq!(dependencies.len(), 1);
        assert_eq!(dependencies[0].refactoring_id, "extract");
        assert_eq!(dependencies[0].depends_on, vec!["rename".to_string()]);

        let plan = planner.plan(&suggestions);
        assert_eq!(ids(&plan.ordered), vec!["rename", "extract"]);
        assert!(plan.warnings.is_empty());
    }

    #[test]
    fn test_no_dependency_without_shared_identifier() {
        let suggestions = vec![
            suggestion("extract", RefactoringType::ExtractMethod, 29, "total = price * qty;"),
            suggestion("rename", RefactoringType::Rename, 9, "let d = 1;"),
        ];
        let planner = RefactoringPlanner::new();
        assert!(planner.identify_dependencies(&suggestions).is_empty());
        assert_eq!(ids(&planner.plan(&suggestions).ordered), vec!["extract", "rename"]);
    }

    #[test]
    fn test_keywords_do_not_count_as_shared() {
        let suggestions = vec![
            suggestion("extract", RefactoringType::ExtractMethod, 29, "const a = 1; return a;"),
            suggestion("rename", RefactoringType::Rename, 9, "const b = 2; return b;"),
        ];
        assert!(RefactoringPlanner::new().identify_dependencies(&suggestions).is_empty());
    }

    #[test]
    fn test_class_level_changes_run_last() {
        let suggestions = vec![
            suggestion("split", RefactoringType::SplitClass, 27, "class Cart { add(item) {} }"),
            suggestion("simplify", RefactoringType::SimplifyConditional, 19, "if (item) {}"),
            suggestion("dedupe", RefactoringType::RemoveDuplication, 28, "save(item)"),
            suggestion("extract", RefactoringType::ExtractMethod, 18, "log(item)"),
        ];
        let plan = RefactoringPlanner::new().plan(&suggestions);
        assert_eq!(ids(&plan.ordered), vec!["simplify", "extract", "dedupe", "split"]);
    }

    #[test]
    fn test_cycle_falls_back_to_priority_order() {
        let suggestions = vec![
            suggestion("a", RefactoringType::ExtractMethod, 10, "x"),
            suggestion("b", RefactoringType::ExtractMethod, 20, "x"),
            suggestion("c", RefactoringType::Rename, 15, "y"),
        ];
        let dependencies = vec![
            Dependency {
                refactoring_id: "a".into(),
                depends_on: vec!["b".into()],
                reason: "test".into(),
            },
            Dependency {
                refactoring_id: "b".into(),
                depends_on: vec!["a".into()],
                reason: "test".into(),
            },
        ];
        let (ordered, warning) = RefactoringPlanner::new().order_refactorings(&suggestions, &dependencies);
        assert_eq!(ids(&ordered), vec!["b", "c", "a"]);
        assert_eq!(
            warning,
            Some(PlanWarning::DependencyCycle {
                involved: vec!["b".into(), "a".into()]
            })
        );
    }

    #[test]
    fn test_ties_broken_by_risk_then_effort() {
        let mut risky = suggestion("risky", RefactoringType::Rename, 10, "p");
        risky.risk_level = RiskLevel::High;
        let mut slow = suggestion("slow", RefactoringType::Rename, 10, "q");
        slow.estimated_effort = Effort::High;
        let quick = suggestion("quick", RefactoringType::Rename, 10, "r");
        let plan = RefactoringPlanner::new().plan(&[risky, slow, quick]);
        assert_eq!(ids(&plan.ordered), vec!["quick", "slow", "risky"]);
        assert_eq!(plan.estimated_minutes, 5 + 30 + 5);
    }

    fn arb_type() -> impl Strategy<Value = RefactoringType> {
        prop_oneof![
            Just(RefactoringType::ExtractMethod),
            Just(RefactoringType::RemoveDuplication),
            Just(RefactoringType::SimplifyConditional),
            Just(RefactoringType::Rename),
            Just(RefactoringType::SplitClass),
            Just(RefactoringType::IntroduceInterface),
        ]
    }

    fn arb_suggestions() -> impl Strategy<Value = Vec<RefactoringSuggestion>> {
        prop::collection::vec(
            (arb_type(), 0i32..40, prop::sample::subsequence(vec!["alpha", "beta", "gamma", "delta"], 0..3)),
            0..12,
        )
        .prop_map(|items| {
            items
                .into_iter()
                .enumerate()
                .map(|(i, (refactoring, priority, names))| {
                    suggestion(&format!("s{}", i), refactoring, priority, &names.join(" + "))
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_dependencies_precede_dependents(suggestions in arb_suggestions()) {
            let plan = RefactoringPlanner::new().plan(&suggestions);
            prop_assert!(plan.warnings.is_empty());
            prop_assert_eq!(plan.ordered.len(), suggestions.len());
            let position: HashMap<&str, usize> = plan
                .ordered
                .iter()
                .enumerate()
                .map(|(i, s)| (s.id.as_str(), i))
                .collect();
            for dependency in &plan.dependencies {
                for earlier in &dependency.depends_on {
                    prop_assert!(position[earlier.as_str()] < position[dependency.refactoring_id.as_str()]);
                }
            }
        }

        #[test]
        fn prop_priority_order_without_dependencies(priorities in prop::collection::vec(0i32..40, 0..12)) {
            let suggestions: Vec<_> = priorities
                .iter()
                .enumerate()
                .map(|(i, p)| suggestion(&format!("s{}", i), RefactoringType::Rename, *p, &format!("v{}", i)))
                .collect();
            let plan = RefactoringPlanner::new().plan(&suggestions);
            prop_assert!(plan.dependencies.is_empty());
            for pair in plan.ordered.windows(2) {
                prop_assert!(pair[0].priority >= pair[1].priority);
            }
        }
    }
}
