//! Bottom-up rewriting of term DAGs.
//!
//! Every rewrite here visits each distinct node once and never recurses on
//! the call stack, so terms produced from long straight-line routines are
//! safe to transform.

use std::collections::{HashMap, HashSet};

use crate::term::{Op, Term, TermId};

/// Rebuild `root` bottom-up, visiting every distinct node exactly once.
///
/// `descend` decides whether a node's children are traversed; `visit`
/// receives the original node and its (rewritten, if descended) children
/// and returns the replacement. Results are memoized by node identity, so
/// shared subterms stay shared in the output.
pub fn rebuild<D, V>(root: &Term, descend: D, visit: V) -> Term
where
    D: FnMut(&Term) -> bool,
    V: FnMut(&Term, Vec<Term>) -> Term,
{
    rebuild_all(std::slice::from_ref(root), descend, visit)
        .pop()
        .unwrap_or_else(|| root.clone())
}

/// [`rebuild`] over several roots with one memo table, so nodes shared
/// between roots are visited once.
pub fn rebuild_all<D, V>(roots: &[Term], mut descend: D, mut visit: V) -> Vec<Term>
where
    D: FnMut(&Term) -> bool,
    V: FnMut(&Term, Vec<Term>) -> Term,
{
    let mut memo: HashMap<TermId, Term> = HashMap::new();

    for root in roots {
        let mut stack: Vec<(Term, bool)> = vec![(root.clone(), false)];
        while let Some((node, expanded)) = stack.pop() {
            if memo.contains_key(&node.id()) {
                continue;
            }
            if expanded {
                let children = node
                    .children()
                    .iter()
                    .map(|c| memo.get(&c.id()).cloned().unwrap_or_else(|| c.clone()))
                    .collect();
                let out = visit(&node, children);
                memo.insert(node.id(), out);
                continue;
            }
            if node.children().is_empty() || !descend(&node) {
                let out = visit(&node, node.children().to_vec());
                memo.insert(node.id(), out);
                continue;
            }
            stack.push((node.clone(), true));
            for child in node.children().iter().rev() {
                if !memo.contains_key(&child.id()) {
                    stack.push((child.clone(), false));
                }
            }
        }
    }

    roots
        .iter()
        .map(|r| memo.get(&r.id()).cloned().unwrap_or_else(|| r.clone()))
        .collect()
}

/// Replace free variables by name.
///
/// Variables bound by an enclosing `Forall` are left alone. A binder whose
/// name occurs free in a replacement is renamed first, so the replacement's
/// variables are never captured.
pub fn substitute(term: &Term, map: &HashMap<String, Term>) -> Term {
    if map.is_empty() {
        return term.clone();
    }
    let incoming: HashSet<String> = map.values().flat_map(free_vars).collect();
    rebuild(
        term,
        |n| !shadows(n, map, &incoming),
        |n, children| {
            if let Some(name) = n.name()
                && let Some(replacement) = map.get(name)
            {
                return replacement.clone();
            }
            if shadows(n, map, &incoming) {
                return substitute_under_binder(n, map, &incoming);
            }
            n.with_children(children)
        },
    )
}

/// Whether `node` is a binder that hides a key of `map` or would capture a
/// variable of one of its replacements.
fn shadows(node: &Term, map: &HashMap<String, Term>, incoming: &HashSet<String>) -> bool {
    *node.op() == Op::Forall
        && node
            .bound_names()
            .iter()
            .any(|b| map.contains_key(*b) || incoming.contains(*b))
}

fn substitute_under_binder(
    node: &Term,
    map: &HashMap<String, Term>,
    incoming: &HashSet<String>,
) -> Term {
    let mut children = node.children().to_vec();
    let Some(body) = children.pop() else {
        return node.clone();
    };
    let mut inner: HashMap<String, Term> = map
        .iter()
        .filter(|(k, _)| !node.bound_names().contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let mut taken = all_names(&body);
    taken.extend(incoming.iter().cloned());
    taken.extend(map.keys().cloned());
    for var in children.iter_mut() {
        let Some(name) = var.name().map(str::to_string) else {
            continue;
        };
        if !incoming.contains(&name) {
            continue;
        }
        let fresh = (0u64..)
            .map(|k| format!("{name}$$q{k}"))
            .find(|candidate| !taken.contains(candidate))
            .unwrap_or_else(|| format!("{name}$$q"));
        taken.insert(fresh.clone());
        let renamed = Term::var(fresh, var.sort());
        inner.insert(name, renamed.clone());
        *var = renamed;
    }

    children.push(substitute(&body, &inner));
    node.with_children(children)
}

/// Every variable name occurring in a term, bound or free.
fn all_names(term: &Term) -> HashSet<String> {
    let mut names = HashSet::new();
    let mut visited = HashSet::new();
    let mut stack = vec![term.clone()];
    while let Some(node) = stack.pop() {
        if !visited.insert(node.id()) {
            continue;
        }
        if let Some(name) = node.name() {
            names.insert(name.to_string());
        }
        stack.extend(node.children().iter().cloned());
    }
    names
}

/// Free variable names of a term, in first-occurrence order.
pub fn free_vars(term: &Term) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    let mut visited = HashSet::new();
    let mut stack: Vec<(Term, Vec<String>)> = vec![(term.clone(), Vec::new())];
    while let Some((node, bound)) = stack.pop() {
        if bound.is_empty() && !visited.insert(node.id()) {
            continue;
        }
        if let Some(name) = node.name() {
            if !bound.iter().any(|b| b == name) && seen.insert(name.to_string()) {
                out.push(name.to_string());
            }
            continue;
        }
        let mut inner = bound.clone();
        if *node.op() == Op::Forall {
            inner.extend(node.bound_names().into_iter().map(str::to_string));
            if let Some(body) = node.children().last() {
                stack.push((body.clone(), inner));
            }
            continue;
        }
        for child in node.children().iter().rev() {
            stack.push((child.clone(), inner.clone()));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sort::Sort;

    fn add(a: &Term, b: &Term) -> Term {
        Term::new(Op::Add, Sort::Int, vec![a.clone(), b.clone()], None)
    }

    #[test]
    fn substitute_replaces_free_variable() {
        let x = Term::var("x", Sort::Int);
        let t = add(&x, &Term::int(1));
        let map = HashMap::from([("x".to_string(), Term::int(41))]);
        assert_eq!(substitute(&t, &map).to_string(), "(+ 41 1)");
    }

    #[test]
    fn substitute_keeps_sharing() {
        let x = Term::var("x", Sort::Int);
        let shared = add(&x, &x);
        let t = add(&shared, &shared);
        let map = HashMap::from([("x".to_string(), Term::var("y", Sort::Int))]);
        let out = substitute(&t, &map);
        assert!(Term::ptr_eq(&out.children()[0], &out.children()[1]));
    }

    #[test]
    fn substitute_respects_binders() {
        let x = Term::var("x", Sort::Int);
        let body = Term::new(Op::Lt, Sort::Formula, vec![x.clone(), Term::int(0)], None);
        let q = Term::new(Op::Forall, Sort::Formula, vec![x.clone(), body], None);
        let t = Term::new(
            Op::And,
            Sort::Formula,
            vec![q, Term::new(Op::Eq, Sort::Formula, vec![x, Term::int(2)], None)],
            None,
        );
        let map = HashMap::from([("x".to_string(), Term::int(7))]);
        assert_eq!(
            substitute(&t, &map).to_string(),
            "(AND (FORALL (x) (< x 0)) (EQ 7 2))"
        );
    }

    #[test]
    fn substitute_renames_capturing_binder() {
        // (FORALL (i) (EQ x i)) with x := i must not bind the incoming i.
        let (x, i) = (Term::var("x", Sort::Int), Term::var("i", Sort::Int));
        let body = Term::new(Op::Eq, Sort::Formula, vec![x, i.clone()], None);
        let q = Term::new(Op::Forall, Sort::Formula, vec![i.clone(), body], None);
        let map = HashMap::from([("x".to_string(), i)]);
        let out = substitute(&q, &map);
        assert_eq!(out.to_string(), "(FORALL (i$$q0) (EQ i i$$q0))");
        assert_eq!(free_vars(&out), vec!["i".to_string()]);
    }

    #[test]
    fn renamed_binder_avoids_names_in_the_body() {
        let (x, i) = (Term::var("x", Sort::Int), Term::var("i", Sort::Int));
        let taken = Term::var("i$$q0", Sort::Int);
        let body = Term::new(
            Op::And,
            Sort::Formula,
            vec![
                Term::new(Op::Eq, Sort::Formula, vec![x, i.clone()], None),
                Term::new(Op::Lt, Sort::Formula, vec![taken, Term::int(0)], None),
            ],
            None,
        );
        let q = Term::new(Op::Forall, Sort::Formula, vec![i.clone(), body], None);
        let out = substitute(&q, &HashMap::from([("x".to_string(), i)]));
        assert_eq!(
            out.to_string(),
            "(FORALL (i$$q1) (AND (EQ i i$$q1) (< i$$q0 0)))"
        );
    }

    #[test]
    fn untouched_term_is_returned_as_is() {
        let t = add(&Term::var("y", Sort::Int), &Term::int(1));
        let map = HashMap::from([("x".to_string(), Term::int(0))]);
        assert!(Term::ptr_eq(&substitute(&t, &map), &t));
    }

    #[test]
    fn free_vars_skip_bound() {
        let x = Term::var("x", Sort::Int);
        let y = Term::var("y", Sort::Int);
        let body = Term::new(Op::Lt, Sort::Formula, vec![x.clone(), y.clone()], None);
        let q = Term::new(Op::Forall, Sort::Formula, vec![x, body], None);
        assert_eq!(free_vars(&q), vec!["y".to_string()]);
    }

    #[test]
    fn rebuild_visits_shared_node_once() {
        let x = Term::var("x", Sort::Int);
        let shared = add(&x, &Term::int(1));
        let t = add(&shared, &shared);
        let mut visits = 0;
        rebuild(
            &t,
            |_| true,
            |n, children| {
                if *n.op() == Op::Add && Term::ptr_eq(n, &shared) {
                    visits += 1;
                }
                n.with_children(children)
            },
        );
        assert_eq!(visits, 1);
    }
}
