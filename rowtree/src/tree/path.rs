use super::{unescape, Element, Node};
use crate::error::{Result, RowTreeError};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref STEP: Regex = Regex::new(r"^([\w.:*-]+)((?:\[[^\]]*\])*)$").unwrap();
    static ref PREDICATE: Regex = Regex::new(r"\[([^\]]*)\]").unwrap();
    static ref COMPARISON: Regex =
        Regex::new(r#"^\s*(@?[\w.:-]+)\s*=\s*(?:'([^']*)'|"([^"]*)")\s*$"#).unwrap();
}

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Predicate {
    Position(usize),
    Attribute(String, String),
    ChildText(String, String),
}

#[derive(Debug, Clone, PartialEq)]
pub(super) struct Step {
    /// `*` matches any element, `.` the context element itself
    name: String,
    predicates: Vec<Predicate>,
}

pub(super) fn parse_path(path: &str) -> Result<Vec<Step>> {
    let path = path.trim().trim_start_matches("./");
    if path.starts_with('/') {
        return Err(RowTreeError::Markup(format!(
            "path '{path}' must be relative to the root element"
        )));
    }
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|segment| {
            let caps = STEP.captures(segment).ok_or_else(|| {
                RowTreeError::Markup(format!("invalid path step '{segment}'"))
            })?;
            let predicates = PREDICATE
                .captures_iter(&caps[2])
                .map(|p| parse_predicate(&p[1]))
                .collect::<Result<Vec<_>>>()?;
            Ok(Step {
                name: caps[1].to_string(),
                predicates,
            })
        })
        .collect()
}

fn parse_predicate(body: &str) -> Result<Predicate> {
    if let Ok(n) = body.trim().parse::<usize>() {
        if n == 0 {
            return Err(RowTreeError::Markup("positions start at 1".into()));
        }
        return Ok(Predicate::Position(n));
    }
    let caps = COMPARISON
        .captures(body)
        .ok_or_else(|| RowTreeError::Markup(format!("unsupported predicate '[{body}]'")))?;
    let value = caps
        .get(2)
        .or_else(|| caps.get(3))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();
    Ok(match caps[1].strip_prefix('@') {
        Some(attr) => Predicate::Attribute(attr.to_string(), value),
        None => Predicate::ChildText(caps[1].to_string(), value),
    })
}

/// Child-index paths (from `root`) of every element the steps reach.
pub(super) fn locate(root: &Element, steps: &[Step]) -> Vec<Vec<usize>> {
    let mut current: Vec<(Vec<usize>, &Element)> = vec![(Vec::new(), root)];

    for step in steps {
        let mut next = Vec::new();
        for (indices, element) in current {
            if step.name == "." {
                if step.predicates.iter().all(|p| matches(element, p, 1)) {
                    next.push((indices, element));
                }
                continue;
            }

            let mut candidates: Vec<(usize, &Element)> = element
                .children
                .iter()
                .enumerate()
                .filter_map(|(i, n)| match n {
                    Node::Element(e) if step.name == "*" || e.name == step.name => Some((i, e)),
                    _ => None,
                })
                .collect();

            // Each predicate filters the survivors of the previous one
            for predicate in &step.predicates {
                candidates = candidates
                    .into_iter()
                    .enumerate()
                    .filter(|(pos, (_, e))| matches(e, predicate, pos + 1))
                    .map(|(_, c)| c)
                    .collect();
            }

            for (i, e) in candidates {
                let mut path = indices.clone();
                path.push(i);
                next.push((path, e));
            }
        }
        current = next;
    }

    current.into_iter().map(|(indices, _)| indices).collect()
}

fn matches(element: &Element, predicate: &Predicate, position: usize) -> bool {
    match predicate {
        Predicate::Position(n) => *n == position,
        Predicate::Attribute(name, value) => element.attr(name) == Some(value.as_str()),
        Predicate::ChildText(name, value) => element
            .elements()
            .filter(|c| c.name == *name)
            .any(|c| unescape(&c.text()) == *value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_path() {
        let steps = parse_path("records/*[@id='3'][1]").unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(
            steps[1].predicates,
            vec![
                Predicate::Attribute("id".into(), "3".into()),
                Predicate::Position(1)
            ]
        );
        assert!(parse_path("/records").is_err());
        assert!(parse_path("records[0]").is_err());
        assert!(parse_path("records[name>3]").is_err());
    }

    #[test]
    fn test_self_step() {
        let root = Element::new("a").with_attr("k", "v");
        let steps = parse_path(".[@k='v']").unwrap();
        assert_eq!(locate(&root, &steps), vec![Vec::<usize>::new()]);
    }
}
