//! Dotted and bracketed element paths, e.g. `reaction[0].manifestation[1]`.

use crate::{FhirError, FhirResult};

/// One `.`-separated step of an element path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step<'a> {
    pub name: &'a str,
    pub index: Option<usize>,
}

/// Parses `path` into steps. Every index must be numeric.
pub fn parse(path: &str) -> FhirResult<Vec<Step<'_>>> {
    if path.is_empty() {
        return Err(FhirError::InvalidPath(path.to_string()));
    }
    path.split('.')
        .map(|segment| parse_step(segment).ok_or_else(|| FhirError::InvalidPath(path.to_string())))
        .collect()
}

fn parse_step(segment: &str) -> Option<Step<'_>> {
    match segment.split_once('[') {
        None if !segment.is_empty() && !segment.contains(']') => Some(Step {
            name: segment,
            index: None,
        }),
        None => None,
        Some((name, rest)) => {
            let index = rest.strip_suffix(']')?;
            if name.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            Some(Step {
                name,
                index: Some(index.parse().ok()?),
            })
        }
    }
}

/// Splits a trailing `[index]` off `path`, returning the remaining path and the raw index.
///
/// The index is returned unparsed so that callers can decide how to treat garbage.
pub fn split_trailing_index(path: &str) -> Option<(&str, &str)> {
    let open = path.rfind('[')?;
    let index = path[open + 1..].strip_suffix(']')?;
    if index.contains('[') || index.contains('.') {
        return None;
    }
    Some((&path[..open], index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_and_indexed_steps() {
        let steps = parse("reaction[2].manifestation").expect("valid path");
        assert_eq!(
            steps,
            vec![
                Step {
                    name: "reaction",
                    index: Some(2)
                },
                Step {
                    name: "manifestation",
                    index: None
                },
            ]
        );
    }

    #[test]
    fn rejects_malformed_paths() {
        for path in ["", "a..b", "a[x]", "[0]", "a[0", "a]"] {
            assert!(
                matches!(parse(path), Err(FhirError::InvalidPath(_))),
                "{path} should be rejected"
            );
        }
    }

    #[test]
    fn splits_trailing_index() {
        assert_eq!(
            split_trailing_index("reaction[1].manifestation[0]"),
            Some(("reaction[1].manifestation", "0"))
        );
        assert_eq!(split_trailing_index("reaction[x]"), Some(("reaction", "x")));
        assert_eq!(split_trailing_index("reaction[1].substance"), None);
        assert_eq!(split_trailing_index("criticality"), None);
    }
}
