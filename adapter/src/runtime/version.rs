//! Runtime version constraints
//!
//! Constraints look like `>=18`, `<3.12`, `==20.11.0` or a bare `18`
//! (which means `>=18`). Versions compare as dotted integers with missing
//! components treated as zero.

use std::cmp::Ordering;

/// Split a constraint into its operator and version text
fn split_operator(constraint: &str) -> (&str, &str) {
    for op in [">=", "<=", "==", ">", "<", "="] {
        if let Some(rest) = constraint.strip_prefix(op) {
            return (op, rest);
        }
    }
    (">=", constraint)
}

/// Parse a dotted version into its numeric components.
///
/// Only the leading digit run of each component counts, so `"1.0.0-beta"`
/// is `[1, 0, 0]`; a component with no leading digits is `0`.
pub fn parse_version_components(version: &str) -> Vec<u64> {
    version
        .split('.')
        .map(|part| {
            let digits = part
                .find(|c: char| !c.is_ascii_digit())
                .map_or(part, |end| &part[..end]);
            digits.parse().unwrap_or(0)
        })
        .collect()
}

/// Compare two component lists, padding the shorter one with zeros
pub fn compare_components(a: &[u64], b: &[u64]) -> Ordering {
    let len = a.len().max(b.len());
    (0..len)
        .map(|i| {
            let av = a.get(i).copied().unwrap_or(0);
            let bv = b.get(i).copied().unwrap_or(0);
            av.cmp(&bv)
        })
        .find(|ord| ord.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Does `actual` satisfy `constraint`?
///
/// An empty constraint is always satisfied. A malformed constraint (no
/// version after the operator, or a version that does not start with a
/// digit) never is.
pub fn satisfies(actual: &str, constraint: &str) -> bool {
    let constraint = constraint.trim();
    if constraint.is_empty() {
        return true;
    }

    let (op, required) = split_operator(constraint);
    let required = required.trim();
    if !required.starts_with(|c: char| c.is_ascii_digit()) {
        return false;
    }

    let ord = compare_components(
        &parse_version_components(actual.trim()),
        &parse_version_components(required),
    );

    match op {
        ">=" => ord.is_ge(),
        "<=" => ord.is_le(),
        ">" => ord.is_gt(),
        "<" => ord.is_lt(),
        _ => ord.is_eq(),
    }
}
