//! Dotted-integer version comparison.

use std::cmp::Ordering;

/// Compare `a` and `b` component-wise as integers.
///
/// Missing trailing components count as 0, so `1.2` equals `1.2.0`.
/// A component that is not an integer also counts as 0.
pub fn compare_version(a: &str, b: &str) -> Ordering {
    let left: Vec<u64> = components(a);
    let right: Vec<u64> = components(b);
    let len = left.len().max(right.len());

    for i in 0..len {
        let l = left.get(i).copied().unwrap_or(0);
        let r = right.get(i).copied().unwrap_or(0);
        match l.cmp(&r) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

fn components(version: &str) -> Vec<u64> {
    version
        .split('.')
        .map(|part| part.trim().parse().unwrap_or(0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparisons() {
        assert_eq!(compare_version("1.2.3", "1.2.2"), Ordering::Greater);
        assert_eq!(compare_version("1.2.2", "1.2.3"), Ordering::Less);
        assert_eq!(compare_version("1.2.3", "1.2.3"), Ordering::Equal);
        assert_eq!(compare_version("1.2", "1.2.3"), Ordering::Less);
        assert_eq!(compare_version("1.2.3", "1.2"), Ordering::Greater);
    }

    #[test]
    fn numeric_not_lexical() {
        assert_eq!(compare_version("0.23.10", "0.23.9"), Ordering::Greater);
        assert_eq!(compare_version("1.2.0", "1.2"), Ordering::Equal);
    }
}
