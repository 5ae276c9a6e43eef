//! Ordering of discovered image files.
//!
//! Two policies, both deterministic for a given file-system state and both
//! leaving the input untouched:
//!
//! * [`SortPolicy::Natural`] compares base names. When both names contain a
//!   digit run, the *first* run of each is compared as an integer; ties and
//!   names without digits fall back to a byte-wise comparison of the whole
//!   name. `img2.png` therefore lands before `img10.png`.
//! * [`SortPolicy::ModifiedDesc`] puts the most recently modified file first.
//!   A file whose metadata cannot be read is incomparable with everything and
//!   keeps its relative position.
//!
//! Neither comparator is a strict total order (mixing digit and non-digit
//! names breaks transitivity, and incomparable pairs are not an equivalence),
//! so ordering goes through a stable insertion sort that never reorders
//! pairs its comparator calls equal and stays well-defined on any input.

use crate::config::SortPolicy;
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

static RE_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+").unwrap());

/// Return `paths` ordered by `policy`. The input slice is not modified.
pub fn order(paths: &[PathBuf], policy: SortPolicy) -> Vec<PathBuf> {
    match policy {
        SortPolicy::Natural => {
            let mut keyed: Vec<(NaturalKey, PathBuf)> = paths
                .iter()
                .map(|p| (NaturalKey::new(base_name(p)), p.clone()))
                .collect();
            stable_insertion_sort(&mut keyed, |a, b| a.0.cmp_natural(&b.0));
            keyed.into_iter().map(|(_, p)| p).collect()
        }
        SortPolicy::ModifiedDesc => {
            let mut keyed: Vec<(Option<SystemTime>, PathBuf)> = paths
                .iter()
                .map(|p| (modified(p), p.clone()))
                .collect();
            stable_insertion_sort(&mut keyed, |a, b| match (a.0, b.0) {
                (Some(ta), Some(tb)) => tb.cmp(&ta),
                _ => Ordering::Equal,
            });
            keyed.into_iter().map(|(_, p)| p).collect()
        }
    }
}

/// Natural filename comparison (see module docs).
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    NaturalKey::new(a.to_owned()).cmp_natural(&NaturalKey::new(b.to_owned()))
}

/// A name with the span of its first digit run located once.
struct NaturalKey {
    name: String,
    digits: Option<Range<usize>>,
}

impl NaturalKey {
    fn new(name: String) -> Self {
        let digits = RE_DIGITS.find(&name).map(|m| m.range());
        Self { name, digits }
    }

    fn cmp_natural(&self, other: &Self) -> Ordering {
        if let (Some(da), Some(db)) = (&self.digits, &other.digits) {
            let by_number = cmp_decimal(&self.name[da.clone()], &other.name[db.clone()]);
            if by_number != Ordering::Equal {
                return by_number;
            }
        }
        self.name.as_bytes().cmp(other.name.as_bytes())
    }
}

/// Compare two ASCII digit runs by numeric value, without overflow.
fn cmp_decimal(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Move each element left past every neighbour it compares strictly less than.
fn stable_insertion_sort<T, F>(items: &mut [T], mut cmp: F)
where
    F: FnMut(&T, &T) -> Ordering,
{
    for i in 1..items.len() {
        let mut j = i;
        while j > 0 && cmp(&items[j - 1], &items[j]) == Ordering::Greater {
            items.swap(j - 1, j);
            j -= 1;
        }
    }
}
