//! Weighted string-similarity scoring on a 0–100 scale.
//!
//! `weighted_ratio` picks the best of a plain edit ratio, a sliding
//! substring ratio and token-based ratios, scaled down when the two inputs
//! differ a lot in length. Scores are deterministic for identical inputs.

use std::collections::BTreeSet;

const UNBASE_SCALE: f64 = 0.95;

/// Normalized indel similarity: `200 * lcs / (len(a) + len(b))`.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    ratio_chars(&a, &b)
}

fn ratio_chars(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 100.0;
    }
    200.0 * lcs_len(a, b) as f64 / total as f64
}

fn lcs_len(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut row = vec![0usize; b.len() + 1];
    for ca in a {
        for (j, cb) in b.iter().enumerate() {
            row[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                row[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut row);
    }
    prev[b.len()]
}

/// Best [`ratio`] of the shorter string against any window of the longer one.
///
/// Windows shorter than the needle at either end of the haystack are
/// considered too, so partial overlaps at the edges still score.
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let (needle, haystack) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };
    let best = best_window(needle, haystack);
    if a.len() == b.len() {
        best.max(best_window(haystack, needle))
    } else {
        best
    }
}

fn best_window(needle: &[char], haystack: &[char]) -> f64 {
    let m = needle.len();
    let n = haystack.len();
    let mut best = 0.0f64;

    let mut consider = |window: &[char]| {
        let score = ratio_chars(needle, window);
        if score > best {
            best = score;
        }
    };

    for len in 1..m {
        consider(&haystack[..len]);
    }
    for start in 0..=(n - m) {
        consider(&haystack[start..start + m]);
    }
    for start in (n - m + 1)..n {
        consider(&haystack[start..]);
    }
    best
}

fn tokens(s: &str) -> Vec<&str> {
    s.split_whitespace().collect()
}

fn sorted_joined(s: &str) -> String {
    let mut words = tokens(s);
    words.sort_unstable();
    words.join(" ")
}

/// [`ratio`] after sorting whitespace-separated tokens.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    ratio(&sorted_joined(a), &sorted_joined(b))
}

/// Compare the shared token set against each side's full token set.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let set_a: BTreeSet<&str> = tokens(a).into_iter().collect();
    let set_b: BTreeSet<&str> = tokens(b).into_iter().collect();
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }

    let intersection: Vec<&str> = set_a.intersection(&set_b).copied().collect();
    let diff_ab: Vec<&str> = set_a.difference(&set_b).copied().collect();
    let diff_ba: Vec<&str> = set_b.difference(&set_a).copied().collect();

    if !intersection.is_empty() && (diff_ab.is_empty() || diff_ba.is_empty()) {
        return 100.0;
    }

    let sect = intersection.join(" ");
    let diff_ab = diff_ab.join(" ");
    let diff_ba = diff_ba.join(" ");

    if sect.is_empty() {
        return ratio(&diff_ab, &diff_ba);
    }

    let combined_ab = format!("{sect} {diff_ab}");
    let combined_ba = format!("{sect} {diff_ba}");
    ratio(&sect, &combined_ab)
        .max(ratio(&sect, &combined_ba))
        .max(ratio(&combined_ab, &combined_ba))
}

/// [`partial_ratio`] over sorted tokens; a shared token scores 100.
pub fn partial_token_ratio(a: &str, b: &str) -> f64 {
    let set_a: BTreeSet<&str> = tokens(a).into_iter().collect();
    let set_b: BTreeSet<&str> = tokens(b).into_iter().collect();
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }
    if set_a.intersection(&set_b).next().is_some() {
        return 100.0;
    }
    partial_ratio(&sorted_joined(a), &sorted_joined(b))
}

/// Weighted combination of the ratios above.
pub fn weighted_ratio(a: &str, b: &str) -> f64 {
    let len_a = a.chars().count();
    let len_b = b.chars().count();
    if len_a == 0 || len_b == 0 {
        return 0.0;
    }

    let len_ratio = len_a.max(len_b) as f64 / len_a.min(len_b) as f64;
    let base = ratio(a, b);

    if len_ratio < 1.5 {
        let token = token_sort_ratio(a, b).max(token_set_ratio(a, b));
        return base.max(token * UNBASE_SCALE);
    }

    let partial_scale = if len_ratio < 8.0 { 0.9 } else { 0.6 };
    let partial = base.max(partial_ratio(a, b) * partial_scale);
    partial.max(partial_token_ratio(a, b) * UNBASE_SCALE * partial_scale)
}

/// Score every choice, keep the best `limit` with score `>= cutoff`.
///
/// Returns `(index, score)` pairs, highest score first. Equal scores keep
/// their order in `choices`.
pub fn extract_top<S: AsRef<str>>(
    query: &str,
    choices: &[S],
    limit: usize,
    cutoff: f64,
) -> Vec<(usize, f64)> {
    let mut scored: Vec<(usize, f64)> = choices
        .iter()
        .enumerate()
        .map(|(i, choice)| (i, weighted_ratio(query, choice.as_ref())))
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(limit);
    scored.retain(|(_, score)| *score >= cutoff);
    scored
}
