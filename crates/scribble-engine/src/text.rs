//! Text normalization shared by guess evaluation, name filtering and the
//! anti-cheat duplicate detector.

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Lower-cases, strips diacritics and collapses runs of whitespace.
///
/// Input is compatibility-decomposed first, so precomposed and combining
/// forms fold the same way: `"  Crème   Brûlée "` → `"creme brulee"`.
pub fn normalize(input: &str) -> String {
    let lowered: String = input.chars().flat_map(char::to_lowercase).collect();
    let mut folded = String::with_capacity(lowered.len());
    for c in lowered.nfkd().filter(|c| !is_combining_mark(*c)) {
        fold_into(c, &mut folded);
    }
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Like [`normalize`], but keeps only letters and digits. Used where
/// separators are noise ("s.h.i.t" should match "shit").
pub fn compact(input: &str) -> String {
    normalize(input)
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// Letters with no canonical decomposition.
fn fold_into(c: char, out: &mut String) {
    let base = match c {
        'đ' => 'd',
        'ħ' => 'h',
        'ı' => 'i',
        'ł' => 'l',
        'ø' => 'o',
        'ß' => return out.push_str("ss"),
        'æ' => return out.push_str("ae"),
        'œ' => return out.push_str("oe"),
        other => other,
    };
    out.push(base);
}

/// Levenshtein distance over chars.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
