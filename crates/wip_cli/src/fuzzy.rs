//! Fuzzy ranking of `switch` candidates.
//!
//! A candidate matches when every query character appears in it in order
//! (case-insensitive). Among matches, tighter and earlier hits, runs of
//! consecutive characters and hits starting on a segment boundary win.

/// Score bonus when the query appears verbatim inside the candidate.
const SUBSTRING_BONUS: i64 = 2000;
const SUBSEQUENCE_BONUS: i64 = 500;
const EXACT_BONUS: i64 = 100_000;
const BOUNDARY_BONUS: i64 = 150;
const CONSECUTIVE_BONUS: i64 = 40;
const BASE_SCORE: i64 = 1000;

struct SubsequenceStats {
    first: usize,
    span: usize,
    consecutive: usize,
    start_boundary: bool,
}

/// Scores `haystack` against `needle`; `None` when it does not match.
pub fn fuzzy_score(needle: &str, haystack: &str) -> Option<i64> {
    let needle = needle.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }
    let haystack = haystack.to_lowercase();

    let stats = subsequence_stats(&needle, &haystack)?;
    let mut score = BASE_SCORE;
    score -= stats.span as i64;
    score -= (stats.first as i64) / 4;
    score += (stats.consecutive as i64) * CONSECUTIVE_BONUS;
    if stats.start_boundary {
        score += BOUNDARY_BONUS;
    }
    if haystack.contains(&needle) {
        score += SUBSTRING_BONUS;
    } else {
        score += SUBSEQUENCE_BONUS;
    }
    if haystack == needle {
        score += EXACT_BONUS;
    }
    Some(score)
}

/// Best-scoring candidate for `needle`; ties go to the earlier candidate.
pub fn best_match<'a>(needle: &str, candidates: &'a [String]) -> Option<&'a str> {
    let mut best: Option<(i64, &str)> = None;
    for candidate in candidates {
        let Some(score) = fuzzy_score(needle, candidate) else {
            continue;
        };
        if best.map_or(true, |(best_score, _)| score > best_score) {
            best = Some((score, candidate.as_str()));
        }
    }
    best.map(|(_, candidate)| candidate)
}

fn subsequence_stats(needle: &str, haystack: &str) -> Option<SubsequenceStats> {
    let mut needle_iter = needle.chars().peekable();
    let mut first: Option<usize> = None;
    let mut last = 0;
    let mut prev_match: Option<usize> = None;
    let mut consecutive = 0;
    let mut start_boundary = false;
    let mut prev_hay: Option<char> = None;

    for (idx, ch) in haystack.chars().enumerate() {
        let Some(&want) = needle_iter.peek() else {
            break;
        };
        if ch == want {
            if first.is_none() {
                first = Some(idx);
                start_boundary = prev_hay.map_or(true, is_boundary);
            }
            if prev_match.is_some_and(|prev| prev + 1 == idx) {
                consecutive += 1;
            }
            prev_match = Some(idx);
            last = idx;
            needle_iter.next();
        }
        prev_hay = Some(ch);
    }

    if needle_iter.peek().is_some() {
        return None;
    }
    let first = first?;
    Some(SubsequenceStats {
        first,
        span: last - first + 1,
        consecutive,
        start_boundary,
    })
}

fn is_boundary(ch: char) -> bool {
    matches!(ch, '/' | '-' | '_' | ' ' | '.')
}
