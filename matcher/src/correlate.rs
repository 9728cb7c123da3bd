use crate::token::MatchToken;
use std::collections::HashMap;
use std::collections::VecDeque;

/// Result of correlating one file's raw findings against its previous set.
///
/// Indices refer into the input slices. The result is a partial bijection:
/// no raw or previous index appears in more than one pair, and every index
/// lands either in `pairs` or in the unmatched list for its side.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Matching {
    /// `(raw_index, previous_index)` pairs, in raw order.
    pub pairs: Vec<(usize, usize)>,
    /// Raw findings with no predecessor: newly introduced.
    pub new_raw: Vec<usize>,
    /// Previous findings with no successor: fixed or gone.
    pub gone_previous: Vec<usize>,
}

/// Pairs raw findings against previously tracked findings for one file.
pub fn correlate(raw: &[MatchToken<'_>], previous: &[MatchToken<'_>]) -> Matching {
    let mut paired_previous: Vec<Option<usize>> = vec![None; raw.len()];
    let mut previous_taken = vec![false; previous.len()];

    digest_pass(
        raw,
        previous,
        &mut paired_previous,
        &mut previous_taken,
        |token| token.range_digest,
    );
    digest_pass(
        raw,
        previous,
        &mut paired_previous,
        &mut previous_taken,
        |token| token.line_digest,
    );
    positional_pass(raw, previous, &mut paired_previous, &mut previous_taken);

    let mut matching = Matching::default();
    for (raw_index, paired) in paired_previous.iter().enumerate() {
        match paired {
            Some(previous_index) => matching.pairs.push((raw_index, *previous_index)),
            None => matching.new_raw.push(raw_index),
        }
    }
    for (previous_index, taken) in previous_taken.iter().enumerate() {
        if !taken {
            matching.gone_previous.push(previous_index);
        }
    }
    matching
}

/// One exact-equality pass: pairs tokens sharing a rule key and an identical
/// non-null digest. Candidates within a bucket are consumed in input order,
/// which keeps the pass deterministic and maximal for its tier.
fn digest_pass<'a>(
    raw: &[MatchToken<'a>],
    previous: &[MatchToken<'a>],
    paired_previous: &mut [Option<usize>],
    previous_taken: &mut [bool],
    digest: impl Fn(&MatchToken<'a>) -> Option<&'a str>,
) {
    let mut buckets: HashMap<(&str, &str), VecDeque<usize>> = HashMap::new();
    for (previous_index, token) in previous.iter().enumerate() {
        if previous_taken[previous_index] {
            continue;
        }
        if let Some(value) = digest(token) {
            buckets
                .entry((token.rule_key, value))
                .or_default()
                .push_back(previous_index);
        }
    }

    for (raw_index, token) in raw.iter().enumerate() {
        if paired_previous[raw_index].is_some() {
            continue;
        }
        let Some(value) = digest(token) else {
            continue;
        };
        if let Some(candidates) = buckets.get_mut(&(token.rule_key, value)) {
            if let Some(previous_index) = candidates.pop_front() {
                paired_previous[raw_index] = Some(previous_index);
                previous_taken[previous_index] = true;
            }
        }
    }
}

/// Fallback pass for findings without a usable digest: pairs tokens sharing
/// rule key and message, preferring the smallest line distance. Ties go to
/// the lowest previous line number, then the lowest previous index.
fn positional_pass(
    raw: &[MatchToken<'_>],
    previous: &[MatchToken<'_>],
    paired_previous: &mut [Option<usize>],
    previous_taken: &mut [bool],
) {
    for (raw_index, token) in raw.iter().enumerate() {
        if paired_previous[raw_index].is_some() {
            continue;
        }
        let mut best: Option<(u64, u32, usize)> = None;
        for (previous_index, candidate) in previous.iter().enumerate() {
            if previous_taken[previous_index]
                || candidate.rule_key != token.rule_key
                || candidate.message != token.message
            {
                continue;
            }
            let key = (
                line_distance(token.line, candidate.line),
                candidate.line.unwrap_or(0),
                previous_index,
            );
            if best.is_none_or(|current| key < current) {
                best = Some(key);
            }
        }
        if let Some((_, _, previous_index)) = best {
            paired_previous[raw_index] = Some(previous_index);
            previous_taken[previous_index] = true;
        }
    }
}

/// Both absent is a perfect positional match; one-sided absence is the worst
/// distance but still pairable within the tier.
fn line_distance(a: Option<u32>, b: Option<u32>) -> u64 {
    match (a, b) {
        (Some(a), Some(b)) => u64::from(a.abs_diff(b)),
        (None, None) => 0,
        _ => u64::MAX,
    }
}
