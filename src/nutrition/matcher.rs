use strsim::sorensen_dice;

pub const DEFAULT_SIMILARITY_FLOOR: f64 = 0.6;

/// Bigram (Sørensen–Dice) similarity in `0.0..=1.0`. Whitespace is ignored.
pub fn similarity(a: &str, b: &str) -> f64 {
    sorensen_dice(a, b)
}

/// Index and score of the single closest candidate scoring at least `floor`.
/// Ties keep the earliest candidate.
pub fn best_match<'a, I>(query: &str, candidates: I, floor: f64) -> Option<(usize, f64)>
where
    I: IntoIterator<Item = &'a str>,
{
    if query.is_empty() {
        return None;
    }
    let mut best: Option<(usize, f64)> = None;
    for (idx, candidate) in candidates.into_iter().enumerate() {
        let score = similarity(query, candidate);
        if score < floor {
            continue;
        }
        match best {
            Some((_, best_score)) if best_score >= score => {}
            _ => best = Some((idx, score)),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_scores_one() {
        assert_eq!(similarity("caesar salad", "caesar salad"), 1.0);
    }

    #[test]
    fn score_exactly_at_floor_is_accepted() {
        let score = similarity("abcdefghijk", "abcdefgxyzw");
        assert_eq!(score, 0.6);
        assert_eq!(
            best_match("abcdefghijk", ["abcdefgxyzw"], DEFAULT_SIMILARITY_FLOOR),
            Some((0, 0.6))
        );
    }

    #[test]
    fn score_below_floor_is_rejected() {
        let score = similarity("abcdefghijk", "abcdefxyzwv");
        assert!(score < 0.6, "score was {score}");
        assert_eq!(
            best_match("abcdefghijk", ["abcdefxyzwv"], DEFAULT_SIMILARITY_FLOOR),
            None
        );
    }

    #[test]
    fn picks_highest_scoring_candidate() {
        let candidates = ["iced", "coffee", "tea"];
        let (idx, score) =
            best_match("iced coffee", candidates, DEFAULT_SIMILARITY_FLOOR).expect("match");
        assert_eq!(candidates[idx], "coffee");
        assert!(score >= 0.6);
    }

    #[test]
    fn ties_keep_first_candidate() {
        let (idx, _) = best_match("tea", ["tea", "tea"], DEFAULT_SIMILARITY_FLOOR).expect("match");
        assert_eq!(idx, 0);
    }

    #[test]
    fn empty_query_never_matches() {
        assert_eq!(best_match("", ["", "tea"], 0.0), None);
    }
}
