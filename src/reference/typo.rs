/// Levenshtein distance over bytes. Domains reaching this point are ASCII.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.is_empty() {
        return b.len();
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Closest provider within the allowed distance; ties keep list order.
///
/// Short domains only tolerate one edit, so `gmx.at` is not "corrected"
/// into `gmx.de`.
pub(super) fn closest_provider<'a>(domain: &str, providers: &'a [String]) -> Option<&'a str> {
    const MIN_LEN: usize = 6;
    if domain.len() < MIN_LEN {
        return None;
    }
    let allowed = if domain.len() >= 10 { 2 } else { 1 };

    providers
        .iter()
        .map(|provider| (edit_distance(domain, provider), provider))
        .filter(|(distance, _)| (1..=allowed).contains(distance))
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, provider)| provider.as_str())
}
