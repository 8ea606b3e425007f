/// Suffixes that upstream schemas spell as all-caps acronyms.
const ACRONYM_SUFFIXES: &[(&str, &str)] = &[("Arn", "ARN"), ("Url", "URL")];

/// Candidate wire names for an internal field name, in match priority order.
///
/// Order: exact, UpperCamel, hyphenated words, acronym suffix, lowercase,
/// uppercase. Duplicates are dropped so the first occurrence keeps its rank.
///
/// ```
/// use runway_codec::naming::wire_candidates;
///
/// let names = wire_candidates("xAmzId2");
/// assert_eq!(names[0], "xAmzId2");
/// assert!(names.contains(&"x-amz-id-2".to_string()));
/// ```
pub fn wire_candidates(name: &str) -> Vec<String> {
    let mut candidates: Vec<String> = Vec::with_capacity(6);
    let mut push = |candidate: String| {
        if !candidate.is_empty() && !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    };

    push(name.to_string());
    push(upper_camel(name));
    push(hyphenated(name));
    if let Some(acronym) = acronym_suffix(name) {
        push(acronym);
    }
    push(name.to_lowercase());
    push(name.to_uppercase());

    candidates
}

fn upper_camel(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Split on case changes and letter/digit boundaries, lowercase, join with `-`.
fn hyphenated(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if i > 0 && !current.is_empty() {
            let prev = chars[i - 1];
            let next = chars.get(i + 1).copied();
            let boundary = (c.is_uppercase() && (prev.is_lowercase() || prev.is_ascii_digit()))
                || (c.is_uppercase()
                    && prev.is_uppercase()
                    && next.is_some_and(|n| n.is_lowercase()))
                || (c.is_ascii_digit() && !prev.is_ascii_digit())
                || (c.is_alphabetic() && prev.is_ascii_digit());
            if boundary {
                words.push(std::mem::take(&mut current));
            }
        }
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }

    words.join("-")
}

fn acronym_suffix(name: &str) -> Option<String> {
    ACRONYM_SUFFIXES.iter().find_map(|(suffix, acronym)| {
        name.strip_suffix(suffix)
            .filter(|stem| !stem.is_empty())
            .map(|stem| format!("{stem}{acronym}"))
    })
}
