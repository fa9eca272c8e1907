//! Abbreviation matching for target names, option names and enumeration values.

/// Outcome of matching a partial name against a candidate list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
  /// Exactly one candidate matched; its index in the candidate list.
  Unique(usize),
  NotFound,
  /// Several candidates matched, in candidate order.
  Ambiguous(Vec<String>),
}

/// Resolve `query` to a single candidate.
///
/// Matching is case-insensitive. An exact name always wins; otherwise the query
/// must be the prefix of exactly one candidate. When `substrings` is set and no
/// candidate has the query as prefix, a unique substring match is accepted.
/// Zero or several matches never pick a candidate.
pub fn resolve<'a, I>(query: &str, candidates: I, substrings: bool) -> Resolution
where
  I: IntoIterator<Item = &'a str>,
{
  let query = query.to_lowercase();
  let candidates: Vec<&str> = candidates.into_iter().collect();
  if query.is_empty() {
    return Resolution::NotFound;
  }

  let lowered: Vec<String> = candidates.iter().map(|c| c.to_lowercase()).collect();

  if let Some(index) = lowered.iter().position(|c| *c == query) {
    return Resolution::Unique(index);
  }

  let prefixed = matching(&lowered, |c| c.starts_with(&query));
  match prefixed.as_slice() {
    [index] => return Resolution::Unique(*index),
    [] => {}
    many => return Resolution::Ambiguous(many.iter().map(|&i| candidates[i].to_string()).collect()),
  }

  if substrings {
    let contained = matching(&lowered, |c| c.contains(&query));
    match contained.as_slice() {
      [index] => return Resolution::Unique(*index),
      [] => {}
      many => return Resolution::Ambiguous(many.iter().map(|&i| candidates[i].to_string()).collect()),
    }
  }

  Resolution::NotFound
}

fn matching(lowered: &[String], predicate: impl Fn(&str) -> bool) -> Vec<usize> {
  lowered
    .iter()
    .enumerate()
    .filter(|(_, c)| predicate(c))
    .map(|(i, _)| i)
    .collect()
}
