//! Locale matching: BCP-47 language ranges to language reference sets.
//!
//! A search or lookup carrying `Accept-Language: en-GB, en;q=0.7` needs an
//! ordered list of language refset identifiers to drive preferred-synonym
//! selection. The mapping from dialect tags to refset identifiers is a
//! static table; which refsets are actually usable depends on the installed
//! release, so the match is composed with the `installed-refsets` bucket at
//! runtime.

use hashbrown::HashSet;
use hermes_types::{well_known, SctId};

/// Built-in dialect table. Tags are lowercase; more specific tags list
/// their fallback refsets after the primary one.
const DIALECTS: &[(&str, &[SctId])] = &[
    ("en-gb", &[well_known::GB_ENGLISH]),
    ("en-us", &[well_known::US_ENGLISH]),
    ("en", &[well_known::US_ENGLISH, well_known::GB_ENGLISH]),
    // UK NHS realm refsets fall back to GB English.
    ("en-nhs-clinical", &[999001261000000100, well_known::GB_ENGLISH]),
    ("en-nhs-pharmacy", &[999000691000001104, well_known::GB_ENGLISH]),
    ("en-nhs-dmd", &[999000671000001103, well_known::GB_ENGLISH]),
    ("da", &[554461000005103]),
    ("da-dk", &[554461000005103]),
    ("nl", &[31000146106]),
    ("nl-nl", &[31000146106]),
    ("sv", &[46011000052107]),
    ("sv-se", &[46011000052107]),
    ("es", &[450828004]),
    ("nb", &[61000202103]),
    ("nn", &[91000202106]),
    ("no", &[61000202103]),
];

/// One parsed tag of an accept-language range.
#[derive(Debug, Clone, PartialEq)]
struct LanguageRange {
    tag: String,
    quality: f32,
}

/// Resolves a BCP-47 accept-language range to an ordered list of installed
/// language refset identifiers.
///
/// The range may carry several comma-separated tags with optional
/// q-values. Tags match the dialect table exactly first, then by stripping
/// subtags (`en-gb-oxendict` → `en-gb` → `en`). Refsets not present in
/// `installed` are dropped. When nothing matches, the `default_locale`
/// (typically the store's configured locale) is tried, then `en-US`.
///
/// The result is deterministic for a given range and installed set, and may
/// be empty; this never fails.
pub fn match_locale(
    range: &str,
    installed: &HashSet<SctId>,
    default_locale: Option<&str>,
) -> Vec<SctId> {
    let mut out = resolve(range, installed);
    if out.is_empty() {
        if let Some(fallback) = default_locale {
            out = resolve(fallback, installed);
        }
    }
    if out.is_empty() {
        out = resolve("en-US", installed);
    }
    out
}

/// Looks a single dialect tag up in the built-in table, ignoring the
/// installed set; used by ECL dialect filters that name a tag directly.
pub fn dialect_refsets(tag: &str) -> &'static [SctId] {
    lookup(&tag.to_ascii_lowercase())
}

fn resolve(range: &str, installed: &HashSet<SctId>) -> Vec<SctId> {
    let mut ranges = parse_ranges(range);
    // Stable by parse order, so equal qualities keep their written order.
    ranges.sort_by(|a, b| b.quality.partial_cmp(&a.quality).unwrap_or(std::cmp::Ordering::Equal));

    let mut out: Vec<SctId> = Vec::new();
    for r in &ranges {
        for refset in lookup(&r.tag) {
            if installed.contains(refset) && !out.contains(refset) {
                out.push(*refset);
            }
        }
    }
    out
}

/// Looks a tag up in the dialect table, stripping subtags until a match.
fn lookup(tag: &str) -> &'static [SctId] {
    let mut candidate = tag;
    loop {
        if let Some((_, refsets)) = DIALECTS.iter().find(|(t, _)| *t == candidate) {
            return refsets;
        }
        match candidate.rfind('-') {
            Some(pos) => candidate = &candidate[..pos],
            None => return &[],
        }
    }
}

fn parse_ranges(range: &str) -> Vec<LanguageRange> {
    range
        .split(',')
        .filter_map(|part| {
            let part = part.trim();
            if part.is_empty() {
                return None;
            }
            let (tag, quality) = match part.split_once(';') {
                Some((tag, params)) => {
                    let quality = params
                        .trim()
                        .strip_prefix("q=")
                        .and_then(|q| q.trim().parse::<f32>().ok())
                        .unwrap_or(1.0);
                    (tag, quality)
                }
                None => (part, 1.0),
            };
            let tag = tag.trim().to_ascii_lowercase();
            if tag.is_empty() {
                None
            } else {
                Some(LanguageRange { tag, quality })
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn installed(ids: &[SctId]) -> HashSet<SctId> {
        ids.iter().copied().collect()
    }

    #[test]
    fn test_exact_dialects() {
        let available = installed(&[well_known::GB_ENGLISH, well_known::US_ENGLISH]);
        assert_eq!(
            match_locale("en-GB", &available, None),
            vec![well_known::GB_ENGLISH]
        );
        assert_eq!(
            match_locale("en-US", &available, None),
            vec![well_known::US_ENGLISH]
        );
    }

    #[test]
    fn test_quality_ordering() {
        let available = installed(&[well_known::GB_ENGLISH, well_known::US_ENGLISH]);
        let result = match_locale("en-US;q=0.5, en-GB;q=0.9", &available, None);
        assert_eq!(result, vec![well_known::GB_ENGLISH, well_known::US_ENGLISH]);
    }

    #[test]
    fn test_subtag_stripping() {
        let available = installed(&[well_known::GB_ENGLISH, well_known::US_ENGLISH]);
        // Unknown variant of en resolves through the bare language.
        let result = match_locale("en-AU-x-custom", &available, None);
        assert_eq!(result, vec![well_known::US_ENGLISH, well_known::GB_ENGLISH]);
    }

    #[test]
    fn test_nhs_dialect_falls_back_to_gb() {
        // Only the GB refset is installed; the NHS alias still matches it.
        let available = installed(&[well_known::GB_ENGLISH]);
        assert_eq!(
            match_locale("en-NHS-CLINICAL", &available, None),
            vec![well_known::GB_ENGLISH]
        );
    }

    #[test]
    fn test_installed_filter() {
        let available = installed(&[well_known::GB_ENGLISH]);
        // US English is requested but not installed; en falls through to GB.
        assert_eq!(
            match_locale("en", &available, None),
            vec![well_known::GB_ENGLISH]
        );
    }

    #[test]
    fn test_fallback_chain() {
        let available = installed(&[well_known::US_ENGLISH]);
        // Danish is not installed: fall back to the default locale, which
        // is not installed either, then to en-US.
        assert_eq!(
            match_locale("da-DK", &available, Some("sv-SE")),
            vec![well_known::US_ENGLISH]
        );
    }

    #[test]
    fn test_nothing_matches_yields_empty() {
        let available = installed(&[554461000005103]);
        assert!(match_locale("zz", &available, None).is_empty());
    }

    #[test]
    fn test_determinism() {
        let available = installed(&[well_known::GB_ENGLISH, well_known::US_ENGLISH]);
        let a = match_locale("en-GB, en-US;q=0.8", &available, None);
        let b = match_locale("en-GB, en-US;q=0.8", &available, None);
        assert_eq!(a, b);
    }
}
