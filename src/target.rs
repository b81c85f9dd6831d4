//! Identifier classification: decide what a trigger target is and which
//! storage key its artifacts live under.
//!
//! Classification never fails. Anything unrecognised comes back as
//! [`TargetKind::Opaque`] and it is up to the caller to reject it.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static PMC_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^PMC[0-9]+$").expect("valid regex"));

// Registrant codes are 4-9 digits (optionally dotted sub-codes); the suffix is
// any run of printable, non-space characters.
static DOI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^10\.\d{4,9}(\.\d+)*/\S+$").expect("valid regex"));

/// What kind of reference a target string is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// PubMed Central accession, `PMC` followed by digits.
    Pmc,
    /// Bare DOI, e.g. `10.1371/journal.pone.0000001`.
    Doi,
    /// Any syntactically valid absolute URL.
    Url,
    /// None of the above.
    Opaque,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TargetKind::Pmc => "pmc",
            TargetKind::Doi => "doi",
            TargetKind::Url => "url",
            TargetKind::Opaque => "opaque",
        })
    }
}

/// A classified target together with its canonical storage key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedTarget {
    pub target: String,
    pub kind: TargetKind,
    /// Deduplication and namespace key for the job's artifacts.
    pub id: String,
}

impl ClassifiedTarget {
    /// File stem used for local artifacts (`{stem}.xml`, `{stem}.log.yml`).
    ///
    /// DOIs contain `/`, which would otherwise create nested directories.
    pub fn file_stem(&self) -> String {
        self.id.replace('/', ".")
    }
}

pub fn is_pmc_id(s: &str) -> bool {
    PMC_ID.is_match(s)
}

pub fn is_doi(s: &str) -> bool {
    DOI.is_match(s)
}

pub fn is_url(s: &str) -> bool {
    reqwest::Url::parse(s).is_ok()
}

/// Classify `target` and derive its storage key.
///
/// An explicit `id` always wins. Otherwise PMC ids and DOIs are their own key,
/// URLs are keyed by [`simple_hash`], and opaque targets keep the raw string
/// so a rejection can still be recorded somewhere a poller will look.
pub fn classify(target: &str, id: Option<&str>) -> ClassifiedTarget {
    let kind = if is_pmc_id(target) {
        TargetKind::Pmc
    } else if is_doi(target) {
        TargetKind::Doi
    } else if is_url(target) {
        TargetKind::Url
    } else {
        TargetKind::Opaque
    };
    let id = match (id.filter(|s| !s.is_empty()), kind) {
        (Some(explicit), _) => explicit.to_string(),
        (None, TargetKind::Url) => simple_hash(target),
        (None, _) => target.to_string(),
    };
    ClassifiedTarget {
        target: target.to_string(),
        kind,
        id,
    }
}

/// Fast deterministic string hash rendered in base 36.
///
/// DJB2 with XOR mixing over UTF-16 code units, truncated to 32 bits. The
/// front-end computes the same value to find a URL's status, so the exact
/// arithmetic matters more than the hash quality. Not collision resistant.
pub fn simple_hash(s: &str) -> String {
    let mut hash: i32 = 5381;
    for unit in s.encode_utf16() {
        hash = hash.wrapping_mul(33) ^ i32::from(unit);
    }
    to_base36(hash as u32)
}

fn to_base36(mut n: u32) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
