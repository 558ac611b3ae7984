use rand::Rng;
use regex::Regex;

lazy_static! {
    static ref SLUG_STRIP_RE: Regex = Regex::new(r"[^a-z0-9\-_]").unwrap();
}

/// Length of the random hex token appended to every slug.
pub const SLUG_SUFFIX_LEN: usize = 8;

/// Stem used when nothing of the title survives stripping.
pub const FALLBACK_STEM: &str = "article";

/// URL-safe slug for `title`: lowercased, spaces turned into hyphens, anything
/// outside `[a-z0-9-_]` dropped, then a random hex suffix. Uniqueness is only
/// practical; the `articles.slug` constraint has the final word.
pub fn generate_slug(title: &str) -> String {
    let suffix: u32 = rand::thread_rng().gen();
    format!("{}-{:0width$x}", slug_stem(title), suffix, width = SLUG_SUFFIX_LEN)
}

/// Never empty, and never starts or ends with a hyphen.
pub fn slug_stem(title: &str) -> String {
    let hyphenated = title.to_lowercase().replace(' ', "-");
    let stripped = SLUG_STRIP_RE.replace_all(&hyphenated, "");
    match stripped.trim_matches('-') {
        "" => FALLBACK_STEM.to_owned(),
        stem => stem.to_owned(),
    }
}
