//! Historical-name construction and recognition for archival versioning.

use rand::Rng;

const BASE62_ALPHABET: &[u8] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const SUFFIX_LEN: usize = 10;
const HISTORY_MARKER: &str = ".history.";

/// A historical (archived) object name.
///
/// For a path `p` with basename `b`, the historical form is
/// `<dirname(p)>/.history.<unixMillis>.<10charBase62>.<b>`. A name is
/// "historical" iff its basename starts with `.history.`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoricalName(String);

impl HistoricalName {
    /// Build the historical path for `dirname`/`basename`, stamped with
    /// `unix_millis` and a freshly generated random base62 suffix.
    pub fn generate(dirname: &str, basename: &str, unix_millis: i64) -> Self {
        let suffix = random_base62(SUFFIX_LEN, &mut rand::thread_rng());
        Self::build(dirname, basename, unix_millis, &suffix)
    }

    /// Build the historical path deterministically from an explicit suffix
    /// (used by tests and anywhere the randomness must be controlled).
    pub fn build(dirname: &str, basename: &str, unix_millis: i64, suffix: &str) -> Self {
        let historical_basename = format!("{HISTORY_MARKER}{unix_millis}.{suffix}.{basename}");
        let full = if dirname.is_empty() {
            historical_basename
        } else {
            format!("{dirname}/{historical_basename}")
        };
        Self(full)
    }

    /// The full historical path.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `basename` marks a historical (archived) object.
    pub fn is_historical_basename(basename: &str) -> bool {
        basename.starts_with(HISTORY_MARKER)
    }
}

fn random_base62(len: usize, rng: &mut impl Rng) -> String {
    (0..len)
        .map(|_| {
            let idx = rng.gen_range(0..BASE62_ALPHABET.len());
            BASE62_ALPHABET[idx] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_is_deterministic() {
        let name = HistoricalName::build("a/b", "c.txt", 1_700_000_000_000, "AbCdEfGhIj");
        assert_eq!(
            name.as_str(),
            "a/b/.history.1700000000000.AbCdEfGhIj.c.txt"
        );
    }

    #[test]
    fn build_with_empty_dirname_has_no_leading_slash() {
        let name = HistoricalName::build("", "c.txt", 1, "0000000000");
        assert_eq!(name.as_str(), ".history.1.0000000000.c.txt");
    }

    #[test]
    fn generate_produces_recognizable_historical_basename() {
        let name = HistoricalName::generate("dir", "file.txt", 123);
        let basename = name.as_str().rsplit('/').next().unwrap();
        assert!(HistoricalName::is_historical_basename(basename));
    }

    #[test]
    fn non_historical_basename_is_not_recognized() {
        assert!(!HistoricalName::is_historical_basename("file.txt"));
    }

    #[test]
    fn generate_suffix_is_ten_chars_of_base62() {
        let name = HistoricalName::generate("", "f", 0);
        let marker = ".history.0.";
        let basename = name.as_str();
        assert!(basename.starts_with(marker));
        let suffix = &basename[marker.len()..basename.len() - ".f".len()];
        assert_eq!(suffix.len(), SUFFIX_LEN);
        assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
