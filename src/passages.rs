use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use include_dir::{include_dir, Dir};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::error::{Result, TapError};
use crate::session::Mode;

static TEXT_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/texts");

/// Used when no passage is available at all.
pub const DEFAULT_PASSAGE: &str = "Default text.";

/// Split a text file into passages: one per non-blank line, trimmed.
pub fn parse_lines(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

/// Read passages from `path`. A missing file yields no passages.
pub fn load_lines(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        warn!("file not found: {}, no passages loaded", path.display());
        return Ok(Vec::new());
    }
    let lines = parse_lines(&fs::read_to_string(path)?);
    debug!("loaded {} entries from {}", lines.len(), path.display());
    Ok(lines)
}

fn builtin(name: &str) -> Vec<String> {
    TEXT_DIR
        .get_file(name)
        .and_then(|f| f.contents_utf8())
        .map(parse_lines)
        .unwrap_or_default()
}

/// Practice passages: short sentences and longer texts.
#[derive(Debug, Clone, Default)]
pub struct TextSource {
    sentences: Vec<String>,
    long_texts: Vec<String>,
    /// Where custom sentences get appended, if file backed.
    custom_path: Option<PathBuf>,
}

impl TextSource {
    pub fn new(sentences: Vec<String>, long_texts: Vec<String>) -> Self {
        Self {
            sentences,
            long_texts,
            custom_path: None,
        }
    }

    /// Passages compiled into the binary.
    pub fn builtin() -> Self {
        Self::new(builtin("sentences.txt"), builtin("long_texts.txt"))
    }

    /// Load from files. An unset sentences file means the built-in
    /// sentences plus whatever was saved to `custom_path`; custom passages
    /// are then appended there instead of to the sentences file.
    pub fn load(
        sentences_path: Option<&Path>,
        long_texts_path: Option<&Path>,
        custom_path: &Path,
    ) -> Result<Self> {
        let (sentences, custom_path) = match sentences_path {
            Some(path) => (load_lines(path)?, path),
            None => {
                let mut sentences = builtin("sentences.txt");
                if custom_path.exists() {
                    sentences.extend(load_lines(custom_path)?);
                }
                (sentences, custom_path)
            }
        };
        let long_texts = match long_texts_path {
            Some(path) => load_lines(path)?,
            None => builtin("long_texts.txt"),
        };

        Ok(Self {
            sentences,
            long_texts,
            custom_path: Some(custom_path.to_path_buf()),
        })
    }

    /// File that [`TextSource::add_custom`] appends to.
    pub fn custom_path(&self) -> Option<&Path> {
        self.custom_path.as_deref()
    }

    pub fn sentences(&self) -> &[String] {
        &self.sentences
    }

    pub fn long_texts(&self) -> &[String] {
        &self.long_texts
    }

    pub fn sentence(&self, idx: usize) -> Option<&str> {
        self.sentences.get(idx).map(String::as_str)
    }

    /// Random passage for `mode`. Countdown prefers long texts, then
    /// sentences, then [`DEFAULT_PASSAGE`].
    pub fn pick<R: Rng + ?Sized>(&self, mode: Mode, rng: &mut R) -> String {
        let long = match mode {
            Mode::Countdown { .. } => self.long_texts.choose(rng),
            Mode::Stopwatch => None,
        };
        long.or_else(|| self.sentences.choose(rng))
            .cloned()
            .unwrap_or_else(|| DEFAULT_PASSAGE.to_string())
    }

    pub fn random(&self, mode: Mode) -> String {
        self.pick(mode, &mut rand::thread_rng())
    }

    /// Add a user passage. Returns false for a duplicate. File-backed
    /// sources also append it to the sentences file.
    pub fn add_custom(&mut self, text: &str) -> Result<bool> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TapError::InvalidInput("custom text is empty".into()));
        }
        if text.contains('\n') {
            return Err(TapError::InvalidInput(
                "custom text must be a single line".into(),
            ));
        }
        if self.sentences.iter().any(|s| s == text) {
            warn!("duplicate custom text ignored");
            return Ok(false);
        }

        if let Some(path) = &self.custom_path {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            // keep the last line intact when the file lacks a trailing newline
            let unterminated = match fs::read(path) {
                Ok(bytes) => bytes.last().is_some_and(|&b| b != b'\n'),
                Err(e) if e.kind() == ErrorKind::NotFound => false,
                Err(e) => return Err(e.into()),
            };
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            if unterminated {
                writeln!(file)?;
            }
            writeln!(file, "{text}")?;
        }
        self.sentences.push(text.to_string());
        info!("custom text added");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::tempdir;

    #[test]
    fn test_parse_lines_skips_blanks_and_trims() {
        let lines = parse_lines("  first line \n\n   \nsecond\r\n");
        assert_eq!(lines, vec!["first line", "second"]);
    }

    #[test]
    fn test_builtin_passages_present() {
        let source = TextSource::builtin();
        assert!(!source.sentences().is_empty());
        assert!(!source.long_texts().is_empty());
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.txt");
        let source = TextSource::load(Some(&missing), Some(&missing), &missing).unwrap();
        assert!(source.sentences().is_empty());
        assert!(source.long_texts().is_empty());
    }

    #[test]
    fn test_pick_countdown_prefers_long_texts() {
        let source = TextSource::new(vec!["short".into()], vec!["a long text".into()]);
        let mut rng = StdRng::seed_from_u64(7);

        assert_eq!(source.pick(Mode::countdown(), &mut rng), "a long text");
        assert_eq!(source.pick(Mode::Stopwatch, &mut rng), "short");
    }

    #[test]
    fn test_pick_falls_back() {
        let mut rng = StdRng::seed_from_u64(7);

        let only_sentences = TextSource::new(vec!["short".into()], vec![]);
        assert_eq!(only_sentences.pick(Mode::countdown(), &mut rng), "short");

        let empty = TextSource::default();
        assert_eq!(empty.pick(Mode::Stopwatch, &mut rng), DEFAULT_PASSAGE);
    }

    #[test]
    fn test_sentence_by_index() {
        let source = TextSource::new(vec!["zero".into(), "one".into()], vec![]);
        assert_eq!(source.sentence(1), Some("one"));
        assert_eq!(source.sentence(2), None);
    }

    #[test]
    fn test_add_custom_appends_to_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sentences.txt");
        fs::write(&path, "existing line\n").unwrap();

        let mut source = TextSource::load(Some(&path), None, &dir.path().join("unused.txt")).unwrap();
        assert!(source.add_custom("  brand new passage ").unwrap());
        assert!(!source.add_custom("existing line").unwrap());

        assert_eq!(source.sentences(), ["existing line", "brand new passage"]);
        let reloaded = load_lines(&path).unwrap();
        assert_eq!(reloaded, vec!["existing line", "brand new passage"]);
    }

    #[test]
    fn test_add_custom_after_unterminated_last_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sentences.txt");
        fs::write(&path, "existing line").unwrap();

        let mut source = TextSource::load(Some(&path), None, &path).unwrap();
        assert!(source.add_custom("brand new").unwrap());

        assert_eq!(load_lines(&path).unwrap(), vec!["existing line", "brand new"]);
        assert_eq!(fs::read_to_string(&path).unwrap(), "existing line\nbrand new\n");
    }

    #[test]
    fn test_custom_texts_extend_builtin_sentences() {
        let dir = tempdir().unwrap();
        let custom = dir.path().join("data").join("custom.txt");
        let builtin_count = TextSource::builtin().sentences().len();

        let mut source = TextSource::load(None, None, &custom).unwrap();
        assert_eq!(source.sentences().len(), builtin_count);
        assert_eq!(source.custom_path(), Some(custom.as_path()));
        assert!(source.add_custom("my own line").unwrap());
        assert_eq!(fs::read_to_string(&custom).unwrap(), "my own line\n");

        let reloaded = TextSource::load(None, None, &custom).unwrap();
        assert_eq!(reloaded.sentences().len(), builtin_count + 1);
        assert_eq!(reloaded.sentences().last().map(String::as_str), Some("my own line"));
        assert!(!TextSource::load(None, None, &custom)
            .unwrap()
            .add_custom("my own line")
            .unwrap());
    }

    #[test]
    fn test_add_custom_rejects_blank() {
        let mut source = TextSource::default();
        assert_matches!(source.add_custom("   "), Err(TapError::InvalidInput(_)));
        assert_matches!(
            source.add_custom("two\nlines"),
            Err(TapError::InvalidInput(_))
        );
    }
}
