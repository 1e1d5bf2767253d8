// Copyright 2025-2026 Garner contributors.

//! Selection of which entries a backup includes.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::entry::FileRecord;
use crate::{Error, Result};

/// Criteria restricting which entries are backed up.
///
/// Directories always pass so that tree structure is preserved; every other
/// entry must satisfy all enabled criteria. Zero values disable the size
/// and mtime bounds.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Filter {
    /// Literal substrings matched anywhere in the relative path. When
    /// non-empty, takes precedence over `name_regex`.
    pub name_keywords: Vec<String>,
    /// Regex searched against the relative path; used only when
    /// `name_keywords` is empty.
    pub name_regex: String,
    /// Allow-list of path suffixes, e.g. `".txt"`.
    pub suffixes: Vec<String>,
    pub min_size: u64,
    pub max_size: u64,
    /// Earliest mtime, in seconds since the epoch.
    pub start_time: i64,
    /// Latest mtime, in seconds since the epoch.
    pub end_time: i64,
    /// Exact owner name match.
    pub user_name: String,
    pub enabled: bool,
}

impl Filter {
    /// Compile the name-matching pattern, if any.
    ///
    /// Keywords are regex-escaped and OR-joined; a record matches when any
    /// keyword occurs anywhere in its relative path.
    pub(crate) fn compile(&self) -> Result<CompiledFilter> {
        let pattern = if !self.name_keywords.is_empty() {
            let escaped: Vec<String> = self
                .name_keywords
                .iter()
                .map(|kw| regex::escape(kw))
                .collect();
            Some(format!(".*({}).*", escaped.join("|")))
        } else if !self.name_regex.is_empty() {
            Some(self.name_regex.clone())
        } else {
            None
        };
        let name_pattern = match pattern {
            Some(p) => Some(Regex::new(&p).map_err(|source| Error::BadFilterRegex {
                pattern: p,
                source,
            })?),
            None => None,
        };
        Ok(CompiledFilter {
            filter: self.clone(),
            name_pattern,
        })
    }
}

pub(crate) struct CompiledFilter {
    filter: Filter,
    name_pattern: Option<Regex>,
}

impl CompiledFilter {
    pub fn matches(&self, record: &FileRecord) -> bool {
        if record.kind.is_dir() {
            return true;
        }
        let f = &self.filter;
        if f.min_size > 0 && record.size < f.min_size {
            return false;
        }
        if f.max_size > 0 && record.size > f.max_size {
            return false;
        }
        if f.start_time > 0 && record.mtime < f.start_time {
            return false;
        }
        if f.end_time > 0 && record.mtime > f.end_time {
            return false;
        }
        if !f.user_name.is_empty() && record.user != f.user_name {
            return false;
        }
        if !f.suffixes.is_empty()
            && !f.suffixes.iter().any(|s| record.relpath.ends_with(s.as_str()))
        {
            return false;
        }
        if let Some(pattern) = &self.name_pattern {
            if !pattern.is_match(&record.relpath) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::TreeFixture;
    use crate::traverse::traverse;

    fn record_named(tf: &TreeFixture, name: &str) -> FileRecord {
        traverse(tf.path())
            .unwrap()
            .into_iter()
            .find(|r| r.relpath == name)
            .unwrap()
    }

    #[test]
    fn directories_always_pass() {
        let tf = TreeFixture::new();
        tf.create_dir("sub");
        let filter = Filter {
            suffixes: vec![".txt".into()],
            min_size: 1_000_000,
            enabled: true,
            ..Filter::default()
        }
        .compile()
        .unwrap();
        assert!(filter.matches(&record_named(&tf, "sub")));
    }

    #[test]
    fn size_bounds() {
        let tf = TreeFixture::new();
        tf.create_file_with_contents("small", b"xy");
        tf.create_file_with_contents("big", &vec![0u8; 9000]);
        let filter = Filter {
            min_size: 10,
            max_size: 5000,
            enabled: true,
            ..Filter::default()
        }
        .compile()
        .unwrap();
        assert!(!filter.matches(&record_named(&tf, "small")));
        assert!(!filter.matches(&record_named(&tf, "big")));

        let unbounded = Filter::default().compile().unwrap();
        assert!(unbounded.matches(&record_named(&tf, "small")));
    }

    #[test]
    fn suffix_allow_list() {
        let tf = TreeFixture::new();
        tf.create_file("notes.txt");
        tf.create_file("image.jpg");
        let filter = Filter {
            suffixes: vec![".txt".into(), ".log".into()],
            enabled: true,
            ..Filter::default()
        }
        .compile()
        .unwrap();
        assert!(filter.matches(&record_named(&tf, "notes.txt")));
        assert!(!filter.matches(&record_named(&tf, "image.jpg")));
    }

    #[test]
    fn keywords_escape_regex_metacharacters() {
        let tf = TreeFixture::new();
        tf.create_file("calc(v1+2).cpp");
        tf.create_file("notes_alpha.txt");
        tf.create_file("vacation.jpg");
        let filter = Filter {
            name_keywords: vec!["alpha".into(), "(v1+2)".into()],
            enabled: true,
            ..Filter::default()
        }
        .compile()
        .unwrap();
        assert!(filter.matches(&record_named(&tf, "calc(v1+2).cpp")));
        assert!(filter.matches(&record_named(&tf, "notes_alpha.txt")));
        assert!(!filter.matches(&record_named(&tf, "vacation.jpg")));
    }

    #[test]
    fn regex_used_only_without_keywords() {
        let tf = TreeFixture::new();
        tf.create_file("report_2024.txt");
        tf.create_file("readme.md");
        let filter = Filter {
            name_regex: r"report_\d+".into(),
            enabled: true,
            ..Filter::default()
        }
        .compile()
        .unwrap();
        assert!(filter.matches(&record_named(&tf, "report_2024.txt")));
        assert!(!filter.matches(&record_named(&tf, "readme.md")));
    }

    #[test]
    fn bad_regex_reported() {
        let filter = Filter {
            name_regex: "(unclosed".into(),
            enabled: true,
            ..Filter::default()
        };
        assert!(matches!(
            filter.compile(),
            Err(Error::BadFilterRegex { .. })
        ));
    }

    #[test]
    fn mtime_bounds() {
        let tf = TreeFixture::new();
        tf.create_file("f");
        let record = record_named(&tf, "f");
        let in_range = Filter {
            start_time: record.mtime - 10,
            end_time: record.mtime + 10,
            enabled: true,
            ..Filter::default()
        }
        .compile()
        .unwrap();
        assert!(in_range.matches(&record));
        let too_old = Filter {
            start_time: record.mtime + 100,
            enabled: true,
            ..Filter::default()
        }
        .compile()
        .unwrap();
        assert!(!too_old.matches(&record));
    }
}
