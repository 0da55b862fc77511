//! File-matching filter pipeline
//!
//! Filters are plain values: a [`MatchRule`] tree with AND/OR composition
//! and per-leaf polarity, evaluated against a [`MatchContext`]. The same
//! tree drives both the MFT scan and the slow directory walker.
//!
//! Rules apply in two stages. The read stage runs during record iteration,
//! before any directory resolution; directory rules defer there and only
//! decide in the post stage, once the entry's path is known.

use crate::error::{MftFindError, Result};
use crate::ntfs::mft::FileEntry;

/// Comparison direction for date, size and count rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Greater,
    Equal,
    Less,
}

impl CmpOp {
    fn eval<T: Ord>(self, value: T, reference: T) -> bool {
        match self {
            CmpOp::Greater => value > reference,
            CmpOp::Equal => value == reference,
            CmpOp::Less => value < reference,
        }
    }
}

/// Evaluation context: the record's entry plus, in the post stage, its
/// resolved directory.
pub struct MatchContext<'a> {
    pub entry: &'a FileEntry,
    /// `None` in the read stage; the resolved path in the post stage
    pub directory: Option<&'a str>,
}

impl<'a> MatchContext<'a> {
    pub fn read_stage(entry: &'a FileEntry) -> Self {
        Self {
            entry,
            directory: None,
        }
    }

    pub fn post_stage(entry: &'a FileEntry, directory: &'a str) -> Self {
        Self {
            entry,
            directory: Some(directory),
        }
    }
}

/// One node of the filter tree.
///
/// `invert` flips a leaf's verdict (`-!f`-style negation). Composites
/// negate through De Morgan in [`MatchRule::negated`].
#[derive(Debug, Clone, PartialEq)]
pub enum MatchRule {
    /// Glob on the filename; `*` and `?` metacharacters
    Name {
        pattern: String,
        case_sensitive: bool,
        invert: bool,
    },
    /// Compare StandardInformation.modified against a FILETIME
    Date {
        filetime: u64,
        op: CmpOp,
        invert: bool,
    },
    /// Compare the entry's on-disk size
    Size { bytes: u64, op: CmpOp, invert: bool },
    /// Compare the entry's DATA stream count
    StreamCount { count: u32, op: CmpOp, invert: bool },
    /// Glob on the resolved directory; post stage only
    Directory { pattern: String, invert: bool },
    /// Conjunction; must not be empty
    All(Vec<MatchRule>),
    /// Disjunction; must not be empty
    Any(Vec<MatchRule>),
}

impl MatchRule {
    /// Reject empty composites anywhere in the tree.
    pub fn validate(&self) -> Result<()> {
        match self {
            MatchRule::All(children) => {
                if children.is_empty() {
                    return Err(MftFindError::FilterInvalid(String::from("empty All")));
                }
                children.iter().try_for_each(MatchRule::validate)
            }
            MatchRule::Any(children) => {
                if children.is_empty() {
                    return Err(MftFindError::FilterInvalid(String::from("empty Any")));
                }
                children.iter().try_for_each(MatchRule::validate)
            }
            _ => Ok(()),
        }
    }

    /// Does this tree contain a directory rule (forcing path resolution)?
    pub fn wants_directory(&self) -> bool {
        match self {
            MatchRule::Directory { .. } => true,
            MatchRule::All(children) | MatchRule::Any(children) => {
                children.iter().any(MatchRule::wants_directory)
            }
            _ => false,
        }
    }

    /// Logical negation. Leaves flip their polarity; composites negate by
    /// De Morgan, so `negated(negated(f)) == f`.
    pub fn negated(self) -> Self {
        match self {
            MatchRule::Name {
                pattern,
                case_sensitive,
                invert,
            } => MatchRule::Name {
                pattern,
                case_sensitive,
                invert: !invert,
            },
            MatchRule::Date { filetime, op, invert } => MatchRule::Date {
                filetime,
                op,
                invert: !invert,
            },
            MatchRule::Size { bytes, op, invert } => MatchRule::Size {
                bytes,
                op,
                invert: !invert,
            },
            MatchRule::StreamCount { count, op, invert } => MatchRule::StreamCount {
                count,
                op,
                invert: !invert,
            },
            MatchRule::Directory { pattern, invert } => MatchRule::Directory {
                pattern,
                invert: !invert,
            },
            MatchRule::All(children) => {
                MatchRule::Any(children.into_iter().map(MatchRule::negated).collect())
            }
            MatchRule::Any(children) => {
                MatchRule::All(children.into_iter().map(MatchRule::negated).collect())
            }
        }
    }

    /// Evaluate the tree against one entry.
    pub fn matches(&self, ctx: &MatchContext) -> bool {
        match self {
            MatchRule::Name {
                pattern,
                case_sensitive,
                invert,
            } => {
                let raw = !ctx.entry.name.is_empty()
                    && glob_match(pattern, &ctx.entry.name, *case_sensitive);
                raw != *invert
            }
            MatchRule::Date { filetime, op, invert } => {
                op.eval(ctx.entry.modified, *filetime) != *invert
            }
            MatchRule::Size { bytes, op, invert } => {
                op.eval(ctx.entry.disk_size, *bytes) != *invert
            }
            MatchRule::StreamCount { count, op, invert } => {
                op.eval(ctx.entry.stream_count, *count) != *invert
            }
            MatchRule::Directory { pattern, invert } => match ctx.directory {
                // Read stage: no directory yet, defer to the post stage
                None => true,
                Some(dir) => glob_match(pattern, dir, false) != *invert,
            },
            MatchRule::All(children) => children.iter().all(|c| c.matches(ctx)),
            MatchRule::Any(children) => children.iter().any(|c| c.matches(ctx)),
        }
    }
}

/// Combine rules into a single optional tree: none → no filter, one → the
/// rule itself, several → a conjunction.
pub fn all_of(rules: Vec<MatchRule>) -> Option<MatchRule> {
    match rules.len() {
        0 => None,
        1 => rules.into_iter().next(),
        _ => Some(MatchRule::All(rules)),
    }
}

// ============================================================================
// Glob matching
// ============================================================================

/// Glob compare with `*` (any run) and `?` (one char).
///
/// Case-insensitive comparison folds ASCII only; non-ASCII characters
/// compare codepoint-exact.
pub fn glob_match(pattern: &str, text: &str, case_sensitive: bool) -> bool {
    let fold = |c: char| {
        if case_sensitive {
            c
        } else {
            c.to_ascii_lowercase()
        }
    };
    let pat: Vec<char> = pattern.chars().map(fold).collect();
    let txt: Vec<char> = text.chars().map(fold).collect();

    let (mut p, mut t) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while t < txt.len() {
        if p < pat.len() && (pat[p] == '?' || pat[p] == txt[t]) {
            p += 1;
            t += 1;
        } else if p < pat.len() && pat[p] == '*' {
            star = Some((p, t));
            p += 1;
        } else if let Some((sp, st)) = star {
            // Backtrack: let the last star swallow one more char
            p = sp + 1;
            t = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }

    while p < pat.len() && pat[p] == '*' {
        p += 1;
    }
    p == pat.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, modified: u64, disk_size: u64, streams: u32) -> FileEntry {
        FileEntry {
            name: name.to_string(),
            modified,
            disk_size,
            stream_count: streams,
            in_use: true,
            ..Default::default()
        }
    }

    #[test]
    fn glob_basics() {
        assert!(glob_match("*.txt", "readme.txt", false));
        assert!(glob_match("*.TXT", "readme.txt", false));
        assert!(!glob_match("*.TXT", "readme.txt", true));
        assert!(glob_match("map?.dat", "map1.dat", false));
        assert!(!glob_match("map?.dat", "map12.dat", false));
        assert!(glob_match("*", "anything", false));
        assert!(glob_match("a*b*c", "axxbyyc", false));
        assert!(!glob_match("a*b*c", "axxbyy", false));
        assert!(glob_match("", "", false));
        assert!(!glob_match("", "x", false));
    }

    #[test]
    fn glob_non_ascii_is_codepoint_exact() {
        assert!(glob_match("*ö*", "schön", false));
        // ASCII folding must not touch non-ASCII codepoints
        assert!(!glob_match("*Ö*", "schön", false));
    }

    #[test]
    fn name_rule_with_polarity() {
        let rule = MatchRule::Name {
            pattern: "*.txt".into(),
            case_sensitive: false,
            invert: false,
        };
        let e = entry("notes.txt", 0, 0, 0);
        assert!(rule.matches(&MatchContext::read_stage(&e)));

        let inverted = rule.clone().negated();
        assert!(!inverted.matches(&MatchContext::read_stage(&e)));

        // Nameless records fail a positive rule but pass an inverted one
        let nameless = entry("", 0, 0, 0);
        assert!(!rule.matches(&MatchContext::read_stage(&nameless)));
        assert!(inverted.matches(&MatchContext::read_stage(&nameless)));
    }

    #[test]
    fn date_size_and_stream_rules() {
        let e = entry("a", 1_000, 4096, 2);

        let newer = MatchRule::Date { filetime: 500, op: CmpOp::Greater, invert: false };
        let older = MatchRule::Date { filetime: 500, op: CmpOp::Less, invert: false };
        assert!(newer.matches(&MatchContext::read_stage(&e)));
        assert!(!older.matches(&MatchContext::read_stage(&e)));

        let big = MatchRule::Size { bytes: 1000, op: CmpOp::Greater, invert: false };
        let small = MatchRule::Size { bytes: 1000, op: CmpOp::Less, invert: false };
        assert!(big.matches(&MatchContext::read_stage(&e)));
        assert!(!small.matches(&MatchContext::read_stage(&e)));

        let multi = MatchRule::StreamCount { count: 1, op: CmpOp::Greater, invert: false };
        assert!(multi.matches(&MatchContext::read_stage(&e)));
    }

    #[test]
    fn directory_rule_defers_in_read_stage() {
        let rule = MatchRule::Directory {
            pattern: "\\logs".into(),
            invert: false,
        };
        let e = entry("app.log", 0, 0, 0);
        assert!(rule.matches(&MatchContext::read_stage(&e)));
        assert!(rule.matches(&MatchContext::post_stage(&e, "\\logs")));
        assert!(!rule.matches(&MatchContext::post_stage(&e, "\\logs\\archive")));
    }

    #[test]
    fn composition_laws() {
        let f = MatchRule::Name {
            pattern: "*.log".into(),
            case_sensitive: false,
            invert: false,
        };
        let e_hit = entry("x.log", 0, 0, 0);
        let e_miss = entry("x.txt", 0, 0, 0);

        // All([f]) == f and Any([f]) == f
        for wrapped in [
            MatchRule::All(vec![f.clone()]),
            MatchRule::Any(vec![f.clone()]),
        ] {
            for e in [&e_hit, &e_miss] {
                assert_eq!(
                    wrapped.matches(&MatchContext::read_stage(e)),
                    f.matches(&MatchContext::read_stage(e))
                );
            }
        }

        // Not(Not(f)) == f
        assert_eq!(f.clone().negated().negated(), f);

        // Empty composites are invalid
        assert!(matches!(
            MatchRule::All(vec![]).validate(),
            Err(MftFindError::FilterInvalid(_))
        ));
        assert!(matches!(
            MatchRule::Any(vec![]).validate(),
            Err(MftFindError::FilterInvalid(_))
        ));
        assert!(MatchRule::All(vec![f]).validate().is_ok());
    }

    #[test]
    fn nested_validation_finds_empty_composites() {
        let tree = MatchRule::All(vec![
            MatchRule::Name {
                pattern: "*".into(),
                case_sensitive: false,
                invert: false,
            },
            MatchRule::Any(vec![]),
        ]);
        assert!(tree.validate().is_err());
    }

    #[test]
    fn de_morgan_negation_round_trips() {
        let tree = MatchRule::All(vec![
            MatchRule::Name {
                pattern: "*.txt".into(),
                case_sensitive: false,
                invert: false,
            },
            MatchRule::Any(vec![
                MatchRule::Size { bytes: 10, op: CmpOp::Greater, invert: false },
                MatchRule::Date { filetime: 99, op: CmpOp::Less, invert: true },
            ]),
        ]);
        assert_eq!(tree.clone().negated().negated(), tree);
    }

    #[test]
    fn wants_directory_detection() {
        let plain = MatchRule::Name {
            pattern: "*".into(),
            case_sensitive: false,
            invert: false,
        };
        assert!(!plain.wants_directory());
        let tree = MatchRule::All(vec![
            plain,
            MatchRule::Directory { pattern: "\\tmp".into(), invert: false },
        ]);
        assert!(tree.wants_directory());
    }

    #[test]
    fn all_of_collapses() {
        assert_eq!(all_of(vec![]), None);
        let f = MatchRule::Name {
            pattern: "*".into(),
            case_sensitive: false,
            invert: false,
        };
        assert_eq!(all_of(vec![f.clone()]), Some(f.clone()));
        assert_eq!(
            all_of(vec![f.clone(), f.clone()]),
            Some(MatchRule::All(vec![f.clone(), f]))
        );
    }
}
