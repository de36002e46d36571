//! Classification of version-control changes
//!
//! Turns `git diff --raw` lines into `(identifier, action)` pairs,
//! dropping every path that does not name a valid record.
//!
//! A raw diff line looks like:
//!
//! ```text
//! :100644 100644 bcd1234 0123456 M	cves/2023/1xxx/CVE-2023-1200.json
//! ```

use serde::{Deserialize, Serialize};

use super::id::{IdRegistry, RecordId};

/// Per-file action reported by the diff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffAction {
    Added,
    Modified,
    /// Deletes, renames, copies, type changes...
    Other(char),
}

impl DiffAction {
    pub fn from_code(code: char) -> Self {
        match code {
            'A' => DiffAction::Added,
            'M' => DiffAction::Modified,
            other => DiffAction::Other(other),
        }
    }
}

/// One parsed line of raw diff output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub action: DiffAction,
    /// Path as printed by the diff (for renames, the destination)
    pub path: String,
}

impl DiffLine {
    /// Parses a raw diff line, returning `None` for anything malformed
    pub fn parse(line: &str) -> Option<Self> {
        let rest = line.trim_end().strip_prefix(':')?;

        // header is `srcmode dstmode srcsha dstsha status`
        let (header, paths) = match rest.split_once('\t') {
            Some(pair) => pair,
            None => {
                // some tools print a space where git prints the tab
                let (split, _) = rest.match_indices(' ').nth(4)?;
                (&rest[..split], &rest[split + 1..])
            }
        };

        let code = header.split(' ').nth(4)?.chars().next()?;
        let path = paths.rsplit('\t').next()?.trim();
        if path.is_empty() {
            return None;
        }

        Some(Self {
            action: DiffAction::from_code(code),
            path: path.to_string(),
        })
    }
}

/// Classifies raw diff lines into record changes.
///
/// Lines that are malformed, or whose path does not resolve to a valid
/// identifier, are skipped. Order of the input is preserved.
pub fn classify_lines<'a, I>(lines: I, registry: &IdRegistry) -> Vec<(RecordId, DiffAction, String)>
where
    I: IntoIterator<Item = &'a str>,
{
    lines
        .into_iter()
        .filter_map(DiffLine::parse)
        .filter_map(|line| {
            registry
                .resolve_path(&line.path)
                .map(|id| (id, line.action, line.path))
        })
        .collect()
}

/// Uncommitted changes in a working tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkingTreeStatus {
    /// Untracked files
    pub not_added: Vec<String>,
    /// Tracked files with modifications
    pub modified: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> IdRegistry {
        IdRegistry::new("ID", 1999, 2025, 2, 1970)
    }

    #[test]
    fn parses_tab_separated_lines() {
        let line = DiffLine::parse(":000000 100644 0000000 a1b2c3d A\tcves/2023/1xxx/ID-2023-1275.json").unwrap();

        assert_eq!(line.action, DiffAction::Added);
        assert_eq!(line.path, "cves/2023/1xxx/ID-2023-1275.json");
    }

    #[test]
    fn parses_space_separated_lines() {
        let line = DiffLine::parse(":100644 100644 a1b2c3d e4f5a6b M cves/2023/1xxx/ID-2023-1200.json").unwrap();

        assert_eq!(line.action, DiffAction::Modified);
        assert_eq!(line.path, "cves/2023/1xxx/ID-2023-1200.json");
    }

    #[test]
    fn renames_use_destination_path() {
        let line = DiffLine::parse(":100644 100644 a1b2c3d a1b2c3d R100\told/ID-2023-0001.json\tcves/2023/0xxx/ID-2023-0001.json").unwrap();

        assert_eq!(line.action, DiffAction::Other('R'));
        assert_eq!(line.path, "cves/2023/0xxx/ID-2023-0001.json");
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(DiffLine::parse("").is_none());
        assert!(DiffLine::parse("M\tcves/2023/1xxx/ID-2023-1200.json").is_none());
        assert!(DiffLine::parse(":100644 100644 a1b2c3d e4f5a6b M\t").is_none());
    }

    #[test]
    fn classify_skips_non_records() {
        let lines = [
            ":000000 100644 0000000 a1b2c3d A\tcves/2023/1xxx/ID-2023-1275.json",
            ":100644 100644 a1b2c3d e4f5a6b M\tcves/deltaLog.json",
            ":100644 100644 a1b2c3d e4f5a6b M\tcves/2023/1xxx/ID-2023-1200.json",
            ":100644 000000 a1b2c3d 0000000 D\tcves/2023/0xxx/ID-2023-0042.json",
            "not a diff line",
        ];

        let changes = classify_lines(lines, &registry());
        let summary: Vec<(String, DiffAction)> = changes
            .into_iter()
            .map(|(id, action, _)| (id.to_string(), action))
            .collect();

        assert_eq!(
            summary,
            vec![
                ("ID-2023-1275".to_string(), DiffAction::Added),
                ("ID-2023-1200".to_string(), DiffAction::Modified),
                ("ID-2023-0042".to_string(), DiffAction::Other('D')),
            ]
        );
    }
}
