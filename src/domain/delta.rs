//! Delta: one classified change report
//!
//! A delta holds three queues of [`RecordSummary`]:
//!
//! | Queue | Meaning | Dedup |
//! |-------|---------|-------|
//! | `new` | record added | replace by identifier (last write wins) |
//! | `updated` | record modified | replace by identifier (last write wins) |
//! | `unknown` | anything else (deletes, renames...) | none, appended |
//!
//! Uniqueness is per queue only: a record created and then modified in the
//! same session appears once in `new` and once in `updated`.
//!
//! On disk a delta is projected to a smaller public shape ([`DeltaDocument`])
//! carrying links instead of the full summary.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::diff::{classify_lines, DiffAction, WorkingTreeStatus};
use super::id::{IdRegistry, RecordId};
use super::record::RecordSummary;
use super::time;

/// Which queue of a delta a record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeltaQueue {
    New,
    Updated,
    Unknown,
}

impl DeltaQueue {
    /// Maps a diff action to its queue
    pub fn for_action(action: DiffAction) -> Self {
        match action {
            DiffAction::Added => DeltaQueue::New,
            DiffAction::Modified => DeltaQueue::Updated,
            DiffAction::Other(_) => DeltaQueue::Unknown,
        }
    }
}

/// Supplies the summary stored for a classified record
///
/// The delta itself does no I/O; a source may read the record file at
/// `path` to fill in the details, or just echo the identifier.
pub trait SummarySource {
    fn summary(&self, id: &RecordId, path: &Path) -> RecordSummary;
}

/// Summary source that knows nothing but the identifier
#[derive(Debug, Clone, Copy, Default)]
pub struct IdOnly;

impl SummarySource for IdOnly {
    fn summary(&self, id: &RecordId, _path: &Path) -> RecordSummary {
        RecordSummary::from_id(id)
    }
}

/// One change report
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Delta {
    /// When the changes were fetched; set on write if still unset
    pub fetch_time: Option<DateTime<Utc>>,
    number_of_changes: usize,
    new: Vec<RecordSummary>,
    updated: Vec<RecordSummary>,
    unknown: Vec<RecordSummary>,
}

impl Delta {
    /// Creates an empty delta
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a delta that continues from `previous`, copying its queues
    pub fn from_previous(previous: &Delta) -> Self {
        let mut delta = previous.clone();
        delta.recount();
        delta
    }

    /// Total entries across all queues
    pub fn number_of_changes(&self) -> usize {
        self.number_of_changes
    }

    pub fn is_empty(&self) -> bool {
        self.number_of_changes == 0
    }

    pub fn new_records(&self) -> &[RecordSummary] {
        &self.new
    }

    pub fn updated_records(&self) -> &[RecordSummary] {
        &self.updated
    }

    pub fn unknown_records(&self) -> &[RecordSummary] {
        &self.unknown
    }

    /// Returns the records in a queue
    pub fn queue(&self, queue: DeltaQueue) -> &[RecordSummary] {
        match queue {
            DeltaQueue::New => &self.new,
            DeltaQueue::Updated => &self.updated,
            DeltaQueue::Unknown => &self.unknown,
        }
    }

    /// Adds a record to a queue.
    ///
    /// `New` and `Updated` replace an entry with the same identifier in
    /// place, or append. `Unknown` appends any record with an identifier.
    /// Returns false if the record was dropped.
    pub fn add(&mut self, record: RecordSummary, queue: DeltaQueue) -> bool {
        let stored = match queue {
            DeltaQueue::New => {
                add_or_replace(&mut self.new, record);
                true
            }
            DeltaQueue::Updated => {
                add_or_replace(&mut self.updated, record);
                true
            }
            DeltaQueue::Unknown => {
                if record.has_id() {
                    debug!(id = %record.id, "adding record to unknown queue");
                    self.unknown.push(record);
                    true
                } else {
                    warn!(?record, "dropping unclassified record without identifier");
                    false
                }
            }
        };
        self.recount();
        stored
    }

    /// Lets the caller refresh every summary in the `new` and `updated` queues
    pub fn hydrate_with<F>(&mut self, mut refresh: F)
    where
        F: FnMut(&RecordSummary) -> Option<RecordSummary>,
    {
        for item in self.new.iter_mut().chain(self.updated.iter_mut()) {
            if let Some(fresh) = refresh(item) {
                *item = fresh;
            }
        }
    }

    /// Folds raw diff lines into this delta.
    ///
    /// Paths are relative to `base_path`; lines that do not name a valid
    /// record are skipped. Returns the number of lines applied.
    pub fn classify_from_diff<'a, I>(
        &mut self,
        lines: I,
        base_path: &Path,
        registry: &IdRegistry,
        source: &dyn SummarySource,
    ) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        let changes = classify_lines(lines, registry);
        let applied = changes.len();
        for (id, action, path) in changes {
            let summary = source.summary(&id, &base_path.join(&path));
            self.add(summary, DeltaQueue::for_action(action));
        }
        applied
    }

    /// Builds a delta from uncommitted working-tree changes.
    ///
    /// Starts from a copy of `previous`; untracked paths under `dir` become
    /// new records and modified paths become updated records.
    pub fn from_status(
        previous: &Delta,
        status: &WorkingTreeStatus,
        dir: &str,
        base_path: &Path,
        registry: &IdRegistry,
        source: &dyn SummarySource,
    ) -> Self {
        let mut delta = Delta::from_previous(previous);
        let lists = [
            (&status.not_added, DeltaQueue::New),
            (&status.modified, DeltaQueue::Updated),
        ];

        for (paths, queue) in lists {
            for path in paths.iter().filter(|p| p.starts_with(dir)) {
                if let Some(id) = registry.resolve_path(path) {
                    delta.add(source.summary(&id, &base_path.join(path)), queue);
                }
            }
        }
        delta
    }

    /// Human-readable summary: total, then identifiers per queue
    pub fn summarize(&self) -> String {
        self.to_string()
    }

    /// Projects this delta to its persisted shape
    pub fn to_document(&self, links: &LinkTemplate) -> DeltaDocument {
        let project = |queue: &[RecordSummary]| -> Vec<DeltaItem> {
            queue
                .iter()
                .filter(|r| r.has_id())
                .map(|r| DeltaItem::project(r, links))
                .collect()
        };

        let new = project(&self.new);
        let updated = project(&self.updated);
        let unknown = project(&self.unknown);

        DeltaDocument {
            fetch_time: self.fetch_time,
            number_of_changes: new.len() + updated.len() + unknown.len(),
            new,
            updated,
            unknown,
        }
    }

    /// Rebuilds a delta from its persisted shape
    pub fn from_document(document: DeltaDocument) -> Self {
        let restore = |items: Vec<DeltaItem>| -> Vec<RecordSummary> {
            items.into_iter().map(DeltaItem::into_summary).collect()
        };

        let mut delta = Self {
            fetch_time: document.fetch_time,
            number_of_changes: 0,
            new: restore(document.new),
            updated: restore(document.updated),
            unknown: restore(document.unknown),
        };
        delta.recount();
        delta
    }

    fn recount(&mut self) {
        self.number_of_changes = self.new.len() + self.updated.len() + self.unknown.len();
    }
}

/// Replaces the entry with the same identifier, or appends
fn add_or_replace(queue: &mut Vec<RecordSummary>, record: RecordSummary) {
    match queue.iter_mut().find(|item| item.id == record.id) {
        Some(existing) => *existing = record,
        None => queue.push(record),
    }
}

fn join_ids(queue: &[RecordSummary]) -> String {
    queue
        .iter()
        .map(|r| r.id.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Delta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} changes ({} new | {} updated",
            self.number_of_changes,
            self.new.len(),
            self.updated.len()
        )?;
        if !self.unknown.is_empty() {
            write!(f, " | {} other files", self.unknown.len())?;
        }
        writeln!(f, "):")?;
        writeln!(f, "  - {} new: {}", self.new.len(), join_ids(&self.new))?;
        writeln!(f, "  - {} updated: {}", self.updated.len(), join_ids(&self.updated))?;
        if !self.unknown.is_empty() {
            writeln!(f, "  - {} other files: {}", self.unknown.len(), join_ids(&self.unknown))?;
        }
        Ok(())
    }
}

/// URL prefixes used when projecting records to their public shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkTemplate {
    /// Prefix of the human-facing page, followed by the identifier
    pub view_prefix: String,
    /// Prefix of the raw file, followed by `{storage path}.json`
    pub raw_prefix: String,
}

impl Default for LinkTemplate {
    fn default() -> Self {
        Self {
            view_prefix: "https://www.cve.org/CVERecord?id=".to_string(),
            raw_prefix: "https://raw.githubusercontent.com/CVEProject/cvelistV5/main/cves/".to_string(),
        }
    }
}

impl LinkTemplate {
    pub fn view_link(&self, id: &str) -> String {
        format!("{}{}", self.view_prefix, id)
    }

    pub fn raw_link(&self, id: &str) -> String {
        match id.parse::<RecordId>() {
            Ok(parsed) => format!("{}{}.json", self.raw_prefix, parsed.storage_path()),
            Err(_) => format!("{}{}.json", self.raw_prefix, id),
        }
    }
}

/// Public projection of one record in a persisted delta
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaItem {
    #[serde(alias = "cveId")]
    pub identifier: String,

    #[serde(default, alias = "cveOrgLink")]
    pub external_view_link: String,

    #[serde(default, alias = "githubLink")]
    pub external_raw_link: String,

    #[serde(
        default,
        alias = "dateUpdated",
        skip_serializing_if = "Option::is_none",
        with = "time::iso::option"
    )]
    pub last_updated: Option<DateTime<Utc>>,
}

impl DeltaItem {
    pub fn project(record: &RecordSummary, links: &LinkTemplate) -> Self {
        Self {
            identifier: record.id.clone(),
            external_view_link: links.view_link(&record.id),
            external_raw_link: links.raw_link(&record.id),
            last_updated: record.date_updated,
        }
    }

    pub fn into_summary(self) -> RecordSummary {
        RecordSummary {
            id: self.identifier,
            date_updated: self.last_updated,
            ..Default::default()
        }
    }
}

/// Persisted shape of a delta
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaDocument {
    #[serde(default, skip_serializing_if = "Option::is_none", with = "time::iso::option")]
    pub fetch_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub number_of_changes: usize,

    #[serde(default)]
    pub new: Vec<DeltaItem>,

    #[serde(default)]
    pub updated: Vec<DeltaItem>,

    #[serde(default)]
    pub unknown: Vec<DeltaItem>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn registry() -> IdRegistry {
        IdRegistry::new("ID", 1999, 2025, 2, 1970)
    }

    fn at(s: &str) -> DateTime<Utc> {
        time::parse_iso(s).unwrap()
    }

    #[test]
    fn document_counts_only_projected_items() {
        let mut delta = Delta::new();
        delta.add(RecordSummary::default(), DeltaQueue::New);
        delta.add(RecordSummary::new("ID-2023-0001"), DeltaQueue::Updated);
        assert_eq!(delta.number_of_changes(), 2);

        let doc = delta.to_document(&LinkTemplate::default());

        assert!(doc.new.is_empty());
        assert_eq!(doc.updated.len(), 1);
        assert_eq!(doc.number_of_changes, 1);
    }

    #[test]
    fn empty_delta_has_no_changes() {
        let delta = Delta::new();

        assert!(delta.is_empty());
        assert_eq!(delta.number_of_changes(), 0);
        assert!(delta.fetch_time.is_none());
    }

    #[test]
    fn add_new_replaces_same_identifier() {
        let mut delta = Delta::new();
        let first = RecordSummary::new("ID-2023-0001").updated_at(at("2023-02-16T00:00:00Z"));
        let second = RecordSummary::new("ID-2023-0001").updated_at(at("2023-02-16T01:00:00Z"));

        delta.add(first, DeltaQueue::New);
        delta.add(second.clone(), DeltaQueue::New);

        assert_eq!(delta.new_records(), &[second]);
        assert_eq!(delta.number_of_changes(), 1);
    }

    #[test]
    fn add_updated_keeps_latest_instance() {
        let mut delta = Delta::new();
        let d1 = at("2023-02-16T00:00:00Z");
        let d2 = at("2023-02-17T00:00:00Z");

        delta.add(RecordSummary::new("ID-2023-0007").updated_at(d1), DeltaQueue::Updated);
        delta.add(RecordSummary::new("ID-2023-0008"), DeltaQueue::Updated);
        delta.add(RecordSummary::new("ID-2023-0007").updated_at(d2), DeltaQueue::Updated);

        let updated = delta.updated_records();
        assert_eq!(updated.len(), 2);
        assert_eq!(updated[0].id, "ID-2023-0007");
        assert_eq!(updated[0].date_updated, Some(d2));
        assert_eq!(updated[1].id, "ID-2023-0008");
    }

    #[test]
    fn same_identifier_may_be_new_and_updated() {
        let mut delta = Delta::new();

        delta.add(RecordSummary::new("ID-2023-0001"), DeltaQueue::New);
        delta.add(RecordSummary::new("ID-2023-0001"), DeltaQueue::Updated);

        assert_eq!(delta.new_records().len(), 1);
        assert_eq!(delta.updated_records().len(), 1);
        assert_eq!(delta.number_of_changes(), 2);
    }

    #[test]
    fn unknown_queue_appends_and_drops_empty_ids() {
        let mut delta = Delta::new();

        assert!(delta.add(RecordSummary::new("ID-2023-0001"), DeltaQueue::Unknown));
        assert!(delta.add(RecordSummary::new("ID-2023-0001"), DeltaQueue::Unknown));
        assert!(!delta.add(RecordSummary::new(""), DeltaQueue::Unknown));

        assert_eq!(delta.unknown_records().len(), 2);
        assert_eq!(delta.number_of_changes(), 2);
    }

    #[test]
    fn from_previous_copies_queues() {
        let mut previous = Delta::new();
        previous.fetch_time = Some(at("2023-02-16T00:00:00Z"));
        previous.add(RecordSummary::new("ID-2023-0001"), DeltaQueue::New);

        let mut next = Delta::from_previous(&previous);
        next.add(RecordSummary::new("ID-2023-0002"), DeltaQueue::New);

        assert_eq!(previous.number_of_changes(), 1);
        assert_eq!(next.number_of_changes(), 2);
        assert_eq!(next.fetch_time, previous.fetch_time);
    }

    #[test]
    fn classify_from_diff_sorts_into_queues() {
        let lines = [
            ":000000 100644 0000000 a1b2c3d A\tcves/2023/1xxx/ID-2023-1275.json",
            ":100644 100644 a1b2c3d e4f5a6b M\tcves/2023/1xxx/ID-2023-1200.json",
            ":100644 100644 a1b2c3d e4f5a6b M\tcves/delta.json",
        ];
        let mut delta = Delta::new();

        let applied = delta.classify_from_diff(lines, Path::new("/repo"), &registry(), &IdOnly);

        assert_eq!(applied, 2);
        assert_eq!(delta.new_records()[0].id, "ID-2023-1275");
        assert_eq!(delta.updated_records()[0].id, "ID-2023-1200");
        assert!(delta.unknown_records().is_empty());
        assert_eq!(delta.number_of_changes(), 2);
    }

    #[test]
    fn classify_passes_full_path_to_source() {
        struct Recorder(std::cell::RefCell<Vec<std::path::PathBuf>>);
        impl SummarySource for Recorder {
            fn summary(&self, id: &RecordId, path: &Path) -> RecordSummary {
                self.0.borrow_mut().push(path.to_path_buf());
                RecordSummary::from_id(id)
            }
        }

        let recorder = Recorder(Default::default());
        let mut delta = Delta::new();
        delta.classify_from_diff(
            [":000000 100644 0000000 a1b2c3d A\t2023/1xxx/ID-2023-1275.json"],
            Path::new("/repo/cves"),
            &registry(),
            &recorder,
        );

        assert_eq!(
            recorder.0.into_inner(),
            vec![std::path::PathBuf::from("/repo/cves/2023/1xxx/ID-2023-1275.json")]
        );
    }

    #[test]
    fn from_status_filters_by_directory() {
        let status = WorkingTreeStatus {
            not_added: vec![
                "cves/2023/1xxx/ID-2023-1275.json".to_string(),
                "other/2023/1xxx/ID-2023-1276.json".to_string(),
            ],
            modified: vec![
                "cves/2023/1xxx/ID-2023-1200.json".to_string(),
                "cves/deltaLog.json".to_string(),
            ],
        };

        let delta = Delta::from_status(&Delta::new(), &status, "cves", Path::new("."), &registry(), &IdOnly);

        assert_eq!(delta.new_records().len(), 1);
        assert_eq!(delta.new_records()[0].id, "ID-2023-1275");
        assert_eq!(delta.updated_records().len(), 1);
        assert_eq!(delta.updated_records()[0].id, "ID-2023-1200");
    }

    #[test]
    fn summary_lists_identifiers_per_queue() {
        let mut delta = Delta::new();
        delta.add(RecordSummary::new("ID-2023-1275"), DeltaQueue::New);
        delta.add(RecordSummary::new("ID-2023-1200"), DeltaQueue::Updated);
        delta.add(RecordSummary::new("ID-2023-1201"), DeltaQueue::Updated);

        let text = delta.summarize();
        assert!(text.starts_with("3 changes (1 new | 2 updated):"));
        assert!(text.contains("  - 1 new: ID-2023-1275\n"));
        assert!(text.contains("  - 2 updated: ID-2023-1200, ID-2023-1201\n"));
        assert!(!text.contains("other files"));

        delta.add(RecordSummary::new("ID-2023-0042"), DeltaQueue::Unknown);
        assert!(delta.summarize().contains("| 1 other files):"));
    }

    #[test]
    fn document_uses_public_projection() {
        let mut delta = Delta::new();
        delta.fetch_time = Some(at("2023-02-16T00:00:00Z"));
        delta.add(
            RecordSummary::new("CVE-2023-1275").updated_at(at("2023-02-15T12:00:00Z")),
            DeltaQueue::New,
        );

        let json = serde_json::to_value(delta.to_document(&LinkTemplate::default())).unwrap();

        assert_eq!(json["fetchTime"], "2023-02-16T00:00:00.000Z");
        assert_eq!(json["numberOfChanges"], 1);
        assert_eq!(json["new"][0]["identifier"], "CVE-2023-1275");
        assert_eq!(json["new"][0]["externalViewLink"], "https://www.cve.org/CVERecord?id=CVE-2023-1275");
        assert_eq!(
            json["new"][0]["externalRawLink"],
            "https://raw.githubusercontent.com/CVEProject/cvelistV5/main/cves/2023/1xxx/CVE-2023-1275.json"
        );
        assert_eq!(json["new"][0]["lastUpdated"], "2023-02-15T12:00:00.000Z");
        assert_eq!(json["updated"], serde_json::json!([]));
    }

    #[test]
    fn document_roundtrip_keeps_queue_contents() {
        let mut delta = Delta::new();
        delta.add(RecordSummary::new("ID-2023-0001").updated_at(at("2023-02-15T12:00:00Z")), DeltaQueue::New);
        delta.add(RecordSummary::new("ID-2023-0002"), DeltaQueue::Updated);
        delta.add(RecordSummary::new("ID-2023-0003"), DeltaQueue::Unknown);

        let json = serde_json::to_string(&delta.to_document(&LinkTemplate::default())).unwrap();
        let restored = Delta::from_document(serde_json::from_str(&json).unwrap());

        assert_eq!(restored, delta);
    }

    #[test]
    fn document_accepts_legacy_field_names() {
        let json = r#"{
            "fetchTime": "2023-02-16T00:00:00.000Z",
            "numberOfChanges": 1,
            "new": [{
                "cveId": "CVE-2023-1275",
                "cveOrgLink": "https://www.cve.org/CVERecord?id=CVE-2023-1275",
                "githubLink": "https://example.invalid/CVE-2023-1275.json",
                "dateUpdated": "2023-02-15T12:00:00.000Z"
            }],
            "updated": []
        }"#;

        let delta = Delta::from_document(serde_json::from_str(json).unwrap());
        assert_eq!(delta.new_records()[0].id, "CVE-2023-1275");
        assert_eq!(delta.number_of_changes(), 1);
    }

    fn queue_strategy() -> impl Strategy<Value = DeltaQueue> {
        prop_oneof![Just(DeltaQueue::New), Just(DeltaQueue::Updated), Just(DeltaQueue::Unknown)]
    }

    proptest! {
        #[test]
        fn count_matches_queue_lengths(ops in prop::collection::vec((0u32..20, queue_strategy()), 0..60)) {
            let mut delta = Delta::new();
            for (n, queue) in ops {
                let id = if n == 0 { String::new() } else { format!("ID-2023-{:04}", n) };
                delta.add(RecordSummary::new(id), queue);
                prop_assert_eq!(
                    delta.number_of_changes(),
                    delta.new_records().len() + delta.updated_records().len() + delta.unknown_records().len()
                );
            }
        }

        #[test]
        fn classification_counts_ignore_line_order(
            entries in prop::collection::btree_map(1u32..5000, prop::sample::select(vec!['A', 'M', 'D']), 0..40),
            seed in any::<u64>(),
        ) {
            let lines: Vec<String> = entries
                .iter()
                .map(|(n, code)| format!(":100644 100644 a1b2c3d e4f5a6b {}\tcves/2023/{}xxx/ID-2023-{:04}.json", code, n / 1000, n))
                .collect();
            let mut shuffled = lines.clone();
            // deterministic rotation + reversal, driven by the seed
            let len = shuffled.len().max(1);
            shuffled.rotate_left((seed as usize) % len);
            if seed % 2 == 0 {
                shuffled.reverse();
            }

            let mut a = Delta::new();
            a.classify_from_diff(lines.iter().map(String::as_str), Path::new("."), &registry(), &IdOnly);
            let mut b = Delta::new();
            b.classify_from_diff(shuffled.iter().map(String::as_str), Path::new("."), &registry(), &IdOnly);

            prop_assert_eq!(a.new_records().len(), b.new_records().len());
            prop_assert_eq!(a.updated_records().len(), b.updated_records().len());
            prop_assert_eq!(a.unknown_records().len(), b.unknown_records().len());
            prop_assert_eq!(a.number_of_changes(), entries.len());
        }
    }
}
