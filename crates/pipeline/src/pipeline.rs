//! The in-memory state of one invocation and the commands that evolve it.

use crate::apply::{Plan, Report};
use crate::command::Command;
use crate::error::{ErrorKind, Result};
use crate::extract::Extraction;
use crate::fields::{FieldRef, FieldTable};
use crate::group::{Group, group_using};
use crate::infold::Folder;
use crate::record::FileRecord;
use crate::rename::RenameOp;
use crate::select::Expression;
use crate::sort::sort_by;
use crate::template::RecordScope;
use exn::ResultExt;
use foldr_storage::BackendRef;
use time::UtcOffset;
use tracing::instrument;

#[derive(Clone, Debug)]
pub struct Options {
    /// Joins the parts of a composite `{group}` key
    pub separator: String,
    /// Offset timestamps are read in
    pub offset: UtcOffset,
    /// Plan moves without touching the filesystem
    pub dry_run: bool,
}
impl Default for Options {
    fn default() -> Self {
        Self {
            separator: " ".to_string(),
            offset: UtcOffset::UTC,
            dry_run: false,
        }
    }
}

/// Selection, field table, grouping and pending plan of one invocation.
///
/// Every command either succeeds completely or leaves the state as it was.
pub struct Pipeline<'a> {
    backend: BackendRef<'a>,
    options: Options,
    table: FieldTable,
    records: Vec<FileRecord>,
    groups: Vec<Group>,
    selected: bool,
    reports: Vec<Report>,
}
impl<'a> Pipeline<'a> {
    pub fn new(backend: BackendRef<'a>, options: Options) -> Self {
        Self {
            backend,
            options,
            table: FieldTable::default(),
            records: Vec::new(),
            groups: Vec::new(),
            selected: false,
            reports: Vec::new(),
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn table(&self) -> &FieldTable {
        &self.table
    }

    /// Selected files in their current order.
    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    /// Groups of the live grouping, empty before `group using`.
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn reports(&self) -> &[Report] {
        &self.reports
    }

    /// Replace the working set with the files the expression holds for.
    ///
    /// An empty expression selects every file.
    #[instrument(skip_all, fields(backend = self.backend.name()))]
    pub fn select(&mut self, expression: &Expression) -> Result<()> {
        let paths = self
            .backend
            .list()
            .or_raise(|| ErrorKind::Filesystem(self.backend.name().into()))?;
        let candidates = paths.into_iter().map(FileRecord::new).collect();
        self.records = expression.filter(candidates, self.backend, self.options.offset)?;
        self.table = FieldTable::default();
        self.groups.clear();
        self.selected = true;
        tracing::info!(selected = self.records.len(), "selection made");
        Ok(())
    }

    fn ensure_selected(&mut self) -> Result<()> {
        if !self.selected {
            tracing::debug!("no selection given, selecting every file");
            self.select(&Expression::default())?;
        }
        Ok(())
    }

    /// Append the columns of `extraction`, named `name`, to the field table.
    #[instrument(skip_all, fields(name = name))]
    pub fn extract(&mut self, extraction: &Extraction, name: Option<&str>) -> Result<()> {
        self.ensure_selected()?;
        let mut table = self.table.clone();
        for column in extraction.columns(name) {
            table.push(column)?;
        }
        let rows = extraction.rows(&mut self.records, self.backend, self.options.offset)?;
        for (record, row) in self.records.iter_mut().zip(rows) {
            record.values.extend(row);
        }
        self.table = table;
        tracing::debug!(columns = self.table.len(), "fields extracted");
        Ok(())
    }

    pub fn sort_by(&mut self, keys: &[FieldRef], reverse: bool) -> Result<()> {
        self.ensure_selected()?;
        let columns = self.table.resolve(keys)?;
        sort_by(&self.table, &mut self.records, &columns, reverse, &self.options.separator)
    }

    pub fn group_using(&mut self, keys: &[FieldRef]) -> Result<()> {
        self.ensure_selected()?;
        let columns = self.table.resolve(keys)?;
        self.groups = group_using(&self.table, &mut self.records, &columns, &self.options.separator)?;
        Ok(())
    }

    /// Change the pending file name of every record.
    #[instrument(skip_all)]
    pub fn rename(&mut self, op: &RenameOp) -> Result<()> {
        self.ensure_selected()?;
        let names = self
            .records
            .iter()
            .map(|record| {
                let scope = RecordScope { table: &self.table, record, separator: &self.options.separator };
                op.apply(&record.pending().name(), &scope)
            })
            .collect::<Result<Vec<_>>>()?;
        for (record, name) in self.records.iter_mut().zip(names) {
            tracing::trace!(file = %record.path().display(), pending = %name, "renamed");
            record.pending.rename_to(name);
        }
        Ok(())
    }

    /// Nest every record one folder deeper.
    #[instrument(skip_all)]
    pub fn infold(&mut self, folder: &Folder) -> Result<()> {
        self.ensure_selected()?;
        let separator = match folder {
            Folder::Template { joinchar: Some(joinchar), .. } => joinchar.as_str(),
            _ => self.options.separator.as_str(),
        };
        let segments = self
            .records
            .iter()
            .map(|record| folder.segment(&RecordScope { table: &self.table, record, separator }))
            .collect::<Result<Vec<_>>>()?;
        for (record, segment) in self.records.iter_mut().zip(segments) {
            record.pending.folders.push(segment.into());
        }
        Ok(())
    }

    /// The moves `apply` would make, checked for collisions.
    pub fn plan(&self) -> Result<Plan> {
        let plan = Plan::new(&self.records)?;
        plan.check(&self.records, self.backend)?;
        Ok(plan)
    }

    /// Move every record to its pending path.
    #[instrument(skip_all, fields(dry_run = self.options.dry_run))]
    pub fn apply(&mut self) -> Result<&Report> {
        self.ensure_selected()?;
        let plan = self.plan()?;
        let report = match self.options.dry_run {
            true => Report::planned(&plan),
            false => plan.execute(&mut self.records, self.backend)?,
        };
        tracing::info!(moves = report.moves.len(), unchanged = report.unchanged, "applied");
        self.reports.push(report);
        Ok(&self.reports[self.reports.len() - 1])
    }

    pub fn execute(&mut self, command: &Command) -> Result<()> {
        match command {
            Command::Select(expression) => self.select(expression),
            Command::Extract { extraction, name } => self.extract(extraction, name.as_deref()),
            Command::Sort { keys, reverse } => self.sort_by(keys, *reverse),
            Command::Group { keys } => self.group_using(keys),
            Command::Rename(op) => self.rename(op),
            Command::Infold(folder) => self.infold(folder),
            Command::Apply => self.apply().map(|_| ()),
        }
    }

    /// Run `commands` in order, stopping at the first failure.
    pub fn run<'c>(&mut self, commands: impl IntoIterator<Item = &'c Command>) -> Result<&[Report]> {
        for command in commands {
            self.execute(command)?;
        }
        self.ensure_selected()?;
        Ok(&self.reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandParser;
    use crate::value::Precision;
    use foldr_storage::backend::MockBackend;
    use std::path::PathBuf;
    use time::macros::datetime;

    fn run(backend: &MockBackend, line: &str) -> Result<Vec<Report>> {
        let script = CommandParser::default().parse(line.split_whitespace())?;
        let mut pipeline = Pipeline::new(backend, Options::default());
        Ok(pipeline.run(&script.commands)?.to_vec())
    }

    fn pending(pipeline: &Pipeline<'_>) -> Vec<PathBuf> {
        pipeline.records().iter().map(|r| r.pending().target()).collect()
    }

    #[test]
    fn test_ctime_grouping() {
        let same = datetime!(2024-01-01 08:00 UTC);
        let later = datetime!(2024-01-02 09:00 UTC);
        let backend = MockBackend::with_files([("a.jpg", ""), ("b.jpg", ""), ("c.jpg", ""), ("d.jpg", "")])
            .with_times("a.jpg", same, same)
            .with_times("b.jpg", later, later)
            .with_times("c.jpg", same, same)
            .with_times("d.jpg", same, same);
        let script = CommandParser::default()
            .parse("extract ctime -v ctime group using -v ctime infold folder-template {ctime}".split_whitespace())
            .unwrap();
        let mut pipeline = Pipeline::new(&backend, Options::default());
        pipeline.run(&script.commands).unwrap();
        let sizes: Vec<_> = pipeline.groups().iter().map(|g| g.size).collect();
        assert_eq!(sizes, [3, 1]);
        let slots: Vec<_> = pipeline.records().iter().map(|r| r.slot().map(|s| (s.index, s.subindex))).collect();
        assert_eq!(slots, [Some((0, 0)), Some((1, 0)), Some((0, 1)), Some((0, 2))]);
        assert_eq!(
            pending(&pipeline),
            [
                PathBuf::from("2024-01-01/a.jpg"),
                PathBuf::from("2024-01-02/b.jpg"),
                PathBuf::from("2024-01-01/c.jpg"),
                PathBuf::from("2024-01-01/d.jpg")
            ]
        );
    }

    #[test]
    fn test_hourly_precision_splits_groups() {
        let backend = MockBackend::with_files([("a", ""), ("b", "")])
            .with_times("a", datetime!(2024-01-01 08:10 UTC), datetime!(2024-01-01 08:10 UTC))
            .with_times("b", datetime!(2024-01-01 09:10 UTC), datetime!(2024-01-01 09:10 UTC));
        let parser = CommandParser { precision: Precision::Hours, ..CommandParser::default() };
        let script = parser.parse(["extract", "ctime", "group", "using", "--all"]).unwrap();
        let mut pipeline = Pipeline::new(&backend, Options::default());
        pipeline.run(&script.commands).unwrap();
        assert_eq!(pipeline.groups().len(), 2);
    }

    #[test]
    fn test_failed_extraction_leaves_state_untouched() {
        let backend = MockBackend::with_files([("a.txt", ""), ("b.txt", "")]);
        let mut pipeline = Pipeline::new(&backend, Options::default());
        pipeline.extract(&Extraction::Name, Some("n")).unwrap();
        let err = pipeline.extract(&Extraction::Extension, Some("n")).unwrap_err();
        assert!(matches!(&*err, ErrorKind::DuplicateFieldName(_)));
        assert_eq!(pipeline.table().labels(), ["n"]);
        assert!(pipeline.records().iter().all(|r| r.values().len() == 1));
    }

    #[test]
    fn test_failed_rename_leaves_names_untouched() {
        let backend = MockBackend::with_files([("a.txt", ""), ("b.txt", "")]);
        let script = CommandParser::default().parse(["rename", "format", "{nope}"]).unwrap();
        let mut pipeline = Pipeline::new(&backend, Options::default());
        let err = pipeline.run(&script.commands).unwrap_err();
        assert!(matches!(&*err, ErrorKind::MissingField(_)));
        assert_eq!(pending(&pipeline), [PathBuf::from("a.txt"), PathBuf::from("b.txt")]);
    }

    #[test]
    fn test_group_join_character() {
        let backend = MockBackend::with_files([("x-1.txt", "")]);
        let line = "extract matching (\\w)-(\\d) -v p group using --all \
                    infold folder-template {group} --joinchar + folder-template {group}";
        let script = CommandParser::default().parse(line.split_whitespace()).unwrap();
        let mut pipeline = Pipeline::new(&backend, Options::default());
        pipeline.run(&script.commands).unwrap();
        assert_eq!(pending(&pipeline), [PathBuf::from("x+1/x 1/x-1.txt")]);
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let backend = MockBackend::with_files([("a.txt", ""), ("b.txt", "")]);
        let script = CommandParser::default().parse("infold folder-name A apply".split_whitespace()).unwrap();
        let options = Options { dry_run: true, ..Options::default() };
        let mut pipeline = Pipeline::new(&backend, options);
        let reports = pipeline.run(&script.commands).unwrap();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].dry_run);
        assert_eq!(reports[0].moves.len(), 2);
        assert_eq!(backend.paths(), [PathBuf::from("a.txt"), PathBuf::from("b.txt")]);
    }

    #[test]
    fn test_apply_then_continue() {
        let backend = MockBackend::with_files([("a.txt", "")]);
        let reports = run(&backend, "infold folder-name A apply rename upper infold apply").unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[1].moves[0].from, PathBuf::from("A/a.txt"));
        assert_eq!(backend.paths(), [PathBuf::from("A/A.txt")]);
    }

    #[test]
    fn test_empty_directory() {
        let backend = MockBackend::default();
        let reports = run(&backend, "select contains a infold folder-name A apply").unwrap();
        assert!(reports[0].moves.is_empty());
    }
}
