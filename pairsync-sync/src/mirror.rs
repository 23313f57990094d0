//! One-way mirror tool adapter.
//!
//! The executor never copies file contents itself: additions and updates are
//! handed, one direction at a time, to a [`Mirror`]. [`RsyncMirror`] drives an
//! external `rsync` with an itemized file list and buffers its output.

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::Serialize;
use tempfile::NamedTempFile;

use pairsync_core::MirrorSettings;

use pairsync_core::tree;

use crate::error::{io_err, SyncError};

// ---------------------------------------------------------------------------
// Request / outcome
// ---------------------------------------------------------------------------

/// One mirror invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorRequest {
    pub from: PathBuf,
    pub to: PathBuf,
    /// `None` mirrors the whole tree; `Some` mirrors exactly these relative
    /// paths (directories included as their own entries).
    pub files: Option<Vec<String>>,
    /// Remove destination items missing from `from`. Whole-tree only.
    pub delete: bool,
    pub dry_run: bool,
    /// Paths neither copied nor deleted, on either side.
    pub exclude: Vec<MirrorExclude>,
}

/// A relative path the mirror must leave alone.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum MirrorExclude {
    /// A directory and everything below it.
    Dir(String),
    /// A single file or symlink.
    File(String),
    /// Every file directly inside a directory. Subdirectories are not affected.
    FilesIn(String),
}

impl MirrorExclude {
    /// True when the entry at `rel` falls under this rule.
    pub fn covers(&self, rel: &str, is_dir: bool) -> bool {
        match self {
            MirrorExclude::Dir(dir) => {
                rel == dir || rel.strip_prefix(dir.as_str()).is_some_and(|r| r.starts_with('/'))
            }
            MirrorExclude::File(path) => rel == path,
            MirrorExclude::FilesIn(dir) => !is_dir && tree::split(rel).0 == dir,
        }
    }
}

/// Whether `path` can be written as one line of a mirror file list.
pub fn is_listable(path: &str) -> bool {
    !path.contains(['\n', '\r'])
}

/// How a mirror invocation ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MirrorOutcome {
    Transferred { changes: Vec<ItemizedChange> },
    /// Exit success with nothing to report.
    AlreadySynced,
    /// Non-zero exit, killed by a signal, or the tool could not run.
    Failed { code: Option<i32>, stderr: String },
}

impl MirrorOutcome {
    /// Whether the listed entries can be committed to the snapshot.
    pub fn is_success(&self) -> bool {
        !matches!(self, MirrorOutcome::Failed { .. })
    }
}

/// Anything able to copy a file list from one root to another.
pub trait Mirror {
    fn mirror(&self, request: &MirrorRequest) -> Result<MirrorOutcome, SyncError>;
}

// ---------------------------------------------------------------------------
// Itemized output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
    Message,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Created => "created",
            ChangeKind::Updated => "updated",
            ChangeKind::Deleted => "deleted",
            ChangeKind::Message => "note",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    File,
    Dir,
    Symlink,
    Device,
    Special,
    Unknown,
}

/// One line of `--itemize-changes` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemizedChange {
    pub change: ChangeKind,
    pub file_type: ItemType,
    pub path: String,
}

const FLAGS_LEN: usize = 11;

/// Parse rsync `--itemize-changes` output.
///
/// Each relevant line is an 11 character flag field, one space, then the
/// path (which may itself contain spaces). Lines for unchanged items and
/// anything that is not an itemized line are dropped.
pub fn parse_itemized(stdout: &str) -> Vec<ItemizedChange> {
    stdout.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<ItemizedChange> {
    let flags = line.get(..FLAGS_LEN)?;
    if line.as_bytes().get(FLAGS_LEN) != Some(&b' ') {
        return None;
    }
    let path = line.get(FLAGS_LEN + 1..)?.to_string();
    if path.is_empty() {
        return None;
    }

    let mut chars = flags.chars();
    let update = chars.next()?;
    let kind = chars.next()?;

    if update == '*' {
        let change = if flags.starts_with("*deleting") {
            ChangeKind::Deleted
        } else {
            ChangeKind::Message
        };
        let file_type = if path.ends_with('/') {
            ItemType::Dir
        } else {
            ItemType::File
        };
        return Some(ItemizedChange {
            change,
            file_type,
            path,
        });
    }

    if !matches!(update, '<' | '>' | 'c' | 'h') {
        return None;
    }
    let file_type = match kind {
        'f' => ItemType::File,
        'd' => ItemType::Dir,
        'L' => ItemType::Symlink,
        'D' => ItemType::Device,
        'S' => ItemType::Special,
        _ => ItemType::Unknown,
    };
    let change = if flags.chars().skip(2).all(|c| c == '+') {
        ChangeKind::Created
    } else {
        ChangeKind::Updated
    };
    Some(ItemizedChange {
        change,
        file_type,
        path,
    })
}

// ---------------------------------------------------------------------------
// RsyncMirror
// ---------------------------------------------------------------------------

/// Runs `rsync -a --itemize-changes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsyncMirror {
    program: PathBuf,
    extra_args: Vec<String>,
}

impl RsyncMirror {
    pub fn new(settings: &MirrorSettings) -> Self {
        Self {
            program: settings.program.clone(),
            extra_args: settings.extra_args.clone(),
        }
    }

    fn args(&self, request: &MirrorRequest, files_from: Option<&Path>) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-a".into(), "--itemize-changes".into()];
        if let Some(list) = files_from {
            let mut flag = OsString::from("--files-from=");
            flag.push(list);
            args.push(flag);
        } else if request.delete {
            // rsync rejects --delete without recursion, which a file list turns off.
            args.push("--delete".into());
        }
        if request.dry_run {
            args.push("--dry-run".into());
        }
        args.extend(exclude_args(&request.exclude));
        args.extend(self.extra_args.iter().map(OsString::from));
        args.push(with_trailing_slash(&request.from));
        args.push(with_trailing_slash(&request.to));
        args
    }
}

impl Default for RsyncMirror {
    fn default() -> Self {
        Self::new(&MirrorSettings::default())
    }
}

impl Mirror for RsyncMirror {
    fn mirror(&self, request: &MirrorRequest) -> Result<MirrorOutcome, SyncError> {
        let list = match &request.files {
            Some(files) => Some(write_file_list(files)?),
            None => None,
        };
        let args = self.args(request, list.as_ref().map(NamedTempFile::path));

        tracing::info!(
            "mirror {} -> {} ({} entries{})",
            request.from.display(),
            request.to.display(),
            request
                .files
                .as_ref()
                .map_or_else(|| "all".to_string(), |f| f.len().to_string()),
            if request.dry_run { ", dry run" } else { "" }
        );

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| SyncError::MirrorSpawn {
                program: self.program.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            tracing::warn!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                stderr.trim()
            );
            return Ok(MirrorOutcome::Failed {
                code: output.status.code(),
                stderr: stderr.into_owned(),
            });
        }
        if stdout.trim().is_empty() && stderr.trim().is_empty() {
            return Ok(MirrorOutcome::AlreadySynced);
        }
        Ok(MirrorOutcome::Transferred {
            changes: parse_itemized(&stdout),
        })
    }
}

/// Sorted, newline terminated, one `./`-prefixed path per line. rsync reads
/// lines starting with `#` or `;` as comments, the prefix keeps such names.
fn write_file_list(files: &[String]) -> Result<NamedTempFile, SyncError> {
    let mut sorted: Vec<&str> = files.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();
    if let Some(bad) = sorted.iter().find(|path| !is_listable(path)) {
        return Err(SyncError::InvalidInput(format!(
            "path with a line break cannot be listed: {bad:?}"
        )));
    }

    let mut list = NamedTempFile::new().map_err(|e| io_err(std::env::temp_dir(), e))?;
    for path in sorted {
        writeln!(list, "./{path}").map_err(|e| io_err(list.path(), e))?;
    }
    list.flush().map_err(|e| io_err(list.path(), e))?;
    Ok(list)
}

/// Anchored rsync filter rules. Plain excludes come first so the
/// directory includes needed for [`MirrorExclude::FilesIn`] cannot re-admit
/// an excluded directory.
fn exclude_args(excludes: &[MirrorExclude]) -> Vec<OsString> {
    let mut plain = Vec::new();
    let mut files_in = Vec::new();
    for exclude in excludes {
        match exclude {
            MirrorExclude::Dir(dir) => plain.push(format!("--exclude=/{}/", escape_pattern(dir))),
            MirrorExclude::File(path) => plain.push(format!("--exclude=/{}", escape_pattern(path))),
            MirrorExclude::FilesIn(dir) => {
                let prefix = if dir.is_empty() {
                    String::new()
                } else {
                    format!("{}/", escape_pattern(dir))
                };
                files_in.push(format!("--include=/{prefix}*/"));
                files_in.push(format!("--exclude=/{prefix}*"));
            }
        }
    }
    plain.into_iter().chain(files_in).map(OsString::from).collect()
}

/// rsync treats `*`, `?` and `[` as wildcards; escape them in literal names.
fn escape_pattern(rel: &str) -> String {
    if !rel.contains(['*', '?', '[']) {
        return rel.to_string();
    }
    let mut escaped = String::with_capacity(rel.len() + 4);
    for c in rel.chars() {
        if matches!(c, '*' | '?' | '[' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn with_trailing_slash(path: &Path) -> OsString {
    let mut s = path.as_os_str().to_owned();
    if !s.to_string_lossy().ends_with('/') {
        s.push("/");
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(files: Option<Vec<String>>, delete: bool, dry_run: bool) -> MirrorRequest {
        MirrorRequest {
            from: PathBuf::from("/a"),
            to: PathBuf::from("/b/"),
            files,
            delete,
            dry_run,
            exclude: Vec::new(),
        }
    }

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn whole_tree_request_propagates_deletes() {
        let mirror = RsyncMirror::default();
        let args = strings(&mirror.args(&request(None, true, false), None));
        assert_eq!(args, vec!["-a", "--itemize-changes", "--delete", "/a/", "/b/"]);
    }

    #[test]
    fn listed_request_never_deletes() {
        let mirror = RsyncMirror::new(&MirrorSettings {
            program: PathBuf::from("rsync"),
            extra_args: vec!["--checksum".to_string()],
        });
        let args = strings(&mirror.args(
            &request(Some(vec!["x".into()]), true, true),
            Some(Path::new("/tmp/list")),
        ));
        assert_eq!(
            args,
            vec![
                "-a",
                "--itemize-changes",
                "--files-from=/tmp/list",
                "--dry-run",
                "--checksum",
                "/a/",
                "/b/"
            ]
        );
    }

    #[test]
    fn file_list_is_sorted_and_newline_terminated() {
        let list = write_file_list(&["b/c".to_string(), "a".to_string(), "a".to_string()]).unwrap();
        let contents = std::fs::read_to_string(list.path()).unwrap();
        assert_eq!(contents, "./a\n./b/c\n");
    }

    #[test]
    fn file_list_keeps_names_rsync_would_read_as_comments() {
        let list = write_file_list(&[
            "#todo.txt".to_string(),
            ";x".to_string(),
            "notes/#draft".to_string(),
        ])
        .unwrap();
        let contents = std::fs::read_to_string(list.path()).unwrap();
        assert_eq!(contents, "./#todo.txt\n./;x\n./notes/#draft\n");
        assert!(contents.lines().all(|line| line.starts_with("./")));
    }

    #[test]
    fn file_list_refuses_line_breaks() {
        assert!(!is_listable("bad\nname"));
        assert!(!is_listable("bad\rname"));
        assert!(is_listable("#fine;name"));
        let err = write_file_list(&["ok".to_string(), "two\nlines".to_string()]).unwrap_err();
        assert!(matches!(err, SyncError::InvalidInput(_)), "got: {err}");
    }

    #[test]
    fn excludes_become_anchored_rules_before_file_rules() {
        let mut req = request(None, true, false);
        req.exclude = vec![
            MirrorExclude::FilesIn("cache".into()),
            MirrorExclude::Dir("build".into()),
            MirrorExclude::File("conf/local[1].cfg".into()),
        ];
        let args = strings(&RsyncMirror::default().args(&req, None));
        assert_eq!(
            args,
            vec![
                "-a",
                "--itemize-changes",
                "--delete",
                "--exclude=/build/",
                "--exclude=/conf/local\\[1].cfg",
                "--include=/cache/*/",
                "--exclude=/cache/*",
                "/a/",
                "/b/"
            ]
        );
    }

    #[test]
    fn exclude_coverage() {
        let dir = MirrorExclude::Dir("build".into());
        assert!(dir.covers("build", true));
        assert!(dir.covers("build/out/x.o", false));
        assert!(!dir.covers("buildx", false));

        let files_in = MirrorExclude::FilesIn("cache".into());
        assert!(files_in.covers("cache/a.bin", false));
        assert!(!files_in.covers("cache/sub", true));
        assert!(!files_in.covers("cache/sub/a.bin", false));

        assert!(MirrorExclude::File("a.txt".into()).covers("a.txt", false));
    }

    #[test]
    fn parses_created_updated_and_deleted_lines() {
        let out = "\
cd+++++++++ docs/
>f+++++++++ docs/my report.txt
>f.st...... shared/report.csv
cL+++++++++ link -> target
.d..t...... ./
*deleting   old notes.txt
sent 120 bytes  received 35 bytes
";
        let changes = parse_itemized(out);
        assert_eq!(
            changes,
            vec![
                ItemizedChange {
                    change: ChangeKind::Created,
                    file_type: ItemType::Dir,
                    path: "docs/".into()
                },
                ItemizedChange {
                    change: ChangeKind::Created,
                    file_type: ItemType::File,
                    path: "docs/my report.txt".into()
                },
                ItemizedChange {
                    change: ChangeKind::Updated,
                    file_type: ItemType::File,
                    path: "shared/report.csv".into()
                },
                ItemizedChange {
                    change: ChangeKind::Created,
                    file_type: ItemType::Symlink,
                    path: "link -> target".into()
                },
                ItemizedChange {
                    change: ChangeKind::Deleted,
                    file_type: ItemType::File,
                    path: "old notes.txt".into()
                },
            ]
        );
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use tempfile::TempDir;

        fn mirror_with(program: impl Into<PathBuf>) -> RsyncMirror {
            RsyncMirror::new(&MirrorSettings {
                program: program.into(),
                extra_args: Vec::new(),
            })
        }

        #[test]
        fn silent_success_is_already_synced() {
            let outcome = mirror_with("true")
                .mirror(&request(Some(vec!["a".into()]), false, false))
                .unwrap();
            assert_eq!(outcome, MirrorOutcome::AlreadySynced);
        }

        #[test]
        fn any_output_is_transferred() {
            let outcome = mirror_with("echo")
                .mirror(&request(None, false, false))
                .unwrap();
            assert!(matches!(outcome, MirrorOutcome::Transferred { .. }), "got: {outcome:?}");
            assert!(outcome.is_success());
        }

        #[test]
        fn non_zero_exit_is_failed_with_code() {
            let outcome = mirror_with("false")
                .mirror(&request(None, false, false))
                .unwrap();
            assert!(matches!(outcome, MirrorOutcome::Failed { code: Some(1), .. }));
            assert!(!outcome.is_success());
        }

        #[test]
        fn missing_program_is_spawn_error() {
            let dir = TempDir::new().unwrap();
            let err = mirror_with(dir.path().join("no-such-tool"))
                .mirror(&request(None, false, false))
                .unwrap_err();
            assert!(matches!(err, SyncError::MirrorSpawn { .. }), "got: {err}");
        }
    }
}
