//! Cargo-style progress output on stderr
//!
//! ```text
//!     Creating /www/css
//!    Uploading /www/css/site.css (6 B)
//!      Skipped /www/index.html
//!       Synced 2 files (1.20 KiB), 1 unchanged in 42ms
//! ```

use std::io::Write as _;
use std::time::Instant;

use ftpsync_core::{EntryKind, SyncObserver, SyncOutcome, SyncReport, TreeEntry};

/// Status verbs for cargo-style output (right-aligned to 12 chars)
struct Status;

impl Status {
    const CREATING: &str = "Creating";
    const UPLOADING: &str = "Uploading";
    const SKIPPED: &str = "Skipped";
    const FAILED: &str = "Failed";
    const SYNCED: &str = "Synced";
}

/// Print a cargo-style status line
fn print_status(status: &str, message: &str, style: &console::Style) {
    let mut term = console::Term::stderr();
    let _ = writeln!(term, "{:>12} {}", style.apply_to(status), message);
}

fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Reports each tree entry as it is processed
pub struct SyncProgress {
    start: Instant,
    uploaded: usize,
    unchanged: usize,
    bytes: u64,
    ok: console::Style,
    dim: console::Style,
    failed: console::Style,
}

impl SyncProgress {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            uploaded: 0,
            unchanged: 0,
            bytes: 0,
            ok: console::Style::new().green().bold(),
            dim: console::Style::new().dim().bold(),
            failed: console::Style::new().red().bold(),
        }
    }

    fn print_summary(&self) {
        let elapsed = self.start.elapsed();
        let elapsed_str = if elapsed.as_secs() >= 1 {
            format!("{:.2}s", elapsed.as_secs_f64())
        } else {
            format!("{}ms", elapsed.as_millis())
        };

        print_status(
            Status::SYNCED,
            &format!(
                "{} files ({}), {} unchanged in {elapsed_str}",
                self.uploaded,
                format_size(self.bytes),
                self.unchanged
            ),
            &self.ok,
        );
    }
}

impl Default for SyncProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncObserver for SyncProgress {
    fn upload_started(&mut self, entry: &TreeEntry) {
        let size = match entry.kind {
            EntryKind::File { len } => format_size(len),
            EntryKind::Directory => String::new(),
        };
        print_status(
            Status::UPLOADING,
            &format!("{} ({size})", entry.remote),
            &self.ok,
        );
    }

    fn entry_done(&mut self, entry: &TreeEntry, outcome: SyncOutcome) {
        match outcome {
            SyncOutcome::DirectoryCreated => {
                print_status(Status::CREATING, &entry.remote, &self.ok);
            }
            SyncOutcome::DirectoryPresent => {}
            SyncOutcome::FileUploaded => {
                self.uploaded += 1;
                if let EntryKind::File { len } = entry.kind {
                    self.bytes += len;
                }
            }
            SyncOutcome::FileSkipped => {
                self.unchanged += 1;
                print_status(Status::SKIPPED, &entry.remote, &self.dim);
            }
            SyncOutcome::FileUploadFailed | SyncOutcome::DirectoryFailed => {
                print_status(Status::FAILED, &entry.remote, &self.failed);
            }
        }
    }

    fn finished(&mut self, _report: &SyncReport) {
        self.print_summary();
    }
}
