//! CSV export and file delivery.

use crate::article::Article;
use crate::error::Result;
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// UTF-8 byte order mark, prepended so spreadsheet tools pick the right
/// encoding when opening the file.
const BOM: &str = "\u{feff}";

const HEADER: &str = "account,title,url,date";

/// Renders the collected articles as CSV text.
///
/// Every field is double-quoted with internal quotes doubled; the account
/// label repeats on each row so rows stay self-describing when the file
/// is concatenated or filtered.
pub fn render_csv(account: &str, articles: &[Article]) -> String {
    let mut out = String::with_capacity(BOM.len() + HEADER.len() + articles.len() * 64);
    out.push_str(BOM);
    out.push_str(HEADER);
    for article in articles {
        out.push('\n');
        out.push_str(&format!(
            "{},{},{},{}",
            quote(account),
            quote(&article.title),
            quote(&article.url),
            quote(&article.published.format("%Y-%m-%d").to_string()),
        ));
    }
    out
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// Builds the export file name, `{account}_{date}.csv`, replacing
/// path-hostile characters in the account label.
pub fn export_filename(account: &str, date: NaiveDate) -> String {
    let safe: String = account
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    format!("{}_{}.csv", safe.trim(), date.format("%Y-%m-%d"))
}

/// Delivers an export blob to its final location.
pub trait DownloadSink {
    /// Persists `bytes` under `filename`, returning the final path.
    fn deliver(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf>;
}

/// Writes exports into a directory, via a temporary file renamed into
/// place. The temporary is removed when the write fails.
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }
}

impl DownloadSink for DirectorySink {
    fn deliver(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let target = self.dir.join(filename);
        let tmp = self.dir.join(format!(".{filename}.tmp"));

        if let Err(e) = fs::write(&tmp, bytes) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&tmp, &target) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        info!(path = %target.display(), bytes = bytes.len(), "export delivered");
        Ok(target)
    }
}
