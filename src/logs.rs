// file: src/logs.rs
// version: 1.0.1
// guid: 6e9b3a72-f1d5-4c08-b7a4-0d2e8c5f9a31

//! SSH login log viewer

use crate::{KangarooError, Result};
use std::io::{ErrorKind, SeekFrom};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// What to show
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogQuery {
    /// First lines instead of last
    pub head: bool,
    pub lines: usize,
    pub follow: bool,
    /// Substring filter applied to the selected lines
    pub search: Option<String>,
}

impl Default for LogQuery {
    fn default() -> Self {
        Self {
            head: false,
            lines: 10,
            follow: false,
            search: None,
        }
    }
}

impl LogQuery {
    fn matches(&self, line: &str) -> bool {
        match self.search.as_deref() {
            Some(needle) if !needle.is_empty() => line.contains(needle),
            _ => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogView {
    Missing,
    Lines(Vec<String>),
}

pub struct LoginLog {
    path: PathBuf,
}

impl LoginLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Lines selected by `query`, ignoring `follow`
    pub fn snapshot(&self, query: &LogQuery) -> Result<LogView> {
        let content = match std::fs::read(&self.path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(LogView::Missing),
            Err(e) => return Err(e.into()),
        };

        if query.head && query.follow {
            return Err(KangarooError::validation(
                "Cannot use --head and --follow together.",
            ));
        }

        let all: Vec<&str> = content.lines().collect();
        let selected = if query.head {
            &all[..query.lines.min(all.len())]
        } else {
            &all[all.len().saturating_sub(query.lines)..]
        };

        Ok(LogView::Lines(
            selected
                .iter()
                .filter(|l| query.matches(l))
                .map(|l| l.to_string())
                .collect(),
        ))
    }

    /// Stream lines appended after the current end of file until cancelled
    pub async fn follow(&self, query: &LogQuery, on_line: impl FnMut(&str)) -> Result<()> {
        self.follow_every(query, POLL_INTERVAL, on_line).await
    }

    async fn follow_every(
        &self,
        query: &LogQuery,
        interval: Duration,
        mut on_line: impl FnMut(&str),
    ) -> Result<()> {
        let mut file = tokio::fs::File::open(&self.path).await?;
        let mut position = file.seek(SeekFrom::End(0)).await?;
        let mut pending = String::new();

        loop {
            tokio::time::sleep(interval).await;

            let len = tokio::fs::metadata(&self.path).await?.len();
            if len < position {
                debug!("{} was truncated, reading from start", self.path.display());
                position = file.seek(SeekFrom::Start(0)).await?;
                pending.clear();
            }

            let mut buf = Vec::new();
            position += file.read_to_end(&mut buf).await? as u64;
            pending.push_str(&String::from_utf8_lossy(&buf));

            while let Some(idx) = pending.find('\n') {
                let line: String = pending.drain(..=idx).collect();
                let line = line.trim_end_matches(['\n', '\r']);
                if query.matches(line) {
                    on_line(line);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn write_log(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("ssh_login.log");
        let lines: Vec<String> = (1..=15)
            .map(|i| format!("2024-01-0{} user{} 10.0.0.{} login", i % 9 + 1, i % 3, i))
            .collect();
        std::fs::write(&path, lines.join("\n") + "\n").unwrap();
        path
    }

    fn lines(view: LogView) -> Vec<String> {
        match view {
            LogView::Lines(lines) => lines,
            LogView::Missing => panic!("log missing"),
        }
    }

    #[test]
    fn test_missing_log() -> Result<()> {
        let log = LoginLog::new("/nonexistent/kangaroo.log");
        assert_eq!(log.snapshot(&LogQuery::default())?, LogView::Missing);
        Ok(())
    }

    #[test]
    fn test_tail_and_head() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let log = LoginLog::new(write_log(&dir));

        let tail = lines(log.snapshot(&LogQuery::default())?);
        assert_eq!(tail.len(), 10);
        assert!(tail[0].contains("10.0.0.6 "));
        assert!(tail[9].contains("10.0.0.15 "));

        let head = lines(log.snapshot(&LogQuery {
            head: true,
            lines: 3,
            ..Default::default()
        })?);
        assert_eq!(head.len(), 3);
        assert!(head[0].contains("10.0.0.1 "));
        Ok(())
    }

    #[test]
    fn test_search_filters_selected_window() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let log = LoginLog::new(write_log(&dir));

        let found = lines(log.snapshot(&LogQuery {
            lines: 100,
            search: Some("user0".to_string()),
            ..Default::default()
        })?);
        assert_eq!(found.len(), 5);
        assert!(found.iter().all(|l| l.contains("user0")));
        Ok(())
    }

    #[test]
    fn test_head_with_follow_rejected() {
        let dir = TempDir::new().unwrap();
        let log = LoginLog::new(write_log(&dir));

        let err = log
            .snapshot(&LogQuery {
                head: true,
                follow: true,
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, KangarooError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_follow_streams_new_lines() {
        let dir = TempDir::new().unwrap();
        let path = write_log(&dir);
        let log = LoginLog::new(&path);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        let query = LogQuery {
            search: Some("alice".to_string()),
            ..Default::default()
        };
        let follower = async move {
            log.follow_every(&query, Duration::from_millis(20), |line| {
                sink.lock().unwrap().push(line.to_string())
            })
            .await
        };
        let writer = async {
            tokio::time::sleep(Duration::from_millis(60)).await;
            use std::io::Write;
            let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
            writeln!(f, "alice 10.0.0.99 login").unwrap();
            writeln!(f, "bob 10.0.0.98 login").unwrap();
            tokio::time::sleep(Duration::from_millis(200)).await;
        };

        tokio::select! {
            res = follower => panic!("follow ended: {res:?}"),
            _ = writer => {}
        }

        assert_eq!(*seen.lock().unwrap(), vec!["alice 10.0.0.99 login".to_string()]);
    }
}
