//! Lamport clocks persisted under `.git/quire/clocks/<name>`
//!
//! Each clock is a small file holding a decimal counter. Reads and writes
//! happen under an exclusive file lock so concurrent commands in the same
//! clone never hand out the same time twice.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;
use libquire_core::LamportTime;

use crate::error::GitError;

const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct PersistedClock {
    path: PathBuf,
}

impl PersistedClock {
    pub fn new(dir: &Path, name: &str) -> Self {
        Self {
            path: dir.join(name),
        }
    }

    pub fn time(&self) -> Result<LamportTime, GitError> {
        self.update(Ok).map(LamportTime)
    }

    /// Advance by one and return the new time. An exhausted clock is an
    /// error and stays where it is.
    pub fn increment(&self) -> Result<LamportTime, GitError> {
        self.update(|t| {
            LamportTime(t)
                .next()
                .map(|next| next.0)
                .ok_or_else(|| {
                    GitError::Clock(format!("lamport clock {} exhausted", self.path.display()))
                })
        })
        .map(LamportTime)
    }

    /// Move forward to `time` if behind it
    pub fn witness(&self, time: LamportTime) -> Result<(), GitError> {
        self.update(|t| Ok(t.max(time.0))).map(|_| ())
    }

    fn update<F>(&self, f: F) -> Result<u64, GitError>
    where
        F: FnOnce(u64) -> Result<u64, GitError>,
    {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;
        lock_blocking(&file, &self.path)?;

        let mut content = String::new();
        file.read_to_string(&mut content)?;
        let current = match content.trim() {
            "" => 0,
            s => s.parse::<u64>().map_err(|e| {
                GitError::Clock(format!("corrupt clock {}: {}", self.path.display(), e))
            })?,
        };

        let next = f(current)?;
        if next != current {
            file.set_len(0)?;
            file.seek(SeekFrom::Start(0))?;
            file.write_all(next.to_string().as_bytes())?;
            file.sync_data()?;
        }
        // lock is released when `file` is dropped
        Ok(next)
    }
}

fn lock_blocking(file: &File, path: &Path) -> Result<(), GitError> {
    let start = Instant::now();
    let mut delay = Duration::from_millis(5);
    loop {
        match file.try_lock_exclusive() {
            Ok(()) => return Ok(()),
            Err(_) if start.elapsed() < LOCK_TIMEOUT => {
                std::thread::sleep(delay);
                delay = (delay * 2).min(Duration::from_millis(100));
            }
            Err(e) => {
                return Err(GitError::Clock(format!(
                    "timeout waiting for clock lock {}: {}",
                    path.display(),
                    e
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_increment_and_witness() {
        let dir = tempdir().unwrap();
        let clock = PersistedClock::new(dir.path(), "identity");

        assert_eq!(clock.time().unwrap(), LamportTime(0));
        assert_eq!(clock.increment().unwrap(), LamportTime(1));
        assert_eq!(clock.increment().unwrap(), LamportTime(2));

        clock.witness(LamportTime(10)).unwrap();
        assert_eq!(clock.time().unwrap(), LamportTime(10));

        // witnessing the past never moves the clock back
        clock.witness(LamportTime(3)).unwrap();
        assert_eq!(clock.increment().unwrap(), LamportTime(11));
    }

    #[test]
    fn test_clock_survives_reopen() {
        let dir = tempdir().unwrap();
        PersistedClock::new(dir.path(), "identity").increment().unwrap();
        PersistedClock::new(dir.path(), "identity").increment().unwrap();

        let clock = PersistedClock::new(dir.path(), "identity");
        assert_eq!(clock.time().unwrap(), LamportTime(2));
    }

    #[test]
    fn test_concurrent_increments_are_unique() {
        let dir = tempdir().unwrap();
        let path = dir.path().to_path_buf();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let clock = PersistedClock::new(&path, "identity");
                    (0..10)
                        .map(|_| clock.increment().unwrap().0)
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        assert_eq!(all, (1..=40).collect::<Vec<_>>());
    }

    #[test]
    fn test_exhausted_clock_is_an_error() {
        let dir = tempdir().unwrap();
        let clock = PersistedClock::new(dir.path(), "identity");
        clock.witness(LamportTime(u64::MAX)).unwrap();

        assert!(matches!(clock.increment(), Err(GitError::Clock(_))));
        assert_eq!(clock.time().unwrap(), LamportTime(u64::MAX));
    }

    #[test]
    fn test_corrupt_clock_is_an_error() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("identity"), "not a number").unwrap();
        let clock = PersistedClock::new(dir.path(), "identity");
        assert!(matches!(clock.increment(), Err(GitError::Clock(_))));
    }
}
