//! Test utilities for creating, growing, truncating, and rotating temporary log files.

#[cfg(test)]
use std::fs::{self, File, OpenOptions};
#[cfg(test)]
use std::io::Write;
#[cfg(test)]
use std::path::{Path, PathBuf};

#[cfg(test)]
pub struct TempLogFile {
    pub path: PathBuf,
    _temp_dir: tempfile::TempDir,
}

#[cfg(test)]
impl TempLogFile {
    /// Create a new, empty temporary log file
    pub fn new() -> std::io::Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let path = temp_dir.path().join("test.log");

        File::create(&path)?;

        Ok(Self {
            path,
            _temp_dir: temp_dir,
        })
    }

    /// Create a temporary log file holding one line of content
    pub fn with_content(content: &str) -> std::io::Result<Self> {
        let temp_file = Self::new()?;
        temp_file.append_content(content)?;
        Ok(temp_file)
    }

    /// Append a line (content plus newline) to the file
    pub fn append_content(&self, content: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().append(true).open(&self.path)?;

        writeln!(file, "{}", content)?;
        file.flush()?;
        Ok(())
    }

    /// Append raw bytes without a trailing newline
    pub fn append_raw(&self, content: &[u8]) -> std::io::Result<()> {
        let mut file = OpenOptions::new().append(true).open(&self.path)?;

        file.write_all(content)?;
        file.flush()?;
        Ok(())
    }

    /// Open an append handle to the current inode, which stays valid after unlink
    pub fn writer(&self) -> std::io::Result<File> {
        OpenOptions::new().append(true).open(&self.path)
    }

    /// Truncate the file in place (copy-truncate rotation)
    pub fn truncate(&self) -> std::io::Result<()> {
        File::create(&self.path)?;
        Ok(())
    }

    /// Remove the file and create a fresh, empty one at the same path
    pub fn rotate(&self) -> std::io::Result<()> {
        fs::remove_file(&self.path)?;
        File::create(&self.path)?;
        Ok(())
    }

    /// Unlink the file, leaving the path empty
    pub fn remove(&self) -> std::io::Result<()> {
        fs::remove_file(&self.path)
    }

    /// Get the path to the temporary file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_log_file_creation() {
        let temp_file = TempLogFile::new().unwrap();
        assert!(temp_file.path().exists());
    }

    #[test]
    fn test_append_content() {
        let temp_file = TempLogFile::new().unwrap();
        temp_file.append_content("line 1").unwrap();
        temp_file.append_raw(b"line 2").unwrap();

        let content = fs::read_to_string(temp_file.path()).unwrap();
        assert_eq!(content, "line 1\nline 2");
    }

    #[test]
    fn test_truncate() {
        let temp_file = TempLogFile::with_content("initial content").unwrap();
        temp_file.truncate().unwrap();

        let content = fs::read_to_string(temp_file.path()).unwrap();
        assert!(content.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_rotate_replaces_file() {
        let temp_file = TempLogFile::with_content("initial content").unwrap();
        let mut old = temp_file.writer().unwrap();

        temp_file.rotate().unwrap();
        old.write_all(b"orphaned").unwrap();

        let content = fs::read_to_string(temp_file.path()).unwrap();
        assert!(content.is_empty());
    }

    #[test]
    fn test_remove() {
        let temp_file = TempLogFile::new().unwrap();
        temp_file.remove().unwrap();
        assert!(!temp_file.path().exists());
    }
}
