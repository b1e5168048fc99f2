// src/core/file_builder.rs

//! The output writer: accumulates the text of exactly one generated file,
//! then commits it through the build cache. Byte-identical content is never
//! rewritten, so downstream build tools — which treat modification times as
//! dirty signals — do not see spurious changes.

use crate::core::database::Database;
use crate::core::paths;
use crate::core::project::GenerateError;
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

pub struct FileBuilder {
    file: PathBuf,
    text: String,
}

impl FileBuilder {
    pub fn new(directory: &Path, file_name: &str) -> Self {
        Self::for_file(directory.join(file_name))
    }

    pub fn for_file(file: PathBuf) -> Self {
        Self {
            file,
            text: String::new(),
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn append(&mut self, text: &str) {
        self.text.push_str(text);
    }

    pub fn append_char(&mut self, ch: char) {
        self.text.push(ch);
    }

    /// Appends one byte as two lowercase hex digits.
    pub fn append_hex(&mut self, byte: u8) {
        self.text.push_str(&hex::encode([byte]));
    }

    pub(crate) fn buffered_text(&self) -> &str {
        &self.text
    }

    /// Writes the buffered text to disk, unless the build cache shows the
    /// file already holds exactly these bytes.
    pub fn commit(self, database: &Database) -> Result<(), GenerateError> {
        let bytes = self.text.as_bytes();
        let hash = blake3::hash(bytes);
        let changed = database.did_output_file_change(&self.file, hash.as_bytes())?;

        if !changed && self.file.exists() {
            debug!("skipping unchanged file \"{}\"", self.file.display());
            return Ok(());
        }

        if let Some(parent) = self.file.parent() {
            fs::create_dir_all(parent)?;
        }

        println!(
            "Writing {}",
            paths::relative_to(database.directory(), &self.file).display()
        );
        fs::write(&self.file, bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    fn modified(path: &Path) -> std::time::SystemTime {
        fs::metadata(path).unwrap().modified().unwrap()
    }

    #[test]
    fn identical_content_does_not_touch_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let database = Database::open(dir.path()).unwrap();
        let target = dir.path().join("out/CMakeLists.txt");

        let mut builder = FileBuilder::for_file(target.clone());
        builder.append("content v1\n");
        builder.commit(&database).unwrap();
        let first_write = modified(&target);

        sleep(Duration::from_millis(100));

        let mut builder = FileBuilder::for_file(target.clone());
        builder.append("content v1\n");
        builder.commit(&database).unwrap();

        assert_eq!(modified(&target), first_write);
        assert_eq!(fs::read_to_string(&target).unwrap(), "content v1\n");
    }

    #[test]
    fn changed_content_rewrites_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let database = Database::open(dir.path()).unwrap();
        let target = dir.path().join("generated.txt");

        let mut builder = FileBuilder::for_file(target.clone());
        builder.append("content v1\n");
        builder.commit(&database).unwrap();

        let mut builder = FileBuilder::for_file(target.clone());
        builder.append("content v2\n");
        builder.commit(&database).unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "content v2\n");
    }

    #[test]
    fn deleted_file_is_rewritten_even_when_hash_matches() {
        let dir = tempfile::tempdir().unwrap();
        let database = Database::open(dir.path()).unwrap();
        let target = dir.path().join("generated.txt");

        let mut builder = FileBuilder::for_file(target.clone());
        builder.append("content\n");
        builder.commit(&database).unwrap();

        fs::remove_file(&target).unwrap();

        let mut builder = FileBuilder::for_file(target.clone());
        builder.append("content\n");
        builder.commit(&database).unwrap();
        assert!(target.exists());
    }

    #[test]
    fn hex_append_writes_lowercase_pairs() {
        let mut builder = FileBuilder::for_file(PathBuf::from("unused"));
        builder.append_hex(0x0f);
        builder.append_hex(0xa0);
        assert_eq!(builder.buffered_text(), "0fa0");
    }
}
