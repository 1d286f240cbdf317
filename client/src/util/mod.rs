use reqwest::Url;
use std::error::Error;
use std::path::Path;

pub const ONE_SECOND: std::time::Duration = std::time::Duration::from_millis(1000);
pub type TestResult<T> = std::result::Result<T, Box<dyn Error>>;

/// Extracts filesize from path, if file does not exist or read fails the function returns 0
pub async fn file_size(fpath: &Path) -> u64 {
    match tokio::fs::metadata(fpath).await {
        Ok(metadata) => metadata.len(),
        _ => 0,
    }
}

/**
 * Parses the filename from a retrieval URL
 * Returns None if there is no filename or if url.path_segments() fails
 */
pub fn parse_filename(url: &Url) -> Option<&str> {
    let segments = url.path_segments()?;
    let filename = segments.last()?;
    if filename.is_empty() {
        None
    } else {
        Some(filename)
    }
}

/// Last path component of a name handed out by the backend, so a remote
/// name can never point outside the target directory.
pub fn local_name(remote: &str) -> Option<&str> {
    let name = Path::new(remote).file_name()?.to_str()?;
    match name {
        "" | "." | ".." => None,
        name => Some(name),
    }
}

pub fn kb(bytes: u64) -> f64 {
    bytes as f64 / 1024.0
}

pub fn mb(bytes: u64) -> f64 {
    bytes as f64 / 1024.0 / 1024.0
}

#[cfg(test)]
pub mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;
    use tokio::{fs::File, io::AsyncWriteExt};

    #[test]
    fn parse_filename_test() -> TestResult<()> {
        let url = Url::parse("http://localhost:8010/api/download/nobg_cat.png")?;
        let filename = parse_filename(&url).unwrap();
        assert_eq!(filename, "nobg_cat.png", "File name doesn't match!");
        let url = Url::parse("http://localhost:8010/")?;
        assert!(parse_filename(&url).is_none());
        Ok(())
    }

    #[test]
    fn local_name_strips_directories() {
        assert_eq!(local_name("clip.mp4"), Some("clip.mp4"));
        assert_eq!(local_name("downloads/clip.mp4"), Some("clip.mp4"));
        assert_eq!(local_name("../../etc/passwd"), Some("passwd"));
        assert_eq!(local_name(".."), None);
        assert_eq!(local_name(""), None);
    }

    #[test]
    fn byte_units() {
        assert_eq!(kb(2048), 2.0);
        assert_eq!(mb(3 * 1024 * 1024), 3.0);
    }

    #[tokio::test]
    async fn file_size_retrieval_test() -> TestResult<()> {
        // Setup
        let tmp_dir = TempDir::new()?;
        let fpath = tmp_dir.path().join("converted_cat.webp");
        // Create file and check that it's empty (size == 0)
        let mut file_handler = File::create(&fpath).await?;
        assert_eq!(
            file_size(fpath.as_path()).await,
            0,
            "Newly created file should have 0 Bytes!"
        );
        // Write some bytes to the buffer
        file_handler.write_all(b"b").await?;
        // Flush the buffer to the file
        file_handler.flush().await?;
        assert_eq!(
            file_size(&fpath).await,
            1,
            "File should have as many bytes as written in the buffer!"
        );
        Ok(())
    }
}
