use std::path::Path;

use api::FormFields;
use reqwest::multipart::{Form, Part};

use super::{Error, Result};
use crate::util::{kb, local_name};

/// A local file queued for a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    pub async fn from_path(path: &Path) -> Result<Self> {
        let file_name = path
            .to_str()
            .and_then(local_name)
            .ok_or(Error::EmptyInput("file name"))?
            .to_owned();
        let bytes = tokio::fs::read(path).await?;
        log::debug!("Read {} for upload ({:.1} KB)", file_name, kb(bytes.len() as u64));
        Ok(Self { file_name, bytes })
    }

    fn part(&self) -> Part {
        Part::bytes(self.bytes.clone()).file_name(self.file_name.clone())
    }
}

pub(super) fn files_form(field: &'static str, files: &[UploadFile]) -> Form {
    files
        .iter()
        .fold(Form::new(), |form, file| form.part(field, file.part()))
}

pub(super) fn single_file_form(field: &'static str, file: &UploadFile) -> Form {
    with_file(Form::new(), field, file)
}

pub(super) fn with_file(form: Form, field: &'static str, file: &UploadFile) -> Form {
    form.part(field, file.part())
}

pub(super) fn with_fields(form: Form, fields: FormFields) -> Form {
    fields
        .into_iter()
        .fold(form, |form, (name, value)| form.text(name, value))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::util::TestResult;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[tokio::test]
    async fn reads_file_with_its_name() -> TestResult<()> {
        let tmp_dir = TempDir::new()?;
        let path = tmp_dir.path().join("cat.jpg");
        tokio::fs::write(&path, b"jpeg bytes").await?;
        let upload = UploadFile::from_path(&path).await?;
        assert_eq!(upload, UploadFile::new("cat.jpg", b"jpeg bytes".to_vec()));
        Ok(())
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let result = UploadFile::from_path(Path::new("/definitely/not/here.png")).await;
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
