pub mod config;
mod upload;

use std::path::{Path, PathBuf};

use api::{
    ConvertOptions, DownloadProgress, DownloadedVideo, ErrorDetail, ProcessedFile,
    ProcessedFiles, SplitOptions, VideoInfo, VideoRequest, WatermarkKind, WatermarkOptions,
};
use futures_util::{Stream, StreamExt};
use reqwest::multipart::Form;
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::util::{local_name, mb, parse_filename};

use self::config::BackendConfig;
pub use self::upload::UploadFile;
use self::upload::{files_form, single_file_form, with_fields, with_file};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Request error: '{0}'")]
    Transport(#[from] reqwest::Error),
    #[error("Backend answered '{status}': '{detail}'")]
    Status { status: StatusCode, detail: String },
    #[error("Malformed response body: '{0}'")]
    Malformed(#[from] serde_json::Error),
    #[error("File IO operation failed, error: '{0}'")]
    Io(#[from] std::io::Error),
    #[error("Invalid url: '{0}'")]
    InvalidUrl(String),
    #[error("Nothing to send, missing {0}")]
    EmptyInput(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Upper bound for `download-video`, which only answers once the backend
/// has the whole file.
const DOWNLOAD_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60 * 60);

/// Async client for the media backend. Cheap to clone, the inner reqwest
/// client is reference counted.
#[derive(Debug, Clone)]
pub struct MediaBackend {
    base_url: Url,
    client: Client,
}

impl MediaBackend {
    pub fn new(base_url: &str, config: Option<BackendConfig>) -> Result<Self> {
        // If no configuration is passed the default one is used
        let config = config.unwrap_or_default();
        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(config.headers)
            .build()?;
        Self::with_client(base_url, client)
    }

    pub fn with_client(base_url: &str, client: Client) -> Result<Self> {
        let mut base_url =
            Url::parse(base_url).map_err(|e| Error::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::InvalidUrl(base_url.to_string()));
        }
        // endpoints are joined relative to the base, keep its path prefix
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        log::info!("Media backend at {}", base_url);
        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| Error::InvalidUrl(format!("{path}: {e}")))
    }

    /// `api/download/<name>` with the name percent-encoded as one segment.
    fn retrieval_url(&self, name: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["api", "download", name]);
        Ok(url)
    }

    async fn post_form<T: DeserializeOwned>(&self, path: &str, form: Form) -> Result<T> {
        let url = self.endpoint(path)?;
        log::info!("POST {}", url);
        let resp = self.client.post(url).multipart(form).send().await?;
        read_json(resp).await
    }

    pub async fn remove_background(&self, files: &[UploadFile]) -> Result<ProcessedFiles> {
        if files.is_empty() {
            return Err(Error::EmptyInput("files"));
        }
        self.post_form("api/remove-background", files_form("files", files))
            .await
    }

    pub async fn convert_image(
        &self,
        files: &[UploadFile],
        options: &ConvertOptions,
    ) -> Result<ProcessedFiles> {
        if files.is_empty() {
            return Err(Error::EmptyInput("files"));
        }
        let form = with_fields(files_form("files", files), options.form_fields());
        self.post_form("api/convert-image", form).await
    }

    pub async fn video_info(&self, url: &str) -> Result<VideoInfo> {
        let url = non_empty_url(url)?;
        let form = Form::new().text("url", url.to_owned());
        self.post_form("api/get-video-info", form).await
    }

    /// Resolves once the backend finished the whole download, which can
    /// take minutes; progress is observed separately through
    /// [`MediaBackend::download_progress`].
    pub async fn download_video(&self, request: &VideoRequest) -> Result<DownloadedVideo> {
        non_empty_url(&request.url)?;
        let url = self.endpoint("api/download-video")?;
        log::info!("POST {} for {}", url, request.url);
        // the backend holds the response until the download is complete
        let resp = self
            .client
            .post(url)
            .multipart(with_fields(Form::new(), request.form_fields()))
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await?;
        read_json(resp).await
    }

    /// `Ok(None)` when the backend reports no download at all.
    pub async fn download_progress(&self) -> Result<Option<DownloadProgress>> {
        let resp = self
            .client
            .get(self.endpoint("api/download-progress")?)
            .send()
            .await?;
        let body = check_status(resp).await?.bytes().await?;
        decode_progress(&body)
    }

    pub async fn merge_pdfs(&self, files: &[UploadFile]) -> Result<ProcessedFile> {
        if files.is_empty() {
            return Err(Error::EmptyInput("files"));
        }
        self.post_form("api/pdf/merge", files_form("files", files))
            .await
    }

    pub async fn split_pdf(
        &self,
        file: &UploadFile,
        options: &SplitOptions,
    ) -> Result<ProcessedFile> {
        let form = with_fields(single_file_form("file", file), options.form_fields());
        self.post_form("api/pdf/split", form).await
    }

    pub async fn add_watermark(
        &self,
        file: &UploadFile,
        options: &WatermarkOptions,
    ) -> Result<ProcessedFile> {
        let mut form = with_fields(single_file_form("file", file), options.form_fields());
        if let WatermarkKind::Image(path) = &options.kind {
            let image = UploadFile::from_path(path).await?;
            form = with_file(form, "watermark_image", &image);
        }
        self.post_form("api/pdf/add-watermark", form).await
    }

    /// Retrieves a file by the name the backend handed out and writes it to
    /// `dest_dir`, returning the written path.
    pub async fn fetch_file(&self, name: &str, dest_dir: &Path) -> Result<PathBuf> {
        let file_name = local_name(name).ok_or(Error::EmptyInput("file name"))?;
        let url = self.retrieval_url(file_name)?;
        self.download_to(url, dest_dir.join(file_name)).await
    }

    /// Like [`MediaBackend::fetch_file`] but follows the retrieval path of a
    /// processed file as given.
    pub async fn fetch_processed(
        &self,
        file: &ProcessedFile,
        dest_dir: &Path,
    ) -> Result<PathBuf> {
        let url = self.endpoint(&file.url)?;
        let file_name = local_name(&file.filename)
            .or_else(|| parse_filename(&url))
            .ok_or(Error::EmptyInput("file name"))?
            .to_owned();
        self.download_to(url, dest_dir.join(file_name)).await
    }

    async fn download_to(&self, url: Url, file_path: PathBuf) -> Result<PathBuf> {
        log::info!("GET {} -> {}", url, file_path.to_string_lossy());
        let resp = check_status(self.client.get(url.clone()).send().await?).await?;
        if let Some(parent) = file_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let downloaded_bytes = save_stream(resp.bytes_stream(), &file_path).await?;
        log::info!(
            "Retrieved {} successfully, {:.2}MB",
            url,
            mb(downloaded_bytes)
        );
        Ok(file_path)
    }
}

/// Writes the body to `file_path`, removing the partial file when the
/// stream or a write fails.
async fn save_stream<S, B>(stream: S, file_path: &Path) -> Result<u64>
where
    S: Stream<Item = reqwest::Result<B>>,
    B: AsRef<[u8]>,
{
    match write_stream(stream, file_path).await {
        Ok(written) => Ok(written),
        Err(e) => {
            log::error!(
                "Writing {} failed, removing partial file: {}",
                file_path.to_string_lossy(),
                e
            );
            if let Err(remove) = tokio::fs::remove_file(file_path).await {
                log::warn!("Could not remove {}: {}", file_path.to_string_lossy(), remove);
            }
            Err(e)
        }
    }
}

async fn write_stream<S, B>(stream: S, file_path: &Path) -> Result<u64>
where
    S: Stream<Item = reqwest::Result<B>>,
    B: AsRef<[u8]>,
{
    tokio::pin!(stream);
    let mut file_handler = File::create(file_path).await?;
    let mut downloaded_bytes = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file_handler.write_all(chunk.as_ref()).await?;
        downloaded_bytes += chunk.as_ref().len() as u64;
    }
    file_handler.flush().await?;
    Ok(downloaded_bytes)
}

fn non_empty_url(url: &str) -> Result<&str> {
    let url = url.trim();
    if url.is_empty() {
        Err(Error::EmptyInput("url"))
    } else {
        Ok(url)
    }
}

async fn check_status(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorDetail>(&body)
        .map(|e| e.detail)
        .unwrap_or(body);
    log::error!("Backend request failed with {}: {}", status, detail);
    Err(Error::Status { status, detail })
}

async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T> {
    let body = check_status(resp).await?.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

/// An empty body and a JSON `null` both mean nothing is in progress.
pub(crate) fn decode_progress(body: &[u8]) -> Result<Option<DownloadProgress>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    Ok(serde_json::from_slice::<Option<DownloadProgress>>(body)?)
}
