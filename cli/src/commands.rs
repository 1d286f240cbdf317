use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use api::{
    ConvertOptions, ImageFormat, ProcessedFile, ProcessedFiles, SplitOptions, VideoRequest,
    WatermarkOptions,
};
use client::monitor::{MonitorUpdate, UpdateKind};
use client::util::file_size;
use client::{MediaBackend, ProgressMonitor, UploadFile};

use crate::render;
use crate::settings::{resolve_api_url, SettingManager, Settings, API_URL_ENV};

/// Everything a backend command needs, resolved once per invocation.
pub struct App {
    pub backend: MediaBackend,
    pub settings: Settings,
}

impl App {
    fn out_dir(&self, out: Option<PathBuf>) -> PathBuf {
        out.unwrap_or_else(|| self.settings.download_dir.clone())
    }

    pub async fn remove_background(&self, files: &[PathBuf], out: Option<PathBuf>) -> Result<()> {
        let uploads = read_uploads(files).await?;
        let processed = self
            .backend
            .remove_background(&uploads)
            .await
            .context("Failed to remove background")?;
        self.save_all(&processed, out).await
    }

    pub async fn convert(
        &self,
        files: &[PathBuf],
        format: ImageFormat,
        width: Option<u32>,
        height: Option<u32>,
        out: Option<PathBuf>,
    ) -> Result<()> {
        let uploads = read_uploads(files).await?;
        let options = ConvertOptions {
            width,
            height,
            ..ConvertOptions::new(format)
        };
        let processed = self
            .backend
            .convert_image(&uploads, &options)
            .await
            .context("Failed to convert images")?;
        self.save_all(&processed, out).await
    }

    pub async fn info(&self, url: &str) -> Result<()> {
        let info = self
            .backend
            .video_info(url)
            .await
            .context("Failed to fetch video information")?;
        render::video_info(&info);
        Ok(())
    }

    /// Runs the download request while the monitor reports progress, then
    /// retrieves the finished file.
    pub async fn download(&self, request: VideoRequest, out: Option<PathBuf>) -> Result<()> {
        log::info!("Downloading {} through {}", request.url, self.backend.base_url());
        let source = Arc::new(self.backend.clone());
        let (mut monitor, mut updates) =
            ProgressMonitor::new(source, self.settings.monitor_config());
        monitor.start();
        let download = self.backend.download_video(&request);
        tokio::pin!(download);
        let mut failure = None;
        let result = loop {
            tokio::select! {
                result = &mut download => break result,
                Some(update) = updates.recv() => follow(update, &mut failure),
            }
        };
        monitor.stop();
        // progress that arrived alongside the response
        while let Ok(update) = updates.try_recv() {
            follow(update, &mut failure);
        }
        let video =
            result.with_context(|| failure.unwrap_or_else(|| "Failed to download".to_owned()))?;
        render::downloaded(&video);
        let path = self
            .backend
            .fetch_file(&video.download_path, &self.out_dir(out))
            .await
            .context("Failed to download the file")?;
        report_saved(&path).await;
        Ok(())
    }

    /// Follows whatever download the backend is running until it ends.
    pub async fn watch(&self) -> Result<()> {
        log::info!("Watching downloads on {}", self.backend.base_url());
        let source = Arc::new(self.backend.clone());
        let (mut monitor, mut updates) =
            ProgressMonitor::new(source, self.settings.monitor_config());
        monitor.start();
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        loop {
            tokio::select! {
                update = updates.recv() => {
                    let Some(update) = update else {
                        return Ok(());
                    };
                    render::update(&update);
                    match update.kind {
                        UpdateKind::Finished => return Ok(()),
                        // printed once, by the caller
                        UpdateKind::Failed(message) => return Err(anyhow!(message)),
                        _ => {}
                    }
                }
                _ = &mut ctrl_c => {
                    log::info!("Interrupted, no longer watching the download");
                    monitor.stop();
                    return Ok(());
                }
            }
        }
    }

    pub async fn progress(&self) -> Result<()> {
        let progress = self
            .backend
            .download_progress()
            .await
            .context("Failed to read download progress")?;
        match progress {
            Some(progress) => render::message(&render::progress_line(&progress)),
            None => render::message("No download in progress"),
        }
        Ok(())
    }

    pub async fn fetch(&self, name: &str, out: Option<PathBuf>) -> Result<()> {
        let path = self
            .backend
            .fetch_file(name, &self.out_dir(out))
            .await
            .context("Failed to download the file")?;
        report_saved(&path).await;
        Ok(())
    }

    pub async fn merge_pdfs(&self, files: &[PathBuf], out: Option<PathBuf>) -> Result<()> {
        let uploads = read_uploads(files).await?;
        let merged = self
            .backend
            .merge_pdfs(&uploads)
            .await
            .context("Failed to merge PDFs")?;
        self.save(&merged, out).await
    }

    pub async fn split_pdf(
        &self,
        file: &Path,
        options: &SplitOptions,
        out: Option<PathBuf>,
    ) -> Result<()> {
        let upload = read_upload(file).await?;
        let split = self
            .backend
            .split_pdf(&upload, options)
            .await
            .context("Failed to split PDF")?;
        self.save(&split, out).await
    }

    pub async fn add_watermark(
        &self,
        file: &Path,
        options: &WatermarkOptions,
        out: Option<PathBuf>,
    ) -> Result<()> {
        let upload = read_upload(file).await?;
        let marked = self
            .backend
            .add_watermark(&upload, options)
            .await
            .context("Failed to add watermark")?;
        self.save(&marked, out).await
    }

    async fn save_all(&self, processed: &ProcessedFiles, out: Option<PathBuf>) -> Result<()> {
        if let Some(message) = &processed.message {
            render::message(message);
        }
        let dir = self.out_dir(out);
        for file in &processed.files {
            let path = self
                .backend
                .fetch_processed(file, &dir)
                .await
                .context("Failed to download the file")?;
            report_saved(&path).await;
        }
        Ok(())
    }

    async fn save(&self, file: &ProcessedFile, out: Option<PathBuf>) -> Result<()> {
        let path = self
            .backend
            .fetch_processed(file, &self.out_dir(out))
            .await
            .context("Failed to download the file")?;
        report_saved(&path).await;
        Ok(())
    }
}

/// Renders an update of a running download and keeps the failure the
/// monitor reported, if any.
fn follow(update: MonitorUpdate, failure: &mut Option<String>) {
    render::update(&update);
    if let UpdateKind::Failed(message) = update.kind {
        *failure = Some(message);
    }
}

async fn report_saved(path: &Path) {
    render::saved(path, file_size(path).await);
}

async fn read_upload(path: &Path) -> Result<UploadFile> {
    UploadFile::from_path(path)
        .await
        .with_context(|| format!("Failed to read {}", path.to_string_lossy()))
}

async fn read_uploads(paths: &[PathBuf]) -> Result<Vec<UploadFile>> {
    let mut uploads = Vec::with_capacity(paths.len());
    for path in paths {
        uploads.push(read_upload(path).await?);
    }
    Ok(uploads)
}

pub async fn show_config(manager: &SettingManager, api_url: Option<&str>) -> Result<()> {
    let settings = manager.read().await.clone();
    let env = std::env::var(API_URL_ENV).ok();
    println!("Settings file: {}", manager.path().to_string_lossy());
    println!(
        "Backend: {}",
        resolve_api_url(api_url, env.as_deref(), &settings)
    );
    print!("{}", serde_yaml::to_string(&settings)?);
    Ok(())
}

pub async fn set_config(manager: &SettingManager, key: &str, value: &str) -> Result<()> {
    let mut settings = manager.read().await.clone();
    settings.set(key, value)?;
    manager
        .write(settings)
        .await
        .context("Failed to save settings")?;
    println!("Updated {}", key);
    Ok(())
}
