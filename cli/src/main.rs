mod commands;
mod render;
mod settings;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use api::{ImageFormat, SplitOptions, SplitType, VideoRequest, WatermarkKind, WatermarkOptions};
use clap::{Parser, Subcommand};
use client::backend::config::BackendConfig;
use client::MediaBackend;

use commands::App;
use settings::{resolve_api_url, SettingManager, API_URL_ENV};

#[derive(Parser)]
#[command(name = "mediatools", version)]
#[command(about = "Command line front end for the media tools backend", long_about = None)]
struct Cli {
    /// Backend base url, takes precedence over MEDIA_TOOLS_API_URL and the settings file
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Settings file, defaults to ~/.mediatools/settings.yaml
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Remove the background of one or more images
    RemoveBg {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Directory the results are saved to
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Convert images to another format, optionally resizing them
    Convert {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(short, long)]
        format: ImageFormat,
        #[arg(long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Show title, duration and available formats of a video
    Info { url: String },
    /// Download a video or its audio track while showing progress
    Download {
        url: String,
        #[arg(long, conflicts_with = "audio_only")]
        format_id: Option<String>,
        /// Extract the audio track as mp3
        #[arg(long)]
        audio_only: bool,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Follow the download the backend is running until it ends
    Watch,
    /// Print the backend's current download progress once
    Progress,
    /// Retrieve a file the backend produced
    Fetch {
        name: String,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    #[command(subcommand)]
    Pdf(PdfCommand),
    #[command(subcommand)]
    Config(ConfigCommand),
}

/// PDF tools
#[derive(Subcommand)]
enum PdfCommand {
    /// Merge documents in the given order
    Merge {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Split a document by ranges, single pages or a fixed interval
    Split {
        file: PathBuf,
        #[arg(long = "type")]
        split_type: SplitType,
        /// e.g. `1-3,4-6` for ranges or `2` for an interval
        #[arg(long = "value")]
        split_value: String,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Stamp a text or image watermark over every page
    Watermark {
        file: PathBuf,
        #[arg(long, required_unless_present = "image", conflicts_with = "image")]
        text: Option<String>,
        #[arg(long)]
        image: Option<PathBuf>,
        #[arg(long, default_value_t = 30)]
        font_size: u32,
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        rotation: i32,
        #[arg(long, default_value_t = 0.5)]
        opacity: f32,
        #[arg(long, default_value_t = 50)]
        width_spacer: u32,
        #[arg(long, default_value_t = 50)]
        height_spacer: u32,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

/// Inspect or change the settings file
#[derive(Subcommand)]
enum ConfigCommand {
    Show,
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::debug!("Command failed: {:?}", e);
            render::failure(&e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let manager = SettingManager::load(cli.settings).await?;
    let command = match cli.command {
        Command::Config(ConfigCommand::Show) => {
            return commands::show_config(&manager, cli.api_url.as_deref()).await
        }
        Command::Config(ConfigCommand::Set { key, value }) => {
            return commands::set_config(&manager, &key, &value).await
        }
        command => command,
    };
    let settings = manager.read().await.clone();
    let env = std::env::var(API_URL_ENV).ok();
    let api_url = resolve_api_url(cli.api_url.as_deref(), env.as_deref(), &settings);
    let config = BackendConfig::with_timeout(settings.request_timeout());
    let backend = MediaBackend::new(&api_url, Some(config))
        .with_context(|| format!("Failed to connect to {}", api_url))?;
    let app = App { backend, settings };
    match command {
        Command::RemoveBg { files, out } => app.remove_background(&files, out).await,
        Command::Convert {
            files,
            format,
            width,
            height,
            out,
        } => app.convert(&files, format, width, height, out).await,
        Command::Info { url } => app.info(&url).await,
        Command::Download {
            url,
            format_id,
            audio_only,
            out,
        } => {
            let request = if audio_only {
                VideoRequest::audio(url)
            } else {
                VideoRequest::video(url, format_id)
            };
            app.download(request, out).await
        }
        Command::Watch => app.watch().await,
        Command::Progress => app.progress().await,
        Command::Fetch { name, out } => app.fetch(&name, out).await,
        Command::Pdf(PdfCommand::Merge { files, out }) => app.merge_pdfs(&files, out).await,
        Command::Pdf(PdfCommand::Split {
            file,
            split_type,
            split_value,
            out,
        }) => {
            let options = SplitOptions {
                split_type,
                split_value,
            };
            app.split_pdf(&file, &options, out).await
        }
        Command::Pdf(PdfCommand::Watermark {
            file,
            text,
            image,
            font_size,
            rotation,
            opacity,
            width_spacer,
            height_spacer,
            out,
        }) => {
            let kind = match (text, image) {
                (Some(text), _) => WatermarkKind::Text(text),
                (None, Some(image)) => WatermarkKind::Image(image),
                (None, None) => anyhow::bail!("Either --text or --image is required"),
            };
            let options = WatermarkOptions {
                font_size,
                rotation,
                opacity,
                width_spacer,
                height_spacer,
                ..WatermarkOptions::new(kind)
            };
            app.add_watermark(&file, &options, out).await
        }
        Command::Config(_) => Ok(()),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;
    use test_log::test;

    #[test]
    fn command_line_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn audio_only_excludes_format_id() {
        let parsed = Cli::try_parse_from([
            "mediatools",
            "download",
            "https://videos.example.com/bbb",
            "--audio-only",
            "--format-id",
            "22",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn parses_pdf_watermark() {
        let cli = Cli::try_parse_from([
            "mediatools",
            "--api-url",
            "http://media.local:8010",
            "pdf",
            "watermark",
            "report.pdf",
            "--text",
            "DRAFT",
            "--rotation",
            "-45",
        ])
        .unwrap();
        assert_eq!(cli.api_url.as_deref(), Some("http://media.local:8010"));
        match cli.command {
            Command::Pdf(PdfCommand::Watermark {
                text, rotation, font_size, ..
            }) => {
                assert_eq!(text.as_deref(), Some("DRAFT"));
                assert_eq!(rotation, -45);
                assert_eq!(font_size, 30);
            }
            _ => panic!("Expected pdf watermark"),
        }
    }

    #[test]
    fn rejects_unknown_image_format() {
        let parsed = Cli::try_parse_from(["mediatools", "convert", "a.png", "--format", "svg"]);
        assert!(parsed.is_err());
        let cli =
            Cli::try_parse_from(["mediatools", "convert", "a.png", "--format", "tif"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Convert {
                format: ImageFormat::Tiff,
                ..
            }
        ));
    }
}
