use crate::audio::FfmpegTools;
use crate::config::{Config, SplitConfig};
use crate::pipeline::{SplitPipeline, SplitReport};
use console::style;
use dialoguer::{Confirm, FuzzySelect, Input};
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

const SUPPORTED_EXTENSIONS: &[&str] = &[
    "wav", "flac", "mp3", "m4a", "ogg", "opus", "aac", "wma", "aiff",
];

pub struct InteractiveResult {
    pub input: PathBuf,
    pub output: PathBuf,
    pub split_config: SplitConfig,
}

/// Collect the same parameters as the command line through terminal prompts.
pub fn run_interactive_wizard(config: &Config) -> anyhow::Result<InteractiveResult> {
    print_header();

    let input = select_source_file()?;

    let output: String = Input::new()
        .with_prompt("Output directory")
        .default(derive_output_dir(&input).display().to_string())
        .interact_text()?;
    let output = PathBuf::from(output.trim());

    println!("\n{}", style("Chunking:").bold());
    let min_length: f64 = prompt_number("Minimum chunk length (seconds)", config.min_length)?;
    let max_length: f64 = prompt_number("Maximum chunk length (seconds)", config.max_length)?;
    let silence_thresh: f64 = prompt_number("Silence threshold (dB)", config.silence_thresh)?;
    let pad_ms: u64 = prompt_number("Padding added to each end (ms)", config.pad_ms)?;
    let max_workers: usize = prompt_number("Parallel workers", config.max_workers)?;

    let split_config = Config {
        min_length,
        max_length,
        silence_thresh,
        pad_ms,
        max_workers,
        ..config.clone()
    }
    .split_config();

    print_summary(&input, &output, &split_config);

    if !Confirm::new()
        .with_prompt("Proceed with these settings?")
        .default(true)
        .interact()?
    {
        anyhow::bail!("Cancelled by user");
    }

    if Confirm::new()
        .with_prompt("Save these values as defaults?")
        .default(false)
        .interact()?
    {
        let defaults = Config {
            min_length,
            max_length,
            silence_thresh,
            pad_ms,
            max_workers,
            ..config.clone()
        };
        save_config(&defaults)?;
        println!("{} Defaults saved to config\n", style("✓").green());
    }

    println!();

    Ok(InteractiveResult {
        input,
        output,
        split_config,
    })
}

/// Run the wizard, then the pipeline, reporting the outcome instead of exiting with an error.
pub async fn run_interactive(config: &Config) -> anyhow::Result<()> {
    let result = run_interactive_wizard(config)?;

    if let Err(e) = result.split_config.validate() {
        show_error(&e.to_string());
        return Ok(());
    }

    let tools = FfmpegTools::new(config.ffmpeg_path.clone(), config.ffprobe_path.clone());
    if let Err(e) = tools.check() {
        show_error(&e.to_string());
        return Ok(());
    }

    let outcome = SplitPipeline::with_ffmpeg(tools)
        .with_progress(true)
        .run(&result.input, &result.output, &result.split_config)
        .await;

    match outcome {
        Ok(report) => match report.ensure_success() {
            Ok(()) => show_success(&report),
            Err(e) => show_error(&e.to_string()),
        },
        Err(e) => show_error(&e.to_string()),
    }

    Ok(())
}

/// Prompt for a number; unparseable text is rejected and asked again.
fn prompt_number<T>(prompt: &str, default: T) -> anyhow::Result<T>
where
    T: Clone + Display + FromStr,
    <T as FromStr>::Err: Display + std::fmt::Debug,
{
    let value = Input::<T>::new()
        .with_prompt(prompt)
        .default(default)
        .interact_text()?;
    Ok(value)
}

fn show_success(report: &SplitReport) {
    println!(
        "\n{} Audio split into {} chunks in {}",
        style("✓").green().bold(),
        report.stats.written,
        style(report.output_dir.display()).cyan()
    );
}

fn show_error(message: &str) {
    println!("\n{} {}", style("✗ Error:").red().bold(), message);
}

fn print_header() {
    println!();
    println!(
        "{}",
        style("╔═══════════════════════════════════════════════════╗").cyan()
    );
    println!(
        "{}",
        style("║      silence-split - Split Audio at Silences      ║").cyan()
    );
    println!(
        "{}",
        style("╚═══════════════════════════════════════════════════╝").cyan()
    );
    println!();
}

fn save_config(config: &Config) -> anyhow::Result<()> {
    if let Some(config_dir) = dirs::config_dir() {
        let app_dir = config_dir.join("silence-split");
        fs::create_dir_all(&app_dir)?;

        let config_path = app_dir.join("config.toml");
        let toml_content = toml::to_string_pretty(config)?;
        fs::write(config_path, toml_content)?;
    }
    Ok(())
}

fn select_source_file() -> anyhow::Result<PathBuf> {
    println!("{}", style("Select source file:").bold());

    let files = scan_audio_files(Path::new("."))?;

    if files.is_empty() {
        println!("  No audio files found in current directory.\n");
        return prompt_existing_path();
    }

    let mut items: Vec<String> = files
        .iter()
        .map(|f| {
            let size = fs::metadata(f)
                .map(|m| format_size(m.len()))
                .unwrap_or_else(|_| "?".to_string());
            format!("{} ({})", f.display(), size)
        })
        .collect();
    items.push("Enter custom path...".to_string());

    let selection = FuzzySelect::new()
        .with_prompt("Choose a file")
        .items(&items)
        .default(0)
        .interact()?;

    if selection == files.len() {
        prompt_existing_path()
    } else {
        Ok(files[selection].clone())
    }
}

/// Ask for a path until the user names a file that exists.
fn prompt_existing_path() -> anyhow::Result<PathBuf> {
    loop {
        let raw: String = Input::new()
            .with_prompt("Enter file path")
            .interact_text()?;
        match resolve_existing_path(&raw) {
            Ok(path) => return Ok(path),
            Err(message) => show_error(&message),
        }
    }
}

fn resolve_existing_path(raw: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(raw.trim());
    if path.is_file() {
        Ok(path)
    } else {
        Err(format!("File not found: {}", path.display()))
    }
}

fn scan_audio_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();

        if path.is_file() {
            if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                if SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()) {
                    files.push(path);
                }
            }
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// `<dir>/<stem>_chunks` beside the input file.
fn derive_output_dir(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default();
    input.with_file_name(format!("{}_chunks", stem.to_string_lossy()))
}

fn format_ms(d: Duration) -> String {
    format!("{} ms", d.as_millis())
}

fn print_summary(input: &Path, output: &Path, config: &SplitConfig) {
    println!("\n{}", style("═══ Summary ═══").bold());
    println!("  Input:      {}", style(input.display()).cyan());
    println!("  Output:     {}", style(output.display()).cyan());
    println!(
        "  Length:     {}s - {}s",
        config.min_length, config.max_length
    );
    println!("  Threshold:  {} dB", config.silence_threshold_db);
    println!("  Padding:    {}", format_ms(config.pad));
    println!("  Workers:    {}", config.workers);
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_existing_path() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("talk.wav");
        fs::write(&file, b"RIFF").unwrap();

        let padded = format!("  {}  ", file.display());
        assert_eq!(resolve_existing_path(&padded).unwrap(), file);

        let missing = dir.path().join("missing.wav");
        let err = resolve_existing_path(&missing.display().to_string()).unwrap_err();
        assert!(err.contains("missing.wav"));

        assert!(resolve_existing_path(&dir.path().display().to_string()).is_err());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1024 * 1024), "1.0 MB");
        assert_eq!(format_size(1024 * 1024 * 1024), "1.0 GB");
    }

    #[test]
    fn test_derive_output_dir() {
        let input = PathBuf::from("/path/to/interview.mp3");
        assert_eq!(
            derive_output_dir(&input),
            PathBuf::from("/path/to/interview_chunks")
        );
    }

    #[test]
    fn test_scan_audio_files_filters_extensions() {
        let dir = TempDir::new().unwrap();
        for name in ["b.WAV", "a.mp3", "notes.txt", "c.flac"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("nested.wav")).unwrap();

        let files = scan_audio_files(dir.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.mp3", "b.WAV", "c.flac"]);
    }

    #[test]
    fn test_format_ms() {
        assert_eq!(format_ms(Duration::from_millis(250)), "250 ms");
    }
}
