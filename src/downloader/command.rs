use crate::downloader::{DownloadSettings, VideoItem};
use crate::utils::shell_quote;

/// Output filename template handed to yt-dlp.
pub const OUTPUT_TEMPLATE: &str = "%(uploader)s/%(upload_date)s - %(title)s.%(ext)s";

/// Renders the yt-dlp command line for `item`.
///
/// Pure: the same item and settings always give the same string.
pub fn render_command(item: &VideoItem, settings: &DownloadSettings) -> String {
    let mut args: Vec<String> = vec![
        "yt-dlp".to_string(),
        "-P".to_string(),
        settings.download_dir.clone(),
    ];

    if settings.cookies_loaded {
        args.push("--cookies-from-browser".to_string());
        args.push(settings.browser.clone());
    }

    if item.format.is_audio() {
        args.push("-x".to_string());
        args.push("--audio-format".to_string());
        args.push(item.format.extension().to_string());
        args.push("--audio-quality".to_string());
        args.push(item.quality.label().to_string());
    } else {
        let height = item
            .quality
            .height()
            .or_else(|| item.format.default_quality().height())
            .unwrap_or(720);
        args.push("-f".to_string());
        args.push(format!("bv*[height<={h}]+ba/b[height<={h}]", h = height));
        args.push("--merge-output-format".to_string());
        args.push(settings.merge_format.clone());
    }

    if !settings.subtitle_langs.is_empty() {
        args.push("--sub-langs".to_string());
        args.push(settings.subtitle_langs.join(","));
        args.push("--embed-subs".to_string());
    }

    args.push("-o".to_string());
    args.push(OUTPUT_TEMPLATE.to_string());
    args.push(item.watch_url());

    args.iter()
        .map(|arg| shell_quote(arg))
        .collect::<Vec<_>>()
        .join(" ")
}
