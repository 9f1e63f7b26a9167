//! One-shot subcommands.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use shotslice_core::loader::read_upload;
use shotslice_core::pipeline::{plan_bands, validate_slice_height};
use shotslice_core::{DirectorySink, ExportFormat, Session, Upload};
use tracing::info;

use crate::args::parse_selection;
use crate::shell::Shell;

/// Print dimensions and the band plan for `image`.
pub fn info(shell: &Shell, image: &Path, height: Option<u32>, out: &mut dyn Write) -> Result<()> {
    let upload = read_upload(image)?;
    let mut session = shell.session();
    let original = session.load(&upload)?;

    let slice_height = shell.slice_height(height);
    validate_slice_height(slice_height, &shell.config)?;
    let bands = plan_bands(original.height(), slice_height);

    writeln!(
        out,
        "{}",
        shell.say(
            "loader.loaded",
            [
                ("name", original.name.clone()),
                ("width", original.width().to_string()),
                ("height", original.height().to_string()),
            ],
        )
    )?;
    writeln!(
        out,
        "{}",
        shell.say(
            "slice.planned",
            [("count", bands.len().to_string()), ("height", slice_height.to_string())],
        )
    )?;
    for band in &bands {
        writeln!(
            out,
            "  {:>3}  y={:<6} {}",
            band.index.number(),
            band.offset_y,
            shell.say(
                "preview.entry",
                [
                    ("number", band.index.number().to_string()),
                    ("width", original.width().to_string()),
                    ("height", band.height.to_string()),
                ],
            )
        )?;
    }
    Ok(())
}

/// Arguments of the one-shot export.
#[derive(Debug)]
pub struct ExportArgs<'a> {
    pub image: &'a Path,
    pub format: ExportFormat,
    pub height: Option<u32>,
    pub select: &'a str,
    pub name: Option<&'a str>,
    pub out_dir: &'a Path,
}

/// Load, slice, select and export in one pass.
pub fn export(shell: &Shell, args: ExportArgs<'_>, out: &mut dyn Write) -> Result<()> {
    let upload: Upload = read_upload(args.image)?;
    let mut session = shell.session();
    session.load(&upload)?;

    let slice_height = shell.slice_height(args.height);
    let count = slice_reporting_progress(shell, &mut session, slice_height, out)?;
    shell.remember_slice_height(slice_height);
    writeln!(out, "{}", shell.say("slice.done", [("count", count.to_string())]))?;

    for index in parse_selection(args.select, session.slice_count()).context("invalid --select")? {
        session.select(index);
    }

    let stem = args.name.map(str::to_owned).unwrap_or_else(|| default_stem(args.image, shell));
    writeln!(out, "{}", shell.format_label(args.format))?;
    let mut sink = DirectorySink::new(args.out_dir);
    let delivered = session.export(args.format, &stem, &mut sink)?;

    let location = delivered
        .location
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| delivered.file_name.clone());
    info!(file = %location, size = delivered.size, "export written");
    writeln!(out, "{}", shell.say("export.done", [("file", location)]))?;
    Ok(())
}

/// Slice on this thread, printing progress in steps of ten percent.
fn slice_reporting_progress(
    shell: &Shell,
    session: &mut Session,
    slice_height: u32,
    out: &mut dyn Write,
) -> Result<usize> {
    let mut last_step = None;
    let mut write_error = None;
    let count = session.slice_with_progress(slice_height, |percent| {
        let step = percent / 10;
        if write_error.is_some() || last_step == Some(step) {
            return;
        }
        last_step = Some(step);
        let line = shell.say("slice.processing", [("percent", percent.to_string())]);
        if let Err(err) = writeln!(out, "{line}") {
            write_error = Some(err);
        }
    })?;
    match write_error {
        Some(err) => Err(err.into()),
        None => Ok(count),
    }
}

/// Name exports after the source image unless the user chose one.
fn default_stem(image: &Path, shell: &Shell) -> String {
    image
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(|stem| format!("{stem}-slices"))
        .unwrap_or_else(|| shell.config.default_output_name.clone())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};
    use shotslice_core::{Catalog, Language, SlicerConfig};

    use super::*;

    fn write_png(dir: &Path, width: u32, height: u32) -> std::path::PathBuf {
        let image = DynamicImage::ImageRgba8(ImageBuffer::from_pixel(width, height, Rgba([9, 9, 9, 255])));
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, ImageFormat::Png).unwrap();
        let path = dir.join("shot.png");
        std::fs::write(&path, bytes.into_inner()).unwrap();
        path
    }

    fn shell() -> Shell {
        Shell::new(SlicerConfig::default(), Catalog::new(Language::En), None)
    }

    #[test]
    fn info_lists_planned_bands() {
        let dir = tempfile::tempdir().unwrap();
        let image = write_png(dir.path(), 20, 250);
        let mut out = Vec::new();
        info(&shell(), &image, Some(100), &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Loaded shot.png (20 x 250 px)"), "{text}");
        assert!(text.contains("3 slices of up to 100 px"), "{text}");
        assert!(text.contains("Slice 3: 20 x 50 px"), "{text}");
    }

    #[test]
    fn export_writes_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let image = write_png(dir.path(), 20, 250);
        let out_dir = dir.path().join("out");
        let mut out = Vec::new();
        let args = ExportArgs {
            image: &image,
            format: ExportFormat::Pdf,
            height: Some(100),
            select: "1,3",
            name: None,
            out_dir: &out_dir,
        };
        export(&shell(), args, &mut out).unwrap();

        assert!(out_dir.join("shot-slices.pdf").is_file());
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Processing... 33%"), "{text}");
        assert!(text.contains("Processing... 100%"), "{text}");
        assert!(text.contains("Created 3 slices"), "{text}");
        assert!(text.contains("Export as PDF"), "{text}");
    }
}
