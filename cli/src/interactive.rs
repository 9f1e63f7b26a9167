//! Line-driven session: the terminal stands in for the preview grid.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow, bail};
use shotslice_core::loader::read_upload;
use shotslice_core::{
    ClickTarget, DeliveredFile, DirectorySink, DownloadSink, Language, PreviewAction, PreviewModel, Session,
    SliceIndex, Translate,
};
use tracing::debug;

use crate::args::parse_format;
use crate::shell::Shell;

const HELP: &str = "\
commands:
  list                          show slices and selection
  toggle N                      flip selection of slice N
  click N card|checkbox|image   click part of a slice card
  thumb N                       save a PNG thumbnail of slice N
  all | none | bulk             select all, clear, or toggle everything
  height N                      re-slice at N pixels
  export zip|pdf [NAME]         export the selected slices
  open PATH                     load another image
  reset                         drop the current image and slices
  lang CODE                     switch language (en, zh)
  help                          show this text
  quit                          leave";

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

#[derive(Debug)]
pub struct Repl<'a> {
    shell: &'a mut Shell,
    session: Session,
    preview: PreviewModel,
    out_dir: PathBuf,
}

impl<'a> Repl<'a> {
    pub fn new(shell: &'a mut Shell, out_dir: PathBuf) -> Self {
        let session = shell.session();
        let preview = PreviewModel::from_config(&shell.config);
        Self { shell, session, preview, out_dir }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn describe(&self, err: &anyhow::Error) -> String {
        self.shell.describe(err)
    }

    /// Read commands until `quit` or end of input. Command errors are printed, not returned.
    pub fn run(&mut self, input: impl BufRead, out: &mut dyn Write) -> Result<()> {
        writeln!(out, "{}", self.shell.catalog.text("app.title"))?;
        for line in input.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            debug!(command = line, "interactive command");
            match self.execute(line, out) {
                Ok(Flow::Quit) => break,
                Ok(Flow::Continue) => {}
                Err(err) => writeln!(out, "! {}", self.shell.describe(&err))?,
            }
        }
        Ok(())
    }

    /// Load `path` and slice it at the remembered height.
    pub fn open(&mut self, path: &Path, out: &mut dyn Write) -> Result<()> {
        let upload = read_upload(path)?;
        let original = self.session.load(&upload)?;
        let message = self.shell.say(
            "loader.loaded",
            [
                ("name", original.name.clone()),
                ("width", original.width().to_string()),
                ("height", original.height().to_string()),
            ],
        );
        writeln!(out, "{message}")?;
        let height = self.shell.slice_height(None);
        self.reslice(height, out)
    }

    fn execute(&mut self, line: &str, out: &mut dyn Write) -> Result<Flow> {
        let mut words = line.split_whitespace();
        let command = words.next().unwrap_or_default().to_ascii_lowercase();
        let rest: Vec<&str> = words.collect();

        match (command.as_str(), rest.as_slice()) {
            ("quit" | "exit" | "q", []) => return Ok(Flow::Quit),
            ("help" | "?", []) => writeln!(out, "{HELP}")?,
            ("list" | "ls", []) => self.list(out)?,
            ("toggle", [number]) => {
                let index = self.slice_index(number)?;
                self.session.toggle_selection(index);
                self.summary(out)?;
            }
            ("click", [number, target]) => {
                let index = self.slice_index(number)?;
                let target = match target.to_ascii_lowercase().as_str() {
                    "card" => ClickTarget::Card,
                    "checkbox" => ClickTarget::Checkbox,
                    "image" => ClickTarget::Image,
                    other => bail!("unknown click target `{other}`"),
                };
                match self.preview.click(&mut self.session, index, target) {
                    PreviewAction::OpenPreview { index, url } => {
                        let message = self.shell.say("preview.open", [("number", index.number().to_string())]);
                        writeln!(out, "{message} <{url}>")?;
                    }
                    PreviewAction::Toggled { .. } | PreviewAction::Ignored => self.summary(out)?,
                }
            }
            ("thumb", [number]) => {
                let index = self.slice_index(number)?;
                let png = self
                    .preview
                    .thumbnail(&self.session, index)
                    .ok_or_else(|| anyhow!("slice {number} does not exist"))??;
                let file_name = format!("slice_{}_thumb.png", index.number());
                let delivered = DirectorySink::new(&self.out_dir).deliver(&file_name, "image/png", &png)?;
                let message = self.shell.say(
                    "preview.thumbnail",
                    [("number", index.number().to_string()), ("file", location(delivered))],
                );
                writeln!(out, "{message}")?;
            }
            ("all", []) => {
                self.session.select_all();
                self.summary(out)?;
            }
            ("none", []) => {
                self.session.deselect_all();
                self.summary(out)?;
            }
            ("bulk", []) => {
                self.preview.bulk_toggle(&mut self.session);
                self.summary(out)?;
            }
            ("height", [value]) => {
                let height = value.parse::<u32>().map_err(|_| anyhow!("`{value}` is not a height"))?;
                self.reslice(height, out)?;
            }
            ("export", [format, name @ ..]) => {
                let format = parse_format(format).ok_or_else(|| anyhow!("unknown format `{format}`"))?;
                let name = name.join(" ");
                writeln!(out, "{}", self.shell.format_label(format))?;
                let mut sink = DirectorySink::new(&self.out_dir);
                let delivered = self.session.export(format, &name, &mut sink)?;
                writeln!(out, "{}", self.shell.say("export.done", [("file", location(delivered))]))?;
            }
            ("open", [_, ..]) => {
                let path = PathBuf::from(rest.join(" "));
                self.open(&path, out)?;
            }
            ("reset", []) => {
                self.session.cleanup();
                writeln!(out, "{}", self.shell.catalog.text("session.reset"))?;
            }
            ("lang", [code]) => {
                let language = Language::from_tag(code).ok_or_else(|| anyhow!("unsupported language `{code}`"))?;
                self.shell.set_language(language);
                writeln!(out, "{}", self.shell.catalog.text("app.title"))?;
            }
            _ => bail!("unknown command `{line}`; type `help`"),
        }
        Ok(Flow::Continue)
    }

    fn reslice(&mut self, height: u32, out: &mut dyn Write) -> Result<()> {
        let count = self.session.slice_now(height)?;
        self.shell.remember_slice_height(height);
        writeln!(out, "{}", self.shell.say("slice.done", [("count", count.to_string())]))?;
        self.list(out)
    }

    fn list(&self, out: &mut dyn Write) -> Result<()> {
        for entry in self.preview.entries(&self.session) {
            let mark = if entry.selected { "[x]" } else { "[ ]" };
            writeln!(out, "{mark} {}", entry.label(&self.shell.catalog))?;
        }
        self.summary(out)
    }

    fn summary(&self, out: &mut dyn Write) -> Result<()> {
        writeln!(
            out,
            "{}  ({})",
            self.preview.summary(&self.session, &self.shell.catalog),
            self.preview.bulk_label(&self.session, &self.shell.catalog)
        )?;
        Ok(())
    }

    fn slice_index(&self, number: &str) -> Result<SliceIndex> {
        let number: u32 = number.parse().map_err(|_| anyhow!("`{number}` is not a slice number"))?;
        if number == 0 || number > self.session.slice_count() {
            bail!("slice {number} does not exist; there are {} slices", self.session.slice_count());
        }
        Ok(SliceIndex(number - 1))
    }
}

fn location(delivered: DeliveredFile) -> String {
    delivered.location.map(|path| path.display().to_string()).unwrap_or(delivered.file_name)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};
    use shotslice_core::{Catalog, SlicerConfig};

    use super::*;

    fn write_png(dir: &Path, height: u32) -> PathBuf {
        let image = DynamicImage::ImageRgba8(ImageBuffer::from_pixel(12, height, Rgba([50, 60, 70, 255])));
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, ImageFormat::Png).unwrap();
        let path = dir.join("long.png");
        std::fs::write(&path, bytes.into_inner()).unwrap();
        path
    }

    fn run_script(script: &str, height: u32) -> (String, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let image = write_png(dir.path(), height);
        let config = SlicerConfig { default_slice_height: 100, thumbnail_edge: 50, ..SlicerConfig::default() };
        let mut shell = Shell::new(config, Catalog::new(Language::En), None);
        let mut repl = Repl::new(&mut shell, dir.path().join("out"));

        let mut out = Vec::new();
        repl.open(&image, &mut out).unwrap();
        repl.run(Cursor::new(script.to_string()), &mut out).unwrap();
        drop(repl);
        (String::from_utf8(out).unwrap(), dir)
    }

    #[test]
    fn selection_commands_update_the_summary() {
        let (text, _dir) = run_script("toggle 2\nbulk\nbulk\nclick 1 card\nquit\n", 300);
        assert!(text.contains("Created 3 slices"), "{text}");
        assert!(text.contains("Selected 1 of 3"), "{text}");
        assert!(text.contains("Selected 3 of 3  (Deselect all)"), "{text}");
        assert!(text.contains("Selected 0 of 3  (Select all)"), "{text}");
    }

    #[test]
    fn image_click_opens_preview_by_default() {
        let (text, _dir) = run_script("click 2 image\n", 200);
        assert!(text.contains("Previewing slice 2 <blob:shotslice/"), "{text}");
    }

    #[test]
    fn export_writes_into_out_dir() {
        let (text, dir) = run_script("all\nexport zip comic\n", 250);
        assert!(text.contains("Export as ZIP"), "{text}");
        assert!(dir.path().join("out").join("comic.zip").is_file(), "{text}");
    }

    #[test]
    fn thumb_saves_a_png_at_the_configured_edge() {
        let (text, dir) = run_script("thumb 2\nthumb 7\n", 300);
        let path = dir.path().join("out").join("slice_2_thumb.png");
        assert!(text.contains("Thumbnail of slice 2 saved to"), "{text}");
        assert!(text.contains("! slice 7 does not exist"), "{text}");

        let thumb = image::open(&path).unwrap();
        assert_eq!((thumb.width(), thumb.height()), (6, 50));
    }

    #[test]
    fn errors_are_reported_and_the_loop_continues() {
        let (text, _dir) = run_script("export pdf\nheight 20\ntoggle 9\nfrobnicate\nlist\n", 200);
        assert!(text.contains("! Please select at least one slice to export."), "{text}");
        assert!(text.contains("! Slice height 20 is invalid."), "{text}");
        assert!(text.contains("! slice 9 does not exist"), "{text}");
        assert!(text.contains("! unknown command `frobnicate`"), "{text}");
        assert!(text.contains("[ ] Slice 2: 12 x 100 px"), "{text}");
    }

    #[test]
    fn reset_clears_the_session() {
        let dir = tempfile::tempdir().unwrap();
        let image = write_png(dir.path(), 200);
        let mut shell = Shell::new(SlicerConfig::default(), Catalog::new(Language::En), None);
        let urls = std::sync::Arc::clone(&shell.urls);
        let mut repl = Repl::new(&mut shell, dir.path().to_path_buf());
        let mut out = Vec::new();
        repl.open(&image, &mut out).unwrap();
        repl.run(Cursor::new("reset\n"), &mut out).unwrap();

        assert!(repl.session().slices().is_empty());
        assert_eq!(urls.stats().live, 0);
    }
}
