//! Preview grid model.
//!
//! The grid lists every slice with its number, dimensions, display URL and selection state.
//! Clicking a card or its checkbox toggles selection; clicking the image itself does what
//! [`ImageClick`] says. Entries are derived from the session on demand, so the grid and the
//! "Selected N of M" summary can never drift from the selection set.

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::codec::{DecodedImage, decode_primary, encode_rgba};
use crate::config::SlicerConfig;
use crate::error::Error;
use crate::i18n::{Translate, params};
use crate::pipeline::resize::{ResizeFilter, fit_longest_edge, resize_rgba};
use crate::session::{ImageSlice, Session};
use crate::types::{ImageDimensions, Rgb, SliceEncoding, SliceIndex};
use crate::url::ObjectUrl;

/// Behaviour of a click on a slice image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageClick {
    /// Same as clicking the card: flip selection.
    TogglesSelection,
    /// Open a full-size preview; selection is unchanged.
    #[default]
    OpensPreview,
}

/// Part of a preview card that received a click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickTarget {
    Card,
    Checkbox,
    Image,
}

/// Result of a click.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewAction {
    Toggled { index: SliceIndex, selected: bool },
    OpenPreview { index: SliceIndex, url: ObjectUrl },
    /// The index does not name a current slice.
    Ignored,
}

/// One card of the grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewEntry {
    pub index: SliceIndex,
    pub dimensions: ImageDimensions,
    pub url: ObjectUrl,
    pub selected: bool,
}

impl PreviewEntry {
    pub fn number(&self) -> u32 {
        self.index.number()
    }

    /// "Slice N: W x H px" in the active language.
    pub fn label(&self, translator: &dyn Translate) -> String {
        translator.t(
            "preview.entry",
            &params([
                ("number", self.number().to_string()),
                ("width", self.dimensions.width.to_string()),
                ("height", self.dimensions.height.to_string()),
            ]),
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PreviewModel {
    image_click: ImageClick,
    thumbnail_edge: u32,
}

impl Default for PreviewModel {
    fn default() -> Self {
        Self::from_config(&SlicerConfig::default())
    }
}

impl PreviewModel {
    pub fn new(image_click: ImageClick) -> Self {
        Self { image_click, ..Self::default() }
    }

    pub fn from_config(config: &SlicerConfig) -> Self {
        Self { image_click: config.image_click, thumbnail_edge: config.thumbnail_edge }
    }

    pub fn image_click(&self) -> ImageClick {
        self.image_click
    }

    /// Longest edge of rendered thumbnails, in pixels.
    pub fn thumbnail_edge(&self) -> u32 {
        self.thumbnail_edge
    }

    /// PNG thumbnail of the card at `index`, or `None` if there is no such slice.
    pub fn thumbnail(&self, session: &Session, index: SliceIndex) -> Option<Result<Vec<u8>, Error>> {
        session.slice(index).map(|slice| thumbnail(slice, self.thumbnail_edge))
    }

    /// Cards in slice order.
    pub fn entries(&self, session: &Session) -> Vec<PreviewEntry> {
        session
            .slices()
            .iter()
            .map(|slice| PreviewEntry {
                index: slice.index,
                dimensions: slice.dimensions,
                url: slice.url().clone(),
                selected: session.selection().contains(slice.index),
            })
            .collect()
    }

    pub fn click(&self, session: &mut Session, index: SliceIndex, target: ClickTarget) -> PreviewAction {
        let Some(slice) = session.slice(index) else {
            return PreviewAction::Ignored;
        };

        match (target, self.image_click) {
            (ClickTarget::Image, ImageClick::OpensPreview) => {
                PreviewAction::OpenPreview { index, url: slice.url().clone() }
            }
            _ => {
                let selected = session.toggle_selection(index);
                PreviewAction::Toggled { index, selected }
            }
        }
    }

    /// Select everything, or clear the selection if everything is already selected.
    /// Returns whether all slices are selected afterwards.
    pub fn bulk_toggle(&self, session: &mut Session) -> bool {
        if session.selection().is_all() {
            session.deselect_all();
            false
        } else {
            session.select_all();
            session.selection().is_all()
        }
    }

    /// Label of the bulk button for the current selection.
    pub fn bulk_label(&self, session: &Session, translator: &dyn Translate) -> String {
        if session.selection().is_all() {
            translator.text("selection.deselect_all")
        } else {
            translator.text("selection.select_all")
        }
    }

    /// "Selected N of M".
    pub fn summary(&self, session: &Session, translator: &dyn Translate) -> String {
        translator.t(
            "selection.summary",
            &params([
                ("selected", session.selection().len().to_string()),
                ("total", session.slice_count().to_string()),
            ]),
        )
    }
}

/// PNG thumbnail of `slice` whose longest edge is at most `longest_edge`.
pub fn thumbnail(slice: &ImageSlice, longest_edge: u32) -> Result<Vec<u8>, Error> {
    build_thumbnail(slice, longest_edge).map_err(Error::Processing)
}

fn build_thumbnail(slice: &ImageSlice, longest_edge: u32) -> anyhow::Result<Vec<u8>> {
    let label = format!("slice {}", slice.number());
    let decoded: DecodedImage = decode_primary(&label, None, slice.bytes())?;
    let target = fit_longest_edge(decoded.dimensions, longest_edge.max(1));
    let resized = resize_rgba(&decoded, target, ResizeFilter::default())
        .with_context(|| format!("resizing {label}"))?;
    let encoded = encode_rgba(resized.pixels(), resized.dimensions, SliceEncoding::Png, Rgb::default())?;
    Ok(encoded.bytes)
}
