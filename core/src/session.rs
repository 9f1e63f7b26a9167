//! The application state store.
//!
//! A [`Session`] exclusively owns the original image, the slice collection, and the selection
//! set. Display surfaces only ever borrow slices and their transient URLs; every URL the session
//! registers is revoked when the slice is replaced, on [`Session::cleanup`], or when the session
//! is dropped.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::SlicerConfig;
use crate::error::Error;
use crate::export::{self, DeliveredFile, DownloadSink, ExportRequest};
use crate::loader::{OriginalImage, Upload, load_upload};
use crate::codec::DecodedImage;
use crate::pipeline::{EncodedSlice, SliceOptions, slice_image_with_progress, validate_slice_height};
use crate::selection::SelectionSet;
use crate::stats::StatsCollector;
use crate::types::{ExportFormat, ImageDimensions, RequestToken, SliceEncoding, SliceIndex};
use crate::url::{ObjectUrl, UrlRegistry};
use crate::worker::{JobOutcome, SliceJob, SliceWorker};

/// Coarse lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Empty,
    ImageLoaded,
    Sliced,
    /// Between [`Session::begin_export`] and [`Session::finish_export`].
    Exporting,
}

/// One horizontal band of the original image, owned by the session.
#[derive(Debug, Clone)]
pub struct ImageSlice {
    pub index: SliceIndex,
    pub offset_y: u32,
    pub dimensions: ImageDimensions,
    pub encoding: SliceEncoding,
    data: Arc<[u8]>,
    url: ObjectUrl,
}

impl ImageSlice {
    pub fn width(&self) -> u32 {
        self.dimensions.width
    }

    pub fn height(&self) -> u32 {
        self.dimensions.height
    }

    /// 1-based position shown to users.
    pub fn number(&self) -> u32 {
        self.index.number()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.data)
    }

    pub fn mime(&self) -> &'static str {
        self.encoding.mime()
    }

    /// Transient display URL; valid until the slice is released.
    pub fn url(&self) -> &ObjectUrl {
        &self.url
    }
}

/// What happened to a worker answer handed to [`Session::finish_slicing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceCompletion {
    /// The slices replaced the session's collection.
    Applied(usize),
    /// The answer belonged to an abandoned run and was dropped.
    Stale,
}

#[derive(Debug)]
pub struct Session {
    config: SlicerConfig,
    urls: Arc<UrlRegistry>,
    stats: Arc<StatsCollector>,
    worker: SliceWorker,
    original: Option<OriginalImage>,
    slices: Vec<ImageSlice>,
    selection: SelectionSet,
    slice_height: Option<u32>,
    pending: Option<RequestToken>,
    exporting: bool,
}

impl Session {
    pub fn new(config: SlicerConfig, urls: Arc<UrlRegistry>) -> Self {
        Self {
            config,
            urls,
            stats: Arc::new(StatsCollector::new()),
            worker: SliceWorker::new(),
            original: None,
            slices: Vec::new(),
            selection: SelectionSet::default(),
            slice_height: None,
            pending: None,
            exporting: false,
        }
    }

    /// Share a stats collector with the shell.
    pub fn with_stats(mut self, stats: Arc<StatsCollector>) -> Self {
        self.stats = stats;
        self
    }

    pub fn config(&self) -> &SlicerConfig {
        &self.config
    }

    pub fn urls(&self) -> &Arc<UrlRegistry> {
        &self.urls
    }

    pub fn stats(&self) -> &Arc<StatsCollector> {
        &self.stats
    }

    pub fn phase(&self) -> SessionPhase {
        if self.exporting {
            SessionPhase::Exporting
        } else if !self.slices.is_empty() {
            SessionPhase::Sliced
        } else if self.original.is_some() {
            SessionPhase::ImageLoaded
        } else {
            SessionPhase::Empty
        }
    }

    /// Whether a slicing run or an export is in flight; processing and export are disabled meanwhile.
    pub fn is_busy(&self) -> bool {
        self.pending.is_some() || self.exporting
    }

    pub fn original(&self) -> Option<&OriginalImage> {
        self.original.as_ref()
    }

    pub fn slices(&self) -> &[ImageSlice] {
        &self.slices
    }

    pub fn slice(&self, index: SliceIndex) -> Option<&ImageSlice> {
        self.slices.get(index.as_usize())
    }

    pub fn slice_count(&self) -> u32 {
        self.slices.len() as u32
    }

    /// Height requested for the current slice collection.
    pub fn slice_height(&self) -> Option<u32> {
        self.slice_height
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    /// Replace the original image. Slices of a previous image are not released here; callers
    /// switching images go through [`Session::load`] or call [`Session::cleanup`] first.
    pub fn set_original_image(&mut self, image: OriginalImage) {
        if !self.slices.is_empty() {
            warn!(target: "session", "original replaced while slices of the previous image are held");
        }
        self.original = Some(image);
    }

    /// Replace the slice collection in index order, registering a display URL per slice.
    pub fn set_slices(&mut self, encoded: Vec<EncodedSlice>) {
        self.release_slices();

        self.slices = encoded
            .into_iter()
            .map(|slice| {
                let data: Arc<[u8]> = Arc::from(slice.image.bytes);
                let url = self.urls.create(slice.image.encoding.mime(), Arc::clone(&data));
                ImageSlice {
                    index: slice.band.index,
                    offset_y: slice.band.offset_y,
                    dimensions: slice.image.dimensions,
                    encoding: slice.image.encoding,
                    data,
                    url,
                }
            })
            .collect();
        self.selection = SelectionSet::with_bound(self.slice_count());
    }

    /// Flip selection of one slice; returns the new membership.
    pub fn toggle_selection(&mut self, index: SliceIndex) -> bool {
        self.selection.toggle(index)
    }

    /// Add one slice to the selection; returns whether it is selected afterwards.
    pub fn select(&mut self, index: SliceIndex) -> bool {
        self.selection.insert(index)
    }

    pub fn select_all(&mut self) {
        self.selection.select_all();
    }

    pub fn deselect_all(&mut self) {
        self.selection.deselect_all();
    }

    /// Revoke every display URL and forget the image, slices, selection and any pending run.
    pub fn cleanup(&mut self) {
        let had_state = self.original.is_some() || !self.slices.is_empty();
        self.release_slices();
        self.original = None;
        self.slice_height = None;
        self.pending = None;
        self.exporting = false;
        if had_state {
            debug!(target: "session", "session cleaned up");
        }
    }

    /// Validate and decode `upload`, then make it the session's image.
    ///
    /// A rejected upload leaves the current session untouched.
    pub fn load(&mut self, upload: &Upload) -> Result<&OriginalImage, Error> {
        let image = load_upload(upload, &self.config)?;
        self.cleanup();
        Ok(&*self.original.insert(image))
    }

    /// Dispatch a background slicing run at `slice_height`.
    ///
    /// Previous slices are released immediately; the returned job must be waited on and its
    /// outcome passed to [`Session::finish_slicing`].
    pub fn start_slicing(&mut self, slice_height: u32) -> Result<SliceJob, Error> {
        let bitmap = self.prepare_run(slice_height)?;
        let options = SliceOptions::from_config(slice_height, &self.config);
        let job = self.worker.dispatch(bitmap, options)?;
        self.pending = Some(job.token());
        self.slice_height = Some(slice_height);
        Ok(job)
    }

    /// Apply a worker answer. Answers from abandoned runs are discarded.
    pub fn finish_slicing(&mut self, outcome: JobOutcome) -> Result<SliceCompletion, Error> {
        if self.pending != Some(outcome.token) {
            debug!(target: "session", token = outcome.token.as_u64(), "discarding stale slicing result");
            return Ok(SliceCompletion::Stale);
        }
        self.pending = None;

        match outcome.result {
            Ok(slices) => Ok(SliceCompletion::Applied(self.apply_slices(slices, outcome.elapsed))),
            Err(err) => Err(self.slicing_failed(err, outcome.elapsed)),
        }
    }

    /// Slice synchronously: dispatch, wait for the worker, apply the answer.
    pub fn slice_now(&mut self, slice_height: u32) -> Result<usize, Error> {
        let job = self.start_slicing(slice_height)?;
        match self.finish_slicing(job.wait())? {
            SliceCompletion::Applied(count) => Ok(count),
            SliceCompletion::Stale => Ok(0),
        }
    }

    /// Slice on the calling thread, reporting a coarse percentage after every band.
    ///
    /// Nothing is dispatched to the worker, so there is no stale answer to discard.
    pub fn slice_with_progress<F>(&mut self, slice_height: u32, progress: F) -> Result<usize, Error>
    where
        F: FnMut(u8),
    {
        let bitmap = self.prepare_run(slice_height)?;
        let options = SliceOptions::from_config(slice_height, &self.config);
        self.slice_height = Some(slice_height);

        let started = Instant::now();
        match slice_image_with_progress(&bitmap, &options, progress) {
            Ok(slices) => Ok(self.apply_slices(slices, started.elapsed())),
            Err(err) => Err(self.slicing_failed(Error::Processing(err), started.elapsed())),
        }
    }

    /// Build the selected slices into `format` and hand the file to `sink`.
    pub fn export(
        &mut self,
        format: ExportFormat,
        file_name: &str,
        sink: &mut dyn DownloadSink,
    ) -> Result<DeliveredFile, Error> {
        let request = self.begin_export(format, file_name)?;
        self.finish_export(&request, sink)
    }

    /// Snapshot the selection for export and enter [`SessionPhase::Exporting`].
    ///
    /// An empty selection is rejected without touching the session. The phase lasts until
    /// [`Session::finish_export`] or [`Session::cleanup`].
    pub fn begin_export(&mut self, format: ExportFormat, file_name: &str) -> Result<ExportRequest, Error> {
        if self.is_busy() {
            return Err(Error::Busy);
        }
        let request = ExportRequest::from_session(self, format, file_name)?;
        self.exporting = true;
        Ok(request)
    }

    /// Build `request` and deliver it to `sink`, leaving the exporting phase either way.
    pub fn finish_export(
        &mut self,
        request: &ExportRequest,
        sink: &mut dyn DownloadSink,
    ) -> Result<DeliveredFile, Error> {
        let format = request.format;
        let started = Instant::now();
        let delivered = export::build(request)
            .and_then(|bytes| sink.deliver(&request.file_name, format.mime(), &bytes));
        self.exporting = false;

        self.stats.record_export(
            format,
            started.elapsed(),
            delivered.as_ref().ok().map(|file| file.size as usize),
        );
        match &delivered {
            Ok(file) => info!(
                target: "session",
                %format,
                file = %file.file_name,
                slices = request.items.len(),
                "export delivered"
            ),
            Err(err) => warn!(target: "session", %format, "export failed: {err}"),
        }
        delivered
    }

    /// Common checks of both slicing paths; releases the previous slices on success.
    fn prepare_run(&mut self, slice_height: u32) -> Result<Arc<DecodedImage>, Error> {
        if self.is_busy() {
            return Err(Error::Busy);
        }
        let bitmap = match &self.original {
            Some(original) => Arc::clone(&original.bitmap),
            None => return Err(Error::NoImage),
        };
        validate_slice_height(slice_height, &self.config)?;
        self.release_slices();
        Ok(bitmap)
    }

    fn apply_slices(&mut self, slices: Vec<EncodedSlice>, elapsed: Duration) -> usize {
        let count = slices.len();
        self.stats.record_slicing(elapsed, Some(count));
        self.set_slices(slices);
        info!(
            target: "session",
            slices = count,
            elapsed_ms = elapsed.as_millis() as u64,
            "slicing finished"
        );
        count
    }

    fn slicing_failed(&mut self, err: Error, elapsed: Duration) -> Error {
        self.stats.record_slicing(elapsed, None);
        self.slice_height = None;
        warn!(target: "session", "slicing failed: {err}");
        err
    }

    fn release_slices(&mut self) {
        for slice in self.slices.drain(..) {
            self.urls.revoke(&slice.url);
        }
        self.selection = SelectionSet::default();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::MemorySink;
    use crate::pipeline::{Band, slice_image};

    fn original(width: u32, height: u32) -> OriginalImage {
        OriginalImage {
            name: "test.png".into(),
            mime: "image/png".into(),
            byte_len: 0,
            bitmap: Arc::new(DecodedImage {
                dimensions: ImageDimensions::new(width, height),
                pixels: vec![200; (width * height * 4) as usize],
            }),
        }
    }

    fn session() -> (Session, Arc<UrlRegistry>) {
        let urls = Arc::new(UrlRegistry::new());
        (Session::new(SlicerConfig::default(), Arc::clone(&urls)), urls)
    }

    #[test]
    fn phases_follow_the_lifecycle() {
        let (mut session, _) = session();
        assert_eq!(session.phase(), SessionPhase::Empty);

        session.set_original_image(original(4, 250));
        assert_eq!(session.phase(), SessionPhase::ImageLoaded);

        assert_eq!(session.slice_now(100).unwrap(), 3);
        assert_eq!(session.phase(), SessionPhase::Sliced);

        session.cleanup();
        assert_eq!(session.phase(), SessionPhase::Empty);
    }

    #[test]
    fn set_slices_replaces_and_revokes_previous_urls() {
        let (mut session, urls) = session();
        let image = original(2, 300);
        let encoded = slice_image(&image.bitmap, &SliceOptions::new(100)).unwrap();

        session.set_slices(encoded.clone());
        let first_urls: Vec<ObjectUrl> = session.slices().iter().map(|s| s.url().clone()).collect();
        session.set_slices(encoded);

        assert!(first_urls.iter().all(|url| !urls.is_live(url)));
        assert_eq!(urls.stats().live, 3);
        assert_eq!(urls.stats().created, 6);
    }

    #[test]
    fn slicing_requires_an_image_and_a_valid_height() {
        let (mut session, _) = session();
        assert!(matches!(session.start_slicing(500), Err(Error::NoImage)));

        session.set_original_image(original(2, 300));
        assert!(matches!(session.start_slicing(50), Err(Error::InvalidSliceHeight { .. })));
        assert!(!session.is_busy());
    }

    #[test]
    fn busy_flag_blocks_second_run_until_finished() {
        let (mut session, _) = session();
        session.set_original_image(original(2, 300));

        let job = session.start_slicing(100).unwrap();
        assert!(session.is_busy());
        assert!(matches!(session.start_slicing(100), Err(Error::Busy)));

        let completion = session.finish_slicing(job.wait()).unwrap();
        assert_eq!(completion, SliceCompletion::Applied(3));
        assert!(!session.is_busy());
    }

    #[test]
    fn results_of_abandoned_runs_are_discarded() {
        let (mut session, urls) = session();
        session.set_original_image(original(2, 300));
        let job = session.start_slicing(100).unwrap();

        // A new upload replaces the image before the worker answers.
        session.cleanup();
        session.set_original_image(original(2, 500));

        assert_eq!(session.finish_slicing(job.wait()).unwrap(), SliceCompletion::Stale);
        assert!(session.slices().is_empty());
        assert_eq!(urls.stats().created, 0);
    }

    #[test]
    fn failed_run_clears_busy_without_partial_slices() {
        let (mut session, _) = session();
        session.set_original_image(original(2, 300));
        let job = session.start_slicing(100).unwrap();
        let outcome = JobOutcome {
            token: job.token(),
            elapsed: std::time::Duration::ZERO,
            result: Err(Error::Processing(anyhow::anyhow!("boom"))),
        };
        drop(job);

        assert!(session.finish_slicing(outcome).is_err());
        assert!(!session.is_busy());
        assert!(session.slices().is_empty());
        assert_eq!(session.stats().snapshot().slicing_failures, 1);
    }

    #[test]
    fn selection_is_reset_by_new_slices() {
        let (mut session, _) = session();
        session.set_original_image(original(2, 300));
        session.slice_now(100).unwrap();
        session.select_all();
        assert_eq!(session.selection().len(), 3);

        session.slice_now(150).unwrap();
        assert!(session.selection().is_empty());
        assert_eq!(session.selection().bound(), 2);
    }

    #[test]
    fn exporting_phase_lasts_until_delivery() {
        let (mut session, _) = session();
        session.set_original_image(original(2, 300));
        session.slice_now(100).unwrap();
        assert!(session.select(SliceIndex(1)));
        assert!(!session.select(SliceIndex(5)));

        let request = session.begin_export(ExportFormat::Zip, "out").unwrap();
        assert_eq!(session.phase(), SessionPhase::Exporting);
        assert!(session.is_busy());
        assert!(matches!(session.start_slicing(100), Err(Error::Busy)));
        assert!(matches!(session.begin_export(ExportFormat::Pdf, "again"), Err(Error::Busy)));

        let mut sink = MemorySink::new();
        let file = session.finish_export(&request, &mut sink).unwrap();
        assert_eq!(file.file_name, "out.zip");
        assert_eq!(session.phase(), SessionPhase::Sliced);
        assert!(!session.is_busy());
    }

    #[test]
    fn rejected_export_does_not_enter_the_exporting_phase() {
        let (mut session, _) = session();
        session.set_original_image(original(2, 300));
        session.slice_now(100).unwrap();

        assert!(matches!(session.begin_export(ExportFormat::Pdf, "x"), Err(Error::EmptySelection)));
        assert_eq!(session.phase(), SessionPhase::Sliced);
        assert!(!session.is_busy());
    }

    #[test]
    fn synchronous_slicing_reports_progress() {
        let (mut session, urls) = session();
        session.set_original_image(original(2, 400));

        let mut seen = Vec::new();
        assert_eq!(session.slice_with_progress(100, |percent| seen.push(percent)).unwrap(), 4);
        assert_eq!(seen, vec![25, 50, 75, 100]);
        assert_eq!(session.slice_height(), Some(100));
        assert_eq!(urls.stats().live, 4);
        assert_eq!(session.stats().snapshot().slices_produced, 4);

        assert!(matches!(session.slice_with_progress(20, |_| {}), Err(Error::InvalidSliceHeight { .. })));
        assert_eq!(urls.stats().live, 4);
    }

    #[test]
    fn drop_revokes_every_url() {
        let urls = Arc::new(UrlRegistry::new());
        {
            let mut session = Session::new(SlicerConfig::default(), Arc::clone(&urls));
            session.set_original_image(original(2, 300));
            session.slice_now(100).unwrap();
            assert_eq!(urls.stats().live, 3);
        }
        assert_eq!(urls.stats().live, 0);
        assert_eq!(urls.stats().revoked, 3);
    }

    #[test]
    fn band_metadata_is_carried_into_slices() {
        let (mut session, _) = session();
        let band = Band { index: SliceIndex(0), offset_y: 0, height: 1 };
        let image = crate::codec::encode_rgba(
            &[0, 0, 0, 255],
            ImageDimensions::new(1, 1),
            SliceEncoding::Png,
            Default::default(),
        )
        .unwrap();
        session.set_slices(vec![EncodedSlice { band, image }]);
        let slice = &session.slices()[0];
        assert_eq!(slice.number(), 1);
        assert_eq!(slice.mime(), "image/png");
        assert!(session.urls().resolve(slice.url()).is_some());
    }
}
