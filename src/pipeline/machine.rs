use image::DynamicImage;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::crop::{SourceImage, UploadFile, extract, validate_upload};
use crate::error::PipelineError;
use crate::geometry::{CropRect, Size, clamp_to_bounds};
use crate::gesture::{GestureEvent, GestureTracker};
use crate::ocr::finalize_text;

use super::state::{PipelineState, Snapshot};

/// Identifies one request for background work. Only the most recently
/// issued ticket may deliver a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
pub enum Event {
    Upload(UploadFile),
    Resize(Size),
    ToggleCrop,
    Pointer(GestureEvent),
    Recognize,
    EditText(String),
    Submit,
    Dismiss,
    Decoded {
        ticket: Ticket,
        result: Result<SourceImage, PipelineError>,
    },
    Recognized {
        ticket: Ticket,
        result: Result<String, PipelineError>,
    },
    Submitted {
        ticket: Ticket,
        result: Result<String, PipelineError>,
    },
}

impl Event {
    fn name(&self) -> &'static str {
        match self {
            Event::Upload(_) => "upload",
            Event::Resize(_) => "resize",
            Event::ToggleCrop => "toggle_crop",
            Event::Pointer(_) => "pointer",
            Event::Recognize => "recognize",
            Event::EditText(_) => "edit_text",
            Event::Submit => "submit",
            Event::Dismiss => "dismiss",
            Event::Decoded { .. } => "decoded",
            Event::Recognized { .. } => "recognized",
            Event::Submitted { .. } => "submitted",
        }
    }
}

/// Background work requested by a transition.
#[derive(Debug)]
pub enum Command {
    Decode { ticket: Ticket, file: UploadFile },
    Recognize { ticket: Ticket, image: Arc<DynamicImage> },
    Submit { ticket: Ticket, text: String },
}

#[derive(Debug, Clone, PartialEq, Default)]
enum Phase {
    #[default]
    Idle,
    Uploading,
    Recognizing,
    Editing,
    Submitting,
    Done,
    Failed(PipelineError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Decode,
    Recognize,
    Submit,
}

#[derive(Debug, Default)]
pub struct Pipeline {
    phase: Phase,
    image: Option<SourceImage>,
    cropping: bool,
    tracker: GestureTracker,
    crop: CropRect,
    text: Option<String>,
    result: Option<String>,
    in_flight: Option<(Operation, Ticket)>,
    issued: u64,
    revision: u64,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one event. Events that make no sense in the current phase
    /// are dropped without touching any state.
    pub fn apply(&mut self, event: Event) -> Option<Command> {
        self.revision += 1;
        let name = event.name();
        let before = self.state();
        let command = match event {
            Event::Upload(file) => self.upload(file),
            Event::Resize(size) => {
                self.resize(size);
                None
            }
            Event::ToggleCrop => {
                self.toggle_crop();
                None
            }
            Event::Pointer(gesture) => {
                self.pointer(gesture);
                None
            }
            Event::Recognize => self.recognize(),
            Event::EditText(text) => {
                self.edit_text(text);
                None
            }
            Event::Submit => self.submit(),
            Event::Dismiss => {
                self.dismiss();
                None
            }
            Event::Decoded { ticket, result } => {
                self.decoded(ticket, result);
                None
            }
            Event::Recognized { ticket, result } => {
                self.recognized(ticket, result);
                None
            }
            Event::Submitted { ticket, result } => {
                self.submitted(ticket, result);
                None
            }
        };
        let after = self.state();
        if before.name() != after.name() {
            info!(event = name, from = before.name(), to = after.name(), "pipeline transition");
        }
        command
    }

    pub fn state(&self) -> PipelineState {
        match &self.phase {
            Phase::Idle if self.cropping => PipelineState::Cropping(self.crop),
            Phase::Idle => PipelineState::Idle,
            Phase::Uploading => PipelineState::Uploading,
            Phase::Recognizing => PipelineState::Recognizing,
            Phase::Editing => PipelineState::Editing(self.text.clone().unwrap_or_default()),
            Phase::Submitting => PipelineState::Submitting,
            Phase::Done => PipelineState::Done(self.result.clone().unwrap_or_default()),
            Phase::Failed(err) => PipelineState::Failed(err.clone()),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            revision: self.revision,
            state: self.state(),
            natural: self.image.as_ref().map(SourceImage::natural),
            display: self.image.as_ref().map(SourceImage::display),
            cropping: self.cropping,
            crop: self.crop,
        }
    }

    pub fn image(&self) -> Option<&SourceImage> {
        self.image.as_ref()
    }

    pub fn crop(&self) -> CropRect {
        self.crop
    }

    pub fn is_cropping(&self) -> bool {
        self.cropping
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    fn issue(&mut self, operation: Operation) -> Ticket {
        self.issued += 1;
        let ticket = Ticket(self.issued);
        if let Some((previous, stale)) = self.in_flight.replace((operation, ticket)) {
            debug!(?previous, %stale, %ticket, "superseding in-flight request");
        }
        ticket
    }

    /// Consumes the in-flight slot if `ticket` is the latest request for
    /// `operation`.
    fn accept(&mut self, operation: Operation, ticket: Ticket) -> bool {
        if self.in_flight == Some((operation, ticket)) {
            self.in_flight = None;
            return true;
        }
        debug!(?operation, %ticket, "discarding stale result");
        false
    }

    fn fail(&mut self, err: PipelineError) {
        info!(kind = ?err.kind(), "pipeline failed: {}", err);
        self.phase = Phase::Failed(err);
    }

    fn ignore(&self, event: &str) {
        debug!(event, state = self.state().name(), "event ignored");
    }

    fn upload(&mut self, file: UploadFile) -> Option<Command> {
        if matches!(self.phase, Phase::Recognizing | Phase::Submitting) {
            self.ignore("upload");
            return None;
        }
        self.image = None;
        self.cropping = false;
        self.tracker.reset();
        self.crop = CropRect::zero();
        self.text = None;
        self.result = None;
        self.in_flight = None;

        if let Err(err) = validate_upload(&file) {
            self.fail(err);
            return None;
        }
        let ticket = self.issue(Operation::Decode);
        self.phase = Phase::Uploading;
        Some(Command::Decode { ticket, file })
    }

    fn decoded(&mut self, ticket: Ticket, result: Result<SourceImage, PipelineError>) {
        if !self.accept(Operation::Decode, ticket) {
            return;
        }
        match result {
            Ok(image) => {
                self.image = Some(image);
                self.phase = Phase::Idle;
            }
            Err(err) => self.fail(err),
        }
    }

    fn resize(&mut self, size: Size) {
        match self.image.as_mut() {
            Some(image) => image.set_display(size),
            None => self.ignore("resize"),
        }
    }

    fn toggle_crop(&mut self) {
        if self.image.is_none() || self.phase == Phase::Uploading {
            self.ignore("toggle_crop");
            return;
        }
        self.cropping = !self.cropping;
        self.tracker.reset();
        self.crop = CropRect::zero();
    }

    fn pointer(&mut self, gesture: GestureEvent) {
        let Some(image) = self.image.as_ref() else {
            return;
        };
        if !self.cropping {
            return;
        }
        self.tracker.handle(gesture);
        self.crop = clamp_to_bounds(self.tracker.rect(), image.display());
    }

    fn recognize(&mut self) -> Option<Command> {
        if matches!(self.phase, Phase::Uploading | Phase::Submitting) {
            self.ignore("recognize");
            return None;
        }
        let Some(image) = self.image.as_ref() else {
            self.fail(PipelineError::image_not_ready());
            return None;
        };
        match extract(image, self.crop) {
            Ok(raster) => {
                let ticket = self.issue(Operation::Recognize);
                self.phase = Phase::Recognizing;
                Some(Command::Recognize {
                    ticket,
                    image: raster,
                })
            }
            Err(err) => {
                self.in_flight = None;
                self.fail(err);
                None
            }
        }
    }

    fn recognized(&mut self, ticket: Ticket, result: Result<String, PipelineError>) {
        if !self.accept(Operation::Recognize, ticket) {
            return;
        }
        match result {
            Ok(raw) => {
                self.text = Some(finalize_text(&raw));
                self.result = None;
                self.phase = Phase::Editing;
            }
            Err(err) => self.fail(err),
        }
    }

    fn edit_text(&mut self, text: String) {
        let editable = matches!(self.phase, Phase::Editing | Phase::Done | Phase::Failed(_));
        if !editable || self.text.is_none() {
            self.ignore("edit_text");
            return;
        }
        self.text = Some(text);
        self.phase = Phase::Editing;
    }

    fn submit(&mut self) -> Option<Command> {
        let submittable = matches!(
            self.phase,
            Phase::Editing | Phase::Done | Phase::Failed(_) | Phase::Submitting
        );
        let Some(text) = self.text.clone().filter(|_| submittable) else {
            self.ignore("submit");
            return None;
        };
        let ticket = self.issue(Operation::Submit);
        self.phase = Phase::Submitting;
        Some(Command::Submit { ticket, text })
    }

    fn submitted(&mut self, ticket: Ticket, result: Result<String, PipelineError>) {
        if !self.accept(Operation::Submit, ticket) {
            return;
        }
        match result {
            Ok(answer) => {
                self.result = Some(answer);
                self.phase = Phase::Done;
            }
            Err(err) => self.fail(err),
        }
    }

    fn dismiss(&mut self) {
        if !matches!(self.phase, Phase::Failed(_)) {
            self.ignore("dismiss");
            return;
        }
        self.phase = if self.result.is_some() {
            Phase::Done
        } else if self.text.is_some() {
            Phase::Editing
        } else {
            Phase::Idle
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crop::{decode_upload, encode_png, test_image};
    use crate::error::ErrorKind;
    use crate::geometry::Point;
    use crate::ocr::NO_TEXT_FOUND;
    use crate::solver::UNSOLVABLE_TOKEN;
    use image::GenericImageView;

    fn png_upload(width: u32, height: u32) -> UploadFile {
        let bytes = encode_png(&test_image(width, height)).unwrap();
        UploadFile::new(bytes, Some("image/png"), Some("riddle.png"))
    }

    /// Runs an upload to completion, decoding inline.
    fn loaded(width: u32, height: u32) -> Pipeline {
        let mut pipeline = Pipeline::new();
        let Some(Command::Decode { ticket, file }) = pipeline.apply(Event::Upload(png_upload(width, height)))
        else {
            panic!("expected decode command");
        };
        assert_eq!(pipeline.state(), PipelineState::Uploading);
        pipeline.apply(Event::Decoded {
            ticket,
            result: decode_upload(&file),
        });
        assert_eq!(pipeline.state(), PipelineState::Idle);
        pipeline
    }

    fn drag(pipeline: &mut Pipeline, from: (f32, f32), to: (f32, f32)) {
        pipeline.apply(Event::Pointer(GestureEvent::Begin(Point::new(from.0, from.1))));
        pipeline.apply(Event::Pointer(GestureEvent::Update(Point::new(to.0, to.1))));
        pipeline.apply(Event::Pointer(GestureEvent::End));
    }

    fn recognize_ticket(pipeline: &mut Pipeline) -> (Ticket, Arc<DynamicImage>) {
        match pipeline.apply(Event::Recognize) {
            Some(Command::Recognize { ticket, image }) => (ticket, image),
            other => panic!("expected recognize command, got {other:?}"),
        }
    }

    fn submit_ticket(pipeline: &mut Pipeline) -> (Ticket, String) {
        match pipeline.apply(Event::Submit) {
            Some(Command::Submit { ticket, text }) => (ticket, text),
            other => panic!("expected submit command, got {other:?}"),
        }
    }

    fn editing(text: &str) -> Pipeline {
        let mut pipeline = loaded(40, 20);
        let (ticket, _) = recognize_ticket(&mut pipeline);
        pipeline.apply(Event::Recognized {
            ticket,
            result: Ok(text.to_string()),
        });
        pipeline
    }

    #[test]
    fn crop_scales_to_natural_pixels_end_to_end() {
        let mut pipeline = loaded(1200, 800);
        pipeline.apply(Event::Resize(Size::new(600.0, 400.0)));
        pipeline.apply(Event::ToggleCrop);
        assert_eq!(pipeline.state(), PipelineState::Cropping(CropRect::zero()));

        drag(&mut pipeline, (50.0, 50.0), (150.0, 100.0));
        assert_eq!(pipeline.crop(), CropRect::new(50.0, 50.0, 100.0, 50.0));
        assert_eq!(
            pipeline.state(),
            PipelineState::Cropping(CropRect::new(50.0, 50.0, 100.0, 50.0))
        );

        let (_, image) = recognize_ticket(&mut pipeline);
        assert_eq!(image.dimensions(), (200, 100));
        assert_eq!(pipeline.state(), PipelineState::Recognizing);
    }

    #[test]
    fn recognize_without_crop_uses_full_image() {
        let mut pipeline = loaded(120, 80);
        pipeline.apply(Event::Resize(Size::new(60.0, 40.0)));
        let (_, image) = recognize_ticket(&mut pipeline);
        assert_eq!(image.dimensions(), (120, 80));
        // The whole-image request hands over the decoded raster, not a copy.
        assert!(std::ptr::eq(
            image.as_ref(),
            pipeline.image().unwrap().raster()
        ));
    }

    #[test]
    fn pointer_events_need_crop_mode() {
        let mut pipeline = loaded(100, 100);
        drag(&mut pipeline, (10.0, 10.0), (50.0, 50.0));
        assert!(pipeline.crop().is_empty());
        assert_eq!(pipeline.state(), PipelineState::Idle);
    }

    #[test]
    fn drag_is_clamped_to_display_bounds() {
        let mut pipeline = loaded(200, 100);
        pipeline.apply(Event::Resize(Size::new(100.0, 50.0)));
        pipeline.apply(Event::ToggleCrop);
        drag(&mut pipeline, (80.0, 40.0), (130.0, -20.0));
        assert_eq!(pipeline.crop(), CropRect::new(80.0, 0.0, 20.0, 40.0));
    }

    #[test]
    fn toggling_crop_off_discards_rectangle() {
        let mut pipeline = loaded(100, 100);
        pipeline.apply(Event::ToggleCrop);
        pipeline.apply(Event::Pointer(GestureEvent::Begin(Point::new(10.0, 10.0))));
        pipeline.apply(Event::Pointer(GestureEvent::Update(Point::new(30.0, 30.0))));
        pipeline.apply(Event::ToggleCrop);
        assert!(pipeline.crop().is_empty());
        assert!(!pipeline.is_cropping());
        assert_eq!(pipeline.state(), PipelineState::Idle);

        // A move arriving after the toggle must not revive the drag.
        pipeline.apply(Event::ToggleCrop);
        pipeline.apply(Event::Pointer(GestureEvent::Update(Point::new(60.0, 60.0))));
        assert!(pipeline.crop().is_empty());
    }

    #[test]
    fn toggle_crop_without_image_is_ignored() {
        let mut pipeline = Pipeline::new();
        pipeline.apply(Event::ToggleCrop);
        assert_eq!(pipeline.state(), PipelineState::Idle);
        assert!(!pipeline.is_cropping());
    }

    #[test]
    fn non_image_upload_fails_without_image() {
        let mut pipeline = loaded(10, 10);
        let command = pipeline.apply(Event::Upload(UploadFile::new(
            b"%PDF-1.7".to_vec(),
            Some("application/pdf"),
            Some("riddle.pdf"),
        )));
        assert!(command.is_none());
        assert!(pipeline.image().is_none());
        let PipelineState::Failed(err) = pipeline.state() else {
            panic!("expected failure");
        };
        assert_eq!(err.kind(), ErrorKind::InvalidFileType);
        pipeline.apply(Event::Dismiss);
        assert_eq!(pipeline.state(), PipelineState::Idle);
    }

    #[test]
    fn undecodable_upload_fails() {
        let mut pipeline = Pipeline::new();
        let Some(Command::Decode { ticket, file }) = pipeline.apply(Event::Upload(
            UploadFile::new(b"garbage".to_vec(), Some("image/png"), None),
        )) else {
            panic!("expected decode command");
        };
        pipeline.apply(Event::Decoded {
            ticket,
            result: decode_upload(&file),
        });
        assert!(matches!(pipeline.state(), PipelineState::Failed(_)));
        assert!(pipeline.image().is_none());
    }

    #[test]
    fn second_upload_supersedes_first_decode() {
        let mut pipeline = Pipeline::new();
        let Some(Command::Decode { ticket: first, file: first_file }) =
            pipeline.apply(Event::Upload(png_upload(10, 10)))
        else {
            panic!("expected decode command");
        };
        let Some(Command::Decode { ticket: second, file: second_file }) =
            pipeline.apply(Event::Upload(png_upload(30, 20)))
        else {
            panic!("expected decode command");
        };
        pipeline.apply(Event::Decoded {
            ticket: second,
            result: decode_upload(&second_file),
        });
        pipeline.apply(Event::Decoded {
            ticket: first,
            result: decode_upload(&first_file),
        });
        assert_eq!(pipeline.image().unwrap().natural(), Size::new(30.0, 20.0));
    }

    #[test]
    fn only_the_latest_recognize_reaches_editing() {
        let mut pipeline = loaded(40, 20);
        let (first, _) = recognize_ticket(&mut pipeline);
        let (second, _) = recognize_ticket(&mut pipeline);
        assert_ne!(first, second);

        pipeline.apply(Event::Recognized {
            ticket: first,
            result: Ok("stale text".to_string()),
        });
        assert_eq!(pipeline.state(), PipelineState::Recognizing);

        pipeline.apply(Event::Recognized {
            ticket: second,
            result: Ok("fresh text".to_string()),
        });
        assert_eq!(pipeline.state(), PipelineState::Editing("fresh text".to_string()));
    }

    #[test]
    fn stale_recognize_after_newer_result_is_dropped() {
        let mut pipeline = loaded(40, 20);
        let (first, _) = recognize_ticket(&mut pipeline);
        let (second, _) = recognize_ticket(&mut pipeline);
        pipeline.apply(Event::Recognized {
            ticket: second,
            result: Ok("fresh text".to_string()),
        });
        pipeline.apply(Event::Recognized {
            ticket: first,
            result: Err(PipelineError::Ocr("late failure".to_string())),
        });
        assert_eq!(pipeline.state(), PipelineState::Editing("fresh text".to_string()));
    }

    #[test]
    fn toggle_crop_during_recognition_keeps_request() {
        let mut pipeline = loaded(100, 100);
        let (ticket, image) = recognize_ticket(&mut pipeline);
        assert_eq!(image.dimensions(), (100, 100));

        pipeline.apply(Event::ToggleCrop);
        drag(&mut pipeline, (10.0, 10.0), (40.0, 30.0));
        assert!(pipeline.is_cropping());
        assert_eq!(pipeline.state(), PipelineState::Recognizing);

        pipeline.apply(Event::Recognized {
            ticket,
            result: Ok("Wer erfand den Buchdruck?".to_string()),
        });
        assert_eq!(
            pipeline.state(),
            PipelineState::Editing("Wer erfand den Buchdruck?".to_string())
        );
        // The new selection is kept for the next run.
        assert_eq!(pipeline.crop(), CropRect::new(10.0, 10.0, 30.0, 20.0));
    }

    #[test]
    fn only_the_latest_submit_reaches_done() {
        let mut pipeline = editing("riddle");
        let (first, _) = submit_ticket(&mut pipeline);
        let (second, text) = submit_ticket(&mut pipeline);
        assert_ne!(first, second);
        assert_eq!(text, "riddle");

        pipeline.apply(Event::Submitted {
            ticket: first,
            result: Ok("Gutenberg".to_string()),
        });
        assert_eq!(pipeline.state(), PipelineState::Submitting);

        pipeline.apply(Event::Submitted {
            ticket: second,
            result: Ok("Johannes Gutenberg".to_string()),
        });
        assert_eq!(
            pipeline.state(),
            PipelineState::Done("Johannes Gutenberg".to_string())
        );

        pipeline.apply(Event::Submitted {
            ticket: first,
            result: Err(PipelineError::Submission("late timeout".to_string())),
        });
        assert_eq!(pipeline.result(), Some("Johannes Gutenberg"));
    }

    #[test]
    fn empty_ocr_result_becomes_sentinel_text() {
        let pipeline = editing("  \n");
        assert_eq!(
            pipeline.state(),
            PipelineState::Editing(NO_TEXT_FOUND.to_string())
        );
    }

    #[test]
    fn ocr_failure_keeps_image_and_crop_for_retry() {
        let mut pipeline = loaded(100, 100);
        pipeline.apply(Event::ToggleCrop);
        drag(&mut pipeline, (10.0, 10.0), (60.0, 40.0));
        let (ticket, _) = recognize_ticket(&mut pipeline);
        pipeline.apply(Event::Recognized {
            ticket,
            result: Err(PipelineError::Ocr("engine crashed".to_string())),
        });
        assert!(matches!(pipeline.state(), PipelineState::Failed(PipelineError::Ocr(_))));
        assert!(pipeline.image().is_some());
        assert_eq!(pipeline.crop(), CropRect::new(10.0, 10.0, 50.0, 30.0));

        let (_, image) = recognize_ticket(&mut pipeline);
        assert_eq!(image.dimensions(), (50, 30));
    }

    #[test]
    fn recognize_without_image_is_extraction_error() {
        let mut pipeline = Pipeline::new();
        assert!(pipeline.apply(Event::Recognize).is_none());
        assert_eq!(
            pipeline.state(),
            PipelineState::Failed(PipelineError::image_not_ready())
        );
    }

    #[test]
    fn failed_extraction_supersedes_in_flight_recognize() {
        let mut pipeline = loaded(100, 100);
        pipeline.apply(Event::Resize(Size::new(1000.0, 1000.0)));
        let (first, _) = recognize_ticket(&mut pipeline);
        pipeline.apply(Event::ToggleCrop);
        // Visible on screen, but narrower than one source pixel.
        drag(&mut pipeline, (10.0, 10.0), (10.4, 10.4));
        assert!(!pipeline.crop().is_empty());
        assert!(pipeline.apply(Event::Recognize).is_none());
        pipeline.apply(Event::Recognized {
            ticket: first,
            result: Ok("old".to_string()),
        });
        let PipelineState::Failed(err) = pipeline.state() else {
            panic!("expected failure");
        };
        assert_eq!(err.kind(), ErrorKind::Extraction);
    }

    #[test]
    fn edits_then_submit_reaches_done() {
        let mut pipeline = editing("Wer malte die Mona Lisa?");
        pipeline.apply(Event::EditText("Wer malte die Mona Lisa? (Maler)".to_string()));
        let (ticket, text) = submit_ticket(&mut pipeline);
        assert_eq!(text, "Wer malte die Mona Lisa? (Maler)");
        assert_eq!(pipeline.state(), PipelineState::Submitting);
        pipeline.apply(Event::Submitted {
            ticket,
            result: Ok("Leonardo da Vinci".to_string()),
        });
        assert_eq!(
            pipeline.state(),
            PipelineState::Done("Leonardo da Vinci".to_string())
        );
    }

    #[test]
    fn sentinel_answer_is_shown_verbatim() {
        let mut pipeline = editing("???");
        let (ticket, _) = submit_ticket(&mut pipeline);
        pipeline.apply(Event::Submitted {
            ticket,
            result: Ok(UNSOLVABLE_TOKEN.to_string()),
        });
        assert_eq!(
            pipeline.state(),
            PipelineState::Done(UNSOLVABLE_TOKEN.to_string())
        );
    }

    #[test]
    fn submission_failure_keeps_text() {
        let mut pipeline = editing("riddle");
        let (ticket, _) = submit_ticket(&mut pipeline);
        pipeline.apply(Event::Submitted {
            ticket,
            result: Err(PipelineError::Submission("API request failed".to_string())),
        });
        assert!(matches!(pipeline.state(), PipelineState::Failed(_)));
        assert_eq!(pipeline.text(), Some("riddle"));

        let (_, text) = submit_ticket(&mut pipeline);
        assert_eq!(text, "riddle");
    }

    #[test]
    fn editing_after_done_skips_ocr() {
        let mut pipeline = editing("riddle");
        let (ticket, _) = submit_ticket(&mut pipeline);
        pipeline.apply(Event::Submitted {
            ticket,
            result: Ok("Goethe".to_string()),
        });
        pipeline.apply(Event::EditText("better riddle".to_string()));
        assert_eq!(
            pipeline.state(),
            PipelineState::Editing("better riddle".to_string())
        );
        assert_eq!(pipeline.result(), Some("Goethe"));
    }

    #[test]
    fn upload_is_rejected_while_busy() {
        let mut pipeline = editing("riddle");
        let _ = submit_ticket(&mut pipeline);
        assert!(pipeline.apply(Event::Upload(png_upload(5, 5))).is_none());
        assert_eq!(pipeline.state(), PipelineState::Submitting);
        assert_eq!(pipeline.text(), Some("riddle"));
    }

    #[test]
    fn new_upload_discards_everything() {
        let mut pipeline = editing("riddle");
        let (ticket, _) = submit_ticket(&mut pipeline);
        pipeline.apply(Event::Submitted {
            ticket,
            result: Ok("Goethe".to_string()),
        });
        pipeline.apply(Event::Upload(png_upload(8, 8)));
        assert_eq!(pipeline.state(), PipelineState::Uploading);
        assert!(pipeline.image().is_none());
        assert!(pipeline.text().is_none());
        assert!(pipeline.result().is_none());
        assert!(pipeline.crop().is_empty());
    }

    #[test]
    fn dismiss_returns_to_last_good_phase() {
        let mut pipeline = editing("riddle");
        let (ticket, _) = submit_ticket(&mut pipeline);
        pipeline.apply(Event::Submitted {
            ticket,
            result: Err(PipelineError::Submission("timeout".to_string())),
        });
        pipeline.apply(Event::Dismiss);
        assert_eq!(pipeline.state(), PipelineState::Editing("riddle".to_string()));
    }

    #[test]
    fn submit_without_text_is_ignored() {
        let mut pipeline = loaded(10, 10);
        assert!(pipeline.apply(Event::Submit).is_none());
        assert_eq!(pipeline.state(), PipelineState::Idle);
    }
}
