//! Editor session facade: owns the dispatcher and synchronizer, loads
//! initial content, and exposes the host-facing entry points (toolbar
//! dispatch, image paste/drop, backspace interception, save).

use serde_json::{json, Value};

use scribe_core::{
    CapabilitySnapshot, ChangeNotice, Dispatcher, DispatchOutcome, Document, ObserverId, Point,
    Selection, SnapshotObserver, Synchronizer,
};

use crate::html;
use crate::ingest::{ContentFormat, ImageSource, IngestError};
use crate::markdown;

/// Host hook invoked with serialized HTML on save.
pub type SaveCallback = Box<dyn FnMut(&str)>;

/// Host-supplied image processing (compression, resizing). A failure falls
/// back to the unprocessed payload; the image is inserted either way.
pub type ImageProcessor = Box<dyn FnMut(&[u8], &str) -> Result<Vec<u8>, IngestError>>;

pub struct EditorSession {
    dispatcher: Dispatcher,
    synchronizer: Synchronizer,
    save_callback: Option<SaveCallback>,
    image_processor: Option<ImageProcessor>,
}

impl EditorSession {
    /// Opens a session over parsed initial content. Unparseable HTML is
    /// never fatal; the session starts on the empty-paragraph document.
    pub fn open(content: &str, format: ContentFormat) -> Self {
        let doc = match format {
            ContentFormat::Markdown => markdown::parse(content),
            ContentFormat::Html => html::parse(content).unwrap_or_else(|err| {
                log::warn!("discarding unparseable initial content: {err}");
                Document::empty()
            }),
        };
        let doc = if doc.children.is_empty() {
            Document::empty()
        } else {
            doc
        };

        let dispatcher = Dispatcher::with_standard(doc);
        let mut synchronizer = Synchronizer::new();
        synchronizer.refresh(
            dispatcher.registry(),
            dispatcher.doc(),
            dispatcher.selection(),
            dispatcher.revision(),
        );
        Self {
            dispatcher,
            synchronizer,
            save_callback: None,
            image_processor: None,
        }
    }

    pub fn on_save(mut self, callback: impl FnMut(&str) + 'static) -> Self {
        self.save_callback = Some(Box::new(callback));
        self
    }

    pub fn with_image_processor(
        mut self,
        processor: impl FnMut(&[u8], &str) -> Result<Vec<u8>, IngestError> + 'static,
    ) -> Self {
        self.image_processor = Some(Box::new(processor));
        self
    }

    pub fn doc(&self) -> &Document {
        self.dispatcher.doc()
    }

    pub fn selection(&self) -> &Selection {
        self.dispatcher.selection()
    }

    pub fn snapshot(&self) -> &CapabilitySnapshot {
        self.synchronizer.snapshot()
    }

    pub fn subscribe(&mut self, observer: Box<dyn SnapshotObserver>) -> ObserverId {
        self.synchronizer.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        self.synchronizer.unsubscribe(id)
    }

    /// Toolbar-facing dispatch. The capability snapshot is refreshed before
    /// this returns, so observers never see a stale snapshot after an edit.
    pub fn dispatch(&mut self, command: &str, args: Option<Value>) -> Vec<DispatchOutcome> {
        let outcomes = self.dispatcher.dispatch(command, args);
        if outcomes.iter().any(DispatchOutcome::is_committed) {
            self.refresh();
        }
        outcomes
    }

    pub fn set_selection(&mut self, selection: Selection) -> ChangeNotice {
        let notice = self.dispatcher.set_selection(selection);
        self.refresh();
        notice
    }

    /// Clipboard paste entry point.
    pub fn paste_image(&mut self, data: Vec<u8>, mime: &str) -> Vec<DispatchOutcome> {
        self.insert_image(
            ImageSource::Bytes {
                data,
                mime: mime.to_string(),
            },
            None,
        )
    }

    /// Drag-and-drop entry point; `at` is the drop position when the host
    /// resolved one.
    pub fn drop_image(
        &mut self,
        name: &str,
        data: Vec<u8>,
        mime: &str,
        at: Option<Point>,
    ) -> Vec<DispatchOutcome> {
        self.insert_image(
            ImageSource::File {
                name: name.to_string(),
                data,
                mime: mime.to_string(),
            },
            at,
        )
    }

    /// Runs the source through the image processor (falling back to the raw
    /// payload on failure), then resolves the deferred insert.
    pub fn insert_image(
        &mut self,
        source: ImageSource,
        at: Option<Point>,
    ) -> Vec<DispatchOutcome> {
        let ticket = self.dispatcher.defer("image.insert");
        let source = self.process(source);

        let src = match source.resolve() {
            Ok(src) => src,
            Err(err) => {
                log::warn!("dropping image insert: {err}");
                self.dispatcher.abandon(ticket);
                return Vec::new();
            }
        };

        let mut args = json!({ "src": src });
        if let Some(point) = at {
            if let Ok(value) = serde_json::to_value(&point) {
                args["at"] = value;
            }
        }

        match self.dispatcher.resolve(ticket, Some(args)) {
            Ok(outcomes) => {
                if outcomes.iter().any(DispatchOutcome::is_committed) {
                    self.refresh();
                }
                outcomes
            }
            Err(err) => {
                log::warn!("deferred image insert failed: {err}");
                Vec::new()
            }
        }
    }

    /// Backspace interception ahead of the host's default delete. Returns
    /// whether the key press was handled (a 1x1 table was removed).
    pub fn intercept_backspace(&mut self) -> bool {
        let outcomes = self.dispatcher.dispatch("table.delete_single_cell", None);
        let handled = outcomes.iter().any(DispatchOutcome::is_committed);
        if handled {
            self.refresh();
        }
        handled
    }

    /// Serializes the document to HTML and hands it to the save callback.
    pub fn save(&mut self) -> String {
        let html = html::serialize(self.dispatcher.doc());
        if let Some(callback) = &mut self.save_callback {
            callback(&html);
        }
        html
    }

    fn process(&mut self, source: ImageSource) -> ImageSource {
        let Some(processor) = &mut self.image_processor else {
            return source;
        };
        match source {
            ImageSource::Bytes { data, mime } => match processor(&data, &mime) {
                Ok(processed) => ImageSource::Bytes {
                    data: processed,
                    mime,
                },
                Err(err) => {
                    log::warn!("image processing failed, inserting original: {err}");
                    ImageSource::Bytes { data, mime }
                }
            },
            ImageSource::File { name, data, mime } => match processor(&data, &mime) {
                Ok(processed) => ImageSource::File {
                    name,
                    data: processed,
                    mime,
                },
                Err(err) => {
                    log::warn!("image processing failed, inserting original: {err}");
                    ImageSource::File { name, data, mime }
                }
            },
            other => other,
        }
    }

    fn refresh(&mut self) {
        self.synchronizer.refresh(
            self.dispatcher.registry(),
            self.dispatcher.doc(),
            self.dispatcher.selection(),
            self.dispatcher.revision(),
        );
    }
}
