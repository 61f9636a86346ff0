//! Services around the pipeline: source resolution, output encoding and stage reporting

pub mod format;
pub mod io;
pub mod progress;

pub use format::{
    DownloadDescriptor, OutputFormatHandler, DOWNLOAD_CONTENT_DISPOSITION, DOWNLOAD_FILE_NAME,
    DOWNLOAD_MIME_TYPE,
};
pub use io::{default_source, find_default_image, ImageSource, DEFAULT_IMAGES};
pub use progress::{
    NoOpObserver, PipelineStage, PipelineState, RecordingObserver, RequestLifecycle, StageEvent,
    StageObserver, TracingObserver,
};
