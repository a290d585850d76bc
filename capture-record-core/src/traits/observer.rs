use crate::models::channel::Channel;
use crate::models::error::EncoderError;
use crate::models::state::RecordState;
use crate::models::summary::RecordingSummary;

/// Event observer for a recording session.
///
/// Called from the controller thread, except `on_encoder_error` and
/// `on_status` which may also fire on writer threads. Implementations
/// should marshal to the UI thread if needed.
pub trait RecordObserver: Send + Sync {
    /// Called when the session state changes.
    fn on_state_changed(&self, state: RecordState);

    /// Called whenever the most recent status message changes.
    fn on_status(&self, message: &str);

    /// Called when a channel encoder reports a failure or diagnostic.
    fn on_encoder_error(&self, channel: Channel, error: &EncoderError);

    /// Called after every file of a recording is closed.
    fn on_recording_finished(&self, summary: &RecordingSummary);
}

/// Receives errors from one FLAC encoder.
pub trait EncoderObserver: Send + Sync {
    fn on_error(&self, error: &EncoderError);
}
