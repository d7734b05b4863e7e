mod escape;
mod feed;
mod overlay;
mod status;

pub use feed::FeedView;
pub use overlay::OverlayView;
pub use status::ConnectionStatus;

use escape::escape_html;
use status::StatusIndicator;

use tokio::time::Instant;

use crate::ws::ServerMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    Applied,
    /// The message is valid but this page has no handler for it.
    NotForThisPage,
}

/// One rendered page driven by the connection manager. All methods are called
/// from the manager's task, one event at a time.
pub trait Page {
    fn name(&self) -> &'static str;

    fn handle(&mut self, message: ServerMessage, now: Instant) -> Handled;

    fn set_status(&mut self, status: ConnectionStatus);

    /// Earliest pending view timer.
    fn next_deadline(&self) -> Option<Instant>;

    /// Runs every view timer due at `now`.
    fn fire_timers(&mut self, now: Instant);

    fn render(&self) -> String;

    /// Whether the rendered output changed since the last call.
    fn take_dirty(&mut self) -> bool;

    /// Drops all pending timers.
    fn dispose(&mut self);
}
