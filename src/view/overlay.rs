use std::{fmt::Write as _, time::Duration};

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    audio::AudioSink,
    config::Config,
    timer::{earliest, TimerSlot},
    ws::{DonorMeta, MediaRequest, ServerMessage},
};

use super::{escape_html, ConnectionStatus, Handled, Page};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Hidden,
    Showing,
    HidingAnimation,
}

/// Full-screen media popup: an image, an optional sound and optional donor
/// details, hidden again after a timeout.
///
/// Two timers drive it. `hide_timer` ends a show; `reset_timer` ends the hide
/// animation and wipes the content. A new show cancels both, so consecutive
/// shows never pass through `Hidden`.
pub struct OverlayView {
    visibility: Visibility,
    image: Option<String>,
    audio: Option<String>,
    donor: Option<DonorMeta>,
    hide_timer: TimerSlot,
    reset_timer: TimerSlot,
    audio_sink: Box<dyn AudioSink>,
    dirty: bool,

    default_duration: Duration,
    transition: Duration,
    currency_symbol: String,
}

impl OverlayView {
    pub fn new(config: &Config, audio_sink: Box<dyn AudioSink>) -> Self {
        Self {
            visibility: Visibility::Hidden,
            image: None,
            audio: None,
            donor: None,
            hide_timer: TimerSlot::new(),
            reset_timer: TimerSlot::new(),
            audio_sink,
            dirty: true,
            default_duration: config.default_overlay_duration(),
            transition: config.hide_transition(),
            currency_symbol: config.currency_symbol.clone(),
        }
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    pub fn donor(&self) -> Option<&DonorMeta> {
        self.donor.as_ref()
    }

    pub fn hide_deadline(&self) -> Option<Instant> {
        self.hide_timer.deadline()
    }

    pub fn show_image(&mut self, image: String, duration_ms: Option<u64>, now: Instant) {
        self.show_media(
            MediaRequest {
                image,
                audio: None,
                duration_ms,
                donor: None,
            },
            now,
        );
    }

    pub fn show_media(&mut self, request: MediaRequest, now: Instant) {
        self.hide_timer.cancel();
        self.reset_timer.cancel();

        info!(image = %request.image, audio = ?request.audio, "Showing media");
        self.image = Some(request.image);
        self.donor = request.donor;
        self.visibility = Visibility::Showing;

        if let Some(audio) = request.audio {
            if let Err(e) = self.audio_sink.play(&audio) {
                warn!("Audio play failed: {e}");
            }
            self.audio = Some(audio);
        }

        // Zero means "not set", same as an absent duration.
        let duration = request
            .duration_ms
            .filter(|&ms| ms > 0)
            .map_or(self.default_duration, Duration::from_millis);
        self.hide_timer.arm(now, duration);
        self.dirty = true;
    }

    /// Starts the hide animation. Does nothing unless something is showing.
    pub fn hide_media(&mut self, now: Instant) -> bool {
        if self.visibility != Visibility::Showing {
            return false;
        }
        self.hide_timer.cancel();
        self.audio_sink.stop();
        self.visibility = Visibility::HidingAnimation;
        self.reset_timer.arm(now, self.transition);
        self.dirty = true;
        true
    }

    fn reset(&mut self) {
        debug!("Overlay hidden");
        self.visibility = Visibility::Hidden;
        self.image = None;
        self.audio = None;
        self.donor = None;
        self.dirty = true;
    }

    fn container_class(&self) -> &'static str {
        match self.visibility {
            Visibility::Hidden => "hidden",
            Visibility::Showing => "visible animate-in",
            Visibility::HidingAnimation => "visible animate-out",
        }
    }
}

impl Page for OverlayView {
    fn name(&self) -> &'static str {
        "overlay"
    }

    fn handle(&mut self, message: ServerMessage, now: Instant) -> Handled {
        match message {
            ServerMessage::ShowImage(image) => self.show_media(image.into(), now),
            ServerMessage::ShowMedia(media) => self.show_media(media.into(), now),
            ServerMessage::Clear => {
                self.hide_media(now);
            }
            _ => return Handled::NotForThisPage,
        }
        Handled::Applied
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        debug!(?status, "Overlay connection status");
    }

    fn next_deadline(&self) -> Option<Instant> {
        earliest(self.hide_timer.deadline(), self.reset_timer.deadline())
    }

    fn fire_timers(&mut self, now: Instant) {
        if self.hide_timer.fire(now) {
            self.hide_media(now);
        }
        if self.reset_timer.fire(now) {
            self.reset();
        }
    }

    fn render(&self) -> String {
        let mut out = format!(
            r#"<div id="media-container" class="{}">"#,
            self.container_class()
        );
        if let Some(image) = &self.image {
            let _ = write!(out, r#"<img id="media-image" src="{}">"#, escape_html(image));
        }
        if let Some(audio) = &self.audio {
            let _ = write!(out, r#"<audio id="media-audio" src="{}"></audio>"#, escape_html(audio));
        }
        if let Some(donor) = &self.donor {
            if let Some(name) = &donor.donor_name {
                let _ = write!(out, r#"<div class="donor-name">{}</div>"#, escape_html(name));
            }
            if let Some(amount) = donor.amount {
                let _ = write!(
                    out,
                    r#"<div class="donation-amount">{amount} {}</div>"#,
                    escape_html(&self.currency_symbol)
                );
            }
            if let Some(comment) = &donor.comment {
                let _ = write!(
                    out,
                    r#"<div class="donation-comment">{}</div>"#,
                    escape_html(comment)
                );
            }
        }
        out.push_str("</div>");
        out
    }

    fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    fn dispose(&mut self) {
        self.hide_timer.cancel();
        self.reset_timer.cancel();
        self.audio_sink.stop();
    }
}
