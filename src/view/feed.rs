use std::{collections::VecDeque, fmt::Write as _, time::Duration};

use tokio::time::Instant;
use tracing::{debug, info};

use crate::{
    config::Config,
    timer::{earliest, TimerSlot},
    ws::{Donation, ServerMessage},
};

use super::{escape_html, ConnectionStatus, Handled, Page, StatusIndicator};

const EMPTY_STATE: &str = "Donations will show up here...";

#[derive(Debug)]
pub struct DonationRow {
    id: u64,
    donation: Donation,
    highlight: TimerSlot,
}

impl DonationRow {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn donation(&self) -> &Donation {
        &self.donation
    }

    pub fn is_highlighted(&self) -> bool {
        self.highlight.is_armed()
    }
}

/// The scrolling list of donations, oldest first.
#[derive(Debug)]
pub struct FeedView {
    rows: VecDeque<DonationRow>,
    next_id: u64,
    show_placeholder: bool,
    /// Row the list was last scrolled down to.
    scrolled_to: Option<u64>,
    scroll_timer: TimerSlot,
    status: StatusIndicator,
    dirty: bool,

    highlight_for: Duration,
    scroll_after: Duration,
    max_rows: usize,
    currency_symbol: String,
    utc_offset_minutes: i32,
}

impl FeedView {
    pub fn new(config: &Config) -> Self {
        Self {
            rows: VecDeque::new(),
            next_id: 0,
            show_placeholder: true,
            scrolled_to: None,
            scroll_timer: TimerSlot::new(),
            status: StatusIndicator::default(),
            dirty: true,
            highlight_for: config.new_donation_highlight(),
            scroll_after: config.auto_scroll_delay(),
            max_rows: config.max_donations.max(1),
            currency_symbol: config.currency_symbol.clone(),
            utc_offset_minutes: config.utc_offset_minutes,
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = &DonationRow> {
        self.rows.iter()
    }

    pub fn shows_placeholder(&self) -> bool {
        self.show_placeholder
    }

    pub fn scrolled_to(&self) -> Option<u64> {
        self.scrolled_to
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status.status()
    }

    /// Replaces the whole list with a server snapshot.
    pub fn init_donations(&mut self, donations: Vec<Donation>, now: Instant) {
        self.rows.clear();
        self.scroll_timer.cancel();
        self.scrolled_to = None;
        self.dirty = true;

        if donations.is_empty() {
            self.show_placeholder = true;
            return;
        }
        for donation in donations {
            self.add_donation(donation, false, now);
        }
    }

    pub fn add_donation(&mut self, donation: Donation, is_new: bool, now: Instant) {
        self.show_placeholder = false;

        let mut highlight = TimerSlot::new();
        if is_new {
            highlight.arm(now, self.highlight_for);
            self.scroll_timer.arm(now, self.scroll_after);
        }
        self.rows.push_back(DonationRow {
            id: self.next_id,
            donation,
            highlight,
        });
        self.next_id += 1;

        while self.rows.len() > self.max_rows {
            self.rows.pop_front();
        }
        self.dirty = true;
    }

    fn scroll_to_bottom(&mut self) {
        let bottom = self.rows.back().map(DonationRow::id);
        if bottom != self.scrolled_to {
            debug!(row = ?bottom, "Scrolling feed to bottom");
            self.scrolled_to = bottom;
            self.dirty = true;
        }
    }

    fn render_row(&self, out: &mut String, row: &DonationRow) {
        let donation = &row.donation;
        let class = if row.is_highlighted() {
            "donation-item new"
        } else {
            "donation-item"
        };
        let _ = write!(
            out,
            r#"<div class="{class}" data-id="{}"><div class="donation-header"><div class="donor-name">{}</div><div class="donation-amount">{} {}</div></div>"#,
            row.id,
            escape_html(&donation.donor_name),
            donation.amount,
            escape_html(&self.currency_symbol),
        );
        if let Some(comment) = &donation.comment {
            let _ = write!(
                out,
                r#"<div class="donation-comment">&quot;{}&quot;</div>"#,
                escape_html(comment)
            );
        }
        let _ = write!(
            out,
            r#"<div class="donation-time">{}</div></div>"#,
            format_clock(donation.timestamp, self.utc_offset_minutes)
        );
    }
}

impl Page for FeedView {
    fn name(&self) -> &'static str {
        "feed"
    }

    fn handle(&mut self, message: ServerMessage, now: Instant) -> Handled {
        match message {
            ServerMessage::Init { donations } => {
                info!(count = donations.len(), "Received donation snapshot");
                self.init_donations(donations, now);
            }
            ServerMessage::NewDonation { donation } => {
                info!(donor = %donation.donor_name, amount = %donation.amount, "New donation");
                self.add_donation(donation, true, now);
            }
            _ => return Handled::NotForThisPage,
        }
        Handled::Applied
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        if self.status.set(status) {
            self.dirty = true;
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.rows
            .iter()
            .map(|row| row.highlight.deadline())
            .fold(self.scroll_timer.deadline(), earliest)
    }

    fn fire_timers(&mut self, now: Instant) {
        for row in &mut self.rows {
            if row.highlight.fire(now) {
                self.dirty = true;
            }
        }
        if self.scroll_timer.fire(now) {
            self.scroll_to_bottom();
        }
    }

    fn render(&self) -> String {
        let mut out = self.status.render();
        match self.scrolled_to {
            Some(id) => {
                let _ = write!(out, r#"<div id="donations-list" data-scrolled-to="{id}">"#);
            }
            None => out.push_str(r#"<div id="donations-list">"#),
        }
        if self.show_placeholder {
            let _ = write!(out, r#"<div class="empty-state">{EMPTY_STATE}</div>"#);
        }
        for row in &self.rows {
            self.render_row(&mut out, row);
        }
        out.push_str("</div>");
        out
    }

    fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    fn dispose(&mut self) {
        self.scroll_timer.cancel();
        for row in &mut self.rows {
            row.highlight.cancel();
        }
    }
}

/// Time of day `HH:MM:SS` for an epoch timestamp.
fn format_clock(timestamp: i64, utc_offset_minutes: i32) -> String {
    let local = timestamp.saturating_add(i64::from(utc_offset_minutes) * 60);
    let secs = local.rem_euclid(86_400);
    format!(
        "{:02}:{:02}:{:02}",
        secs / 3600,
        secs % 3600 / 60,
        secs % 60
    )
}
