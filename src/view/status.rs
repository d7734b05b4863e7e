#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    /// Reconnecting stopped for good; shown so the outage is visible.
    GaveUp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusIndicator {
    status: ConnectionStatus,
}

impl Default for StatusIndicator {
    fn default() -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
        }
    }
}

impl StatusIndicator {
    /// Returns whether the status changed.
    pub fn set(&mut self, status: ConnectionStatus) -> bool {
        let changed = self.status != status;
        self.status = status;
        changed
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn class(&self) -> &'static str {
        match self.status {
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::GaveUp => "gave-up",
        }
    }

    pub fn label(&self) -> &'static str {
        match self.status {
            ConnectionStatus::Connected => "Connected",
            ConnectionStatus::Disconnected => "Disconnected",
            ConnectionStatus::GaveUp => "Connection lost, restart to retry",
        }
    }

    pub fn render(&self) -> String {
        format!(
            r#"<div id="status"><span id="status-indicator" class="{}"></span><span id="status-text">{}</span></div>"#,
            self.class(),
            self.label()
        )
    }
}
