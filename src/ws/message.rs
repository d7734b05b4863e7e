use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Init { donations: Vec<Donation> },
    NewDonation { donation: Donation },
    ShowImage(ShowImage),
    ShowMedia(ShowMedia),
    Clear,
}

impl ServerMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            ServerMessage::Init { .. } => MessageKind::Init,
            ServerMessage::NewDonation { .. } => MessageKind::NewDonation,
            ServerMessage::ShowImage(_) => MessageKind::ShowImage,
            ServerMessage::ShowMedia(_) => MessageKind::ShowMedia,
            ServerMessage::Clear => MessageKind::Clear,
        }
    }
}

/// The `type` tags this client understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Init,
    NewDonation,
    ShowImage,
    ShowMedia,
    Clear,
}

impl MessageKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "init" => Some(MessageKind::Init),
            "new_donation" => Some(MessageKind::NewDonation),
            "show_image" => Some(MessageKind::ShowImage),
            "show_media" => Some(MessageKind::ShowMedia),
            "clear" => Some(MessageKind::Clear),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            MessageKind::Init => "init",
            MessageKind::NewDonation => "new_donation",
            MessageKind::ShowImage => "show_image",
            MessageKind::ShowMedia => "show_media",
            MessageKind::Clear => "clear",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Donation {
    #[serde(default = "anonymous", deserialize_with = "or_anonymous")]
    pub donor_name: String,
    pub amount: Amount,
    #[serde(default, deserialize_with = "non_empty")]
    pub comment: Option<String>,
    pub timestamp: i64, // epoch seconds
}

fn anonymous() -> String {
    "Anonymous".to_owned()
}

fn or_anonymous<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(non_empty(deserializer)?.unwrap_or_else(anonymous))
}

fn non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

/// Money in minor units (kopiyky, cents).
///
/// The server sends decimal major units (`12.5`); the value is converted to
/// minor units once, when it is decoded, and converted back only when encoded.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(try_from = "WireAmount", into = "f64")]
pub struct Amount {
    minor: i64,
}

impl Amount {
    pub fn from_minor(minor: i64) -> Self {
        Self { minor }
    }

    pub fn minor(self) -> i64 {
        self.minor
    }

    fn from_major(major: f64) -> Result<Self, String> {
        let minor = (major * 100.0).round();
        if !minor.is_finite() || minor.abs() > i64::MAX as f64 {
            return Err(format!("amount {major} is out of range"));
        }
        Ok(Self {
            minor: minor as i64,
        })
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.minor < 0 { "-" } else { "" };
        let abs = self.minor.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl From<Amount> for f64 {
    fn from(amount: Amount) -> Self {
        amount.minor as f64 / 100.0
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireAmount {
    Number(f64),
    Text(String),
}

impl TryFrom<WireAmount> for Amount {
    type Error = String;

    fn try_from(value: WireAmount) -> Result<Self, Self::Error> {
        match value {
            WireAmount::Number(major) => Amount::from_major(major),
            WireAmount::Text(text) => {
                let major = text
                    .trim()
                    .parse::<f64>()
                    .map_err(|e| format!("amount {text:?} is not a number: {e}"))?;
                Amount::from_major(major)
            }
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ShowImage {
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>, // in milliseconds
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ShowMedia {
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>, // in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub donor_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Amount>,
}

/// What the overlay needs to show something; both `show_image` and
/// `show_media` end up here.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaRequest {
    pub image: String,
    pub audio: Option<String>,
    pub duration_ms: Option<u64>,
    pub donor: Option<DonorMeta>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DonorMeta {
    pub donor_name: Option<String>,
    pub comment: Option<String>,
    pub amount: Option<Amount>,
}

impl From<ShowImage> for MediaRequest {
    fn from(message: ShowImage) -> Self {
        Self {
            image: message.image,
            audio: None,
            duration_ms: message.duration,
            donor: None,
        }
    }
}

impl From<ShowMedia> for MediaRequest {
    fn from(message: ShowMedia) -> Self {
        let donor = DonorMeta {
            donor_name: message.donor_name.filter(|s| !s.is_empty()),
            comment: message.comment.filter(|s| !s.is_empty()),
            amount: message.amount,
        };
        let has_donor =
            donor.donor_name.is_some() || donor.comment.is_some() || donor.amount.is_some();
        Self {
            image: message.image,
            audio: message.audio.filter(|s| !s.is_empty()),
            duration_ms: message.duration,
            donor: has_donor.then_some(donor),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_init_snapshot() {
        let raw = r#"{"type":"init","donations":[
            {"donor_name":"Alice","amount":12.5,"comment":"","timestamp":1700000000},
            {"amount":"3","comment":"hi","timestamp":1700000060}
        ]}"#;
        let message: ServerMessage = serde_json::from_str(raw).unwrap();
        let ServerMessage::Init { donations } = message else {
            panic!("expected init, got {message:?}");
        };
        assert_eq!(donations.len(), 2);
        assert_eq!(donations[0].donor_name, "Alice");
        assert_eq!(donations[0].amount.minor(), 1250);
        assert_eq!(donations[0].comment, None);
        assert_eq!(donations[1].donor_name, "Anonymous");
        assert_eq!(donations[1].amount.minor(), 300);
        assert_eq!(donations[1].comment.as_deref(), Some("hi"));
    }

    #[test]
    fn null_or_empty_donor_name_is_anonymous() {
        let raw = r#"{"type":"init","donations":[
            {"donor_name":null,"amount":1,"timestamp":1},
            {"donor_name":"","amount":2,"comment":null,"timestamp":2}
        ]}"#;
        let ServerMessage::Init { donations } = serde_json::from_str(raw).unwrap() else {
            panic!("expected init");
        };
        let names: Vec<_> = donations.iter().map(|d| d.donor_name.as_str()).collect();
        assert_eq!(names, ["Anonymous", "Anonymous"]);
        assert_eq!(donations[1].comment, None);
    }

    #[test]
    fn amount_rounds_to_minor_units() {
        let amount: Amount = serde_json::from_str("0.29").unwrap();
        assert_eq!(amount.minor(), 29);
        assert_eq!(amount.to_string(), "0.29");
        assert_eq!(Amount::from_minor(-1205).to_string(), "-12.05");
        assert!(serde_json::from_str::<Amount>(r#""lots""#).is_err());
        assert_eq!(serde_json::to_string(&Amount::from_minor(1250)).unwrap(), "12.5");
    }

    #[test]
    fn show_media_with_donor_fields_carries_metadata() {
        let raw = r#"{"type":"show_media","image":"/media/a.gif","audio":"/media/a.mp3",
            "duration":7000,"donor_name":"Bob","amount":100}"#;
        let message: ServerMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(message.kind(), MessageKind::ShowMedia);
        let ServerMessage::ShowMedia(media) = message else {
            unreachable!()
        };
        let request = MediaRequest::from(media);
        assert_eq!(request.audio.as_deref(), Some("/media/a.mp3"));
        assert_eq!(request.duration_ms, Some(7000));
        let donor = request.donor.expect("donor metadata");
        assert_eq!(donor.donor_name.as_deref(), Some("Bob"));
        assert_eq!(donor.amount, Some(Amount::from_minor(10_000)));
    }

    #[test]
    fn show_image_has_no_audio_or_donor() {
        let raw = r#"{"type":"show_image","image":"/media/b.png"}"#;
        let ServerMessage::ShowImage(image) = serde_json::from_str(raw).unwrap() else {
            panic!("expected show_image");
        };
        let request = MediaRequest::from(image);
        assert_eq!(request.audio, None);
        assert_eq!(request.duration_ms, None);
        assert_eq!(request.donor, None);
    }

    #[test]
    fn tags_round_trip_through_kind() {
        for kind in [
            MessageKind::Init,
            MessageKind::NewDonation,
            MessageKind::ShowImage,
            MessageKind::ShowMedia,
            MessageKind::Clear,
        ] {
            assert_eq!(MessageKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(MessageKind::from_tag("donation_goal"), None);
    }
}
