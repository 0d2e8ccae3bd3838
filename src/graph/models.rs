//! Microsoft Graph request and response types.
//!
//! Only the properties the tutorial reads or sends are modeled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One page of a Graph collection.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,

    /// Present when the server holds more results.
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

impl<T> Page<T> {
    /// True when another page is available. Never fetched automatically.
    pub fn has_more(&self) -> bool {
        self.next_link.is_some()
    }
}

/// Signed-in user's profile from `/me`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub display_name: Option<String>,

    /// Work/school accounts carry the address here.
    pub mail: Option<String>,

    /// Personal accounts carry the address here.
    pub user_principal_name: Option<String>,
}

impl UserProfile {
    /// Get the best available email, skipping empty values.
    pub fn email(&self) -> Option<&str> {
        self.mail
            .as_deref()
            .filter(|m| !m.is_empty())
            .or_else(|| {
                self.user_principal_name
                    .as_deref()
                    .filter(|upn| !upn.is_empty())
            })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailAddress {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub email_address: EmailAddress,
}

impl Recipient {
    pub fn to_address(address: &str) -> Self {
        Self {
            email_address: EmailAddress {
                name: None,
                address: Some(address.to_string()),
            },
        }
    }
}

/// Inbox listing entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSummary {
    pub subject: Option<String>,
    pub from: Option<Recipient>,
    pub is_read: Option<bool>,
    pub received_date_time: Option<DateTime<Utc>>,
}

impl MessageSummary {
    pub fn sender_name(&self) -> Option<&str> {
        self.from
            .as_ref()
            .and_then(|f| f.email_address.name.as_deref())
    }
}

/// Directory user listing entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    #[serde(default)]
    pub id: String,
    pub display_name: Option<String>,
    pub mail: Option<String>,
}

/// Group member. Members may be users, devices or nested groups.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryObject {
    pub id: String,
    pub display_name: Option<String>,
    pub mail: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BodyType {
    Text,
    Html,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemBody {
    pub content_type: BodyType,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub subject: String,
    pub body: ItemBody,
    pub to_recipients: Vec<Recipient>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendMailRequest {
    pub message: OutgoingMessage,
}

/// A wall-clock time in a named (Windows or IANA) time zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateTimeTimeZone {
    pub date_time: String,
    pub time_zone: String,
}

impl DateTimeTimeZone {
    pub fn new(date_time: &str, time_zone: &str) -> Self {
        Self {
            date_time: date_time.to_string(),
            time_zone: time_zone.to_string(),
        }
    }
}

impl std::fmt::Display for DateTimeTimeZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.date_time, self.time_zone)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: DateTimeTimeZone,
    pub end: DateTimeTimeZone,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    pub schedules: Vec<String>,
    pub start_time: DateTimeTimeZone,
    pub end_time: DateTimeTimeZone,
    pub availability_view_interval: u32,
}

/// Free/busy information for one requested schedule.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleInformation {
    pub schedule_id: String,
    pub availability_view: Option<String>,
    #[serde(default)]
    pub schedule_items: Vec<ScheduleItem>,
    pub error: Option<FreeBusyError>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleItem {
    pub status: String,
    pub start: DateTimeTimeZone,
    pub end: DateTimeTimeZone,
    pub subject: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreeBusyError {
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingTimeSuggestionsResult {
    #[serde(default)]
    pub meeting_time_suggestions: Vec<MeetingTimeSuggestion>,
    pub empty_suggestions_reason: Option<String>,
}

impl MeetingTimeSuggestionsResult {
    /// Slot of the first suggestion, if any.
    pub fn first_slot(&self) -> Option<&TimeSlot> {
        self.meeting_time_suggestions
            .iter()
            .find_map(|s| s.meeting_time_slot.as_ref())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingTimeSuggestion {
    pub confidence: Option<f64>,
    pub organizer_availability: Option<String>,
    pub suggestion_reason: Option<String>,
    pub meeting_time_slot: Option<TimeSlot>,
    #[serde(default)]
    pub attendee_availability: Vec<AttendeeAvailability>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendeeAvailability {
    pub attendee: Option<AttendeeBase>,
    pub availability: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendeeBase {
    pub email_address: Option<EmailAddress>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub display_name: String,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AttendeeType {
    Required,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    pub email_address: EmailAddress,
    #[serde(rename = "type")]
    pub attendee_type: AttendeeType,
}

/// Event creation payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub subject: String,
    pub body: ItemBody,
    pub start: DateTimeTimeZone,
    pub end: DateTimeTimeZone,
    pub location: Location,
    pub attendees: Vec<Attendee>,
    pub allow_new_time_proposals: bool,
    pub is_online_meeting: bool,
    pub online_meeting_provider: String,
}

/// The parts of a created event the tutorial reports back.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedEvent {
    pub id: String,
    pub subject: Option<String>,
    pub web_link: Option<String>,
    pub online_meeting: Option<OnlineMeetingInfo>,
}

impl CreatedEvent {
    pub fn join_url(&self) -> Option<&str> {
        self.online_meeting
            .as_ref()
            .and_then(|m| m.join_url.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineMeetingInfo {
    pub join_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_profile_email_fallback() {
        let work = UserProfile {
            display_name: Some("Adele Vance".into()),
            mail: Some("adelev@contoso.com".into()),
            user_principal_name: Some("adelev@contoso.onmicrosoft.com".into()),
        };
        assert_eq!(work.email(), Some("adelev@contoso.com"));

        let personal = UserProfile {
            display_name: None,
            mail: Some(String::new()),
            user_principal_name: Some("user@outlook.com".into()),
        };
        assert_eq!(personal.email(), Some("user@outlook.com"));

        assert_eq!(UserProfile::default().email(), None);
    }

    #[test]
    fn test_page_has_more() {
        let page: Page<UserSummary> = serde_json::from_value(json!({
            "value": [{ "id": "1", "displayName": "Adele Vance", "mail": null }],
            "@odata.nextLink": "https://graph.microsoft.com/v1.0/users?$skiptoken=abc"
        }))
        .unwrap();
        assert!(page.has_more());
        assert_eq!(page.value[0].display_name.as_deref(), Some("Adele Vance"));

        let last: Page<UserSummary> = serde_json::from_value(json!({ "value": [] })).unwrap();
        assert!(!last.has_more());
    }

    #[test]
    fn test_page_without_value_is_empty() {
        // Element types here have no Default impl.
        let members: Page<DirectoryObject> = serde_json::from_value(json!({})).unwrap();
        assert!(members.value.is_empty());

        let schedules: Page<ScheduleInformation> =
            serde_json::from_value(json!({ "@odata.context": "ctx" })).unwrap();
        assert!(schedules.value.is_empty());
        assert!(!schedules.has_more());
    }

    #[test]
    fn test_message_summary_parsing() {
        let message: MessageSummary = serde_json::from_value(json!({
            "subject": "Quarterly report",
            "from": { "emailAddress": { "name": "Megan Bowen", "address": "meganb@contoso.com" } },
            "isRead": false,
            "receivedDateTime": "2022-07-12T08:30:00Z"
        }))
        .unwrap();
        assert_eq!(message.sender_name(), Some("Megan Bowen"));
        assert_eq!(message.is_read, Some(false));
        assert!(message.received_date_time.is_some());
    }

    #[test]
    fn test_event_serialization() {
        let event = NewEvent {
            subject: "Let's go for lunch".into(),
            body: ItemBody {
                content_type: BodyType::Html,
                content: "Does noon work for you?".into(),
            },
            start: DateTimeTimeZone::new("2022-07-12T12:00:00", "Asia/Tokyo"),
            end: DateTimeTimeZone::new("2022-07-12T14:00:00", "Asia/Tokyo"),
            location: Location {
                display_name: "Harry's Bar".into(),
            },
            attendees: vec![Attendee {
                email_address: EmailAddress {
                    name: Some("Samantha Booth".into()),
                    address: Some("samanthab@contoso.onmicrosoft.com".into()),
                },
                attendee_type: AttendeeType::Required,
            }],
            allow_new_time_proposals: true,
            is_online_meeting: true,
            online_meeting_provider: "teamsForBusiness".into(),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["body"]["contentType"], "html");
        assert_eq!(value["start"]["timeZone"], "Asia/Tokyo");
        assert_eq!(value["attendees"][0]["type"], "required");
        assert_eq!(value["isOnlineMeeting"], true);
        assert_eq!(value["onlineMeetingProvider"], "teamsForBusiness");
    }

    #[test]
    fn test_first_slot() {
        let result: MeetingTimeSuggestionsResult = serde_json::from_value(json!({
            "emptySuggestionsReason": "",
            "meetingTimeSuggestions": [{
                "confidence": 100.0,
                "organizerAvailability": "free",
                "meetingTimeSlot": {
                    "start": { "dateTime": "2022-07-13T09:00:00.0000000", "timeZone": "W. Europe Standard Time" },
                    "end": { "dateTime": "2022-07-13T09:30:00.0000000", "timeZone": "W. Europe Standard Time" }
                }
            }]
        }))
        .unwrap();
        let slot = result.first_slot().unwrap();
        assert_eq!(slot.start.time_zone, "W. Europe Standard Time");
    }
}
