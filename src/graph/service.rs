//! One method per tutorial operation, each bound to the user or the app client.

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use super::client::{query, GraphClient};
use super::models::{
    Attendee, AttendeeType, BodyType, CreatedEvent, DateTimeTimeZone, DirectoryObject,
    EmailAddress, ItemBody, Location, MeetingTimeSuggestionsResult, MessageSummary, NewEvent,
    OutgoingMessage, Page, Recipient, ScheduleInformation, ScheduleRequest, SendMailRequest,
    TimeSlot, UserProfile, UserSummary,
};
use crate::auth::broker::{CredentialBroker, Slot};
use crate::auth::device_code::DeviceCodePrompt;
use crate::config::Settings;
use crate::error::AppError;

pub const USER_NOT_INITIALIZED: &str = "Graph has not been initialized for user auth";
pub const APP_NOT_INITIALIZED: &str = "Graph has not been initialized for app-only auth";

/// Scope requested by the app client. App permissions are fixed at registration time.
pub const GRAPH_DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";

const PAGE_SIZE: &str = "25";
const PACIFIC: &str = "Pacific Standard Time";
const W_EUROPE: &str = "W. Europe Standard Time";

fn prefer_timezone(zone: &str) -> String {
    format!("outlook.timezone=\"{}\"", zone)
}

/// Holds the settings, the credential broker and both Graph clients.
pub struct GraphService {
    http_client: reqwest::Client,
    broker: CredentialBroker,
    settings: Slot<Settings>,
    user_client: Slot<GraphClient>,
    app_client: Slot<GraphClient>,
}

impl GraphService {
    pub fn new(http_client: reqwest::Client) -> Self {
        Self {
            broker: CredentialBroker::new(http_client.clone()),
            http_client,
            settings: Slot::new(),
            user_client: Slot::new(),
            app_client: Slot::new(),
        }
    }

    /// Store the settings and build the user credential and client.
    ///
    /// Settings are kept from the first call; later calls reuse what already exists.
    pub fn initialize_for_user_auth(
        &self,
        settings: Arc<Settings>,
        prompt: Arc<dyn DeviceCodePrompt>,
    ) -> Result<(), AppError> {
        let settings = self.settings.get_or_init(|| settings);
        let credential = self.broker.ensure_user_credential(Some(&*settings), prompt)?;

        self.user_client.get_or_init(|| {
            info!("Initializing Graph for user auth");
            Arc::new(GraphClient::new(
                self.http_client.clone(),
                &settings.graph_endpoint,
                credential,
                settings.graph_user_scopes.clone(),
            ))
        });
        Ok(())
    }

    /// Build the app credential and client on first use.
    pub fn ensure_app_only_auth(&self) -> Result<(), AppError> {
        let settings = self.settings.get();
        let credential = self.broker.ensure_app_credential(settings.as_deref())?;

        if let Some(settings) = settings {
            self.app_client.get_or_init(|| {
                info!("Initializing Graph for app-only auth");
                Arc::new(GraphClient::new(
                    self.http_client.clone(),
                    &settings.graph_endpoint,
                    credential,
                    vec![GRAPH_DEFAULT_SCOPE.to_string()],
                ))
            });
        }
        Ok(())
    }

    fn user_client(&self) -> Result<Arc<GraphClient>, AppError> {
        self.user_client
            .get()
            .ok_or(AppError::NotInitialized(USER_NOT_INITIALIZED))
    }

    fn app_client(&self) -> Result<Arc<GraphClient>, AppError> {
        self.app_client
            .get()
            .ok_or(AppError::NotInitialized(APP_NOT_INITIALIZED))
    }

    pub async fn get_profile(&self) -> Result<UserProfile, AppError> {
        let client = self.user_client()?;
        let path = format!(
            "/me{}",
            query(&[("$select", "displayName,mail,userPrincipalName")])
        );
        Ok(client.get(&path, None).await?)
    }

    /// Access token for the configured user scopes.
    pub async fn get_user_token(&self) -> Result<String, AppError> {
        let client = self.user_client()?;
        let token = client.credential().get_token(client.scopes()).await?;
        Ok(token.secret().to_string())
    }

    /// The 25 newest inbox messages.
    pub async fn list_inbox(&self) -> Result<Page<MessageSummary>, AppError> {
        let client = self.user_client()?;
        let path = format!(
            "/me/mailFolders/inbox/messages{}",
            query(&[
                ("$select", "from,isRead,receivedDateTime,subject"),
                ("$top", PAGE_SIZE),
                ("$orderby", "receivedDateTime DESC"),
            ])
        );
        Ok(client.get(&path, None).await?)
    }

    pub async fn send_mail(
        &self,
        subject: &str,
        body: &str,
        recipient: &str,
    ) -> Result<(), AppError> {
        let client = self.user_client()?;
        let request = SendMailRequest {
            message: OutgoingMessage {
                subject: subject.to_string(),
                body: ItemBody {
                    content_type: BodyType::Text,
                    content: body.to_string(),
                },
                to_recipients: vec![Recipient::to_address(recipient)],
            },
        };
        client.post_no_content("/me/sendMail", &request).await?;
        Ok(())
    }

    /// The first 25 directory users by display name.
    pub async fn list_users(&self) -> Result<Page<UserSummary>, AppError> {
        let client = self.app_client()?;
        let path = format!(
            "/users{}",
            query(&[
                ("$select", "displayName,id,mail"),
                ("$top", PAGE_SIZE),
                ("$orderby", "displayName"),
            ])
        );
        Ok(client.get(&path, None).await?)
    }

    /// GET an arbitrary Graph path as the signed-in user.
    pub async fn make_graph_call(&self, path: &str) -> Result<Value, AppError> {
        let client = self.user_client()?;
        Ok(client.get(path, None).await?)
    }

    pub async fn list_group_members(
        &self,
        group_id: &str,
    ) -> Result<Page<DirectoryObject>, AppError> {
        let client = self.app_client()?;
        let path = format!("/groups/{}/members", urlencoding::encode(group_id));
        Ok(client.get(&path, None).await?)
    }

    /// Free/busy for `email` on 2019-03-15, 09:00-18:00 Pacific, in 60 minute slots.
    pub async fn get_schedule(&self, email: &str) -> Result<Vec<ScheduleInformation>, AppError> {
        let client = self.app_client()?;
        let request = ScheduleRequest {
            schedules: vec![email.to_string()],
            start_time: DateTimeTimeZone::new("2019-03-15T09:00:00", PACIFIC),
            end_time: DateTimeTimeZone::new("2019-03-15T18:00:00", PACIFIC),
            availability_view_interval: 60,
        };
        let path = format!(
            "/users/{}/calendar/getSchedule",
            urlencoding::encode(email)
        );
        let page: Page<ScheduleInformation> = client
            .post(&path, &request, Some(&prefer_timezone(PACIFIC)))
            .await?;
        Ok(page.value)
    }

    /// Meeting suggestions for the signed-in user with default constraints.
    pub async fn find_meeting_times(&self) -> Result<MeetingTimeSuggestionsResult, AppError> {
        let client = self.user_client()?;
        Ok(client
            .post(
                "/me/findMeetingTimes",
                &serde_json::json!({}),
                Some(&prefer_timezone(W_EUROPE)),
            )
            .await?)
    }

    /// Create the lunch meeting with a Teams link in `email`'s calendar.
    pub async fn create_event(&self, email: &str, slot: &TimeSlot) -> Result<CreatedEvent, AppError> {
        let client = self.app_client()?;
        let event = lunch_event(slot);
        let path = format!("/users/{}/events", urlencoding::encode(email));
        let created: CreatedEvent = client
            .post(&path, &event, Some(&prefer_timezone(PACIFIC)))
            .await?;
        info!("Created event {}", created.id);
        Ok(created)
    }
}

fn lunch_event(slot: &TimeSlot) -> NewEvent {
    NewEvent {
        subject: "Let's go for lunch".to_string(),
        body: ItemBody {
            content_type: BodyType::Html,
            content: "Does noon work for you?".to_string(),
        },
        start: slot.start.clone(),
        end: slot.end.clone(),
        location: Location {
            display_name: "Harry's Bar".to_string(),
        },
        attendees: vec![Attendee {
            email_address: EmailAddress {
                name: Some("Samantha Booth".to_string()),
                address: Some("samanthab@contoso.onmicrosoft.com".to_string()),
            },
            attendee_type: AttendeeType::Required,
        }],
        allow_new_time_proposals: true,
        is_online_meeting: true,
        online_meeting_provider: "teamsForBusiness".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::device_code::DeviceCodeInfo;
    use crate::secrets::SecureString;
    use async_trait::async_trait;
    use serde_json::json;
    use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct SilentPrompt;

    #[async_trait]
    impl DeviceCodePrompt for SilentPrompt {
        async fn prompt(&self, _info: &DeviceCodeInfo) {}
    }

    fn settings(server: &MockServer) -> Arc<Settings> {
        Arc::new(Settings {
            client_id: "client-1".into(),
            client_secret: Some(SecureString::new("s3cr3t".into())),
            tenant_id: "tenant-1".into(),
            graph_user_scopes: vec!["User.Read".into()],
            authority_host: server.uri(),
            graph_endpoint: format!("{}/v1.0", server.uri()),
            ..Settings::default()
        })
    }

    async fn mount_app_token(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/tenant-1/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "app-token",
                "token_type": "Bearer",
                "expires_in": 3599
            })))
            .mount(server)
            .await;
    }

    async fn mount_user_token(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/common/oauth2/v2.0/devicecode"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "user_code": "ABCD-1234",
                "device_code": "device-xyz",
                "verification_uri": "https://microsoft.com/devicelogin",
                "expires_in": 900,
                "interval": 0
            })))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/common/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "user-token",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .mount(server)
            .await;
    }

    fn service(server: &MockServer) -> GraphService {
        let service = GraphService::new(reqwest::Client::new());
        service
            .initialize_for_user_auth(settings(server), Arc::new(SilentPrompt))
            .unwrap();
        service
    }

    #[tokio::test]
    async fn test_app_operations_fail_before_app_init() {
        let server = MockServer::start().await;
        let service = service(&server);

        match service.list_users().await {
            Err(AppError::NotInitialized(message)) => assert_eq!(message, APP_NOT_INITIALIZED),
            other => panic!("unexpected result: {:?}", other.map(|p| p.value.len())),
        }
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_user_operations_fail_before_user_init() {
        let service = GraphService::new(reqwest::Client::new());
        assert!(matches!(
            service.get_profile().await,
            Err(AppError::NotInitialized(USER_NOT_INITIALIZED))
        ));
        assert!(matches!(
            service.ensure_app_only_auth(),
            Err(AppError::NotInitialized(_))
        ));
    }

    #[tokio::test]
    async fn test_list_users_requests_one_page() {
        let server = MockServer::start().await;
        mount_app_token(&server).await;

        Mock::given(method("GET"))
            .and(path("/v1.0/users"))
            .and(query_param("$top", "25"))
            .and(query_param("$select", "displayName,id,mail"))
            .and(query_param("$orderby", "displayName"))
            .and(header("authorization", "Bearer app-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [
                    { "id": "u1", "displayName": "Adele Vance", "mail": "adelev@contoso.com" },
                    { "id": "u2", "displayName": "Alex Wilber", "mail": null }
                ],
                "@odata.nextLink": format!("{}/v1.0/users?$skiptoken=next", server.uri())
            })))
            .expect(1)
            .mount(&server)
            .await;

        let service = service(&server);
        service.ensure_app_only_auth().unwrap();
        service.ensure_app_only_auth().unwrap();

        let page = service.list_users().await.unwrap();
        assert_eq!(page.value.len(), 2);
        assert!(page.has_more());
        assert_eq!(page.value[1].mail, None);
    }

    #[tokio::test]
    async fn test_list_inbox_requests_one_page() {
        let server = MockServer::start().await;
        mount_user_token(&server).await;

        Mock::given(method("GET"))
            .and(path("/v1.0/me/mailFolders/inbox/messages"))
            .and(query_param("$top", "25"))
            .and(query_param("$select", "from,isRead,receivedDateTime,subject"))
            .and(query_param("$orderby", "receivedDateTime DESC"))
            .and(header("authorization", "Bearer user-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{
                    "subject": "Quarterly review",
                    "isRead": false,
                    "receivedDateTime": "2022-07-11T08:30:00Z",
                    "from": { "emailAddress": { "name": "Megan Bowen", "address": "meganb@contoso.com" } }
                }],
                "@odata.nextLink": format!("{}/v1.0/me/mailFolders/inbox/messages?$skip=25", server.uri())
            })))
            .expect(1)
            .mount(&server)
            .await;

        let page = service(&server).list_inbox().await.unwrap();
        assert_eq!(page.value.len(), 1);
        assert!(page.has_more());
        assert_eq!(page.value[0].sender_name(), Some("Megan Bowen"));
    }

    #[tokio::test]
    async fn test_find_meeting_times_prefers_w_europe_time() {
        let server = MockServer::start().await;
        mount_user_token(&server).await;

        Mock::given(method("POST"))
            .and(path("/v1.0/me/findMeetingTimes"))
            .and(header("prefer", "outlook.timezone=\"W. Europe Standard Time\""))
            .and(body_json(json!({})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "emptySuggestionsReason": "AttendeesUnavailable",
                "meetingTimeSuggestions": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = service(&server).find_meeting_times().await.unwrap();
        assert!(result.first_slot().is_none());
        assert_eq!(
            result.empty_suggestions_reason.as_deref(),
            Some("AttendeesUnavailable")
        );
    }

    #[tokio::test]
    async fn test_get_schedule_request() {
        let server = MockServer::start().await;
        mount_app_token(&server).await;

        Mock::given(method("POST"))
            .and(path("/v1.0/users/ruka%40contoso.com/calendar/getSchedule"))
            .and(header("prefer", "outlook.timezone=\"Pacific Standard Time\""))
            .and(body_json(json!({
                "schedules": ["ruka@contoso.com"],
                "startTime": { "dateTime": "2019-03-15T09:00:00", "timeZone": "Pacific Standard Time" },
                "endTime": { "dateTime": "2019-03-15T18:00:00", "timeZone": "Pacific Standard Time" },
                "availabilityViewInterval": 60
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{
                    "scheduleId": "ruka@contoso.com",
                    "availabilityView": "000220000",
                    "scheduleItems": [{
                        "status": "busy",
                        "start": { "dateTime": "2019-03-15T12:00:00.0000000", "timeZone": "Pacific Standard Time" },
                        "end": { "dateTime": "2019-03-15T14:00:00.0000000", "timeZone": "Pacific Standard Time" }
                    }]
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let service = service(&server);
        service.ensure_app_only_auth().unwrap();

        let schedules = service.get_schedule("ruka@contoso.com").await.unwrap();
        assert_eq!(schedules.len(), 1);
        assert_eq!(schedules[0].availability_view.as_deref(), Some("000220000"));
        assert_eq!(schedules[0].schedule_items[0].status, "busy");
    }

    #[tokio::test]
    async fn test_create_event_uses_given_slot() {
        let server = MockServer::start().await;
        mount_app_token(&server).await;

        Mock::given(method("POST"))
            .and(path("/v1.0/users/ruka%40contoso.com/events"))
            .and(body_string_contains("\"timeZone\":\"Asia/Tokyo\""))
            .and(body_string_contains("teamsForBusiness"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "evt-1",
                "subject": "Let's go for lunch",
                "webLink": "https://outlook.office365.com/owa/?itemid=evt-1",
                "onlineMeeting": { "joinUrl": "https://teams.microsoft.com/l/meetup-join/abc" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let service = service(&server);
        service.ensure_app_only_auth().unwrap();

        let slot = TimeSlot {
            start: DateTimeTimeZone::new("2022-07-12T12:00:00", "Asia/Tokyo"),
            end: DateTimeTimeZone::new("2022-07-12T14:00:00", "Asia/Tokyo"),
        };
        let created = service.create_event("ruka@contoso.com", &slot).await.unwrap();
        assert_eq!(created.id, "evt-1");
        assert_eq!(
            created.join_url(),
            Some("https://teams.microsoft.com/l/meetup-join/abc")
        );
    }

    #[tokio::test]
    async fn test_settings_from_first_init_are_kept() {
        let server = MockServer::start().await;
        let service = service(&server);

        let other = Arc::new(Settings {
            client_id: "other".into(),
            ..Settings::default()
        });
        service
            .initialize_for_user_auth(other, Arc::new(SilentPrompt))
            .unwrap();
        assert_eq!(service.settings.get().unwrap().client_id, "client-1");
    }
}
