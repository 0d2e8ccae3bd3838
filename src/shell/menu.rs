//! Menu choices and their parsing.

/// One numbered menu entry, or input that matched none of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Exit,
    DisplayAccessToken,
    ListInbox,
    SendMail,
    ListUsers,
    MakeGraphCall,
    ListGroupMembers,
    GetSchedule,
    FindMeetingTimes,
    CreateEvent,
    FindAndCreateEvent,
    Invalid,
}

/// Menu lines in display order. The index is the number the operator types.
pub const MENU_ITEMS: [&str; 11] = [
    "Exit",
    "Display access token",
    "List my inbox",
    "Send mail",
    "List users",
    "Make a customized Graph call",
    "List members in a group",
    "Get schedule",
    "Find meeting slot",
    "Create an event with a Teams link",
    "Find available meeting slot, and create an event with a Teams link",
];

impl MenuChoice {
    /// Parse one line of operator input. Never fails.
    pub fn parse(input: &str) -> Self {
        match input.trim().parse::<u8>() {
            Ok(0) => Self::Exit,
            Ok(1) => Self::DisplayAccessToken,
            Ok(2) => Self::ListInbox,
            Ok(3) => Self::SendMail,
            Ok(4) => Self::ListUsers,
            Ok(5) => Self::MakeGraphCall,
            Ok(6) => Self::ListGroupMembers,
            Ok(7) => Self::GetSchedule,
            Ok(8) => Self::FindMeetingTimes,
            Ok(9) => Self::CreateEvent,
            Ok(10) => Self::FindAndCreateEvent,
            _ => Self::Invalid,
        }
    }

    /// Whether the branch needs the app-only client.
    pub fn needs_app_auth(self) -> bool {
        matches!(
            self,
            Self::ListUsers
                | Self::ListGroupMembers
                | Self::GetSchedule
                | Self::CreateEvent
                | Self::FindAndCreateEvent
        )
    }

    /// What the branch is doing, for `Error <context>: <message>` lines.
    pub fn error_context(self) -> &'static str {
        match self {
            Self::DisplayAccessToken => "getting user access token",
            Self::ListInbox => "getting user's inbox",
            Self::SendMail => "sending mail",
            Self::ListUsers => "getting users",
            Self::MakeGraphCall => "making Graph call",
            Self::ListGroupMembers => "listing group members",
            Self::GetSchedule => "getting schedule",
            Self::FindMeetingTimes => "finding meeting times",
            Self::CreateEvent => "creating event",
            Self::FindAndCreateEvent => "finding a meeting slot and creating event",
            Self::Exit | Self::Invalid => "",
        }
    }
}
