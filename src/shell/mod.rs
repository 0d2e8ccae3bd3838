//! Interactive menu loop.
//!
//! Reads one selection per line, dispatches it to the [`GraphService`] and prints
//! the result. Operation failures are reported and the loop continues; only `0` or
//! end of input ends it.

pub mod menu;
pub mod render;

use std::io::{self, Write};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tracing::{debug, error, warn};

pub use menu::MenuChoice;

use crate::auth::device_code::{DeviceCodeInfo, DeviceCodePrompt};
use crate::error::AppError;
use crate::graph::models::{DateTimeTimeZone, TimeSlot};
use crate::graph::GraphService;

/// Group listed by options 6 and 10.
pub const GROUP_ID: &str = "4b5c4fad-ba66-4628-9d0b-46ada2a47345";

/// Mailbox whose calendar options 7, 9 and 10 work on.
pub const CALENDAR_USER: &str = "ruka.sakurai@tl6j3.onmicrosoft.com";

const MAIL_SUBJECT: &str = "Testing Microsoft Graph";
const MAIL_BODY: &str = "Hello world!";

/// Slot used by option 9.
fn fixed_event_slot() -> TimeSlot {
    TimeSlot {
        start: DateTimeTimeZone::new("2022-07-12T12:00:00", "Asia/Tokyo"),
        end: DateTimeTimeZone::new("2022-07-12T14:00:00", "Asia/Tokyo"),
    }
}

/// Prints device-code instructions to the console.
pub struct ConsolePrompt;

#[async_trait]
impl DeviceCodePrompt for ConsolePrompt {
    async fn prompt(&self, info: &DeviceCodeInfo) {
        println!("{}", info.instructions());
    }
}

/// Greet the signed-in user. Failures are printed, not returned.
pub async fn greet_user<W: Write>(service: &GraphService, out: &mut W) -> io::Result<()> {
    match service.get_profile().await {
        Ok(profile) => render::greeting(out, &profile),
        Err(e) => writeln!(out, "Error getting user: {}", e),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShellState {
    AwaitingSelection,
    Dispatching(MenuChoice),
    Finished,
}

pub struct Shell {
    service: Arc<GraphService>,
}

impl Shell {
    pub fn new(service: Arc<GraphService>) -> Self {
        Self { service }
    }

    /// Run the menu until `0` or end of input.
    pub async fn run<R, W>(&self, input: R, out: &mut W) -> io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let mut lines = input.lines();
        let mut state = ShellState::AwaitingSelection;

        loop {
            state = match state {
                ShellState::AwaitingSelection => {
                    render::menu(out)?;
                    match lines.next_line().await? {
                        Some(line) => ShellState::Dispatching(MenuChoice::parse(&line)),
                        None => {
                            debug!("End of input");
                            ShellState::Dispatching(MenuChoice::Exit)
                        }
                    }
                }
                ShellState::Dispatching(MenuChoice::Exit) => {
                    writeln!(out, "Goodbye...")?;
                    ShellState::Finished
                }
                ShellState::Dispatching(MenuChoice::Invalid) => {
                    writeln!(out, "Invalid choice! Please try again.")?;
                    ShellState::AwaitingSelection
                }
                ShellState::Dispatching(choice) => {
                    if let Err(e) = self.dispatch(choice, &mut lines, out).await {
                        if e.is_remote() {
                            warn!("{:?} failed: {}", choice, e);
                        } else {
                            error!("{:?} failed: {}", choice, e);
                        }
                        writeln!(out, "Error {}: {}", choice.error_context(), e)?;
                        writeln!(out, "  {}", e.user_message())?;
                    }
                    ShellState::AwaitingSelection
                }
                ShellState::Finished => return Ok(()),
            };
        }
    }

    async fn dispatch<R, W>(
        &self,
        choice: MenuChoice,
        lines: &mut Lines<R>,
        out: &mut W,
    ) -> Result<(), AppError>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let service = &self.service;
        if choice.needs_app_auth() {
            service.ensure_app_only_auth()?;
        }

        match choice {
            MenuChoice::DisplayAccessToken => {
                let token = service.get_user_token().await?;
                writeln!(out, "User token: {}", token)?;
            }
            MenuChoice::ListInbox => {
                let page = service.list_inbox().await?;
                render::inbox(out, &page)?;
            }
            MenuChoice::SendMail => {
                let profile = service.get_profile().await?;
                match profile.email() {
                    Some(email) => {
                        service.send_mail(MAIL_SUBJECT, MAIL_BODY, email).await?;
                        writeln!(out, "Mail sent.")?;
                    }
                    None => writeln!(out, "Couldn't get your email address, canceling...")?,
                }
            }
            MenuChoice::ListUsers => {
                let page = service.list_users().await?;
                render::users(out, &page)?;
            }
            MenuChoice::MakeGraphCall => {
                write!(out, "Enter a Graph path (for example /me): ")?;
                out.flush()?;
                let path = lines.next_line().await?.unwrap_or_default();
                let value = service.make_graph_call(&path).await?;
                render::json(out, &value)?;
            }
            MenuChoice::ListGroupMembers => {
                let page = service.list_group_members(GROUP_ID).await?;
                render::members(out, &page)?;
            }
            MenuChoice::GetSchedule => {
                let schedules = service.get_schedule(CALENDAR_USER).await?;
                render::schedules(out, &schedules)?;
            }
            MenuChoice::FindMeetingTimes => {
                let result = service.find_meeting_times().await?;
                render::suggestions(out, &result)?;
            }
            MenuChoice::CreateEvent => {
                let event = service
                    .create_event(CALENDAR_USER, &fixed_event_slot())
                    .await?;
                render::created_event(out, &event)?;
            }
            MenuChoice::FindAndCreateEvent => {
                let members = service.list_group_members(GROUP_ID).await?;
                match members.value.first() {
                    Some(member) => writeln!(out, "Id:{}", member.id)?,
                    None => writeln!(out, "The group has no members.")?,
                }
                // TODO: resolve the member id to a mailbox and search that user's free time.
                let result = service.find_meeting_times().await?;
                match result.first_slot() {
                    Some(slot) => {
                        let event = service.create_event(CALENDAR_USER, slot).await?;
                        render::created_event(out, &event)?;
                    }
                    None => {
                        render::suggestions(out, &result)?;
                        writeln!(out, "No meeting slot available, no event created.")?;
                    }
                }
            }
            MenuChoice::Exit | MenuChoice::Invalid => {}
        }
        Ok(())
    }
}
