//! Plain-text rendering of menu and operation results.

use std::io::{self, Write};

use chrono::Local;
use serde_json::Value;

use super::menu::MENU_ITEMS;
use crate::graph::models::{
    CreatedEvent, DirectoryObject, MeetingTimeSuggestionsResult, MessageSummary, Page,
    ScheduleInformation, UserProfile, UserSummary,
};

pub fn menu<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, "Please choose one of the following options:")?;
    for (number, label) in MENU_ITEMS.iter().enumerate() {
        writeln!(out, "{}. {}", number, label)?;
    }
    out.flush()
}

pub fn greeting<W: Write>(out: &mut W, profile: &UserProfile) -> io::Result<()> {
    writeln!(
        out,
        "Hello, {}!",
        profile.display_name.as_deref().unwrap_or_default()
    )?;
    // Work/school accounts carry the address in mail, personal accounts in the UPN.
    writeln!(out, "Email: {}", profile.email().unwrap_or_default())
}

pub fn inbox<W: Write>(out: &mut W, page: &Page<MessageSummary>) -> io::Result<()> {
    for message in &page.value {
        writeln!(
            out,
            "Message: {}",
            message.subject.as_deref().unwrap_or("NO SUBJECT")
        )?;
        writeln!(out, "  From: {}", message.sender_name().unwrap_or_default())?;
        let status = if message.is_read.unwrap_or(false) {
            "Read"
        } else {
            "Unread"
        };
        writeln!(out, "  Status: {}", status)?;
        let received = message
            .received_date_time
            .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        writeln!(out, "  Received: {}", received)?;
    }
    writeln!(out, "\nMore messages available? {}", page.has_more())
}

pub fn users<W: Write>(out: &mut W, page: &Page<UserSummary>) -> io::Result<()> {
    for user in &page.value {
        writeln!(
            out,
            "User: {}",
            user.display_name.as_deref().unwrap_or("NO NAME")
        )?;
        writeln!(out, "  ID: {}", user.id)?;
        writeln!(out, "  Email: {}", user.mail.as_deref().unwrap_or("NO EMAIL"))?;
    }
    writeln!(out, "\nMore users available? {}", page.has_more())
}

pub fn members<W: Write>(out: &mut W, page: &Page<DirectoryObject>) -> io::Result<()> {
    for member in &page.value {
        match (&member.display_name, &member.mail) {
            (Some(name), Some(mail)) => writeln!(out, "{} <{}>", name, mail)?,
            (Some(name), None) => writeln!(out, "{}", name)?,
            (None, _) => writeln!(out, "{} (no display name)", member.id)?,
        }
    }
    if page.has_more() {
        writeln!(out, "\nMore members available.")?;
    }
    Ok(())
}

pub fn schedules<W: Write>(out: &mut W, schedules: &[ScheduleInformation]) -> io::Result<()> {
    for schedule in schedules {
        writeln!(out, "Schedule: {}", schedule.schedule_id)?;
        if let Some(error) = &schedule.error {
            writeln!(
                out,
                "  Error: {}",
                error.message.as_deref().unwrap_or("unknown")
            )?;
            continue;
        }
        writeln!(
            out,
            "  Availability: {}",
            schedule.availability_view.as_deref().unwrap_or_default()
        )?;
        for item in &schedule.schedule_items {
            writeln!(out, "  {} {} - {}", item.status, item.start, item.end)?;
            if let Some(subject) = &item.subject {
                writeln!(out, "    Subject: {}", subject)?;
            }
            if let Some(location) = item.location.as_deref().filter(|l| !l.is_empty()) {
                writeln!(out, "    Location: {}", location)?;
            }
        }
    }
    Ok(())
}

pub fn suggestions<W: Write>(out: &mut W, result: &MeetingTimeSuggestionsResult) -> io::Result<()> {
    if result.meeting_time_suggestions.is_empty() {
        let reason = result
            .empty_suggestions_reason
            .as_deref()
            .filter(|r| !r.is_empty())
            .unwrap_or("none given");
        return writeln!(out, "No meeting times suggested (reason: {})", reason);
    }

    for suggestion in &result.meeting_time_suggestions {
        match &suggestion.meeting_time_slot {
            Some(slot) => writeln!(out, "Slot: {} - {}", slot.start, slot.end)?,
            None => writeln!(out, "Slot: (none)")?,
        }
        if let Some(confidence) = suggestion.confidence {
            writeln!(out, "  Confidence: {}", confidence)?;
        }
        if let Some(availability) = &suggestion.organizer_availability {
            writeln!(out, "  Organizer: {}", availability)?;
        }
        if let Some(reason) = &suggestion.suggestion_reason {
            writeln!(out, "  Reason: {}", reason)?;
        }
        for attendee in &suggestion.attendee_availability {
            let address = attendee
                .attendee
                .as_ref()
                .and_then(|a| a.email_address.as_ref())
                .and_then(|e| e.address.as_deref())
                .unwrap_or("unknown");
            writeln!(
                out,
                "  {}: {}",
                address,
                attendee.availability.as_deref().unwrap_or("unknown")
            )?;
        }
    }
    Ok(())
}

pub fn created_event<W: Write>(out: &mut W, event: &CreatedEvent) -> io::Result<()> {
    writeln!(
        out,
        "Event created: {}",
        event.subject.as_deref().unwrap_or("NO SUBJECT")
    )?;
    writeln!(out, "  ID: {}", event.id)?;
    if let Some(link) = &event.web_link {
        writeln!(out, "  Link: {}", link)?;
    }
    if let Some(join_url) = event.join_url() {
        writeln!(out, "  Teams: {}", join_url)?;
    }
    Ok(())
}

pub fn json<W: Write>(out: &mut W, value: &Value) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)
}
