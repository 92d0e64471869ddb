//! Derived thread view
//!
//! Pure functions of the mirror, the viewer and a clock. Calendar days are
//! taken in the viewer's time zone.

use crate::{
    model::{Message, MessagePayload},
    sync::Selection,
};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};

/// Delivery state shown on the viewer's own messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadTick {
    /// Written, not yet seen
    Sent,
    /// Seen by the recipient
    Read,
}

/// One rendered message
#[derive(Debug, Clone, PartialEq)]
pub struct MessageView {
    /// The message itself
    pub message: Message,
    /// Whether the viewer wrote it
    pub is_own: bool,
    /// Start of a new calendar day
    pub show_date_separator: bool,
    /// `Today`, `Yesterday` or `DD Mon YYYY`; empty while unresolved
    pub date_label: String,
    /// `HH:MM`; empty while unresolved
    pub time_label: String,
    /// Tick for own messages
    pub read_tick: Option<ReadTick>,
    /// Picked in delete mode
    pub selected: bool,
}

impl MessageView {
    /// Text or media reference to render
    pub fn payload(&self) -> MessagePayload<'_> {
        self.message.payload()
    }
}

/// Rendered thread
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThreadView {
    /// Messages in display order
    pub messages: Vec<MessageView>,
    /// Whether delete mode is on
    pub delete_mode: bool,
}

fn local_day<Tz: TimeZone>(at: DateTime<Utc>, tz: &Tz) -> NaiveDate {
    at.with_timezone(tz).date_naive()
}

/// For each message, whether a date separator precedes it
///
/// A message with a resolved timestamp starts a new day when it is the first
/// message, or the previous one is unresolved, or the local day differs.
pub fn separator_flags<Tz: TimeZone>(messages: &[Message], tz: &Tz) -> Vec<bool> {
    let mut previous: Option<NaiveDate> = None;
    messages
        .iter()
        .map(|message| {
            let day = message.created().map(|at| local_day(at, tz));
            let flag = match (day, previous) {
                (Some(d), Some(p)) => d != p,
                (Some(_), None) => true,
                (None, _) => false,
            };
            previous = day;
            flag
        })
        .collect()
}

/// `Today`, `Yesterday` or `DD Mon YYYY` relative to `now`
pub fn date_label<Tz: TimeZone>(at: DateTime<Utc>, now: DateTime<Utc>, tz: &Tz) -> String {
    let day = local_day(at, tz);
    let today = local_day(now, tz);

    if day == today {
        "Today".to_string()
    } else if today.pred_opt() == Some(day) {
        "Yesterday".to_string()
    } else {
        day.format("%d %b %Y").to_string()
    }
}

/// `HH:MM` in the viewer's time zone
pub fn time_label<Tz: TimeZone>(at: DateTime<Utc>, tz: &Tz) -> String {
    at.with_timezone(tz).naive_local().format("%H:%M").to_string()
}

/// Render the mirror for `me`
pub fn build_thread_view<Tz: TimeZone>(
    messages: &[Message],
    me: &str,
    selection: &Selection,
    now: DateTime<Utc>,
    tz: &Tz,
) -> ThreadView {
    let flags = separator_flags(messages, tz);

    let views = messages
        .iter()
        .zip(flags)
        .map(|(message, show_date_separator)| {
            let is_own = message.is_from(me);
            let (date, time) = match message.created() {
                Some(at) => (date_label(at, now, tz), time_label(at, tz)),
                None => (String::new(), String::new()),
            };
            MessageView {
                is_own,
                show_date_separator,
                date_label: date,
                time_label: time,
                read_tick: is_own.then_some(if message.read {
                    ReadTick::Read
                } else {
                    ReadTick::Sent
                }),
                selected: selection.is_selected(&message.id),
                message: message.clone(),
            }
        })
        .collect();

    ThreadView {
        messages: views,
        delete_mode: selection.is_enabled(),
    }
}
