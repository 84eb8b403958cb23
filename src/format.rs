use chrono::{DateTime, Local, Utc};

pub fn relative_time(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(timestamp);
    let minutes = elapsed.num_minutes();
    if minutes < 1 {
        "Just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if elapsed.num_hours() < 24 {
        format!("{}h ago", elapsed.num_hours())
    } else if elapsed.num_days() < 7 {
        format!("{}d ago", elapsed.num_days())
    } else {
        timestamp.with_timezone(&Local).format("%b %d, %Y").to_string()
    }
}

pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    clock_label(timestamp.with_timezone(&Local), Local::now())
}

fn clock_label<Tz>(at: DateTime<Tz>, now: DateTime<Tz>) -> String
where
    Tz: chrono::TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let today = now.date_naive();
    let message_date = at.date_naive();
    if message_date == today {
        at.format("%I:%M %p").to_string()
    } else if (today - message_date).num_days() == 1 {
        format!("Yesterday, {}", at.format("%I:%M %p"))
    } else {
        at.format("%b %d, %I:%M %p").to_string()
    }
}
