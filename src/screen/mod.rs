mod activity;
mod cleaner;

pub use activity::{parse_activity, parse_activity_with, Activity, ActivityProfile};
pub use cleaner::{context_warning, extract_reply, reply_preview, strip_chrome};
