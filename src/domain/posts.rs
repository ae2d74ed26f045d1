use time::{OffsetDateTime, UtcOffset, macros::format_description};

const LABEL_CHARS: usize = 15;

/// First characters of a post body, counted in chars rather than bytes.
pub fn short_label(text: &str) -> String {
    text.chars().take(LABEL_CHARS).collect()
}

pub fn format_human_date(value: OffsetDateTime) -> String {
    value
        .format(format_description!(
            "[day padding:none] [month repr:long] [year]"
        ))
        .unwrap_or_else(|_| value.date().to_string())
}

pub fn format_iso_datetime(value: OffsetDateTime) -> String {
    value
        .to_offset(UtcOffset::UTC)
        .format(format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second]Z"
        ))
        .unwrap_or_default()
}
