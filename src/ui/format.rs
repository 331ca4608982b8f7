/// `m:ss` label for the scrub bar. Seconds are truncated, so a label never
/// reads `1:60`.
pub fn format_time(millis: u64) -> String {
    let total_seconds = millis / 1000;
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}
