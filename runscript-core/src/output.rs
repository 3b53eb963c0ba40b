//! OUTPUT CONTENT extraction
//!
//! Run-script jobs print their result between two fixed marker lines. This
//! module pulls that section out of a raw job trace.

pub const OUTPUT_START_MARKER: &str =
    "---------------------OUTPUT CONTENT----------------------------";
pub const OUTPUT_END_MARKER: &str =
    "---------------------END OF OUTPUT-----------------------------";

/// Returned when a trace has no complete OUTPUT CONTENT section
pub const NO_OUTPUT_PLACEHOLDER: &str = "No OUTPUT CONTENT section found";

/// Finds the text between the first start marker that ends its line and the
/// next end marker that starts a line, with surrounding whitespace trimmed
///
/// A start marker echoed inside a shell command (e.g. `puts "----OUTPUT..."`)
/// is not followed by a line break and is skipped.
pub fn find_output_section(log: &str) -> Option<&str> {
    for (start, _) in log.match_indices(OUTPUT_START_MARKER) {
        let after_marker = start + OUTPUT_START_MARKER.len();
        let rest = &log[after_marker..];
        let line_break = if rest.starts_with("\r\n") {
            1
        } else if rest.starts_with('\n') {
            0
        } else {
            continue;
        };

        // Search from the line break so an empty section is still found
        let body = &rest[line_break..];
        let end_pattern = format!("\n{}", OUTPUT_END_MARKER);
        return body.find(&end_pattern).map(|end| body[..end].trim());
    }

    None
}

/// Extracts the OUTPUT CONTENT section, or the fixed placeholder when either
/// marker is missing
pub fn extract_output_content(log: &str) -> &str {
    find_output_section(log).unwrap_or(NO_OUTPUT_PLACEHOLDER)
}
