//! openEHR coded strings: `text`, `terminology::code` or `terminology::code::display`.

use ferry_types::CodedText;

/// Separator between the parts of a coded string.
pub const CODED_SEPARATOR: &str = "::";

/// Parses an openEHR coded string.
///
/// Returns `None` when the input has more than three parts.
pub fn parse_coded_string(input: &str) -> Option<CodedText> {
    let parts: Vec<&str> = input.split(CODED_SEPARATOR).collect();
    match parts.as_slice() {
        [text] => Some(CodedText::text(*text)),
        [system, code] => Some(CodedText::new(
            Some((*system).to_string()),
            Some((*code).to_string()),
            None,
        )),
        [system, code, display] => Some(CodedText::new(
            Some((*system).to_string()),
            Some((*code).to_string()),
            Some((*display).to_string()),
        )),
        _ => None,
    }
}
