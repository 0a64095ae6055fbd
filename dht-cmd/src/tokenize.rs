/// Maximum number of argv tokens collected from one request
/// (spec.md §4.E: "up to 31, with a terminator-null at the end").
pub const MAX_ARGV: usize = 31;

/// Replace every byte with ASCII value <= 0x20 by a terminator, then walk
/// the buffer collecting non-empty tokens, up to [`MAX_ARGV`]. No quoting
/// or escaping.
pub fn tokenize(input: &[u8]) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < input.len() && tokens.len() < MAX_ARGV {
        while i < input.len() && input[i] <= 0x20 {
            i += 1;
        }
        if i >= input.len() {
            break;
        }

        let start = i;
        while i < input.len() && input[i] > 0x20 {
            i += 1;
        }

        tokens.push(String::from_utf8_lossy(&input[start..i]).into_owned());
    }

    tokens
}
