/// Greedy word wrap. `measure` returns the rendered pixel width of a string.
///
/// Words are separated by any whitespace (newlines included) and rejoined with a
/// single space. A word wider than `max_width` on its own still gets its own line.
pub fn wrap_text<F>(text: &str, max_width: f32, measure: F) -> String
where
    F: Fn(&str) -> f32,
{
    wrap_lines(text, max_width, measure).join("\n")
}

pub fn wrap_lines<F>(text: &str, max_width: f32, measure: F) -> Vec<String>
where
    F: Fn(&str) -> f32,
{
    let mut lines = Vec::new();
    let mut line = String::new();

    for word in text.split_whitespace() {
        if line.is_empty() {
            line.push_str(word);
            continue;
        }
        let candidate = format!("{line} {word}");
        if measure(&candidate) <= max_width {
            line = candidate;
        } else {
            lines.push(std::mem::take(&mut line));
            line.push_str(word);
        }
    }

    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> f32 {
        s.chars().count() as f32 * 10.0
    }

    #[test]
    fn empty_text_wraps_to_nothing() {
        assert_eq!(wrap_text("", 100.0, chars), "");
        assert_eq!(wrap_text("   \n ", 100.0, chars), "");
    }

    #[test]
    fn breaks_when_next_word_overflows() {
        let out = wrap_text("aa bb cc dd", 50.0, chars);
        assert_eq!(out, "aa bb\ncc dd");
    }

    #[test]
    fn every_line_fits_when_words_fit() {
        let text = "the quick brown fox jumps over the lazy dog and keeps on running far away";
        for max in [80.0, 120.0, 300.0] {
            for line in wrap_lines(text, max, chars) {
                assert!(chars(&line) <= max, "{line:?} wider than {max}");
            }
        }
    }

    #[test]
    fn oversized_word_sits_alone() {
        let out = wrap_lines("hi supercalifragilistic yo", 60.0, chars);
        assert_eq!(out, vec!["hi", "supercalifragilistic", "yo"]);
    }

    #[test]
    fn rewrapping_output_is_stable() {
        let text = "For God so loved the world that he gave his one and only Son";
        let once = wrap_text(text, 140.0, chars);
        let twice = wrap_text(&once, 140.0, chars);
        assert_eq!(once, twice);
    }

    #[test]
    fn collapses_runs_of_whitespace() {
        assert_eq!(wrap_text("a   b\t\tc", 1000.0, chars), "a b c");
    }
}
