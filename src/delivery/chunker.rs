/// Splits text into ordered chunks of at most `max_len` characters,
/// breaking preferentially on line boundaries. The chunks concatenate back
/// to the original text exactly; only a single source line longer than
/// `max_len` produces an oversized chunk (dealt with downstream by
/// [`super::SafeDelivery`]).
pub fn split_for_channel(text: &str, max_len: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;

    for segment in text.split_inclusive('\n') {
        let segment_chars = segment.chars().count();

        if current_chars + segment_chars > max_len && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_chars = 0;
        }

        if segment_chars > max_len {
            // an oversized single line travels alone
            chunks.push(segment.to_string());
        } else {
            current.push_str(segment);
            current_chars += segment_chars;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_for_channel("hello\nworld", 100), vec!["hello\nworld"]);
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(split_for_channel("", 10).is_empty());
    }

    #[test]
    fn splits_on_line_boundaries() {
        let text = "aaaa\nbbbb\ncccc\n";
        let chunks = split_for_channel(text, 10);
        assert_eq!(chunks, vec!["aaaa\nbbbb\n", "cccc\n"]);
    }

    #[test]
    fn oversized_line_travels_alone() {
        let long = "x".repeat(30);
        let text = format!("short\n{}\ntail", long);
        let chunks = split_for_channel(&text, 10);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], "short\n");
        assert_eq!(chunks[1], format!("{}\n", long));
        assert_eq!(chunks[2], "tail");
    }

    #[test]
    fn concatenation_restores_original() {
        let text = "line one\nline two\n\nline four\nfinal";
        let rejoined: String = split_for_channel(text, 12).concat();
        assert_eq!(rejoined, text);
    }

    proptest! {
        #[test]
        fn chunks_always_concatenate_back(text in ".{0,400}", max_len in 1usize..60) {
            let rejoined: String = split_for_channel(&text, max_len).concat();
            prop_assert_eq!(rejoined, text);
        }

        #[test]
        fn chunks_respect_limit_unless_one_line_forces_it(
            text in "[a-z \n]{0,300}",
            max_len in 1usize..40,
        ) {
            for chunk in split_for_channel(&text, max_len) {
                if chunk.chars().count() > max_len {
                    // only a single (newline-terminated) source segment may
                    // exceed the limit
                    let interior = chunk.strip_suffix('\n').unwrap_or(&chunk);
                    prop_assert!(
                        !interior.contains('\n'),
                        "oversized chunk must be a single source line: {:?}",
                        chunk
                    );
                }
            }
        }
    }
}
