//! Greedy CTC decoding of per-timestep class scores.
//!
//! Scores are laid out row major, one row of `classes` values per timestep.
//! The blank class is the one right after the last charset symbol.

// row wise argmax, first maximum wins
pub fn argmax_rows(scores: &[f32], classes: usize) -> Vec<usize> {
    if classes == 0 {
        return Vec::new();
    }
    scores.chunks(classes).map(|row: &[f32]| {
        let mut max = row[0];
        let mut index = 0;
        row.iter().enumerate().for_each(|(i, v)| {
            if *v > max {
                max = *v;
                index = i;
            }
        });
        index
    }).collect()
}

/// Collapse repeats, drop blanks and average the kept scores.
/// `None` when nothing but blanks was read.
pub fn greedy_decode(scores: &[f32], charset: &[String]) -> Option<(String, f32)> {
    let classes = charset.len() + 1;
    let argmax = argmax_rows(scores, classes);

    let mut text = String::new();
    let mut total = 0.0;
    let mut kept = 0;
    let mut prev = None;
    for (t, class) in argmax.iter().enumerate() {
        if prev != Some(*class) && *class < charset.len() {
            text.push_str(&charset[*class]);
            total += scores[t*classes + class];
            kept += 1;
        }
        prev = Some(*class);
    }
    if kept == 0 {
        return None;
    }
    Some((text, total/kept as f32))
}

/// One symbol per non-empty line.
pub fn parse_charset(content: &str) -> Vec<String> {
    content.lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty())
        .map(|line| line.to_string())
        .collect()
}


#[cfg(test)]
mod test {

    use super::*;

    fn charset() -> Vec<String> {
        parse_charset("1\n2\n가\n")
    }

    #[test]
    fn argmax_takes_first_maximum() {
        let scores = [0.1, 0.5, 0.5, 0.9, 0.0, 0.1];
        assert_eq!(argmax_rows(&scores, 3), vec![1, 0]);
    }

    #[test]
    fn repeats_and_blanks_collapse() {
        // classes: "1", "2", "가", blank
        let scores = [
            0.9, 0.0, 0.0, 0.1,
            0.8, 0.0, 0.0, 0.2,
            0.0, 0.0, 0.0, 1.0,
            0.7, 0.0, 0.0, 0.3,
            0.0, 0.0, 0.6, 0.4,
        ];
        let (text, confidence) = greedy_decode(&scores, &charset()).unwrap();
        assert_eq!(text, "11가");
        assert!((confidence - (0.9 + 0.7 + 0.6)/3.0).abs() < 1e-6);
    }

    #[test]
    fn only_blanks_is_none() {
        let scores = [0.0, 0.0, 0.0, 1.0, 0.1, 0.0, 0.0, 0.9];
        assert!(greedy_decode(&scores, &charset()).is_none());
    }

    #[test]
    fn charset_skips_empty_lines() {
        assert_eq!(parse_charset("서\r\n\n울\n"), vec!["서".to_string(), "울".to_string()]);
    }
}
