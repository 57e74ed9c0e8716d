use serde::{Deserialize, Serialize};

use crate::config::LayoutConfig;
use crate::subtitle::SubtitleBlock;

/// How badly a block breaks the subtitle layout rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LayoutSeverity {
    Ok,
    /// More lines than allowed
    Warning,
    /// At least one line is too long
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutReport {
    pub index: u32,
    pub line_lengths: Vec<usize>,
    pub too_many_lines: bool,
    pub line_too_long: bool,
}

impl LayoutReport {
    /// A long line outranks a block with too many lines.
    pub fn severity(&self) -> LayoutSeverity {
        if self.line_too_long {
            LayoutSeverity::Error
        } else if self.too_many_lines {
            LayoutSeverity::Warning
        } else {
            LayoutSeverity::Ok
        }
    }

    pub fn describe(&self) -> String {
        let lengths = self
            .line_lengths
            .iter()
            .enumerate()
            .map(|(i, len)| format!("L{}: {}", i + 1, len))
            .collect::<Vec<_>>()
            .join(" ");

        match self.severity() {
            LayoutSeverity::Error => format!("#{} line too long ({})", self.index, lengths),
            LayoutSeverity::Warning => format!(
                "#{} has {} lines ({})",
                self.index,
                self.line_lengths.len(),
                lengths
            ),
            LayoutSeverity::Ok => format!("#{} ok ({})", self.index, lengths),
        }
    }
}

/// Check a block's translated text against the layout limits.
pub fn check_block(block: &SubtitleBlock, layout: &LayoutConfig) -> LayoutReport {
    let line_lengths: Vec<usize> = block
        .translated_text
        .split('\n')
        .map(|line| line.chars().count())
        .collect();

    LayoutReport {
        index: block.index,
        too_many_lines: line_lengths.len() > layout.max_lines,
        line_too_long: line_lengths.iter().any(|&len| len > layout.max_chars_per_line),
        line_lengths,
    }
}

/// Reports for translated blocks that break a layout rule, in document order.
pub fn layout_issues(blocks: &[SubtitleBlock], layout: &LayoutConfig) -> Vec<LayoutReport> {
    blocks
        .iter()
        .filter(|b| b.is_translated())
        .map(|b| check_block(b, layout))
        .filter(|r| r.severity() != LayoutSeverity::Ok)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translated(index: u32, text: &str) -> SubtitleBlock {
        let mut block = SubtitleBlock::new(index, "00:00:01,000 --> 00:00:02,000", "source");
        block.translated_text = text.to_string();
        block
    }

    #[test]
    fn test_within_limits() {
        let report = check_block(&translated(1, "Olá, tudo bem?\nTudo ótimo."), &LayoutConfig::default());
        assert_eq!(report.line_lengths, vec![14, 11]);
        assert_eq!(report.severity(), LayoutSeverity::Ok);
    }

    #[test]
    fn test_too_many_lines_is_a_warning() {
        let report = check_block(&translated(2, "um\ndois\ntrês"), &LayoutConfig::default());
        assert!(report.too_many_lines);
        assert_eq!(report.severity(), LayoutSeverity::Warning);
        assert_eq!(report.describe(), "#2 has 3 lines (L1: 2 L2: 4 L3: 4)");
    }

    #[test]
    fn test_long_line_takes_precedence() {
        let long = "x".repeat(43);
        let report = check_block(&translated(3, &format!("a\nb\n{}", long)), &LayoutConfig::default());
        assert!(report.too_many_lines);
        assert_eq!(report.severity(), LayoutSeverity::Error);
    }

    #[test]
    fn test_characters_not_bytes_are_counted() {
        let report = check_block(&translated(4, &"ç".repeat(42)), &LayoutConfig::default());
        assert_eq!(report.severity(), LayoutSeverity::Ok);
    }

    #[test]
    fn test_layout_issues_skips_untranslated_blocks() {
        let blocks = vec![
            SubtitleBlock::new(1, "t", "pending"),
            translated(2, "fine"),
            translated(3, "one\ntwo\nthree"),
        ];
        let issues = layout_issues(&blocks, &LayoutConfig::default());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].index, 3);
    }
}
