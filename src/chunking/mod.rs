//! Structure-aware text splitting for regulation documents.
//!
//! Splits raw document text into retrievable passages while preserving
//! chapter/article headings, numbered clauses, and table regions. Length
//! arithmetic is in characters, not bytes, since the corpus is Chinese.

use regex::Regex;
use tracing::{debug, warn};

const TABLE_BEGIN: &str = "【表格开始】";
const TABLE_END: &str = "【表格结束】";

/// Sentence terminators used when subdividing oversized paragraphs.
const SENTENCE_ENDS: [char; 3] = ['。', '！', '？'];

/// Splitting parameters.
#[derive(Debug, Clone)]
pub struct SplitterConfig {
    /// Target maximum passage length in characters.
    pub chunk_size: usize,
    /// Overlap between adjacent windowed-fallback passages.
    pub chunk_overlap: usize,
    /// Passages shorter than this are dropped (unless sole content).
    pub min_chunk_length: usize,
}

impl SplitterConfig {
    /// Create a config, clamping the overlap to a quarter of the chunk size
    /// so overlapping windows can never dominate the output.
    pub fn new(chunk_size: usize, chunk_overlap: usize, min_chunk_length: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size / 4),
            min_chunk_length,
        }
    }
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self::new(1000, 200, 50)
    }
}

impl From<&crate::config::ChunkingSettings> for SplitterConfig {
    fn from(s: &crate::config::ChunkingSettings) -> Self {
        Self::new(s.chunk_size, s.chunk_overlap, s.min_chunk_length)
    }
}

/// One structural unit of a document body.
#[derive(Debug)]
enum Segment {
    /// Free text, possibly beginning with a heading line.
    Text(String),
    /// A table region, including its sentinels. Never split mid-row.
    Table(String),
}

impl Segment {
    fn text(&self) -> &str {
        match self {
            Segment::Text(s) | Segment::Table(s) => s,
        }
    }
}

/// Structure-aware document splitter.
pub struct TextSplitter {
    config: SplitterConfig,
    heading_re: Regex,
    markup_re: Regex,
    title_re: Regex,
}

impl TextSplitter {
    pub fn new(config: SplitterConfig) -> Self {
        // Chapter/section/article headings with Chinese numerals or digits.
        let heading_re = Regex::new(r"^第[一二三四五六七八九十百千零0-9０-９]+[章节条]").unwrap();
        let markup_re = Regex::new(r"^#{1,6}\s+\S").unwrap();
        let title_re = Regex::new(r"^(《[^》]+》|【[^】]+】)$").unwrap();
        Self {
            config,
            heading_re,
            markup_re,
            title_re,
        }
    }

    /// Split a document into passages.
    pub fn split(&self, text: &str) -> Vec<String> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }

        let total = char_len(text);
        if total <= self.config.chunk_size {
            if total >= self.config.min_chunk_length {
                return vec![text.to_string()];
            }
            return Vec::new();
        }

        let (title, body) = self.take_title(text);
        // Reserve room for the title prefix and its joining newline.
        let title_len = title.as_ref().map(|t| char_len(t) + 1).unwrap_or(0);
        let limit = self.config.chunk_size.saturating_sub(title_len).max(1);

        let candidates = match self.segment_body(body) {
            Some(segments) => {
                let structured = title.is_some()
                    || segments.len() > 1
                    || segments.iter().any(|s| {
                        matches!(s, Segment::Table(_)) || self.starts_with_heading(s.text())
                    });
                if structured {
                    self.assemble(&segments, limit)
                } else {
                    // No structural marker matched anywhere; windowed split.
                    self.window_split(body, limit)
                }
            }
            None => {
                warn!("Malformed table sentinels; falling back to windowed splitting");
                self.window_split(body, limit)
            }
        };

        let prefixed: Vec<String> = candidates
            .into_iter()
            .map(|c| match &title {
                Some(t) => format!("{}\n{}", t, c),
                None => c,
            })
            .collect();

        let kept: Vec<String> = prefixed
            .iter()
            .filter(|p| char_len(p) >= self.config.min_chunk_length)
            .cloned()
            .collect();

        // A document must not vanish entirely because all of it was short.
        if kept.is_empty() {
            return prefixed.into_iter().take(1).collect();
        }
        debug!("Split document into {} passages", kept.len());
        kept
    }

    /// Extract a leading title line wrapped in 《》 or 【】, if present.
    fn take_title<'a>(&self, text: &'a str) -> (Option<String>, &'a str) {
        let mut lines = text.splitn(2, '\n');
        let first = lines.next().unwrap_or("").trim();
        if first != TABLE_BEGIN && first != TABLE_END && self.title_re.is_match(first) {
            let rest = lines.next().unwrap_or("");
            (Some(first.to_string()), rest)
        } else {
            (None, text)
        }
    }

    fn starts_with_heading(&self, segment: &str) -> bool {
        let first = segment.lines().next().unwrap_or("").trim_start();
        self.heading_re.is_match(first) || self.markup_re.is_match(first)
    }

    /// Partition the body into heading-delimited text segments and atomic
    /// table regions. Returns None on unbalanced table sentinels.
    fn segment_body(&self, body: &str) -> Option<Vec<Segment>> {
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut table: Option<String> = None;

        for line in body.lines() {
            let trimmed = line.trim();

            if let Some(buf) = table.as_mut() {
                buf.push('\n');
                buf.push_str(line);
                if trimmed == TABLE_END {
                    segments.push(Segment::Table(table.take().unwrap()));
                }
                continue;
            }

            if trimmed == TABLE_BEGIN {
                if !current.trim().is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut current)));
                } else {
                    current.clear();
                }
                table = Some(line.to_string());
                continue;
            }
            if trimmed == TABLE_END {
                // End without a begin.
                return None;
            }

            // A heading starts a fresh segment and is merged with whatever
            // follows it; a heading alone is not a useful passage.
            if self.heading_re.is_match(trimmed) || self.markup_re.is_match(trimmed) {
                if !current.trim().is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut current)));
                } else {
                    current.clear();
                }
            }
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
        }

        if table.is_some() {
            return None;
        }
        if !current.trim().is_empty() {
            segments.push(Segment::Text(current));
        }
        Some(segments)
    }

    /// Greedily pack segments into passages of at most `limit` characters,
    /// subdividing any segment that alone exceeds the limit.
    fn assemble(&self, segments: &[Segment], limit: usize) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut buffer = String::new();

        for segment in segments {
            let text = segment.text().trim();
            if text.is_empty() {
                continue;
            }
            let seg_len = char_len(text);

            if seg_len > limit {
                flush(&mut buffer, &mut chunks);
                match segment {
                    // Rows are newline-delimited, so paragraph subdivision
                    // keeps every row intact.
                    Segment::Table(_) | Segment::Text(_) => {
                        chunks.extend(self.subdivide(text, limit));
                    }
                }
                continue;
            }

            let buf_len = char_len(&buffer);
            if !buffer.is_empty() && buf_len + 1 + seg_len > limit {
                flush(&mut buffer, &mut chunks);
            }
            if !buffer.is_empty() {
                buffer.push('\n');
            }
            buffer.push_str(text);
        }
        flush(&mut buffer, &mut chunks);
        chunks
    }

    /// Subdivide an oversized segment: first by paragraph, then by sentence.
    /// A single sentence longer than the limit is kept whole.
    fn subdivide(&self, text: &str, limit: usize) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut buffer = String::new();

        for paragraph in text.split('\n') {
            let paragraph = paragraph.trim_end();
            if paragraph.trim().is_empty() {
                continue;
            }
            let par_len = char_len(paragraph);

            if par_len > limit {
                flush(&mut buffer, &mut chunks);
                self.pack_sentences(paragraph, limit, &mut chunks);
                continue;
            }

            if !buffer.is_empty() && char_len(&buffer) + 1 + par_len > limit {
                flush(&mut buffer, &mut chunks);
            }
            if !buffer.is_empty() {
                buffer.push('\n');
            }
            buffer.push_str(paragraph);
        }
        flush(&mut buffer, &mut chunks);
        chunks
    }

    /// Accumulate sentences of one long paragraph into sub-chunks.
    fn pack_sentences(&self, paragraph: &str, limit: usize, chunks: &mut Vec<String>) {
        let mut buffer = String::new();
        for sentence in split_sentences(paragraph) {
            let sen_len = char_len(&sentence);
            if !buffer.is_empty() && char_len(&buffer) + sen_len > limit {
                flush(&mut buffer, chunks);
            }
            buffer.push_str(&sentence);
            if char_len(&buffer) >= limit {
                flush(&mut buffer, chunks);
            }
        }
        flush(&mut buffer, chunks);
    }

    /// Windowed fallback splitting: fixed-size windows with a boundary
    /// search in the back half of each window, advancing with overlap.
    fn window_split(&self, text: &str, limit: usize) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let overlap = self.config.chunk_overlap.min(limit / 4);
        let mut chunks = Vec::new();
        let mut start = 0usize;

        while start < chars.len() {
            let mut end = (start + limit).min(chars.len());
            if end < chars.len() {
                // Prefer ending at a sentence or paragraph boundary.
                let search_from = start + limit / 2;
                if let Some(pos) = chars[search_from..end]
                    .iter()
                    .rposition(|c| SENTENCE_ENDS.contains(c) || *c == '\n' || *c == '；')
                {
                    end = search_from + pos + 1;
                }
            }

            let chunk: String = chars[start..end].iter().collect();
            let chunk = chunk.trim();
            if !chunk.is_empty() {
                chunks.push(chunk.to_string());
            }

            if end >= chars.len() {
                break;
            }
            // Step forward with overlap, but always make progress.
            let next = end.saturating_sub(overlap);
            start = if next > start { next } else { end };
        }
        chunks
    }
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self::new(SplitterConfig::default())
    }
}

fn flush(buffer: &mut String, chunks: &mut Vec<String>) {
    let trimmed = buffer.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
    buffer.clear();
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split a paragraph into sentences, keeping terminators attached.
fn split_sentences(paragraph: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    for c in paragraph.chars() {
        current.push(c);
        if SENTENCE_ENDS.contains(&c) {
            sentences.push(std::mem::take(&mut current));
        }
    }
    if !current.trim().is_empty() {
        sentences.push(current);
    }
    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    fn splitter(chunk_size: usize, overlap: usize, min_len: usize) -> TextSplitter {
        TextSplitter::new(SplitterConfig::new(chunk_size, overlap, min_len))
    }

    fn long_clause(n: usize) -> String {
        "商业银行应当按照审慎经营规则建立健全风险管理体系。".repeat(n)
    }

    #[test]
    fn short_document_is_one_passage() {
        let s = splitter(1000, 200, 10);
        let text = "商业银行资本充足率不得低于百分之八。";
        assert_eq!(s.split(text), vec![text.to_string()]);
    }

    #[test]
    fn too_short_document_is_dropped() {
        let s = splitter(1000, 200, 50);
        assert!(s.split("短文本。").is_empty());
    }

    #[test]
    fn overlap_is_clamped() {
        let config = SplitterConfig::new(400, 900, 10);
        assert_eq!(config.chunk_overlap, 100);
    }

    #[test]
    fn title_prefix_applied_to_every_passage() {
        let s = splitter(300, 50, 10);
        let text = format!(
            "《商业银行资本管理办法》\n第一条 {}\n第二条 {}",
            long_clause(15),
            long_clause(15)
        );
        let passages = s.split(&text);
        assert!(passages.len() >= 2);
        for p in &passages {
            assert!(p.starts_with("《商业银行资本管理办法》"));
        }
    }

    #[test]
    fn heading_merges_with_following_text() {
        let s = splitter(1000, 200, 50);
        // ~1800 chars with a heading near character 500.
        let before = long_clause(21); // 21 * 24 = 504 chars
        let after = long_clause(54); // ~1296 chars
        let text = format!("{}\n第一条 {}", before, after);
        assert!(char_len(&text) > 1700);

        let passages = s.split(&text);
        assert!(passages.len() >= 2, "got {} passages", passages.len());
        for p in &passages {
            assert!(char_len(p) <= 1000 + 30, "passage too long: {}", char_len(p));
            assert!(char_len(p) >= 50);
            // The heading must never be a passage on its own.
            assert_ne!(p.trim(), "第一条");
        }
    }

    #[test]
    fn size_bound_holds_for_plain_text() {
        let s = splitter(200, 40, 10);
        let text = long_clause(40);
        let passages = s.split(&text);
        assert!(passages.len() > 1);
        for p in &passages {
            assert!(char_len(p) <= 200, "passage too long: {}", char_len(p));
        }
    }

    #[test]
    fn oversized_single_sentence_kept_whole() {
        let s = splitter(100, 20, 10);
        let text = format!("第一条 {}。", "很".repeat(250));
        let passages = s.split(&text);
        assert_eq!(passages.len(), 1);
        assert_eq!(char_len(&passages[0]), 255);
    }

    #[test]
    fn table_region_stays_atomic_when_it_fits() {
        let s = splitter(500, 100, 10);
        let table = format!(
            "{}\n项目 | 金额\n贷款 | 100\n存款 | 200\n{}",
            TABLE_BEGIN, TABLE_END
        );
        let text = format!("第一条 {}\n{}\n第二条 {}", long_clause(18), table, long_clause(18));
        let passages = s.split(&text);
        let with_table: Vec<_> = passages.iter().filter(|p| p.contains("项目 | 金额")).collect();
        assert_eq!(with_table.len(), 1);
        assert!(with_table[0].contains(TABLE_END), "table was split mid-region");
    }

    #[test]
    fn oversized_table_splits_on_row_boundaries() {
        let s = splitter(120, 20, 5);
        let rows: String = (0..40)
            .map(|i| format!("科目{} | 余额{}\n", i, i * 10))
            .collect();
        let text = format!("{}\n{}{}\n第一条 补充说明。", TABLE_BEGIN, rows, TABLE_END);
        let passages = s.split(&text);
        for p in &passages {
            for line in p.lines() {
                // Every row survives intact.
                assert!(!line.contains("余额") || line.contains(" | "), "row split: {}", line);
            }
        }
    }

    #[test]
    fn unbalanced_table_sentinel_falls_back() {
        let s = splitter(200, 40, 10);
        let text = format!("{}\n残缺的表格行\n{}", TABLE_BEGIN, long_clause(30));
        // Must not panic, must still produce bounded passages.
        let passages = s.split(&text);
        assert!(!passages.is_empty());
        for p in &passages {
            assert!(char_len(p) <= 200);
        }
    }

    #[test]
    fn coverage_no_new_characters() {
        let s = splitter(150, 0, 5);
        let text = format!("第一条 {}\n第二条 {}", long_clause(10), long_clause(10));
        let passages = s.split(&text);
        let source: std::collections::HashSet<char> = text.chars().collect();
        for p in &passages {
            for c in p.chars() {
                if c != '\n' {
                    assert!(source.contains(&c), "introduced character {:?}", c);
                }
            }
        }
        // All clause text is covered.
        let joined: String = passages.concat();
        assert!(joined.contains("第一条"));
        assert!(joined.contains("第二条"));
        let body_chars: usize = passages.iter().map(|p| char_len(p)).sum();
        assert!(body_chars >= char_len(&text) - 2);
    }

    #[test]
    fn sole_short_fragment_survives_filtering() {
        // Body longer than chunk_size but consisting of tiny clauses that
        // would all be dropped by the minimum length filter.
        let s = splitter(30, 5, 40);
        let text = "一。二。三。四。五。六。七。八。九。十。甲。乙。丙。丁。戊。己。庚。辛。";
        let passages = s.split(text);
        assert!(!passages.is_empty());
    }
}
