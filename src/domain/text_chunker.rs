//! 文本分块器
//!
//! 将任意文本切分为语音引擎可安全朗读的片段。
//! 引擎对单次朗读的长度有实际上限（约 180~200 字符），超过后容易中断。

/// 默认单块最大字符数
pub const DEFAULT_MAX_CHARS: usize = 200;

/// 分块配置
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// 单块最大字符数（按 Unicode 字符计）
    pub max_chars: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHARS,
        }
    }
}

impl ChunkConfig {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }
}

/// 句末标点（后接空白时分句）
#[inline]
fn is_sentence_terminal(ch: char) -> bool {
    matches!(ch, '.' | '!' | '?' | '…' | '¡' | '¿' | '。' | '！' | '？')
}

/// 子句分隔符（句子过长时的次级切分点）
#[inline]
fn is_clause_delimiter(ch: char) -> bool {
    matches!(ch, ',' | ';' | '，' | '；')
}

/// 折叠所有连续空白为单个空格，并去掉首尾空白
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 在 "分隔符 + 空格" 处切分，分隔符保留在前一片段，空格丢弃
///
/// 输入必须已经过 [`normalize_whitespace`]。
fn split_after<F>(text: &str, is_boundary: F) -> Vec<&str>
where
    F: Fn(char) -> bool,
{
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, ch)) = chars.next() {
        if !is_boundary(ch) {
            continue;
        }
        if let Some(&(space_idx, ' ')) = chars.peek() {
            pieces.push(&text[start..space_idx]);
            start = space_idx + 1;
            chars.next();
        }
    }

    if start < text.len() {
        pieces.push(&text[start..]);
    }

    pieces.retain(|p| !p.is_empty());
    pieces
}

/// 贪心打包器
///
/// 缓冲区只在追加 `" " + 片段` 后仍不超过上限时才会扩展，否则先输出缓冲区。
struct ChunkPacker {
    max_chars: usize,
    buffer: String,
    buffer_chars: usize,
    chunks: Vec<String>,
}

impl ChunkPacker {
    fn new(max_chars: usize) -> Self {
        Self {
            max_chars,
            buffer: String::new(),
            buffer_chars: 0,
            chunks: Vec::new(),
        }
    }

    fn fits(&self, piece_chars: usize) -> bool {
        if self.buffer.is_empty() {
            piece_chars <= self.max_chars
        } else {
            self.buffer_chars + 1 + piece_chars <= self.max_chars
        }
    }

    fn push_to_buffer(&mut self, piece: &str, piece_chars: usize) {
        if !self.buffer.is_empty() {
            self.buffer.push(' ');
            self.buffer_chars += 1;
        }
        self.buffer.push_str(piece);
        self.buffer_chars += piece_chars;
    }

    fn flush(&mut self) {
        let chunk = std::mem::take(&mut self.buffer);
        self.buffer_chars = 0;
        let trimmed = chunk.trim();
        if !trimmed.is_empty() {
            self.chunks.push(trimmed.to_string());
        }
    }

    /// 追加一个句子级单元
    ///
    /// 放不进缓冲区时先输出缓冲区；单元本身不超过上限就整体成为新缓冲区，
    /// 只有单元本身超长才按逗号/分号切分。
    fn append_sentence(&mut self, sentence: &str) {
        let chars = sentence.chars().count();
        if self.fits(chars) {
            self.push_to_buffer(sentence, chars);
            return;
        }

        self.flush();
        if chars <= self.max_chars {
            self.push_to_buffer(sentence, chars);
            return;
        }

        let clauses = split_after(sentence, is_clause_delimiter);
        if clauses.len() > 1 {
            for clause in clauses {
                self.append_sentence(clause);
            }
        } else {
            self.append_words(sentence);
        }
    }

    /// 超长且无子句分隔符时退化到按词打包
    fn append_words(&mut self, text: &str) {
        for word in text.split(' ').filter(|w| !w.is_empty()) {
            let word_chars = word.chars().count();
            if self.fits(word_chars) {
                self.push_to_buffer(word, word_chars);
            } else if word_chars <= self.max_chars {
                self.flush();
                self.push_to_buffer(word, word_chars);
            } else {
                self.hard_wrap(word);
            }
        }
    }

    /// 单个不可分割的超长词：按上限硬切，最后一段留在缓冲区
    fn hard_wrap(&mut self, token: &str) {
        self.flush();
        let chars: Vec<char> = token.chars().collect();
        let mut pieces = chars.chunks(self.max_chars).peekable();
        while let Some(piece) = pieces.next() {
            let piece: String = piece.iter().collect();
            if pieces.peek().is_some() {
                self.chunks.push(piece);
            } else {
                let piece_chars = piece.chars().count();
                self.push_to_buffer(&piece, piece_chars);
            }
        }
    }

    fn finish(mut self) -> Vec<String> {
        self.flush();
        self.chunks
    }
}

/// 对文本进行分块
///
/// 分块策略：
/// 1. 折叠空白；结果为空时返回空序列
/// 2. 按句末标点 + 空白分句（找不到句界时整段作为一个单元）
/// 3. 贪心打包句子；单句超长时先按逗号/分号切分，再按词，最后对超长词硬切
///
/// 纯函数，相同输入总是得到相同输出。
pub fn chunk_text(text: &str, config: &ChunkConfig) -> Vec<String> {
    let normalized = normalize_whitespace(text);
    if normalized.is_empty() {
        return Vec::new();
    }

    let mut packer = ChunkPacker::new(config.max_chars.max(1));
    for sentence in split_after(&normalized, is_sentence_terminal) {
        packer.append_sentence(sentence);
    }
    packer.finish()
}

/// 使用默认配置分块（便捷方法）
pub fn chunk_text_default(text: &str) -> Vec<String> {
    chunk_text(text, &ChunkConfig::default())
}
