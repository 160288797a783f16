/// What followed a chunk in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// Chunk ended at a line break.
    LineEnd,
    /// Chunk is a hard slice of a line that continues in the next chunk.
    MidLine,
    /// Last chunk of the text.
    End,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub text: String,
    pub boundary: Boundary,
}

impl TextChunk {
    fn new(text: String, boundary: Boundary) -> Self {
        TextChunk { text, boundary }
    }

    /// Length in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Separator that stood after this chunk in the source.
    pub fn source_separator(&self) -> &'static str {
        match self.boundary {
            Boundary::LineEnd => "\n",
            Boundary::MidLine | Boundary::End => "",
        }
    }
}

/// Split `text` into chunks of at most `max_chunk_size` characters, cutting at
/// line breaks when possible and hard-slicing any line that cannot fit alone.
pub fn split(text: &str, max_chunk_size: usize) -> Vec<TextChunk> {
    if text.is_empty() || max_chunk_size == 0 {
        return Vec::new();
    }
    if text.chars().count() <= max_chunk_size {
        return vec![TextChunk::new(text.to_string(), Boundary::End)];
    }

    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0usize;

    for line in text.split('\n') {
        // one extra unit for the newline
        let line_len = line.chars().count() + 1;

        if current_len + line_len <= max_chunk_size {
            current.push(line);
            current_len += line_len;
            continue;
        }

        if !current.is_empty() {
            chunks.push(TextChunk::new(current.join("\n"), Boundary::LineEnd));
            current.clear();
            current_len = 0;
        }

        if line_len > max_chunk_size {
            chunks.extend(hard_slice(line, max_chunk_size));
        } else {
            current.push(line);
            current_len = line_len;
        }
    }

    if !current.is_empty() {
        chunks.push(TextChunk::new(current.join("\n"), Boundary::LineEnd));
    }
    if let Some(last) = chunks.last_mut() {
        last.boundary = Boundary::End;
    }
    chunks
}

fn hard_slice(line: &str, size: usize) -> Vec<TextChunk> {
    let chars: Vec<char> = line.chars().collect();
    let pieces: Vec<String> = chars.chunks(size).map(|c| c.iter().collect()).collect();
    let last = pieces.len().saturating_sub(1);
    pieces
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let boundary = if i == last { Boundary::LineEnd } else { Boundary::MidLine };
            TextChunk::new(text, boundary)
        })
        .collect()
}

/// Rejoin chunks with the separators they were cut at.
pub fn reassemble(chunks: &[TextChunk]) -> String {
    let mut out = String::new();
    for chunk in chunks {
        out.push_str(&chunk.text);
        out.push_str(chunk.source_separator());
    }
    out
}
