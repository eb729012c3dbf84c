//! Tagged arena allocation with optional content-addressed deduplication.
//!
//! Each tag is an independent allocation scope: it can be trimmed (release
//! slack), reset (drop all atoms, keep the arenas) or destroyed outright.
//! Atom ids stand in for stable pointers; an id resolves until its tag is
//! reset or destroyed.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::Hasher;

const CHUNK_SIZE: usize = 16384;

/// Default minimum length for deduplication; shorter atoms are stored
/// verbatim because the table overhead outweighs the sharing.
pub const DEDUP_THRESHOLD: usize = 4;

/// Allocation policy for one tag.
#[derive(Copy, Clone, Default, PartialEq, Eq, Debug)]
pub enum AtomMode {
    /// Bump allocation, every store gets fresh bytes.
    #[default]
    Plain,
    /// Bump allocation plus a content hash table; identical byte sequences
    /// at or above the threshold share one atom.
    Dedup,
}

/// Handle to a tag (allocation scope).
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct AtomTag(u32);

/// Handle to one stored byte sequence.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct AtomId {
    tag: u32,
    index: u32,
}

#[derive(Copy, Clone, Debug)]
struct Span {
    chunk: u32,
    start: u32,
    len: u32,
}

/// Per-tag accounting, for trimming decisions.
#[derive(Copy, Clone, Default, PartialEq, Eq, Debug)]
#[non_exhaustive]
pub struct TagStats {
    /// Bytes referenced by live atoms.
    pub bytes_live: usize,
    /// Bytes reserved but unused in the tag's arenas.
    pub bytes_slack: usize,
    /// Number of `store`/`storev` calls that allocated (dedup hits excluded).
    pub allocations: usize,
}

struct Tag {
    mode: AtomMode,
    threshold: usize,
    chunks: Vec<Vec<u8>>,
    spans: Vec<Span>,
    dedup: HashMap<u64, Vec<u32>>,
    allocations: usize,
}

impl Tag {
    fn new(mode: AtomMode) -> Self {
        Self {
            mode,
            threshold: DEDUP_THRESHOLD,
            chunks: Vec::new(),
            spans: Vec::new(),
            dedup: HashMap::new(),
            allocations: 0,
        }
    }

    fn bytes(&self, span: Span) -> &[u8] {
        let chunk = &self.chunks[span.chunk as usize];
        &chunk[span.start as usize..(span.start + span.len) as usize]
    }

    fn reserve(&mut self, len: usize) -> u32 {
        let fits = self
            .chunks
            .last()
            .is_some_and(|chunk| chunk.capacity() - chunk.len() >= len);
        if !fits {
            self.chunks.push(Vec::with_capacity(CHUNK_SIZE.max(len)));
        }
        self.chunks.len() as u32 - 1
    }
}

fn content_hash(parts: &[&[u8]]) -> u64 {
    let mut hasher = DefaultHasher::new();
    for part in parts {
        hasher.write(part);
    }
    hasher.finish()
}

/// The atom table: a set of independently managed tags.
#[derive(Default)]
pub struct Atoms {
    tags: Vec<Option<Tag>>,
}

impl Atoms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new allocation scope.
    pub fn add_tag(&mut self, mode: AtomMode) -> AtomTag {
        self.tags.push(Some(Tag::new(mode)));
        AtomTag(self.tags.len() as u32 - 1)
    }

    fn tag(&self, tag: AtomTag) -> &Tag {
        self.tags[tag.0 as usize]
            .as_ref()
            .expect("tag was destroyed")
    }

    fn tag_mut(&mut self, tag: AtomTag) -> &mut Tag {
        self.tags[tag.0 as usize]
            .as_mut()
            .expect("tag was destroyed")
    }

    /// Copy `bytes` into the tag. Under dedup an identical sequence already
    /// stored returns the existing id.
    pub fn store(&mut self, tag: AtomTag, bytes: &[u8]) -> AtomId {
        self.storev(tag, &[bytes])
    }

    /// Scatter-gather store; produces output byte-identical to the
    /// concatenation of `parts`.
    pub fn storev(&mut self, tag: AtomTag, parts: &[&[u8]]) -> AtomId {
        let total: usize = parts.iter().map(|p| p.len()).sum();
        let scope = self.tag_mut(tag);

        let hash = content_hash(parts);
        if scope.mode == AtomMode::Dedup && total >= scope.threshold {
            if let Some(candidates) = scope.dedup.get(&hash) {
                for &index in candidates {
                    let span = scope.spans[index as usize];
                    if span.len as usize == total && concat_eq(scope.bytes(span), parts) {
                        return AtomId { tag: tag.0, index };
                    }
                }
            }
        }

        let chunk_index = scope.reserve(total);
        let chunk = &mut scope.chunks[chunk_index as usize];
        let start = chunk.len() as u32;
        for part in parts {
            chunk.extend_from_slice(part);
        }
        scope.spans.push(Span {
            chunk: chunk_index,
            start,
            len: total as u32,
        });
        scope.allocations += 1;
        let index = scope.spans.len() as u32 - 1;
        if scope.mode == AtomMode::Dedup && total >= scope.threshold {
            scope.dedup.entry(hash).or_default().push(index);
        }
        AtomId { tag: tag.0, index }
    }

    /// Resolve an atom id to its bytes.
    pub fn get(&self, id: AtomId) -> &[u8] {
        let scope = self.tag(AtomTag(id.tag));
        scope.bytes(scope.spans[id.index as usize])
    }

    /// Resolve an atom id as UTF-8 text. Panics if the atom holds bytes that
    /// were not valid UTF-8; the pipeline only stores decoded text.
    pub fn get_str(&self, id: AtomId) -> &str {
        std::str::from_utf8(self.get(id)).expect("atom does not hold UTF-8 text")
    }

    /// Drop every atom in the tag but keep its arenas for reuse.
    pub fn reset(&mut self, tag: AtomTag) {
        let scope = self.tag_mut(tag);
        for chunk in &mut scope.chunks {
            chunk.clear();
        }
        scope.spans.clear();
        scope.dedup.clear();
        scope.allocations = 0;
    }

    /// Release slack: drop empty arenas and shrink the rest.
    pub fn trim(&mut self, tag: AtomTag) {
        let scope = self.tag_mut(tag);
        scope.chunks.retain(|chunk| !chunk.is_empty());
        for chunk in &mut scope.chunks {
            chunk.shrink_to_fit();
        }
        scope.dedup.shrink_to_fit();
    }

    /// Destroy the tag; its ids no longer resolve.
    pub fn destroy(&mut self, tag: AtomTag) {
        self.tags[tag.0 as usize] = None;
    }

    /// Per-tag accounting.
    pub fn stats(&self, tag: AtomTag) -> TagStats {
        let scope = self.tag(tag);
        let used: usize = scope.chunks.iter().map(Vec::len).sum();
        let reserved: usize = scope.chunks.iter().map(Vec::capacity).sum();
        TagStats {
            bytes_live: scope.spans.iter().map(|s| s.len as usize).sum(),
            bytes_slack: reserved - used,
            allocations: scope.allocations,
        }
    }
}

fn concat_eq(stored: &[u8], parts: &[&[u8]]) -> bool {
    let mut rest = stored;
    for part in parts {
        if rest.len() < part.len() {
            return false;
        }
        let (head, tail) = rest.split_at(part.len());
        if head != *part {
            return false;
        }
        rest = tail;
    }
    rest.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_returns_the_same_id() {
        let mut atoms = Atoms::new();
        let tag = atoms.add_tag(AtomMode::Dedup);
        let a = atoms.store(tag, b"anchor-name");
        let b = atoms.store(tag, b"anchor-name");
        assert_eq!(a, b);
        assert_eq!(atoms.stats(tag).allocations, 1);
    }

    #[test]
    fn short_atoms_skip_the_dedup_table() {
        let mut atoms = Atoms::new();
        let tag = atoms.add_tag(AtomMode::Dedup);
        let a = atoms.store(tag, b"ab");
        let b = atoms.store(tag, b"ab");
        assert_ne!(a, b);
        assert_eq!(atoms.get(a), atoms.get(b));
    }

    #[test]
    fn storev_matches_concatenation() {
        let mut atoms = Atoms::new();
        let tag = atoms.add_tag(AtomMode::Dedup);
        let joined = atoms.store(tag, b"tag:yaml.org,2002:str");
        let gathered = atoms.storev(tag, &[b"tag:yaml.org,2002:", b"str"]);
        assert_eq!(joined, gathered);
        assert_eq!(atoms.get(gathered), b"tag:yaml.org,2002:str");
    }

    #[test]
    fn plain_tags_never_share() {
        let mut atoms = Atoms::new();
        let tag = atoms.add_tag(AtomMode::Plain);
        let a = atoms.store(tag, b"duplicate");
        let b = atoms.store(tag, b"duplicate");
        assert_ne!(a, b);
    }

    #[test]
    fn reset_retains_arena_capacity() {
        let mut atoms = Atoms::new();
        let tag = atoms.add_tag(AtomMode::Plain);
        atoms.store(tag, &[b'x'; 100]);
        atoms.reset(tag);
        let stats = atoms.stats(tag);
        assert_eq!(stats.bytes_live, 0);
        assert!(stats.bytes_slack >= 100);
    }
}
