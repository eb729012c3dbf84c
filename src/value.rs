//! The generic value store: an interned, immutable value graph behind packed
//! 64-bit handles.
//!
//! The low bits of a handle carry the type tag, the high bits an inline
//! payload (null, booleans, small integers) or an index into the store's
//! tables. Handles are only meaningful against the store that created them;
//! use [`ValueStore::internalize`] to carry a value into another store.
//! Matching code never sees the packed form: [`ValueStore::get_data`] exposes
//! an exhaustive sum type.

use std::cell::OnceCell;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use crate::atom::{AtomId, AtomMode, AtomTag, Atoms};
use crate::compose;
use crate::dumper;
use crate::emitter::EmitOptions;
use crate::error::{ComposerError, EmitterError, StoreError};
use crate::parser::{ParseOptions, Parser};
use crate::path::PathSegment;
use crate::reader::Input;
use crate::{Mark, ScalarStyle};

const TAG_BITS: u64 = 4;
const TAG_MASK: u64 = (1 << TAG_BITS) - 1;

const T_NULL: u64 = 0;
const T_FALSE: u64 = 1;
const T_TRUE: u64 = 2;
const T_INT_INLINE: u64 = 3;
const T_INT_BOXED: u64 = 4;
const T_FLOAT: u64 = 5;
const T_STRING: u64 = 6;
const T_SEQUENCE: u64 = 7;
const T_MAPPING: u64 = 8;
const T_INDIRECT: u64 = 9;
const T_ALIAS: u64 = 10;

const INLINE_INT_MAX: i64 = (1 << 59) - 1;
const INLINE_INT_MIN: i64 = -(1 << 59);

/// A packed handle to a value in a [`ValueStore`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Value(u64);

impl Value {
    /// The null value. Valid against every store.
    pub const NULL: Value = Value(T_NULL);

    /// A boolean value. Valid against every store.
    pub const fn bool(value: bool) -> Value {
        if value {
            Value(T_TRUE)
        } else {
            Value(T_FALSE)
        }
    }

    fn tag(self) -> u64 {
        self.0 & TAG_MASK
    }

    fn index(self) -> usize {
        (self.0 >> TAG_BITS) as usize
    }

    fn from_index(tag: u64, index: usize) -> Value {
        Value(((index as u64) << TAG_BITS) | tag)
    }

    fn inline_int(self) -> i64 {
        (self.0 as i64) >> TAG_BITS
    }
}

/// A style hint carried by an indirect wrapper.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum StyleHint {
    /// Scalar style of the original scalar.
    Scalar(ScalarStyle),
    /// The collection was written in flow style.
    Flow,
    /// The collection was written in block style.
    Block,
}

/// Metadata wrapper around a base value: tag, anchor, source position,
/// comment and style survive here without widening every scalar.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct Indirect {
    /// The wrapped value.
    pub base: Value,
    /// The resolved tag, if explicit.
    pub tag: Option<String>,
    /// The anchor decorating the node.
    pub anchor: Option<String>,
    /// Where the node started in the source.
    pub mark: Option<Mark>,
    /// A captured leading comment.
    pub comment: Option<String>,
    /// The original presentation style.
    pub style: Option<StyleHint>,
}

impl Indirect {
    pub fn new(base: Value) -> Self {
        Self {
            base,
            tag: None,
            anchor: None,
            mark: None,
            comment: None,
            style: None,
        }
    }
}

/// Borrowed view of a value for exhaustive matching.
#[derive(Copy, Clone, Debug)]
pub enum ValueData<'a> {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(&'a str),
    Sequence(&'a [Value]),
    Mapping(&'a [(Value, Value)]),
    Indirect(&'a Indirect),
    Alias(&'a str),
}

struct SeqRepr {
    items: Box<[Value]>,
}

struct MapRepr {
    pairs: Box<[(Value, Value)]>,
    /// Key handle → value, built on first lookup. Duplicate keys keep the
    /// first occurrence, as composition does.
    index: OnceCell<HashMap<Value, Value>>,
}

/// The interned value store.
///
/// Primitives (integers, floats, strings, alias names) are always interned,
/// so handle equality decides primitive equality in every configuration.
/// With [`ValueStore::with_dedup`], composites are content-addressed as well
/// and `equal(a, b)` collapses to `a == b`.
pub struct ValueStore {
    dedup: bool,
    atoms: Atoms,
    text_tag: AtomTag,
    strings: Vec<AtomId>,
    string_ids: HashMap<AtomId, u32>,
    ints: Vec<i64>,
    int_ids: HashMap<i64, u32>,
    floats: Vec<f64>,
    float_ids: HashMap<u64, u32>,
    seqs: Vec<SeqRepr>,
    seq_ids: HashMap<u64, Vec<u32>>,
    maps: Vec<MapRepr>,
    map_ids: HashMap<u64, Vec<u32>>,
    indirects: Vec<Indirect>,
    aliases: Vec<u32>,
    alias_ids: HashMap<u32, u32>,
}

impl Default for ValueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ValueStore {
    /// A store without composite deduplication.
    pub fn new() -> Self {
        Self::with_dedup_enabled(false)
    }

    /// A store with full structural deduplication: structurally equal
    /// composites share one handle.
    pub fn with_dedup() -> Self {
        Self::with_dedup_enabled(true)
    }

    fn with_dedup_enabled(dedup: bool) -> Self {
        let mut atoms = Atoms::new();
        let text_tag = atoms.add_tag(AtomMode::Dedup);
        Self {
            dedup,
            atoms,
            text_tag,
            strings: Vec::new(),
            string_ids: HashMap::new(),
            ints: Vec::new(),
            int_ids: HashMap::new(),
            floats: Vec::new(),
            float_ids: HashMap::new(),
            seqs: Vec::new(),
            seq_ids: HashMap::new(),
            maps: Vec::new(),
            map_ids: HashMap::new(),
            indirects: Vec::new(),
            aliases: Vec::new(),
            alias_ids: HashMap::new(),
        }
    }

    /// Is composite deduplication on?
    pub fn dedup_enabled(&self) -> bool {
        self.dedup
    }

    // Constructors.

    pub fn null(&self) -> Value {
        Value::NULL
    }

    pub fn bool(&self, value: bool) -> Value {
        Value::bool(value)
    }

    pub fn int(&mut self, value: i64) -> Value {
        if (INLINE_INT_MIN..=INLINE_INT_MAX).contains(&value) {
            return Value(((value as u64) << TAG_BITS) | T_INT_INLINE);
        }
        let index = match self.int_ids.get(&value) {
            Some(&index) => index,
            None => {
                self.ints.push(value);
                let index = self.ints.len() as u32 - 1;
                self.int_ids.insert(value, index);
                index
            }
        };
        Value::from_index(T_INT_BOXED, index as usize)
    }

    pub fn float(&mut self, value: f64) -> Value {
        let bits = value.to_bits();
        let index = match self.float_ids.get(&bits) {
            Some(&index) => index,
            None => {
                self.floats.push(value);
                let index = self.floats.len() as u32 - 1;
                self.float_ids.insert(bits, index);
                index
            }
        };
        Value::from_index(T_FLOAT, index as usize)
    }

    pub fn string(&mut self, value: &str) -> Value {
        Value::from_index(T_STRING, self.intern_text(value) as usize)
    }

    fn intern_text(&mut self, value: &str) -> u32 {
        let atom = self.atoms.store(self.text_tag, value.as_bytes());
        if let Some(&id) = self.string_ids.get(&atom) {
            return id;
        }
        // Short strings bypass the atom dedup table; fall back to a text scan
        // so string handles stay canonical.
        if value.len() < crate::atom::DEDUP_THRESHOLD {
            if let Some(id) = self
                .strings
                .iter()
                .position(|&existing| self.atoms.get(existing) == value.as_bytes())
            {
                return id as u32;
            }
        }
        self.strings.push(atom);
        let id = self.strings.len() as u32 - 1;
        self.string_ids.insert(atom, id);
        id
    }

    pub fn sequence(&mut self, items: Vec<Value>) -> Value {
        if self.dedup {
            let hash = hash_items(T_SEQUENCE, &items);
            if let Some(candidates) = self.seq_ids.get(&hash) {
                for &index in candidates {
                    if self.seqs[index as usize].items.as_ref() == items.as_slice() {
                        return Value::from_index(T_SEQUENCE, index as usize);
                    }
                }
            }
            self.seqs.push(SeqRepr {
                items: items.into_boxed_slice(),
            });
            let index = self.seqs.len() as u32 - 1;
            self.seq_ids.entry(hash).or_default().push(index);
            Value::from_index(T_SEQUENCE, index as usize)
        } else {
            self.seqs.push(SeqRepr {
                items: items.into_boxed_slice(),
            });
            Value::from_index(T_SEQUENCE, self.seqs.len() - 1)
        }
    }

    pub fn mapping(&mut self, pairs: Vec<(Value, Value)>) -> Value {
        if self.dedup {
            let hash = hash_pairs(&pairs);
            if let Some(candidates) = self.map_ids.get(&hash) {
                for &index in candidates {
                    if self.maps[index as usize].pairs.as_ref() == pairs.as_slice() {
                        return Value::from_index(T_MAPPING, index as usize);
                    }
                }
            }
            self.maps.push(MapRepr {
                pairs: pairs.into_boxed_slice(),
                index: OnceCell::new(),
            });
            let index = self.maps.len() as u32 - 1;
            self.map_ids.entry(hash).or_default().push(index);
            Value::from_index(T_MAPPING, index as usize)
        } else {
            self.maps.push(MapRepr {
                pairs: pairs.into_boxed_slice(),
                index: OnceCell::new(),
            });
            Value::from_index(T_MAPPING, self.maps.len() - 1)
        }
    }

    pub fn indirect(&mut self, indirect: Indirect) -> Value {
        self.indirects.push(indirect);
        Value::from_index(T_INDIRECT, self.indirects.len() - 1)
    }

    /// An unresolved alias naming an anchor.
    pub fn alias(&mut self, name: &str) -> Value {
        let string_id = self.intern_text(name);
        let index = match self.alias_ids.get(&string_id) {
            Some(&index) => index,
            None => {
                self.aliases.push(string_id);
                let index = self.aliases.len() as u32 - 1;
                self.alias_ids.insert(string_id, index);
                index
            }
        };
        Value::from_index(T_ALIAS, index as usize)
    }

    // Inspection.

    /// The abstract view of a handle; O(1) dispatch on the tag bits.
    pub fn get_data(&self, value: Value) -> ValueData<'_> {
        match value.tag() {
            T_NULL => ValueData::Null,
            T_FALSE => ValueData::Bool(false),
            T_TRUE => ValueData::Bool(true),
            T_INT_INLINE => ValueData::Int(value.inline_int()),
            T_INT_BOXED => ValueData::Int(self.ints[value.index()]),
            T_FLOAT => ValueData::Float(self.floats[value.index()]),
            T_STRING => ValueData::Str(self.text(value.index() as u32)),
            T_SEQUENCE => ValueData::Sequence(&self.seqs[value.index()].items),
            T_MAPPING => ValueData::Mapping(&self.maps[value.index()].pairs),
            T_INDIRECT => ValueData::Indirect(&self.indirects[value.index()]),
            T_ALIAS => ValueData::Alias(self.text(self.aliases[value.index()])),
            _ => unreachable!("corrupt value handle"),
        }
    }

    fn text(&self, string_id: u32) -> &str {
        self.atoms.get_str(self.strings[string_id as usize])
    }

    /// Like [`ValueStore::get_data`], but sees through indirect wrappers.
    pub fn resolve_data(&self, value: Value) -> ValueData<'_> {
        let mut current = value;
        loop {
            match self.get_data(current) {
                ValueData::Indirect(indirect) => current = indirect.base,
                data => return data,
            }
        }
    }

    /// The base value under any indirect wrappers.
    pub fn resolve(&self, value: Value) -> Value {
        let mut current = value;
        while let ValueData::Indirect(indirect) = self.get_data(current) {
            current = indirect.base;
        }
        current
    }

    /// The indirect metadata on a value, if any.
    pub fn metadata(&self, value: Value) -> Option<&Indirect> {
        match self.get_data(value) {
            ValueData::Indirect(indirect) => Some(indirect),
            _ => None,
        }
    }

    /// Size of a sequence, mapping or string; 0 for other values.
    pub fn len(&self, value: Value) -> usize {
        match self.resolve_data(value) {
            ValueData::Sequence(items) => items.len(),
            ValueData::Mapping(pairs) => pairs.len(),
            ValueData::Str(text) => text.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self, value: Value) -> bool {
        self.len(value) == 0
    }

    /// Structural equality. Indirect wrappers are transparent; with dedup on
    /// this is equivalent to handle equality for wrapper-free values.
    pub fn equal(&self, a: Value, b: Value) -> bool {
        if a == b {
            return true;
        }
        match (self.resolve_data(a), self.resolve_data(b)) {
            (ValueData::Null, ValueData::Null) => true,
            (ValueData::Bool(x), ValueData::Bool(y)) => x == y,
            (ValueData::Int(x), ValueData::Int(y)) => x == y,
            (ValueData::Float(x), ValueData::Float(y)) => x == y,
            (ValueData::Str(x), ValueData::Str(y)) => x == y,
            (ValueData::Alias(x), ValueData::Alias(y)) => x == y,
            (ValueData::Sequence(x), ValueData::Sequence(y)) => {
                x.len() == y.len() && x.iter().zip(y).all(|(&i, &j)| self.equal(i, j))
            }
            (ValueData::Mapping(x), ValueData::Mapping(y)) => {
                x.len() == y.len()
                    && x.iter()
                        .zip(y)
                        .all(|(&(xk, xv), &(yk, yv))| self.equal(xk, yk) && self.equal(xv, yv))
            }
            _ => false,
        }
    }

    /// Does the sequence contain a structurally equal item?
    pub fn contains(&self, sequence: Value, item: Value) -> bool {
        match self.resolve_data(sequence) {
            ValueData::Sequence(items) => items.iter().any(|&i| self.equal(i, item)),
            _ => false,
        }
    }

    /// Look up `key` in a mapping. The first lookup into an interned mapping
    /// builds a hash index keyed by handle; composite keys fall back to a
    /// structural scan.
    pub fn get(&self, mapping: Value, key: Value) -> Option<Value> {
        let mapping = self.resolve(mapping);
        if mapping.tag() != T_MAPPING {
            return None;
        }
        let repr = &self.maps[mapping.index()];
        let index = repr.index.get_or_init(|| {
            let mut index = HashMap::with_capacity(repr.pairs.len());
            for &(k, v) in repr.pairs.iter() {
                index.entry(self.resolve(k)).or_insert(v);
            }
            index
        });
        if let Some(&value) = index.get(&self.resolve(key)) {
            return Some(value);
        }
        // Composite keys are not canonical without dedup; scan structurally.
        repr.pairs
            .iter()
            .find(|&&(k, _)| self.equal(k, key))
            .map(|&(_, v)| v)
    }

    /// Look up a string key in a mapping without interning it first.
    pub fn get_str(&self, mapping: Value, key: &str) -> Option<Value> {
        match self.resolve_data(mapping) {
            ValueData::Mapping(pairs) => pairs
                .iter()
                .find(|&&(k, _)| matches!(self.resolve_data(k), ValueData::Str(text) if text == key))
                .map(|&(_, v)| v),
            _ => None,
        }
    }

    /// Sequence indexing, O(1).
    pub fn get_index(&self, sequence: Value, index: usize) -> Option<Value> {
        match self.resolve_data(sequence) {
            ValueData::Sequence(items) => items.get(index).copied(),
            _ => None,
        }
    }

    // Path operations.

    /// Follow `path` from `root`.
    pub fn get_at_path(&self, root: Value, path: &[PathSegment]) -> Result<Value, StoreError> {
        let mut current = root;
        for segment in path {
            current = match (self.resolve_data(current), segment) {
                (ValueData::Sequence(items), PathSegment::Int(i)) => {
                    let index = usize::try_from(*i).map_err(|_| StoreError::PathNotFound)?;
                    *items.get(index).ok_or(StoreError::IndexOutOfBounds(index))?
                }
                (ValueData::Mapping(pairs), segment) => pairs
                    .iter()
                    .find(|&&(k, _)| self.key_matches(k, segment))
                    .map(|&(_, v)| v)
                    .ok_or(StoreError::PathNotFound)?,
                (ValueData::Sequence(_), _) => return Err(StoreError::PathNotFound),
                _ => return Err(StoreError::NotAContainer),
            };
        }
        Ok(current)
    }

    /// Replace the subtree at `path`, returning a new root. Unchanged
    /// subtrees are shared; missing intermediates are created — mappings for
    /// string/bool/float keys, sequences for integer keys.
    pub fn set_at_path(
        &mut self,
        root: Value,
        path: &[PathSegment],
        value: Value,
    ) -> Result<Value, StoreError> {
        self.set_in(Some(root), path, value)
    }

    fn set_in(
        &mut self,
        current: Option<Value>,
        path: &[PathSegment],
        value: Value,
    ) -> Result<Value, StoreError> {
        let Some((segment, rest)) = path.split_first() else {
            return Ok(value);
        };
        // A missing or null slot grows whatever container the segment calls
        // for.
        let current = current.filter(|&v| !matches!(self.resolve_data(v), ValueData::Null));
        match current.map(|v| self.resolve(v)) {
            None => match segment {
                PathSegment::Int(i) => {
                    let index = usize::try_from(*i).map_err(|_| StoreError::PathNotFound)?;
                    let child = self.set_in(None, rest, value)?;
                    let mut items = vec![Value::NULL; index];
                    items.push(child);
                    Ok(self.sequence(items))
                }
                segment => {
                    let key = self.segment_key(segment);
                    let child = self.set_in(None, rest, value)?;
                    Ok(self.mapping(vec![(key, child)]))
                }
            },
            Some(container) if container.tag() == T_SEQUENCE => {
                let PathSegment::Int(i) = segment else {
                    return Err(StoreError::PathNotFound);
                };
                let index = usize::try_from(*i).map_err(|_| StoreError::PathNotFound)?;
                let mut items = self.seqs[container.index()].items.to_vec();
                let existing = items.get(index).copied();
                let child = self.set_in(existing, rest, value)?;
                if index < items.len() {
                    items[index] = child;
                } else {
                    items.resize(index, Value::NULL);
                    items.push(child);
                }
                Ok(self.sequence(items))
            }
            Some(container) if container.tag() == T_MAPPING => {
                let mut pairs = self.maps[container.index()].pairs.to_vec();
                let position = pairs
                    .iter()
                    .position(|&(k, _)| self.key_matches(k, segment));
                let existing = position.map(|p| pairs[p].1);
                let child = self.set_in(existing, rest, value)?;
                match position {
                    Some(p) => pairs[p].1 = child,
                    None => {
                        let key = self.segment_key(segment);
                        pairs.push((key, child));
                    }
                }
                Ok(self.mapping(pairs))
            }
            Some(_) => Err(StoreError::NotAContainer),
        }
    }

    fn segment_key(&mut self, segment: &PathSegment) -> Value {
        match segment {
            PathSegment::Int(i) => self.int(*i),
            PathSegment::Str(s) => {
                let s = s.clone();
                self.string(&s)
            }
            PathSegment::Bool(b) => self.bool(*b),
            PathSegment::Float(f) => self.float(*f),
        }
    }

    fn key_matches(&self, key: Value, segment: &PathSegment) -> bool {
        match (self.resolve_data(key), segment) {
            (ValueData::Int(i), PathSegment::Int(j)) => i == *j,
            (ValueData::Str(s), PathSegment::Str(t)) => s == t,
            (ValueData::Bool(b), PathSegment::Bool(c)) => b == *c,
            (ValueData::Float(f), PathSegment::Float(g)) => f == *g,
            _ => false,
        }
    }

    /// Deep-copy a value from another store into this one, re-interning
    /// every piece. Metadata wrappers and unresolved aliases survive.
    pub fn internalize(&mut self, source: &ValueStore, value: Value) -> Value {
        match source.get_data(value) {
            ValueData::Null => Value::NULL,
            ValueData::Bool(b) => Value::bool(b),
            ValueData::Int(i) => self.int(i),
            ValueData::Float(f) => self.float(f),
            ValueData::Str(s) => {
                let s = s.to_string();
                self.string(&s)
            }
            ValueData::Alias(name) => {
                let name = name.to_string();
                self.alias(&name)
            }
            ValueData::Sequence(items) => {
                let items = items.to_vec();
                let items = items
                    .into_iter()
                    .map(|item| self.internalize(source, item))
                    .collect();
                self.sequence(items)
            }
            ValueData::Mapping(pairs) => {
                let pairs = pairs.to_vec();
                let pairs = pairs
                    .into_iter()
                    .map(|(k, v)| (self.internalize(source, k), self.internalize(source, v)))
                    .collect();
                self.mapping(pairs)
            }
            ValueData::Indirect(indirect) => {
                let meta = indirect.clone();
                let base = self.internalize(source, meta.base);
                self.indirect(Indirect { base, ..meta })
            }
        }
    }

    /// Structural depth of the value graph under `value`.
    pub fn depth(&self, value: Value) -> usize {
        match self.resolve_data(value) {
            ValueData::Sequence(items) => {
                1 + items.iter().map(|&i| self.depth(i)).max().unwrap_or(0)
            }
            ValueData::Mapping(pairs) => {
                1 + pairs
                    .iter()
                    .map(|&(k, v)| self.depth(k).max(self.depth(v)))
                    .max()
                    .unwrap_or(0)
            }
            _ => 1,
        }
    }

    // Pipeline conveniences.

    /// Parse text and intern the first document's root value.
    pub fn parse_str(
        &mut self,
        input: &str,
        options: ParseOptions,
    ) -> Result<Value, ComposerError> {
        self.parse_input(Input::from_str(input), options)
    }

    /// Parse an input source and intern the first document's root value.
    pub fn parse_input(
        &mut self,
        input: Input<'_>,
        options: ParseOptions,
    ) -> Result<Value, ComposerError> {
        let mut parser = Parser::with_options(options);
        parser.set_input(input);
        let value = compose::build_value(&mut parser, self)?;
        Ok(value.unwrap_or(Value::NULL))
    }

    /// Compose the next document of an ongoing parse into this store.
    /// `Ok(None)` signifies the end of the stream.
    pub fn build_from(
        &mut self,
        parser: &mut Parser<'_>,
    ) -> Result<Option<Value>, ComposerError> {
        compose::build_value(parser, self)
    }

    /// Serialize a value to a string via the emitter.
    pub fn emit_string(
        &self,
        value: Value,
        options: &EmitOptions,
    ) -> Result<String, EmitterError> {
        dumper::emit_value_to_string(self, value, options)
    }
}

fn hash_items(tag: u64, items: &[Value]) -> u64 {
    let mut hasher = DefaultHasher::new();
    tag.hash(&mut hasher);
    items.hash(&mut hasher);
    hasher.finish()
}

fn hash_pairs(pairs: &[(Value, Value)]) -> u64 {
    let mut hasher = DefaultHasher::new();
    T_MAPPING.hash(&mut hasher);
    pairs.hash(&mut hasher);
    hasher.finish()
}

/// What a plain scalar resolves to under the core schema.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Resolved {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str,
}

/// Core-schema implicit resolution of a plain scalar. With `v11`, the YAML
/// 1.1 boolean forms (yes/no/on/off) and underscored numbers apply.
pub(crate) fn resolve_plain(text: &str, v11: bool) -> Resolved {
    match text {
        "" | "~" | "null" | "Null" | "NULL" => return Resolved::Null,
        "true" | "True" | "TRUE" => return Resolved::Bool(true),
        "false" | "False" | "FALSE" => return Resolved::Bool(false),
        ".inf" | ".Inf" | ".INF" | "+.inf" | "+.Inf" | "+.INF" => {
            return Resolved::Float(f64::INFINITY)
        }
        "-.inf" | "-.Inf" | "-.INF" => return Resolved::Float(f64::NEG_INFINITY),
        ".nan" | ".NaN" | ".NAN" => return Resolved::Float(f64::NAN),
        _ => {}
    }
    if v11 {
        match text {
            "yes" | "Yes" | "YES" | "on" | "On" | "ON" => return Resolved::Bool(true),
            "no" | "No" | "NO" | "off" | "Off" | "OFF" => return Resolved::Bool(false),
            _ => {}
        }
    }
    let cleaned;
    let number = if v11 && text.contains('_') && !text.starts_with('_') {
        cleaned = text.replace('_', "");
        cleaned.as_str()
    } else {
        text
    };
    let unsigned = number
        .strip_prefix('-')
        .or_else(|| number.strip_prefix('+'))
        .unwrap_or(number);
    if let Some(hex) = unsigned.strip_prefix("0x") {
        if !hex.is_empty() && hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            if let Ok(value) = i64::from_str_radix(hex, 16) {
                return Resolved::Int(if number.starts_with('-') { -value } else { value });
            }
        }
        return Resolved::Str;
    }
    if let Some(octal) = unsigned.strip_prefix("0o") {
        if !octal.is_empty() && octal.bytes().all(|b| (b'0'..=b'7').contains(&b)) {
            if let Ok(value) = i64::from_str_radix(octal, 8) {
                return Resolved::Int(if number.starts_with('-') { -value } else { value });
            }
        }
        return Resolved::Str;
    }
    if !unsigned.is_empty() && unsigned.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(value) = number.parse::<i64>() {
            return Resolved::Int(value);
        }
        // Integers beyond i64 stay strings rather than losing precision.
        return Resolved::Str;
    }
    if looks_like_float(unsigned) {
        if let Ok(value) = number.parse::<f64>() {
            return Resolved::Float(value);
        }
    }
    Resolved::Str
}

/// Floats must carry a digit and either a point or an exponent; bare words
/// that `f64::from_str` accepts (like `inf`) are not YAML floats.
fn looks_like_float(text: &str) -> bool {
    let mut digits = false;
    let mut point = false;
    let mut exponent = false;
    let mut bytes = text.bytes().peekable();
    while let Some(b) = bytes.next() {
        match b {
            b'0'..=b'9' => digits = true,
            b'.' if !point && !exponent => point = true,
            b'e' | b'E' if digits && !exponent => {
                exponent = true;
                if matches!(bytes.peek(), Some(b'+' | b'-')) {
                    bytes.next();
                }
                let mut exp_digits = false;
                for rest in bytes.by_ref() {
                    if rest.is_ascii_digit() {
                        exp_digits = true;
                    } else {
                        return false;
                    }
                }
                return exp_digits;
            }
            _ => return false,
        }
    }
    digits && point
}

/// Render a float the way the YAML emitter writes it.
pub(crate) fn format_float(value: f64) -> String {
    if value.is_nan() {
        String::from(".nan")
    } else if value == f64::INFINITY {
        String::from(".inf")
    } else if value == f64::NEG_INFINITY {
        String::from("-.inf")
    } else {
        let mut buffer = ryu::Buffer::new();
        String::from(buffer.format(value))
    }
}

/// Render an integer.
pub(crate) fn format_int(value: i64) -> String {
    let mut buffer = itoa::Buffer::new();
    String::from(buffer.format(value))
}

/// Does the scalar text of a document-tree node denote the same scalar as
/// this resolved value view?
pub(crate) fn scalar_matches(text: &str, data: &ValueData<'_>) -> bool {
    match data {
        ValueData::Null => matches!(text, "" | "~" | "null" | "Null" | "NULL"),
        ValueData::Bool(b) => matches!(resolve_plain(text, true), Resolved::Bool(x) if x == *b),
        ValueData::Int(i) => matches!(resolve_plain(text, false), Resolved::Int(x) if x == *i),
        ValueData::Float(f) => {
            matches!(resolve_plain(text, false), Resolved::Float(x) if x == *f || (x.is_nan() && f.is_nan()))
        }
        ValueData::Str(s) => s == &text,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::parse_path;

    #[test]
    fn primitives_are_interned() {
        let mut store = ValueStore::new();
        assert_eq!(store.int(42), store.int(42));
        assert_eq!(store.float(1.5), store.float(1.5));
        assert_eq!(store.string("hello"), store.string("hello"));
        assert_ne!(store.string("hello"), store.string("world"));
        assert_eq!(store.int(i64::MAX), store.int(i64::MAX));
    }

    #[test]
    fn inline_ints_round_trip() {
        let mut store = ValueStore::new();
        for value in [0i64, 1, -1, 1 << 40, -(1 << 40), i64::MAX, i64::MIN] {
            let handle = store.int(value);
            assert!(matches!(store.get_data(handle), ValueData::Int(x) if x == value));
        }
    }

    #[test]
    fn dedup_makes_equal_composites_identical() {
        let mut store = ValueStore::with_dedup();
        let a1 = store.string("a");
        let one = store.int(1);
        let seq1 = store.sequence(vec![a1, one]);
        let seq2 = store.sequence(vec![a1, one]);
        assert_eq!(seq1, seq2);
        let map1 = store.mapping(vec![(a1, seq1)]);
        let map2 = store.mapping(vec![(a1, seq2)]);
        assert_eq!(map1, map2);
        assert!(store.equal(map1, map2));
    }

    #[test]
    fn without_dedup_equality_is_structural() {
        let mut store = ValueStore::new();
        let a1 = store.string("a");
        let seq1 = store.sequence(vec![a1]);
        let seq2 = store.sequence(vec![a1]);
        assert_ne!(seq1, seq2);
        assert!(store.equal(seq1, seq2));
    }

    #[test]
    fn mapping_lookup_by_key() {
        let mut store = ValueStore::new();
        let key = store.string("name");
        let value = store.string("anchorite");
        let map = store.mapping(vec![(key, value)]);
        assert_eq!(store.get(map, key), Some(value));
        assert_eq!(store.get_str(map, "name"), Some(value));
        assert_eq!(store.get_str(map, "missing"), None);
    }

    #[test]
    fn lookup_sees_through_indirect_keys() {
        let mut store = ValueStore::new();
        let key = store.string("k");
        let wrapped_key = store.indirect(Indirect {
            anchor: Some("a".into()),
            ..Indirect::new(key)
        });
        let value = store.int(1);
        let map = store.mapping(vec![(wrapped_key, value)]);
        assert_eq!(store.get(map, key), Some(value));
    }

    #[test]
    fn duplicate_keys_keep_the_first_binding() {
        let mut store = ValueStore::new();
        let key = store.string("k");
        let first = store.int(1);
        let second = store.int(2);
        let map = store.mapping(vec![(key, first), (key, second)]);
        assert_eq!(store.get(map, key), Some(first));
    }

    #[test]
    fn set_at_path_replaces_without_mutation() {
        let mut store = ValueStore::new();
        let root = store.parse_str("a: {b: 1}\nc: 2\n", Default::default()).unwrap();
        let path = parse_path("/a/b");
        let new_value = store.int(42);
        let new_root = store.set_at_path(root, &path, new_value).unwrap();
        assert!(store.equal(store.get_at_path(new_root, &path).unwrap(), new_value));
        // The old tree is untouched.
        let old = store.get_at_path(root, &path).unwrap();
        assert!(matches!(store.resolve_data(old), ValueData::Int(1)));
        // The untouched sibling subtree is shared by handle.
        let c = parse_path("/c");
        assert_eq!(
            store.get_at_path(root, &c).unwrap(),
            store.get_at_path(new_root, &c).unwrap()
        );
    }

    #[test]
    fn set_at_path_creates_intermediates() {
        let mut store = ValueStore::new();
        let root = store.mapping(vec![]);
        let path = parse_path("/a/b");
        let forty_two = store.int(42);
        let new_root = store.set_at_path(root, &path, forty_two).unwrap();
        let got = store.get_at_path(new_root, &path).unwrap();
        assert!(store.equal(got, forty_two));
    }

    #[test]
    fn integer_segments_force_sequences() {
        let mut store = ValueStore::new();
        let root = store.mapping(vec![]);
        let path = parse_path("/list/0/x");
        let value = store.string("deep");
        let new_root = store.set_at_path(root, &path, value).unwrap();
        let list = store.get_at_path(new_root, &parse_path("/list")).unwrap();
        assert!(matches!(store.resolve_data(list), ValueData::Sequence(_)));
        assert!(store.equal(store.get_at_path(new_root, &path).unwrap(), value));
    }

    #[test]
    fn get_at_path_reports_missing_locations() {
        let mut store = ValueStore::new();
        let root = store.parse_str("a: [1, 2]\n", Default::default()).unwrap();
        assert!(matches!(
            store.get_at_path(root, &parse_path("/a/7")),
            Err(StoreError::IndexOutOfBounds(7))
        ));
        assert!(matches!(
            store.get_at_path(root, &parse_path("/b")),
            Err(StoreError::PathNotFound)
        ));
        assert!(matches!(
            store.get_at_path(root, &parse_path("/a/0/deep")),
            Err(StoreError::NotAContainer)
        ));
    }

    #[test]
    fn internalize_deep_copies_between_stores() {
        let mut source = ValueStore::new();
        let root = source
            .parse_str("a: &x [1, 2]\nb: *x\n", Default::default())
            .unwrap();
        let mut target = ValueStore::with_dedup();
        let copied = target.internalize(&source, root);
        assert!(target.equal(
            target.get_str(copied, "a").unwrap(),
            target.get_str(copied, "b").unwrap()
        ));
    }

    #[test]
    fn contains_is_structural() {
        let mut store = ValueStore::new();
        let one = store.int(1);
        let seq = store.sequence(vec![one]);
        let outer = store.sequence(vec![seq]);
        let probe_inner = store.sequence(vec![one]);
        assert!(store.contains(outer, probe_inner));
    }

    #[test]
    fn plain_resolution_core_schema() {
        assert_eq!(resolve_plain("", false), Resolved::Null);
        assert_eq!(resolve_plain("~", false), Resolved::Null);
        assert_eq!(resolve_plain("true", false), Resolved::Bool(true));
        assert_eq!(resolve_plain("yes", false), Resolved::Str);
        assert_eq!(resolve_plain("yes", true), Resolved::Bool(true));
        assert_eq!(resolve_plain("42", false), Resolved::Int(42));
        assert_eq!(resolve_plain("-7", false), Resolved::Int(-7));
        assert_eq!(resolve_plain("0x1F", false), Resolved::Int(31));
        assert_eq!(resolve_plain("0o17", false), Resolved::Int(15));
        assert_eq!(resolve_plain("1.5", false), Resolved::Float(1.5));
        assert_eq!(resolve_plain("1e3", false), Resolved::Float(1000.0));
        assert_eq!(resolve_plain(".inf", false), Resolved::Float(f64::INFINITY));
        assert_eq!(resolve_plain("1_000", true), Resolved::Int(1000));
        assert_eq!(resolve_plain("1_000", false), Resolved::Str);
        assert_eq!(resolve_plain("hello", false), Resolved::Str);
        assert_eq!(resolve_plain("1.2.3", false), Resolved::Str);
        assert_eq!(resolve_plain("inf", false), Resolved::Str);
    }

    #[test]
    fn float_formatting() {
        assert_eq!(format_float(1.5), "1.5");
        assert_eq!(format_float(f64::INFINITY), ".inf");
        assert_eq!(format_float(f64::NAN), ".nan");
        assert_eq!(format_int(-42), "-42");
    }
}
