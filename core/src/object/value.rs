use core::fmt;
use std::rc::Rc;

use hashbrown::HashMap;

use crate::object::Builtin;
use crate::vm::Instructions;

/// A runtime value.
///
/// Cloning is cheap: heap variants only bump a reference count.
///
/// `PartialEq` is structural (useful to hosts and tests). The VM's `==`
/// operator uses [`Object::identical`] instead, which compares arrays, hashes
/// and functions by identity.
#[derive(Debug, Clone)]
pub enum Object {
    Integer(i64),
    Boolean(bool),
    Null,
    String(Rc<str>),
    Array(Rc<Vec<Object>>),
    Hash(Rc<HashPairs>),
    CompiledFunction(Rc<CompiledFunction>),
    Closure(Rc<Closure>),
    Builtin(&'static Builtin),
}

/// Runtime type tag, used in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Integer,
    Boolean,
    Null,
    String,
    Array,
    Hash,
    CompiledFunction,
    Closure,
    Builtin,
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ObjectType::Integer => "INTEGER",
            ObjectType::Boolean => "BOOLEAN",
            ObjectType::Null => "NULL",
            ObjectType::String => "STRING",
            ObjectType::Array => "ARRAY",
            ObjectType::Hash => "HASH",
            ObjectType::CompiledFunction => "COMPILED_FUNCTION",
            ObjectType::Closure => "CLOSURE",
            ObjectType::Builtin => "BUILTIN",
        })
    }
}

/// Bytecode of one function literal, stored in the constant pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledFunction {
    pub instructions: Instructions,
    /// Local slots to reserve on the stack, parameters included.
    pub num_locals: usize,
    pub num_parameters: usize,
}

/// A compiled function together with the values it captured.
#[derive(Debug, Clone)]
pub struct Closure {
    pub function: Rc<CompiledFunction>,
    pub free: Vec<Object>,
}

impl Closure {
    /// Wrap a function that captures nothing.
    pub fn bare(function: Rc<CompiledFunction>) -> Self {
        Self {
            function,
            free: Vec::new(),
        }
    }
}

/// Key of a hash entry. Only integers, booleans and strings are hashable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HashKey {
    Integer(i64),
    Boolean(bool),
    String(Rc<str>),
}

/// A hash entry keeps the original key object for display.
#[derive(Debug, Clone, PartialEq)]
pub struct HashPair {
    pub key: Object,
    pub value: Object,
}

/// Contents of a hash value, iterated in insertion order.
///
/// Re-inserting an existing key replaces its pair but keeps its position.
/// Equality ignores order.
#[derive(Debug, Clone, Default)]
pub struct HashPairs {
    positions: HashMap<HashKey, usize>,
    entries: Vec<HashPair>,
}

impl HashPairs {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            positions: HashMap::with_capacity(capacity),
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn insert(&mut self, key: HashKey, pair: HashPair) {
        match self.positions.get(&key) {
            Some(&position) => self.entries[position] = pair,
            None => {
                self.positions.insert(key, self.entries.len());
                self.entries.push(pair);
            }
        }
    }

    pub fn get(&self, key: &HashKey) -> Option<&HashPair> {
        self.positions.get(key).map(|&position| &self.entries[position])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HashPair> {
        self.entries.iter()
    }
}

impl PartialEq for HashPairs {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .positions
                .iter()
                .all(|(key, &position)| other.get(key) == Some(&self.entries[position]))
    }
}

impl FromIterator<(HashKey, HashPair)> for HashPairs {
    fn from_iter<I: IntoIterator<Item = (HashKey, HashPair)>>(iter: I) -> Self {
        let mut pairs = HashPairs::default();
        for (key, pair) in iter {
            pairs.insert(key, pair);
        }
        pairs
    }
}

impl Object {
    pub fn string(s: &str) -> Self {
        Object::String(Rc::from(s))
    }

    pub fn array(elements: Vec<Object>) -> Self {
        Object::Array(Rc::new(elements))
    }

    pub fn object_type(&self) -> ObjectType {
        match self {
            Object::Integer(_) => ObjectType::Integer,
            Object::Boolean(_) => ObjectType::Boolean,
            Object::Null => ObjectType::Null,
            Object::String(_) => ObjectType::String,
            Object::Array(_) => ObjectType::Array,
            Object::Hash(_) => ObjectType::Hash,
            Object::CompiledFunction(_) => ObjectType::CompiledFunction,
            Object::Closure(_) => ObjectType::Closure,
            Object::Builtin(_) => ObjectType::Builtin,
        }
    }

    /// `Null` and `false` are falsy. Everything else, including `0`, is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Object::Null | Object::Boolean(false))
    }

    pub fn hash_key(&self) -> Option<HashKey> {
        match self {
            Object::Integer(i) => Some(HashKey::Integer(*i)),
            Object::Boolean(b) => Some(HashKey::Boolean(*b)),
            Object::String(s) => Some(HashKey::String(Rc::clone(s))),
            _ => None,
        }
    }

    /// Equality as seen by the `==` operator.
    ///
    /// Scalars and strings compare by value; arrays, hashes and functions
    /// compare by identity.
    pub fn identical(&self, other: &Object) -> bool {
        match (self, other) {
            (Object::Integer(a), Object::Integer(b)) => a == b,
            (Object::Boolean(a), Object::Boolean(b)) => a == b,
            (Object::Null, Object::Null) => true,
            (Object::String(a), Object::String(b)) => a == b,
            (Object::Array(a), Object::Array(b)) => Rc::ptr_eq(a, b),
            (Object::Hash(a), Object::Hash(b)) => Rc::ptr_eq(a, b),
            (Object::CompiledFunction(a), Object::CompiledFunction(b)) => Rc::ptr_eq(a, b),
            (Object::Closure(a), Object::Closure(b)) => Rc::ptr_eq(a, b),
            (Object::Builtin(a), Object::Builtin(b)) => core::ptr::eq(*a, *b),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Object::String(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Object]> {
        match self {
            Object::Array(elements) => Some(elements.as_slice()),
            _ => None,
        }
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Object::Array(a), Object::Array(b)) => a == b,
            (Object::Hash(a), Object::Hash(b)) => a == b,
            (Object::CompiledFunction(a), Object::CompiledFunction(b)) => a == b,
            (Object::Closure(a), Object::Closure(b)) => {
                a.function == b.function && a.free == b.free
            }
            _ => self.identical(other),
        }
    }
}

impl From<i64> for Object {
    fn from(value: i64) -> Self {
        Object::Integer(value)
    }
}

impl From<bool> for Object {
    fn from(value: bool) -> Self {
        Object::Boolean(value)
    }
}

impl From<&str> for Object {
    fn from(value: &str) -> Self {
        Object::string(value)
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Integer(i) => write!(f, "{}", i),
            Object::Boolean(b) => write!(f, "{}", b),
            Object::Null => f.write_str("null"),
            Object::String(s) => f.write_str(s),
            Object::Array(elements) => {
                f.write_str("[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", element)?;
                }
                f.write_str("]")
            }
            Object::Hash(pairs) => {
                f.write_str("{")?;
                for (i, pair) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", pair.key, pair.value)?;
                }
                f.write_str("}")
            }
            Object::CompiledFunction(function) => {
                write!(f, "CompiledFunction[{:p}]", Rc::as_ptr(function))
            }
            Object::Closure(closure) => write!(f, "Closure[{:p}]", Rc::as_ptr(closure)),
            Object::Builtin(builtin) => write!(f, "builtin function {}", builtin.name),
        }
    }
}
