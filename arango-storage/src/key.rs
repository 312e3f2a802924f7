use std::borrow::Cow;

use uuid::Uuid;

/// Substitute for every character outside an allow-list.
pub const SUBSTITUTE: char = '_';

/// Punctuation accepted in document ids besides ASCII alphanumerics.
pub const ID_PUNCTUATION: &[char] = &[
    '_', '-', '/', ':', '.', '@', '(', ')', ',', '=', ';', '$', '!', '*', '\'', '%',
];

/// Punctuation accepted in collection names besides ASCII alphanumerics.
pub const COLLECTION_PUNCTUATION: &[char] = &['_', '-'];

/// Stable logical key of an entity, before sanitization.
pub trait StateKey {
    fn to_key_string(&self) -> String;
}

/// Map a logical key onto the document id charset.
///
/// Every character outside `[A-Za-z0-9]` and [`ID_PUNCTUATION`] becomes
/// [`SUBSTITUTE`]. Distinct keys may collide after substitution, e.g.
/// `"a#1"` and `"a?1"` both become `"a_1"`.
pub fn sanitize_id(logical_key: &str) -> String {
    sanitize(logical_key, ID_PUNCTUATION)
}

/// Map a name onto the collection name charset, `[A-Za-z0-9_-]`.
pub fn sanitize_collection_name(name: &str) -> String {
    sanitize(name, COLLECTION_PUNCTUATION)
}

/// Simple name of an entity type, the segment after the last `.` or `::`
/// outside any generic arguments.
///
/// `"Orders.Account"` and `"orders::Account"` both yield `"Account"`;
/// `"ledger::Ledger<orders::Account>"` yields `"Ledger"`.
pub fn simple_type_name(entity_type: &str) -> &str {
    let path = entity_type
        .split_once('<')
        .map_or(entity_type, |(path, _)| path);

    path.rsplit(['.', ':']).next().unwrap_or(path)
}

/// Collection name derived from an entity type when no fixed name is configured.
pub fn collection_name_for(entity_type: &str) -> String {
    sanitize_collection_name(simple_type_name(entity_type))
}

fn sanitize(input: &str, punctuation: &[char]) -> String {
    input
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || punctuation.contains(&c) {
                c
            } else {
                SUBSTITUTE
            }
        })
        .collect()
}

// Implementations

impl StateKey for str {
    fn to_key_string(&self) -> String {
        self.to_string()
    }
}

impl StateKey for String {
    fn to_key_string(&self) -> String {
        self.clone()
    }
}

impl StateKey for Cow<'_, str> {
    fn to_key_string(&self) -> String {
        self.to_string()
    }
}

impl StateKey for Uuid {
    fn to_key_string(&self) -> String {
        self.hyphenated().to_string()
    }
}

macro_rules! impl_state_key_for_int {
    ($($t:ty),*) => {
        $(
            impl StateKey for $t {
                fn to_key_string(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

impl_state_key_for_int!(u32, u64, u128, i32, i64, i128);

impl<K: StateKey + ?Sized> StateKey for &K {
    fn to_key_string(&self) -> String {
        (**self).to_key_string()
    }
}
