use std::fmt;

/// A single scalar component of a primary key tuple (spec.md §3: "composite
/// permitted"). Kept deliberately small — the set of scalar shapes that show
/// up as primary keys in practice — rather than opening this up to arbitrary
/// `Display` values, so that two identities with equal primary keys always
/// compare equal regardless of the caller's formatting choices.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ScalarValue {
    Int(i64),
    UInt(u64),
    Str(String),
    Bool(bool),
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Int(v) => write!(f, "{v}"),
            ScalarValue::UInt(v) => write!(f, "{v}"),
            ScalarValue::Str(v) => write!(f, "{v}"),
            ScalarValue::Bool(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for ScalarValue {
    fn from(v: i64) -> Self {
        ScalarValue::Int(v)
    }
}

impl From<u64> for ScalarValue {
    fn from(v: u64) -> Self {
        ScalarValue::UInt(v)
    }
}

impl From<&str> for ScalarValue {
    fn from(v: &str) -> Self {
        ScalarValue::Str(v.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(v: String) -> Self {
        ScalarValue::Str(v)
    }
}

impl From<bool> for ScalarValue {
    fn from(v: bool) -> Self {
        ScalarValue::Bool(v)
    }
}

/// Record identity discovery (spec.md §6): any record-shaped value embedded
/// in a cache entry must expose a stable type tag and an ordered primary-key
/// tuple. Two records are the same identity iff `(type_tag, primary_key)`
/// match element-wise (spec.md §3).
pub trait RecordIdentity {
    /// Stable identifier for the record's kind, e.g. `"user"`. Used as the
    /// type index set's key component.
    fn type_tag(&self) -> &'static str;

    /// Ordered primary key scalar values. Composite keys are permitted;
    /// ordering must be stable across calls for the same identity.
    fn primary_key(&self) -> Vec<ScalarValue>;
}

/// The backend key under which the instance index set for a record identity
/// is stored (spec.md §3/§6: `__set:<type>:<pk>[:<pk>...]`).
pub fn instance_set_key(record: &impl RecordIdentity) -> String {
    let mut key = format!("__set:{}", record.type_tag());
    for pk in record.primary_key() {
        key.push(':');
        key.push_str(&pk.to_string());
    }
    key
}

/// The backend key under which the type index set for `type_tag` is stored
/// (spec.md §3/§6: `__set:<type>`).
pub fn type_set_key(type_tag: &str) -> String {
    format!("__set:{type_tag}")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct User {
        id: u64,
    }

    impl RecordIdentity for User {
        fn type_tag(&self) -> &'static str {
            "user"
        }

        fn primary_key(&self) -> Vec<ScalarValue> {
            vec![self.id.into()]
        }
    }

    struct Membership {
        org: String,
        user_id: u64,
    }

    impl RecordIdentity for Membership {
        fn type_tag(&self) -> &'static str {
            "membership"
        }

        fn primary_key(&self) -> Vec<ScalarValue> {
            vec![self.org.clone().into(), self.user_id.into()]
        }
    }

    #[test]
    fn instance_key_is_type_prefixed_and_pk_suffixed() {
        let u = User { id: 5 };
        assert_eq!(instance_set_key(&u), "__set:user:5");
    }

    #[test]
    fn composite_primary_key_joins_every_component() {
        let m = Membership { org: "acme".to_string(), user_id: 7 };
        assert_eq!(instance_set_key(&m), "__set:membership:acme:7");
    }

    #[test]
    fn type_key_has_no_primary_key_suffix() {
        assert_eq!(type_set_key("user"), "__set:user");
    }
}
