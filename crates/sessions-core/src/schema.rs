//! Closed string enums that tolerate unknown values on load.
//!
//! Config and state documents are hand-edited and outlive the binary that wrote them,
//! so an unrecognised variant decodes to the enum's default instead of failing the
//! whole document. Serialization always writes the canonical lowercase name.

use serde_json::Value;

pub trait LenientEnum: Sized + Default + Copy {
    /// Canonical name written to disk.
    fn as_str(self) -> &'static str;

    /// Map a stored string (canonical or legacy spelling) to a variant.
    fn from_legacy(s: &str) -> Option<Self>;
}

/// Decode `value` into `T`, falling back to `T::default()` for anything unrecognised.
pub fn coerce<T: LenientEnum>(value: &Value, kind: &str) -> T {
    match value.as_str().and_then(|s| T::from_legacy(s.trim())) {
        Some(v) => v,
        None => {
            let fallback = T::default();
            tracing::warn!(
                %value,
                kind,
                fallback = fallback.as_str(),
                "unrecognised value, using default"
            );
            fallback
        }
    }
}

/// Implement `Serialize`, `Deserialize` and `Display` for a [`LenientEnum`].
macro_rules! lenient_enum_serde {
    ($ty:ty) => {
        impl serde::Serialize for $ty {
            fn serialize<S: serde::Serializer>(
                &self,
                serializer: S,
            ) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str($crate::schema::LenientEnum::as_str(*self))
            }
        }

        impl<'de> serde::Deserialize<'de> for $ty {
            fn deserialize<D: serde::Deserializer<'de>>(
                deserializer: D,
            ) -> std::result::Result<Self, D::Error> {
                let value = <serde_json::Value as serde::Deserialize>::deserialize(deserializer)?;
                Ok($crate::schema::coerce::<$ty>(&value, stringify!($ty)))
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str($crate::schema::LenientEnum::as_str(*self))
            }
        }
    };
}

pub(crate) use lenient_enum_serde;

/// Insert every key of `defaults` that `target` lacks, recursing into nested objects.
///
/// Keys present only in `target` are kept; non-object values in `target` win.
pub fn fill_missing(target: &mut Value, defaults: &Value) {
    let (Value::Object(target), Value::Object(defaults)) = (target, defaults) else {
        return;
    };
    for (key, default) in defaults {
        match target.get_mut(key) {
            Some(existing) => fill_missing(existing, default),
            None => {
                target.insert(key.clone(), default.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fill_missing_adds_nested_keys_and_keeps_extras() {
        let mut target = json!({
            "features": { "auto_ultrathink": false },
            "from_newer_version": 7
        });
        let defaults = json!({
            "features": { "auto_ultrathink": true, "use_nerd_fonts": false },
            "mode": "discussion"
        });
        fill_missing(&mut target, &defaults);
        assert_eq!(
            target,
            json!({
                "features": { "auto_ultrathink": false, "use_nerd_fonts": false },
                "from_newer_version": 7,
                "mode": "discussion"
            })
        );
    }

    #[test]
    fn fill_missing_leaves_scalars_alone() {
        let mut target = json!({ "current_task": null });
        fill_missing(&mut target, &json!({ "current_task": { "name": "x" } }));
        assert_eq!(target, json!({ "current_task": null }));
    }
}
