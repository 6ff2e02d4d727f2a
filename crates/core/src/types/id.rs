//! Newtype IDs for type-safe entity references.
//!
//! Two families live here:
//!
//! - [`define_id!`] wraps database-generated `i32` keys (users).
//! - [`define_plain_id!`] wraps string primary keys that are handed to
//!   clients only through the identifier cipher (products) or in plaintext
//!   (variants).

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around `i32` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`
/// - Conversion methods: `new()`, `as_i32()`
/// - `From<i32>` and `Into<i32>` implementations
/// - `sqlx` `Type`, `Encode`, and `Decode` implementations (with `postgres` feature)
///
/// # Example
///
/// ```rust
/// # use cartseal_core::define_id;
/// define_id!(AccountId);
/// define_id!(OrderId);
///
/// let account_id = AccountId::new(1);
/// let order_id = OrderId::new(1);
///
/// // These are different types, so this won't compile:
/// // let _: AccountId = order_id;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            /// Create a new ID from an i32 value.
            #[must_use]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            /// Get the underlying i32 value.
            #[must_use]
            pub const fn as_i32(&self) -> i32 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i32> for $name {
            fn from(id: i32) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Type<::sqlx::Postgres> for $name {
            fn type_info() -> ::sqlx::postgres::PgTypeInfo {
                <i32 as ::sqlx::Type<::sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &::sqlx::postgres::PgTypeInfo) -> bool {
                <i32 as ::sqlx::Type<::sqlx::Postgres>>::compatible(ty)
            }
        }

        #[cfg(feature = "postgres")]
        impl<'r> ::sqlx::Decode<'r, ::sqlx::Postgres> for $name {
            fn decode(
                value: ::sqlx::postgres::PgValueRef<'r>,
            ) -> ::core::result::Result<Self, ::sqlx::error::BoxDynError> {
                let id = <i32 as ::sqlx::Decode<::sqlx::Postgres>>::decode(value)?;
                Ok(Self(id))
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Encode<'_, ::sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut ::sqlx::postgres::PgArgumentBuffer,
            ) -> ::std::result::Result<::sqlx::encode::IsNull, ::sqlx::error::BoxDynError> {
                <i32 as ::sqlx::Encode<::sqlx::Postgres>>::encode_by_ref(&self.0, buf)
            }
        }
    };
}

/// Macro to define a string primary-key wrapper.
///
/// The wrapped value is never empty. Deserialization goes through `parse`,
/// so an empty string in a payload or a stored document is rejected.
///
/// # Example
///
/// ```rust
/// # use cartseal_core::define_plain_id;
/// define_plain_id!(CouponId);
///
/// assert!(CouponId::parse("66f1c0ffee00000000000001").is_ok());
/// assert!(CouponId::parse("").is_err());
/// ```
#[macro_export]
macro_rules! define_plain_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Parse an ID from a string, rejecting empty input.
            ///
            /// # Errors
            ///
            /// Returns [`PlainIdError::Empty`](crate::types::id::PlainIdError::Empty)
            /// if the string is empty.
            pub fn parse(s: &str) -> ::core::result::Result<Self, $crate::types::id::PlainIdError> {
                if s.is_empty() {
                    return Err($crate::types::id::PlainIdError::Empty);
                }
                Ok(Self(s.to_owned()))
            }

            /// Returns the ID as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the ID and returns its inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = $crate::types::id::PlainIdError;

            fn try_from(s: String) -> ::core::result::Result<Self, Self::Error> {
                if s.is_empty() {
                    return Err($crate::types::id::PlainIdError::Empty);
                }
                Ok(Self(s))
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

/// Errors that can occur when parsing a string ID.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlainIdError {
    /// The input string is empty.
    #[error("identifier cannot be empty")]
    Empty,
}

define_id!(UserId);

define_plain_id!(ProductId);
define_plain_id!(VariantId);
