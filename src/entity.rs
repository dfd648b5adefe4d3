use crate::metadata::Mapping;
use serde::{Deserialize, Serialize};
use std::any::TypeId;
use std::fmt;

/// Primary key of a mapped entity.
///
/// Unset until the entity has been read from, or written to, the database.
/// Application code reads it; the repository assigns it on read paths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity(Option<i64>);

impl Identity {
    pub const fn unset() -> Self {
        Identity(None)
    }

    pub fn get(&self) -> Option<i64> {
        self.0
    }

    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }

    pub(crate) fn assign(&mut self, id: i64) {
        self.0 = Some(id);
    }
}

impl From<i64> for Identity {
    fn from(id: i64) -> Self {
        Identity(Some(id))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(id) => write!(f, "{id}"),
            None => write!(f, "<unset>"),
        }
    }
}

/// A type persisted as rows of a single table.
///
/// The identity column is never declared through [`Mapping::column`]; it is
/// always `<table>_id`. Implement by hand, or use [`entity!`](crate::entity!)
/// to declare the table and column markers next to the struct.
///
/// ```ignore
/// impl Entity for Customer {
///     fn identity(&self) -> &Identity { &self.identity }
///     fn identity_mut(&mut self) -> &mut Identity { &mut self.identity }
///     fn map(mapping: &mut Mapping<Self>) {
///         mapping
///             .table("customer")
///             .column("name", "full_name", |c| &c.name, |c| &mut c.name)
///             .column("email", "email_addr", |c| &c.email, |c| &mut c.email);
///     }
/// }
/// ```
pub trait Entity: Default + Send + Sync + 'static {
    fn identity(&self) -> &Identity;

    /// Mutable access for the repository. Callers that want the id returned
    /// by `add` on their instance assign it through here explicitly.
    fn identity_mut(&mut self) -> &mut Identity;

    /// Register the table marker and column-mapped fields, in declaration order.
    fn map(mapping: &mut Mapping<Self>);
}

/// Entity equality across possibly different mapped types.
///
/// Two entities are the same when they have the same concrete type and either
/// are the same instance or carry equal, set identities. Unsaved entities are
/// never equal to a different instance.
pub fn same_entity<A: Entity, B: Entity>(a: &A, b: &B) -> bool {
    if TypeId::of::<A>() != TypeId::of::<B>() {
        return false;
    }
    if std::ptr::eq(a as *const A as *const (), b as *const B as *const ()) {
        return true;
    }
    match (a.identity().get(), b.identity().get()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// Declare a mapped struct together with its table and column markers.
///
/// Generates the struct with a hidden `identity` field, its [`Entity`]
/// implementation, and identity-based `PartialEq`/`Hash`. Only fields carrying
/// `#[column = "..."]` are mapped, in declaration order; other fields and
/// attributes such as doc comments pass through to the struct untouched.
///
/// The macro derives `Debug`, `Clone` and `Default` itself. Do not list those
/// in the struct's own `#[derive(...)]`, and do not derive `PartialEq`, `Eq`
/// or `Hash`.
///
/// ```ignore
/// rust_orm::entity! {
///     #[table = "customer"]
///     pub struct Customer {
///         #[column = "full_name"]
///         pub name: String,
///         #[column = "email_addr"]
///         pub email: String,
///         /// Not persisted.
///         pub dirty: bool,
///     }
/// }
/// ```
#[macro_export]
macro_rules! entity {
    (@munch $head:tt [$($fields:tt)*] [$($columns:tt)*] [] []) => {
        $crate::entity!(@emit $head [$($fields)*] [$($columns)*]);
    };
    (@munch $head:tt $fields:tt $columns:tt $attrs:tt []
        #[column = $column:literal] $($rest:tt)*
    ) => {
        $crate::entity!(@munch $head $fields $columns $attrs [$column] $($rest)*);
    };
    (@munch $head:tt $fields:tt $columns:tt [$($attrs:tt)*] $column:tt
        #[$attr:meta] $($rest:tt)*
    ) => {
        $crate::entity!(@munch $head $fields $columns [$($attrs)* #[$attr]] $column $($rest)*);
    };
    (@munch $head:tt [$($fields:tt)*] $columns:tt [$($attrs:tt)*] []
        $fvis:vis $field:ident : $ty:ty $(, $($rest:tt)*)?
    ) => {
        $crate::entity!(@munch $head
            [$($fields)* $($attrs)* $fvis $field: $ty,]
            $columns
            [] []
            $($($rest)*)?
        );
    };
    (@munch $head:tt [$($fields:tt)*] [$($columns:tt)*] [$($attrs:tt)*] [$column:literal]
        $fvis:vis $field:ident : $ty:ty $(, $($rest:tt)*)?
    ) => {
        $crate::entity!(@munch $head
            [$($fields)* $($attrs)* $fvis $field: $ty,]
            [$($columns)* ($field $column)]
            [] []
            $($($rest)*)?
        );
    };
    (@emit
        [$table:tt [$($meta:tt)*] [$($vis:tt)*] $name:ident]
        [$($fields:tt)*]
        [$(($cfield:ident $ccolumn:tt))*]
    ) => {
        $($meta)*
        #[derive(Debug, Clone, Default)]
        $($vis)* struct $name {
            identity: $crate::Identity,
            $($fields)*
        }

        impl $crate::Entity for $name {
            fn identity(&self) -> &$crate::Identity {
                &self.identity
            }

            fn identity_mut(&mut self) -> &mut $crate::Identity {
                &mut self.identity
            }

            fn map(mapping: &mut $crate::Mapping<Self>) {
                mapping.table($table);
                $(
                    mapping.column(
                        stringify!($cfield),
                        $ccolumn,
                        |e| &e.$cfield,
                        |e| &mut e.$cfield,
                    );
                )*
            }
        }

        impl ::std::cmp::PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                $crate::same_entity(self, other)
            }
        }

        impl ::std::hash::Hash for $name {
            fn hash<H: ::std::hash::Hasher>(&self, state: &mut H) {
                ::std::hash::Hash::hash(&self.identity, state)
            }
        }
    };
    (
        #[table = $table:literal]
        $(#[$meta:meta])*
        $vis:vis struct $name:ident { $($body:tt)* }
    ) => {
        $crate::entity!(@munch [$table [$(#[$meta])*] [$vis] $name] [] [] [] [] $($body)*);
    };
}
