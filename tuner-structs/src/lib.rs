pub mod config;
pub mod core;

/// Declares a plain data struct deriving the serde traits plus `Clone`, `Debug` and `PartialEq`.
/// `Option` fields default to `None` when absent from the input.
#[macro_export]
macro_rules! serializable_struct {
    ( @ $(#[$sattr:meta])* $name:ident { } -> ($($fields:tt)*) ) => (
        $(#[$sattr])*
        #[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
        pub struct $name {
            $($fields)*
        }
    );
    ( @ $(#[$sattr:meta])* $name:ident { $(#[$attr:meta])* $param:ident : Option<$type:ty>, $($rest:tt)* } -> ($($fields:tt)*) ) => (
        serializable_struct!(@ $(#[$sattr])* $name { $($rest)* } -> (
            $($fields)*
            $(#[$attr])*
            #[serde(default)]
            pub $param : Option<$type>,
        ));
    );
    ( @ $(#[$sattr:meta])* $name:ident { $(#[$attr:meta])* $param:ident : $type:ty, $($rest:tt)* } -> ($($fields:tt)*) ) => (
        serializable_struct!(@ $(#[$sattr])* $name { $($rest)* } -> (
            $($fields)*
            $(#[$attr])*
            pub $param : $type,
        ));
    );
    ( $(#[$sattr:meta])* $name:ident { $( $rest:tt)* } ) => {
        serializable_struct!(@ $(#[$sattr])* $name { $($rest)* } -> ());
    };
}
