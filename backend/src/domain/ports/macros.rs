//! Helper macro for port error enums whose variants all carry a message.
//!
//! Each variant becomes `Variant { message: String }` with a snake_case
//! constructor accepting `impl Into<String>`, plus a shared `message()`
//! accessor.

macro_rules! define_port_error {
    (
        $(#[$outer:meta])*
        pub enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident => $display:literal
            ),* $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                #[error($display)]
                $variant {
                    /// Adapter supplied detail.
                    message: String,
                },
            )*
        }

        impl $name {
            $(
                ::paste::paste! {
                    #[doc = concat!("Build a `", stringify!($variant), "` error.")]
                    pub fn [<$variant:snake>](message: impl Into<String>) -> Self {
                        Self::$variant {
                            message: message.into(),
                        }
                    }
                }
            )*

            /// Detail message carried by every variant.
            pub fn message(&self) -> &str {
                match self {
                    $(Self::$variant { message } => message.as_str(),)*
                }
            }
        }
    };
}

pub(crate) use define_port_error;
