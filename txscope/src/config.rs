//! Host-supplied configuration for one named connection source. Loading these
//! from files or the environment is the host's business; with the `serde`
//! feature the types derive `Serialize`/`Deserialize` to make that easy.

/// Configuration for one connection source. `options` is opaque driver
/// configuration; `context_name` is the name request-handling code uses to
/// look the source up.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SourceConfig<O> {
    pub context_name: String,
    pub options: O,
    /// `true` for a managed pool, `false` for one persistent connection.
    pub pooled: bool,
}

impl<O> SourceConfig<O> {
    /// A pooled source under `context_name`.
    pub fn pooled(context_name: impl Into<String>, options: O) -> Self {
        Self {
            context_name: context_name.into(),
            options,
            pooled: true,
        }
    }

    /// A single-connection source under `context_name`.
    pub fn single(context_name: impl Into<String>, options: O) -> Self {
        Self {
            context_name: context_name.into(),
            options,
            pooled: false,
        }
    }
}
