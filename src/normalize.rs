//! Traditional to Simplified Chinese script normalization.

/// A pure text transform applied to decoded text before it is emitted.
///
/// Implementations must leave text they have no mapping for untouched, so
/// that normalizing already-normalized text is a no-op.
pub trait ScriptNormalizer: Send + Sync {
    fn normalize(&self, text: &str) -> String;
}

#[cfg(feature = "opencc")]
pub use self::opencc::Simplifier;

#[cfg(feature = "opencc")]
mod opencc {
    use ferrous_opencc::config::BuiltinConfig;
    use ferrous_opencc::OpenCC;
    use log::debug;
    use once_cell::sync::OnceCell;

    use super::ScriptNormalizer;
    use crate::error::NormalizeError;

    static T2S: OnceCell<OpenCC> = OnceCell::new();

    /// OpenCC `t2s`: phrase mappings take precedence over single characters.
    #[derive(Clone, Copy)]
    pub struct Simplifier {
        converter: &'static OpenCC,
    }

    impl Simplifier {
        /// Loads the shared dictionary on first use.
        pub fn load() -> Result<Self, NormalizeError> {
            let converter = T2S.get_or_try_init(|| {
                debug!("loading t2s dictionary");
                OpenCC::from_config(BuiltinConfig::T2s)
                    .map_err(|e| NormalizeError::Dictionary(e.to_string()))
            })?;
            Ok(Simplifier { converter })
        }
    }

    impl ScriptNormalizer for Simplifier {
        fn normalize(&self, text: &str) -> String {
            self.converter.convert(text)
        }
    }

}
